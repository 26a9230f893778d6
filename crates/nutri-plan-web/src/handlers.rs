//! Request handlers.
//!
//! Each handler runs its database and file work on the blocking pool and
//! always produces a response: failures are logged and answered with a
//! 500 page.

use std::collections::HashMap;
use std::convert::Infallible;

use nutri_plan_core::{
    Account, Clinic, CreateOutcome, LoginOutcome, Notice, NutriPlanError, PatientReport, Role,
};
use thiserror::Error;
use tracing::{error, warn};
use warp::http::header::{ETAG, SET_COOKIE};
use warp::http::{StatusCode, Uri};
use warp::reply::Response;
use warp::Reply;

use crate::pages;
use crate::session::{authorize, expired_cookie, resolve, session_cookie, Identity, Redirect};
use crate::AppState;

#[derive(Error, Debug)]
enum WebError {
    #[error(transparent)]
    Core(#[from] NutriPlanError),

    #[error("Page rendering failed: {0}")]
    Page(#[from] tera::Error),
}

type WebResult<T> = Result<T, WebError>;

type HandlerResult = Result<Response, Infallible>;

/// Run request work on the blocking pool.
async fn blocking<F>(work: F) -> HandlerResult
where
    F: FnOnce() -> WebResult<Response> + Send + 'static,
{
    let response = match tokio::task::spawn_blocking(work).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(error = %e, "Request failed");
            server_error()
        }
        Err(e) => {
            error!(error = %e, "Request task failed");
            server_error()
        }
    };
    Ok(response)
}

fn server_error() -> Response {
    warp::reply::with_status(
        warp::reply::html(pages::SERVER_ERROR),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .into_response()
}

fn html(token: &str, body: String) -> Response {
    warp::reply::with_header(warp::reply::html(body), SET_COOKIE, session_cookie(token))
        .into_response()
}

fn see_other(cookie: String, location: &'static str) -> Response {
    warp::reply::with_header(
        warp::redirect::see_other(Uri::from_static(location)),
        SET_COOKIE,
        cookie,
    )
    .into_response()
}

/// Redirect, queueing a notice for the page the browser lands on.
fn redirect_with(clinic: &Clinic, identity: &Identity, location: &'static str, notice: Notice) -> WebResult<Response> {
    clinic.push_notice(identity.token(), notice)?;
    Ok(see_other(session_cookie(identity.token()), location))
}

fn deny(clinic: &Clinic, identity: &Identity, redirect: Redirect) -> WebResult<Response> {
    if let Some(notice) = redirect.notice {
        clinic.push_notice(identity.token(), notice)?;
    }
    Ok(see_other(session_cookie(identity.token()), redirect.location))
}

enum Gate {
    Pass(Identity, Account),
    Deny(Response),
}

/// Resolve the session and authorize it for `required`.
fn gate(clinic: &Clinic, token: Option<&str>, required: Option<Role>) -> WebResult<Gate> {
    let identity = resolve(clinic, token)?;
    match authorize(&identity, required) {
        Ok(account) => Ok(Gate::Pass(identity, account)),
        Err(redirect) => Ok(Gate::Deny(deny(clinic, &identity, redirect)?)),
    }
}

macro_rules! pass {
    ($gate:expr) => {
        match $gate? {
            Gate::Pass(identity, account) => (identity, account),
            Gate::Deny(response) => return Ok(response),
        }
    };
}

/// Decode a percent-encoded path segment.
fn decode_segment(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let (hi, lo) = (bytes[i + 1], bytes[i + 2]);
            if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                decoded.push(hex_value(hi) << 4 | hex_value(lo));
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Value of an ASCII hex digit.
fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

fn form_value<'a>(form: &'a HashMap<String, String>, key: &str) -> &'a str {
    form.get(key).map(String::as_str).unwrap_or("")
}

// =========================================================================
// Session Routes
// =========================================================================

/// `GET /`
pub async fn index(state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        let (identity, account) = pass!(gate(&state.clinic, token.as_deref(), None));
        let location = if account.is_consultant() {
            "/dashboard"
        } else {
            "/view"
        };
        Ok(see_other(session_cookie(identity.token()), location))
    })
    .await
}

/// `GET /login`
pub async fn login_form(state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let identity = resolve(clinic, token.as_deref())?;
        if identity.account.is_some() {
            return Ok(see_other(session_cookie(identity.token()), "/"));
        }
        let notices = clinic.take_notices(identity.token())?;
        Ok(html(identity.token(), state.pages.login(&notices)?))
    })
    .await
}

/// `POST /login`
pub async fn login_submit(
    state: AppState,
    token: Option<String>,
    form: HashMap<String, String>,
) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let identity = resolve(clinic, token.as_deref())?;
        let username = form_value(&form, "username");
        let password = form_value(&form, "password");

        if username.is_empty() || password.is_empty() {
            return redirect_with(
                clinic,
                &identity,
                "/login",
                Notice::error("Nome de usuário e senha são obrigatórios."),
            );
        }

        match clinic.login(identity.token(), username, password)? {
            LoginOutcome::Accepted { session, .. } => {
                clinic.push_notice(&session.token, Notice::success("Login bem-sucedido!"))?;
                Ok(see_other(session_cookie(&session.token), "/"))
            }
            LoginOutcome::Rejected => redirect_with(
                clinic,
                &identity,
                "/login",
                Notice::error("Usuário ou senha inválidos."),
            ),
        }
    })
    .await
}

/// `GET /logout`
pub async fn logout(state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        if let Some(token) = token.as_deref() {
            state.clinic.logout(token)?;
        }
        Ok(see_other(expired_cookie(), "/login"))
    })
    .await
}

// =========================================================================
// Consultant Routes
// =========================================================================

/// `GET /dashboard`
pub async fn dashboard(state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, _) = pass!(gate(clinic, token.as_deref(), Some(Role::Consultant)));
        let notices = clinic.take_notices(identity.token())?;
        let patients = clinic.active_patients()?;
        Ok(html(identity.token(), state.pages.dashboard(&notices, &patients)?))
    })
    .await
}

/// `GET /create_patient`
pub async fn create_patient_form(state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, _) = pass!(gate(clinic, token.as_deref(), Some(Role::Consultant)));
        let notices = clinic.take_notices(identity.token())?;
        Ok(html(identity.token(), state.pages.create_patient(&notices)?))
    })
    .await
}

/// `POST /create_patient`
pub async fn create_patient_submit(
    state: AppState,
    token: Option<String>,
    form: HashMap<String, String>,
) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, _) = pass!(gate(clinic, token.as_deref(), Some(Role::Consultant)));
        let username = form_value(&form, "username");
        let password = form_value(&form, "password");

        match clinic.create_patient(username, password)? {
            CreateOutcome::Created(account) => redirect_with(
                clinic,
                &identity,
                "/dashboard",
                Notice::success(format!("Paciente '{}' criado com sucesso!", account.username)),
            ),
            CreateOutcome::Duplicate(username) => redirect_with(
                clinic,
                &identity,
                "/create_patient",
                Notice::error(format!(
                    "O nome de usuário '{}' já existe. Por favor, escolha outro.",
                    username
                )),
            ),
            CreateOutcome::Invalid(reason) => {
                redirect_with(clinic, &identity, "/create_patient", Notice::error(reason))
            }
        }
    })
    .await
}

/// `GET /archived`
pub async fn archived(state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, _) = pass!(gate(clinic, token.as_deref(), Some(Role::Consultant)));
        let notices = clinic.take_notices(identity.token())?;
        let patients = clinic.archived_patients()?;
        Ok(html(identity.token(), state.pages.archived(&notices, &patients)?))
    })
    .await
}

/// `GET /archive/<username>`
pub async fn archive(raw_username: String, state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, _) = pass!(gate(clinic, token.as_deref(), Some(Role::Consultant)));
        let username = decode_segment(&raw_username);

        let notice = match clinic.archive_patient(&username) {
            Ok(()) => Notice::success(format!("Paciente {} arquivado com sucesso.", username)),
            Err(e) => {
                error!(username = %username, error = %e, "Archive failed");
                Notice::error("Erro ao arquivar o paciente.")
            }
        };
        redirect_with(clinic, &identity, "/dashboard", notice)
    })
    .await
}

/// `GET /restore/<username>`
pub async fn restore(raw_username: String, state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, _) = pass!(gate(clinic, token.as_deref(), Some(Role::Consultant)));
        let username = decode_segment(&raw_username);

        let notice = match clinic.restore_patient(&username) {
            Ok(()) => Notice::success(format!("Paciente {} restaurado com sucesso.", username)),
            Err(e) => {
                error!(username = %username, error = %e, "Restore failed");
                Notice::error("Erro ao restaurar o paciente.")
            }
        };
        redirect_with(clinic, &identity, "/archived", notice)
    })
    .await
}

/// `GET /edit/<username>`
pub async fn edit_plan(raw_username: String, state: AppState, token: Option<String>) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, _) = pass!(gate(clinic, token.as_deref(), Some(Role::Consultant)));
        let username = decode_segment(&raw_username);

        let editable = match clinic.load_report_for_editing(&username)? {
            Some(editable) => editable,
            None => return unknown_patient(clinic, &identity, &username),
        };
        if let Some(reason) = &editable.load_error {
            clinic.push_notice(
                identity.token(),
                Notice::error(format!("Erro ao carregar dados existentes: {}", reason)),
            )?;
        }

        let notices = clinic.take_notices(identity.token())?;
        Ok(html(
            identity.token(),
            state.pages.edit_plan(&notices, &username, &editable.report)?,
        ))
    })
    .await
}

/// `POST /save_plan/<username>`
pub async fn save_plan(
    raw_username: String,
    state: AppState,
    token: Option<String>,
    form: HashMap<String, String>,
) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, _) = pass!(gate(clinic, token.as_deref(), Some(Role::Consultant)));
        let username = decode_segment(&raw_username);

        let report = PatientReport::from_form(&form);
        match clinic.save_report(&username, &report)? {
            Some(_) => redirect_with(
                clinic,
                &identity,
                "/dashboard",
                Notice::success(format!("Plano do paciente '{}' salvo com sucesso!", username)),
            ),
            None => unknown_patient(clinic, &identity, &username),
        }
    })
    .await
}

fn unknown_patient(clinic: &Clinic, identity: &Identity, username: &str) -> WebResult<Response> {
    warn!(username = %username, "Report requested for unknown account");
    redirect_with(
        clinic,
        identity,
        "/dashboard",
        Notice::error(format!("Paciente '{}' não encontrado.", username)),
    )
}

// =========================================================================
// Patient Routes
// =========================================================================

/// `GET /view`
pub async fn view(state: AppState, token: Option<String>, if_none_match: Option<String>) -> HandlerResult {
    blocking(move || {
        let clinic = &state.clinic;
        let (identity, account) = pass!(gate(clinic, token.as_deref(), None));
        if account.is_consultant() {
            return Ok(see_other(session_cookie(identity.token()), "/dashboard"));
        }

        let published = match clinic.view_report(&account.username)? {
            Some(published) => published,
            None => return Ok(html(identity.token(), pages::PLACEHOLDER.to_string())),
        };

        let etag = format!("\"{}\"", published.digest);
        let cookie = session_cookie(identity.token());
        if if_none_match.as_deref() == Some(etag.as_str()) {
            let reply = warp::reply::with_status(warp::reply(), StatusCode::NOT_MODIFIED);
            let reply = warp::reply::with_header(reply, ETAG, etag);
            return Ok(warp::reply::with_header(reply, SET_COOKIE, cookie).into_response());
        }

        let reply = warp::reply::with_header(warp::reply::html(published.document), ETAG, etag);
        Ok(warp::reply::with_header(reply, SET_COOKIE, cookie).into_response())
    })
    .await
}

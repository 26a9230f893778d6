//! NutriPlan web server.
//!
//! # Routes
//!
//! ```text
//! GET  /                      role-based redirect
//! GET  /login  POST /login    sign in
//! GET  /logout                sign out
//! GET  /dashboard             active patients          (consultant)
//! GET  /create_patient  POST  new patient account      (consultant)
//! GET  /archived              archived patients        (consultant)
//! GET  /archive/<username>    archive a patient        (consultant)
//! GET  /restore/<username>    restore a patient        (consultant)
//! GET  /edit/<username>       report edit form         (consultant)
//! POST /save_plan/<username>  render and publish       (consultant)
//! GET  /view                  own published report     (patient)
//! ```

pub mod config;
pub mod handlers;
pub mod pages;
pub mod session;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use nutri_plan_core::Clinic;
use tracing::{error, info};
use warp::{Filter, Rejection, Reply};

pub use config::Config;
use pages::{PageResult, Pages};
use session::SESSION_COOKIE;

/// Largest accepted form body.
const FORM_LIMIT: u64 = 256 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub clinic: Arc<Clinic>,
    pub pages: Arc<Pages>,
}

impl AppState {
    /// Wrap the clinic and compile the page templates.
    pub fn new(clinic: Clinic) -> PageResult<Self> {
        Ok(Self {
            clinic: Arc::new(clinic),
            pages: Arc::new(Pages::new()?),
        })
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All application routes.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let state = with_state(state);
    let token = warp::cookie::optional::<String>(SESSION_COOKIE);
    let form = warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form::<HashMap<String, String>>());

    let index = warp::path::end()
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::index);

    let login_form = warp::path!("login")
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::login_form);

    let login_submit = warp::path!("login")
        .and(warp::post())
        .and(state.clone())
        .and(token.clone())
        .and(form.clone())
        .and_then(handlers::login_submit);

    let logout = warp::path!("logout")
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::logout);

    let dashboard = warp::path!("dashboard")
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::dashboard);

    let create_patient_form = warp::path!("create_patient")
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::create_patient_form);

    let create_patient_submit = warp::path!("create_patient")
        .and(warp::post())
        .and(state.clone())
        .and(token.clone())
        .and(form.clone())
        .and_then(handlers::create_patient_submit);

    let archived = warp::path!("archived")
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::archived);

    let archive = warp::path!("archive" / String)
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::archive);

    let restore = warp::path!("restore" / String)
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::restore);

    let edit_plan = warp::path!("edit" / String)
        .and(warp::get())
        .and(state.clone())
        .and(token.clone())
        .and_then(handlers::edit_plan);

    let save_plan = warp::path!("save_plan" / String)
        .and(warp::post())
        .and(state.clone())
        .and(token.clone())
        .and(form)
        .and_then(handlers::save_plan);

    let view = warp::path!("view")
        .and(warp::get())
        .and(state)
        .and(token)
        .and(warp::header::optional::<String>("if-none-match"))
        .and_then(handlers::view);

    index
        .or(login_form)
        .or(login_submit)
        .or(logout)
        .or(dashboard)
        .or(create_patient_form)
        .or(create_patient_submit)
        .or(archived)
        .or(archive)
        .or(restore)
        .or(edit_plan)
        .or(save_plan)
        .or(view)
        .with(warp::trace::request())
}

/// Run the HTTP server until `shutdown` resolves.
pub async fn serve(config: Config, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
    let clinic = Clinic::open(&config.database, &config.reports_dir)?;
    let state = AppState::new(clinic)?;

    spawn_session_purge(state.clone(), &config);

    let (addr, server) =
        warp::serve(routes(state)).try_bind_with_graceful_shutdown(config.bind, shutdown)?;
    info!(%addr, database = %config.database.display(), reports = %config.reports_dir.display(), "Listening");

    server.await;
    info!("Server stopped");
    Ok(())
}

fn spawn_session_purge(state: AppState, config: &Config) {
    let ttl = config.session_ttl();
    let period = config.purge_interval();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let clinic = state.clinic.clone();
            match tokio::task::spawn_blocking(move || clinic.purge_sessions(ttl)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(error = %e, "Session purge failed"),
                Err(e) => error!(error = %e, "Session purge task failed"),
            }
        }
    });
}

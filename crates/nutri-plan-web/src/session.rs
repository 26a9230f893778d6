//! Session cookie and authorization.

use nutri_plan_core::{Account, Clinic, Notice, NutriPlanResult, Role, Session};

pub const SESSION_COOKIE: &str = "nutri_session";

pub const LOGIN_REQUIRED: &str = "Por favor, faça o login para acessar esta página.";
pub const UNAUTHORIZED: &str = "Acesso não autorizado.";

/// The session of the current request and the account it is logged in as.
#[derive(Debug, Clone)]
pub struct Identity {
    pub session: Session,
    pub account: Option<Account>,
}

impl Identity {
    pub fn token(&self) -> &str {
        &self.session.token
    }
}

/// Where to send a request that may not proceed.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub location: &'static str,
    pub notice: Option<Notice>,
}

impl Redirect {
    pub fn to(location: &'static str) -> Self {
        Self {
            location,
            notice: None,
        }
    }

    pub fn with_notice(location: &'static str, notice: Notice) -> Self {
        Self {
            location,
            notice: Some(notice),
        }
    }
}

/// Resolve the cookie token into a session, issuing a new anonymous one
/// when the token is absent or unknown.
pub fn resolve(clinic: &Clinic, token: Option<&str>) -> NutriPlanResult<Identity> {
    let session = match token {
        Some(token) => clinic.resume_session(token)?,
        None => None,
    };
    let session = match session {
        Some(session) => session,
        None => clinic.start_session()?,
    };

    let account = clinic.current_account(&session)?;
    Ok(Identity { session, account })
}

/// Require a logged-in account, and with `required` set, a specific role.
pub fn authorize(identity: &Identity, required: Option<Role>) -> Result<Account, Redirect> {
    let account = match &identity.account {
        Some(account) => account,
        None => return Err(Redirect::with_notice("/login", Notice::error(LOGIN_REQUIRED))),
    };

    match required {
        Some(role) if account.role != role => {
            Err(Redirect::with_notice("/login", Notice::error(UNAUTHORIZED)))
        }
        _ => Ok(account.clone()),
    }
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str) -> String {
    format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE, token)
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_cookie() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

//! Account models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What an account is allowed to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Manages accounts and authors reports
    Consultant,
    /// May only view their own report
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consultant => "consultant",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Accepts the stored names plus the labels used by legacy account files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "consultant" | "nutricionista" => Ok(Role::Consultant),
            "patient" | "paciente" => Ok(Role::Patient),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Account lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Archived,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(AccountStatus::Active),
            "archived" => Ok(AccountStatus::Archived),
            other => Err(format!("Unknown account status: {}", other)),
        }
    }
}

/// A login identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    /// Unique login name, also names the patient's report file
    pub username: String,
    /// Stored as submitted; compared verbatim at login
    pub password: String,
    pub role: Role,
    pub status: AccountStatus,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Account {
    /// A new active patient account.
    pub fn new_patient(username: String, password: String) -> Self {
        Self::new(username, password, Role::Patient)
    }

    /// A new active consultant account.
    pub fn new_consultant(username: String, password: String) -> Self {
        Self::new(username, password, Role::Consultant)
    }

    fn new(username: String, password: String, role: Role) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            username,
            password,
            role,
            status: AccountStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_consultant(&self) -> bool {
        self.role == Role::Consultant
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Exact, case-sensitive comparison.
    pub fn password_matches(&self, submitted: &str) -> bool {
        self.password == submitted
    }
}

/// Check that a username can safely name a report file.
///
/// Returns a user-facing reason on rejection.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Nome de usuário e senha são obrigatórios.".into());
    }
    if username.starts_with('.')
        || username.contains('/')
        || username.contains('\\')
        || username.chars().any(char::is_control)
    {
        return Err(format!(
            "O nome de usuário '{}' contém caracteres inválidos.",
            username
        ));
    }
    Ok(())
}

//! Session models.

use serde::{Deserialize, Serialize};

/// Severity of a one-shot notice shown on the next page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Error => "error",
        }
    }
}

/// A message queued on a session and consumed when rendered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A browser session, anonymous until login binds a username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Random token carried in the session cookie
    pub token: String,
    /// Bound account, if logged in
    pub username: Option<String>,
    /// Pending notices
    pub notices: Vec<Notice>,
    /// Creation timestamp
    pub created_at: String,
    /// Last request timestamp
    pub last_seen: String,
}

impl Session {
    /// A fresh anonymous session.
    pub fn new() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            username: None,
            notices: Vec::new(),
            created_at: now.clone(),
            last_seen: now,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

//! Session database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Notice, Session};

impl Database {
    /// Insert a new session.
    pub fn insert_session(&self, session: &Session) -> DbResult<()> {
        let notices_json = serde_json::to_string(&session.notices)?;

        self.conn.execute(
            r#"
            INSERT INTO sessions (token, username, notices, created_at, last_seen)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                session.token,
                session.username,
                notices_json,
                session.created_at,
                session.last_seen,
            ],
        )?;
        Ok(())
    }

    /// Get a session by token.
    pub fn get_session(&self, token: &str) -> DbResult<Option<Session>> {
        self.conn
            .query_row(
                r#"
                SELECT token, username, notices, created_at, last_seen
                FROM sessions
                WHERE token = ?
                "#,
                [token],
                |row| {
                    Ok(SessionRow {
                        token: row.get(0)?,
                        username: row.get(1)?,
                        notices: row.get(2)?,
                        created_at: row.get(3)?,
                        last_seen: row.get(4)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Record activity on a session.
    pub fn touch_session(&self, token: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE sessions SET last_seen = ?2 WHERE token = ?1",
            params![token, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Bind a session to a username under a fresh token.
    ///
    /// The old token stops working; pending notices carry over.
    pub fn bind_session(&self, token: &str, username: &str) -> DbResult<Session> {
        let tx = self.conn.unchecked_transaction()?;

        let previous = self
            .get_session(token)?
            .ok_or_else(|| DbError::NotFound(format!("session {}", token)))?;

        let mut bound = Session::new();
        bound.username = Some(username.to_string());
        bound.notices = previous.notices;

        tx.execute("DELETE FROM sessions WHERE token = ?", [token])?;
        self.insert_session(&bound)?;
        tx.commit()?;

        Ok(bound)
    }

    /// Queue a notice on a session.
    pub fn push_notice(&self, token: &str, notice: &Notice) -> DbResult<bool> {
        let notice_json = serde_json::to_string(notice)?;
        let rows_affected = self.conn.execute(
            "UPDATE sessions SET notices = json_insert(notices, '$[#]', json(?2)) WHERE token = ?1",
            params![token, notice_json],
        )?;
        Ok(rows_affected > 0)
    }

    /// Remove and return all pending notices of a session.
    pub fn take_notices(&self, token: &str) -> DbResult<Vec<Notice>> {
        let tx = self.conn.unchecked_transaction()?;

        let raw: Option<String> = tx
            .query_row("SELECT notices FROM sessions WHERE token = ?", [token], |row| {
                row.get(0)
            })
            .optional()?;

        let notices = match raw {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };

        if !notices.is_empty() {
            tx.execute("UPDATE sessions SET notices = '[]' WHERE token = ?", [token])?;
        }
        tx.commit()?;

        Ok(notices)
    }

    /// Delete a session.
    pub fn delete_session(&self, token: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?", [token])?;
        Ok(rows_affected > 0)
    }

    /// Delete sessions not seen since `cutoff` (RFC 3339). Returns the count removed.
    pub fn purge_sessions_idle_since(&self, cutoff: &str) -> DbResult<usize> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM sessions WHERE last_seen < ?", [cutoff])?;
        Ok(rows_affected)
    }
}

/// Intermediate row struct for database mapping.
struct SessionRow {
    token: String,
    username: Option<String>,
    notices: String,
    created_at: String,
    last_seen: String,
}

impl TryFrom<SessionRow> for Session {
    type Error = DbError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let notices: Vec<Notice> = serde_json::from_str(&row.notices)?;

        Ok(Session {
            token: row.token,
            username: row.username,
            notices,
            created_at: row.created_at,
            last_seen: row.last_seen,
        })
    }
}

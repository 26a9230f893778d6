//! Account database operations.

use rusqlite::{params, ErrorCode, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Account, AccountStatus, Role};

impl Database {
    /// Insert a new account.
    ///
    /// Fails with [`DbError::Duplicate`] if the username is taken.
    pub fn insert_account(&self, account: &Account) -> DbResult<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO accounts (
                username, password, role, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                account.username,
                account.password,
                account.role.as_str(),
                account.status.as_str(),
                account.created_at,
                account.updated_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::Duplicate(account.username.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert an account, or reset password/role/status if it exists.
    pub fn upsert_account(&self, account: &Account) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO accounts (
                username, password, role, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(username) DO UPDATE SET
                password = excluded.password,
                role = excluded.role,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
            params![
                account.username,
                account.password,
                account.role.as_str(),
                account.status.as_str(),
                account.created_at,
                account.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an account by username (exact match).
    pub fn get_account(&self, username: &str) -> DbResult<Option<Account>> {
        self.conn
            .query_row(
                r#"
                SELECT username, password, role, status, created_at, updated_at
                FROM accounts
                WHERE username = ?
                "#,
                [username],
                AccountRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List accounts with the given role and status, in insertion order.
    pub fn list_accounts(&self, role: Role, status: AccountStatus) -> DbResult<Vec<Account>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT username, password, role, status, created_at, updated_at
            FROM accounts
            WHERE role = ?1 AND status = ?2
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map(params![role.as_str(), status.as_str()], AccountRow::from_row)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?.try_into()?);
        }
        Ok(accounts)
    }

    /// List every account, in insertion order.
    pub fn list_all_accounts(&self) -> DbResult<Vec<Account>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT username, password, role, status, created_at, updated_at
            FROM accounts
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map([], AccountRow::from_row)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?.try_into()?);
        }
        Ok(accounts)
    }

    /// Change the status of one patient account. Returns false if no
    /// patient matched; consultant rows are never touched.
    pub fn set_patient_status(&self, username: &str, status: AccountStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE accounts SET status = ?2, updated_at = ?3 WHERE username = ?1 AND role = ?4",
            params![
                username,
                status.as_str(),
                chrono::Utc::now().to_rfc3339(),
                Role::Patient.as_str()
            ],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct AccountRow {
    username: String,
    password: String,
    role: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl AccountRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            username: row.get(0)?,
            password: row.get(1)?,
            role: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = DbError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(DbError::Constraint)?;
        let status = row
            .status
            .parse::<AccountStatus>()
            .map_err(DbError::Constraint)?;

        Ok(Account {
            username: row.username,
            password: row.password,
            role,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

//! CSV account files.
//!
//! Layout: a header row naming `username,password,role,status` (in any
//! order) followed by one account per row. Legacy files use the role labels
//! `nutricionista`/`paciente` and may lack the `status` column.

use thiserror::Error;
use tracing::{info, warn};

use crate::db::{Database, DbError};
use crate::models::{validate_username, Account, AccountStatus, Role};

const HEADER: &str = "username,password,role,status";

/// Account file errors.
#[derive(Error, Debug)]
pub enum AccountFileError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Missing column: {0}")]
    MissingColumn(&'static str),

    #[error("Empty account file")]
    Empty,

    #[error("Unterminated quoted field")]
    UnterminatedQuote,
}

pub type AccountFileResult<T> = Result<T, AccountFileError>;

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    /// Usernames inserted
    pub imported: Vec<String>,
    /// Usernames already present, left untouched
    pub skipped: Vec<String>,
    /// Rows that could not be read: (row number, reason)
    pub rejected: Vec<(usize, String)>,
}

/// Import accounts from CSV, skipping usernames that already exist.
pub fn import_accounts(db: &Database, csv: &str) -> AccountFileResult<ImportSummary> {
    let mut rows = parse_csv(csv)?.into_iter();
    let header = rows.next().ok_or(AccountFileError::Empty)?;

    let column = |name: &'static str| header.iter().position(|h| h.trim() == name);
    let username_col = column("username").ok_or(AccountFileError::MissingColumn("username"))?;
    let password_col = column("password").ok_or(AccountFileError::MissingColumn("password"))?;
    let role_col = column("role").ok_or(AccountFileError::MissingColumn("role"))?;
    let status_col = column("status");

    let mut summary = ImportSummary::default();
    for (index, row) in rows.enumerate() {
        // Row 1 is the header.
        let row_number = index + 2;
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let get = |col: usize| row.get(col).map(String::as_str).unwrap_or("");
        let account = match account_from_fields(
            get(username_col),
            get(password_col),
            get(role_col),
            status_col.map(get).unwrap_or(""),
        ) {
            Ok(account) => account,
            Err(reason) => {
                warn!(row = row_number, reason = %reason, "Rejected account row");
                summary.rejected.push((row_number, reason));
                continue;
            }
        };

        match db.insert_account(&account) {
            Ok(()) => summary.imported.push(account.username),
            Err(DbError::Duplicate(username)) => summary.skipped.push(username),
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        imported = summary.imported.len(),
        skipped = summary.skipped.len(),
        rejected = summary.rejected.len(),
        "Imported accounts"
    );
    Ok(summary)
}

fn account_from_fields(
    username: &str,
    password: &str,
    role: &str,
    status: &str,
) -> Result<Account, String> {
    validate_username(username)?;
    if password.is_empty() {
        return Err(format!("Account '{}' has no password", username));
    }
    let role: Role = role.parse()?;
    let status = if status.trim().is_empty() {
        AccountStatus::Active
    } else {
        status.parse()?
    };

    let mut account = match role {
        Role::Consultant => Account::new_consultant(username.to_string(), password.to_string()),
        Role::Patient => Account::new_patient(username.to_string(), password.to_string()),
    };
    account.status = status;
    Ok(account)
}

/// Export every account, in insertion order.
pub fn export_accounts(db: &Database) -> AccountFileResult<String> {
    let accounts = db.list_all_accounts()?;
    Ok(accounts_to_csv(&accounts))
}

/// Render accounts in the import layout.
pub fn accounts_to_csv(accounts: &[Account]) -> String {
    let mut csv = String::new();

    csv.push_str(HEADER);
    csv.push('\n');

    for account in accounts {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            escape_csv(&account.username),
            escape_csv(&account.password),
            account.role.as_str(),
            account.status.as_str(),
        ));
    }

    csv
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Split CSV text into rows of fields. Quoted fields may hold commas,
/// doubled quotes and line breaks.
fn parse_csv(text: &str) -> AccountFileResult<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(AccountFileError::UnterminatedQuote);
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_csv_quotes() {
        let rows = parse_csv("a,\"b,c\",\"d \"\"e\"\"\"\r\nx,\"multi\nline\",\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["a", "b,c", "d \"e\""]);
        assert_eq!(rows[1], vec!["x", "multi\nline", ""]);
    }

    #[test]
    fn test_parse_csv_without_trailing_newline() {
        let rows = parse_csv("a,b\nc,d").unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_parse_csv_unterminated() {
        assert!(matches!(
            parse_csv("a,\"oops\n"),
            Err(AccountFileError::UnterminatedQuote)
        ));
    }

    #[test]
    fn test_import_legacy_file() {
        let db = Database::open_in_memory().unwrap();
        let csv = "username,password,role,status\n\
                   admin,admin123,nutricionista,active\n\
                   ana,senha,paciente,active\n\
                   bruno,1234,paciente,archived\n";

        let summary = import_accounts(&db, csv).unwrap();
        assert_eq!(summary.imported, vec!["admin", "ana", "bruno"]);
        assert!(summary.skipped.is_empty());

        let admin = db.get_account("admin").unwrap().unwrap();
        assert_eq!(admin.role, Role::Consultant);
        let bruno = db.get_account("bruno").unwrap().unwrap();
        assert_eq!(bruno.status, AccountStatus::Archived);
    }

    #[test]
    fn test_import_without_status_column() {
        let db = Database::open_in_memory().unwrap();
        let csv = "role,username,password\npaciente,ana,senha\n";

        import_accounts(&db, csv).unwrap();
        let ana = db.get_account("ana").unwrap().unwrap();
        assert_eq!(ana.status, AccountStatus::Active);
        assert_eq!(ana.password, "senha");
    }

    #[test]
    fn test_import_skips_existing_and_rejects_bad_rows() {
        let db = Database::open_in_memory().unwrap();
        db.insert_account(&Account::new_patient("ana".into(), "original".into()))
            .unwrap();

        let csv = "username,password,role,status\n\
                   ana,changed,paciente,active\n\
                   ../x,pw,paciente,active\n\
                   carla,pw,chef,active\n\
                   \n\
                   dora,pw,patient,\n";

        let summary = import_accounts(&db, csv).unwrap();
        assert_eq!(summary.imported, vec!["dora"]);
        assert_eq!(summary.skipped, vec!["ana"]);
        assert_eq!(summary.rejected.len(), 2);
        assert_eq!(summary.rejected[0].0, 3);
        assert_eq!(summary.rejected[1].0, 4);

        assert_eq!(db.get_account("ana").unwrap().unwrap().password, "original");
    }

    #[test]
    fn test_import_missing_column() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            import_accounts(&db, "username,role\nana,paciente\n"),
            Err(AccountFileError::MissingColumn("password"))
        ));
        assert!(matches!(
            import_accounts(&db, ""),
            Err(AccountFileError::Empty)
        ));
    }

    #[test]
    fn test_export_then_import() {
        let source = Database::open_in_memory().unwrap();
        source
            .insert_account(&Account::new_consultant("admin".into(), "a,b".into()))
            .unwrap();
        let mut archived = Account::new_patient("ana".into(), "quote\"d".into());
        archived.status = AccountStatus::Archived;
        source.insert_account(&archived).unwrap();

        let csv = export_accounts(&source).unwrap();
        assert!(csv.starts_with("username,password,role,status\n"));
        assert!(csv.contains("admin,\"a,b\",consultant,active\n"));

        let target = Database::open_in_memory().unwrap();
        import_accounts(&target, &csv).unwrap();
        let ana = target.get_account("ana").unwrap().unwrap();
        assert_eq!(ana.password, "quote\"d");
        assert_eq!(ana.status, AccountStatus::Archived);
    }
}

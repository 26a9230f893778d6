//! NutriPlan Core Library
//!
//! Patient accounts and per-patient nutritional report publishing.
//!
//! # Architecture
//!
//! ```text
//!  Edit form ──► PatientReport ──► Renderer ──► <username>.html
//!                     ▲                              │
//!                     │                        data island
//!                     │                              │
//!                Migration ◄──── schema_version ◄────┘
//!
//!  accounts ─┬─ sessions (cookie token, notices)
//!            └─ publications (digest of the last saved document)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite repository for accounts, sessions and publications
//! - [`models`]: Domain types (Account, Session, PatientReport, etc.)
//! - [`report`]: Report rendering, parsing, migration and file storage
//! - [`export`]: CSV account import/export

pub mod db;
pub mod export;
pub mod models;
pub mod report;

// Re-export commonly used types
pub use db::Database;
pub use export::{AccountFileError, ImportSummary};
pub use models::{
    Account, AccountStatus, Notice, NoticeLevel, PatientReport, Publication, Role, Session,
};
pub use report::{MigrationOutcome, ReportError, ReportStore};

use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use db::DbError;
use models::validate_username;

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum NutriPlanError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Account file error: {0}")]
    AccountFile(#[from] AccountFileError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl<T> From<std::sync::PoisonError<T>> for NutriPlanError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        NutriPlanError::Lock(e.to_string())
    }
}

pub type NutriPlanResult<T> = Result<T, NutriPlanError>;

// =========================================================================
// Operation Outcomes
// =========================================================================

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Credentials accepted; the session was re-issued under a new token.
    Accepted { session: Session, account: Account },
    /// Unknown user, wrong password or archived account.
    Rejected,
}

/// Result of creating a patient account.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Account),
    /// Blank field or a username that cannot name a report file
    Invalid(String),
    Duplicate(String),
}

/// An active patient as listed on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSummary {
    pub account: Account,
    /// Last saved report, if any
    pub publication: Option<Publication>,
}

/// A report prepared for the edit form.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableReport {
    /// Always has 12 evolution slots and 3 goals
    pub report: PatientReport,
    /// Set when a published document existed but could not be read
    pub load_error: Option<String>,
}

/// A published document ready to serve.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedReport {
    pub document: String,
    /// SHA-256 of the document, hex encoded
    pub digest: String,
}

/// What a `migrate-reports` run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationSummary {
    pub upgraded: Vec<String>,
    pub current: usize,
    pub failed: Vec<(String, String)>,
}

/// Consultation date default for a report that has never been saved.
pub fn today() -> String {
    chrono::Local::now().format("%d/%m/%Y").to_string()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe entry point used by every request handler.
pub struct Clinic {
    db: Mutex<Database>,
    reports: ReportStore,
}

impl Clinic {
    /// Open or create the database and report directory.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(db_path: P, reports_dir: Q) -> NutriPlanResult<Self> {
        let db = Database::open(db_path)?;
        let reports = ReportStore::open(reports_dir)?;
        Ok(Self {
            db: Mutex::new(db),
            reports,
        })
    }

    /// In-memory database with reports on disk (for testing).
    pub fn open_in_memory<Q: AsRef<Path>>(reports_dir: Q) -> NutriPlanResult<Self> {
        let db = Database::open_in_memory()?;
        let reports = ReportStore::open(reports_dir)?;
        Ok(Self {
            db: Mutex::new(db),
            reports,
        })
    }

    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Issue a new anonymous session.
    pub fn start_session(&self) -> NutriPlanResult<Session> {
        let db = self.db.lock()?;
        let session = Session::new();
        db.insert_session(&session)?;
        debug!(token = %session.token, "Started session");
        Ok(session)
    }

    /// Look up a session by its cookie token and record the visit.
    pub fn resume_session(&self, token: &str) -> NutriPlanResult<Option<Session>> {
        let db = self.db.lock()?;
        let session = db.get_session(token)?;
        if session.is_some() {
            db.touch_session(token)?;
        }
        Ok(session)
    }

    /// The account a session is logged in as.
    ///
    /// Sessions of accounts that no longer exist or were archived resolve
    /// to no account.
    pub fn current_account(&self, session: &Session) -> NutriPlanResult<Option<Account>> {
        let username = match session.username.as_deref() {
            Some(username) => username,
            None => return Ok(None),
        };
        let db = self.db.lock()?;
        Ok(db.get_account(username)?.filter(Account::is_active))
    }

    /// Exact-match credential check. Archived accounts are refused.
    pub fn authenticate(&self, username: &str, password: &str) -> NutriPlanResult<Option<Account>> {
        let db = self.db.lock()?;
        let account = db
            .get_account(username)?
            .filter(|account| account.password_matches(password) && account.is_active());
        Ok(account)
    }

    /// Check credentials and bind the session to the account.
    pub fn login(&self, token: &str, username: &str, password: &str) -> NutriPlanResult<LoginOutcome> {
        let account = match self.authenticate(username, password)? {
            Some(account) => account,
            None => {
                info!(username = %username, "Login rejected");
                return Ok(LoginOutcome::Rejected);
            }
        };

        let db = self.db.lock()?;
        let session = match db.bind_session(token, &account.username) {
            Ok(session) => session,
            // The anonymous session expired between page load and submit.
            Err(DbError::NotFound(_)) => {
                let mut session = Session::new();
                session.username = Some(account.username.clone());
                db.insert_session(&session)?;
                session
            }
            Err(e) => return Err(e.into()),
        };

        info!(username = %account.username, role = %account.role, "Login accepted");
        Ok(LoginOutcome::Accepted { session, account })
    }

    /// End a session.
    pub fn logout(&self, token: &str) -> NutriPlanResult<()> {
        let db = self.db.lock()?;
        db.delete_session(token)?;
        Ok(())
    }

    /// Queue a notice for the next rendered page of a session.
    pub fn push_notice(&self, token: &str, notice: Notice) -> NutriPlanResult<()> {
        let db = self.db.lock()?;
        if !db.push_notice(token, &notice)? {
            debug!(token = %token, "Dropped notice for unknown session");
        }
        Ok(())
    }

    /// Consume the pending notices of a session.
    pub fn take_notices(&self, token: &str) -> NutriPlanResult<Vec<Notice>> {
        let db = self.db.lock()?;
        Ok(db.take_notices(token)?)
    }

    /// Delete sessions idle for longer than `ttl`.
    pub fn purge_sessions(&self, ttl: chrono::Duration) -> NutriPlanResult<usize> {
        let Some(cutoff) = chrono::Utc::now().checked_sub_signed(ttl) else {
            return Ok(0);
        };
        let cutoff = cutoff.to_rfc3339();
        let db = self.db.lock()?;
        let purged = db.purge_sessions_idle_since(&cutoff)?;
        if purged > 0 {
            info!(purged, "Purged idle sessions");
        }
        Ok(purged)
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    pub fn account(&self, username: &str) -> NutriPlanResult<Option<Account>> {
        let db = self.db.lock()?;
        Ok(db.get_account(username)?)
    }

    /// A patient account by username. Consultants resolve to `None`.
    pub fn patient(&self, username: &str) -> NutriPlanResult<Option<Account>> {
        Ok(self
            .account(username)?
            .filter(|account| account.role == Role::Patient))
    }

    /// Active patients with their last publication, in creation order.
    pub fn active_patients(&self) -> NutriPlanResult<Vec<PatientSummary>> {
        let db = self.db.lock()?;
        let accounts = db.list_accounts(Role::Patient, AccountStatus::Active)?;

        let mut summaries = Vec::with_capacity(accounts.len());
        for account in accounts {
            let publication = db.get_publication(&account.username)?;
            summaries.push(PatientSummary {
                account,
                publication,
            });
        }
        Ok(summaries)
    }

    /// Archived patients, in creation order.
    pub fn archived_patients(&self) -> NutriPlanResult<Vec<Account>> {
        let db = self.db.lock()?;
        Ok(db.list_accounts(Role::Patient, AccountStatus::Archived)?)
    }

    /// Create an active patient account.
    pub fn create_patient(&self, username: &str, password: &str) -> NutriPlanResult<CreateOutcome> {
        if username.is_empty() || password.is_empty() {
            return Ok(CreateOutcome::Invalid(
                "Nome de usuário e senha são obrigatórios.".into(),
            ));
        }
        if let Err(reason) = validate_username(username) {
            return Ok(CreateOutcome::Invalid(reason));
        }

        let account = Account::new_patient(username.to_string(), password.to_string());
        let db = self.db.lock()?;
        match db.insert_account(&account) {
            Ok(()) => {
                info!(username = %username, "Created patient");
                Ok(CreateOutcome::Created(account))
            }
            Err(DbError::Duplicate(username)) => Ok(CreateOutcome::Duplicate(username)),
            Err(e) => Err(e.into()),
        }
    }

    /// Archive a patient. Unknown usernames are a no-op.
    pub fn archive_patient(&self, username: &str) -> NutriPlanResult<()> {
        self.set_status(username, AccountStatus::Archived)
    }

    /// Reactivate an archived patient. Unknown usernames are a no-op.
    pub fn restore_patient(&self, username: &str) -> NutriPlanResult<()> {
        self.set_status(username, AccountStatus::Active)
    }

    fn set_status(&self, username: &str, status: AccountStatus) -> NutriPlanResult<()> {
        let db = self.db.lock()?;
        if db.set_patient_status(username, status)? {
            info!(username = %username, status = %status, "Changed account status");
        } else {
            warn!(username = %username, status = %status, "Status change matched no patient");
        }
        Ok(())
    }

    /// Create a consultant, or reset the password of an existing one.
    pub fn seed_consultant(&self, username: &str, password: &str) -> NutriPlanResult<Account> {
        if password.is_empty() {
            return Err(NutriPlanError::InvalidInput(
                "Nome de usuário e senha são obrigatórios.".into(),
            ));
        }
        validate_username(username).map_err(NutriPlanError::InvalidInput)?;

        let account = Account::new_consultant(username.to_string(), password.to_string());
        let db = self.db.lock()?;
        db.upsert_account(&account)?;
        info!(username = %username, "Seeded consultant");
        Ok(account)
    }

    /// Import accounts from a CSV file body.
    pub fn import_accounts(&self, csv: &str) -> NutriPlanResult<ImportSummary> {
        let db = self.db.lock()?;
        Ok(export::import_accounts(&db, csv)?)
    }

    /// Export every account as CSV.
    pub fn export_accounts(&self) -> NutriPlanResult<String> {
        let db = self.db.lock()?;
        Ok(export::export_accounts(&db)?)
    }

    // =========================================================================
    // Report Operations
    // =========================================================================

    /// Prepare a patient's report for editing.
    ///
    /// Returns `None` when no such patient exists. A published document that
    /// cannot be read yields a blank record plus the reason.
    pub fn load_report_for_editing(&self, username: &str) -> NutriPlanResult<Option<EditableReport>> {
        if self.patient(username)?.is_none() {
            return Ok(None);
        }

        let blank = || PatientReport::blank_for(username, &today());
        let (report, load_error) = match self.reports.load(username) {
            Ok(Some(report)) => (report, None),
            Ok(None) => (blank(), None),
            Err(ReportError::Io(e)) => return Err(ReportError::Io(e).into()),
            Err(e) => {
                warn!(username = %username, error = %e, "Could not read published report");
                (blank(), Some(e.to_string()))
            }
        };

        Ok(Some(EditableReport {
            report: report.into_editable(),
            load_error,
        }))
    }

    /// Render and publish a report. Returns `None` when no such patient exists.
    pub fn save_report(&self, username: &str, report: &PatientReport) -> NutriPlanResult<Option<Publication>> {
        if self.patient(username)?.is_none() {
            return Ok(None);
        }

        let (_, publication) = self.reports.save(username, report)?;
        let db = self.db.lock()?;
        db.record_publication(&publication)?;
        Ok(Some(publication))
    }

    /// The published document of a patient, if any.
    pub fn view_report(&self, username: &str) -> NutriPlanResult<Option<PublishedReport>> {
        Ok(self
            .reports
            .read_document(username)?
            .map(|document| PublishedReport {
                digest: models::document_digest(&document),
                document,
            }))
    }

    /// Rewrite every published document that embeds an older data contract.
    pub fn migrate_reports(&self) -> NutriPlanResult<MigrationSummary> {
        let mut summary = MigrationSummary::default();

        for username in self.reports.list_usernames()? {
            let (outcome, publication) = self.reports.migrate(&username)?;
            match outcome {
                MigrationOutcome::Upgraded { from } => {
                    info!(username = %username, from, "Upgraded report");
                    if let Some(publication) = publication {
                        let db = self.db.lock()?;
                        if db.get_account(&username)?.is_some() {
                            db.record_publication(&publication)?;
                        }
                    }
                    summary.upgraded.push(username);
                }
                MigrationOutcome::Current => summary.current += 1,
                MigrationOutcome::Failed(reason) => {
                    warn!(username = %username, reason = %reason, "Report left unchanged");
                    summary.failed.push((username, reason));
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn clinic() -> (TempDir, Clinic) {
        let dir = TempDir::new().unwrap();
        let clinic = Clinic::open_in_memory(dir.path().join("reports")).unwrap();
        (dir, clinic)
    }

    #[test]
    fn test_login_rotates_token_and_keeps_notices() {
        let (_dir, clinic) = clinic();
        clinic.create_patient("ana", "senha").unwrap();

        let anonymous = clinic.start_session().unwrap();
        clinic
            .push_notice(&anonymous.token, Notice::error("antes"))
            .unwrap();

        let outcome = clinic.login(&anonymous.token, "ana", "senha").unwrap();
        let session = match outcome {
            LoginOutcome::Accepted { session, account } => {
                assert_eq!(account.username, "ana");
                session
            }
            LoginOutcome::Rejected => panic!("login should succeed"),
        };

        assert_ne!(session.token, anonymous.token);
        assert!(clinic.resume_session(&anonymous.token).unwrap().is_none());
        let notices = clinic.take_notices(&session.token).unwrap();
        assert_eq!(notices, vec![Notice::error("antes")]);
    }

    #[test]
    fn test_login_rejections() {
        let (_dir, clinic) = clinic();
        clinic.create_patient("ana", "senha").unwrap();
        let session = clinic.start_session().unwrap();

        assert_eq!(
            clinic.login(&session.token, "ana", "SENHA").unwrap(),
            LoginOutcome::Rejected
        );
        assert_eq!(
            clinic.login(&session.token, "Ana", "senha").unwrap(),
            LoginOutcome::Rejected
        );
        assert_eq!(
            clinic.login(&session.token, "nobody", "x").unwrap(),
            LoginOutcome::Rejected
        );

        clinic.archive_patient("ana").unwrap();
        assert_eq!(
            clinic.login(&session.token, "ana", "senha").unwrap(),
            LoginOutcome::Rejected
        );
    }

    #[test]
    fn test_login_with_expired_session() {
        let (_dir, clinic) = clinic();
        clinic.seed_consultant("admin", "admin123").unwrap();

        let outcome = clinic.login("gone", "admin", "admin123").unwrap();
        assert!(matches!(outcome, LoginOutcome::Accepted { .. }));
    }

    #[test]
    fn test_current_account_drops_archived() {
        let (_dir, clinic) = clinic();
        clinic.create_patient("ana", "senha").unwrap();
        let anonymous = clinic.start_session().unwrap();
        assert!(clinic.current_account(&anonymous).unwrap().is_none());

        let session = match clinic.login(&anonymous.token, "ana", "senha").unwrap() {
            LoginOutcome::Accepted { session, .. } => session,
            LoginOutcome::Rejected => panic!("login should succeed"),
        };
        assert!(clinic.current_account(&session).unwrap().is_some());

        clinic.archive_patient("ana").unwrap();
        assert!(clinic.current_account(&session).unwrap().is_none());
    }

    #[test]
    fn test_create_patient_validation() {
        let (_dir, clinic) = clinic();

        assert_eq!(
            clinic.create_patient("", "x").unwrap(),
            CreateOutcome::Invalid("Nome de usuário e senha são obrigatórios.".into())
        );
        assert_eq!(
            clinic.create_patient("ana", "").unwrap(),
            CreateOutcome::Invalid("Nome de usuário e senha são obrigatórios.".into())
        );
        assert!(matches!(
            clinic.create_patient("../ana", "x").unwrap(),
            CreateOutcome::Invalid(_)
        ));
    }

    #[test]
    fn test_seed_consultant_resets_password() {
        let (_dir, clinic) = clinic();
        clinic.seed_consultant("admin", "one").unwrap();
        clinic.seed_consultant("admin", "two").unwrap();

        assert!(clinic.authenticate("admin", "one").unwrap().is_none());
        let admin = clinic.authenticate("admin", "two").unwrap().unwrap();
        assert!(admin.is_consultant());
        assert!(clinic.seed_consultant("admin", "").is_err());
    }

    #[test]
    fn test_purge_sessions() {
        let (_dir, clinic) = clinic();
        let session = clinic.start_session().unwrap();

        assert_eq!(clinic.purge_sessions(chrono::Duration::hours(1)).unwrap(), 0);
        assert_eq!(clinic.purge_sessions(chrono::Duration::seconds(-1)).unwrap(), 1);
        assert!(clinic.resume_session(&session.token).unwrap().is_none());

        clinic.start_session().unwrap();
        assert_eq!(clinic.purge_sessions(chrono::Duration::weeks(1_000_000_000)).unwrap(), 0);
    }

    #[test]
    fn test_edit_and_save_refuse_unknown_account() {
        let (_dir, clinic) = clinic();
        assert!(clinic.load_report_for_editing("ghost").unwrap().is_none());
        assert!(clinic
            .save_report("ghost", &PatientReport::default())
            .unwrap()
            .is_none());
        assert!(clinic.view_report("ghost").unwrap().is_none());
    }

    #[test]
    fn test_consultant_is_not_a_patient() {
        let (_dir, clinic) = clinic();
        clinic.seed_consultant("admin", "pw").unwrap();

        clinic.archive_patient("admin").unwrap();
        clinic.restore_patient("admin").unwrap();
        clinic.archive_patient("admin").unwrap();

        let admin = clinic.account("admin").unwrap().unwrap();
        assert_eq!(admin.status, AccountStatus::Active);
        assert!(clinic.authenticate("admin", "pw").unwrap().is_some());
        assert!(clinic.archived_patients().unwrap().is_empty());

        assert!(clinic.patient("admin").unwrap().is_none());
        assert!(clinic.load_report_for_editing("admin").unwrap().is_none());
        assert!(clinic
            .save_report("admin", &PatientReport::default())
            .unwrap()
            .is_none());
        assert!(clinic.view_report("admin").unwrap().is_none());
    }

    #[test]
    fn test_save_records_publication() {
        let (_dir, clinic) = clinic();
        clinic.create_patient("ana", "senha").unwrap();

        let publication = clinic
            .save_report("ana", &PatientReport::blank_for("ana", "01/01/2026"))
            .unwrap()
            .unwrap();

        let view = clinic.view_report("ana").unwrap().unwrap();
        assert_eq!(view.digest, publication.digest);

        let dashboard = clinic.active_patients().unwrap();
        assert_eq!(dashboard.len(), 1);
        assert_eq!(dashboard[0].publication.as_ref(), Some(&publication));
    }

    #[test]
    fn test_unreadable_report_yields_blank_record() {
        let (_dir, clinic) = clinic();
        clinic.create_patient("ana", "senha").unwrap();
        clinic
            .reports()
            .write_document("ana", "<html>corrupted</html>")
            .unwrap();

        let editable = clinic.load_report_for_editing("ana").unwrap().unwrap();
        assert!(editable.load_error.is_some());
        assert_eq!(editable.report.name, "ana");
        assert_eq!(editable.report.evolution.len(), 12);
    }
}

//! Report store: one HTML document per patient username.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::models::{validate_username, PatientReport, Publication, SCHEMA_VERSION};

use super::{parse_document, render_report, ReportError, ReportResult};

const DOCUMENT_EXTENSION: &str = "html";

/// Directory of published report documents.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

/// Outcome of rewriting one document to the current contract.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    Upgraded { from: u64 },
    Current,
    Failed(String),
}

impl ReportStore {
    /// Open the store, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> ReportResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a patient's document. Rejects usernames that would escape the directory.
    pub fn path_for(&self, username: &str) -> ReportResult<PathBuf> {
        validate_username(username).map_err(ReportError::InvalidUsername)?;
        Ok(self
            .dir
            .join(format!("{}.{}", username, DOCUMENT_EXTENSION)))
    }

    /// Raw document, or `None` when nothing has been published.
    pub fn read_document(&self, username: &str) -> ReportResult<Option<String>> {
        let path = self.path_for(username)?;
        match fs::read_to_string(&path) {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a document. Writes a sibling file and renames it into place.
    pub fn write_document(&self, username: &str, document: &str) -> ReportResult<()> {
        let path = self.path_for(username)?;
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", username, DOCUMENT_EXTENSION));
        fs::write(&tmp, document)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(username = %username, bytes = document.len(), "Wrote report document");
        Ok(())
    }

    /// Render and publish a report.
    ///
    /// Returns the written document and its publication record.
    pub fn save(&self, username: &str, report: &PatientReport) -> ReportResult<(String, Publication)> {
        let mut report = report.clone();
        report.compact_evolution();
        report.schema_version = SCHEMA_VERSION;

        let document = render_report(&report)?;
        self.write_document(username, &document)?;

        let publication = Publication::for_document(username, &document, SCHEMA_VERSION);
        info!(username = %username, digest = %publication.digest, "Published report");
        Ok((document, publication))
    }

    /// Parse a published report, or `None` when nothing has been published.
    pub fn load(&self, username: &str) -> ReportResult<Option<PatientReport>> {
        match self.read_document(username)? {
            Some(document) => Ok(Some(parse_document(&document)?)),
            None => Ok(None),
        }
    }

    /// Usernames with a published document, sorted.
    pub fn list_usernames(&self) -> ReportResult<Vec<String>> {
        let mut usernames = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_username(stem).is_ok() {
                    usernames.push(stem.to_string());
                }
            }
        }
        usernames.sort();
        Ok(usernames)
    }

    /// Rewrite one document if it embeds an older contract.
    pub fn migrate(&self, username: &str) -> ReportResult<(MigrationOutcome, Option<Publication>)> {
        let document = match self.read_document(username)? {
            Some(document) => document,
            None => return Ok((MigrationOutcome::Current, None)),
        };

        let from = match super::embedded_schema_version(&document) {
            Ok(version) => version,
            Err(e) => return Ok((MigrationOutcome::Failed(e.to_string()), None)),
        };
        if from >= SCHEMA_VERSION as u64 {
            return Ok((MigrationOutcome::Current, None));
        }

        let report = match parse_document(&document) {
            Ok(report) => report,
            Err(e) => {
                warn!(username = %username, error = %e, "Could not migrate report");
                return Ok((MigrationOutcome::Failed(e.to_string()), None));
            }
        };
        let (_, publication) = self.save(username, &report)?;
        Ok((MigrationOutcome::Upgraded { from }, Some(publication)))
    }
}

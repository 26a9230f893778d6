//! Report publication records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata about the last saved report document of a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Publication {
    /// Patient username
    pub username: String,
    /// SHA-256 of the document bytes, hex encoded
    pub digest: String,
    /// Data contract version embedded in the document
    pub schema_version: u32,
    /// Save timestamp
    pub published_at: String,
}

impl Publication {
    /// Describe a freshly written document.
    pub fn for_document(username: &str, document: &str, schema_version: u32) -> Self {
        Self {
            username: username.to_string(),
            digest: document_digest(document),
            schema_version,
            published_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Hex SHA-256 of a rendered document.
pub fn document_digest(document: &str) -> String {
    hex::encode(Sha256::digest(document.as_bytes()))
}

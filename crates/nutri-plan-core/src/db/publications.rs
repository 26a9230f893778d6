//! Report publication database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Publication;

impl Database {
    /// Record (or replace) the publication of a patient's report.
    pub fn record_publication(&self, publication: &Publication) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO publications (username, digest, schema_version, published_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(username) DO UPDATE SET
                digest = excluded.digest,
                schema_version = excluded.schema_version,
                published_at = excluded.published_at
            "#,
            params![
                publication.username,
                publication.digest,
                publication.schema_version,
                publication.published_at,
            ],
        )?;
        Ok(())
    }

    /// Get the last publication of a patient's report.
    pub fn get_publication(&self, username: &str) -> DbResult<Option<Publication>> {
        self.conn
            .query_row(
                r#"
                SELECT username, digest, schema_version, published_at
                FROM publications
                WHERE username = ?
                "#,
                [username],
                |row| {
                    Ok(Publication {
                        username: row.get(0)?,
                        digest: row.get(1)?,
                        schema_version: row.get(2)?,
                        published_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}

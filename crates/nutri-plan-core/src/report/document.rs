//! Reading the embedded record back out of a published document.

use serde_json::Value;

use crate::models::PatientReport;

use super::migrate::upgrade;
use super::{ReportError, ReportResult, DATA_ISLAND_ID};

/// Locate the raw JSON text of the data island.
///
/// Matches the `<script>` element by its `id`, regardless of attribute order.
pub fn extract_data_island(document: &str) -> ReportResult<&str> {
    let id_attr = format!(r#"id="{}""#, DATA_ISLAND_ID);

    let mut search_from = 0;
    while let Some(found) = document[search_from..].find("<script") {
        let tag_start = search_from + found;
        let tag_end = document[tag_start..]
            .find('>')
            .map(|i| tag_start + i)
            .ok_or(ReportError::MissingDataIsland)?;

        if document[tag_start..tag_end].contains(&id_attr) {
            let body_start = tag_end + 1;
            let body_end = document[body_start..]
                .find("</script>")
                .map(|i| body_start + i)
                .ok_or(ReportError::MissingDataIsland)?;
            return Ok(document[body_start..body_end].trim());
        }
        search_from = tag_end;
    }

    Err(ReportError::MissingDataIsland)
}

/// Parse the embedded record, migrating older data contracts.
pub fn parse_document(document: &str) -> ReportResult<PatientReport> {
    let raw = extract_data_island(document)?;
    let value: Value = serde_json::from_str(raw)?;
    let upgraded = upgrade(value)?;
    let mut report: PatientReport = serde_json::from_value(upgraded)?;
    report.compact_evolution();
    Ok(report)
}

/// Schema version of the record embedded in a document.
pub fn embedded_schema_version(document: &str) -> ReportResult<u64> {
    let raw = extract_data_island(document)?;
    let value: Value = serde_json::from_str(raw)?;
    Ok(super::migrate::schema_version_of(&value))
}

//! Report document renderer.
//!
//! Turns a [`PatientReport`] into the static page served to the patient.
//! The page embeds the full record as a JSON data island, which is both the
//! source for the evolution chart and the save format read back on edit.

use serde::Serialize;
use tera::{Context, Tera};

use crate::models::{Goal, PatientReport};

use super::{ReportResult, DATA_ISLAND_ID};

const REPORT_TEMPLATE: &str = include_str!("report_template.html");

/// Shown in place of a bioimpedance metric that was never entered.
const MISSING_METRIC: &str = "N/A";

/// Everything the report template reads. Text fields are escaped by tera;
/// only `json_data` is marked safe.
#[derive(Serialize)]
struct ReportView<'a> {
    data_island_id: &'static str,
    json_data: String,
    name: &'a str,
    details: &'a str,
    consultation_date: &'a str,
    fat_percentage: &'a str,
    muscle_mass: &'a str,
    water_percentage: &'a str,
    basal_metabolism: &'a str,
    bio_url: Option<&'a str>,
    food_plan_text: &'a str,
    plan_url: Option<&'a str>,
    errors: &'a str,
    improvements: &'a str,
    signals: Vec<&'a str>,
    substitutions_example: &'a str,
    supplements: Vec<&'a str>,
    shopping_prioritize: &'a str,
    shopping_avoid: &'a str,
    goals: Vec<&'a Goal>,
    prediction_text: &'a str,
    name_first: &'a str,
}

/// Render the complete report document.
pub fn render_report(report: &PatientReport) -> ReportResult<String> {
    let bio = &report.bioimpedance;
    let view = ReportView {
        data_island_id: DATA_ISLAND_ID,
        json_data: json_for_script(report)?,
        name: &report.name,
        details: &report.details,
        consultation_date: &report.consultation_date,
        fat_percentage: metric(&bio.fat_percentage),
        muscle_mass: metric(&bio.muscle_mass),
        water_percentage: metric(&bio.water_percentage),
        basal_metabolism: metric(&bio.basal_metabolism),
        bio_url: link(&bio.url),
        food_plan_text: &report.habits.food_plan_text,
        plan_url: link(&report.habits.url),
        errors: &report.habits.errors,
        improvements: &report.habits.improvements,
        signals: non_blank(&report.signals),
        substitutions_example: &report.plan.substitutions_example,
        supplements: non_blank(&report.plan.supplements),
        shopping_prioritize: &report.plan.shopping_prioritize,
        shopping_avoid: &report.plan.shopping_avoid,
        goals: report
            .goals
            .iter()
            .filter(|goal| !goal.text.trim().is_empty())
            .collect(),
        prediction_text: &report.results.prediction_text,
        name_first: report.first_name(),
    };

    let context = Context::from_serialize(&view)?;
    Ok(Tera::one_off(REPORT_TEMPLATE, &context, true)?)
}

/// Serialize the record so it can sit inside a `<script>` element.
///
/// `<`, `>` and `&` only occur inside JSON strings, where their `\u` escapes
/// decode to the same text.
pub fn json_for_script(report: &PatientReport) -> ReportResult<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

fn metric(value: &Option<String>) -> &str {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => v,
        _ => MISSING_METRIC,
    }
}

fn link(url: &Option<String>) -> Option<&str> {
    url.as_deref().map(str::trim).filter(|u| !u.is_empty())
}

fn non_blank(entries: &[String]) -> Vec<&str> {
    entries
        .iter()
        .map(String::as_str)
        .filter(|entry| !entry.trim().is_empty())
        .collect()
}

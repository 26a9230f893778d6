//! Building a report from submitted edit-form fields.

use std::collections::HashMap;

use crate::models::{
    Bioimpedance, EvolutionEntry, Goal, Habits, PatientReport, Plan, Results, EVOLUTION_MONTHS,
    GOAL_COUNT, SCHEMA_VERSION,
};

/// Form field value as entered, or empty when absent.
fn field<'a>(form: &'a HashMap<String, String>, key: &str) -> &'a str {
    form.get(key).map(String::as_str).unwrap_or("")
}

/// `None` for absent or whitespace-only fields.
fn optional(form: &HashMap<String, String>, key: &str) -> Option<String> {
    let value = field(form, key).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// One entry per non-blank line, trimmed.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl PatientReport {
    /// Build a report from the edit form.
    ///
    /// Free-text fields are kept exactly as entered. A month of evolution
    /// is kept only when at least one of its metrics is filled in.
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        let goals: [Goal; GOAL_COUNT] = std::array::from_fn(|i| Goal {
            text: field(form, &format!("goal_text_{}", i)).to_string(),
            completed: field(form, &format!("goal_completed_{}", i)) == "on",
        });

        let evolution = (1..=EVOLUTION_MONTHS)
            .map(|month| EvolutionEntry {
                month,
                fat: optional(form, &format!("evo_fat_{}", month)),
                muscle: optional(form, &format!("evo_muscle_{}", month)),
                water: optional(form, &format!("evo_water_{}", month)),
                metabolism: optional(form, &format!("evo_metabolism_{}", month)),
            })
            .filter(|entry| !entry.is_blank())
            .collect();

        Self {
            schema_version: SCHEMA_VERSION,
            name: field(form, "name").to_string(),
            details: field(form, "details").to_string(),
            consultation_date: field(form, "consultation_date").to_string(),
            bioimpedance: Bioimpedance {
                fat_percentage: optional(form, "fat_percentage"),
                muscle_mass: optional(form, "muscle_mass"),
                water_percentage: optional(form, "water_percentage"),
                basal_metabolism: optional(form, "basal_metabolism"),
                url: optional(form, "bioimpedance_url"),
            },
            habits: Habits {
                food_plan_text: field(form, "food_plan_text").to_string(),
                errors: field(form, "errors").to_string(),
                improvements: field(form, "improvements").to_string(),
                url: optional(form, "food_plan_url"),
            },
            signals: split_lines(field(form, "signals")),
            plan: Plan {
                substitutions_example: field(form, "substitutions_example").to_string(),
                supplements: split_lines(field(form, "supplements")),
                shopping_prioritize: field(form, "shopping_prioritize").to_string(),
                shopping_avoid: field(form, "shopping_avoid").to_string(),
            },
            results: Results {
                prediction_text: field(form, "prediction_text").to_string(),
            },
            goals,
            evolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_form() {
        let report = PatientReport::from_form(&HashMap::new());
        assert_eq!(report.name, "");
        assert_eq!(report.bioimpedance, Bioimpedance::default());
        assert!(report.signals.is_empty());
        assert_eq!(report.goals.len(), GOAL_COUNT);
        assert!(report.evolution.is_empty());
    }

    #[test]
    fn test_header_and_metrics() {
        let report = PatientReport::from_form(&form(&[
            ("name", "Ana Silva"),
            ("details", "32 anos"),
            ("consultation_date", "10/03/2026"),
            ("fat_percentage", "22"),
            ("muscle_mass", "  "),
            ("bioimpedance_url", "https://example.com/bio.pdf"),
        ]));

        assert_eq!(report.name, "Ana Silva");
        assert_eq!(report.details, "32 anos");
        assert_eq!(report.bioimpedance.fat_percentage.as_deref(), Some("22"));
        assert_eq!(report.bioimpedance.muscle_mass, None);
        assert_eq!(
            report.bioimpedance.url.as_deref(),
            Some("https://example.com/bio.pdf")
        );
    }

    #[test]
    fn test_line_lists() {
        let report = PatientReport::from_form(&form(&[
            ("signals", "Inchaço\r\n\r\n  Cansaço \n"),
            ("supplements", "Creatina"),
        ]));
        assert_eq!(report.signals, vec!["Inchaço", "Cansaço"]);
        assert_eq!(report.plan.supplements, vec!["Creatina"]);
    }

    #[test]
    fn test_goals() {
        let report = PatientReport::from_form(&form(&[
            ("goal_text_0", "Beber água"),
            ("goal_completed_0", "on"),
            ("goal_text_1", "Dormir bem"),
            ("goal_completed_1", "off"),
            ("goal_text_3", "ignored"),
        ]));
        assert!(report.goals[0].completed);
        assert_eq!(report.goals[1].text, "Dormir bem");
        assert!(!report.goals[1].completed);
        assert_eq!(report.goals[2], Goal::default());
    }

    #[test]
    fn test_evolution_keeps_filled_months() {
        let report = PatientReport::from_form(&form(&[
            ("evo_fat_1", "22"),
            ("evo_muscle_1", ""),
            ("evo_water_2", "  "),
            ("evo_metabolism_7", "1500"),
            ("evo_fat_13", "99"),
        ]));

        let months: Vec<u8> = report.evolution.iter().map(|e| e.month).collect();
        assert_eq!(months, vec![1, 7]);
        assert_eq!(report.evolution[0].fat.as_deref(), Some("22"));
        assert_eq!(report.evolution[0].muscle, None);
        assert_eq!(report.evolution[1].metabolism.as_deref(), Some("1500"));
    }
}

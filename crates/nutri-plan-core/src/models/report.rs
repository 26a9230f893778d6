//! Patient report models.
//!
//! A [`PatientReport`] is serialized verbatim into the data island of the
//! published document, so field names here are the wire contract.

use serde::{Deserialize, Serialize};

/// Version of the embedded data contract written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Number of goal slots on every report.
pub const GOAL_COUNT: usize = 3;

/// Number of monthly evolution slots exposed for editing.
pub const EVOLUTION_MONTHS: u8 = 12;

/// The structured nutritional-consultation record for one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatientReport {
    /// Data contract version (absent in legacy documents)
    pub schema_version: u32,
    /// Patient display name
    pub name: String,
    /// Free-text header details (age, sport, ...)
    pub details: String,
    /// Display-only consultation date
    pub consultation_date: String,
    pub bioimpedance: Bioimpedance,
    pub habits: Habits,
    /// Body-signal observations, in display order
    pub signals: Vec<String>,
    pub plan: Plan,
    pub results: Results,
    /// Fixed-width checklist; embedded lists of other lengths are padded or cut on load
    pub goals: [Goal; GOAL_COUNT],
    /// Monthly snapshots; only non-blank months are persisted
    pub evolution: Vec<EvolutionEntry>,
}

impl Default for PatientReport {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: String::new(),
            details: String::new(),
            consultation_date: String::new(),
            bioimpedance: Bioimpedance::default(),
            habits: Habits::default(),
            signals: Vec::new(),
            plan: Plan::default(),
            results: Results::default(),
            goals: Default::default(),
            evolution: Vec::new(),
        }
    }
}

/// Bioimpedance metrics. Values are kept as entered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Bioimpedance {
    pub fat_percentage: Option<String>,
    pub muscle_mass: Option<String>,
    pub water_percentage: Option<String>,
    pub basal_metabolism: Option<String>,
    /// Link to the detailed analysis document
    pub url: Option<String>,
}

/// Eating habits and routine analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Habits {
    pub food_plan_text: String,
    pub errors: String,
    pub improvements: String,
    /// Link to the full food plan document
    pub url: Option<String>,
}

/// Nutritional plan section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Plan {
    pub substitutions_example: String,
    pub supplements: Vec<String>,
    pub shopping_prioritize: String,
    pub shopping_avoid: String,
}

/// Expected results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Results {
    pub prediction_text: String,
}

/// A progress checklist entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Goal {
    pub text: String,
    pub completed: bool,
}

/// One month of body-composition tracking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvolutionEntry {
    /// 1..=12
    pub month: u8,
    pub fat: Option<String>,
    pub muscle: Option<String>,
    pub water: Option<String>,
    pub metabolism: Option<String>,
}

impl EvolutionEntry {
    /// A placeholder month with no metrics.
    pub fn blank(month: u8) -> Self {
        Self {
            month,
            ..Default::default()
        }
    }

    /// True when no metric carries a non-whitespace value.
    pub fn is_blank(&self) -> bool {
        [&self.fat, &self.muscle, &self.water, &self.metabolism]
            .iter()
            .all(|m| m.as_deref().map_or(true, |v| v.trim().is_empty()))
    }
}

impl PatientReport {
    /// Empty report for a patient who has never had one saved.
    pub fn blank_for(username: &str, today: &str) -> Self {
        Self {
            name: username.to_string(),
            consultation_date: today.to_string(),
            ..Default::default()
        }
    }

    /// First whitespace-delimited token of the name, for the closing line.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    /// Drop blank and out-of-range months and order the rest by month.
    ///
    /// When a month appears twice the later entry wins.
    pub fn compact_evolution(&mut self) {
        let mut kept: Vec<EvolutionEntry> = Vec::with_capacity(self.evolution.len());
        for entry in self.evolution.drain(..) {
            if entry.is_blank() || entry.month == 0 || entry.month > EVOLUTION_MONTHS {
                continue;
            }
            kept.retain(|e| e.month != entry.month);
            kept.push(entry);
        }
        kept.sort_by_key(|e| e.month);
        self.evolution = kept;
    }

    /// Exactly twelve month slots, blank where nothing was recorded.
    pub fn evolution_slots(&self) -> Vec<EvolutionEntry> {
        (1..=EVOLUTION_MONTHS)
            .map(|month| {
                self.evolution
                    .iter()
                    .rev()
                    .find(|e| e.month == month)
                    .cloned()
                    .unwrap_or_else(|| EvolutionEntry::blank(month))
            })
            .collect()
    }

    /// Expand into the shape the edit form works with.
    pub fn into_editable(mut self) -> Self {
        self.evolution = self.evolution_slots();
        self
    }
}

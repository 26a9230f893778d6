//! Data contract migration.
//!
//! Documents published before the contract was versioned carry no
//! `schema_version` and are treated as version 0. They may hold `null`
//! for missing values, newline-separated strings where lists are now
//! expected, a goal list of any length and months written as strings.
//!
//! Goal lists of any version are padded or cut to [`GOAL_COUNT`].

use serde_json::{Map, Value};

use crate::models::{GOAL_COUNT, SCHEMA_VERSION};

use super::{ReportError, ReportResult};

const OPTIONAL_BIO_FIELDS: [&str; 5] = [
    "fat_percentage",
    "muscle_mass",
    "water_percentage",
    "basal_metabolism",
    "url",
];

const EVOLUTION_METRICS: [&str; 4] = ["fat", "muscle", "water", "metabolism"];

/// Schema version recorded in a raw record. Absent means legacy (0).
pub fn schema_version_of(value: &Value) -> u64 {
    value
        .get("schema_version")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Bring a raw record up to the current contract.
pub fn upgrade(value: Value) -> ReportResult<Value> {
    let version = schema_version_of(&value);
    if version > SCHEMA_VERSION as u64 {
        return Err(ReportError::UnsupportedVersion(version));
    }
    if !value.is_object() {
        return Err(ReportError::Malformed(
            "embedded record is not an object".into(),
        ));
    }

    let mut value = value;
    if version == 0 {
        value = upgrade_v0(value)?;
    }
    // The form always edits exactly GOAL_COUNT goals, whatever the version.
    if let Some(goals) = value.get_mut("goals") {
        if goals.is_array() {
            *goals = fixed_goals(goals.take())?;
        }
    }
    Ok(value)
}

fn upgrade_v0(value: Value) -> ReportResult<Value> {
    let mut root = match strip_nulls(value) {
        Value::Object(map) => map,
        _ => return Err(ReportError::Malformed("embedded record is not an object".into())),
    };

    if let Some(Value::Object(bio)) = root.get_mut("bioimpedance") {
        drop_blank_strings(bio, &OPTIONAL_BIO_FIELDS);
    }
    if let Some(Value::Object(habits)) = root.get_mut("habits") {
        drop_blank_strings(habits, &["url"]);
    }

    if let Some(signals) = root.get_mut("signals") {
        *signals = into_line_list(signals.take());
    }
    if let Some(Value::Object(plan)) = root.get_mut("plan") {
        if let Some(supplements) = plan.get_mut("supplements") {
            *supplements = into_line_list(supplements.take());
        }
    }

    if let Some(goals) = root.get("goals") {
        if !goals.is_array() {
            return Err(ReportError::Malformed("goals is not a list".into()));
        }
    }

    if let Some(evolution) = root.get_mut("evolution") {
        *evolution = upgrade_evolution(evolution.take())?;
    }

    root.insert("schema_version".into(), Value::from(1u64));
    Ok(Value::Object(root))
}

/// Remove `null` members so serde defaults apply.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}

fn drop_blank_strings(map: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        let blank = matches!(map.get(*key), Some(Value::String(s)) if s.trim().is_empty());
        if blank {
            map.remove(*key);
        }
    }
}

fn into_line_list(value: Value) -> Value {
    match value {
        Value::String(text) => Value::Array(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| Value::String(line.to_string()))
                .collect(),
        ),
        other => other,
    }
}

fn fixed_goals(value: Value) -> ReportResult<Value> {
    let mut goals = match value {
        Value::Array(items) => items,
        _ => return Err(ReportError::Malformed("goals is not a list".into())),
    };
    goals.truncate(GOAL_COUNT);
    while goals.len() < GOAL_COUNT {
        goals.push(Value::Object(Map::new()));
    }
    Ok(Value::Array(goals))
}

fn upgrade_evolution(value: Value) -> ReportResult<Value> {
    let entries = match value {
        Value::Array(items) => items,
        _ => return Err(ReportError::Malformed("evolution is not a list".into())),
    };

    let mut upgraded = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut entry = match entry {
            Value::Object(map) => map,
            _ => return Err(ReportError::Malformed("evolution entry is not an object".into())),
        };

        if let Some(Value::String(month)) = entry.get("month") {
            let parsed: u64 = month
                .trim()
                .parse()
                .map_err(|_| ReportError::Malformed(format!("invalid month: {}", month)))?;
            entry.insert("month".into(), Value::from(parsed));
        }

        for metric in EVOLUTION_METRICS {
            if let Some(Value::Number(n)) = entry.get(metric) {
                let text = n.to_string();
                entry.insert(metric.into(), Value::String(text));
            }
        }
        drop_blank_strings(&mut entry, &EVOLUTION_METRICS);

        upgraded.push(Value::Object(entry));
    }
    Ok(Value::Array(upgraded))
}

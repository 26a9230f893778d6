//! Account and report workflow integration tests.

use std::collections::HashMap;

use nutri_plan_core::models::{EvolutionEntry, Goal, PatientReport, SCHEMA_VERSION};
use nutri_plan_core::report::{embedded_schema_version, parse_document, render_report};
use nutri_plan_core::{AccountStatus, Clinic, CreateOutcome, Role};
use proptest::prelude::*;
use tempfile::TempDir;

fn clinic() -> (TempDir, Clinic) {
    let dir = TempDir::new().unwrap();
    let clinic = Clinic::open(dir.path().join("nutri.db"), dir.path().join("reports")).unwrap();
    (dir, clinic)
}

fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn full_form() -> HashMap<String, String> {
    form(&[
        ("name", "Ana Silva"),
        ("details", "32 anos, corredora"),
        ("consultation_date", "10/03/2026"),
        ("fat_percentage", "22"),
        ("muscle_mass", "48"),
        ("water_percentage", "55"),
        ("basal_metabolism", "1450"),
        ("bioimpedance_url", "https://example.com/bio.pdf"),
        ("food_plan_text", "Café da manhã reforçado"),
        ("errors", "Pula o almoço"),
        ("improvements", "Mais proteína"),
        ("food_plan_url", "https://example.com/plano.pdf"),
        ("signals", "Inchaço\nCansaço à tarde"),
        ("substitutions_example", "Arroz por quinoa"),
        ("supplements", "Creatina\nÔmega 3"),
        ("shopping_prioritize", "Frutas"),
        ("shopping_avoid", "Ultraprocessados"),
        ("prediction_text", "Redução de 3% de gordura"),
        ("goal_text_0", "Beber 3L de água"),
        ("goal_completed_0", "on"),
        ("goal_text_1", "Dormir 8h"),
        ("goal_text_2", "Treinar 4x"),
        ("goal_completed_2", "on"),
        ("evo_fat_1", "24"),
        ("evo_muscle_1", "46"),
        ("evo_fat_3", "22"),
        ("evo_metabolism_3", "1450"),
    ])
}

#[test]
fn test_save_then_edit_recovers_form() {
    let (_dir, clinic) = clinic();
    clinic.create_patient("ana", "senha").unwrap();

    let submitted = PatientReport::from_form(&full_form());
    clinic.save_report("ana", &submitted).unwrap().unwrap();

    let editable = clinic.load_report_for_editing("ana").unwrap().unwrap();
    assert!(editable.load_error.is_none());
    assert_eq!(editable.report.evolution.len(), 12);
    assert_eq!(editable.report, submitted.clone().into_editable());

    // Saving the editable view unchanged produces the same record.
    clinic.save_report("ana", &editable.report).unwrap();
    let again = clinic.load_report_for_editing("ana").unwrap().unwrap();
    assert_eq!(again.report, editable.report);
}

#[test]
fn test_ana_silva_without_evolution() {
    let (_dir, clinic) = clinic();
    clinic.create_patient("ana", "senha").unwrap();

    let report = PatientReport::from_form(&form(&[
        ("name", "Ana Silva"),
        ("fat_percentage", "22"),
    ]));
    clinic.save_report("ana", &report).unwrap();

    let document = clinic.view_report("ana").unwrap().unwrap().document;
    assert!(document.contains("Vamos juntos, Ana!"));
    assert!(document.contains(">22%</span>"));

    let parsed = parse_document(&document).unwrap();
    assert!(parsed.evolution.is_empty());

    let editable = clinic.load_report_for_editing("ana").unwrap().unwrap();
    assert_eq!(editable.report.evolution.len(), 12);
    assert!(editable.report.evolution.iter().all(EvolutionEntry::is_blank));
    assert_eq!(editable.report.goals.len(), 3);
}

#[test]
fn test_never_saved_report_defaults() {
    let (_dir, clinic) = clinic();
    clinic.create_patient("bruno", "senha").unwrap();

    let editable = clinic.load_report_for_editing("bruno").unwrap().unwrap();
    assert_eq!(editable.report.name, "bruno");
    assert_eq!(editable.report.consultation_date, nutri_plan_core::today());
    assert_eq!(editable.report.evolution.len(), 12);
    assert!(editable.load_error.is_none());
    assert!(clinic.view_report("bruno").unwrap().is_none());
}

#[test]
fn test_duplicate_username() {
    let (_dir, clinic) = clinic();

    assert!(matches!(
        clinic.create_patient("ana", "one").unwrap(),
        CreateOutcome::Created(_)
    ));
    assert_eq!(
        clinic.create_patient("ana", "two").unwrap(),
        CreateOutcome::Duplicate("ana".into())
    );

    let patients = clinic.active_patients().unwrap();
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0].account.password, "one");

    // Usernames are case-sensitive.
    assert!(matches!(
        clinic.create_patient("Ana", "three").unwrap(),
        CreateOutcome::Created(_)
    ));
}

#[test]
fn test_archive_then_restore() {
    let (_dir, clinic) = clinic();
    clinic.create_patient("ana", "senha").unwrap();
    let before = clinic.account("ana").unwrap().unwrap();

    clinic.archive_patient("ana").unwrap();
    assert_eq!(
        clinic.account("ana").unwrap().unwrap().status,
        AccountStatus::Archived
    );

    clinic.restore_patient("ana").unwrap();
    let after = clinic.account("ana").unwrap().unwrap();
    assert_eq!(after.status, AccountStatus::Active);
    assert_eq!(after.username, before.username);
    assert_eq!(after.password, before.password);
    assert_eq!(after.role, before.role);
    assert_eq!(after.created_at, before.created_at);

    // Unknown usernames are a silent no-op.
    clinic.archive_patient("ghost").unwrap();
    assert!(clinic.account("ghost").unwrap().is_none());
}

#[test]
fn test_list_filters() {
    let (_dir, clinic) = clinic();
    clinic.seed_consultant("admin", "admin123").unwrap();
    for name in ["ana", "bruno", "carla"] {
        clinic.create_patient(name, "senha").unwrap();
    }
    clinic.archive_patient("bruno").unwrap();

    let active: Vec<String> = clinic
        .active_patients()
        .unwrap()
        .into_iter()
        .map(|p| p.account.username)
        .collect();
    assert_eq!(active, vec!["ana", "carla"]);

    let archived = clinic.archived_patients().unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].username, "bruno");
    assert!(archived.iter().all(|a| a.role == Role::Patient));
}

#[test]
fn test_script_text_escaped_and_round_trips() {
    let (_dir, clinic) = clinic();
    clinic.create_patient("ana", "senha").unwrap();

    let hostile = "<script>alert('x')</script>";
    let mut report = PatientReport::blank_for("ana", "01/01/2026");
    report.details = hostile.into();
    report.habits.errors = hostile.into();
    report.signals = vec![hostile.into()];
    report.goals[0].text = hostile.into();
    clinic.save_report("ana", &report).unwrap();

    let document = clinic.view_report("ana").unwrap().unwrap().document;
    assert!(!document.contains(hostile));
    assert!(document.contains("&lt;script&gt;"));

    let editable = clinic.load_report_for_editing("ana").unwrap().unwrap();
    assert_eq!(editable.report.details, hostile);
    assert_eq!(editable.report.habits.errors, hostile);
    assert_eq!(editable.report.signals, vec![hostile]);
    assert_eq!(editable.report.goals[0].text, hostile);
}

const LEGACY_DOCUMENT: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <script id="patient-data" type="application/json">
        {
            "name": "Carla Souza",
            "details": "28 anos",
            "consultation_date": "05/01/2025",
            "bioimpedance": {"fat_percentage": "30", "muscle_mass": null, "url": ""},
            "habits": {"food_plan_text": "Lanches", "errors": null, "improvements": "", "url": null},
            "signals": ["Inchaço", ""],
            "plan": {"supplements": [""]},
            "results": {"prediction_text": null},
            "goals": [{"text": "Caminhar", "completed": false}],
            "evolution": [{"month": 2, "fat": "30", "muscle": "", "water": null, "metabolism": ""}]
        }
    </script>
</head>
<body></body>
</html>"#;

#[test]
fn test_legacy_document_loads_for_editing() {
    let (_dir, clinic) = clinic();
    clinic.create_patient("carla", "senha").unwrap();
    clinic
        .reports()
        .write_document("carla", LEGACY_DOCUMENT)
        .unwrap();

    let editable = clinic.load_report_for_editing("carla").unwrap().unwrap();
    assert!(editable.load_error.is_none());

    let report = editable.report;
    assert_eq!(report.name, "Carla Souza");
    assert_eq!(report.bioimpedance.fat_percentage.as_deref(), Some("30"));
    assert_eq!(report.bioimpedance.muscle_mass, None);
    assert_eq!(report.bioimpedance.url, None);
    assert_eq!(report.habits.errors, "");
    assert_eq!(report.goals[0].text, "Caminhar");
    assert_eq!(report.goals[1], Goal::default());
    assert_eq!(report.evolution.len(), 12);
    assert_eq!(report.evolution[1].fat.as_deref(), Some("30"));
    assert_eq!(report.evolution[1].muscle, None);
}

#[test]
fn test_migrate_reports_rewrites_legacy_once() {
    let (_dir, clinic) = clinic();
    clinic.create_patient("carla", "senha").unwrap();
    clinic.create_patient("ana", "senha").unwrap();
    clinic
        .reports()
        .write_document("carla", LEGACY_DOCUMENT)
        .unwrap();
    clinic
        .save_report("ana", &PatientReport::blank_for("ana", "01/01/2026"))
        .unwrap();

    let summary = clinic.migrate_reports().unwrap();
    assert_eq!(summary.upgraded, vec!["carla"]);
    assert_eq!(summary.current, 1);
    assert!(summary.failed.is_empty());

    let document = clinic.view_report("carla").unwrap().unwrap().document;
    assert_eq!(
        embedded_schema_version(&document).unwrap(),
        SCHEMA_VERSION as u64
    );
    let patients = clinic.active_patients().unwrap();
    assert!(patients.iter().all(|p| p.publication.is_some()));

    let summary = clinic.migrate_reports().unwrap();
    assert!(summary.upgraded.is_empty());
    assert_eq!(summary.current, 2);
}

#[test]
fn test_import_and_export_accounts() {
    let (_dir, clinic) = clinic();
    let csv = "username,password,role,status\n\
               admin,admin123,nutricionista,active\n\
               ana,senha,paciente,active\n\
               bruno,senha,paciente,archived\n";

    let summary = clinic.import_accounts(csv).unwrap();
    assert_eq!(summary.imported.len(), 3);
    assert!(clinic.authenticate("admin", "admin123").unwrap().is_some());
    assert_eq!(clinic.archived_patients().unwrap().len(), 1);

    let exported = clinic.export_accounts().unwrap();
    assert!(exported.contains("admin,admin123,consultant,active\n"));
    assert!(exported.contains("bruno,senha,patient,archived\n"));

    let again = clinic.import_accounts(&exported).unwrap();
    assert!(again.imported.is_empty());
    assert_eq!(again.skipped.len(), 3);
}

fn metric() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[0-9]{1,3}(\\.[0-9])?")
}

fn evolution_entry() -> impl Strategy<Value = EvolutionEntry> {
    (1u8..=12, metric(), metric(), metric(), metric()).prop_map(
        |(month, fat, muscle, water, metabolism)| EvolutionEntry {
            month,
            fat,
            muscle,
            water,
            metabolism,
        },
    )
}

fn goal() -> impl Strategy<Value = Goal> {
    (any::<String>(), any::<bool>()).prop_map(|(text, completed)| Goal { text, completed })
}

fn patient_report() -> impl Strategy<Value = PatientReport> {
    (
        (any::<String>(), any::<String>(), any::<String>()),
        (prop::option::of(any::<String>()), metric()),
        prop::collection::vec(any::<String>(), 0..5),
        prop::collection::vec(any::<String>(), 0..5),
        (any::<String>(), any::<String>()),
        prop::array::uniform3(goal()),
        prop::collection::vec(evolution_entry(), 0..15),
    )
        .prop_map(
            |((name, details, date), (url, fat), signals, supplements, (errors, prediction), goals, evolution)| {
                let mut report = PatientReport::default();
                report.name = name;
                report.details = details;
                report.consultation_date = date;
                report.bioimpedance.url = url;
                report.bioimpedance.fat_percentage = fat;
                report.signals = signals;
                report.plan.supplements = supplements;
                report.habits.errors = errors;
                report.results.prediction_text = prediction;
                report.goals = goals;
                report.evolution = evolution;
                report.compact_evolution();
                report
            },
        )
}

proptest! {
    #[test]
    fn prop_render_then_parse_recovers_record(report in patient_report()) {
        let document = render_report(&report).unwrap();
        let parsed = parse_document(&document).unwrap();
        prop_assert_eq!(parsed, report);
    }
}

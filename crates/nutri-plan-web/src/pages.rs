//! HTML pages of the consultant and patient interface.
//!
//! Templates live in `templates/` and are compiled into the binary. Tera
//! escapes every value; only the percent-encoded paths built by
//! [`user_path`] are marked safe.

use nutri_plan_core::models::{Account, Notice, PatientReport, Publication};
use nutri_plan_core::PatientSummary;
use serde::Serialize;
use tera::{Context, Tera};

/// Served to a patient whose report has not been written yet.
pub const PLACEHOLDER: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head><meta charset="UTF-8"><title>Aguardando Plano</title></head>
<body style="font-family: sans-serif; background-color: #111827; color: #e5e7eb; display: flex; align-items: center; justify-content: center; height: 100vh; text-align: center;">
    <div>
        <h1>Aguardando Plano</h1>
        <p>Seu plano nutricional ainda não foi gerado pelo nutricionista.</p>
        <a href="/logout" style="color: #3b82f6; margin-top: 20px; display: inline-block;">Sair</a>
    </div>
</body>
</html>
"#;

/// Shown when a request fails for reasons the user cannot fix.
pub const SERVER_ERROR: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head><meta charset="UTF-8"><title>Erro</title></head>
<body style="font-family: sans-serif; background-color: #111827; color: #e5e7eb; display: flex; align-items: center; justify-content: center; height: 100vh; text-align: center;">
    <div>
        <h1>Erro interno</h1>
        <p>Não foi possível concluir a operação. Tente novamente mais tarde.</p>
        <a href="/" style="color: #3b82f6; margin-top: 20px; display: inline-block;">Voltar</a>
    </div>
</body>
</html>
"#;

pub type PageResult<T> = Result<T, tera::Error>;

/// One patient row of the dashboard or archived list.
#[derive(Serialize)]
struct PatientRow<'a> {
    username: &'a str,
    published_at: Option<&'a str>,
    digest: Option<&'a str>,
    edit_path: String,
    archive_path: String,
    restore_path: String,
}

impl<'a> PatientRow<'a> {
    fn new(account: &'a Account, publication: Option<&'a Publication>) -> Self {
        let username = account.username.as_str();
        Self {
            username,
            published_at: publication.map(|p| p.published_at.as_str()),
            digest: publication.map(|p| p.digest.get(..12).unwrap_or(p.digest.as_str())),
            edit_path: user_path("/edit", username),
            archive_path: user_path("/archive", username),
            restore_path: user_path("/restore", username),
        }
    }
}

#[derive(Serialize)]
struct Field {
    name: &'static str,
    label: &'static str,
    value: String,
    multiline: bool,
}

impl Field {
    fn input(name: &'static str, label: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            label,
            value: value.into(),
            multiline: false,
        }
    }

    fn textarea(name: &'static str, label: &'static str, value: impl Into<String>) -> Self {
        Self {
            multiline: true,
            ..Self::input(name, label, value)
        }
    }
}

#[derive(Serialize)]
struct Section {
    title: &'static str,
    columns: &'static str,
    span: &'static str,
    fields: Vec<Field>,
}

#[derive(Serialize)]
struct Cell {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct EvolutionRow {
    month: u8,
    cells: Vec<Cell>,
}

/// The compiled page templates.
pub struct Pages {
    tera: Tera,
}

impl Pages {
    pub fn new() -> PageResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("../templates/layout.html")),
            ("login.html", include_str!("../templates/login.html")),
            ("dashboard.html", include_str!("../templates/dashboard.html")),
            ("create_patient.html", include_str!("../templates/create_patient.html")),
            ("archived.html", include_str!("../templates/archived.html")),
            ("edit_plan.html", include_str!("../templates/edit_plan.html")),
        ])?;
        Ok(Self { tera })
    }

    fn render(&self, template: &str, notices: &[Notice], mut context: Context) -> PageResult<String> {
        context.insert("notices", notices);
        self.tera.render(template, &context)
    }

    pub fn login(&self, notices: &[Notice]) -> PageResult<String> {
        self.render("login.html", notices, Context::new())
    }

    pub fn create_patient(&self, notices: &[Notice]) -> PageResult<String> {
        self.render("create_patient.html", notices, Context::new())
    }

    pub fn dashboard(&self, notices: &[Notice], patients: &[PatientSummary]) -> PageResult<String> {
        let rows: Vec<PatientRow> = patients
            .iter()
            .map(|p| PatientRow::new(&p.account, p.publication.as_ref()))
            .collect();
        let mut context = Context::new();
        context.insert("patients", &rows);
        self.render("dashboard.html", notices, context)
    }

    pub fn archived(&self, notices: &[Notice], patients: &[Account]) -> PageResult<String> {
        let rows: Vec<PatientRow> = patients.iter().map(|a| PatientRow::new(a, None)).collect();
        let mut context = Context::new();
        context.insert("patients", &rows);
        self.render("archived.html", notices, context)
    }

    pub fn edit_plan(&self, notices: &[Notice], username: &str, report: &PatientReport) -> PageResult<String> {
        let bio = &report.bioimpedance;
        let habits = &report.habits;
        let plan = &report.plan;
        let optional = |value: &Option<String>| value.clone().unwrap_or_default();

        let sections = vec![
            Section {
                title: "Cabeçalho",
                columns: "sm:grid-cols-3",
                span: "sm:col-span-3",
                fields: vec![
                    Field::input("name", "Nome", &report.name),
                    Field::input("details", "Detalhes", &report.details),
                    Field::input("consultation_date", "Data da Consulta", &report.consultation_date),
                ],
            },
            Section {
                title: "Bioimpedância",
                columns: "sm:grid-cols-2",
                span: "sm:col-span-2",
                fields: vec![
                    Field::input("fat_percentage", "Gordura Corporal (%)", optional(&bio.fat_percentage)),
                    Field::input("muscle_mass", "Massa Muscular (kg)", optional(&bio.muscle_mass)),
                    Field::input("water_percentage", "Água Corporal (%)", optional(&bio.water_percentage)),
                    Field::input("basal_metabolism", "Metabolismo Basal (kcal)", optional(&bio.basal_metabolism)),
                    Field::input("bioimpedance_url", "Link da Análise Detalhada", optional(&bio.url)),
                ],
            },
            Section {
                title: "Hábitos e Rotina",
                columns: "",
                span: "",
                fields: vec![
                    Field::textarea("food_plan_text", "Plano Alimentar", &habits.food_plan_text),
                    Field::input("food_plan_url", "Link do Plano Alimentar", optional(&habits.url)),
                    Field::textarea("errors", "Erros Identificados", &habits.errors),
                    Field::textarea("improvements", "Pontos de Melhoria", &habits.improvements),
                    Field::textarea("signals", "Sinais do Corpo (um por linha)", report.signals.join("\n")),
                ],
            },
            Section {
                title: "Plano Nutricional",
                columns: "",
                span: "",
                fields: vec![
                    Field::textarea("substitutions_example", "Exemplo de Substituições", &plan.substitutions_example),
                    Field::textarea("supplements", "Suplementos (um por linha)", plan.supplements.join("\n")),
                    Field::textarea("shopping_prioritize", "Lista de Compras: Priorizar", &plan.shopping_prioritize),
                    Field::textarea("shopping_avoid", "Lista de Compras: Evitar", &plan.shopping_avoid),
                    Field::textarea("prediction_text", "Resultados Esperados", &report.results.prediction_text),
                ],
            },
        ];

        let evolution: Vec<EvolutionRow> = report
            .evolution_slots()
            .into_iter()
            .map(|entry| {
                let month = entry.month;
                let cells = [
                    ("fat", entry.fat),
                    ("muscle", entry.muscle),
                    ("water", entry.water),
                    ("metabolism", entry.metabolism),
                ]
                .into_iter()
                .map(|(metric, value)| Cell {
                    name: format!("evo_{}_{}", metric, month),
                    value: value.unwrap_or_default(),
                })
                .collect();
                EvolutionRow { month, cells }
            })
            .collect();

        let mut context = Context::new();
        context.insert("username", username);
        context.insert("action", &user_path("/save_plan", username));
        context.insert("sections", &sections);
        context.insert("goals", &report.goals);
        context.insert("evolution", &evolution);
        self.render("edit_plan.html", notices, context)
    }
}

/// `<prefix>/<username>` with the username percent-encoded.
pub fn user_path(prefix: &str, username: &str) -> String {
    let mut path = String::with_capacity(prefix.len() + username.len() + 1);
    path.push_str(prefix);
    path.push('/');
    for byte in username.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                path.push(byte as char)
            }
            _ => path.push_str(&format!("%{:02X}", byte)),
        }
    }
    path
}

//! `nutri-plan` command-line entry point.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nutri_plan_core::Clinic;
use nutri_plan_web::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nutri-plan")]
#[command(about = "Patient accounts and nutritional report publishing", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, global = true)]
    bind: Option<SocketAddr>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Directory of published reports
    #[arg(long, global = true)]
    reports_dir: Option<PathBuf>,

    /// Idle minutes before a session expires
    #[arg(long, global = true)]
    session_ttl_minutes: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Create a consultant account, or reset its password
    SeedConsultant {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Import accounts from a `username,password,role,status` CSV file
    ImportAccounts {
        /// CSV file to read
        file: PathBuf,
    },
    /// Export all accounts as CSV
    ExportAccounts {
        /// Write here instead of standard output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rewrite published reports that embed an older data format
    MigrateReports,
}

impl Cli {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(reports_dir) = &self.reports_dir {
            config.reports_dir = reports_dir.clone();
        }
        if let Some(ttl) = self.session_ttl_minutes {
            config.session_ttl_minutes = ttl;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nutri_plan=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            nutri_plan_web::serve(config, async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down");
            })
            .await?;
        }
        Command::SeedConsultant { username, password } => {
            let clinic = open(&config)?;
            clinic.seed_consultant(&username, &password)?;
            println!("Consultant '{}' ready", username);
        }
        Command::ImportAccounts { file } => {
            let clinic = open(&config)?;
            let csv = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let summary = clinic.import_accounts(&csv)?;
            println!(
                "Imported {}, skipped {} existing, rejected {}",
                summary.imported.len(),
                summary.skipped.len(),
                summary.rejected.len()
            );
            for (row, reason) in &summary.rejected {
                eprintln!("  row {}: {}", row, reason);
            }
        }
        Command::ExportAccounts { output } => {
            let clinic = open(&config)?;
            let csv = clinic.export_accounts()?;
            match output {
                Some(path) => std::fs::write(&path, csv)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{}", csv),
            }
        }
        Command::MigrateReports => {
            let clinic = open(&config)?;
            let summary = clinic.migrate_reports()?;
            println!(
                "Upgraded {}, already current {}, failed {}",
                summary.upgraded.len(),
                summary.current,
                summary.failed.len()
            );
            for (username, reason) in &summary.failed {
                eprintln!("  {}: {}", username, reason);
            }
        }
    }

    Ok(())
}

fn open(config: &Config) -> anyhow::Result<Clinic> {
    Clinic::open(&config.database, &config.reports_dir).with_context(|| {
        format!(
            "opening {} and {}",
            config.database.display(),
            config.reports_dir.display()
        )
    })
}

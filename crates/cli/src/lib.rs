pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stencil_core::config::{AppConfig, LoadOptions, LogFormat};
use stencil_core::TolerancePreset;

#[derive(Debug, Parser)]
#[command(
    name = "stencil",
    about = "Stencil operator CLI",
    long_about = "Produce deviation-bounded responses from the template catalog, score candidate \
texts, and inspect catalog and configuration state.",
    after_help = "Examples:\n  stencil respond --department claims --template claim_processing_update \\\n      --field customer_name=\"Alex Morgan\" --field claim_number=CLM-5521\n  stencil score --standard \"Dear Alex...\" --candidate \"Hi Alex...\"\n  stencil doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Produce one response for a department template")]
    Respond {
        #[arg(long, help = "Department key from the company directory")]
        department: String,
        #[arg(long = "template", help = "Template id within the department")]
        template: String,
        #[arg(
            long = "field",
            value_name = "NAME=VALUE",
            help = "Field value for the template, repeatable"
        )]
        fields: Vec<String>,
        #[arg(long, help = "Tolerance preset for this request (strict|minimal|moderate|flexible)")]
        tolerance: Option<TolerancePreset>,
        #[arg(long, help = "Attempt budget override for this request")]
        max_attempts: Option<u32>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Score a candidate text against a standard text")]
    Score {
        #[arg(long, help = "Standard text the candidate is measured against")]
        standard: String,
        #[arg(long, help = "Candidate text to score")]
        candidate: String,
        #[arg(long, help = "Tolerance preset the verdict uses (strict|minimal|moderate|flexible)")]
        tolerance: Option<TolerancePreset>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List catalog templates, optionally for one department")]
    Templates {
        #[arg(long, help = "Restrict the listing to one department")]
        department: Option<String>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List departments from the company directory")]
    Departments {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog integrity, and LLM credential readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Respond { department, template, fields, tolerance, max_attempts, json } => {
            commands::respond::run(commands::respond::RespondArgs {
                department,
                template,
                fields,
                tolerance,
                max_attempts,
                json,
            })
        }
        Command::Score { standard, candidate, tolerance, json } => {
            commands::score::run(&standard, &candidate, tolerance, json)
        }
        Command::Templates { department, json } => {
            commands::templates::run(department.as_deref(), json)
        }
        Command::Departments { json } => commands::departments::run(json),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the stderr subscriber before any command runs. Command payloads
/// own stdout, so events must never land there. Falls back to defaults when
/// the configuration cannot load; the command itself reports that failure.
fn init_logging() {
    use tracing::Level;

    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

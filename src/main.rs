// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use barcode_attendance::{logging, AttendanceError, AttendanceSystem, Config};

#[derive(Debug, Parser)]
#[command(
    name = "barcode-attendance",
    version,
    about = "Register students with EAN-13 barcodes and mark attendance by scanning them"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory for generated barcode images (overrides the config file)
    #[arg(long, global = true)]
    barcode_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a student and generate their barcode image
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        matric: String,
        /// 12-digit code; the check digit is appended
        #[arg(long)]
        code: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a barcode image and mark attendance
    Scan {
        image: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Mark attendance for a barcode value typed in by hand
    Mark {
        value: String,
        #[arg(long)]
        json: bool,
    },
    /// Interactive terminal form (default)
    Ui,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("❌ {}", err);
        let code = err
            .downcast_ref::<AttendanceError>()
            .map(AttendanceError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let interactive = matches!(cli.command, None | Some(Command::Ui));
    // Log lines would tear the alternate screen
    if !interactive {
        logging::init_logger(cli.verbose);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(dir) = cli.barcode_dir {
        config.barcode_dir = dir;
    }
    config.validate()?;

    let system = AttendanceSystem::open(&config)?;

    match cli.command.unwrap_or(Command::Ui) {
        Command::Register {
            name,
            matric,
            code,
            json,
        } => {
            let artifact = system.register(&name, &matric, &code)?;
            print_result(json, &artifact, || {
                format!(
                    "✅ Barcode {} for {} generated and saved as {}",
                    artifact.full_code,
                    artifact.student.name,
                    artifact.path.display()
                )
            })?;
        }
        Command::Scan { image, json } => {
            let result = system.scan(&image)?;
            print_result(json, &result, || format!("✅ {}", result.summary()))?;
        }
        Command::Mark { value, json } => {
            let result = system.mark_attendance(&value)?;
            print_result(json, &result, || format!("✅ {}", result.summary()))?;
        }
        Command::Ui => run_ui_mode(system)?,
    }

    Ok(())
}

fn print_result<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(system: AttendanceSystem) -> Result<()> {
    let mut app = ui::App::new();
    app.load_recent(&system);
    ui::run_ui(&mut app, &system)?;

    println!("\n✅ {} attendance mark(s) this session", app.session_marks());

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_system: AttendanceSystem) -> Result<()> {
    anyhow::bail!(
        "TUI mode not available; rebuild with `--features tui` or use the register/scan subcommands"
    )
}

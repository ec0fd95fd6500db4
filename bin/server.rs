// Barcode Attendance - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use barcode_attendance::api::{router, AppState};
use barcode_attendance::{logging, AttendanceSystem, Config};

#[derive(Debug, Parser)]
#[command(name = "attendance-server", version, about = "HTTP API for barcode attendance")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logger(args.verbose);

    let config = Config::load(args.config.as_deref())?;
    let system = AttendanceSystem::open(&config)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    tracing::info!(db = %config.database_path.display(), "Database opened");

    let app = router(AppState::new(system));

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;

    tracing::info!("Server running on http://{}", args.addr);
    println!("\n🚀 Server running on http://{}", args.addr);
    println!("   API: http://{}/api/health", args.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

//! AR Home Designer Replay - headless session runner
//!
//! Replays a scripted AR session through the same state machine the browser
//! build uses and prints what ended up in the room.

mod backend;
mod replay;
mod script;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "arhome-replay")]
#[command(about = "Replay a scripted AR Home Designer session")]
#[command(version)]
struct Args {
    /// Session script (JSON)
    #[arg(short, long, required_unless_present = "init_config")]
    script: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, default_value = "arhome.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write the default configuration to --config and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.init_config {
        arhome_core::config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let Some(script_path) = args.script else {
        anyhow::bail!("--script is required");
    };

    let config = arhome_core::config::load_config(&args.config)?;
    let script = script::Script::from_path(&script_path)?;
    info!(
        script = %script_path.display(),
        steps = script.steps.len(),
        "Replaying session"
    );

    let report = replay::run(&script, &config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    Ok(())
}

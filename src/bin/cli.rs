//! gradewatch CLI
//!
//! Runs one batch of grade checks. Schedule it externally (cron, systemd
//! timer) to check periodically.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gradewatch::{
    config::{self, DotEnv, Settings},
    error::Result,
    pipeline::RunCoordinator,
    services::{NtfyTransport, PortalClient},
    storage::LocalStore,
};

/// gradewatch - WebSinu grade change notifier
#[derive(Parser, Debug)]
#[command(
    name = "gradewatch",
    version,
    about = "Notifies about new or changed WebSinu grades"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "gradewatch.toml", global = true)]
    config: PathBuf,

    /// File with `KEY=value` credentials; a missing file is ignored
    #[arg(long, default_value = ".env", global = true)]
    env_file: PathBuf,

    /// Append log output to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every configured user once (default)
    Run,

    /// Validate configuration and credentials
    Validate,

    /// Print the stored grades of a user
    Show {
        /// User id as written in the configuration
        user: String,
    },
}

/// Initialize logging based on verbosity flag.
///
/// With a log file, records are appended to it so scheduled runs keep a
/// history.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp_secs();

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Main entry point for the CLI application.
///
/// Per-user failures never change the exit code; only startup failures do.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let env = DotEnv::load(&cli.env_file)?;
    let settings = config::load_settings(&cli.config, |key| env.lookup(key))?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&settings).await,
        Command::Validate => {
            validate(&settings);
            Ok(())
        }
        Command::Show { user } => show(&settings, &user).await,
    }
}

async fn run(settings: &Settings) -> Result<()> {
    let config = &settings.config;
    let source = PortalClient::new(config.portal.clone())?;
    let transport = NtfyTransport::new(config.topic_url()?, config.notify.timeout_secs)?;
    let store = LocalStore::new(&config.run.state_dir);

    log::info!("Checking grades for {} users", settings.users.len());
    let report = RunCoordinator::new(&source, &store, &transport)
        .with_config(config)
        .run_once(&settings.users)
        .await;

    report.log_summary();
    Ok(())
}

fn validate(settings: &Settings) {
    log::info!("✓ Config OK ({} users)", settings.users.len());
    for user in &settings.users {
        if user.credentials.is_some() {
            log::info!("✓ {}: credentials found", user.id);
        } else {
            log::warn!("✗ {}: credentials missing", user.id);
        }
    }
}

async fn show(settings: &Settings, user: &str) -> Result<()> {
    let store = LocalStore::new(&settings.config.run.state_dir);
    match store.read_record(user).await? {
        Some(record) => {
            log::info!(
                "{} grades for '{}', updated {}",
                record.count,
                record.user,
                record.updated_at
            );
            for (course, grade) in &record.grades {
                println!("{course}: {grade}");
            }
        }
        None => log::info!("No stored grades for '{}'", user),
    }
    Ok(())
}

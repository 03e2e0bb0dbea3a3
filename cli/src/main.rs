//! autocoupons - collect free course coupons and enroll with a browser profile.
//!
//! ```text
//! main() -> load config -> init_tracing() -> run::run()
//!                                              |
//!              sources --publish--> bridge --recv--> enrollment worker
//!                                              |
//!                                              v
//!                                  merge report -> save state
//! ```

mod run;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use autocoupons_config::{AppConfig, Overrides};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directives for the log file when `RUST_LOG` is not set.
const FILE_FILTER: &str = "warn,autocoupons=debug,autocoupons_bridge=debug,\
    autocoupons_config=debug,autocoupons_enroller=debug,autocoupons_sources=debug,\
    autocoupons_types=debug";

#[derive(Debug, Parser)]
#[command(name = "autocoupons", version, about)]
struct Cli {
    /// Chrome profile directory inside the user data directory, e.g. "Profile 1".
    #[arg(long)]
    profile_directory: Option<String>,

    /// Chrome user data directory that holds the profile.
    #[arg(long)]
    user_data_dir: Option<PathBuf>,

    /// Config file to use instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for saved state and logs.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run the browser without a window.
    #[arg(long)]
    headless: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            profile_directory: self.profile_directory.clone(),
            user_data_dir: self.user_data_dir.clone(),
            data_dir: self.data_dir.clone(),
            headless: self.headless,
        }
    }
}

fn init_tracing(data_dir: &Path) {
    let stdout_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FILE_FILTER));

    let (log_file, init_warnings) = open_log_file(data_dir);
    let (log_path, file_layer) = match log_file {
        Some((path, file)) => (
            Some(path),
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(file_filter),
            ),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_filter(stdout_filter),
        )
        .with(file_layer)
        .init();

    if let Some(path) = log_path {
        tracing::debug!(path = %path.display(), "Logging initialized");
    }
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(data_dir: &Path) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let path = data_dir.join("logs").join("autocoupons.log");
    let mut warnings = Vec::new();

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warnings.push(format!("Failed to create log dir {}: {e}", parent.display()));
        return (None, warnings);
    }

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => (Some((path, file)), warnings),
        Err(e) => {
            warnings.push(format!("Failed to open log file {}: {e}", path.display()));
            (None, warnings)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;
    let settings = config
        .resolve(&cli.overrides())
        .context("invalid configuration")?;

    init_tracing(&settings.data_dir);

    run::run(&settings).await
}

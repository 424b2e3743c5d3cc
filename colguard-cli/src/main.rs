//! `colguard` command dispatcher: access records, personnel records, tenant
//! policies and the SCIM directory.

#![warn(clippy::pedantic, clippy::nursery)]

mod commands;
mod dispatch;
mod telemetry;

use anyhow::{Context as _, Result};
use clap::error::ErrorKind;
use clap::Parser;
use colguard::config::Settings;
use colguard::http::HttpPorter;
use colguard_key_file::FileKeyAgent;
use commands::Cli;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

/// Key store used when `agent.keystore` is not configured.
fn default_keystore() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".colguard").join("keystore.json")
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => {
            dispatch::usage();
            return ExitCode::SUCCESS;
        }
    };

    match start(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn start(cli: Cli) -> Result<()> {
    telemetry::init(cli.verbosity)?;

    let Some(command) = cli.command else {
        dispatch::usage();
        return Ok(());
    };

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("ERROR: Failed to load application properties from: {}", cli.config.display());
            debug!("{e}");
            return Ok(());
        }
    };

    let keystore = settings.agent_keystore.clone().unwrap_or_else(default_keystore);
    let agent = FileKeyAgent::open(&keystore)
        .with_context(|| format!("cannot open key store {}", keystore.display()))?;
    info!("using key store {}", keystore.display());
    let porter = HttpPorter::new().context("cannot build HTTP client")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start runtime")?;

    runtime.block_on(async {
        let ctx = dispatch::Context {
            settings: &settings,
            agent: &agent,
            porter: &porter,
            keystore: &keystore,
        };
        dispatch::run(command, &ctx).await;
    });
    Ok(())
}

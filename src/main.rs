//! `kioskd` - keeps an unattended device running its managed apps
//!
//! This binary wires the orchestrator from `kioskd-core` to a config file,
//! a log sink and process signals, and offers a few setup commands.

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use kioskd_core::config::data_dir;
use kioskd_core::{identity, StartOptions};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::config::InitArgs;
use crate::cli::{Cli, Commands, ConfigCommand};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        let blue = Style::new().blue();
        println!(
            "{} v{} ({})",
            blue.apply_to("kioskd"),
            env!("CARGO_PKG_VERSION"),
            env!("GIT_HASH")
        );
        return Ok(());
    }

    let detached = matches!(cli.command, Some(Commands::Run { detached: true, .. }));
    init_logging(detached)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Some(Commands::Run {
            force_start,
            restart_sequence,
            detached: _,
        }) => {
            let options = StartOptions {
                force_start,
                restart_sequence,
            };
            cli::daemon::handle_run(config_path, options).await?;
        }

        Some(Commands::Start {
            force_start,
            restart_sequence,
        }) => {
            let options = StartOptions {
                force_start,
                restart_sequence,
            };
            cli::daemon::handle_start(config_path, options)?;
        }

        Some(Commands::Stop) => cli::daemon::handle_stop()?,

        Some(Commands::Foreground) => cli::daemon::handle_foreground()?,

        Some(Commands::DeviceId) => println!("{}", identity::stable_device_id()),

        Some(Commands::Config { cmd }) => match cmd {
            ConfigCommand::Init {
                base_url,
                api_key,
                site_id,
                device_id,
                primary,
                kiosk,
                interactive,
            } => {
                let args = InitArgs {
                    base_url,
                    api_key,
                    site_id,
                    device_id,
                    primary,
                    kiosk,
                    interactive,
                };
                cli::config::handle_init(config_path, args)?;
            }
            ConfigCommand::Show => cli::config::handle_show(config_path)?,
        },

        Some(Commands::Status) | None => cli::daemon::handle_status(config_path)?,
    }

    Ok(())
}

/// `RUST_LOG` filter, default `info`. Detached runs append to a file without ANSI.
fn init_logging(detached: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if detached {
        let dir = data_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data dir: {:?}", dir))?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("kioskd.log"))
            .context("Failed to open log file")?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
    Ok(())
}

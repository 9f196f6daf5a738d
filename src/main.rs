use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, warn};

mod config;
mod device;
mod engine;
mod env;
mod error;
mod networking;
mod ui;
mod updater;
mod util;

use config::AppConfig;
use device::SimulatedLink;
use engine::UpdateEngine;
use ui::{Outcome, UpdateMode};
use updater::{FileShare, InstallHandoff, InstalledVersion, SystemInstaller};

#[derive(Parser, Debug)]
#[command(
    name = "rayban-assistant",
    author,
    version,
    about = "Companion for Meta Ray-Ban glasses with built-in self-update"
)]
struct Cli {
    /// Config file (defaults to config.toml in the app directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the release manifest URL.
    #[arg(long, global = true)]
    manifest_url: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a newer release is published.
    Check,
    /// Check, download and hand the new release to the installer.
    Update {
        /// Install without asking for confirmation.
        #[arg(long)]
        yes: bool,
    },
    /// Talk to paired glasses.
    Devices {
        #[command(subcommand)]
        action: DeviceCommand,
    },
    /// Print the installed version and exit.
    Version,
}

#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// Register this app with the companion service.
    Register,
    /// List glasses visible to the companion service.
    Scan,
    /// Open a session with the given device and close it again.
    Connect { id: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let config_path = cli.config.clone().unwrap_or_else(env::config_path);
    let mut config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            eprintln!("Couldn't read configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = cli.manifest_url {
        config.update.manifest_url = url;
    }

    let installed = InstalledVersion::detect().with_overrides(&config.version);
    let runtime = ui::build_runtime();

    let success = match cli.command {
        Command::Version => {
            println!(
                "rayban-assistant {} (code {})",
                installed.version_name, installed.version_code
            );
            true
        }
        Command::Check => {
            let engine = update_engine(&config, installed);
            let outcome = runtime.block_on(ui::run_update(engine, UpdateMode::CheckOnly));
            outcome != Outcome::Failed
        }
        Command::Update { yes } => {
            if let Err(err) = env::ensure_base_dirs() {
                warn!("unable to create app directories: {err}");
            }
            let engine = update_engine(&config, installed);
            let mode = UpdateMode::Install {
                assume_yes: yes || config.install.auto_confirm,
            };
            let outcome = runtime.block_on(ui::run_update(engine, mode));
            outcome != Outcome::Failed
        }
        Command::Devices { action } => {
            let marker = env::registration_marker();
            let link = SimulatedLink::default_devices(marker.exists());
            runtime.block_on(async {
                let done = match action {
                    DeviceCommand::Register => ui::register_device(&link, &marker),
                    DeviceCommand::Scan => {
                        ui::list_devices(&link, &link.connection()).await;
                        true
                    }
                    DeviceCommand::Connect { id } => ui::connect_device(&link, &id).await,
                };
                link.cleanup().await;
                done
            })
        }
    };

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn update_engine(config: &AppConfig, installed: InstalledVersion) -> UpdateEngine {
    let share = FileShare::from_config(&config.install, config.download_dir());
    let handoff = InstallHandoff::new(share, Box::new(SystemInstaller));
    UpdateEngine::new(config, installed, handoff)
}

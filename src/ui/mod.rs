//! Terminal presentation: renders engine snapshots and relays the user's
//! choices back as actions.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, warn};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, watch};

use crate::device::{ConnectionState, DeviceInfo, DeviceLink, SimulatedLink};
use crate::engine::UpdateEngine;
use crate::engine::state::{UpdateSnapshot, UpdateState, UserAction};
use crate::util::format_size;

pub fn build_runtime() -> Runtime {
    match Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            warn!(
                "ui: failed to create multithreaded runtime ({}); trying single-threaded runtime",
                err
            );
            match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(fallback_err) => {
                    error!(
                        "ui: failed to create any Tokio runtime ({}); terminating",
                        fallback_err
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    CheckOnly,
    Install { assume_yes: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    UpToDate,
    UpdateAvailable,
    Declined,
    InstallerLaunched,
    Failed,
}

#[derive(Default)]
struct TerminalUi {
    bar: Option<ProgressBar>,
}

impl TerminalUi {
    fn render(&mut self, snapshot: &UpdateSnapshot) {
        match &snapshot.state {
            UpdateState::Idle => {}
            UpdateState::Downloading { percent, .. } => {
                let bar = self.bar.get_or_insert_with(new_progress_bar);
                if let Some(pct) = percent {
                    bar.set_position(u64::from(*pct));
                }
                bar.set_message(snapshot.status.clone());
            }
            UpdateState::UpdateFound { manifest } => {
                self.finish_bar();
                println!("{}", snapshot.status);
                if !manifest.changelog.trim().is_empty() {
                    println!("\nWhat's new:\n{}\n", manifest.changelog.trim());
                }
            }
            UpdateState::Ready { artifact, .. } => {
                self.finish_bar();
                let size = std::fs::metadata(artifact)
                    .map(|meta| format_size(meta.len()))
                    .unwrap_or_else(|_| "unknown size".into());
                println!("{} ({size})", snapshot.status);
            }
            UpdateState::DownloadFailed { .. } | UpdateState::Failed { .. } => {
                self.abandon_bar();
                eprintln!("{}", snapshot.status);
            }
            _ => {
                self.finish_bar();
                println!("{}", snapshot.status);
            }
        }
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn abandon_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    match ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}") {
        Ok(style) => bar.set_style(style),
        Err(err) => warn!("ui: progress style rejected ({err})"),
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn send(actions: &Option<mpsc::UnboundedSender<UserAction>>, action: UserAction) {
    if let Some(tx) = actions
        && tx.send(action).is_err()
    {
        warn!("ui: engine stopped before the action was delivered");
    }
}

/// Run one update check, and for [`UpdateMode::Install`] the download and
/// installer handoff that follow it.
pub async fn run_update(engine: UpdateEngine, mode: UpdateMode) -> Outcome {
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(engine.run(action_rx, updates_tx));

    // Dropping the sender lets the engine finish its queue and exit, which
    // in turn closes the snapshot channel and ends the loop below.
    let mut actions = Some(action_tx);
    send(&actions, UserAction::CheckForUpdates);

    let mut ui = TerminalUi::default();
    let mut outcome = Outcome::Failed;
    while let Some(snapshot) = updates_rx.recv().await {
        ui.render(&snapshot);
        match &snapshot.state {
            UpdateState::UpToDate => {
                outcome = Outcome::UpToDate;
                actions.take();
            }
            UpdateState::UpdateFound { .. } => match mode {
                UpdateMode::CheckOnly => {
                    outcome = Outcome::UpdateAvailable;
                    actions.take();
                }
                UpdateMode::Install { .. } => send(&actions, UserAction::DownloadUpdate),
            },
            UpdateState::Ready { .. } => {
                let assume_yes = matches!(mode, UpdateMode::Install { assume_yes: true });
                if assume_yes || confirm("Install now?").await {
                    outcome = Outcome::InstallerLaunched;
                    send(&actions, UserAction::ConfirmInstall);
                } else {
                    outcome = Outcome::Declined;
                    send(&actions, UserAction::Dismiss);
                }
                actions.take();
            }
            UpdateState::DownloadFailed { .. } | UpdateState::Failed { .. } => {
                outcome = Outcome::Failed;
                actions.take();
            }
            _ => {}
        }
    }

    ui.finish_bar();
    if let Err(err) = worker.await {
        error!("ui: update engine task failed: {err}");
        return Outcome::Failed;
    }
    outcome
}

async fn confirm(prompt: &'static str) -> bool {
    let answer = tokio::task::spawn_blocking(move || {
        print!("{prompt} [y/N] ");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line).ok()?;
        Some(line)
    })
    .await;
    matches!(answer, Ok(Some(line)) if is_affirmative(&line))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn describe_device(device: &DeviceInfo) -> String {
    format!(
        "{:<20} {:<24} {:<20} {:>4} dBm{}",
        device.id,
        device.name,
        device.address,
        device.rssi,
        if device.connected { "  (connected)" } else { "" }
    )
}

pub async fn list_devices(
    link: &dyn DeviceLink,
    connection: &watch::Receiver<ConnectionState>,
) -> usize {
    let devices: Vec<DeviceInfo> = link.scan().collect().await;
    if devices.is_empty() {
        match &*connection.borrow() {
            ConnectionState::Error(message) => {
                eprintln!("{message}. Run `rayban-assistant devices register` first.")
            }
            _ => println!("No glasses found. Make sure the glasses are nearby."),
        }
    }
    for device in &devices {
        println!("{}", describe_device(device));
    }
    devices.len()
}

pub async fn connect_device(link: &dyn DeviceLink, id: &str) -> bool {
    match link.connect(id).await {
        Ok(mut session) => {
            println!(
                "Connected to {} (session {:?}).",
                session.device().name,
                session.state()
            );
            if let Err(err) = link.disconnect().await {
                warn!("ui: disconnect failed: {err}");
                return true;
            }
            println!("Session {:?}.", session.next_state().await);
            true
        }
        Err(err) => {
            eprintln!("Couldn't connect: {err}");
            false
        }
    }
}

/// Register with the companion service and remember it in `marker` so later
/// runs start registered.
pub fn register_device(link: &SimulatedLink, marker: &Path) -> bool {
    if let Err(err) = link.register() {
        eprintln!("Couldn't register: {err}");
        return false;
    }
    let saved = marker
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::write(marker, b""));
    if let Err(err) = saved {
        warn!("ui: unable to save registration to {}: {err}", marker.display());
    }
    println!("Registered with the companion service.");
    true
}

//! Narrow capability interface over the wearable vendor SDK.
//!
//! Nothing outside this module sees vendor types: backends translate their
//! registration and session callbacks into [`DeviceInfo`], [`Session`] and
//! [`SessionState`].

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio::sync::watch;

use crate::error::LinkError;

pub mod simulated;

pub use simulated::SimulatedLink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub address: String,
    /// Signal strength in dBm; backends that cannot measure it report a
    /// fixed estimate.
    pub rssi: i16,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    Connected(DeviceInfo),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    /// Reported by vendor backends; the simulated link never pauses.
    #[allow(dead_code)]
    Paused,
    Stopped,
}

/// A live connection to one device. Dropping it does not disconnect; call
/// [`DeviceLink::disconnect`].
#[derive(Debug)]
pub struct Session {
    device: DeviceInfo,
    state: watch::Receiver<SessionState>,
}

impl Session {
    pub fn new(device: DeviceInfo, state: watch::Receiver<SessionState>) -> Self {
        Self { device, state }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait for the next session state change. Returns `Stopped` once the
    /// backend has dropped the session.
    pub async fn next_state(&mut self) -> SessionState {
        match self.state.changed().await {
            Ok(()) => *self.state.borrow_and_update(),
            Err(_) => SessionState::Stopped,
        }
    }
}

#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Devices currently known to the backend.
    fn scan(&self) -> BoxStream<'static, DeviceInfo>;

    async fn connect(&self, id: &str) -> Result<Session, LinkError>;

    async fn disconnect(&self) -> Result<(), LinkError>;
}

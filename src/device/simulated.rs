use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use log::{debug, info, warn};
use tokio::sync::watch;

use super::{ConnectionState, DeviceInfo, DeviceLink, Session, SessionState};
use crate::error::LinkError;

/// In-memory backend with a fixed device list. Stands in for the vendor SDK
/// until a real backend is wired up, and backs the tests.
pub struct SimulatedLink {
    devices: Vec<DeviceInfo>,
    registered: AtomicBool,
    active: Mutex<Option<watch::Sender<SessionState>>>,
    connection: watch::Sender<ConnectionState>,
}

impl SimulatedLink {
    pub fn new(devices: Vec<DeviceInfo>, registered: bool) -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            devices,
            registered: AtomicBool::new(registered),
            active: Mutex::new(None),
            connection,
        }
    }

    /// One pair of glasses, already registered.
    #[cfg(test)]
    pub fn with_default_devices() -> Self {
        Self::default_devices(true)
    }

    /// One pair of glasses; `registered` says whether the companion service
    /// has already accepted this app.
    pub fn default_devices(registered: bool) -> Self {
        Self::new(
            vec![DeviceInfo {
                id: "rayban-meta-01".into(),
                name: "Ray-Ban Meta".into(),
                address: "rayban-meta-01".into(),
                rssi: -50,
                connected: false,
            }],
            registered,
        )
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Register this app with the companion service. Registering twice is a
    /// no-op.
    pub fn register(&self) -> Result<(), LinkError> {
        if self.registered.swap(true, Ordering::SeqCst) {
            debug!("device: already registered");
            return Ok(());
        }
        info!("device: registered with the companion service");
        let errored = matches!(*self.connection.borrow(), ConnectionState::Error(_));
        if errored {
            self.set_connection(ConnectionState::Disconnected);
        }
        Ok(())
    }

    /// Leave `Scanning`; any other state is kept.
    pub fn stop_scan(&self) {
        let stopped = self.connection.send_if_modified(|state| {
            if *state == ConnectionState::Scanning {
                *state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        if stopped {
            debug!("device: scan stopped");
        }
    }

    /// Stop scanning and drop any live session.
    pub async fn cleanup(&self) {
        self.stop_scan();
        if let Err(err) = self.disconnect().await {
            warn!("device: cleanup failed: {err}");
        }
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    fn set_connection(&self, state: ConnectionState) {
        debug!("device: connection state {state:?}");
        self.connection.send_replace(state);
    }

    fn stop_active(&self) -> Result<bool, LinkError> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| LinkError::Backend("session lock poisoned".into()))?;
        Ok(match active.take() {
            Some(session) => {
                session.send_replace(SessionState::Stopped);
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl DeviceLink for SimulatedLink {
    fn scan(&self) -> BoxStream<'static, DeviceInfo> {
        if !self.is_registered() {
            warn!("device: scan requested before registration");
            self.set_connection(ConnectionState::Error(LinkError::NotRegistered.to_string()));
            return stream::empty().boxed();
        }
        self.set_connection(ConnectionState::Scanning);
        stream::iter(self.devices.clone()).boxed()
    }

    async fn connect(&self, id: &str) -> Result<Session, LinkError> {
        if !self.is_registered() {
            return Err(LinkError::NotRegistered);
        }
        self.set_connection(ConnectionState::Connecting);
        let Some(found) = self.devices.iter().find(|device| device.id == id) else {
            let err = LinkError::DeviceNotFound(id.to_owned());
            self.set_connection(ConnectionState::Error(err.to_string()));
            return Err(err);
        };

        if self.stop_active()? {
            debug!("device: replacing existing session");
        }
        let device = DeviceInfo {
            connected: true,
            ..found.clone()
        };
        let (session_tx, session_rx) = watch::channel(SessionState::Running);
        *self
            .active
            .lock()
            .map_err(|_| LinkError::Backend("session lock poisoned".into()))? = Some(session_tx);

        info!("device: connected to {} ({})", device.name, device.id);
        self.set_connection(ConnectionState::Connected(device.clone()));
        Ok(Session::new(device, session_rx))
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        if self.stop_active()? {
            info!("device: disconnected");
        }
        self.set_connection(ConnectionState::Disconnected);
        Ok(())
    }
}

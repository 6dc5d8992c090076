//! Camera session lifecycle
//!
//! A session walks `Disconnected -> Connecting -> Live -> Disconnecting ->
//! Disconnected`. Connecting sequences the backend calls strictly in order:
//! allocate handles, seed pairing settings, resolve abilities, resolve the
//! port, then run the handshake. A failure at any step releases what was
//! acquired so far and leaves the session `Disconnected` for good.
//!
//! Known limitation: the PTP/IP transport in libgphoto2 does not promptly
//! close its socket on exit. Teardown releases every handle it owns but
//! cannot force that socket closed.

use crate::address::DeviceAddress;
use crate::backend::{Catalogs, CameraEventKind, DeviceBackend, StatusCode};
use crate::config::{SessionConfig, TetherConfig};
use crate::errors::{Result, TetherError};
use crate::settings::{ConfigurationTree, SnapshotCache};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Live,
    Disconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Live => "live",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// One entry for the backend's global settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingEntry {
    pub scope: String,
    pub key: String,
    pub value: String,
}

/// Settings the transport needs seeded before lookups will resolve.
///
/// Passed explicitly into [`CameraSession::connect`] so nothing depends on
/// the settings store having been prepared elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingSettings {
    entries: Vec<PairingEntry>,
}

impl PairingSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, scope: &str, key: &str, value: &str) -> Self {
        self.entries.push(PairingEntry {
            scope: scope.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Device model plus encoded pairing identifier for `address`.
    pub fn for_device(address: &DeviceAddress, config: &SessionConfig) -> Self {
        Self::new()
            .with_entry(&config.pairing_scope_model, "model", &config.model_tag)
            .with_entry(&config.pairing_scope_guid, "guid", &address.wire_id())
    }

    pub fn entries(&self) -> &[PairingEntry] {
        &self.entries
    }
}

/// A single camera connection and the backend resources it owns.
///
/// Owned by exactly one thread for its whole life. Dropping a session tears
/// it down if that has not happened yet.
pub struct CameraSession<B: DeviceBackend> {
    backend: Arc<B>,
    address: DeviceAddress,
    config: SessionConfig,
    state: SessionState,
    spent: bool,
    initialized: bool,
    context: Option<B::Context>,
    camera: Option<B::Camera>,
    catalogs: Catalogs<B>,
    snapshot: SnapshotCache<B>,
}

impl<B: DeviceBackend> CameraSession<B> {
    pub fn new(backend: Arc<B>, address: DeviceAddress, config: &TetherConfig) -> Self {
        Self {
            backend,
            address,
            config: config.session.clone(),
            state: SessionState::Disconnected,
            spent: false,
            initialized: false,
            context: None,
            camera: None,
            catalogs: Catalogs::default(),
            snapshot: SnapshotCache::new(config.settings.freshness_window()),
        }
    }

    /// Reuse catalogs loaded by an earlier session against the same backend.
    pub fn with_catalogs(mut self, catalogs: Catalogs<B>) -> Self {
        self.catalogs.release(&*self.backend);
        self.catalogs = catalogs;
        self
    }

    /// Hand the loaded catalogs on to the next session.
    pub fn into_catalogs(mut self) -> Catalogs<B> {
        self.disconnect();
        std::mem::take(&mut self.catalogs)
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == SessionState::Live
    }

    /// Establish the session. Only valid once, on a fresh session.
    pub fn connect(&mut self, pairing: &PairingSettings) -> Result<()> {
        if self.spent || self.state != SessionState::Disconnected {
            return Err(TetherError::InvalidState(format!(
                "connect requires a fresh disconnected session, found {}",
                self.state
            )));
        }
        self.spent = true;
        self.state = SessionState::Connecting;
        log::info!("Connecting to {}", self.address);

        match self.establish(pairing) {
            Ok(()) => {
                self.state = SessionState::Live;
                log::info!("Connected to {}", self.address);
                Ok(())
            }
            Err(e) => {
                log::debug!("Connection to {} aborted: {}", self.address, e);
                self.release_resources();
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    fn establish(&mut self, pairing: &PairingSettings) -> Result<()> {
        let backend = Arc::clone(&self.backend);

        log::debug!("Allocating camera");
        let context = backend
            .context_new()
            .map_err(|s| describe(&*backend, s, TetherError::backend_allocation))?;
        let context = self.context.insert(context);
        let camera = backend
            .camera_new()
            .map_err(|s| describe(&*backend, s, TetherError::backend_allocation))?;
        let camera = self.camera.insert(camera);

        for entry in pairing.entries() {
            log::debug!("Setting {}/{} = {}", entry.scope, entry.key, entry.value);
            if let Err(status) = backend.setting_set(&entry.scope, &entry.key, &entry.value) {
                log::warn!(
                    "Failed to seed pairing setting {}/{}: {} ({})",
                    entry.scope,
                    entry.key,
                    backend.describe_status(status),
                    status
                );
            }
        }

        if self.catalogs.abilities.is_none() {
            log::debug!("Loading abilities catalog");
            let list = backend
                .abilities_list_load(context)
                .map_err(|s| describe(&*backend, s, TetherError::capability_lookup))?;
            self.catalogs.abilities = Some(list);
        }
        let abilities_list = self
            .catalogs
            .abilities
            .as_ref()
            .ok_or_else(|| TetherError::InvalidState("abilities catalog missing".to_string()))?;

        log::debug!("Looking up model {}", self.config.model_tag);
        let index = backend
            .abilities_lookup_model(abilities_list, &self.config.model_tag)
            .map_err(|s| describe(&*backend, s, TetherError::capability_lookup))?;
        log::debug!("Model found at {}", index);
        let abilities = backend
            .abilities_get(abilities_list, index)
            .map_err(|s| describe(&*backend, s, TetherError::capability_lookup))?;
        backend
            .camera_set_abilities(camera, &abilities)
            .map_err(|s| describe(&*backend, s, TetherError::capability_lookup))?;

        if self.catalogs.ports.is_none() {
            log::debug!("Loading port registry");
            let list = backend
                .port_list_load()
                .map_err(|s| describe(&*backend, s, TetherError::port_lookup))?;
            self.catalogs.ports = Some(list);
        }
        let port_list = self
            .catalogs
            .ports
            .as_ref()
            .ok_or_else(|| TetherError::InvalidState("port registry missing".to_string()))?;

        let path = self.address.transport_path(&self.config.transport_scheme);
        log::debug!("Looking up port {}", String::from_utf8_lossy(&path));
        let index = backend
            .port_lookup_path(port_list, &path)
            .map_err(|s| describe(&*backend, s, TetherError::port_lookup))?;
        log::debug!("Port found at {}", index);
        let info = backend
            .port_info_get(port_list, index)
            .map_err(|s| describe(&*backend, s, TetherError::port_lookup))?;
        backend
            .camera_set_port_info(camera, &info)
            .map_err(|s| describe(&*backend, s, TetherError::port_lookup))?;

        log::debug!("Initializing session");
        backend
            .camera_init(camera, context, self.config.init_timeout())
            .map_err(|s| describe(&*backend, s, TetherError::session_init))?;
        self.initialized = true;
        Ok(())
    }

    /// Tear the session down. Safe to call any number of times; each
    /// release step is attempted even if an earlier one failed.
    pub fn disconnect(&mut self) {
        if self.context.is_none() && self.camera.is_none() && !self.snapshot.is_cached() {
            self.state = SessionState::Disconnected;
            return;
        }

        log::info!("Disconnecting from {}", self.address);
        self.state = SessionState::Disconnecting;
        self.release_resources();
        self.state = SessionState::Disconnected;
    }

    fn release_resources(&mut self) {
        let backend = Arc::clone(&self.backend);
        self.snapshot.release(&backend);

        if let Some(mut camera) = self.camera.take() {
            if self.initialized {
                if let Some(context) = self.context.as_ref() {
                    if let Err(status) = backend.camera_exit(&mut camera, context) {
                        log::warn!(
                            "Failed to exit session with {}: {} ({})",
                            self.address,
                            backend.describe_status(status),
                            status
                        );
                    }
                }
            }
            if let Err(status) = backend.camera_release(camera) {
                log::warn!(
                    "Failed to release camera handle: {} ({})",
                    backend.describe_status(status),
                    status
                );
            }
        }
        self.initialized = false;

        if let Some(context) = self.context.take() {
            if let Err(status) = backend.context_release(context) {
                log::warn!(
                    "Failed to release backend context: {} ({})",
                    backend.describe_status(status),
                    status
                );
            }
        }
    }

    /// Settings access for a live session.
    pub fn settings(&mut self) -> Result<ConfigurationTree<'_, B>> {
        if self.state != SessionState::Live {
            return Err(TetherError::InvalidState(format!(
                "settings need a live session, found {}",
                self.state
            )));
        }
        match (self.camera.as_mut(), self.context.as_ref()) {
            (Some(camera), Some(context)) => Ok(ConfigurationTree::new(
                &*self.backend,
                camera,
                context,
                &mut self.snapshot,
            )),
            _ => Err(TetherError::InvalidState("live session without handles".to_string())),
        }
    }

    /// Fire the shutter. Can block for as long as the backend does.
    pub fn trigger_capture(&mut self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        let (camera, context) = self.live_handles()?;
        backend
            .trigger_capture(camera, context)
            .map_err(|s| unsupported_or_status(&*backend, "trigger capture", s))
    }

    /// Wait up to `timeout` for the next camera event.
    pub fn wait_for_event(&mut self, timeout: Duration) -> Result<CameraEventKind> {
        let backend = Arc::clone(&self.backend);
        let (camera, context) = self.live_handles()?;
        backend
            .wait_for_event(camera, context, timeout)
            .map_err(|s| unsupported_or_status(&*backend, "wait for event", s))
    }

    fn live_handles(&mut self) -> Result<(&mut B::Camera, &B::Context)> {
        if self.state != SessionState::Live {
            return Err(TetherError::InvalidState(format!(
                "operation needs a live session, found {}",
                self.state
            )));
        }
        match (self.camera.as_mut(), self.context.as_ref()) {
            (Some(camera), Some(context)) => Ok((camera, context)),
            _ => Err(TetherError::InvalidState("live session without handles".to_string())),
        }
    }
}

impl<B: DeviceBackend> Drop for CameraSession<B> {
    fn drop(&mut self) {
        self.disconnect();
        let backend = Arc::clone(&self.backend);
        self.catalogs.release(&backend);
    }
}

fn describe<B: DeviceBackend>(
    backend: &B,
    status: StatusCode,
    make: fn(i32, String) -> TetherError,
) -> TetherError {
    make(status.code(), backend.describe_status(status))
}

fn unsupported_or_status<B: DeviceBackend>(backend: &B, what: &str, status: StatusCode) -> TetherError {
    if status == StatusCode::NOT_SUPPORTED {
        TetherError::Unsupported(format!("{what} not supported by backend"))
    } else {
        TetherError::capture(status.code(), backend.describe_status(status))
    }
}

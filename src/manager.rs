//! Discovery-driven connection management
//!
//! The manager turns discovery events into camera sessions. Each accepted
//! camera gets its own thread which connects, runs the caller's handler and
//! always tears the session down. Event handling itself never blocks on the
//! connection sequence.

use crate::address::DeviceAddress;
use crate::backend::{Catalogs, DeviceBackend};
use crate::config::TetherConfig;
use crate::discovery::{DiscoveryEvent, DiscoverySource};
use crate::errors::Result;
use crate::session::{CameraSession, PairingSettings};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Handler invoked once per established session, on the session's thread.
pub type SessionHandler<B> = Arc<dyn Fn(&mut CameraSession<B>) + Send + Sync>;

/// What the manager did with a discovery event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// A session thread was started for this camera.
    Started(DeviceAddress),
    /// The camera already has a session in flight or running.
    Duplicate(DeviceAddress),
    /// The session limit is reached.
    AtCapacity(DeviceAddress),
    /// Not one of our cameras, or not resolvable.
    Dropped(String),
    /// Removal noted; running sessions are left alone.
    Removed,
}

struct ManagerInner<B: DeviceBackend> {
    backend: Arc<B>,
    config: TetherConfig,
    handler: SessionHandler<B>,
    tracked: Mutex<HashSet<DeviceAddress>>,
    catalogs: Mutex<Catalogs<B>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<B: DeviceBackend> ManagerInner<B> {
    fn tracked(&self) -> MutexGuard<'_, HashSet<DeviceAddress>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_catalogs(&self) -> Catalogs<B> {
        std::mem::take(&mut *self.catalogs.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn restore_catalogs(&self, mut catalogs: Catalogs<B>) {
        let mut slot = self.catalogs.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_empty() {
            *slot = catalogs;
        } else {
            catalogs.release(&self.backend);
        }
    }
}

impl<B: DeviceBackend> Drop for ManagerInner<B> {
    fn drop(&mut self) {
        let catalogs = self.catalogs.get_mut().unwrap_or_else(PoisonError::into_inner);
        catalogs.release(&self.backend);
    }
}

/// Removes an address from the tracked set when its session thread ends,
/// however it ends.
struct TrackedGuard<'a, B: DeviceBackend> {
    inner: &'a ManagerInner<B>,
    address: DeviceAddress,
}

impl<B: DeviceBackend> Drop for TrackedGuard<'_, B> {
    fn drop(&mut self) {
        self.inner.tracked().remove(&self.address);
        log::info!("Shutdown {}", self.address);
    }
}

/// Accepts cameras from discovery and runs one session thread per camera.
pub struct ConnectionManager<B: DeviceBackend> {
    inner: Arc<ManagerInner<B>>,
}

impl<B: DeviceBackend> Clone for ConnectionManager<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: DeviceBackend> ConnectionManager<B> {
    pub fn new<F>(backend: Arc<B>, config: TetherConfig, handler: F) -> Self
    where
        F: Fn(&mut CameraSession<B>) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ManagerInner {
                backend,
                config,
                handler: Arc::new(handler),
                tracked: Mutex::new(HashSet::new()),
                catalogs: Mutex::new(Catalogs::default()),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Subscribe to `source` for the configured service types.
    pub fn attach(&self, source: &mut dyn DiscoverySource) -> Result<()> {
        let manager = self.clone();
        source.subscribe(
            &self.inner.config.discovery.service_types,
            Arc::new(move |event| {
                manager.on_discovery_event(event);
            }),
        )
    }

    /// Decide what to do with one discovery event. Never blocks on I/O.
    pub fn on_discovery_event(&self, event: DiscoveryEvent) -> DiscoveryOutcome {
        match event {
            DiscoveryEvent::Removed { service_name, .. } => {
                log::info!("Service {} removed", service_name);
                DiscoveryOutcome::Removed
            }
            DiscoveryEvent::Added {
                service_name,
                resolved,
                ..
            } => {
                let vendor_property = &self.inner.config.discovery.vendor_property;
                let address = match resolved
                    .as_ref()
                    .map(|service| service.device_address(vendor_property))
                {
                    Some(Ok(address)) => address,
                    Some(Err(e)) => {
                        log::debug!("Ignoring {}: {}", service_name, e);
                        return DiscoveryOutcome::Dropped(e.to_string());
                    }
                    None => {
                        log::debug!("Ignoring {}: not resolved", service_name);
                        return DiscoveryOutcome::Dropped(format!("{service_name} not resolved"));
                    }
                };
                self.admit(address)
            }
        }
    }

    fn admit(&self, address: DeviceAddress) -> DiscoveryOutcome {
        {
            let mut tracked = self.inner.tracked();
            if tracked.contains(&address) {
                log::debug!("Already connecting to {}", address);
                return DiscoveryOutcome::Duplicate(address);
            }
            if tracked.len() >= self.inner.config.discovery.max_active_sessions {
                log::warn!("Ignoring {}: session limit reached", address);
                return DiscoveryOutcome::AtCapacity(address);
            }
            tracked.insert(address.clone());
        }

        log::info!("Connecting to {}", address);
        let inner = Arc::clone(&self.inner);
        let worker_address = address.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("crabtether-session-{}", address.network_locator()))
            .spawn(move || run_session(&*inner, worker_address));

        match spawned {
            Ok(handle) => {
                let mut workers = self.inner.workers.lock().unwrap_or_else(PoisonError::into_inner);
                workers.retain(|worker| !worker.is_finished());
                workers.push(handle);
                DiscoveryOutcome::Started(address)
            }
            Err(e) => {
                log::error!("Failed to start session thread for {}: {}", address, e);
                self.inner.tracked().remove(&address);
                DiscoveryOutcome::Dropped(format!("spawn failed: {e}"))
            }
        }
    }

    /// Addresses with a session in flight or running.
    pub fn active_sessions(&self) -> Vec<DeviceAddress> {
        self.inner.tracked().iter().cloned().collect()
    }

    /// Poll until no session is tracked or `timeout` passes.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.inner.tracked().is_empty() {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Join every session thread started so far.
    pub fn join(&self) {
        let workers: Vec<_> = self
            .inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for worker in workers {
            if worker.join().is_err() {
                log::error!("Session thread panicked");
            }
        }
    }
}

fn run_session<B: DeviceBackend>(inner: &ManagerInner<B>, address: DeviceAddress) {
    let _tracked = TrackedGuard {
        inner,
        address: address.clone(),
    };
    log::info!("Started {}", address);

    let mut session = CameraSession::new(Arc::clone(&inner.backend), address.clone(), &inner.config)
        .with_catalogs(inner.take_catalogs());
    let pairing = PairingSettings::for_device(&address, &inner.config.session);

    match session.connect(&pairing) {
        Ok(()) => {
            log::info!("Connected to {}", address);
            (inner.handler)(&mut session);
        }
        Err(e) => log::error!("Failed for {} - {}", address, e),
    }

    session.disconnect();
    inner.restore_catalogs(session.into_catalogs());
}

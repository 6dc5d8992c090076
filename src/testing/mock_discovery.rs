use crate::discovery::{DiscoveryEvent, DiscoverySource, EventSink};
use crate::errors::{Result, TetherError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Subscriptions {
    service_types: Vec<String>,
    sinks: Vec<EventSink>,
    shut_down: bool,
}

/// Discovery source driven by hand. Clones share the same subscribers, so
/// a test can keep one clone and [`emit`](MockDiscovery::emit) through it.
#[derive(Clone, Default)]
pub struct MockDiscovery {
    inner: Arc<Mutex<Subscriptions>>,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Subscriptions> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `event` to every subscriber on the calling thread.
    pub fn emit(&self, event: DiscoveryEvent) {
        let sinks = self.inner().sinks.clone();
        for sink in sinks {
            sink(event.clone());
        }
    }

    pub fn service_types(&self) -> Vec<String> {
        self.inner().service_types.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner().shut_down
    }
}

impl DiscoverySource for MockDiscovery {
    fn subscribe(&mut self, service_types: &[String], sink: EventSink) -> Result<()> {
        let mut inner = self.inner();
        if inner.shut_down {
            return Err(TetherError::Discovery("source already shut down".to_string()));
        }
        for service_type in service_types {
            if !inner.service_types.contains(service_type) {
                inner.service_types.push(service_type.clone());
            }
        }
        inner.sinks.push(sink);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        let mut inner = self.inner();
        inner.sinks.clear();
        inner.shut_down = true;
        Ok(())
    }
}

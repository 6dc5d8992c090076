//! Service discovery interface
//!
//! A discovery source browses DNS-SD service types and reports services as
//! they appear and disappear. Events are delivered on the source's own
//! thread through an [`EventSink`]; sinks must return quickly.

#[cfg(feature = "mdns")]
pub mod mdns;

use crate::address::DeviceAddress;
use crate::errors::{Result, TetherError};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Address and TXT properties of a resolved service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub address: Ipv4Addr,
    pub properties: HashMap<Vec<u8>, Vec<u8>>,
}

impl ResolvedService {
    pub fn new(address: Ipv4Addr) -> Self {
        Self {
            address,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: &[u8]) -> Self {
        self.properties.insert(key.as_bytes().to_vec(), value.to_vec());
        self
    }

    pub fn property(&self, key: &str) -> Option<&[u8]> {
        self.properties.get(key.as_bytes()).map(Vec::as_slice)
    }

    /// Build the camera address from the vendor identifier property.
    ///
    /// Fails for services that do not carry the property or carry it in a
    /// form that is not UTF-8; those belong to some other vendor.
    pub fn device_address(&self, vendor_property: &str) -> Result<DeviceAddress> {
        let raw = self.property(vendor_property).ok_or_else(|| {
            TetherError::MalformedDiscoveryEvent(format!("missing property {vendor_property}"))
        })?;
        let unique_id = std::str::from_utf8(raw).map_err(|e| {
            TetherError::MalformedDiscoveryEvent(format!("property {vendor_property}: {e}"))
        })?;
        let unique_id = unique_id.trim();
        if unique_id.is_empty() {
            return Err(TetherError::MalformedDiscoveryEvent(format!(
                "empty property {vendor_property}"
            )));
        }
        Ok(DeviceAddress::new(self.address.to_string(), unique_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A service appeared. `resolved` is `None` when it could not be resolved.
    Added {
        service_type: String,
        service_name: String,
        resolved: Option<ResolvedService>,
    },
    Removed {
        service_type: String,
        service_name: String,
    },
}

impl DiscoveryEvent {
    pub fn service_name(&self) -> &str {
        match self {
            Self::Added { service_name, .. } | Self::Removed { service_name, .. } => service_name,
        }
    }
}

pub type EventSink = Arc<dyn Fn(DiscoveryEvent) + Send + Sync>;

/// A source of service add/remove events.
pub trait DiscoverySource {
    /// Start browsing `service_types`, delivering every event to `sink`.
    fn subscribe(&mut self, service_types: &[String], sink: EventSink) -> Result<()>;

    /// Stop browsing and wait for delivery threads to finish.
    fn shutdown(&mut self) -> Result<()>;
}

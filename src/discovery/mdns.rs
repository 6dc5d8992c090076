//! mDNS / DNS-SD discovery backed by `mdns-sd`

use super::{DiscoveryEvent, DiscoverySource, EventSink, ResolvedService};
use crate::errors::{Result, TetherError};
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::collections::HashMap;
use std::net::IpAddr;
use std::thread::JoinHandle;

/// Browses the local network with a single mDNS daemon. One delivery thread
/// runs per browsed service type.
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
    browsing: Vec<String>,
    pumps: Vec<JoinHandle<()>>,
}

impl MdnsDiscovery {
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| TetherError::Discovery(format!("Failed to start mDNS daemon: {e}")))?;
        Ok(Self {
            daemon,
            browsing: Vec::new(),
            pumps: Vec::new(),
        })
    }
}

impl DiscoverySource for MdnsDiscovery {
    fn subscribe(&mut self, service_types: &[String], sink: EventSink) -> Result<()> {
        for service_type in service_types {
            if self.browsing.contains(service_type) {
                continue;
            }

            let receiver = self.daemon.browse(service_type).map_err(|e| {
                TetherError::Discovery(format!("Failed to browse {service_type}: {e}"))
            })?;
            self.browsing.push(service_type.clone());
            log::info!("Browsing for {}", service_type);

            let sink = sink.clone();
            let pump = std::thread::Builder::new()
                .name(format!("crabtether-mdns-{}", self.pumps.len()))
                .spawn(move || {
                    while let Ok(event) = receiver.recv() {
                        if let Some(event) = translate(event) {
                            sink(event);
                        }
                    }
                })
                .map_err(|e| TetherError::Discovery(format!("spawn failed: {e}")))?;
            self.pumps.push(pump);
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        for service_type in self.browsing.drain(..) {
            if let Err(e) = self.daemon.stop_browse(&service_type) {
                log::warn!("Failed to stop browsing {}: {}", service_type, e);
            }
        }
        self.daemon
            .shutdown()
            .map_err(|e| TetherError::Discovery(format!("Failed to stop mDNS daemon: {e}")))?;
        for pump in self.pumps.drain(..) {
            let _ = pump.join();
        }
        Ok(())
    }
}

fn translate(event: ServiceEvent) -> Option<DiscoveryEvent> {
    match event {
        ServiceEvent::ServiceResolved(info) => {
            log::info!("Service {} added", info.get_fullname());
            Some(DiscoveryEvent::Added {
                service_type: info.get_type().to_string(),
                service_name: info.get_fullname().to_string(),
                resolved: resolve(&info),
            })
        }
        ServiceEvent::ServiceRemoved(service_type, service_name) => {
            log::info!("Service {} removed", service_name);
            Some(DiscoveryEvent::Removed {
                service_type,
                service_name,
            })
        }
        _ => None,
    }
}

fn resolve(info: &ServiceInfo) -> Option<ResolvedService> {
    let address = info.get_addresses().iter().find_map(|ip| match ip {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(_) => None,
    })?;

    let properties: HashMap<Vec<u8>, Vec<u8>> = info
        .get_properties()
        .iter()
        .map(|property| {
            (
                property.key().as_bytes().to_vec(),
                property.val().map(<[u8]>::to_vec).unwrap_or_default(),
            )
        })
        .collect();

    Some(ResolvedService {
        address,
        properties,
    })
}

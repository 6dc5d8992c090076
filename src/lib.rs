//! crabtether: wireless tethering for PTP/IP network cameras
//!
//! Finds cameras announced over mDNS / DNS-SD, opens a control session to
//! each one through a device-control backend, and exposes the camera's
//! settings as a typed get/set surface.
//!
//! # Features
//! - `gphoto2`: the libgphoto2 backend (links the system library)
//! - `mdns`: mDNS discovery through `mdns-sd`
//! - `cli`: the `tether-cli` demo binary
//!
//! # Usage
//! ```rust,ignore
//! use crabtether::{ConnectionManager, TetherConfig};
//! use crabtether::backend::gphoto2::Gphoto2Backend;
//! use crabtether::discovery::mdns::MdnsDiscovery;
//! use std::sync::Arc;
//!
//! let manager = ConnectionManager::new(
//!     Arc::new(Gphoto2Backend::new()),
//!     TetherConfig::load_or_default(),
//!     |session| {
//!         if let Ok(mut settings) = session.settings() {
//!             settings.set("aperture", "8.0");
//!         }
//!     },
//! );
//! let mut discovery = MdnsDiscovery::new()?;
//! manager.attach(&mut discovery)?;
//! ```
pub mod address;
pub mod backend;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod manager;
pub mod session;
pub mod settings;

// Testing utilities - in-memory backend and discovery for offline testing
pub mod testing;

// Re-exports for convenience
pub use address::DeviceAddress;
pub use backend::{DeviceBackend, StatusCode};
pub use config::TetherConfig;
pub use discovery::{DiscoveryEvent, DiscoverySource, ResolvedService};
pub use errors::{Result, TetherError};
pub use manager::{ConnectionManager, DiscoveryOutcome};
pub use session::{CameraSession, PairingSettings, SessionState};
pub use settings::{ConfigurationTree, SettingInput, SettingValue, EOS_KNOWN_SETTINGS};

/// Initialize logging for the tethering stack
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabtether=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        gphoto2: cfg!(feature = "gphoto2"),
        mdns: cfg!(feature = "mdns"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Built with the libgphoto2 backend
    pub gphoto2: bool,
    /// Built with mDNS discovery
    pub mdns: bool,
}

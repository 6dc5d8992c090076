use thiserror::Error;

/// Errors raised while establishing or driving a tethered camera session.
///
/// Variants that originate from a backend call keep the raw status code
/// together with the backend's own description of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TetherError {
    #[error("Backend allocation failed: {description} ({status})")]
    BackendAllocationFailed { status: i32, description: String },
    #[error("Capability lookup failed: {description} ({status})")]
    CapabilityLookupFailed { status: i32, description: String },
    #[error("Port lookup failed: {description} ({status})")]
    PortLookupFailed { status: i32, description: String },
    #[error("Session init failed: {description} ({status})")]
    SessionInitFailed { status: i32, description: String },
    #[error("Config fetch failed: {description} ({status})")]
    ConfigFetchFailed { status: i32, description: String },
    #[error("Config commit failed: {description} ({status})")]
    ConfigCommitFailed { status: i32, description: String },
    #[error("Capture failed: {description} ({status})")]
    CaptureFailed { status: i32, description: String },
    #[error("Malformed discovery event: {0}")]
    MalformedDiscoveryEvent(String),
    #[error("Invalid session state: {0}")]
    InvalidState(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Discovery error: {0}")]
    Discovery(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, TetherError>;

impl TetherError {
    pub fn backend_allocation(status: i32, description: String) -> Self {
        Self::BackendAllocationFailed { status, description }
    }

    pub fn capability_lookup(status: i32, description: String) -> Self {
        Self::CapabilityLookupFailed { status, description }
    }

    pub fn port_lookup(status: i32, description: String) -> Self {
        Self::PortLookupFailed { status, description }
    }

    pub fn session_init(status: i32, description: String) -> Self {
        Self::SessionInitFailed { status, description }
    }

    pub fn config_fetch(status: i32, description: String) -> Self {
        Self::ConfigFetchFailed { status, description }
    }

    pub fn config_commit(status: i32, description: String) -> Self {
        Self::ConfigCommitFailed { status, description }
    }

    pub fn capture(status: i32, description: String) -> Self {
        Self::CaptureFailed { status, description }
    }

    /// Raw backend status carried by this error, if any.
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::BackendAllocationFailed { status, .. }
            | Self::CapabilityLookupFailed { status, .. }
            | Self::PortLookupFailed { status, .. }
            | Self::SessionInitFailed { status, .. }
            | Self::ConfigFetchFailed { status, .. }
            | Self::ConfigCommitFailed { status, .. }
            | Self::CaptureFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

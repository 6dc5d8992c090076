//! Device backend capability interface
//!
//! The backend performs the wire-level imaging protocol: catalog lookups,
//! port transport, session handshake and widget storage. The rest of the
//! crate only sequences these calls and owns the handles they return.
//!
//! Every call reports failure through a negative [`StatusCode`], mirroring
//! the libgphoto2 convention. Handles are returned by value and given back
//! through the matching release call exactly once.

#[cfg(feature = "gphoto2")]
pub mod gphoto2;

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Signed backend status. Negative values are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StatusCode(pub i32);

pub type BackendResult<T> = Result<T, StatusCode>;

impl StatusCode {
    pub const OK: StatusCode = StatusCode(0);
    pub const GENERIC: StatusCode = StatusCode(-1);
    pub const BAD_PARAMETERS: StatusCode = StatusCode(-2);
    pub const NO_MEMORY: StatusCode = StatusCode(-3);
    pub const UNKNOWN_PORT: StatusCode = StatusCode(-5);
    pub const NOT_SUPPORTED: StatusCode = StatusCode(-6);
    pub const IO: StatusCode = StatusCode(-7);
    pub const TIMEOUT: StatusCode = StatusCode(-10);
    pub const MODEL_NOT_FOUND: StatusCode = StatusCode(-105);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Turn a raw return value into an index or a failure.
    pub fn check(raw: i32) -> BackendResult<usize> {
        if raw < 0 {
            Err(StatusCode(raw))
        } else {
            Ok(raw as usize)
        }
    }

    /// Generic text for the well-known codes.
    pub fn default_description(self) -> String {
        match self {
            Self::OK => "No error",
            Self::GENERIC => "Unspecified error",
            Self::BAD_PARAMETERS => "Bad parameters",
            Self::NO_MEMORY => "Out of memory",
            Self::UNKNOWN_PORT => "Unknown port",
            Self::NOT_SUPPORTED => "Unsupported operation",
            Self::IO => "I/O problem",
            Self::TIMEOUT => "Timeout reading from or writing to the port",
            Self::MODEL_NOT_FOUND => "Unknown model",
            _ => "Unknown error",
        }
        .to_string()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend-reported category of a configuration widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WidgetKind {
    Window,
    Section,
    Text,
    Range,
    Toggle,
    Radio,
    Menu,
    Button,
    Date,
    Unknown(i32),
}

impl WidgetKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Window,
            1 => Self::Section,
            2 => Self::Text,
            3 => Self::Range,
            4 => Self::Toggle,
            5 => Self::Radio,
            6 => Self::Menu,
            7 => Self::Button,
            8 => Self::Date,
            other => Self::Unknown(other),
        }
    }

    pub fn is_choice(self) -> bool {
        matches!(self, Self::Radio | Self::Menu)
    }
}

/// Value handed to the backend when mutating a widget.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetInput {
    Int(i32),
    Float(f32),
    Text(String),
}

/// Outcome of waiting for an asynchronous camera event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CameraEventKind {
    Unknown,
    Timeout,
    FileAdded,
    FolderAdded,
    CaptureComplete,
}

impl CameraEventKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Timeout,
            2 => Self::FileAdded,
            3 => Self::FolderAdded,
            4 => Self::CaptureComplete,
            _ => Self::Unknown,
        }
    }
}

/// Operations the tethering core needs from a device-control library.
///
/// Implementations must be shareable across session threads; each handle
/// is only ever used by the thread owning the session it belongs to.
pub trait DeviceBackend: Send + Sync + 'static {
    type Context: Send;
    type Camera: Send;
    type AbilitiesList: Send;
    type Abilities;
    type PortList: Send;
    type PortInfo;
    /// Root of a fetched configuration snapshot.
    type Widget: Send;
    /// A node inside a snapshot; valid while its root is.
    type Node;

    /// Human-readable text for a status code.
    fn describe_status(&self, status: StatusCode) -> String {
        status.default_description()
    }

    fn context_new(&self) -> BackendResult<Self::Context>;
    fn context_release(&self, context: Self::Context) -> BackendResult<()>;

    fn camera_new(&self) -> BackendResult<Self::Camera>;
    fn camera_release(&self, camera: Self::Camera) -> BackendResult<()>;

    /// Write an entry into the backend-wide key-value settings store.
    fn setting_set(&self, scope: &str, key: &str, value: &str) -> BackendResult<()>;

    fn abilities_list_load(&self, context: &Self::Context) -> BackendResult<Self::AbilitiesList>;
    fn abilities_list_release(&self, list: Self::AbilitiesList) -> BackendResult<()>;
    fn abilities_lookup_model(&self, list: &Self::AbilitiesList, model: &str) -> BackendResult<usize>;
    fn abilities_get(&self, list: &Self::AbilitiesList, index: usize) -> BackendResult<Self::Abilities>;
    fn camera_set_abilities(
        &self,
        camera: &mut Self::Camera,
        abilities: &Self::Abilities,
    ) -> BackendResult<()>;

    fn port_list_load(&self) -> BackendResult<Self::PortList>;
    fn port_list_release(&self, list: Self::PortList) -> BackendResult<()>;
    fn port_lookup_path(&self, list: &Self::PortList, path: &[u8]) -> BackendResult<usize>;
    fn port_info_get(&self, list: &Self::PortList, index: usize) -> BackendResult<Self::PortInfo>;
    fn camera_set_port_info(
        &self,
        camera: &mut Self::Camera,
        info: &Self::PortInfo,
    ) -> BackendResult<()>;

    /// Session handshake, bounded by `timeout`.
    ///
    /// A backend that can interrupt the handshake gives up with
    /// [`StatusCode::TIMEOUT`] once `timeout` has elapsed. One that cannot
    /// must bound every transport exchange by `timeout`, and a handshake that
    /// completes past the [`Deadline`] is exited again and reported as
    /// [`StatusCode::TIMEOUT`].
    fn camera_init(
        &self,
        camera: &mut Self::Camera,
        context: &Self::Context,
        timeout: Duration,
    ) -> BackendResult<()>;
    fn camera_exit(&self, camera: &mut Self::Camera, context: &Self::Context) -> BackendResult<()>;

    fn config_fetch(&self, camera: &mut Self::Camera, context: &Self::Context) -> BackendResult<Self::Widget>;
    fn config_commit(
        &self,
        camera: &mut Self::Camera,
        context: &Self::Context,
        root: &Self::Widget,
    ) -> BackendResult<()>;
    fn config_release(&self, root: Self::Widget) -> BackendResult<()>;

    fn widget_child_by_name(&self, root: &Self::Widget, name: &str) -> BackendResult<Self::Node>;
    fn widget_kind(&self, node: &Self::Node) -> BackendResult<WidgetKind>;
    fn widget_text(&self, node: &Self::Node) -> BackendResult<String>;
    fn widget_float(&self, node: &Self::Node) -> BackendResult<f32>;
    fn widget_int(&self, node: &Self::Node) -> BackendResult<i32>;
    /// `(min, max, step)` of a range widget.
    fn widget_range(&self, node: &Self::Node) -> BackendResult<(f32, f32, f32)>;
    fn widget_choice_count(&self, node: &Self::Node) -> BackendResult<usize>;
    fn widget_choice(&self, node: &Self::Node, index: usize) -> BackendResult<String>;
    fn widget_set(&self, node: &Self::Node, value: &WidgetInput) -> BackendResult<()>;

    /// Fire the shutter without downloading. May block on real hardware.
    fn trigger_capture(&self, _camera: &mut Self::Camera, _context: &Self::Context) -> BackendResult<()> {
        Err(StatusCode::NOT_SUPPORTED)
    }

    fn wait_for_event(
        &self,
        _camera: &mut Self::Camera,
        _context: &Self::Context,
        _timeout: Duration,
    ) -> BackendResult<CameraEventKind> {
        Err(StatusCode::NOT_SUPPORTED)
    }
}

/// Wall-clock budget for a backend call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left, or `None` once the budget is spent.
    pub fn remaining(&self) -> Option<Duration> {
        self.budget.checked_sub(self.elapsed()).filter(|left| !left.is_zero())
    }

    /// [`StatusCode::TIMEOUT`] once the budget is spent.
    pub fn check(&self) -> BackendResult<()> {
        match self.remaining() {
            Some(_) => Ok(()),
            None => Err(StatusCode::TIMEOUT),
        }
    }
}

/// Abilities catalog and port registry, loaded once and handed from one
/// session to the next.
pub struct Catalogs<B: DeviceBackend> {
    pub abilities: Option<B::AbilitiesList>,
    pub ports: Option<B::PortList>,
}

impl<B: DeviceBackend> Default for Catalogs<B> {
    fn default() -> Self {
        Self {
            abilities: None,
            ports: None,
        }
    }
}

impl<B: DeviceBackend> Catalogs<B> {
    pub fn is_empty(&self) -> bool {
        self.abilities.is_none() && self.ports.is_none()
    }

    /// Give both catalogs back to the backend.
    pub fn release(&mut self, backend: &B) {
        if let Some(list) = self.abilities.take() {
            if let Err(status) = backend.abilities_list_release(list) {
                log::warn!(
                    "Failed to release abilities catalog: {} ({})",
                    backend.describe_status(status),
                    status
                );
            }
        }
        if let Some(list) = self.ports.take() {
            if let Err(status) = backend.port_list_release(list) {
                log::warn!(
                    "Failed to release port registry: {} ({})",
                    backend.describe_status(status),
                    status
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_check() {
        assert_eq!(StatusCode::check(3), Ok(3));
        assert_eq!(StatusCode::check(-7), Err(StatusCode::IO));
        assert!(StatusCode::TIMEOUT.is_failure());
        assert!(!StatusCode::OK.is_failure());
    }

    #[test]
    fn test_widget_kind_from_raw() {
        assert_eq!(WidgetKind::from_raw(5), WidgetKind::Radio);
        assert_eq!(WidgetKind::from_raw(8), WidgetKind::Date);
        assert_eq!(WidgetKind::from_raw(42), WidgetKind::Unknown(42));
        assert!(WidgetKind::Menu.is_choice());
        assert!(!WidgetKind::Text.is_choice());
    }

    #[test]
    fn test_deadline_within_budget() {
        let deadline = Deadline::start(Duration::from_secs(60));
        assert!(deadline.check().is_ok());
        assert!(deadline.remaining().is_some());
    }

    #[test]
    fn test_deadline_expires() {
        let deadline = Deadline::start(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(deadline.check(), Err(StatusCode::TIMEOUT));
        assert_eq!(deadline.remaining(), None);
        assert!(deadline.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_zero_deadline_is_already_spent() {
        assert_eq!(Deadline::start(Duration::ZERO).check(), Err(StatusCode::TIMEOUT));
    }

    #[test]
    fn test_event_kind_from_raw() {
        assert_eq!(CameraEventKind::from_raw(2), CameraEventKind::FileAdded);
        assert_eq!(CameraEventKind::from_raw(99), CameraEventKind::Unknown);
    }
}

//! Testing utilities for crabtether
//!
//! An in-memory backend and discovery source so sessions and the manager
//! can be exercised without a camera on the network.

pub mod mock_backend;
pub mod mock_discovery;

pub use mock_backend::{MockBackend, MockCall, MockWidget};
pub use mock_discovery::MockDiscovery;

//! Connection manager admission and session threads
//!
//! Run with: cargo test --test manager_test

use crabtether::backend::StatusCode;
use crabtether::testing::{MockBackend, MockCall, MockDiscovery};
use crabtether::{
    ConnectionManager, DeviceAddress, DiscoveryEvent, DiscoveryOutcome, ResolvedService, TetherConfig,
};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

const UID_A: &str = "12345678-ABCD-EF01-23-456789ABCDEF";
const UID_B: &str = "87654321-DCBA-10FE-32-FEDCBA987654";
const IDLE: Duration = Duration::from_secs(5);

fn added(ip: [u8; 4], uid: &str) -> DiscoveryEvent {
    DiscoveryEvent::Added {
        service_type: "_ptp._tcp.local.".to_string(),
        service_name: format!("EOS {uid}._ptp._tcp.local."),
        resolved: Some(
            ResolvedService::new(Ipv4Addr::from(ip)).with_property("sid.canon.com", uid.as_bytes()),
        ),
    }
}

/// Manager whose handler blocks until the returned sender is dropped or
/// sent to, counting how many sessions reached it.
fn blocking_manager(
    backend: &Arc<MockBackend>,
    config: TetherConfig,
) -> (ConnectionManager<MockBackend>, mpsc::Sender<()>, Arc<AtomicUsize>) {
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    let manager = ConnectionManager::new(Arc::clone(backend), config, move |session| {
        assert!(session.is_live());
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = release_rx.lock().unwrap().recv();
    });
    (manager, release_tx, handled)
}

#[test]
fn test_duplicate_announcements_start_one_session() {
    let backend = Arc::new(MockBackend::new());
    let (manager, release, handled) = blocking_manager(&backend, TetherConfig::default());

    let address = DeviceAddress::new("192.168.1.20", UID_A);
    assert_eq!(
        manager.on_discovery_event(added([192, 168, 1, 20], UID_A)),
        DiscoveryOutcome::Started(address.clone())
    );
    assert_eq!(
        manager.on_discovery_event(added([192, 168, 1, 20], UID_A)),
        DiscoveryOutcome::Duplicate(address.clone())
    );
    assert_eq!(manager.active_sessions(), vec![address]);

    drop(release);
    assert!(manager.wait_idle(IDLE));
    manager.join();

    assert_eq!(backend.call_count(MockCall::CameraInit), 1);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert!(manager.active_sessions().is_empty());
}

#[test]
fn test_camera_can_reconnect_after_session_ends() {
    let backend = Arc::new(MockBackend::new());
    let manager = ConnectionManager::new(Arc::clone(&backend), TetherConfig::default(), |_session| {});

    assert!(matches!(
        manager.on_discovery_event(added([10, 0, 0, 2], UID_A)),
        DiscoveryOutcome::Started(_)
    ));
    assert!(manager.wait_idle(IDLE));
    assert!(matches!(
        manager.on_discovery_event(added([10, 0, 0, 2], UID_A)),
        DiscoveryOutcome::Started(_)
    ));
    assert!(manager.wait_idle(IDLE));
    manager.join();

    assert_eq!(backend.call_count(MockCall::CameraInit), 2);
    // Catalogs are loaded once and handed between sessions.
    assert_eq!(backend.call_count(MockCall::AbilitiesListLoad), 1);
    assert_eq!(backend.call_count(MockCall::PortListLoad), 1);
}

#[test]
fn test_session_limit() {
    let backend = Arc::new(MockBackend::new());
    let (manager, release, handled) = blocking_manager(&backend, TetherConfig::default());

    assert!(matches!(
        manager.on_discovery_event(added([10, 0, 0, 2], UID_A)),
        DiscoveryOutcome::Started(_)
    ));
    assert_eq!(
        manager.on_discovery_event(added([10, 0, 0, 3], UID_B)),
        DiscoveryOutcome::AtCapacity(DeviceAddress::new("10.0.0.3", UID_B))
    );

    drop(release);
    assert!(manager.wait_idle(IDLE));
    manager.join();
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[test]
fn test_raised_session_limit_admits_several_cameras() {
    let backend = Arc::new(MockBackend::new());
    let mut config = TetherConfig::default();
    config.discovery.max_active_sessions = 2;
    let (manager, release, handled) = blocking_manager(&backend, config);

    assert!(matches!(
        manager.on_discovery_event(added([10, 0, 0, 2], UID_A)),
        DiscoveryOutcome::Started(_)
    ));
    assert!(matches!(
        manager.on_discovery_event(added([10, 0, 0, 3], UID_B)),
        DiscoveryOutcome::Started(_)
    ));
    assert_eq!(manager.active_sessions().len(), 2);

    drop(release);
    assert!(manager.wait_idle(IDLE));
    manager.join();
    assert_eq!(handled.load(Ordering::SeqCst), 2);
}

#[test]
fn test_foreign_and_unresolved_services_are_dropped() {
    let backend = Arc::new(MockBackend::new());
    let manager = ConnectionManager::new(Arc::clone(&backend), TetherConfig::default(), |_session| {});

    let foreign = DiscoveryEvent::Added {
        service_type: "_http._tcp.local.".to_string(),
        service_name: "printer._http._tcp.local.".to_string(),
        resolved: Some(ResolvedService::new(Ipv4Addr::new(10, 0, 0, 9)).with_property("path", b"/")),
    };
    assert!(matches!(manager.on_discovery_event(foreign), DiscoveryOutcome::Dropped(_)));

    let garbled = DiscoveryEvent::Added {
        service_type: "_ptp._tcp.local.".to_string(),
        service_name: "garbled._ptp._tcp.local.".to_string(),
        resolved: Some(
            ResolvedService::new(Ipv4Addr::new(10, 0, 0, 9)).with_property("sid.canon.com", &[0xff, 0xfe]),
        ),
    };
    assert!(matches!(manager.on_discovery_event(garbled), DiscoveryOutcome::Dropped(_)));

    let unresolved = DiscoveryEvent::Added {
        service_type: "_ptp._tcp.local.".to_string(),
        service_name: "ghost._ptp._tcp.local.".to_string(),
        resolved: None,
    };
    assert!(matches!(manager.on_discovery_event(unresolved), DiscoveryOutcome::Dropped(_)));

    let removed = DiscoveryEvent::Removed {
        service_type: "_ptp._tcp.local.".to_string(),
        service_name: "EOS._ptp._tcp.local.".to_string(),
    };
    assert_eq!(manager.on_discovery_event(removed), DiscoveryOutcome::Removed);

    assert!(manager.active_sessions().is_empty());
    assert_eq!(backend.call_count(MockCall::CameraNew), 0);
}

#[test]
fn test_failed_connection_never_reaches_handler() {
    let backend = Arc::new(MockBackend::new());
    backend.fail_on(MockCall::PortLookupPath, StatusCode::UNKNOWN_PORT);
    let (manager, _release, handled) = blocking_manager(&backend, TetherConfig::default());

    assert!(matches!(
        manager.on_discovery_event(added([10, 0, 0, 2], UID_A)),
        DiscoveryOutcome::Started(_)
    ));
    assert!(manager.wait_idle(IDLE));
    manager.join();

    assert_eq!(handled.load(Ordering::SeqCst), 0);
    assert_eq!(backend.call_count(MockCall::CameraInit), 0);

    drop(manager);
    assert_eq!(backend.live_handles(), 0);
}

#[test]
fn test_attach_routes_discovery_events() {
    let backend = Arc::new(MockBackend::new());
    let config = TetherConfig::default();
    let expected_types = config.discovery.service_types.clone();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    let manager = ConnectionManager::new(Arc::clone(&backend), config, move |_session| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut discovery = MockDiscovery::new();
    manager.attach(&mut discovery).unwrap();
    assert_eq!(discovery.service_types(), expected_types);

    discovery.emit(added([192, 168, 1, 20], UID_A));
    assert!(manager.wait_idle(IDLE));
    manager.join();
    assert_eq!(handled.load(Ordering::SeqCst), 1);

    use crabtether::DiscoverySource;
    discovery.shutdown().unwrap();
    assert!(discovery.is_shut_down());
}

#[test]
fn test_handler_panic_releases_tracking() {
    let backend = Arc::new(MockBackend::new());
    let manager = ConnectionManager::new(Arc::clone(&backend), TetherConfig::default(), |_session| {
        panic!("handler failure");
    });

    assert!(matches!(
        manager.on_discovery_event(added([10, 0, 0, 2], UID_A)),
        DiscoveryOutcome::Started(_)
    ));
    assert!(manager.wait_idle(IDLE));
    manager.join();
    assert!(manager.active_sessions().is_empty());
}

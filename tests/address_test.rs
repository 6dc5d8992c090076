//! Property-based tests for the device address codec
//!
//! Run with: cargo test --test address_test

use crabtether::address::{encode_guid, encode_locator, DeviceAddress};
use proptest::prelude::*;

fn reverse_pairs(hex: &str) -> String {
    let bytes: Vec<&str> = (0..hex.len()).step_by(2).map(|i| &hex[i..i + 2]).collect();
    bytes.into_iter().rev().collect()
}

#[test]
fn test_vendor_identifier_layout() {
    assert_eq!(
        encode_guid("12345678-ABCD-EF01-23-456789ABCDEF"),
        "78:56:34:12:cd:ab:01:ef:23:45:67:89:ab:cd:ef"
    );
}

#[test]
fn test_transport_path() {
    let address = DeviceAddress::new("192.168.1.20", "12345678-ABCD-EF01-23-456789ABCDEF");
    assert_eq!(address.transport_path("ptpip"), b"ptpip:192.168.1.20".to_vec());
    assert_eq!(encode_locator("", "ptpip"), b"ptpip:".to_vec());
}

#[test]
fn test_addresses_compare_on_both_fields() {
    let a = DeviceAddress::new("10.0.0.2", "AA-BB");
    let b = DeviceAddress::new("10.0.0.2", "AA-BB");
    let c = DeviceAddress::new("10.0.0.3", "AA-BB");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

proptest! {
    #[test]
    fn encoding_is_deterministic(uid in "[0-9A-F]{8}-[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{2}-[0-9A-F]{12}") {
        prop_assert_eq!(encode_guid(&uid), encode_guid(&uid));
    }

    #[test]
    fn encoding_follows_group_rules(
        g1 in "[0-9A-F]{8}",
        g2 in "[0-9A-F]{4}",
        g3 in "[0-9A-F]{4}",
        g4 in "[0-9A-F]{2}",
        g5 in "[0-9A-F]{12}",
    ) {
        let uid = format!("{g1}-{g2}-{g3}-{g4}-{g5}");
        let wire = encode_guid(&uid);

        let expected_digits = format!(
            "{}{}{}{}{}",
            reverse_pairs(&g1),
            reverse_pairs(&g2),
            reverse_pairs(&g3),
            g4,
            g5
        )
        .to_lowercase();
        prop_assert_eq!(wire.replace(':', ""), expected_digits);
        prop_assert_eq!(wire.split(':').count(), 15);
        prop_assert!(wire.split(':').all(|b| b.len() == 2));
        prop_assert_eq!(wire.to_lowercase(), wire.clone());
    }

    #[test]
    fn encoding_never_panics(uid in "\\PC{0,40}") {
        let _ = encode_guid(&uid);
    }

    #[test]
    fn locator_is_prefixed(locator in "[0-9]{1,3}(\\.[0-9]{1,3}){3}") {
        let path = encode_locator(&locator, "ptpip");
        prop_assert_eq!(path, format!("ptpip:{locator}").into_bytes());
    }
}

//! Device addressing for the PTP/IP transport
//!
//! Cameras advertise a GUID-style identifier over service discovery. The
//! transport's pairing handshake expects the same identifier in its binary
//! layout: the first three groups byte-swapped (little-endian), the rest
//! untouched, rendered as colon-separated lowercase hex bytes.

use serde::Serialize;
use std::fmt;

/// Network location plus advertised identifier of one camera.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceAddress {
    network_locator: String,
    unique_id: String,
}

impl DeviceAddress {
    pub fn new(network_locator: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            network_locator: network_locator.into(),
            unique_id: unique_id.into(),
        }
    }

    pub fn network_locator(&self) -> &str {
        &self.network_locator
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Pairing identifier in transport byte order. Recomputed on every call.
    pub fn wire_id(&self) -> String {
        encode_guid(&self.unique_id)
    }

    /// Port path for the backend's path lookup, e.g. `ptpip:192.168.1.20`.
    pub fn transport_path(&self, scheme: &str) -> Vec<u8> {
        encode_locator(&self.network_locator, scheme)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.network_locator, self.unique_id)
    }
}

/// Transcode a dash-separated identifier into its colon-separated wire form.
///
/// Groups one to three are byte-reversed, groups four and five are appended
/// as-is. Input that does not follow the five-group layout still produces a
/// string, just not a meaningful one.
///
/// ```
/// use crabtether::address::encode_guid;
///
/// assert_eq!(
///     encode_guid("12345678-ABCD-EF01-23-456789ABCDEF"),
///     "78:56:34:12:cd:ab:01:ef:23:45:67:89:ab:cd:ef"
/// );
/// ```
pub fn encode_guid(unique_id: &str) -> String {
    let groups: Vec<&str> = unique_id.split('-').collect();

    let mut digits = String::with_capacity(unique_id.len());
    for group in groups.iter().take(3) {
        for pair in byte_pairs(group).into_iter().rev() {
            digits.push_str(&pair);
        }
    }
    for group in groups.iter().skip(3).take(2) {
        digits.push_str(group);
    }

    byte_pairs(&digits.to_lowercase()).join(":")
}

/// Prefix a network locator with the transport scheme and return the bytes
/// the backend's port lookup expects.
pub fn encode_locator(network_locator: &str, scheme: &str) -> Vec<u8> {
    format!("{scheme}:{network_locator}").into_bytes()
}

fn byte_pairs(hex: &str) -> Vec<String> {
    let chars: Vec<char> = hex.chars().collect();
    chars.chunks(2).map(|pair| pair.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_group_reversed() {
        let wire = encode_guid("12345678-ABCD-EF01-23-456789ABCDEF");
        assert!(wire.starts_with("78:56:34:12:"));
    }

    #[test]
    fn test_canonical_guid_layout() {
        let wire = encode_guid("00112233-4455-6677-8899-AABBCCDDEEFF");
        assert_eq!(
            wire,
            "33:22:11:00:55:44:77:66:88:99:aa:bb:cc:dd:ee:ff"
        );
    }

    #[test]
    fn test_short_input_does_not_panic() {
        assert_eq!(encode_guid("abc"), "ca:b");
        assert_eq!(encode_guid(""), "");
        let _ = encode_guid("ü-ß-√");
    }

    #[test]
    fn test_encode_locator() {
        assert_eq!(encode_locator("10.0.0.7", "ptpip"), b"ptpip:10.0.0.7".to_vec());
    }

    #[test]
    fn test_device_address_accessors() {
        let address = DeviceAddress::new("10.0.0.7", "12345678-ABCD-EF01-23-456789ABCDEF");
        assert_eq!(address.network_locator(), "10.0.0.7");
        assert_eq!(address.wire_id(), encode_guid(address.unique_id()));
        assert_eq!(address.transport_path("ptpip"), b"ptpip:10.0.0.7".to_vec());
        assert_eq!(
            address.to_string(),
            "10.0.0.7 (12345678-ABCD-EF01-23-456789ABCDEF)"
        );
    }
}

#[cfg(test)]
mod error_tests {
    use crabtether::errors::TetherError;
    use std::error::Error;

    #[test]
    fn test_status_errors_carry_code_and_description() {
        let error = TetherError::port_lookup(-5, "Unknown port".to_string());
        assert_eq!(error.status(), Some(-5));
        assert_eq!(error.to_string(), "Port lookup failed: Unknown port (-5)");
    }

    #[test]
    fn test_each_stage_has_its_own_variant() {
        let errors = vec![
            TetherError::backend_allocation(-3, "Out of memory".to_string()),
            TetherError::capability_lookup(-105, "Unknown model".to_string()),
            TetherError::port_lookup(-5, "Unknown port".to_string()),
            TetherError::session_init(-10, "Timeout".to_string()),
            TetherError::config_fetch(-7, "I/O problem".to_string()),
            TetherError::config_commit(-1, "Unspecified error".to_string()),
            TetherError::capture(-7, "I/O problem".to_string()),
        ];

        for (i, a) in errors.iter().enumerate() {
            assert!(a.status().is_some());
            for b in errors.iter().skip(i + 1) {
                assert_ne!(
                    std::mem::discriminant(a),
                    std::mem::discriminant(b),
                    "{a} and {b} share a variant"
                );
            }
        }
    }

    #[test]
    fn test_non_status_errors_have_no_code() {
        let errors = vec![
            TetherError::MalformedDiscoveryEvent("missing property".to_string()),
            TetherError::InvalidState("not live".to_string()),
            TetherError::Config("bad".to_string()),
            TetherError::Discovery("daemon".to_string()),
            TetherError::Unsupported("trigger capture".to_string()),
        ];
        for error in errors {
            assert_eq!(error.status(), None);
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_display_format() {
        let error = TetherError::MalformedDiscoveryEvent("missing property sid.canon.com".to_string());
        assert_eq!(
            error.to_string(),
            "Malformed discovery event: missing property sid.canon.com"
        );
        let init = TetherError::session_init(-10, "Timeout reading from or writing to the port".to_string());
        assert!(init.to_string().starts_with("Session init failed"));
        assert!(init.to_string().ends_with("(-10)"));
    }

    #[test]
    fn test_implements_error_trait() {
        let error = TetherError::InvalidState("Error trait test".to_string());
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_clone_and_eq() {
        let error = TetherError::capability_lookup(-105, "Unknown model".to_string());
        assert_eq!(error.clone(), error);
    }
}

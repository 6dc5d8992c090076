#[cfg(test)]
mod config_tests {
    use crabtether::config::TetherConfig;
    use crabtether::errors::TetherError;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("crabtether.toml");

        let mut config = TetherConfig::default();
        config.session.init_timeout_ms = 2_500;
        config.settings.freshness_window_ms = 750;
        config.discovery.service_types = vec!["_ptp._tcp.local.".to_string()];
        config.save_to_file(&path).unwrap();

        let loaded = TetherConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.session.init_timeout(), Duration::from_millis(2_500));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let loaded = TetherConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, TetherConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[discovery]\nmax_active_sessions = 0\n").unwrap();

        let err = TetherConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
    }

    #[test]
    fn test_unparseable_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let err = TetherConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_overrides_keep_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[session]\nmodel_tag = \"Other Camera\"\n\n[discovery]\nvendor_property = \"sid.example.com\"\n",
        )
        .unwrap();

        let loaded = TetherConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.session.model_tag, "Other Camera");
        assert_eq!(loaded.session.transport_scheme, "ptpip");
        assert_eq!(loaded.discovery.vendor_property, "sid.example.com");
        assert_eq!(loaded.discovery.max_active_sessions, 1);
    }
}

use registrar::error::ConfigError;
use registrar::settings::Settings;

#[test]
fn test_defaults() {
    let settings = Settings::default();
    assert_eq!(settings.http_addr(), "127.0.0.1:8080");
    assert_eq!(settings.template.dir, "templates");
    assert_eq!(settings.database.migrations_dir, "migrations");
}

#[test]
fn test_partial_toml_falls_back_to_defaults() {
    let settings = Settings::from_toml(
        r#"
        port = 9000

        [database]
        url = "sqlite::memory:"
        "#,
        "inline",
    )
    .unwrap();
    assert_eq!(settings.port, 9000);
    assert_eq!(settings.host, "127.0.0.1");
    assert_eq!(settings.database.url, "sqlite::memory:");
    assert_eq!(settings.database.max_connections, 5);
    assert!(!settings.template.debug);
}

#[test]
fn test_invalid_toml_is_reported() {
    let err = Settings::from_toml("port = \"eighty\"", "inline").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_missing_file_is_reported() {
    let err = Settings::from_file("no/such/registrar.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_shipped_config_parses() {
    let settings = Settings::from_file("registrar.toml").unwrap();
    assert_eq!(settings.template.dir, "templates");
}

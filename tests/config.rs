use std::fs;
use std::path::PathBuf;

use steward::config::{LogLevel, StewardConfig};

fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
    let f = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    fs::write(f.path(), contents).unwrap();
    f
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let cfg = StewardConfig::load_with_overrides(
        Some(PathBuf::from("/definitely/not/here.yaml")),
        None,
        None,
        None,
    )
    .unwrap();

    assert_eq!(cfg.server.host, "localhost");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.security.max_concurrent_operations, 10);
    assert_eq!(cfg.security.command_timeout, 30_000);
    assert!(cfg.security.audit_all);
    assert!(cfg.security.allowed_commands.is_empty());
    assert_eq!(cfg.snapshots.dir, PathBuf::from("snapshots"));
}

#[test]
fn full_yaml_is_parsed() {
    let f = write_temp_config(
        r#"
server:
  host: 127.0.0.1
  port: 9090
logging:
  level: debug
  logDir: /var/log/steward
  maxFiles: 7
security:
  requireAuth: true
  allowedCommands: [ls, systemctl, pacman]
  maxConcurrentOperations: 4
  commandTimeout: 15000
  auditAll: false
snapshots:
  dir: /var/lib/steward/snapshots
plugins:
  system:
    enabled: true
  packages:
    enabled: false
    backend: pacman
"#,
    );

    let cfg =
        StewardConfig::load_with_overrides(Some(f.path().to_path_buf()), None, None, None).unwrap();

    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9090);
    assert_eq!(cfg.logging.level, LogLevel::Debug);
    assert_eq!(cfg.logging.log_dir, PathBuf::from("/var/log/steward"));
    assert_eq!(cfg.logging.max_files, 7);
    assert!(cfg.security.require_auth);
    assert_eq!(
        cfg.security.allowed_commands,
        vec!["ls", "systemctl", "pacman"]
    );
    assert_eq!(cfg.security.max_concurrent_operations, 4);
    assert_eq!(cfg.security.command_timeout, 15_000);
    assert!(!cfg.security.audit_all);
    assert!(cfg.plugin_enabled("system"));
    assert!(!cfg.plugin_enabled("packages"));
    assert!(!cfg.plugin_enabled("never-mentioned"));

    // Plugin-specific sub-options pass through opaquely.
    let packages = cfg.plugins.get("packages").unwrap();
    assert!(packages.options.contains_key("backend"));
}

#[test]
fn partial_yaml_keeps_defaults_for_missing_blocks() {
    let f = write_temp_config("server:\n  port: 3000\n");

    let cfg =
        StewardConfig::load_with_overrides(Some(f.path().to_path_buf()), None, None, None).unwrap();

    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.server.host, "localhost");
    assert_eq!(cfg.security.max_concurrent_operations, 10);
    assert_eq!(cfg.logging.level, LogLevel::Info);
}

#[test]
fn cli_overrides_beat_file_values() {
    let f = write_temp_config("server:\n  host: 10.0.0.1\n  port: 3000\n");

    let cfg = StewardConfig::load_with_overrides(
        Some(f.path().to_path_buf()),
        Some("0.0.0.0".to_string()),
        Some(4000),
        Some(LogLevel::Warn),
    )
    .unwrap();

    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 4000);
    assert_eq!(cfg.logging.level, LogLevel::Warn);
    assert_eq!(cfg.bind_address(), "0.0.0.0:4000");
}

#[test]
fn malformed_yaml_reports_location() {
    let f = write_temp_config("server:\n  port: [not a number\n");

    let err = StewardConfig::load_with_overrides(Some(f.path().to_path_buf()), None, None, None)
        .unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
}

#[test]
fn out_of_bounds_values_are_rejected() {
    let f = write_temp_config("security:\n  commandTimeout: 100\n");
    let err = StewardConfig::load_with_overrides(Some(f.path().to_path_buf()), None, None, None)
        .unwrap_err();
    assert!(err.to_string().contains("commandTimeout"));

    let f = write_temp_config("security:\n  maxConcurrentOperations: 0\n");
    let err = StewardConfig::load_with_overrides(Some(f.path().to_path_buf()), None, None, None)
        .unwrap_err();
    assert!(err.to_string().contains("maxConcurrentOperations"));

    let f = write_temp_config("server:\n  port: 0\n");
    let err = StewardConfig::load_with_overrides(Some(f.path().to_path_buf()), None, None, None)
        .unwrap_err();
    assert!(err.to_string().contains("port"));
}

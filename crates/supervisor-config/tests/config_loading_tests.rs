//! Loading configuration files from disk

use std::fs;
use std::path::Path;
use supervisor_config::{ConfigError, RootConfig, ServiceConfig};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const ROOT: &str = r#"
[general]
version = "0.1.0"
root-domain = "example.net"
subdomain = "lab"

[services]
lock-dir = "run/locks"
location = "services.d"
"#;

#[test]
fn test_root_paths_resolve_against_config_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("etc");
    fs::create_dir_all(&nested).unwrap();
    let path = write(&nested, "config.toml", ROOT);

    let config = RootConfig::load(&path).unwrap();

    assert_eq!(config.services.lock_dir, nested.join("run/locks"));
    assert_eq!(config.services.location, nested.join("services.d"));
    assert!(config.services.lock_dir.is_absolute());
    assert_eq!(config.path(), path.as_path());
}

#[test]
fn test_root_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = RootConfig::load(dir.path().join("config.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn test_root_unparsable_file() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "config.toml", "[general\nversion = ");

    let err = RootConfig::load(&path).unwrap_err();
    match err {
        ConfigError::ParseError { path: failed, .. } => assert_eq!(failed, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_service_load_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "app1.toml",
        r#"
[info]
name = "App One"
description = "First app"

[provider]
slug = "docker"

[provider.options]
image = "not-pulled:v1"
"#,
    );

    let config = ServiceConfig::load(&path).unwrap();
    assert_eq!(config.info.name, "App One");
    assert_eq!(config.provider.slug, "docker");
}

#[test]
fn test_service_validation_error() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "blank.toml",
        r#"
[info]
name = ""
description = "No name"

[provider]
slug = "docker"
"#,
    );

    let err = ServiceConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_service_wrong_extension() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "app.json", "{}");

    let err = ServiceConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidExtension(_)));
}

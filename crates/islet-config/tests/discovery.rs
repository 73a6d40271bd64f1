//! Tests for config file discovery and loading

use islet_config::{ConfigDiscovery, ConfigError, IsletConfig};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn discovers_islet_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("islet.toml"),
        r#"
[build]
source_dir = "pages"
minify = true

[build.renderers]
html = "./render-html.js"
"#,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path());
    let found = discovery.find().unwrap();
    assert_eq!(found.file_name().unwrap(), "islet.toml");

    let config = discovery.load().unwrap();
    assert_eq!(config.build.source_dir, PathBuf::from("pages"));
    assert!(config.build.minify);
    assert_eq!(config.build.renderers["html"], "./render-html.js");
}

#[test]
fn discovers_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{
  "name": "site",
  "islet": {
    "build": { "public_path": "/assets/" }
  }
}"#,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path());
    assert_eq!(discovery.find().unwrap().file_name().unwrap(), "package.json");

    let config = discovery.load().unwrap();
    assert_eq!(config.build.public_path, "/assets/");
}

#[test]
fn toml_takes_precedence_over_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("islet.toml"),
        "[build]\npublic_path = \"/toml/\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{ "islet": { "build": { "public_path": "/pkg/" } } }"#,
    )
    .unwrap();

    let config = ConfigDiscovery::new(dir.path()).load().unwrap();
    assert_eq!(config.build.public_path, "/toml/");
}

#[test]
fn package_json_without_islet_field_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{ "name": "site" }"#).unwrap();

    let discovery = ConfigDiscovery::new(dir.path());
    assert!(discovery.find().is_none());
    assert!(matches!(discovery.load(), Err(ConfigError::NotFound)));
}

#[test]
fn load_without_file_uses_defaults_rooted_at_project() {
    let dir = TempDir::new().unwrap();

    let config = IsletConfig::load(dir.path(), None).unwrap();
    assert_eq!(config.build.source_dir, dir.path().join("src"));
    assert_eq!(config.build.out_dir, dir.path().join("dist"));
    assert!(config.build.renderers.contains_key("html"));
}

#[test]
fn load_replaces_default_renderer_table() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("islet.toml"),
        "[build.renderers]\ntxt = \"./render-txt.js\"\n",
    )
    .unwrap();

    let config = IsletConfig::load(dir.path(), None).unwrap();
    assert_eq!(config.build.renderers.len(), 1);
    assert_eq!(config.build.renderers["txt"], "./render-txt.js");
}

#[test]
fn invalid_toml_reports_hint() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("islet.toml"), "[build\n").unwrap();

    let err = ConfigDiscovery::new(dir.path()).load().unwrap_err();
    assert!(err.to_string().contains("Invalid TOML syntax"));
}

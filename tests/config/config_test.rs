//! Coverage for config parsing, file loading and overrides.

use std::time::Duration;

use secrets_admission::config::{ClusterConfig, ServerConfig, ENV_LOOKUP_ADDR};

#[test]
fn parse_full_config() {
    let toml_str = r#"
[lookup]
address = "https://vault.example.com:8200"
timeout_secs = 4

[clusters.default]
enabled = true
allow_unauthenticated = false
namespace = "engineering"

[clusters.legacy]
enabled = false

[namespaces.prod]
allowed = ["default", "infra-*"]
denied = ["legacy"]
"#;
    let config = match ServerConfig::from_toml(toml_str) {
        Ok(config) => config,
        Err(err) => panic!("config should parse: {err}"),
    };

    assert_eq!(config.lookup.address, "https://vault.example.com:8200");
    assert_eq!(config.lookup.timeout(), Duration::from_secs(4));

    let default = config.cluster("default").expect("default cluster");
    assert!(default.enabled);
    assert!(default.requires_auth());
    assert_eq!(default.namespace.as_deref(), Some("engineering"));

    let legacy = config.cluster("legacy").expect("legacy cluster");
    assert_eq!(legacy, &ClusterConfig::default());

    let rule = config.namespace_rule("prod").expect("prod rule");
    assert_eq!(rule.allowed, vec!["default", "infra-*"]);
    assert_eq!(rule.denied, vec!["legacy"]);
    assert!(config.namespace_rule("dev").is_none());
}

#[test]
fn empty_config_uses_defaults() {
    let config = ServerConfig::from_toml("").expect("empty config parses");
    assert!(config.clusters.is_empty());
    assert_eq!(config.lookup.timeout_secs, 10);
    assert!(config.cluster("default").is_none());
}

#[test]
fn wrongly_typed_field_is_rejected() {
    let result = ServerConfig::from_toml("[clusters.default]\nenabled = \"yes\"\n");
    assert!(result.is_err());
}

#[test]
fn missing_file_yields_defaults() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let config = ServerConfig::load(&tmp.path().join("absent.toml")).expect("defaults");
    assert!(config.clusters.is_empty());
}

#[test]
fn load_reads_file() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("server.toml");
    std::fs::write(&path, "[clusters.default]\nenabled = true\n").expect("write config");

    let config = ServerConfig::load(&path).expect("config loads");
    assert!(config.cluster("default").is_some_and(|c| c.enabled));
}

#[test]
fn malformed_file_reports_path() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("broken.toml");
    std::fs::write(&path, "[clusters.default\n").expect("write config");

    let err = ServerConfig::load(&path).expect_err("malformed config must fail");
    assert!(format!("{err:#}").contains("broken.toml"));
}

#[test]
fn env_override_beats_file_value() {
    let mut config = ServerConfig::from_toml("[lookup]\naddress = \"http://file:8200\"\n")
        .expect("config parses");
    config.apply_overrides(|key| (key == ENV_LOOKUP_ADDR).then(|| "http://env:8200".to_owned()));
    assert_eq!(config.lookup.address, "http://env:8200");
}

#[test]
fn logging_section_parses() {
    let config = ServerConfig::from_toml(
        "[logging]\nlevel = \"secrets_admission=debug\"\ndir = \"/var/log/admission\"\njson = true\n",
    )
    .expect("config parses");
    assert_eq!(config.logging.level, "secrets_admission=debug");
    assert_eq!(
        config.logging.dir.as_deref(),
        Some(std::path::Path::new("/var/log/admission"))
    );
    assert!(config.logging.json);
}

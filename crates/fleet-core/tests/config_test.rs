use std::io::Write;

use fleet_core::config::{Config, ConfigError, LogFormat};

#[test]
fn default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.general.log_format, LogFormat::Pretty);
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.pipeline.max_qa_rounds, 3);
    assert_eq!(cfg.pipeline.factory_repo_name, "cycle-apps-factory");
    assert!(cfg.pipeline.factory_repo.ends_with("cycle-apps-factory"));
    assert_eq!(cfg.agent.binary, "claude");
    assert_eq!(cfg.agent.default_model, "sonnet");
    assert_eq!(cfg.agent.default_max_turns, 200);
    assert_eq!(cfg.agent.log_tail_bytes, 8192);
    assert_eq!(cfg.tracker.binary, "bd");
    assert_eq!(cfg.tracker.cache_ttl_secs, 10);
    cfg.validate().expect("defaults validate");
}

#[test]
fn config_roundtrip() {
    let cfg = Config::default();
    let toml_str = cfg.to_toml().expect("serialize to toml");
    assert!(toml_str.contains("cycle-apps-factory"));

    let parsed = Config::from_toml(&toml_str).expect("parse toml back");
    assert_eq!(parsed.server.port, cfg.server.port);
    assert_eq!(parsed.pipeline.apps_root, cfg.pipeline.apps_root);
    assert_eq!(parsed.agent.output_format, cfg.agent.output_format);
}

#[test]
fn config_partial_toml() {
    let partial = r#"
[general]
log_format = "json"

[pipeline]
factory_repo = "/srv/factory"
apps_root = "/srv/apps"
max_qa_rounds = 5
"#;
    let cfg = Config::from_toml(partial).expect("parse partial");
    assert_eq!(cfg.general.log_format, LogFormat::Json);
    assert_eq!(cfg.pipeline.max_qa_rounds, 5);
    assert_eq!(
        cfg.pipeline.app_repo("LensCycle"),
        std::path::PathBuf::from("/srv/apps/LensCycle")
    );
    // defaults should fill in the rest
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.server.port, 3000);
}

#[test]
fn zero_qa_rounds_rejected() {
    let err = Config::from_toml("[pipeline]\nmax_qa_rounds = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn invalid_toml_is_parse_error() {
    let err = Config::from_toml("[server\nport = 1").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nport = 4100\n\n[tracker]\ncache_ttl_secs = 2").unwrap();

    let cfg = Config::load_from(file.path()).expect("load from file");
    assert_eq!(cfg.server.port, 4100);
    assert_eq!(cfg.tracker.cache_ttl_secs, 2);
}

#[test]
fn load_from_missing_file_is_io_error() {
    let err = Config::load_from("/definitely/not/here/config.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

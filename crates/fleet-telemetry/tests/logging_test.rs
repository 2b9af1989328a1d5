use fleet_core::config::{GeneralConfig, LogFormat};
use fleet_telemetry::logging;

#[test]
fn test_init_logging_is_idempotent() {
    logging::init_logging("fleetd-test", "debug");
    logging::init_logging("fleetd-test", "info");

    tracing::info!(epic_id = "epic-1", "human-readable log line");
}

#[test]
fn test_init_logging_json_after_another_subscriber() {
    // Whichever test runs first owns the global subscriber; this must not panic.
    logging::init_logging_json("fleetd-test-json", "info");

    tracing::info!(action = "start-research", "json log line");
}

#[test]
fn test_init_from_config_both_formats() {
    let mut general = GeneralConfig::default();
    logging::init_from_config("fleetd-config", &general);

    general.log_format = LogFormat::Json;
    general.log_level = "warn".into();
    logging::init_from_config("fleetd-config", &general);
}

#[test]
fn test_invalid_level_falls_back_gracefully() {
    std::env::remove_var("RUST_LOG");
    logging::init_logging("fleetd-fallback", "not-a-level");
}

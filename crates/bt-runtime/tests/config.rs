use std::time::Duration;

use bt_runtime::{ConfigError, SchedulerConfig};

#[test]
fn yaml_fields_override_defaults() {
    let config = SchedulerConfig::from_yaml_str("tick_budget_ms: 250\n").unwrap();
    assert_eq!(config.tick_budget(), Some(Duration::from_millis(250)));
    assert!(!config.debugger_attached);

    let config = SchedulerConfig::from_yaml_str("debugger_attached: true\n").unwrap();
    assert_eq!(config.tick_budget_ms, Some(1000));
    assert_eq!(config.tick_budget(), None);
}

#[test]
fn null_budget_disables_the_valve() {
    let config = SchedulerConfig::from_yaml_str("tick_budget_ms: null\n").unwrap();
    assert_eq!(config.tick_budget_ms, None);
    assert_eq!(config.tick_budget(), None);
}

#[test]
fn empty_document_uses_defaults() {
    let config = SchedulerConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, SchedulerConfig::default());
}

#[test]
fn invalid_yaml_is_a_parse_error() {
    let err = SchedulerConfig::from_yaml_str("tick_budget_ms: soon\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_reads_from_disk() {
    let dir = std::env::temp_dir().join(format!("bt-runtime-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("scheduler.yaml");
    std::fs::write(&path, "tick_budget_ms: 40\ndebugger_attached: false\n").unwrap();

    let config = SchedulerConfig::load(&path).unwrap();
    assert_eq!(config.tick_budget(), Some(Duration::from_millis(40)));

    let missing = SchedulerConfig::load(&dir.join("absent.yaml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));
    std::fs::remove_dir_all(&dir).ok();
}

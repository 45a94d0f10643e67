//! Unit tests for the validation message filters and counters

use ash::vk;
use serial_test::serial;
use super::*;

type Sev = vk::DebugUtilsMessageSeverityFlagsEXT;
type Kind = vk::DebugUtilsMessageTypeFlagsEXT;

fn config(severity: DebugSeverity) -> Config {
    Config { severity, message_filter: DebugMessageFilter::default(), enable_stats: true }
}

#[test]
fn test_map_severity() {
    assert_eq!(map_severity(Sev::ERROR), LogSeverity::Error);
    assert_eq!(map_severity(Sev::WARNING), LogSeverity::Warn);
    assert_eq!(map_severity(Sev::INFO), LogSeverity::Info);
    assert_eq!(map_severity(Sev::VERBOSE), LogSeverity::Debug);
}

#[test]
fn test_severity_filter() {
    assert!(passes_severity(DebugSeverity::ErrorsOnly, Sev::ERROR));
    assert!(!passes_severity(DebugSeverity::ErrorsOnly, Sev::WARNING));
    assert!(passes_severity(DebugSeverity::ErrorsAndWarnings, Sev::WARNING));
    assert!(!passes_severity(DebugSeverity::ErrorsAndWarnings, Sev::INFO));
    assert!(passes_severity(DebugSeverity::All, Sev::VERBOSE));
}

#[test]
fn test_category_filter() {
    let mut filter = DebugMessageFilter::default();
    assert_eq!(category(&filter, Kind::VALIDATION), Some("Validation"));
    assert_eq!(category(&filter, Kind::PERFORMANCE), Some("Performance"));
    assert_eq!(category(&filter, Kind::GENERAL), Some("General"));

    filter.show_performance = false;
    assert_eq!(category(&filter, Kind::PERFORMANCE), None);
    assert_eq!(category(&filter, Kind::VALIDATION | Kind::PERFORMANCE), Some("Validation"));
}

#[test]
fn test_messenger_flags_follow_filter() {
    assert_eq!(messenger_severity_flags(DebugSeverity::ErrorsOnly), Sev::ERROR);
    assert!(messenger_severity_flags(DebugSeverity::ErrorsAndWarnings).contains(Sev::WARNING));
    assert!(messenger_severity_flags(DebugSeverity::All).contains(Sev::VERBOSE));
}

#[test]
#[serial]
fn test_handle_message_counts_and_groups() {
    init_debug_config(config(DebugSeverity::ErrorsAndWarnings));

    let first = handle_message(Sev::ERROR, Kind::VALIDATION, "VUID-1", "bad barrier");
    assert_eq!(first.as_deref(), Some("[Validation] VUID-1: bad barrier"));
    let second = handle_message(Sev::ERROR, Kind::VALIDATION, "VUID-1", "bad barrier");
    assert_eq!(second.as_deref(), Some("[Validation] VUID-1: bad barrier [x2]"));
    handle_message(Sev::WARNING, Kind::PERFORMANCE, "perf", "slow path");

    // below the severity threshold: neither logged nor counted
    assert!(handle_message(Sev::INFO, Kind::GENERAL, "info", "loader").is_none());

    let stats = get_validation_stats();
    assert_eq!(stats, ValidationStats { errors: 2, warnings: 1, info: 0, verbose: 0 });
    assert!(stats.has_errors());

    cleanup_debug_config();
}

#[test]
#[serial]
fn test_handle_message_without_config_is_ignored() {
    init_debug_config(config(DebugSeverity::All));
    cleanup_debug_config();

    assert!(handle_message(Sev::ERROR, Kind::VALIDATION, "id", "msg").is_none());
    assert_eq!(get_validation_stats().total(), 0);
}

#[test]
#[serial]
fn test_stats_disabled() {
    let mut cfg = config(DebugSeverity::All);
    cfg.enable_stats = false;
    init_debug_config(cfg);

    let line = handle_message(Sev::ERROR, Kind::GENERAL, "id", "repeated");
    handle_message(Sev::ERROR, Kind::GENERAL, "id", "repeated");

    assert_eq!(line.as_deref(), Some("[General] id: repeated"));
    assert_eq!(get_validation_stats().total(), 0);
    cleanup_debug_config();
}

#[test]
fn test_config_from_engine_config() {
    let engine_config = sandbox_3d_engine::sandbox3d::Config::default()
        .with_debug_severity(DebugSeverity::All)
        .with_validation_stats(false);
    let cfg = Config::from(&engine_config);

    assert_eq!(cfg.severity, DebugSeverity::All);
    assert!(!cfg.enable_stats);
    assert_eq!(cfg.message_filter, DebugMessageFilter::default());
}

//! Integration tests for the paged logger
//!
//! These tests verify:
//! - Level gating and ordering through the whole pipeline
//! - Paging, failure isolation and drain on close
//! - Rolling file output
//! - Trace probes and correlation
//! - Configuration-driven loggers

use rust_paged_logger::core::process_context::ProcessContext;
use rust_paged_logger::core::{LogEvent, LoggerError, MessageClass};
use rust_paged_logger::persisters::{MemoryStore, RollPolicy};
use rust_paged_logger::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Logger over a memory store whose timer never fires during a test
fn memory_logger(page_size: usize) -> (Logger, MemoryStore) {
    let persister = MemoryPersister::new();
    let store = persister.store();
    let logger = Logger::builder()
        .process_context(ProcessContext::fixed("itest", "test", "itest-host"))
        .page_size(page_size)
        .flush_interval(Duration::from_secs(3600))
        .capture_stack(false)
        .persister(persister)
        .build()
        .expect("Failed to build logger");
    (logger, store)
}

#[test]
fn test_only_enabled_levels_reach_persister() {
    let persister = MemoryPersister::new();
    let store = persister.store();
    let logger = Logger::builder()
        .enabled_levels(&[LogLevel::Information, LogLevel::Error])
        .persister(persister)
        .build()
        .expect("Failed to build logger");

    assert!(logger.debug("x").is_none());
    assert!(logger.trace("y").is_none());
    assert!(logger.info("z").is_some());
    assert!(logger.error("boom").is_some());
    logger.close();

    assert_eq!(store.texts(), vec!["z", "boom"]);
}

#[test]
fn test_pages_are_full_and_ordered() {
    let (logger, store) = memory_logger(100);

    for i in 0..250 {
        logger.info(format!("m{}", i));
    }
    logger.close();

    assert_eq!(store.page_sizes(), vec![100, 100, 50]);
    let expected: Vec<String> = (0..250).map(|i| format!("m{}", i)).collect();
    assert_eq!(store.texts(), expected);
}

#[test]
fn test_failed_page_does_not_stop_worker() {
    let persister = MemoryPersister::new().failing_pages([2]);
    let store = persister.store();
    let logger = Logger::builder()
        .page_size(10)
        .flush_interval(Duration::from_secs(3600))
        .persister(persister)
        .build()
        .expect("Failed to build logger");

    for i in 0..30 {
        logger.info(format!("m{}", i));
    }
    logger.flush().expect("Failed to flush");

    let expected: Vec<String> = (0..10).chain(20..30).map(|i| format!("m{}", i)).collect();
    assert_eq!(store.texts(), expected);
    assert_eq!(logger.metrics().failed_pages(), 1);
    assert_eq!(logger.metrics().lost(), 10);

    // worker still alive
    logger.info("after failure");
    logger.flush().expect("Failed to flush");
    assert_eq!(store.texts().last().map(String::as_str), Some("after failure"));
    logger.close();
}

#[test]
fn test_close_drains_pending_messages() {
    let (logger, store) = memory_logger(100);

    for i in 0..10 {
        logger.info(format!("rapid {}", i));
    }
    logger.close();

    assert_eq!(store.len(), 10);
    assert_eq!(store.close_count(), 1);
    assert_eq!(logger.metrics().delivered(), 10);
}

#[test]
fn test_close_without_messages() {
    let (logger, store) = memory_logger(100);
    logger.close();

    assert!(store.is_empty());
    assert_eq!(store.initialize_count(), 0);
    assert_eq!(store.close_count(), 1);

    // a second close is harmless
    logger.close();
    assert_eq!(store.close_count(), 1);
}

#[test]
fn test_persister_initialized_once() {
    let (logger, store) = memory_logger(5);
    for i in 0..23 {
        logger.warn(format!("w{}", i));
    }
    logger.close();

    assert_eq!(store.initialize_count(), 1);
    assert_eq!(store.len(), 23);
}

#[test]
fn test_flush_interval_delivers_partial_page() {
    let persister = MemoryPersister::new();
    let store = persister.store();
    let logger = Logger::builder()
        .page_size(1000)
        .flush_interval(Duration::from_millis(20))
        .persister(persister)
        .build()
        .expect("Failed to build logger");

    logger.info("lonely");
    let mut waited = Duration::ZERO;
    while store.is_empty() && waited < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(10));
        waited += Duration::from_millis(10);
    }

    assert_eq!(store.texts(), vec!["lonely"]);
    logger.close();
}

#[test]
fn test_rolling_file_end_to_end() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("app.log");

    let persister = RollingFilePersister::with_policy(
        &log_file,
        RollPolicy::new().with_max_size(2048).with_max_backups(2),
    );
    let logger = Logger::builder()
        .page_size(10)
        .capture_stack(false)
        .persister(persister)
        .build()
        .expect("Failed to build logger");

    for i in 0..200 {
        logger.info(format!("record number {}", i));
    }
    logger.close();

    assert!(log_file.exists());
    assert!(temp_dir.path().join("app.log.1").exists());
    assert!(temp_dir.path().join("app.log.2").exists());
    assert!(!temp_dir.path().join("app.log.3").exists());

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("record number 199"));
    assert!(content.contains("    Log Level: INFORMATION"));
}

#[test]
fn test_rolling_file_escapes_newlines() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("injection.log");

    let logger = Logger::builder()
        .persister(RollingFilePersister::new(&log_file))
        .build()
        .expect("Failed to build logger");

    logger.info("User login\nERROR fake entry");
    logger.close();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("  User login\\nERROR fake entry\n"));
    assert!(!content.contains("\nERROR fake entry"));
}

#[test]
fn test_json_lines_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("records.jsonl");

    let logger = Logger::builder()
        .persister(RollingFilePersister::new(&log_file).with_format(RecordFormat::JsonLines))
        .build()
        .expect("Failed to build logger");

    logger.info("first");
    logger.error_error(&LoggerError::other("second"));
    logger.close();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let records: Vec<LogMessage> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("Invalid JSON record"))
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message_text, "first");
    assert_eq!(records[1].level(), LogLevel::Error);
    assert_eq!(records[1].error.as_ref().map(|e| e.description.as_str()), Some("second"));
}

#[test]
fn test_trace_probe_through_pipeline() {
    let (logger, store) = memory_logger(100);
    logger.enable(LogLevel::Trace);

    let (outer_id, inner_id) = {
        let outer = logger.new_trace_in("Request");
        let inner = logger.new_trace_in("Query");
        (outer.tracer_id(), inner.tracer_id())
    };
    logger.close();

    let messages = store.messages();
    assert_eq!(messages.len(), 4);
    assert!(messages.iter().all(|m| m.message_class == MessageClass::Tracing));

    let inner_enter = messages[1].trace.as_ref().unwrap();
    assert_eq!(inner_enter.tracer_id, inner_id);
    assert_eq!(inner_enter.parent_id, outer_id);
    assert_eq!(messages[3].trace.as_ref().unwrap().tracer_id, outer_id);
}

#[test]
fn test_trace_probe_pops_on_panic() {
    let (logger, store) = memory_logger(100);
    logger.enable(LogLevel::Trace);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _probe = logger.new_trace_in("Exploding");
        panic!("operation failed");
    }));
    assert!(result.is_err());
    assert_eq!(logger.correlation().depth(), 0);
    logger.close();

    assert_eq!(store.texts(), vec!["Enter Exploding", "Exit Exploding"]);
}

#[test]
fn test_correlation_shared_across_loggers() {
    let (logger, store) = memory_logger(100);
    let ctx = CorrelationContext::new().shared();
    let api = logger.named("api").with_correlation(Arc::clone(&ctx));
    let db = logger.named("db").with_correlation(Arc::clone(&ctx));

    api.info("request received");
    db.info("query executed");
    logger.info("unrelated");
    logger.close();

    let messages = store.messages();
    assert_eq!(messages[0].activity_id, ctx.activity_id());
    assert_eq!(messages[1].activity_id, ctx.activity_id());
    assert_ne!(messages[2].activity_id, ctx.activity_id());
    assert_eq!(messages[1].logger_name, "db");
}

#[test]
fn test_fallback_text_is_logged() {
    let (logger, store) = memory_logger(100);
    logger.warn_fmt("user {0} has {1} items", &[&"alice"]);
    logger.close();

    let text = &store.texts()[0];
    assert!(text.starts_with("Unable to format message 'user {0} has {1} items' with 1 argument(s)"));
}

#[test]
fn test_event_with_error_and_number() {
    let (logger, store) = memory_logger(100);
    let err = LoggerError::persister("db", "connection reset");
    logger.error_event(LogEvent::new().number(42).error(&err).sub_key("orders"));
    logger.close();

    let msg = &store.messages()[0];
    assert_eq!(msg.message_number, 42);
    assert_eq!(msg.sub_key.as_deref(), Some("orders"));
    assert_eq!(msg.message_text, err.to_string());
    assert!(msg.runtime_context.is_some());
}

#[test]
fn test_config_driven_logger() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("configured.log");

    let mut settings = HashMap::new();
    settings.insert("application_key".to_string(), "inventory".to_string());
    settings.insert("active_environment".to_string(), "staging".to_string());
    settings.insert("persister".to_string(), "rolling_file".to_string());
    settings.insert("log_file_path".to_string(), log_file.display().to_string());
    settings.insert("minimum_level".to_string(), "warning".to_string());
    settings.insert("page_size".to_string(), "5".to_string());
    settings.insert("capture_stack".to_string(), "false".to_string());

    let config = LoggingConfig::from_map(&settings).expect("Invalid configuration");
    let logger = Logger::from_config(config).expect("Failed to build logger");

    assert!(logger.info("filtered").is_none());
    logger.warn("low stock");
    logger.close();

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("  Application: inventory"));
    assert!(content.contains("  Environment: staging"));
    assert!(content.contains("  low stock"));
    assert!(!content.contains("filtered"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = Logger::builder()
        .page_size(0)
        .persister(MemoryPersister::new())
        .build();
    assert!(matches!(result, Err(LoggerError::InvalidConfiguration { .. })));

    let settings = HashMap::new();
    let missing = LoggingConfig::require(&settings, "application_key");
    assert!(matches!(missing, Err(LoggerError::MissingSetting { .. })));
}

#[test]
fn test_submit_after_close_is_counted() {
    let (logger, store) = memory_logger(100);
    logger.close();

    for _ in 0..5 {
        assert!(logger.error("too late").is_some());
    }
    assert_eq!(logger.metrics().rejected(), 5);
    assert!(store.is_empty());
}

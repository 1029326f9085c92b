//! Property-based tests for rust_paged_logger using proptest

use proptest::prelude::*;
use rust_paged_logger::core::async_buffer::{AsyncBuffer, BufferHandler, BufferOptions};
use rust_paged_logger::core::text_format::{format_or_fallback, format_positional};
use rust_paged_logger::prelude::*;
use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Debug),
        Just(LogLevel::Trace),
        Just(LogLevel::Information),
        Just(LogLevel::Warning),
        Just(LogLevel::Error),
        Just(LogLevel::Critical),
    ]
}

/// Records every page it receives; fails the listed page numbers
struct Recorder {
    pages: Arc<Mutex<Vec<Vec<u32>>>>,
    fail: Vec<usize>,
    seen: usize,
}

impl BufferHandler<u32> for Recorder {
    fn on_buffer_action(&mut self, page: Vec<u32>) -> rust_paged_logger::Result<()> {
        self.seen += 1;
        if self.fail.contains(&self.seen) {
            return Err(LoggerError::other("rejected"));
        }
        self.pages.lock().push(page);
        Ok(())
    }
}

fn run_buffer(items: &[u32], page_size: usize, fail: Vec<usize>) -> Vec<Vec<u32>> {
    let pages = Arc::new(Mutex::new(Vec::new()));
    let handler = Recorder {
        pages: Arc::clone(&pages),
        fail,
        seen: 0,
    };
    let buffer = AsyncBuffer::new(
        handler,
        BufferOptions {
            page_size,
            flush_interval: Duration::from_secs(3600),
            ..BufferOptions::default()
        },
    )
    .unwrap();

    for item in items {
        buffer.submit(*item).unwrap();
    }
    buffer.close();
    let result = pages.lock().clone();
    result
}

// ============================================================================
// Buffer Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Items from one producer are delivered in submission order
    #[test]
    fn test_delivery_preserves_order(
        items in prop::collection::vec(any::<u32>(), 0..400),
        page_size in 1usize..64,
    ) {
        let pages = run_buffer(&items, page_size, Vec::new());
        let delivered: Vec<u32> = pages.into_iter().flatten().collect();
        prop_assert_eq!(delivered, items);
    }

    /// No page is larger than the page size
    #[test]
    fn test_pages_never_exceed_page_size(
        count in 0usize..400,
        page_size in 1usize..64,
    ) {
        let items: Vec<u32> = (0..count as u32).collect();
        for page in run_buffer(&items, page_size, Vec::new()) {
            prop_assert!(!page.is_empty());
            prop_assert!(page.len() <= page_size);
        }
    }

    /// A failing page loses its items, nothing is delivered twice
    #[test]
    fn test_at_most_once_with_failures(
        count in 1usize..300,
        page_size in 1usize..32,
        fail in prop::collection::vec(1usize..20, 0..4),
    ) {
        let items: Vec<u32> = (0..count as u32).collect();
        let delivered: Vec<u32> = run_buffer(&items, page_size, fail)
            .into_iter()
            .flatten()
            .collect();

        prop_assert!(delivered.len() <= items.len());
        prop_assert!(delivered.windows(2).all(|w| w[0] < w[1]));
    }
}

// ============================================================================
// LogLevel / Priority Tests
// ============================================================================

proptest! {
    /// Priority follows the level unless explicitly overridden
    #[test]
    fn test_priority_derivation(level in any_level(), next in any_level()) {
        let mut msg = LogMessage::new(level, "p");
        prop_assert_eq!(msg.priority(), MessagePriority::for_level(level));

        msg.set_level(next);
        prop_assert_eq!(msg.priority(), MessagePriority::for_level(next));

        msg.override_priority(MessagePriority::Lowest);
        msg.set_level(level);
        prop_assert_eq!(msg.priority(), MessagePriority::Lowest);
    }

    /// Higher levels never get a lower priority
    #[test]
    fn test_priority_is_monotonic(a in any_level(), b in any_level()) {
        if a <= b {
            prop_assert!(a.priority() <= b.priority());
        }
    }

    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
    }

    /// The gate admits exactly the levels at or above its minimum
    #[test]
    fn test_gate_minimum(minimum in any_level(), level in any_level()) {
        let gate = LevelGate::at_least(minimum);
        prop_assert_eq!(gate.is_enabled(level), level >= minimum);
        prop_assert!(!gate.is_enabled(LogLevel::Off));
    }
}

// ============================================================================
// Formatting Tests
// ============================================================================

proptest! {
    /// Formatting never panics, whatever the template
    #[test]
    fn test_fallback_never_panics(
        template in ".{0,64}",
        args in prop::collection::vec(any::<i64>(), 0..4),
    ) {
        let refs: Vec<&dyn Display> = args.iter().map(|a| a as &dyn Display).collect();
        let text = format_or_fallback(&template, &refs);
        if format_positional(&template, &refs).is_err() {
            prop_assert!(text.starts_with("Unable to format message"));
        }
    }

    /// Templates without braces come back unchanged
    #[test]
    fn test_plain_template_unchanged(template in "[a-zA-Z0-9 .,:;!?-]{0,64}") {
        prop_assert_eq!(format_or_fallback(&template, &[]), template);
    }

    /// Sanitized text never spans more than one line
    #[test]
    fn test_sanitize_single_line(text in "(?s).{0,128}") {
        let clean = rust_paged_logger::core::record_format::sanitize(&text);
        prop_assert!(!clean.contains('\n'));
        prop_assert!(!clean.contains('\r'));
    }
}

//! Per-logger enabled/disabled state for each severity

use super::log_level::LogLevel;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Bitmask of enabled severities.
///
/// A level is enabled iff its bit is set. `Off` has no bit and is never
/// enabled. Updates are lock-free so a gate can be flipped while other
/// threads are logging.
pub struct LevelGate {
    mask: AtomicU8,
}

impl LevelGate {
    /// Information, Warning, Error and Critical enabled
    pub const DEFAULT_MASK: u8 = LogLevel::Information.bit()
        | LogLevel::Warning.bit()
        | LogLevel::Error.bit()
        | LogLevel::Critical.bit();

    pub fn new() -> Self {
        Self::from_mask(Self::DEFAULT_MASK)
    }

    pub const fn from_mask(mask: u8) -> Self {
        Self {
            mask: AtomicU8::new(mask),
        }
    }

    /// Gate with every level at or above `minimum` enabled
    pub fn at_least(minimum: LogLevel) -> Self {
        let gate = Self::from_mask(0);
        gate.set_minimum(minimum);
        gate
    }

    /// Gate with exactly the given levels enabled
    pub fn only(levels: &[LogLevel]) -> Self {
        let mask = levels.iter().fold(0u8, |acc, level| acc | level.bit());
        Self::from_mask(mask)
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        let bit = level.bit();
        bit != 0 && self.mask.load(Ordering::Relaxed) & bit == bit
    }

    pub fn enable(&self, level: LogLevel) {
        self.mask.fetch_or(level.bit(), Ordering::Relaxed);
    }

    pub fn disable(&self, level: LogLevel) {
        self.mask.fetch_and(!level.bit(), Ordering::Relaxed);
    }

    pub fn set(&self, level: LogLevel, enabled: bool) {
        if enabled {
            self.enable(level);
        } else {
            self.disable(level);
        }
    }

    /// Enable every level >= `minimum` and disable the rest
    pub fn set_minimum(&self, minimum: LogLevel) {
        let mask = LogLevel::ALL
            .iter()
            .filter(|level| **level >= minimum)
            .fold(0u8, |acc, level| acc | level.bit());
        self.mask.store(mask, Ordering::Relaxed);
    }

    pub fn disable_all(&self) {
        self.mask.store(0, Ordering::Relaxed);
    }

    pub fn mask(&self) -> u8 {
        self.mask.load(Ordering::Relaxed)
    }

    pub fn enabled_levels(&self) -> Vec<LogLevel> {
        LogLevel::ALL
            .into_iter()
            .filter(|level| self.is_enabled(*level))
            .collect()
    }
}

impl Default for LevelGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LevelGate {
    /// Snapshot of the current mask
    fn clone(&self) -> Self {
        Self::from_mask(self.mask())
    }
}

impl fmt::Debug for LevelGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelGate")
            .field("enabled", &self.enabled_levels())
            .finish()
    }
}

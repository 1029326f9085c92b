//! Message priority derived from severity

use super::log_level::LogLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How urgent the sender considers a message (`Lowest = 0` .. `Highest = 7`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessagePriority {
    Lowest = 0,
    VeryLow = 1,
    Low = 2,
    Normal = 3,
    AboveNormal = 4,
    High = 5,
    VeryHigh = 6,
    Highest = 7,
}

impl Default for MessagePriority {
    fn default() -> Self {
        MessagePriority::Normal
    }
}

impl MessagePriority {
    /// Fixed severity to priority table
    pub const fn for_level(level: LogLevel) -> Self {
        match level {
            LogLevel::Critical => MessagePriority::Highest,
            LogLevel::Error => MessagePriority::VeryHigh,
            LogLevel::Warning => MessagePriority::High,
            LogLevel::Information => MessagePriority::Normal,
            LogLevel::Trace => MessagePriority::Low,
            LogLevel::Debug => MessagePriority::VeryLow,
            LogLevel::Off => MessagePriority::Normal,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            MessagePriority::Lowest => "Lowest",
            MessagePriority::VeryLow => "VeryLow",
            MessagePriority::Low => "Low",
            MessagePriority::Normal => "Normal",
            MessagePriority::AboveNormal => "AboveNormal",
            MessagePriority::High => "High",
            MessagePriority::VeryHigh => "VeryHigh",
            MessagePriority::Highest => "Highest",
        }
    }
}

impl LogLevel {
    /// Priority a message at this level receives unless overridden
    #[inline]
    pub fn priority(&self) -> MessagePriority {
        MessagePriority::for_level(*self)
    }
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

//! Declarative trigger specifications attached to GROUP BY plans

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a grouping key's aggregate state should be emitted.
///
/// Specs are plain data; the streaming runtime turns them into live triggers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSpec {
    /// Fire every `count` records per key
    Counting { count: u64 },
    /// Fire once no record arrived for `delay_ms` after the last one
    Delay { delay_ms: u64 },
    /// Fire once the watermark passes the key's latest event time
    Watermark,
    /// Fire once the input is exhausted
    EndOfStream,
}

impl TriggerSpec {
    /// Delay trigger from a [`Duration`]
    pub fn delay(delay: Duration) -> Self {
        TriggerSpec::Delay {
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The debounce delay, if this is a delay trigger
    pub fn delay_duration(&self) -> Option<Duration> {
        match self {
            TriggerSpec::Delay { delay_ms } => Some(Duration::from_millis(*delay_ms)),
            _ => None,
        }
    }

    /// Short name used in plan descriptions and storage namespaces
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerSpec::Counting { .. } => "count",
            TriggerSpec::Delay { .. } => "delay",
            TriggerSpec::Watermark => "watermark",
            TriggerSpec::EndOfStream => "end_of_stream",
        }
    }
}

impl std::fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerSpec::Counting { count } => write!(f, "counting({count})"),
            TriggerSpec::Delay { delay_ms } => write!(f, "delay({delay_ms}ms)"),
            TriggerSpec::Watermark => write!(f, "watermark"),
            TriggerSpec::EndOfStream => write!(f, "end_of_stream"),
        }
    }
}

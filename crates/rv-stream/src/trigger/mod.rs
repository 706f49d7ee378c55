//! Grouping-key triggers
//!
//! A trigger decides when the aggregate state of a grouping key is emitted.
//! All state lives in the caller's transaction, so a trigger never commits or
//! observes partial writes on its own.

mod counting;
mod delay;
mod multi;
mod watermark;

pub use counting::CountingTrigger;
pub use delay::DelayTrigger;
pub use multi::MultiTrigger;
pub use watermark::WatermarkTrigger;

use crate::clock::Clock;
use crate::error::{StreamError, StreamResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rv_core::{TriggerSpec, Value};
use rv_storage::Transaction;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-key emission policy
#[async_trait]
pub trait Trigger: Send + Sync {
    /// One record arrived for `key`
    async fn record_received(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
        event_time: Option<DateTime<Utc>>,
    ) -> StreamResult<()>;

    /// The stream watermark advanced to `watermark`
    async fn update_watermark(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        watermark: DateTime<Utc>,
    ) -> StreamResult<()>;

    /// Take one eligible key, clearing its armed state.
    ///
    /// `Ok(None)` when no key is ready.
    async fn poll_key_to_fire(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
    ) -> StreamResult<Option<Value>>;

    /// `key` was emitted by another mechanism; forget its state
    async fn key_fired(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
    ) -> StreamResult<()>;

    /// Trigger kind, used in storage keys and logs
    fn kind(&self) -> &'static str;
}

pub(crate) fn check_cancelled(cancel: &CancellationToken) -> StreamResult<()> {
    if cancel.is_cancelled() {
        Err(StreamError::Cancelled)
    } else {
        Ok(())
    }
}

/// Live trigger for one spec, storing its state under `namespace`
pub fn build_trigger(
    namespace: &str,
    spec: &TriggerSpec,
    clock: Arc<dyn Clock>,
) -> Box<dyn Trigger> {
    build_indexed(namespace, spec, 0, clock)
}

/// Live trigger for a GroupBy's specs.
///
/// No specs means end of stream; several specs build a [`MultiTrigger`].
pub fn build_triggers(
    namespace: &str,
    specs: &[TriggerSpec],
    clock: Arc<dyn Clock>,
) -> Box<dyn Trigger> {
    match specs {
        [] => build_trigger(namespace, &TriggerSpec::EndOfStream, clock),
        [spec] => build_trigger(namespace, spec, clock),
        _ => Box::new(MultiTrigger::new(
            specs
                .iter()
                .enumerate()
                .map(|(index, spec)| build_indexed(namespace, spec, index, Arc::clone(&clock)))
                .collect(),
        )),
    }
}

fn build_indexed(
    namespace: &str,
    spec: &TriggerSpec,
    index: usize,
    clock: Arc<dyn Clock>,
) -> Box<dyn Trigger> {
    match spec {
        TriggerSpec::Counting { count } => {
            Box::new(CountingTrigger::new(namespace, index, *count))
        }
        TriggerSpec::Delay { delay_ms } => Box::new(DelayTrigger::new(
            namespace,
            index,
            std::time::Duration::from_millis(*delay_ms),
            clock,
        )),
        TriggerSpec::Watermark => Box::new(WatermarkTrigger::new(namespace, index)),
        TriggerSpec::EndOfStream => Box::new(WatermarkTrigger::end_of_stream(namespace, index)),
    }
}

#[cfg(test)]
#[path = "trigger_test.rs"]
mod tests;

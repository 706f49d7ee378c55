//! Fire a key as soon as any of several triggers does

use super::{check_cancelled, Trigger};
use crate::error::StreamResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rv_core::Value;
use rv_storage::Transaction;
use tokio_util::sync::CancellationToken;

/// Combines triggers: records and watermarks go to every child, and a key
/// fired by one child is reset in the others.
pub struct MultiTrigger {
    triggers: Vec<Box<dyn Trigger>>,
}

impl MultiTrigger {
    /// Combine `triggers`, polled in the given order
    pub fn new(triggers: Vec<Box<dyn Trigger>>) -> Self {
        Self { triggers }
    }
}

#[async_trait]
impl Trigger for MultiTrigger {
    async fn record_received(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
        event_time: Option<DateTime<Utc>>,
    ) -> StreamResult<()> {
        for trigger in &self.triggers {
            check_cancelled(cancel)?;
            trigger.record_received(cancel, tx, key, event_time).await?;
        }
        Ok(())
    }

    async fn update_watermark(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        watermark: DateTime<Utc>,
    ) -> StreamResult<()> {
        for trigger in &self.triggers {
            check_cancelled(cancel)?;
            trigger.update_watermark(cancel, tx, watermark).await?;
        }
        Ok(())
    }

    async fn poll_key_to_fire(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
    ) -> StreamResult<Option<Value>> {
        for (index, trigger) in self.triggers.iter().enumerate() {
            check_cancelled(cancel)?;
            let Some(key) = trigger.poll_key_to_fire(cancel, tx).await? else {
                continue;
            };
            for (other_index, other) in self.triggers.iter().enumerate() {
                if other_index != index {
                    other.key_fired(cancel, tx, &key).await?;
                }
            }
            log::trace!("Multi trigger fired key {} via {}", key, trigger.kind());
            return Ok(Some(key));
        }
        Ok(None)
    }

    async fn key_fired(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
    ) -> StreamResult<()> {
        for trigger in &self.triggers {
            check_cancelled(cancel)?;
            trigger.key_fired(cancel, tx, key).await?;
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "multi"
    }
}

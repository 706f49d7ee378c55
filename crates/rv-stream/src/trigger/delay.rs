//! Debounce: fire once a key has been quiet for a while

use super::{check_cancelled, Trigger};
use crate::clock::{add_saturating, Clock};
use crate::error::StreamResult;
use crate::state::{decode_key, decode_timestamp, encode_key, encode_timestamp, StateKeys};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rv_core::Value;
use rv_storage::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// `deadline/<timestamp><key>` → key
const DEADLINE: &str = "deadline";
/// `key/<key>` → timestamp of the key's current deadline
const KEY: &str = "key";

/// Makes a key eligible `delay` after its last record, by processing time.
///
/// Every record pushes the deadline forward. Keys that are due together fire
/// one per poll, earliest deadline first.
pub struct DelayTrigger {
    keys: StateKeys,
    delay: Duration,
    clock: Arc<dyn Clock>,
}

impl DelayTrigger {
    /// Delay trigger storing state as the `index`-th trigger of `namespace`
    pub fn new(namespace: &str, index: usize, delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: StateKeys::new(namespace, "delay", index),
            delay,
            clock,
        }
    }

    /// Drop the key's pending deadline, if any
    async fn disarm(&self, tx: &mut dyn Transaction, encoded: &[u8]) -> StreamResult<()> {
        let key_entry = self.keys.entry(KEY, encoded);
        if let Some(previous) = tx.get(&key_entry).await? {
            let deadline = decode_timestamp(&previous)?;
            tx.delete(&self.keys.timed_entry(DEADLINE, deadline, encoded))
                .await?;
            tx.delete(&key_entry).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Trigger for DelayTrigger {
    async fn record_received(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
        _event_time: Option<DateTime<Utc>>,
    ) -> StreamResult<()> {
        check_cancelled(cancel)?;
        let encoded = encode_key(key)?;
        self.disarm(tx, &encoded).await?;

        let deadline = add_saturating(self.clock.now(), self.delay);
        tx.set(&self.keys.timed_entry(DEADLINE, deadline, &encoded), &encoded)
            .await?;
        tx.set(&self.keys.entry(KEY, &encoded), &encode_timestamp(deadline))
            .await?;
        log::trace!("Delay trigger armed key {} until {}", key, deadline);
        Ok(())
    }

    async fn update_watermark(
        &self,
        _cancel: &CancellationToken,
        _tx: &mut dyn Transaction,
        _watermark: DateTime<Utc>,
    ) -> StreamResult<()> {
        Ok(())
    }

    async fn poll_key_to_fire(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
    ) -> StreamResult<Option<Value>> {
        check_cancelled(cancel)?;
        let pending = tx.scan_prefix(&self.keys.section(DEADLINE)).await?;
        let Some((entry, encoded)) = pending.into_iter().next() else {
            return Ok(None);
        };
        let deadline = self.keys.entry_time(DEADLINE, &entry)?;
        if self.clock.now() < deadline {
            return Ok(None);
        }

        tx.delete(&entry).await?;
        tx.delete(&self.keys.entry(KEY, &encoded)).await?;
        let key = decode_key(&encoded)?;
        log::trace!("Delay trigger fired key {} (deadline {})", key, deadline);
        Ok(Some(key))
    }

    async fn key_fired(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
    ) -> StreamResult<()> {
        check_cancelled(cancel)?;
        self.disarm(tx, &encode_key(key)?).await
    }

    fn kind(&self) -> &'static str {
        "delay"
    }
}

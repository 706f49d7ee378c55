//! Fire every n-th record per key

use super::{check_cancelled, Trigger};
use crate::error::StreamResult;
use crate::state::{decode_count, decode_key, encode_count, encode_key, StateKeys};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rv_core::Value;
use rv_storage::Transaction;
use tokio_util::sync::CancellationToken;

const COUNT: &str = "count";
const READY: &str = "ready";

/// Makes a key eligible once it has received `count` records since it last
/// fired. Keys are counted independently.
pub struct CountingTrigger {
    keys: StateKeys,
    count: u64,
}

impl CountingTrigger {
    /// Counting trigger storing state as the `index`-th trigger of `namespace`
    pub fn new(namespace: &str, index: usize, count: u64) -> Self {
        Self {
            keys: StateKeys::new(namespace, "count", index),
            count: count.max(1),
        }
    }

    async fn clear(&self, tx: &mut dyn Transaction, encoded: &[u8]) -> StreamResult<()> {
        tx.delete(&self.keys.entry(COUNT, encoded)).await?;
        tx.delete(&self.keys.entry(READY, encoded)).await?;
        Ok(())
    }
}

#[async_trait]
impl Trigger for CountingTrigger {
    async fn record_received(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
        _event_time: Option<DateTime<Utc>>,
    ) -> StreamResult<()> {
        check_cancelled(cancel)?;
        let encoded = encode_key(key)?;
        let count_key = self.keys.entry(COUNT, &encoded);
        let seen = match tx.get(&count_key).await? {
            Some(bytes) => decode_count(&bytes)?,
            None => 0,
        } + 1;
        tx.set(&count_key, &encode_count(seen)).await?;
        if seen == self.count {
            tx.set(&self.keys.entry(READY, &encoded), &[]).await?;
            log::trace!("Counting trigger armed key {} after {} records", key, seen);
        }
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
        let section = self.keys.section(READY);
        let ready = tx.scan_prefix(&section).await?;
        let Some((entry, _)) = ready.into_iter().next() else {
            return Ok(None);
        };
        let encoded = &entry[section.len()..];
        let key = decode_key(encoded)?;
        self.clear(tx, encoded).await?;
        log::trace!("Counting trigger fired key {}", key);
        Ok(Some(key))
    }

    async fn key_fired(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
    ) -> StreamResult<()> {
        check_cancelled(cancel)?;
        self.clear(tx, &encode_key(key)?).await
    }

    fn kind(&self) -> &'static str {
        "count"
    }
}

//! Event-time triggers driven by the stream watermark

use super::{check_cancelled, Trigger};
use crate::error::StreamResult;
use crate::state::{decode_key, decode_timestamp, encode_key, encode_timestamp, StateKeys};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rv_core::Value;
use rv_storage::Transaction;
use tokio_util::sync::CancellationToken;

/// `horizon/<timestamp><key>` → key
const HORIZON: &str = "horizon";
/// `key/<key>` → timestamp of the key's horizon
const KEY: &str = "key";
/// `watermark/` → latest watermark
const WATERMARK: &str = "watermark";

/// Makes a key eligible once the watermark reaches the latest event time
/// received for it.
///
/// In end-of-stream mode keys wait for the maximum watermark instead, which
/// the runtime sends once a bounded input is exhausted.
pub struct WatermarkTrigger {
    keys: StateKeys,
    end_of_stream: bool,
}

impl WatermarkTrigger {
    /// Watermark trigger storing state as the `index`-th trigger of `namespace`
    pub fn new(namespace: &str, index: usize) -> Self {
        Self {
            keys: StateKeys::new(namespace, "watermark", index),
            end_of_stream: false,
        }
    }

    /// Trigger that fires every key once the input is exhausted
    pub fn end_of_stream(namespace: &str, index: usize) -> Self {
        Self {
            keys: StateKeys::new(namespace, "end_of_stream", index),
            end_of_stream: true,
        }
    }

    /// Event time a key has to wait for
    fn horizon(&self, event_time: Option<DateTime<Utc>>) -> DateTime<Utc> {
        match event_time {
            Some(time) if !self.end_of_stream => time,
            _ => DateTime::<Utc>::MAX_UTC,
        }
    }

    async fn disarm(
        &self,
        tx: &mut dyn Transaction,
        encoded: &[u8],
    ) -> StreamResult<Option<DateTime<Utc>>> {
        let key_entry = self.keys.entry(KEY, encoded);
        let Some(previous) = tx.get(&key_entry).await? else {
            return Ok(None);
        };
        let horizon = decode_timestamp(&previous)?;
        tx.delete(&self.keys.timed_entry(HORIZON, horizon, encoded))
            .await?;
        tx.delete(&key_entry).await?;
        Ok(Some(horizon))
    }
}

#[async_trait]
impl Trigger for WatermarkTrigger {
    async fn record_received(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
        event_time: Option<DateTime<Utc>>,
    ) -> StreamResult<()> {
        check_cancelled(cancel)?;
        let encoded = encode_key(key)?;
        let mut horizon = self.horizon(event_time);
        if let Some(previous) = self.disarm(tx, &encoded).await? {
            horizon = horizon.max(previous);
        }

        tx.set(&self.keys.timed_entry(HORIZON, horizon, &encoded), &encoded)
            .await?;
        tx.set(&self.keys.entry(KEY, &encoded), &encode_timestamp(horizon))
            .await?;
        log::trace!("{} trigger armed key {} until {}", self.kind(), key, horizon);
        Ok(())
    }

    async fn update_watermark(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        watermark: DateTime<Utc>,
    ) -> StreamResult<()> {
        check_cancelled(cancel)?;
        let watermark_key = self.keys.section(WATERMARK);
        if let Some(current) = tx.get(&watermark_key).await? {
            if decode_timestamp(&current)? >= watermark {
                return Ok(());
            }
        }
        tx.set(&watermark_key, &encode_timestamp(watermark)).await?;
        Ok(())
    }

    async fn poll_key_to_fire(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
    ) -> StreamResult<Option<Value>> {
        check_cancelled(cancel)?;
        let Some(watermark) = tx.get(&self.keys.section(WATERMARK)).await? else {
            return Ok(None);
        };
        let watermark = decode_timestamp(&watermark)?;

        let pending = tx.scan_prefix(&self.keys.section(HORIZON)).await?;
        let Some((entry, encoded)) = pending.into_iter().next() else {
            return Ok(None);
        };
        // Stored times are truncated to microseconds
        let horizon = self.keys.entry_time(HORIZON, &entry)?;
        if watermark < horizon {
            return Ok(None);
        }

        tx.delete(&entry).await?;
        tx.delete(&self.keys.entry(KEY, &encoded)).await?;
        let key = decode_key(&encoded)?;
        log::trace!("{} trigger fired key {} at watermark {}", self.kind(), key, watermark);
        Ok(Some(key))
    }

    async fn key_fired(
        &self,
        cancel: &CancellationToken,
        tx: &mut dyn Transaction,
        key: &Value,
    ) -> StreamResult<()> {
        check_cancelled(cancel)?;
        self.disarm(tx, &encode_key(key)?).await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        if self.end_of_stream {
            "end_of_stream"
        } else {
            "watermark"
        }
    }
}

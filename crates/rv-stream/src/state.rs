//! Storage layout of trigger state
//!
//! Every key is `namespace/kind/index/section/suffix`. Timestamps inside keys
//! are order-preserving big-endian, so a prefix scan over a section returns
//! the earliest entries first.

use crate::error::{StreamError, StreamResult};
use chrono::{DateTime, Utc};
use rv_core::Value;

/// Width of an encoded timestamp
pub const TIMESTAMP_LEN: usize = 8;

/// Key builder for one trigger instance
#[derive(Debug, Clone)]
pub struct StateKeys {
    prefix: Vec<u8>,
}

impl StateKeys {
    /// Keys for the `index`-th trigger of `kind` owned by `namespace`
    pub fn new(namespace: &str, kind: &str, index: usize) -> Self {
        Self {
            prefix: format!("{namespace}/{kind}/{index}/").into_bytes(),
        }
    }

    /// Prefix shared by every entry of `section`
    pub fn section(&self, section: &str) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(section.as_bytes());
        key.push(b'/');
        key
    }

    /// `section` entry with the given suffix
    pub fn entry(&self, section: &str, suffix: &[u8]) -> Vec<u8> {
        let mut key = self.section(section);
        key.extend_from_slice(suffix);
        key
    }

    /// `section` entry ordered by `time`, then by `grouping_key`
    pub fn timed_entry(&self, section: &str, time: DateTime<Utc>, grouping_key: &[u8]) -> Vec<u8> {
        let mut key = self.section(section);
        key.extend_from_slice(&encode_timestamp(time));
        key.extend_from_slice(grouping_key);
        key
    }

    /// Timestamp of an entry built by [`StateKeys::timed_entry`]
    pub fn entry_time(&self, section: &str, key: &[u8]) -> StreamResult<DateTime<Utc>> {
        let start = self.section(section).len();
        let bytes = key
            .get(start..start + TIMESTAMP_LEN)
            .ok_or_else(|| StreamError::CorruptState("truncated timed entry".to_string()))?;
        decode_timestamp(bytes)
    }
}

/// Grouping key as stored bytes.
///
/// Keys containing NaN or infinite floats are rejected, as their JSON form
/// does not decode back.
pub fn encode_key(key: &Value) -> StreamResult<Vec<u8>> {
    if !is_storable(key) {
        return Err(StreamError::InvalidKey {
            key: key.to_string(),
            reason: "non-finite floats cannot be stored".to_string(),
        });
    }
    Ok(serde_json::to_vec(key)?)
}

fn is_storable(value: &Value) -> bool {
    match value {
        Value::Float(f) => f.is_finite(),
        Value::List(items) | Value::Tuple(items) => items.iter().all(is_storable),
        Value::Struct(fields) => fields.iter().all(|(_, value)| is_storable(value)),
        _ => true,
    }
}

/// Grouping key from stored bytes
pub fn decode_key(bytes: &[u8]) -> StreamResult<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Microseconds since the epoch with the sign bit flipped, big-endian
pub fn encode_timestamp(time: DateTime<Utc>) -> [u8; TIMESTAMP_LEN] {
    ((time.timestamp_micros() as u64) ^ (1 << 63)).to_be_bytes()
}

/// Inverse of [`encode_timestamp`]
pub fn decode_timestamp(bytes: &[u8]) -> StreamResult<DateTime<Utc>> {
    let raw: [u8; TIMESTAMP_LEN] = bytes
        .try_into()
        .map_err(|_| StreamError::CorruptState(format!("timestamp of {} bytes", bytes.len())))?;
    let micros = (u64::from_be_bytes(raw) ^ (1 << 63)) as i64;
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| StreamError::CorruptState(format!("timestamp {micros} out of range")))
}

/// Counter as stored bytes
pub fn encode_count(count: u64) -> [u8; 8] {
    count.to_be_bytes()
}

/// Inverse of [`encode_count`]
pub fn decode_count(bytes: &[u8]) -> StreamResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StreamError::CorruptState(format!("counter of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

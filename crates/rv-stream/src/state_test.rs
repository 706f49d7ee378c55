use super::*;
use chrono::TimeZone;

#[test]
fn test_timestamps_sort_like_times() {
    let times = [
        DateTime::<Utc>::MIN_UTC,
        Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap(),
        Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        DateTime::<Utc>::MAX_UTC,
    ];
    let encoded: Vec<[u8; TIMESTAMP_LEN]> = times.iter().map(|t| encode_timestamp(*t)).collect();
    let mut sorted = encoded.clone();
    sorted.sort();
    assert_eq!(sorted, encoded);

    for (time, bytes) in times.iter().zip(&encoded) {
        let decoded = decode_timestamp(bytes).unwrap();
        assert_eq!(decoded.timestamp_micros(), time.timestamp_micros());
    }
}

#[test]
fn test_timed_entry_layout() {
    let keys = StateKeys::new("agg_1", "delay", 0);
    let time = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let entry = keys.timed_entry("deadline", time, b"42");
    assert!(entry.starts_with(b"agg_1/delay/0/deadline/"));
    assert!(entry.ends_with(b"42"));
    assert_eq!(keys.entry_time("deadline", &entry).unwrap(), time);
    assert!(keys.entry_time("deadline", b"agg_1/delay/0/deadline/x").is_err());
}

#[test]
fn test_key_and_count_encoding() {
    let key = Value::from("acme");
    assert_eq!(decode_key(&encode_key(&key).unwrap()).unwrap(), key);
    assert_eq!(decode_count(&encode_count(7)).unwrap(), 7);
    assert!(matches!(decode_count(b"abc"), Err(StreamError::CorruptState(_))));
    assert!(matches!(decode_key(b"{not json"), Err(StreamError::CorruptState(_))));
}

#[test]
fn test_non_finite_float_keys_are_rejected() {
    for key in [
        Value::Float(f64::NAN),
        Value::Float(f64::INFINITY),
        Value::Tuple(vec![Value::Int(1), Value::Float(f64::NEG_INFINITY)]),
    ] {
        assert!(matches!(encode_key(&key), Err(StreamError::InvalidKey { .. })));
    }
    let finite = Value::Tuple(vec![Value::Float(1.5), Value::from("x")]);
    assert_eq!(decode_key(&encode_key(&finite).unwrap()).unwrap(), finite);
}

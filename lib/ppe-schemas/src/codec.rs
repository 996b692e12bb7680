//! JSON codec for the wire schemas.
//!
//! `decode(encode(x)) == x` for every in-domain value of `x`: unknown fields
//! in the input are ignored (forward compatibility) and missing optional
//! fields fall back to their `Default`, matching the serde derives on the
//! types themselves.

use serde::{de::DeserializeOwned, Serialize};
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum CodecError {
    #[snafu(display("failed to encode message: {source}"))]
    Encode { source: serde_json::Error },
    #[snafu(display("failed to decode message: {source}"))]
    Decode { source: serde_json::Error },
}

/// Serialises a wire type to its canonical JSON UTF-8 form.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).context(EncodeSnafu)
}

/// Deserialises a wire type from JSON UTF-8 bytes, as produced by [`encode`]
/// or by any producer honoring the same schema.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).context(DecodeSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{AlertSeverity, AlertStatus, AlertType};
    use crate::types::Alert;
    use chrono::Utc;

    #[test]
    fn round_trips_an_alert() {
        let alert = Alert {
            alert_id: "alert-1".into(),
            alert_type: AlertType::PpeViolation,
            severity: AlertSeverity::Critical,
            status: AlertStatus::New,
            title: "Missing helmet".into(),
            description: "Worker observed without a helmet".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: None,
            device_id: "cam-07".into(),
            worker_id: Some("worker-42".into()),
            rule_id: "rule-helmet".into(),
            priority_score: 80,
            source_detection_ids: vec!["det-1".into(), "det-2".into()],
            tags: vec!["ppe".into()],
            metadata: Default::default(),
        };

        let encoded = encode(&alert).expect("encode");
        let decoded: Alert = decode(&encoded).expect("decode");
        assert_eq!(decoded, alert);
    }

    #[test]
    fn decode_ignores_unknown_fields_and_fills_defaults() {
        let json = br#"{
            "alert_id": "a1",
            "alert_type": 1,
            "severity": 3,
            "status": 1,
            "title": "t",
            "description": "d",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "device_id": "cam-1",
            "rule_id": "rule-1",
            "priority_score": 10,
            "from_a_future_producer": {"nested": true}
        }"#;

        let decoded: Alert = decode(json).expect("decode");
        assert_eq!(decoded.worker_id, None);
        assert!(decoded.tags.is_empty());
        assert!(decoded.source_detection_ids.is_empty());
    }
}

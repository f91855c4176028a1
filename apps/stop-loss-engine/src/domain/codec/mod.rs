//! Payload Codec
//!
//! Ticks and watch entries travel through the broadcast channel and the
//! watch queue as flat JSON objects. Decoding failures are classified by
//! payload kind so they can be logged and counted separately.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// The kind of record a payload is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// A price tick from the feed.
    Tick,
    /// A stop-loss watch entry from the queue.
    Watch,
}

impl PayloadKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Watch => "watch",
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload encoding or decoding error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The record could not be serialized.
    #[error("failed to encode {kind} payload: {source}")]
    Encode {
        /// Record kind.
        kind: PayloadKind,
        /// Underlying serializer error.
        source: serde_json::Error,
    },

    /// The payload is not a valid record of the expected kind.
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        /// Record kind.
        kind: PayloadKind,
        /// Underlying parser error.
        source: serde_json::Error,
    },
}

impl CodecError {
    /// The kind of record involved in the failure.
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Encode { kind, .. } | Self::Malformed { kind, .. } => *kind,
        }
    }
}

pub(crate) fn encode<T: Serialize>(kind: PayloadKind, value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|source| CodecError::Encode { kind, source })
}

pub(crate) fn decode<T: DeserializeOwned>(kind: PayloadKind, payload: &str) -> Result<T, CodecError> {
    serde_json::from_str(payload).map_err(|source| CodecError::Malformed { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Probe {
        #[allow(dead_code)]
        field: u32,
    }

    #[test]
    fn payload_kind_labels() {
        assert_eq!(PayloadKind::Tick.as_str(), "tick");
        assert_eq!(PayloadKind::Watch.to_string(), "watch");
    }

    #[test]
    fn malformed_payload_keeps_kind() {
        let err = decode::<Probe>(PayloadKind::Watch, "{not json").unwrap_err();
        assert_eq!(err.kind(), PayloadKind::Watch);
        assert!(err.to_string().starts_with("malformed watch payload"));
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = decode::<Probe>(PayloadKind::Tick, r#"{"other":1}"#).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { kind: PayloadKind::Tick, .. }));
    }
}

use serde::{Deserialize, Serialize};

/// The unit exchanged over a data channel between two peers.
///
/// The tag is always present and unambiguous; a message without a known
/// tag fails to decode rather than being guessed at.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Free-text notification surfaced to the remote user.
    Chat { text: String },

    /// The sender's current countdown value, broadcast so the remote
    /// side can mirror the display. Non-negative by construction.
    Tick { seconds: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    #[error("payload encode error: {0}")]
    Encode(String),
    #[error("payload decode error: {0}")]
    Decode(String),
}

/// Serialize a payload to its JSON wire form.
pub fn encode_payload(payload: &Payload) -> Result<String, PulseError> {
    serde_json::to_string(payload).map_err(|err| PulseError::Encode(err.to_string()))
}

/// Parse a payload from its JSON wire form.
///
/// Unknown tags, missing fields, and negative tick values are all decode
/// errors; the caller decides whether to drop or surface them.
pub fn decode_payload(raw: &str) -> Result<Payload, PulseError> {
    serde_json::from_str(raw).map_err(|err| PulseError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_roundtrip_preserves_seconds() {
        let payload = Payload::Tick { seconds: 1500 };
        let raw = encode_payload(&payload).unwrap();
        assert_eq!(decode_payload(&raw).unwrap(), payload);
    }

    #[test]
    fn chat_roundtrip_preserves_text() {
        let payload = Payload::Chat {
            text: "Time's up!".to_string(),
        };
        let raw = encode_payload(&payload).unwrap();
        assert_eq!(decode_payload(&raw).unwrap(), payload);
    }

    #[test]
    fn wire_form_carries_tag() {
        let raw = encode_payload(&Payload::Tick { seconds: 0 }).unwrap();
        assert!(raw.contains("\"type\""));
        assert!(raw.contains("\"tick\""));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(decode_payload(r#"{"type":"poke"}"#).is_err());
    }

    #[test]
    fn missing_tag_is_rejected() {
        assert!(decode_payload(r#"{"seconds":5}"#).is_err());
    }

    #[test]
    fn negative_seconds_is_rejected() {
        assert!(decode_payload(r#"{"type":"tick","seconds":-1}"#).is_err());
    }

    #[test]
    fn zero_seconds_is_valid() {
        let decoded = decode_payload(r#"{"type":"tick","seconds":0}"#).unwrap();
        assert_eq!(decoded, Payload::Tick { seconds: 0 });
    }
}

//! Consumed event type.

use std::borrow::Cow;

/// A record delivered by the broker.
///
/// Only lives for one poll iteration: the runtime hands it to the handler by
/// reference and drops it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Physical topic the record was read from
    pub topic: String,
    /// Partition number
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Raw payload; empty when the broker delivered a null payload
    pub payload: Vec<u8>,
    /// Timestamp in milliseconds since epoch (if available)
    pub timestamp: Option<i64>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            key: None,
            payload: payload.into(),
            timestamp: None,
        }
    }

    /// Payload as UTF-8 text.
    pub fn payload_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    /// Payload as text, replacing invalid UTF-8 sequences.
    pub fn payload_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_decoding() {
        let event = Event::new("t", "héllo");
        assert_eq!(event.payload_str().unwrap(), "héllo");

        let event = Event::new("t", vec![0x66, 0xff, 0x6f]);
        assert!(event.payload_str().is_err());
        assert_eq!(event.payload_lossy(), "f\u{fffd}o");
    }
}

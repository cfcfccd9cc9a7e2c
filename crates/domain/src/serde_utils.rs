//! Serialization helpers for durations and binary payloads
//!
//! Durations are written as plain integers so config files stay readable:
//! backoff delays in milliseconds, retention and loop intervals in seconds.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use rebound_domain::serde_utils::duration_millis;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Example {
//!     #[serde(with = "duration_millis")]
//!     timeout: Duration,
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde serialization result type
type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

fn millis_u64(duration: &Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Duration as milliseconds (u64)
pub mod duration_millis {
    use super::{millis_u64, Deserialize, Deserializer, Duration, SerializeResult, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> SerializeResult<S> {
        serializer.serialize_u64(millis_u64(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Duration as whole seconds (u64)
pub mod duration_secs {
    use super::{Deserialize, Deserializer, Duration, SerializeResult, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> SerializeResult<S> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// `Option<Duration>` as optional milliseconds
pub mod option_duration_millis {
    use super::{millis_u64, Deserialize, Deserializer, Duration, SerializeResult, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> SerializeResult<S> {
        match value {
            Some(duration) => serializer.serialize_some(&millis_u64(duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// `Option<Duration>` as optional whole seconds
pub mod option_duration_secs {
    use super::{Deserialize, Deserializer, Duration, SerializeResult, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> SerializeResult<S> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

/// Opaque bytes as standard base64
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::Error;

    use super::{Deserialize, Deserializer, SerializeResult, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> SerializeResult<S> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for serialization helpers

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "duration_millis")]
        delay: Duration,
        #[serde(with = "duration_secs")]
        retention: Duration,
        #[serde(default, with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
        cap: Option<Duration>,
        #[serde(default, with = "option_duration_secs")]
        ttl: Option<Duration>,
        #[serde(with = "base64_bytes")]
        payload: Vec<u8>,
    }

    #[test]
    fn test_wire_shape() {
        let sample = Sample {
            delay: Duration::from_millis(1500),
            retention: Duration::from_secs(3600),
            cap: None,
            ttl: Some(Duration::from_secs(60)),
            payload: b"hello".to_vec(),
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(
            json,
            r#"{"delay":1500,"retention":3600,"ttl":60,"payload":"aGVsbG8="}"#
        );
    }

    #[test]
    fn test_missing_optionals_default_to_none() {
        let sample: Sample =
            serde_json::from_str(r#"{"delay":0,"retention":0,"payload":""}"#).unwrap();
        assert_eq!(sample.cap, None);
        assert_eq!(sample.ttl, None);
        assert!(sample.payload.is_empty());
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let result =
            serde_json::from_str::<Sample>(r#"{"delay":0,"retention":0,"payload":"@@@"}"#);
        assert!(result.is_err());
    }
}

use bytes::Bytes;
use serde::Serialize;
use serde::de::IgnoredAny;

/// Payload describing what changed, as returned by the upstream refresh.
///
/// Holds the verbatim response body. The body is checked to be JSON on
/// construction and never modified afterwards; clones share the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    body: Bytes,
}

impl Delta {
    /// Wrap a response body, rejecting anything that is not a JSON document.
    pub fn from_json_bytes(body: impl Into<Bytes>) -> Result<Self, serde_json::Error> {
        let body = body.into();
        serde_json::from_slice::<IgnoredAny>(&body)?;
        Ok(Self { body })
    }

    /// Serialize `value` into a new delta.
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self {
            body: Bytes::from(body),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    /// The body as a refcounted buffer, ready to hand to a socket.
    pub fn to_bytes(&self) -> Bytes {
        self.body.clone()
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_body_verbatim() {
        let raw = r#"{ "drivers" : [1, 2] }"#;
        let delta = Delta::from_json_bytes(raw).unwrap();
        assert_eq!(delta.as_bytes(), raw.as_bytes());
        assert_eq!(delta.to_value().unwrap(), serde_json::json!({"drivers": [1, 2]}));
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(Delta::from_json_bytes("<html>502 Bad Gateway</html>").is_err());
        assert!(Delta::from_json_bytes("").is_err());
    }

    #[test]
    fn test_from_value() {
        let delta = Delta::from_value(&serde_json::json!({"drivers": [7]})).unwrap();
        assert_eq!(delta.as_bytes(), br#"{"drivers":[7]}"#);
        assert!(!delta.is_empty());
    }
}

//! Payload codecs turning caller values into message bodies and back.

use crate::error::SerializationError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes payloads into message bodies and decodes them back.
///
/// `decode(encode(v))` must reproduce `v`, including nested maps and
/// sequences, without any schema beyond the target type.
pub trait PayloadCodec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, SerializationError>;

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T, SerializationError>;
}

/// Self-describing JSON bodies (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T, SerializationError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Base64-wraps the output of another codec
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec<C = JsonCodec> {
    inner: C,
}

impl<C> Base64Codec<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: PayloadCodec> PayloadCodec for Base64Codec<C> {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, SerializationError> {
        let body = self.inner.encode(value)?;
        Ok(STANDARD.encode(body.as_bytes()))
    }

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T, SerializationError> {
        let bytes = STANDARD.decode(body.trim())?;
        let inner_body = String::from_utf8(bytes).map_err(|_| SerializationError::InvalidUtf8)?;
        self.inner.decode(&inner_body)
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;

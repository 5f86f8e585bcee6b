use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Trait for encoding state into a text payload and decoding text replies
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// Encode a serializable value into UTF-8 text
    fn encode<T: Serialize + ?Sized>(&self, data: &T) -> Result<String>;

    /// Decode a reply buffer into a deserializable value
    fn decode<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;
}

/// Default codec (compact JSON)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        Ok(serde_json::to_string(data)?)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

use crate::error::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Abstracts away the selection of the byte format values are persisted in. The map never looks
/// inside the bytes; it only hands them to the store and back.
pub trait Codec<Value> {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Human readable, tolerant of added fields. Prefer this when the persisted data may outlive the
/// schema of `Value`.
pub struct JsonCodec<Value> {
    phantom: PhantomData<Value>,
}

impl<Value> JsonCodec<Value> {
    pub fn new() -> Self {
        JsonCodec {
            phantom: PhantomData,
        }
    }
}

impl<Value> Default for JsonCodec<Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Value> Codec<Value> for JsonCodec<Value>
where
    Value: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact, but the encoding is tied to the exact field layout of `Value`.
pub struct BincodeCodec<Value> {
    phantom: PhantomData<Value>,
}

impl<Value> BincodeCodec<Value> {
    pub fn new() -> Self {
        BincodeCodec {
            phantom: PhantomData,
        }
    }
}

impl<Value> Default for BincodeCodec<Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Value> Codec<Value> for BincodeCodec<Value>
where
    Value: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

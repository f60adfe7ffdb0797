use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {type_name}: {source}")]
    Encode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode {type_name}: {source}")]
    Decode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Serializes a message into the bytes carried on the wire.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|source| CodecError::Encode {
        type_name: std::any::type_name::<T>(),
        source,
    })
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|source| CodecError::Decode {
        type_name: std::any::type_name::<T>(),
        source,
    })
}

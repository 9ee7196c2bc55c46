use thiserror::Error;

use super::signal::Signal;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("failed to encode audio: {0}")]
    Encode(String),
}

/// Domain interface for turning container bytes into PCM and back.
pub trait PcmCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Signal, CodecError>;

    fn encode(&self, signal: &Signal) -> Result<Vec<u8>, CodecError>;
}

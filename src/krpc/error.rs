use thiserror::Error;

use crate::bencode::BencodeError;

#[derive(Debug, Error)]
pub enum KrpcError {
    #[error("bencode: {0}")]
    Bencode(#[from] BencodeError),

    #[error("malformed message: {0}")]
    Malformed(&'static str),

    #[error("unknown query kind: {0}")]
    UnknownQuery(String),
}

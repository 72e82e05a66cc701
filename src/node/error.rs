use thiserror::Error;

use crate::krpc::KrpcError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("codec: {0}")]
    Codec(#[from] KrpcError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("response matches no outstanding query")]
    UnmatchedResponse,
}

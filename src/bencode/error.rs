use thiserror::Error;

#[derive(Debug, Error)]
pub enum BencodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid integer literal: {0}")]
    InvalidInteger(String),

    #[error("invalid string length prefix")]
    InvalidLength,

    #[error("unexpected byte {0:#04x}")]
    UnexpectedByte(u8),

    #[error("trailing bytes after term")]
    TrailingData,

    #[error("nesting too deep")]
    DepthLimit,
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Unknown transaction status: {0}")]
    UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

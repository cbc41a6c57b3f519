use thiserror::Error;

use crate::compact::CompactError;

#[derive(Error, Debug)]
pub enum RetargetError {
    #[error("insufficient history for height {height}: need {needed} headers, have {available}")]
    InsufficientHistory {
        height: u64,
        needed: u64,
        available: u64,
    },
    #[error("invalid header at height {height}: {reason}")]
    InvalidHeader { height: u64, reason: String },
    #[error("target exceeds the representable compact range")]
    EncodingOverflow,
    #[error("invalid retarget configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid compact bits: {0}")]
    InvalidBits(#[from] CompactError),
}

pub type Result<T> = std::result::Result<T, RetargetError>;

impl RetargetError {
    pub(crate) fn invalid_header(height: u64, reason: impl Into<String>) -> Self {
        RetargetError::InvalidHeader {
            height,
            reason: reason.into(),
        }
    }
}

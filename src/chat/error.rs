use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("turn {index} is out of range for a transcript of {len} turns")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid temperature value: {0:?}")]
    InvalidTemperature(String),

    #[error("Invalid max tokens value: {0:?}")]
    InvalidMaxTokens(String),

    #[error("Invalid context size value")]
    InvalidWindowSize(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("attachment data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

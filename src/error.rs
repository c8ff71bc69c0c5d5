use thiserror::Error;

#[derive(Error, Debug)]
pub enum KhetError {
    #[error("Village directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Pincode {0} not found in village directory")]
    UnknownPincode(u32),

    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, KhetError>;

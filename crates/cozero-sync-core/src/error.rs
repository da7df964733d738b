// crates/cozero-sync-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{method} {path} returned {status}: {body}")]
    Http {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("response from {path} is missing field '{field}'")]
    MissingField { path: String, field: &'static str },

    #[error("not authenticated; call authenticate() first")]
    NotAuthenticated,

    #[error("user id is not set; resolve the current user first")]
    UserNotResolved,

    #[error("business unit id is not set; resolve business units first")]
    BusinessUnitNotResolved,

    #[error("organization {0} has no business units")]
    NoBusinessUnits(&'static str),

    #[error("row {index} cannot be uploaded: {message}")]
    InvalidRecord { index: usize, message: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;

use thiserror::Error;
use reqwest::Error as ReqwestError;
use tokio::io::Error as TokioIoError;
use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use url::ParseError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Authentication Error: {0}")]
    Authentication(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Upstream Error: {url} returned status {status}")]
    Upstream { status: u16, url: String },

    #[error("Unknown Type: {0}")]
    UnknownType(String),

    #[error("Invalid Record: {0}")]
    InvalidRecord(String),

    #[error("Publish Error: catalog upload failed with {failed} errors")]
    Publish { failed: usize, failures: Vec<String> },

    #[error("Timeout: stage '{stage}' exceeded {seconds}s")]
    Timeout { stage: String, seconds: u64 },

    #[error("State Store Error: {0}")]
    StateStore(String),

    #[error("Reqwest Error: {0}")]
    RestSourceError(#[from] ReqwestError),

    #[error("Tokio Error: {0}")]
    TokioError(#[from] TokioIoError),

    #[error("Arrow Error: {0}")]
    ArrowDataError(#[from] ArrowError),

    #[error("Parquet Error: {0}")]
    ParquetDataError(#[from] ParquetError),

    #[error("Json Error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Url Error: {0}")]
    UrlParseError(#[from] ParseError),
}

impl Error {
    /// Short machine-friendly label, used for metrics and run history.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::Authentication(_) => "authentication",
            Error::NotFound(_) => "not_found",
            Error::Upstream { .. } => "upstream",
            Error::UnknownType(_) => "unknown_type",
            Error::InvalidRecord(_) => "invalid_record",
            Error::Publish { .. } => "publish",
            Error::Timeout { .. } => "timeout",
            Error::StateStore(_) => "state_store",
            Error::RestSourceError(_) => "http",
            Error::TokioError(_)
            | Error::ArrowDataError(_)
            | Error::ParquetDataError(_)
            | Error::JsonError(_) => "io",
            Error::UrlParseError(_) => "url",
        }
    }

    /// Errors caused by a single record rather than the batch.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Error::UnknownType(_) | Error::InvalidRecord(_))
    }
}

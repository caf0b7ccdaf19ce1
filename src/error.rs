//! Error types for the indexing CLI.

use thiserror::Error;

use crate::utils::retry::Retryable;

fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Errors related to configuration and environment resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("environment file error: {0}")]
    DotenvError(String),

    #[error("missing environment variable: {0}")]
    MissingVar(String),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to language model calls (embeddings, summaries, labels).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("failed to connect to language model service: {0}")]
    ConnectionError(String),

    #[error("language model service returned status {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("language model request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid language model response: {0}")]
    InvalidResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("language model timeout")]
    Timeout,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::ConnectionError(_) | LlmError::Timeout => true,
            LlmError::ServerError { status, .. } => is_transient_status(*status),
            LlmError::RequestError(e) => e.is_timeout() || e.is_connect(),
            LlmError::InvalidResponse(_) | LlmError::InvalidInput(_) | LlmError::Config(_) => false,
        }
    }
}

/// Errors related to the hosted search service.
#[derive(Debug, Error)]
pub enum SearchServiceError {
    #[error("failed to connect to search service: {0}")]
    ConnectionError(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("index error: {}", status_message(.status, .message))]
    IndexError { status: Option<u16>, message: String },

    #[error("upload error: {}", status_message(.status, .message))]
    UploadError { status: Option<u16>, message: String },

    #[error("search error: {}", status_message(.status, .message))]
    QueryError { status: Option<u16>, message: String },

    #[error("invalid search response: {0}")]
    InvalidResponse(String),

    #[error("serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SearchServiceError {
    /// HTTP status the service answered with, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SearchServiceError::IndexError { status, .. }
            | SearchServiceError::UploadError { status, .. }
            | SearchServiceError::QueryError { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("status {status}: {message}"),
        None => message.to_string(),
    }
}

impl Retryable for SearchServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            SearchServiceError::ConnectionError(_) => true,
            SearchServiceError::IndexError { status, .. }
            | SearchServiceError::UploadError { status, .. }
            | SearchServiceError::QueryError { status, .. } => status.is_some_and(is_transient_status),
            SearchServiceError::IndexNotFound(_)
            | SearchServiceError::InvalidResponse(_)
            | SearchServiceError::SerializeError(_)
            | SearchServiceError::Config(_) => false,
        }
    }
}

/// Errors related to the help-center (Zendesk) API.
#[derive(Debug, Error)]
pub enum ZendeskError {
    #[error("help-center request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("help-center returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("help-center parse error: {0}")]
    ParseError(String),

    #[error("brand has no help center: {0}")]
    UnsupportedBrand(String),
}

impl Retryable for ZendeskError {
    fn is_retryable(&self) -> bool {
        match self {
            ZendeskError::RequestError(e) => e.is_timeout() || e.is_connect(),
            ZendeskError::Status { status, .. } => is_transient_status(*status),
            ZendeskError::ParseError(_) | ZendeskError::UnsupportedBrand(_) => false,
        }
    }
}

/// Errors related to YouTube channel, playlist and transcript retrieval.
#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("YouTube request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("YouTube returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("YouTube parse error: {0}")]
    ParseError(String),

    #[error("no transcript available for video {0}")]
    NoTranscript(String),
}

impl Retryable for YoutubeError {
    fn is_retryable(&self) -> bool {
        match self {
            YoutubeError::RequestError(e) => e.is_timeout() || e.is_connect(),
            YoutubeError::Status { status, .. } => is_transient_status(*status),
            YoutubeError::ParseError(_) | YoutubeError::NoTranscript(_) => false,
        }
    }
}

/// Errors related to PDF text extraction.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to read PDF {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("failed to extract PDF text: {0}")]
    ExtractError(String),
}

/// Errors related to the on-disk staging files.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("search service error: {0}")]
    Search(#[from] SearchServiceError),

    #[error("help-center error: {0}")]
    Zendesk(#[from] ZendeskError),

    #[error("YouTube error: {0}")]
    Youtube(#[from] YoutubeError),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    #[error("staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("{0}")]
    Other(String),
}

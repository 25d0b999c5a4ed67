//! Error types for the studio
//!
//! `RenderError` and `ServiceError` are recoverable and are turned into state
//! or activity entries at the component boundary. `StudioError` covers host
//! setup failures.

use thiserror::Error;

/// Message used when a rendering failure carries no usable description
pub const UNKNOWN_RENDER_ERROR: &str = "Unknown rendering error";

/// A diagram source the rendering engine rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RenderError {
    /// Human-readable message shown to the user
    pub message: String,
    /// Raw diagnostic output from the engine, if any
    pub detail: Option<String>,
}

impl RenderError {
    /// Create a render error with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Create a render error carrying raw engine diagnostics
    pub fn with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// The fallback error used when nothing better is known
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_RENDER_ERROR)
    }
}

/// Failure of the external correction/generation service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Correction service returned no text")]
    EmptyResponse,

    #[error("Correction service failed: {message}")]
    Failed { message: String },

    #[error("Correction service rejected the request: {message}")]
    Rejected { message: String },
}

impl ServiceError {
    /// Create a transport or execution failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Create a rejection reported by the service itself
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Host-level errors (configuration, logging, I/O)
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Logging error: {message}")]
    Logging { message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StudioError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a logging initialization error
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

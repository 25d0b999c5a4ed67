//! Render engine boundary
//!
//! The studio never parses diagram grammar itself. A [`DiagramEngine`] wraps
//! whatever compiler turns source text into SVG (a headless browser, the
//! `mmdc` CLI, a native renderer); [`RenderAdapter`] drives it and normalizes
//! its output into a [`RenderArtifact`] or a [`RenderError`].

mod adapter;
pub mod svg;

pub use adapter::*;

use futures::future::BoxFuture;

use crate::core::{RenderError, RendererConfig, UNKNOWN_RENDER_ERROR};

/// Future returned by engine calls
pub type EngineFuture<'a, T> = BoxFuture<'a, Result<T, EngineFailure>>;

/// An external text-to-SVG compiler
///
/// Calls may suspend for an unbounded time and are never cancelled; the
/// pipeline simply drops results it no longer needs.
pub trait DiagramEngine: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str {
        "engine"
    }

    /// Syntactically validate a source without producing output
    ///
    /// Engines without a separate validation step accept everything here
    /// and report problems from [`DiagramEngine::render`].
    fn parse<'a>(&'a self, source: &'a str, config: &'a RendererConfig) -> EngineFuture<'a, ()> {
        let _ = (source, config);
        Box::pin(futures::future::ready(Ok(())))
    }

    /// Render a source into SVG markup
    fn render<'a>(
        &'a self,
        render_id: &'a str,
        source: &'a str,
        config: &'a RendererConfig,
    ) -> EngineFuture<'a, String>;

    /// Whether several calls may be in flight at once
    fn is_reentrant(&self) -> bool {
        false
    }
}

/// Failure reported by an engine
#[derive(Debug)]
pub enum EngineFailure {
    /// Structured diagnostic with a message field
    Diagnostic {
        message: String,
        detail: Option<String>,
    },
    /// Any other error raised by the engine
    Error(anyhow::Error),
    /// The engine failed without saying why
    Unknown,
}

impl EngineFailure {
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self::Diagnostic {
            message: message.into(),
            detail: None,
        }
    }

    pub fn diagnostic_with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Diagnostic {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Convert into the user-facing error
    ///
    /// Prefers the structured message, then the error's own text, then
    /// [`UNKNOWN_RENDER_ERROR`].
    pub fn into_render_error(self) -> RenderError {
        match self {
            EngineFailure::Diagnostic { message, detail } if !message.trim().is_empty() => {
                RenderError { message, detail }
            }
            EngineFailure::Diagnostic { detail, .. } => RenderError {
                message: UNKNOWN_RENDER_ERROR.to_string(),
                detail,
            },
            EngineFailure::Error(error) => {
                let message = error.to_string();
                if message.trim().is_empty() {
                    RenderError::with_detail(UNKNOWN_RENDER_ERROR, format!("{:?}", error))
                } else {
                    RenderError::with_detail(message, format!("{:#}", error))
                }
            }
            EngineFailure::Unknown => RenderError::unknown(),
        }
    }
}

impl From<anyhow::Error> for EngineFailure {
    fn from(error: anyhow::Error) -> Self {
        EngineFailure::Error(error)
    }
}

impl From<std::io::Error> for EngineFailure {
    fn from(error: std::io::Error) -> Self {
        EngineFailure::Error(error.into())
    }
}

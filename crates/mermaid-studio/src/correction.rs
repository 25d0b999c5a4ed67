//! Correction loop: asks an external service to fix or generate source
//!
//! The loop is single-flight: while one request is outstanding every new one
//! is rejected. A fix needs an active [`RenderError`]; without a configured
//! service the whole capability is absent (offline mode) and errors are left
//! for manual correction.
//!
//! Service responses are raw source text. They never go to the display
//! directly: the host feeds them back into the pipeline as a new source.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::{DiagramKind, RenderError, ServiceError};

/// Future returned by service calls
pub type ServiceFuture<'a> = BoxFuture<'a, Result<String, ServiceError>>;

/// Request to repair a source the engine rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixRequest {
    pub source: String,
    pub error_message: String,
}

/// Request to create a new source from an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub instruction: String,
    pub kind: Option<DiagramKind>,
}

/// External correction/generation service
pub trait CorrectionService: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str {
        "correction service"
    }

    fn fix(&self, request: FixRequest) -> ServiceFuture<'_>;

    fn generate(&self, request: GenerateRequest) -> ServiceFuture<'_>;
}

/// What a correction request was for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionPurpose {
    Fix,
    Generate,
}

impl fmt::Display for CorrectionPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionPurpose::Fix => f.write_str("fix"),
            CorrectionPurpose::Generate => f.write_str("generation"),
        }
    }
}

/// Why a request was not sent
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRejected {
    #[error("There is no render error to fix")]
    NoError,

    #[error("No correction service is configured")]
    Unavailable,

    #[error("A correction request is already in progress")]
    Busy,

    #[error("The instruction is empty")]
    EmptyInstruction,
}

/// Result of a finished request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// Cleaned source text to feed back into the pipeline
    Applied {
        purpose: CorrectionPurpose,
        source: String,
    },
    /// The service failed; nothing else changes
    Failed {
        purpose: CorrectionPurpose,
        message: String,
    },
}

/// Strip Markdown code fences a service may wrap around its answer
///
/// Handles a leading fence with any info string (`mermaid`, `mmd`, ...) and a
/// trailing fence; text without fences is only trimmed.
pub fn strip_code_fences(text: &str) -> String {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.split_once('\n') {
            Some((_info, code)) => code,
            None => match rest.get(..7) {
                Some(tag) if tag.eq_ignore_ascii_case("mermaid") => &rest[7..],
                _ => rest,
            },
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }

    body.trim().to_string()
}

/// Single-flight front end to an optional [`CorrectionService`]
pub struct CorrectionLoop {
    service: Option<Arc<dyn CorrectionService>>,
    outstanding: Option<CorrectionPurpose>,
}

impl CorrectionLoop {
    /// A loop backed by the given service
    pub fn new(service: Arc<dyn CorrectionService>) -> Self {
        Self {
            service: Some(service),
            outstanding: None,
        }
    }

    /// A loop without a service (offline mode)
    pub fn offline() -> Self {
        Self {
            service: None,
            outstanding: None,
        }
    }

    /// Build from an optional service, e.g. one gated on a credential
    pub fn from_service(service: Option<Arc<dyn CorrectionService>>) -> Self {
        match service {
            Some(service) => Self::new(service),
            None => Self::offline(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.service.is_some()
    }

    /// The purpose of the outstanding request, if one is in flight
    pub fn outstanding(&self) -> Option<CorrectionPurpose> {
        self.outstanding
    }

    pub fn is_busy(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Whether a fix could be requested right now
    pub fn can_fix(&self, error: Option<&RenderError>) -> bool {
        error.is_some() && self.is_available() && !self.is_busy()
    }

    fn claim(
        &mut self,
        purpose: CorrectionPurpose,
    ) -> Result<Arc<dyn CorrectionService>, RequestRejected> {
        let service = self.service.clone().ok_or(RequestRejected::Unavailable)?;
        if let Some(current) = self.outstanding {
            debug!(%current, requested = %purpose, "Rejecting request while busy");
            return Err(RequestRejected::Busy);
        }
        self.outstanding = Some(purpose);
        Ok(service)
    }

    /// Start a fix request for the current source and error
    ///
    /// The returned future owns everything it needs; the loop stays busy
    /// until [`CorrectionLoop::finish`] is called with its result.
    pub fn dispatch_fix(
        &mut self,
        source: &str,
        error: Option<&RenderError>,
    ) -> Result<ServiceFuture<'static>, RequestRejected> {
        let error = error.ok_or(RequestRejected::NoError)?;
        let service = self.claim(CorrectionPurpose::Fix)?;
        let request = FixRequest {
            source: source.to_string(),
            error_message: error.message.clone(),
        };

        info!(service = service.name(), source_len = request.source.len(), "Requesting fix");
        Ok(async move { service.fix(request).await }.boxed())
    }

    /// Start a generation request
    pub fn dispatch_generate(
        &mut self,
        instruction: &str,
        kind: Option<DiagramKind>,
    ) -> Result<ServiceFuture<'static>, RequestRejected> {
        if instruction.trim().is_empty() {
            return Err(RequestRejected::EmptyInstruction);
        }
        let service = self.claim(CorrectionPurpose::Generate)?;
        let request = GenerateRequest {
            instruction: instruction.trim().to_string(),
            kind,
        };

        info!(service = service.name(), kind = ?request.kind, "Requesting generation");
        Ok(async move { service.generate(request).await }.boxed())
    }

    /// Settle the outstanding request with the service's result
    pub fn finish(
        &mut self,
        purpose: CorrectionPurpose,
        result: Result<String, ServiceError>,
    ) -> CorrectionOutcome {
        self.outstanding = None;

        let failure = match result {
            Ok(text) => {
                let source = strip_code_fences(&text);
                if !source.is_empty() {
                    debug!(%purpose, source_len = source.len(), "Service returned source");
                    return CorrectionOutcome::Applied { purpose, source };
                }
                ServiceError::EmptyResponse
            }
            Err(error) => error,
        };

        warn!(%purpose, error = %failure, "Correction request failed");
        CorrectionOutcome::Failed {
            purpose,
            message: failure.to_string(),
        }
    }
}

impl Default for CorrectionLoop {
    fn default() -> Self {
        Self::offline()
    }
}

impl fmt::Debug for CorrectionLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionLoop")
            .field("service", &self.service.as_ref().map(|s| s.name()))
            .field("outstanding", &self.outstanding)
            .finish()
    }
}

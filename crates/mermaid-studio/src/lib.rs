//! Mermaid Studio - live rendering core for Mermaid.js diagram editors
//!
//! The crate takes raw diagram source, compiles it through an external
//! rendering engine, keeps a pannable/zoomable viewport over the result, and
//! coordinates with an optional correction service when compilation fails.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mermaid_studio::prelude::*;
//!
//! let engine: Arc<dyn DiagramEngine> = Arc::new(MyEngine::default());
//! let adapter = RenderAdapter::new(engine, RendererConfig::global());
//! let mut studio = Studio::new(adapter, CorrectionLoop::offline(), ActivityLog::new());
//!
//! studio.set_source("graph TD\nA-->B");
//! studio.settle().await;
//! assert_eq!(studio.phase(), Phase::Displayed);
//! ```
//!
//! # Components
//!
//! - [`engine`]: adapter around the external text-to-SVG compiler
//! - [`pipeline`]: the render-recovery state machine with per-run staleness
//! - [`viewport`]: pan/zoom transform and pointer interaction
//! - [`correction`]: single-flight requests to a fix/generation service
//! - [`studio`]: cooperative driver wiring all of the above together

pub mod core;
pub mod correction;
pub mod display;
pub mod engine;
pub mod pipeline;
pub mod studio;
pub mod viewport;

pub use crate::core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        Activity, ActivityLog, ActivitySink, DiagramKind, LogEntry, LogLevel, RenderError,
        RendererConfig, SecurityLevel, ServiceConfig, ServiceError, StudioError, Theme,
    };
    pub use crate::correction::{
        CorrectionLoop, CorrectionOutcome, CorrectionPurpose, CorrectionService, FixRequest,
        GenerateRequest, RequestRejected,
    };
    pub use crate::display::Frame;
    pub use crate::engine::{
        DiagramEngine, EngineFailure, RenderAdapter, RenderArtifact, TrustedSvg,
    };
    pub use crate::pipeline::{CompilePolicy, Phase, Pipeline, RunId};
    pub use crate::studio::{RenderHooks, Studio};
    pub use crate::viewport::{Viewport, ViewportTransform};
}

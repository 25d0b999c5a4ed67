use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info_span, trace, warn, Instrument};

use super::{svg, DiagramEngine, EngineFailure};
use crate::core::{RenderError, RendererConfig};

/// Prefix of the element ids handed to the engine
pub const RENDER_ID_PREFIX: &str = "mermaid-studio";

/// SVG markup produced by the rendering engine
///
/// Only the adapter can construct this type, so anything holding one has
/// gone through a compile. Text from elsewhere (user input, correction
/// service responses) must be compiled before it can be displayed.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustedSvg(String);

impl TrustedSvg {
    pub(crate) fn new(markup: String) -> Self {
        Self(markup)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for TrustedSvg {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrustedSvg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TrustedSvg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustedSvg({} bytes)", self.0.len())
    }
}

/// The graphic produced by one successful compile
#[derive(Debug, Clone, PartialEq)]
pub struct RenderArtifact {
    svg: TrustedSvg,
    width: f64,
    height: f64,
    render_id: String,
}

impl RenderArtifact {
    pub(crate) fn new(svg: TrustedSvg, width: f64, height: f64, render_id: String) -> Self {
        Self {
            svg,
            width,
            height,
            render_id,
        }
    }

    pub fn svg(&self) -> &TrustedSvg {
        &self.svg
    }

    /// Intrinsic width in SVG user units (0 when unknown)
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Intrinsic height in SVG user units (0 when unknown)
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Element id the engine rendered under
    pub fn render_id(&self) -> &str {
        &self.render_id
    }

    /// Whether two artifacts show the same graphic
    ///
    /// Render ids differ between compiles, so this compares the markup with
    /// each artifact's id masked out.
    pub fn same_graphic(&self, other: &RenderArtifact) -> bool {
        let mine = self.svg.as_str().replace(&self.render_id, "");
        let theirs = other.svg.as_str().replace(&other.render_id, "");
        mine == theirs && self.width == other.width && self.height == other.height
    }
}

/// Drives a [`DiagramEngine`] and normalizes what it returns
pub struct RenderAdapter {
    engine: Arc<dyn DiagramEngine>,
    config: &'static RendererConfig,
    renders: AtomicU64,
}

impl RenderAdapter {
    pub fn new(engine: Arc<dyn DiagramEngine>, config: &'static RendererConfig) -> Self {
        Self {
            engine,
            config,
            renders: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &'static RendererConfig {
        self.config
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Whether the wrapped engine tolerates concurrent calls
    pub fn is_reentrant(&self) -> bool {
        self.engine.is_reentrant()
    }

    fn next_render_id(&self) -> String {
        let n = self.renders.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", RENDER_ID_PREFIX, n)
    }

    /// Compile a source: validate, render, then normalize the markup
    pub async fn compile(&self, source: &str) -> Result<RenderArtifact, RenderError> {
        let render_id = self.next_render_id();
        let span = info_span!(
            "compile",
            engine = self.engine.name(),
            render_id = %render_id,
            source_len = source.len()
        );

        async {
            trace!("Validating source");
            self.engine
                .parse(source, self.config)
                .await
                .map_err(|failure| Self::reject("parse", failure))?;

            trace!("Rendering source");
            let markup = self
                .engine
                .render(&render_id, source, self.config)
                .await
                .map_err(|failure| Self::reject("render", failure))?;

            if markup.trim().is_empty() {
                warn!("Engine returned an empty document");
                return Err(RenderError::new("Rendering engine returned an empty document"));
            }

            let markup = svg::strip_max_width(&markup);
            let (width, height) = svg::intrinsic_size(&markup).unwrap_or((0.0, 0.0));
            debug!(width, height, bytes = markup.len(), "Compiled diagram");

            Ok(RenderArtifact::new(
                TrustedSvg::new(markup),
                width,
                height,
                render_id.clone(),
            ))
        }
        .instrument(span)
        .await
    }

    fn reject(stage: &str, failure: EngineFailure) -> RenderError {
        let error = failure.into_render_error();
        debug!(stage, message = %error.message, "Engine rejected source");
        error
    }
}

impl fmt::Debug for RenderAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderAdapter")
            .field("engine", &self.engine.name())
            .field("config", self.config)
            .finish()
    }
}

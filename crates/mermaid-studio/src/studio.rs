//! Studio: the cooperative driver around pipeline, viewport and correction
//!
//! All state lives in one [`Studio`] value driven from a single task.
//! Source edits and correction requests start asynchronous work that is
//! collected in one `FuturesUnordered`; [`Studio::next_completion`] applies
//! results in the order they finish. The pipeline's run identity keeps
//! late compiles from overwriting newer state, and viewport calls never wait
//! on any of it.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tracing::{debug, info_span, trace, Instrument};

use crate::core::{Activity, ActivitySink, DiagramKind, RenderError, ServiceError};
use crate::correction::{CorrectionLoop, CorrectionOutcome, CorrectionPurpose, RequestRejected};
use crate::display::Frame;
use crate::engine::{RenderAdapter, RenderArtifact};
use crate::pipeline::{CompilePolicy, Effect, Event, Notification, Phase, Pipeline, RunId};
use crate::viewport::Viewport;

/// Success/failure hooks for the host
pub trait RenderHooks {
    fn on_success(&mut self, artifact: &RenderArtifact) {
        let _ = artifact;
    }

    fn on_failure(&mut self, error: &RenderError) {
        let _ = error;
    }
}

enum Completion {
    Compiled {
        run: RunId,
        result: Result<RenderArtifact, RenderError>,
    },
    Corrected {
        purpose: CorrectionPurpose,
        /// Latest run when the request was sent
        basis: Option<RunId>,
        result: Result<String, ServiceError>,
    },
}

/// The live editing core
pub struct Studio {
    adapter: Arc<RenderAdapter>,
    pipeline: Pipeline,
    viewport: Viewport,
    correction: CorrectionLoop,
    activity: Box<dyn ActivitySink>,
    hooks: Option<Box<dyn RenderHooks>>,
    outstanding: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl Studio {
    /// Create a studio
    ///
    /// Compiles are serialized unless the engine reports itself reentrant.
    pub fn new(
        adapter: RenderAdapter,
        correction: CorrectionLoop,
        activity: impl ActivitySink + 'static,
    ) -> Self {
        let policy = if adapter.is_reentrant() {
            CompilePolicy::Concurrent
        } else {
            CompilePolicy::Serialized
        };

        let studio = Self {
            adapter: Arc::new(adapter),
            pipeline: Pipeline::new(policy),
            viewport: Viewport::new(),
            correction,
            activity: Box::new(activity),
            hooks: None,
            outstanding: FuturesUnordered::new(),
        };

        if !studio.correction.is_available() {
            studio.record(
                Activity::warning("Correction service not configured")
                    .with_details("Running in offline mode; render errors must be fixed by hand"),
            );
        }
        studio
    }

    /// Install success/failure hooks
    pub fn with_hooks(mut self, hooks: impl RenderHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    fn record(&self, activity: Activity) {
        self.activity.record(activity);
    }

    // ── State ─────────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.pipeline.phase()
    }

    pub fn source(&self) -> Option<&str> {
        self.pipeline.source()
    }

    pub fn artifact(&self) -> Option<&RenderArtifact> {
        self.pipeline.artifact()
    }

    pub fn error(&self) -> Option<&RenderError> {
        self.pipeline.error()
    }

    pub fn policy(&self) -> CompilePolicy {
        self.pipeline.policy()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Pointer, wheel and zoom-button input goes here
    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// The displayed artifact under the current transform
    pub fn frame(&self) -> Option<Frame<'_>> {
        self.artifact()
            .map(|artifact| Frame::new(artifact, self.viewport.transform()))
    }

    /// Whether the fix affordance should be enabled
    ///
    /// Only the failure of the current source can be fixed; while a newer
    /// source compiles there is nothing to fix yet.
    pub fn can_fix(&self) -> bool {
        self.correction
            .can_fix(self.pipeline.failure().map(|(_, error)| error))
    }

    pub fn is_offline(&self) -> bool {
        !self.correction.is_available()
    }

    pub fn is_correcting(&self) -> bool {
        self.correction.is_busy()
    }

    /// Whether any compile or service call is still outstanding
    pub fn has_pending_work(&self) -> bool {
        !self.outstanding.is_empty()
    }

    // ── Operations ────────────────────────────────────────────────────

    /// Feed a new source into the pipeline
    ///
    /// Blank sources are ignored. Returns immediately; the compile result is
    /// applied by [`Studio::next_completion`].
    pub fn set_source(&mut self, source: impl Into<String>) {
        let effects = self.pipeline.handle(Event::SourceChanged(source.into()));
        self.apply(effects);
    }

    /// Ask the correction service to fix the current source's error
    ///
    /// The answer is dropped if the source changes before it arrives.
    pub fn request_fix(&mut self) -> Result<(), RequestRejected> {
        let failure = self.pipeline.failure();
        let future = self.correction.dispatch_fix(
            failure.map(|(source, _)| source).unwrap_or_default(),
            failure.map(|(_, error)| error),
        )?;
        let basis = self.pipeline.latest_run();

        self.record(Activity::info("Requesting fix for render error"));
        self.outstanding.push(
            future
                .map(move |result| Completion::Corrected {
                    purpose: CorrectionPurpose::Fix,
                    basis,
                    result,
                })
                .boxed(),
        );
        Ok(())
    }

    /// Ask the service to generate a new source from an instruction
    pub fn request_generate(
        &mut self,
        instruction: &str,
        kind: Option<DiagramKind>,
    ) -> Result<(), RequestRejected> {
        let future = self.correction.dispatch_generate(instruction, kind)?;
        let basis = self.pipeline.latest_run();

        let mut activity = Activity::info("Requesting diagram generation");
        if let Some(kind) = kind {
            activity = activity.with_details(kind.label());
        }
        self.record(activity);
        self.outstanding.push(
            future
                .map(move |result| Completion::Corrected {
                    purpose: CorrectionPurpose::Generate,
                    basis,
                    result,
                })
                .boxed(),
        );
        Ok(())
    }

    /// Wait for the next outstanding call to finish and apply its result
    ///
    /// Returns `false` when nothing was outstanding.
    pub async fn next_completion(&mut self) -> bool {
        match self.outstanding.next().await {
            Some(completion) => {
                self.complete(completion);
                true
            }
            None => false,
        }
    }

    /// Drive outstanding work until none is left
    ///
    /// A successful fix starts a new compile, which is awaited as well.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Compiled { run, result } => {
                let effects = self
                    .pipeline
                    .handle(Event::CompileFinished { run, result });
                self.apply(effects);
            }
            Completion::Corrected {
                purpose,
                basis,
                result,
            } => {
                match self.correction.finish(purpose, result) {
                    CorrectionOutcome::Applied {
                        purpose: CorrectionPurpose::Fix,
                        ..
                    } if basis != self.pipeline.latest_run() => {
                        debug!(?basis, latest = ?self.pipeline.latest_run(), "Dropping stale fix");
                        self.record(
                            Activity::warning("Fix discarded")
                                .with_details("The source changed while the fix was in progress"),
                        );
                    }
                    CorrectionOutcome::Applied { purpose, source } => {
                        let message = match purpose {
                            CorrectionPurpose::Fix => "Fix applied",
                            CorrectionPurpose::Generate => "Diagram generated",
                        };
                        let mut activity = Activity::success(message);
                        if let Some(kind) = DiagramKind::detect(&source) {
                            activity = activity.with_details(kind.label());
                        }
                        self.record(activity);
                        self.set_source(source);
                    }
                    CorrectionOutcome::Failed { purpose, message } => {
                        let summary = match purpose {
                            CorrectionPurpose::Fix => "Fix request failed",
                            CorrectionPurpose::Generate => "Generation request failed",
                        };
                        self.record(Activity::error(summary).with_details(message));
                    }
                }
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Compile { run, source } => {
                    trace!(%run, "Scheduling compile");
                    let adapter = Arc::clone(&self.adapter);
                    self.outstanding.push(
                        async move {
                            let result = adapter.compile(&source).await;
                            Completion::Compiled { run, result }
                        }
                        .instrument(info_span!("pipeline_run", %run))
                        .boxed(),
                    );
                }
                Effect::ResetViewport => {
                    debug!("Resetting viewport");
                    self.viewport.reset();
                }
                Effect::Notify(Notification::Rendered { run }) => {
                    let mut activity = Activity::success("Diagram rendered");
                    if let Some(kind) = self.source().and_then(DiagramKind::detect) {
                        activity = activity.with_details(format!("{} ({})", kind.label(), run));
                    }
                    self.record(activity);
                    if let (Some(hooks), Some(artifact)) =
                        (self.hooks.as_mut(), self.pipeline.artifact())
                    {
                        hooks.on_success(artifact);
                    }
                }
                Effect::Notify(Notification::Failed { message, .. }) => {
                    self.record(Activity::error("Render failed").with_details(message));
                    if let (Some(hooks), Some(error)) =
                        (self.hooks.as_mut(), self.pipeline.error())
                    {
                        hooks.on_failure(error);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Studio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Studio")
            .field("adapter", &self.adapter)
            .field("phase", &self.pipeline.phase())
            .field("viewport", &self.viewport.transform())
            .field("correction", &self.correction)
            .field("outstanding", &self.outstanding.len())
            .finish()
    }
}

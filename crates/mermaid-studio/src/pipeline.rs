//! Render-recovery pipeline
//!
//! A per-run state machine: `Idle → Compiling → {Displayed, Failed}`. The
//! pipeline performs no I/O; [`Pipeline::handle`] takes an [`Event`] and
//! returns the [`Effect`]s the driver must carry out (start a compile, reset
//! the viewport, notify).
//!
//! Every accepted source change gets a new [`RunId`]. Only the latest run
//! may change displayed state; results of older runs are dropped on arrival,
//! whatever order compiles finish in. A failed run keeps the last good
//! artifact on screen.

use std::fmt;

use tracing::{debug, info, trace};

use crate::core::RenderError;
use crate::engine::RenderArtifact;

/// Identity of one pipeline run, strictly increasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl RunId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing compiled yet
    #[default]
    Idle,
    /// Waiting for the given run
    Compiling { run: RunId },
    /// The latest run produced the displayed artifact
    Displayed,
    /// The latest run failed; the previous artifact (if any) stays displayed
    Failed,
}

/// How compile calls may overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompilePolicy {
    /// At most one compile in flight; only the newest pending source waits
    #[default]
    Serialized,
    /// Every source change compiles immediately
    Concurrent,
}

/// Input to the state machine
#[derive(Debug, Clone)]
pub enum Event {
    SourceChanged(String),
    CompileFinished {
        run: RunId,
        result: Result<RenderArtifact, RenderError>,
    },
}

/// Outcome notifications for hooks and the activity log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Rendered { run: RunId },
    Failed { run: RunId, message: String },
}

/// Work the driver must perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Compile { run: RunId, source: String },
    ResetViewport,
    Notify(Notification),
}

/// The render-recovery state machine
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    policy: CompilePolicy,
    phase: Phase,
    runs: u64,
    latest: Option<RunId>,
    in_flight: Option<RunId>,
    parked: Option<(RunId, String)>,
    source: Option<String>,
    artifact: Option<RenderArtifact>,
    error: Option<RenderError>,
}

impl Pipeline {
    pub fn new(policy: CompilePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> CompilePolicy {
        self.policy
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The displayed artifact (last good frame)
    pub fn artifact(&self) -> Option<&RenderArtifact> {
        self.artifact.as_ref()
    }

    /// The error of the latest finished run, if it failed
    pub fn error(&self) -> Option<&RenderError> {
        self.error.as_ref()
    }

    /// Source of the latest accepted run
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Source and error of the latest run, when that run failed
    ///
    /// `None` while a newer source is compiling: the stored error then
    /// belongs to an older source.
    pub fn failure(&self) -> Option<(&str, &RenderError)> {
        match self.phase {
            Phase::Failed => self.source.as_deref().zip(self.error.as_ref()),
            _ => None,
        }
    }

    pub fn latest_run(&self) -> Option<RunId> {
        self.latest
    }

    pub fn is_compiling(&self) -> bool {
        matches!(self.phase, Phase::Compiling { .. })
    }

    /// Apply an event and return the effects to perform
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::SourceChanged(source) => self.source_changed(source),
            Event::CompileFinished { run, result } => self.compile_finished(run, result),
        }
    }

    fn source_changed(&mut self, source: String) -> Vec<Effect> {
        if source.trim().is_empty() {
            trace!("Ignoring blank source");
            return Vec::new();
        }

        self.runs += 1;
        let run = RunId(self.runs);
        self.latest = Some(run);
        self.source = Some(source.clone());
        self.phase = Phase::Compiling { run };

        match (self.policy, self.in_flight) {
            (CompilePolicy::Serialized, Some(busy)) => {
                if let Some((superseded, _)) = self.parked.replace((run, source)) {
                    debug!(%superseded, %run, "Replacing queued compile");
                }
                debug!(%run, in_flight = %busy, "Compile queued behind in-flight run");
                Vec::new()
            }
            _ => self.start(run, source),
        }
    }

    fn start(&mut self, run: RunId, source: String) -> Vec<Effect> {
        if self.policy == CompilePolicy::Serialized {
            self.in_flight = Some(run);
        }
        debug!(%run, source_len = source.len(), "Starting compile");
        vec![Effect::Compile { run, source }]
    }

    fn compile_finished(
        &mut self,
        run: RunId,
        result: Result<RenderArtifact, RenderError>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.in_flight == Some(run) {
            self.in_flight = None;
        }

        if self.latest == Some(run) {
            effects.extend(self.settle(run, result));
        } else {
            debug!(%run, latest = ?self.latest.map(|r| r.get()), "Discarding stale compile result");
        }

        if self.in_flight.is_none() {
            if let Some((next, source)) = self.parked.take() {
                effects.extend(self.start(next, source));
            }
        }

        effects
    }

    fn settle(&mut self, run: RunId, result: Result<RenderArtifact, RenderError>) -> Vec<Effect> {
        match result {
            Ok(artifact) => {
                info!(%run, width = artifact.width(), height = artifact.height(), "Diagram displayed");
                self.artifact = Some(artifact);
                self.error = None;
                self.phase = Phase::Displayed;
                vec![
                    Effect::ResetViewport,
                    Effect::Notify(Notification::Rendered { run }),
                ]
            }
            Err(error) => {
                info!(%run, message = %error.message, "Diagram failed to compile");
                let message = error.message.clone();
                self.error = Some(error);
                self.phase = Phase::Failed;
                vec![Effect::Notify(Notification::Failed { run, message })]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TrustedSvg;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn artifact(label: &str) -> RenderArtifact {
        RenderArtifact::new(
            TrustedSvg::new(format!("<svg><text>{}</text></svg>", label)),
            10.0,
            10.0,
            format!("id-{}", label),
        )
    }

    fn compile_run(effects: &[Effect]) -> Option<(RunId, String)> {
        effects.iter().find_map(|effect| match effect {
            Effect::Compile { run, source } => Some((*run, source.clone())),
            _ => None,
        })
    }

    fn finish_ok(pipeline: &mut Pipeline, run: RunId, label: &str) -> Vec<Effect> {
        pipeline.handle(Event::CompileFinished {
            run,
            result: Ok(artifact(label)),
        })
    }

    fn finish_err(pipeline: &mut Pipeline, run: RunId, message: &str) -> Vec<Effect> {
        pipeline.handle(Event::CompileFinished {
            run,
            result: Err(RenderError::new(message)),
        })
    }

    #[test]
    fn test_starts_idle() {
        let pipeline = Pipeline::new(CompilePolicy::Serialized);
        assert_eq!(pipeline.phase(), Phase::Idle);
        assert!(pipeline.artifact().is_none());
        assert!(pipeline.error().is_none());
    }

    #[test]
    fn test_blank_source_is_ignored() {
        let mut pipeline = Pipeline::new(CompilePolicy::Serialized);
        assert!(pipeline.handle(Event::SourceChanged(String::new())).is_empty());
        assert!(pipeline
            .handle(Event::SourceChanged("  \n\t ".to_string()))
            .is_empty());
        assert_eq!(pipeline.phase(), Phase::Idle);
        assert!(pipeline.latest_run().is_none());
    }

    #[test]
    fn test_blank_source_keeps_displayed_state() {
        let mut pipeline = Pipeline::new(CompilePolicy::Serialized);
        let effects = pipeline.handle(Event::SourceChanged("graph TD\nA-->B".into()));
        let (run, _) = compile_run(&effects).unwrap();
        finish_ok(&mut pipeline, run, "ab");

        assert!(pipeline.handle(Event::SourceChanged("   ".into())).is_empty());
        assert_eq!(pipeline.phase(), Phase::Displayed);
        assert_eq!(pipeline.source(), Some("graph TD\nA-->B"));
    }

    #[test]
    fn test_success_resets_viewport_and_notifies() {
        let mut pipeline = Pipeline::new(CompilePolicy::Serialized);
        let effects = pipeline.handle(Event::SourceChanged("graph TD\nA-->B".into()));
        let (run, source) = compile_run(&effects).unwrap();
        assert_eq!(source, "graph TD\nA-->B");
        assert_eq!(pipeline.phase(), Phase::Compiling { run });

        let effects = finish_ok(&mut pipeline, run, "ab");
        assert_eq!(
            effects,
            vec![
                Effect::ResetViewport,
                Effect::Notify(Notification::Rendered { run })
            ]
        );
        assert_eq!(pipeline.phase(), Phase::Displayed);
        assert_eq!(pipeline.artifact().unwrap().render_id(), "id-ab");
        assert!(pipeline.error().is_none());
    }

    #[test]
    fn test_failure_keeps_last_good_frame() {
        let mut pipeline = Pipeline::new(CompilePolicy::Serialized);
        let effects = pipeline.handle(Event::SourceChanged("graph TD\nA-->B".into()));
        let (good, _) = compile_run(&effects).unwrap();
        finish_ok(&mut pipeline, good, "good");

        let effects = pipeline.handle(Event::SourceChanged("graph TD\nA->>>B".into()));
        let (bad, _) = compile_run(&effects).unwrap();
        let effects = finish_err(&mut pipeline, bad, "Parse error on line 2");

        assert_eq!(
            effects,
            vec![Effect::Notify(Notification::Failed {
                run: bad,
                message: "Parse error on line 2".to_string()
            })]
        );
        assert_eq!(pipeline.phase(), Phase::Failed);
        assert_eq!(pipeline.artifact().unwrap().render_id(), "id-good");
        assert_eq!(pipeline.error().unwrap().message, "Parse error on line 2");
    }

    #[test]
    fn test_failure_pairs_source_with_its_error() {
        let mut pipeline = Pipeline::new(CompilePolicy::Concurrent);
        let (bad, _) =
            compile_run(&pipeline.handle(Event::SourceChanged("graph TD\nA->>>B".into()))).unwrap();
        assert!(pipeline.failure().is_none());
        finish_err(&mut pipeline, bad, "Parse error on line 2");

        let (source, error) = pipeline.failure().unwrap();
        assert_eq!(source, "graph TD\nA->>>B");
        assert_eq!(error.message, "Parse error on line 2");

        pipeline.handle(Event::SourceChanged("graph TD\nB-->C".into()));
        assert!(pipeline.error().is_some());
        assert!(pipeline.failure().is_none());
    }

    #[test]
    fn test_success_after_failure_clears_error() {
        let mut pipeline = Pipeline::new(CompilePolicy::Serialized);
        let effects = pipeline.handle(Event::SourceChanged("graph TD\nA->>>B".into()));
        let (bad, _) = compile_run(&effects).unwrap();
        finish_err(&mut pipeline, bad, "bad arrow");
        assert!(pipeline.artifact().is_none());

        let effects = pipeline.handle(Event::SourceChanged("graph TD\nA-->B".into()));
        let (good, _) = compile_run(&effects).unwrap();
        finish_ok(&mut pipeline, good, "good");
        assert!(pipeline.error().is_none());
        assert_eq!(pipeline.phase(), Phase::Displayed);
    }

    #[test]
    fn test_concurrent_stale_result_is_discarded() {
        let mut pipeline = Pipeline::new(CompilePolicy::Concurrent);
        let first = compile_run(&pipeline.handle(Event::SourceChanged("graph TD\nA".into())))
            .unwrap()
            .0;
        let second = compile_run(&pipeline.handle(Event::SourceChanged("graph TD\nB".into())))
            .unwrap()
            .0;
        assert!(second > first);

        finish_ok(&mut pipeline, second, "second");
        let effects = finish_ok(&mut pipeline, first, "first");
        assert!(effects.is_empty());
        assert_eq!(pipeline.artifact().unwrap().render_id(), "id-second");
        assert_eq!(pipeline.phase(), Phase::Displayed);
    }

    #[test]
    fn test_stale_failure_does_not_touch_error() {
        let mut pipeline = Pipeline::new(CompilePolicy::Concurrent);
        let first = compile_run(&pipeline.handle(Event::SourceChanged("graph TD\nA->>>".into())))
            .unwrap()
            .0;
        let second = compile_run(&pipeline.handle(Event::SourceChanged("graph TD\nA".into())))
            .unwrap()
            .0;

        assert!(finish_err(&mut pipeline, first, "late failure").is_empty());
        assert!(pipeline.error().is_none());
        assert_eq!(pipeline.phase(), Phase::Compiling { run: second });
    }

    #[test]
    fn test_serialized_parks_only_newest_source() {
        let mut pipeline = Pipeline::new(CompilePolicy::Serialized);
        let (first, _) =
            compile_run(&pipeline.handle(Event::SourceChanged("v1".into()))).unwrap();

        assert!(pipeline.handle(Event::SourceChanged("v2".into())).is_empty());
        assert!(pipeline.handle(Event::SourceChanged("v3".into())).is_empty());
        let latest = pipeline.latest_run().unwrap();
        assert_eq!(pipeline.phase(), Phase::Compiling { run: latest });

        let effects = finish_ok(&mut pipeline, first, "v1");
        assert_eq!(
            effects,
            vec![Effect::Compile {
                run: latest,
                source: "v3".to_string()
            }]
        );
        assert!(pipeline.artifact().is_none());

        let effects = finish_ok(&mut pipeline, latest, "v3");
        assert!(effects.contains(&Effect::ResetViewport));
        assert_eq!(pipeline.artifact().unwrap().render_id(), "id-v3");
    }

    #[test]
    fn test_serialized_runs_next_after_failure() {
        let mut pipeline = Pipeline::new(CompilePolicy::Serialized);
        let (first, _) =
            compile_run(&pipeline.handle(Event::SourceChanged("v1".into()))).unwrap();
        pipeline.handle(Event::SourceChanged("v2".into()));

        let effects = finish_err(&mut pipeline, first, "boom");
        let (next, source) = compile_run(&effects).unwrap();
        assert_eq!(source, "v2");
        assert!(pipeline.error().is_none());
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::Notify(_))));

        finish_ok(&mut pipeline, next, "v2");
        assert_eq!(pipeline.phase(), Phase::Displayed);
    }

    #[test]
    fn test_identical_sources_both_reset() {
        let mut pipeline = Pipeline::new(CompilePolicy::Serialized);
        for _ in 0..2 {
            let (run, _) =
                compile_run(&pipeline.handle(Event::SourceChanged("graph TD\nA-->B".into())))
                    .unwrap();
            let effects = finish_ok(&mut pipeline, run, "ab");
            assert_eq!(effects[0], Effect::ResetViewport);
        }
    }

    proptest! {
        #[test]
        fn prop_latest_source_wins_in_any_completion_order(
            order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle(),
            failures in proptest::collection::vec(any::<bool>(), 6),
        ) {
            let mut pipeline = Pipeline::new(CompilePolicy::Concurrent);
            let runs: Vec<RunId> = (0..6)
                .map(|i| {
                    let effects = pipeline.handle(Event::SourceChanged(format!("graph TD\nN{}", i)));
                    compile_run(&effects).unwrap().0
                })
                .collect();

            for &i in &order {
                let result = if failures[i] {
                    Err(RenderError::new(format!("error {}", i)))
                } else {
                    Ok(artifact(&i.to_string()))
                };
                pipeline.handle(Event::CompileFinished { run: runs[i], result });
            }

            prop_assert_eq!(pipeline.source(), Some("graph TD\nN5"));
            if failures[5] {
                prop_assert_eq!(pipeline.phase(), Phase::Failed);
                prop_assert_eq!(pipeline.error().map(|e| e.message.as_str()), Some("error 5"));
                prop_assert!(pipeline.artifact().is_none());
            } else {
                prop_assert_eq!(pipeline.phase(), Phase::Displayed);
                prop_assert!(pipeline.error().is_none());
                prop_assert_eq!(pipeline.artifact().map(|a| a.render_id()), Some("id-5"));
            }
        }
    }
}

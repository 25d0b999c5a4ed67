//! Shared test engines and services

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mermaid_studio::correction::ServiceFuture;
use mermaid_studio::engine::EngineFuture;
use mermaid_studio::prelude::*;
use parking_lot::Mutex;
use tokio::sync::oneshot;

pub const BROKEN_ARROW: &str = "->>>";

/// Minimal SVG the way a browser engine would emit it
pub fn svg_for(render_id: &str, source: &str) -> String {
    let label = source.lines().last().unwrap_or_default().trim();
    format!(
        r#"<svg id="{id}" xmlns="http://www.w3.org/2000/svg" style="max-width: 120px;" viewBox="0 0 120 80"><style>#{id} .node {{ fill: #eee; }}</style><g class="node"><text>{label}</text></g></svg>"#,
        id = render_id,
        label = label.replace('<', "&lt;").replace('>', "&gt;"),
    )
}

fn check_syntax(source: &str) -> Result<(), EngineFailure> {
    match source.lines().position(|line| line.contains(BROKEN_ARROW)) {
        Some(index) => Err(EngineFailure::diagnostic(format!(
            "Parse error on line {}: unexpected '{}'",
            index + 1,
            BROKEN_ARROW
        ))),
        None => Ok(()),
    }
}

/// Engine that answers immediately and rejects `->>>`
#[derive(Debug, Default)]
pub struct MiniEngine;

impl DiagramEngine for MiniEngine {
    fn name(&self) -> &str {
        "mini"
    }

    fn parse<'a>(&'a self, source: &'a str, _config: &'a RendererConfig) -> EngineFuture<'a, ()> {
        Box::pin(async move { check_syntax(source) })
    }

    fn render<'a>(
        &'a self,
        render_id: &'a str,
        source: &'a str,
        _config: &'a RendererConfig,
    ) -> EngineFuture<'a, String> {
        Box::pin(async move { Ok(svg_for(render_id, source)) })
    }
}

/// Engine whose renders wait on a per-source gate the test releases
#[derive(Default)]
pub struct GatedEngine {
    reentrant: bool,
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<(), String>>>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl GatedEngine {
    pub fn serialized() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reentrant() -> Arc<Self> {
        Arc::new(Self {
            reentrant: true,
            ..Default::default()
        })
    }

    /// Hold renders of `source` until the returned sender fires
    ///
    /// Sending `Ok(())` lets the render succeed; `Err(message)` fails it.
    pub fn gate(&self, source: &str) -> oneshot::Sender<Result<(), String>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(source.to_string(), rx);
        tx
    }

    /// Sources in the order their renders started
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl DiagramEngine for GatedEngine {
    fn name(&self) -> &str {
        "gated"
    }

    fn render<'a>(
        &'a self,
        render_id: &'a str,
        source: &'a str,
        _config: &'a RendererConfig,
    ) -> EngineFuture<'a, String> {
        Box::pin(async move {
            self.calls.lock().push(source.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let gate = self.gates.lock().remove(source);
            let outcome = match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Err("gate dropped".to_string())),
                None => Ok(()),
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match outcome {
                Ok(()) => Ok(svg_for(render_id, source)),
                Err(message) => Err(EngineFailure::diagnostic(message)),
            }
        })
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }
}

/// Correction service that replays scripted answers and records requests
#[derive(Default)]
pub struct ScriptedService {
    answers: Mutex<Vec<Result<String, ServiceError>>>,
    pub fixes: Mutex<Vec<FixRequest>>,
    pub generations: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedService {
    pub fn answering(answers: Vec<Result<String, ServiceError>>) -> Arc<Self> {
        let mut answers = answers;
        answers.reverse();
        Arc::new(Self {
            answers: Mutex::new(answers),
            ..Default::default()
        })
    }

    fn next_answer(&self) -> Result<String, ServiceError> {
        self.answers
            .lock()
            .pop()
            .unwrap_or(Err(ServiceError::EmptyResponse))
    }
}

impl CorrectionService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fix(&self, request: FixRequest) -> ServiceFuture<'_> {
        self.fixes.lock().push(request);
        let answer = self.next_answer();
        Box::pin(async move { answer })
    }

    fn generate(&self, request: GenerateRequest) -> ServiceFuture<'_> {
        self.generations.lock().push(request);
        let answer = self.next_answer();
        Box::pin(async move { answer })
    }
}

pub fn adapter(engine: Arc<dyn DiagramEngine>) -> RenderAdapter {
    RenderAdapter::new(engine, RendererConfig::global())
}

/// Offline studio over the immediate engine, with its activity log
pub fn mini_studio() -> (Studio, ActivityLog) {
    let log = ActivityLog::new();
    let studio = Studio::new(
        adapter(Arc::new(MiniEngine)),
        CorrectionLoop::offline(),
        log.clone(),
    );
    (studio, log)
}

pub fn messages(log: &ActivityLog) -> Vec<String> {
    log.entries().into_iter().map(|entry| entry.message).collect()
}

//! Render engine backed by mermaid-cli (`mmdc`)
//!
//! Every render runs `mmdc` in its own temporary directory: the source and
//! the renderer configuration are written next to each other, and the SVG is
//! read back from the output file. Separate directories make the engine safe
//! to run concurrently.

use std::path::Path;
use std::process::Stdio;

use anyhow::{anyhow, Context};
use mermaid_studio::engine::{DiagramEngine, EngineFailure, EngineFuture};
use mermaid_studio::RendererConfig;
use tokio::process::Command;
use tracing::{debug, trace};

/// Command used when `--mmdc` is not given
pub const DEFAULT_MMDC: &str = "mmdc";

/// `mmdc` invocation
///
/// The command may carry leading arguments, e.g.
/// `npx -p @mermaid-js/mermaid-cli mmdc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmdcEngine {
    program: String,
    args: Vec<String>,
}

impl MmdcEngine {
    pub fn new(command: &str) -> anyhow::Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("The mmdc command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn invocation_args(
        &self,
        input: &Path,
        output: &Path,
        config: &Path,
        render_id: &str,
    ) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "-i".to_string(),
            input.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
            "-c".to_string(),
            config.display().to_string(),
            "-I".to_string(),
            render_id.to_string(),
            "-q".to_string(),
        ]);
        args
    }

    async fn run(
        &self,
        render_id: &str,
        source: &str,
        config: &RendererConfig,
    ) -> Result<String, EngineFailure> {
        let workdir = tempfile::Builder::new()
            .prefix("mermaid-studio-")
            .tempdir()?;
        let input = workdir.path().join("diagram.mmd");
        let output = workdir.path().join("diagram.svg");
        let config_path = workdir.path().join("config.json");

        let config_json = config
            .to_engine_json()
            .context("Failed to serialize renderer configuration")?;
        tokio::fs::write(&input, source).await?;
        tokio::fs::write(&config_path, config_json).await?;

        let args = self.invocation_args(&input, &output, &config_path, render_id);
        trace!(program = %self.program, ?args, "Spawning mmdc");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run '{}'", self.program))?;

        if !result.status.success() {
            debug!(status = %result.status, "mmdc rejected source");
            return Err(diagnose(&String::from_utf8_lossy(&result.stderr)));
        }

        let markup = tokio::fs::read_to_string(&output)
            .await
            .with_context(|| format!("mmdc wrote no output to {}", output.display()))?;
        Ok(markup)
    }
}

/// Turn `mmdc` diagnostics into an engine failure
///
/// The first non-empty line (minus a leading `Error:`) is the message; the
/// full text is kept as detail.
pub fn diagnose(stderr: &str) -> EngineFailure {
    let text = stderr.trim();
    let Some(headline) = text.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return EngineFailure::Unknown;
    };

    let message = headline
        .strip_prefix("Error:")
        .map(str::trim)
        .unwrap_or(headline);

    if message == text {
        EngineFailure::diagnostic(message)
    } else {
        EngineFailure::diagnostic_with_detail(message, text)
    }
}

impl DiagramEngine for MmdcEngine {
    fn name(&self) -> &str {
        "mmdc"
    }

    fn render<'a>(
        &'a self,
        render_id: &'a str,
        source: &'a str,
        config: &'a RendererConfig,
    ) -> EngineFuture<'a, String> {
        Box::pin(self.run(render_id, source, config))
    }

    fn is_reentrant(&self) -> bool {
        true
    }
}

//! Correction service backed by an external command
//!
//! The command receives one JSON request on stdin and answers with raw
//! diagram text on stdout. The credential is passed through the environment
//! and never appears on the command line.

use std::fmt;
use std::io::ErrorKind;
use std::process::Stdio;

use mermaid_studio::correction::{CorrectionService, FixRequest, GenerateRequest, ServiceFuture};
use mermaid_studio::{DiagramKind, ServiceConfig, ServiceError, API_KEY_ENV};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Request written to the command's stdin
#[derive(Debug, Serialize)]
#[serde(tag = "task", rename_all = "lowercase")]
enum ServiceRequest<'a> {
    Fix {
        source: &'a str,
        error: &'a str,
    },
    Generate {
        instruction: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<DiagramKind>,
    },
}

pub struct ExecCorrector {
    program: String,
    args: Vec<String>,
    credential: String,
}

impl ExecCorrector {
    /// Build the corrector, or `None` when the service is not fully configured
    pub fn from_config(config: &ServiceConfig) -> Option<Self> {
        if !config.is_available() {
            return None;
        }
        let Some(command) = config.command.as_deref() else {
            warn!("Credential set but no correction command configured");
            return None;
        };

        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            credential: config.credential.clone().unwrap_or_default(),
        })
    }

    async fn call(&self, request: ServiceRequest<'_>) -> Result<String, ServiceError> {
        let payload = serde_json::to_vec(&request)
            .map_err(|e| ServiceError::failed(format!("Failed to encode request: {}", e)))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(API_KEY_ENV, &self.credential)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ServiceError::failed(format!("Failed to run '{}': {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&payload).await {
                Ok(()) => {}
                // The command may answer without reading its input
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("Correction command closed stdin early");
                }
                Err(e) => return Err(ServiceError::failed(e.to_string())),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ServiceError::failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or("no diagnostics");
            return Err(ServiceError::failed(format!("{} ({})", reason, output.status)));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| ServiceError::failed("Correction command wrote invalid UTF-8"))
    }
}

impl CorrectionService for ExecCorrector {
    fn name(&self) -> &str {
        &self.program
    }

    fn fix(&self, request: FixRequest) -> ServiceFuture<'_> {
        Box::pin(async move {
            self.call(ServiceRequest::Fix {
                source: &request.source,
                error: &request.error_message,
            })
            .await
        })
    }

    fn generate(&self, request: GenerateRequest) -> ServiceFuture<'_> {
        Box::pin(async move {
            self.call(ServiceRequest::Generate {
                instruction: &request.instruction,
                kind: request.kind,
            })
            .await
        })
    }
}

impl fmt::Debug for ExecCorrector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecCorrector")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("credential", &"<redacted>")
            .finish()
    }
}

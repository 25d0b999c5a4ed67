//! Command-line interface for the mermaid-studio utility
//!
//! Drives the studio against `mmdc` and an optional correction command.

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::colorizer::ConsoleSink;
use crate::exec::ExecCorrector;
use crate::mmdc::{MmdcEngine, DEFAULT_MMDC};
use mermaid_studio::core::logging::{init_logging, LOG_FORMAT_ENV, LOG_LEVEL_ENV};
use mermaid_studio::prelude::*;
use mermaid_studio::viewport::Viewport;
use mermaid_studio::{API_KEY_ENV, DEFAULT_FONT_FAMILY, FIXER_ENV, UNKNOWN_RENDER_ERROR};

/// Mermaid Studio - render, check and repair Mermaid.js diagrams
#[derive(Parser)]
#[command(name = "mermaid-studio")]
#[command(about = "Live render-validate-recover pipeline for Mermaid.js diagrams")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Set log level (trace|debug|info|warn|error)
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Set log format (compact|pretty|json)
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// When to color activity output
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// mermaid-cli command, optionally with leading arguments
    #[arg(long, default_value = DEFAULT_MMDC)]
    pub mmdc: String,

    /// Rendering theme (default|dark|forest|neutral|base)
    #[arg(long, default_value = "default")]
    pub theme: Theme,

    /// Font family passed to the renderer
    #[arg(long)]
    pub font_family: Option<String>,

    /// Renderer security level (strict|loose|antiscript|sandbox)
    #[arg(long, default_value = "loose")]
    pub security_level: SecurityLevel,
}

/// Log level options
#[derive(Copy, Clone, Debug, clap::ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format options
#[derive(Copy, Clone, Debug, clap::ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a diagram to SVG or HTML
    Render {
        /// Input file containing the diagram (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output document format
        #[arg(long, value_enum, default_value_t = OutputFormat::Svg)]
        format: OutputFormat,

        /// Zoom button presses applied to the HTML view (negative zooms out)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        zoom_steps: i32,

        /// Pan offset applied to the HTML view, as X,Y
        #[arg(long, allow_hyphen_values = true)]
        pan: Option<Pan>,

        /// Ask the correction service for one fix if rendering fails
        #[arg(long)]
        fix: bool,
    },

    /// Check that a diagram compiles
    Check {
        /// Input file to check (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Re-render a file every time it changes
    Watch {
        /// File to watch
        #[arg(short, long)]
        input: PathBuf,

        /// File rewritten after every successful render
        #[arg(short, long)]
        output: PathBuf,

        /// Output document format
        #[arg(long, value_enum, default_value_t = OutputFormat::Svg)]
        format: OutputFormat,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// Generate a diagram from a description
    Generate {
        /// What the diagram should show
        #[arg(short, long)]
        prompt: String,

        /// Diagram kind to ask for (flowchart, sequence, class, ...)
        #[arg(short, long)]
        kind: Option<DiagramKind>,

        /// Output file (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output document format
        #[arg(long, value_enum, default_value_t = OutputFormat::Svg)]
        format: OutputFormat,

        /// Also write the generated source to this file
        #[arg(long)]
        save_source: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Show in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Output document formats
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The normalized SVG document
    #[default]
    Svg,
    /// Standalone HTML page with the SVG under the viewport transform
    Html,
}

/// When to colorize output
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Use colors if stderr is a terminal and NO_COLOR is not set
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Pan offset given as `X,Y`
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pan {
    pub x: f64,
    pub y: f64,
}

impl FromStr for Pan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("Expected X,Y but got '{}'", s))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| format!("Invalid pan offset '{}'", part.trim()))
        };
        Ok(Pan {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

/// Apply zoom presses and a pan to a freshly reset viewport
pub fn apply_view(viewport: &mut Viewport, zoom_steps: i32, pan: Option<Pan>) {
    for _ in 0..zoom_steps.unsigned_abs() {
        if zoom_steps > 0 {
            viewport.zoom_in();
        } else {
            viewport.zoom_out();
        }
    }
    if let Some(pan) = pan {
        let start = viewport.transform();
        viewport.on_drag_start(start.offset_x, start.offset_y);
        viewport.on_drag_move(start.offset_x + pan.x, start.offset_y + pan.y);
        viewport.on_drag_end();
    }
}

/// Main CLI application
pub struct StudioApp {
    service: ServiceConfig,
}

impl StudioApp {
    /// Create a new application instance with the service taken from the environment
    pub fn new() -> Self {
        Self::with_service(ServiceConfig::from_env())
    }

    /// Create a new application instance with an explicit service configuration
    pub fn with_service(service: ServiceConfig) -> Self {
        Self { service }
    }

    fn renderer_config(cli: &Cli) -> RendererConfig {
        RendererConfig {
            theme: cli.theme,
            font_family: cli
                .font_family
                .clone()
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            security_level: cli.security_level,
            ..RendererConfig::default()
        }
    }

    /// Run the application with the given CLI arguments
    pub async fn run(&self, cli: Cli) -> Result<()> {
        // Environment variables take precedence over CLI flags
        let log_level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .unwrap_or_else(|| cli.log_level.as_str().to_string());
        let log_format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .unwrap_or_else(|| cli.log_format.as_str().to_string());

        if let Err(e) = init_logging(Some(&log_level), Some(&log_format)) {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        if cli.verbose {
            eprintln!("Mermaid Studio v{}", env!("CARGO_PKG_VERSION"));
        }

        let renderer = Self::renderer_config(&cli);
        let color = self.should_colorize(cli.color);

        match cli.command {
            Commands::Config { json } => self.config_command(&renderer, &cli.mmdc, json),
            Commands::Render {
                input,
                output,
                format,
                zoom_steps,
                pan,
                fix,
            } => {
                let mut studio = self.open_studio(renderer, &cli.mmdc, color)?;
                self.render_command(
                    &mut studio,
                    input,
                    output,
                    format,
                    zoom_steps,
                    pan,
                    fix,
                    cli.verbose,
                )
                .await
            }
            Commands::Check { input } => {
                let mut studio = self.open_studio(renderer, &cli.mmdc, color)?;
                self.check_command(&mut studio, input, cli.verbose).await
            }
            Commands::Watch {
                input,
                output,
                format,
                interval_ms,
            } => {
                let mut studio = self.open_studio(renderer, &cli.mmdc, color)?;
                self.watch_command(&mut studio, input, output, format, interval_ms)
                    .await
            }
            Commands::Generate {
                prompt,
                kind,
                output,
                format,
                save_source,
            } => {
                let mut studio = self.open_studio(renderer, &cli.mmdc, color)?;
                self.generate_command(&mut studio, &prompt, kind, output, format, save_source)
                    .await
            }
        }
    }

    /// Install the renderer configuration and build a studio around mmdc
    fn open_studio(&self, renderer: RendererConfig, mmdc: &str, color: bool) -> Result<Studio> {
        let config = RendererConfig::install(renderer)?;
        let engine = MmdcEngine::new(mmdc)?;
        debug!(program = engine.program(), "Using mmdc engine");

        let corrector = ExecCorrector::from_config(&self.service)
            .map(|corrector| Arc::new(corrector) as Arc<dyn CorrectionService>);

        Ok(Studio::new(
            RenderAdapter::new(Arc::new(engine), config),
            CorrectionLoop::from_service(corrector),
            ConsoleSink::new(color),
        ))
    }

    /// Handle the render command
    #[allow(clippy::too_many_arguments)]
    async fn render_command(
        &self,
        studio: &mut Studio,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        format: OutputFormat,
        zoom_steps: i32,
        pan: Option<Pan>,
        fix: bool,
        verbose: bool,
    ) -> Result<()> {
        let content = self.read_input(input)?;

        if verbose {
            eprintln!("Read {} bytes of input", content.len());
        }

        compile(studio, content).await?;

        if fix && studio.phase() == Phase::Failed {
            match studio.request_fix() {
                Ok(()) => studio.settle().await,
                Err(reason) => warn!(%reason, "Fix not requested"),
            }
        }

        if studio.phase() != Phase::Displayed {
            bail!("Render failed: {}", failure_message(studio));
        }

        apply_view(studio.viewport_mut(), zoom_steps, pan);
        let document = document(studio, format)?;
        self.write_output(output, &document)
    }

    /// Handle the check command
    async fn check_command(
        &self,
        studio: &mut Studio,
        input: Option<PathBuf>,
        verbose: bool,
    ) -> Result<()> {
        let content = self.read_input(input)?;
        let kind = DiagramKind::detect(&content)
            .map(|kind| kind.label())
            .unwrap_or("Mermaid diagram");

        if verbose {
            eprintln!("Read {} bytes of input", content.len());
        }

        compile(studio, content).await?;

        match studio.phase() {
            Phase::Displayed => {
                println!("✓ Valid {}", kind);
                Ok(())
            }
            _ => {
                let message = failure_message(studio);
                println!("✗ Invalid {}: {}", kind, message);
                Err(anyhow!("Invalid diagram"))
            }
        }
    }

    /// Handle the watch command
    async fn watch_command(
        &self,
        studio: &mut Studio,
        input: PathBuf,
        output: PathBuf,
        format: OutputFormat,
        interval_ms: u64,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(50)));
        let mut current: Option<String> = None;
        let mut written: Option<String> = None;

        eprintln!("Watching {} (Ctrl-C to stop)", input.display());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match tokio::fs::read_to_string(&input).await {
                        Ok(text) if current.as_deref() != Some(text.as_str()) => {
                            current = Some(text.clone());
                            studio.set_source(text);
                        }
                        Ok(_) => {}
                        Err(e) => warn!(path = %input.display(), error = %e, "Failed to read watched file"),
                    }
                }
                _ = studio.next_completion(), if studio.has_pending_work() => {
                    let Some(artifact) = studio.artifact() else {
                        continue;
                    };
                    if written.as_deref() == Some(artifact.render_id()) {
                        continue;
                    }
                    written = Some(artifact.render_id().to_string());
                    let document = document(studio, format)?;
                    self.write_output(Some(output.clone()), &document)?;
                }
                _ = tokio::signal::ctrl_c() => {
                    debug!("Interrupted");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle the generate command
    async fn generate_command(
        &self,
        studio: &mut Studio,
        prompt: &str,
        kind: Option<DiagramKind>,
        output: Option<PathBuf>,
        format: OutputFormat,
        save_source: Option<PathBuf>,
    ) -> Result<()> {
        if studio.is_offline() {
            bail!(
                "Correction service not configured; set {} and {}",
                API_KEY_ENV,
                FIXER_ENV
            );
        }

        studio.request_generate(prompt, kind)?;
        studio.settle().await;

        if let (Some(path), Some(source)) = (save_source, studio.source()) {
            fs::write(&path, source).map_err(|e| {
                anyhow!("Failed to write source file '{}': {}", path.display(), e)
            })?;
        }

        match studio.phase() {
            Phase::Displayed => {
                let document = document(studio, format)?;
                self.write_output(output, &document)
            }
            Phase::Idle => Err(anyhow!("Generation failed")),
            _ => bail!("Generated diagram failed to render: {}", failure_message(studio)),
        }
    }

    /// Handle the config command
    pub fn config_command(&self, renderer: &RendererConfig, mmdc: &str, json: bool) -> Result<()> {
        if json {
            let config = serde_json::json!({
                "renderer": renderer,
                "mmdc": mmdc,
                "service": {
                    "available": self.service.is_available(),
                    "command": self.service.command,
                },
            });
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!("Renderer:");
            println!("  theme           {}", renderer.theme);
            println!("  font family     {}", renderer.font_family);
            println!("  security level  {}", renderer.security_level);
            println!("  mmdc            {}", mmdc);
            println!();
            println!("Correction service:");
            if self.service.is_available() {
                println!(
                    "  command         {}",
                    self.service.command.as_deref().unwrap_or("(not set)")
                );
            } else {
                println!("  offline (set {} to enable)", API_KEY_ENV);
            }
        }
        Ok(())
    }

    /// Determine if activity output should be colorized
    fn should_colorize(&self, color: ColorChoice) -> bool {
        match color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                if std::env::var("NO_COLOR").is_ok() {
                    return false;
                }
                crossterm::tty::IsTty::is_tty(&std::io::stderr())
            }
        }
    }

    /// Read input from file or stdin
    pub fn read_input(&self, input: Option<PathBuf>) -> Result<String> {
        match input {
            Some(path) if path.to_string_lossy() != "-" => fs::read_to_string(&path)
                .map_err(|e| anyhow!("Failed to read input file '{}': {}", path.display(), e)),
            _ => {
                let mut content = String::new();
                io::stdin().read_to_string(&mut content)?;
                Ok(content)
            }
        }
    }

    /// Write output to file or stdout
    pub fn write_output(&self, output: Option<PathBuf>, content: &str) -> Result<()> {
        match output {
            Some(path) if path.to_string_lossy() != "-" => {
                fs::write(&path, content).map_err(|e| {
                    anyhow!("Failed to write output file '{}': {}", path.display(), e)
                })?;
            }
            _ => {
                if content.is_empty() || content.ends_with('\n') {
                    print!("{}", content);
                } else {
                    println!("{}", content);
                }
                io::stdout().flush()?;
            }
        }
        Ok(())
    }
}

impl Default for StudioApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Feed a source and wait for it to settle
async fn compile(studio: &mut Studio, content: String) -> Result<()> {
    studio.set_source(content);
    if studio.phase() == Phase::Idle {
        bail!("Input contains no diagram source");
    }
    studio.settle().await;
    Ok(())
}

fn failure_message(studio: &Studio) -> String {
    studio
        .error()
        .map(|error| error.message.clone())
        .unwrap_or_else(|| UNKNOWN_RENDER_ERROR.to_string())
}

/// The displayed artifact as an output document
fn document(studio: &Studio, format: OutputFormat) -> Result<String> {
    let frame = studio
        .frame()
        .ok_or_else(|| anyhow!("No diagram has been rendered"))?;

    Ok(match format {
        OutputFormat::Svg => frame.svg().as_str().to_string(),
        OutputFormat::Html => {
            let title = studio
                .source()
                .and_then(DiagramKind::detect)
                .map(|kind| kind.label())
                .unwrap_or("Mermaid diagram");
            frame.to_document(title)
        }
    })
}

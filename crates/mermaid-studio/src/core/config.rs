//! Renderer and service configuration
//!
//! The renderer configuration is process-wide: it is installed once at
//! startup and handed to every compile call by reference. The service
//! configuration decides whether the correction capability exists at all.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::StudioError;

/// Environment variable holding the correction service credential
pub const API_KEY_ENV: &str = "MERMAID_STUDIO_API_KEY";

/// Environment variable holding the correction service command
pub const FIXER_ENV: &str = "MERMAID_STUDIO_FIXER";

/// Font stack used when none is configured
pub const DEFAULT_FONT_FAMILY: &str = "\"trebuchet ms\", verdana, arial, sans-serif";

static RENDERER_CONFIG: OnceLock<RendererConfig> = OnceLock::new();

/// Rendering theme understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Forest,
    Neutral,
    Base,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Dark => "dark",
            Theme::Forest => "forest",
            Theme::Neutral => "neutral",
            Theme::Base => "base",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Theme::Default),
            "dark" => Ok(Theme::Dark),
            "forest" => Ok(Theme::Forest),
            "neutral" => Ok(Theme::Neutral),
            "base" => Ok(Theme::Base),
            _ => Err(format!("Unknown theme: {}", s)),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much markup the engine lets through into its output
///
/// `Loose` permits HTML labels and click handlers and is what the studio
/// runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Strict,
    #[default]
    Loose,
    Antiscript,
    Sandbox,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Strict => "strict",
            SecurityLevel::Loose => "loose",
            SecurityLevel::Antiscript => "antiscript",
            SecurityLevel::Sandbox => "sandbox",
        }
    }
}

impl FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(SecurityLevel::Strict),
            "loose" => Ok(SecurityLevel::Loose),
            "antiscript" => Ok(SecurityLevel::Antiscript),
            "sandbox" => Ok(SecurityLevel::Sandbox),
            _ => Err(format!("Unknown security level: {}", s)),
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verbosity of the engine's own logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    #[default]
    Error,
    Fatal,
}

/// Process-wide renderer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererConfig {
    pub theme: Theme,
    pub font_family: String,
    pub security_level: SecurityLevel,
    pub log_level: EngineLogLevel,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            security_level: SecurityLevel::default(),
            log_level: EngineLogLevel::default(),
        }
    }
}

impl RendererConfig {
    /// Install the process-wide configuration
    ///
    /// Succeeds only once per process; later calls (or a call after
    /// [`RendererConfig::global`] fell back to defaults) are rejected so the
    /// configuration stays read-only for the rest of the run.
    pub fn install(config: RendererConfig) -> Result<&'static RendererConfig, StudioError> {
        let mut installed = false;
        let current = RENDERER_CONFIG.get_or_init(|| {
            installed = true;
            config
        });

        if installed {
            tracing::debug!(theme = %current.theme, security = %current.security_level, "Renderer configuration installed");
            Ok(current)
        } else {
            Err(StudioError::config(
                "renderer configuration is already initialized",
            ))
        }
    }

    /// The installed configuration, or the defaults if none was installed
    pub fn global() -> &'static RendererConfig {
        RENDERER_CONFIG.get_or_init(RendererConfig::default)
    }

    /// Serialize into the JSON object the engine reads
    pub fn to_engine_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Configuration of the external correction/generation service
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Access credential; absence means offline mode
    pub credential: Option<String>,
    /// Command that implements the service, for process-backed hosts
    pub command: Option<String>,
}

impl ServiceConfig {
    /// Read the configuration from the environment
    pub fn from_env() -> Self {
        Self {
            credential: std::env::var(API_KEY_ENV).ok(),
            command: std::env::var(FIXER_ENV).ok(),
        }
    }

    /// Whether a usable credential is configured
    pub fn is_available(&self) -> bool {
        self.credential
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("command", &self.command)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_renderer_config() {
        let config = RendererConfig::default();
        assert_eq!(config.theme, Theme::Default);
        assert_eq!(config.security_level, SecurityLevel::Loose);
        assert_eq!(config.log_level, EngineLogLevel::Error);
        assert!(config.font_family.contains("trebuchet ms"));
    }

    #[test]
    fn test_engine_json_uses_camel_case() {
        let json = RendererConfig::default().to_engine_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["theme"], "default");
        assert_eq!(value["securityLevel"], "loose");
        assert_eq!(value["logLevel"], "error");
        assert!(value["fontFamily"].is_string());
    }

    #[test]
    fn test_theme_parsing() {
        assert_eq!(Theme::from_str("Dark").unwrap(), Theme::Dark);
        assert_eq!(Theme::from_str("forest").unwrap(), Theme::Forest);
        assert!(Theme::from_str("solarized").is_err());
        assert_eq!(Theme::Neutral.to_string(), "neutral");
    }

    #[test]
    fn test_security_level_parsing() {
        assert_eq!(
            SecurityLevel::from_str("SANDBOX").unwrap(),
            SecurityLevel::Sandbox
        );
        assert!(SecurityLevel::from_str("open").is_err());
    }

    #[test]
    fn test_service_availability() {
        let config = ServiceConfig::default();
        assert!(!config.is_available());

        let config = ServiceConfig {
            credential: Some("   ".to_string()),
            command: None,
        };
        assert!(!config.is_available());

        let config = ServiceConfig {
            credential: Some("key-123".to_string()),
            command: None,
        };
        assert!(config.is_available());
    }

    #[test]
    fn test_service_config_debug_redacts_credential() {
        let config = ServiceConfig {
            credential: Some("secret-key".to_string()),
            command: Some("fixer".to_string()),
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }
}

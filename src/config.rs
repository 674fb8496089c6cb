//! Configuration management for texcollab.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{AppState, ServerConfig};
use crate::cli::Args;
use crate::compile::{LatexCompiler, DEFAULT_ENGINE};
use crate::security::AuthConfig;
use crate::session::{ChannelConfig, KeyMode, DEFAULT_FILE};
use crate::store::MemoryProjectStore;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub security: SecuritySection,
    pub channel: ChannelSection,
    pub compile: CompileSection,
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            graceful_shutdown: true,
        }
    }
}

/// Security configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub auth: AuthSection,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Enable authentication.
    pub enabled: bool,
    /// Accepted bearer tokens.
    pub tokens: Vec<String>,
}

/// Collaboration channel section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSection {
    pub key_mode: KeyMode,
    /// File edited by connections that name none.
    pub default_file: String,
    #[serde(flatten)]
    pub delivery: ChannelConfig,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            key_mode: KeyMode::default(),
            default_file: DEFAULT_FILE.to_string(),
            delivery: ChannelConfig::default(),
        }
    }
}

/// Compile backend section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileSection {
    /// Root of the per-project build directories.
    pub builds_dir: PathBuf,
    /// LaTeX engine executable.
    pub engine: String,
    /// Timeout of one engine pass.
    pub timeout_secs: u64,
    pub passes: u32,
}

impl Default for CompileSection {
    fn default() -> Self {
        Self {
            builds_dir: PathBuf::from("builds"),
            engine: DEFAULT_ENGINE.to_string(),
            timeout_secs: 30,
            passes: 2,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_vars<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("TEXCOLLAB_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("TEXCOLLAB_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TEXCOLLAB_PORT", port))?;
        }

        if let Some(token) = var("TEXCOLLAB_TOKEN").filter(|t| !t.is_empty()) {
            self.add_token(token);
        }

        if let Some(mode) = var("TEXCOLLAB_KEY_MODE") {
            self.channel.key_mode = mode
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TEXCOLLAB_KEY_MODE", mode))?;
        }

        if let Some(echo) = var("TEXCOLLAB_ECHO") {
            self.channel.delivery.echo_to_sender = match echo.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidValue("TEXCOLLAB_ECHO", echo)),
            };
        }

        if let Some(dir) = var("TEXCOLLAB_BUILDS_DIR") {
            self.compile.builds_dir = PathBuf::from(dir);
        }

        if let Some(level) = var("TEXCOLLAB_LOG_LEVEL").or_else(|| var("RUST_LOG")) {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref token) = args.token {
            self.add_token(token.clone());
        }

        if args.no_auth {
            self.security.auth.enabled = false;
        }

        if let Some(mode) = args.key_mode {
            self.channel.key_mode = mode;
        }

        if args.echo {
            self.channel.delivery.echo_to_sender = true;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    fn add_token(&mut self, token: String) {
        self.security.auth.enabled = true;
        if !self.security.auth.tokens.contains(&token) {
            self.security.auth.tokens.push(token);
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        let auth = AuthConfig {
            enabled: self.security.auth.enabled,
            ..AuthConfig::default()
        };
        let mut server_config = ServerConfig::new(host.to_string(), self.server.port).with_auth(auth);
        for token in &self.security.auth.tokens {
            server_config = server_config.with_token(token.as_str());
        }

        if !self.server.graceful_shutdown {
            server_config = server_config.without_graceful_shutdown();
        }

        Ok(server_config)
    }

    /// Build the LaTeX backend described by the compile section.
    pub fn compiler(&self) -> LatexCompiler {
        LatexCompiler::new(&self.compile.builds_dir)
            .engine(self.compile.engine.as_str())
            .timeout(Duration::from_secs(self.compile.timeout_secs))
            .passes(self.compile.passes)
    }

    /// Build the shared application state.
    pub fn app_state(&self) -> AppState {
        AppState::from_parts(
            Arc::new(MemoryProjectStore::new()),
            Arc::new(self.compiler()),
            self.channel.delivery.clone(),
        )
        .with_key_mode(self.channel.key_mode)
        .with_default_file(self.channel.default_file.as_str())
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Environment variable with an unusable value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

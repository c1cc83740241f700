//! Configuration management for Tribunal
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (TRIBUNAL_*)
//! 3. Config file (~/.config/tribunal/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::CommandTemplates;
use crate::{Error, Result};

/// What happens when a proposal runs out of review rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustionPolicy {
    /// Stop and hand the proposal to a human
    #[default]
    Escalate,
    /// Accept the proposal as it stands
    ForceAccept,
}

impl std::fmt::Display for ExhaustionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExhaustionPolicy::Escalate => "escalate",
            ExhaustionPolicy::ForceAccept => "force-accept",
        })
    }
}

impl std::str::FromStr for ExhaustionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "escalate" => Ok(ExhaustionPolicy::Escalate),
            "force-accept" => Ok(ExhaustionPolicy::ForceAccept),
            other => Err(Error::Config(format!(
                "Unknown exhaustion policy '{}', expected escalate or force-accept",
                other
            ))),
        }
    }
}

/// Review workflow configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Number of review rounds allowed before the exhaustion policy applies
    pub max_rounds: u32,

    /// Policy once `max_rounds` rounds ended without consensus
    pub on_exhaustion: ExhaustionPolicy,

    /// How long a review request may stay unanswered before it is overdue
    #[serde(with = "humantime_serde")]
    pub reviewer_timeout: Duration,

    /// Requirements reference quoted in every review brief
    pub requirements_ref: Option<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            on_exhaustion: ExhaustionPolicy::Escalate,
            reviewer_timeout: Duration::from_secs(24 * 60 * 60),
            requirements_ref: None,
        }
    }
}

/// Which Task Store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// An issue tracker command line tool
    #[default]
    Cli,
    /// GitHub issues
    Github,
    /// In-process memory (nothing survives the process)
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StoreBackend::Cli => "cli",
            StoreBackend::Github => "github",
            StoreBackend::Memory => "memory",
        })
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cli" => Ok(StoreBackend::Cli),
            "github" => Ok(StoreBackend::Github),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(Error::Config(format!(
                "Unknown store backend '{}', expected cli, github or memory",
                other
            ))),
        }
    }
}

/// Tracker CLI settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliStoreConfig {
    /// Tracker executable
    pub program: String,

    /// Argument templates per operation
    #[serde(flatten)]
    pub templates: CommandTemplates,
}

impl Default for CliStoreConfig {
    fn default() -> Self {
        Self {
            program: "bd".to_string(),
            templates: CommandTemplates::default(),
        }
    }
}

/// GitHub issues settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubStoreConfig {
    /// Repository (owner/repo or URL)
    pub repo: Option<String>,

    /// Label attached to every issue Tribunal creates
    pub label: String,
}

impl Default for GitHubStoreConfig {
    fn default() -> Self {
        Self {
            repo: None,
            label: "tribunal".to_string(),
        }
    }
}

/// Task Store configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use
    pub backend: StoreBackend,

    /// Upper bound for every Task Store call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Tracker CLI backend settings
    pub cli: CliStoreConfig,

    /// GitHub backend settings
    pub github: GitHubStoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Cli,
            timeout: Duration::from_secs(30),
            cli: CliStoreConfig::default(),
            github: GitHubStoreConfig::default(),
        }
    }
}

/// Review state persistence configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// SQLite database path (defaults to ~/.cache/tribunal/tribunal.db)
    pub database: Option<PathBuf>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Review workflow configuration
    pub review: ReviewConfig,

    /// Task Store configuration
    pub store: StoreConfig,

    /// State persistence configuration
    pub state: StateConfig,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backend: Option<StoreBackend>,
    pub tracker: Option<String>,
    pub repo: Option<String>,
    pub database: Option<PathBuf>,
    pub max_rounds: Option<u32>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/tribunal/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tribunal").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - TRIBUNAL_STORE: Task Store backend (cli, github, memory)
    /// - TRIBUNAL_TRACKER: Tracker executable for the cli backend
    /// - TRIBUNAL_GITHUB_REPO: Repository for the github backend
    /// - TRIBUNAL_DATABASE: SQLite database path
    /// - TRIBUNAL_MAX_ROUNDS: Review round bound
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(backend) = std::env::var("TRIBUNAL_STORE") {
            self.store.backend = backend.parse()?;
        }

        if let Ok(tracker) = std::env::var("TRIBUNAL_TRACKER") {
            self.store.cli.program = tracker;
        }

        if let Ok(repo) = std::env::var("TRIBUNAL_GITHUB_REPO") {
            self.store.github.repo = Some(repo);
        }

        if let Ok(database) = std::env::var("TRIBUNAL_DATABASE") {
            self.state.database = Some(PathBuf::from(database));
        }

        if let Ok(max_rounds) = std::env::var("TRIBUNAL_MAX_ROUNDS") {
            self.review.max_rounds = max_rounds.parse().map_err(|e| {
                Error::Config(format!("Invalid TRIBUNAL_MAX_ROUNDS '{}': {}", max_rounds, e))
            })?;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(backend) = overrides.backend {
            self.store.backend = backend;
        }

        if let Some(tracker) = overrides.tracker {
            self.store.cli.program = tracker;
        }

        if let Some(repo) = overrides.repo {
            self.store.github.repo = Some(repo);
        }

        if let Some(database) = overrides.database {
            self.state.database = Some(database);
        }

        if let Some(max_rounds) = overrides.max_rounds {
            self.review.max_rounds = max_rounds;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(overrides: CliOverrides) -> Result<Self> {
        let config = Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the coordinator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.review.max_rounds == 0 {
            return Err(Error::Config(
                "review.max_rounds must be at least 1".to_string(),
            ));
        }
        if self.store.timeout.is_zero() {
            return Err(Error::Config("store.timeout must be positive".to_string()));
        }
        Ok(())
    }
}

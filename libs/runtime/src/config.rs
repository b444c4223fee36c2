use anyhow::{bail, Context, Result};
use repokit_db::DbConnConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment prefix for overrides, e.g. `APP__PAGING__MAX_PAGE_SIZE=50`.
pub const ENV_PREFIX: &str = "APP__";

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base directory for relative log file paths.
    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,
    /// Database connection (optional; the demo falls back to in-memory SQLite).
    pub database: Option<DbConnConfig>,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub paging: PagingConfig,
}

/// Logging configuration: crate name → settings.
/// Key "default" covers everything that matches no explicit crate.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/app.log"; empty disables file output
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

/// Page sizes the host accepts from callers.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct PagingConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PagingConfig {
    /// Requested size, defaulted when absent and capped at `max_page_size`.
    pub fn effective_page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }

    fn validate(&self) -> Result<()> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            bail!("paging sizes must be greater than zero");
        }
        if self.default_page_size > self.max_page_size {
            bail!(
                "paging.default_page_size ({}) exceeds paging.max_page_size ({})",
                self.default_page_size,
                self.max_page_size
            );
        }
        Ok(())
    }
}

fn default_home_dir() -> PathBuf {
    PathBuf::from(".repokit")
}

/// Default logging: info to the console, debug to a rotating file.
pub fn default_logging_config() -> LoggingConfig {
    HashMap::from([(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/repokit.log".to_string(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    )])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            database: Some(DbConnConfig::from_dsn("sqlite::memory:")),
            logging: Some(default_logging_config()),
            paging: PagingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layered loading: defaults → YAML file → `APP__` environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::load_layered_with_prefix(config_path, ENV_PREFIX)
    }

    pub(crate) fn load_layered_with_prefix<P: AsRef<Path>>(
        config_path: P,
        env_prefix: &str,
    ) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let path = config_path.as_ref();
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }

        // Optional sections stay None unless YAML or env provide them.
        let base = AppConfig {
            database: None,
            logging: None,
            ..AppConfig::default()
        };

        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        config.paging.validate()?;
        Ok(config)
    }

    /// Load from file if given, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// `-v` raises the default console level to debug, `-vv` to trace.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }

    /// Database settings, or in-memory SQLite when none are configured.
    pub fn database_or_default(&self) -> DbConnConfig {
        self.database
            .clone()
            .unwrap_or_else(|| DbConnConfig::from_dsn("sqlite::memory:"))
    }
}

/// Command line arguments that affect configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

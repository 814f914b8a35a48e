//! Settings and on-disk locations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::github::DEFAULT_REPO;
use crate::model::types::BatchAction;

/// Overrides the platform directories; config and data go under it.
pub const HOME_ENV: &str = "WINGET_BATCH_HOME";

const CONFIG_FILE: &str = "config.toml";
const CACHE_FILE: &str = "package_cache.json";
const RATE_LIMIT_FILE: &str = "github_rate_limit.json";
const TOKEN_FILE: &str = "github_token";

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Explicit package manager executable.
    #[serde(default)]
    pub winget_path: Option<PathBuf>,
    #[serde(default)]
    pub install_args: Option<String>,
    #[serde(default)]
    pub upgrade_args: Option<String>,
    #[serde(default)]
    pub uninstall_args: Option<String>,
    #[serde(default = "default_selection_timeout_secs")]
    pub selection_timeout_secs: u64,
    #[serde(default)]
    pub github: GithubConfig,
}

fn default_selection_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            winget_path: None,
            install_args: None,
            upgrade_args: None,
            uninstall_args: None,
            selection_timeout_secs: default_selection_timeout_secs(),
            github: GithubConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    #[serde(default = "default_repo")]
    pub repo: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_repo() -> String {
    DEFAULT_REPO.to_string()
}
fn default_per_page() -> u32 {
    100
}
fn default_max_pages() -> u32 {
    10
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            per_page: default_per_page(),
            max_pages: default_max_pages(),
        }
    }
}

impl Config {
    /// Load `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_secs(self.selection_timeout_secs)
    }

    /// Extra arguments for `action`, split shell-style.
    pub fn extra_args(&self, action: BatchAction) -> Result<Vec<String>> {
        let raw = match action {
            BatchAction::Install => &self.install_args,
            BatchAction::Upgrade => &self.upgrade_args,
            BatchAction::Uninstall => &self.uninstall_args,
        };
        match raw {
            Some(raw) => shell_words::split(raw)
                .with_context(|| format!("Invalid {}_args in config: {raw}", action.verb())),
            None => Ok(Vec::new()),
        }
    }
}

/// Resolved config and data directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// `WINGET_BATCH_HOME` if set, else the platform's project directories.
    pub fn resolve() -> Result<Self> {
        if let Ok(home) = dotenvy::var(HOME_ENV)
            && !home.trim().is_empty()
        {
            return Ok(Self::under(PathBuf::from(home)));
        }
        let dirs = directories::ProjectDirs::from("com", "winget-batch", "winget-batch")
            .context("Could not determine a home directory for configuration")?;
        Ok(Self {
            config_dir: dirs.config_dir().to_path_buf(),
            data_dir: dirs.data_dir().to_path_buf(),
        })
    }

    pub fn under(home: PathBuf) -> Self {
        Self {
            config_dir: home.join("config"),
            data_dir: home.join("data"),
        }
    }

    /// Create the data directory if needed.
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory: {}", self.data_dir.display())
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn cache_file(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    pub fn rate_limit_file(&self) -> PathBuf {
        self.data_dir.join(RATE_LIMIT_FILE)
    }

    pub fn token_file(&self) -> PathBuf {
        self.data_dir.join(TOKEN_FILE)
    }
}

//! Configuration for autocoupons.
//!
//! Settings come from three layers, highest priority first: command line
//! [`Overrides`], the TOML file at [`config_path`], then built-in defaults.
//! String values in the file may reference environment variables as `${VAR}`.

mod atomic_write;
mod persistence;

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub use crate::persistence::{COURSES_KEY, PersistedState, STATE_FILE, StateError};

pub const DEFAULT_PROFILE_DIRECTORY: &str = "Profile 1";
pub const DEFAULT_DATA_DIR: &str = "data";

const fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no browser user data directory configured and none is known for this platform")]
    NoUserDataDir,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub browser: Option<BrowserConfig>,
    pub enroller: Option<EnrollerConfig>,
    pub sources: Option<SourcesConfig>,
    pub state: Option<StateConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BrowserConfig {
    /// Profile directory name inside `user_data_dir`.
    pub profile_directory: Option<String>,
    pub user_data_dir: Option<String>,
    pub chrome_executable: Option<String>,
    #[serde(default)]
    pub headless: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrollerConfig {
    /// Extra attempts for a course whose page kept failing.
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourcesConfig {
    pub tutorialbar: Option<TutorialbarConfig>,
    pub link_pages: Option<LinkPagesConfig>,
}

#[derive(Debug, Deserialize)]
pub struct TutorialbarConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkPagesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub pages: Vec<String>,
    pub max_concurrency_per_host: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StateConfig {
    pub data_dir: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub profile_directory: Option<String>,
    pub user_data_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub headless: bool,
}

/// Fully merged settings for one run.
///
/// `None` in `max_attempts`, `tutorialbar_base_url` and
/// `max_concurrency_per_host` means the owning crate's default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub profile_directory: String,
    pub user_data_dir: PathBuf,
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
    pub max_attempts: Option<u32>,
    pub tutorialbar: bool,
    pub tutorialbar_base_url: Option<String>,
    pub link_pages: Vec<String>,
    pub max_concurrency_per_host: Option<usize>,
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Load the config at `path`, or at [`config_path`] when `None`.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// file that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge this file with command line overrides and defaults.
    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings, ConfigError> {
        let browser = self.browser.as_ref();
        let sources = self.sources.as_ref();
        let tutorialbar = sources.and_then(|s| s.tutorialbar.as_ref());
        let link_pages = sources
            .and_then(|s| s.link_pages.as_ref())
            .filter(|l| l.enabled);

        let user_data_dir = overrides
            .user_data_dir
            .clone()
            .or_else(|| expand_path(browser.and_then(|b| b.user_data_dir.as_deref())))
            .or_else(default_user_data_dir)
            .ok_or(ConfigError::NoUserDataDir)?;

        Ok(Settings {
            profile_directory: overrides
                .profile_directory
                .clone()
                .or_else(|| expand(browser.and_then(|b| b.profile_directory.as_deref())))
                .unwrap_or_else(|| DEFAULT_PROFILE_DIRECTORY.to_string()),
            user_data_dir,
            chrome_executable: expand_path(browser.and_then(|b| b.chrome_executable.as_deref())),
            headless: overrides.headless || browser.is_some_and(|b| b.headless),
            max_attempts: self.enroller.as_ref().and_then(|e| e.max_attempts),
            tutorialbar: tutorialbar.is_none_or(|t| t.enabled),
            tutorialbar_base_url: expand(tutorialbar.and_then(|t| t.base_url.as_deref())),
            link_pages: link_pages
                .map(|l| l.pages.iter().map(|page| expand_env_vars(page)).collect())
                .unwrap_or_default(),
            max_concurrency_per_host: link_pages.and_then(|l| l.max_concurrency_per_host),
            data_dir: overrides
                .data_dir
                .clone()
                .or_else(|| expand_path(self.state.as_ref().and_then(|s| s.data_dir.as_deref())))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        })
    }
}

fn expand(value: Option<&str>) -> Option<String> {
    value.map(expand_env_vars).filter(|value| !value.is_empty())
}

fn expand_path(value: Option<&str>) -> Option<PathBuf> {
    expand(value).map(PathBuf::from)
}

/// Replace each `${VAR}` with the variable's value, or nothing when unset.
/// An unclosed `${` is kept as written.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("autocoupons").join("config.toml"))
}

/// Where Chrome keeps its profiles on this platform.
#[must_use]
pub fn default_user_data_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir().map(|dir| dir.join("Google").join("Chrome").join("User Data"))
    } else if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| {
            home.join("Library")
                .join("Application Support")
                .join("Google")
                .join("Chrome")
        })
    } else {
        dirs::config_dir().map(|dir| dir.join("google-chrome"))
    }
}

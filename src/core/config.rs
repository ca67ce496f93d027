//! Configuration management for OctoEB.
//!
//! Locates and parses the ini-style `.octoebrc` file and exposes the
//! typed sections the rest of the tool works with.

use std::path::{Path, PathBuf};

use ini::Ini;

/// Name of the configuration file searched for in each candidate location.
pub const CONFIG_FILE_NAME: &str = ".octoebrc";

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Error types for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "no .octoebrc found in the current directory, the config directory, or the home directory"
    )]
    NotFound,

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("missing {key} in [{section}] config")]
    MissingKey { section: &'static str, key: &'static str },
}

/// Application configuration, read once per invocation and immutable after
/// load.
#[derive(Debug, Clone)]
pub struct Config {
    /// `[repo]` section - the source host repository pair (mainline + fork).
    pub repo: RepoConfig,

    /// `[bugtracker]` section - the issue tracker.
    pub tracker: TrackerConfig,

    /// `[slack]` section - chat notifications, absent when not configured.
    pub chat: Option<ChatConfig>,

    /// `[release]` section - release branch/channel naming template.
    pub release: ReleaseConfig,
}

/// Source host settings.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Owner of the mainline repository.
    pub owner: String,
    /// Owner of the contributor's fork.
    pub fork: String,
    /// Repository name (same on mainline and fork).
    pub repo: String,
    /// API token.
    pub token: String,
    /// Login user for the API token.
    pub user: String,
}

/// Issue tracker settings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the tracker instance, without a trailing slash.
    pub base_url: String,
    /// Login user (email).
    pub user: String,
    /// API token.
    pub token: String,
    /// Saved filter listing the user's open tickets.
    pub ticket_filter_id: String,
    /// Project key for release tickets.
    pub release_ticket_project: String,
    /// Issue type name for release tickets.
    pub release_ticket_type: String,
}

/// Chat notification settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// API token.
    pub token: String,
    /// User group invited to release channels, when set.
    pub group_id: Option<String>,
    /// Channel topic template; `{}` is replaced by the release ticket key.
    pub topic_str: String,
}

/// Release naming settings.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// First component of release branch names.
    pub prefix: String,
    /// Second component of release branch names.
    pub main: String,
}

impl ReleaseConfig {
    fn defaults() -> Self {
        Self { prefix: "release".to_string(), main: "main".to_string() }
    }
}

/// Candidate config file locations, highest precedence first.
///
/// Pure function of the environment so the search order is testable:
/// current directory, then the platform config directory, then home.
pub fn candidate_paths(
    cwd: &Path,
    config_dir: Option<&Path>,
    home_dir: Option<&Path>,
) -> Vec<PathBuf> {
    let mut paths = vec![cwd.join(CONFIG_FILE_NAME)];

    if let Some(dir) = config_dir {
        paths.push(dir.join("octoeb").join(CONFIG_FILE_NAME));
    }

    if let Some(dir) = home_dir {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }

    paths
}

/// First existing file among the candidates.
pub fn first_existing(paths: &[PathBuf]) -> Option<PathBuf> {
    paths.iter().find(|p| p.is_file()).cloned()
}

/// Locate the config file using the standard search order.
pub fn find_config_file() -> ConfigResult<PathBuf> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::NotFound)?;
    let config_dir = dirs::config_dir();
    let home_dir = dirs::home_dir();

    let candidates = candidate_paths(&cwd, config_dir.as_deref(), home_dir.as_deref());

    tracing::debug!(?candidates, "searching for config file");

    first_existing(&candidates).ok_or(ConfigError::NotFound)
}

/// Load the configuration from the standard search path.
pub fn load() -> ConfigResult<Config> {
    let path = find_config_file()?;
    load_from(&path)
}

/// Load the configuration from a specific file.
pub fn load_from(path: &Path) -> ConfigResult<Config> {
    tracing::debug!(path = %path.display(), "loading config");

    let ini = Ini::load_from_file(path)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

    Config::from_ini(&ini)
}

impl Config {
    /// Build the typed configuration from parsed ini sections.
    ///
    /// Unknown sections and keys are ignored; missing required keys fail
    /// naming the section and key.
    pub fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        let repo = RepoConfig {
            owner: required(ini, "repo", "OWNER")?,
            fork: required(ini, "repo", "FORK")?,
            repo: required(ini, "repo", "REPO")?,
            token: required(ini, "repo", "TOKEN")?,
            user: required(ini, "repo", "USER")?,
        };

        let tracker = TrackerConfig {
            base_url: required(ini, "bugtracker", "BASE_URL")?.trim_end_matches('/').to_string(),
            user: required(ini, "bugtracker", "USER")?,
            token: required(ini, "bugtracker", "TOKEN")?,
            ticket_filter_id: required(ini, "bugtracker", "TICKET_FILTER_ID")?,
            release_ticket_project: optional(ini, "bugtracker", "RELEASE_TICKET_PROJECT")
                .unwrap_or_else(|| "MAN".to_string()),
            release_ticket_type: optional(ini, "bugtracker", "RELEASE_TICKET_TYPE")
                .unwrap_or_else(|| "RELEASE".to_string()),
        };

        // The chat section is optional as a whole, but a present section
        // must carry its token.
        let chat = match ini.section(Some("slack")) {
            None => None,
            Some(_) => Some(ChatConfig {
                token: required(ini, "slack", "TOKEN")?,
                group_id: optional(ini, "slack", "GROUP_ID"),
                topic_str: optional(ini, "slack", "TOPIC_STR")
                    .unwrap_or_else(|| "Release Ticket: {}".to_string()),
            }),
        };

        let release = match ini.section(Some("release")) {
            None => ReleaseConfig::defaults(),
            Some(_) => {
                let defaults = ReleaseConfig::defaults();
                ReleaseConfig {
                    prefix: optional(ini, "release", "PREFIX").unwrap_or(defaults.prefix),
                    main: optional(ini, "release", "MAIN").unwrap_or(defaults.main),
                }
            }
        };

        Ok(Self { repo, tracker, chat, release })
    }
}

fn required(ini: &Ini, section: &'static str, key: &'static str) -> ConfigResult<String> {
    optional(ini, section, key).ok_or(ConfigError::MissingKey { section, key })
}

fn optional(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.section(Some(section)).and_then(|s| s.get(key)).map(str::to_string)
}

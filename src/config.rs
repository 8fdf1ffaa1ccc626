use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "LXBOT_MASTODON_BASE_URL";
pub const ENV_ACCESS_TOKEN: &str = "LXBOT_MASTODON_ACCESS_TOKEN";
pub const ENV_ALLOW_LIST: &str = "LXBOT_MASTODON_ALLOW_LIST";
pub const ENV_POST_TIMEOUT: &str = "LXBOT_MASTODON_POST_TIMEOUT_SECS";

/// Account handles allowed to talk to the bot. Empty means everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    accts: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(accts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            accts: accts
                .into_iter()
                .map(|a| a.as_ref().trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list, trimming whitespace around each handle
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.accts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.accts.iter().map(String::as_str)
    }

    /// True when the list is unrestricted or contains `acct`
    pub fn permits(&self, acct: &str) -> bool {
        self.is_empty() || self.accts.iter().any(|a| a == acct)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub access_token: String,
    pub allow_list: AllowList,
    pub post_timeout: Duration,
}

/// `[mastodon]` table of the optional config file
#[derive(Debug, Deserialize, Default)]
struct MastodonFileConfig {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    allow_list: Option<Vec<String>>,
    #[serde(default)]
    post_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    mastodon: MastodonFileConfig,
}

fn default_post_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::resolve(MastodonFileConfig::default(), |key| std::env::var(key).ok())
    }

    /// Load a TOML file, then let environment variables override it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Self::resolve(file.mastodon, |key| std::env::var(key).ok())
    }

    fn resolve<F>(file: MastodonFileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let base_url = non_empty(env(ENV_BASE_URL))
            .or(non_empty(file.base_url))
            .with_context(|| format!("invalid url: set the API URL in '{}'", ENV_BASE_URL))?;
        reqwest::Url::parse(&base_url)
            .with_context(|| format!("invalid url: '{}' is not a valid URL", base_url))?;

        let access_token = non_empty(env(ENV_ACCESS_TOKEN))
            .or(non_empty(file.access_token))
            .with_context(|| {
                format!("invalid token: set the access token in '{}'", ENV_ACCESS_TOKEN)
            })?;

        let allow_list = match env(ENV_ALLOW_LIST) {
            Some(raw) if !raw.is_empty() => AllowList::parse(&raw),
            _ => AllowList::new(file.allow_list.unwrap_or_default()),
        };

        let post_timeout_secs: u64 = match env(ENV_POST_TIMEOUT) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid '{}': {}", ENV_POST_TIMEOUT, raw))?,
            None => file
                .post_timeout_secs
                .unwrap_or_else(default_post_timeout_secs),
        };

        Ok(Config {
            base_url,
            access_token,
            allow_list,
            post_timeout: Duration::from_secs(post_timeout_secs),
        })
    }

    /// Host part of the base URL, used to build the bot's `@user@host` handle
    pub fn host(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("url parse error: {}", self.base_url))?;
        url.host_str()
            .map(str::to_string)
            .with_context(|| format!("url has no host: {}", self.base_url))
    }
}

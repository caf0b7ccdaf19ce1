use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_DIR_NAME: &str = "kbindex";
pub const PROJECT_CONFIG_DIR: &str = ".kbindex";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_OPENAI_API_VERSION: &str = "2023-07-01-preview";
pub const DEFAULT_SEARCH_API_VERSION: &str = "2023-11-01";
pub const DEFAULT_EMBEDDING_DIMENSIONS: u32 = 1536;
pub const DEFAULT_DEVDOCS_URL: &str = "https://developer.clo3d.com";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub workers: WorkersConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub search: SearchServiceConfig,

    #[serde(default)]
    pub zendesk: ZendeskConfig,

    #[serde(default)]
    pub youtube: YoutubeConfig,

    #[serde(default)]
    pub devdocs: DevDocsConfig,

    #[serde(default)]
    pub retry: RetrySettings,
}

/// A loaded configuration together with the file it came from.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Nearest `.kbindex/config.toml` walking up from the working directory.
    pub fn project_path() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        find_project_config(&cwd)
    }

    pub fn load() -> Result<ResolvedConfig, ConfigError> {
        let candidates = [Self::project_path(), Self::global_path()];
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                let config = Self::load_from(&path)?;
                return Ok(ResolvedConfig {
                    config,
                    path: Some(path),
                });
            }
        }
        Ok(ResolvedConfig::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let workers = [
            ("workers.fetch", self.workers.fetch),
            ("workers.upload", self.workers.upload),
            ("workers.posts", self.workers.posts),
            ("workers.summarize", self.workers.summarize),
        ];
        for (name, value) in workers {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        if self.search.upload_batch_size == 0 || self.search.upload_batch_size > 1000 {
            return Err(ConfigError::ValidationError(
                "search.upload_batch_size must be between 1 and 1000".to_string(),
            ));
        }
        if self.search.page_size == 0 || self.search.page_size > 1000 {
            return Err(ConfigError::ValidationError(
                "search.page_size must be between 1 and 1000".to_string(),
            ));
        }
        Ok(())
    }
}

fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.exists())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the staging tree (`{brand}/articles/...`, `indexes/...`).
    #[serde(default = "default_dot")]
    pub data_dir: PathBuf,

    /// Directory holding `.env.prod` / `.env.dev`.
    #[serde(default = "default_dot")]
    pub env_dir: PathBuf,
}

fn default_dot() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_dot(),
            env_dir: default_dot(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_five")]
    pub fetch: usize,

    #[serde(default = "default_five")]
    pub upload: usize,

    #[serde(default = "default_posts_workers")]
    pub posts: usize,

    #[serde(default = "default_summarize_workers")]
    pub summarize: usize,
}

fn default_five() -> usize {
    5
}

fn default_posts_workers() -> usize {
    7
}

fn default_summarize_workers() -> usize {
    3
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            fetch: default_five(),
            upload: default_five(),
            posts: default_posts_workers(),
            summarize: default_summarize_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_api_version")]
    pub api_version: String,

    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default)]
    pub temperature: f32,
}

fn default_openai_api_version() -> String {
    DEFAULT_OPENAI_API_VERSION.to_string()
}

fn default_openai_timeout() -> u64 {
    120
}

fn default_max_input_tokens() -> usize {
    8000
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_version: default_openai_api_version(),
            timeout_secs: default_openai_timeout(),
            max_input_tokens: default_max_input_tokens(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchServiceConfig {
    #[serde(default = "default_search_api_version")]
    pub api_version: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_thousand")]
    pub upload_batch_size: usize,

    #[serde(default = "default_thousand")]
    pub page_size: usize,

    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
}

fn default_search_api_version() -> String {
    DEFAULT_SEARCH_API_VERSION.to_string()
}

fn default_search_timeout() -> u64 {
    60
}

fn default_thousand() -> usize {
    1000
}

fn default_embedding_dimensions() -> u32 {
    DEFAULT_EMBEDDING_DIMENSIONS
}

impl Default for SearchServiceConfig {
    fn default() -> Self {
        Self {
            api_version: default_search_api_version(),
            timeout_secs: default_search_timeout(),
            upload_batch_size: default_thousand(),
            page_size: default_thousand(),
            embedding_dimensions: default_embedding_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZendeskConfig {
    #[serde(default = "default_articles_per_page")]
    pub articles_per_page: u32,

    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,

    #[serde(default = "default_three")]
    pub posts_max_age_years: i32,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_articles_per_page() -> u32 {
    30
}

fn default_posts_per_page() -> u32 {
    60
}

fn default_three() -> i32 {
    3
}

impl Default for ZendeskConfig {
    fn default() -> Self {
        Self {
            articles_per_page: default_articles_per_page(),
            posts_per_page: default_posts_per_page(),
            posts_max_age_years: default_three(),
            timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    #[serde(default = "default_three")]
    pub video_age_years: i32,

    #[serde(default = "default_max_results")]
    pub max_results: u32,

    #[serde(default = "default_min_transcript_chars")]
    pub min_transcript_chars: usize,

    #[serde(default = "default_transcript_language")]
    pub transcript_language: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_max_results() -> u32 {
    30
}

fn default_min_transcript_chars() -> usize {
    450
}

fn default_transcript_language() -> String {
    "en".to_string()
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            video_age_years: default_three(),
            max_results: default_max_results(),
            min_transcript_chars: default_min_transcript_chars(),
            transcript_language: default_transcript_language(),
            timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevDocsConfig {
    #[serde(default = "default_devdocs_url")]
    pub base_url: String,

    #[serde(default = "default_devdocs_timeout")]
    pub timeout_secs: u64,
}

fn default_devdocs_timeout() -> u64 {
    30
}

fn default_devdocs_url() -> String {
    DEFAULT_DEVDOCS_URL.to_string()
}

impl Default for DevDocsConfig {
    fn default() -> Self {
        Self {
            base_url: default_devdocs_url(),
            timeout_secs: default_devdocs_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

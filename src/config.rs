use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Process configuration for the search service. Built once at startup and
/// passed into each component at construction; components never read the
/// environment themselves, so tests can run with distinct configurations.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// OpenRouter API key. Required — startup fails without it.
    pub api_key: String,
    /// Embedding model identifier sent with every provider call.
    pub model: String,
    /// Attribution URL forwarded as the `HTTP-Referer` header.
    pub site_url: String,
    /// Attribution name forwarded as the `X-Title` header.
    pub site_name: String,
    /// Base URL of the OpenRouter-compatible embeddings API.
    pub base_url: String,
    /// Default chunk window, in characters.
    pub chunk_size: usize,
    /// Default overlap between adjacent chunks, in characters.
    pub chunk_overlap: usize,
    /// Default minimum cosine similarity for a chunk to qualify.
    pub similarity_threshold: f64,
    /// Port the HTTP server binds on 127.0.0.1.
    pub port: u16,
    /// SQLite database location.
    pub db_path: PathBuf,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "openai/text-embedding-3-small".into(),
            site_url: "http://localhost:4000".into(),
            site_name: "SemanticSearch".into(),
            base_url: "https://openrouter.ai/api/v1".into(),
            chunk_size: 500,
            chunk_overlap: 50,
            similarity_threshold: 0.7,
            port: 4000,
            db_path: default_db_path(),
        }
    }
}

/// Returns `~/.semantic-search/data.db`, falling back to a relative path
/// when the home directory cannot be determined.
fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".semantic-search")
        .join("data.db")
}

impl SearchConfig {
    /// Load configuration from the environment. Fails when the API key is
    /// unset; every indexing and search call needs it.
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        config.api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();
        if let Ok(v) = std::env::var("OPENROUTER_MODEL") {
            config.model = v;
        }
        if let Ok(v) = std::env::var("SITE_URL") {
            config.site_url = v;
        }
        if let Ok(v) = std::env::var("SITE_NAME") {
            config.site_name = v;
        }
        if let Ok(v) = std::env::var("OPENROUTER_BASE_URL") {
            config.base_url = v;
        }
        if let Some(v) = parse_env("SEARCH_CHUNK_SIZE")? {
            config.chunk_size = v;
        }
        if let Some(v) = parse_env("SEARCH_CHUNK_OVERLAP")? {
            config.chunk_overlap = v;
        }
        if let Some(v) = parse_env("SEARCH_SIMILARITY_THRESHOLD")? {
            config.similarity_threshold = v;
        }
        if let Some(v) = parse_env("SEARCH_PORT")? {
            config.port = v;
        }
        if let Ok(v) = std::env::var("SEARCH_DB_PATH") {
            config.db_path = PathBuf::from(v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Startup-time checks shared by `from_env` and embedded callers.
    pub fn validate(&self) -> AppResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Validation(
                "OPENROUTER_API_KEY is required".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Validation(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> AppResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{key} has invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

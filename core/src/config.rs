use crate::errors::{RagError, RagResult};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name under the user's config dir
pub const APP_NAME: &str = "rag-suite";

/// Prefix for environment overrides, e.g. `RAG_PIPELINE__TOP_K=3`
pub const ENV_PREFIX: &str = "RAG";

pub const ENV_GEMINI_API_KEY: &str = "GOOGLE_GEMINI_API_KEY";
pub const ENV_PINECONE_API_KEY: &str = "PINECONE_API_KEY";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a rate my professor agent to help students find classes, \
that takes in user questions and answers them.
For every user question, the top professors that match the user question are returned.
Use them to answer the question if needed.";

/// Unified configuration for the RAG suite
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    pub gemini: GeminiConfig,
    pub index: IndexConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub retry: RetryConfig,
}

/// Configuration for the Gemini embedding and generation endpoints
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_name: String,
    pub embedding_model: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<i32>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model_name: "gemini-1.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            temperature: Some(0.7),
            max_output_tokens: None,
            request_timeout_secs: None,
            connect_timeout_secs: Some(10),
        }
    }
}

/// Which vector index backend to query
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexProvider {
    #[default]
    Pinecone,
    Local,
}

/// Configuration for the vector index
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub provider: IndexProvider,
    pub api_key: Option<String>,
    /// Pinecone index host, e.g. `https://rag-abc123.svc.us-east-1.pinecone.io`
    pub host: Option<String>,
    pub namespace: String,
    pub api_version: String,
    /// JSON snapshot for the local provider
    pub snapshot_path: Option<PathBuf>,
    /// Relevance floor for the local provider
    pub min_score: Option<f32>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: IndexProvider::Pinecone,
            api_key: None,
            host: None,
            namespace: "ns1".to_string(),
            api_version: "2024-07".to_string(),
            snapshot_path: None,
            min_score: None,
            request_timeout_secs: None,
            connect_timeout_secs: Some(10),
        }
    }
}

/// Retrieval and prompt settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub top_k: usize,
    pub include_metadata: bool,
    pub system_prompt: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            include_metadata: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// Single retry around the embedding and search calls
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: 250,
        }
    }
}

impl RagConfig {
    /// Load configuration: defaults, then the TOML file, then `RAG_*` variables.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> RagResult<Self> {
        // .env is optional
        dotenvy::dotenv().ok();

        let mut config = Self::load_with_env(path, None)?;
        config.fill_credentials(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a file and an explicit environment map (`None` reads the
    /// process environment). Credentials are not filled in.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> RagResult<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
            }
            None => {
                if let Ok(default_path) = get_default_config_file(APP_NAME) {
                    debug!("Looking for configuration at {}", default_path.display());
                    builder = builder.add_source(
                        File::from(default_path.as_path())
                            .format(FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let settings = builder
            .build()
            .map_err(|e| RagError::ConfigError(format!("Failed to load configuration: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| RagError::ConfigError(format!("Failed to parse configuration: {}", e)))
    }

    /// Fill missing credentials from the provider's well-known variables
    pub fn fill_credentials<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.gemini.api_key.is_none() {
            self.gemini.api_key = lookup(ENV_GEMINI_API_KEY).or_else(|| lookup("GEMINI_API_KEY"));
        }
        if self.index.api_key.is_none() {
            self.index.api_key = lookup(ENV_PINECONE_API_KEY);
        }
    }

    /// Check the values no service client would catch itself
    pub fn validate(&self) -> RagResult<()> {
        if self.pipeline.top_k == 0 {
            return Err(RagError::ConfigError(
                "pipeline.top_k must be greater than zero".to_string(),
            ));
        }
        if self.index.provider == IndexProvider::Local && self.index.snapshot_path.is_none() {
            return Err(RagError::ConfigError(
                "index.snapshot_path is required for the local index provider".to_string(),
            ));
        }
        Ok(())
    }

    /// Render this configuration as TOML
    pub fn to_toml(&self) -> RagResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> RagResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RagError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| RagError::ConfigError(format!("Failed to write config file: {}", e)))
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> RagResult<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        RagError::ConfigError("Could not determine config directory".to_string())
    })?;

    Ok(config_dir.join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> RagResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

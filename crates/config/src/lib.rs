//! Environment-driven configuration for the scholar query orchestrator.
//!
//! Every externally-configurable value in this system is an environment
//! variable, not a config file — the graph database URI/credentials, the
//! LLM API key, the session-cookie signing secret, model overrides, the
//! vector index name, and the per-call/outer-request timeouts. `from_env`
//! is the single construction point, called once from `scholarqa-server`'s
//! `main` before anything else.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Reads `.env` if present (development convenience) without overriding
/// variables already set in the process environment.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn optional_var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub vector_index_name: String,
    pub fulltext_index_name: String,
}

impl GraphConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            uri: required_var("NEO4J_URI")?,
            user: required_var("NEO4J_USER")?,
            password: required_var("NEO4J_PASSWORD")?,
            vector_index_name: optional_var("VECTOR_INDEX_NAME", "publication_embeddings"),
            fulltext_index_name: optional_var("FULLTEXT_INDEX_NAME", "researcher_name_index"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
}

impl LlmConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_var("OPENAI_API_KEY")?,
            chat_model: optional_var("OPENAI_MODEL_CHAT", "gpt-4o-mini"),
            embedding_model: optional_var("OPENAI_MODEL_EMBED", "text-embedding-3-large"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub session_secret: String,
    pub debug_log_path: String,
    pub static_dirs: Vec<(String, String)>,
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let session_secret = required_var("SESSION_SECRET_KEY")?;
        anyhow::ensure!(
            session_secret.len() >= 32,
            "SESSION_SECRET_KEY must be at least 32 bytes for cookie signing"
        );
        Ok(Self {
            bind_addr: optional_var("BIND_ADDR", "0.0.0.0:8000"),
            session_secret,
            debug_log_path: optional_var("DEBUG_LOG_PATH", "debug_log.txt"),
            static_dirs: vec![
                ("/logos".to_string(), optional_var("LOGOS_DIR", "logos")),
                ("/prompts".to_string(), optional_var("PROMPTS_DIR", "prompts")),
                ("/temp".to_string(), optional_var("TEMP_DIR", "temp")),
            ],
        })
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub per_call: Duration,
    pub outer_request: Duration,
}

impl TimeoutConfig {
    fn from_env() -> Result<Self> {
        let per_call_secs: u64 = env::var("EXTERNAL_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let outer_secs: u64 = env::var("REQUEST_DEADLINE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        Ok(Self {
            per_call: Duration::from_secs(per_call_secs),
            outer_request: Duration::from_secs(outer_secs),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub graph: GraphConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub timeouts: TimeoutConfig,
}

impl AppConfig {
    /// Loads every config section from the process environment. Fails
    /// loudly (rather than falling back to a placeholder) when a required
    /// variable is absent or malformed — the equivalent failure the
    /// original TOML-backed config only applied to a missing *file*.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            graph: GraphConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            server: ServerConfig::from_env()?,
            timeouts: TimeoutConfig::from_env()?,
        })
    }
}

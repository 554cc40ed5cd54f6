//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::base::prompts;

use super::types::Res;

/// Default OpenAI chat model to use.
fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

/// Default OpenAI embedding model to use.
fn default_openai_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

/// Default sampling temperature for generation.
fn default_openai_temperature() -> f32 {
    0.0
}

/// Default max output tokens for generation.
fn default_openai_max_tokens() -> u32 {
    2000
}

/// Default system prompt for grounded answers.
fn default_system_prompt() -> String {
    prompts::GROUNDED_SYSTEM_PROMPT.to_string()
}

/// Default standalone-question rewrite prompt.
fn default_condense_prompt() -> String {
    prompts::CONDENSE_QUESTION_PROMPT.to_string()
}

/// Default acknowledgment message for new conversations.
fn default_ack_message() -> String {
    prompts::ACK_MESSAGE.to_string()
}

/// Default vector index namespace.
fn default_index_namespace() -> String {
    "handbook-namespace".to_string()
}

/// Default number of passages retrieved per query.
fn default_retrieval_top_k() -> usize {
    5
}

/// Default metadata key holding the passage text in index matches.
fn default_passage_text_key() -> String {
    "text".to_string()
}

/// Default cap on history turns included in an assembled prompt.
fn default_max_history_turns() -> usize {
    30
}

/// Default timeout for a single external backend call.
fn default_request_timeout_secs() -> u64 {
    120
}

/// Configuration for the handbook-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Shared inner configuration.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The actual configuration values, shared behind [`Config`].
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// OpenAI API key (`OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// OpenAI chat model to use (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// OpenAI embedding model to use (`OPENAI_EMBEDDING_MODEL`).
    #[serde(default = "default_openai_embedding_model")]
    pub openai_embedding_model: String,
    /// Sampling temperature for generation (`OPENAI_TEMPERATURE`).
    /// Value between 0 and 2.
    #[serde(default = "default_openai_temperature")]
    pub openai_temperature: f32,
    /// Max output tokens for generation (`OPENAI_MAX_TOKENS`).
    #[serde(default = "default_openai_max_tokens")]
    pub openai_max_tokens: u32,
    /// Optional custom system prompt to override the default (`SYSTEM_PROMPT`).
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Optional custom standalone-question prompt (`CONDENSE_PROMPT`).
    #[serde(default = "default_condense_prompt")]
    pub condense_prompt: String,
    /// Acknowledgment message for new conversations (`ACK_MESSAGE`).
    #[serde(default = "default_ack_message")]
    pub ack_message: String,
    /// Rewrite follow-ups into standalone questions before retrieval
    /// (`CONDENSE_HISTORY`).
    #[serde(default)]
    pub condense_history: bool,
    /// Post a generic failure notice to the channel when the pipeline fails
    /// (`POST_FAILURE_NOTICE`). Off by default: the boundary acknowledges
    /// every event and failures are only logged.
    #[serde(default)]
    pub post_failure_notice: bool,
    /// Timeout for a single backend call, in seconds (`REQUEST_TIMEOUT_SECS`).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Slack app token (`SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Slack signing secret (`SLACK_SIGNING_SECRET`).
    pub slack_signing_secret: String,
    /// History store endpoint URL (`DB_ENDPOINT`), e.g. `ws://localhost:8000`.
    pub db_endpoint: String,
    /// History store username (`DB_USERNAME`).
    pub db_username: String,
    /// History store password (`DB_PASSWORD`).
    pub db_password: String,
    /// Vector index API key (`INDEX_API_KEY`).
    pub index_api_key: String,
    /// Vector index host (`INDEX_HOST`), e.g. `https://my-index.svc.pinecone.io`.
    pub index_host: String,
    /// Vector index namespace to query (`INDEX_NAMESPACE`).
    #[serde(default = "default_index_namespace")]
    pub index_namespace: String,
    /// Number of passages retrieved per query (`RETRIEVAL_TOP_K`).
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    /// Metadata key holding the passage text in index matches
    /// (`PASSAGE_TEXT_KEY`).
    #[serde(default = "default_passage_text_key")]
    pub passage_text_key: String,
    /// Cap on history turns included in an assembled prompt
    /// (`MAX_HISTORY_TURNS`). Persisted history is never truncated.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: default_openai_model(),
            openai_embedding_model: default_openai_embedding_model(),
            openai_temperature: default_openai_temperature(),
            openai_max_tokens: default_openai_max_tokens(),
            system_prompt: default_system_prompt(),
            condense_prompt: default_condense_prompt(),
            ack_message: default_ack_message(),
            condense_history: false,
            post_failure_notice: false,
            request_timeout_secs: default_request_timeout_secs(),
            slack_app_token: String::new(),
            slack_bot_token: String::new(),
            slack_signing_secret: String::new(),
            db_endpoint: String::new(),
            db_username: String::new(),
            db_password: String::new(),
            index_api_key: String::new(),
            index_host: String::new(),
            index_namespace: default_index_namespace(),
            retrieval_top_k: default_retrieval_top_k(),
            passage_text_key: default_passage_text_key(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and an optional TOML file.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("HANDBOOK_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        if result.openai_temperature < 0.0 || result.openai_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI temperature must be between 0 and 2."));
        }

        if result.openai_max_tokens < 1 || result.openai_max_tokens > 128000 {
            return Err(anyhow::anyhow!("OpenAI max tokens must be between 1 and 128000."));
        }

        if result.retrieval_top_k < 1 {
            return Err(anyhow::anyhow!("Retrieval top-k must be at least 1."));
        }

        Ok(result)
    }
}

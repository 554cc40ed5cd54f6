//! LLM service: generation, embeddings, and the rate-limit retry policy.
//!
//! This module defines the `GenericLlmClient` trait that can be implemented
//! for different LLM providers, with a default implementation for OpenAI.

pub mod openai;

use std::future::Future;
use std::time::Duration;
use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tracing::warn;

use crate::base::types::Turn;

/// Maximum number of retries after the initial attempt on rate-limit errors.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 3;

// Errors.

/// Failure taxonomy for generation and embedding backends.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A single rate-limit signal from the backend (HTTP 429 equivalent).
    /// Consumed by the retry policy; never escapes it.
    #[error("backend rate limited the request")]
    RateLimited,
    /// Rate limiting persisted through every retry.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },
    /// Any other backend failure. Surfaced immediately, not retried.
    #[error("backend error: {0}")]
    Backend(String),
}

// Retry policy.

/// Backoff before retry `attempt` (0-based): 1s, 2s, 4s.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

/// Run `op` with exponential-backoff retries on rate-limit signals.
///
/// `op` receives the 0-based attempt number. Rate limiting past
/// `max_retries` fails with [`LlmError::RateLimitExceeded`]; every other
/// error fails immediately.
pub async fn with_rate_limit_retry<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(LlmError::RateLimited) if attempt < max_retries => {
                let delay = backoff_delay(attempt);
                warn!("Rate limit exceeded. Retrying in {} seconds ...", delay.as_secs());

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(LlmError::RateLimited) => return Err(LlmError::RateLimitExceeded { attempts: attempt + 1 }),
            Err(err) => return Err(err),
        }
    }
}

// Traits.

/// Generic LLM client trait that clients must implement.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Send ordered turns to the chat-completion backend.
    ///
    /// Returns the trimmed text content of the model's response. Rate-limit
    /// signals are retried per the module retry policy before surfacing.
    async fn chat_completion(&self, model: &str, turns: &[Turn]) -> Result<String, LlmError>;

    /// Embed text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}

// Tests.

//! Library root for `handbook-bot`.
//!
//! Handbook-bot is an OpenAI-powered Q&A assistant for Slack channels designed to:
//! - Answer questions grounded in a handbook vector index
//! - Keep a per-channel conversation going once it has been mentioned
//! - Fall back to an explicit "don't know" reply when the context has no answer
//!
//! The bot integrates with Slack for chat, SurrealDB for conversation history,
//! OpenAI for generation and embeddings, and a Pinecone-style vector index for
//! retrieval. The architecture is built around extensible traits that allow
//! for different implementations of each service.

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the handbook-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with store, LLM, index, and chat clients
/// - Starts the main event loop for processing messages
pub async fn start(config: Config) -> Void {
    info!("Starting handbook-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider().install_default().unwrap();

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}

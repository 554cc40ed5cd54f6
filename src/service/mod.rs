//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for various services used by the handbook-bot:
//! - Chat services (e.g., Slack)
//! - History stores (e.g., SurrealDB)
//! - LLM services (e.g., OpenAI)
//! - Vector indexes (e.g., Pinecone)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod index;
pub mod llm;
pub mod store;

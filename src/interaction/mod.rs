//! Event handling and dispatch for handbook-bot.
//!
//! This module provides the message-dispatch-and-reply pipeline:
//! - Deciding whether to engage with an inbound message
//! - Retrieving knowledge-base passages for grounding
//! - Assembling the conversational context for generation
//! - Posting replies and persisting conversation history

pub mod context;
pub mod dispatch;
pub mod engagement;
pub mod retrieval;

//! Dispatch controller: the message-dispatch-and-reply pipeline.
//!
//! Receives an inbound message event, decides whether to engage, orchestrates
//! retrieval, prompt assembly, and generation, posts the reply, and persists
//! the updated conversation history.

use tracing::{Instrument, error, instrument};

use crate::{
    base::{
        config::Config,
        prompts::FAILURE_NOTICE,
        types::{ConversationState, EventAck, InboundEvent, Res, Turn, Void},
    },
    interaction::{
        context::{assemble, condense_turns},
        engagement::{ConversationMode, is_mentioned, should_engage, strip_mention},
        retrieval::Retriever,
    },
    service::{chat::ChatClient, index::IndexClient, llm::LlmClient, store::StoreClient},
};

/// Subtype marking a deleted message; such events are skipped outright.
const MESSAGE_DELETED_SUBTYPE: &str = "message_deleted";

/// Top-level controller for inbound message events.
///
/// All collaborators are injected at construction, so tests can substitute
/// fakes for any of them.
#[derive(Clone)]
pub struct Dispatcher {
    config: Config,
    store: StoreClient,
    llm: LlmClient,
    chat: ChatClient,
    retriever: Retriever,
}

impl Dispatcher {
    /// Create a new dispatcher over the injected service clients.
    pub fn new(config: Config, store: StoreClient, llm: LlmClient, index: IndexClient, chat: ChatClient) -> Self {
        let retriever = Retriever::new(&config, llm.clone(), index);

        Self { config, store, llm, chat, retriever }
    }

    /// Spawn a task to process the event.
    ///
    /// Duplicate delivery re-triggers a reply: the pipeline is at-least-once
    /// with no dedup.
    #[instrument(skip_all)]
    pub fn handle(&self, event: InboundEvent) {
        let dispatcher = self.clone();

        tokio::spawn(async move {
            dispatcher.process(event).in_current_span().await;
        });
    }

    /// Event boundary: runs the pipeline and always returns the fixed
    /// acknowledgment, whatever the internal outcome.
    ///
    /// Failures are logged; a generic notice is posted to the channel only
    /// when `post_failure_notice` is configured.
    #[instrument(skip_all)]
    pub async fn process(&self, event: InboundEvent) -> EventAck {
        let channel = event.channel.clone();

        if let Err(err) = self.dispatch(event).await {
            error!("Error while handling message event: {err:#}");

            if self.config.post_failure_notice {
                let _ = self.chat.post_message(&channel, FAILURE_NOTICE).await;
            }
        }

        EventAck::processed()
    }

    /// The reply pipeline. Errors propagate to the caller.
    #[instrument(skip_all, fields(channel = %event.channel))]
    pub async fn dispatch(&self, event: InboundEvent) -> Void {
        // Deletions and empty payloads are skipped without side effects.
        if event.subtype.as_deref() == Some(MESSAGE_DELETED_SUBTYPE) {
            return Ok(());
        }

        if event.user_message.trim().is_empty() {
            return Ok(());
        }

        let conversation = self.store.get_conversation(&event.channel).await?;
        let mode = ConversationMode::from_state(conversation.as_ref());
        let mentioned = is_mentioned(&event.user_message, &event.bot_user_id);

        if !should_engage(mode, mentioned) {
            return Ok(());
        }

        // Let the user know a reply is coming before the (slow) generation starts.
        if mentioned && mode == ConversationMode::NoConversation {
            self.chat.post_message(&event.channel, &self.config.ack_message).await?;
        }

        let message = strip_mention(&event.user_message, &event.bot_user_id);
        if message.is_empty() {
            // A bare mention with no question.
            return Ok(());
        }

        let state = conversation.unwrap_or_default();
        let model = state.model.clone().unwrap_or_else(|| self.config.openai_model.clone());

        let reply = self.grounded_reply(&message, &state, &model).await?;

        self.chat.post_message(&event.channel, &reply).await?;

        // Persist only after a successful reply; history is append-only.
        let mut state = state;
        state.history.push(Turn::user(&message));
        state.history.push(Turn::assistant(&reply));
        self.store.put_conversation(&event.channel, &state).await?;

        Ok(())
    }

    /// Retrieval-grounded generation for a stripped user message.
    async fn grounded_reply(&self, message: &str, state: &ConversationState, model: &str) -> Res<String> {
        let query = if self.config.condense_history && !state.history.is_empty() {
            self.condense_question(message, &state.history, model).await?
        } else {
            message.to_string()
        };

        let passages = self.retriever.retrieve(&query, self.config.retrieval_top_k).await?;
        let turns = assemble(&self.config.system_prompt, &passages, &state.history, message, self.config.max_history_turns);

        let reply = self.llm.chat_completion(model, &turns).await?;

        Ok(reply)
    }

    /// Rewrite a follow-up into a standalone question to drive retrieval.
    ///
    /// The model itself judges whether the history is related; an empty
    /// rewrite falls back to the original message.
    async fn condense_question(&self, message: &str, history: &[Turn], model: &str) -> Res<String> {
        let turns = condense_turns(&self.config.condense_prompt, history, message);
        let standalone = self.llm.chat_completion(model, &turns).await?;

        Ok(if standalone.is_empty() { message.to_string() } else { standalone })
    }
}

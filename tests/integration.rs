#![cfg(test)]

use std::sync::Arc;

use async_trait::async_trait;
use mockall::{Sequence, mock};

use handbook_bot::{
    base::{
        config::{Config, ConfigInner},
        prompts,
        types::{ConversationState, InboundEvent, Res, Turn, Void},
    },
    interaction::dispatch::Dispatcher,
    service::{
        chat::{ChatClient, GenericChatClient},
        index::{GenericVectorIndex, IndexClient, ScoredMatch},
        llm::{GenericLlmClient, LlmClient, LlmError},
        store::{GenericHistoryStore, StoreClient},
    },
};

// Mocks.

mock! {
    pub Chat {}

    #[async_trait]
    impl GenericChatClient for Chat {
        fn bot_user_id(&self) -> &str;
        async fn start(&self) -> Void;
        async fn post_message(&self, channel_id: &str, text: &str) -> Void;
    }
}

mock! {
    pub Store {}

    #[async_trait]
    impl GenericHistoryStore for Store {
        async fn get_conversation(&self, channel_id: &str) -> Res<Option<ConversationState>>;
        async fn put_conversation(&self, channel_id: &str, state: &ConversationState) -> Void;
    }
}

mock! {
    pub Llm {}

    #[async_trait]
    impl GenericLlmClient for Llm {
        async fn chat_completion(&self, model: &str, turns: &[Turn]) -> Result<String, LlmError>;
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
    }
}

mock! {
    pub Index {}

    #[async_trait]
    impl GenericVectorIndex for Index {
        async fn query(&self, vector: &[f32], top_k: usize, namespace: &str) -> Res<Vec<ScoredMatch>>;
    }
}

// Helpers.

fn test_config() -> Config {
    Config {
        inner: Arc::new(ConfigInner::default()),
    }
}

fn dispatcher_with(config: Config, store: MockStore, llm: MockLlm, index: MockIndex, chat: MockChat) -> Dispatcher {
    Dispatcher::new(
        config,
        StoreClient::new(Arc::new(store)),
        LlmClient::new(Arc::new(llm)),
        IndexClient::new(Arc::new(index)),
        ChatClient::new(Arc::new(chat)),
    )
}

fn dispatcher(store: MockStore, llm: MockLlm, index: MockIndex, chat: MockChat) -> Dispatcher {
    dispatcher_with(test_config(), store, llm, index, chat)
}

fn event(channel: &str, text: &str) -> InboundEvent {
    InboundEvent {
        channel: channel.to_string(),
        user_message: text.to_string(),
        bot_user_id: "B1".to_string(),
        subtype: None,
    }
}

fn handbook_match(id: &str, text: &str, source: &str) -> ScoredMatch {
    ScoredMatch {
        id: id.to_string(),
        score: 0.9,
        metadata: serde_json::json!({ "text": text, "source": source }).as_object().cloned().unwrap(),
    }
}

/// A mocked happy-path retrieval: one embedding call, one index query.
fn expect_retrieval(llm: &mut MockLlm, index: &mut MockIndex, matches: Vec<ScoredMatch>) {
    llm.expect_embed().times(1).returning(|_| Ok(vec![0.1, 0.2, 0.3]));
    index.expect_query().times(1).returning(move |_, _, _| Ok(matches.clone()));
}

// Tests.

#[tokio::test]
async fn empty_message_text_is_a_complete_no_op() {
    // No expectations on any collaborator: any call panics the test.
    let dispatcher = dispatcher(MockStore::new(), MockLlm::new(), MockIndex::new(), MockChat::new());

    dispatcher.dispatch(event("C1", "   \n ")).await.unwrap();
}

#[tokio::test]
async fn deleted_message_subtype_is_a_complete_no_op() {
    let dispatcher = dispatcher(MockStore::new(), MockLlm::new(), MockIndex::new(), MockChat::new());

    let mut deleted = event("C1", "<@B1> this was deleted");
    deleted.subtype = Some("message_deleted".to_string());

    dispatcher.dispatch(deleted).await.unwrap();
}

#[tokio::test]
async fn unmentioned_message_without_conversation_produces_no_reply() {
    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(|_| Ok(None));

    let dispatcher = dispatcher(store, MockLlm::new(), MockIndex::new(), MockChat::new());

    dispatcher.dispatch(event("C1", "does anyone know the refund policy?")).await.unwrap();
}

#[tokio::test]
async fn bare_mention_posts_only_the_acknowledgment() {
    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(|_| Ok(None));

    let mut chat = MockChat::new();
    chat.expect_post_message().times(1).withf(|_, text| text == prompts::ACK_MESSAGE).returning(|_, _| Ok(()));

    let dispatcher = dispatcher(store, MockLlm::new(), MockIndex::new(), chat);

    // After stripping the mention, nothing remains, so no generation happens
    // and no conversation is created.
    dispatcher.dispatch(event("C1", " <@B1> ")).await.unwrap();
}

#[tokio::test]
async fn first_mention_acknowledges_replies_and_creates_the_conversation() {
    let mut seq = Sequence::new();

    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(|_| Ok(None));
    store
        .expect_put_conversation()
        .times(1)
        .withf(|channel_id, state| {
            channel_id == "C1"
                && state.history == vec![Turn::user("what is the refund policy?"), Turn::assistant("Refunds take 5 days.")]
        })
        .returning(|_, _| Ok(()));

    let mut llm = MockLlm::new();
    let mut index = MockIndex::new();
    expect_retrieval(&mut llm, &mut index, vec![handbook_match("chunk-1", "Refunds take 5 days.", "handbook.md")]);
    llm.expect_chat_completion().times(1).returning(|_, _| Ok("Refunds take 5 days.".to_string()));

    let mut chat = MockChat::new();
    chat.expect_post_message()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, text| text == prompts::ACK_MESSAGE)
        .returning(|_, _| Ok(()));
    chat.expect_post_message()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|channel_id, text| channel_id == "C1" && text == "Refunds take 5 days.")
        .returning(|_, _| Ok(()));

    let dispatcher = dispatcher(store, llm, index, chat);

    dispatcher.dispatch(event("C1", "<@B1> what is the refund policy?")).await.unwrap();
}

#[tokio::test]
async fn active_conversation_appends_history_and_keeps_the_pinned_model() {
    let existing = ConversationState {
        history: vec![Turn::user("A")],
        model: Some("gpt-4".to_string()),
    };

    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(move |_| Ok(Some(existing.clone())));
    store
        .expect_put_conversation()
        .times(1)
        .withf(|_, state| {
            state.model.as_deref() == Some("gpt-4")
                && state.history == vec![Turn::user("A"), Turn::user("and exchanges?"), Turn::assistant("Exchanges are free.")]
        })
        .returning(|_, _| Ok(()));

    let mut llm = MockLlm::new();
    let mut index = MockIndex::new();
    expect_retrieval(&mut llm, &mut index, vec![handbook_match("chunk-2", "Exchanges are free.", "handbook.md")]);
    llm.expect_chat_completion()
        .times(1)
        .withf(|model, _| model == "gpt-4")
        .returning(|_, _| Ok("Exchanges are free.".to_string()));

    let mut chat = MockChat::new();
    // Sticky conversation mode: no mention needed, and no acknowledgment.
    chat.expect_post_message().times(1).withf(|_, text| text == "Exchanges are free.").returning(|_, _| Ok(()));

    let dispatcher = dispatcher(store, llm, index, chat);

    dispatcher.dispatch(event("C1", "and exchanges?")).await.unwrap();
}

#[tokio::test]
async fn retrieval_uses_the_configured_top_k_and_namespace() {
    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(|_| Ok(Some(ConversationState::default())));
    store.expect_put_conversation().times(1).returning(|_, _| Ok(()));

    let mut llm = MockLlm::new();
    llm.expect_embed().times(1).returning(|_| Ok(vec![0.5; 4]));
    llm.expect_chat_completion().times(1).returning(|_, _| Ok("ok".to_string()));

    let mut index = MockIndex::new();
    index
        .expect_query()
        .times(1)
        .withf(|_, top_k, namespace| *top_k == 5 && namespace == "handbook-namespace")
        .returning(|_, _, _| Ok(vec![]));

    let mut chat = MockChat::new();
    chat.expect_post_message().times(1).returning(|_, _| Ok(()));

    let dispatcher = dispatcher(store, llm, index, chat);

    dispatcher.dispatch(event("C1", "what is the travel policy?")).await.unwrap();
}

#[tokio::test]
async fn duplicate_passages_appear_once_in_the_assembled_context() {
    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(|_| Ok(Some(ConversationState::default())));
    store.expect_put_conversation().times(1).returning(|_, _| Ok(()));

    let mut llm = MockLlm::new();
    let mut index = MockIndex::new();
    expect_retrieval(
        &mut llm,
        &mut index,
        vec![
            handbook_match("chunk-1", "Refunds take 5 days.", "a.md"),
            handbook_match("chunk-2", "Refunds take 5 days.", "b.md"),
            handbook_match("chunk-3", "Exchanges are free.", "c.md"),
        ],
    );
    llm.expect_chat_completion()
        .times(1)
        .withf(|_, turns| {
            let system = &turns[0].content;
            system.matches("Refunds take 5 days.").count() == 1 && system.contains("Exchanges are free.")
        })
        .returning(|_, _| Ok("ok".to_string()));

    let mut chat = MockChat::new();
    chat.expect_post_message().times(1).returning(|_, _| Ok(()));

    let dispatcher = dispatcher(store, llm, index, chat);

    dispatcher.dispatch(event("C1", "what is the refund policy?")).await.unwrap();
}

#[tokio::test]
async fn exhausted_rate_limit_bubbles_and_persists_nothing() {
    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(|_| Ok(Some(ConversationState::default())));

    let mut llm = MockLlm::new();
    let mut index = MockIndex::new();
    expect_retrieval(&mut llm, &mut index, vec![]);
    llm.expect_chat_completion().times(1).returning(|_, _| Err(LlmError::RateLimitExceeded { attempts: 4 }));

    // No reply posted, no state persisted.
    let dispatcher = dispatcher(store, llm, index, MockChat::new());

    let err = dispatcher.dispatch(event("C1", "what is the refund policy?")).await.unwrap_err();

    assert!(matches!(err.downcast_ref::<LlmError>(), Some(LlmError::RateLimitExceeded { attempts: 4 })));
}

#[tokio::test]
async fn boundary_acknowledges_even_when_the_pipeline_fails() {
    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(|_| Err(anyhow::anyhow!("store unavailable")));

    let dispatcher = dispatcher(store, MockLlm::new(), MockIndex::new(), MockChat::new());

    let ack = dispatcher.process(event("C1", "<@B1> hello")).await;

    assert_eq!(ack.status_code, 200);
    assert_eq!(ack.message, "Event processed successfully");
}

#[tokio::test]
async fn failure_notice_is_posted_only_when_configured() {
    let config = Config {
        inner: Arc::new(ConfigInner {
            post_failure_notice: true,
            ..Default::default()
        }),
    };

    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(|_| Err(anyhow::anyhow!("store unavailable")));

    let mut chat = MockChat::new();
    chat.expect_post_message().times(1).withf(|_, text| text == prompts::FAILURE_NOTICE).returning(|_, _| Ok(()));

    let dispatcher = dispatcher_with(config, store, MockLlm::new(), MockIndex::new(), chat);

    let ack = dispatcher.process(event("C1", "<@B1> hello")).await;

    assert_eq!(ack.status_code, 200);
}

#[tokio::test]
async fn condensed_question_drives_retrieval_for_follow_ups() {
    let config = Config {
        inner: Arc::new(ConfigInner {
            condense_history: true,
            ..Default::default()
        }),
    };

    let existing = ConversationState {
        history: vec![Turn::user("what is the refund policy?"), Turn::assistant("Refunds take 5 days.")],
        model: None,
    };

    let mut store = MockStore::new();
    store.expect_get_conversation().times(1).returning(move |_| Ok(Some(existing.clone())));
    store.expect_put_conversation().times(1).returning(|_, _| Ok(()));

    let mut seq = Sequence::new();
    let mut llm = MockLlm::new();

    // First completion condenses the follow-up into a standalone question.
    llm.expect_chat_completion()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, turns| turns[1].content.contains("Follow Up Input: and for sale items?"))
        .returning(|_, _| Ok("What is the refund policy for sale items?".to_string()));

    // The standalone question, not the raw follow-up, is embedded for retrieval.
    llm.expect_embed()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|text| text == "What is the refund policy for sale items?")
        .returning(|_| Ok(vec![0.1, 0.2]));

    llm.expect_chat_completion().times(1).in_sequence(&mut seq).returning(|_, _| Ok("Sale items are final.".to_string()));

    let mut index = MockIndex::new();
    index.expect_query().times(1).returning(|_, _, _| Ok(vec![]));

    let mut chat = MockChat::new();
    chat.expect_post_message().times(1).withf(|_, text| text == "Sale items are final.").returning(|_, _| Ok(()));

    let dispatcher = dispatcher_with(config, store, llm, index, chat);

    dispatcher.dispatch(event("C1", "and for sale items?")).await.unwrap();
}

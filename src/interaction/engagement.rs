//! Engagement rules: when does the bot reply at all?

use crate::base::types::ConversationState;

/// Conversation mode for a channel, derived from the history store lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationMode {
    /// No stored conversation; the bot engages only when mentioned.
    NoConversation,
    /// A conversation exists; the bot replies to every message in the channel.
    ConversationActive,
}

impl ConversationMode {
    pub fn from_state(state: Option<&ConversationState>) -> Self {
        if state.is_some() { Self::ConversationActive } else { Self::NoConversation }
    }
}

/// Mention token for a bot user, as it appears in raw message text.
pub fn mention_token(bot_user_id: &str) -> String {
    format!("<@{bot_user_id}>")
}

/// Whether the message text contains the bot's mention token.
pub fn is_mentioned(text: &str, bot_user_id: &str) -> bool {
    text.contains(&mention_token(bot_user_id))
}

/// Engagement rule: respond only if the bot is mentioned, or a conversation
/// is already active for the channel (sticky conversation mode).
pub fn should_engage(mode: ConversationMode, mentioned: bool) -> bool {
    mentioned || mode == ConversationMode::ConversationActive
}

/// Strip every mention token from the text and trim the remainder.
pub fn strip_mention(text: &str, bot_user_id: &str) -> String {
    text.replace(&mention_token(bot_user_id), "").trim().to_string()
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_derives_from_store_lookup() {
        assert_eq!(ConversationMode::from_state(None), ConversationMode::NoConversation);
        assert_eq!(ConversationMode::from_state(Some(&ConversationState::default())), ConversationMode::ConversationActive);
    }

    #[test]
    fn engages_only_on_mention_or_active_conversation() {
        assert!(should_engage(ConversationMode::NoConversation, true));
        assert!(should_engage(ConversationMode::ConversationActive, false));
        assert!(should_engage(ConversationMode::ConversationActive, true));
        assert!(!should_engage(ConversationMode::NoConversation, false));
    }

    #[test]
    fn mention_detection_requires_the_full_token() {
        assert!(is_mentioned("<@B1> what is the refund policy?", "B1"));
        assert!(!is_mentioned("B1 what is the refund policy?", "B1"));
    }

    #[test]
    fn stripping_removes_every_mention_and_trims() {
        assert_eq!(strip_mention("<@B1> hello <@B1> there", "B1"), "hello  there");
        assert_eq!(strip_mention("  <@B1>  ", "B1"), "");
    }
}

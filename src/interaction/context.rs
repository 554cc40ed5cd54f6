//! Prompt assembly: one grounding system turn, prior history, the new user turn.

use crate::base::{
    prompts::PASSAGE_SEPARATOR,
    types::{RetrievedPassage, Turn},
};

/// Assemble the ordered turn sequence for a generation request.
///
/// The system turn carries the grounding instructions plus the retrieved
/// context section; it is followed by the prior history in original order and
/// the new user turn. Only the last `max_history_turns` turns of history are
/// included; the persisted history itself is never truncated.
pub fn assemble(system_prompt: &str, passages: &[RetrievedPassage], history: &[Turn], user_message: &str, max_history_turns: usize) -> Vec<Turn> {
    let mut system = system_prompt.to_string();

    if !passages.is_empty() {
        system.push_str("\n\nContext sections:\n");
        system.push_str(&passages.iter().map(|p| p.content.as_str()).collect::<Vec<_>>().join(PASSAGE_SEPARATOR));
    }

    let tail = history.len().saturating_sub(max_history_turns);

    let mut turns = Vec::with_capacity(history.len() - tail + 2);
    turns.push(Turn::system(system));
    turns.extend(history[tail..].iter().cloned());
    turns.push(Turn::user(user_message));

    turns
}

/// Turns for rewriting a follow-up into a standalone question.
pub fn condense_turns(condense_prompt: &str, history: &[Turn], question: &str) -> Vec<Turn> {
    let input = format!("Chat History:\n{}\nFollow Up Input: {}\nStandalone question:", render_history(history), question);

    vec![Turn::system(condense_prompt), Turn::user(input)]
}

/// Render history as role-prefixed lines for the condense prompt.
fn render_history(history: &[Turn]) -> String {
    history.iter().map(|t| format!("{}: {}", t.role.as_str(), t.content)).collect::<Vec<_>>().join("\n")
}

// Tests.

//! Prompt templates for grounded question answering.

/// System prompt for grounded answers.
///
/// The retrieved context section is appended to this prompt at assembly time.
/// The instruction to answer only from the supplied context, and to fall back
/// to [`FALLBACK_PHRASE`] otherwise, is a hard behavioral contract.
pub const GROUNDED_SYSTEM_PROMPT: &str = r#"You are a very enthusiastic handbook representative who loves to help people! Given the context sections below, answer the question using only that information. If you are unsure and the answer is not written in the context, say "Sorry, I don't know how to help with that." Do not write URLs that you cannot find in the context sections.
Answer in formatted mrkdwn, use only Slack-compatible mrkdwn, such as bold (*text*), italic (_text_), strikethrough (~text~), and lists (1., 2., 3.)."#;

/// The exact phrase the model is instructed to emit when the answer is not
/// derivable from the retrieved context.
pub const FALLBACK_PHRASE: &str = "Sorry, I don't know how to help with that.";

/// Prompt for rewriting a follow-up question into a standalone question.
pub const CONDENSE_QUESTION_PROMPT: &str = "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question. If the follow up question is not closely related to the chat history, the chat history must be ignored when generating the standalone question and your job is to repeat the follow up question exactly.";

/// Acknowledgment posted when a mention starts a new conversation, before the
/// (potentially slow) generation begins.
pub const ACK_MESSAGE: &str = ":pleased_wensen: Let me take a look at this for you!";

/// Generic notice posted on pipeline failure, when enabled via config.
pub const FAILURE_NOTICE: &str = "Something went wrong while generating a reply. Please try again.";

/// Separator between retrieved passages in the assembled context section.
pub const PASSAGE_SEPARATOR: &str = "\n---\n";

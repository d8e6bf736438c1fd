//! Prompt construction for the answer, condense and direct paths.

use histochat_core::types::{ChatMessage, ChatRole};

use crate::graph::GraphFact;
use crate::llm::{PromptMessage, PromptRole};

pub const CONTEXT_HEADER: &str = "Context:";
pub const NO_CONTEXT: &str = "(no relevant facts found)";
pub const FOLLOW_UP_HEADER: &str = "Follow-up question:";
pub const STANDALONE_MARKER: &str = "Standalone question:";
pub const CONDENSE_INSTRUCTION: &str = "Given the conversation and a follow-up question, \
rephrase the follow-up question to be a standalone question that can be understood \
without the conversation. Reply with the standalone question only.";

fn tail(history: &[ChatMessage], turns: usize) -> &[ChatMessage] {
    &history[history.len().saturating_sub(turns)..]
}

fn prompt_role(role: ChatRole) -> PromptRole {
    match role {
        ChatRole::User => PromptRole::User,
        ChatRole::Assistant => PromptRole::Assistant,
    }
}

/// Messages for answering `question` from retrieved `facts`.
///
/// The system message carries the persona prompt followed by the context
/// block; the last `history_turns` messages precede the question.
pub fn answer_messages(
    system_prompt: &str,
    facts: &[GraphFact],
    history: &[ChatMessage],
    history_turns: usize,
    question: &str,
) -> Vec<PromptMessage> {
    let mut system = format!("{}\n\n{}\n", system_prompt, CONTEXT_HEADER);
    if facts.is_empty() {
        system.push_str(NO_CONTEXT);
    } else {
        let lines: Vec<String> = facts.iter().map(|f| format!("- {}", f.sentence())).collect();
        system.push_str(&lines.join("\n"));
    }

    let mut messages = Vec::with_capacity(history_turns + 2);
    messages.push(PromptMessage::system(system));
    messages.extend(
        tail(history, history_turns)
            .iter()
            .map(|m| PromptMessage::new(prompt_role(m.role), m.content.clone())),
    );
    messages.push(PromptMessage::user(question));
    messages
}

/// Messages asking the model to rewrite a follow-up into a standalone question.
pub fn condense_messages(
    history: &[ChatMessage],
    history_turns: usize,
    question: &str,
) -> Vec<PromptMessage> {
    let transcript: Vec<String> = tail(history, history_turns)
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect();
    let user = format!(
        "Chat history:\n{}\n\n{} {}\n{}",
        transcript.join("\n"),
        FOLLOW_UP_HEADER,
        question,
        STANDALONE_MARKER
    );
    vec![
        PromptMessage::system(CONDENSE_INSTRUCTION),
        PromptMessage::user(user),
    ]
}

/// Messages for a plain model response with no retrieval and no history.
pub fn direct_messages(system_prompt: &str, text: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(system_prompt),
        PromptMessage::user(text),
    ]
}

/// Whether `messages` were built by [`condense_messages`]. Only the chain
/// sets system turns, so user text cannot make a prompt look like one.
pub fn is_condense_request(messages: &[PromptMessage]) -> bool {
    messages
        .iter()
        .any(|m| m.role == PromptRole::System && m.content == CONDENSE_INSTRUCTION)
}

/// The follow-up question embedded in a condense prompt.
pub fn follow_up_question(content: &str) -> Option<&str> {
    let body = content.trim_end().strip_suffix(STANDALONE_MARKER)?;
    let (_, question) = body.rsplit_once(&format!("\n\n{} ", FOLLOW_UP_HEADER))?;
    Some(question.trim())
}

/// Fact sentences listed in the context block of an answer system prompt.
/// `None` when the prompt has no context block.
pub fn context_lines(system: &str) -> Option<Vec<&str>> {
    let (_, block) = system.split_once(CONTEXT_HEADER)?;
    Some(
        block
            .lines()
            .filter_map(|l| l.trim().strip_prefix("- "))
            .collect(),
    )
}

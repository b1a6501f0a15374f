//! Review prompt construction and the chat call.

use redline_index::assembler::AssembledContext;
use redline_llm::provider::{LlmProvider, Message, Role};

const SYSTEM_PROMPT: &str = "\
You are an experienced code reviewer. You receive a diff and snippets of \
related code retrieved from the repository. Review the diff for \
correctness, clarity, and consistency with the surrounding codebase. \
Point at specific lines, explain why each finding matters, and suggest a \
concrete fix. Do not praise; if the change looks fine, say so in one \
sentence.";

/// Build the chat messages for one review request.
#[must_use]
pub fn build_review_messages(diff: &str, context: &AssembledContext) -> Vec<Message> {
    let mut user = String::with_capacity(diff.len() + context.text.len() + 256);

    user.push_str("Relevant code from the repository:\n\n");
    user.push_str(&context.text);
    user.push_str("\n\nDiff under review:\n\n```diff\n");
    user.push_str(diff);
    user.push_str("\n```\n\nReview this change.");

    vec![
        Message::new(Role::System, SYSTEM_PROMPT),
        Message::new(Role::User, user),
    ]
}

/// Run one review: prompt the provider with the diff and its retrieved
/// context, returning the generated review text.
///
/// # Errors
///
/// Returns an error if the chat call fails.
pub async fn run_review<P: LlmProvider>(
    provider: &P,
    diff: &str,
    context: &AssembledContext,
) -> anyhow::Result<String> {
    tracing::debug!(
        context_chars = context.total_chars,
        context_tokens = context.estimated_tokens,
        chunks = context.chunks_used.len(),
        "running review"
    );

    let messages = build_review_messages(diff, context);
    let review = provider.chat(&messages).await?;
    Ok(review)
}

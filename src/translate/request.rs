//! Translate OpenAI-shaped requests into what the upstream expects.
//!
//! The agent service only ever receives the newest turn of a conversation: its
//! session already holds the earlier ones. Gateway providers receive a chat
//! request, so legacy completions are rewritten into a single user message.

use super::backend_types::{InputPart, MessageRequest};
use super::openai_types::{ChatCompletionRequest, ChatMessage, CompletionRequest, Role};

/// Provider the agent uses when the model identifier carries no namespace.
pub const DEFAULT_PROVIDER_ID: &str = "openrouter";

/// Build the agent's message body using [`DEFAULT_PROVIDER_ID`] as fallback.
pub fn to_backend_request(user_text: &str, model: &str) -> MessageRequest {
    to_backend_request_with_provider(user_text, model, DEFAULT_PROVIDER_ID)
}

/// Build the agent's message body.
///
/// `providerID` is the namespace before the first `/` of `model`, or
/// `default_provider` when there is none. `modelID` is always the full
/// identifier, namespace included.
pub fn to_backend_request_with_provider(
    user_text: &str,
    model: &str,
    default_provider: &str,
) -> MessageRequest {
    MessageRequest {
        parts: vec![InputPart::Text {
            text: user_text.to_string(),
        }],
        provider_id: provider_id_for(model, default_provider).to_string(),
        model_id: model.to_string(),
    }
}

pub fn provider_id_for<'a>(model: &'a str, default_provider: &'a str) -> &'a str {
    match model.split_once('/') {
        Some((provider, _)) => provider,
        None => default_provider,
    }
}

/// Content of the last message in the list, which is the turn to forward.
pub fn latest_turn(messages: &[ChatMessage]) -> String {
    messages.last().map(ChatMessage::text).unwrap_or_default()
}

/// Rewrite a legacy completion request as a one-message chat request.
pub fn legacy_to_chat(req: &CompletionRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: req.model.clone(),
        messages: vec![ChatMessage::new(
            Role::User,
            req.prompt_text().unwrap_or_default(),
        )],
        stream: req.stream,
        max_tokens: req.max_tokens,
        temperature: req.temperature,
        extra: req.extra.clone(),
    }
}

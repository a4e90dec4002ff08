//! Build OpenAI-shaped results from upstream replies.
//!
//! Token counts are estimates (characters / 4, never below 1); the agent
//! service does not report usage per message.

use chrono::Utc;

use super::backend_types::ResponsePart;
use super::openai_types::{
    ChatCompletionResponse, Choice, ChoiceMessage, CompletionChoice, CompletionResponse, Usage,
};

/// Content returned when the agent's reply carries no text at all.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response from OpenCode";

const CHARS_PER_TOKEN: u64 = 4;

/// Concatenate the `text` parts of an agent reply in order, ignoring other part types.
pub fn text_from_parts(parts: &[ResponsePart]) -> String {
    let text: String = parts
        .iter()
        .filter(|p| p.part_type == "text")
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.is_empty() {
        NO_RESPONSE_PLACEHOLDER.to_string()
    } else {
        text
    }
}

pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64 / CHARS_PER_TOKEN).max(1)
}

pub fn estimated_usage(prompt: &str, completion: &str) -> Usage {
    let prompt_tokens = estimate_tokens(prompt);
    let completion_tokens = estimate_tokens(completion);
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    }
}

/// `<prefix>-<unix millis>`. Two calls within the same millisecond collide.
pub fn completion_id(prefix: &str) -> String {
    format!("{prefix}-{}", Utc::now().timestamp_millis())
}

pub fn build_chat_completion(model: &str, prompt: &str, text: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: completion_id("chatcmpl"),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: Some(ChoiceMessage {
                role: "assistant".to_string(),
                content: Some(text.to_string()),
                tool_calls: None,
            }),
            delta: None,
            finish_reason: Some("stop".to_string()),
        }],
        usage: Some(estimated_usage(prompt, text)),
    }
}

pub fn build_legacy_completion(model: &str, prompt: &str, text: &str) -> CompletionResponse {
    CompletionResponse {
        id: completion_id("cmpl"),
        object: "text_completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![CompletionChoice {
            text: text.to_string(),
            index: 0,
            logprobs: None,
            finish_reason: Some("stop".to_string()),
        }],
        usage: Some(estimated_usage(prompt, text)),
    }
}

/// Text of a chat choice: `message.content`, else `delta.content`.
pub fn choice_text(choice: &Choice) -> Option<&str> {
    choice
        .message
        .as_ref()
        .and_then(|m| m.content.as_deref())
        .or_else(|| choice.delta.as_ref().and_then(|d| d.content.as_deref()))
}

/// Convert a chat response back into the legacy completion shape.
///
/// Upstream usage is kept when reported; otherwise it is estimated from the
/// prompt and the concatenated choice texts.
pub fn chat_to_legacy(resp: &ChatCompletionResponse, model: &str, prompt: &str) -> CompletionResponse {
    let choices: Vec<CompletionChoice> = resp
        .choices
        .iter()
        .map(|c| CompletionChoice {
            text: choice_text(c).unwrap_or_default().to_string(),
            index: c.index,
            logprobs: None,
            finish_reason: Some(c.finish_reason.clone().unwrap_or_else(|| "stop".to_string())),
        })
        .collect();

    let usage = resp.usage.unwrap_or_else(|| {
        let text: String = choices.iter().map(|c| c.text.as_str()).collect();
        estimated_usage(prompt, &text)
    });

    CompletionResponse {
        id: completion_id("cmpl"),
        object: "text_completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices,
        usage: Some(usage),
    }
}

//! Emulated streaming.
//!
//! The agent service answers each message in one piece, so a streaming request
//! is served as a fixed frame sequence wrapped in the SSE envelope:
//!
//! 1. one content frame carrying the whole reply (`finish_reason: null`)
//! 2. one terminal frame with the same `id`/`created`/`model` and `finish_reason: "stop"`
//! 3. the `[DONE]` sentinel
//!
//! If the reply cannot be produced, the stream carries a single error frame
//! instead and ends without `[DONE]`.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;

use super::openai_types::{
    ChatCompletionChunk, ChatCompletionResponse, ChunkChoice, ChunkDelta, CompletionChoice,
    CompletionResponse,
};
use super::response::choice_text;
use crate::error::{ProxyError, Result};
use crate::logging::SharedLogger;

pub const DONE_SENTINEL: &str = "[DONE]";

/// Stream of SSE `data:` payloads, one per frame.
pub type SseStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Frames for a chat completion, derived from the complete response.
pub fn chat_frames(resp: &ChatCompletionResponse) -> Result<Vec<String>> {
    let text = resp
        .choices
        .first()
        .and_then(choice_text)
        .unwrap_or_default()
        .to_string();

    let chunk = |delta: ChunkDelta, finish_reason: Option<&str>| ChatCompletionChunk {
        id: resp.id.clone(),
        object: "chat.completion.chunk".to_string(),
        created: resp.created,
        model: resp.model.clone(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason: finish_reason.map(String::from),
        }],
    };

    let content = chunk(
        ChunkDelta {
            role: Some("assistant".to_string()),
            content: Some(text),
        },
        None,
    );
    let terminal = chunk(ChunkDelta::default(), Some("stop"));

    Ok(vec![
        serde_json::to_string(&content)?,
        serde_json::to_string(&terminal)?,
        DONE_SENTINEL.to_string(),
    ])
}

/// Frames for a legacy completion, derived from the complete response.
pub fn legacy_frames(resp: &CompletionResponse) -> Result<Vec<String>> {
    let text = resp
        .choices
        .first()
        .map(|c| c.text.clone())
        .unwrap_or_default();

    let frame = |text: String, finish_reason: Option<&str>| CompletionResponse {
        id: resp.id.clone(),
        object: resp.object.clone(),
        created: resp.created,
        model: resp.model.clone(),
        choices: vec![CompletionChoice {
            text,
            index: 0,
            logprobs: None,
            finish_reason: finish_reason.map(String::from),
        }],
        usage: None,
    };

    Ok(vec![
        serde_json::to_string(&frame(text, None))?,
        serde_json::to_string(&frame(String::new(), Some("stop")))?,
        DONE_SENTINEL.to_string(),
    ])
}

pub fn error_frame(err: &ProxyError) -> String {
    serde_json::to_string(&err.to_error_response())
        .unwrap_or_else(|_| r#"{"error":{"message":"internal error","type":"proxy_error","code":"internal_error"}}"#.to_string())
}

/// Run `produce` once the client is already attached to the stream, then emit
/// its frames, or an in-band error frame when it fails.
pub fn emulate<F>(produce: F, logger: SharedLogger) -> SseStream
where
    F: Future<Output = Result<Vec<String>>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        match produce.await {
            Ok(frames) => {
                for frame in frames {
                    yield frame;
                }
                logger.debug("stream", "Stream completed");
            }
            Err(e) => {
                logger.error("stream", format!("Stream failed: {e}"));
                yield error_frame(&e);
            }
        }
    })
}

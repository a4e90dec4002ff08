//! Completion translation against the agent service.
//!
//! A request is mapped to its conversation's session (creating one on the
//! first turn), the newest turn is posted into that session, and the reply is
//! wrapped in an OpenAI response. Streaming requests get the same reply as an
//! emulated SSE stream.

use chrono::Utc;
use serde_json::json;

use crate::backend::BackendClient;
use crate::error::{ProxyError, Result};
use crate::logging::{LogLevel, SharedLogger};
use crate::session::{ConversationKey, SessionTable};
use crate::translate::files;
use crate::translate::openai_types::{
    ChatCompletionRequest, ChatCompletionResponse, CompletionRequest, CompletionResponse,
    FileList, FileObject,
};
use crate::translate::request::latest_turn;
use crate::translate::response::{build_chat_completion, build_legacy_completion, text_from_parts};
use crate::translate::streaming::{self, SseStream};

const CHAT_SESSION_TITLE: &str = "WebUI Chat";
const COMPLETION_SESSION_TITLE: &str = "WebUI Completions";

pub fn validate_chat(req: &ChatCompletionRequest) -> Result<()> {
    if req.messages.is_empty() {
        return Err(ProxyError::validation("'messages' must contain at least one message"));
    }
    if req.model.is_empty() {
        return Err(ProxyError::validation("'model' is required"));
    }
    Ok(())
}

pub fn validate_completion(req: &CompletionRequest) -> Result<()> {
    if req.prompt.is_none() {
        return Err(ProxyError::validation("'prompt' is required"));
    }
    if req.model.is_empty() {
        return Err(ProxyError::validation("'model' is required"));
    }
    Ok(())
}

/// Find or create the session for `key` and return its id.
async fn resolve_session(
    key: &ConversationKey,
    title: &str,
    backend: &BackendClient,
    sessions: &SessionTable,
    logger: &SharedLogger,
) -> Result<String> {
    let session = sessions
        .resolve(key, move || async move {
            let title = format!("{title} - {}", Utc::now().to_rfc3339());
            backend.create_session(&title).await.map(|s| s.id)
        })
        .await?;

    if session.created {
        logger.log_with_context(
            LogLevel::Info,
            "session",
            "Created session",
            json!({
                "conversation": key.as_str(),
                "session_id": session.id,
                "active_sessions": sessions.len(),
            }),
        );
    } else {
        logger.debug(
            "session",
            format!("Reusing session {} for {}", session.id, key),
        );
    }

    Ok(session.id)
}

/// Post `text` into the session and return the reply text.
async fn exchange(
    session_id: &str,
    text: &str,
    model: &str,
    backend: &BackendClient,
) -> Result<String> {
    let reply = backend.send_message(session_id, text, model).await?;
    Ok(text_from_parts(&reply.parts))
}

pub async fn chat_completion(
    req: &ChatCompletionRequest,
    backend: &BackendClient,
    sessions: &SessionTable,
    logger: &SharedLogger,
) -> Result<ChatCompletionResponse> {
    validate_chat(req)?;

    let key = ConversationKey::from_messages(&req.messages);
    let prompt = latest_turn(&req.messages);

    logger.info(
        "proxy",
        format!("Chat completion model={} messages={}", req.model, req.messages.len()),
    );

    let session_id = resolve_session(&key, CHAT_SESSION_TITLE, backend, sessions, logger).await?;
    let text = exchange(&session_id, &prompt, &req.model, backend).await?;

    Ok(build_chat_completion(&req.model, &prompt, &text))
}

/// Validate and resolve the session now; the returned stream posts the turn
/// once polled. Errors before the stream exists become an HTTP error status.
pub async fn chat_completion_stream(
    req: ChatCompletionRequest,
    backend: &BackendClient,
    sessions: &SessionTable,
    logger: &SharedLogger,
) -> Result<SseStream> {
    validate_chat(&req)?;

    let key = ConversationKey::from_messages(&req.messages);
    let prompt = latest_turn(&req.messages);

    logger.info(
        "proxy",
        format!(
            "Chat completion (stream) model={} messages={}",
            req.model,
            req.messages.len()
        ),
    );

    let session_id = resolve_session(&key, CHAT_SESSION_TITLE, backend, sessions, logger).await?;

    let backend = backend.clone();
    Ok(streaming::emulate(
        async move {
            let text = exchange(&session_id, &prompt, &req.model, &backend).await?;
            streaming::chat_frames(&build_chat_completion(&req.model, &prompt, &text))
        },
        logger.clone(),
    ))
}

pub async fn legacy_completion(
    req: &CompletionRequest,
    backend: &BackendClient,
    sessions: &SessionTable,
    logger: &SharedLogger,
) -> Result<CompletionResponse> {
    validate_completion(req)?;

    let prompt = req.prompt_text().unwrap_or_default();
    let key = ConversationKey::from_prompt(&prompt);

    logger.info("proxy", format!("Completion model={}", req.model));

    let session_id =
        resolve_session(&key, COMPLETION_SESSION_TITLE, backend, sessions, logger).await?;
    let text = exchange(&session_id, &prompt, &req.model, backend).await?;

    Ok(build_legacy_completion(&req.model, &prompt, &text))
}

pub async fn legacy_completion_stream(
    req: CompletionRequest,
    backend: &BackendClient,
    sessions: &SessionTable,
    logger: &SharedLogger,
) -> Result<SseStream> {
    validate_completion(&req)?;

    let prompt = req.prompt_text().unwrap_or_default();
    let key = ConversationKey::from_prompt(&prompt);

    logger.info("proxy", format!("Completion (stream) model={}", req.model));

    let session_id =
        resolve_session(&key, COMPLETION_SESSION_TITLE, backend, sessions, logger).await?;

    let backend = backend.clone();
    Ok(streaming::emulate(
        async move {
            let text = exchange(&session_id, &prompt, &req.model, &backend).await?;
            streaming::legacy_frames(&build_legacy_completion(&req.model, &prompt, &text))
        },
        logger.clone(),
    ))
}

/// Workspace files as OpenAI file objects. Backend failures yield an empty list.
pub async fn list_files(backend: &BackendClient, logger: &SharedLogger) -> FileList {
    let paths = match backend.find_files("").await {
        Ok(paths) => paths,
        Err(e) => {
            logger.warn("files", format!("File listing failed: {e}"));
            Vec::new()
        }
    };
    files::file_list(&paths, Utc::now().timestamp())
}

#[must_use]
pub fn get_file(file_id: &str) -> FileObject {
    files::file_object_for_id(file_id, Utc::now().timestamp())
}

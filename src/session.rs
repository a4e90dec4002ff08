//! Conversation-to-session correlation.
//!
//! OpenAI clients resend the whole history on every call and carry no
//! conversation id. The agent service keeps history itself inside a session.
//! We bridge the two by fingerprinting the first user message of each request
//! and mapping that fingerprint to the session created for it.
//!
//! Two different conversations that open with the same user message share a
//! session. Requests without any user message get a time-based key, so they
//! do not reliably land in the same session.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::error::{ProxyError, Result};
use crate::translate::openai_types::{ChatMessage, Role};

const KEY_PREFIX: &str = "conv_";
const FINGERPRINT_BYTES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Key for a chat request: fingerprint of the first `user` message.
    pub fn from_messages(messages: &[ChatMessage]) -> Self {
        match messages.iter().find(|m| m.role == Role::User) {
            Some(first_user) => Self::from_text(&first_user.text()),
            None => Self::from_clock(),
        }
    }

    /// Key for a legacy completion: the prompt plays the first user message.
    pub fn from_prompt(prompt: &str) -> Self {
        Self::from_text(prompt)
    }

    fn from_text(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let fingerprint: String = digest
            .iter()
            .take(FINGERPRINT_BYTES)
            .map(|b| format!("{b:02x}"))
            .collect();
        Self(format!("{KEY_PREFIX}{fingerprint}"))
    }

    fn from_clock() -> Self {
        Self(format!("{KEY_PREFIX}{}", Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of [`SessionTable::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub id: String,
    /// `true` when this call created the backend session.
    pub created: bool,
}

/// Process-wide map from conversation key to backend session id.
///
/// Entries live for the lifetime of the process; there is no eviction.
/// Each key owns a [`OnceCell`], so creation is serialized per key while
/// unrelated conversations proceed in parallel.
#[derive(Debug, Default)]
pub struct SessionTable {
    slots: Mutex<HashMap<ConversationKey, Arc<OnceCell<String>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `key`, calling `create` only if none exists yet.
    ///
    /// Concurrent callers with the same key wait for the one in-flight
    /// `create` and share its result. If `create` fails nothing is stored and
    /// the error is returned; the next caller tries again.
    pub async fn resolve<F, Fut>(&self, key: &ConversationKey, create: F) -> Result<ResolvedSession>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut created = false;
        let id = {
            let created = &mut created;
            slot.get_or_try_init(|| async move {
                let id = create().await?;
                *created = true;
                Ok::<_, ProxyError>(id)
            })
            .await?
            .clone()
        };

        Ok(ResolvedSession { id, created })
    }

    pub fn get(&self, key: &ConversationKey) -> Option<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of conversations with an established session.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

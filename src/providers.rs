//! Provider routing.
//!
//! Every request is served either by the agent service ([`Provider::Native`])
//! or by an OpenAI-compatible gateway. The choice is made once per request
//! from the model identifier and the set of providers enabled in config.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::read_json;
use crate::config::RoutingConfig;
use crate::error::{ProxyError, Result};
use crate::logging::SharedLogger;
use crate::translate::openai_types::{
    ChatCompletionRequest, ChatCompletionResponse, CompletionRequest, CompletionResponse,
};
use crate::translate::request::legacy_to_chat;
use crate::translate::response::chat_to_legacy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Native,
    OpenRouter,
    Gemini,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Native => "native",
            Provider::OpenRouter => "openrouter",
            Provider::Gemini => "gemini",
        })
    }
}

/// Built-in settings for each gateway provider.
#[derive(Debug, Clone)]
pub struct GatewayPreset {
    pub provider: Provider,
    pub base_url: &'static str,
    pub default_api_key_env: &'static str,
    /// Model prefix removed before the request goes upstream.
    pub model_prefix: &'static str,
    /// Extra headers the gateway uses for app attribution.
    pub headers: &'static [(&'static str, &'static str)],
}

const PRESETS: &[GatewayPreset] = &[
    GatewayPreset {
        provider: Provider::OpenRouter,
        base_url: "https://openrouter.ai/api/v1",
        default_api_key_env: "OPENROUTER_API_KEY",
        model_prefix: "openrouter/",
        headers: &[
            ("HTTP-Referer", "https://opencode.ai"),
            ("X-Title", "OpenCode Proxy"),
        ],
    },
    GatewayPreset {
        provider: Provider::Gemini,
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        default_api_key_env: "GEMINI_API_KEY",
        model_prefix: "gemini/",
        headers: &[],
    },
];

impl GatewayPreset {
    #[must_use]
    pub fn for_provider(provider: Provider) -> Option<&'static GatewayPreset> {
        PRESETS.iter().find(|p| p.provider == provider)
    }

    #[must_use]
    pub fn all() -> &'static [GatewayPreset] {
        PRESETS
    }
}

/// Where a request goes, and the model name to send there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub provider: Provider,
    pub model: String,
}

impl Route {
    /// Pick the provider for `model` among the enabled ones.
    ///
    /// `openrouter/…` goes to OpenRouter and `gemini…` to Gemini, but only if
    /// that provider is enabled; anything else goes to the first enabled
    /// provider. Gateways get the model with their prefix stripped; the agent
    /// service always gets the identifier unchanged.
    #[must_use]
    pub fn select(model: &str, enabled: &[Provider]) -> Self {
        let wanted = if model.starts_with("openrouter/") {
            Some(Provider::OpenRouter)
        } else if model.starts_with("gemini") {
            Some(Provider::Gemini)
        } else {
            None
        };

        let provider = wanted
            .filter(|p| enabled.contains(p))
            .or_else(|| enabled.first().copied())
            .unwrap_or(Provider::Native);

        let model = match GatewayPreset::for_provider(provider) {
            Some(preset) => model.strip_prefix(preset.model_prefix).unwrap_or(model),
            None => model,
        };

        Self {
            provider,
            model: model.to_string(),
        }
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        self.provider == Provider::Native
    }
}

/// A gateway endpoint with its credential, resolved before any request is sent.
#[derive(Debug, Clone)]
pub struct GatewayTarget {
    pub provider: Provider,
    /// Full `/chat/completions` URL.
    pub url: String,
    api_key: String,
    headers: &'static [(&'static str, &'static str)],
}

impl GatewayTarget {
    /// Fails with `MissingCredential` when the provider's key variable is
    /// unset, or `Config` when the route is not a gateway.
    pub fn resolve(route: &Route, routing: &RoutingConfig) -> Result<Self> {
        let preset = GatewayPreset::for_provider(route.provider).ok_or_else(|| {
            ProxyError::config(format!("provider '{}' is not a gateway", route.provider))
        })?;
        let api_key = routing.resolve_api_key(route.provider)?;
        let base_url = routing
            .base_url_for(route.provider)
            .unwrap_or_else(|| preset.base_url.to_string());

        Ok(Self {
            provider: route.provider,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            headers: preset.headers,
        })
    }
}

/// Send a chat completion to a resolved gateway and return its complete
/// response.
///
/// The upstream call is always non-streaming; callers emulate streaming.
pub async fn send_chat(
    target: &GatewayTarget,
    route: &Route,
    req: &ChatCompletionRequest,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<ChatCompletionResponse> {
    let upstream = ChatCompletionRequest {
        model: route.model.clone(),
        stream: false,
        ..req.clone()
    };

    logger.info(
        "router",
        format!(
            "POST {} provider={} model={}",
            target.url, target.provider, upstream.model
        ),
    );

    let mut builder = client
        .post(&target.url)
        .header("Authorization", format!("Bearer {}", target.api_key))
        .header("Content-Type", "application/json");
    for (name, value) in target.headers {
        builder = builder.header(*name, *value);
    }

    let response = builder
        .json(&upstream)
        .send()
        .await
        .map_err(|e| ProxyError::backend(format!("{} request failed: {e}", target.provider)))?;

    let mut resp: ChatCompletionResponse = read_json(response, &target.url).await?;
    // Echo the model the client asked for
    resp.model = req.model.clone();

    if let Some(usage) = resp.usage {
        logger.debug(
            "router",
            format!(
                "Completed: in={} out={} tokens",
                usage.prompt_tokens, usage.completion_tokens
            ),
        );
    }

    Ok(resp)
}

/// Send a legacy completion to a resolved gateway as a one-message chat
/// request.
pub async fn send_completion(
    target: &GatewayTarget,
    route: &Route,
    req: &CompletionRequest,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<CompletionResponse> {
    let chat = legacy_to_chat(req);
    let resp = send_chat(target, route, &chat, client, logger).await?;
    let prompt = req.prompt_text().unwrap_or_default();
    Ok(chat_to_legacy(&resp, &req.model, &prompt))
}

pub async fn forward_chat(
    route: &Route,
    req: &ChatCompletionRequest,
    routing: &RoutingConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<ChatCompletionResponse> {
    let target = GatewayTarget::resolve(route, routing)?;
    send_chat(&target, route, req, client, logger).await
}

pub async fn forward_completion(
    route: &Route,
    req: &CompletionRequest,
    routing: &RoutingConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<CompletionResponse> {
    let target = GatewayTarget::resolve(route, routing)?;
    send_completion(&target, route, req, client, logger).await
}

//! Model catalogue conversion.
//!
//! Turns the agent's provider/model catalogue into OpenAI model objects with
//! the OpenRouter extensions (pricing, architecture, supported parameters)
//! that chat front-ends use to populate their model pickers.

use crate::translate::backend_types::{BackendModel, BackendProvider};
use crate::translate::openai_types::{Architecture, ModelDescriptor, Pricing, TopProvider};

/// Describe one backend model as an OpenAI model object.
#[must_use]
pub fn describe(model: &BackendModel, provider: &BackendProvider, created: i64) -> ModelDescriptor {
    let owned_by = match model.id.split_once('/') {
        Some((owner, _)) => owner.to_string(),
        None => provider.id.clone(),
    };
    let canonical_slug = model
        .id
        .split_once(':')
        .map_or(model.id.as_str(), |(slug, _)| slug)
        .to_string();

    ModelDescriptor {
        id: model.id.clone(),
        object: "model".to_string(),
        created,
        owned_by,
        name: model.name.clone(),
        canonical_slug,
        description: description(model, provider),
        context_length: model.limit.context,
        architecture: Architecture {
            modality: format!(
                "{}->{}",
                model.modalities.input.join("+"),
                model.modalities.output.join("+")
            ),
            input_modalities: model.modalities.input.clone(),
            output_modalities: model.modalities.output.clone(),
        },
        pricing: Pricing {
            prompt: model.cost.input.to_string(),
            completion: model.cost.output.to_string(),
            request: "0".to_string(),
        },
        top_provider: TopProvider {
            context_length: model.limit.context,
            max_completion_tokens: (model.limit.output > 0).then_some(model.limit.output),
            is_moderated: false,
        },
        supported_parameters: supported_parameters(model),
    }
}

/// Request parameters the model advertises. Advisory only; nothing is enforced.
#[must_use]
pub fn supported_parameters(model: &BackendModel) -> Vec<String> {
    let mut params = vec!["max_tokens"];
    if model.temperature {
        params.push("temperature");
    }
    if model.tool_call {
        params.extend(["tool_choice", "tools"]);
    }
    if model.reasoning {
        params.extend(["reasoning", "include_reasoning"]);
    }
    params.extend(["stop", "seed"]);
    params.into_iter().map(String::from).collect()
}

/// e.g. `"Claude Sonnet 4 from Anthropic with reasoning, tool calling. Multimodal model with 200K context."`
#[must_use]
pub fn description(model: &BackendModel, provider: &BackendProvider) -> String {
    let capabilities: Vec<&str> = [
        (model.reasoning, "reasoning"),
        (model.tool_call, "tool calling"),
        (model.attachment, "file attachments"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect();

    let input = &model.modalities.input;
    let modality = if input.iter().any(|m| m == "image") {
        if input.iter().any(|m| m == "text") {
            "Multimodal"
        } else {
            "Vision"
        }
    } else {
        "Text"
    };

    let mut out = format!("{} from {}", model.name, provider.name);
    if !capabilities.is_empty() {
        out.push_str(" with ");
        out.push_str(&capabilities.join(", "));
    }
    out.push_str(&format!(
        ". {modality} model with {}K context",
        model.limit.context / 1000
    ));
    if model.cost.input == 0.0 && model.cost.output == 0.0 {
        out.push_str(" (free)");
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::backend_types::{Cost, Limit, Modalities};
    use indexmap::IndexMap;

    fn provider() -> BackendProvider {
        BackendProvider {
            id: "anthropic".to_string(),
            name: "Anthropic".to_string(),
            models: IndexMap::new(),
        }
    }

    fn sonnet() -> BackendModel {
        BackendModel {
            id: "claude-sonnet-4:thinking".to_string(),
            name: "Claude Sonnet 4".to_string(),
            attachment: true,
            reasoning: true,
            temperature: true,
            tool_call: true,
            modalities: Modalities {
                input: vec!["text".to_string(), "image".to_string()],
                output: vec!["text".to_string()],
            },
            cost: Cost {
                input: 3.0,
                output: 15.0,
                cache_read: None,
                cache_write: None,
            },
            limit: Limit {
                context: 200_000,
                output: 64_000,
            },
        }
    }

    #[test]
    fn test_describe_full_model() {
        let d = describe(&sonnet(), &provider(), 1_700_000_000);

        assert_eq!(d.object, "model");
        assert_eq!(d.created, 1_700_000_000);
        assert_eq!(d.owned_by, "anthropic");
        assert_eq!(d.canonical_slug, "claude-sonnet-4");
        assert_eq!(d.context_length, 200_000);
        assert_eq!(d.architecture.modality, "text+image->text");
        assert_eq!(d.pricing.prompt, "3");
        assert_eq!(d.pricing.completion, "15");
        assert_eq!(d.pricing.request, "0");
        assert_eq!(d.top_provider.max_completion_tokens, Some(64_000));
        assert_eq!(
            d.description,
            "Claude Sonnet 4 from Anthropic with reasoning, tool calling, file attachments. \
             Multimodal model with 200K context."
        );
        assert_eq!(
            d.supported_parameters,
            vec![
                "max_tokens",
                "temperature",
                "tool_choice",
                "tools",
                "reasoning",
                "include_reasoning",
                "stop",
                "seed"
            ]
        );
    }

    #[test]
    fn test_namespaced_id_sets_owner() {
        let model = BackendModel {
            id: "meta-llama/llama-3.3-70b:free".to_string(),
            name: "Llama 3.3 70B".to_string(),
            limit: Limit {
                context: 131_072,
                output: 0,
            },
            ..BackendModel::default()
        };
        let d = describe(&model, &provider(), 0);

        assert_eq!(d.owned_by, "meta-llama");
        assert_eq!(d.canonical_slug, "meta-llama/llama-3.3-70b");
        assert_eq!(d.top_provider.max_completion_tokens, None);
        assert_eq!(
            d.description,
            "Llama 3.3 70B from Anthropic. Text model with 131K context (free)."
        );
        assert_eq!(d.supported_parameters, vec!["max_tokens", "stop", "seed"]);
    }

    #[test]
    fn test_image_only_input_is_vision() {
        let model = BackendModel {
            id: "v".to_string(),
            name: "V".to_string(),
            modalities: Modalities {
                input: vec!["image".to_string()],
                output: vec!["text".to_string()],
            },
            cost: Cost {
                input: 1.0,
                ..Cost::default()
            },
            limit: Limit {
                context: 8_000,
                output: 0,
            },
            ..BackendModel::default()
        };
        assert_eq!(
            description(&model, &provider()),
            "V from Anthropic. Vision model with 8K context."
        );
    }
}

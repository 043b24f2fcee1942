//! Generation backends.
//!
//! `openai` talks to any OpenAI-compatible chat-completions endpoint;
//! `heuristic` answers offline from local relevance scores.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::{ArError, Result};
use crate::rerank::explain;
use crate::rerank::prompt::Prompt;
use crate::rerank::select::rank_locally;

/// Text generation backend used by the reranker.
pub trait Generator: Send + Sync {
    /// Produce the raw reply for `prompt`.
    fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Backend name for logs and health output.
    fn name(&self) -> &str;
}

/// Build the backend named by `config.backend`.
pub fn build_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.backend.trim() {
        "openai" | "" => Ok(Box::new(OpenAiGenerator::from_config(config)?)),
        "heuristic" => Ok(Box::new(HeuristicGenerator)),
        other => Err(ArError::Config(format!(
            "unknown generation backend '{other}'; use openai or heuristic"
        ))),
    }
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    /// Read the API key from the environment variable named by
    /// `config.api_key_env`.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let key_env = config.api_key_env.trim();
        if key_env.is_empty() {
            return Err(ArError::Config(
                "generation api_key_env is empty; set [generation].api_key_env".to_string(),
            ));
        }
        let api_key = std::env::var(key_env)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ArError::MissingConfig(key_env.to_string()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(ArError::Config(
                "generation endpoint is empty; set [generation].endpoint".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(ArError::Config(
                "generation model is empty; set [generation].model".to_string(),
            ));
        }
        let timeout_secs = config.timeout_secs.max(1);
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| ArError::Config(format!("generation http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs,
        })
    }

    fn transport_error(&self, err: &reqwest::Error) -> ArError {
        if err.is_timeout() {
            ArError::RerankTimeout {
                after_secs: self.timeout_secs,
            }
        } else {
            ArError::RerankUnavailable {
                endpoint: self.endpoint.clone(),
                reason: err.to_string(),
            }
        }
    }
}

impl Generator for OpenAiGenerator {
    fn generate(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|err| self.transport_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ArError::RerankUnavailable {
                endpoint: self.endpoint.clone(),
                reason: format!("HTTP {status}: {snippet}"),
            });
        }

        let body: ChatResponse = response.json().map_err(|err| {
            if err.is_timeout() {
                self.transport_error(&err)
            } else {
                ArError::RerankUnavailable {
                    endpoint: self.endpoint.clone(),
                    reason: format!("unexpected response body: {err}"),
                }
            }
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        debug!(model = %self.model, chars = content.len(), "generation reply received");
        Ok(content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Offline backend: ranks the prompt's candidates by local relevance and
/// explains each pick from the record fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicGenerator;

#[derive(Serialize)]
struct HeuristicPick<'a> {
    id: &'a str,
    why_fit: String,
}

impl Generator for HeuristicGenerator {
    fn generate(&self, prompt: &Prompt) -> Result<String> {
        let candidates: Vec<_> = prompt.candidates.iter().collect();
        let picks: Vec<HeuristicPick<'_>> = rank_locally(&candidates, &prompt.intent)
            .into_iter()
            .take(prompt.bounds.max)
            .map(|record| HeuristicPick {
                id: &record.id,
                why_fit: explain::synthesize(record, &prompt.intent),
            })
            .collect();
        Ok(serde_json::to_string(&picks)?)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRecord, Category};
    use crate::rerank::intent::QueryIntent;
    use crate::rerank::prompt;
    use crate::rerank::select::ResultBounds;
    use httpmock::prelude::*;
    use std::collections::BTreeSet;

    fn record(id: &str, name: &str, category: Category) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            name: name.to_string(),
            url: format!("https://example.com/{id}"),
            description: format!("{name} assessment."),
            category,
            job_levels: BTreeSet::new(),
            languages: BTreeSet::new(),
            duration_minutes: Some(20),
        }
    }

    fn sample_prompt() -> Prompt {
        let a = record("java", "Core Java", Category::KnowledgeSkills);
        let b = record("team", "Teamwork Styles", Category::PersonalityBehavior);
        prompt::build(
            "Java dev with teamwork",
            &QueryIntent::extract("Java dev with teamwork"),
            &[&a, &b],
            ResultBounds::default(),
            None,
        )
    }

    fn config(endpoint: String, timeout_secs: u64) -> GenerationConfig {
        GenerationConfig {
            endpoint,
            timeout_secs,
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn openai_returns_message_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "[\"java\"]"}}]
            }));
        });

        let generator = OpenAiGenerator::with_api_key(
            &config(server.url("/v1/chat/completions"), 5),
            "test-key".to_string(),
        )
        .unwrap();
        let reply = generator.generate(&sample_prompt()).unwrap();

        mock.assert();
        assert_eq!(reply, "[\"java\"]");
    }

    #[test]
    fn openai_server_error_is_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(503).body("overloaded");
        });

        let generator =
            OpenAiGenerator::with_api_key(&config(server.url("/chat"), 5), "k".into()).unwrap();
        let err = generator.generate(&sample_prompt()).unwrap_err();
        assert!(matches!(err, ArError::RerankUnavailable { ref reason, .. } if reason.contains("503")));
    }

    #[test]
    fn openai_slow_reply_is_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(serde_json::json!({"choices": []}));
        });

        let generator =
            OpenAiGenerator::with_api_key(&config(server.url("/chat"), 1), "k".into()).unwrap();
        let err = generator.generate(&sample_prompt()).unwrap_err();
        assert!(matches!(err, ArError::RerankTimeout { after_secs: 1 }));
    }

    #[test]
    fn openai_unreachable_endpoint_is_unavailable() {
        let generator = OpenAiGenerator::with_api_key(
            &config("http://127.0.0.1:9/chat".to_string(), 2),
            "k".into(),
        )
        .unwrap();
        assert!(matches!(
            generator.generate(&sample_prompt()),
            Err(ArError::RerankUnavailable { .. } | ArError::RerankTimeout { .. })
        ));
    }

    #[test]
    fn missing_api_key_names_the_variable() {
        let cfg = GenerationConfig {
            api_key_env: "AREC_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..GenerationConfig::default()
        };
        let err = OpenAiGenerator::from_config(&cfg).unwrap_err();
        assert!(matches!(err, ArError::MissingConfig(ref key) if key == "AREC_TEST_KEY_THAT_IS_NOT_SET"));
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let cfg = GenerationConfig {
            backend: "carrier-pigeon".to_string(),
            ..GenerationConfig::default()
        };
        assert!(matches!(build_generator(&cfg), Err(ArError::Config(_))));
    }

    #[test]
    fn heuristic_reply_is_ranked_json() {
        let reply = HeuristicGenerator.generate(&sample_prompt()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| !item["why_fit"].as_str().unwrap().is_empty()));
    }
}

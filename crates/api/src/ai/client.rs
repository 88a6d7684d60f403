//! Gemini client for the travel assistant.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use crate::config::AiConfig;

use super::error::AiError;
use super::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use super::{HistoryTurn, TextGenerator};

const SYSTEM_PROMPT: &str = "You are the Wanderlance assistant, helping travellers and \
freelancers plan trips, find local services and understand how the marketplace works. \
Answer concisely and in the language of the question.";

const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Client for the Google Generative Language API.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    /// Create a client. The configured timeout becomes the per-request deadline.
    ///
    /// # Errors
    ///
    /// Returns `AiError::NotConfigured` if no API key is set, or
    /// `AiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config.api_key.clone().ok_or(AiError::NotConfigured)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.api_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                api_key,
                model: config.model.clone(),
                endpoint,
            }),
        })
    }

    fn build_request(message: &str, history: &[HistoryTurn]) -> GenerateContentRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .filter(|turn| !turn.content.trim().is_empty())
            .map(|turn| Content::text(Some(turn.gemini_role()), turn.content.clone()))
            .collect();
        contents.push(Content::text(Some("user"), message));

        GenerateContentRequest {
            contents,
            system_instruction: Some(Content::text(None, SYSTEM_PROMPT)),
            generation_config: Some(GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            }),
        }
    }
}

fn extract_text(response: &GenerateContentResponse) -> Result<String, AiError> {
    if let Some(reason) = response.block_reason() {
        return Err(AiError::Blocked(reason.to_string()));
    }

    response.text().ok_or_else(|| {
        AiError::Blocked(
            response
                .finish_reason()
                .unwrap_or("empty response")
                .to_string(),
        )
    })
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.inner.model
    }

    fn is_configured(&self) -> bool {
        true
    }

    #[instrument(skip(self, message, history), fields(model = %self.inner.model, turns = history.len()))]
    async fn generate(&self, message: &str, history: &[HistoryTurn]) -> Result<String, AiError> {
        let request = Self::build_request(message, history);

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("x-goog-api-key", self.inner.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { AiError::Timeout } else { AiError::Http(e) })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| if e.is_timeout() { AiError::Timeout } else { AiError::Http(e) })?;

        if !status.is_success() {
            return Err(AiError::from_status(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| AiError::Parse(format!("Failed to parse response: {e}")))?;

        extract_text(&parsed)
    }
}

/// Stand-in used when no API key is configured. Every call fails with
/// `AiError::NotConfigured`.
#[derive(Debug, Clone)]
pub struct UnconfiguredGenerator {
    model: String,
}

impl UnconfiguredGenerator {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn generate(&self, _message: &str, _history: &[HistoryTurn]) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }
}

/// Build the generator for `config`, falling back to [`UnconfiguredGenerator`]
/// when there is no API key.
///
/// # Errors
///
/// Returns `AiError::Http` if the HTTP client cannot be built.
pub fn generator_from_config(config: &AiConfig) -> Result<Arc<dyn TextGenerator>, AiError> {
    match GeminiClient::new(config) {
        Ok(client) => Ok(Arc::new(client)),
        Err(AiError::NotConfigured) => {
            tracing::warn!("GEMINI_API_KEY not set; AI chat will return fallback replies");
            Ok(Arc::new(UnconfiguredGenerator::new(config.model.clone())))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use wanderlance_core::ChatRole;

    use super::*;
    use crate::ai::types::Part;

    #[test]
    fn test_build_request_maps_roles() {
        let history = vec![
            HistoryTurn::new(ChatRole::User, "Where should I go in spring?"),
            HistoryTurn::new(ChatRole::Assistant, "Kyoto is lovely."),
            HistoryTurn::new(ChatRole::User, "   "),
        ];

        let request = GeminiClient::build_request("And in autumn?", &history);
        let roles: Vec<_> = request
            .contents
            .iter()
            .map(|c| c.role.as_deref().unwrap_or_default())
            .collect();

        assert_eq!(roles, ["user", "model", "user"]);
        assert_eq!(
            request.contents.last().map(|c| c.parts.clone()),
            Some(vec![Part {
                text: Some("And in autumn?".to_string())
            }])
        );
    }

    #[test]
    fn test_extract_text_blocked() {
        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
                .expect("deserialize");
        let err = extract_text(&blocked).expect_err("blocked");
        assert!(err.to_string().to_lowercase().contains("blocked"));

        let empty: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#)
                .expect("deserialize");
        assert!(matches!(extract_text(&empty), Err(AiError::Blocked(_))));
    }

    #[test]
    fn test_new_without_key_is_not_configured() {
        let config = AiConfig::default();
        assert!(matches!(
            GeminiClient::new(&config),
            Err(AiError::NotConfigured)
        ));

        let generator = generator_from_config(&config).expect("fallback generator");
        assert!(!generator.is_configured());
        assert_eq!(generator.model(), config.model);
    }

    #[test]
    fn test_gemini_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<GeminiClient>();
    }
}

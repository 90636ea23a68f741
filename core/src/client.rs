use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use tracing::debug;

use crate::api_types::*;
use crate::config::GeminiConfig;
use crate::errors::{RagError, RagResult, UpstreamService};
use crate::http::{build_http_client, ensure_success};
use crate::sse::SseDecoder;
use crate::traits::{Embed, FragmentStream, Generate};
use crate::types::{ComposedPrompt, QueryVector, Role};

/// Client for the Gemini embedding and streaming generation endpoints
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

impl GeminiClient {
    /// Create a new Gemini API client
    pub fn new(config: GeminiConfig) -> RagResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                RagError::ConfigError(
                    "API key is required to initialize the Gemini client".to_string(),
                )
            })?;

        let client = build_http_client(config.request_timeout_secs, config.connect_timeout_secs)?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    /// Map a composed prompt onto Gemini's request shape.
    ///
    /// System messages become the system instruction and `assistant` turns
    /// use Gemini's `model` role.
    pub fn build_generate_request(&self, prompt: &ComposedPrompt) -> GenerateContentRequest {
        let mut system_texts = Vec::new();
        let mut contents = Vec::with_capacity(prompt.len());

        for message in prompt.messages() {
            match message.role {
                Role::System => system_texts.push(message.content.as_str()),
                Role::User => contents.push(Content::text(Some("user"), message.content.clone())),
                Role::Assistant => {
                    contents.push(Content::text(Some("model"), message.content.clone()))
                }
            }
        }

        let system_instruction = if system_texts.is_empty() {
            None
        } else {
            Some(Content::text(None, system_texts.join("\n\n")))
        };

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            }),
        }
    }
}

#[async_trait]
impl Embed for GeminiClient {
    async fn embed(&self, text: &str) -> RagResult<QueryVector> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput("cannot embed empty text".to_string()));
        }

        let request = EmbedContentRequest {
            model: format!("models/{}", self.config.embedding_model),
            content: Content::text(None, text),
        };

        let response = self
            .client
            .post(self.model_url(&self.config.embedding_model, "embedContent"))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::from_reqwest(UpstreamService::Embedding, e))?;
        let response = ensure_success(UpstreamService::Embedding, response).await?;

        let body = response.json::<EmbedContentResponse>().await.map_err(|e| {
            RagError::upstream(
                UpstreamService::Embedding,
                format!("Failed to parse response: {}", e),
            )
        })?;

        let values = body.embedding.values;
        if values.is_empty() {
            return Err(RagError::upstream(
                UpstreamService::Embedding,
                "No values in embedding",
            ));
        }

        debug!(dimension = values.len(), model = %self.config.embedding_model, "Embedded query");
        Ok(values)
    }

    fn model_name(&self) -> String {
        self.config.embedding_model.clone()
    }
}

#[async_trait]
impl Generate for GeminiClient {
    async fn generate(&self, prompt: &ComposedPrompt) -> RagResult<FragmentStream> {
        let request = self.build_generate_request(prompt);

        let response = self
            .client
            .post(self.model_url(&self.config.model_name, "streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::from_reqwest(UpstreamService::Generation, e))?;
        let response = ensure_success(UpstreamService::Generation, response).await?;

        debug!(model = %self.config.model_name, "Generation stream opened");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| RagError::from_reqwest(UpstreamService::Generation, e)));
        Ok(Box::pin(decode_fragments(body)))
    }

    fn model_name(&self) -> String {
        self.config.model_name.clone()
    }
}

/// Turn an SSE body of `GenerateContentResponse` chunks into text fragments.
///
/// The first fault ends the stream; nothing after it is read.
pub fn decode_fragments<S, B>(body: S) -> impl Stream<Item = RagResult<String>> + Send + 'static
where
    S: Stream<Item = RagResult<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for payload in decoder.push(chunk.as_ref()) {
                match parse_chunk(&payload) {
                    Ok(Some(text)) => yield Ok(text),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(payload) = decoder.finish() {
            match parse_chunk(&payload) {
                Ok(Some(text)) => yield Ok(text),
                Ok(None) => {}
                Err(e) => yield Err(e),
            }
        }
    }
}

fn parse_chunk(payload: &str) -> RagResult<Option<String>> {
    if payload.trim() == "[DONE]" {
        return Ok(None);
    }

    let chunk: GenerateContentResponse = serde_json::from_str(payload).map_err(|e| {
        RagError::upstream(
            UpstreamService::Generation,
            format!("Failed to parse stream chunk: {}", e),
        )
    })?;

    if let Some(error) = chunk.error {
        return Err(RagError::UpstreamError {
            service: UpstreamService::Generation,
            status_code: error.code,
            message: error.message,
        });
    }

    let text = chunk.text();
    Ok(if text.is_empty() { None } else { Some(text) })
}

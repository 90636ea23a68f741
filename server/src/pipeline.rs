//! Per-request orchestration of embed, search, assemble, compose and generate.
//!
//! Every stage before generation either succeeds or aborts the request with a
//! [`StageError`] naming where it failed. Once generation has opened, the
//! caller owns an [`AnswerStream`]; faults after that point end the stream.

use futures::stream::{FusedStream, Stream, StreamExt};
use rag_core::{
    ConversationMessage, Embed, FragmentStream, GeminiClient, Generate, PipelineConfig, RagConfig,
    RagError, RagResult, Retry, Search,
};
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::context::assemble;
use crate::prompt::compose;

/// Lifecycle of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Embedding,
    Searching,
    AssemblingContext,
    ComposingPrompt,
    Generating,
    Streaming,
    Closed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Embedding => "embedding",
            Self::Searching => "searching",
            Self::AssemblingContext => "assembling_context",
            Self::ComposingPrompt => "composing_prompt",
            Self::Generating => "generating",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure before any output was produced
#[derive(Debug, Error)]
#[error("request failed while {stage}: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: RagError,
}

impl StageError {
    pub fn new(stage: Stage, error: RagError) -> Self {
        Self { stage, error }
    }

    pub fn code(&self) -> &'static str {
        self.error.code()
    }
}

/// How an answer stream reached `Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Faulted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub system_prompt: String,
    pub top_k: usize,
    pub include_metadata: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            top_k: config.top_k,
            include_metadata: config.include_metadata,
        }
    }
}

/// Sequences the capability clients for each request.
///
/// Holds no per-request state, so one instance serves concurrent requests.
pub struct RagPipeline {
    embedder: Arc<dyn Embed>,
    index: Arc<dyn Search>,
    generator: Arc<dyn Generate>,
    settings: PipelineSettings,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embed>,
        index: Arc<dyn Search>,
        generator: Arc<dyn Generate>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            settings,
        }
    }

    /// Wire the Gemini client and the configured index, wrapping embedding
    /// and search in a single retry when `retry.enabled` is set
    pub fn from_config(config: &RagConfig) -> RagResult<Self> {
        let gemini = Arc::new(GeminiClient::new(config.gemini.clone())?);
        let mut embedder: Arc<dyn Embed> = gemini.clone();
        let mut index = rag_index::build_index(&config.index)?;

        if config.retry.enabled {
            let delay = Duration::from_millis(config.retry.delay_ms);
            embedder = Arc::new(Retry::new(gemini.clone(), delay));
            index = Arc::new(Retry::new(index, delay));
        }

        info!(
            embedding_model = %embedder.model_name(),
            generation_model = %Generate::model_name(&gemini),
            index = index.provider_name(),
            top_k = config.pipeline.top_k,
            retry = config.retry.enabled,
            "Pipeline ready"
        );

        Ok(Self::new(
            embedder,
            index,
            gemini,
            PipelineSettings::from(&config.pipeline),
        ))
    }

    /// Run a request up to the point where the answer starts streaming
    pub async fn answer(
        &self,
        history: Vec<ConversationMessage>,
    ) -> Result<AnswerStream, StageError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("rag_request", %request_id);
        self.run(request_id, history).instrument(span).await
    }

    async fn run(
        &self,
        request_id: Uuid,
        history: Vec<ConversationMessage>,
    ) -> Result<AnswerStream, StageError> {
        info!(turns = history.len(), "Received query");
        let question = validate(&history).map_err(|e| abort(Stage::Received, e))?;

        let vector = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| abort(Stage::Embedding, e))?;
        debug!(dimension = vector.len(), "Embedded question");

        let records = self
            .index
            .search(&vector, self.settings.top_k, self.settings.include_metadata)
            .await
            .map_err(|e| abort(Stage::Searching, e))?;
        debug!(records = records.len(), "Search complete");

        let context = assemble(&records);
        debug!(stage = %Stage::AssemblingContext, bytes = context.len(), "Context assembled");

        let prompt = compose(&self.settings.system_prompt, &history, &context)
            .map_err(|e| abort(Stage::ComposingPrompt, e))?;

        let fragments = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| abort(Stage::Generating, e))?;
        info!(
            messages = prompt.len(),
            records = records.len(),
            "Streaming answer"
        );

        Ok(AnswerStream::new(request_id, fragments))
    }
}

fn validate(history: &[ConversationMessage]) -> RagResult<&str> {
    let last = history
        .last()
        .ok_or_else(|| RagError::InvalidInput("conversation history is empty".to_string()))?;
    if last.content.trim().is_empty() {
        return Err(RagError::InvalidInput(
            "the latest message has no content".to_string(),
        ));
    }
    Ok(&last.content)
}

fn abort(stage: Stage, error: RagError) -> StageError {
    warn!(%stage, code = error.code(), error = %error, "Request closed before output");
    StageError::new(stage, error)
}

/// Generated answer fragments for one request.
///
/// Yields fragments in arrival order. A fault is delivered as the final
/// item; dropping the stream early closes the request as cancelled and drops
/// the upstream stream with it.
pub struct AnswerStream {
    request_id: Uuid,
    inner: Option<FragmentStream>,
    fragments: usize,
    outcome: Option<StreamOutcome>,
}

impl AnswerStream {
    pub fn new(request_id: Uuid, inner: FragmentStream) -> Self {
        Self {
            request_id,
            inner: Some(inner),
            fragments: 0,
            outcome: None,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// `None` while still streaming
    pub fn outcome(&self) -> Option<StreamOutcome> {
        self.outcome
    }

    pub fn fragments_sent(&self) -> usize {
        self.fragments
    }

    fn close(&mut self, outcome: StreamOutcome) {
        if self.outcome.is_some() {
            return;
        }
        self.inner = None;
        self.outcome = Some(outcome);
        info!(
            request_id = %self.request_id,
            stage = %Stage::Closed,
            outcome = ?outcome,
            fragments = self.fragments,
            "Answer stream closed"
        );
    }
}

impl Stream for AnswerStream {
    type Item = RagResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(fragment))) => {
                this.fragments += 1;
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                error!(
                    request_id = %this.request_id,
                    code = e.code(),
                    error = %e,
                    "Generation failed mid-stream"
                );
                this.close(StreamOutcome::Faulted);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.close(StreamOutcome::Completed);
                Poll::Ready(None)
            }
        }
    }
}

impl FusedStream for AnswerStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}

impl Drop for AnswerStream {
    fn drop(&mut self) {
        self.close(StreamOutcome::Cancelled);
    }
}

impl fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerStream")
            .field("request_id", &self.request_id)
            .field("fragments", &self.fragments)
            .field("outcome", &self.outcome)
            .finish()
    }
}

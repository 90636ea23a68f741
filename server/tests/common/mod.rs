#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use rag_core::{
    ComposedPrompt, Embed, FragmentStream, Generate, QueryVector, RagError, RagResult,
    RecordMetadata, RetrievedRecord, Search, UpstreamService,
};
use rag_server::{PipelineSettings, RagPipeline};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub type ErrorFactory = fn() -> RagError;

pub fn embedding_unavailable() -> RagError {
    RagError::unavailable(UpstreamService::Embedding, "connection refused")
}

pub fn index_error() -> RagError {
    RagError::http_status(UpstreamService::Index, 500, "internal error")
}

pub fn generation_fault() -> RagError {
    RagError::unavailable(UpstreamService::Generation, "connection reset")
}

pub fn generation_rejected() -> RagError {
    RagError::http_status(UpstreamService::Generation, 429, "quota exceeded")
}

/// Embedder returning a fixed vector, or a scripted failure
#[derive(Default)]
pub struct FakeEmbed {
    pub failure: Option<ErrorFactory>,
    pub calls: AtomicUsize,
}

impl FakeEmbed {
    pub fn failing(failure: ErrorFactory) -> Self {
        Self {
            failure: Some(failure),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embed for FakeEmbed {
    async fn embed(&self, _text: &str) -> RagResult<QueryVector> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(vec![0.1, 0.2, 0.3]),
        }
    }

    fn model_name(&self) -> String {
        "fake-embedding".to_string()
    }
}

/// Index returning canned records in the given order
#[derive(Default)]
pub struct FakeSearch {
    pub records: Vec<RetrievedRecord>,
    pub failure: Option<ErrorFactory>,
    pub calls: AtomicUsize,
}

impl FakeSearch {
    pub fn with_records(records: Vec<RetrievedRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn failing(failure: ErrorFactory) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Search for FakeSearch {
    async fn search(
        &self,
        _vector: &[f32],
        top_k: usize,
        _include_metadata: bool,
    ) -> RagResult<Vec<RetrievedRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        Ok(self.records.iter().take(top_k).cloned().collect())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Sets its flag when the owning stream is dropped
pub struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Generator replaying scripted fragments, then ending, faulting or hanging
#[derive(Default)]
pub struct FakeGenerate {
    pub fragments: Vec<String>,
    pub fault: Option<ErrorFactory>,
    pub open_failure: Option<ErrorFactory>,
    /// Never finish after the scripted fragments
    pub hang: bool,
    pub released: Arc<AtomicBool>,
    pub prompts: Mutex<Vec<ComposedPrompt>>,
}

impl FakeGenerate {
    pub fn answering(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn last_prompt(&self) -> Option<ComposedPrompt> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generate for FakeGenerate {
    async fn generate(&self, prompt: &ComposedPrompt) -> RagResult<FragmentStream> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if let Some(failure) = self.open_failure {
            return Err(failure());
        }

        let mut items: Vec<RagResult<String>> =
            self.fragments.iter().cloned().map(Ok).collect();
        if let Some(fault) = self.fault {
            items.push(Err(fault()));
        }

        let guard = ReleaseGuard(self.released.clone());
        let hang = self.hang;
        let fragments = stream::unfold(
            (items.into_iter(), guard),
            move |(mut items, guard)| async move {
                match items.next() {
                    Some(item) => Some((item, (items, guard))),
                    None if hang => {
                        futures::future::pending::<()>().await;
                        None
                    }
                    None => None,
                }
            },
        );
        Ok(Box::pin(fragments))
    }

    fn model_name(&self) -> String {
        "fake-generation".to_string()
    }
}

pub fn record(id: &str, score: f32, subject: &str, review: &str, stars: f64) -> RetrievedRecord {
    RetrievedRecord::new(
        id,
        score,
        RecordMetadata {
            subject: Some(subject.to_string()),
            review: Some(review.to_string()),
            stars: Some(stars),
            ..RecordMetadata::default()
        },
    )
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        system_prompt: "You are a rate my professor agent.".to_string(),
        top_k: 5,
        include_metadata: true,
    }
}

pub fn pipeline(
    embedder: Arc<FakeEmbed>,
    index: Arc<FakeSearch>,
    generator: Arc<FakeGenerate>,
) -> RagPipeline {
    RagPipeline::new(embedder, index, generator, settings())
}

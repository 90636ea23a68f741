use async_trait::async_trait;
use std::sync::Arc;
use futures::stream::BoxStream;

use crate::errors::RagResult;
use crate::types::{ComposedPrompt, QueryVector, RetrievedRecord};

/// Lazily produced generated text, ended by completion or by a fault.
pub type FragmentStream = BoxStream<'static, RagResult<String>>;

/// Turns text into a query vector
#[async_trait]
pub trait Embed: Send + Sync {
    /// Embed a non-blank string
    async fn embed(&self, text: &str) -> RagResult<QueryVector>;

    /// Get the model name being used
    fn model_name(&self) -> String;
}

/// Nearest-neighbour search over a pre-populated index
#[async_trait]
pub trait Search: Send + Sync {
    /// Return at most `top_k` records in non-increasing score order.
    ///
    /// An empty result is not an error.
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> RagResult<Vec<RetrievedRecord>>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Streams a completion for a composed prompt
#[async_trait]
pub trait Generate: Send + Sync {
    /// Open a generation session.
    ///
    /// Failing to open is reported here, before any fragment exists; faults
    /// after that arrive as the final item of the returned stream.
    async fn generate(&self, prompt: &ComposedPrompt) -> RagResult<FragmentStream>;

    /// Get the model name being used
    fn model_name(&self) -> String;
}

#[async_trait]
impl<T: Embed + ?Sized> Embed for Arc<T> {
    async fn embed(&self, text: &str) -> RagResult<QueryVector> {
        (**self).embed(text).await
    }

    fn model_name(&self) -> String {
        (**self).model_name()
    }
}

#[async_trait]
impl<T: Search + ?Sized> Search for Arc<T> {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> RagResult<Vec<RetrievedRecord>> {
        (**self).search(vector, top_k, include_metadata).await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }
}

#[async_trait]
impl<T: Generate + ?Sized> Generate for Arc<T> {
    async fn generate(&self, prompt: &ComposedPrompt) -> RagResult<FragmentStream> {
        (**self).generate(prompt).await
    }

    fn model_name(&self) -> String {
        (**self).model_name()
    }
}

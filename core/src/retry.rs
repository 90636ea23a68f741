//! Optional single retry around idempotent upstream calls.
//!
//! Only `Embed` and `Search` are wrapped. Generation is never retried: once
//! a fragment has reached the caller a second attempt would duplicate output.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::errors::RagResult;
use crate::traits::{Embed, Search};
use crate::types::{QueryVector, RetrievedRecord};

/// Retries the wrapped client once when the first failure is retryable
#[derive(Debug, Clone)]
pub struct Retry<T> {
    inner: T,
    delay: Duration,
}

impl<T> Retry<T> {
    pub fn new(inner: T, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn twice<'a, R, F, Fut>(&'a self, operation: &str, call: F) -> RagResult<R>
    where
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = RagResult<R>>,
    {
        match call(&self.inner).await {
            Err(e) if e.is_retryable() => {
                warn!(operation, error = %e, delay_ms = self.delay.as_millis() as u64, "Retrying upstream call once");
                tokio::time::sleep(self.delay).await;
                call(&self.inner).await
            }
            result => result,
        }
    }
}

#[async_trait]
impl<T: Embed> Embed for Retry<T> {
    async fn embed(&self, text: &str) -> RagResult<QueryVector> {
        self.twice("embed", |inner| inner.embed(text)).await
    }

    fn model_name(&self) -> String {
        self.inner.model_name()
    }
}

#[async_trait]
impl<T: Search> Search for Retry<T> {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> RagResult<Vec<RetrievedRecord>> {
        self.twice("search", |inner| inner.search(vector, top_k, include_metadata))
            .await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

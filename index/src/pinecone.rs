use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use rag_core::http::{build_http_client, ensure_success};
use rag_core::{
    IndexConfig, RagError, RagResult, RecordMetadata, RetrievedRecord, Search, UpstreamService,
};

use crate::ranking::rank;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Value>,
}

/// Metadata that cannot be read as a record's metadata is dropped, not fatal
fn read_metadata(id: &str, metadata: Option<Value>) -> RecordMetadata {
    match metadata {
        None | Some(Value::Null) => RecordMetadata::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(id, error = %e, "Ignoring unreadable record metadata");
            RecordMetadata::default()
        }),
    }
}

/// Client for a Pinecone serverless index's `/query` endpoint
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: String,
    api_version: String,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig) -> RagResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                RagError::ConfigError("API key is required to query the Pinecone index".to_string())
            })?;
        let host = config
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
            .map(normalize_host)
            .ok_or_else(|| {
                RagError::ConfigError("index.host is required for the pinecone provider".to_string())
            })?;

        let client = build_http_client(config.request_timeout_secs, config.connect_timeout_secs)?;

        Ok(Self {
            client,
            host,
            api_key,
            namespace: config.namespace.clone(),
            api_version: config.api_version.clone(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.host)
    }
}

/// Pinecone hands out bare hostnames; accept those as well as full URLs
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl Search for PineconeIndex {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> RagResult<Vec<RetrievedRecord>> {
        if top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be at least 1".to_string()));
        }
        if vector.is_empty() {
            return Err(RagError::InvalidInput("query vector is empty".to_string()));
        }

        let request = QueryRequest {
            vector,
            top_k,
            include_metadata,
            namespace: &self.namespace,
        };

        let response = self
            .client
            .post(self.query_url())
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::from_reqwest(UpstreamService::Index, e))?;
        let response = ensure_success(UpstreamService::Index, response).await?;

        let body = response.json::<QueryResponse>().await.map_err(|e| {
            RagError::upstream(
                UpstreamService::Index,
                format!("Failed to parse query response: {}", e),
            )
        })?;

        let records = body
            .matches
            .into_iter()
            .map(|m| {
                let metadata = if include_metadata {
                    read_metadata(&m.id, m.metadata)
                } else {
                    RecordMetadata::default()
                };
                RetrievedRecord::new(m.id, m.score, metadata)
            })
            .collect();
        let records = rank(records, top_k);

        debug!(
            namespace = %self.namespace,
            returned = records.len(),
            top_k,
            "Pinecone query complete"
        );
        Ok(records)
    }

    fn provider_name(&self) -> &'static str {
        "pinecone"
    }
}

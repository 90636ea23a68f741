//! In-process index over a JSON snapshot of embedded records.
//!
//! The snapshot is either a bare array of `{id, values, metadata}` objects or
//! the same array under a `vectors` key, which is the shape of a Pinecone
//! upsert payload. Search is an exhaustive cosine scan.

use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use rag_core::{IndexConfig, RagError, RagResult, RecordMetadata, RetrievedRecord, Search};

use crate::ranking::{cosine_similarity, rank};

/// One embedded record as stored in a snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Records(Vec<SnapshotRecord>),
    Upsert { vectors: Vec<SnapshotRecord> },
}

#[derive(Debug, Clone, Default)]
pub struct LocalIndex {
    records: Vec<SnapshotRecord>,
    dimension: Option<usize>,
    min_score: Option<f32>,
}

impl LocalIndex {
    /// Build an index; every record must share one non-zero dimension
    pub fn new(records: Vec<SnapshotRecord>) -> RagResult<Self> {
        let mut dimension = None;
        for record in &records {
            if record.values.is_empty() {
                return Err(RagError::ConfigError(format!(
                    "record '{}' has an empty vector",
                    record.id
                )));
            }
            match dimension {
                None => dimension = Some(record.values.len()),
                Some(expected) if expected != record.values.len() => {
                    return Err(RagError::ConfigError(format!(
                        "record '{}' has dimension {}, expected {}",
                        record.id,
                        record.values.len(),
                        expected
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            records,
            dimension,
            min_score: None,
        })
    }

    /// Drop matches scoring below `min_score`
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn load(path: &Path) -> RagResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!(
                "Failed to read index snapshot {}: {}",
                path.display(),
                e
            ))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
            RagError::ConfigError(format!(
                "Failed to parse index snapshot {}: {}",
                path.display(),
                e
            ))
        })?;
        let records = match snapshot {
            Snapshot::Records(records) => records,
            Snapshot::Upsert { vectors } => vectors,
        };

        let index = Self::new(records)?;
        info!(
            path = %path.display(),
            records = index.len(),
            dimension = ?index.dimension,
            "Loaded local index snapshot"
        );
        Ok(index)
    }

    pub fn from_config(config: &IndexConfig) -> RagResult<Self> {
        let path = config.snapshot_path.as_deref().ok_or_else(|| {
            RagError::ConfigError(
                "index.snapshot_path is required for the local provider".to_string(),
            )
        })?;
        let index = Self::load(path)?;
        Ok(match config.min_score {
            Some(min_score) => index.with_min_score(min_score),
            None => index,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Search for LocalIndex {
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

        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if vector.len() != dimension {
            return Err(RagError::InvalidInput(format!(
                "query vector has dimension {}, index expects {}",
                vector.len(),
                dimension
            )));
        }

        let scored = self
            .records
            .iter()
            .map(|record| (record, cosine_similarity(vector, &record.values)))
            .filter(|(_, score)| self.min_score.map_or(true, |min| *score >= min))
            .map(|(record, score)| {
                let metadata = if include_metadata {
                    record.metadata.clone()
                } else {
                    RecordMetadata::default()
                };
                RetrievedRecord::new(record.id.clone(), score, metadata)
            })
            .collect();
        let records = rank(scored, top_k);

        debug!(returned = records.len(), top_k, "Local index search complete");
        Ok(records)
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(id: &str, values: Vec<f32>, subject: &str) -> SnapshotRecord {
        SnapshotRecord {
            id: id.to_string(),
            values,
            metadata: RecordMetadata {
                subject: Some(subject.to_string()),
                ..RecordMetadata::default()
            },
        }
    }

    fn sample_index() -> LocalIndex {
        LocalIndex::new(vec![
            record("Dr. Emily Johnson", vec![1.0, 0.0, 0.0], "Computer Science"),
            record("Prof. Michael Chen", vec![0.0, 1.0, 0.0], "Physics"),
            record("Dr. Sarah Williams", vec![0.9, 0.1, 0.0], "Computer Science"),
            record("Dr. Robert Brown", vec![0.0, 0.0, 1.0], "History"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = sample_index();
        let results = index.search(&[1.0, 0.0, 0.0], 2, true).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "Dr. Emily Johnson");
        assert_eq!(results[1].id, "Dr. Sarah Williams");
        assert!(results[0].similarity_score >= results[1].similarity_score);
        assert_eq!(
            results[0].metadata.subject.as_deref(),
            Some("Computer Science")
        );
    }

    #[tokio::test]
    async fn test_search_returns_all_when_top_k_exceeds_len() {
        let index = sample_index();
        let results = index.search(&[0.0, 1.0, 0.0], 10, true).await.unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].id, "Prof. Michael Chen");
    }

    #[tokio::test]
    async fn test_search_without_metadata() {
        let index = sample_index();
        let results = index.search(&[1.0, 0.0, 0.0], 1, false).await.unwrap();
        assert_eq!(results[0].metadata, RecordMetadata::default());
    }

    #[tokio::test]
    async fn test_min_score_filters_weak_matches() {
        let index = sample_index().with_min_score(0.5);
        let results = index.search(&[1.0, 0.0, 0.0], 5, true).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["Dr. Emily Johnson", "Dr. Sarah Williams"]);
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = LocalIndex::new(Vec::new()).unwrap();
        assert!(index.is_empty());
        let results = index.search(&[1.0, 2.0], 5, true).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_queries() {
        let index = sample_index();
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 0, true).await,
            Err(RagError::InvalidInput(_))
        ));
        assert!(matches!(
            index.search(&[1.0, 0.0], 3, true).await,
            Err(RagError::InvalidInput(_))
        ));
        assert!(matches!(
            index.search(&[], 3, true).await,
            Err(RagError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_rejects_mixed_dimensions() {
        let result = LocalIndex::new(vec![
            record("a", vec![1.0, 0.0], "Math"),
            record("b", vec![1.0, 0.0, 0.0], "Math"),
        ]);
        assert!(matches!(result, Err(RagError::ConfigError(_))));
    }

    #[test]
    fn test_load_both_snapshot_shapes() {
        let mut bare = NamedTempFile::new().unwrap();
        write!(
            bare,
            r#"[{{"id": "Dr. Lee", "values": [0.1, 0.2], "metadata": {{"subject": "Math", "stars": 4, "review": "Clear."}}}}]"#
        )
        .unwrap();
        let index = LocalIndex::load(bare.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.records[0].metadata.stars, Some(4.0));

        let mut upsert = NamedTempFile::new().unwrap();
        write!(
            upsert,
            r#"{{"vectors": [{{"id": "a", "values": [1.0]}}, {{"id": "b", "values": [0.5]}}]}}"#
        )
        .unwrap();
        let index = LocalIndex::load(upsert.path()).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_from_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": "a", "values": [1.0, 0.0]}}]"#).unwrap();

        let config = IndexConfig {
            snapshot_path: Some(file.path().to_path_buf()),
            min_score: Some(0.2),
            ..IndexConfig::default()
        };
        let index = LocalIndex::from_config(&config).unwrap();
        assert_eq!(index.min_score, Some(0.2));

        let missing = IndexConfig::default();
        assert!(matches!(
            LocalIndex::from_config(&missing),
            Err(RagError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = LocalIndex::load(Path::new("/nonexistent/snapshot.json"));
        assert!(matches!(result, Err(RagError::ConfigError(_))));
    }
}

//! Search index abstraction layer.
//!
//! Pipelines talk to the hosted index through the `SearchIndex` trait so the
//! upload and query paths can run against a mock server in tests.

mod azure;

pub use azure::AzureSearchClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchServiceError;
use crate::models::{
    IndexAction, IndexDefinition, IndexingResult, KEY_FIELD, SearchPage, SearchRequest,
};

/// Statistics for a single index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub document_count: u64,
    #[serde(default)]
    pub storage_size: u64,
    #[serde(default)]
    pub vector_index_size: u64,
}

/// Outcome of pushing a set of actions, across all batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: Vec<IndexingResult>,
}

impl UploadSummary {
    pub fn from_results(results: Vec<IndexingResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            if result.status {
                summary.succeeded += 1;
            } else {
                summary.failed.push(result);
            }
        }
        summary
    }

    /// Every action of a batch the service refused as a whole.
    pub fn rejected(batch: &[IndexAction], error: &SearchServiceError) -> Self {
        let failed = batch
            .iter()
            .enumerate()
            .map(|(i, action)| IndexingResult {
                key: action
                    .key(KEY_FIELD)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("batch item {i}")),
                status: false,
                error_message: Some(error.to_string()),
                status_code: error.status().unwrap_or_default(),
            })
            .collect();
        Self { succeeded: 0, failed }
    }

    pub fn merge(&mut self, other: UploadSummary) {
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.failed.iter().map(|r| r.key.as_str()).collect()
    }
}

/// Operations on one hosted index and its service.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Name of the index this client writes to and queries.
    fn index_name(&self) -> &str;

    async fn create_or_update_index(
        &self,
        definition: &IndexDefinition,
    ) -> Result<IndexDefinition, SearchServiceError>;

    /// Returns None if the index doesn't exist.
    async fn get_index(&self, name: &str) -> Result<Option<IndexDefinition>, SearchServiceError>;

    /// Returns false if there was nothing to delete.
    async fn delete_index(&self, name: &str) -> Result<bool, SearchServiceError>;

    /// Push indexing actions in service-sized batches.
    async fn upload(&self, actions: Vec<IndexAction>) -> Result<UploadSummary, SearchServiceError>;

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchServiceError>;

    async fn document_count(&self) -> Result<u64, SearchServiceError>;

    async fn index_stats(&self) -> Result<IndexStats, SearchServiceError>;

    async fn service_stats(&self) -> Result<serde_json::Value, SearchServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(key: &str, status: bool) -> IndexingResult {
        IndexingResult {
            key: key.to_string(),
            status,
            error_message: (!status).then(|| "failed".to_string()),
            status_code: if status { 200 } else { 400 },
        }
    }

    #[test]
    fn test_upload_summary_counts() {
        let mut summary = UploadSummary::from_results(vec![result("1", true), result("2", false)]);
        summary.merge(UploadSummary::from_results(vec![result("3", true)]));
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed_keys(), vec!["2"]);
    }
}

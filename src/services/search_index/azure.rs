use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{IndexStats, SearchIndex, UploadSummary};
use crate::error::SearchServiceError;
use crate::models::{
    Environment, IndexAction, IndexDefinition, IndexingResult, SearchPage, SearchRequest,
    SearchServiceConfig,
};
use crate::utils::retry::{RetryConfig, retry};

enum Reply {
    Body(String),
    NotFound,
}

/// Which error variant a failed request maps to.
#[derive(Clone, Copy)]
enum Operation {
    Index,
    Upload,
    Query,
}

impl Operation {
    fn error(self, status: Option<u16>, message: String) -> SearchServiceError {
        match self {
            Operation::Index => SearchServiceError::IndexError { status, message },
            Operation::Upload => SearchServiceError::UploadError { status, message },
            Operation::Query => SearchServiceError::QueryError { status, message },
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexingResponse {
    value: Vec<IndexingResult>,
}

/// REST client for an Azure Cognitive Search service, bound to one index.
#[derive(Debug, Clone)]
pub struct AzureSearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    index_name: String,
    batch_size: usize,
    retry: RetryConfig,
}

impl AzureSearchClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        index_name: &str,
        config: &SearchServiceConfig,
        retry: RetryConfig,
    ) -> Result<Self, SearchServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchServiceError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_version: config.api_version.clone(),
            index_name: index_name.to_string(),
            batch_size: config.upload_batch_size.max(1),
            retry,
        })
    }

    /// Client for the environment's endpoint, key and index.
    pub fn from_env(
        env: &Environment,
        config: &SearchServiceConfig,
        retry: RetryConfig,
    ) -> Result<Self, SearchServiceError> {
        let endpoint = env.search_endpoint()?;
        let api_key = env.search_key()?;
        Self::new(endpoint, api_key, &env.index_name, config, retry)
    }

    /// Same service and credentials, different index.
    pub fn with_index(&self, index_name: &str) -> Self {
        Self {
            index_name: index_name.to_string(),
            ..self.clone()
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoint,
            path.trim_start_matches('/'),
            self.api_version
        )
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        operation: Operation,
    ) -> Result<Reply, SearchServiceError> {
        let url = self.url(path);
        retry(&self.retry, || {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("api-key", &self.api_key);
            if let Some(body) = body {
                request = request.json(body);
            }

            async move {
                let response = request.send().await.map_err(|e| {
                    if e.is_timeout() || e.is_connect() {
                        SearchServiceError::ConnectionError(e.to_string())
                    } else {
                        operation.error(e.status().map(|s| s.as_u16()), e.to_string())
                    }
                })?;

                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(Reply::NotFound);
                }
                let text = response
                    .text()
                    .await
                    .map_err(|e| SearchServiceError::InvalidResponse(e.to_string()))?;
                if !status.is_success() {
                    return Err(operation.error(Some(status.as_u16()), text));
                }
                Ok(Reply::Body(text))
            }
        })
        .await
    }

    fn missing_index(&self) -> SearchServiceError {
        SearchServiceError::IndexNotFound(self.index_name.clone())
    }

    async fn upload_batch(
        &self,
        batch: &[IndexAction],
    ) -> Result<Vec<IndexingResult>, SearchServiceError> {
        let body = json!({ "value": batch });
        let path = format!("indexes/{}/docs/index", self.index_name);
        match self
            .send(Method::POST, &path, Some(&body), Operation::Upload)
            .await?
        {
            Reply::Body(text) => {
                let parsed: IndexingResponse = serde_json::from_str(&text)?;
                Ok(parsed.value)
            }
            Reply::NotFound => Err(self.missing_index()),
        }
    }
}

#[async_trait]
impl SearchIndex for AzureSearchClient {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn create_or_update_index(
        &self,
        definition: &IndexDefinition,
    ) -> Result<IndexDefinition, SearchServiceError> {
        let body = serde_json::to_value(definition)?;
        let path = format!("indexes/{}", definition.name);
        match self
            .send(Method::PUT, &path, Some(&body), Operation::Index)
            .await?
        {
            // 204 when an existing index was updated in place
            Reply::Body(text) if text.trim().is_empty() => Ok(definition.clone()),
            Reply::Body(text) => Ok(serde_json::from_str(&text)?),
            Reply::NotFound => Err(SearchServiceError::IndexNotFound(definition.name.clone())),
        }
    }

    async fn get_index(&self, name: &str) -> Result<Option<IndexDefinition>, SearchServiceError> {
        let path = format!("indexes/{name}");
        match self
            .send(Method::GET, &path, None, Operation::Index)
            .await?
        {
            Reply::Body(text) => Ok(Some(serde_json::from_str(&text)?)),
            Reply::NotFound => Ok(None),
        }
    }

    async fn delete_index(&self, name: &str) -> Result<bool, SearchServiceError> {
        let path = format!("indexes/{name}");
        match self
            .send(Method::DELETE, &path, None, Operation::Index)
            .await?
        {
            Reply::Body(_) => Ok(true),
            Reply::NotFound => Ok(false),
        }
    }

    async fn upload(&self, actions: Vec<IndexAction>) -> Result<UploadSummary, SearchServiceError> {
        let mut summary = UploadSummary::default();
        for batch in actions.chunks(self.batch_size) {
            let batch_summary = match self.upload_batch(batch).await {
                Ok(results) => UploadSummary::from_results(results),
                Err(e @ SearchServiceError::IndexNotFound(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        index = %self.index_name,
                        documents = batch.len(),
                        error = %e,
                        "batch rejected"
                    );
                    UploadSummary::rejected(batch, &e)
                }
            };
            if !batch_summary.failed.is_empty() {
                tracing::warn!(
                    index = %self.index_name,
                    failed = batch_summary.failed.len(),
                    "some documents were rejected"
                );
            }
            summary.merge(batch_summary);
        }
        Ok(summary)
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchServiceError> {
        let body = serde_json::to_value(request)?;
        let path = format!("indexes/{}/docs/search", self.index_name);
        match self
            .send(Method::POST, &path, Some(&body), Operation::Query)
            .await?
        {
            Reply::Body(text) => Ok(serde_json::from_str(&text)?),
            Reply::NotFound => Err(self.missing_index()),
        }
    }

    async fn document_count(&self) -> Result<u64, SearchServiceError> {
        let path = format!("indexes/{}/docs/$count", self.index_name);
        match self
            .send(Method::GET, &path, None, Operation::Query)
            .await?
        {
            Reply::Body(text) => text
                .trim()
                .trim_start_matches('\u{feff}')
                .parse()
                .map_err(|_| SearchServiceError::InvalidResponse(format!("bad count: {text}"))),
            Reply::NotFound => Err(self.missing_index()),
        }
    }

    async fn index_stats(&self) -> Result<IndexStats, SearchServiceError> {
        let path = format!("indexes/{}/stats", self.index_name);
        match self
            .send(Method::GET, &path, None, Operation::Index)
            .await?
        {
            Reply::Body(text) => Ok(serde_json::from_str(&text)?),
            Reply::NotFound => Err(self.missing_index()),
        }
    }

    async fn service_stats(&self) -> Result<serde_json::Value, SearchServiceError> {
        match self
            .send(Method::GET, "servicestats", None, Operation::Index)
            .await?
        {
            Reply::Body(text) => Ok(serde_json::from_str(&text)?),
            Reply::NotFound => Err(SearchServiceError::InvalidResponse(
                "service statistics unavailable".to_string(),
            )),
        }
    }
}

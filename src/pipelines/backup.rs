//! Copy every document of one index into a fresh index, possibly on another service.

use std::sync::Arc;

use crate::error::{AppError, SearchServiceError};
use crate::models::{Environment, IndexAction, RunReport, SearchRequest, SearchServiceConfig};
use crate::services::{AzureSearchClient, SearchIndex};
use crate::utils::retry::RetryConfig;

use super::admin::MAX_SKIP;

/// Where to copy from and to. Missing endpoints and keys fall back to the environment.
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub source_index: String,
    pub target_index: String,
    pub source_endpoint: Option<String>,
    pub source_key: Option<String>,
    pub target_endpoint: Option<String>,
    pub target_key: Option<String>,
}

impl BackupOptions {
    pub fn clients(
        &self,
        env: &Environment,
        config: &SearchServiceConfig,
        retry: RetryConfig,
    ) -> Result<(AzureSearchClient, AzureSearchClient), AppError> {
        let endpoint = |explicit: &Option<String>| -> Result<String, AppError> {
            match explicit {
                Some(e) => Ok(e.clone()),
                None => Ok(env.search_endpoint()?.to_string()),
            }
        };
        let key = |explicit: &Option<String>| -> Result<String, AppError> {
            match explicit {
                Some(k) => Ok(k.clone()),
                None => Ok(env.search_key()?.to_string()),
            }
        };

        let source = AzureSearchClient::new(
            &endpoint(&self.source_endpoint)?,
            &key(&self.source_key)?,
            &self.source_index,
            config,
            retry.clone(),
        )?;
        let target = AzureSearchClient::new(
            &endpoint(&self.target_endpoint)?,
            &key(&self.target_key)?,
            &self.target_index,
            config,
            retry,
        )?;
        Ok((source, target))
    }
}

pub struct IndexBackup {
    source: Arc<dyn SearchIndex>,
    target: Arc<dyn SearchIndex>,
    page_size: u32,
}

impl IndexBackup {
    pub fn new(source: Arc<dyn SearchIndex>, target: Arc<dyn SearchIndex>, page_size: usize) -> Self {
        Self {
            source,
            target,
            page_size: page_size.clamp(1, 1000) as u32,
        }
    }

    /// Copy one page; returns how many documents it held and the key of the last one.
    async fn copy_page(
        &self,
        request: &SearchRequest,
        key: &str,
        report: &mut RunReport,
    ) -> Result<(usize, Option<String>), AppError> {
        let page = self.source.search(request).await?;
        let received = page.hits.len();
        if received == 0 {
            return Ok((0, None));
        }
        let last_key = page.hits.last().and_then(|hit| hit.field_str(key)).map(str::to_string);

        let actions = page
            .hits
            .iter()
            .map(|hit| IndexAction::upload(hit.clean_document()))
            .collect();
        let summary = self.target.upload(actions).await?;
        report.succeeded += summary.succeeded;
        for failed in summary.failed {
            tracing::error!(key = %failed.key, error = ?failed.error_message, "document not copied");
            report.fail(failed.key, failed.error_message.unwrap_or_default());
        }
        tracing::info!(received, copied = report.succeeded, "copied page");
        Ok((received, last_key))
    }

    pub async fn run(&self) -> Result<RunReport, AppError> {
        let source_name = self.source.index_name().to_string();
        let definition = self
            .source
            .get_index(&source_name)
            .await?
            .ok_or_else(|| SearchServiceError::IndexNotFound(source_name.clone()))?;
        let key = definition
            .key_field()
            .cloned()
            .ok_or_else(|| AppError::Other(format!("index {source_name} has no key field")))?;

        let hidden = definition.non_retrievable_fields();
        if !hidden.is_empty() {
            tracing::warn!(fields = ?hidden, "fields are not retrievable and will not be copied");
        }

        let target_name = self.target.index_name().to_string();
        self.target
            .create_or_update_index(&definition.renamed(&target_name))
            .await?;

        let mut report = RunReport::new("backup").with_target(format!("{source_name} -> {target_name}"));
        report.total = self.source.document_count().await? as usize;
        tracing::info!(documents = report.total, source = %source_name, target = %target_name, "starting backup");

        let base = SearchRequest::text("*").with_top(self.page_size);
        if key.sortable.unwrap_or(false) && key.filterable.unwrap_or(false) {
            let mut last: Option<String> = None;
            loop {
                let filter = last.as_ref().map(|k| format!("{} gt '{}'", key.name, k.replace('\'', "''")));
                let request = base.clone().with_order_by(format!("{} asc", key.name)).with_filter(filter);
                let (received, last_key) = self.copy_page(&request, &key.name, &mut report).await?;
                if received < self.page_size as usize || last_key.is_none() {
                    break;
                }
                last = last_key;
            }
        } else {
            tracing::warn!(key = %key.name, "key is not sortable and filterable; copying at most {MAX_SKIP} documents");
            let mut skip = 0u32;
            while skip < MAX_SKIP {
                let request = base.clone().with_skip(skip);
                let (received, _) = self.copy_page(&request, &key.name, &mut report).await?;
                if received < self.page_size as usize {
                    break;
                }
                skip += self.page_size;
            }
            if report.total > MAX_SKIP as usize {
                report.note(format!("only the first {MAX_SKIP} documents can be copied without a sortable key"));
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use serde_json::{Map, json};

    use crate::models::{
        ActionKind, Brand, FieldDefinition, IndexDefinition, Language, SearchHit, SearchPage, Stage,
        default_schema,
    };
    use crate::services::uploader::testing::RecordingIndex;
    use crate::services::{IndexStats, UploadSummary};

    /// Source index serving fixed pages and a fixed definition.
    struct SourceIndex {
        definition: Option<IndexDefinition>,
        inner: RecordingIndex,
    }

    #[async_trait]
    impl SearchIndex for SourceIndex {
        fn index_name(&self) -> &str {
            "source"
        }
        async fn create_or_update_index(&self, d: &IndexDefinition) -> Result<IndexDefinition, SearchServiceError> {
            Ok(d.clone())
        }
        async fn get_index(&self, _name: &str) -> Result<Option<IndexDefinition>, SearchServiceError> {
            Ok(self.definition.clone())
        }
        async fn delete_index(&self, _name: &str) -> Result<bool, SearchServiceError> {
            Ok(true)
        }
        async fn upload(&self, actions: Vec<IndexAction>) -> Result<UploadSummary, SearchServiceError> {
            self.inner.upload(actions).await
        }
        async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchServiceError> {
            self.inner.search(request).await
        }
        async fn document_count(&self) -> Result<u64, SearchServiceError> {
            Ok(3)
        }
        async fn index_stats(&self) -> Result<IndexStats, SearchServiceError> {
            Ok(IndexStats::default())
        }
        async fn service_stats(&self) -> Result<serde_json::Value, SearchServiceError> {
            Ok(json!({}))
        }
    }

    fn page(ids: &[&str]) -> SearchPage {
        SearchPage {
            count: None,
            hits: ids
                .iter()
                .map(|id| {
                    let mut document = Map::new();
                    document.insert("ArticleId".into(), json!(id));
                    document.insert("@search.score".into(), json!(1.0));
                    SearchHit {
                        score: 1.0,
                        reranker_score: None,
                        document,
                    }
                })
                .collect(),
        }
    }

    fn source(definition: Option<IndexDefinition>, pages: Vec<SearchPage>) -> Arc<SourceIndex> {
        let inner = RecordingIndex::named("source");
        *inner.pages.lock().unwrap() = pages;
        Arc::new(SourceIndex { definition, inner })
    }

    #[tokio::test]
    async fn test_backup_pages_by_key() {
        let source = source(
            Some(default_schema("source", 4)),
            vec![page(&["1", "2"]), page(&["3"])],
        );
        let target = Arc::new(RecordingIndex::named("target"));
        let backup = IndexBackup::new(source.clone(), target.clone(), 2);

        let report = backup.run().await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 3);
        assert_eq!(target.keys(ActionKind::Upload), vec!["1", "2", "3"]);

        let requests = source.inner.requests.lock().unwrap();
        assert_eq!(requests[0].filter, None);
        assert_eq!(requests[1].filter.as_deref(), Some("ArticleId gt '2'"));
        assert_eq!(requests[1].orderby.as_deref(), Some("ArticleId asc"));

        let actions = target.actions.lock().unwrap();
        assert!(!actions[0].document.contains_key("@search.score"));
    }

    #[tokio::test]
    async fn test_backup_skip_pages_without_sortable_key() {
        let mut definition = default_schema("source", 4);
        definition.fields[0] = FieldDefinition {
            key: Some(true),
            ..FieldDefinition::simple("ArticleId", "Edm.String")
        };
        let source = source(Some(definition), vec![page(&["1", "2"]), page(&["3"])]);
        let target = Arc::new(RecordingIndex::named("target"));

        let report = IndexBackup::new(source.clone(), target, 2).run().await.unwrap();
        assert_eq!(report.succeeded, 3);
        let requests = source.inner.requests.lock().unwrap();
        assert_eq!(requests[1].skip, Some(2));
    }

    #[tokio::test]
    async fn test_backup_missing_source_index() {
        let target = Arc::new(RecordingIndex::named("target"));
        let backup = IndexBackup::new(source(None, Vec::new()), target, 10);
        let err = backup.run().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Search(SearchServiceError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_options_fall_back_to_environment() {
        let env = Environment::resolve(
            Stage::Dev,
            Brand::Clo3d,
            Language::English,
            std::path::Path::new("data"),
            |name| match name {
                "AZURE_SEARCH_ENDPOINT" => Some("https://kb.search.windows.net".to_string()),
                "AZURE_SEARCH_KEY" => Some("secret".to_string()),
                _ => None,
            },
        );
        let options = BackupOptions {
            source_index: "a".into(),
            target_index: "b".into(),
            target_endpoint: Some("https://backup.search.windows.net".into()),
            ..Default::default()
        };
        let (source, target) = options
            .clients(&env, &SearchServiceConfig::default(), RetryConfig::new(1))
            .unwrap();
        assert_eq!(source.endpoint(), "https://kb.search.windows.net");
        assert_eq!(target.endpoint(), "https://backup.search.windows.net");
        assert_eq!(target.index_name(), "b");
    }
}

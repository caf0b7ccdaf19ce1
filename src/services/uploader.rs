//! Embedding documents and pushing them into the index.

use std::sync::Arc;

use crate::error::{AppError, LlmError};
use crate::models::{IndexAction, KEY_FIELD, RunReport, SearchDocument};
use crate::services::openai::LanguageModel;
use crate::services::search_index::SearchIndex;

/// Fills the title and content vectors of a document.
#[derive(Clone)]
pub struct Vectorizer {
    model: Arc<dyn LanguageModel>,
}

impl Vectorizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn vectorize(&self, mut document: SearchDocument) -> Result<SearchDocument, LlmError> {
        if document.content.trim().is_empty() {
            document.content = document.title.clone();
        }
        let title_text = if document.title.trim().is_empty() {
            document.content.as_str()
        } else {
            document.title.as_str()
        };

        let title_vector = self.model.embed(title_text).await?;
        let content_vector = self.model.embed(document.embedding_text()).await?;
        document.title_vector = Some(title_vector);
        document.content_vector = Some(content_vector);
        Ok(document)
    }
}

/// Vectorizes documents and writes them to one index with `mergeOrUpload`.
#[derive(Clone)]
pub struct Uploader {
    index: Arc<dyn SearchIndex>,
    vectorizer: Vectorizer,
}

impl Uploader {
    pub fn new(index: Arc<dyn SearchIndex>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            index,
            vectorizer: Vectorizer::new(model),
        }
    }

    pub fn index_name(&self) -> &str {
        self.index.index_name()
    }

    /// Documents that cannot be embedded are logged and counted as failures; the rest are uploaded.
    pub async fn upload_documents(
        &self,
        documents: Vec<SearchDocument>,
    ) -> Result<RunReport, AppError> {
        let mut report = RunReport::new("upload").with_target(self.index.index_name());
        report.total = documents.len();

        let mut actions = Vec::with_capacity(documents.len());
        for document in documents {
            let key = document.article_id.clone();
            match self.vectorizer.vectorize(document).await {
                Ok(vectorized) => {
                    let action = IndexAction::merge_or_upload(&vectorized)
                        .map_err(|e| AppError::Other(e.to_string()))?;
                    actions.push(action);
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "failed to embed document");
                    report.fail(key, e);
                }
            }
        }

        if actions.is_empty() {
            return Ok(report);
        }

        let summary = self.index.upload(actions).await?;
        report.succeeded = summary.succeeded;
        for failed in summary.failed {
            let message = failed
                .error_message
                .unwrap_or_else(|| format!("status {}", failed.status_code));
            tracing::error!(key = %failed.key, error = %message, "document rejected by index");
            report.fail(failed.key, message);
        }
        Ok(report)
    }

    /// Remove documents by key.
    pub async fn delete_keys(&self, keys: &[String]) -> Result<RunReport, AppError> {
        let mut report = RunReport::new("delete").with_target(self.index.index_name());
        report.total = keys.len();
        if keys.is_empty() {
            return Ok(report);
        }

        let actions = keys
            .iter()
            .map(|key| IndexAction::delete(KEY_FIELD, key.clone()))
            .collect();
        let summary = self.index.upload(actions).await?;
        report.succeeded = summary.succeeded;
        for failed in summary.failed {
            report.fail(
                failed.key,
                failed.error_message.unwrap_or_else(|| "rejected".to_string()),
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory doubles shared by service and pipeline tests.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{LlmError, SearchServiceError};
    use crate::models::{
        ActionKind, IndexAction, IndexDefinition, IndexingResult, SearchPage, SearchRequest,
    };
    use crate::services::openai::LanguageModel;
    use crate::services::search_index::{IndexStats, SearchIndex, UploadSummary};

    /// Embeds every text as `[len]`; chat echoes a fixed reply.
    pub struct FakeModel {
        pub reply: String,
    }

    impl Default for FakeModel {
        fn default() -> Self {
            Self {
                reply: "summary".to_string(),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for FakeModel {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            if text.contains("poison") {
                return Err(LlmError::InvalidInput("poisoned".to_string()));
            }
            Ok(vec![text.len() as f32])
        }

        async fn chat(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Ok(self.reply.clone())
        }
    }

    /// Records every action; rejects keys listed in `reject`.
    #[derive(Default)]
    pub struct RecordingIndex {
        pub name: String,
        pub actions: Mutex<Vec<IndexAction>>,
        pub reject: Vec<String>,
        pub pages: Mutex<Vec<SearchPage>>,
        pub requests: Mutex<Vec<SearchRequest>>,
    }

    impl RecordingIndex {
        pub fn named(name: &str) -> Self {
            Self {
                name: name.to_string(),
                ..Default::default()
            }
        }

        pub fn keys(&self, kind: ActionKind) -> Vec<String> {
            self.actions
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.action == kind)
                .filter_map(|a| a.key("ArticleId").map(str::to_string))
                .collect()
        }
    }

    #[async_trait]
    impl SearchIndex for RecordingIndex {
        fn index_name(&self) -> &str {
            &self.name
        }

        async fn create_or_update_index(
            &self,
            definition: &IndexDefinition,
        ) -> Result<IndexDefinition, SearchServiceError> {
            Ok(definition.clone())
        }

        async fn get_index(&self, _name: &str) -> Result<Option<IndexDefinition>, SearchServiceError> {
            Ok(None)
        }

        async fn delete_index(&self, _name: &str) -> Result<bool, SearchServiceError> {
            Ok(true)
        }

        async fn upload(&self, actions: Vec<IndexAction>) -> Result<UploadSummary, SearchServiceError> {
            let results = actions
                .iter()
                .map(|a| {
                    let key = a.key("ArticleId").unwrap_or_default().to_string();
                    let ok = !self.reject.contains(&key);
                    IndexingResult {
                        key,
                        status: ok,
                        error_message: (!ok).then(|| "rejected".to_string()),
                        status_code: if ok { 200 } else { 400 },
                    }
                })
                .collect();
            self.actions.lock().unwrap().extend(actions);
            Ok(UploadSummary::from_results(results))
        }

        async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchServiceError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(SearchPage::default())
            } else {
                Ok(pages.remove(0))
            }
        }

        async fn document_count(&self) -> Result<u64, SearchServiceError> {
            Ok(self.actions.lock().unwrap().len() as u64)
        }

        async fn index_stats(&self) -> Result<IndexStats, SearchServiceError> {
            Ok(IndexStats::default())
        }

        async fn service_stats(&self) -> Result<serde_json::Value, SearchServiceError> {
            Ok(serde_json::json!({}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeModel, RecordingIndex};
    use super::*;
    use crate::models::ActionKind;

    #[tokio::test]
    async fn test_vectorize_falls_back_to_title() {
        let vectorizer = Vectorizer::new(Arc::new(FakeModel::default()));
        let doc = vectorizer
            .vectorize(SearchDocument::new("1", "Title", "", "S"))
            .await
            .unwrap();
        assert_eq!(doc.content, "Title");
        assert_eq!(doc.content_vector, Some(vec![5.0]));
        assert_eq!(doc.title_vector, Some(vec![5.0]));
    }

    #[tokio::test]
    async fn test_upload_counts_embed_and_index_failures() {
        let index = Arc::new(RecordingIndex {
            name: "idx".to_string(),
            reject: vec!["3".to_string()],
            ..Default::default()
        });
        let uploader = Uploader::new(index.clone(), Arc::new(FakeModel::default()));

        let report = uploader
            .upload_documents(vec![
                SearchDocument::new("1", "a", "b", "s"),
                SearchDocument::new("2", "a", "poison", "s"),
                SearchDocument::new("3", "a", "c", "s"),
            ])
            .await
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(index.keys(ActionKind::MergeOrUpload), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_delete_keys() {
        let index = Arc::new(RecordingIndex::named("idx"));
        let uploader = Uploader::new(index.clone(), Arc::new(FakeModel::default()));
        let report = uploader
            .delete_keys(&["7".to_string(), "8".to_string()])
            .await
            .unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(index.keys(ActionKind::Delete), vec!["7", "8"]);
    }
}

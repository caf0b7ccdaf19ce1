//! Index administration and ad-hoc queries.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, SearchServiceError};
use crate::models::{
    IndexAction, IndexDefinition, KEY_FIELD, QueryKind, RunReport, SearchMode, SearchPage,
    SearchRequest, default_schema,
};
use crate::services::{IndexStats, LanguageModel, SearchIndex, read_json, write_json};
use crate::sources::ZendeskClient;

/// Fields written by `export`.
pub const EXPORT_FIELDS: &str = "ArticleId,Title,Content,Source,YoutubeLinks";

/// Azure rejects `$skip` beyond this.
pub const MAX_SKIP: u32 = 100_000;

const POSTS_PATH: &str = "/community/posts/";

/// A document as written to the export file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportedDocument {
    #[serde(default)]
    pub article_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub youtube_links: Vec<String>,
}

impl ExportedDocument {
    fn from_hit(mut document: Map<String, Value>) -> Result<Self, serde_json::Error> {
        document.retain(|_, v| !v.is_null());
        let mut exported: Self = serde_json::from_value(Value::Object(document))?;
        exported.title = exported.title.trim().to_string();
        exported.content = exported.content.trim().to_string();
        exported.source = exported.source.trim().to_string();
        Ok(exported)
    }

    pub fn is_post(&self) -> bool {
        self.source.contains(POSTS_PATH)
    }

    /// URL up to its last `/`.
    pub fn source_prefix(&self) -> &str {
        match self.source.rfind('/') {
            Some(i) => &self.source[..i],
            None => &self.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub prefix: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub index_name: String,
    pub stats: IndexStats,
    pub service: Value,
}

/// Documents per source prefix.
pub fn source_breakdown(documents: &[ExportedDocument]) -> Vec<SourceCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for document in documents {
        *counts.entry(document.source_prefix()).or_default() += 1;
    }
    let mut breakdown: Vec<SourceCount> = counts
        .into_iter()
        .map(|(prefix, count)| SourceCount {
            prefix: prefix.to_string(),
            count,
        })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.prefix.cmp(&b.prefix)));
    breakdown
}

/// Sources in `dev` that `prod` lacks, sorted and unique.
pub fn missing_sources(dev: &[ExportedDocument], prod: &[ExportedDocument]) -> Vec<String> {
    let prod_sources: BTreeSet<&str> = prod.iter().map(|d| d.source.as_str()).collect();
    dev.iter()
        .map(|d| d.source.as_str())
        .filter(|s| !prod_sources.contains(s))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn read_export(path: &Path) -> Result<Vec<ExportedDocument>, AppError> {
    Ok(read_json(path)?)
}

/// Operations on one index.
pub struct IndexAdmin {
    index: Arc<dyn SearchIndex>,
    model: Option<Arc<dyn LanguageModel>>,
    page_size: u32,
}

impl IndexAdmin {
    pub fn new(index: Arc<dyn SearchIndex>, page_size: usize) -> Self {
        Self {
            index,
            model: None,
            page_size: page_size.clamp(1, 1000) as u32,
        }
    }

    /// Needed for vector, hybrid and semantic queries.
    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn index_name(&self) -> &str {
        self.index.index_name()
    }

    pub async fn create_index(&self, name: &str, dimensions: u32) -> Result<IndexDefinition, AppError> {
        let definition = default_schema(name, dimensions);
        let created = self.index.create_or_update_index(&definition).await?;
        tracing::info!(index = %created.name, "index created");
        Ok(created)
    }

    /// Returns false when the index did not exist.
    pub async fn drop_index(&self) -> Result<bool, AppError> {
        Ok(self.index.delete_index(self.index.index_name()).await?)
    }

    /// Every match for `text` in `fields` (all terms required), paged to the end.
    pub async fn find(
        &self,
        fields: Option<String>,
        text: &str,
        select: Option<String>,
    ) -> Result<Vec<Map<String, Value>>, AppError> {
        let mut documents = Vec::new();
        let mut skip = 0u32;
        loop {
            let request = SearchRequest::text(text)
                .with_fields(fields.clone())
                .with_select(select.clone())
                .with_mode(SearchMode::All)
                .with_top(self.page_size)
                .with_skip(skip);
            let page = self.index.search(&request).await?;
            let received = page.hits.len() as u32;
            documents.extend(page.hits.iter().map(|hit| hit.clean_document()));

            skip += received;
            if received < self.page_size || skip >= MAX_SKIP {
                break;
            }
        }
        Ok(documents)
    }

    /// Delete every document matching the query.
    pub async fn delete_documents(&self, fields: Option<String>, text: &str) -> Result<RunReport, AppError> {
        let matches = self.find(fields, text, Some(KEY_FIELD.to_string())).await?;
        let keys: Vec<String> = matches
            .iter()
            .filter_map(|doc| doc.get(KEY_FIELD))
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect();
        self.delete_keys(&keys).await
    }

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
            report.fail(failed.key, failed.error_message.unwrap_or_default());
        }
        Ok(report)
    }

    /// Write matching documents to `path`. Hits that do not fit the export shape are reported, not written.
    pub async fn export(&self, fields: Option<String>, text: &str, path: &Path) -> Result<RunReport, AppError> {
        let mut report = RunReport::new("export").with_target(self.index.index_name());
        let matches = self.find(fields, text, Some(EXPORT_FIELDS.to_string())).await?;
        report.total = matches.len();

        let mut documents = Vec::with_capacity(matches.len());
        for hit in matches {
            let key = hit
                .get(KEY_FIELD)
                .and_then(Value::as_str)
                .unwrap_or("<no key>")
                .to_string();
            match ExportedDocument::from_hit(hit) {
                Ok(document) => documents.push(document),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping malformed document");
                    report.fail(key, e);
                }
            }
        }

        write_json(path, &documents)?;
        report.succeeded = documents.len();
        report.note(format!("written to {}", path.display()));
        Ok(report)
    }

    /// Delete exported community posts created before `cutoff`.
    pub async fn delete_posts_before(
        &self,
        export: &[ExportedDocument],
        zendesk: &ZendeskClient,
        cutoff: DateTime<Utc>,
    ) -> Result<RunReport, AppError> {
        let mut report = RunReport::new("delete posts").with_target(self.index.index_name());
        let mut stale = Vec::new();

        for document in export.iter().filter(|d| d.is_post()) {
            report.total += 1;
            let Ok(post_id) = document.article_id.parse::<u64>() else {
                report.fail(document.article_id.clone(), "not a post id");
                continue;
            };
            let post = match zendesk.post(post_id).await {
                Ok(post) => post,
                Err(e) => {
                    tracing::error!(post = post_id, error = %e, "failed to fetch post");
                    report.fail(document.article_id.clone(), e);
                    continue;
                }
            };
            let created = match DateTime::parse_from_rfc3339(&post.created_at) {
                Ok(created) => created,
                Err(e) => {
                    tracing::error!(post = post_id, created_at = %post.created_at, error = %e, "unreadable post date");
                    report.fail(document.article_id.clone(), format!("created_at {:?}: {e}", post.created_at));
                    continue;
                }
            };
            if created.with_timezone(&Utc) < cutoff {
                tracing::info!(post = post_id, created_at = %post.created_at, "deleting stale post");
                stale.push(document.article_id.clone());
            } else {
                report.skipped += 1;
            }
        }

        let deleted = self.delete_keys(&stale).await?;
        report.succeeded = deleted.succeeded;
        report.failures.extend(deleted.failures);
        Ok(report)
    }

    pub async fn search(&self, kind: QueryKind, query: &str, top: u32) -> Result<SearchPage, AppError> {
        let vector = if kind.needs_embedding() {
            let model = self.model.as_ref().ok_or_else(|| {
                AppError::Other(format!("{kind:?} search needs the language model"))
            })?;
            Some(model.embed(query).await?)
        } else {
            None
        };
        let request = SearchRequest::for_kind(kind, query, vector, top);
        Ok(self.index.search(&request).await?)
    }

    pub async fn status(&self) -> Result<IndexStatus, AppError> {
        let stats = match self.index.index_stats().await {
            Ok(stats) => stats,
            Err(SearchServiceError::IndexNotFound(name)) => {
                tracing::warn!(index = %name, "index does not exist");
                IndexStats::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(IndexStatus {
            index_name: self.index.index_name().to_string(),
            stats,
            service: self.index.service_stats().await?,
        })
    }
}

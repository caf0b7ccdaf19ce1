//! Documents as they are stored in the search index, and the actions that write them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const KEY_FIELD: &str = "ArticleId";

/// A document in the index schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchDocument {
    pub article_id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub youtube_links: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_vector: Option<Vec<f32>>,
}

impl SearchDocument {
    pub fn new(
        article_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            title: title.into(),
            content: content.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_youtube_links(mut self, links: Vec<String>) -> Self {
        self.youtube_links = links;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Text that gets embedded for the content vector. Falls back to the title.
    pub fn embedding_text(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.title
        } else {
            &self.content
        }
    }
}

/// Value of `@search.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Upload,
    Merge,
    MergeOrUpload,
    Delete,
}

/// One entry of an indexing batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexAction {
    #[serde(rename = "@search.action")]
    pub action: ActionKind,
    #[serde(flatten)]
    pub document: Map<String, Value>,
}

impl IndexAction {
    pub fn merge_or_upload(document: &SearchDocument) -> Result<Self, serde_json::Error> {
        Ok(Self {
            action: ActionKind::MergeOrUpload,
            document: to_map(document)?,
        })
    }

    /// Raw upload of an arbitrary document, used when copying between indexes.
    pub fn upload(document: Map<String, Value>) -> Self {
        Self {
            action: ActionKind::Upload,
            document,
        }
    }

    pub fn delete(key_field: &str, key: impl Into<String>) -> Self {
        let mut document = Map::new();
        document.insert(key_field.to_string(), Value::String(key.into()));
        Self {
            action: ActionKind::Delete,
            document,
        }
    }

    /// Key value of the document, when present as a string.
    pub fn key(&self, key_field: &str) -> Option<&str> {
        self.document.get(key_field).and_then(Value::as_str)
    }
}

fn to_map(document: &SearchDocument) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(document)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "document serialized to non-object: {other}"
        ))),
    }
}

/// Per-document outcome of an indexing batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingResult {
    pub key: String,
    pub status: bool,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

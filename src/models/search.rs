//! Search requests sent to the index and the hits that come back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::{SEMANTIC_CONFIG, VECTOR_FIELDS};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// How search terms combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Any,
    All,
}

/// Which retrieval strategy a `search` command uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Text,
    Vector,
    Hybrid,
    Semantic,
}

impl QueryKind {
    pub fn needs_embedding(&self) -> bool {
        !matches!(self, QueryKind::Text)
    }
}

impl std::str::FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(QueryKind::Text),
            "vector" => Ok(QueryKind::Vector),
            "hybrid" => Ok(QueryKind::Hybrid),
            "semantic" => Ok(QueryKind::Semantic),
            _ => Err(format!("unknown search kind: {s}")),
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryKind::Text => "text",
            QueryKind::Vector => "vector",
            QueryKind::Hybrid => "hybrid",
            QueryKind::Semantic => "semantic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub kind: String,
    pub vector: Vec<f32>,
    pub fields: String,
    pub k: u32,
}

impl VectorQuery {
    pub fn new(vector: Vec<f32>, k: u32) -> Self {
        Self {
            kind: "vector".to_string(),
            vector,
            fields: VECTOR_FIELDS.to_string(),
            k,
        }
    }
}

/// Body of a `docs/search` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_fields: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<SearchMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub count: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vector_queries: Vec<VectorQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_configuration: Option<String>,
}

impl SearchRequest {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            search: Some(query.into()),
            ..Default::default()
        }
    }

    /// Builds the request for a retrieval strategy; `vector` is required for non-text kinds.
    pub fn for_kind(kind: QueryKind, query: &str, vector: Option<Vec<f32>>, top: u32) -> Self {
        let vector_queries = match vector {
            Some(v) if kind.needs_embedding() => vec![VectorQuery::new(v, top)],
            _ => Vec::new(),
        };
        let search = match kind {
            QueryKind::Vector => None,
            _ => Some(query.to_string()),
        };
        let (query_type, semantic_configuration) = match kind {
            QueryKind::Semantic => (
                Some("semantic".to_string()),
                Some(SEMANTIC_CONFIG.to_string()),
            ),
            _ => (None, None),
        };
        Self {
            search,
            top: Some(top),
            vector_queries,
            query_type,
            semantic_configuration,
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Option<String>) -> Self {
        self.search_fields = fields;
        self
    }

    pub fn with_select(mut self, select: Option<String>) -> Self {
        self.select = select;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = Some(mode);
        self
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_order_by(mut self, orderby: impl Into<String>) -> Self {
        self.orderby = Some(orderby.into());
        self
    }

    pub fn with_top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// A single matching document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "@search.score", default)]
    pub score: f64,
    #[serde(
        rename = "@search.rerankerScore",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reranker_score: Option<f64>,
    #[serde(flatten)]
    pub document: Map<String, Value>,
}

impl SearchHit {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.document.get(name).and_then(Value::as_str)
    }

    /// Document with every `@search.*` annotation removed, ready to be re-uploaded.
    pub fn clean_document(&self) -> Map<String, Value> {
        self.document
            .iter()
            .filter(|(k, _)| !k.starts_with("@search."))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(rename = "@odata.count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(rename = "value", default)]
    pub hits: Vec<SearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_text_request_body() {
        let request = SearchRequest::text("pattern")
            .with_fields(Some("Title".into()))
            .with_mode(SearchMode::All)
            .with_top(50)
            .with_count();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "search": "pattern",
                "searchFields": "Title",
                "searchMode": "all",
                "top": 50,
                "count": true
            })
        );
    }

    #[test]
    fn test_semantic_request_carries_vector_and_config() {
        let request = SearchRequest::for_kind(QueryKind::Semantic, "avatar", Some(vec![0.1, 0.2]), 3);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["queryType"], "semantic");
        assert_eq!(value["semanticConfiguration"], SEMANTIC_CONFIG);
        assert_eq!(value["vectorQueries"][0]["fields"], VECTOR_FIELDS);
        assert_eq!(value["vectorQueries"][0]["k"], 3);
    }

    #[test]
    fn test_vector_request_has_no_search_text() {
        let request = SearchRequest::for_kind(QueryKind::Vector, "avatar", Some(vec![0.1]), 3);
        assert!(request.search.is_none());
        assert_eq!(request.vector_queries.len(), 1);
    }

    #[test]
    fn test_hit_strips_annotations() {
        let page: SearchPage = serde_json::from_value(json!({
            "@odata.count": 1,
            "value": [{"@search.score": 1.5, "@search.highlights": {}, "ArticleId": "1", "Title": "T"}]
        }))
        .unwrap();
        assert_eq!(page.count, Some(1));
        let hit = &page.hits[0];
        assert_eq!(hit.score, 1.5);
        assert_eq!(hit.field_str("Title"), Some("T"));
        let clean = hit.clean_document();
        assert_eq!(clean.len(), 2);
        assert!(clean.contains_key("ArticleId"));
    }
}

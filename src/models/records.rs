//! Staged records, as written to and read from the page files between fetch and upload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::SearchDocument;

/// Deterministic id for content that has no upstream numeric id.
pub fn stable_id(seed: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()).to_string()
}

/// A cleaned help-center article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArticleRecord {
    pub article_id: u64,
    pub source: String,
    pub title: String,
    pub content: String,
    pub tokens: usize,
    pub section_id: Option<u64>,
    #[serde(default)]
    pub section: String,
    pub category_id: Option<u64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub youtube_links: Vec<String>,
}

impl ArticleRecord {
    pub fn to_document(&self) -> SearchDocument {
        SearchDocument::new(
            self.article_id.to_string(),
            &self.title,
            &self.content,
            &self.source,
        )
        .with_youtube_links(self.youtube_links.clone())
    }
}

/// PDF text pulled from an article attachment or a local file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfRecord {
    #[serde(rename = "ArticleId")]
    pub article_id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "PDF_URL", default)]
    pub pdf_url: Vec<String>,
    #[serde(rename = "PDF_Text")]
    pub pdf_text: String,
    #[serde(rename = "PDF_Summary", default)]
    pub pdf_summary: String,
    #[serde(rename = "Labels", default)]
    pub labels: Vec<String>,
}

impl PdfRecord {
    pub fn has_summary(&self) -> bool {
        !self.pdf_summary.trim().is_empty()
    }

    /// Summary-backed document; `None` when no summary has been generated yet.
    pub fn to_document(&self) -> Option<SearchDocument> {
        if !self.has_summary() {
            return None;
        }
        Some(
            SearchDocument::new(&self.article_id, &self.title, &self.pdf_summary, &self.source)
                .with_labels(self.labels.clone()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub author_id: Option<u64>,
    pub comment_id: u64,
    pub official: bool,
    pub comment_url: String,
    pub comment_body: String,
}

/// A community post with its (possibly filtered) comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: u64,
    pub post_title: String,
    pub post_url: String,
    pub post_details: String,
    pub created_at: String,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

impl PostRecord {
    pub fn to_document(&self) -> SearchDocument {
        let mut content = self.post_details.clone();
        for comment in &self.comments {
            content.push(' ');
            content.push_str(&comment.comment_body);
        }
        SearchDocument::new(self.post_id.to_string(), &self.post_title, content, &self.post_url)
    }
}

/// A YouTube video with its transcript and generated summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    #[serde(rename = "ArticleId")]
    pub article_id: String,
    #[serde(rename = "VideoId")]
    pub video_id: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "publishedAt", default)]
    pub published_at: String,
    #[serde(rename = "Transcript", default)]
    pub transcript: String,
    #[serde(rename = "Summary", default)]
    pub summary: String,
}

impl TranscriptRecord {
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={video_id}")
    }

    pub fn to_document(&self) -> Option<SearchDocument> {
        if self.summary.trim().is_empty() {
            return None;
        }
        Some(
            SearchDocument::new(&self.article_id, &self.title, &self.summary, &self.source)
                .with_youtube_links(vec![self.source.clone()]),
        )
    }
}

/// A parsed developer documentation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DevDoc {
    pub article_id: String,
    pub title: String,
    pub content: String,
    pub source: String,
}

impl DevDoc {
    pub fn new(title: impl Into<String>, content: impl Into<String>, source: impl Into<String>) -> Self {
        let title = title.into();
        let source = source.into();
        Self {
            article_id: stable_id(&format!("{source}#{title}")),
            title,
            content: content.into(),
            source,
        }
    }

    pub fn to_document(&self) -> SearchDocument {
        SearchDocument::new(&self.article_id, &self.title, &self.content, &self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stable_id_is_deterministic() {
        assert_eq!(stable_id("a/b.pdf"), stable_id("a/b.pdf"));
        assert_ne!(stable_id("a/b.pdf"), stable_id("a/c.pdf"));
    }

    #[test]
    fn test_article_record_keys() {
        let record = ArticleRecord {
            article_id: 10,
            source: "https://support.clo3d.com/hc/en-us/articles/10".into(),
            title: "Title".into(),
            content: "Body".into(),
            tokens: 1,
            section_id: Some(2),
            section: "Sec".into(),
            category_id: None,
            category: String::new(),
            youtube_links: vec![],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["ArticleId"], 10);
        assert_eq!(value["SectionId"], 2);
        assert_eq!(record.to_document().article_id, "10");
    }

    #[test]
    fn test_pdf_record_without_summary_has_no_document() {
        let record: PdfRecord = serde_json::from_value(json!({
            "ArticleId": "1", "Title": "T", "Source": "S", "PDF_Text": "text"
        }))
        .unwrap();
        assert!(record.to_document().is_none());
        assert!(record.pdf_url.is_empty());
    }

    #[test]
    fn test_post_document_joins_comments() {
        let post = PostRecord {
            post_id: 5,
            post_title: "Q".into(),
            post_url: "u".into(),
            post_details: "details".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
            comments: vec![CommentRecord {
                author_id: Some(3),
                comment_id: 1,
                official: true,
                comment_url: "u".into(),
                comment_body: "answer".into(),
            }],
        };
        let doc = post.to_document();
        assert_eq!(doc.content, "details answer");
        assert_eq!(doc.article_id, "5");
    }

    #[test]
    fn test_transcript_document_links_video() {
        let record = TranscriptRecord {
            article_id: "id".into(),
            video_id: "abc".into(),
            source: TranscriptRecord::watch_url("abc"),
            title: "Video".into(),
            published_at: String::new(),
            transcript: "words".into(),
            summary: "summary".into(),
        };
        let doc = record.to_document().unwrap();
        assert_eq!(doc.youtube_links, vec!["https://www.youtube.com/watch?v=abc".to_string()]);
    }
}

//! Remote content sources.
//!
//! Each client talks to one upstream system and returns its native records;
//! cleanup into staged records happens in the pipelines.

pub mod devdocs;
pub mod pdf;
pub mod youtube;
pub mod zendesk;

pub use devdocs::{ApiEntry, DevDocsClient, DocPage, parse_api_listing, parse_scenario};
pub use pdf::{LocalPdfDir, clean_pdf_text, extract_text, read_pdf_file};
pub use youtube::{PlaylistVideo, SearchItem, SearchResponse, YoutubeClient, clean_transcript};
pub use zendesk::{
    Article, ArticlesPage, Attachment, Category, Comment, Post, PostsPage, Section, UrlKind,
    ZendeskClient, canonical_url,
};

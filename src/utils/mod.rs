//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{get_relative_path, is_json_file, is_pdf_file, page_file_name, page_number, sanitize_filename};
pub use retry::{RetryConfig, RetryResult, Retryable, retry, with_retry};
pub use text::{
    collapse_whitespace, extract_youtube_links, num_tokens, remove_boilerplate, remove_html_tags,
    trim_tokens, unescape_entities,
};

//! PDF text extraction and local PDF directories.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::PdfError;
use crate::models::{PdfRecord, stable_id};
use crate::utils::file::{get_relative_path, is_pdf_file};
use crate::utils::text::{MAX_TOKENS, PDF_BOILERPLATE, remove_boilerplate, trim_tokens};

/// Plain text of an in-memory PDF. Extraction runs on the blocking pool.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, PdfError> {
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;
    match joined {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PdfError::ExtractError(e.to_string())),
        // pdf-extract panics on some malformed files
        Err(e) => Err(PdfError::ExtractError(e.to_string())),
    }
}

pub async fn read_pdf_file(path: &Path) -> Result<String, PdfError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| PdfError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    extract_text(bytes).await
}

/// Token-trim, strip copyright and confidentiality banners, token-trim again.
pub fn clean_pdf_text(text: &str) -> String {
    let trimmed = trim_tokens(text, MAX_TOKENS);
    let stripped = remove_boilerplate(&trimmed, PDF_BOILERPLATE);
    trim_tokens(stripped.trim(), MAX_TOKENS)
}

/// A directory tree of PDF files on disk.
#[derive(Debug, Clone)]
pub struct LocalPdfDir {
    root: PathBuf,
}

impl LocalPdfDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every `*.pdf` below the root, sorted.
    pub fn scan(&self) -> Result<Vec<PathBuf>, PdfError> {
        if !self.root.exists() {
            return Err(PdfError::ReadError {
                path: self.root.display().to_string(),
                message: "directory does not exist".to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| PdfError::ReadError {
                path: self.root.display().to_string(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if path.is_file() && is_pdf_file(path) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Record for one file: titled by its stem, keyed by its path below the root.
    pub fn record(&self, path: &Path, text: &str, source_url: &str) -> PdfRecord {
        let relative = get_relative_path(&self.root, path)
            .unwrap_or_else(|| path.display().to_string());
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| relative.clone());

        PdfRecord {
            article_id: stable_id(&relative),
            title,
            source: source_url.to_string(),
            pdf_url: Vec::new(),
            pdf_text: clean_pdf_text(text),
            pdf_summary: String::new(),
            labels: Vec::new(),
        }
    }
}

//! On-disk staging of fetched records as `page_{n}.json` files.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StagingError;
use crate::utils::file::{is_json_file, page_file_name, page_number};

/// A directory of page files.
#[derive(Debug, Clone)]
pub struct PageStore {
    dir: PathBuf,
}

impl PageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn page_path(&self, page: u32) -> PathBuf {
        self.dir.join(page_file_name(page))
    }

    /// Write one page. Empty pages produce no file; returns whether a file was written.
    pub fn write_page<T: Serialize>(&self, page: u32, records: &[T]) -> Result<bool, StagingError> {
        if records.is_empty() {
            return Ok(false);
        }
        write_json(&self.page_path(page), records)?;
        Ok(true)
    }

    pub fn read_page<T: DeserializeOwned>(&self, page: u32) -> Result<Vec<T>, StagingError> {
        read_json(&self.page_path(page))
    }

    /// Page files present in the directory, ordered by page number.
    pub fn pages(&self) -> Result<Vec<(u32, PathBuf)>, StagingError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let mut pages: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                page_number(&name).map(|n| (n, entry.path()))
            })
            .collect();
        pages.sort_by_key(|(n, _)| *n);
        Ok(pages)
    }

    /// Every `*.json` file directly inside the directory, sorted by name.
    pub fn json_files(&self) -> Result<Vec<PathBuf>, StagingError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_json_file(path))
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn write_file<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf, StagingError> {
        let path = self.dir.join(name);
        write_json(&path, value)?;
        Ok(path)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StagingError {
    StagingError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Pretty-printed UTF-8 JSON; parent directories are created.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StagingError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| StagingError::Json {
        path: path.display().to_string(),
        source: e,
    })?;
    std::fs::write(path, content).map_err(|e| io_error(path, e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StagingError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&content).map_err(|e| StagingError::Json {
        path: path.display().to_string(),
        source: e,
    })
}

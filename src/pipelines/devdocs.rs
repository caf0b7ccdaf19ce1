//! Developer documentation: API listings and pages of the docs site.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{AppError, StagingError};
use crate::models::{DevDoc, RunReport};
use crate::services::{PageStore, Uploader, WorkerPool, read_json};
use crate::sources::devdocs::{API_LIST_GROUP, API_SOURCE_DIR};
use crate::sources::{ApiEntry, DevDocsClient, DocPage, parse_api_listing};

use super::upload_staged;

pub struct DevDocsPipeline {
    root: PathBuf,
    base_url: String,
    pool: WorkerPool,
}

impl DevDocsPipeline {
    pub fn new(root: impl Into<PathBuf>, base_url: &str, pool: WorkerPool) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            pool,
        }
    }

    fn group(&self, name: &str) -> PageStore {
        PageStore::new(self.root.join(name))
    }

    /// Turn every raw listing in `api_list/original_docs` into documents.
    pub fn parse_api(&self) -> Result<RunReport, AppError> {
        let sources = PageStore::new(self.root.join(API_LIST_GROUP).join(API_SOURCE_DIR));
        let target = self.group(API_LIST_GROUP);
        let mut report = RunReport::new("parse api").with_target(target.dir().display().to_string());

        for path in sources.json_files()? {
            report.total += 1;
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let listing: BTreeMap<String, ApiEntry> = match read_json(&path) {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "unreadable API listing");
                    report.fail(name, e);
                    continue;
                }
            };
            let docs = parse_api_listing(&listing, &self.base_url);
            target.write_file(&name, &docs)?;
            report.succeeded += 1;
            report.note(format!("{name}: {} functions", docs.len()));
        }
        Ok(report)
    }

    /// Fetch one docs page and stage its documents.
    pub async fn parse_page(&self, client: &DevDocsClient, page: DocPage) -> Result<RunReport, AppError> {
        let source = client.page_source(page).await?;
        let docs = page.parse(&source, &self.base_url);
        let path = self.group(page.group()).write_file(&page.file_name(), &docs)?;

        let mut report = RunReport::new(format!("parse {}", page.rst_name()))
            .with_target(path.display().to_string());
        report.total = docs.len();
        report.succeeded = docs.len();
        Ok(report)
    }

    /// Every `*.json` directly inside each group directory.
    pub fn staged_files(&self) -> Result<Vec<PathBuf>, StagingError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.root).map_err(|e| StagingError::Io {
            path: self.root.display().to_string(),
            source: e,
        })?;

        let mut groups: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        groups.sort();

        let mut files = Vec::new();
        for group in groups {
            files.extend(PageStore::new(group).json_files()?);
        }
        Ok(files)
    }

    pub async fn upload(&self, uploader: &Uploader) -> Result<RunReport, AppError> {
        let files = self.staged_files()?;
        Ok(upload_staged(uploader, &self.pool, files, |d: DevDoc| Some(d.to_document())).await)
    }

    /// Delete every staged document from the index.
    pub async fn delete(&self, uploader: &Uploader) -> Result<RunReport, AppError> {
        let mut keys = Vec::new();
        for path in self.staged_files()? {
            let docs: Vec<DevDoc> = read_json(&path)?;
            keys.extend(docs.into_iter().map(|d| d.article_id));
        }
        uploader.delete_keys(&keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::models::ActionKind;
    use crate::services::uploader::testing::{FakeModel, RecordingIndex};
    use crate::services::write_json;

    fn pipeline(temp: &TempDir) -> DevDocsPipeline {
        DevDocsPipeline::new(
            temp.path().join("devdocs"),
            "https://developer.clo3d.com",
            WorkerPool::new(2).with_progress(false),
        )
    }

    #[test]
    fn test_parse_api_writes_next_to_sources() {
        let temp = TempDir::new().unwrap();
        let raw = temp.path().join("devdocs/api_list/original_docs");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::write(
            raw.join("export.json"),
            r#"{"ExportGLTF": {"Doc": "ExportGLTF(x) exports.", "Args": "str path", "ReturnType": "bool"}}"#,
        )
        .unwrap();
        std::fs::write(raw.join("broken.json"), "{").unwrap();

        let pipeline = pipeline(&temp);
        let report = pipeline.parse_api().unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 1);

        let docs: Vec<DevDoc> = read_json(&temp.path().join("devdocs/api_list/export.json")).unwrap();
        assert_eq!(docs[0].content, "ExportGLTF(str path) -> bool exports.");
    }

    #[tokio::test]
    async fn test_upload_and_delete_skip_raw_listings() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("devdocs");
        write_json(
            &root.join("api_scenario/api_scenario.json"),
            &[DevDoc::new("Export Python Script", "export()", "https://d/scenario.html")],
        )
        .unwrap();
        write_json(
            &root.join("api_list/original_docs/raw.json"),
            &serde_json::json!({"F": {"Doc": "d"}}),
        )
        .unwrap();

        let pipeline = pipeline(&temp);
        assert_eq!(pipeline.staged_files().unwrap().len(), 1);

        let index = Arc::new(RecordingIndex::named("idx"));
        let uploader = Uploader::new(index.clone(), Arc::new(FakeModel::default()));
        assert_eq!(pipeline.upload(&uploader).await.unwrap().succeeded, 1);
        assert_eq!(pipeline.delete(&uploader).await.unwrap().succeeded, 1);
        assert_eq!(
            index.keys(ActionKind::MergeOrUpload),
            index.keys(ActionKind::Delete)
        );
    }
}

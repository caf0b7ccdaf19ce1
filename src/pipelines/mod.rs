//! Jobs that move content from a source, through staging, into the index.

pub mod admin;
pub mod articles;
pub mod backup;
pub mod devdocs;
pub mod pdfs;
pub mod posts;
pub mod youtube;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::de::DeserializeOwned;

use crate::error::{AppError, SearchServiceError};
use crate::models::{Config, Environment, RunReport, SearchDocument};
use crate::services::{
    AzureOpenAiClient, AzureSearchClient, LanguageModel, PoolReport, SearchIndex, Uploader,
    WorkerPool, read_json,
};
use crate::sources::{DevDocsClient, YoutubeClient, ZendeskClient};
use crate::utils::retry::RetryConfig;

pub use admin::IndexAdmin;
pub use articles::ArticlesPipeline;
pub use backup::{BackupOptions, IndexBackup};
pub use devdocs::DevDocsPipeline;
pub use pdfs::PdfPipeline;
pub use posts::PostsPipeline;
pub use youtube::YoutubePipeline;

/// The operator's selection plus settings; builds the clients a job needs.
#[derive(Debug, Clone)]
pub struct Context {
    pub env: Environment,
    pub config: Config,
    pub progress: bool,
}

impl Context {
    pub fn new(env: Environment, config: Config) -> Self {
        Self {
            env,
            config,
            progress: true,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::from(&self.config.retry)
    }

    pub fn pool(&self, workers: usize) -> WorkerPool {
        WorkerPool::new(workers).with_progress(self.progress)
    }

    pub fn search_client_for(&self, env: &Environment) -> Result<AzureSearchClient, SearchServiceError> {
        AzureSearchClient::from_env(env, &self.config.search, self.retry())
    }

    pub fn search_client(&self) -> Result<AzureSearchClient, SearchServiceError> {
        self.search_client_for(&self.env)
    }

    pub fn language_model(&self) -> Result<Arc<dyn LanguageModel>, AppError> {
        let client = AzureOpenAiClient::new(&self.env.openai, &self.config.openai, self.retry())?;
        Ok(Arc::new(client))
    }

    /// Uploader bound to the index of `env`.
    pub fn uploader_for(&self, env: &Environment) -> Result<Uploader, AppError> {
        let index: Arc<dyn SearchIndex> = Arc::new(self.search_client_for(env)?);
        Ok(Uploader::new(index, self.language_model()?))
    }

    pub fn uploader(&self) -> Result<Uploader, AppError> {
        self.uploader_for(&self.env)
    }

    pub fn zendesk(&self) -> Result<Arc<ZendeskClient>, AppError> {
        let client = ZendeskClient::from_env(&self.env, &self.config.zendesk, self.retry())?;
        Ok(Arc::new(client))
    }

    pub fn youtube(&self) -> Result<YoutubeClient, AppError> {
        YoutubeClient::from_env(&self.env, &self.config.youtube, self.retry())
    }

    pub fn devdocs(&self) -> Result<DevDocsClient, AppError> {
        DevDocsClient::new(&self.config.devdocs, self.retry())
    }
}

/// Midnight UTC on January 1st, `years` before the year of `now`.
pub fn jan_first_years_before(now: DateTime<Utc>, years: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year() - years, 1, 1, 0, 0, 0)
        .earliest()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A staged JSON file, displayed by its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile(pub PathBuf);

impl fmt::Display for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// One report for a pool run whose items each produced their own report.
pub fn fold_reports(
    operation: &str,
    target: impl Into<String>,
    outcome: PoolReport<RunReport>,
) -> RunReport {
    let mut report = RunReport::new(operation).with_target(target);
    for (item, error) in &outcome.failures {
        report.fail(item.clone(), error);
    }
    for item_report in outcome.outputs {
        report.absorb(item_report);
    }
    report
}

/// Upload every staged file through the pool.
///
/// `convert` turns a record into a document; `None` counts as skipped.
pub async fn upload_staged<T, F>(
    uploader: &Uploader,
    pool: &WorkerPool,
    files: Vec<PathBuf>,
    convert: F,
) -> RunReport
where
    T: DeserializeOwned,
    F: Fn(T) -> Option<SearchDocument>,
{
    let convert = &convert;
    let outcome = pool
        .run(files.into_iter().map(StagedFile), |file| async move {
            let records: Vec<T> = read_json(&file.0)?;
            let total = records.len();
            let documents: Vec<SearchDocument> = records.into_iter().filter_map(convert).collect();
            let skipped = total - documents.len();

            tracing::info!(file = %file, documents = documents.len(), skipped, "uploading");
            let mut report = uploader.upload_documents(documents).await?;
            report.total += skipped;
            report.skipped += skipped;
            Ok::<_, AppError>(report)
        })
        .await;

    fold_reports("upload", uploader.index_name(), outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionKind, ArticleRecord};
    use crate::services::uploader::testing::{FakeModel, RecordingIndex};
    use crate::services::write_json;
    use tempfile::TempDir;

    #[test]
    fn test_jan_first_years_before() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let cutoff = jan_first_years_before(now, 3);
        assert_eq!(cutoff.to_rfc3339(), "2023-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_upload_staged_counts_skips_and_bad_files() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("page_1.json");
        let bad = temp.path().join("page_2.json");
        let record = |id: u64, content: &str| ArticleRecord {
            article_id: id,
            source: "s".into(),
            title: "t".into(),
            content: content.into(),
            tokens: 1,
            section_id: None,
            section: String::new(),
            category_id: None,
            category: String::new(),
            youtube_links: vec![],
        };
        write_json(&good, &[record(1, "a"), record(2, "skip")]).unwrap();
        std::fs::write(&bad, "[{").unwrap();

        let index = Arc::new(RecordingIndex::named("idx"));
        let uploader = Uploader::new(index.clone(), Arc::new(FakeModel::default()));
        let pool = WorkerPool::new(2).with_progress(false);

        let report = upload_staged(&uploader, &pool, vec![good, bad], |r: ArticleRecord| {
            (r.content != "skip").then(|| r.to_document())
        })
        .await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(index.keys(ActionKind::MergeOrUpload), vec!["1"]);
    }
}

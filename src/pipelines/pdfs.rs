//! PDFs attached to articles, and local PDF folders.

use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::{PdfRecord, RunReport};
use crate::services::{LanguageModel, PageStore, Uploader, WorkerPool, read_json, write_json};
use crate::sources::{LocalPdfDir, UrlKind, ZendeskClient, clean_pdf_text, extract_text, read_pdf_file};

use super::{StagedFile, fold_reports, upload_staged};

/// Staged local PDFs, below the brand's `local_pdf` directory.
pub const LOCAL_PDF_FILE: &str = "pdf_documents.json";

/// What an LLM pass fills in on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrichment {
    Summary,
    Labels,
}

impl Enrichment {
    fn operation(&self) -> &'static str {
        match self {
            Enrichment::Summary => "summarize",
            Enrichment::Labels => "labels",
        }
    }
}

pub struct PdfPipeline {
    store: PageStore,
    local: PageStore,
    pool: WorkerPool,
}

impl PdfPipeline {
    pub fn new(store: PageStore, local: PageStore, pool: WorkerPool) -> Self {
        Self { store, local, pool }
    }

    fn local_path(&self) -> PathBuf {
        self.local.dir().join(LOCAL_PDF_FILE)
    }

    /// Article pages, or the single local file.
    fn files(&self, local: bool) -> Result<Vec<PathBuf>, AppError> {
        if local {
            let path = self.local_path();
            return Ok(if path.exists() { vec![path] } else { Vec::new() });
        }
        Ok(self.store.pages()?.into_iter().map(|(_, path)| path).collect())
    }

    /// Cleaned text of every PDF attached to an article, concatenated.
    async fn article_pdf_text(
        &self,
        zendesk: &ZendeskClient,
        article_id: u64,
    ) -> Result<(Vec<String>, String), AppError> {
        let attachments = zendesk.article_attachments(article_id).await?;
        let urls: Vec<String> = attachments
            .iter()
            .filter(|a| a.is_pdf())
            .map(|a| a.content_url.clone())
            .collect();

        let mut texts = Vec::new();
        for url in &urls {
            let bytes = match zendesk.download(url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(article = article_id, url = %url, error = %e, "failed to download PDF");
                    continue;
                }
            };
            match extract_text(bytes).await {
                Ok(text) => texts.push(clean_pdf_text(&text)),
                Err(e) => {
                    tracing::error!(article = article_id, url = %url, error = %e, "failed to read PDF")
                }
            }
        }

        let text = texts
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok((urls, text))
    }

    async fn fetch_page(&self, zendesk: &ZendeskClient, page: u32) -> Result<usize, AppError> {
        let listing = zendesk.articles_page(page).await?;

        let mut records = Vec::new();
        for article in listing.articles.iter().filter(|a| a.is_public()) {
            let (urls, text) = self.article_pdf_text(zendesk, article.id).await?;
            if text.is_empty() {
                continue;
            }
            records.push(PdfRecord {
                article_id: article.id.to_string(),
                title: article.title.clone(),
                source: zendesk.canonical_url(&article.html_url, UrlKind::Article),
                pdf_url: urls,
                pdf_text: text,
                pdf_summary: String::new(),
                labels: Vec::new(),
            });
        }

        self.store.write_page(page, &records)?;
        tracing::info!(page, documents = records.len(), "staged PDF page");
        Ok(records.len())
    }

    /// Stage the PDF text of every public article that has PDF attachments.
    pub async fn fetch(&self, zendesk: &ZendeskClient) -> Result<RunReport, AppError> {
        let first = zendesk.articles_page(1).await?;
        let pages: Vec<u32> = (1..=first.page_count.max(1)).collect();

        let outcome = self.pool.run(pages, |page| self.fetch_page(zendesk, page)).await;
        let staged: usize = outcome.outputs.iter().sum();

        let mut report = outcome
            .to_run_report("fetch pdf")
            .with_target(self.store.dir().display().to_string());
        report.note(format!("{staged} articles with PDF text staged"));
        Ok(report)
    }

    /// Stage every PDF below `dir` into the local file.
    pub async fn fetch_local(&self, dir: &LocalPdfDir, source_url: &str) -> Result<RunReport, AppError> {
        let files = dir.scan()?;
        let outcome = self
            .pool
            .run(files.into_iter().map(StagedFile), |file| async move {
                let text = read_pdf_file(&file.0).await?;
                Ok::<_, AppError>(dir.record(&file.0, &text, source_url))
            })
            .await;

        let mut report = outcome.to_run_report("fetch local pdf");
        let mut records = outcome.outputs;
        records.sort_by(|a, b| a.title.cmp(&b.title));
        write_json(&self.local_path(), &records)?;

        report = report.with_target(self.local_path().display().to_string());
        Ok(report)
    }

    async fn enrich_file(
        &self,
        model: &dyn LanguageModel,
        path: &Path,
        kind: Enrichment,
    ) -> Result<RunReport, AppError> {
        let mut records: Vec<PdfRecord> = read_json(path)?;
        let mut report = RunReport::new(kind.operation());
        report.total = records.len();

        for record in records.iter_mut() {
            if record.pdf_text.trim().is_empty() {
                report.skipped += 1;
                continue;
            }
            let result = match kind {
                Enrichment::Summary => model
                    .summarize_pdf(&record.pdf_text)
                    .await
                    .map(|summary| record.pdf_summary = summary),
                Enrichment::Labels => model
                    .generate_labels(&record.pdf_text)
                    .await
                    .map(|labels| record.labels = labels),
            };
            match result {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::error!(document = %record.article_id, error = %e, "{} failed", kind.operation());
                    report.fail(record.article_id.clone(), e);
                }
            }
        }

        write_json(path, &records)?;
        Ok(report)
    }

    /// Fill summaries or labels and rewrite the staged files in place.
    pub async fn enrich(
        &self,
        model: &dyn LanguageModel,
        kind: Enrichment,
        local: bool,
    ) -> Result<RunReport, AppError> {
        let files = self.files(local)?;
        let outcome = self
            .pool
            .run(files.into_iter().map(StagedFile), |file| async move {
                self.enrich_file(model, &file.0, kind).await
            })
            .await;
        Ok(fold_reports(kind.operation(), self.target(local), outcome))
    }

    fn target(&self, local: bool) -> String {
        if local {
            self.local_path().display().to_string()
        } else {
            self.store.dir().display().to_string()
        }
    }

    /// Upload summarized records; local records get labels refreshed from their summary.
    pub async fn upload(
        &self,
        uploader: &Uploader,
        model: &dyn LanguageModel,
        local: bool,
    ) -> Result<RunReport, AppError> {
        if !local {
            let files = self.files(false)?;
            return Ok(upload_staged(uploader, &self.pool, files, |r: PdfRecord| r.to_document()).await);
        }

        let path = self.local_path();
        if !path.exists() {
            return Ok(RunReport::new("upload").with_target(uploader.index_name()));
        }
        let mut records: Vec<PdfRecord> = read_json(&path)?;
        for record in records.iter_mut().filter(|r| r.has_summary()) {
            match model.generate_labels(&record.pdf_summary).await {
                Ok(labels) => record.labels = labels,
                Err(e) => tracing::warn!(document = %record.article_id, error = %e, "keeping previous labels"),
            }
        }

        let total = records.len();
        let documents: Vec<_> = records.iter().filter_map(PdfRecord::to_document).collect();
        let skipped = total - documents.len();

        let mut report = uploader.upload_documents(documents).await?;
        report.total += skipped;
        report.skipped += skipped;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::models::{ActionKind, Brand, Language, ZendeskConfig};
    use crate::services::uploader::testing::{FakeModel, RecordingIndex};
    use crate::utils::retry::RetryConfig;

    fn pipeline(temp: &TempDir) -> PdfPipeline {
        PdfPipeline::new(
            PageStore::new(temp.path().join("pdf/en-us")),
            PageStore::new(temp.path().join("local_pdf")),
            WorkerPool::new(2).with_progress(false),
        )
    }

    fn record(id: &str, text: &str, summary: &str) -> PdfRecord {
        PdfRecord {
            article_id: id.into(),
            title: format!("Doc {id}"),
            source: "https://support.clo3d.com/hc/en-us/articles/1".into(),
            pdf_url: vec![],
            pdf_text: text.into(),
            pdf_summary: summary.into(),
            labels: vec![],
        }
    }

    #[tokio::test]
    async fn test_fetch_skips_articles_without_readable_pdfs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/help_center/en-us/articles.json"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page_count": 1,
                "articles": [{
                    "id": 7, "title": "Manual", "html_url": "https://support.clo3d.com/hc/en-us/articles/7-Manual",
                    "draft": false, "user_segment_id": null
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/help_center/en-us/articles/7/attachments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "article_attachments": [
                    {"id": 1, "file_name": "a.png", "content_type": "image/png", "content_url": format!("{}/files/a.png", server.uri())},
                    {"id": 2, "file_name": "m.pdf", "content_type": "application/pdf", "content_url": format!("{}/files/m.pdf", server.uri())}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/m.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a pdf".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let zendesk = ZendeskClient::new(
            &server.uri(),
            Brand::Clo3d,
            Language::English,
            &ZendeskConfig::default(),
            RetryConfig::new(1).with_initial_delay(Duration::from_millis(5)),
        )
        .unwrap();
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);

        let report = pipeline.fetch(&zendesk).await.unwrap();
        assert!(report.is_clean());
        assert!(pipeline.store.pages().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summarize_then_upload() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);
        pipeline
            .store
            .write_page(1, &[record("1", "pattern text", ""), record("2", "", "")])
            .unwrap();

        let model = FakeModel {
            reply: "A short summary".into(),
        };
        let report = pipeline.enrich(&model, Enrichment::Summary, false).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 1);

        let staged: Vec<PdfRecord> = pipeline.store.read_page(1).unwrap();
        assert_eq!(staged[0].pdf_summary, "A short summary");

        let index = Arc::new(RecordingIndex::named("idx"));
        let uploader = Uploader::new(index.clone(), Arc::new(FakeModel::default()));
        let report = pipeline.upload(&uploader, &model, false).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(index.keys(ActionKind::MergeOrUpload), vec!["1"]);
    }

    #[tokio::test]
    async fn test_local_upload_refreshes_labels() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);
        write_json(&pipeline.local_path(), &[record("a", "text", "summary")]).unwrap();

        let model = FakeModel {
            reply: r#"["Draping", "Avatar"]"#.into(),
        };
        let index = Arc::new(RecordingIndex::named("idx"));
        let uploader = Uploader::new(index.clone(), Arc::new(FakeModel::default()));
        let report = pipeline.upload(&uploader, &model, true).await.unwrap();
        assert_eq!(report.succeeded, 1);

        let actions = index.actions.lock().unwrap();
        assert_eq!(actions[0].document["Labels"], json!(["Draping", "Avatar"]));
        assert_eq!(actions[0].document["Content"], "summary");
    }

    #[tokio::test]
    async fn test_fetch_local_counts_unreadable_files() {
        let temp = TempDir::new().unwrap();
        let pdfs = temp.path().join("udemy");
        std::fs::create_dir_all(&pdfs).unwrap();
        std::fs::write(pdfs.join("broken.pdf"), b"garbage").unwrap();

        let pipeline = pipeline(&temp);
        let report = pipeline
            .fetch_local(&LocalPdfDir::new(&pdfs), "https://www.udemy.com/user/clo3d-virtual-fashion/")
            .await
            .unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(report.failed(), 1);
        let staged: Vec<PdfRecord> = read_json(&pipeline.local_path()).unwrap();
        assert!(staged.is_empty());
    }
}

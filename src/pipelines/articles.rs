//! Help-center articles: fetch, stage, upload and prune.

use std::sync::Arc;

use crate::error::{AppError, ZendeskError};
use crate::models::{ArticleRecord, Brand, RunReport};
use crate::services::{PageStore, Uploader, WorkerPool};
use crate::sources::{Article, UrlKind, ZendeskClient};
use crate::utils::text::{
    ARTICLE_BOILERPLATE, MAX_TOKENS, extract_youtube_links, num_tokens, remove_boilerplate,
    remove_html_tags, trim_tokens,
};

/// Sections and articles the brand keeps out of the index.
pub fn is_excluded(brand: Brand, article: &Article) -> bool {
    article
        .section_id
        .is_some_and(|id| brand.excluded_sections().contains(&id))
        || brand.excluded_articles().contains(&article.id)
}

pub struct ArticlesPipeline {
    zendesk: Arc<ZendeskClient>,
    store: PageStore,
    pool: WorkerPool,
}

impl ArticlesPipeline {
    pub fn new(zendesk: Arc<ZendeskClient>, store: PageStore, pool: WorkerPool) -> Self {
        Self {
            zendesk,
            store,
            pool,
        }
    }

    /// Cleaned record with section and category names resolved.
    pub async fn build_record(&self, article: &Article) -> Result<ArticleRecord, ZendeskError> {
        let html = article.body.as_deref().unwrap_or_default();
        let content = remove_html_tags(html);
        let content = remove_boilerplate(&content, ARTICLE_BOILERPLATE);
        let content = trim_tokens(content.trim(), MAX_TOKENS);

        let (section_id, section, category_id, category) = match article.section_id {
            Some(id) => {
                let section = self.zendesk.section(id).await?;
                let category = match section.category_id {
                    Some(category_id) => Some(self.zendesk.category(category_id).await?),
                    None => None,
                };
                (
                    Some(section.id),
                    section.name,
                    category.as_ref().map(|c| c.id),
                    category.map(|c| c.name).unwrap_or_default(),
                )
            }
            None => (None, String::new(), None, String::new()),
        };

        Ok(ArticleRecord {
            article_id: article.id,
            source: self.zendesk.canonical_url(&article.html_url, UrlKind::Article),
            title: article.title.clone(),
            tokens: num_tokens(&content),
            content,
            section_id,
            section,
            category_id,
            category,
            youtube_links: extract_youtube_links(html),
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<usize, AppError> {
        let listing = self.zendesk.articles_page(page).await?;
        let brand = self.zendesk.brand();

        let mut records = Vec::new();
        for article in listing.articles.iter().filter(|a| a.is_public()) {
            if is_excluded(brand, article) {
                tracing::debug!(article = article.id, "excluded");
                continue;
            }
            records.push(self.build_record(article).await?);
        }

        self.store.write_page(page, &records)?;
        tracing::info!(page, articles = records.len(), "staged articles page");
        Ok(records.len())
    }

    /// Fetch every listing page and stage the public, non-excluded articles.
    pub async fn fetch(&self) -> Result<RunReport, AppError> {
        let first = self.zendesk.articles_page(1).await?;
        let pages: Vec<u32> = (1..=first.page_count.max(1)).collect();

        let outcome = self.pool.run(pages, |page| self.fetch_page(page)).await;
        let staged: usize = outcome.outputs.iter().sum();

        let mut report = outcome
            .to_run_report("fetch articles")
            .with_target(self.store.dir().display().to_string());
        report.note(format!("{staged} articles staged"));
        Ok(report)
    }

    pub async fn get(&self, id: u64) -> Result<ArticleRecord, AppError> {
        let article = self.zendesk.article(id).await?;
        Ok(self.build_record(&article).await?)
    }

    /// Upload every staged page to the uploader's index.
    pub async fn upload(&self, uploader: &Uploader) -> Result<RunReport, AppError> {
        let files = self.store.pages()?.into_iter().map(|(_, path)| path).collect();
        Ok(super::upload_staged(uploader, &self.pool, files, |r: ArticleRecord| Some(r.to_document())).await)
    }

    pub async fn delete(&self, uploader: &Uploader, ids: &[String]) -> Result<RunReport, AppError> {
        uploader.delete_keys(ids).await
    }

    /// Walk every live listing page and delete articles the brand excludes.
    pub async fn delete_excluded(&self, uploader: &Uploader) -> Result<RunReport, AppError> {
        let brand = self.zendesk.brand();
        let first = self.zendesk.articles_page(1).await?;

        let mut keys = Vec::new();
        for page in 1..=first.page_count.max(1) {
            let listing = if page == 1 {
                first.clone()
            } else {
                self.zendesk.articles_page(page).await?
            };
            keys.extend(
                listing
                    .articles
                    .iter()
                    .filter(|a| is_excluded(brand, a))
                    .map(|a| a.id.to_string()),
            );
        }

        tracing::info!(count = keys.len(), "deleting excluded articles");
        uploader.delete_keys(&keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::models::{ActionKind, Language, ZendeskConfig};
    use crate::services::uploader::testing::{FakeModel, RecordingIndex};
    use crate::utils::retry::RetryConfig;

    fn article(id: u64, section: u64, draft: bool) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Article {id}"),
            "body": "<p>Sew the <b>sleeve</b>.</p><iframe src=\"https://www.youtube.com/embed/dQw4w9WgXcQ\"></iframe><p>Was this article helpful?</p>",
            "html_url": format!("https://support.clo3d.com/hc/en-us/articles/{id}-Article"),
            "draft": draft,
            "user_segment_id": null,
            "section_id": section
        })
    }

    async fn mock_zendesk() -> MockServer {
        let server = MockServer::start().await;
        let page = |n: &str, articles: Vec<serde_json::Value>| {
            Mock::given(method("GET"))
                .and(path("/api/v2/help_center/en-us/articles.json"))
                .and(query_param("page", n))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "page_count": 2,
                    "articles": articles
                })))
        };
        page("1", vec![article(1, 9, false), article(2, 9, true)])
            .mount(&server)
            .await;
        page("2", vec![article(3, 360005512874, false)])
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/help_center/en-us/sections/9.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "section": {"id": 9, "name": "Sewing", "category_id": 4}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/help_center/en-us/categories/4.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "category": {"id": 4, "name": "Garments"}
            })))
            .mount(&server)
            .await;
        server
    }

    fn pipeline(server: &MockServer, dir: &std::path::Path) -> ArticlesPipeline {
        let retry = RetryConfig::new(1).with_initial_delay(Duration::from_millis(5));
        let zendesk = ZendeskClient::new(
            &server.uri(),
            Brand::Clo3d,
            Language::English,
            &ZendeskConfig::default(),
            retry,
        )
        .unwrap();
        ArticlesPipeline::new(
            Arc::new(zendesk),
            PageStore::new(dir),
            WorkerPool::new(2).with_progress(false),
        )
    }

    #[tokio::test]
    async fn test_fetch_stages_public_articles() {
        let server = mock_zendesk().await;
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&server, temp.path());

        let report = pipeline.fetch().await.unwrap();
        assert_eq!(report.total, 2);
        assert!(report.is_clean());

        let records: Vec<ArticleRecord> = pipeline.store.read_page(1).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.source, "https://support.clo3d.com/hc/en-us/articles/1");
        assert_eq!(record.content, "Sew the sleeve.");
        assert_eq!(record.section, "Sewing");
        assert_eq!(record.category, "Garments");
        assert_eq!(
            record.youtube_links,
            vec!["https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()]
        );
        // page 2 only held an excluded article
        assert!(!pipeline.store.page_path(2).exists());
    }

    #[tokio::test]
    async fn test_upload_and_delete_excluded() {
        let server = mock_zendesk().await;
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&server, temp.path());
        pipeline.fetch().await.unwrap();

        let index = Arc::new(RecordingIndex::named("clo3d-index-english"));
        let uploader = Uploader::new(index.clone(), Arc::new(FakeModel::default()));

        let report = pipeline.upload(&uploader).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(index.keys(ActionKind::MergeOrUpload), vec!["1"]);

        let report = pipeline.delete_excluded(&uploader).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(index.keys(ActionKind::Delete), vec!["3"]);
    }

    #[test]
    fn test_excluded_article_id() {
        let article: Article = serde_json::from_value(json!({
            "id": 115012589987u64, "title": "t", "html_url": "u", "section_id": 1
        }))
        .unwrap();
        assert!(is_excluded(Brand::Clo3d, &article));
        assert!(!is_excluded(Brand::Closet, &article));
    }
}

//! Zendesk help-center and community API client.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ZendeskError;
use crate::models::{Brand, Environment, Language, ZendeskConfig};
use crate::utils::retry::{RetryConfig, retry};

#[derive(Debug, Clone, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub user_segment_id: Option<u64>,
    #[serde(default)]
    pub section_id: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Article {
    /// Published and visible to everyone.
    pub fn is_public(&self) -> bool {
        !self.draft && self.user_segment_id.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticlesPage {
    pub articles: Vec<Article>,
    #[serde(default)]
    pub page_count: u32,
}

#[derive(Debug, Deserialize)]
struct ArticleEnvelope {
    article: Article,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SectionEnvelope {
    section: Section,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CategoryEnvelope {
    category: Category,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub id: u64,
    #[serde(default)]
    pub file_name: String,
    pub content_type: String,
    pub content_url: String,
}

impl Attachment {
    pub fn is_pdf(&self) -> bool {
        self.content_type == "application/pdf"
    }
}

#[derive(Debug, Deserialize)]
struct AttachmentsEnvelope {
    article_attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub details: Option<String>,
    pub html_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    #[serde(default)]
    pub page_count: u32,
}

#[derive(Debug, Deserialize)]
struct PostEnvelope {
    post: Post,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub author_id: Option<u64>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub official: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentsPage {
    comments: Vec<Comment>,
    #[serde(default)]
    next_page: Option<String>,
}

/// Which kind of help-center page a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Article,
    Post,
}

/// Trims a help-center `html_url` to its canonical form.
///
/// Article URLs must carry the expected locale; post URLs accept any locale.
/// URLs that don't match are returned unchanged.
pub fn canonical_url(html_url: &str, host: &str, locale: &str, kind: UrlKind) -> String {
    let pattern = match kind {
        UrlKind::Article => format!(
            r"https://{}/hc/{}/articles/\d+",
            regex::escape(host),
            regex::escape(locale)
        ),
        UrlKind::Post => format!(r"https://{}/hc/[A-Za-z-]+/community/posts/\d+", regex::escape(host)),
    };
    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.find(html_url).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| html_url.to_string())
}

/// Client for one brand's help center in one locale.
#[derive(Debug)]
pub struct ZendeskClient {
    client: Client,
    base_url: String,
    brand: Brand,
    locale: String,
    username: Option<String>,
    password: Option<String>,
    articles_per_page: u32,
    posts_per_page: u32,
    retry: RetryConfig,
    sections: Mutex<HashMap<u64, Section>>,
    categories: Mutex<HashMap<u64, Category>>,
}

impl ZendeskClient {
    pub fn new(
        base_url: &str,
        brand: Brand,
        language: Language,
        config: &ZendeskConfig,
        retry: RetryConfig,
    ) -> Result<Self, ZendeskError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            brand,
            locale: language.locale().to_string(),
            username: None,
            password: None,
            articles_per_page: config.articles_per_page,
            posts_per_page: config.posts_per_page,
            retry,
            sections: Mutex::new(HashMap::new()),
            categories: Mutex::new(HashMap::new()),
        })
    }

    /// Client for the environment's brand; `ZENDESK_BASE_URL` overrides the subdomain.
    pub fn from_env(
        env: &Environment,
        config: &ZendeskConfig,
        retry: RetryConfig,
    ) -> Result<Self, ZendeskError> {
        let base_url = match (&env.zendesk.base_url, env.brand.zendesk_subdomain()) {
            (Some(url), _) => url.clone(),
            (None, Some(subdomain)) => format!("https://{subdomain}.zendesk.com"),
            (None, None) => return Err(ZendeskError::UnsupportedBrand(env.brand.to_string())),
        };
        let client = Self::new(&base_url, env.brand, env.language, config, retry)?;
        Ok(client.with_credentials(env.zendesk.username.clone(), env.zendesk.password.clone()))
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn brand(&self) -> Brand {
        self.brand
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Canonical article or post URL for this brand's public host.
    pub fn canonical_url(&self, html_url: &str, kind: UrlKind) -> String {
        match self.brand.help_center_host() {
            Some(host) => canonical_url(html_url, host, &self.locale, kind),
            None => html_url.to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ZendeskError> {
        retry(&self.retry, || {
            let mut request = self
                .client
                .get(url)
                .header("Accept", "application/json");
            if let Some(username) = &self.username {
                request = request.basic_auth(username, self.password.as_deref());
            }

            async move {
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ZendeskError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                response
                    .json::<T>()
                    .await
                    .map_err(|e| ZendeskError::ParseError(format!("{url}: {e}")))
            }
        })
        .await
    }

    pub async fn articles_page(&self, page: u32) -> Result<ArticlesPage, ZendeskError> {
        let url = format!(
            "{}/api/v2/help_center/{}/articles.json?page={}&per_page={}&sort_by=updated_at&sort_order=desc",
            self.base_url, self.locale, page, self.articles_per_page
        );
        self.get_json(&url).await
    }

    pub async fn article(&self, id: u64) -> Result<Article, ZendeskError> {
        let url = format!(
            "{}/api/v2/help_center/{}/articles/{}",
            self.base_url, self.locale, id
        );
        let envelope: ArticleEnvelope = self.get_json(&url).await?;
        Ok(envelope.article)
    }

    pub async fn section(&self, id: u64) -> Result<Section, ZendeskError> {
        if let Some(section) = self.sections.lock().ok().and_then(|c| c.get(&id).cloned()) {
            return Ok(section);
        }
        let url = format!(
            "{}/api/v2/help_center/{}/sections/{}.json",
            self.base_url, self.locale, id
        );
        let envelope: SectionEnvelope = self.get_json(&url).await?;
        if let Ok(mut cache) = self.sections.lock() {
            cache.insert(id, envelope.section.clone());
        }
        Ok(envelope.section)
    }

    pub async fn category(&self, id: u64) -> Result<Category, ZendeskError> {
        if let Some(category) = self.categories.lock().ok().and_then(|c| c.get(&id).cloned()) {
            return Ok(category);
        }
        let url = format!(
            "{}/api/v2/help_center/{}/categories/{}.json",
            self.base_url, self.locale, id
        );
        let envelope: CategoryEnvelope = self.get_json(&url).await?;
        if let Ok(mut cache) = self.categories.lock() {
            cache.insert(id, envelope.category.clone());
        }
        Ok(envelope.category)
    }

    pub async fn article_attachments(&self, id: u64) -> Result<Vec<Attachment>, ZendeskError> {
        let url = format!(
            "{}/api/v2/help_center/{}/articles/{}/attachments",
            self.base_url, self.locale, id
        );
        let envelope: AttachmentsEnvelope = self.get_json(&url).await?;
        Ok(envelope.article_attachments)
    }

    /// Raw bytes of an attachment.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ZendeskError> {
        retry(&self.retry, || {
            let mut request = self.client.get(url);
            if let Some(username) = &self.username {
                request = request.basic_auth(username, self.password.as_deref());
            }

            async move {
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ZendeskError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Ok(response.bytes().await?.to_vec())
            }
        })
        .await
    }

    pub async fn posts_page(&self, page: u32) -> Result<PostsPage, ZendeskError> {
        let url = format!(
            "{}/api/v2/help_center/community/posts.json?page={}&per_page={}",
            self.base_url, page, self.posts_per_page
        );
        self.get_json(&url).await
    }

    pub async fn post(&self, id: u64) -> Result<Post, ZendeskError> {
        let url = format!("{}/api/v2/community/posts/{}", self.base_url, id);
        let envelope: PostEnvelope = self.get_json(&url).await?;
        Ok(envelope.post)
    }

    /// All comments on a post, oldest first, following `next_page` links.
    pub async fn post_comments(&self, id: u64) -> Result<Vec<Comment>, ZendeskError> {
        let mut url = format!(
            "{}/api/v2/community/posts/{}/comments?sort_by=created_at&sort_order=asc",
            self.base_url, id
        );
        let mut comments = Vec::new();
        loop {
            let page: CommentsPage = self.get_json(&url).await?;
            comments.extend(page.comments);
            match page.next_page {
                Some(next) if !next.is_empty() && next != url => url = next,
                _ => break,
            }
        }
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, brand: Brand) -> ZendeskClient {
        let retry = RetryConfig::new(2).with_initial_delay(Duration::from_millis(5));
        ZendeskClient::new(&server.uri(), brand, Language::English, &ZendeskConfig::default(), retry)
            .unwrap()
    }

    #[test]
    fn test_canonical_article_url() {
        assert_eq!(
            canonical_url(
                "https://support.clo3d.com/hc/en-us/articles/115000123-How-to-sew",
                "support.clo3d.com",
                "en-us",
                UrlKind::Article
            ),
            "https://support.clo3d.com/hc/en-us/articles/115000123"
        );
    }

    #[test]
    fn test_canonical_url_kept_when_unmatched() {
        let url = "https://other.example.com/hc/en-us/articles/1-x";
        assert_eq!(canonical_url(url, "support.clo3d.com", "en-us", UrlKind::Article), url);
    }

    #[test]
    fn test_canonical_post_url_any_locale() {
        assert_eq!(
            canonical_url(
                "https://support.marvelousdesigner.com/hc/ko/community/posts/42-Question",
                "support.marvelousdesigner.com",
                "en-us",
                UrlKind::Post
            ),
            "https://support.marvelousdesigner.com/hc/ko/community/posts/42"
        );
    }

    #[tokio::test]
    async fn test_articles_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/help_center/en-us/articles.json"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page_count": 4,
                "articles": [{
                    "id": 1, "title": "T", "body": "<p>x</p>",
                    "html_url": "https://support.clo3d.com/hc/en-us/articles/1-T",
                    "draft": false, "user_segment_id": null, "section_id": 9
                }]
            })))
            .mount(&server)
            .await;

        let page = client(&server, Brand::Clo3d).articles_page(2).await.unwrap();
        assert_eq!(page.page_count, 4);
        assert!(page.articles[0].is_public());
    }

    #[tokio::test]
    async fn test_section_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/help_center/en-us/sections/9.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "section": {"id": 9, "name": "Basics", "category_id": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let zendesk = client(&server, Brand::Clo3d);
        assert_eq!(zendesk.section(9).await.unwrap().name, "Basics");
        assert_eq!(zendesk.section(9).await.unwrap().category_id, Some(3));
    }

    #[tokio::test]
    async fn test_post_comments_follow_next_page() {
        let server = MockServer::start().await;
        let next = format!("{}/api/v2/community/posts/5/comments/page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/v2/community/posts/5/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "comments": [{"id": 1, "body": "first", "official": false}],
                "next_page": next
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/community/posts/5/comments/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "comments": [{"id": 2, "body": "second", "official": true}],
                "next_page": null
            })))
            .mount(&server)
            .await;

        let comments = client(&server, Brand::Clo3d).post_comments(5).await.unwrap();
        let ids: Vec<u64> = comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_status_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/community/posts/404"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, Brand::Clo3d).post(404).await.unwrap_err();
        assert!(matches!(err, ZendeskError::Status { status: 404, .. }));
    }

    #[test]
    fn test_allinone_has_no_help_center() {
        let env = Environment::resolve(
            crate::models::Stage::Dev,
            Brand::Allinone,
            Language::English,
            std::path::Path::new("."),
            |_| None,
        );
        let result = ZendeskClient::from_env(&env, &ZendeskConfig::default(), RetryConfig::default());
        assert!(matches!(result, Err(ZendeskError::UnsupportedBrand(_))));
    }
}

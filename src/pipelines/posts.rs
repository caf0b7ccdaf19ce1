//! Community forum posts and their answers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AppError, ZendeskError};
use crate::models::{CommentRecord, PostRecord, RunReport};
use crate::services::{PageStore, Uploader, WorkerPool};
use crate::sources::{Comment, Post, UrlKind, ZendeskClient};
use crate::utils::text::{MAX_TOKENS, remove_html_tags, trim_tokens};

use super::{jan_first_years_before, upload_staged};

/// Official answers when any exist, otherwise the whole thread.
pub fn select_comments(comments: Vec<CommentRecord>) -> Vec<CommentRecord> {
    if comments.iter().any(|c| c.official) {
        comments.into_iter().filter(|c| c.official).collect()
    } else {
        comments
    }
}

fn created_before(post: &Post, cutoff: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(&post.created_at) {
        Ok(created) => created.with_timezone(&Utc) < cutoff,
        Err(e) => {
            tracing::warn!(post = post.id, created_at = %post.created_at, error = %e, "unparseable creation date");
            true
        }
    }
}

pub struct PostsPipeline {
    zendesk: Arc<ZendeskClient>,
    store: PageStore,
    pool: WorkerPool,
    max_age_years: i32,
}

impl PostsPipeline {
    pub fn new(zendesk: Arc<ZendeskClient>, store: PageStore, pool: WorkerPool, max_age_years: i32) -> Self {
        Self {
            zendesk,
            store,
            pool,
            max_age_years,
        }
    }

    fn comment_record(&self, comment: Comment) -> CommentRecord {
        CommentRecord {
            author_id: comment.author_id,
            comment_id: comment.id,
            official: comment.official,
            comment_url: self.zendesk.canonical_url(&comment.html_url, UrlKind::Post),
            comment_body: trim_tokens(&remove_html_tags(&comment.body), MAX_TOKENS),
        }
    }

    pub async fn comments(&self, post_id: u64) -> Result<Vec<CommentRecord>, ZendeskError> {
        let comments = self.zendesk.post_comments(post_id).await?;
        Ok(select_comments(
            comments.into_iter().map(|c| self.comment_record(c)).collect(),
        ))
    }

    async fn fetch_page(&self, page: u32, cutoff: DateTime<Utc>) -> Result<usize, AppError> {
        let listing = self.zendesk.posts_page(page).await?;

        let mut records = Vec::new();
        for post in listing.posts {
            if created_before(&post, cutoff) {
                continue;
            }
            let comments = self.comments(post.id).await?;
            let details = post.details.as_deref().unwrap_or_default();
            records.push(PostRecord {
                post_id: post.id,
                post_title: post.title,
                post_url: self.zendesk.canonical_url(&post.html_url, UrlKind::Post),
                post_details: trim_tokens(&remove_html_tags(details), MAX_TOKENS),
                created_at: post.created_at,
                comments,
            });
        }

        self.store.write_page(page, &records)?;
        tracing::info!(page, posts = records.len(), "staged posts page");
        Ok(records.len())
    }

    /// Stage posts created on or after `cutoff`.
    pub async fn fetch_since(&self, cutoff: DateTime<Utc>) -> Result<RunReport, AppError> {
        let first = self.zendesk.posts_page(1).await?;
        let pages: Vec<u32> = (1..=first.page_count.max(1)).collect();

        let outcome = self.pool.run(pages, |page| self.fetch_page(page, cutoff)).await;
        let staged: usize = outcome.outputs.iter().sum();

        let mut report = outcome
            .to_run_report("fetch posts")
            .with_target(self.store.dir().display().to_string());
        report.note(format!("{staged} posts since {}", cutoff.format("%Y-%m-%d")));
        Ok(report)
    }

    pub async fn fetch(&self) -> Result<RunReport, AppError> {
        self.fetch_since(jan_first_years_before(Utc::now(), self.max_age_years))
            .await
    }

    pub async fn upload(&self, uploader: &Uploader) -> Result<RunReport, AppError> {
        let files = self.store.pages()?.into_iter().map(|(_, path)| path).collect();
        Ok(upload_staged(uploader, &self.pool, files, |r: PostRecord| Some(r.to_document())).await)
    }
}

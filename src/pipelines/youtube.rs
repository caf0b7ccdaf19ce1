//! Channel and playlist transcripts, summarized for the index.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::AppError;
use crate::models::{RunReport, TranscriptRecord, stable_id};
use crate::services::{LanguageModel, PageStore, Uploader, WorkerPool, read_json, write_json};
use crate::sources::{SearchResponse, YoutubeClient};
use crate::utils::file::sanitize_filename;
use crate::utils::text::unescape_entities;

use super::{StagedFile, fold_reports, jan_first_years_before, upload_staged};

pub struct YoutubePipeline {
    channel: PageStore,
    playlists: PathBuf,
    pool: WorkerPool,
    summarize_pool: WorkerPool,
    min_transcript_chars: usize,
}

impl YoutubePipeline {
    pub fn new(
        channel: PageStore,
        playlists: impl Into<PathBuf>,
        pool: WorkerPool,
        summarize_pool: WorkerPool,
        min_transcript_chars: usize,
    ) -> Self {
        Self {
            channel,
            playlists: playlists.into(),
            pool,
            summarize_pool,
            min_transcript_chars,
        }
    }

    /// Transcript text, or empty when the video has none.
    async fn transcript_or_empty(&self, client: &YoutubeClient, video_id: &str) -> String {
        match client.transcript(video_id).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(url = %TranscriptRecord::watch_url(video_id), error = %e, "no transcript");
                String::new()
            }
        }
    }

    async fn record(
        &self,
        client: &YoutubeClient,
        video_id: &str,
        title: &str,
        published_at: &str,
    ) -> TranscriptRecord {
        let source = TranscriptRecord::watch_url(video_id);
        TranscriptRecord {
            article_id: stable_id(&source),
            video_id: video_id.to_string(),
            title: unescape_entities(title),
            published_at: published_at.to_string(),
            transcript: self.transcript_or_empty(client, video_id).await,
            summary: String::new(),
            source,
        }
    }

    async fn stage_search_page(
        &self,
        client: &YoutubeClient,
        number: u32,
        page: &SearchResponse,
    ) -> Result<usize, AppError> {
        let mut records = Vec::new();
        for item in &page.items {
            let Some(video_id) = item.id.video_id.as_deref() else {
                continue;
            };
            tracing::info!(title = %item.snippet.title, "retrieving transcript");
            records.push(
                self.record(client, video_id, &item.snippet.title, &item.snippet.published_at)
                    .await,
            );
        }
        self.channel.write_page(number, &records)?;
        Ok(records.len())
    }

    /// Stage channel videos published since January 1st, `age_years` years ago.
    pub async fn fetch(&self, client: &YoutubeClient, age_years: i32) -> Result<RunReport, AppError> {
        let published_after = jan_first_years_before(Utc::now(), age_years)
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        let pages = client.search_all(&published_after).await?;

        let numbers: Vec<u32> = (0..pages.len() as u32).collect();
        let outcome = self
            .pool
            .run(numbers, |n| self.stage_search_page(client, n, &pages[n as usize]))
            .await;
        let staged: usize = outcome.outputs.iter().sum();

        let mut report = outcome
            .to_run_report("fetch youtube")
            .with_target(self.channel.dir().display().to_string());
        report.note(format!("{staged} videos published after {published_after}"));
        Ok(report)
    }

    /// One file per video below `playlist/{playlist title}/`.
    pub async fn playlist(&self, client: &YoutubeClient, playlist_id: &str) -> Result<RunReport, AppError> {
        let title = client.playlist_title(playlist_id).await?;
        let videos = client.playlist_videos(playlist_id).await?;
        let dir = self.playlists.join(sanitize_filename(&title));

        let dir_ref = &dir;
        let outcome = self
            .pool
            .run(videos.into_iter().map(PlaylistEntry), |entry| async move {
                let video = entry.0;
                let record = self
                    .record(client, &video.video_id, &video.title, &video.published_at)
                    .await;
                let name = format!("{}.json", sanitize_filename(&record.title));
                write_json(&dir_ref.join(name), &[record])?;
                Ok::<_, AppError>(())
            })
            .await;

        Ok(outcome
            .to_run_report("fetch playlist")
            .with_target(dir.display().to_string()))
    }

    fn channel_files(&self, page: Option<u32>) -> Result<Vec<PathBuf>, AppError> {
        Ok(self
            .channel
            .pages()?
            .into_iter()
            .filter(|(n, _)| page.is_none_or(|p| p == *n))
            .map(|(_, path)| path)
            .collect())
    }

    async fn summarize_file(&self, model: &dyn LanguageModel, path: &Path) -> Result<RunReport, AppError> {
        let mut records: Vec<TranscriptRecord> = read_json(path)?;
        let mut report = RunReport::new("summarize");
        report.total = records.len();

        for record in records.iter_mut() {
            if record.transcript.chars().count() <= self.min_transcript_chars {
                record.summary = String::new();
                report.skipped += 1;
                continue;
            }
            match model.summarize_transcript(&record.transcript).await {
                Ok(summary) => {
                    record.summary = summary;
                    report.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!(video = %record.video_id, error = %e, "summary failed");
                    report.fail(record.video_id.clone(), e);
                }
            }
        }

        write_json(path, &records)?;
        Ok(report)
    }

    /// Summarize staged transcripts, one page or all of them.
    pub async fn summarize(&self, model: &dyn LanguageModel, page: Option<u32>) -> Result<RunReport, AppError> {
        let files = self.channel_files(page)?;
        let outcome = self
            .summarize_pool
            .run(files.into_iter().map(StagedFile), |file| async move {
                self.summarize_file(model, &file.0).await
            })
            .await;
        Ok(fold_reports(
            "summarize",
            self.channel.dir().display().to_string(),
            outcome,
        ))
    }

    /// Upload summarized videos; content is the summary.
    pub async fn upload(&self, uploader: &Uploader) -> Result<RunReport, AppError> {
        let files = self.channel_files(None)?;
        Ok(upload_staged(uploader, &self.pool, files, |r: TranscriptRecord| r.to_document()).await)
    }
}

struct PlaylistEntry(crate::sources::PlaylistVideo);

impl std::fmt::Display for PlaylistEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::models::ActionKind;
    use crate::services::uploader::testing::{FakeModel, RecordingIndex};

    fn pipeline(temp: &TempDir, min_chars: usize) -> YoutubePipeline {
        YoutubePipeline::new(
            PageStore::new(temp.path().join("channel")),
            temp.path().join("playlist"),
            WorkerPool::new(2).with_progress(false),
            WorkerPool::new(3).with_progress(false),
            min_chars,
        )
    }

    fn transcript(id: &str, text: &str) -> TranscriptRecord {
        let source = TranscriptRecord::watch_url(id);
        TranscriptRecord {
            article_id: stable_id(&source),
            video_id: id.into(),
            source,
            title: format!("Video {id}"),
            published_at: "2025-01-01T00:00:00Z".into(),
            transcript: text.into(),
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn test_summarize_respects_minimum_length() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp, 10);
        pipeline
            .channel
            .write_page(0, &[transcript("long", "a transcript long enough"), transcript("short", "hi")])
            .unwrap();
        pipeline.channel.write_page(1, &[transcript("other", "also long enough text")]).unwrap();

        let report = pipeline.summarize(&FakeModel::default(), Some(0)).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 1);

        let staged: Vec<TranscriptRecord> = pipeline.channel.read_page(0).unwrap();
        assert_eq!(staged[0].summary, "summary");
        assert_eq!(staged[1].summary, "");
        let untouched: Vec<TranscriptRecord> = pipeline.channel.read_page(1).unwrap();
        assert_eq!(untouched[0].summary, "");
    }

    #[tokio::test]
    async fn test_playlist_writes_one_file_per_video() {
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use crate::models::YoutubeConfig;
        use crate::utils::retry::RetryConfig;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"snippet": {"title": "Beginner: Course"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"snippet": {
                    "title": "Intro &amp; Setup",
                    "publishedAt": "2024-05-01T00:00:00Z",
                    "resourceId": {"videoId": "v1"}
                }}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = YoutubeClient::new("key", "channel", &YoutubeConfig::default(), RetryConfig::new(1))
            .unwrap()
            .with_base_urls(&server.uri(), &server.uri());
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp, 0);

        let report = pipeline.playlist(&client, "PL1").await.unwrap();
        assert!(report.is_clean());

        let file = temp.path().join("playlist/Beginner- Course/Intro & Setup.json");
        let staged: Vec<TranscriptRecord> = read_json(&file).unwrap();
        assert_eq!(staged[0].source, "https://www.youtube.com/watch?v=v1");
        assert!(staged[0].transcript.is_empty());
    }

    #[tokio::test]
    async fn test_upload_only_summarized_videos() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp, 0);
        let mut done = transcript("done", "words");
        done.summary = "what the video teaches".into();
        pipeline.channel.write_page(0, &[done.clone(), transcript("todo", "words")]).unwrap();

        let index = Arc::new(RecordingIndex::named("idx"));
        let uploader = Uploader::new(index.clone(), Arc::new(FakeModel::default()));
        let report = pipeline.upload(&uploader).await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(index.keys(ActionKind::MergeOrUpload), vec![done.article_id]);
        let actions = index.actions.lock().unwrap();
        assert_eq!(
            actions[0].document["YoutubeLinks"],
            serde_json::json!(["https://www.youtube.com/watch?v=done"])
        );
    }
}

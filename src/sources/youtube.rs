//! YouTube Data API and caption retrieval.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, ConfigError, YoutubeError};
use crate::models::{DEFAULT_YOUTUBE_CHANNEL, Environment, YoutubeConfig};
use crate::utils::retry::{RetryConfig, retry};
use crate::utils::text::{collapse_whitespace, unescape_entities};

pub const DATA_API_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const WATCH_URL: &str = "https://www.youtube.com";

static CAPTION_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").unwrap());

static INNER_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub id: ItemId,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemId {
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub resource_id: Option<ItemId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

/// A video listed in a playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistVideo {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

/// Joins caption segments, dropping music cues and lone "foreign" markers.
pub fn clean_transcript<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let kept: Vec<String> = segments
        .into_iter()
        .map(|s| s.replace("[Music]", " "))
        .map(|s| collapse_whitespace(&s))
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("foreign"))
        .collect();
    kept.join(" ")
}

/// Segment texts of a timed-text XML document.
pub fn parse_timed_text(xml: &str) -> Vec<String> {
    CAPTION_TEXT_RE
        .captures_iter(xml)
        .map(|c| {
            // Captions arrive double-escaped (`&amp;#39;`).
            let once = unescape_entities(&c[1]);
            let twice = unescape_entities(&once);
            INNER_TAG_RE.replace_all(&twice, "").to_string()
        })
        .collect()
}

fn caption_tracks(watch_page: &str) -> Option<Vec<CaptionTrack>> {
    let marker = "\"captionTracks\":";
    let start = watch_page.find(marker)? + marker.len();
    serde_json::Deserializer::from_str(&watch_page[start..])
        .into_iter::<Vec<CaptionTrack>>()
        .next()?
        .ok()
}

/// Manually authored track in `language` first, then the auto-generated one.
fn pick_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let matches = |t: &&CaptionTrack| {
        t.language_code == language || t.language_code.starts_with(&format!("{language}-"))
    };
    tracks
        .iter()
        .filter(matches)
        .find(|t| t.kind.as_deref() != Some("asr"))
        .or_else(|| tracks.iter().find(matches))
}

#[derive(Debug, Clone)]
pub struct YoutubeClient {
    client: Client,
    api_url: String,
    watch_url: String,
    api_key: String,
    channel_id: String,
    max_results: u32,
    language: String,
    retry: RetryConfig,
}

impl YoutubeClient {
    pub fn new(
        api_key: impl Into<String>,
        channel_id: impl Into<String>,
        config: &YoutubeConfig,
        retry: RetryConfig,
    ) -> Result<Self, YoutubeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: DATA_API_URL.to_string(),
            watch_url: WATCH_URL.to_string(),
            api_key: api_key.into(),
            channel_id: channel_id.into(),
            max_results: config.max_results,
            language: config.transcript_language.clone(),
            retry,
        })
    }

    pub fn from_env(env: &Environment, config: &YoutubeConfig, retry: RetryConfig) -> Result<Self, AppError> {
        let api_key = env
            .youtube
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingVar("YOUTUBE_API_KEY".to_string()))?;
        let channel_id = env
            .youtube
            .channel_id
            .clone()
            .unwrap_or_else(|| DEFAULT_YOUTUBE_CHANNEL.to_string());
        Ok(Self::new(api_key, channel_id, config, retry)?)
    }

    /// Point the client at other hosts (used against mock servers).
    pub fn with_base_urls(mut self, api_url: &str, watch_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self.watch_url = watch_url.trim_end_matches('/').to_string();
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, YoutubeError> {
        retry(&self.retry, || {
            let request = self.client.get(url).query(query);
            async move {
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(YoutubeError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Ok(response.text().await?)
            }
        })
        .await
    }

    async fn get_api<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, YoutubeError> {
        let url = format!("{}/{}", self.api_url, resource);
        let mut params = query.to_vec();
        params.push(("key", self.api_key.as_str()));
        let body = self.get_text(&url, &params).await?;
        serde_json::from_str(&body).map_err(|e| YoutubeError::ParseError(format!("{resource}: {e}")))
    }

    /// One page of the channel's videos, newest first.
    pub async fn search_page(
        &self,
        published_after: &str,
        page_token: Option<&str>,
    ) -> Result<SearchResponse, YoutubeError> {
        let max_results = self.max_results.to_string();
        self.get_api(
            "search",
            &[
                ("part", "id,snippet"),
                ("channelId", self.channel_id.as_str()),
                ("publishedAfter", published_after),
                ("order", "date"),
                ("maxResults", max_results.as_str()),
                ("pageToken", page_token.unwrap_or_default()),
            ],
        )
        .await
    }

    /// Every search page, following `nextPageToken`.
    pub async fn search_all(&self, published_after: &str) -> Result<Vec<SearchResponse>, YoutubeError> {
        let mut pages = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.search_page(published_after, token.as_deref()).await?;
            let next = page.next_page_token.clone();
            pages.push(page);
            match next {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }
        Ok(pages)
    }

    pub async fn playlist_title(&self, playlist_id: &str) -> Result<String, YoutubeError> {
        let response: PlaylistsResponse = self
            .get_api("playlists", &[("part", "snippet"), ("id", playlist_id)])
            .await?;
        response
            .items
            .into_iter()
            .next()
            .map(|item| unescape_entities(&item.snippet.title))
            .ok_or_else(|| YoutubeError::ParseError(format!("playlist {playlist_id} not found")))
    }

    pub async fn playlist_videos(&self, playlist_id: &str) -> Result<Vec<PlaylistVideo>, YoutubeError> {
        let mut videos = Vec::new();
        let mut token = String::new();
        loop {
            let page: PlaylistItemsResponse = self
                .get_api(
                    "playlistItems",
                    &[
                        ("part", "snippet"),
                        ("playlistId", playlist_id),
                        ("maxResults", "50"),
                        ("pageToken", token.as_str()),
                    ],
                )
                .await?;

            videos.extend(page.items.into_iter().filter_map(|item| {
                let video_id = item.snippet.resource_id.and_then(|r| r.video_id)?;
                Some(PlaylistVideo {
                    video_id,
                    title: unescape_entities(&item.snippet.title),
                    published_at: item.snippet.published_at,
                })
            }));

            match page.next_page_token {
                Some(next) if !next.is_empty() => token = next,
                _ => break,
            }
        }
        Ok(videos)
    }

    /// Transcript text of a video in the configured caption language.
    pub async fn transcript(&self, video_id: &str) -> Result<String, YoutubeError> {
        let watch_url = format!("{}/watch", self.watch_url);
        let page = self.get_text(&watch_url, &[("v", video_id)]).await?;
        let tracks = caption_tracks(&page).ok_or_else(|| YoutubeError::NoTranscript(video_id.to_string()))?;
        let track = pick_track(&tracks, &self.language)
            .ok_or_else(|| YoutubeError::NoTranscript(video_id.to_string()))?;

        let xml = self.get_text(&track.base_url, &[]).await?;
        let segments = parse_timed_text(&xml);
        if segments.is_empty() {
            return Err(YoutubeError::NoTranscript(video_id.to_string()));
        }
        Ok(clean_transcript(segments.iter().map(String::as_str)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> YoutubeClient {
        let retry = RetryConfig::new(1).with_initial_delay(Duration::from_millis(5));
        YoutubeClient::new("key", "channel", &YoutubeConfig::default(), retry)
            .unwrap()
            .with_base_urls(&server.uri(), &server.uri())
    }

    #[test]
    fn test_clean_transcript() {
        let text = clean_transcript(["[Music]", "hello", "foreign", "there  [Music] friend", ""]);
        assert_eq!(text, "hello there friend");
    }

    #[test]
    fn test_parse_timed_text_unescapes() {
        let xml = r#"<?xml version="1.0"?><transcript><text start="0" dur="1">it&amp;#39;s</text><text start="1" dur="2">a &amp;quot;test&amp;quot;</text></transcript>"#;
        assert_eq!(parse_timed_text(xml), vec!["it's", "a \"test\""]);
    }

    #[test]
    fn test_pick_track_prefers_manual() {
        let tracks = vec![
            CaptionTrack {
                base_url: "asr".into(),
                language_code: "en".into(),
                kind: Some("asr".into()),
            },
            CaptionTrack {
                base_url: "manual".into(),
                language_code: "en-US".into(),
                kind: None,
            },
            CaptionTrack {
                base_url: "ko".into(),
                language_code: "ko".into(),
                kind: None,
            },
        ];
        assert_eq!(pick_track(&tracks, "en").unwrap().base_url, "manual");
        assert!(pick_track(&tracks, "ja").is_none());
    }

    #[tokio::test]
    async fn test_request_timeout_comes_from_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"items": []}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = YoutubeConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let retry = RetryConfig::new(1);
        let client = YoutubeClient::new("key", "channel", &config, retry)
            .unwrap()
            .with_base_urls(&server.uri(), &server.uri());

        let result = client.playlist_title("PL1").await;
        assert!(matches!(result, Err(YoutubeError::RequestError(ref e)) if e.is_timeout()));
    }

    #[tokio::test]
    async fn test_search_all_follows_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("pageToken", ""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nextPageToken": "B",
                "items": [{"id": {"videoId": "v1"}, "snippet": {"title": "One", "publishedAt": "2024-01-02T00:00:00Z"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("pageToken", "B"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": {"kind": "youtube#playlist"}, "snippet": {"title": "List"}}]
            })))
            .mount(&server)
            .await;

        let pages = client(&server).search_all("2023-01-01T00:00:00Z").await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].items[0].id.video_id.as_deref(), Some("v1"));
        assert!(pages[1].items[0].id.video_id.is_none());
    }

    #[tokio::test]
    async fn test_transcript_from_watch_page() {
        let server = MockServer::start().await;
        let track_url = format!("{}/timedtext?v=abc", server.uri());
        let watch_page = format!(
            r#"<html><script>var x = {{"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"{track_url}","name":{{"simpleText":"English"}},"languageCode":"en","kind":"asr"}}],"audioTracks":[]}}}}}};</script></html>"#
        );
        Mock::given(method("GET"))
            .and(path("/watch"))
            .and(query_param("v", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(watch_page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/timedtext"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<transcript><text start="0">[Music]</text><text start="1">make a shirt</text></transcript>"#,
            ))
            .mount(&server)
            .await;

        let transcript = client(&server).transcript("abc").await.unwrap();
        assert_eq!(transcript, "make a shirt");
    }

    #[tokio::test]
    async fn test_transcript_missing_captions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let err = client(&server).transcript("none").await.unwrap_err();
        assert!(matches!(err, YoutubeError::NoTranscript(_)));
    }
}

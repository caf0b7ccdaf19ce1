//! Hosted language model client: embeddings, summaries and labels.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LlmError};
use crate::models::{OpenAiConfig, OpenAiCredentials};
use crate::utils::retry::{RetryConfig, retry};
use crate::utils::text::trim_tokens;

const MAX_LABELS: usize = 10;

const PDF_SUMMARY_PROMPT: &str = "You summarize technical documents about 3D garment design software. \
Write a concise summary in the document's language that keeps product names, menu paths and feature names. \
Reply with the summary only.";

const TRANSCRIPT_SUMMARY_PROMPT: &str = "You summarize transcripts of tutorial videos about 3D garment design software. \
Describe what the video teaches and the tools and steps it covers in a few short paragraphs. \
Reply with the summary only.";

const LABELS_PROMPT: &str = "Read the document and return between three and ten short topic labels for it. \
Reply with a JSON array of strings and nothing else.";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Embedding and chat completion, the two calls every pipeline needs.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    async fn chat(&self, system: &str, user: &str) -> Result<String, LlmError>;

    async fn summarize_pdf(&self, text: &str) -> Result<String, LlmError> {
        self.chat(PDF_SUMMARY_PROMPT, text).await
    }

    async fn summarize_transcript(&self, text: &str) -> Result<String, LlmError> {
        self.chat(TRANSCRIPT_SUMMARY_PROMPT, text).await
    }

    async fn generate_labels(&self, text: &str) -> Result<Vec<String>, LlmError> {
        let reply = self.chat(LABELS_PROMPT, text).await?;
        Ok(parse_labels(&reply))
    }
}

/// Labels from a model reply: a JSON array when possible, otherwise a comma/line list.
pub fn parse_labels(reply: &str) -> Vec<String> {
    let trimmed = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let raw: Vec<String> = match serde_json::from_str::<Vec<String>>(trimmed) {
        Ok(labels) => labels,
        Err(_) => trimmed
            .split([',', '\n'])
            .map(|s| s.to_string())
            .collect(),
    };

    let mut labels: Vec<String> = Vec::new();
    for label in raw {
        let label = label
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim()
            .trim_matches(['"', '\''])
            .trim()
            .to_string();
        if !label.is_empty() && !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels.truncate(MAX_LABELS);
    labels
}

/// Client for an Azure OpenAI resource.
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    chat_deployment: Option<String>,
    embedding_deployment: Option<String>,
    max_input_tokens: usize,
    temperature: f32,
    retry: RetryConfig,
}

impl AzureOpenAiClient {
    pub fn new(
        credentials: &OpenAiCredentials,
        config: &OpenAiConfig,
        retry: RetryConfig,
    ) -> Result<Self, LlmError> {
        let endpoint = credentials
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("AZURE_OPENAI_SERVICE".to_string()))?;
        let api_key = credentials
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("AZURE_OPENAI_KEY".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_version: config.api_version.clone(),
            chat_deployment: credentials.chat_deployment.clone(),
            embedding_deployment: credentials.embedding_deployment.clone(),
            max_input_tokens: config.max_input_tokens,
            temperature: config.temperature,
            retry,
        })
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, deployment, operation, self.api_version
        )
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        retry(&self.retry, || {
            let request = self
                .client
                .post(url)
                .header("api-key", &self.api_key)
                .json(body);

            async move {
                let response = request.send().await.map_err(|e| {
                    if e.is_timeout() {
                        LlmError::Timeout
                    } else if e.is_connect() {
                        LlmError::ConnectionError(e.to_string())
                    } else {
                        LlmError::RequestError(e)
                    }
                })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(LlmError::ServerError {
                        status: status.as_u16(),
                        body,
                    });
                }

                response
                    .json::<R>()
                    .await
                    .map_err(|e| LlmError::InvalidResponse(e.to_string()))
            }
        })
        .await
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if text.trim().is_empty() {
            return Err(LlmError::InvalidInput("cannot embed empty text".to_string()));
        }
        let deployment = self.embedding_deployment.as_deref().ok_or_else(|| {
            LlmError::InvalidInput("AZURE_OPENAI_EMB_DEPLOYMENT is not set".to_string())
        })?;

        let input = trim_tokens(text, self.max_input_tokens);
        let url = self.deployment_url(deployment, "embeddings");
        let response: EmbeddingResponse = self
            .post(&url, &EmbeddingRequest { input: &input })
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::InvalidResponse("empty embedding response".to_string()))
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, LlmError> {
        if user.trim().is_empty() {
            return Err(LlmError::InvalidInput("empty prompt".to_string()));
        }
        let deployment = self.chat_deployment.as_deref().ok_or_else(|| {
            LlmError::InvalidInput("AZURE_OPENAI_CHATGPT_DEPLOYMENT is not set".to_string())
        })?;

        let user = trim_tokens(user, self.max_input_tokens);
        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
        };
        let url = self.deployment_url(deployment, "chat/completions");
        let response: ChatResponse = self.post(&url, &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("empty completion".to_string()))
    }
}

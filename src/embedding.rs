use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Converts text into a fixed-length embedding vector. The seam between
/// the indexing/search pipeline and the external provider; tests substitute
/// a deterministic implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn generate(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Embedding client for OpenRouter-compatible `/embeddings` endpoints.
///
/// A provider failure is logged and propagated with no retry and no
/// fallback: a failed embedding call aborts the enclosing indexing or
/// search operation.
pub struct OpenRouterEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenRouterEmbedder {
    pub fn new(config: &SearchConfig) -> AppResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::Validation("embedding API key is empty".into()));
        }
        url::Url::parse(&config.base_url)
            .map_err(|e| AppError::Validation(format!("invalid embedding base URL: {e}")))?;

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| AppError::Validation(format!("invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        // Site attribution headers, forwarded with every provider call
        headers.insert(
            HeaderName::from_static("http-referer"),
            HeaderValue::from_str(&config.site_url)
                .map_err(|e| AppError::Validation(format!("invalid site URL: {e}")))?,
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            HeaderValue::from_str(&config.site_name)
                .map_err(|e| AppError::Validation(format!("invalid site name: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }
}

/// Embedding providers are sensitive to literal newlines in the input.
fn normalize_input(text: &str) -> String {
    text.replace('\n', " ")
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenRouterEmbedder {
    async fn generate(&self, text: &str) -> AppResult<Vec<f32>> {
        let input = normalize_input(text);
        let request = EmbeddingRequest {
            model: &self.model,
            input: &input,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                eprintln!("[embedding] OpenRouter request error: {e}");
                AppError::Provider(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            eprintln!("[embedding] OpenRouter error ({status}): {body}");
            return Err(AppError::Provider(format!(
                "embeddings request failed ({status}): {body}"
            )));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            eprintln!("[embedding] OpenRouter response parse error: {e}");
            AppError::Provider(format!("failed to parse embeddings response: {e}"))
        })?;

        let first = parsed.data.into_iter().next().ok_or_else(|| {
            eprintln!("[embedding] OpenRouter returned no embedding data");
            AppError::Provider("embeddings response contained no data".into())
        })?;

        Ok(first.embedding)
    }
}

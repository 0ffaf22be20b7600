//! Remote batched backend.
//!
//! Documents go to the scoring service in fixed-size batches, one
//! sequential call per batch. A document the service rejects becomes an
//! `unknown` score with zeroed confidences; a failure of the call itself
//! (network, auth, non-2xx, malformed or short-counted response) aborts
//! the stage.

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::http::HttpClient;
use super::SentimentBackend;
use crate::config::RemoteScoringConfig;
use crate::error::PipelineError;
use crate::records::{DocumentScore, Sentiment};

const API_KEY_HEADER: &str = "api-key";

#[derive(Serialize)]
struct BatchRequest {
    documents: Vec<RequestDocument>,
}

#[derive(Serialize)]
struct RequestDocument {
    id: String,
    language: &'static str,
    text: String,
}

#[derive(Deserialize)]
pub(crate) struct BatchResponse {
    #[serde(default)]
    documents: Vec<ResponseDocument>,
    #[serde(default)]
    errors: Vec<ResponseError>,
}

#[derive(Deserialize)]
struct ResponseDocument {
    id: String,
    sentiment: Sentiment,
    #[serde(rename = "confidenceScores")]
    confidence_scores: ConfidenceScores,
}

#[derive(Deserialize)]
struct ConfidenceScores {
    positive: f64,
    neutral: f64,
    negative: f64,
}

#[derive(Deserialize)]
struct ResponseError {
    id: String,
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Deserialize, Default)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

pub struct RemoteBackend<C: HttpClient> {
    client: C,
    endpoint: reqwest::Url,
    api_key: HeaderValue,
    batch_size: usize,
}

impl<C: HttpClient> RemoteBackend<C> {
    pub fn new(
        client: C,
        cfg: &RemoteScoringConfig,
        batch_size: usize,
    ) -> Result<Self, PipelineError> {
        let endpoint: reqwest::Url = cfg.endpoint.parse().map_err(|e| {
            PipelineError::Configuration(format!("SENTIMENT_API_ENDPOINT is not a valid URL: {e}"))
        })?;
        let api_key = HeaderValue::from_str(&cfg.api_key).map_err(|_| {
            PipelineError::Configuration(
                "SENTIMENT_API_KEY contains characters not allowed in a header".to_string(),
            )
        })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            batch_size: batch_size.max(1),
        })
    }

    fn build_request(&self, batch: &BatchRequest) -> Result<reqwest::Request, PipelineError> {
        let mut req = reqwest::Request::new(reqwest::Method::POST, self.endpoint.clone());
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        req.headers_mut().insert(API_KEY_HEADER, self.api_key.clone());

        let body = serde_json::to_vec(batch).map_err(|e| {
            PipelineError::ScoringService(format!("failed to encode request body: {e}"))
        })?;
        *req.body_mut() = Some(body.into());
        Ok(req)
    }

    async fn call(&self, batch: &BatchRequest) -> Result<BatchResponse, PipelineError> {
        let req = self.build_request(batch)?;

        let response = self.client.execute(req).await.map_err(|e| {
            PipelineError::ScoringService(format!("sentiment request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ScoringService(format!(
                "sentiment service returned {status}: {body}"
            )));
        }

        response.json().await.map_err(|e| {
            PipelineError::ScoringService(format!("invalid sentiment response: {e}"))
        })
    }
}

/// Maps one call's response back onto the submitted documents.
///
/// Document ids are the running record index, so every submitted id must
/// come back exactly once, as a result or as a provider-side error. A
/// response with missing or surplus ids is a call-level failure.
pub(crate) fn map_batch(
    count: usize,
    offset: usize,
    response: &BatchResponse,
) -> Result<Vec<DocumentScore>, PipelineError> {
    if response.documents.len() + response.errors.len() != count {
        return Err(PipelineError::ScoringService(format!(
            "service returned {} results for {} submitted documents",
            response.documents.len() + response.errors.len(),
            count
        )));
    }

    let scored: HashMap<&str, &ResponseDocument> = response
        .documents
        .iter()
        .map(|d| (d.id.as_str(), d))
        .collect();
    let failed: HashMap<&str, &ResponseError> = response
        .errors
        .iter()
        .map(|e| (e.id.as_str(), e))
        .collect();

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let id = (offset + i).to_string();
        if let Some(doc) = scored.get(id.as_str()) {
            out.push(DocumentScore {
                sentiment: doc.sentiment,
                pos: doc.confidence_scores.positive,
                neu: doc.confidence_scores.neutral,
                neg: doc.confidence_scores.negative,
            });
        } else if let Some(err) = failed.get(id.as_str()) {
            warn!(
                document = %id,
                message = %err.error.message,
                "Provider could not score document; recording unknown"
            );
            out.push(DocumentScore::unknown());
        } else {
            return Err(PipelineError::ScoringService(format!(
                "service response is missing a result for document {id}"
            )));
        }
    }
    Ok(out)
}

#[async_trait::async_trait]
impl<C: HttpClient> SentimentBackend for RemoteBackend<C> {
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<DocumentScore>, PipelineError> {
        let mut out = Vec::with_capacity(texts.len());

        for (batch_index, chunk) in texts.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            let batch = BatchRequest {
                documents: chunk
                    .iter()
                    .enumerate()
                    .map(|(i, text)| RequestDocument {
                        id: (offset + i).to_string(),
                        language: "en",
                        text: text.clone(),
                    })
                    .collect(),
            };

            debug!(batch = batch_index, documents = chunk.len(), "Scoring batch");
            let response = self.call(&batch).await?;
            out.extend(map_batch(chunk.len(), offset, &response)?);
        }

        Ok(out)
    }
}

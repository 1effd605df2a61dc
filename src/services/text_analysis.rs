//! # Text Analysis Client
//!
//! Sentiment for individual transcribed spans and topic classification for
//! whole-session transcripts, both served by the text-analysis service.
//! Neither call is ever fatal: sentiment defaults to neutral per span and
//! topic defaults to unknown at finalization.

use crate::services::{ServiceError, ServiceOutcome, NEUTRAL_SENTIMENT, UNKNOWN_TOPIC};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    sentiment: String,
}

#[derive(Debug, Deserialize)]
struct TopicResponse {
    topic: String,
}

pub struct TextAnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl TextAnalysisClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub async fn sentiment(&self, text: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(format!("{}/sentiment", self.base_url))
            .json(&json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status { service: "text sentiment", status: response.status() });
        }

        let parsed: SentimentResponse = response.json().await?;
        Ok(parsed.sentiment)
    }

    /// Sentiment with the neutral fallback used by the pipeline.
    pub async fn sentiment_or_default(&self, text: &str) -> ServiceOutcome<String> {
        match self.sentiment(text).await {
            Ok(sentiment) => ServiceOutcome::Reported(sentiment),
            Err(err) => {
                warn!(error = %err, "text sentiment failed, recording neutral");
                ServiceOutcome::Defaulted(NEUTRAL_SENTIMENT.to_string())
            }
        }
    }

    pub async fn topic(&self, text: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(format!("{}/topic", self.base_url))
            .json(&json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status { service: "topic analysis", status: response.status() });
        }

        let parsed: TopicResponse = response.json().await?;
        Ok(parsed.topic)
    }

    /// Topic with the unknown fallback used at finalization.
    pub async fn topic_or_default(&self, text: &str) -> ServiceOutcome<String> {
        match self.topic(text).await {
            Ok(topic) => ServiceOutcome::Reported(topic),
            Err(err) => {
                warn!(error = %err, "topic analysis failed, recording unknown topic");
                ServiceOutcome::Defaulted(UNKNOWN_TOPIC.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Client pointed at a port nothing listens on.
    fn unreachable_client() -> TextAnalysisClient {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        TextAnalysisClient::new(client, "http://127.0.0.1:9".to_string())
    }

    #[tokio::test]
    async fn sentiment_defaults_to_neutral_when_service_is_down() {
        let outcome = unreachable_client().sentiment_or_default("hello").await;
        assert!(outcome.is_defaulted());
        assert_eq!(outcome.value(), NEUTRAL_SENTIMENT);
    }

    #[tokio::test]
    async fn topic_defaults_to_unknown_when_service_is_down() {
        let outcome = unreachable_client().topic_or_default("hello world").await;
        assert!(outcome.is_defaulted());
        assert_eq!(outcome.value(), UNKNOWN_TOPIC);
    }
}

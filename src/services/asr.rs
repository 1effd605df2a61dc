//! # Speech-to-Text Client
//!
//! Posts raw utterance PCM to the transcription service and parses the
//! returned sub-segments. Transcription failure is the one service failure
//! the pipeline treats as fatal for an utterance, so this client does not
//! offer a defaulting wrapper.

use crate::services::ServiceError;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

/// One transcribed span, with timings relative to the uploaded clip.
#[derive(Debug, Clone, Deserialize)]
pub struct AsrSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Full transcription response for one utterance.
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub segments: Vec<AsrSegment>,

    /// Language detected for the whole clip.
    #[serde(default)]
    pub language: String,
}

pub struct AsrClient {
    client: reqwest::Client,
    base_url: String,
}

impl AsrClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Transcribe one utterance of raw 16kHz mono PCM.
    pub async fn transcribe(&self, pcm: &[u8]) -> Result<Transcription, ServiceError> {
        let response = self
            .client
            .post(&self.base_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(pcm.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status { service: "transcription", status: response.status() });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transcription_response() {
        let json = r#"{
            "segments": [
                {"start": 0.0, "end": 2.4, "text": "good morning"},
                {"start": 2.6, "end": 4.0, "text": "everyone"}
            ],
            "language": "en"
        }"#;

        let transcription: Transcription = serde_json::from_str(json).unwrap();
        assert_eq!(transcription.segments.len(), 2);
        assert_eq!(transcription.segments[1].text, "everyone");
        assert_eq!(transcription.language, "en");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let transcription: Transcription = serde_json::from_str("{}").unwrap();
        assert!(transcription.segments.is_empty());
        assert!(transcription.language.is_empty());
    }
}

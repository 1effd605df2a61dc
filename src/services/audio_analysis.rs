//! # Audio Analysis Client
//!
//! Talks to the audio-analysis service for two things: per-utterance voice
//! sentiment plus speaker identification, and speaker enrollment of new
//! users. Clip bytes travel base64-encoded inside JSON bodies.

use crate::services::{ServiceError, ServiceOutcome};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

fn unknown() -> String {
    "Unknown".to_string()
}

/// Voice sentiment and speaker identity for one utterance.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VoiceProfile {
    #[serde(default = "unknown")]
    pub voice_sentiment: String,

    /// Speaker id as known to the recognition model, or "Unknown".
    #[serde(default = "unknown")]
    pub speaker: String,

    #[serde(default)]
    pub similarity_score: f64,
}

impl VoiceProfile {
    /// Profile recorded when the service cannot be reached.
    pub fn unknown() -> Self {
        Self {
            voice_sentiment: unknown(),
            speaker: unknown(),
            similarity_score: 0.0,
        }
    }
}

pub struct AudioAnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl AudioAnalysisClient {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string() }
    }

    /// Analyze one utterance WAV for voice sentiment and speaker identity.
    pub async fn analyze(&self, wav: &[u8]) -> Result<VoiceProfile, ServiceError> {
        let body = json!({ "wav_file": BASE64.encode(wav) });
        let response = self
            .client
            .post(format!("{}/analyze_audio", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status { service: "audio analysis", status: response.status() });
        }

        Ok(response.json().await?)
    }

    /// Analyze with the unknown-profile fallback the pipeline uses: an
    /// unreachable analysis service never drops a segment.
    pub async fn analyze_or_default(&self, wav: &[u8]) -> ServiceOutcome<VoiceProfile> {
        match self.analyze(wav).await {
            Ok(profile) => ServiceOutcome::Reported(profile),
            Err(err) => {
                warn!(error = %err, "audio analysis failed, recording unknown profile");
                ServiceOutcome::Defaulted(VoiceProfile::unknown())
            }
        }
    }

    /// Enroll a user's reference clip with the recognition model.
    pub async fn enroll(&self, user_id: i64, wav: &[u8]) -> Result<(), ServiceError> {
        let body = json!({
            "speaker": user_id.to_string(),
            "wav_file": BASE64.encode(wav),
        });
        let response = self
            .client
            .post(format!("{}/identificate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status { service: "enrollment", status: response.status() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_response() {
        let json = r#"{"voice_sentiment": "Calm", "speaker": "3", "similarity_score": 0.91}"#;
        let profile: VoiceProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.voice_sentiment, "Calm");
        assert_eq!(profile.speaker, "3");
        assert!((profile.similarity_score - 0.91).abs() < 1e-9);
    }

    #[test]
    fn partial_response_falls_back_to_unknown_fields() {
        let profile: VoiceProfile = serde_json::from_str("{}").unwrap();
        assert_eq!(profile, VoiceProfile::unknown());
    }
}

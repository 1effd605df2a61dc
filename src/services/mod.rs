//! # Analysis Service Clients
//!
//! Thin typed clients for the three backing microservices: speech-to-text,
//! audio analysis (voice sentiment + speaker identification), and text
//! analysis (sentiment + topic). One `reqwest` client is shared per process
//! so connections are pooled, and every call carries a 60 second total
//! timeout.
//!
//! ## Failure Policy:
//! Transport errors and non-2xx responses surface as `ServiceError`. The
//! pipeline decides per service whether a failure is fatal for the
//! utterance (transcription) or replaced with defaults (everything else);
//! the `ServiceOutcome` wrapper records which of the two happened so the
//! decision stays observable downstream.

pub mod asr;
pub mod audio_analysis;
pub mod text_analysis;

pub use asr::{AsrClient, AsrSegment, Transcription};
pub use audio_analysis::{AudioAnalysisClient, VoiceProfile};
pub use text_analysis::TextAnalysisClient;

use crate::config::ServicesConfig;
use std::time::Duration;
use thiserror::Error;

/// Total per-call timeout shared by every service client.
pub const SERVICE_TIMEOUT: Duration = Duration::from_secs(60);

/// Sentiment recorded when the text-analysis service is unavailable.
pub const NEUTRAL_SENTIMENT: &str = "Neutral";

/// Topic recorded when topic analysis fails or there is nothing to analyze.
pub const UNKNOWN_TOPIC: &str = "Unknown";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{service} service returned {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },
}

/// Result of a call whose failure is absorbed by a default value. Keeping
/// the distinction lets callers log and tests assert that defaulting
/// actually happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOutcome<T> {
    /// The service answered and this is its value.
    Reported(T),
    /// The call failed and this is the substitute value.
    Defaulted(T),
}

impl<T> ServiceOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            ServiceOutcome::Reported(value) | ServiceOutcome::Defaulted(value) => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            ServiceOutcome::Reported(value) | ServiceOutcome::Defaulted(value) => value,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, ServiceOutcome::Defaulted(_))
    }
}

/// The process-wide set of service clients, one per backing service.
pub struct ServiceClients {
    pub asr: AsrClient,
    pub audio: AudioAnalysisClient,
    pub text: TextAnalysisClient,
}

impl ServiceClients {
    pub fn from_config(config: &ServicesConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SERVICE_TIMEOUT)
            .build()?;

        Ok(Self {
            asr: AsrClient::new(client.clone(), config.asr_url.clone()),
            audio: AudioAnalysisClient::new(client.clone(), config.audio_analysis_url.clone()),
            text: TextAnalysisClient::new(client, config.text_analysis_url.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_exposes_value_regardless_of_variant() {
        let reported = ServiceOutcome::Reported("Positive".to_string());
        let defaulted = ServiceOutcome::Defaulted(NEUTRAL_SENTIMENT.to_string());

        assert_eq!(reported.value(), "Positive");
        assert!(!reported.is_defaulted());
        assert_eq!(defaulted.value(), NEUTRAL_SENTIMENT);
        assert!(defaulted.is_defaulted());
        assert_eq!(defaulted.into_value(), NEUTRAL_SENTIMENT);
    }
}

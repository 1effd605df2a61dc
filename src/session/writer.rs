//! # Outbound Channel Writer
//!
//! Pipeline tasks for different utterances finish in arbitrary order but
//! share one duplex channel back to the client, and the underlying session
//! does not tolerate concurrent writers. `ResultWriter` is the only handle
//! the rest of the gateway gets: it owns the session behind a mutex held
//! across each complete send, so messages can never interleave.

use actix_ws::{Closed, Session};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::session::pipeline::EnrichedSegment;

/// Body of a `live_analysis` push, in the field naming the frontend expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAnalysisPayload {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub text_sentiment: String,
    pub voice_sentiment: String,
    pub speaker: String,
    pub similarity_score: f64,
}

impl From<&EnrichedSegment> for LiveAnalysisPayload {
    fn from(segment: &EnrichedSegment) -> Self {
        Self {
            start: segment.start_seconds,
            end: segment.end_seconds,
            text: segment.text.clone(),
            text_sentiment: segment.text_sentiment.clone(),
            voice_sentiment: segment.voice_sentiment.clone(),
            speaker: segment.speaker_display.clone(),
            similarity_score: segment.similarity_score,
        }
    }
}

/// Envelope for every message pushed to the client.
#[derive(Debug, Clone, Serialize)]
pub struct LiveMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: LiveAnalysisPayload,
}

impl LiveMessage {
    pub fn analysis(segment: &EnrichedSegment) -> Self {
        Self { kind: "live_analysis", payload: segment.into() }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("client channel is closed")]
    ChannelClosed,

    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<Closed> for WriteError {
    fn from(_: Closed) -> Self {
        WriteError::ChannelClosed
    }
}

/// Mutex-serialized writer over one client's duplex channel.
#[derive(Clone)]
pub struct ResultWriter {
    session: Arc<Mutex<Session>>,
}

impl ResultWriter {
    pub fn new(session: Session) -> Self {
        Self { session: Arc::new(Mutex::new(session)) }
    }

    /// Send one message to the client. The session lock is held for the
    /// whole send, so concurrent pipeline tasks cannot interleave frames.
    pub async fn write(&self, message: &LiveMessage) -> Result<(), WriteError> {
        let json = serde_json::to_string(message)?;
        let mut session = self.session.lock().await;
        session.text(json).await?;
        Ok(())
    }

    /// Answer a protocol ping.
    pub async fn pong(&self, payload: &[u8]) -> Result<(), WriteError> {
        let mut session = self.session.lock().await;
        session.pong(payload).await?;
        Ok(())
    }

    /// Close the channel once the session is fully finalized.
    pub async fn close(&self) {
        let session = self.session.lock().await.clone();
        let _ = session.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_segment() -> EnrichedSegment {
        EnrichedSegment {
            record_id: "sess_test".into(),
            start_seconds: 1.25,
            end_seconds: 3.5,
            text: "hello there".into(),
            text_sentiment: "Positive".into(),
            voice_sentiment: "Calm".into(),
            speaker_display: "Ada Lovelace".into(),
            similarity_score: 0.87,
        }
    }

    #[test]
    fn live_message_uses_frontend_field_names() {
        let message = LiveMessage::analysis(&sample_segment());
        let json = serde_json::to_string(&message).unwrap();

        assert!(json.contains(r#""type":"live_analysis""#));
        assert!(json.contains(r#""textSentiment":"Positive""#));
        assert!(json.contains(r#""voiceSentiment":"Calm""#));
        assert!(json.contains(r#""similarityScore":0.87"#));
        assert!(json.contains(r#""speaker":"Ada Lovelace""#));
        assert!(json.contains(r#""start":1.25"#));
        assert!(json.contains(r#""end":3.5"#));
    }

    #[test]
    fn payload_carries_segment_values_verbatim() {
        let segment = sample_segment();
        let payload = LiveAnalysisPayload::from(&segment);
        assert_eq!(payload.text, segment.text);
        assert_eq!(payload.start, segment.start_seconds);
        assert_eq!(payload.end, segment.end_seconds);
    }
}

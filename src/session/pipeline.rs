//! # Utterance Analysis Pipeline
//!
//! Each closed utterance is handed to `SegmentPipeline::dispatch`, which
//! spawns one background task running the multi-service fan-out:
//!
//! 1. Transcription of the raw PCM. A failure here drops the utterance
//!    entirely (nothing is persisted, nothing is pushed).
//! 2. Per transcribed sub-segment, independently: text sentiment, audio
//!    analysis over the utterance WAV, speaker display resolution,
//!    persistence, and a live push to the client.
//!
//! Sub-segments of one utterance are processed in transcription order.
//! Tasks of different utterances run concurrently; the client reconciles by
//! start offset.

use crate::audio::segmenter::Utterance;
use crate::audio::wav;
use crate::db::Store;
use crate::services::{AsrSegment, ServiceOutcome, VoiceProfile};
use crate::session::tracker::PipelineTracker;
use crate::session::writer::{LiveMessage, ResultWriter};
use crate::state::AppState;
use actix_web::web;
use tracing::{debug, error, warn};

/// Fully analyzed sub-segment, as persisted and as pushed to the client.
#[derive(Debug, Clone)]
pub struct EnrichedSegment {
    pub record_id: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
    pub text_sentiment: String,
    pub voice_sentiment: String,
    pub speaker_display: String,
    pub similarity_score: f64,
}

/// Per-session dispatcher for utterance analysis tasks.
///
/// Holds only shareable handles; cloning it into a spawned task is how an
/// utterance gets its immutable copies of everything it needs.
#[derive(Clone)]
pub struct SegmentPipeline {
    record_id: String,
    state: web::Data<AppState>,
    writer: ResultWriter,
    tracker: PipelineTracker,
}

impl SegmentPipeline {
    pub fn new(
        record_id: String,
        state: web::Data<AppState>,
        writer: ResultWriter,
        tracker: PipelineTracker,
    ) -> Self {
        Self { record_id, state, writer, tracker }
    }

    /// Launch the analysis task for one utterance.
    ///
    /// The tracker slot is taken before the spawn so the finalizer's drain
    /// barrier can never observe a dispatched-but-unregistered task.
    pub fn dispatch(&self, utterance: Utterance) {
        let guard = self.tracker.register();
        let pipeline = self.clone();
        self.state.record_dispatch();

        tokio::spawn(async move {
            let _guard = guard;
            pipeline.run(utterance).await;
        });
    }

    async fn run(&self, utterance: Utterance) {
        let services = self.state.services();

        let transcription = match services.asr.transcribe(&utterance.pcm).await {
            Ok(transcription) => transcription,
            Err(err) => {
                error!(
                    record_id = %self.record_id,
                    error = %err,
                    "transcription failed, dropping utterance"
                );
                return;
            }
        };

        debug!(
            record_id = %self.record_id,
            sub_segments = transcription.segments.len(),
            language = %transcription.language,
            start_seconds = utterance.start_seconds,
            "utterance transcribed"
        );

        // The analysis service gets the whole utterance, not a per-span
        // slice; speaker identity needs the full context.
        let utterance_wav = wav::encode(&utterance.pcm);

        for sub in &transcription.segments {
            let text_sentiment = services.text.sentiment_or_default(&sub.text).await;
            let profile = services.audio.analyze_or_default(&utterance_wav).await;
            let speaker_display = resolve_speaker(self.state.store(), &profile.value().speaker);

            let segment = enrich(
                &self.record_id,
                utterance.start_seconds,
                sub,
                &text_sentiment,
                &profile,
                speaker_display,
            );

            if let Err(err) = self.state.store().append_segment(&segment) {
                error!(record_id = %self.record_id, error = %err, "failed to persist segment");
            } else {
                self.state.record_segment_persisted();
            }

            // The client still gets the result even when persistence failed.
            if let Err(err) = self.writer.write(&LiveMessage::analysis(&segment)).await {
                warn!(record_id = %self.record_id, error = %err, "failed to push live result");
            } else {
                self.state.record_live_message();
            }
        }
    }
}

/// Replace a recognized speaker id with the enrolled user's display name.
/// Unrecognized, empty, or unresolvable ids pass through unchanged.
fn resolve_speaker(store: &Store, speaker: &str) -> String {
    if speaker.is_empty() || speaker == "Unknown" {
        return speaker.to_string();
    }

    let user = speaker
        .parse::<i64>()
        .ok()
        .and_then(|id| store.find_user(id).ok().flatten());

    match user {
        Some(user) => format!("{} {}", user.name, user.surname),
        None => speaker.to_string(),
    }
}

/// Combine the per-service outcomes for one sub-segment into the final
/// segment, rebasing the span timings onto the session timeline.
fn enrich(
    record_id: &str,
    offset_seconds: f64,
    sub: &AsrSegment,
    text_sentiment: &ServiceOutcome<String>,
    profile: &ServiceOutcome<VoiceProfile>,
    speaker_display: String,
) -> EnrichedSegment {
    EnrichedSegment {
        record_id: record_id.to_string(),
        start_seconds: offset_seconds + sub.start,
        end_seconds: offset_seconds + sub.end,
        text: sub.text.clone(),
        text_sentiment: text_sentiment.value().clone(),
        voice_sentiment: profile.value().voice_sentiment.clone(),
        speaker_display,
        similarity_score: profile.value().similarity_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::NEUTRAL_SENTIMENT;
    use chrono::Utc;

    fn sub_segment(start: f64, end: f64, text: &str) -> AsrSegment {
        AsrSegment { start, end, text: text.to_string() }
    }

    #[test]
    fn enrich_rebases_span_onto_session_timeline() {
        let sub = sub_segment(0.5, 2.0, "hello");
        let text = ServiceOutcome::Reported("Positive".to_string());
        let profile = ServiceOutcome::Reported(VoiceProfile {
            voice_sentiment: "Calm".to_string(),
            speaker: "1".to_string(),
            similarity_score: 0.9,
        });

        let segment = enrich("sess_x", 4.6, &sub, &text, &profile, "Ada Lovelace".to_string());
        assert_eq!(segment.start_seconds, 5.1);
        assert_eq!(segment.end_seconds, 6.6);
        assert_eq!(segment.text, "hello");
        assert_eq!(segment.text_sentiment, "Positive");
        assert_eq!(segment.voice_sentiment, "Calm");
        assert_eq!(segment.speaker_display, "Ada Lovelace");
    }

    #[test]
    fn defaulted_services_still_produce_a_full_segment() {
        let sub = sub_segment(0.0, 1.0, "garbled");
        let text = ServiceOutcome::Defaulted(NEUTRAL_SENTIMENT.to_string());
        let profile = ServiceOutcome::Defaulted(VoiceProfile::unknown());

        assert!(text.is_defaulted());
        assert!(profile.is_defaulted());

        let speaker = profile.value().speaker.clone();
        let segment = enrich("sess_x", 0.0, &sub, &text, &profile, speaker);
        assert_eq!(segment.text_sentiment, NEUTRAL_SENTIMENT);
        assert_eq!(segment.voice_sentiment, "Unknown");
        assert_eq!(segment.speaker_display, "Unknown");
        assert_eq!(segment.similarity_score, 0.0);
        // The transcribed text is untouched by analysis failures.
        assert_eq!(segment.text, "garbled");
    }

    #[test]
    fn mixed_outcomes_keep_the_successful_values() {
        let sub = sub_segment(1.0, 2.5, "fine");
        let text = ServiceOutcome::Defaulted(NEUTRAL_SENTIMENT.to_string());
        let profile = ServiceOutcome::Reported(VoiceProfile {
            voice_sentiment: "Excited".to_string(),
            speaker: "7".to_string(),
            similarity_score: 0.73,
        });

        let segment = enrich("sess_x", 0.0, &sub, &text, &profile, "7".to_string());
        assert_eq!(segment.text_sentiment, NEUTRAL_SENTIMENT);
        assert_eq!(segment.voice_sentiment, "Excited");
        assert!((segment.similarity_score - 0.73).abs() < 1e-9);
    }

    #[test]
    fn speaker_resolution_rules() {
        let path = std::env::temp_dir()
            .join(format!("voice-gateway-test-{}.sqlite", uuid::Uuid::new_v4().simple()));
        let store = Store::new(&path).unwrap();
        store.create_record("sess_r", Utc::now()).unwrap();
        let user_id = store.insert_user("Ada", "Lovelace").unwrap();

        // Known numeric id resolves to the display name.
        assert_eq!(resolve_speaker(&store, &user_id.to_string()), "Ada Lovelace");
        // Misses and sentinels pass through unchanged.
        assert_eq!(resolve_speaker(&store, &(user_id + 40).to_string()), (user_id + 40).to_string());
        assert_eq!(resolve_speaker(&store, "Unknown"), "Unknown");
        assert_eq!(resolve_speaker(&store, ""), "");
        assert_eq!(resolve_speaker(&store, "spk-a"), "spk-a");

        let _ = std::fs::remove_file(path);
    }
}

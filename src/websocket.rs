//! # Live Analysis Channel
//!
//! Handles the `/ws` endpoint: a persistent duplex channel over which a
//! browser streams raw microphone PCM and receives per-utterance analysis
//! results as they become available.
//!
//! ## Protocol:
//! - **Client → Server**: binary frames of 16-bit little-endian mono PCM at
//!   16kHz, in chunks of any size; or the text frame `STOP` to end the
//!   session. Every other text frame is ignored.
//! - **Server → Client**: JSON `{"type": "live_analysis", "payload": ...}`
//!   messages, one per enriched sub-segment, in no guaranteed order across
//!   utterances.
//!
//! ## Session Lifecycle:
//! Each connection runs a single reader task that owns all mutable session
//! state and moves through four phases:
//!
//! | Phase      | Meaning                                                  |
//! |------------|----------------------------------------------------------|
//! | Open       | Reading frames, segmenting, dispatching analysis tasks   |
//! | Draining   | Input ended; waiting for in-flight analyses to complete  |
//! | Finalizing | Aggregating the transcript and storing the session topic |
//! | Closed     | Channel closed, resources released                       |
//!
//! In-flight analyses are never cancelled by a disconnect: they finish,
//! persist, and only then does finalization run, so the aggregated topic
//! always covers every segment the session produced.

use crate::audio::vad::WebRtcSpeechDetector;
use crate::services::{ServiceOutcome, UNKNOWN_TOPIC};
use crate::session::pipeline::SegmentPipeline;
use crate::session::state::SessionState;
use crate::session::tracker::PipelineTracker;
use crate::session::writer::ResultWriter;
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_ws::AggregatedMessage;
use chrono::Utc;
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

/// The only text message the live channel recognizes.
const STOP_COMMAND: &str = "STOP";

/// Upper bound for reassembled continuation frames. A second of PCM is
/// 32,000 bytes, so this comfortably covers any sane capture chunking.
const MAX_CONTINUATION_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Open,
    Draining,
    Finalizing,
    Closed,
}

fn advance(phase: &mut SessionPhase, next: SessionPhase, record_id: &str) {
    debug!(record_id = %record_id, from = ?*phase, to = ?next, "session phase transition");
    *phase = next;
}

/// Upgrade handler for `/ws`. The actual work happens in the spawned
/// session task; the connection is handed back to actix immediately.
pub async fn live_audio(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;

    info!(peer = ?req.connection_info().peer_addr(), "live channel connected");

    // The session future is not Send (the VAD holds raw pointers), which is
    // fine: it stays pinned to this worker, only pipeline tasks migrate.
    actix_web::rt::spawn(run_session(state, session, stream));

    Ok(response)
}

async fn run_session(
    state: web::Data<AppState>,
    session: actix_ws::Session,
    stream: actix_ws::MessageStream,
) {
    let config = state.get_config();

    let detector = WebRtcSpeechDetector::new(config.audio.vad_mode);
    let mut session_state = SessionState::new(
        detector,
        config.audio.silence_frame_limit,
        config.audio.min_segment_bytes(),
    );
    let record_id = session_state.session_id().to_string();

    // One record per session, created before any segment can reference it.
    // A failed insert is logged and the stream is still served; only the
    // enrichment rows will be lost.
    if let Err(err) = state.store().create_record(&record_id, Utc::now()) {
        error!(record_id = %record_id, error = %err, "failed to create session record");
    }

    state.session_started();
    info!(record_id = %record_id, vad_mode = config.audio.vad_mode, "analysis session started");

    let writer = ResultWriter::new(session);
    let tracker = PipelineTracker::new();
    let pipeline = SegmentPipeline::new(
        record_id.clone(),
        state.clone(),
        writer.clone(),
        tracker.clone(),
    );

    let mut stream = stream
        .aggregate_continuations()
        .max_continuation_size(MAX_CONTINUATION_BYTES);
    let mut phase = SessionPhase::Open;

    while phase == SessionPhase::Open {
        match stream.next().await {
            Some(Ok(AggregatedMessage::Binary(chunk))) => {
                for utterance in session_state.ingest(&chunk) {
                    pipeline.dispatch(utterance);
                }
            }
            Some(Ok(AggregatedMessage::Text(text))) => {
                if text.trim() == STOP_COMMAND {
                    debug!(record_id = %record_id, "stop requested by client");
                    advance(&mut phase, SessionPhase::Draining, &record_id);
                }
                // Other text frames are not part of the protocol.
            }
            Some(Ok(AggregatedMessage::Ping(payload))) => {
                if let Err(err) = writer.pong(&payload).await {
                    debug!(record_id = %record_id, error = %err, "failed to answer ping");
                }
            }
            Some(Ok(AggregatedMessage::Pong(_))) => {}
            Some(Ok(AggregatedMessage::Close(reason))) => {
                debug!(record_id = %record_id, reason = ?reason, "client closed channel");
                advance(&mut phase, SessionPhase::Draining, &record_id);
            }
            Some(Err(err)) => {
                warn!(record_id = %record_id, error = %err, "transport error on live channel");
                advance(&mut phase, SessionPhase::Draining, &record_id);
            }
            None => {
                advance(&mut phase, SessionPhase::Draining, &record_id);
            }
        }
    }

    debug!(
        record_id = %record_id,
        pending_bytes = session_state.pending_bytes(),
        in_flight = tracker.active(),
        "input ended, draining"
    );

    // Whatever speech is still buffered goes out regardless of the length
    // and silence thresholds; an utterance cut off by STOP is still real.
    if let Some(utterance) = session_state.flush() {
        debug!(
            record_id = %record_id,
            bytes = utterance.pcm.len(),
            start_seconds = utterance.start_seconds,
            "flushing pending segment"
        );
        pipeline.dispatch(utterance);
    }

    // The drain barrier: finalization may not start while any dispatched
    // analysis could still persist a segment.
    tracker.wait_idle().await;

    advance(&mut phase, SessionPhase::Finalizing, &record_id);
    finalize_session(&state, &record_id).await;

    writer.close().await;
    advance(&mut phase, SessionPhase::Closed, &record_id);
    state.session_finished();

    info!(
        record_id = %record_id,
        bytes_processed = session_state.bytes_processed(),
        tail_bytes = session_state.buffered_bytes(),
        discarded_bytes = session_state.discarded_bytes(),
        "analysis session closed"
    );
}

/// Aggregate the session transcript, classify its topic, and store it on
/// the record. Runs exactly once per session, strictly after the drain
/// barrier.
async fn finalize_session(state: &web::Data<AppState>, record_id: &str) {
    let segments = match state.store().segments_for_record(record_id) {
        Ok(segments) => segments,
        Err(err) => {
            error!(record_id = %record_id, error = %err, "failed to load segments for topic aggregation");
            return;
        }
    };

    let transcript = segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    // An empty transcript has nothing to classify; the record keeps the
    // default topic without a service round-trip.
    let outcome = if transcript.is_empty() {
        ServiceOutcome::Defaulted(UNKNOWN_TOPIC.to_string())
    } else {
        state.services().text.topic_or_default(&transcript).await
    };
    let defaulted = outcome.is_defaulted();
    let topic = outcome.into_value();

    if let Err(err) = state.store().set_topic(record_id, &topic) {
        error!(record_id = %record_id, error = %err, "failed to store session topic");
        return;
    }

    info!(
        record_id = %record_id,
        topic = %topic,
        defaulted,
        segments = segments.len(),
        "session topic stored"
    );
}

//! # Per-Connection Session State
//!
//! `SessionState` bundles the frame decoder and the segmenter for one live
//! connection. It is owned and mutated exclusively by the connection's
//! reader task; pipeline tasks only ever see owned utterance copies.

use crate::audio::frame::FrameDecoder;
use crate::audio::segmenter::{Segmenter, Utterance};
use crate::audio::vad::SpeechDetector;
use uuid::Uuid;

/// Mutable state for one live analysis session.
pub struct SessionState<D> {
    session_id: String,
    decoder: FrameDecoder,
    segmenter: Segmenter<D>,
}

impl<D: SpeechDetector> SessionState<D> {
    /// Allocate state for a fresh connection. The generated session id also
    /// serves as the record id; ids are random so concurrent connects can
    /// never collide.
    pub fn new(detector: D, silence_frame_limit: u32, min_segment_bytes: usize) -> Self {
        Self {
            session_id: format!("sess_{}", Uuid::new_v4().simple()),
            decoder: FrameDecoder::new(),
            segmenter: Segmenter::new(detector, silence_frame_limit, min_segment_bytes),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Run one binary chunk through the decoder and segmenter, returning
    /// every utterance the chunk completed.
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<Utterance> {
        self.decoder.push(chunk);

        let mut emitted = Vec::new();
        while let Some(frame) = self.decoder.next_frame() {
            if let Some(utterance) = self.segmenter.push_frame(&frame) {
                emitted.push(utterance);
            }
        }
        emitted
    }

    /// Force out whatever speech is still buffered, bypassing the emission
    /// thresholds. Called exactly once, when the session stops.
    pub fn flush(&mut self) -> Option<Utterance> {
        self.segmenter.flush(self.decoder.bytes_processed())
    }

    /// Bytes that have been classified so far.
    pub fn bytes_processed(&self) -> usize {
        self.decoder.bytes_processed()
    }

    /// Sub-frame tail bytes still waiting for classification.
    pub fn buffered_bytes(&self) -> usize {
        self.decoder.buffered_bytes()
    }

    /// Bytes of the in-progress segment.
    pub fn pending_bytes(&self) -> usize {
        self.segmenter.pending_bytes()
    }

    /// Ambient non-speech bytes discarded outside speaking runs.
    pub fn discarded_bytes(&self) -> usize {
        self.segmenter.discarded_bytes()
    }
}

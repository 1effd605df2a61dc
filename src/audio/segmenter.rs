//! # Utterance Segmentation
//!
//! Builds utterances out of the per-frame speech verdicts. An utterance is a
//! run of speech frames together with all silence frames interleaved with or
//! trailing the run, closed once enough trailing silence accumulates and the
//! segment has reached its minimum length.
//!
//! ## Transition Rules (evaluated per frame):
//! 1. Speech frame: mark speaking, reset the silence counter, append.
//! 2. Non-speech frame while speaking: count silence, append (trailing
//!    silence belongs to the utterance).
//! 3. Non-speech frame while not speaking: count silence, discard.
//!
//! After updating state, the segment is emitted once the silence counter
//! exceeds the configured limit and the segment exceeds the minimum length.
//! A session shutdown flushes whatever is pending regardless of thresholds.

use crate::audio::frame::PcmFrame;
use crate::audio::vad::SpeechDetector;
use crate::audio::BYTES_PER_SECOND;
use tracing::debug;

/// A closed segment of speech, ready for the analysis fan-out.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// The segment's PCM bytes, owned by the utterance. The segmenter's
    /// working buffer is reset at emission so background tasks never share
    /// bytes with the live path.
    pub pcm: Vec<u8>,

    /// Position of the utterance within the session, in seconds from the
    /// first byte the client streamed.
    pub start_seconds: f64,
}

/// Per-session segmentation state machine.
pub struct Segmenter<D> {
    detector: D,
    silence_frame_limit: u32,
    min_segment_bytes: usize,

    current_segment: Vec<u8>,
    is_speaking: bool,
    silence_frames: u32,

    /// Non-speech bytes discarded outside any speaking run. Tracked so a
    /// session can account for every byte it consumed.
    discarded_bytes: usize,
}

impl<D: SpeechDetector> Segmenter<D> {
    pub fn new(detector: D, silence_frame_limit: u32, min_segment_bytes: usize) -> Self {
        Self {
            detector,
            silence_frame_limit,
            min_segment_bytes,
            current_segment: Vec::new(),
            is_speaking: false,
            silence_frames: 0,
            discarded_bytes: 0,
        }
    }

    /// Feed one frame through the state machine. Returns a closed utterance
    /// when this frame completed one.
    ///
    /// A frame the detector cannot classify is skipped without touching any
    /// state.
    pub fn push_frame(&mut self, frame: &PcmFrame) -> Option<Utterance> {
        let speech = match self.detector.is_speech(&frame.data) {
            Ok(verdict) => verdict,
            Err(err) => {
                debug!(start_byte = frame.start_byte, error = %err, "skipping unclassifiable frame");
                return None;
            }
        };

        if speech {
            self.is_speaking = true;
            self.silence_frames = 0;
            self.current_segment.extend_from_slice(&frame.data);
        } else {
            self.silence_frames += 1;
            if self.is_speaking {
                self.current_segment.extend_from_slice(&frame.data);
            } else {
                self.discarded_bytes += frame.data.len();
            }
        }

        if self.silence_frames > self.silence_frame_limit
            && self.current_segment.len() > self.min_segment_bytes
        {
            let bytes_processed = frame.start_byte + frame.data.len();
            return Some(self.emit(bytes_processed));
        }

        None
    }

    /// Flush the pending segment unconditionally, bypassing the silence and
    /// length thresholds. Used when the session stops with speech still
    /// buffered. Returns `None` if nothing is pending.
    pub fn flush(&mut self, bytes_processed: usize) -> Option<Utterance> {
        if self.current_segment.is_empty() {
            return None;
        }
        Some(self.emit(bytes_processed))
    }

    fn emit(&mut self, bytes_processed: usize) -> Utterance {
        let pcm = std::mem::take(&mut self.current_segment);
        let start_seconds = (bytes_processed - pcm.len()) as f64 / BYTES_PER_SECOND as f64;

        self.is_speaking = false;
        self.silence_frames = 0;

        Utterance { pcm, start_seconds }
    }

    /// Bytes of the in-progress segment.
    pub fn pending_bytes(&self) -> usize {
        self.current_segment.len()
    }

    /// Non-speech bytes discarded outside speaking runs.
    pub fn discarded_bytes(&self) -> usize {
        self.discarded_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::vad::VadError;
    use crate::audio::{MIN_SEGMENT_BYTES, PACKET_SIZE, SILENCE_FRAME_LIMIT};

    /// Detector that replays a prepared verdict sequence.
    struct Scripted {
        verdicts: std::collections::VecDeque<Result<bool, VadError>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self { verdicts: std::collections::VecDeque::new() }
        }

        fn speech(mut self, frames: usize) -> Self {
            self.verdicts.extend((0..frames).map(|_| Ok(true)));
            self
        }

        fn silence(mut self, frames: usize) -> Self {
            self.verdicts.extend((0..frames).map(|_| Ok(false)));
            self
        }

        fn error(mut self) -> Self {
            self.verdicts.push_back(Err(VadError::Probe));
            self
        }
    }

    impl SpeechDetector for Scripted {
        fn is_speech(&mut self, _frame: &[u8]) -> Result<bool, VadError> {
            self.verdicts.pop_front().unwrap_or(Ok(false))
        }
    }

    fn feed<D: SpeechDetector>(segmenter: &mut Segmenter<D>, frames: usize) -> Vec<Utterance> {
        let mut emitted = Vec::new();
        for i in 0..frames {
            let frame = PcmFrame {
                data: vec![0u8; PACKET_SIZE],
                start_byte: i * PACKET_SIZE,
            };
            if let Some(utterance) = segmenter.push_frame(&frame) {
                emitted.push(utterance);
            }
        }
        emitted
    }

    fn feed_from<D: SpeechDetector>(
        segmenter: &mut Segmenter<D>,
        start_frame: usize,
        frames: usize,
    ) -> Vec<Utterance> {
        let mut emitted = Vec::new();
        for i in start_frame..start_frame + frames {
            let frame = PcmFrame {
                data: vec![0u8; PACKET_SIZE],
                start_byte: i * PACKET_SIZE,
            };
            if let Some(utterance) = segmenter.push_frame(&frame) {
                emitted.push(utterance);
            }
        }
        emitted
    }

    #[test]
    fn single_utterance_after_speech_and_trailing_silence() {
        // 4s of speech (200 frames) then 600ms of silence (30 frames).
        let detector = Scripted::new().speech(200).silence(30);
        let mut segmenter = Segmenter::new(detector, SILENCE_FRAME_LIMIT, MIN_SEGMENT_BYTES);

        let emitted = feed(&mut segmenter, 230);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].start_seconds, 0.0);
        // Speech plus the 26 silence frames that closed the segment.
        assert_eq!(emitted[0].pcm.len(), 226 * PACKET_SIZE);
        assert_eq!(segmenter.pending_bytes(), 0);
    }

    #[test]
    fn short_burst_never_emits_during_stream() {
        // 1.5s of speech (75 frames) then 600ms of silence.
        let detector = Scripted::new().speech(75).silence(30);
        let mut segmenter = Segmenter::new(detector, SILENCE_FRAME_LIMIT, MIN_SEGMENT_BYTES);

        let emitted = feed(&mut segmenter, 105);
        assert!(emitted.is_empty());

        // A stop flush delivers the short segment anyway.
        let flushed = segmenter.flush(105 * PACKET_SIZE).unwrap();
        assert_eq!(flushed.pcm.len(), 105 * PACKET_SIZE);
        assert_eq!(flushed.start_seconds, 0.0);
    }

    #[test]
    fn silence_only_emits_nothing_and_flushes_nothing() {
        let detector = Scripted::new().silence(500);
        let mut segmenter = Segmenter::new(detector, SILENCE_FRAME_LIMIT, MIN_SEGMENT_BYTES);

        let emitted = feed(&mut segmenter, 500);
        assert!(emitted.is_empty());
        assert!(segmenter.flush(500 * PACKET_SIZE).is_none());
        assert_eq!(segmenter.discarded_bytes(), 500 * PACKET_SIZE);
    }

    #[test]
    fn two_utterances_have_monotone_offsets() {
        // 4s speech, 600ms silence, 4s speech, stream closes.
        let detector = Scripted::new().speech(200).silence(30).speech(200);
        let mut segmenter = Segmenter::new(detector, SILENCE_FRAME_LIMIT, MIN_SEGMENT_BYTES);

        let mut emitted = feed(&mut segmenter, 230);
        emitted.extend(feed_from(&mut segmenter, 230, 200));
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].start_seconds, 0.0);

        let second = segmenter.flush(430 * PACKET_SIZE).unwrap();
        assert!(second.start_seconds > emitted[0].start_seconds);
        // Second run starts after 200 speech + 30 silence frames: 4.6s.
        assert!((second.start_seconds - 4.6).abs() < 1e-9);
    }

    #[test]
    fn every_byte_is_accounted_for() {
        // Leading ambient silence, speech, trailing silence, more ambient
        // silence, a short unfinished burst.
        let detector = Scripted::new()
            .silence(50)
            .speech(200)
            .silence(30)
            .silence(20)
            .speech(10);
        let mut segmenter = Segmenter::new(detector, SILENCE_FRAME_LIMIT, MIN_SEGMENT_BYTES);

        let total_frames = 310;
        let emitted = feed(&mut segmenter, total_frames);

        let emitted_bytes: usize = emitted.iter().map(|u| u.pcm.len()).sum();
        let accounted = emitted_bytes + segmenter.pending_bytes() + segmenter.discarded_bytes();
        assert_eq!(accounted, total_frames * PACKET_SIZE);
    }

    #[test]
    fn detector_errors_skip_the_frame_without_state_changes() {
        let detector = Scripted::new().speech(10).error().speech(10);
        let mut segmenter = Segmenter::new(detector, SILENCE_FRAME_LIMIT, MIN_SEGMENT_BYTES);

        let emitted = feed(&mut segmenter, 21);
        assert!(emitted.is_empty());
        // The errored frame was not appended.
        assert_eq!(segmenter.pending_bytes(), 20 * PACKET_SIZE);
        assert_eq!(segmenter.discarded_bytes(), 0);
    }

    #[test]
    fn emission_requires_both_thresholds() {
        // Plenty of silence but the segment is still below minimum length:
        // nothing may be emitted.
        let detector = Scripted::new().speech(100).silence(100);
        let mut segmenter = Segmenter::new(detector, SILENCE_FRAME_LIMIT, MIN_SEGMENT_BYTES);

        let emitted = feed(&mut segmenter, 200);
        // 100 speech + 26 silence frames is 2.52s, under the 3s minimum, so
        // the counter keeps growing while the segment keeps absorbing
        // trailing silence until it crosses the length threshold.
        for utterance in &emitted {
            assert!(utterance.pcm.len() > MIN_SEGMENT_BYTES);
        }
    }
}

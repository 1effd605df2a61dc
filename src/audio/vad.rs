//! # Voice Activity Detection
//!
//! Wraps the WebRTC VAD behind a small `SpeechDetector` trait so the
//! segmenter state machine can be exercised with scripted verdicts in tests.
//!
//! The detector operates on the gateway's fixed frame size: 640 bytes of
//! 16-bit mono PCM at 16kHz (20ms), which is one of the frame lengths the
//! WebRTC VAD supports natively.

use crate::audio::PACKET_SIZE;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;
use webrtc_vad::{SampleRate, Vad, VadMode};

/// Errors produced while classifying a single frame. A failed frame is
/// skipped by the caller; it never aborts the session.
#[derive(Debug, Error)]
pub enum VadError {
    #[error("frame must be exactly {expected} bytes, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    #[error("voice activity probe rejected frame")]
    Probe,
}

/// Per-frame speech/non-speech classifier.
///
/// The production implementation wraps the WebRTC VAD; tests drive the
/// segmenter with scripted implementations instead.
pub trait SpeechDetector {
    /// Classify one `PACKET_SIZE`-byte PCM frame.
    fn is_speech(&mut self, frame: &[u8]) -> Result<bool, VadError>;
}

/// WebRTC VAD over 16kHz mono PCM frames.
///
/// Detection mode ranges from 0 (least aggressive, most speech passes) to
/// 3 (most aggressive, fewest false positives). The live pipeline defaults
/// to mode 3 but the setting is configurable.
pub struct WebRtcSpeechDetector {
    vad: Vad,
}

impl WebRtcSpeechDetector {
    pub fn new(mode: u8) -> Self {
        let vad_mode = match mode {
            0 => VadMode::Quality,
            1 => VadMode::LowBitrate,
            2 => VadMode::Aggressive,
            _ => VadMode::VeryAggressive,
        };

        let mut vad = Vad::new();
        vad.set_mode(vad_mode);
        vad.set_sample_rate(SampleRate::Rate16kHz);

        Self { vad }
    }
}

impl SpeechDetector for WebRtcSpeechDetector {
    fn is_speech(&mut self, frame: &[u8]) -> Result<bool, VadError> {
        if frame.len() != PACKET_SIZE {
            return Err(VadError::FrameLength {
                expected: PACKET_SIZE,
                actual: frame.len(),
            });
        }

        // The VAD wants i16 samples, the wire carries little-endian bytes.
        let mut cursor = Cursor::new(frame);
        let mut samples = Vec::with_capacity(PACKET_SIZE / 2);
        while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
            samples.push(sample);
        }

        self.vad.is_voice_segment(&samples).map_err(|_| VadError::Probe)
    }
}

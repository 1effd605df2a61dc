//! # Live Audio Pipeline
//!
//! This module handles the byte-level half of the live analysis pipeline:
//! turning an incoming stream of raw PCM chunks into utterances that are
//! ready for transcription and analysis.
//!
//! ## Key Components:
//! - **Frame Decoder**: Slices arbitrary binary chunks into fixed-size PCM frames
//! - **Speech Detector**: Per-frame speech/non-speech verdicts (WebRTC VAD)
//! - **Segmenter**: Builds utterances bounded by speech onset and trailing silence
//! - **WAV Synthesis**: Wraps utterance PCM in a canonical WAV container
//!
//! ## Audio Format Requirements:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian signed integers

pub mod frame;      // Fixed-size frame peeling from the chunk stream
pub mod segmenter;  // Utterance construction from per-frame verdicts
pub mod vad;        // Voice activity detection
pub mod wav;        // WAV container synthesis

/// Sample rate every client is required to stream at.
pub const SAMPLE_RATE: u32 = 16_000;

/// Bits per sample of the PCM stream.
pub const BIT_DEPTH: u16 = 16;

/// Channel count of the PCM stream.
pub const CHANNELS: u16 = 1;

/// Size of one analysis frame in bytes. 640 bytes of 16-bit mono audio at
/// 16kHz is exactly 20ms, one of the frame lengths the VAD accepts.
pub const PACKET_SIZE: usize = 640;

/// Bytes of PCM per second of audio.
pub const BYTES_PER_SECOND: usize =
    SAMPLE_RATE as usize * (BIT_DEPTH as usize / 8) * CHANNELS as usize;

/// Default minimum utterance length (including interleaved silence) before a
/// segment may be emitted: three seconds of audio.
pub const MIN_SEGMENT_BYTES: usize = BYTES_PER_SECOND * 3;

/// Default number of consecutive non-speech frames that close an utterance.
/// 25 frames of 20ms each is roughly half a second of trailing silence.
pub const SILENCE_FRAME_LIMIT: u32 = 25;

//! # WAV Container Synthesis
//!
//! The audio-analysis service consumes WAV files, while the live pipeline
//! works on raw PCM. This module wraps utterance PCM in the canonical
//! 44-byte PCM WAV header describing the gateway's fixed stream format.

use crate::audio::{BIT_DEPTH, BYTES_PER_SECOND, CHANNELS, SAMPLE_RATE};

/// Byte length of the canonical PCM WAV header.
pub const HEADER_LEN: usize = 44;

/// Wrap raw 16kHz mono 16-bit PCM in a WAV container.
pub fn encode(pcm: &[u8]) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let mut wav = Vec::with_capacity(HEADER_LEN + pcm.len());

    // RIFF chunk descriptor
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(data_len + 36).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt sub-chunk: uncompressed PCM in the gateway's stream format
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(BYTES_PER_SECOND as u32).to_le_bytes());
    wav.extend_from_slice(&(CHANNELS * BIT_DEPTH / 8).to_le_bytes());
    wav.extend_from_slice(&BIT_DEPTH.to_le_bytes());

    // data sub-chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);

    wav
}

//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, HOST, PORT, ...)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use crate::audio::{BYTES_PER_SECOND, MIN_SEGMENT_BYTES, SILENCE_FRAME_LIMIT};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub services: ServicesConfig,
    pub database: DatabaseConfig,
    pub audio: AudioConfig,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Base URLs of the backing analysis services.
///
/// The defaults match the local development layout: transcription on 5000,
/// audio analysis on 5001, text analysis on 5002.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub asr_url: String,
    pub audio_analysis_url: String,
    pub text_analysis_url: String,
}

/// Database location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    pub path: String,
}

/// Live-pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// VAD aggressiveness, 0 (permissive) to 3 (strictest). Higher modes
    /// admit fewer false positives at the cost of clipping soft speech.
    pub vad_mode: u8,

    /// Consecutive non-speech frames required to close an utterance.
    pub silence_frame_limit: u32,

    /// Minimum utterance length in seconds before it may be emitted.
    pub min_segment_seconds: u32,
}

impl AudioConfig {
    /// Minimum utterance length in PCM bytes.
    pub fn min_segment_bytes(&self) -> usize {
        self.min_segment_seconds as usize * BYTES_PER_SECOND
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            services: ServicesConfig {
                asr_url: "http://localhost:5000/".to_string(),
                audio_analysis_url: "http://localhost:5001".to_string(),
                text_analysis_url: "http://localhost:5002".to_string(),
            },
            database: DatabaseConfig {
                path: "db.sqlite".to_string(),
            },
            audio: AudioConfig {
                vad_mode: 3,
                silence_frame_limit: SILENCE_FRAME_LIMIT,
                min_segment_seconds: (MIN_SEGMENT_BYTES / BYTES_PER_SECOND) as u32,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml, and the environment,
    /// in that order of increasing priority.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject bare HOST/PORT variables.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense before the server
    /// starts accepting connections.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.audio.vad_mode > 3 {
            return Err(anyhow::anyhow!("VAD mode must be between 0 and 3"));
        }

        if self.audio.silence_frame_limit == 0 {
            return Err(anyhow::anyhow!("Silence frame limit must be greater than 0"));
        }

        if self.audio.min_segment_seconds == 0 {
            return Err(anyhow::anyhow!("Minimum segment length must be greater than 0"));
        }

        if self.database.path.trim().is_empty() {
            return Err(anyhow::anyhow!("Database path cannot be empty"));
        }

        for (name, url) in [
            ("asr_url", &self.services.asr_url),
            ("audio_analysis_url", &self.services.audio_analysis_url),
            ("text_analysis_url", &self.services.text_analysis_url),
        ] {
            if url.trim().is_empty() {
                return Err(anyhow::anyhow!("Service URL {} cannot be empty", name));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.vad_mode, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.vad_mode = 4;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.services.asr_url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_segment_bytes_derivation() {
        let config = AppConfig::default();
        // Three seconds of 16kHz 16-bit mono audio.
        assert_eq!(config.audio.min_segment_bytes(), 96_000);
    }
}

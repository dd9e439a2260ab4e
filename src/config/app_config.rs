// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session configuration (buffer shape, exchange kind, recorder).

use crate::audio::{BlockFormat, BlockLayout, SignalKind};
use crate::realtime::ExchangeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shape of the exchanged block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Frames per block.
    pub frames: usize,
    pub channels: u16,
    #[serde(default)]
    pub format: BlockFormat,
    pub sample_rate: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            frames: 512,
            channels: 2,
            format: BlockFormat::Interleaved,
            sample_rate: 48_000,
        }
    }
}

impl BufferConfig {
    pub fn layout(&self) -> Result<BlockLayout, ExchangeError> {
        BlockLayout::new(self.frames, self.channels, self.format)
    }
}

/// Which exchange carries blocks from writer to reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Single slot; a slow reader may see torn blocks.
    #[default]
    Single,
    /// Three slots; never torn, may skip generations.
    Triple,
}

/// Writer/reader pacing for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub exchange: ExchangeKind,
    /// Blocks the writer publishes before stopping.
    #[serde(default = "default_cycles")]
    pub cycles: u64,
    /// Pause between publications, in microseconds (0 = unpaced).
    #[serde(default = "default_write_interval_us")]
    pub write_interval_us: u64,
    /// Reader poll interval when nothing is new, in microseconds (0 = spin).
    #[serde(default = "default_read_interval_us")]
    pub read_interval_us: u64,
    #[serde(default)]
    pub signal: SignalKind,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
}

fn default_cycles() -> u64 {
    1000
}

fn default_write_interval_us() -> u64 {
    10_000
}

fn default_read_interval_us() -> u64 {
    1_000
}

fn default_frequency() -> f32 {
    440.0
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeKind::default(),
            cycles: default_cycles(),
            write_interval_us: default_write_interval_us(),
            read_interval_us: default_read_interval_us(),
            signal: SignalKind::default(),
            frequency: default_frequency(),
        }
    }
}

/// Recorder tap settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Output directory; the system temp dir when unset.
    pub directory: Option<PathBuf>,
    /// Auto-stop after this many seconds (0 = whole session).
    #[serde(default)]
    pub duration_secs: f64,
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

impl AppConfig {
    /// Load config from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.buffer.frames, 512);
        assert_eq!(config.buffer.channels, 2);
        assert_eq!(config.session.exchange, ExchangeKind::Single);
        assert_eq!(config.session.cycles, 1000);
        assert!(!config.recorder.enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [buffer]
            frames = 8192
            channels = 8
            format = "planar"
            sample_rate = 96000

            [session]
            exchange = "triple"
            cycles = 10
            write_interval_us = 0
            signal = "tag"

            [recorder]
            enabled = true
            directory = "/tmp/takes"
            duration_secs = 2.5
        "#;
        let config = AppConfig::from_toml(toml).unwrap();
        let layout = config.buffer.layout().unwrap();
        assert_eq!(layout.len(), 8192 * 8);
        assert_eq!(layout.format(), BlockFormat::Planar);
        assert_eq!(config.session.exchange, ExchangeKind::Triple);
        assert_eq!(config.session.signal, SignalKind::Tag);
        assert_eq!(config.session.read_interval_us, 1_000);
        assert_eq!(config.recorder.directory, Some(PathBuf::from("/tmp/takes")));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.session.exchange = ExchangeKind::Triple;
        config.buffer.channels = 1;

        let parsed = AppConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.session.exchange, ExchangeKind::Triple);
        assert_eq!(parsed.buffer.channels, 1);
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let config = AppConfig::from_toml("[buffer]\nframes = 0\nchannels = 2\nsample_rate = 48000").unwrap();
        assert!(config.buffer.layout().is_err());
    }
}

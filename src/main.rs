// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! syncbuf - run one writer/reader session over a block exchange.
//!
//! Usage: `syncbuf [config.toml]`. Without an argument the platform config
//! directory is used, falling back to defaults.

use std::path::PathBuf;
use syncbuf::audio::{BlockMeter, Recorder, Signal, SignalKind, TagValidator, TestTone};
use syncbuf::config::{AppConfig, ConfigManager, ExchangeKind};
use syncbuf::realtime::{SynchronizedBuffer, TripleBuffer};
use syncbuf::Session;
use tracing::{info, warn};

fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    if let Some(path) = std::env::args().nth(1) {
        info!("Loading config from {}", path);
        return Ok(ConfigManager::load_from(&PathBuf::from(path))?);
    }

    match ConfigManager::new().and_then(|manager| manager.load_config()) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("Failed to load config, using defaults: {}", e);
            Ok(AppConfig::default())
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("syncbuf=debug".parse()?),
        )
        .init();

    info!("syncbuf starting...");

    let config = load_config()?;
    let layout = config.buffer.layout()?;
    let sample_rate = config.buffer.sample_rate;

    let tone = match config.session.signal {
        SignalKind::Sine => TestTone::new(
            Signal::Sine {
                frequency: config.session.frequency,
                amplitude: 0.5,
            },
            sample_rate,
        ),
        SignalKind::Tag => TestTone::tagged(),
    };

    let mut session = Session::<f32>::new(config.session.clone(), tone);

    let meter = BlockMeter::new(layout.channels());
    let levels = meter.levels();
    session.add_consumer(meter);

    let validation = if config.session.signal == SignalKind::Tag {
        let validator = TagValidator::new();
        let handle = validator.handle();
        session.add_consumer(validator);
        Some(handle)
    } else {
        None
    };

    if config.recorder.enabled {
        let directory = config
            .recorder
            .directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let mut recorder = Recorder::new(directory, layout, sample_rate, false);
        recorder.set_duration_to_record(config.recorder.duration_secs);
        recorder.record()?;
        if let Some(path) = recorder.recorded_path() {
            info!("Recording to {}", path.display());
        }
        session.add_consumer(recorder);
    }

    let report = match config.session.exchange {
        ExchangeKind::Single => {
            let (writer, reader) = SynchronizedBuffer::<f32>::new(layout).split();
            session.run(writer, reader)?
        }
        ExchangeKind::Triple => {
            let (writer, reader) = TripleBuffer::<f32>::new(layout).split();
            session.run(writer, reader)?
        }
    };

    for (channel, level) in levels.snapshot().iter().enumerate() {
        info!(
            "Channel {}: peak {:.1} dB, rms {:.1} dB",
            channel,
            level.peak_db(),
            level.rms_db()
        );
    }

    if let Some(handle) = validation {
        let summary = handle.summary();
        info!(
            "Validation: {} checked, {} torn, {} flagged, {} torn but unflagged",
            summary.checked, summary.torn, summary.flagged, summary.torn_unflagged
        );
        if summary.torn_unflagged > 0 {
            warn!("Exchange delivered torn blocks it reported as intact");
        }
    }

    info!(
        "Delivered {}/{} blocks ({} missed, {} not intact) in {:?}",
        report.delivered, report.published, report.missed, report.not_intact, report.elapsed
    );
    Ok(())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! WAV recorder tap.
//!
//! Consumes delivered blocks on the reader thread and appends them to a
//! 32-bit float WAV file. Supports pause/resume and an optional timed
//! auto-stop.

use crate::audio::{BlockConsumer, BlockLayout};
use crate::realtime::{Delivery, Sample};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

type WavFile = hound::WavWriter<BufWriter<File>>;

/// Records delivered blocks to WAV files in a directory.
pub struct Recorder {
    directory: PathBuf,
    layout: BlockLayout,
    sample_rate: u32,
    writer: Option<WavFile>,
    /// File currently (or most recently) recorded to.
    path: Option<PathBuf>,
    /// Every file this recorder created.
    recorded_files: Vec<PathBuf>,
    is_recording: bool,
    is_paused: bool,
    /// Auto-stop after this many seconds; 0 records until stopped.
    duration_to_record: f64,
    frames_written: u64,
    cleanup_on_drop: bool,
}

impl Recorder {
    pub fn new(
        directory: impl Into<PathBuf>,
        layout: BlockLayout,
        sample_rate: u32,
        cleanup_on_drop: bool,
    ) -> Self {
        Self {
            directory: directory.into(),
            layout,
            sample_rate: sample_rate.max(1),
            writer: None,
            path: None,
            recorded_files: Vec::new(),
            is_recording: false,
            is_paused: false,
            duration_to_record: 0.0,
            frames_written: 0,
            cleanup_on_drop,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Seconds of audio in the current file.
    pub fn recorded_duration(&self) -> f64 {
        self.frames_written as f64 / self.sample_rate as f64
    }

    pub fn recorded_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Auto-stop once this many seconds are recorded; 0 disables.
    pub fn set_duration_to_record(&mut self, seconds: f64) {
        self.duration_to_record = seconds.max(0.0);
    }

    /// Start recording, opening a new file if none is open.
    pub fn record(&mut self) -> Result<(), RecorderError> {
        if self.is_recording {
            warn!("Recorder already recording");
            return Ok(());
        }

        if self.writer.is_none() {
            self.open_file()?;
        }

        self.is_recording = true;
        info!(
            "Recording {} ch @ {} Hz to {:?}",
            self.layout.channels(),
            self.sample_rate,
            self.path
        );
        Ok(())
    }

    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
    }

    /// Stop recording and finalize the file.
    pub fn stop(&mut self) -> Result<(), RecorderError> {
        if !self.is_recording {
            warn!("Cannot stop recording, already stopped");
            return Ok(());
        }

        self.is_recording = false;
        self.is_paused = false;

        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            info!(
                "Finished recording {:.2}s to {:?}",
                self.recorded_duration(),
                self.path
            );
        }
        Ok(())
    }

    /// Stop and delete the current file. The next `record()` starts fresh.
    pub fn reset(&mut self) -> Result<(), RecorderError> {
        if self.is_recording {
            self.stop()?;
        }
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        if let Some(path) = self.path.take() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            self.recorded_files.retain(|p| p != &path);
            debug!("Deleted recording {:?}", path);
        }
        self.frames_written = 0;
        Ok(())
    }

    /// Delete every file this recorder created.
    pub fn remove_recorded_files(&mut self) {
        for path in self.recorded_files.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Deleted recording {:?}", path),
                Err(e) => warn!("Failed to delete recording {:?}: {}", path, e),
            }
        }
    }

    fn open_file(&mut self) -> Result<(), RecorderError> {
        fs::create_dir_all(&self.directory)?;
        let path = self
            .directory
            .join(format!("recording-{}.wav", Uuid::new_v4()));

        let spec = hound::WavSpec {
            channels: self.layout.channels(),
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(&path, spec)?;

        debug!("Created recording file {:?}", path);
        self.recorded_files.push(path.clone());
        self.path = Some(path);
        self.writer = Some(writer);
        self.frames_written = 0;
        Ok(())
    }

    fn write_block<S: Sample>(&mut self, block: &[S]) -> Result<(), RecorderError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let layout = self.layout;
        for frame in 0..layout.frames() {
            for channel in 0..layout.channels() {
                writer.write_sample(block[layout.index(frame, channel)].to_f32())?;
            }
        }
        self.frames_written += layout.frames() as u64;
        Ok(())
    }
}

impl<S: Sample> BlockConsumer<S> for Recorder {
    fn consume(&mut self, layout: &BlockLayout, block: &[S], _delivery: &Delivery) {
        if !self.is_recording || self.is_paused {
            return;
        }
        if *layout != self.layout {
            warn!("Recorder layout mismatch, dropping block");
            return;
        }

        if let Err(e) = self.write_block(block) {
            warn!("Write failed: {}", e);
            return;
        }

        if self.duration_to_record > 0.0 && self.recorded_duration() >= self.duration_to_record {
            if let Err(e) = self.stop() {
                warn!("Failed to finalize recording: {}", e);
            }
        }
    }

    fn finish(&mut self) {
        if self.is_recording {
            if let Err(e) = self.stop() {
                warn!("Failed to finalize recording: {}", e);
            }
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize recording: {}", e);
            }
        }
        if self.cleanup_on_drop {
            self.remove_recorded_files();
        }
    }
}

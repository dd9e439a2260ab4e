// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Block level metering.
//!
//! ```text
//! [render thread] -> [exchange] -> [reader: BlockMeter] -> [SharedLevels] -> [UI]
//! ```
//!
//! The meter runs on the reader side and republishes per-channel peak and RMS
//! through atomics so any thread can poll them without locking.

use crate::audio::{BlockConsumer, BlockLayout};
use crate::realtime::{AtomicF32, Delivery, Sample};
use std::sync::Arc;

/// Level data for one channel of one block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterData {
    /// Peak level (0.0 to 1.0+).
    pub peak: f32,
    /// RMS level (0.0 to 1.0+).
    pub rms: f32,
    /// Whether clipping occurred.
    pub clipping: bool,
}

impl MeterData {
    pub fn new(peak: f32, rms: f32) -> Self {
        Self {
            peak,
            rms,
            clipping: peak >= 1.0,
        }
    }

    /// Convert to decibels.
    pub fn peak_db(&self) -> f32 {
        linear_to_db(self.peak)
    }

    /// Convert RMS to decibels.
    pub fn rms_db(&self) -> f32 {
        linear_to_db(self.rms)
    }
}

fn linear_to_db(level: f32) -> f32 {
    if level <= 0.0 {
        -80.0
    } else {
        20.0 * level.log10()
    }
}

/// Peak and RMS of one channel.
pub fn measure_channel<S: Sample>(layout: &BlockLayout, block: &[S], channel: u16) -> MeterData {
    let mut peak: f32 = 0.0;
    let mut sum_sq: f64 = 0.0;
    for sample in layout.channel(block, channel) {
        let v = sample.to_f32();
        peak = peak.max(v.abs());
        sum_sq += (v as f64) * (v as f64);
    }
    let rms = (sum_sq / layout.frames() as f64).sqrt() as f32;
    MeterData::new(peak, rms)
}

/// Latest per-channel levels, readable from any thread.
#[derive(Debug, Clone)]
pub struct SharedLevels {
    peaks: Arc<[AtomicF32]>,
    rms: Arc<[AtomicF32]>,
}

impl SharedLevels {
    pub fn new(channels: u16) -> Self {
        let make = || -> Arc<[AtomicF32]> { (0..channels).map(|_| AtomicF32::default()).collect() };
        Self {
            peaks: make(),
            rms: make(),
        }
    }

    pub fn channels(&self) -> usize {
        self.peaks.len()
    }

    /// Peak of `channel`, or 0.0 if out of range.
    pub fn peak(&self, channel: usize) -> f32 {
        self.peaks.get(channel).map(AtomicF32::get).unwrap_or(0.0)
    }

    pub fn rms(&self, channel: usize) -> f32 {
        self.rms.get(channel).map(AtomicF32::get).unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> Vec<MeterData> {
        (0..self.channels())
            .map(|ch| MeterData::new(self.peak(ch), self.rms(ch)))
            .collect()
    }

    fn store(&self, channel: usize, data: MeterData) {
        if let (Some(peak), Some(rms)) = (self.peaks.get(channel), self.rms.get(channel)) {
            peak.set(data.peak);
            rms.set(data.rms);
        }
    }

    /// Reset to silence.
    pub fn reset(&self) {
        for level in self.peaks.iter().chain(self.rms.iter()) {
            level.set(0.0);
        }
    }
}

/// Reader-side meter.
pub struct BlockMeter {
    levels: SharedLevels,
    /// Highest peak seen per channel since creation.
    max_peaks: Vec<f32>,
    blocks: u64,
}

impl BlockMeter {
    pub fn new(channels: u16) -> Self {
        Self {
            levels: SharedLevels::new(channels),
            max_peaks: vec![0.0; channels as usize],
            blocks: 0,
        }
    }

    /// Handle for other threads.
    pub fn levels(&self) -> SharedLevels {
        self.levels.clone()
    }

    pub fn max_peaks(&self) -> &[f32] {
        &self.max_peaks
    }

    pub fn blocks(&self) -> u64 {
        self.blocks
    }
}

impl<S: Sample> BlockConsumer<S> for BlockMeter {
    fn consume(&mut self, layout: &BlockLayout, block: &[S], _delivery: &Delivery) {
        for channel in 0..layout.channels() {
            let data = measure_channel(layout, block, channel);
            self.levels.store(channel as usize, data);
            if let Some(max) = self.max_peaks.get_mut(channel as usize) {
                *max = max.max(data.peak);
            }
        }
        self.blocks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery() -> Delivery {
        Delivery {
            generation: 1,
            missed: 0,
            intact: true,
        }
    }

    #[test]
    fn test_meter_data() {
        let meter = MeterData::new(0.5, 0.3);
        assert!(!meter.clipping);
        assert!((meter.peak_db() - (-6.02)).abs() < 0.1);

        let clipping = MeterData::new(1.5, 0.8);
        assert!(clipping.clipping);
        assert_eq!(MeterData::new(0.0, 0.0).rms_db(), -80.0);
    }

    #[test]
    fn test_measure_square_wave() {
        let layout = BlockLayout::interleaved(4, 2).unwrap();
        // Left: +-0.5 square, right: silence.
        let block = [0.5f32, 0.0, -0.5, 0.0, 0.5, 0.0, -0.5, 0.0];
        let left = measure_channel(&layout, &block, 0);
        assert!((left.peak - 0.5).abs() < 1e-6);
        assert!((left.rms - 0.5).abs() < 1e-6);
        assert_eq!(measure_channel(&layout, &block, 1), MeterData::default());
    }

    #[test]
    fn test_block_meter_publishes_levels() {
        let layout = BlockLayout::planar(2, 2).unwrap();
        let mut meter = BlockMeter::new(2);
        let levels = meter.levels();

        BlockConsumer::<i16>::consume(&mut meter, &layout, &[i16::MAX, 0, 0, 0], &delivery());
        assert!((levels.peak(0) - 1.0).abs() < 1e-4);
        assert_eq!(levels.peak(1), 0.0);
        assert_eq!(levels.peak(7), 0.0);
        assert!(levels.snapshot()[0].clipping);

        BlockConsumer::<i16>::consume(&mut meter, &layout, &[0, 0, 0, 0], &delivery());
        assert_eq!(levels.peak(0), 0.0);
        assert!((meter.max_peaks()[0] - 1.0).abs() < 1e-4);
        assert_eq!(meter.blocks(), 2);

        levels.reset();
        assert_eq!(levels.rms(0), 0.0);
    }
}

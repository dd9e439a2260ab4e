// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fixture producer for exercising an exchange.

use crate::audio::BlockLayout;
use crate::realtime::Sample;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Which fixture signal the writer renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    #[default]
    Sine,
    /// Every sample carries the block's generation number.
    Tag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Same sine on every channel.
    Sine { frequency: f32, amplitude: f32 },
    /// Each sample holds the bit pattern of the block's generation.
    GenerationTag,
}

/// Renders one block per call, keeping phase across calls.
#[derive(Debug, Clone)]
pub struct TestTone {
    signal: Signal,
    sample_rate: u32,
    phase: f32,
}

impl TestTone {
    pub fn new(signal: Signal, sample_rate: u32) -> Self {
        Self {
            signal,
            sample_rate: sample_rate.max(1),
            phase: 0.0,
        }
    }

    pub fn sine(frequency: f32, sample_rate: u32) -> Self {
        Self::new(
            Signal::Sine {
                frequency,
                amplitude: 0.5,
            },
            sample_rate,
        )
    }

    pub fn tagged() -> Self {
        Self::new(Signal::GenerationTag, 48_000)
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Fill `out` with the block for `generation`.
    ///
    /// `out` must hold `layout.len()` samples. Allocation-free.
    pub fn render<S: Sample>(&mut self, layout: &BlockLayout, generation: u64, out: &mut [S]) {
        match self.signal {
            Signal::GenerationTag => out.fill(S::from_bits(generation as u32)),
            Signal::Sine {
                frequency,
                amplitude,
            } => {
                let step = TAU * frequency / self.sample_rate as f32;
                for frame in 0..layout.frames() {
                    let value = S::from_f32(amplitude * self.phase.sin());
                    for channel in 0..layout.channels() {
                        out[layout.index(frame, channel)] = value;
                    }
                    self.phase = (self.phase + step).rem_euclid(TAU);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_fills_block() {
        let layout = BlockLayout::interleaved(8, 2).unwrap();
        let mut tone = TestTone::tagged();
        let mut out = vec![0i32; layout.len()];
        tone.render(&layout, 42, &mut out);
        assert!(out.iter().all(|&v| v == 42));
    }

    #[test]
    fn test_sine_is_continuous_across_blocks() {
        let layout = BlockLayout::planar(64, 2).unwrap();
        let mut tone = TestTone::sine(1000.0, 48_000);
        let mut first = vec![0.0f32; layout.len()];
        let mut second = vec![0.0f32; layout.len()];
        tone.render(&layout, 1, &mut first);
        tone.render(&layout, 2, &mut second);

        let mut one_shot = TestTone::sine(1000.0, 48_000);
        let long = BlockLayout::planar(128, 2).unwrap();
        let mut whole = vec![0.0f32; long.len()];
        one_shot.render(&long, 1, &mut whole);

        for frame in 0..64 {
            assert!((second[layout.index(frame, 0)] - whole[long.index(frame + 64, 0)]).abs() < 1e-4);
            assert_eq!(first[layout.index(frame, 0)], first[layout.index(frame, 1)]);
        }
        assert!(first.iter().all(|v| v.abs() <= 0.5 + 1e-6));
    }

    #[test]
    fn test_phase_stays_wrapped_above_sample_rate() {
        let layout = BlockLayout::interleaved(512, 1).unwrap();
        let mut tone = TestTone::sine(100_000.0, 48_000);
        let mut out = vec![0.0f32; layout.len()];
        for generation in 1..=1000 {
            tone.render(&layout, generation, &mut out);
            assert!(tone.phase >= 0.0 && tone.phase <= TAU);
        }
        assert!(out.iter().all(|v| v.abs() <= 0.5 + 1e-6));
    }

    #[test]
    fn test_negative_frequency_keeps_phase_in_range() {
        let layout = BlockLayout::interleaved(64, 1).unwrap();
        let mut tone = TestTone::sine(-440.0, 48_000);
        let mut out = vec![0.0f32; layout.len()];
        for generation in 1..=100 {
            tone.render(&layout, generation, &mut out);
            assert!(tone.phase >= 0.0 && tone.phase <= TAU);
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Block geometry: frame count, channel count and sample ordering.

use crate::realtime::ExchangeError;
use serde::{Deserialize, Serialize};

/// Upper bound on channels per block.
pub const MAX_CHANNELS: u16 = 64;

/// How the samples of one block are ordered in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockFormat {
    /// `L R L R ...` - one frame after another.
    #[default]
    Interleaved,
    /// `L L ... R R ...` - one channel after another.
    Planar,
}

/// Fixed shape of an exchanged audio block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    frames: usize,
    channels: u16,
    format: BlockFormat,
}

impl BlockLayout {
    /// Validate and create a layout.
    pub fn new(frames: usize, channels: u16, format: BlockFormat) -> Result<Self, ExchangeError> {
        if frames == 0 || channels == 0 || channels > MAX_CHANNELS {
            return Err(ExchangeError::InvalidLayout { frames, channels });
        }
        if frames.checked_mul(channels as usize).is_none() {
            return Err(ExchangeError::InvalidLayout { frames, channels });
        }
        Ok(Self {
            frames,
            channels,
            format,
        })
    }

    /// Interleaved layout shorthand.
    pub fn interleaved(frames: usize, channels: u16) -> Result<Self, ExchangeError> {
        Self::new(frames, channels, BlockFormat::Interleaved)
    }

    /// Planar layout shorthand.
    pub fn planar(frames: usize, channels: u16) -> Result<Self, ExchangeError> {
        Self::new(frames, channels, BlockFormat::Planar)
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    #[inline]
    pub fn format(&self) -> BlockFormat {
        self.format
    }

    /// Total number of samples in one block.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames * self.channels as usize
    }

    /// Always false; a valid layout holds at least one sample.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Position of `(frame, channel)` in the flat sample sequence.
    ///
    /// Panics if either coordinate is out of range.
    #[inline]
    pub fn index(&self, frame: usize, channel: u16) -> usize {
        assert!(
            frame < self.frames && channel < self.channels,
            "sample ({frame}, {channel}) outside {}x{} block",
            self.frames,
            self.channels
        );
        match self.format {
            BlockFormat::Interleaved => frame * self.channels as usize + channel as usize,
            BlockFormat::Planar => channel as usize * self.frames + frame,
        }
    }

    /// Iterate the samples of one channel in frame order.
    pub fn channel<'a, S: Copy>(
        &self,
        block: &'a [S],
        channel: u16,
    ) -> impl Iterator<Item = S> + 'a {
        let layout = *self;
        (0..self.frames).map(move |frame| block[layout.index(frame, channel)])
    }

    /// Fail unless `len` matches this layout.
    #[inline]
    pub fn check_len(&self, len: usize) -> Result<(), ExchangeError> {
        if len == self.len() {
            Ok(())
        } else {
            Err(ExchangeError::BlockSizeMismatch {
                expected: self.len(),
                actual: len,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(BlockLayout::interleaved(0, 2).is_err());
        assert!(BlockLayout::interleaved(64, 0).is_err());
        assert!(BlockLayout::interleaved(64, MAX_CHANNELS + 1).is_err());
        assert!(BlockLayout::interleaved(1, 1).is_ok());
        assert!(BlockLayout::planar(8192, 8).is_ok());
    }

    #[test]
    fn test_interleaved_index() {
        let layout = BlockLayout::interleaved(4, 2).unwrap();
        assert_eq!(layout.len(), 8);
        assert_eq!(layout.index(0, 0), 0);
        assert_eq!(layout.index(0, 1), 1);
        assert_eq!(layout.index(3, 1), 7);
    }

    #[test]
    fn test_planar_index() {
        let layout = BlockLayout::planar(4, 2).unwrap();
        assert_eq!(layout.index(0, 0), 0);
        assert_eq!(layout.index(0, 1), 4);
        assert_eq!(layout.index(3, 1), 7);
    }

    #[test]
    fn test_channel_iteration() {
        let block = [1, 10, 2, 20, 3, 30];
        let layout = BlockLayout::interleaved(3, 2).unwrap();
        assert_eq!(layout.channel(&block, 1).collect::<Vec<_>>(), vec![10, 20, 30]);

        let planar = BlockLayout::planar(3, 2).unwrap();
        assert_eq!(planar.channel(&block, 1).collect::<Vec<_>>(), vec![20, 3, 30]);
    }

    #[test]
    fn test_check_len() {
        let layout = BlockLayout::interleaved(4, 2).unwrap();
        assert!(layout.check_len(8).is_ok());
        assert!(matches!(
            layout.check_len(7),
            Err(ExchangeError::BlockSizeMismatch {
                expected: 8,
                actual: 7
            })
        ));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sample types and lock-free sample cells.
//!
//! Every supported sample type round-trips through a `u32` bit pattern, so a
//! block can live in plain `AtomicU32` storage. Relaxed loads and stores on
//! that storage are what let the single-slot buffer hand a torn block to a
//! careless reader without it ever becoming undefined behaviour.
//!
//! # Usage
//!
//! ```ignore
//! use syncbuf::realtime::AtomicF32;
//!
//! let peak = AtomicF32::new(0.0);
//!
//! // Reader thread stores the measured level
//! peak.set(0.5);
//!
//! // UI thread reads it
//! let v = peak.get();
//! ```

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

/// A PCM sample type that can be exchanged between threads.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    /// Raw bit pattern used for atomic storage.
    fn to_bits(self) -> u32;

    /// Rebuild a sample from its raw bit pattern.
    fn from_bits(bits: u32) -> Self;

    /// Convert to a normalized float (-1.0 to 1.0 for integer formats).
    fn to_f32(self) -> f32;

    /// Convert from a normalized float, clamping integer formats.
    fn from_f32(value: f32) -> Self;
}

impl Sample for f32 {
    #[inline]
    fn to_bits(self) -> u32 {
        f32::to_bits(self)
    }

    #[inline]
    fn from_bits(bits: u32) -> Self {
        f32::from_bits(bits)
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl Sample for i32 {
    #[inline]
    fn to_bits(self) -> u32 {
        self as u32
    }

    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as i32
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 / i32::MAX as f32
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        (value.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32
    }
}

impl Sample for i16 {
    #[inline]
    fn to_bits(self) -> u32 {
        self as u16 as u32
    }

    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as u16 as i16
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 / i16::MAX as f32
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }
}

/// A single sample slot that can be written and read concurrently.
///
/// Uses `Relaxed` ordering; publication ordering is provided by the owning
/// buffer's generation counter, not by the cell.
#[derive(Debug)]
pub struct AtomicSample<S: Sample> {
    bits: AtomicU32,
    _marker: PhantomData<S>,
}

impl<S: Sample> AtomicSample<S> {
    #[inline]
    pub fn new(value: S) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn load(&self) -> S {
        S::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: S) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl<S: Sample> Default for AtomicSample<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

/// Atomic f32 for lock-free level sharing.
///
/// Uses `Relaxed` ordering by default, which is sufficient for independent
/// values that don't need to synchronize with other data.
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    /// Create a new atomic f32 with the given initial value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    /// Get the current value.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Set a new value.
    #[inline]
    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Swap the value and return the old one.
    #[inline]
    pub fn swap(&self, value: f32) -> f32 {
        f32::from_bits(self.bits.swap(value.to_bits(), Ordering::Relaxed))
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f32() {
        let level = AtomicF32::new(1.0);
        assert!((level.get() - 1.0).abs() < 0.0001);

        level.set(0.5);
        assert!((level.get() - 0.5).abs() < 0.0001);

        let old = level.swap(0.75);
        assert!((old - 0.5).abs() < 0.0001);
        assert!((level.get() - 0.75).abs() < 0.0001);
    }

    #[test]
    fn test_sample_bits_preserve_value() {
        for v in [0.0f32, -0.0, 1.0, -1.0, 0.123_456_7, f32::MIN_POSITIVE] {
            assert_eq!(<f32 as Sample>::from_bits(Sample::to_bits(v)).to_bits(), v.to_bits());
        }
        for v in [i16::MIN, -1, 0, 1, i16::MAX] {
            assert_eq!(<i16 as Sample>::from_bits(Sample::to_bits(v)), v);
        }
        for v in [i32::MIN, -1, 0, 1, i32::MAX] {
            assert_eq!(<i32 as Sample>::from_bits(Sample::to_bits(v)), v);
        }
    }

    #[test]
    fn test_integer_normalization_clamps() {
        assert_eq!(i16::from_f32(2.0), i16::MAX);
        assert_eq!(i16::from_f32(-2.0), -i16::MAX);
        assert!((i16::MAX.to_f32() - 1.0).abs() < 0.0001);
        assert_eq!(i32::from_f32(0.0), 0);
        assert!((i32::from_f32(0.5).to_f32() - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_atomic_sample_cell() {
        let cell = AtomicSample::<i16>::default();
        assert_eq!(cell.load(), 0);
        cell.store(-1234);
        assert_eq!(cell.load(), -1234);
    }
}

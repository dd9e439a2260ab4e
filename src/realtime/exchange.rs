// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Writer/reader traits shared by every block exchange.
//!
//! Pipelines are written against [`BlockSink`] and [`BlockSource`] so the
//! same render and consume loops drive either the single-slot
//! [`SynchronizedBuffer`](super::SynchronizedBuffer) or the
//! [`TripleBuffer`](super::TripleBuffer).

use crate::audio::BlockLayout;
use crate::realtime::Sample;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Invalid block layout: {frames} frames x {channels} channels")]
    InvalidLayout { frames: usize, channels: u16 },
    #[error("Block size mismatch: expected {expected} samples, got {actual}")]
    BlockSizeMismatch { expected: usize, actual: usize },
    #[error("Layout mismatch: writer uses {expected:?}, reader uses {actual:?}")]
    LayoutMismatch {
        expected: BlockLayout,
        actual: BlockLayout,
    },
}

/// Returned by `begin_read()` when a fresh generation is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket {
    /// Generation now visible to the reader (1 for the first publication).
    pub generation: u64,
    /// Generations published and overwritten since the previous ticket.
    pub missed: u64,
}

/// One block handed to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub generation: u64,
    pub missed: u64,
    /// False when the exchange saw the writer touch the block while it was
    /// being copied out.
    pub intact: bool,
}

impl Delivery {
    pub fn from_ticket(ticket: ReadTicket, intact: bool) -> Self {
        Self {
            generation: ticket.generation,
            missed: ticket.missed,
            intact,
        }
    }
}

/// Writer side of an exchange.
pub trait BlockSink<S: Sample>: Send {
    fn layout(&self) -> BlockLayout;

    /// Last generation published by this writer (0 before the first).
    fn generation(&self) -> u64;

    /// Copy `block` in and publish it, returning the new generation.
    fn publish(&mut self, block: &[S]) -> Result<u64, ExchangeError>;
}

/// Reader side of an exchange.
pub trait BlockSource<S: Sample>: Send {
    fn layout(&self) -> BlockLayout;

    /// Copy the newest unread block into `out`.
    ///
    /// Returns `Ok(None)` without touching `out` when nothing new has been
    /// published since the last delivery.
    fn poll_into(&mut self, out: &mut [S]) -> Result<Option<Delivery>, ExchangeError>;
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Wait-free single-slot block exchange.
//!
//! Hands one block of samples from the render thread to a reader thread
//! without the writer ever waiting on the reader.
//!
//! # Protocol
//!
//! ```text
//! writer:  begin_write() -> BlockWrite::set()/copy_from_slice() -> end_write()   (release)
//! reader:  begin_read()  (acquire) -> get()/copy_to_slice() -> [end_read()]
//! ```
//!
//! The `state` counter carries the published generation in its upper bits
//! and a write-in-flight flag in bit 0. `end_write()` is the publication
//! point: every sample stored before it is visible to a reader whose
//! `begin_read()` observes the new generation.
//!
//! # Torn reads
//!
//! There is exactly one slot. If the reader is still copying when the writer
//! starts the next cycle, the copy mixes two generations. The buffer does not
//! prevent this; pacing is the surrounding pipeline's job. `end_read()`
//! reports whether it happened. Use [`TripleBuffer`](super::TripleBuffer)
//! when the reader cannot keep up.
//!
//! # Example
//!
//! ```ignore
//! use syncbuf::audio::BlockLayout;
//! use syncbuf::realtime::SynchronizedBuffer;
//!
//! let layout = BlockLayout::interleaved(256, 2)?;
//! let (mut writer, mut reader) = SynchronizedBuffer::<f32>::new(layout).split();
//!
//! // Render thread
//! let mut write = writer.begin_write();
//! write.set(0, 0, 0.25);
//! write.end_write();
//!
//! // Reader thread
//! if let Some(ticket) = reader.begin_read() {
//!     let left = reader.get(0, 0);
//! }
//! ```

use crate::audio::BlockLayout;
use crate::realtime::{
    AtomicSample, BlockSink, BlockSource, Delivery, ExchangeError, ReadTicket, Sample,
};
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;

const WRITING: u64 = 1;

#[inline]
fn generation_of(state: u64) -> u64 {
    state >> 1
}

/// Ownership phase of a buffer as seen from its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPhase {
    /// Nothing published yet and no write in flight.
    Idle,
    /// Writer is between `begin_write()` and `end_write()`.
    Writing,
    /// A generation the reader has not yet taken.
    Published,
    /// Reader has taken the newest generation.
    Consumed,
}

/// A single-slot audio block shared by one writer and one reader.
///
/// Construct it, then [`split`](Self::split) it into the handle pair; the
/// buffer itself exposes no data access so that at most one writer and one
/// reader can ever exist.
pub struct SynchronizedBuffer<S: Sample> {
    samples: Box<[AtomicSample<S>]>,
    /// Bit 0: write in flight. Bits 1..: last published generation.
    state: AtomicU64,
    /// Last generation taken by the reader.
    consumed: AtomicU64,
    layout: BlockLayout,
}

impl<S: Sample> SynchronizedBuffer<S> {
    /// Allocate a zeroed buffer for `layout`.
    pub fn new(layout: BlockLayout) -> Self {
        let samples = (0..layout.len())
            .map(|_| AtomicSample::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            samples,
            state: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            layout,
        }
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Split into the writer and reader handles.
    pub fn split(self) -> (BlockWriter<S>, BlockReader<S>) {
        let shared = Arc::new(self);
        (
            BlockWriter {
                inner: Arc::clone(&shared),
                generation: 0,
            },
            BlockReader {
                inner: shared,
                last_seen: 0,
                ticket_state: None,
            },
        )
    }

    fn phase(&self) -> BufferPhase {
        let state = self.state.load(Ordering::Acquire);
        let generation = generation_of(state);
        if state & WRITING != 0 {
            BufferPhase::Writing
        } else if generation == 0 {
            BufferPhase::Idle
        } else if self.consumed.load(Ordering::Acquire) >= generation {
            BufferPhase::Consumed
        } else {
            BufferPhase::Published
        }
    }
}

/// Writer handle. Lives on the render thread.
pub struct BlockWriter<S: Sample> {
    inner: Arc<SynchronizedBuffer<S>>,
    generation: u64,
}

impl<S: Sample> BlockWriter<S> {
    /// Mark a write as in flight and return the guard that owns the samples
    /// until [`BlockWrite::end_write`].
    #[inline]
    pub fn begin_write(&mut self) -> BlockWrite<'_, S> {
        self.inner
            .state
            .store((self.generation << 1) | WRITING, Ordering::Relaxed);
        // Keeps the sample stores below from becoming visible before the flag.
        fence(Ordering::Release);
        BlockWrite {
            writer: self,
            ended: false,
        }
    }

    /// `begin_write()`, copy, `end_write()`.
    ///
    /// Checks the length first so a mismatched slice never leaves a write in
    /// flight.
    pub fn write_block(&mut self, block: &[S]) -> Result<u64, ExchangeError> {
        self.inner.layout.check_len(block.len())?;
        let mut write = self.begin_write();
        write.copy_from_slice(block)?;
        Ok(write.end_write())
    }

    /// Last published generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn layout(&self) -> BlockLayout {
        self.inner.layout
    }

    pub fn phase(&self) -> BufferPhase {
        self.inner.phase()
    }

    #[inline]
    fn publish_next(&mut self) -> u64 {
        self.generation += 1;
        self.inner
            .state
            .store(self.generation << 1, Ordering::Release);
        self.generation
    }
}

/// An in-flight write. Sample stores are only reachable through this guard,
/// so every change to the block happens with the in-flight flag set.
///
/// Dropping the guard without calling `end_write()` still publishes what was
/// written.
pub struct BlockWrite<'a, S: Sample> {
    writer: &'a mut BlockWriter<S>,
    ended: bool,
}

impl<S: Sample> BlockWrite<'_, S> {
    #[inline]
    pub fn set(&mut self, frame: usize, channel: u16, value: S) {
        let inner = &self.writer.inner;
        inner.samples[inner.layout.index(frame, channel)].store(value);
    }

    /// Overwrite the whole block from a flat slice in layout order.
    pub fn copy_from_slice(&mut self, block: &[S]) -> Result<(), ExchangeError> {
        let inner = &self.writer.inner;
        inner.layout.check_len(block.len())?;
        for (cell, &value) in inner.samples.iter().zip(block) {
            cell.store(value);
        }
        Ok(())
    }

    pub fn fill(&mut self, value: S) {
        for cell in self.writer.inner.samples.iter() {
            cell.store(value);
        }
    }

    pub fn layout(&self) -> BlockLayout {
        self.writer.inner.layout
    }

    /// Publish everything written since `begin_write()`.
    ///
    /// Returns the new generation.
    #[inline]
    pub fn end_write(mut self) -> u64 {
        self.ended = true;
        self.writer.publish_next()
    }
}

impl<S: Sample> Drop for BlockWrite<'_, S> {
    fn drop(&mut self) {
        if !self.ended {
            self.writer.publish_next();
        }
    }
}

/// Reader handle. Lives on the consuming thread.
pub struct BlockReader<S: Sample> {
    inner: Arc<SynchronizedBuffer<S>>,
    last_seen: u64,
    /// Raw `state` observed by the last fresh `begin_read()`.
    ticket_state: Option<u64>,
}

impl<S: Sample> BlockReader<S> {
    /// Take the newest generation if it has not been seen yet.
    ///
    /// Returns `None` when nothing was published since the previous ticket,
    /// so calling this twice in a row without an `end_write()` in between
    /// yields `None` the second time.
    #[inline]
    pub fn begin_read(&mut self) -> Option<ReadTicket> {
        let state = self.inner.state.load(Ordering::Acquire);
        let generation = generation_of(state);
        if generation <= self.last_seen {
            return None;
        }

        let ticket = ReadTicket {
            generation,
            missed: generation - self.last_seen - 1,
        };
        self.last_seen = generation;
        self.ticket_state = Some(state);
        self.inner.consumed.store(generation, Ordering::Release);
        Some(ticket)
    }

    /// Check that no write touched the block since the last fresh
    /// `begin_read()`.
    ///
    /// `true` means every sample read in between belongs to the ticket's
    /// generation. Returns `false` if there was no ticket.
    #[inline]
    pub fn end_read(&mut self) -> bool {
        let Some(observed) = self.ticket_state.take() else {
            return false;
        };
        fence(Ordering::Acquire);
        let now = self.inner.state.load(Ordering::Relaxed);
        observed & WRITING == 0 && now == observed
    }

    #[inline]
    pub fn get(&self, frame: usize, channel: u16) -> S {
        self.inner.samples[self.inner.layout.index(frame, channel)].load()
    }

    /// Copy the whole block out in layout order.
    pub fn copy_to_slice(&self, out: &mut [S]) -> Result<(), ExchangeError> {
        self.inner.layout.check_len(out.len())?;
        for (dst, cell) in out.iter_mut().zip(self.inner.samples.iter()) {
            *dst = cell.load();
        }
        Ok(())
    }

    /// Generation of the last ticket (0 before the first).
    pub fn generation(&self) -> u64 {
        self.last_seen
    }

    pub fn layout(&self) -> BlockLayout {
        self.inner.layout
    }

    pub fn phase(&self) -> BufferPhase {
        self.inner.phase()
    }
}

impl<S: Sample> BlockSink<S> for BlockWriter<S> {
    fn layout(&self) -> BlockLayout {
        self.inner.layout
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn publish(&mut self, block: &[S]) -> Result<u64, ExchangeError> {
        self.write_block(block)
    }
}

impl<S: Sample> BlockSource<S> for BlockReader<S> {
    fn layout(&self) -> BlockLayout {
        self.inner.layout
    }

    fn poll_into(&mut self, out: &mut [S]) -> Result<Option<Delivery>, ExchangeError> {
        self.inner.layout.check_len(out.len())?;
        let Some(ticket) = self.begin_read() else {
            return Ok(None);
        };
        self.copy_to_slice(out)?;
        let intact = self.end_read();
        Ok(Some(Delivery::from_ticket(ticket, intact)))
    }
}

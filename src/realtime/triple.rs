// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lock-free three-slot block exchange.
//!
//! The writer fills a slot the reader cannot see, then swaps it with the
//! shared "back" slot. The reader swaps its own slot with the back slot when
//! the back slot is marked dirty. Each side only ever touches the slot it
//! owns, so a reader can take as long as it likes without tearing; when it
//! falls behind, intermediate generations are skipped and reported.
//!
//! ```ignore
//! use syncbuf::audio::BlockLayout;
//! use syncbuf::realtime::TripleBuffer;
//!
//! let (mut writer, mut reader) =
//!     TripleBuffer::<f32>::new(BlockLayout::interleaved(512, 2)?).split();
//!
//! // Render thread
//! let block = writer.begin_write();
//! block.fill(0.0);
//! writer.end_write();
//!
//! // Reader thread
//! if reader.begin_read().is_some() {
//!     let samples: &[f32] = reader.block();
//! }
//! ```

use crate::audio::BlockLayout;
use crate::realtime::{BlockSink, BlockSource, Delivery, ExchangeError, ReadTicket, Sample};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const INDEX_MASK: u8 = 0b011;
const DIRTY: u8 = 0b100;

struct Slot<S> {
    samples: Box<[S]>,
    generation: u64,
}

/// A three-slot exchange shared by one writer and one reader.
pub struct TripleBuffer<S: Sample> {
    slots: [UnsafeCell<Slot<S>>; 3],
    /// Index of the back slot, plus `DIRTY` when it holds an unread block.
    back: AtomicU8,
    layout: BlockLayout,
}

// SAFETY: Each slot is owned by exactly one of writer, reader or `back` at
// any time. Ownership moves only through the atomic swap on `back`, whose
// AcqRel ordering makes the previous owner's accesses happen-before the new
// owner's.
unsafe impl<S: Sample> Send for TripleBuffer<S> {}
unsafe impl<S: Sample> Sync for TripleBuffer<S> {}

impl<S: Sample> TripleBuffer<S> {
    pub fn new(layout: BlockLayout) -> Self {
        let slot = || {
            UnsafeCell::new(Slot {
                samples: vec![S::default(); layout.len()].into_boxed_slice(),
                generation: 0,
            })
        };

        Self {
            slots: [slot(), slot(), slot()],
            back: AtomicU8::new(1),
            layout,
        }
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Split into writer and reader handles.
    pub fn split(self) -> (TripleWriter<S>, TripleReader<S>) {
        let shared = Arc::new(self);
        (
            TripleWriter {
                inner: Arc::clone(&shared),
                index: 0,
                generation: 0,
            },
            TripleReader {
                inner: shared,
                index: 2,
                last_seen: 0,
            },
        )
    }
}

/// Writer handle for the triple buffer.
pub struct TripleWriter<S: Sample> {
    inner: Arc<TripleBuffer<S>>,
    index: usize,
    generation: u64,
}

impl<S: Sample> TripleWriter<S> {
    /// The writer's private slot.
    ///
    /// Holds whatever generation was last swapped out of it, not the newest
    /// one; overwrite every sample before calling `end_write()`.
    #[inline]
    pub fn begin_write(&mut self) -> &mut [S] {
        // SAFETY: the writer owns slot `index` until the next swap, and the
        // returned borrow ends before `end_write()` can take `&mut self`.
        unsafe { &mut (&mut (*self.inner.slots[self.index].get()).samples)[..] }
    }

    /// Publish the private slot and take the old back slot in exchange.
    #[inline]
    pub fn end_write(&mut self) -> u64 {
        self.generation += 1;
        // SAFETY: still the owner of `index`.
        unsafe {
            (*self.inner.slots[self.index].get()).generation = self.generation;
        }
        let previous = self
            .inner
            .back
            .swap(self.index as u8 | DIRTY, Ordering::AcqRel);
        self.index = (previous & INDEX_MASK) as usize;
        self.generation
    }

    pub fn write_block(&mut self, block: &[S]) -> Result<u64, ExchangeError> {
        self.inner.layout.check_len(block.len())?;
        self.begin_write().copy_from_slice(block);
        Ok(self.end_write())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn layout(&self) -> BlockLayout {
        self.inner.layout
    }
}

/// Reader handle for the triple buffer.
pub struct TripleReader<S: Sample> {
    inner: Arc<TripleBuffer<S>>,
    index: usize,
    last_seen: u64,
}

impl<S: Sample> TripleReader<S> {
    /// Take the newest published block, if there is one the reader has not
    /// seen.
    #[inline]
    pub fn begin_read(&mut self) -> Option<ReadTicket> {
        // Only the reader clears DIRTY, so a relaxed peek cannot race to a
        // false positive.
        if self.inner.back.load(Ordering::Relaxed) & DIRTY == 0 {
            return None;
        }

        let previous = self.inner.back.swap(self.index as u8, Ordering::AcqRel);
        self.index = (previous & INDEX_MASK) as usize;

        let generation = self.slot().generation;
        let ticket = ReadTicket {
            generation,
            missed: generation.saturating_sub(self.last_seen + 1),
        };
        self.last_seen = generation;
        Some(ticket)
    }

    /// Samples of the last block taken by `begin_read()`.
    #[inline]
    pub fn block(&self) -> &[S] {
        &self.slot().samples[..]
    }

    #[inline]
    pub fn get(&self, frame: usize, channel: u16) -> S {
        self.block()[self.inner.layout.index(frame, channel)]
    }

    pub fn generation(&self) -> u64 {
        self.last_seen
    }

    pub fn layout(&self) -> BlockLayout {
        self.inner.layout
    }

    #[inline]
    fn slot(&self) -> &Slot<S> {
        // SAFETY: the reader owns slot `index`; the writer never touches a
        // slot it has not received through `back`.
        unsafe { &*self.inner.slots[self.index].get() }
    }
}

impl<S: Sample> BlockSink<S> for TripleWriter<S> {
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

impl<S: Sample> BlockSource<S> for TripleReader<S> {
    fn layout(&self) -> BlockLayout {
        self.inner.layout
    }

    fn poll_into(&mut self, out: &mut [S]) -> Result<Option<Delivery>, ExchangeError> {
        self.inner.layout.check_len(out.len())?;
        let Some(ticket) = self.begin_read() else {
            return Ok(None);
        };
        out.copy_from_slice(self.block());
        Ok(Some(Delivery::from_ticket(ticket, true)))
    }
}

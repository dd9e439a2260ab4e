// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Torn-block detection for generation-tagged streams.
//!
//! Pair with [`Signal::GenerationTag`](crate::audio::Signal::GenerationTag):
//! every sample of generation `g` carries the bit pattern of `g`, so a block
//! holding anything else was mixed with another cycle's data.

use crate::audio::{BlockConsumer, BlockLayout};
use crate::realtime::{Delivery, Sample};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct Counts {
    checked: AtomicU64,
    torn: AtomicU64,
    flagged: AtomicU64,
    torn_unflagged: AtomicU64,
}

/// Totals from a [`TagValidator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Blocks inspected.
    pub checked: u64,
    /// Blocks whose samples did not all carry the delivery's tag.
    pub torn: u64,
    /// Blocks the exchange itself reported as not intact.
    pub flagged: u64,
    /// Torn blocks the exchange reported as intact. Always zero for a
    /// correct exchange.
    pub torn_unflagged: u64,
}

/// Shared view of a validator's counters.
#[derive(Debug, Clone, Default)]
pub struct ValidationHandle {
    counts: Arc<Counts>,
}

impl ValidationHandle {
    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            checked: self.counts.checked.load(Ordering::Relaxed),
            torn: self.counts.torn.load(Ordering::Relaxed),
            flagged: self.counts.flagged.load(Ordering::Relaxed),
            torn_unflagged: self.counts.torn_unflagged.load(Ordering::Relaxed),
        }
    }
}

/// Checks each block against its delivery's generation tag.
#[derive(Debug, Default)]
pub struct TagValidator {
    handle: ValidationHandle,
}

impl TagValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ValidationHandle {
        self.handle.clone()
    }

    /// True when every sample carries the tag of `generation`.
    pub fn is_consistent<S: Sample>(block: &[S], generation: u64) -> bool {
        let expected = S::from_bits(generation as u32).to_bits();
        block.iter().all(|s| s.to_bits() == expected)
    }
}

impl<S: Sample> BlockConsumer<S> for TagValidator {
    fn consume(&mut self, _layout: &BlockLayout, block: &[S], delivery: &Delivery) {
        let counts = &self.handle.counts;
        counts.checked.fetch_add(1, Ordering::Relaxed);
        if !delivery.intact {
            counts.flagged.fetch_add(1, Ordering::Relaxed);
        }
        if !Self::is_consistent(block, delivery.generation) {
            counts.torn.fetch_add(1, Ordering::Relaxed);
            if delivery.intact {
                counts.torn_unflagged.fetch_add(1, Ordering::Relaxed);
            }
            trace!("Torn block at generation {}", delivery.generation);
        }
    }
}

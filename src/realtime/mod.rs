// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Real-time safe block exchange between the render thread and a reader.
//!
//! # Real-Time Safety
//!
//! The render thread has strict requirements:
//! - No memory allocation
//! - No locks (mutexes, RwLocks)
//! - No system calls (file I/O, network)
//! - Bounded execution time
//!
//! Every `begin_*`/`end_*` operation in this module is a handful of atomic
//! loads, stores or swaps and never waits on the other side. Allocation
//! happens once, in the constructors.

pub mod atomic_sample;
pub mod exchange;
pub mod synchronized;
pub mod triple;

pub use atomic_sample::{AtomicF32, AtomicSample, Sample};
pub use exchange::{BlockSink, BlockSource, Delivery, ExchangeError, ReadTicket};
pub use synchronized::{BlockReader, BlockWrite, BlockWriter, BufferPhase, SynchronizedBuffer};
pub use triple::{TripleBuffer, TripleReader, TripleWriter};

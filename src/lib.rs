// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! syncbuf - wait-free audio block exchange.
//!
//! Hands fixed-size sample blocks from a real-time render thread to a
//! non-real-time reader (recorder, meter, streamer) without the render
//! thread ever blocking.
//!
//! - [`realtime::SynchronizedBuffer`]: one slot, a generation counter and
//!   release/acquire publication. A reader slower than the writer can see
//!   torn blocks; `end_read()` reports when that happened.
//! - [`realtime::TripleBuffer`]: three slots, never torn, skips generations
//!   when the reader falls behind.
//!
//! Both split into a writer/reader handle pair, so there is never more than
//! one of each.

pub mod audio;
pub mod config;
pub mod realtime;
pub mod session;

pub use session::{Session, SessionError, SessionReport};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reader-side sinks for delivered blocks.

use crate::audio::BlockLayout;
use crate::realtime::{Delivery, Sample};

/// Something the reader thread hands each fresh block to.
///
/// Runs on the non-real-time side, so implementations may allocate, log or
/// do I/O.
pub trait BlockConsumer<S: Sample>: Send {
    fn consume(&mut self, layout: &BlockLayout, block: &[S], delivery: &Delivery);

    /// Called once after the last block of a session.
    fn finish(&mut self) {}
}

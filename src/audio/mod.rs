// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Block geometry, the fixture producer and reader-side consumers.

pub mod consumer;
pub mod layout;
pub mod meter;
pub mod recorder;
pub mod test_tone;
pub mod validator;

pub use consumer::BlockConsumer;
pub use layout::{BlockFormat, BlockLayout, MAX_CHANNELS};
pub use meter::{measure_channel, BlockMeter, MeterData, SharedLevels};
pub use recorder::{Recorder, RecorderError};
pub use test_tone::{Signal, SignalKind, TestTone};
pub use validator::{TagValidator, ValidationHandle, ValidationSummary};

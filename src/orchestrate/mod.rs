// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The fault-tolerant job orchestrator: scatter per-channel inputs, submit
//! one imaging task per channel, resubmit failures within a bounded number
//! of passes, then gather results in channel order.

mod controller;
mod distribute;
mod error;
mod gather;

pub use controller::{await_completion, submit_all};
pub use distribute::{distribute, ChannelData, SharedParams};
pub use error::{ControllerError, GatherError, SetupError};
pub use gather::{emit_qa, gather};

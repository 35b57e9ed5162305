// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Result gathering and best-effort QA emission.

use indexmap::IndexMap;
use itertools::Itertools;
use log::{info, warn};
use vec1::Vec1;

use super::error::GatherError;
use crate::{
    constants::NUM_PLANES,
    fabric::{FutureState, ResultHandle, TaskFuture},
    qa::{qa_cube, Telemetry},
};

/// Collect the computed image cubes in ascending channel order, regardless
/// of the order in which the underlying futures completed. Fails if any
/// future is not a terminal success (which should not occur if the
/// controller's contract held) or if any cube has the wrong shape.
pub fn gather(
    futures: &IndexMap<usize, TaskFuture>,
    npixel: usize,
) -> Result<Vec1<(usize, ResultHandle)>, GatherError> {
    let expected = [NUM_PLANES, npixel, npixel];
    let mut results = Vec::with_capacity(futures.len());
    for (&channel, future) in futures.iter().sorted_by_key(|(&channel, _)| channel) {
        let handle = match future.state() {
            FutureState::Succeeded(handle) => handle,
            other => {
                return Err(GatherError::NotTerminalSuccess {
                    channel,
                    state: other.name(),
                })
            }
        };
        if handle.fetch().shape() != expected.as_slice() {
            return Err(GatherError::BadShape {
                channel,
                got: handle.fetch().shape().to_vec(),
                expected: expected.to_vec(),
            });
        }
        results.push((channel, handle));
    }
    info!("Gathered {} image cubes", results.len());
    Vec1::try_from_vec(results).map_err(|_| GatherError::NoResults)
}

/// Emit one QA record per gathered result, then flush the sink once. QA is
/// best-effort: failures are logged and never abort the run.
pub fn emit_qa(results: &[(usize, ResultHandle)], sink: &dyn Telemetry) {
    info!("Adding QA records to the queue");
    for (channel, handle) in results {
        let record = qa_cube(&format!("channel-{channel}"), handle.fetch().view());
        if let Err(e) = sink.emit("qa", &record) {
            warn!("QA emission for channel {channel} failed: {e}");
        }
    }
    if let Err(e) = sink.flush() {
        warn!("QA flush failed: {e}");
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Task submission and the bounded resubmission loop.

use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info};

use super::error::ControllerError;
use crate::{
    fabric::{DataHandle, Fabric, FutureState, TaskFuture},
    PROGRESS_BARS,
};

/// Submit one imaging task per scattered channel, in ascending channel
/// order. `task_retries` is the fabric's internal retry budget per task.
/// The returned map is keyed by channel index; a replacement future always
/// takes the place of the one it replaces.
pub fn submit_all(
    fabric: &dyn Fabric,
    handles: &[DataHandle],
    task_retries: u32,
) -> Result<IndexMap<usize, TaskFuture>, ControllerError> {
    info!("Submitting {} imaging tasks", handles.len());
    let mut futures = IndexMap::with_capacity(handles.len());
    for handle in handles {
        let future = fabric.submit(handle, task_retries)?;
        futures.insert(handle.channel(), future);
    }
    Ok(futures)
}

/// Block until every future is terminal, resubmitting failed tasks for at
/// most `max_passes` outer passes. The outer ceiling bounds total attempts
/// regardless of the fabric's internal budget; channels still failed when it
/// is exhausted abort the run.
pub fn await_completion(
    fabric: &dyn Fabric,
    handles: &[DataHandle],
    futures: &mut IndexMap<usize, TaskFuture>,
    task_retries: u32,
    max_passes: u32,
) -> Result<(), ControllerError> {
    info!("Imaging on workers");
    wait_all(futures);

    for pass in 1..=max_passes {
        let failed = failed_channels(futures);
        if failed.is_empty() {
            return Ok(());
        }

        for &channel in &failed {
            let stale = &futures[&channel];
            match stale.failure_cause() {
                Some(cause) => error!(
                    "Channel {channel} failed (resubmission pass {pass}/{max_passes}): {cause}"
                ),
                None => error!("Channel {channel} failed with no recorded cause"),
            }
            stale.cancel();

            // Resubmission preserves channel identity: the fresh future
            // replaces the stale one under the same key.
            debug!("Resubmitting channel {channel}");
            let fresh = fabric.submit(&handles[channel], task_retries)?;
            futures.insert(channel, fresh);
        }

        wait_all(futures);
    }

    let failed = failed_channels(futures);
    if failed.is_empty() {
        Ok(())
    } else {
        Err(ControllerError::RetriesExhausted {
            channels: failed,
            passes: max_passes,
        })
    }
}

fn failed_channels(futures: &IndexMap<usize, TaskFuture>) -> Vec<usize> {
    let mut channels: Vec<usize> = futures
        .iter()
        .filter(|(_, f)| matches!(f.state(), FutureState::Failed(_)))
        .map(|(&channel, _)| channel)
        .collect();
    channels.sort_unstable();
    channels
}

/// Wait for every future to reach a terminal state, reporting progress
/// incrementally. Each wait is a cooperative block; the coordinator does no
/// work of its own here.
fn wait_all(futures: &IndexMap<usize, TaskFuture>) {
    let pb = ProgressBar::with_draw_target(
        Some(futures.len() as u64),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} channels ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_message("Imaging");

    pb.tick();
    for (channel, future) in futures {
        future.wait();
        debug!(
            "Channel {channel} reached terminal state '{}'",
            future.state().name()
        );
        pb.inc(1);
    }
    pb.finish_and_clear();
}

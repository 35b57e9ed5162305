// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The client-side contract with the distributed execution fabric.
//!
//! The fabric itself (worker processes, task scheduling, inter-process data
//! transfer) is an external collaborator; the orchestrator is a *client* of
//! these primitives. [`LocalCluster`] is a thread-pool-backed reference
//! implementation so that the pipeline is runnable and testable in one
//! process; a real cluster client implements the same [`Fabric`] trait.

mod local;

pub use local::LocalCluster;

use std::sync::{Arc, Condvar, Mutex};

use crossbeam_utils::atomic::AtomicCell;
use thiserror::Error;

use crate::imaging::ImageCube;
use crate::orchestrate::ChannelData;

/// Task submission, scatter and future primitives offered by the cluster.
pub trait Fabric: Send + Sync {
    /// Place one channel's data on the cluster, returning an opaque handle.
    /// After scattering, the coordinating process holds only handles.
    fn scatter(&self, data: ChannelData) -> Result<DataHandle, FabricError>;

    /// Submit one imaging task against previously-scattered channel data.
    /// `retries` is the fabric's *internal* retry budget for transient
    /// faults; the controller's resubmission loop is a second, outer line of
    /// defence, not a substitute for it.
    fn submit(&self, handle: &DataHandle, retries: u32) -> Result<TaskFuture, FabricError>;

    /// A human-readable description of the cluster, for diagnostics.
    fn describe(&self) -> String;
}

/// A cluster-resident handle to one channel's scattered input data.
///
/// Scattered data is read-only; no task may mutate another task's input.
#[derive(Clone)]
pub struct DataHandle {
    channel: usize,
    data: Arc<ChannelData>,
}

impl DataHandle {
    pub fn new(data: ChannelData) -> DataHandle {
        DataHandle {
            channel: data.channel,
            data: Arc::new(data),
        }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn data(&self) -> &Arc<ChannelData> {
        &self.data
    }
}

/// A cluster-resident handle to one completed image cube. Fetching is cheap
/// here; a real fabric client would pull the tensor over the wire.
#[derive(Clone, Debug)]
pub struct ResultHandle(Arc<ImageCube>);

impl ResultHandle {
    pub(crate) fn new(cube: ImageCube) -> ResultHandle {
        ResultHandle(Arc::new(cube))
    }

    pub fn fetch(&self) -> &ImageCube {
        &self.0
    }
}

/// The lifecycle of one remote computation.
#[derive(Clone)]
pub enum FutureState {
    Pending,
    Running,
    Succeeded(ResultHandle),
    Failed(String),
}

impl FutureState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FutureState::Succeeded(_) | FutureState::Failed(_))
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            FutureState::Pending => "pending",
            FutureState::Running => "running",
            FutureState::Succeeded(_) => "succeeded",
            FutureState::Failed(_) => "failed",
        }
    }
}

struct FutureInner {
    state: Mutex<FutureState>,
    completed: Condvar,
    cancelled: AtomicCell<bool>,
}

/// A handle to one in-flight or completed remote computation, one per
/// channel. `Pending -> Running -> {Succeeded, Failed}`; a `Failed` future
/// may be cancelled and replaced by a fresh submission for the same channel.
#[derive(Clone)]
pub struct TaskFuture {
    channel: usize,
    inner: Arc<FutureInner>,
}

impl TaskFuture {
    /// Create a paired future and completion slot. For fabric
    /// implementations: the future goes to the controller, the slot to
    /// whichever worker runs the task.
    pub fn new(channel: usize) -> (TaskFuture, TaskSlot) {
        let inner = Arc::new(FutureInner {
            state: Mutex::new(FutureState::Pending),
            completed: Condvar::new(),
            cancelled: AtomicCell::new(false),
        });
        (
            TaskFuture {
                channel,
                inner: Arc::clone(&inner),
            },
            TaskSlot { inner },
        )
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    /// A snapshot of the future's state.
    pub fn state(&self) -> FutureState {
        self.inner.state.lock().expect("future lock poisoned").clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Block (cooperatively; no busy-waiting) until the future reaches a
    /// terminal state.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock().expect("future lock poisoned");
        while !state.is_terminal() {
            state = self
                .inner
                .completed
                .wait(state)
                .expect("future lock poisoned");
        }
    }

    /// The remote failure cause, if the future has failed.
    pub fn failure_cause(&self) -> Option<String> {
        match self.state() {
            FutureState::Failed(cause) => Some(cause),
            _ => None,
        }
    }

    /// Cancel a stale future. Only done when the future is `Failed` and is
    /// about to be replaced by a fresh submission for the same channel; any
    /// late writes from a worker are discarded.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true);
    }
}

/// The worker-side completion handle paired with a [`TaskFuture`].
pub struct TaskSlot {
    inner: Arc<FutureInner>,
}

impl TaskSlot {
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load()
    }

    pub fn running(&self) {
        self.transition(FutureState::Running);
    }

    pub fn succeed(&self, cube: ImageCube) {
        self.transition(FutureState::Succeeded(ResultHandle::new(cube)));
    }

    pub fn fail(&self, cause: String) {
        self.transition(FutureState::Failed(cause));
    }

    fn transition(&self, next: FutureState) {
        if self.is_cancelled() {
            return;
        }
        let mut state = self.inner.state.lock().expect("future lock poisoned");
        *state = next;
        self.inner.completed.notify_all();
    }
}

#[derive(Error, Debug)]
pub enum FabricError {
    #[error("Cannot reach the execution fabric at '{address}': {reason}")]
    Connect { address: String, reason: String },

    #[error("Failed to scatter data for channel {channel}: the worker pool has shut down")]
    Scatter { channel: usize },

    #[error("Failed to submit a task for channel {channel}: the worker pool has shut down")]
    Submit { channel: usize },
}

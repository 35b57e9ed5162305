// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A thread-pool-backed execution fabric living in the coordinating process.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace};

use super::{DataHandle, Fabric, FabricError, TaskFuture, TaskSlot};
use crate::imaging::Imager;
use crate::orchestrate::ChannelData;

struct Job {
    data: Arc<ChannelData>,
    retries: u32,
    slot: TaskSlot,
}

/// A pool of worker threads standing in for a remote cluster. Scattered data
/// is held behind [`DataHandle`]s; submitted tasks run the injected imaging
/// backend with an internal retry budget.
pub struct LocalCluster {
    address: String,
    num_workers: usize,
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl LocalCluster {
    /// "Connect" to the cluster: spawn `num_workers` worker threads running
    /// `imager`.
    pub fn connect(
        address: &str,
        num_workers: usize,
        imager: Arc<dyn Imager>,
    ) -> Result<LocalCluster, FabricError> {
        if num_workers == 0 {
            return Err(FabricError::Connect {
                address: address.to_string(),
                reason: "cannot run with 0 workers".to_string(),
            });
        }

        let (tx, rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let rx = rx.clone();
            let imager = Arc::clone(&imager);
            let handle = thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || worker_loop(rx, imager))
                .expect("OS can create threads");
            workers.push(handle);
        }

        Ok(LocalCluster {
            address: address.to_string(),
            num_workers,
            tx: Some(tx),
            workers,
        })
    }
}

impl Fabric for LocalCluster {
    fn scatter(&self, data: ChannelData) -> Result<DataHandle, FabricError> {
        // In-process, scattering is just pinning the data behind a
        // shared-ownership handle that workers can reach.
        trace!("Scattering data for channel {}", data.channel);
        Ok(DataHandle::new(data))
    }

    fn submit(&self, handle: &DataHandle, retries: u32) -> Result<TaskFuture, FabricError> {
        let channel = handle.channel();
        let (future, slot) = TaskFuture::new(channel);
        let job = Job {
            data: Arc::clone(handle.data()),
            retries,
            slot,
        };
        match &self.tx {
            Some(tx) => tx
                .send(job)
                .map_err(|_| FabricError::Submit { channel })?,
            None => return Err(FabricError::Submit { channel }),
        }
        Ok(future)
    }

    fn describe(&self) -> String {
        format!(
            "local cluster '{}' ({} workers)",
            self.address, self.num_workers
        )
    }
}

impl Drop for LocalCluster {
    fn drop(&mut self) {
        // Closing the job channel lets the workers drain and exit.
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: Receiver<Job>, imager: Arc<dyn Imager>) {
    while let Ok(job) = rx.recv() {
        let channel = job.data.channel;
        job.slot.running();

        // The fabric's internal retry budget: up to `retries` re-attempts
        // after the first failure.
        let mut cause = None;
        for attempt in 0..=job.retries {
            if job.slot.is_cancelled() {
                break;
            }
            match imager.image(&job.data) {
                Ok(cube) => {
                    cause = None;
                    job.slot.succeed(cube);
                    break;
                }
                Err(e) => {
                    debug!("Channel {channel} internal attempt {attempt} failed: {e}");
                    cause = Some(e);
                }
            }
        }
        if let Some(e) = cause {
            job.slot.fail(e.to_string());
        }
    }
}

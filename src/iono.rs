// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The contract with the ionospheric Faraday-rotation estimator.
//!
//! Estimation itself is an external collaborator; the pipeline only requests
//! per-snapshot rotation-measure series and persists the median as an
//! instrumental estimate.

use std::{fs, path::Path};

use log::info;
use thiserror::Error;

use crate::io::read::{StationInfo, VisData};

/// Per-snapshot rotation-measure estimates for one measurement set.
#[derive(Debug, Clone)]
pub struct IonoSeries {
    /// Rotation measures \[rad/m^2\].
    pub rm: Vec<f64>,
    /// Timestamps of the estimates \[s since observation start\].
    pub times: Vec<f64>,
    /// Indices into the visibility time axis.
    pub time_indices: Vec<usize>,
}

/// External estimator of ionospheric rotation measures.
pub trait IonoEstimator: Send + Sync {
    fn estimate(&self, vis: &VisData, stations: &StationInfo) -> Result<IonoSeries, IonoError>;
}

/// The rotation-measure products for both measurement sets, shared read-only
/// with every imaging task.
#[derive(Debug, Clone)]
pub struct IonoProducts {
    pub series1: IonoSeries,
    pub series2: IonoSeries,
}

impl IonoProducts {
    /// The median rotation measure over both series.
    pub fn median_rm(&self) -> Option<f64> {
        let mut all: Vec<f64> = self
            .series1
            .rm
            .iter()
            .chain(self.series2.rm.iter())
            .copied()
            .collect();
        if all.is_empty() {
            return None;
        }
        all.sort_by(|a, b| a.total_cmp(b));
        let mid = all.len() / 2;
        Some(if all.len() % 2 == 0 {
            (all[mid - 1] + all[mid]) / 2.0
        } else {
            all[mid]
        })
    }

    /// Save the median rotation measure to `<outputs>/ionFR.txt` as an
    /// instrumental estimate.
    pub fn save_median(&self, outputs: &Path) -> Result<(), IonoError> {
        let median = self.median_rm().ok_or(IonoError::NoEstimates)?;
        let path = outputs.join("ionFR.txt");
        fs::write(&path, format!("{median}\n")).map_err(IonoError::IO)?;
        info!("Median ionospheric RM {median:.4} rad/m^2 saved to {}", path.display());
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum IonoError {
    #[error("The ionosphere estimator produced no rotation-measure estimates")]
    NoEstimates,

    #[error("Ionosphere estimation failed: {0}")]
    Estimation(String),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

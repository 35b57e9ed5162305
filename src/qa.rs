// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Quality-assurance records and the telemetry sink seam.
//!
//! QA is best-effort: emission failures are logged by callers and never
//! abort the run. The sink is append-only; the only discipline is a single
//! flush at batch end.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use ndarray::{ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A lightweight diagnostic summary of one image product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRecord {
    /// What this record summarises, e.g. `channel-7` or `Mean-P`.
    pub label: String,
    pub shape: Vec<usize>,
    pub max: f64,
    pub min: f64,
    pub rms: f64,
    pub median_abs: f64,
    /// RFC 3339 creation time.
    pub created: String,
}

fn summarise(label: &str, shape: Vec<usize>, values: impl Iterator<Item = f64>) -> QaRecord {
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut sum_sq = 0.0;
    let mut abs: Vec<f64> = vec![];
    for v in values {
        max = max.max(v);
        min = min.min(v);
        sum_sq += v * v;
        abs.push(v.abs());
    }
    let n = abs.len().max(1) as f64;
    abs.sort_by(|a, b| a.total_cmp(b));
    let median_abs = if abs.is_empty() { 0.0 } else { abs[abs.len() / 2] };
    QaRecord {
        label: label.to_string(),
        shape,
        max,
        min,
        rms: (sum_sq / n).sqrt(),
        median_abs,
        created: chrono::Utc::now().to_rfc3339(),
    }
}

/// Summarise one per-channel image cube.
pub fn qa_cube(label: &str, cube: ArrayView3<f64>) -> QaRecord {
    summarise(label, cube.shape().to_vec(), cube.iter().copied())
}

/// Summarise one reduced moment image.
pub fn qa_image(label: &str, image: ArrayView2<f64>) -> QaRecord {
    summarise(label, image.shape().to_vec(), image.iter().copied())
}

/// The telemetry sink. Best-effort; implementations must tolerate being
/// flushed exactly once per batch.
pub trait Telemetry: Send + Sync {
    fn emit(&self, topic: &str, record: &QaRecord) -> Result<(), TelemetryError>;
    fn flush(&self) -> Result<(), TelemetryError>;
}

/// A JSON-lines file sink: one serialized [`QaRecord`] per line, tagged with
/// its topic. Stands in for the observatory's queue producer.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<JsonlSink, TelemetryError> {
        let file = File::create(path).map_err(|e| TelemetryError::Sink(e.to_string()))?;
        Ok(JsonlSink {
            path: path.to_path_buf(),
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Telemetry for JsonlSink {
    fn emit(&self, topic: &str, record: &QaRecord) -> Result<(), TelemetryError> {
        let line = serde_json::json!({ "topic": topic, "record": record });
        let mut file = self.file.lock().expect("sink lock poisoned");
        serde_json::to_writer(&mut *file, &line)
            .map_err(|e| TelemetryError::Sink(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| TelemetryError::Sink(e.to_string()))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), TelemetryError> {
        self.file
            .lock()
            .expect("sink lock poisoned")
            .flush()
            .map_err(|e| TelemetryError::Sink(e.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Telemetry sink error: {0}")]
    Sink(String),
}

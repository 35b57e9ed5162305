// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Constants shared across the pipeline.

use static_assertions::const_assert;

/// The number of physical planes in every per-channel image cube (I, Q, U and
/// V as produced by the imager; only I, Q and U take part in the moment
/// reductions).
pub const NUM_PLANES: usize = 4;

/// The default number of pixels along each spatial axis of an image cube.
/// This shape is a contract between the channel-data distributor and the
/// moment-reduction engine.
pub const DEFAULT_IMAGE_SIZE: usize = 512;

/// The spatial tile size used when rechunking the cross-channel stack. The
/// channel axis is kept whole within each tile so that every channel-wise
/// reduction is local to one tile.
pub const MOMENT_TILE: usize = 64;

// The default image must tile evenly.
const_assert!(DEFAULT_IMAGE_SIZE % MOMENT_TILE == 0);

/// The default number of frequency channels in one subband.
pub const DEFAULT_NUM_CHANNELS: usize = 40;

/// The default uv-distance cut \[wavelengths\].
pub const DEFAULT_UV_CUT: f64 = 450.0;

/// The default target angular resolution across the band \[arcmin FWHM\].
pub const DEFAULT_ANGULAR_RESOLUTION: f64 = 8.0;

/// The default number of pixels sampling the observing beam.
pub const DEFAULT_PIXELS_PER_BEAM: f64 = 5.0;

/// The execution fabric's internal (inner) retry budget per submitted task.
pub const DEFAULT_TASK_RETRIES: u32 = 3;

/// The controller's own (outer) resubmission-pass ceiling. The inner and
/// outer budgets are independent; the outer ceiling bounds total attempts
/// regardless of the inner budget.
pub const DEFAULT_RESUBMIT_PASSES: u32 = 3;

/// Radians to arcseconds.
pub const RAD2ARCSEC: f64 = 180.0 / std::f64::consts::PI * 3600.0;

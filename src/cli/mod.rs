// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code.
//!
//! All booleans must have `#[serde(default)]` annotated, and anything that
//! isn't a boolean must be optional. This allows all arguments to be
//! optional *and* reproducible from a saved TOML file.

mod error;

pub use error::MapsError;

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_ANGULAR_RESOLUTION, DEFAULT_IMAGE_SIZE, DEFAULT_NUM_CHANNELS,
        DEFAULT_PIXELS_PER_BEAM, DEFAULT_RESUBMIT_PASSES, DEFAULT_TASK_RETRIES, DEFAULT_UV_CUT,
    },
    io::read::PolDef,
    params::MapsParams,
    pipeline, PROGRESS_BARS,
};

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Distributed spectral imaging and moment-map pipeline for LOFAR MSSS/MAPS data"
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_long_args = true)]
pub struct LofarMaps {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(flatten)]
    args: MapsArgs,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    verbosity: u8,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information.
    #[clap(long)]
    dry_run: bool,

    /// Save the input arguments into a new TOML file that can be used to
    /// reproduce this run.
    #[clap(long)]
    save_toml: Option<PathBuf>,
}

/// The run-level configuration. Defaults match the MSSS/MAPS survey
/// settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct MapsArgs {
    /// Address of the cluster scheduler [default: scheduler:8786].
    #[clap(short = 'd', long)]
    pub cluster_address: Option<String>,

    /// Number of channels to process [default: 40].
    #[clap(short, long)]
    pub channels: Option<usize>,

    /// Input data directory [default: /data/inputs].
    #[clap(long)]
    pub inputs: Option<PathBuf>,

    /// Output data directory [default: /data/outputs].
    #[clap(long)]
    pub outputs: Option<PathBuf>,

    /// Measurement set of the first snapshot [default: sim-1.ms].
    #[clap(long)]
    pub ms1: Option<String>,

    /// Measurement set of the second snapshot [default: sim-2.ms].
    #[clap(long)]
    pub ms2: Option<String>,

    /// Emit QA records to the telemetry queue.
    #[clap(short, long)]
    #[serde(default)]
    pub queues: bool,

    /// Ask imaging tasks for diagnostic plots.
    #[clap(short, long)]
    #[serde(default)]
    pub plots: bool,

    /// 2-D imaging instead of w-stacking.
    #[clap(long)]
    #[serde(default)]
    pub twod: bool,

    /// Correct for ionospheric Faraday rotation.
    #[clap(short, long)]
    #[serde(default)]
    pub iono: bool,

    /// Cut-off for the uv-data [wavelengths; default: 450].
    #[clap(long)]
    pub uvcut: Option<f64>,

    /// Force the angular resolution to be consistent across the band
    /// [arcmin FWHM; default: 8.0].
    #[clap(short, long)]
    pub angres: Option<f64>,

    /// The number of pixels/sampling across the observing beam
    /// [default: 5.0].
    #[clap(long)]
    pub pixels: Option<f64>,

    /// Instrument name [default: LOFAR].
    #[clap(long)]
    pub instrument: Option<String>,

    /// Pixels along each spatial image axis [default: 512].
    #[clap(long)]
    pub image_size: Option<usize>,

    /// The execution fabric's internal retry budget per task [default: 3].
    #[clap(long)]
    pub task_retries: Option<u32>,

    /// The maximum number of outer resubmission passes over failed tasks
    /// [default: 3].
    #[clap(long)]
    pub resubmit_passes: Option<u32>,

    /// Worker threads in the local cluster [default: all logical cores].
    #[clap(long)]
    pub num_workers: Option<usize>,
}

impl MapsArgs {
    /// Apply defaults and validate, producing the run parameters.
    pub fn parse_params(self) -> Result<MapsParams, MapsError> {
        let outputs = self.outputs.unwrap_or_else(|| PathBuf::from("/data/outputs"));
        let moments_dir = outputs.join("MOMENTS");
        let instrument = self.instrument.unwrap_or_else(|| "LOFAR".to_string());
        let poldef = PolDef::for_instrument(&instrument);
        let num_workers = self.num_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        let params = MapsParams {
            channels: self.channels.unwrap_or(DEFAULT_NUM_CHANNELS),
            inputs: self.inputs.unwrap_or_else(|| PathBuf::from("/data/inputs")),
            outputs,
            moments_dir,
            ms1: self.ms1.unwrap_or_else(|| "sim-1.ms".to_string()),
            ms2: self.ms2.unwrap_or_else(|| "sim-2.ms".to_string()),
            cluster_address: self
                .cluster_address
                .unwrap_or_else(|| "scheduler:8786".to_string()),
            uv_cut: self.uvcut.unwrap_or(DEFAULT_UV_CUT),
            angular_resolution: self.angres.unwrap_or(DEFAULT_ANGULAR_RESOLUTION),
            pixels_per_beam: self.pixels.unwrap_or(DEFAULT_PIXELS_PER_BEAM),
            instrument,
            poldef,
            image_size: self.image_size.unwrap_or(DEFAULT_IMAGE_SIZE),
            qa: self.queues,
            plots: self.plots,
            twod: self.twod,
            iono: self.iono,
            task_retries: self.task_retries.unwrap_or(DEFAULT_TASK_RETRIES),
            max_resubmit_passes: self.resubmit_passes.unwrap_or(DEFAULT_RESUBMIT_PASSES),
            num_workers,
        };
        params.validate()?;
        Ok(params)
    }
}

impl LofarMaps {
    pub fn run(self) -> Result<(), MapsError> {
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            save_toml,
        } = self.global_opts;
        setup_logging(verbosity).expect("Failed to initialise logging.");
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        info!("lofar_maps {}", env!("CARGO_PKG_VERSION"));

        if let Some(toml) = save_toml {
            use std::{
                fs::File,
                io::{BufWriter, Write},
            };

            let mut f = BufWriter::new(File::create(toml)?);
            let toml_str = toml::to_string(&self.args).expect("toml serialisation error");
            f.write_all(toml_str.as_bytes())?;
        }

        let params = self.args.parse_params()?;
        pipeline::run(&params, dry_run)?;

        info!("lofar_maps complete.");
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty;
/// piped output will be formatted sensibly. Source code lines are displayed
/// in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();

    Ok(())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The end-to-end pipeline: load, scatter, image with retry, gather, reduce,
//! persist.

use std::{fs, path::PathBuf, sync::Arc, time::Instant};

use log::{info, warn};

use crate::{
    cli::MapsError,
    constants::MOMENT_TILE,
    fabric::{Fabric, LocalCluster},
    imaging::Imager,
    io::{
        read::{uv_advice, VisData, VisLoader},
        write::{tarball_moments, ImageWriter, RawImageWriter},
    },
    iono::{IonoError, IonoEstimator, IonoProducts},
    moments::{write_moments, StackedArray},
    orchestrate::{await_completion, distribute, emit_qa, gather, submit_all, SharedParams},
    params::MapsParams,
    qa::{JsonlSink, Telemetry},
    sim::{SimImager, SimIono, SimLoader},
};

/// One pipeline invocation's collaborators, wired up once and passed to
/// [`run_with`]. The context is scoped to a single run.
pub struct PipelineContext<'a> {
    pub params: &'a MapsParams,
    pub fabric: &'a dyn Fabric,
    pub loader: &'a dyn VisLoader,
    pub iono: Option<&'a dyn IonoEstimator>,
    pub telemetry: Option<&'a dyn Telemetry>,
    pub writer: &'a dyn ImageWriter,
}

/// What a completed run left on disk.
pub struct RunOutputs {
    pub moment_images: Vec<PathBuf>,
    pub tarball: PathBuf,
}

/// Run the pipeline with the bundled simulation backend and local cluster.
/// Observatory deployments build a [`PipelineContext`] with their own
/// collaborators and call [`run_with`] instead.
pub fn run(params: &MapsParams, dry_run: bool) -> Result<(), MapsError> {
    info!("Running the LOFAR MSSS/MAPS pipeline");
    print_summary(params);
    if dry_run {
        info!("Dry run requested; stopping before cluster connection");
        return Ok(());
    }

    fs::create_dir_all(&params.outputs)?;
    fs::create_dir_all(&params.moments_dir)?;

    let imager: Arc<dyn Imager> = Arc::new(SimImager);
    let fabric = LocalCluster::connect(&params.cluster_address, params.num_workers, imager)?;
    let loader = SimLoader::default();
    let iono = SimIono;

    // QA is best-effort from the start: a sink that can't be created is
    // only a warning.
    let telemetry: Option<JsonlSink> = if params.qa {
        match JsonlSink::create(&params.outputs.join("qa_queue.jsonl")) {
            Ok(sink) => Some(sink),
            Err(e) => {
                warn!("Couldn't create the QA queue; QA disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let ctx = PipelineContext {
        params,
        fabric: &fabric,
        loader: &loader,
        iono: Some(&iono),
        telemetry: telemetry.as_ref().map(|t| t as &dyn Telemetry),
        writer: &RawImageWriter,
    };
    run_with(&ctx).map(|_| ())
}

/// Drive one full pipeline invocation against the given collaborators.
pub fn run_with(ctx: &PipelineContext) -> Result<RunOutputs, MapsError> {
    let start = Instant::now();
    let params = ctx.params;

    fs::create_dir_all(&params.outputs)?;
    fs::create_dir_all(&params.moments_dir)?;
    info!("Cluster: {}", ctx.fabric.describe());

    // Load both snapshots' per-channel subsets into the coordinator.
    info!("Loading data from {} and {}", params.ms1, params.ms2);
    let ms1 = params.inputs.join(&params.ms1);
    let ms2 = params.inputs.join(&params.ms2);
    let vis1: Vec<VisData> = (0..params.channels)
        .map(|channel| ctx.loader.load(&ms1, channel, params.poldef))
        .collect::<Result<_, _>>()?;
    let vis2: Vec<VisData> = (0..params.channels)
        .map(|channel| ctx.loader.load(&ms2, channel, params.poldef))
        .collect::<Result<_, _>>()?;
    let stations = ctx.loader.station_info(&ms1)?;
    info!("{} stations in {}", stations.names.len(), params.ms1);

    // Ionospheric Faraday-rotation products, shared with every task.
    let iono_products = if params.iono {
        let estimator = ctx.iono.ok_or_else(|| {
            IonoError::Estimation(
                "ionosphere correction requested but no estimator is available".to_string(),
            )
        })?;
        info!("Obtaining ionospheric TEC data");
        let products = IonoProducts {
            series1: estimator.estimate(&vis1[0], &stations)?,
            series2: estimator.estimate(&vis2[0], &stations)?,
        };
        products.save_median(&params.outputs)?;
        Some(products)
    } else {
        None
    };

    // Derive the imaging grid from the first channel's combined snapshots
    // after the uv cut.
    let mut advice_vis = vis1[0].append(&vis2[0]);
    advice_vis.uv_cut(params.uv_cut);
    let advice = uv_advice(
        &advice_vis,
        params.uv_cut,
        params.pixels_per_beam,
        params.image_size,
    )?;

    let shared = Arc::new(SharedParams {
        uv_cut: params.uv_cut,
        npixel: advice.npixel,
        cell_arcsec: advice.cell_arcsec,
        angular_resolution: params.angular_resolution,
        pixels_per_beam: params.pixels_per_beam,
        poldef: params.poldef,
        iono: iono_products,
        outputs: params.outputs.clone(),
        twod: params.twod,
        plots: params.plots,
    });

    // Scatter, submit, ride out failures, gather.
    let handles = distribute(ctx.fabric, vis1, vis2, shared)?;
    let mut futures = submit_all(ctx.fabric, &handles, params.task_retries)?;
    await_completion(
        ctx.fabric,
        &handles,
        &mut futures,
        params.task_retries,
        params.max_resubmit_passes,
    )?;
    let results = gather(&futures, advice.npixel)?;
    if let Some(sink) = ctx.telemetry {
        emit_qa(&results, sink);
    }

    // Reduce to moment images and persist them.
    let stack = StackedArray::from_results(&results)?;
    let persisted = stack.persist(MOMENT_TILE)?;
    let moment_images = write_moments(&persisted, ctx.writer, &params.moments_dir, ctx.telemetry)?;
    let tarball = tarball_moments(&params.moments_dir, &moment_images)?;

    info!(
        "Pipeline complete in {:.1} s ({} channels, {} moment images)",
        start.elapsed().as_secs_f64(),
        params.channels,
        moment_images.len()
    );
    Ok(RunOutputs {
        moment_images,
        tarball,
    })
}

fn print_summary(params: &MapsParams) {
    info!("Channels:            {}", params.channels);
    info!("Input directory:     {}", params.inputs.display());
    info!("Output directory:    {}", params.outputs.display());
    info!("Measurement sets:    {}, {}", params.ms1, params.ms2);
    info!("Cluster address:     {}", params.cluster_address);
    info!("uv cut:              {} wavelengths", params.uv_cut);
    info!("Angular resolution:  {}' FWHM", params.angular_resolution);
    info!("Pixels per beam:     {}", params.pixels_per_beam);
    info!(
        "Instrument:          {} ({} feeds)",
        params.instrument, params.poldef
    );
    info!(
        "Image size:          {0} x {0} pixels",
        params.image_size
    );
    info!(
        "Retry budgets:       {} internal, {} resubmission passes",
        params.task_retries, params.max_resubmit_passes
    );
    info!(
        "Flags:               qa={} plots={} twod={} iono={}",
        params.qa, params.plots, params.twod, params.iono
    );
}

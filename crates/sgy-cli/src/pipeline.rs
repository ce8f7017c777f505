// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The `sgy-stack` job: index, load velocities, NMO-correct and stack every CDP.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sgy_core::{
    trace_header_value, BuildOutcome, Progress, RedbIndexStore, TraceIndex, TraceReader,
    TraceWriter,
};
use sgy_nmo::{correct_gather, stack, NmoParams, VelocityFunctions, VelocityTable};
use tracing::{debug, info, warn};

use crate::config::JobConfig;

/// Index over `[CDP, offset]` used to pull gathers from the input.
pub const GATHER_INDEX: &str = "cdp_offset";
/// Index over `[CDP]` used to pull traces from a velocity SEG-Y file.
pub const VELOCITY_INDEX: &str = "cdp";
const PROGRESS_STEP: usize = 50;

/// Which part of the job failed; decides the process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Bad command line or job config.
    Usage,
    /// The input SEG-Y file.
    Input,
    /// The velocity file.
    Velocity,
    /// The output file.
    Output,
    /// Anything after the inputs were validated.
    Processing,
}

impl Stage {
    /// Process exit code for a failure in this stage.
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Usage => 1,
            Self::Input => 2,
            Self::Velocity => 3,
            Self::Output => 4,
            Self::Processing => 5,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Usage => "usage",
            Self::Input => "input",
            Self::Velocity => "velocity",
            Self::Output => "output",
            Self::Processing => "processing",
        })
    }
}

/// A job failure tagged with the stage it happened in.
#[derive(Debug)]
pub struct StageError {
    /// Failing stage.
    pub stage: Stage,
    /// Cause chain.
    pub error: anyhow::Error,
}

impl StageError {
    /// Process exit code for this failure.
    pub const fn exit_code(&self) -> u8 {
        self.stage.exit_code()
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {:#}", self.stage, self.error)
    }
}

/// Attaches a [`Stage`] to a fallible result.
pub trait InStage<T> {
    /// Tags the error with `stage`.
    fn in_stage(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E> InStage<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn in_stage(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError {
            stage,
            error: e.into(),
        })
    }
}

/// Knobs layered over the job config.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Rescan the input even when a matching index artifact exists.
    pub rebuild_index: bool,
}

/// What a finished run did.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Whether the gather index was scanned or loaded.
    pub index: BuildOutcome,
    /// Distinct CDPs in the input.
    pub cdps: usize,
    /// Stacked traces written.
    pub traces_written: u64,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

fn is_segy(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sgy") || e.eq_ignore_ascii_case("segy"))
}

/// Checks the three files up front so each failure maps to its own stage.
fn preflight(config: &JobConfig) -> Result<(), StageError> {
    File::open(&config.input_file)
        .with_context(|| format!("cannot open input SEG-Y file {}", config.input_file.display()))
        .in_stage(Stage::Input)?;
    File::open(&config.velocity_file)
        .with_context(|| format!("cannot open velocity file {}", config.velocity_file.display()))
        .in_stage(Stage::Velocity)?;
    File::create(&config.output_file)
        .with_context(|| {
            format!("cannot create output SEG-Y file {}", config.output_file.display())
        })
        .in_stage(Stage::Output)?;
    Ok(())
}

fn open_input(
    config: &JobConfig,
    options: RunOptions,
    progress: Option<&dyn Progress>,
) -> Result<(TraceReader, BuildOutcome), StageError> {
    let mut reader = TraceReader::open(&config.input_file)
        .with_context(|| format!("reading {}", config.input_file.display()))
        .in_stage(Stage::Input)?;

    let store = RedbIndexStore::open(&config.index_file)
        .with_context(|| format!("opening trace index {}", config.index_file.display()))
        .in_stage(Stage::Processing)?;
    let index = TraceIndex::new(GATHER_INDEX, &["CDP", "offset"])
        .in_stage(Stage::Processing)?
        .with_store(Arc::new(store))
        .with_workers(config.num_threads);
    let mut outcome = reader
        .build_index(index, progress)
        .context("building CDP/offset index")
        .in_stage(Stage::Processing)?;
    if options.rebuild_index && outcome == BuildOutcome::Loaded {
        info!("rebuilding trace index on request");
        reader
            .rebuild_index(GATHER_INDEX, progress)
            .context("rebuilding CDP/offset index")
            .in_stage(Stage::Processing)?;
        outcome = BuildOutcome::Built;
    }
    Ok((reader, outcome))
}

/// Velocity functions for `cdps`, sampled like the input.
pub fn load_velocities(
    path: &Path,
    cdps: &[i32],
    num_samples: usize,
    dt: f32,
) -> Result<VelocityFunctions> {
    let table = if is_segy(path) {
        info!(path = %path.display(), "reading velocity SEG-Y file");
        let mut reader = TraceReader::open(path)?;
        reader.build_index(TraceIndex::new(VELOCITY_INDEX, &["CDP"])?, None)?;
        let vel_dt = reader.sample_interval() as f32 * 1e-6;
        let mut dense = Vec::new();
        for &cdp in cdps {
            if let Some(first) = reader.get_gather(VELOCITY_INDEX, &[Some(cdp)])?.into_iter().next() {
                dense.push((cdp, first));
            }
        }
        debug!(found = dense.len(), requested = cdps.len(), "velocity traces matched");
        VelocityTable::from_traces(dense, vel_dt)
    } else {
        info!(path = %path.display(), "reading velocity table");
        VelocityTable::load(path)?
    };
    Ok(table.interpolate(cdps, num_samples, dt)?)
}

/// Runs a whole stacking job.
///
/// # Errors
///
/// A [`StageError`] naming the stage that failed.
pub fn run(
    config: &JobConfig,
    options: RunOptions,
    progress: Option<&dyn Progress>,
) -> Result<RunSummary, StageError> {
    let started = Instant::now();
    preflight(config)?;

    let (reader, index_outcome) = open_input(config, options, progress)?;
    let num_samples = reader.num_samples();
    let dt = reader.sample_interval() as f32 * 1e-6;

    let cdps = reader
        .index(GATHER_INDEX)
        .and_then(|index| index.unique_values("CDP"))
        .in_stage(Stage::Processing)?;
    info!(cdps = cdps.len(), index = ?index_outcome, "input indexed");

    let velocities = load_velocities(&config.velocity_file, &cdps, num_samples, dt)
        .with_context(|| format!("loading velocities from {}", config.velocity_file.display()))
        .in_stage(Stage::Velocity)?;

    let mut writer = TraceWriter::from_reader(&config.output_file, &reader)
        .with_context(|| format!("creating {}", config.output_file.display()))
        .in_stage(Stage::Output)?;

    let params = NmoParams::new(dt, config.nmo_stretch_muting_percent)
        .with_workers(config.num_threads);
    let total = cdps.len();
    for (done, &cdp) in cdps.iter().enumerate() {
        let done = done + 1;
        if let Some(progress) = progress {
            if done % PROGRESS_STEP == 0 || done == total {
                progress.report("Processing CDPs", done as u64, total as u64);
            }
        }

        let stacked = stack_cdp(&reader, cdp, &velocities, params)
            .with_context(|| format!("stacking CDP {cdp}"))
            .in_stage(Stage::Processing)?;
        if let Some((header, trace)) = stacked {
            writer
                .write_trace(&header, &trace)
                .with_context(|| format!("writing CDP {cdp}"))
                .in_stage(Stage::Output)?;
        }
    }

    let traces_written = writer
        .finish()
        .with_context(|| format!("finishing {}", config.output_file.display()))
        .in_stage(Stage::Output)?;
    Ok(RunSummary {
        index: index_outcome,
        cdps: total,
        traces_written,
        elapsed: started.elapsed(),
    })
}

/// Header and stacked samples for one CDP, or `None` when there is nothing
/// to stack.
fn stack_cdp(
    reader: &TraceReader,
    cdp: i32,
    velocities: &VelocityFunctions,
    params: NmoParams,
) -> Result<Option<(Vec<u8>, Vec<f32>)>> {
    let gather = reader.get_gather_and_headers(GATHER_INDEX, &[Some(cdp), None])?;
    let Some(velocity) = velocities.get(&cdp) else {
        warn!(cdp, "no velocity function, skipping CDP");
        return Ok(None);
    };
    let Some(first_header) = gather.headers.first() else {
        return Ok(None);
    };
    let offsets = gather
        .headers
        .iter()
        .map(|h| trace_header_value(h, "offset").map(|v| v.as_i32() as f32))
        .collect::<Result<Vec<_>, _>>()?;
    let corrected = correct_gather(&gather.traces, &offsets, velocity, params)?;
    let stacked = stack(&corrected)?;
    Ok(Some((first_header.clone(), stacked)))
}

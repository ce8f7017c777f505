// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! sgy-stack
//!
//! NMO-corrects and stacks every CDP gather of a SEG-Y file, driven by a
//! `key=value` job config.
//!
//! Exit codes: 0 success, 1 usage or config error, 2 input file, 3 velocity
//! file, 4 output file, 5 processing failure.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use sgy_cli::config::JobConfig;
use sgy_cli::pipeline::{self, RunOptions, Stage};
use sgy_cli::progress::StderrProgress;
use sgy_core::Progress;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sgy-stack", version)]
#[command(about = "NMO-correct and stack the CDP gathers of a SEG-Y file")]
struct Args {
    /// Job configuration file (`key=value` lines)
    config: PathBuf,

    /// Worker threads, overriding `num_threads` (0 = all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Trace index artifact, overriding `index_file`
    #[arg(long)]
    index_file: Option<PathBuf>,

    /// Rescan the input even if a matching index artifact exists
    #[arg(long)]
    rebuild_index: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// More log output (repeat for trace level)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_tracing(args: &Args) {
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(Stage::Usage.exit_code()),
            };
        }
    };
    init_tracing(&args);

    let mut config = match JobConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            let _ = writeln!(std::io::stderr(), "Error: {err}");
            return ExitCode::from(Stage::Usage.exit_code());
        }
    };
    if let Some(threads) = args.threads {
        config.num_threads = threads;
    }
    if let Some(index_file) = args.index_file.clone() {
        config.index_file = index_file;
    }

    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "Input: {}", config.input_file.display());
    let _ = writeln!(out, "Output: {}", config.output_file.display());
    let _ = writeln!(out, "Velocity: {}", config.velocity_file.display());
    let _ = writeln!(
        out,
        "NMO Stretch Muting Percent: {}",
        config.nmo_stretch_muting_percent
    );
    let _ = out.flush();

    let bar = StderrProgress;
    let progress: Option<&dyn Progress> = if args.no_progress { None } else { Some(&bar) };
    let options = RunOptions {
        rebuild_index: args.rebuild_index,
    };

    match pipeline::run(&config, options, progress) {
        Ok(summary) => {
            let _ = writeln!(
                out,
                "Stacked {} of {} CDPs (index {:?})",
                summary.traces_written, summary.cdps, summary.index
            );
            let _ = writeln!(
                out,
                "Stacked output written to: {}",
                config.output_file.display()
            );
            let _ = writeln!(
                out,
                "Total processing time: {:.3} seconds.",
                summary.elapsed.as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(stage = %err.stage, "{:#}", err.error);
            let _ = writeln!(std::io::stderr(), "Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

//! # devlens - Main Entry Point
//!
//! Subcommands:
//! - **trace**: trace the bundled workload, print the event log, optionally export it
//! - **profile**: profile the bundled workload, print the report, optionally save samples
//! - **report**: regenerate a report from a saved snapshot

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use devlens::analysis::Report;
use devlens::cli::{init_logging, Args, Command};
use devlens::demo;
use devlens::domain::SortKey;
use devlens::export::{ChromeTraceExporter, ReportSink};
use devlens::profiling::{profile_code, ProfileOptions};
use devlens::trace::{Tracer, TracerConfig};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    let args = Args::parse();
    init_logging(args.quiet);
    std::process::exit(match run(args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Trace { export, no_args } => run_trace(export.as_deref(), !no_args, args.quiet),
        Command::Profile { sort, save, limit, repeat } => {
            run_profile(sort, save, limit, repeat)
        }
        Command::Report { file, sort, limit, callers } => {
            run_report(&file, sort, limit, callers.as_deref())
        }
    }
}

fn run_trace(export: Option<&Path>, capture_arguments: bool, quiet: bool) -> Result<()> {
    let config = TracerConfig { capture_arguments, ..TracerConfig::default() };
    let mut tracer = Tracer::with_config(config);

    let result = tracer.trace(|| demo::test_func(5, 10, 15)).context("Failed to start tracing")?;
    info!("test_func returned {result}");

    let events = tracer.events();
    if !quiet {
        ReportSink::stdout().write_events(&events).context("Failed to print trace")?;
    }

    if let Some(path) = export {
        let mut exporter = ChromeTraceExporter::default();
        exporter.add_events(&events);
        let file = File::create(path)
            .with_context(|| format!("Failed to create trace output file {}", path.display()))?;
        exporter.export(BufWriter::new(file)).context("Failed to export trace")?;
        if !quiet {
            println!("saved: {}", path.display());
        }
    }

    let open = tracer.open_frames();
    if !open.is_empty() {
        log::warn!("{} frames still open at session end", open.len());
    }
    Ok(())
}

fn run_profile(
    sort_by: SortKey,
    save: Option<std::path::PathBuf>,
    limit: Option<usize>,
    repeat: u32,
) -> Result<()> {
    let mut options = ProfileOptions { sort_by, limit, ..ProfileOptions::default() };
    if let Some(path) = save {
        options.save_to_file = true;
        options.filename = path;
    }
    let filename = options.filename.clone();
    let save_to_file = options.save_to_file;

    let mut profiled = profile_code(
        demo::PROFILE_RUN_SITE,
        options,
        |()| demo::profile_example(),
    );

    for _ in 0..repeat.max(1) {
        let (total, fib) = profiled.call(()).context("Profiling failed")?;
        info!("profile_example returned total={total} fib={fib}");
    }

    if save_to_file {
        println!("saved: {}", filename.display());
    }
    Ok(())
}

fn run_report(file: &Path, sort: SortKey, limit: Option<usize>, callers: Option<&str>) -> Result<()> {
    let report = Report::load(file)
        .with_context(|| format!("Failed to load snapshot {}", file.display()))?;

    let mut sink = ReportSink::stdout();
    sink.write_report(&report, sort, limit).context("Failed to print report")?;

    if let Some(name) = callers {
        println!("   Callers of {name}:");
        for (caller, count) in report.callers_of(name) {
            match caller {
                Some(caller) => println!("{count:>9} {caller}"),
                None => println!("{count:>9} <region>"),
            }
        }
    }
    Ok(())
}

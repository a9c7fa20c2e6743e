//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::analysis::DEFAULT_SNAPSHOT_FILE;
use crate::domain::SortKey;

#[derive(Parser)]
#[command(
    name = "devlens",
    about = "Trace and profile instrumented Rust functions",
    after_help = "\
EXAMPLES:
    devlens trace                             Trace the bundled workload
    devlens trace --export trace.json         Also write a Chrome trace
    devlens profile --sort calls --save       Profile and save profiling_results.prof
    devlens report profiling_results.prof     Re-print a saved profile"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Trace every instrumented call of the bundled workload
    Trace {
        /// Export the trace log as Chrome Trace Event JSON
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Do not record argument values
        #[arg(long)]
        no_args: bool,
    },

    /// Profile the bundled workload and print per-function statistics
    Profile {
        /// Sort key: calls, cumulative, time or filename
        #[arg(short, long, default_value = "cumulative")]
        sort: SortKey,

        /// Save raw samples (default file: profiling_results.prof)
        #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = DEFAULT_SNAPSHOT_FILE)]
        save: Option<PathBuf>,

        /// Print at most N rows
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,

        /// Number of profiled runs
        #[arg(long, default_value = "1")]
        repeat: u32,
    },

    /// Regenerate a report from a saved snapshot
    Report {
        /// Snapshot written by `profile --save`
        #[arg(value_name = "FILE", default_value = DEFAULT_SNAPSHOT_FILE)]
        file: PathBuf,

        /// Sort key: calls, cumulative, time or filename
        #[arg(short, long, default_value = "cumulative")]
        sort: SortKey,

        /// Print at most N rows
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,

        /// Also list the direct callers of this function
        #[arg(long, value_name = "FUNCTION")]
        callers: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_save_defaults_to_snapshot_file() {
        let args = Args::parse_from(["devlens", "profile", "--save"]);
        match args.command {
            Command::Profile { save, sort, .. } => {
                assert_eq!(save, Some(PathBuf::from(DEFAULT_SNAPSHOT_FILE)));
                assert_eq!(sort, SortKey::Cumulative);
            }
            _ => panic!("expected profile command"),
        }
    }

    #[test]
    fn test_report_sort_key_parsing() {
        let args = Args::parse_from(["devlens", "report", "out.prof", "--sort", "calls"]);
        match args.command {
            Command::Report { file, sort, .. } => {
                assert_eq!(file, PathBuf::from("out.prof"));
                assert_eq!(sort, SortKey::Calls);
            }
            _ => panic!("expected report command"),
        }
        assert!(Args::try_parse_from(["devlens", "report", "--sort", "bogus"]).is_err());
    }
}

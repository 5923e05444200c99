//! Command-line interface, defined with the clap derive API.
//!
//! # Example
//!
//! ```bash
//! # Scan a directory and print duplicate groups
//! dupescan ~/Downloads
//!
//! # JSON output for scripting
//! dupescan ~/Downloads --output json
//!
//! # Skip hidden entries and anything in node_modules, cap file size at 512 MiB
//! dupescan ~/code --ignore-hidden --ignore-dir node_modules --max-size 512
//!
//! # Group by lower-cased file name instead of content
//! dupescan ~/music --name-only
//!
//! # Apply the suggested deletions, moving files to the system trash
//! dupescan ~/Downloads --delete
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Content-based duplicate file finder.
///
/// Walks a directory tree, hashes every accepted file with BLAKE3, groups
/// files by identical content, and can plan (and optionally apply) deletion
/// of redundant copies.
#[derive(Debug, Parser)]
#[command(name = "dupescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Skip hidden files and directories (names starting with .)
    #[arg(long)]
    pub ignore_hidden: bool,

    /// Directory name or full path to skip, case-insensitive (repeatable)
    #[arg(long = "ignore-dir", value_name = "DIR")]
    pub ignore_dirs: Vec<String>,

    /// File name or wildcard pattern (* and ?) to skip (repeatable)
    #[arg(long = "ignore-name", value_name = "NAME")]
    pub ignore_names: Vec<String>,

    /// Skip files at or above this size in MiB
    #[arg(long = "max-size", value_name = "MIB")]
    pub max_size_mib: Option<u64>,

    /// Group files by lower-cased name instead of content hash
    #[arg(long)]
    pub name_only: bool,

    /// Number of hashing threads (default: available parallelism)
    #[arg(long, value_name = "N", env = "DUPESCAN_WORKERS")]
    pub workers: Option<usize>,

    /// Skip the counting pre-pass (progress bar length will be unknown)
    #[arg(long)]
    pub no_count: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Apply the deletion plan after scanning (moves files to trash)
    #[arg(long)]
    pub delete: bool,

    /// Delete permanently instead of using the system trash
    #[arg(long, requires = "delete")]
    pub permanent: bool,

    /// Skip the confirmation prompt before deleting
    #[arg(short = 'y', long = "yes", requires = "delete")]
    pub assume_yes: bool,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors and the report
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Report format on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable group listing
    Text,
    /// Machine-readable JSON report
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["dupescan", "/data"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("/data"));
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.delete);
        assert!(!cli.name_only);
    }

    #[test]
    fn test_parse_filters() {
        let cli = Cli::try_parse_from([
            "dupescan",
            "/data",
            "--ignore-hidden",
            "--ignore-dir",
            "node_modules",
            "--ignore-dir",
            ".git",
            "--ignore-name",
            "*.tmp",
            "--max-size",
            "512",
        ])
        .unwrap();
        assert!(cli.ignore_hidden);
        assert_eq!(cli.ignore_dirs.len(), 2);
        assert_eq!(cli.ignore_names, vec!["*.tmp"]);
        assert_eq!(cli.max_size_mib, Some(512));
    }

    #[test]
    fn test_permanent_requires_delete() {
        assert!(Cli::try_parse_from(["dupescan", "/data", "--permanent"]).is_err());
        assert!(Cli::try_parse_from(["dupescan", "/data", "--delete", "--permanent"]).is_ok());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dupescan", "/data", "-q", "-v"]).is_err());
    }
}

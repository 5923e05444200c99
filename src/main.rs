//! dupescan - content-based duplicate file finder.
//!
//! Entry point for the CLI. Drives a scan session, renders progress from the
//! event stream, prints the report, and optionally applies the deletion plan.

use std::io::{self, BufRead, Write};
use std::process;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use dupescan::cli::{Cli, OutputFormat};
use dupescan::{
    DeletionPlan, FilterConfig, KeyMode, ScanEvent, ScanOptions, ScanReport, ScanSession,
};

/// Exit code for SIGINT, per Unix convention (128 + 2).
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let cli = Cli::parse();
    dupescan::logging::init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            log::error!("{err:#}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let filter = FilterConfig {
        ignore_hidden: cli.ignore_hidden,
        ignored_dirs: cli.ignore_dirs.clone(),
        ignored_names: cli.ignore_names.clone(),
        size_ceiling_mib: cli.max_size_mib,
    };
    let mut options = ScanOptions::new(&cli.path)
        .with_filter(filter)
        .with_count_first(!cli.no_count);
    if cli.name_only {
        options = options.with_key_mode(KeyMode::NameOnly);
    }
    if let Some(workers) = cli.workers {
        options = options.with_workers(workers);
    }

    let scan = ScanSession::start(options)?;

    let cancel = scan.cancel_handle();
    ctrlc::set_handler(move || {
        eprintln!("Interrupted, finishing up...");
        cancel.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    watch_events(&scan, cli.quiet);
    let report = scan.join();

    match cli.output {
        OutputFormat::Text => print_text_report(&report),
        OutputFormat::Json => print_json_report(&report)?,
    }

    if cli.delete && !report.summary.interrupted {
        apply_deletions(&cli, &report)?;
    }

    Ok(if report.summary.interrupted {
        EXIT_INTERRUPTED
    } else {
        0
    })
}

/// Consume the event stream until the scan finishes, animating a progress
/// bar on stderr. The counting pre-pass sizes the bar; without it the bar
/// stays a spinner.
fn watch_events(scan: &dupescan::RunningScan, quiet: bool) {
    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_message("counting files...");
        bar
    };

    for event in scan.events().iter() {
        match event {
            ScanEvent::CountProgress { files_seen } => {
                bar.set_message(format!("counting files... {files_seen}"));
            }
            ScanEvent::CountFinished { total_files } => {
                bar.set_style(
                    ProgressStyle::with_template(
                        "{bar:30} {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar.set_length(total_files);
                bar.set_position(0);
                bar.set_message("hashing");
            }
            ScanEvent::HashFinished { path, .. } => {
                bar.inc(1);
                bar.set_message(
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
            }
            ScanEvent::FileError { path, kind } => {
                log::warn!("{}: {kind}", path.display());
            }
            ScanEvent::DuplicateFound {
                total_extra_bytes, ..
            } => {
                bar.set_message(format!("{} duplicated", ByteSize::b(total_extra_bytes)));
            }
            ScanEvent::ScanFinished { .. } => break,
            _ => {}
        }
    }
    bar.finish_and_clear();
}

fn print_text_report(report: &ScanReport) {
    let groups = report.duplicate_groups();
    if groups.is_empty() {
        println!("No duplicates found.");
    }
    for group in &groups {
        println!(
            "{}  ({} each, {} extra)",
            group.key,
            ByteSize::b(group.size),
            ByteSize::b(group.extra_bytes())
        );
        let plan = DeletionPlan::plan(group);
        for record in &plan.keep {
            println!("  keep    {}", record.path.display());
        }
        for record in &plan.delete {
            println!("  delete  {}", record.path.display());
        }
        println!();
    }

    let s = &report.summary;
    println!(
        "{} files scanned, {} hashed, {} failed; {} duplicate groups, {} redundant copies, {} reclaimable{}",
        s.files_found,
        s.files_hashed,
        s.failed_files,
        s.duplicate_groups,
        s.duplicate_files,
        ByteSize::b(s.extra_bytes),
        if s.interrupted { " (interrupted)" } else { "" }
    );
}

fn print_json_report(report: &ScanReport) -> Result<()> {
    let output = serde_json::json!({
        "summary": report.summary,
        "groups": report.duplicate_groups(),
        "plans": report.deletion_plans(),
    });
    let rendered =
        serde_json::to_string_pretty(&output).context("failed to serialize report")?;
    println!("{rendered}");
    Ok(())
}

/// Apply the deletion plans, prompting first unless `--yes` was given.
/// Files that changed since they were hashed are skipped.
fn apply_deletions(cli: &Cli, report: &ScanReport) -> Result<()> {
    let plans = report.deletion_plans();
    let candidates: u64 = plans.iter().map(|p| p.delete.len() as u64).sum();
    let bytes: u64 = plans.iter().map(DeletionPlan::reclaimable_bytes).sum();
    if candidates == 0 {
        println!("Nothing to delete.");
        return Ok(());
    }

    if !cli.assume_yes && !confirm(candidates, bytes)? {
        println!("Aborted; nothing was deleted.");
        return Ok(());
    }

    let mut deleted = 0u64;
    let mut skipped = 0u64;
    for plan in &plans {
        for record in &plan.delete {
            if record.is_stale() {
                log::warn!(
                    "skipping {}: file changed since it was hashed",
                    record.path.display()
                );
                skipped += 1;
                continue;
            }
            let result = if cli.permanent {
                std::fs::remove_file(&record.path).map_err(anyhow::Error::from)
            } else {
                trash::delete(&record.path).map_err(anyhow::Error::from)
            };
            match result {
                Ok(()) => {
                    log::debug!("deleted {}", record.path.display());
                    deleted += 1;
                }
                Err(err) => {
                    log::error!("failed to delete {}: {err}", record.path.display());
                    skipped += 1;
                }
            }
        }
    }
    println!(
        "Deleted {deleted} file(s){}",
        if skipped > 0 {
            format!(", skipped {skipped}")
        } else {
            String::new()
        }
    );
    Ok(())
}

fn confirm(files: u64, bytes: u64) -> Result<bool> {
    print!(
        "Delete {files} file(s), reclaiming {}? [y/N] ",
        ByteSize::b(bytes)
    );
    io::stdout().flush().context("failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

//! `align` command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use time_align::{AlignmentEngine, AlignmentReport};
use tracing::{error, info};

use crate::cli::AlignArgs;
use crate::error::CliError;

/// Execute the `align` command
pub fn run_align(args: &AlignArgs) -> Result<()> {
    if !args.capture.is_file() {
        return Err(CliError::capture_not_found(&args.capture).into());
    }
    if !args.output_path.is_dir() {
        return Err(CliError::directory_not_found(&args.output_path).into());
    }

    let roots = if args.export_roots.is_empty() {
        info!("No paths to exports provided. Looking inside current directory.");
        vec![PathBuf::from(".")]
    } else {
        args.export_roots.clone()
    };
    if let Some(missing) = roots.iter().find(|root| !root.is_dir()) {
        return Err(CliError::directory_not_found(missing).into());
    }

    let engine = AlignmentEngine::new(args.match_by.into());
    info!(
        capture = %args.capture.display(),
        roots = roots.len(),
        strategy = engine.strategy().as_str(),
        "Aligning capture with cloud exports"
    );

    let report = engine
        .run(&args.capture, &roots, &args.output_path)
        .with_context(|| format!("Failed to align {}", args.capture.display()))?;
    print_report(&report);

    for (dir, e) in &report.failures {
        error!(export = %dir.display(), error = %e, "Export could not be aligned");
    }
    report.into_result().context("Time alignment incomplete")?;
    Ok(())
}

fn print_report(report: &AlignmentReport) {
    println!("\n=== Time Alignment ===\n");
    for session in &report.aligned {
        println!(
            "  ✓ {} - {} events, capture = {:.9} * cloud + {:.6}",
            session.key,
            session.mapping.matched_events,
            session.mapping.cloud_to_capture.slope,
            session.mapping.cloud_to_capture.intercept,
        );
        println!("    -> {}", session.output_dir.display());
    }
    for (dir, e) in &report.failures {
        println!("  ✗ {}: {}", dir.display(), e);
    }
    if report.skipped > 0 {
        println!("\n  Skipped (no session key): {}", report.skipped);
    }
    if report.unmatched > 0 {
        println!("  Not in capture: {}", report.unmatched);
    }
    println!();
}

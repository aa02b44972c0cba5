//! Reporting and display utilities for evaluation passes.
//!
//! This module formats an [`AggregateReport`] for the console and exports it
//! as a plain-text summary next to the JSON results.

use crate::evaluation::{AggregateReport, EvaluationRecord};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::UtilError;

fn format_error(error: Option<f64>) -> String {
    match error {
        Some(e) => format!("{e:>12.4}"),
        None => format!("{:>12}", "unscorable"),
    }
}

/// Display the summary of an evaluation pass.
///
/// # Arguments
///
/// * `report` - Aggregate report of the pass
pub fn display_results_summary(report: &AggregateReport) {
    println!("\n📊 Evaluation Results Summary");
    println!("=============================");
    println!("  Samples:            {}", report.sample_count);
    println!(
        "  Estimated cameras:  {} ({:.1}%)",
        report.success_count,
        100.0 * report.success_rate()
    );
    println!(
        "  Fallback cameras:   {}",
        report.sample_count - report.success_count
    );
    println!("  Unscorable samples: {}", report.unscorable_count);
    println!(
        "  Mean ground-plane error: {:.4} cm",
        report.mean_reprojection_error
    );
    println!(
        "  Mean absolute error:     {:.4} cm",
        report.mean_absolute_error
    );
}

/// Display one line per sample: extracted points, outcome and error.
///
/// `records` and `report.per_sample_errors` are paired by index.
pub fn display_detailed_results(records: &[EvaluationRecord], report: &AggregateReport) {
    println!("\n📋 PER-SAMPLE RESULTS");
    println!("┌────────┬──────────┬───────────┬──────────────┐");
    println!("│ Sample │ Points   │ Camera    │ Error (cm)   │");
    println!("├────────┼──────────┼───────────┼──────────────┤");
    for (i, (record, error)) in records.iter().zip(&report.per_sample_errors).enumerate() {
        let camera = if record.is_success() {
            "estimated"
        } else {
            "fallback"
        };
        println!(
            "│ {:>6} │ {:>8} │ {:<9} │ {} │",
            i,
            record.num_points2d,
            camera,
            format_error(*error)
        );
    }
    println!("└────────┴──────────┴───────────┴──────────────┘");
}

/// Export the report as a text file.
///
/// # Errors
///
/// * `UtilError::NumericalError` - If file creation or writing fails
pub fn export_evaluation_results(report: &AggregateReport, path: &Path) -> Result<(), UtilError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut report_file = File::create(path)
        .map_err(|e| UtilError::NumericalError(format!("Failed to create report file: {e}")))?;

    writeln!(report_file, "COURT CAMERA CALIBRATION EVALUATION REPORT")?;
    writeln!(report_file, "==========================================")?;
    writeln!(report_file)?;
    writeln!(report_file, "Samples: {}", report.sample_count)?;
    writeln!(report_file, "Estimated cameras: {}", report.success_count)?;
    writeln!(report_file, "Unscorable samples: {}", report.unscorable_count)?;
    writeln!(
        report_file,
        "Mean ground-plane error: {:.6} cm",
        report.mean_reprojection_error
    )?;
    writeln!(
        report_file,
        "Mean absolute error: {:.6} cm",
        report.mean_absolute_error
    )?;
    writeln!(report_file)?;

    writeln!(report_file, "{:>8} | {:>12}", "Sample", "Error (cm)")?;
    writeln!(report_file, "{:-<8}-+-{:-<12}", "", "")?;
    for (i, error) in report.per_sample_errors.iter().enumerate() {
        writeln!(report_file, "{:>8} | {}", i, format_error(*error))?;
    }

    Ok(())
}

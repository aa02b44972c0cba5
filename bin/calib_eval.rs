//! Court Camera Calibration Evaluation Tool
//!
//! Scores estimated court cameras against ground truth by how far apart the
//! two cameras place a fixed set of image points on the court floor.
//!
//! **Subcommands:**
//! - `rescore`: score an existing predictions log against a ground-truth file
//! - `synthetic`: render ideal landmark heatmaps for a family of broadcast views
//!   and run a full evaluation pass on them
//!
//! **Usage:**
//! ```bash
//! # Score a predictions log
//! cargo run --bin calib_eval -- rescore \
//!   --predictions samples/predictions.json \
//!   --ground-truth samples/ground_truth.json
//!
//! # Synthetic pass over 16 views, every 4th view forced to fall back
//! cargo run --bin calib_eval -- synthetic \
//!   --num-samples 16 --fallback-every 4 --parallel
//!
//! # Override evaluator settings from YAML
//! cargo run --bin calib_eval -- --config samples/evaluator.yaml synthetic
//! ```

use clap::{Parser, Subcommand};
use court_calib_eval::camera::CameraModel;
use court_calib_eval::evaluation::{
    rescore, Evaluator, EvaluatorConfig, ResultStore, Sample,
};
use court_calib_eval::keypoints::{Heatmap, COURT_LANDMARKS};
use court_calib_eval::util;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

/// Court camera calibration evaluation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Evaluator configuration YAML; command-line flags take precedence
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a predictions log against ground truth
    Rescore {
        /// Predictions JSON (array of records with optional "P")
        #[arg(short = 'p', long)]
        predictions: PathBuf,

        /// Ground-truth JSON (header with width/height, then {"P": [...]} records)
        #[arg(short = 'g', long)]
        ground_truth: PathBuf,

        /// Also write a text report here
        #[arg(short = 'r', long)]
        report: Option<PathBuf>,

        /// Print one line per record
        #[arg(long)]
        details: bool,
    },
    /// Evaluate rendered heatmaps of synthetic broadcast views
    Synthetic {
        /// Number of views
        #[arg(short = 'n', long, default_value = "8")]
        num_samples: usize,

        /// Keep only four landmark channels in every k-th view (0: never)
        #[arg(long, default_value = "0")]
        fallback_every: usize,

        /// Heatmap downsampling factor relative to the image
        #[arg(long, default_value = "4")]
        heatmap_scale: u32,

        /// Gaussian sigma of rendered landmarks, in heatmap pixels
        #[arg(long, default_value = "1.5")]
        sigma: f64,

        /// Peak confidence threshold
        #[arg(short = 't', long)]
        threshold: Option<f32>,

        /// Directory for predictions, ground truth and report
        #[arg(short = 'o', long, default_value = "output/synthetic")]
        output_dir: PathBuf,

        /// Write a keypoint overlay image per view
        #[arg(long)]
        overlays: bool,

        /// Save the first ground-truth camera as YAML
        #[arg(long)]
        save_camera: Option<PathBuf>,

        /// Evaluate views on all cores
        #[arg(long)]
        parallel: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading evaluator config from {path:?}");
            EvaluatorConfig::load_from_yaml(path)?
        }
        None => EvaluatorConfig::default(),
    };

    match cli.command {
        Command::Rescore {
            predictions,
            ground_truth,
            report,
            details,
        } => {
            println!("🎯 Rescoring Predictions");
            println!("========================");
            println!("Predictions: {predictions:?}");
            println!("Ground truth: {ground_truth:?}");

            let result = rescore(&predictions, &ground_truth)?;
            util::display_results_summary(&result);

            if details {
                let records = court_calib_eval::evaluation::read_predictions(&predictions)?;
                util::display_detailed_results(&records, &result);
            }
            if let Some(path) = report {
                util::export_evaluation_results(&result, &path)?;
                println!("📄 Report exported to: {path:?}");
            }
            println!("\n{result}");
        }
        Command::Synthetic {
            num_samples,
            fallback_every,
            heatmap_scale,
            sigma,
            threshold,
            output_dir,
            overlays,
            save_camera,
            parallel,
        } => {
            if heatmap_scale == 0 {
                return Err("heatmap scale must be positive".into());
            }
            if let Some(threshold) = threshold {
                config.extractor.confidence_threshold = threshold;
            }
            if overlays {
                config.overlay_dir = Some(output_dir.join("overlays"));
            }

            println!("🎯 Synthetic Evaluation Pass");
            println!("============================");
            println!(
                "Views: {num_samples}, image {}x{}, heatmap 1/{heatmap_scale}",
                config.resolution.width, config.resolution.height
            );

            let heatmap_width = (config.resolution.width / heatmap_scale).max(1) as usize;
            let heatmap_height = (config.resolution.height / heatmap_scale).max(1) as usize;

            let mut samples = Vec::with_capacity(num_samples);
            for view in 0..num_samples {
                let ground_truth = util::broadcast_camera(view, config.resolution)?;
                let mut heatmap = util::render_landmark_heatmap(
                    &ground_truth,
                    &COURT_LANDMARKS,
                    heatmap_width,
                    heatmap_height,
                    sigma,
                )?;
                if fallback_every > 0 && view % fallback_every == fallback_every - 1 {
                    heatmap = Heatmap::new(heatmap.channels()[..4].to_vec())?;
                }
                if view == 0 {
                    if let Some(path) = &save_camera {
                        ground_truth.save_to_yaml(&path.to_string_lossy())?;
                        println!("💾 Saved ground-truth camera to {path:?}");
                    }
                }
                samples.push(Sample {
                    heatmap,
                    ground_truth,
                });
            }

            let start = Instant::now();
            let mut evaluator = Evaluator::new(config)?;
            if parallel {
                evaluator.run_parallel(samples)?;
            } else {
                evaluator.run(samples)?;
            }
            info!("Evaluated {num_samples} views in {:?}", start.elapsed());

            let records = evaluator.records().to_vec();
            let store = ResultStore::new(&output_dir)?;
            let result = evaluator.finish(&store)?;

            util::display_results_summary(&result);
            util::display_detailed_results(&records, &result);
            println!("\n💾 Results written to {:?}", store.root());
            println!("\n{result}");
        }
    }

    Ok(())
}

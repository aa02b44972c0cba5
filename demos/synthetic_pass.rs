//! Synthetic Evaluation Pass Example
//!
//! This example walks through one evaluation end to end:
//! - Building a ground-truth broadcast camera
//! - Rendering the landmark heatmap a perfect detector would output
//! - Extracting correspondences and estimating a camera with the DLT
//! - Scoring the estimate on the court floor, then forcing a fallback
//!
//! Run with: cargo run --example synthetic_pass

use court_calib_eval::camera::{CameraModel, Resolution};
use court_calib_eval::estimation::estimate;
use court_calib_eval::evaluation::{evaluate_sample, Sample};
use court_calib_eval::keypoints::{ExtractorConfig, Heatmap, KeypointExtractor, COURT_LANDMARKS};
use court_calib_eval::util;
use nalgebra::Vector2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Synthetic Evaluation Pass Example ===\n");

    let resolution = Resolution {
        width: 1280,
        height: 720,
    };
    let ground_truth = util::broadcast_camera(0, resolution)?;
    println!("Ground truth: {ground_truth:?}\n");

    // Example 1: render and extract
    println!("--- Example 1: Heatmap → correspondences ---");
    let heatmap = util::render_landmark_heatmap(&ground_truth, &COURT_LANDMARKS, 320, 180, 1.5)?;
    let extractor = KeypointExtractor::new(ExtractorConfig::default());
    let correspondences = extractor.extract(&heatmap, resolution);
    println!(
        "Extracted {} of {} landmarks",
        correspondences.len(),
        COURT_LANDMARKS.len()
    );

    // Example 2: estimate
    println!("\n--- Example 2: DLT estimate ---");
    let camera = estimate(&correspondences, resolution)?;
    let decomposition = camera.decompose()?;
    println!(
        "fx={:.1}, fy={:.1}, cx={:.1}, cy={:.1}",
        decomposition.k[(0, 0)],
        decomposition.k[(1, 1)],
        decomposition.k[(0, 2)],
        decomposition.k[(1, 2)]
    );

    let centre = Vector2::new(640.0, 360.0);
    let estimated_floor = camera.back_project(&centre, 0.0)?;
    let true_floor = ground_truth.back_project(&centre, 0.0)?;
    println!(
        "Image centre on the floor: estimated ({:.1}, {:.1}), true ({:.1}, {:.1}) cm",
        estimated_floor.x, estimated_floor.y, true_floor.x, true_floor.y
    );

    // Example 3: score, then starve the estimator
    println!("\n--- Example 3: Scoring ---");
    let sample = Sample {
        heatmap: heatmap.clone(),
        ground_truth: ground_truth.clone(),
    };
    let outcome = evaluate_sample(&extractor, &sample, resolution)?;
    println!(
        "Estimated camera: error {:.3} cm",
        outcome.error().unwrap_or(f64::NAN)
    );

    let starved = Sample {
        heatmap: Heatmap::new(heatmap.channels()[..5].to_vec())?,
        ground_truth,
    };
    let outcome = evaluate_sample(&extractor, &starved, resolution)?;
    println!(
        "Five landmarks only: fallback {}, error {:.1} cm",
        outcome.fallback,
        outcome.error().unwrap_or(f64::NAN)
    );

    Ok(())
}

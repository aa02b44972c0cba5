//! Canonical basketball court landmark layout.
//!
//! World frame: origin at a court corner, `X` along the 28 m sideline, `Y` along
//! the 15 m baseline, `Z` up. Units are centimetres. Heatmap channel `i`
//! carries landmark `COURT_LANDMARKS[i]`.

use nalgebra::Vector3;

/// A named 3D reference point on the court.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub name: &'static str,
    pub world: [f64; 3],
}

impl Landmark {
    /// World position as a vector.
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.world[0], self.world[1], self.world[2])
    }
}

const COURT_LENGTH: f64 = 2800.0;
const COURT_WIDTH: f64 = 1500.0;
const KEY_DEPTH: f64 = 580.0;
const KEY_Y_MIN: f64 = 505.0;
const KEY_Y_MAX: f64 = 995.0;
const BACKBOARD_OFFSET: f64 = 120.0;
const BACKBOARD_Y_MIN: f64 = 660.0;
const BACKBOARD_Y_MAX: f64 = 840.0;
const BACKBOARD_BOTTOM: f64 = 290.0;
const BACKBOARD_TOP: f64 = 395.0;

const fn landmark(name: &'static str, x: f64, y: f64, z: f64) -> Landmark {
    Landmark {
        name,
        world: [x, y, z],
    }
}

/// FIBA court landmarks in heatmap channel order.
pub const COURT_LANDMARKS: [Landmark; 22] = [
    // court corners
    landmark("corner_near_left", 0.0, 0.0, 0.0),
    landmark("corner_near_right", COURT_LENGTH, 0.0, 0.0),
    landmark("corner_far_right", COURT_LENGTH, COURT_WIDTH, 0.0),
    landmark("corner_far_left", 0.0, COURT_WIDTH, 0.0),
    // half-court line
    landmark("midline_near", COURT_LENGTH / 2.0, 0.0, 0.0),
    landmark("midline_far", COURT_LENGTH / 2.0, COURT_WIDTH, 0.0),
    // left restricted area
    landmark("key_left_baseline_near", 0.0, KEY_Y_MIN, 0.0),
    landmark("key_left_free_throw_near", KEY_DEPTH, KEY_Y_MIN, 0.0),
    landmark("key_left_free_throw_far", KEY_DEPTH, KEY_Y_MAX, 0.0),
    landmark("key_left_baseline_far", 0.0, KEY_Y_MAX, 0.0),
    // right restricted area
    landmark("key_right_baseline_near", COURT_LENGTH, KEY_Y_MIN, 0.0),
    landmark("key_right_free_throw_near", COURT_LENGTH - KEY_DEPTH, KEY_Y_MIN, 0.0),
    landmark("key_right_free_throw_far", COURT_LENGTH - KEY_DEPTH, KEY_Y_MAX, 0.0),
    landmark("key_right_baseline_far", COURT_LENGTH, KEY_Y_MAX, 0.0),
    // left backboard
    landmark("backboard_left_bottom_near", BACKBOARD_OFFSET, BACKBOARD_Y_MIN, BACKBOARD_BOTTOM),
    landmark("backboard_left_bottom_far", BACKBOARD_OFFSET, BACKBOARD_Y_MAX, BACKBOARD_BOTTOM),
    landmark("backboard_left_top_far", BACKBOARD_OFFSET, BACKBOARD_Y_MAX, BACKBOARD_TOP),
    landmark("backboard_left_top_near", BACKBOARD_OFFSET, BACKBOARD_Y_MIN, BACKBOARD_TOP),
    // right backboard
    landmark(
        "backboard_right_bottom_near",
        COURT_LENGTH - BACKBOARD_OFFSET,
        BACKBOARD_Y_MIN,
        BACKBOARD_BOTTOM,
    ),
    landmark(
        "backboard_right_bottom_far",
        COURT_LENGTH - BACKBOARD_OFFSET,
        BACKBOARD_Y_MAX,
        BACKBOARD_BOTTOM,
    ),
    landmark(
        "backboard_right_top_far",
        COURT_LENGTH - BACKBOARD_OFFSET,
        BACKBOARD_Y_MAX,
        BACKBOARD_TOP,
    ),
    landmark(
        "backboard_right_top_near",
        COURT_LENGTH - BACKBOARD_OFFSET,
        BACKBOARD_Y_MIN,
        BACKBOARD_TOP,
    ),
];

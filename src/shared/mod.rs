//! Geteilte Konfiguration und Konstanten für alle Layer.

pub mod options;

pub use options::RouterOptions;
pub use options::{
    ANGLE_EPSILON, DEFAULT_SLOPE_TOLERANCE, DEFAULT_SNAP_RADIUS, DISTANCE_EPSILON,
    MIN_ELBOW_ANGLE,
};

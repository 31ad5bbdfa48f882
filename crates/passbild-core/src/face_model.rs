//! Canonical 3D face geometry for the pose solve.
//!
//! Six anatomical points of a generic adult face, millimeters, nose tip at
//! the origin with y up and z toward the camera. The numbers are calibrated
//! against the landmark scheme below and are constants, not configuration.

use crate::types::Point3;

/// Indices into the 68-point landmark scheme, in model-point order:
/// nose tip, chin, left eye outer corner, right eye outer corner,
/// left mouth corner, right mouth corner.
pub const POSE_LANDMARK_INDICES: [usize; 6] = [30, 8, 36, 45, 48, 54];

/// 3D coordinates matching [`POSE_LANDMARK_INDICES`] position by position.
pub const REFERENCE_POINTS: [Point3; 6] = [
    Point3::new(0.0, 0.0, 0.0),        // nose tip
    Point3::new(0.0, -330.0, -65.0),   // chin
    Point3::new(-225.0, 170.0, -135.0), // left eye outer corner
    Point3::new(225.0, 170.0, -135.0), // right eye outer corner
    Point3::new(-150.0, -150.0, -125.0), // left mouth corner
    Point3::new(150.0, -150.0, -125.0), // right mouth corner
];

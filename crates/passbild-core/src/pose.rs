//! Head orientation from facial landmarks.
//!
//! Solves the six-point pose against the canonical face geometry, decomposes
//! the rotation into Euler angles with an explicit gimbal-lock branch, and
//! thresholds the result into a frontal / non-frontal verdict.

use crate::camera::CameraIntrinsics;
use crate::face_model::{POSE_LANDMARK_INDICES, REFERENCE_POINTS};
use crate::pnp::{self, PnpError};
use crate::types::{Landmarks, Point2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

const YAW_LIMIT_DEG: f64 = 4.0;
const PITCH_LIMIT_DEG: f64 = 15.0;
const ROLL_LIMIT_DEG: f64 = 5.0;

/// Euler angles in radians, one decomposition branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Both valid decompositions of a rotation matrix.
///
/// Outside gimbal lock the asin ambiguity yields two solutions; consumers
/// here always take `primary`. `alternate` is the second branch, computed
/// and kept for callers that need it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerDecomposition {
    pub primary: EulerAngles,
    pub alternate: EulerAngles,
}

/// Head orientation in degrees, ready for thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Decompose a rotation matrix into Euler angles.
///
/// When `|m20| >= 1` one degree of freedom collapses; yaw is pinned to zero
/// and the remaining angle is recovered from the top row. Otherwise both
/// branches of the asin ambiguity are returned.
pub fn rotation_to_euler(m: &[[f64; 3]; 3]) -> EulerDecomposition {
    let m20 = m[2][0];

    if m20.abs() >= 1.0 {
        let (pitch, roll) = if m20 < 0.0 {
            (FRAC_PI_2, m[0][1].atan2(m[0][2]))
        } else {
            (-FRAC_PI_2, (-m[0][1]).atan2(-m[0][2]))
        };
        let locked = EulerAngles { yaw: 0.0, pitch, roll };
        return EulerDecomposition { primary: locked, alternate: locked };
    }

    let pitch_a = (-m20).asin();
    let pitch_b = PI - pitch_a;

    let branch = |pitch: f64| EulerAngles {
        yaw: (m[1][0] / pitch.cos()).atan2(m[0][0] / pitch.cos()),
        pitch,
        roll: (m[2][1] / pitch.cos()).atan2(m[2][2] / pitch.cos()),
    };

    EulerDecomposition {
        primary: branch(pitch_a),
        alternate: branch(pitch_b),
    }
}

/// Estimate the head orientation from a full landmark set.
///
/// Consumes only the six pose landmarks, solves against the reference
/// geometry, and reports degrees.
pub fn estimate_head_pose(
    landmarks: &Landmarks,
    intrinsics: &CameraIntrinsics,
) -> Result<HeadPose, PnpError> {
    let image_points: Vec<Point2> = POSE_LANDMARK_INDICES
        .iter()
        .map(|&i| landmarks.point(i))
        .collect();

    let solution = pnp::solve(&REFERENCE_POINTS, &image_points, intrinsics)?;
    let euler = rotation_to_euler(&solution.rotation).primary;

    // The decomposition axes do not coincide with head axes for this model
    // orientation: a head turn lands in the decomposition pitch, a nod in the
    // decomposition roll (near ±180° when frontal), a tilt in the
    // decomposition yaw. Remap, then wrap the nod back into a band around
    // zero.
    let yaw = euler.pitch.to_degrees();
    let pitch = wrap_pitch(euler.roll.to_degrees());
    let roll = euler.yaw.to_degrees();

    tracing::debug!(yaw, pitch, roll, "estimated head pose");
    Ok(HeadPose { yaw, pitch, roll })
}

/// Whether the head is close enough to frontal for a passport photo.
pub fn is_frontal(pose: &HeadPose) -> bool {
    pose.yaw >= -YAW_LIMIT_DEG
        && pose.yaw <= YAW_LIMIT_DEG
        && pose.pitch >= -PITCH_LIMIT_DEG
        && pose.pitch <= PITCH_LIMIT_DEG
        && pose.roll >= -ROLL_LIMIT_DEG
        && pose.roll <= ROLL_LIMIT_DEG
}

/// Fold an angle that wraps at ±180° into an equivalent band around zero.
/// Zero stays zero.
fn wrap_pitch(deg: f64) -> f64 {
    if deg > 0.0 {
        180.0 - deg
    } else if deg < 0.0 {
        -180.0 - deg
    } else {
        0.0
    }
}

//! Validation pipeline: detection count, face area, background, posture.
//!
//! Detection and landmark localization are external; they plug in through
//! the traits below. Each photo gets exactly one report, and one photo's
//! failure never aborts a batch.

use crate::background::{self, BackgroundError};
use crate::camera::CameraIntrinsics;
use crate::pnp::PnpError;
use crate::pose;
use crate::types::{FaceBox, Landmarks, Raster, Rgb};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_MIN_FACE_AREA_PCT: f64 = 20.0;
const DEFAULT_BACKGROUND_DISTANCE_THRESHOLD: f64 = 100.0;
const DEFAULT_PIXEL_VALIDITY_THRESHOLD_PCT: u64 = 90;

/// Supplies face bounding boxes for an image.
pub trait FaceDetector {
    fn detect_faces(&mut self, image: &dyn Raster) -> Vec<FaceBox>;
}

/// Supplies the 68-point landmark set for a detected face.
pub trait LandmarkPredictor {
    fn landmarks(&mut self, image: &dyn Raster, face: &FaceBox) -> Landmarks;
}

/// Tunable acceptance thresholds. Loading these from a file is the host's
/// concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum face area as a percentage of the image area; the face must
    /// strictly exceed it.
    pub min_face_area_pct: f64,
    /// Background color the left sweep compares against.
    pub background_color: Rgb,
    /// Maximum redmean distance for a pixel to count as background.
    pub background_distance_threshold: f64,
    /// Minimum percentage of valid pixels for the scan to pass.
    pub pixel_validity_threshold_pct: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_face_area_pct: DEFAULT_MIN_FACE_AREA_PCT,
            background_color: Rgb::WHITE,
            background_distance_threshold: DEFAULT_BACKGROUND_DISTANCE_THRESHOLD,
            pixel_validity_threshold_pct: DEFAULT_PIXEL_VALIDITY_THRESHOLD_PCT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("multiple faces detected")]
    MultipleFacesDetected,
    #[error("detected face area is below the requirement; a square aspect ratio is recommended for best results")]
    FaceAreaTooSmall { area_pct: f64 },
    #[error("required background color not detected")]
    BackgroundInvalid,
    #[error("background scan: {0}")]
    Scan(#[from] BackgroundError),
    #[error("head pose estimation failed: {0}")]
    Pose(#[from] PnpError),
}

/// Outcome for one photo. Written exactly once per validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub error_message: Option<String>,
}

/// Runs the compliance pipeline over one photo at a time.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate one photo.
    ///
    /// A pipeline failure becomes an invalid report carrying the failure
    /// message. A non-frontal posture is an invalid report with no message.
    pub fn validate(
        &self,
        image: &dyn Raster,
        detector: &mut dyn FaceDetector,
        predictor: &mut dyn LandmarkPredictor,
    ) -> ValidationReport {
        match self.run(image, detector, predictor) {
            Ok(frontal) => {
                tracing::info!(is_valid = frontal, "photo validated");
                ValidationReport { is_valid: frontal, error_message: None }
            }
            Err(e) => {
                tracing::info!(error = %e, "photo rejected");
                ValidationReport { is_valid: false, error_message: Some(e.to_string()) }
            }
        }
    }

    fn run(
        &self,
        image: &dyn Raster,
        detector: &mut dyn FaceDetector,
        predictor: &mut dyn LandmarkPredictor,
    ) -> Result<bool, ValidationError> {
        let faces = detector.detect_faces(image);
        let face = match faces.as_slice() {
            [] => return Err(ValidationError::NoFaceDetected),
            [face] => *face,
            _ => return Err(ValidationError::MultipleFacesDetected),
        };

        let image_area = i64::from(image.width()) * i64::from(image.height());
        let area_pct = if image_area > 0 {
            face.area() as f64 * 100.0 / image_area as f64
        } else {
            0.0
        };
        tracing::debug!(area_pct, "face area share");
        if area_pct <= self.config.min_face_area_pct {
            return Err(ValidationError::FaceAreaTooSmall { area_pct });
        }

        let background_ok = background::is_valid_background(
            image,
            face.left,
            face.bottom,
            face.right,
            self.config.background_color,
            self.config.background_distance_threshold,
            self.config.pixel_validity_threshold_pct,
        )?;
        if !background_ok {
            return Err(ValidationError::BackgroundInvalid);
        }

        let landmarks = predictor.landmarks(image, &face);
        let intrinsics = CameraIntrinsics::for_image(image.width(), image.height());
        let head_pose = pose::estimate_head_pose(&landmarks, &intrinsics)?;

        Ok(pose::is_frontal(&head_pose))
    }
}

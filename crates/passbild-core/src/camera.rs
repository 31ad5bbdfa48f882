//! Pinhole camera intrinsics derived from image dimensions.

use crate::types::Point2;
use nalgebra::Matrix3;

/// Pinhole intrinsics for one image, zero distortion.
///
/// The focal length is approximated by the image width on both axes and the
/// principal point sits at the image center. Good enough for the coarse
/// head-pose angles this engine thresholds on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Build intrinsics for an image of the given dimensions.
    pub fn for_image(width: u32, height: u32) -> Self {
        let w = f64::from(width);
        let h = f64::from(height);
        Self {
            fx: w,
            fy: w,
            cx: w / 2.0,
            cy: h / 2.0,
        }
    }

    /// The 3×3 intrinsics matrix K.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Map a pixel position to normalized camera coordinates.
    pub fn normalize(&self, p: Point2) -> (f64, f64) {
        ((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }
}

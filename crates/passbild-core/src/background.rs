//! Background uniformity scanning.
//!
//! Walks the image row by row from the face's lower edge up to the top,
//! sampling outward from the face toward both image edges, and classifies
//! each pixel against a reference color with a redmean-weighted distance.

use crate::types::{Raster, Rgb};
use thiserror::Error;

/// The right-hand sweep compares against fixed white, independent of the
/// configured target color.
const RIGHT_SWEEP_REFERENCE: Rgb = Rgb::WHITE;

#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("no background pixels sampled")]
    NoPixelsSampled,
}

/// Valid / invalid pixel counts accumulated over one scan.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanTally {
    pub valid: u64,
    pub invalid: u64,
}

impl ScanTally {
    fn record(&mut self, valid: bool) {
        if valid {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }
    }

    /// Percentage of valid pixels, integer arithmetic. `None` when nothing
    /// was sampled.
    pub fn validity_pct(&self) -> Option<u64> {
        let total = self.valid + self.invalid;
        if total == 0 {
            return None;
        }
        Some(self.valid * 100 / total)
    }
}

/// Perceptually weighted distance between two colors.
///
/// Redmean metric: Euclidean over RGB with red/blue weights that shift with
/// the mean red level. Zero for identical colors, symmetric.
pub fn color_distance(a: Rgb, b: Rgb) -> f64 {
    let rmean = (i64::from(a.r) + i64::from(b.r)) / 2;
    let dr = i64::from(a.r) - i64::from(b.r);
    let dg = i64::from(a.g) - i64::from(b.g);
    let db = i64::from(a.b) - i64::from(b.b);
    let sum = (((512 + rmean) * dr * dr) >> 8) + 4 * dg * dg + (((767 - rmean) * db * db) >> 8);
    (sum as f64).sqrt()
}

/// Decide whether the region around the face is a valid background.
///
/// Rows run from `y_start` (clamped into the raster) up through row 1. Each
/// row is sampled from the midpoint between the face's left edge and the
/// image's left edge walking left, and from the midpoint between the face's
/// right edge and the image's right edge walking right; starting at the
/// midpoints keeps the sweep clear of faces wider than their detector box.
/// A pixel counts as valid when its distance to the reference color is
/// within `bg_threshold`; the scan passes when the valid percentage reaches
/// `pixel_validity_threshold_pct`.
pub fn is_valid_background<R: Raster + ?Sized>(
    image: &R,
    face_left: i64,
    y_start: i64,
    face_right: i64,
    target: Rgb,
    bg_threshold: f64,
    pixel_validity_threshold_pct: u64,
) -> Result<bool, BackgroundError> {
    let width = i64::from(image.width());
    let height = i64::from(image.height());

    let mut tally = ScanTally::default();

    let top_row = 1;
    let mut y = y_start.min(height - 1);
    while y >= top_row {
        let mut left_x = midpoint(0, face_left).min(width - 1);
        let mut right_x = midpoint(width, face_right).max(0);

        while left_x > 0 || right_x < width {
            if left_x > 0 {
                let d = color_distance(image.pixel(left_x as u32, y as u32), target);
                tally.record((0.0..=bg_threshold).contains(&d));
                left_x -= 1;
            }
            if right_x < width {
                let d = color_distance(image.pixel(right_x as u32, y as u32), RIGHT_SWEEP_REFERENCE);
                tally.record((0.0..=bg_threshold).contains(&d));
                right_x += 1;
            }
        }
        y -= 1;
    }

    let pct = tally.validity_pct().ok_or(BackgroundError::NoPixelsSampled)?;
    tracing::debug!(
        valid = tally.valid,
        invalid = tally.invalid,
        pct,
        "background scan complete"
    );
    Ok(pct >= pixel_validity_threshold_pct)
}

fn midpoint(a: i64, b: i64) -> i64 {
    a.min(b) + (a - b).abs() / 2
}

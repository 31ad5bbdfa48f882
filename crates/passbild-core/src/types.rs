use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of points in the landmark annotation scheme consumed here.
pub const LANDMARK_COUNT: usize = 68;

/// 2D image point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 3D model point, millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Axis-aligned face bounding box from the external detector.
///
/// Coordinates are signed: a detector may report edges slightly outside the
/// image, and consumers clamp where they sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl FaceBox {
    pub const fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i64 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.bottom - self.top).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }
}

#[derive(Debug, Error)]
pub enum LandmarksError {
    #[error("expected {LANDMARK_COUNT} landmarks, got {0}")]
    WrongCount(usize),
}

/// Ordered set of 68 facial landmarks from the external predictor.
///
/// Indexing follows the standard 68-point annotation scheme; construction
/// rejects any other count so downstream indexing cannot go out of bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point2>", into = "Vec<Point2>")]
pub struct Landmarks {
    points: Vec<Point2>,
}

impl TryFrom<Vec<Point2>> for Landmarks {
    type Error = LandmarksError;

    fn try_from(points: Vec<Point2>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Landmarks> for Vec<Point2> {
    fn from(landmarks: Landmarks) -> Self {
        landmarks.points
    }
}

impl Landmarks {
    pub fn new(points: Vec<Point2>) -> Result<Self, LandmarksError> {
        if points.len() != LANDMARK_COUNT {
            return Err(LandmarksError::WrongCount(points.len()));
        }
        Ok(Self { points })
    }

    pub fn point(&self, index: usize) -> Point2 {
        self.points[index]
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }
}

/// Minimal read-only pixel source.
///
/// Keeps the scanning and pose code independent of any particular decoding
/// library; hosts adapt whatever raster they hold.
pub trait Raster {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Pixel at `(x, y)`. Callers stay within `width × height`.
    fn pixel(&self, x: u32, y: u32) -> Rgb;
}

impl Raster for image::RgbImage {
    fn width(&self) -> u32 {
        image::RgbImage::width(self)
    }

    fn height(&self) -> u32 {
        image::RgbImage::height(self)
    }

    fn pixel(&self, x: u32, y: u32) -> Rgb {
        let p = self.get_pixel(x, y);
        Rgb::new(p[0], p[1], p[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_box_dimensions() {
        let face = FaceBox::new(10, 20, 110, 170);
        assert_eq!(face.width(), 100);
        assert_eq!(face.height(), 150);
        assert_eq!(face.area(), 15000);
    }

    #[test]
    fn test_face_box_degenerate_area() {
        // Inverted edges clamp to zero rather than going negative
        let face = FaceBox::new(50, 50, 40, 60);
        assert_eq!(face.width(), 0);
        assert_eq!(face.area(), 0);
    }

    #[test]
    fn test_landmarks_count_enforced() {
        assert!(Landmarks::new(vec![Point2::new(0.0, 0.0); 67]).is_err());
        assert!(Landmarks::new(vec![Point2::new(0.0, 0.0); 68]).is_ok());
    }

    #[test]
    fn test_landmarks_indexing() {
        let mut pts = vec![Point2::new(0.0, 0.0); LANDMARK_COUNT];
        pts[30] = Point2::new(320.0, 240.0);
        let lm = Landmarks::new(pts).unwrap();
        assert_eq!(lm.point(30), Point2::new(320.0, 240.0));
        assert_eq!(lm.points().len(), LANDMARK_COUNT);
    }

    #[test]
    fn test_rgb_image_raster_adapter() {
        let mut img = image::RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        img.put_pixel(2, 1, image::Rgb([200, 100, 50]));

        let raster: &dyn Raster = &img;
        assert_eq!(raster.width(), 4);
        assert_eq!(raster.height(), 3);
        assert_eq!(raster.pixel(0, 0), Rgb::new(10, 20, 30));
        assert_eq!(raster.pixel(2, 1), Rgb::new(200, 100, 50));
    }
}

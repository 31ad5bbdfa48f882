//! passbild-core — passport photo compliance engine.
//!
//! Checks a candidate passport photograph against three rules: exactly one
//! detected face of sufficient relative size, a near-uniform background of a
//! target color, and a head pose close to frontal. Face detection, landmark
//! localization and image decoding are external collaborators; this crate
//! consumes their outputs through the [`FaceDetector`], [`LandmarkPredictor`]
//! and [`types::Raster`] contracts.
//!
//! The two numerical subsystems at the center:
//! 1. Head pose — a six-point Perspective-n-Point solve against a canonical
//!    face geometry, decomposed into gimbal-lock-safe yaw/pitch/roll.
//! 2. Background scan — a bidirectional radial pixel sweep judged with a
//!    redmean-weighted color distance.

pub mod background;
pub mod camera;
pub mod face_model;
pub mod pnp;
pub mod pose;
pub mod types;
pub mod validator;

pub use types::{FaceBox, Landmarks, Point2, Point3, Raster, Rgb};
pub use validator::{
    FaceDetector, LandmarkPredictor, ValidationConfig, ValidationReport, Validator,
};

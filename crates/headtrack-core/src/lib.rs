//! Core types and utilities for head-frame marker tracking.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any camera, image codec or drawing library: images are plain
//! row-major `u8` buffers, points are `nalgebra` points.

mod conic;
mod homography;
mod image;
mod logger;

pub use conic::{conic_to_ellipse, fit_ellipse_direct, try_fit_ellipse, ConicCoeffs, Ellipse, FitError};
pub use homography::{homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, set_log_frame};

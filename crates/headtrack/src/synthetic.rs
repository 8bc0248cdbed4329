//! Synthetic marker frames for tests, benches and demos.

use image::{GrayImage, Luma};
use nalgebra::Point2;

/// Luma of drawn blobs; well above the default threshold.
pub const BLOB_LUMA: u8 = 220;
/// Luma of the background; below the default threshold.
pub const BACKGROUND_LUMA: u8 = 12;

/// Dark frame with a bright filled disc of `radius` around each center.
pub fn blob_frame(width: u32, height: u32, centers: &[Point2<f32>], radius: f32) -> GrayImage {
    let r2 = radius * radius;
    GrayImage::from_fn(width, height, |x, y| {
        let p = Point2::new(x as f32, y as f32);
        if centers.iter().any(|c| (p - c).norm_squared() <= r2) {
            Luma([BLOB_LUMA])
        } else {
            Luma([BACKGROUND_LUMA])
        }
    })
}

/// Blob centers inset by `margin` from each frame corner, in reference
/// corner order.
pub fn corner_blob_centers(width: u32, height: u32, margin: f32) -> [Point2<f32>; 4] {
    let (w, h) = (width as f32, height as f32);
    [
        Point2::new(margin, margin),
        Point2::new(w - margin, margin),
        Point2::new(w - margin, h - margin),
        Point2::new(margin, h - margin),
    ]
}

//! Conversions between `image` buffers and core images.

use headtrack_core::GrayImage;
use image::{DynamicImage, Luma};

/// Luma plane of `frame`. Color frames go through `image`'s luma weights.
pub fn frame_luma(frame: &DynamicImage) -> GrayImage {
    let luma = frame.to_luma8();
    GrayImage {
        width: luma.width() as usize,
        height: luma.height() as usize,
        data: luma.into_raw(),
    }
}

/// Copy a core image (a binary mask or a warped plane) into an `image` buffer.
pub fn mask_to_image(mask: &GrayImage) -> image::GrayImage {
    image::GrayImage::from_fn(mask.width as u32, mask.height as u32, |x, y| {
        Luma([mask.get(x as i32, y as i32)])
    })
}

//! Fixed-threshold binarization followed by 3x3 dilation.
//!
//! Markers seen through a camera IR-cut filter are often faint and speckled;
//! dilating the mask merges each marker into one solid blob before contour
//! extraction.

use headtrack_core::{GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::types::BinarizeParams;

/// Mask value of foreground pixels.
pub const FOREGROUND: u8 = 255;

/// Threshold `src` into `out` (resized to match): `v > threshold` is foreground.
pub fn threshold_into(src: &GrayImageView<'_>, threshold: u8, out: &mut GrayImage) {
    out.reset(src.width, src.height);
    for (dst, &v) in out.data.iter_mut().zip(src.data) {
        *dst = if v > threshold { FOREGROUND } else { 0 };
    }
}

/// Fixed-threshold binary mask of `src`.
pub fn binarize(src: &GrayImageView<'_>, threshold: u8) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    threshold_into(src, threshold, &mut out);
    out
}

/// Apply `iterations` passes of 3x3 dilation in place.
///
/// `n` passes of a 3x3 square equal one pass of a `(2n+1)` square, which is
/// separable into a row and a column max filter. Pixels outside the image
/// never contribute.
pub fn dilate_in_place(mask: &mut GrayImage, iterations: usize, scratch: &mut Vec<u8>) {
    let (w, h) = (mask.width, mask.height);
    if iterations == 0 || w == 0 || h == 0 {
        return;
    }
    scratch.clear();
    scratch.resize(w * h, 0);

    let r = iterations;
    for y in 0..h {
        let row = &mask.data[y * w..(y + 1) * w];
        let out = &mut scratch[y * w..(y + 1) * w];
        for x in 0..w {
            let lo = x.saturating_sub(r);
            let hi = x.saturating_add(r).min(w - 1);
            out[x] = row[lo..=hi].iter().copied().max().unwrap_or(0);
        }
    }

    for x in 0..w {
        for y in 0..h {
            let lo = y.saturating_sub(r);
            let hi = y.saturating_add(r).min(h - 1);
            mask.data[y * w + x] = (lo..=hi).map(|yy| scratch[yy * w + x]).max().unwrap_or(0);
        }
    }
}

pub fn dilate(mask: &GrayImage, iterations: usize) -> GrayImage {
    let mut out = mask.clone();
    let mut scratch = Vec::new();
    dilate_in_place(&mut out, iterations, &mut scratch);
    out
}

/// Reusable binarization stage owning its scratch buffer.
#[derive(Clone, Debug)]
pub struct Binarizer {
    params: BinarizeParams,
    scratch: Vec<u8>,
}

impl Binarizer {
    pub fn new(params: BinarizeParams) -> Self {
        Self {
            params,
            scratch: Vec::new(),
        }
    }

    pub fn params(&self) -> &BinarizeParams {
        &self.params
    }

    /// Threshold and dilate `src` into `mask`, overwriting it. Never fails;
    /// empty and solid masks are valid outputs.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(width = src.width, height = src.height))
    )]
    pub fn run(&mut self, src: &GrayImageView<'_>, mask: &mut GrayImage) {
        threshold_into(src, self.params.threshold, mask);
        dilate_in_place(mask, self.params.dilate_iterations, &mut self.scratch);
    }
}

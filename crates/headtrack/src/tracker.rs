//! Per-frame tracking loop with last-known-good state.

use headtrack_core::{warp_perspective_gray, GrayImage, Homography};
use image::DynamicImage;
use log::{debug, warn};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::annotate::annotate;
use crate::convert::{frame_luma, mask_to_image};
use crate::binarize::Binarizer;
use crate::correspondence::{resolve, Correspondence};
use crate::extract::{extract_markers, ExtractError};
use crate::source::{FrameSource, FrameSourceError};
use crate::transform::estimate_transform;
use crate::types::{
    FrameOutput, Marker, MarkerStatus, OutputMode, TrackedFrame, TrackerParams, TransformStatus,
};

#[derive(thiserror::Error, Debug)]
pub enum TrackError {
    #[error(transparent)]
    Source(#[from] FrameSourceError),
}

/// Corners of the `width x height` frame rectangle: top-left, top-right,
/// bottom-right, bottom-left.
pub fn reference_corners(width: u32, height: u32) -> [Point2<f32>; 4] {
    let (w, h) = (width as f32, height as f32);
    [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ]
}

/// Tracks four markers across frames of a [`FrameSource`].
///
/// The reference rectangle is fixed from the source size at construction.
/// Until the first frame with exactly four markers, the marker set equals
/// the reference corners and the transform is the identity.
pub struct HeadTracker<S> {
    source: S,
    params: TrackerParams,
    corners: [Point2<f32>; 4],
    width: u32,
    height: u32,
    binarizer: Binarizer,
    mask: GrayImage,
    markers: [Marker; 4],
    homography: Homography,
}

impl<S: FrameSource> HeadTracker<S> {
    pub fn new(source: S, params: TrackerParams) -> Self {
        let (width, height) = (source.width(), source.height());
        let corners = reference_corners(width, height);
        Self {
            source,
            binarizer: Binarizer::new(params.binarize),
            params,
            corners,
            width,
            height,
            mask: GrayImage::new(width as usize, height as usize),
            markers: corners.map(Marker::at),
            homography: Homography::identity(),
        }
    }

    /// Grab one frame from the source and track it.
    ///
    /// Only source failures are errors; marker and transform failures are
    /// recovered and reported through the statuses of [`TrackedFrame`].
    pub fn process(&mut self) -> Result<TrackedFrame, TrackError> {
        let frame = self.source.grab()?;
        Ok(self.process_frame(&frame))
    }

    /// Track an already acquired frame.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn process_frame(&mut self, frame: &DynamicImage) -> TrackedFrame {
        if frame.width() != self.width || frame.height() != self.height {
            debug!(
                "frame is {}x{}, reference rectangle stays {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            );
        }

        let luma = frame_luma(frame);
        self.binarizer.run(&luma.view(), &mut self.mask);

        let marker_status = match extract_markers(&self.mask) {
            Ok(markers) => {
                self.markers = markers;
                MarkerStatus::Fresh
            }
            Err(err @ ExtractError::MarkerCountMismatch { kind, found }) => {
                warn!("{err}; reusing previous markers");
                MarkerStatus::Reused { kind, found }
            }
        };

        let centers = self.markers.map(|m| m.center);
        let correspondence = resolve(&self.corners, &centers, self.params.correspondence);
        let transform_status = self.update_transform(&correspondence);

        let image = match self.params.output {
            OutputMode::Binary => FrameOutput::Binary(mask_to_image(&self.mask)),
            OutputMode::Annotated => {
                // Reused markers were not seen in this frame and are not drawn.
                let drawn: &[Marker] = if marker_status.is_fresh() {
                    &self.markers
                } else {
                    &[]
                };
                FrameOutput::Annotated(annotate(frame, drawn, &self.params.annotation))
            }
        };

        TrackedFrame {
            image,
            markers: self.markers,
            marker_status,
            correspondence,
            homography: self.homography,
            transform_status,
        }
    }

    fn update_transform(&mut self, correspondence: &Correspondence) -> TransformStatus {
        if !correspondence.is_bijective() {
            debug!(
                "corners share markers: {:?}",
                correspondence.marker_index
            );
        }
        match estimate_transform(&correspondence.points, &self.corners) {
            Ok(h) => {
                self.homography = h;
                TransformStatus::Updated
            }
            Err(reason) => {
                warn!("{reason}; keeping previous transform");
                TransformStatus::Retained { reason }
            }
        }
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    pub fn corners(&self) -> &[Point2<f32>; 4] {
        &self.corners
    }

    /// Last known good marker set.
    pub fn markers(&self) -> &[Marker; 4] {
        &self.markers
    }

    /// Last known good transform, camera space to reference space.
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Binary mask of the most recent frame.
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Map a camera-space point into the reference rectangle.
    pub fn map_point(&self, p: Point2<f32>) -> Point2<f32> {
        self.homography.apply(p)
    }

    /// Resample the luma of `frame` into the reference rectangle with the
    /// current transform. `None` when the transform is not invertible.
    pub fn warp_to_reference(&self, frame: &DynamicImage) -> Option<image::GrayImage> {
        let h_src_from_ref = self.homography.inverse()?;
        let luma = frame_luma(frame);
        let warped = warp_perspective_gray(
            &luma.view(),
            h_src_from_ref,
            self.width as usize,
            self.height as usize,
        );
        Some(mask_to_image(&warped))
    }
}

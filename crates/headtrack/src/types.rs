use headtrack_core::{Ellipse, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::correspondence::{Correspondence, CorrespondenceStrategy};
use crate::extract::MismatchKind;
use crate::transform::TransformError;

/// Thresholding and dilation settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizeParams {
    /// Pixels with luma strictly above this value are foreground.
    pub threshold: u8,
    /// Number of 3x3 dilation passes applied to the mask.
    pub dilate_iterations: usize,
}

impl Default for BinarizeParams {
    fn default() -> Self {
        Self {
            threshold: 40,
            dilate_iterations: 8,
        }
    }
}

/// Which image a tracking cycle hands back to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// The dilated binary mask.
    Binary,
    /// The camera frame with fitted ellipses and marker circles drawn on it.
    #[default]
    Annotated,
}

/// Overlay style for [`crate::annotate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationParams {
    pub ellipse_color: [u8; 3],
    pub circle_color: [u8; 3],
    /// Polyline segments per drawn ellipse.
    pub ellipse_segments: usize,
    pub draw_centers: bool,
}

impl Default for AnnotationParams {
    fn default() -> Self {
        Self {
            ellipse_color: [0, 200, 0],
            circle_color: [255, 64, 0],
            ellipse_segments: 64,
            draw_centers: true,
        }
    }
}

/// Tracker configuration, fixed at construction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    pub binarize: BinarizeParams,
    pub output: OutputMode,
    pub correspondence: CorrespondenceStrategy,
    pub annotation: AnnotationParams,
}

/// One detected marker: center of the fitted ellipse in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub center: Point2<f32>,
    /// Radius of the equal-area circle of the fit.
    pub radius: f32,
    /// `None` when the contour was too small or irregular to fit and the
    /// center comes from the contour centroid.
    pub ellipse: Option<Ellipse>,
}

impl Marker {
    /// A marker sitting exactly on `center`, with no extent.
    pub fn at(center: Point2<f32>) -> Self {
        Self {
            center,
            radius: 0.0,
            ellipse: None,
        }
    }
}

/// Where this cycle's markers came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MarkerStatus {
    /// Exactly four contours were found in this frame.
    Fresh,
    /// The contour count was wrong; the previous marker set was reused.
    Reused { kind: MismatchKind, found: usize },
}

impl MarkerStatus {
    pub fn is_fresh(&self) -> bool {
        matches!(self, MarkerStatus::Fresh)
    }
}

/// Whether this cycle produced a new transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransformStatus {
    Updated,
    /// Estimation failed; the previous transform was kept.
    Retained { reason: TransformError },
}

impl TransformStatus {
    pub fn is_updated(&self) -> bool {
        matches!(self, TransformStatus::Updated)
    }
}

/// Image handed back by a tracking cycle.
#[derive(Clone, Debug)]
pub enum FrameOutput {
    Binary(image::GrayImage),
    Annotated(image::RgbImage),
}

impl FrameOutput {
    pub fn width(&self) -> u32 {
        match self {
            FrameOutput::Binary(img) => img.width(),
            FrameOutput::Annotated(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            FrameOutput::Binary(img) => img.height(),
            FrameOutput::Annotated(img) => img.height(),
        }
    }

    /// Save as an image file; the format follows the path extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> image::ImageResult<()> {
        match self {
            FrameOutput::Binary(img) => img.save(path),
            FrameOutput::Annotated(img) => img.save(path),
        }
    }
}

/// Result of one tracking cycle.
#[derive(Clone, Debug)]
pub struct TrackedFrame {
    pub image: FrameOutput,
    /// Marker set used this cycle (fresh or reused).
    pub markers: [Marker; 4],
    pub marker_status: MarkerStatus,
    pub correspondence: Correspondence,
    /// Marker space to reference space; the previous one when retained.
    pub homography: Homography,
    pub transform_status: TransformStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let raw = r#"{ "binarize": { "dilate_iterations": 2 }, "correspondence": "bijective" }"#;
        let params: TrackerParams = serde_json::from_str(raw).unwrap();
        assert_eq!(params.binarize.threshold, 40);
        assert_eq!(params.binarize.dilate_iterations, 2);
        assert_eq!(params.correspondence, CorrespondenceStrategy::Bijective);
        assert_eq!(params.output, OutputMode::Annotated);
        assert_eq!(params.annotation, AnnotationParams::default());
    }

    #[test]
    fn statuses_serialize_with_a_state_tag() {
        let reused = MarkerStatus::Reused {
            kind: MismatchKind::TooMany,
            found: 6,
        };
        assert_eq!(
            serde_json::to_value(reused).unwrap(),
            serde_json::json!({ "state": "reused", "kind": "too_many", "found": 6 })
        );
        let retained = TransformStatus::Retained {
            reason: TransformError::Degenerate,
        };
        assert_eq!(
            serde_json::to_value(retained).unwrap(),
            serde_json::json!({ "state": "retained", "reason": "degenerate" })
        );
        assert!(!retained.is_updated());
        assert!(!reused.is_fresh());
    }
}

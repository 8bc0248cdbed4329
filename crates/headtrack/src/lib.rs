//! Four-marker head-frame tracker.
//!
//! Per frame the tracker:
//! - thresholds the camera frame and dilates the mask so faint markers merge
//!   into solid blobs ([`binarize`]),
//! - traces the external contours of the mask and fits an ellipse to each
//!   ([`contour`], [`extract`]); anything but exactly four contours keeps the
//!   previous marker set,
//! - assigns each marker to a reference corner of the frame rectangle
//!   ([`correspondence`]),
//! - solves the perspective transform mapping markers onto the corners
//!   ([`transform`]); degenerate quads keep the previous transform.
//!
//! ## Quickstart
//!
//! ```no_run
//! use headtrack::{HeadTracker, ImageSequenceSource, TrackerParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = ImageSequenceSource::from_paths(["frame_000.png", "frame_001.png"])?;
//! let mut tracker = HeadTracker::new(source, TrackerParams::default());
//! let frame = tracker.process()?;
//! println!("markers: {:?}, status: {:?}", frame.marker_status, frame.transform_status);
//! let gaze = tracker.map_point(nalgebra::Point2::new(320.0, 240.0));
//! println!("rectified gaze point: {gaze}");
//! # Ok(())
//! # }
//! ```

pub mod annotate;
pub mod binarize;
pub mod contour;
pub mod convert;
pub mod correspondence;
pub mod extract;
pub mod source;
pub mod synthetic;
pub mod tracker;
pub mod transform;
mod types;

pub use annotate::annotate;
pub use binarize::{binarize, dilate, Binarizer};
pub use contour::{find_external_contours, Contour};
pub use correspondence::{resolve, Correspondence, CorrespondenceStrategy};
pub use extract::{extract_markers, fit_marker, ExtractError, MismatchKind, MARKER_COUNT};
pub use source::{FrameSource, FrameSourceError, ImageSequenceSource};
pub use tracker::{reference_corners, HeadTracker, TrackError};
pub use transform::{estimate_transform, is_degenerate_quad, TransformError};
pub use types::{
    AnnotationParams, BinarizeParams, FrameOutput, Marker, MarkerStatus, OutputMode,
    TrackedFrame, TrackerParams, TransformStatus,
};

pub use headtrack_core as core;

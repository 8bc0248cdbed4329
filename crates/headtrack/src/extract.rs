//! Marker extraction: one ellipse fit per external contour.

use headtrack_core::{try_fit_ellipse, GrayImage};
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::contour::{find_external_contours, Contour};
use crate::types::Marker;

/// Markers a detection round must find.
pub const MARKER_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    TooFew,
    TooMany,
}

impl std::fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MismatchKind::TooFew => "too few",
            MismatchKind::TooMany => "too many",
        })
    }
}

/// Errors returned by [`extract_markers`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{kind} markers found (expected {MARKER_COUNT}, got {found})")]
    MarkerCountMismatch { kind: MismatchKind, found: usize },
}

/// Find the markers of a binary mask.
///
/// Succeeds only with exactly [`MARKER_COUNT`] external contours; markers are
/// then in contour order. Any other count is a mismatch and no partial set is
/// returned.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = mask.width, height = mask.height))
)]
pub fn extract_markers(mask: &GrayImage) -> Result<[Marker; MARKER_COUNT], ExtractError> {
    let contours = find_external_contours(mask);
    let found = contours.len();
    if found != MARKER_COUNT {
        let kind = if found < MARKER_COUNT {
            MismatchKind::TooFew
        } else {
            MismatchKind::TooMany
        };
        return Err(ExtractError::MarkerCountMismatch { kind, found });
    }
    Ok(std::array::from_fn(|i| fit_marker(&contours[i])))
}

/// Fit an ellipse to the contour and take its center.
///
/// Falls back to the contour centroid when the fit fails or when the fitted
/// center leaves the contour's bounding box.
pub fn fit_marker(contour: &Contour) -> Marker {
    let pts: Vec<[f64; 2]> = contour
        .points
        .iter()
        .map(|&[x, y]| [x as f64, y as f64])
        .collect();

    match try_fit_ellipse(&pts) {
        Ok((_, ellipse)) if within_bounds(contour, ellipse.cx, ellipse.cy) => Marker {
            center: Point2::new(ellipse.cx as f32, ellipse.cy as f32),
            radius: ellipse.mean_radius() as f32,
            ellipse: Some(ellipse),
        },
        Ok((_, ellipse)) => {
            debug!(
                "ellipse center ({:.1}, {:.1}) outside contour bounds, using centroid",
                ellipse.cx, ellipse.cy
            );
            centroid_marker(&pts)
        }
        Err(err) => {
            debug!("ellipse fit failed on {} points ({err}), using centroid", pts.len());
            centroid_marker(&pts)
        }
    }
}

fn within_bounds(contour: &Contour, x: f64, y: f64) -> bool {
    contour.bounds().is_some_and(|[x0, y0, x1, y1]| {
        x >= x0 as f64 && x <= x1 as f64 && y >= y0 as f64 && y <= y1 as f64
    })
}

fn centroid_marker(pts: &[[f64; 2]]) -> Marker {
    if pts.is_empty() {
        return Marker::at(Point2::origin());
    }
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = pts.iter().map(|p| (p[0] - cx).hypot(p[1] - cy)).sum::<f64>() / n;
    Marker {
        center: Point2::new(cx as f32, cy as f32),
        radius: mean_dist.max(0.5) as f32,
        ellipse: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disc_mask(width: usize, height: usize, discs: &[(i32, i32, i32)]) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let inside = discs.iter().any(|&(cx, cy, r)| {
                    let dx = x as i32 - cx;
                    let dy = y as i32 - cy;
                    dx * dx + dy * dy <= r * r
                });
                if inside {
                    mask.set(x, y, 255);
                }
            }
        }
        mask
    }

    #[test]
    fn four_discs_give_four_centered_markers() {
        let discs = [(15, 12, 5), (60, 12, 5), (15, 45, 5), (60, 45, 5)];
        let mask = disc_mask(80, 60, &discs);
        let markers = extract_markers(&mask).expect("four markers");
        for (m, &(cx, cy, r)) in markers.iter().zip(&discs) {
            assert!((m.center.x - cx as f32).abs() < 1e-3, "{m:?}");
            assert!((m.center.y - cy as f32).abs() < 1e-3, "{m:?}");
            assert!((m.radius - r as f32).abs() < 1.0, "{m:?}");
            assert!(m.ellipse.is_some());
        }
    }

    #[test]
    fn three_discs_are_too_few() {
        let mask = disc_mask(80, 60, &[(15, 12, 5), (60, 12, 5), (60, 45, 5)]);
        assert_eq!(
            extract_markers(&mask).unwrap_err(),
            ExtractError::MarkerCountMismatch {
                kind: MismatchKind::TooFew,
                found: 3
            }
        );
    }

    #[test]
    fn five_discs_are_too_many() {
        let mask = disc_mask(
            80,
            60,
            &[(15, 12, 5), (60, 12, 5), (60, 45, 5), (15, 45, 5), (38, 30, 4)],
        );
        let err = extract_markers(&mask).unwrap_err();
        assert_eq!(
            err,
            ExtractError::MarkerCountMismatch {
                kind: MismatchKind::TooMany,
                found: 5
            }
        );
        assert_eq!(err.to_string(), "too many markers found (expected 4, got 5)");
    }

    #[test]
    fn tiny_contours_fall_back_to_centroid() {
        let contour = Contour {
            points: vec![[4, 4], [5, 4], [5, 5], [4, 5]],
        };
        let m = fit_marker(&contour);
        assert!(m.ellipse.is_none());
        assert!((m.center.x - 4.5).abs() < 1e-6);
        assert!((m.center.y - 4.5).abs() < 1e-6);
    }

    #[test]
    fn single_pixel_marker_has_half_pixel_radius() {
        let m = fit_marker(&Contour {
            points: vec![[7, 3]],
        });
        assert_eq!(m.center, Point2::new(7.0, 3.0));
        assert_eq!(m.radius, 0.5);
    }
}

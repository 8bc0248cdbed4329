//! Perspective transform from the marker quad onto the reference corners.

use headtrack_core::{homography_from_4pt, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Coincident points, relative to the quad size.
const COINCIDENT_REL_TOL: f64 = 1e-6;
/// Collinear triples: twice the triangle area, relative to the squared quad size.
const COLLINEAR_REL_TOL: f64 = 1e-5;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformError {
    #[error("degenerate point configuration (coincident or collinear points)")]
    Degenerate,
}

/// True when two points coincide or three are collinear.
pub fn is_degenerate_quad(pts: &[Point2<f32>; 4]) -> bool {
    let p: [[f64; 2]; 4] = pts.map(|q| [q.x as f64, q.y as f64]);
    if p.iter().flatten().any(|v| !v.is_finite()) {
        return true;
    }

    let mut scale = 0.0f64;
    for i in 0..4 {
        for j in (i + 1)..4 {
            scale = scale.max((p[i][0] - p[j][0]).hypot(p[i][1] - p[j][1]));
        }
    }
    if scale < 1e-9 {
        return true;
    }

    for i in 0..4 {
        for j in (i + 1)..4 {
            if (p[i][0] - p[j][0]).hypot(p[i][1] - p[j][1]) <= COINCIDENT_REL_TOL * scale {
                return true;
            }
        }
    }

    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|&[a, b, c]| {
        let cross = (p[b][0] - p[a][0]) * (p[c][1] - p[a][1])
            - (p[b][1] - p[a][1]) * (p[c][0] - p[a][0]);
        cross.abs() <= COLLINEAR_REL_TOL * scale * scale
    })
}

/// Exact homography mapping `markers[i]` onto `corners[i]`.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn estimate_transform(
    markers: &[Point2<f32>; 4],
    corners: &[Point2<f32>; 4],
) -> Result<Homography, TransformError> {
    if is_degenerate_quad(markers) || is_degenerate_quad(corners) {
        return Err(TransformError::Degenerate);
    }
    homography_from_4pt(markers, corners).ok_or(TransformError::Degenerate)
}

//! Ellipse fitting on boundary points.
//!
//! Direct least-squares conic fit (Fitzgibbon, Pilu and Fisher, 1999) with
//! Hartley-style point normalization, plus conversion from general conic
//! coefficients to geometric ellipse parameters.

use nalgebra::{DMatrix, Matrix3, Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// Reasons an ellipse fit can fail.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("point scatter is singular")]
    Singular,
    #[error("fitted conic is not a real ellipse")]
    NotAnEllipse,
}

/// General conic `A x² + B xy + C y² + D x + E y + F = 0`, stored as
/// `[A, B, C, D, E, F]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicCoeffs(pub [f64; 6]);

impl ConicCoeffs {
    pub fn algebraic_distance(&self, x: f64, y: f64) -> f64 {
        let [a, b, c, d, e, f] = self.0;
        a * x * x + b * x * y + c * y * y + d * x + e * y + f
    }

    /// `B² − 4AC < 0`.
    pub fn is_ellipse(&self) -> bool {
        let [a, b, c, ..] = self.0;
        b * b - 4.0 * a * c < 0.0
    }
}

/// Geometric ellipse parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub cx: f64,
    pub cy: f64,
    /// Semi-major axis.
    pub a: f64,
    /// Semi-minor axis.
    pub b: f64,
    /// Major axis direction from +x, radians in (−π/2, π/2].
    pub angle: f64,
}

impl Ellipse {
    pub fn is_valid(&self) -> bool {
        self.a > 0.0
            && self.b > 0.0
            && self.a.is_finite()
            && self.b.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.angle.is_finite()
    }

    /// Radius of the circle with the same area.
    pub fn mean_radius(&self) -> f64 {
        (self.a * self.b).sqrt()
    }

    /// `n` points evenly spaced in the parametric angle.
    pub fn sample_points(&self, n: usize) -> Vec<[f64; 2]> {
        let (sin_a, cos_a) = self.angle.sin_cos();
        (0..n)
            .map(|i| {
                let t = std::f64::consts::TAU * i as f64 / n as f64;
                let px = self.a * t.cos();
                let py = self.b * t.sin();
                [
                    self.cx + cos_a * px - sin_a * py,
                    self.cy + sin_a * px + cos_a * py,
                ]
            })
            .collect()
    }
}

/// Convert conic coefficients to geometric ellipse parameters.
///
/// Returns `None` for hyperbolas, parabolas, imaginary and point ellipses.
pub fn conic_to_ellipse(c: &ConicCoeffs) -> Option<Ellipse> {
    // Scale so the quadratic part is positive definite.
    let coeffs = if c.0[0] + c.0[2] < 0.0 {
        c.0.map(|v| -v)
    } else {
        c.0
    };
    let [a, b, c2, d, e, f] = coeffs;

    let denom = 4.0 * a * c2 - b * b;
    if denom <= 0.0 {
        return None;
    }

    // Center: gradient of the conic vanishes.
    let cx = (b * e - 2.0 * c2 * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    // Conic value at the center.
    let f0 = a * cx * cx + b * cx * cy + c2 * cy * cy + d * cx + e * cy + f;
    if f0.abs() < 1e-15 {
        return None;
    }

    let sum = a + c2;
    let diff = ((a - c2).powi(2) + b * b).sqrt();
    let l_big = (sum + diff) / 2.0;
    let l_small = (sum - diff) / 2.0;

    let minor_sq = -f0 / l_big;
    let major_sq = -f0 / l_small;
    if minor_sq <= 0.0 || major_sq <= 0.0 {
        return None;
    }

    // 0.5·atan2(B, A−C) is the direction of the `l_big` eigenvector, i.e.
    // the minor axis; the major axis is perpendicular.
    let minor_dir = 0.5 * b.atan2(a - c2);
    let angle = normalize_angle(minor_dir + std::f64::consts::FRAC_PI_2);

    let ellipse = Ellipse {
        cx,
        cy,
        a: major_sq.sqrt(),
        b: minor_sq.sqrt(),
        angle,
    };
    ellipse.is_valid().then_some(ellipse)
}

fn normalize_angle(mut angle: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, PI};
    while angle > FRAC_PI_2 {
        angle -= PI;
    }
    while angle <= -FRAC_PI_2 {
        angle += PI;
    }
    angle
}

/// Direct least-squares ellipse fit. Needs at least 6 points.
pub fn fit_ellipse_direct(points: &[[f64; 2]]) -> Option<(ConicCoeffs, Ellipse)> {
    try_fit_ellipse(points).ok()
}

/// Same as [`fit_ellipse_direct`] but reports why the fit failed.
pub fn try_fit_ellipse(points: &[[f64; 2]]) -> Result<(ConicCoeffs, Ellipse), FitError> {
    let n = points.len();
    if n < 6 {
        return Err(FitError::TooFewPoints { needed: 6, got: n });
    }

    let (mx, my, s) = normalization(points);

    // Design matrix rows [x², xy, y², x, y, 1] in normalized coordinates.
    let mut d = DMatrix::<f64>::zeros(n, 6);
    for (i, &[px, py]) in points.iter().enumerate() {
        let x = (px - mx) * s;
        let y = (py - my) * s;
        d[(i, 0)] = x * x;
        d[(i, 1)] = x * y;
        d[(i, 2)] = y * y;
        d[(i, 3)] = x;
        d[(i, 4)] = y;
        d[(i, 5)] = 1.0;
    }
    let scatter = d.transpose() * &d;

    let s11 = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s12 = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s22 = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    // Collinear points make the [x, y, 1] scatter rank-deficient.
    if s22.determinant().abs() <= 1e-10 * (n as f64).powi(3) {
        return Err(FitError::Singular);
    }
    let s22_inv = s22.try_inverse().ok_or(FitError::Singular)?;
    let reduced = s11 - s12 * s22_inv * s12.transpose();

    let a1 = constrained_eigenvector(&reduced).ok_or(FitError::NotAnEllipse)?;
    let a2 = -s22_inv * s12.transpose() * a1;

    let normalized = Vector6::new(a1[0], a1[1], a1[2], a2[0], a2[1], a2[2]);
    let conic = ConicCoeffs(denormalize(&normalized, mx, my, s));
    if !conic.is_ellipse() {
        return Err(FitError::NotAnEllipse);
    }
    let ellipse = conic_to_ellipse(&conic).ok_or(FitError::NotAnEllipse)?;
    Ok((conic, ellipse))
}

/// Centroid and scale so the mean distance from the centroid is √2.
fn normalization(points: &[[f64; 2]]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| (p[0] - mx).hypot(p[1] - my))
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (mx, my, s)
}

/// Undo `x' = s(x − mx), y' = s(y − my)` on conic coefficients.
fn denormalize(c: &Vector6<f64>, mx: f64, my: f64, s: f64) -> [f64; 6] {
    let (a, b, cc, d, e, f) = (c[0], c[1], c[2], c[3], c[4], c[5]);
    let s2 = s * s;
    [
        a * s2,
        b * s2,
        cc * s2,
        -2.0 * a * s2 * mx - b * s2 * my + d * s,
        -b * s2 * mx - 2.0 * cc * s2 * my + e * s,
        a * s2 * mx * mx + b * s2 * mx * my + cc * s2 * my * my - d * s * mx - e * s * my + f,
    ]
}

/// Fitzgibbon's constrained eigenproblem `M a = λ C₁ a` for the reduced
/// scatter `M`. Each real eigenvalue of `C₁⁻¹ M` yields a candidate; among
/// candidates with `aᵀ C₁ a > 0` the one with the smallest fit cost
/// `aᵀ M a / aᵀ C₁ a` wins.
fn constrained_eigenvector(reduced: &Matrix3<f64>) -> Option<Vector3<f64>> {
    // Ellipse constraint 4AC − B² as aᵀ C₁ a.
    let c1 = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);
    let c1_inv = Matrix3::new(0.0, 0.0, 0.5, 0.0, -1.0, 0.0, 0.5, 0.0, 0.0);
    let m = c1_inv * reduced;

    let trace = m.trace();
    let minors = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)] + m[(0, 0)] * m[(2, 2)]
        - m[(0, 2)] * m[(2, 0)]
        + m[(1, 1)] * m[(2, 2)]
        - m[(1, 2)] * m[(2, 1)];
    let det = m.determinant();

    // λ³ − tr λ² + minors λ − det = 0
    let mut best: Option<(f64, Vector3<f64>)> = None;
    for ev in real_cubic_roots(-trace, minors, -det) {
        let Some(v) = null_vector(&(m - Matrix3::identity() * ev)) else {
            continue;
        };
        let constraint = v.dot(&(c1 * v));
        if constraint <= 0.0 {
            continue;
        }
        let cost = v.dot(&(reduced * v)) / constraint;
        if best.is_none_or(|(b, _)| cost < b) {
            best = Some((cost, v));
        }
    }
    best.map(|(_, v)| v)
}

/// Null vector of a rank-2 3x3 matrix: the longest row of its adjugate.
fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let r0 = m.row(0).transpose();
    let r1 = m.row(1).transpose();
    let r2 = m.row(2).transpose();
    let best = [r1.cross(&r2), r2.cross(&r0), r0.cross(&r1)]
        .into_iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    let norm = best.norm();
    (norm > 1e-15).then(|| best / norm)
}

/// Real roots of the monic cubic `x³ + b x² + c x + d`.
fn real_cubic_roots(b: f64, c: f64, d: f64) -> Vec<f64> {
    use std::f64::consts::PI;

    // Depressed cubic t³ + p t + q with x = t − b/3.
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let shift = -b / 3.0;
    let disc = -4.0 * p * p * p - 27.0 * q * q;

    if disc >= 0.0 {
        let r = (-p / 3.0).max(0.0).sqrt();
        if r < 1e-15 {
            return vec![shift];
        }
        let theta = (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0).acos();
        (0..3)
            .map(|k| 2.0 * r * ((theta + 2.0 * PI * k as f64) / 3.0).cos() + shift)
            .collect()
    } else {
        let root = (q * q / 4.0 + p * p * p / 27.0).sqrt();
        vec![(-q / 2.0 + root).cbrt() + (-q / 2.0 - root).cbrt() + shift]
    }
}

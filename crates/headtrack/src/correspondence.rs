//! Marker-to-corner assignment.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// How markers are assigned to reference corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrespondenceStrategy {
    /// Each corner independently takes its nearest marker. Two corners can
    /// end up on the same marker.
    #[default]
    Greedy,
    /// The one-to-one assignment with the smallest total distance.
    Bijective,
}

/// Per reference corner: which marker it was matched to, that marker's
/// position and the distance between them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub marker_index: [usize; 4],
    pub points: [Point2<f32>; 4],
    pub distances: [f32; 4],
}

impl Correspondence {
    fn from_indices(
        marker_index: [usize; 4],
        markers: &[Point2<f32>; 4],
        corners: &[Point2<f32>; 4],
    ) -> Self {
        let points = marker_index.map(|i| markers[i]);
        let distances = std::array::from_fn(|k| (points[k] - corners[k]).norm());
        Self {
            marker_index,
            points,
            distances,
        }
    }

    /// True when no marker is used by more than one corner.
    pub fn is_bijective(&self) -> bool {
        let mut seen = [false; 4];
        for &i in &self.marker_index {
            if i >= seen.len() || seen[i] {
                return false;
            }
            seen[i] = true;
        }
        true
    }

    pub fn total_distance(&self) -> f32 {
        self.distances.iter().sum()
    }
}

/// Nearest candidate per corner. Ties keep the earliest candidate.
///
/// Returns `None` when `candidates` is empty.
pub fn match_greedy(
    corners: &[Point2<f32>; 4],
    candidates: &[Point2<f32>],
) -> Option<[usize; 4]> {
    let mut out = [0usize; 4];
    for (slot, corner) in out.iter_mut().zip(corners) {
        let mut best: Option<(usize, f32)> = None;
        for (idx, cand) in candidates.iter().enumerate() {
            let dist = (cand - corner).norm();
            if best.is_none_or(|(_, d)| dist < d) {
                best = Some((idx, dist));
            }
        }
        *slot = best?.0;
    }
    Some(out)
}

/// Minimum total distance permutation of the four markers.
///
/// Permutations are visited in lexicographic order and only a strictly
/// smaller total replaces the current best.
pub fn match_bijective(corners: &[Point2<f32>; 4], markers: &[Point2<f32>; 4]) -> [usize; 4] {
    let mut dist = [[0f32; 4]; 4];
    for (c, row) in corners.iter().zip(dist.iter_mut()) {
        for (m, d) in markers.iter().zip(row.iter_mut()) {
            *d = (m - c).norm();
        }
    }

    fn search(
        corner: usize,
        dist: &[[f32; 4]; 4],
        used: &mut [bool; 4],
        current: &mut [usize; 4],
        total: f32,
        best: &mut Option<(f32, [usize; 4])>,
    ) {
        if corner == 4 {
            if best.is_none_or(|(d, _)| total < d) {
                *best = Some((total, *current));
            }
            return;
        }
        for m in 0..4 {
            if used[m] {
                continue;
            }
            used[m] = true;
            current[corner] = m;
            search(corner + 1, dist, used, current, total + dist[corner][m], best);
            used[m] = false;
        }
    }

    let mut best = None;
    search(0, &dist, &mut [false; 4], &mut [0; 4], 0.0, &mut best);
    best.map_or([0, 1, 2, 3], |(_, perm)| perm)
}

/// Assign the four markers to the four corners with the given strategy.
pub fn resolve(
    corners: &[Point2<f32>; 4],
    markers: &[Point2<f32>; 4],
    strategy: CorrespondenceStrategy,
) -> Correspondence {
    let indices = match strategy {
        CorrespondenceStrategy::Greedy => {
            match_greedy(corners, markers).unwrap_or([0, 1, 2, 3])
        }
        CorrespondenceStrategy::Bijective => match_bijective(corners, markers),
    };
    Correspondence::from_indices(indices, markers, corners)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_corners() -> [Point2<f32>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 80.0),
            Point2::new(0.0, 80.0),
        ]
    }

    #[test]
    fn markers_on_corners_match_at_zero_distance() {
        let corners = frame_corners();
        let markers = [corners[2], corners[0], corners[3], corners[1]];
        let c = resolve(&corners, &markers, CorrespondenceStrategy::Greedy);
        assert_eq!(c.marker_index, [1, 3, 0, 2]);
        assert_eq!(c.distances, [0.0; 4]);
        assert_eq!(c.points, corners);
        assert!(c.is_bijective());
    }

    #[test]
    fn greedy_can_reuse_a_marker() {
        let corners = frame_corners();
        // Marker 2 is nearer to both right-hand corners than marker 1 is.
        let markers = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(100.0, 80.0),
            Point2::new(0.0, 80.0),
        ];
        let greedy = resolve(&corners, &markers, CorrespondenceStrategy::Greedy);
        assert_eq!(greedy.marker_index, [0, 2, 2, 3]);
        assert!(!greedy.is_bijective());

        let bijective = resolve(&corners, &markers, CorrespondenceStrategy::Bijective);
        assert_eq!(bijective.marker_index, [0, 1, 2, 3]);
        assert!(bijective.is_bijective());
        assert!((bijective.total_distance() - 90.0).abs() < 1e-4);
    }

    #[test]
    fn greedy_tie_keeps_earliest_marker() {
        let corners = frame_corners();
        let markers = [
            Point2::new(5.0, 0.0),
            Point2::new(0.0, 5.0),
            Point2::new(100.0, 80.0),
            Point2::new(0.0, 80.0),
        ];
        let idx = match_greedy(&corners, &markers).expect("candidates");
        assert_eq!(idx[0], 0);
    }

    #[test]
    fn greedy_without_candidates_is_none() {
        assert!(match_greedy(&frame_corners(), &[]).is_none());
    }

    #[test]
    fn bijective_recovers_shuffled_markers() {
        let corners = frame_corners();
        let markers = [
            Point2::new(97.0, 78.0),
            Point2::new(3.0, 82.0),
            Point2::new(2.0, 1.0),
            Point2::new(99.0, -2.0),
        ];
        assert_eq!(match_bijective(&corners, &markers), [2, 3, 0, 1]);
    }
}

//! Debug overlays. Nothing here feeds back into tracking.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing;

use crate::types::{AnnotationParams, Marker};

/// RGB copy of `frame` with each marker's fitted ellipse and circle drawn on it.
pub fn annotate(frame: &DynamicImage, markers: &[Marker], params: &AnnotationParams) -> RgbImage {
    let mut canvas = frame.to_rgb8();
    let ellipse_color = Rgb(params.ellipse_color);
    let circle_color = Rgb(params.circle_color);

    for marker in markers {
        if let Some(ellipse) = marker.ellipse.filter(|e| e.is_valid()) {
            let pts = ellipse.sample_points(params.ellipse_segments.max(3));
            for (i, p) in pts.iter().enumerate() {
                let q = pts[(i + 1) % pts.len()];
                drawing::draw_line_segment_mut(
                    &mut canvas,
                    (p[0] as f32, p[1] as f32),
                    (q[0] as f32, q[1] as f32),
                    ellipse_color,
                );
            }
        }

        let cx = marker.center.x.round() as i32;
        let cy = marker.center.y.round() as i32;
        let radius = marker.radius.round().max(1.0) as i32;
        drawing::draw_hollow_circle_mut(&mut canvas, (cx, cy), radius, circle_color);
        if params.draw_centers {
            drawing::draw_cross_mut(&mut canvas, circle_color, cx, cy);
        }
    }
    canvas
}

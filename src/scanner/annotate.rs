use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::models::{Detection, Point};

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const THICKNESS: i32 = 2;

/// Copy of `image` with a closed outline around every quadrilateral
/// detection. Other shapes are left undrawn.
pub fn annotate(image: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.clone();
    for detection in detections.iter().filter(|d| d.has_quad_outline()) {
        draw_closed_polygon(&mut canvas, &detection.polygon);
    }
    canvas
}

fn draw_closed_polygon(canvas: &mut RgbImage, points: &[Point]) {
    for (i, from) in points.iter().enumerate() {
        let to = points[(i + 1) % points.len()];
        for oy in 0..THICKNESS {
            for ox in 0..THICKNESS {
                let offset = |p: Point| {
                    (f64::from(p.x) + f64::from(ox), f64::from(p.y) + f64::from(oy))
                };
                let (start, end) = (offset(*from), offset(to));
                if let Some((start, end)) = clip_segment(start, end, canvas.dimensions()) {
                    draw_line_segment_mut(canvas, start, end, OUTLINE);
                }
            }
        }
    }
}

/// Liang-Barsky clip of a segment to the pixel grid of a `width` x `height`
/// canvas. Decoder coordinates are unbounded; only the visible part is walked.
fn clip_segment(
    start: (f64, f64),
    end: (f64, f64),
    (width, height): (u32, u32),
) -> Option<((f32, f32), (f32, f32))> {
    if width == 0 || height == 0 {
        return None;
    }
    let (max_x, max_y) = (f64::from(width - 1), f64::from(height - 1));
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);

    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-dx, start.0),
        (dx, max_x - start.0),
        (-dy, start.1),
        (dy, max_y - start.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let t = q / p;
            if p < 0.0 {
                t0 = t0.max(t);
            } else {
                t1 = t1.min(t);
            }
        }
    }
    if t0 > t1 {
        return None;
    }

    let at = |t: f64| {
        let x = (start.0 + t * dx).round().clamp(0.0, max_x);
        let y = (start.1 + t * dy).round().clamp(0.0, max_y);
        (x as f32, y as f32)
    };
    Some((at(t0), at(t1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SymbolKind;

    fn blank() -> RgbImage {
        RgbImage::new(20, 20)
    }

    #[test]
    fn quad_gets_a_closed_outline_on_a_copy() {
        let source = blank();
        let quad = Detection::new(SymbolKind::QrCode, "A")
            .with_polygon([(2, 2), (12, 2), (12, 12), (2, 12)]);
        let annotated = annotate(&source, &[quad]);

        assert_eq!(*annotated.get_pixel(2, 2), OUTLINE);
        assert_eq!(*annotated.get_pixel(7, 2), OUTLINE);
        assert_eq!(*annotated.get_pixel(7, 3), OUTLINE);
        assert_eq!(*annotated.get_pixel(13, 7), OUTLINE);
        assert_eq!(*annotated.get_pixel(7, 13), OUTLINE);
        assert_eq!(*annotated.get_pixel(7, 7), Rgb([0, 0, 0]));
        assert!(source.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn non_quad_shapes_are_not_drawn() {
        let triangle =
            Detection::new(SymbolKind::Ean13, "B").with_polygon([(1, 1), (9, 1), (5, 9)]);
        let bare = Detection::new(SymbolKind::Ean13, "C");
        let annotated = annotate(&blank(), &[triangle, bare]);
        assert_eq!(annotated, blank());
    }

    #[test]
    fn outline_is_clipped_to_the_frame() {
        let quad = Detection::new(SymbolKind::QrCode, "D")
            .with_polygon([(-5, 3), (25, 3), (25, 40), (-5, 40)]);
        let annotated = annotate(&blank(), &[quad]);

        assert_eq!(annotated.dimensions(), (20, 20));
        assert_eq!(*annotated.get_pixel(0, 3), OUTLINE);
        assert_eq!(*annotated.get_pixel(19, 4), OUTLINE);
        assert_eq!(*annotated.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn extreme_coordinates_draw_only_the_visible_part() {
        let quad = Detection::new(SymbolKind::QrCode, "E").with_polygon([
            (i32::MIN, 0),
            (i32::MAX, 0),
            (i32::MAX, 1),
            (i32::MIN, 1),
        ]);
        let annotated = annotate(&RgbImage::new(4, 4), &[quad]);

        for x in 0..4 {
            assert_eq!(*annotated.get_pixel(x, 0), OUTLINE);
            assert_eq!(*annotated.get_pixel(x, 2), OUTLINE);
            assert_eq!(*annotated.get_pixel(x, 3), Rgb([0, 0, 0]));
        }
    }

    #[test]
    fn quad_entirely_off_frame_leaves_the_copy_untouched() {
        let quad = Detection::new(SymbolKind::QrCode, "F").with_polygon([
            (1_000_000, 1_000_000),
            (2_000_000, 1_000_000),
            (2_000_000, 2_000_000),
            (1_000_000, 2_000_000),
        ]);
        assert_eq!(annotate(&blank(), &[quad]), blank());
    }

    #[test]
    fn clip_keeps_inside_segments_and_drops_outside_ones() {
        assert_eq!(
            clip_segment((1.0, 1.0), (5.0, 1.0), (10, 10)),
            Some(((1.0, 1.0), (5.0, 1.0)))
        );
        assert_eq!(
            clip_segment((-10.0, 2.0), (30.0, 2.0), (10, 10)),
            Some(((0.0, 2.0), (9.0, 2.0)))
        );
        assert_eq!(clip_segment((-10.0, -1.0), (30.0, -1.0), (10, 10)), None);
        assert_eq!(clip_segment((0.0, 0.0), (3.0, 3.0), (0, 5)), None);
    }
}

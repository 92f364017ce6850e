use image::DynamicImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::{debug, trace};

use crate::detector::DetectionRequest;
use crate::error::DetectionError;
use crate::geometry::NormalizedBox;

/// Finds convex quadrilaterals (documents, cards, signs) using Canny edges
/// and contour polygon approximation from `imageproc`.
///
/// Results are ordered largest first.
#[derive(Debug, Clone)]
pub struct RectanglesRequest {
    low_threshold: f32,
    high_threshold: f32,
    min_size: f64,
    max_results: usize,
}

impl Default for RectanglesRequest {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 100.0,
            min_size: 0.1,
            max_results: 8,
        }
    }
}

/// Two boxes overlapping more than this are reported once.
const DUPLICATE_IOU: f64 = 0.8;

impl RectanglesRequest {
    /// Request with the default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Canny hysteresis thresholds (default: 50 / 100).
    pub fn edge_thresholds(mut self, low: f32, high: f32) -> Self {
        self.low_threshold = low;
        self.high_threshold = high;
        self
    }

    /// Smallest accepted side, as a fraction of the shorter image side (default: 0.1).
    pub fn min_size(mut self, fraction: f64) -> Self {
        self.min_size = fraction;
        self
    }

    /// Upper bound on reported rectangles (default: 8).
    pub fn max_results(mut self, count: usize) -> Self {
        self.max_results = count;
        self
    }
}

impl DetectionRequest for RectanglesRequest {
    fn perform(&self, image: &DynamicImage) -> Result<Vec<NormalizedBox>, DetectionError> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let min_side = self.min_size * width.min(height) as f64;

        let edges = canny(&gray, self.low_threshold, self.high_threshold);
        let contours = find_contours::<i32>(&edges);

        let mut found: Vec<(f64, NormalizedBox)> = Vec::new();
        for contour in contours {
            if contour.border_type != BorderType::Outer || contour.points.len() < 4 {
                continue;
            }
            let perimeter = arc_length(&contour.points, true);
            if perimeter < 4.0 * min_side {
                continue;
            }
            let quad = approximate_polygon_dp(&contour.points, 0.02 * perimeter, true);
            if quad.len() != 4 || !is_convex(&quad) {
                continue;
            }

            let Some(bounds) = NormalizedBox::enclosing_top_left_points(
                quad.iter().map(|p| (p.x as f64, p.y as f64)),
                width,
                height,
            ) else {
                continue;
            };
            let (w_px, h_px) = (bounds.width * width as f64, bounds.height * height as f64);
            if w_px < min_side || h_px < min_side {
                continue;
            }
            if found.iter().any(|(_, b)| iou(b, &bounds) > DUPLICATE_IOU) {
                trace!(?bounds, "skipping duplicate quadrilateral");
                continue;
            }
            found.push((w_px * h_px, bounds));
        }

        found.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        found.truncate(self.max_results);
        debug!(rectangles = found.len(), "rectangle search finished");

        Ok(found.into_iter().map(|(_, b)| b).collect())
    }
}

fn is_convex(quad: &[Point<i32>]) -> bool {
    let n = quad.len();
    let mut sign = 0i64;
    for i in 0..n {
        let a = quad[i];
        let b = quad[(i + 1) % n];
        let c = quad[(i + 2) % n];
        let cross = (b.x - a.x) as i64 * (c.y - b.y) as i64 - (b.y - a.y) as i64 * (c.x - b.x) as i64;
        if cross == 0 {
            continue;
        }
        if sign == 0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    sign != 0
}

fn iou(a: &NormalizedBox, b: &NormalizedBox) -> f64 {
    let ix = (a.x + a.width).min(b.x + b.width) - a.x.max(b.x);
    let iy = (a.y + a.height).min(b.y + b.height) - a.y.max(b.y);
    if ix <= 0.0 || iy <= 0.0 {
        return 0.0;
    }
    let inter = ix * iy;
    inter / (a.width * a.height + b.width * b.height - inter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn finds_drawn_rectangle() {
        let mut gray = GrayImage::from_pixel(200, 160, Luma([255]));
        draw_filled_rect_mut(&mut gray, Rect::at(40, 30).of_size(100, 80), Luma([0]));
        let image = DynamicImage::ImageLuma8(gray);

        let boxes = RectanglesRequest::new().perform(&image).unwrap();
        assert!(!boxes.is_empty(), "expected a rectangle");

        let rect = boxes[0].to_pixel_rect(200, 160);
        let near = |a: f64, b: f64| (a - b).abs() <= 4.0;
        assert!(
            near(rect.x, 40.0) && near(rect.y, 30.0) && near(rect.width, 100.0) && near(rect.height, 80.0),
            "unexpected bounds {rect:?}"
        );
    }

    #[test]
    fn flat_image_has_no_rectangles() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([128])));
        assert!(RectanglesRequest::new().perform(&image).unwrap().is_empty());
    }

    #[test]
    fn small_shapes_are_ignored() {
        let mut gray = GrayImage::from_pixel(200, 200, Luma([255]));
        draw_filled_rect_mut(&mut gray, Rect::at(10, 10).of_size(8, 8), Luma([0]));
        let image = DynamicImage::ImageLuma8(gray);
        assert!(RectanglesRequest::new().perform(&image).unwrap().is_empty());
    }

    #[test]
    fn convexity() {
        let square = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10), Point::new(0, 10)];
        assert!(is_convex(&square));
        let dart = [Point::new(0, 0), Point::new(10, 5), Point::new(0, 10), Point::new(3, 5)];
        assert!(!is_convex(&dart));
    }

    #[test]
    fn overlap() {
        let a = NormalizedBox::new(0.0, 0.0, 0.5, 0.5);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-12);
        assert_eq!(iou(&a, &NormalizedBox::new(0.6, 0.6, 0.2, 0.2)), 0.0);
    }
}

//! Conversion of detector output into pixel-space crop rectangles.
//!
//! Detectors report boxes as fractions of the image size with the origin in
//! the bottom-left corner. Images are addressed from the top-left corner in
//! whole pixels, so every box goes through three steps before cropping:
//! flip and scale ([`NormalizedBox::to_pixel_rect`]), pad
//! ([`CropRect::expanded`]) and clamp ([`CropRect::clamp_to`]).

use std::ops::Neg;

/// Values this close to a whole pixel are treated as that pixel.
const PIXEL_SNAP_EPSILON: f64 = 1e-6;

/// Bounding box in fractions of the image size, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormalizedBox {
    /// Left edge as a fraction of the image width.
    pub x: f64,
    /// Bottom edge as a fraction of the image height.
    pub y: f64,
    /// Width as a fraction of the image width.
    pub width: f64,
    /// Height as a fraction of the image height.
    pub height: f64,
}

impl NormalizedBox {
    /// Create a box from fractional coordinates.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalize pixel bounds whose origin is the bottom-left corner.
    pub fn from_bottom_left_pixels(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let (w, h) = (image_width as f64, image_height as f64);
        Self {
            x: x / w,
            y: y / h,
            width: width / w,
            height: height / h,
        }
    }

    /// Normalize pixel bounds whose origin is the top-left corner.
    pub fn from_top_left_pixels(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let flipped_y = image_height as f64 - (y + height);
        Self::from_bottom_left_pixels(x, flipped_y, width, height, image_width, image_height)
    }

    /// Axis-aligned bounds of a set of top-left-origin pixel points.
    ///
    /// Returns `None` for an empty point set.
    pub fn enclosing_top_left_points<I>(points: I, image_width: u32, image_height: u32) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut points = points.into_iter();
        let (first_x, first_y) = points.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first_x, first_y, first_x, first_y);
        for (x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self::from_top_left_pixels(
            min_x,
            min_y,
            max_x - min_x,
            max_y - min_y,
            image_width,
            image_height,
        ))
    }

    /// Scale to pixels and flip into top-left-origin image coordinates.
    pub fn to_pixel_rect(&self, image_width: u32, image_height: u32) -> CropRect {
        let (w, h) = (image_width as f64, image_height as f64);
        let width = self.width * w;
        let height = self.height * h;
        CropRect {
            x: self.x * w,
            y: (1.0 - self.y) * h - height,
            width,
            height,
        }
    }
}

/// Pixel insets applied around a detected box before cropping.
///
/// Positive values grow the crop outward. The geometry accepts negative
/// values, which shrink it; the cropper itself only accepts non-negative
/// padding (see [`Padding::is_valid`]).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Padding {
    /// Pixels added above the box.
    pub top: f64,
    /// Pixels added left of the box.
    pub left: f64,
    /// Pixels added below the box.
    pub bottom: f64,
    /// Pixels added right of the box.
    pub right: f64,
}

impl Padding {
    /// No padding.
    pub const ZERO: Padding = Padding {
        top: 0.0,
        left: 0.0,
        bottom: 0.0,
        right: 0.0,
    };

    /// Padding with individual insets.
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// The same inset on all four sides.
    pub fn uniform(inset: f64) -> Self {
        Self::new(inset, inset, inset, inset)
    }

    /// True when every inset is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.top, self.left, self.bottom, self.right]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Neg for Padding {
    type Output = Padding;

    fn neg(self) -> Padding {
        Padding::new(-self.top, -self.left, -self.bottom, -self.right)
    }
}

/// Unclamped pixel rectangle, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    /// Left edge in pixels.
    pub x: f64,
    /// Top edge in pixels.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl CropRect {
    /// Grow the rectangle outward by `padding`.
    pub fn expanded(self, padding: Padding) -> Self {
        Self {
            x: self.x - padding.left,
            y: self.y - padding.top,
            width: self.width + padding.left + padding.right,
            height: self.height + padding.top + padding.bottom,
        }
    }

    /// Intersect with the image and snap outward to whole pixels.
    ///
    /// Returns `None` when nothing of the rectangle lies inside the image or
    /// any coordinate is not finite.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<CropRegion> {
        let edges = [self.x, self.y, self.width, self.height];
        if !edges.iter().all(|v| v.is_finite()) {
            return None;
        }

        let left = snap(self.x).floor().max(0.0);
        let top = snap(self.y).floor().max(0.0);
        let right = snap(self.x + self.width).ceil().min(image_width as f64);
        let bottom = snap(self.y + self.height).ceil().min(image_height as f64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(CropRegion {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Crop region within the source image, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CropRegion {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CropRegion {
    /// The region covering a whole image.
    pub fn full(image_width: u32, image_height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: image_width,
            height: image_height,
        }
    }
}

fn snap(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < PIXEL_SNAP_EPSILON {
        nearest
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rect_close(actual: CropRect, expected: (f64, f64, f64, f64)) {
        let (x, y, w, h) = expected;
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert!(
            close(actual.x, x) && close(actual.y, y) && close(actual.width, w) && close(actual.height, h),
            "expected ({x}, {y}, {w}, {h}), got {actual:?}"
        );
    }

    #[test]
    fn transform_flips_bottom_left_origin() {
        let rect = NormalizedBox::new(0.1, 0.1, 0.2, 0.25).to_pixel_rect(1000, 800);
        assert_rect_close(rect, (100.0, 520.0, 200.0, 200.0));
    }

    #[test]
    fn padding_expands_every_side() {
        let rect = NormalizedBox::new(0.1, 0.1, 0.2, 0.25)
            .to_pixel_rect(1000, 800)
            .expanded(Padding::uniform(10.0));
        assert_rect_close(rect, (90.0, 510.0, 220.0, 220.0));
    }

    #[test]
    fn asymmetric_padding() {
        let rect = NormalizedBox::new(0.5, 0.5, 0.1, 0.1)
            .to_pixel_rect(100, 100)
            .expanded(Padding::new(1.0, 2.0, 3.0, 4.0));
        // origin (50, 40) size 10x10 before padding
        assert_rect_close(rect, (48.0, 39.0, 16.0, 14.0));
    }

    #[test]
    fn transform_is_deterministic() {
        let b = NormalizedBox::new(0.123, 0.456, 0.333, 0.111);
        assert_eq!(b.to_pixel_rect(641, 479), b.to_pixel_rect(641, 479));
    }

    #[test]
    fn negative_padding_undoes_padding() {
        let base = NormalizedBox::new(0.2, 0.3, 0.4, 0.1).to_pixel_rect(640, 480);
        let padding = Padding::new(5.0, 7.0, 11.0, 13.0);
        let restored = base.expanded(padding).expanded(-padding);
        assert_rect_close(restored, (base.x, base.y, base.width, base.height));
    }

    #[test]
    fn clamp_keeps_inner_rect() {
        let region = NormalizedBox::new(0.1, 0.1, 0.2, 0.25)
            .to_pixel_rect(1000, 800)
            .clamp_to(1000, 800)
            .unwrap();
        assert_eq!(
            region,
            CropRegion {
                x: 100,
                y: 520,
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn clamp_trims_overhang() {
        let rect = CropRect {
            x: -20.0,
            y: 90.0,
            width: 50.0,
            height: 40.0,
        };
        assert_eq!(
            rect.clamp_to(100, 100),
            Some(CropRegion {
                x: 0,
                y: 90,
                width: 30,
                height: 10
            })
        );
    }

    #[test]
    fn clamp_snaps_outward_to_whole_pixels() {
        let rect = CropRect {
            x: 10.4,
            y: 20.6,
            width: 5.2,
            height: 5.0,
        };
        assert_eq!(
            rect.clamp_to(100, 100),
            Some(CropRegion {
                x: 10,
                y: 20,
                width: 6,
                height: 6
            })
        );
    }

    #[test]
    fn clamp_rejects_rect_outside_image() {
        let rect = CropRect {
            x: 150.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
        };
        assert_eq!(rect.clamp_to(100, 100), None);
    }

    #[test]
    fn clamp_rejects_inverted_and_non_finite_rects() {
        let inverted = CropRect {
            x: 10.0,
            y: 10.0,
            width: -5.0,
            height: 5.0,
        };
        assert_eq!(inverted.clamp_to(100, 100), None);

        let nan = CropRect {
            x: f64::NAN,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        assert_eq!(nan.clamp_to(100, 100), None);
    }

    #[test]
    fn top_left_pixels_round_trip_through_transform() {
        let b = NormalizedBox::from_top_left_pixels(30.0, 40.0, 20.0, 10.0, 200, 100);
        assert_rect_close(b.to_pixel_rect(200, 100), (30.0, 40.0, 20.0, 10.0));
    }

    #[test]
    fn enclosing_points_builds_bounds() {
        let b = NormalizedBox::enclosing_top_left_points(
            [(10.0, 5.0), (30.0, 8.0), (28.0, 25.0), (12.0, 22.0)],
            100,
            50,
        )
        .unwrap();
        assert_rect_close(b.to_pixel_rect(100, 50), (10.0, 5.0, 20.0, 20.0));
        assert!(NormalizedBox::enclosing_top_left_points(Vec::new(), 100, 50).is_none());
    }

    #[test]
    fn padding_validation() {
        assert!(Padding::ZERO.is_valid());
        assert!(Padding::uniform(3.5).is_valid());
        assert!(!Padding::new(-1.0, 0.0, 0.0, 0.0).is_valid());
        assert!(!Padding::uniform(f64::INFINITY).is_valid());
    }
}

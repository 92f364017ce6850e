use image::DynamicImage;
use tracing::{debug, trace, warn};

use crate::error::DetectionError;
use crate::geometry::{CropRegion, NormalizedBox, Padding};
use crate::{CropResult, CroppedRegion};

/// Crop every box out of `image`.
///
/// Each box is flipped into image coordinates, padded, and clamped to the
/// image bounds. Boxes that end up with no area inside the image are
/// skipped; the rest keep their input order.
pub fn crop_regions(image: &DynamicImage, boxes: &[NormalizedBox], padding: Padding) -> Vec<CroppedRegion> {
    let (width, height) = (image.width(), image.height());

    boxes
        .iter()
        .filter_map(|b| {
            let rect = b.to_pixel_rect(width, height).expanded(padding);
            match rect.clamp_to(width, height) {
                Some(region) => {
                    trace!(?b, ?region, "cropping region");
                    Some(CroppedRegion {
                        image: image.crop_imm(region.x, region.y, region.width, region.height),
                        region,
                    })
                }
                None => {
                    warn!(?b, ?rect, width, height, "box lies outside the image, skipped");
                    None
                }
            }
        })
        .collect()
}

/// Turn a detector outcome into a [`CropResult`].
pub(crate) fn extract(
    image: DynamicImage,
    detection: Result<Vec<NormalizedBox>, DetectionError>,
    padding: Padding,
) -> CropResult {
    let rect = CropRegion::full(image.width(), image.height());

    let boxes = match detection {
        Ok(boxes) => boxes,
        Err(error) => {
            debug!(%error, "detection failed");
            return CropResult::Failure { image, rect, error };
        }
    };

    let regions = crop_regions(&image, &boxes, padding);
    debug!(boxes = boxes.len(), regions = regions.len(), "regions extracted");
    if regions.is_empty() {
        CropResult::NotFound { image, rect }
    } else {
        CropResult::Success(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x % 256) as u8, (y % 256) as u8, 7]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn crops_match_pixel_rect() {
        let image = gradient(1000, 800);
        let regions = crop_regions(&image, &[NormalizedBox::new(0.1, 0.1, 0.2, 0.25)], Padding::ZERO);

        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(
            region.region,
            CropRegion {
                x: 100,
                y: 520,
                width: 200,
                height: 200
            }
        );
        assert_eq!((region.image.width(), region.image.height()), (200, 200));
        // top-left pixel of the crop comes from (100, 520) in the source
        let rgb = region.image.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([100, (520 % 256) as u8, 7]));
    }

    #[test]
    fn padding_grows_crop() {
        let image = gradient(1000, 800);
        let regions = crop_regions(
            &image,
            &[NormalizedBox::new(0.1, 0.1, 0.2, 0.25)],
            Padding::uniform(10.0),
        );
        assert_eq!(
            regions[0].region,
            CropRegion {
                x: 90,
                y: 510,
                width: 220,
                height: 220
            }
        );
    }

    #[test]
    fn padding_past_the_edge_is_clamped() {
        let image = gradient(100, 100);
        let regions = crop_regions(
            &image,
            &[NormalizedBox::new(0.0, 0.0, 0.5, 0.5)],
            Padding::uniform(25.0),
        );
        assert_eq!(
            regions[0].region,
            CropRegion {
                x: 0,
                y: 25,
                width: 75,
                height: 75
            }
        );
    }

    #[test]
    fn boxes_outside_image_are_skipped() {
        let image = gradient(100, 100);
        let boxes = [
            NormalizedBox::new(1.5, 0.2, 0.2, 0.2),
            NormalizedBox::new(0.2, 0.2, 0.2, 0.2),
        ];
        let regions = crop_regions(&image, &boxes, Padding::ZERO);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].region.x, 20);
    }

    #[test]
    fn extract_without_boxes_is_not_found() {
        let result = extract(gradient(64, 48), Ok(Vec::new()), Padding::ZERO);
        match result {
            CropResult::NotFound { image, rect } => {
                assert_eq!(rect, CropRegion::full(64, 48));
                assert_eq!(image.width(), 64);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn extract_keeps_detector_error() {
        let result = extract(
            gradient(64, 48),
            Err(DetectionError::Backend("engine offline".into())),
            Padding::ZERO,
        );
        match result {
            CropResult::Failure { rect, error, .. } => {
                assert_eq!(rect, CropRegion::full(64, 48));
                assert!(matches!(error, DetectionError::Backend(ref m) if m == "engine offline"));
            }
            other => panic!("expected Failure, got {other:?}"),
        }
    }
}

use image::DynamicImage;
use tracing::debug;

use crate::detector::DetectionRequest;
use crate::error::DetectionError;
use crate::geometry::NormalizedBox;

/// Locates QR codes with the `rqrr` grid finder.
///
/// Only the finder-pattern geometry is used; payloads are not decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarcodesRequest;

impl DetectionRequest for BarcodesRequest {
    fn perform(&self, image: &DynamicImage) -> Result<Vec<NormalizedBox>, DetectionError> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                gray.get_pixel(x as u32, y as u32)[0]
            });
        let grids = prepared.detect_grids();
        debug!(grids = grids.len(), "rqrr grid search finished");

        Ok(grids
            .iter()
            .filter_map(|grid| {
                NormalizedBox::enclosing_top_left_points(
                    grid.bounds.iter().map(|p| (p.x as f64, p.y as f64)),
                    width,
                    height,
                )
            })
            .collect())
    }
}

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageEncoder, RgbImage, RgbaImage};

use crate::error::CropError;

/// Encoding used by [`crate::CroppedRegion::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum OutputFormat {
    /// Lossless PNG, alpha preserved.
    #[default]
    Png,

    /// JPEG at `quality` between 0.0 and 1.0; alpha is flattened onto white.
    Jpeg {
        /// Encoder quality, 0.0 to 1.0.
        quality: f32,
    },

    /// Lossless WebP, alpha preserved.
    Webp,
}

/// Decode input bytes into a `DynamicImage`.
pub(crate) fn decode_image(input: &[u8]) -> Result<DynamicImage, CropError> {
    image::load_from_memory(input).map_err(|e| CropError::DecodeError(e.to_string()))
}

/// Flatten alpha channel by compositing onto a white background.
pub(crate) fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba: RgbaImage = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let over_white = |c: u8| (c as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([over_white(r), over_white(g), over_white(b)]));
    }
    rgb
}

/// Encode a cropped region in `format`.
pub(crate) fn encode_image(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, CropError> {
    let mut buffer = Vec::new();
    let rgba = image.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buffer)
                .write_image(rgba.as_raw(), width, height, image::ExtendedColorType::Rgba8)
                .map_err(|e| CropError::EncodeError(e.to_string()))?;
        }
        OutputFormat::Webp => {
            WebPEncoder::new_lossless(&mut buffer)
                .write_image(rgba.as_raw(), width, height, image::ExtendedColorType::Rgba8)
                .map_err(|e| CropError::EncodeError(e.to_string()))?;
        }
        OutputFormat::Jpeg { quality } => {
            if !(0.0..=1.0).contains(&quality) {
                return Err(CropError::InvalidQuality(quality));
            }
            let rgb = flatten_alpha(image);
            let quality_percent = ((quality * 100.0).round() as u8).max(1);
            JpegEncoder::new_with_quality(&mut buffer, quality_percent)
                .write_image(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
                .map_err(|e| CropError::EncodeError(e.to_string()))?;
        }
    }

    Ok(buffer)
}

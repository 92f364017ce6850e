//! Detect objects in an image and write every crop next to it.
//!
//! Usage:
//!   cargo run --example crop_objects -- <image> [face|barcode|text|rectangle] [padding]
//!
//! Face detection needs a SeetaFace model:
//!   IMAGECROPPER_FACE_MODEL=model/seeta_fd_frontal_v1.0.bin cargo run --example crop_objects -- photo.jpg

use std::path::Path;

use imagecropper::{CropResult, DetectionKind, ImageCropper, OutputFormat, Padding};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input_path) = args.next() else {
        eprintln!("usage: crop_objects <image> [face|barcode|text|rectangle] [padding]");
        std::process::exit(2);
    };
    let kind: DetectionKind = args
        .next()
        .map(|s| s.parse().unwrap_or_else(|e| panic!("{e}")))
        .unwrap_or_default();
    let padding = args
        .next()
        .map(|s| s.parse::<f64>().expect("padding must be a number"))
        .unwrap_or(0.0);

    let input = std::fs::read(&input_path).unwrap();
    let cropper = ImageCropper::from_bytes(&input)
        .unwrap()
        .padding(Padding::uniform(padding))
        .unwrap();

    match cropper.crop(kind) {
        CropResult::Success(regions) => {
            let stem = Path::new(&input_path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("crop");
            for (i, region) in regions.iter().enumerate() {
                let out = format!("{stem}_{kind}_{i}.png");
                std::fs::write(&out, region.encode(OutputFormat::Png).unwrap()).unwrap();
                info!(path = %out, region = ?region.region, "wrote crop");
            }
        }
        CropResult::NotFound { rect, .. } => {
            info!(kind = %kind, width = rect.width, height = rect.height, "nothing found");
        }
        CropResult::Failure { error, .. } => {
            error!(%error, "detection failed");
            std::process::exit(1);
        }
    }
}

//! Image optimization.
//!
//! Each source image is processed independently on the rayon pool:
//!
//! | Format     | Treatment                                       |
//! |------------|-------------------------------------------------|
//! | PNG        | re-encoded, best compression, adaptive filter   |
//! | JPEG       | re-encoded at `[images] jpeg_quality`           |
//! | SVG        | cleaned (see [`super::svg`])                    |
//! | GIF, ICO, WebP | copied                                      |
//!
//! An optimized file that comes out larger than its source is replaced by
//! the source bytes.

use std::fs;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use rayon::prelude::*;

use super::svg::{self, CleanOptions};
use super::{StepContext, StepError, StepId, StepReport, TransformStep, mirrored};
use crate::core::AssetKind;
use crate::reload::Refresh;
use crate::utils::fs::write_file;
use crate::debug;

pub struct ImageStep;

impl TransformStep for ImageStep {
    fn id(&self) -> StepId {
        StepId::Images
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::Image]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Page)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let sources = ctx.paths.sources(AssetKind::Image);
        let base = ctx.paths.source_base(AssetKind::Image);
        let out_dir = ctx.paths.output_dir(AssetKind::Image);
        let quality = ctx.config.images.jpeg_quality;

        let written = sources
            .par_iter()
            .map(|source| {
                let target = mirrored(source, &base, &out_dir);
                let input = fs::read(source).map_err(|e| StepError::io(source, e))?;

                let optimized = optimize(source, &input, quality)
                    .map_err(|e| StepError::tool("image", format!("{}: {e}", ctx.display(source))))?;
                let bytes = match optimized {
                    Some(bytes) if bytes.len() < input.len() => bytes,
                    Some(_) => {
                        debug!("images"; "kept original {}", ctx.display(source));
                        input
                    }
                    None => input,
                };

                write_file(&target, bytes).map_err(|e| StepError::io(&target, e))?;
                Ok(target)
            })
            .collect::<Result<Vec<_>, StepError>>()?;

        Ok(StepReport {
            written,
            ..StepReport::default()
        })
    }
}

/// Optimized bytes for a file, or `None` when the format is copied as is.
fn optimize(path: &Path, input: &[u8], jpeg_quality: u8) -> Result<Option<Vec<u8>>, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => encode_png(input).map(Some),
        "jpg" | "jpeg" => encode_jpeg(input, jpeg_quality).map(Some),
        "svg" => {
            let text = std::str::from_utf8(input).map_err(|e| e.to_string())?;
            let mut doc = svg::clean(text, CleanOptions::default())?;
            if doc.has_redundant_view_box() {
                doc.remove_attr("viewBox");
            }
            Ok(Some(doc.to_document().into_bytes()))
        }
        _ => Ok(None),
    }
}

fn decode(input: &[u8], format: ImageFormat) -> Result<DynamicImage, String> {
    image::load_from_memory_with_format(input, format).map_err(|e| e.to_string())
}

fn encode_png(input: &[u8]) -> Result<Vec<u8>, String> {
    let img = decode(input, ImageFormat::Png)?;
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder).map_err(|e| e.to_string())?;
    Ok(buf)
}

fn encode_jpeg(input: &[u8], quality: u8) -> Result<Vec<u8>, String> {
    let img = decode(input, ImageFormat::Jpeg)?;
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

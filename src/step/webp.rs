//! WebP siblings for optimized raster images.
//!
//! Reads the Image step's *output*, so it is ordered after it.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::codecs::webp::WebPEncoder;
use rayon::prelude::*;

use super::tool::{Vars, run_tool};
use super::{StepContext, StepError, StepId, StepReport, TransformStep};
use crate::core::AssetKind;
use crate::paths::{compile_glob_nocase, walk_matching};
use crate::reload::Refresh;
use crate::utils::fs::write_file;

const RASTER_GLOB: &str = "**/*.{png,jpg,jpeg}";

pub struct WebpStep;

impl TransformStep for WebpStep {
    fn id(&self) -> StepId {
        StepId::Webp
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::Image]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Page)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let out_dir = ctx.paths.output_dir(AssetKind::Image);
        let matcher = compile_glob_nocase(RASTER_GLOB)?;
        let rasters = walk_matching(&out_dir, Path::new(""), &matcher, None);

        let written = rasters
            .par_iter()
            .map(|raster| {
                let target = raster.with_extension("webp");
                match &ctx.config.tools.webp {
                    Some(tool) => {
                        let vars = Vars::new(ctx)
                            .input(raster)
                            .output(&target)
                            .quality(ctx.config.images.webp_quality);
                        run_tool("webp", tool, ctx, &vars, None)?;
                    }
                    None => encode_builtin(ctx, raster, &target)?,
                }
                Ok(target)
            })
            .collect::<Result<Vec<PathBuf>, StepError>>()?;

        Ok(StepReport {
            written,
            ..StepReport::default()
        })
    }
}

/// Lossless encode with the image crate.
fn encode_builtin(ctx: &StepContext, raster: &Path, target: &Path) -> Result<(), StepError> {
    let failed = |e: image::ImageError| StepError::tool("webp", format!("{}: {e}", ctx.display(raster)));

    let img = image::open(raster).map_err(failed)?;
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img.to_rgba8())
        .write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        .map_err(failed)?;
    write_file(target, buf).map_err(|e| StepError::io(target, e))
}

//! Icon sprite: every icon becomes a `<symbol>` of one SVG file.

use std::fs;
use std::path::Path;

use quick_xml::escape::{escape, unescape};

use super::svg::{self, CleanOptions};
use super::{StepContext, StepError, StepId, StepReport, TransformStep};
use crate::core::AssetKind;
use crate::reload::Refresh;
use crate::utils::fs::write_file;
use crate::debug;

pub const SPRITE_FILE: &str = "sprite.svg";

pub struct SpriteStep;

impl TransformStep for SpriteStep {
    fn id(&self) -> StepId {
        StepId::Sprite
    }

    fn inputs(&self) -> &'static [AssetKind] {
        &[AssetKind::Icon]
    }

    fn refresh(&self) -> Option<Refresh> {
        Some(Refresh::Page)
    }

    fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let mut report = StepReport::default();
        let icons = ctx.paths.sources(AssetKind::Icon);
        if icons.is_empty() {
            debug!("sprite"; "no icons matched {}", ctx.paths.get(AssetKind::Icon).source);
            return Ok(report);
        }

        let base = ctx.paths.source_base(AssetKind::Icon);
        let mut sprite = String::from(r#"<svg xmlns="http://www.w3.org/2000/svg">"#);

        for icon in &icons {
            let text = fs::read_to_string(icon).map_err(|e| StepError::io(icon, e))?;
            let doc = svg::clean(&text, CleanOptions { strip_paint: true })
                .map_err(|e| StepError::tool("sprite", format!("{}: {e}", ctx.display(icon))))?;

            let id = symbol_id(icon, &base);
            let id = escape(&id);
            match doc.view_box() {
                Some(view_box) => {
                    // source values are as written; normalize before quoting
                    let view_box = match unescape(&view_box) {
                        Ok(text) => escape(&*text).into_owned(),
                        Err(_) => escape(&view_box).into_owned(),
                    };
                    sprite.push_str(&format!(r#"<symbol id="{id}" viewBox="{view_box}">"#));
                }
                None => {
                    report.warn(format!("{}: no viewBox or size", ctx.display(icon)));
                    sprite.push_str(&format!(r#"<symbol id="{id}">"#));
                }
            }
            sprite.push_str(&doc.children);
            sprite.push_str("</symbol>");
        }
        sprite.push_str("</svg>");

        let target = ctx.paths.output_dir(AssetKind::Icon).join(SPRITE_FILE);
        write_file(&target, sprite).map_err(|e| StepError::io(&target, e))?;
        report.wrote(target);
        Ok(report)
    }
}

/// Symbol id: the icon's path below the icon root, without extension,
/// with separators turned into `-`.
fn symbol_id(icon: &Path, base: &Path) -> String {
    let relative = icon.strip_prefix(base).unwrap_or(icon).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("-")
}

//! Stylesheet post-processing with lightningcss.
//!
//! Compiled Sass output is parsed once and printed with vendor prefixes for
//! the configured browserslist targets. Production output additionally
//! groups media queries at the end of the sheet and gets a minified twin.

use lightningcss::media_query::MediaList;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::ToCss;

const SOURCE_MAP_MARKER: &str = "/*# sourceMappingURL=";

/// Prefixing targets for a browserslist query.
pub fn targets(queries: &[String]) -> Result<Targets, String> {
    let browsers = Browsers::from_browserslist(queries).map_err(|e| e.to_string())?;
    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub targets: Targets,
    /// Move `@media` blocks to the end, merging identical queries.
    pub group_media: bool,
    /// Also print a minified variant.
    pub minified: bool,
}

#[derive(Debug, Default)]
pub struct Processed {
    pub code: String,
    pub minified: Option<String>,
}

/// Prefix a compiled stylesheet. Errors carry the parser's message.
pub fn process(source: &str, filename: &str, options: Options) -> Result<Processed, String> {
    let (css, source_map) = split_source_map(source);

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;

    if options.group_media {
        group_media_queries(&mut sheet.rules.0);
    }

    sheet
        .minify(MinifyOptions {
            targets: options.targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let print = |minify| {
        sheet
            .to_css(PrinterOptions {
                minify,
                targets: options.targets,
                ..PrinterOptions::default()
            })
            .map(|out| out.code)
            .map_err(|e| e.to_string())
    };

    let mut code = print(false)?;
    if let Some(comment) = source_map {
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(comment);
        code.push('\n');
    }
    let minified = options.minified.then(|| print(true)).transpose()?;

    Ok(Processed { code, minified })
}

/// Split a trailing source-map comment off the stylesheet.
fn split_source_map(source: &str) -> (&str, Option<&str>) {
    match source.rfind(SOURCE_MAP_MARKER) {
        Some(start) => (&source[..start], Some(source[start..].trim_end())),
        None => (source, None),
    }
}

/// Key identifying a media query list.
fn media_key(query: &MediaList<'_>) -> String {
    query.to_css_string(PrinterOptions::default()).unwrap_or_default()
}

fn group_media_queries(rules: &mut Vec<CssRule<'_>>) {
    let mut kept = Vec::with_capacity(rules.len());
    let mut grouped: Vec<(String, CssRule<'_>)> = Vec::new();

    for rule in rules.drain(..) {
        match rule {
            CssRule::Media(media) => {
                let key = media_key(&media.query);
                match grouped.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, CssRule::Media(existing))) => existing.rules.0.extend(media.rules.0),
                    _ => grouped.push((key, CssRule::Media(media))),
                }
            }
            other => kept.push(other),
        }
    }

    kept.extend(grouped.into_iter().map(|(_, rule)| rule));
    *rules = kept;
}

//! SVG cleanup with quick-xml.
//!
//! Splits a document into its root `<svg>` attributes and serialized
//! children, dropping what browsers never need:
//!
//! - XML declaration, processing instructions, doctype, comments
//! - `<metadata>` and editor elements (`sodipodi:*`, `inkscape:*`)
//! - editor attributes and their namespace declarations
//! - whitespace-only text
//!
//! Icons for the sprite additionally lose their paint attributes so the
//! sprite can be colored from CSS.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

const EDITOR_PREFIXES: &[&[u8]] = &[b"sodipodi:", b"inkscape:"];
const EDITOR_NAMESPACES: &[&[u8]] = &[
    b"xmlns:sodipodi",
    b"xmlns:inkscape",
    b"xmlns:rdf",
    b"xmlns:cc",
    b"xmlns:dc",
];
const PAINT_ATTRIBUTES: &[&[u8]] = &[b"fill", b"stroke", b"style"];

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Drop `fill`, `stroke` and `style` from every element.
    pub strip_paint: bool,
}

/// A cleaned SVG document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Svg {
    /// Root attributes, values as written in the source.
    pub attributes: Vec<(String, String)>,
    /// Serialized children of the root element.
    pub children: String,
}

impl Svg {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
    }

    /// Explicit `viewBox`, or one derived from `width` and `height`.
    pub fn view_box(&self) -> Option<String> {
        if let Some(view_box) = self.attr("viewBox") {
            return Some(view_box.to_string());
        }
        let width = length(self.attr("width")?)?;
        let height = length(self.attr("height")?)?;
        Some(format!("0 0 {width} {height}"))
    }

    /// Whether the root `viewBox` only restates `width` and `height`.
    pub fn has_redundant_view_box(&self) -> bool {
        let (Some(view_box), Some(width), Some(height)) = (
            self.attr("viewBox"),
            self.attr("width").and_then(length),
            self.attr("height").and_then(length),
        ) else {
            return false;
        };
        let numbers: Vec<f64> = view_box
            .split([' ', ','])
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        numbers == [0.0, 0.0, width, height]
    }

    pub fn to_document(&self) -> String {
        let mut out = String::from("<svg");
        for (key, value) in &self.attributes {
            out.push_str(&format!(" {key}=\"{value}\""));
        }
        if self.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&self.children);
            out.push_str("</svg>");
        }
        out
    }
}

/// Length in user units; only unitless and `px` values qualify.
fn length(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok()
}

/// Parse and clean a document whose root element is `<svg>`.
pub fn clean(input: &str, options: CleanOptions) -> Result<Svg, String> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Vec::new());

    let mut root = None;
    let mut depth = 0usize;
    let mut skip = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("{e} (at byte {})", reader.buffer_position()))?;

        let result = match event {
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => Ok(()),
            _ if skip > 0 => {
                match event {
                    Event::Start(_) => skip += 1,
                    Event::End(_) => skip -= 1,
                    _ => {}
                }
                Ok(())
            }
            Event::Start(e) if root.is_none() => {
                root = Some(root_attributes(&e, options)?);
                depth = 1;
                Ok(())
            }
            Event::Empty(e) if root.is_none() => {
                root = Some(root_attributes(&e, options)?);
                break;
            }
            Event::Start(e) => {
                if is_dropped(e.name().as_ref()) {
                    skip = 1;
                    Ok(())
                } else {
                    depth += 1;
                    writer.write_event(Event::Start(filtered(&e, options)?))
                }
            }
            Event::Empty(e) => {
                if is_dropped(e.name().as_ref()) {
                    Ok(())
                } else {
                    writer.write_event(Event::Empty(filtered(&e, options)?))
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
                writer.write_event(Event::End(e))
            }
            // text outside the root
            _ if depth == 0 => Ok(()),
            other => writer.write_event(other),
        };
        result.map_err(|e| e.to_string())?;
    }

    let attributes = root.ok_or("document has no root element")?;
    let children = String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())?;
    Ok(Svg {
        attributes,
        children,
    })
}

fn is_dropped(name: &[u8]) -> bool {
    name == b"metadata" || EDITOR_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn keep_attribute(key: &[u8], options: CleanOptions) -> bool {
    !(EDITOR_PREFIXES.iter().any(|p| key.starts_with(p))
        || EDITOR_NAMESPACES.contains(&key)
        || (options.strip_paint && PAINT_ATTRIBUTES.contains(&key)))
}

fn root_attributes(e: &BytesStart<'_>, options: CleanOptions) -> Result<Vec<(String, String)>, String> {
    if e.local_name().as_ref() != b"svg" {
        return Err(format!(
            "root element is <{}>, expected <svg>",
            String::from_utf8_lossy(e.name().as_ref())
        ));
    }

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = attr.key.as_ref();
        if keep_attribute(key, options) {
            attributes.push((
                String::from_utf8_lossy(key).into_owned(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            ));
        }
    }
    Ok(attributes)
}

fn filtered(e: &BytesStart<'_>, options: CleanOptions) -> Result<BytesStart<'static>, String> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if keep_attribute(attr.key.as_ref(), options) {
            out.push_attribute(attr);
        }
    }
    Ok(out)
}

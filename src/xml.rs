use quick_xml::events::{BytesEnd, BytesStart, Event as XmlEvent};
use quick_xml::reader::Reader as XmlReader;
use quick_xml::writer::Writer as XmlWriter;

/// XML 1.0 valid char ranges:
/// - 0x09, 0x0A, 0x0D
/// - 0x20..=0xD7FF
/// - 0xE000..=0xFFFD
/// - 0x10000..=0x10FFFF
fn is_valid_xml_char(c: char) -> bool {
    matches!(
        c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

pub fn sanitize_xml_text(text: &str) -> String {
    text.chars().filter(|&c| is_valid_xml_char(c)).collect()
}

/// Geometry-relevant attributes of the outermost `<svg>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootAttrs {
    /// `[x, y, width, height]`, only when well formed with a positive extent.
    pub view_box: Option<[f32; 4]>,
    /// Numeric user-unit width; percentages and font-relative units are ignored.
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub style: Option<String>,
}

fn is_svg_root(e: &BytesStart<'_>) -> bool {
    e.local_name().as_ref() == b"svg"
}

pub fn read_root(svg: &str) -> Result<RootAttrs, String> {
    let mut reader = XmlReader::from_str(svg);

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) | Ok(XmlEvent::Empty(ref e)) if is_svg_root(e) => {
                let mut attrs = RootAttrs::default();
                for attr in e.attributes().filter_map(|a| a.ok()) {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"viewBox" => attrs.view_box = parse_view_box(&value),
                        b"width" => attrs.width = parse_length(&value),
                        b"height" => attrs.height = parse_length(&value),
                        b"style" => attrs.style = Some(value),
                        _ => {}
                    }
                }
                return Ok(attrs);
            }
            Ok(XmlEvent::Start(_)) | Ok(XmlEvent::Empty(_)) => {
                return Err("Root element is not <svg>".to_string());
            }
            Ok(XmlEvent::Eof) => return Err("No <svg> element found".to_string()),
            Ok(_) => {}
            Err(e) => return Err(format!("Failed to parse SVG: {}", e)),
        }
    }
}

pub fn parse_view_box(value: &str) -> Option<[f32; 4]> {
    let parts: Vec<f32> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;

    match parts.as_slice() {
        &[x, y, w, h] if w > 0.0 && h > 0.0 && [x, y, w, h].iter().all(|v| v.is_finite()) => {
            Some([x, y, w, h])
        }
        _ => None,
    }
}

pub fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    let parsed: f32 = number.parse().ok()?;
    (parsed.is_finite() && parsed > 0.0).then_some(parsed)
}

/// Copies `svg`, replacing (or adding) the given attributes on the root element
/// and optionally inserting `first_child` as its first child.
pub fn rewrite_root(
    svg: &str,
    overrides: &[(&str, String)],
    first_child: Option<BytesStart<'static>>,
) -> Result<String, String> {
    let mut reader = XmlReader::from_str(svg);
    let mut writer = XmlWriter::new(Vec::with_capacity(svg.len() + 256));
    let mut first_child = first_child;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("Failed to parse SVG: {}", e))?;

        let written = match event {
            XmlEvent::Eof => break,
            XmlEvent::Start(ref e) if !seen_root && is_svg_root(e) => {
                seen_root = true;
                let root = with_overrides(e, overrides);
                let mut result = writer.write_event(XmlEvent::Start(root));
                if let Some(child) = first_child.take() {
                    result = result.and_then(|_| writer.write_event(XmlEvent::Empty(child)));
                }
                result
            }
            XmlEvent::Empty(ref e) if !seen_root && is_svg_root(e) => {
                seen_root = true;
                let root = with_overrides(e, overrides);
                match first_child.take() {
                    Some(child) => {
                        let end = BytesEnd::new(String::from_utf8_lossy(e.name().as_ref()).to_string());
                        writer
                            .write_event(XmlEvent::Start(root))
                            .and_then(|_| writer.write_event(XmlEvent::Empty(child)))
                            .and_then(|_| writer.write_event(XmlEvent::End(end)))
                    }
                    None => writer.write_event(XmlEvent::Empty(root)),
                }
            }
            other => writer.write_event(other),
        };
        written.map_err(|e| format!("Failed to write SVG: {}", e))?;
    }

    if !seen_root {
        return Err("No <svg> element found".to_string());
    }

    String::from_utf8(writer.into_inner()).map_err(|e| format!("SVG is not UTF-8: {}", e))
}

fn with_overrides(root: &BytesStart<'_>, overrides: &[(&str, String)]) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(root.name().as_ref()).to_string();
    let mut out = BytesStart::new(name);

    for attr in root.attributes().filter_map(|a| a.ok()) {
        let replaced = overrides
            .iter()
            .any(|(key, _)| key.as_bytes() == attr.key.as_ref());
        if !replaced {
            out.push_attribute(attr);
        }
    }
    for (key, value) in overrides {
        out.push_attribute((*key, value.as_str()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_invalid_control_chars() {
        let s = "A\u{0007}B\u{000C}C";
        assert_eq!(sanitize_xml_text(s), "ABC");
    }

    #[test]
    fn keep_valid_whitespace_controls() {
        let s = "a\tb\nc\rd";
        assert_eq!(sanitize_xml_text(s), s);
    }

    #[test]
    fn reads_root_geometry() {
        let svg = r#"<?xml version="1.0"?>
<svg xmlns="http://www.w3.org/2000/svg" width="100%" height="240px" viewBox="-8, -8 316 216" style="max-width: 316px;"><g/></svg>"#;
        let attrs = read_root(svg).expect("root");
        assert_eq!(attrs.view_box, Some([-8.0, -8.0, 316.0, 216.0]));
        assert_eq!(attrs.width, None);
        assert_eq!(attrs.height, Some(240.0));
        assert_eq!(attrs.style.as_deref(), Some("max-width: 316px;"));
    }

    #[test]
    fn degenerate_view_box_is_ignored() {
        assert_eq!(parse_view_box("0 0 0 10"), None);
        assert_eq!(parse_view_box("0 0 10"), None);
        assert_eq!(parse_view_box("a b c d"), None);
    }

    #[test]
    fn non_svg_root_is_rejected() {
        assert!(read_root("<html><svg/></html>").is_err());
        assert!(read_root("").is_err());
    }

    #[test]
    fn rewrite_replaces_attributes_and_inserts_child() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100%" viewBox="0 0 10 10"><circle r="2"/></svg>"#;
        let mut rect = BytesStart::new("rect");
        rect.push_attribute(("fill", "#ffffff"));

        let out = rewrite_root(
            svg,
            &[("width", "10".to_string()), ("height", "10".to_string())],
            Some(rect),
        )
        .expect("rewrite");

        assert_eq!(
            out,
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10" width="10" height="10"><rect fill="#ffffff"/><circle r="2"/></svg>"##
        );
    }

    #[test]
    fn rewrite_expands_empty_root_when_inserting_child() {
        let out = rewrite_root(r#"<svg width="5"/>"#, &[], Some(BytesStart::new("rect")))
            .expect("rewrite");
        assert_eq!(out, r#"<svg width="5"><rect/></svg>"#);
    }
}

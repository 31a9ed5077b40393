use std::fmt;
use std::sync::Arc;

use resvg::usvg;

use crate::xml;

/// Axis-aligned rectangle in drawing-intrinsic units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Vector drawing produced by a renderer.
///
/// The root element is normalized so that its width and height equal the
/// viewBox extent. The tree's canvas unit is then exactly one intrinsic unit,
/// offset by the viewBox origin.
pub struct Drawing {
    svg: String,
    view_box: Bounds,
    tree: usvg::Tree,
}

impl fmt::Debug for Drawing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drawing")
            .field("view_box", &self.view_box)
            .field("svg_len", &self.svg.len())
            .finish()
    }
}

impl Drawing {
    /// Parses SVG markup. `fallback` is the intrinsic size used when the root
    /// declares neither a viewBox nor a numeric width/height.
    pub fn from_svg(
        svg: &str,
        fontdb: &Arc<usvg::fontdb::Database>,
        fallback: (f32, f32),
    ) -> Result<Self, String> {
        let root = xml::read_root(svg)?;

        let view_box = match root.view_box {
            Some([x, y, w, h]) => Bounds::new(x, y, w, h),
            None => {
                let width = root.width.unwrap_or(fallback.0);
                let height = root.height.unwrap_or(fallback.1);
                Bounds::new(0.0, 0.0, width, height)
            }
        };

        let normalized = xml::rewrite_root(
            svg,
            &[
                ("width", view_box.width.to_string()),
                ("height", view_box.height.to_string()),
            ],
            None,
        )?;

        let opts = usvg::Options {
            fontdb: Arc::clone(fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&normalized, &opts)
            .map_err(|e| format!("Failed to parse SVG: {}", e))?;

        Ok(Self {
            svg: normalized,
            view_box,
            tree,
        })
    }

    pub fn svg(&self) -> &str {
        &self.svg
    }

    pub fn tree(&self) -> &usvg::Tree {
        &self.tree
    }

    /// The declared viewBox, or `(0, 0, width, height)` when there is none.
    pub fn view_box(&self) -> Bounds {
        self.view_box
    }

    pub fn intrinsic_size(&self) -> (f32, f32) {
        (self.view_box.width, self.view_box.height)
    }

    /// Bounding box of the inked geometry in intrinsic units. Falls back to
    /// the viewBox when the drawing has no visible extent.
    pub fn content_bounds(&self) -> Bounds {
        let root = self.tree.root();
        if !root.has_children() {
            return self.view_box;
        }

        let bbox = root.abs_bounding_box();
        let bounds = Bounds::new(
            bbox.x() + self.view_box.x,
            bbox.y() + self.view_box.y,
            bbox.width(),
            bbox.height(),
        );
        if bounds.is_degenerate() {
            self.view_box
        } else {
            bounds
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn empty_fontdb() -> Arc<usvg::fontdb::Database> {
        Arc::new(usvg::fontdb::Database::new())
    }

    pub(crate) fn drawing(svg: &str) -> Drawing {
        Drawing::from_svg(svg, &empty_fontdb(), (800.0, 600.0)).expect("valid svg")
    }

    fn assert_bounds(actual: Bounds, expected: Bounds) {
        let close = |a: f32, b: f32| (a - b).abs() < 0.01;
        assert!(
            close(actual.x, expected.x)
                && close(actual.y, expected.y)
                && close(actual.width, expected.width)
                && close(actual.height, expected.height),
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn content_bounds_ignore_larger_view_box() {
        let d = drawing(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100%" viewBox="0 0 300 200">
<rect x="10" y="10" width="100" height="50" fill="black"/></svg>"#,
        );
        assert_eq!(d.view_box(), Bounds::new(0.0, 0.0, 300.0, 200.0));
        assert_bounds(d.content_bounds(), Bounds::new(10.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn content_bounds_account_for_view_box_origin() {
        let d = drawing(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="-50 -20 300 200">
<rect x="10" y="10" width="100" height="50" fill="black"/></svg>"#,
        );
        assert_bounds(d.content_bounds(), Bounds::new(10.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn empty_drawing_falls_back_to_view_box() {
        let d = drawing(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="5 5 40 30"></svg>"#);
        assert_eq!(d.content_bounds(), Bounds::new(5.0, 5.0, 40.0, 30.0));
    }

    #[test]
    fn horizontal_line_falls_back_to_view_box() {
        let d = drawing(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 300 200">
<line x1="0" y1="50" x2="100" y2="50" stroke="black"/></svg>"#,
        );
        assert_eq!(d.content_bounds(), Bounds::new(0.0, 0.0, 300.0, 200.0));
    }

    #[test]
    fn intrinsic_size_prefers_view_box_then_attributes_then_fallback() {
        let with_view_box = drawing(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="50" height="50" viewBox="0 0 400 100"/>"#,
        );
        assert_eq!(with_view_box.intrinsic_size(), (400.0, 100.0));

        let with_attrs =
            drawing(r#"<svg xmlns="http://www.w3.org/2000/svg" width="120px" height="80"/>"#);
        assert_eq!(with_attrs.intrinsic_size(), (120.0, 80.0));

        let bare = drawing(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#);
        assert_eq!(bare.intrinsic_size(), (800.0, 600.0));
    }

    #[test]
    fn normalized_tree_size_matches_view_box() {
        let d = drawing(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="100%" viewBox="0 0 320 180"><g/></svg>"#,
        );
        assert_eq!(d.tree().size().width(), 320.0);
        assert_eq!(d.tree().size().height(), 180.0);
    }

    #[test]
    fn invalid_markup_is_rejected() {
        assert!(Drawing::from_svg("sequenceDiagram", &empty_fontdb(), (1.0, 1.0)).is_err());
        assert!(
            Drawing::from_svg("<svg><rect></svg>", &empty_fontdb(), (1.0, 1.0)).is_err()
        );
    }
}

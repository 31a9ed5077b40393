use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use quick_xml::events::BytesStart;
use tiny_skia::{Color, Pixmap, Transform};

use crate::config::ExportConfig;
use crate::drawing::{Bounds, Drawing};
use crate::error::ExportError;
use crate::sinks::RasterImage;
use crate::transform::{SurfaceSize, ViewState};
use crate::xml;

const DEFAULT_BACKGROUND: &str = "#ffffff";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub padding: f32,
    pub margin: f32,
    /// Oversampling multiplier applied to every raster dimension.
    pub density: f32,
    /// `#rrggbb`, used both for the raster fill and the baked-in SVG rect.
    pub background: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl ExportSettings {
    pub fn from_config(config: &ExportConfig) -> Self {
        let background = if parse_hex_rgb(&config.background).is_some() {
            config.background.clone()
        } else {
            tracing::warn!(background = %config.background, "invalid export background, using white");
            DEFAULT_BACKGROUND.to_string()
        };
        let density = if config.density.is_finite() && config.density > 0.0 {
            config.density
        } else {
            tracing::warn!(density = config.density, "invalid export density, using 1");
            1.0
        };

        Self {
            padding: config.padding.max(0.0),
            margin: config.margin.max(0.0),
            density,
            background,
        }
    }

    fn background_color(&self) -> Color {
        let (r, g, b) = parse_hex_rgb(&self.background).unwrap_or((255, 255, 255));
        Color::from_rgba8(r, g, b, 255)
    }
}

fn parse_hex_rgb(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Content-fit crop geometry in drawing-intrinsic units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    /// Content bounds grown by the padding on every side.
    pub adjusted: Bounds,
    pub margin: f32,
    pub final_width: f32,
    pub final_height: f32,
}

impl CropBox {
    pub fn new(content: Bounds, padding: f32, margin: f32) -> Self {
        let adjusted = Bounds::new(
            content.x - padding,
            content.y - padding,
            content.width + padding * 2.0,
            content.height + padding * 2.0,
        );
        Self {
            adjusted,
            margin,
            final_width: adjusted.width + margin * 2.0,
            final_height: adjusted.height + margin * 2.0,
        }
    }

    pub fn for_drawing(drawing: &Drawing, settings: &ExportSettings) -> Self {
        Self::new(drawing.content_bounds(), settings.padding, settings.margin)
    }

    /// viewBox of the cropped vector output.
    pub fn view_box(&self) -> Bounds {
        Bounds::new(
            self.adjusted.x - self.margin,
            self.adjusted.y - self.margin,
            self.final_width,
            self.final_height,
        )
    }

    /// Offset placing intrinsic point `(adjusted.x, adjusted.y)` at canvas
    /// point `(margin, margin)`, given that the rendered tree starts at the
    /// drawing's viewBox origin.
    pub fn translation(&self, view_box: Bounds) -> (f32, f32) {
        (
            self.margin - (self.adjusted.x - view_box.x),
            self.margin - (self.adjusted.y - view_box.y),
        )
    }
}

fn blank_canvas(width: f32, height: f32, settings: &ExportSettings) -> Result<Pixmap, ExportError> {
    let px_width = (width * settings.density).ceil();
    let px_height = (height * settings.density).ceil();
    if !(px_width >= 1.0 && px_height >= 1.0) {
        return Err(ExportError::Raster(format!(
            "canvas {}x{} is empty",
            px_width, px_height
        )));
    }

    let mut pixmap = Pixmap::new(px_width as u32, px_height as u32).ok_or_else(|| {
        ExportError::Raster(format!("Failed to create {}x{} pixmap", px_width, px_height))
    })?;
    pixmap.fill(settings.background_color());
    Ok(pixmap)
}

/// Raster of the drawing's content plus padding and margin, on an opaque background.
pub fn rasterize_content_fit(
    drawing: &Drawing,
    settings: &ExportSettings,
) -> Result<Pixmap, ExportError> {
    let crop = CropBox::for_drawing(drawing, settings);
    let mut pixmap = blank_canvas(crop.final_width, crop.final_height, settings)?;

    let (tx, ty) = crop.translation(drawing.view_box());
    let transform = Transform::from_scale(settings.density, settings.density).pre_translate(tx, ty);
    resvg::render(drawing.tree(), transform, &mut pixmap.as_mut());

    tracing::debug!(
        width = pixmap.width(),
        height = pixmap.height(),
        "content-fit raster"
    );
    Ok(pixmap)
}

/// Raster of exactly what the viewer surface shows.
pub fn rasterize_viewport(
    drawing: &Drawing,
    view: &ViewState,
    surface: SurfaceSize,
    settings: &ExportSettings,
) -> Result<Pixmap, ExportError> {
    let mut pixmap = blank_canvas(surface.width, surface.height, settings)?;

    let transform = Transform::from_scale(settings.density, settings.density)
        .pre_concat(view.composite(drawing.intrinsic_size(), surface));
    resvg::render(drawing.tree(), transform, &mut pixmap.as_mut());

    tracing::debug!(
        width = pixmap.width(),
        height = pixmap.height(),
        scale = view.scale,
        "viewport-fit raster"
    );
    Ok(pixmap)
}

/// Copy of the drawing's SVG cropped to the content-fit box, with explicit
/// size and the background baked in as the first child.
pub fn cropped_svg(drawing: &Drawing, settings: &ExportSettings) -> Result<String, ExportError> {
    let crop = CropBox::for_drawing(drawing, settings);
    let vb = crop.view_box();

    let root = xml::read_root(drawing.svg()).map_err(ExportError::Svg)?;
    let background_css = format!("background-color: {}", settings.background);
    let style = match root.style.as_deref().map(str::trim) {
        Some(existing) if !existing.is_empty() => {
            format!("{}; {}", existing.trim_end_matches(';'), background_css)
        }
        _ => background_css,
    };

    let mut rect = BytesStart::new("rect");
    rect.push_attribute(("x", vb.x.to_string().as_str()));
    rect.push_attribute(("y", vb.y.to_string().as_str()));
    rect.push_attribute(("width", vb.width.to_string().as_str()));
    rect.push_attribute(("height", vb.height.to_string().as_str()));
    // Inline style, so stylesheet rules for `rect` in the drawing cannot repaint it.
    rect.push_attribute(("style", format!("fill: {}", settings.background).as_str()));

    xml::rewrite_root(
        drawing.svg(),
        &[
            (
                "viewBox",
                format!("{} {} {} {}", vb.x, vb.y, vb.width, vb.height),
            ),
            ("width", vb.width.to_string()),
            ("height", vb.height.to_string()),
            ("style", style),
        ],
        Some(rect),
    )
    .map_err(ExportError::Svg)
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, ExportError> {
    pixmap
        .encode_png()
        .map_err(|e| ExportError::Raster(format!("Failed to encode PNG: {}", e)))
}

pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

/// Markup fragment embedding the PNG inline.
pub fn image_tag(png: &[u8]) -> String {
    format!(r#"<img src="{}" />"#, png_data_url(png))
}

/// Straight-alpha RGBA copy of a pixmap, as clipboards expect.
pub fn to_raster_image(pixmap: &Pixmap) -> RasterImage {
    let rgba = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let c = pixel.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    RasterImage {
        width: pixmap.width(),
        height: pixmap.height(),
        rgba,
    }
}

pub fn svg_to_pdf(
    svg: &str,
    fontdb: Arc<svg2pdf::usvg::fontdb::Database>,
) -> Result<Vec<u8>, ExportError> {
    let opts = svg2pdf::usvg::Options {
        fontdb,
        ..Default::default()
    };

    let tree = svg2pdf::usvg::Tree::from_str(svg, &opts)
        .map_err(|e| ExportError::Svg(format!("Failed to parse SVG: {}", e)))?;

    // Text as paths; PDFs with failed font embedding would lose their labels.
    let options = svg2pdf::ConversionOptions {
        embed_text: false,
        ..Default::default()
    };
    let page_options = svg2pdf::PageOptions::default();

    svg2pdf::to_pdf(&tree, options, page_options)
        .map_err(|e| ExportError::Svg(format!("Failed to convert SVG to PDF: {}", e)))
}

use clap::Parser;
use std::path::PathBuf;
use twinview::config::ExportConfig;
use twinview::drawing::Drawing;
use twinview::export::{self, CropBox, ExportSettings};
use twinview::fonts;
use twinview::xml::sanitize_xml_text;

/// Standalone content-fit cropper (SVG/PNG/PDF)
#[derive(Parser, Debug)]
#[command(name = "twinview-crop")]
#[command(version)]
#[command(about = "Crop an SVG to its drawn content plus padding and margin", long_about = None)]
struct Args {
    /// Input .svg file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file path (extension determines format: .svg, .png or .pdf)
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Space between the content and the crop edge
    #[arg(long, default_value_t = 10.0)]
    padding: f32,

    /// Outer margin added around the padded content
    #[arg(long, default_value_t = 30.0)]
    margin: f32,

    /// Raster scale multiplier for PNG output
    #[arg(long, default_value_t = 2.0)]
    density: f32,

    /// Background color as #rrggbb
    #[arg(long, default_value = "#ffffff")]
    background: String,

    /// Directory with extra fonts
    #[arg(long, default_value = "fonts")]
    fonts_dir: PathBuf,
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    if !args.density.is_finite() || args.density <= 0.0 {
        return Err(format!("Invalid --density value: {}", args.density));
    }

    let source = if args.input.to_str() == Some("-") {
        let mut buffer = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)
            .map_err(|e| format!("Failed to read input file: {}", e))?
    };

    let settings = ExportSettings::from_config(&ExportConfig {
        padding: args.padding,
        margin: args.margin,
        density: args.density,
        background: args.background.clone(),
        ..ExportConfig::default()
    });

    let fontdb = fonts::load_fontdb(&args.fonts_dir);
    let drawing = Drawing::from_svg(&sanitize_xml_text(&source), &fontdb, (800.0, 600.0))?;
    let crop = CropBox::for_drawing(&drawing, &settings);
    eprintln!(
        "Content {:?} cropped to {}x{}",
        drawing.content_bounds(),
        crop.final_width,
        crop.final_height
    );

    let output_ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .ok_or("Output file has no extension")?
        .to_ascii_lowercase();

    match output_ext.as_str() {
        "svg" => {
            let svg = export::cropped_svg(&drawing, &settings).map_err(|e| e.to_string())?;
            std::fs::write(&args.output, svg).map_err(|e| format!("Failed to write SVG: {}", e))?;
            eprintln!("SVG saved to: {}", args.output.display());
        }
        "png" => {
            let pixmap =
                export::rasterize_content_fit(&drawing, &settings).map_err(|e| e.to_string())?;
            let png_data = export::encode_png(&pixmap).map_err(|e| e.to_string())?;
            std::fs::write(&args.output, png_data)
                .map_err(|e| format!("Failed to write PNG: {}", e))?;
            eprintln!("PNG saved to: {}", args.output.display());
        }
        "pdf" => {
            let svg = export::cropped_svg(&drawing, &settings).map_err(|e| e.to_string())?;
            let pdf_data = export::svg_to_pdf(&svg, fonts::load_pdf_fontdb(&args.fonts_dir))
                .map_err(|e| e.to_string())?;
            std::fs::write(&args.output, pdf_data)
                .map_err(|e| format!("Failed to write PDF: {}", e))?;
            eprintln!("PDF saved to: {}", args.output.display());
        }
        _ => {
            return Err(format!(
                "Unsupported output format: .{} (use .svg, .png or .pdf)",
                output_ext
            ));
        }
    }

    Ok(())
}

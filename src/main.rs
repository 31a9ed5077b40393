use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use twinview::bus::{Channel, LocalBus};
use twinview::config::{Config, ExportMode};
use twinview::editor::{EditorCommand, EditorHost, EditorSession};
use twinview::fonts;
use twinview::renderer::{CommandRenderer, DiagramRenderer, SvgRenderer};
use twinview::sinks::{
    ClipboardSink, FsSink, HeadlessWindow, MemoryClipboard, SystemBrowser, SystemClipboard,
};
use twinview::viewer::{ViewerCommand, ViewerHost, ViewerSession};

/// Headless editor/viewer pair: feeds a diagram source through the editor,
/// lets the viewer render it and exports the result
#[derive(Parser, Debug)]
#[command(name = "twinview")]
#[command(version)]
#[command(about = "Render a diagram through the editor/viewer pipeline and export it", long_about = None)]
struct Args {
    /// Diagram source file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Config file (TOML or YAML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Raster export policy
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Cropped vector output (.svg or .pdf)
    #[arg(long, value_name = "PATH")]
    vector_out: Option<PathBuf>,

    /// Markup output receiving the embedded PNG
    #[arg(long, value_name = "PATH")]
    markup_out: Option<PathBuf>,

    /// Also copy the raster to the system clipboard
    #[arg(long)]
    clipboard: bool,

    /// Viewer surface width in pixels
    #[arg(long)]
    width: Option<f32>,

    /// Viewer surface height in pixels
    #[arg(long)]
    height: Option<f32>,

    /// Fit the drawing to the surface before exporting
    #[arg(long)]
    fit: bool,

    /// Open the diagram syntax docs in the default browser
    #[arg(long)]
    open_docs: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    ContentFit,
    ViewportFit,
}

impl From<ModeArg> for ExportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::ContentFit => ExportMode::ContentFit,
            ModeArg::ViewportFit => ExportMode::ViewportFit,
        }
    }
}

fn main() -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).map_err(|e| e.to_string())?,
        None => Config::default(),
    };
    if let Some(mode) = args.mode {
        config.export.mode = mode.into();
    }
    if let Some(path) = &args.vector_out {
        config.export.vector_path = path.clone();
    }
    if let Some(path) = &args.markup_out {
        config.export.markup_path = path.clone();
    }
    if let Some(width) = args.width {
        config.viewer.surface_width = width;
    }
    if let Some(height) = args.height {
        config.viewer.surface_height = height;
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

    let fontdb = fonts::load_fontdb(&config.renderer.fonts_dir);
    let fallback = (config.view.fallback_width, config.view.fallback_height);
    let renderer: Box<dyn DiagramRenderer> = match &config.renderer.command {
        Some(command) => Box::new(
            CommandRenderer::new(command, fontdb, fallback).map_err(|e| e.to_string())?,
        ),
        None => Box::new(SvgRenderer::with_fontdb(fontdb, fallback)),
    };

    let clipboard: Box<dyn ClipboardSink> = if args.clipboard {
        Box::new(SystemClipboard)
    } else {
        Box::new(MemoryClipboard::new())
    };
    let window = HeadlessWindow::default();
    let host = ViewerHost {
        clipboard,
        files: Box::new(FsSink),
        window: Box::new(window.clone()),
    };

    let bus = LocalBus::new();
    let inbox = bus.subscribe(&Channel::ALL);
    let mut viewer = ViewerSession::new(&config, renderer, host);
    tracing::debug!(subscribers = bus.subscriber_count(), "bus ready");
    let editor_host = EditorHost {
        clipboard: Box::new(MemoryClipboard::new()),
        browser: Box::new(SystemBrowser),
    };
    let mut editor = EditorSession::new(config.editor.clone(), bus, editor_host);
    if args.open_docs {
        editor.dispatch(EditorCommand::OpenDocs).map_err(|e| e.to_string())?;
    }

    editor.input(&source).map_err(|e| e.to_string())?;
    viewer.pump(&inbox);
    if let Some(status) = viewer.status() {
        return Err(format!("Failed to render diagram: {}", status));
    }

    if args.fit {
        viewer
            .dispatch(ViewerCommand::ResetView)
            .map_err(|e| e.to_string())?;
    }
    if args.clipboard {
        viewer
            .copy_image()
            .map_err(|e| format!("Failed to copy image: {}", e))?;
        eprintln!("Image copied to clipboard");
    }

    let report = viewer
        .export_to_sinks()
        .map_err(|e| format!("Failed to export diagram: {}", e))?;
    eprintln!(
        "Vector saved to: {} ({} bytes)",
        report.vector_path.display(),
        report.vector_bytes
    );
    eprintln!(
        "Markup saved to: {} ({}x{} PNG)",
        report.markup_path.display(),
        report.raster_width,
        report.raster_height
    );

    viewer.poll_timers(Instant::now() + Duration::from_millis(config.export.close_delay_ms));
    tracing::debug!(closes = window.close_requests(), "done");
    Ok(())
}

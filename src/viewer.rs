use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tiny_skia::Pixmap;

use crate::bus::{BusMessage, ChangeEvent, Subscription, TabCreatedEvent};
use crate::config::{Config, ExportConfig, ExportMode, ViewConfig, ViewerConfig};
use crate::drawing::Drawing;
use crate::error::{ExportError, RenderError, SyncError};
use crate::export::{self, ExportSettings};
use crate::feedback::{Affordance, Indicator, TimerAction, Timers};
use crate::fonts;
use crate::renderer::{DiagramRenderer, RenderIds};
use crate::sinks::{ClipboardSink, FileSink, WindowControl};
use crate::tabs::{Tab, TabId, TabRegistry, default_tab_name};
use crate::transform::{PointerButton, SurfaceSize, ViewState};

const IMAGE_COPIED_LABEL: &str = "Image Copied!";
const EXPORTED_LABEL: &str = "Diagram Exported";

pub struct ViewerHost {
    pub clipboard: Box<dyn ClipboardSink>,
    pub files: Box<dyn FileSink>,
    pub window: Box<dyn WindowControl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    SwitchTab(TabId),
    PointerDown {
        x: f32,
        y: f32,
        button: PointerButton,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    PointerUp,
    Wheel {
        delta_y: f32,
    },
    Resize {
        width: f32,
        height: f32,
    },
    ResetView,
    CopyImage,
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub tab_id: TabId,
    pub revision: u64,
    pub render_id: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderJob {
    Clear,
    Render(RenderRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Cleared,
    Rendered,
    /// The previous drawing stays on screen and the status shows the error.
    Failed(RenderError),
    /// The tab changed or lost focus while rendering; the result was dropped.
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub vector_path: PathBuf,
    pub vector_bytes: usize,
    pub markup_path: PathBuf,
    pub raster_width: u32,
    pub raster_height: u32,
}

pub struct ViewerSession<R: DiagramRenderer> {
    tabs: TabRegistry,
    active: TabId,
    renderer: R,
    render_ids: RenderIds,
    cache: Option<LruCache<String, Rc<Drawing>>>,
    drawing: Option<Rc<Drawing>>,
    status: Option<String>,
    view: ViewState,
    surface: SurfaceSize,
    host: ViewerHost,
    viewer_config: ViewerConfig,
    view_config: ViewConfig,
    export_config: ExportConfig,
    settings: ExportSettings,
    fonts_dir: PathBuf,
    pdf_fontdb: Option<Arc<svg2pdf::usvg::fontdb::Database>>,
    copy_label: Indicator,
    export_label: Indicator,
    timers: Timers,
    close_requested: bool,
}

impl<R: DiagramRenderer> ViewerSession<R> {
    pub fn new(config: &Config, renderer: R, host: ViewerHost) -> Self {
        let first = TabId(1);
        let mut tabs = TabRegistry::new();
        tabs.insert_if_absent(Tab::new(
            first,
            default_tab_name(&config.viewer.name_prefix, first),
            config.viewer.initial_content.clone(),
        ));

        Self {
            tabs,
            active: first,
            renderer,
            render_ids: RenderIds::new(),
            cache: NonZeroUsize::new(config.viewer.render_cache).map(LruCache::new),
            drawing: None,
            status: None,
            view: ViewState::default(),
            surface: SurfaceSize::new(config.viewer.surface_width, config.viewer.surface_height),
            host,
            viewer_config: config.viewer.clone(),
            view_config: config.view.clone(),
            export_config: config.export.clone(),
            settings: ExportSettings::from_config(&config.export),
            fonts_dir: config.renderer.fonts_dir.clone(),
            pdf_fontdb: None,
            copy_label: Indicator::new(config.export.copy_label.clone()),
            export_label: Indicator::new(config.export.export_label.clone()),
            timers: Timers::new(),
            close_requested: false,
        }
    }

    // Synchronization

    pub fn handle_message(&mut self, message: BusMessage) -> Option<RenderOutcome> {
        match message {
            BusMessage::ContentChanged(ev) => self.on_change_event(ev),
            BusMessage::TabCreated(ev) => {
                self.on_tab_created(ev);
                None
            }
        }
    }

    pub fn pump(&mut self, subscription: &Subscription) -> usize {
        let messages = subscription.drain();
        let count = messages.len();
        for message in messages {
            self.handle_message(message);
        }
        count
    }

    /// Mirrors the content, creating the tab first if its id is new. Renders
    /// when the tab is the active one.
    pub fn on_change_event(&mut self, ev: ChangeEvent) -> Option<RenderOutcome> {
        if !self.tabs.contains(ev.tab_id) {
            let name = default_tab_name(&self.viewer_config.name_prefix, ev.tab_id);
            tracing::debug!(tab = %ev.tab_id, %name, "implicitly creating tab");
            self.tabs.insert_if_absent(Tab::new(ev.tab_id, name, ""));
        }
        self.tabs.set_content(ev.tab_id, &ev.content);

        (ev.tab_id == self.active).then(|| self.render_active())
    }

    pub fn on_tab_created(&mut self, ev: TabCreatedEvent) {
        if self
            .tabs
            .insert_if_absent(Tab::new(ev.id, ev.name, ev.content))
        {
            tracing::debug!(tab = %ev.id, "tab announced");
        } else {
            tracing::debug!(tab = %ev.id, "tab already known, ignoring announcement");
        }
    }

    pub fn switch_tab(&mut self, id: TabId) -> Result<RenderOutcome, SyncError> {
        if !self.tabs.contains(id) {
            return Err(SyncError::UnknownTab(id));
        }
        self.active = id;
        Ok(self.render_active())
    }

    // Rendering

    pub fn begin_render(&mut self) -> RenderJob {
        let source = self.tabs.content(self.active).unwrap_or_default();
        if source.trim().is_empty() {
            return RenderJob::Clear;
        }

        RenderJob::Render(RenderRequest {
            tab_id: self.active,
            revision: self.tabs.revision(self.active).unwrap_or_default(),
            render_id: self.render_ids.next_id(),
            source: source.to_string(),
        })
    }

    /// Applies a render result if `request` still describes the active tab's
    /// current content.
    pub fn finish_render(
        &mut self,
        request: &RenderRequest,
        result: Result<Rc<Drawing>, RenderError>,
    ) -> RenderOutcome {
        let current = self.tabs.revision(request.tab_id);
        if request.tab_id != self.active || current != Some(request.revision) {
            tracing::debug!(
                render_id = %request.render_id,
                tab = %request.tab_id,
                "discarding stale render"
            );
            return RenderOutcome::Discarded;
        }

        match result {
            Ok(drawing) => {
                if let Some(cache) = self.cache.as_mut() {
                    cache.put(request.source.clone(), Rc::clone(&drawing));
                }
                self.drawing = Some(drawing);
                self.status = None;
                RenderOutcome::Rendered
            }
            Err(e) => {
                tracing::warn!(tab = %request.tab_id, error = %e, "render failed");
                self.status = Some(self.viewer_config.syntax_error_message.clone());
                RenderOutcome::Failed(e)
            }
        }
    }

    pub fn render_active(&mut self) -> RenderOutcome {
        let request = match self.begin_render() {
            RenderJob::Clear => {
                self.drawing = None;
                self.status = None;
                return RenderOutcome::Cleared;
            }
            RenderJob::Render(request) => request,
        };

        let cached = self
            .cache
            .as_mut()
            .and_then(|cache| cache.get(&request.source).cloned());
        let result = match cached {
            Some(drawing) => {
                tracing::debug!(tab = %request.tab_id, "render cache hit");
                Ok(drawing)
            }
            None => self
                .renderer
                .render(&request.render_id, &request.source)
                .map(Rc::new),
        };
        self.finish_render(&request, result)
    }

    // View

    /// Presses outside the surface are ignored.
    pub fn pointer_down(&mut self, x: f32, y: f32, button: PointerButton) {
        let inside = (0.0..=self.surface.width).contains(&x) && (0.0..=self.surface.height).contains(&y);
        if inside {
            self.view.pointer_down(x, y, button);
        }
    }

    pub fn reset_view(&mut self) {
        let intrinsic = self.drawing.as_ref().map(|d| d.intrinsic_size());
        self.view.fit(intrinsic, self.surface, &self.view_config);
    }

    // Export

    fn rasterize(&self, drawing: &Drawing) -> Result<Pixmap, ExportError> {
        match self.export_config.mode {
            ExportMode::ContentFit => export::rasterize_content_fit(drawing, &self.settings),
            ExportMode::ViewportFit => {
                export::rasterize_viewport(drawing, &self.view, self.surface, &self.settings)
            }
        }
    }

    fn displayed(&self) -> Result<Rc<Drawing>, ExportError> {
        self.drawing.clone().ok_or(ExportError::NoDrawing)
    }

    pub fn copy_image(&mut self) -> Result<(), ExportError> {
        let drawing = self.displayed()?;
        let pixmap = self.rasterize(&drawing)?;
        self.host
            .clipboard
            .write_image(&export::to_raster_image(&pixmap))?;

        self.copy_label.flash(IMAGE_COPIED_LABEL);
        self.timers.schedule(
            Duration::from_millis(self.export_config.restore_delay_ms),
            TimerAction::Restore(Affordance::CopyImage),
        );
        Ok(())
    }

    /// Writes the cropped vector file, then the markup file with the embedded
    /// raster. Writes already done stay done when a later step fails.
    pub fn export_to_sinks(&mut self) -> Result<ExportReport, ExportError> {
        let drawing = self.displayed()?;

        match self.write_export(&drawing) {
            Ok(report) => {
                tracing::info!(
                    vector = %report.vector_path.display(),
                    markup = %report.markup_path.display(),
                    "diagram exported"
                );
                self.export_label.flash(EXPORTED_LABEL);
                self.timers.schedule(
                    Duration::from_millis(self.export_config.close_delay_ms),
                    TimerAction::CloseWindow,
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "export failed");
                self.status = Some(self.export_config.error_message.clone());
                self.timers.schedule(
                    Duration::from_millis(self.export_config.restore_delay_ms),
                    TimerAction::Restore(Affordance::Export),
                );
                Err(e)
            }
        }
    }

    fn write_export(&mut self, drawing: &Drawing) -> Result<ExportReport, ExportError> {
        let svg = export::cropped_svg(drawing, &self.settings)?;
        let vector_path = self.export_config.vector_path.clone();
        let vector = if is_pdf_path(&vector_path) {
            export::svg_to_pdf(&svg, self.pdf_fontdb())?
        } else {
            svg.into_bytes()
        };
        self.host.files.write(&vector_path, &vector)?;

        let pixmap = self.rasterize(drawing)?;
        let png = export::encode_png(&pixmap)?;
        let markup_path = self.export_config.markup_path.clone();
        self.host
            .files
            .write(&markup_path, export::image_tag(&png).as_bytes())?;

        Ok(ExportReport {
            vector_path,
            vector_bytes: vector.len(),
            markup_path,
            raster_width: pixmap.width(),
            raster_height: pixmap.height(),
        })
    }

    fn pdf_fontdb(&mut self) -> Arc<svg2pdf::usvg::fontdb::Database> {
        let fonts_dir = &self.fonts_dir;
        Arc::clone(
            self.pdf_fontdb
                .get_or_insert_with(|| fonts::load_pdf_fontdb(fonts_dir)),
        )
    }

    // Commands and timers

    pub fn dispatch(&mut self, command: ViewerCommand) -> Result<(), SyncError> {
        match command {
            ViewerCommand::SwitchTab(id) => {
                self.switch_tab(id)?;
            }
            ViewerCommand::PointerDown { x, y, button } => self.pointer_down(x, y, button),
            ViewerCommand::PointerMove { x, y } => self.view.pointer_move(x, y),
            ViewerCommand::PointerUp => self.view.pointer_up(),
            ViewerCommand::Wheel { delta_y } => self.view.zoom(delta_y, &self.view_config),
            ViewerCommand::Resize { width, height } => {
                self.surface = SurfaceSize::new(width, height);
            }
            ViewerCommand::ResetView => self.reset_view(),
            ViewerCommand::CopyImage => match self.copy_image() {
                Ok(()) | Err(ExportError::NoDrawing) => {}
                Err(e) => tracing::error!(error = %e, "failed to copy image"),
            },
            ViewerCommand::Export => {
                // Failures already set the status indicator.
                let _ = self.export_to_sinks();
            }
        }
        Ok(())
    }

    pub fn poll_timers(&mut self, now: Instant) {
        for action in self.timers.take_due(now) {
            match action {
                TimerAction::Restore(Affordance::CopyImage) => self.copy_label.restore(),
                TimerAction::Restore(Affordance::Export) => self.export_label.restore(),
                TimerAction::CloseWindow => {
                    self.close_requested = true;
                    self.host.window.close_current_window();
                }
                other => tracing::debug!(?other, "ignoring timer action in viewer"),
            }
        }
    }

    // Accessors

    pub fn active(&self) -> TabId {
        self.active
    }

    pub fn tabs(&self) -> &TabRegistry {
        &self.tabs
    }

    pub fn drawing(&self) -> Option<&Rc<Drawing>> {
        self.drawing.as_ref()
    }

    /// Text of the error indicator, `None` when clear.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    pub fn copy_label(&self) -> &str {
        self.copy_label.label()
    }

    pub fn export_label(&self) -> &str {
        self.export_label.label()
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use resvg::usvg;

use crate::drawing::Drawing;
use crate::error::RenderError;
use crate::fonts;
use crate::xml::sanitize_xml_text;

/// Environment variable carrying the render id to external renderers.
pub const RENDER_ID_ENV: &str = "TWINVIEW_RENDER_ID";

pub trait DiagramRenderer {
    /// Renders `source`. `id` is unique per call within the process.
    fn render(&mut self, id: &str, source: &str) -> Result<Drawing, RenderError>;
}

impl<R: DiagramRenderer + ?Sized> DiagramRenderer for Box<R> {
    fn render(&mut self, id: &str, source: &str) -> Result<Drawing, RenderError> {
        (**self).render(id, source)
    }
}

/// Source of render ids that never repeat, even across sessions started in
/// the same millisecond range.
#[derive(Debug)]
pub struct RenderIds {
    epoch_ms: u128,
    next: u64,
}

impl RenderIds {
    pub fn new() -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self { epoch_ms, next: 0 }
    }

    pub fn next_id(&mut self) -> String {
        self.next += 1;
        format!("diagram-svg-{}-{}", self.epoch_ms, self.next)
    }
}

impl Default for RenderIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Treats the source text as SVG markup.
pub struct SvgRenderer {
    fontdb: Arc<usvg::fontdb::Database>,
    fallback_size: (f32, f32),
}

impl SvgRenderer {
    pub fn new(fonts_dir: &Path, fallback_size: (f32, f32)) -> Self {
        Self::with_fontdb(fonts::load_fontdb(fonts_dir), fallback_size)
    }

    pub fn with_fontdb(fontdb: Arc<usvg::fontdb::Database>, fallback_size: (f32, f32)) -> Self {
        Self {
            fontdb,
            fallback_size,
        }
    }
}

impl DiagramRenderer for SvgRenderer {
    fn render(&mut self, id: &str, source: &str) -> Result<Drawing, RenderError> {
        tracing::debug!(render_id = id, "rendering svg source");
        Drawing::from_svg(&sanitize_xml_text(source), &self.fontdb, self.fallback_size)
            .map_err(RenderError::Syntax)
    }
}

/// Runs an external program with the source on stdin and SVG expected on stdout.
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    fontdb: Arc<usvg::fontdb::Database>,
    fallback_size: (f32, f32),
}

impl CommandRenderer {
    /// `command[0]` is the program, the rest its arguments.
    pub fn new(
        command: &[String],
        fontdb: Arc<usvg::fontdb::Database>,
        fallback_size: (f32, f32),
    ) -> Result<Self, RenderError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| RenderError::Unavailable("empty renderer command".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            fontdb,
            fallback_size,
        })
    }
}

impl DiagramRenderer for CommandRenderer {
    fn render(&mut self, id: &str, source: &str) -> Result<Drawing, RenderError> {
        tracing::debug!(render_id = id, program = %self.program, "spawning renderer");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(RENDER_ID_ENV, id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RenderError::Unavailable(format!("{}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Unavailable("renderer stdin unavailable".to_string()))?;
        let input = source.as_bytes().to_vec();
        // Feed stdin from another thread so a chatty renderer cannot deadlock us.
        let feeder = std::thread::spawn(move || stdin.write_all(&input));

        let output = child
            .wait_with_output()
            .map_err(|e| RenderError::Unavailable(format!("{}: {}", self.program, e)))?;
        match feeder.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "renderer closed stdin early"),
            Err(_) => return Err(RenderError::Unavailable("stdin writer panicked".to_string())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RenderError::Syntax(if stderr.is_empty() {
                format!("renderer exited with {}", output.status)
            } else {
                stderr
            }));
        }

        let svg = String::from_utf8_lossy(&output.stdout);
        Drawing::from_svg(&sanitize_xml_text(&svg), &self.fontdb, self.fallback_size)
            .map_err(RenderError::Syntax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::tests::empty_fontdb;

    #[test]
    fn render_ids_are_unique_and_increasing() {
        let mut ids = RenderIds::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert!(first.ends_with("-1"));
        assert!(second.ends_with("-2"));
        assert!(first.starts_with("diagram-svg-"));
    }

    #[test]
    fn svg_renderer_accepts_markup() {
        let mut renderer = SvgRenderer::with_fontdb(empty_fontdb(), (800.0, 600.0));
        let drawing = renderer
            .render(
                "id-1",
                r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 20 10"><rect width="5" height="5"/></svg>"#,
            )
            .expect("svg renders");
        assert_eq!(drawing.intrinsic_size(), (20.0, 10.0));
    }

    #[test]
    fn svg_renderer_reports_syntax_errors() {
        let mut renderer = SvgRenderer::with_fontdb(empty_fontdb(), (800.0, 600.0));
        let err = renderer
            .render("id-2", "sequenceDiagram\n\tA->>B: hi")
            .expect_err("not svg");
        assert!(matches!(err, RenderError::Syntax(_)));
    }

    #[test]
    fn svg_renderer_strips_control_characters() {
        let mut renderer = SvgRenderer::with_fontdb(empty_fontdb(), (800.0, 600.0));
        let result = renderer.render(
            "id-3",
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"4\" height=\"4\">\u{0007}</svg>",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn empty_command_is_unavailable() {
        let err = CommandRenderer::new(&[], empty_fontdb(), (1.0, 1.0))
            .err()
            .expect("empty command");
        assert!(matches!(err, RenderError::Unavailable(_)));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let mut renderer = CommandRenderer::new(
            &["twinview-no-such-renderer".to_string()],
            empty_fontdb(),
            (1.0, 1.0),
        )
        .expect("command");
        let err = renderer.render("id-4", "graph TD").expect_err("spawn fails");
        assert!(matches!(err, RenderError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn command_output_becomes_drawing() {
        let mut renderer = CommandRenderer::new(
            &["cat".to_string()],
            empty_fontdb(),
            (1.0, 1.0),
        )
        .expect("command");
        let drawing = renderer
            .render(
                "id-5",
                r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 30 40"/>"#,
            )
            .expect("cat echoes svg");
        assert_eq!(drawing.intrinsic_size(), (30.0, 40.0));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_syntax_error() {
        let mut renderer = CommandRenderer::new(
            &["sh".to_string(), "-c".to_string(), "echo 'Parse error on line 2' >&2; exit 1".to_string()],
            empty_fontdb(),
            (1.0, 1.0),
        )
        .expect("command");
        let err = renderer.render("id-6", "graph TD\n  A -->").expect_err("exit 1");
        assert_eq!(err, RenderError::Syntax("Parse error on line 2".to_string()));
    }
}

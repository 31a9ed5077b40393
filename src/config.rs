use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const INITIAL_CONTENT: &str = "sequenceDiagram\n\tAlice->>John: Hello\n\tJohn-->>Alice: Good!";
const NEW_TAB_TEMPLATE: &str = "sequenceDiagram\n\tInit->>Action: Start";
const TAB_NAME_PREFIX: &str = "Diagram";
const SYNTAX_ERROR_MESSAGE: &str = "Syntax Error";
const EXPORT_ERROR_MESSAGE: &str = "Export Error";
const FEEDBACK_DELAY_MS: u64 = 2000;
const DOCS_URL: &str = "https://mermaid.js.org/intro/";
const RENDER_CACHE_CAPACITY: usize = 16;
const SURFACE_WIDTH: f32 = 800.0;
const SURFACE_HEIGHT: f32 = 600.0;

const ZOOM_STEP: f32 = 0.1;
const MIN_SCALE: f32 = 0.1;
const FIT_PADDING: f32 = 40.0;
const FIT_MAX_SCALE: f32 = 1.5;
const FALLBACK_WIDTH: f32 = 800.0;
const FALLBACK_HEIGHT: f32 = 600.0;

const EXPORT_PADDING: f32 = 10.0;
const EXPORT_MARGIN: f32 = 30.0;
const EXPORT_DENSITY: f32 = 2.0;
const EXPORT_BACKGROUND: &str = "#ffffff";
const VECTOR_PATH: &str = "inbox_diagram.svg";
const MARKUP_PATH: &str = "inbox.html";

const FONTS_DIR: &str = "fonts";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_tab_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_initial_content")]
    pub initial_content: String,
    #[serde(default = "default_new_tab_template")]
    pub new_tab_template: String,
    #[serde(default = "default_feedback_delay_ms")]
    pub feedback_delay_ms: u64,
    #[serde(default = "default_copy_code_label")]
    pub copy_label: String,
    #[serde(default = "default_format_label")]
    pub format_label: String,
    /// Page opened by the docs action.
    #[serde(default = "default_docs_url")]
    pub docs_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_tab_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_initial_content")]
    pub initial_content: String,
    #[serde(default = "default_syntax_error_message")]
    pub syntax_error_message: String,
    /// Number of rendered drawings kept per viewer; 0 disables the cache.
    #[serde(default = "default_render_cache_capacity")]
    pub render_cache: usize,
    #[serde(default = "default_surface_width")]
    pub surface_width: f32,
    #[serde(default = "default_surface_height")]
    pub surface_height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f32,
    #[serde(default = "default_min_scale")]
    pub min_scale: f32,
    #[serde(default = "default_fit_padding")]
    pub fit_padding: f32,
    #[serde(default = "default_fit_max_scale")]
    pub fit_max_scale: f32,
    #[serde(default = "default_fallback_width")]
    pub fallback_width: f32,
    #[serde(default = "default_fallback_height")]
    pub fallback_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// Crop to the drawing's inked content plus padding and margin.
    #[default]
    ContentFit,
    /// Reproduce the visible viewer surface with the current pan/zoom.
    ViewportFit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub mode: ExportMode,
    #[serde(default = "default_export_padding")]
    pub padding: f32,
    #[serde(default = "default_export_margin")]
    pub margin: f32,
    #[serde(default = "default_export_density")]
    pub density: f32,
    #[serde(default = "default_export_background")]
    pub background: String,
    /// Cropped vector output; a `.pdf` extension selects PDF.
    #[serde(default = "default_vector_path")]
    pub vector_path: PathBuf,
    /// Markup file receiving the embedded PNG.
    #[serde(default = "default_markup_path")]
    pub markup_path: PathBuf,
    #[serde(default = "default_feedback_delay_ms")]
    pub close_delay_ms: u64,
    #[serde(default = "default_feedback_delay_ms")]
    pub restore_delay_ms: u64,
    #[serde(default = "default_export_error_message")]
    pub error_message: String,
    #[serde(default = "default_copy_image_label")]
    pub copy_label: String,
    #[serde(default = "default_export_label")]
    pub export_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// External renderer program and arguments. When absent the source is
    /// treated as SVG markup.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: PathBuf,
}

fn default_tab_prefix() -> String {
    TAB_NAME_PREFIX.to_string()
}
fn default_initial_content() -> String {
    INITIAL_CONTENT.to_string()
}
fn default_new_tab_template() -> String {
    NEW_TAB_TEMPLATE.to_string()
}
fn default_feedback_delay_ms() -> u64 {
    FEEDBACK_DELAY_MS
}
fn default_copy_code_label() -> String {
    "Copy Code".to_string()
}
fn default_format_label() -> String {
    "Format".to_string()
}
fn default_docs_url() -> String {
    DOCS_URL.to_string()
}
fn default_syntax_error_message() -> String {
    SYNTAX_ERROR_MESSAGE.to_string()
}
fn default_render_cache_capacity() -> usize {
    RENDER_CACHE_CAPACITY
}
fn default_surface_width() -> f32 {
    SURFACE_WIDTH
}
fn default_surface_height() -> f32 {
    SURFACE_HEIGHT
}
fn default_zoom_step() -> f32 {
    ZOOM_STEP
}
fn default_min_scale() -> f32 {
    MIN_SCALE
}
fn default_fit_padding() -> f32 {
    FIT_PADDING
}
fn default_fit_max_scale() -> f32 {
    FIT_MAX_SCALE
}
fn default_fallback_width() -> f32 {
    FALLBACK_WIDTH
}
fn default_fallback_height() -> f32 {
    FALLBACK_HEIGHT
}
fn default_export_padding() -> f32 {
    EXPORT_PADDING
}
fn default_export_margin() -> f32 {
    EXPORT_MARGIN
}
fn default_export_density() -> f32 {
    EXPORT_DENSITY
}
fn default_export_background() -> String {
    EXPORT_BACKGROUND.to_string()
}
fn default_vector_path() -> PathBuf {
    PathBuf::from(VECTOR_PATH)
}
fn default_markup_path() -> PathBuf {
    PathBuf::from(MARKUP_PATH)
}
fn default_export_error_message() -> String {
    EXPORT_ERROR_MESSAGE.to_string()
}
fn default_copy_image_label() -> String {
    "Copy Image".to_string()
}
fn default_export_label() -> String {
    "Export".to_string()
}
fn default_fonts_dir() -> PathBuf {
    PathBuf::from(FONTS_DIR)
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_tab_prefix(),
            initial_content: default_initial_content(),
            new_tab_template: default_new_tab_template(),
            feedback_delay_ms: default_feedback_delay_ms(),
            copy_label: default_copy_code_label(),
            format_label: default_format_label(),
            docs_url: default_docs_url(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_tab_prefix(),
            initial_content: default_initial_content(),
            syntax_error_message: default_syntax_error_message(),
            render_cache: default_render_cache_capacity(),
            surface_width: default_surface_width(),
            surface_height: default_surface_height(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_step: ZOOM_STEP,
            min_scale: MIN_SCALE,
            fit_padding: FIT_PADDING,
            fit_max_scale: FIT_MAX_SCALE,
            fallback_width: FALLBACK_WIDTH,
            fallback_height: FALLBACK_HEIGHT,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mode: ExportMode::default(),
            padding: EXPORT_PADDING,
            margin: EXPORT_MARGIN,
            density: EXPORT_DENSITY,
            background: default_export_background(),
            vector_path: default_vector_path(),
            markup_path: default_markup_path(),
            close_delay_ms: FEEDBACK_DELAY_MS,
            restore_delay_ms: FEEDBACK_DELAY_MS,
            error_message: default_export_error_message(),
            copy_label: default_copy_image_label(),
            export_label: default_export_label(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: None,
            fonts_dir: default_fonts_dir(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML config: {}", e))
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        serde_yaml::from_str(content).map_err(|e| format!("Failed to parse YAML config: {}", e))
    }

    /// Reads a config file, trying TOML first and then YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match Self::from_toml(&content) {
            Ok(config) => Ok(config),
            Err(toml_err) => Self::from_yaml(&content)
                .map_err(|yaml_err| ConfigError::Parse(format!("{}; {}", toml_err, yaml_err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ExportMode};

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml("").expect("empty config");
        assert_eq!(config.view.zoom_step, 0.1);
        assert_eq!(config.view.fit_max_scale, 1.5);
        assert_eq!(config.export.padding, 10.0);
        assert_eq!(config.export.margin, 30.0);
        assert_eq!(config.export.density, 2.0);
        assert_eq!(config.export.mode, ExportMode::ContentFit);
        assert_eq!(config.viewer.syntax_error_message, "Syntax Error");
    }

    #[test]
    fn toml_overrides_single_fields() {
        let config = Config::from_toml(
            r#"
[export]
mode = "viewport-fit"
vector_path = "/tmp/out.pdf"

[renderer]
command = ["mmdc", "-i", "-", "-o", "-", "-e", "svg"]
"#,
        )
        .expect("toml config");

        assert_eq!(config.export.mode, ExportMode::ViewportFit);
        assert_eq!(config.export.vector_path.to_str(), Some("/tmp/out.pdf"));
        assert_eq!(config.export.margin, 30.0);
        assert_eq!(config.renderer.command.as_ref().map(Vec::len), Some(7));
    }

    #[test]
    fn yaml_is_accepted() {
        let config = Config::from_yaml(
            "view:\n  fit_max_scale: 2.0\nexport:\n  density: 3.0\n",
        )
        .expect("yaml config");
        assert_eq!(config.view.fit_max_scale, 2.0);
        assert_eq!(config.export.density, 3.0);
        assert_eq!(config.view.min_scale, 0.1);
    }
}

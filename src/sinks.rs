use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SinkError;

/// Straight-alpha RGBA pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub trait ClipboardSink {
    fn write_text(&mut self, text: &str) -> Result<(), SinkError>;
    fn write_image(&mut self, image: &RasterImage) -> Result<(), SinkError>;
}

pub trait FileSink {
    fn write(&mut self, path: &Path, contents: &[u8]) -> Result<(), SinkError>;
}

pub trait WindowControl {
    fn close_current_window(&mut self);
}

pub trait UrlOpener {
    fn open_url(&mut self, url: &str) -> Result<(), SinkError>;
}

/// The OS clipboard, opened per write.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), SinkError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| SinkError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| SinkError::Clipboard(e.to_string()))
    }

    fn write_image(&mut self, image: &RasterImage) -> Result<(), SinkError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| SinkError::Clipboard(e.to_string()))?;
        clipboard
            .set_image(arboard::ImageData {
                width: image.width as usize,
                height: image.height as usize,
                bytes: Cow::Borrowed(&image.rgba),
            })
            .map_err(|e| SinkError::Clipboard(e.to_string()))
    }
}

/// Writes straight to the local filesystem.
#[derive(Debug, Default)]
pub struct FsSink;

impl FileSink for FsSink {
    fn write(&mut self, path: &Path, contents: &[u8]) -> Result<(), SinkError> {
        std::fs::write(path, contents).map_err(|source| SinkError::File {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Window without a UI: close requests are logged and counted.
#[derive(Debug, Clone, Default)]
pub struct HeadlessWindow {
    closes: Arc<Mutex<usize>>,
}

impl HeadlessWindow {
    pub fn close_requests(&self) -> usize {
        *self.closes.lock()
    }
}

impl WindowControl for HeadlessWindow {
    fn close_current_window(&mut self) {
        tracing::info!("window close requested");
        *self.closes.lock() += 1;
    }
}

/// The platform's default browser.
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open_url(&mut self, url: &str) -> Result<(), SinkError> {
        open::that(url).map_err(|source| SinkError::Browser {
            url: url.to_string(),
            source,
        })
    }
}

/// Records opened URLs instead of launching anything. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct MemoryBrowser {
    opened: Arc<Mutex<Vec<String>>>,
    failing: bool,
}

impl MemoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl UrlOpener for MemoryBrowser {
    fn open_url(&mut self, url: &str) -> Result<(), SinkError> {
        if self.failing {
            return Err(SinkError::Browser {
                url: url.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"),
            });
        }
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ClipboardState {
    text: Option<String>,
    image: Option<RasterImage>,
}

/// In-memory clipboard. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    state: Arc<Mutex<ClipboardState>>,
    failing: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard that rejects every write.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn text(&self) -> Option<String> {
        self.state.lock().text.clone()
    }

    pub fn image(&self) -> Option<RasterImage> {
        self.state.lock().image.clone()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), SinkError> {
        if self.failing {
            return Err(SinkError::Clipboard("clipboard unavailable".to_string()));
        }
        self.state.lock().text = Some(text.to_string());
        Ok(())
    }

    fn write_image(&mut self, image: &RasterImage) -> Result<(), SinkError> {
        if self.failing {
            return Err(SinkError::Clipboard("clipboard unavailable".to_string()));
        }
        self.state.lock().image = Some(image.clone());
        Ok(())
    }
}

/// In-memory file store. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
    fail_on: Option<PathBuf>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes to `path` and accepts everything else.
    pub fn failing_on(path: impl Into<PathBuf>) -> Self {
        Self {
            fail_on: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }
}

impl FileSink for MemoryFiles {
    fn write(&mut self, path: &Path, contents: &[u8]) -> Result<(), SinkError> {
        if self.fail_on.as_deref() == Some(path) {
            return Err(SinkError::File {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.files
            .lock()
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }
}

//! Split editor/viewer core for textual diagrams.

pub mod bus;
pub mod config;
pub mod drawing;
pub mod editor;
pub mod error;
pub mod export;
pub mod feedback;
pub mod fonts;
pub mod format;
pub mod renderer;
pub mod sinks;
pub mod tabs;
pub mod transform;
pub mod viewer;
pub mod xml;

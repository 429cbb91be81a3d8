//! Terminal rendering using ratatui.
//!
//! Each view renders into a caller-provided area; shared chrome (header,
//! tabs, status bar, help) lives in [`common`], themes in [`theme`].

pub mod common;
pub mod detail;
pub mod status;
pub mod theme;
pub mod timeline_view;

pub use status::SortColumn;
pub use theme::Theme;

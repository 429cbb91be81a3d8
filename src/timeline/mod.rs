//! Interactive timeline matrix: scales, viewport state, and the renderer.

pub mod chart;
pub mod scale;
pub mod viewport;

pub use chart::{
    default_tooltip, ClickTarget, Timeline, TimelineCell, TimelineConfig, TimelineData, TooltipPos,
};
pub use scale::{CellUnit, Palette, Rgb, TimeScale, ZoomTransform, CELL_PAD};
pub use viewport::{PanDirection, ViewportState, ZoomDirection, PAN_AMOUNT};

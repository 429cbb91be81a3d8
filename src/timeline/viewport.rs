//! Pan/zoom viewport state for the timeline.
//!
//! Owned exclusively by the render side; the data layer never reads or
//! writes it, and a data refresh must not reset it. All gesture math runs
//! synchronously; the only time-dependent piece is the short linear-eased
//! transition stepped from the main loop.

use std::time::{Duration, Instant};

use super::scale::ZoomTransform;

/// Columns moved by one discrete pan step.
pub const PAN_AMOUNT: f64 = 10.0;
/// Scale factor applied by one discrete zoom step.
const ZOOM_FACTOR: f64 = 1.5;

const PAN_TRANSITION: Duration = Duration::from_millis(200);
const RESET_TRANSITION: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// An in-flight eased transition between two transforms.
#[derive(Debug, Clone, Copy)]
struct Transition {
    from: ZoomTransform,
    to: ZoomTransform,
    started: Instant,
    duration: Duration,
}

/// Current view of the time axis: transform, clamp extent, and the pixel
/// geometry the last render used.
#[derive(Debug, Clone)]
pub struct ViewportState {
    pub transform: ZoomTransform,
    /// `[min, max]` clamp for the scale factor. Pan is unconstrained.
    pub scale_extent: (f64, f64),
    /// Plot width in columns, updated by the render pass.
    pub pixel_width: f64,
    transition: Option<Transition>,
}

impl ViewportState {
    pub fn new(scale_extent: (f64, f64)) -> Self {
        Self {
            transform: ZoomTransform::identity(),
            scale_extent,
            pixel_width: 0.0,
            transition: None,
        }
    }

    /// Discrete button-style pan by a fixed column amount.
    pub fn pan(&mut self, dir: PanDirection) {
        let amount = match dir {
            PanDirection::Right => PAN_AMOUNT,
            PanDirection::Left => -PAN_AMOUNT,
        };
        let target = ZoomTransform { k: self.transform.k, x: self.transform.x - amount };
        self.start_transition(target, PAN_TRANSITION);
    }

    /// Continuous drag pan: translate by a raw column delta, immediately.
    pub fn drag(&mut self, dx: f64) {
        self.transition = None;
        self.transform.x += dx;
    }

    /// Zoom by one step around the viewport center, clamped to the extent.
    pub fn zoom(&mut self, dir: ZoomDirection) {
        let factor = match dir {
            ZoomDirection::In => ZOOM_FACTOR,
            ZoomDirection::Out => 1.0 / ZOOM_FACTOR,
        };
        self.zoom_by(factor);
    }

    /// Zoom by an arbitrary factor (wheel gestures), clamped to the extent.
    pub fn zoom_by(&mut self, factor: f64) {
        let (min, max) = self.scale_extent;
        let current = self.transform;

        let target_scale = (current.k * factor).clamp(min, max);
        if (target_scale - current.k).abs() < 1e-9 {
            return;
        }
        let factor = target_scale / current.k;

        // Center each vector, stretch, then put back.
        let center = self.pixel_width / 2.0;
        let x = (current.x - center) * factor + center;

        self.start_transition(ZoomTransform { k: target_scale, x }, PAN_TRANSITION);
    }

    /// Return to the identity transform.
    pub fn reset(&mut self) {
        self.start_transition(ZoomTransform::identity(), RESET_TRANSITION);
    }

    fn start_transition(&mut self, to: ZoomTransform, duration: Duration) {
        self.transition = Some(Transition {
            from: self.transform,
            to,
            started: Instant::now(),
            duration,
        });
    }

    /// Step any in-flight transition. Returns true while the transform is
    /// still changing, so the caller knows another redraw is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(t) = self.transition else {
            return false;
        };

        let elapsed = now.saturating_duration_since(t.started);
        if elapsed >= t.duration {
            self.transform = t.to;
            self.transition = None;
            return false;
        }

        let frac = elapsed.as_secs_f64() / t.duration.as_secs_f64();
        self.transform = ZoomTransform {
            k: t.from.k + (t.to.k - t.from.k) * frac,
            x: t.from.x + (t.to.x - t.from.x) * frac,
        };
        true
    }

    /// Target transform, with any in-flight transition resolved.
    fn settled(&self) -> ZoomTransform {
        self.transition.map(|t| t.to).unwrap_or(self.transform)
    }

    /// Finish any in-flight transition immediately. Test helper and escape
    /// hatch for callers that need the settled transform now.
    pub fn settle(&mut self) {
        self.transform = self.settled();
        self.transition = None;
    }
}

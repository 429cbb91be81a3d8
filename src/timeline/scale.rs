//! Scale and layout functions for the timeline matrix.
//!
//! Maps the time domain and the discrete row domain onto fractional column
//! positions, and metric values onto colors. Scales are computed fresh from
//! the current data on every render; nothing here holds cross-render state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::chart::TimelineCell;

/// Gap between adjacent cells, in fractional columns. Cell widths are
/// floored to this value so even zero-duration samples stay visible.
pub const CELL_PAD: f64 = 0.5;

/// Assumed duration of a sample with no explicit end time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CellUnit {
    #[default]
    Hour,
    Day,
}

impl CellUnit {
    pub fn duration(self) -> Duration {
        match self {
            CellUnit::Hour => Duration::hours(1),
            CellUnit::Day => Duration::days(1),
        }
    }
}

/// An RGB color, configurable as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Rgb(r, g, b))
    }
}

impl Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2))
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgb::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("bad hex color: {}", s)))
    }
}

/// Cell color palette. The spectrum is the failure gradient; its middle
/// stop sits at the fixed ten-issue knee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub neutral: Rgb,
    pub pass: Rgb,
    pub warning: Rgb,
    pub spectrum: [Rgb; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            neutral: Rgb(0xdc, 0xdc, 0xdc),
            pass: Rgb(0x4c, 0xc9, 0x48),
            warning: Rgb(0xd4, 0x93, 0x18),
            spectrum: [Rgb(0xff, 0x86, 0x86), Rgb(0x89, 0x00, 0x00), Rgb(0x52, 0x00, 0x00)],
        }
    }
}

/// Linear mapping from a time domain onto a column range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    pub domain: (DateTime<Utc>, DateTime<Utc>),
    pub range: (f64, f64),
}

impl TimeScale {
    pub fn new(domain: (DateTime<Utc>, DateTime<Utc>), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    fn span_ms(&self) -> f64 {
        ((self.domain.1 - self.domain.0).num_milliseconds() as f64).max(1.0)
    }

    /// Map a timestamp to a fractional column position.
    pub fn scale(&self, t: DateTime<Utc>) -> f64 {
        let frac = (t - self.domain.0).num_milliseconds() as f64 / self.span_ms();
        self.range.0 + frac * (self.range.1 - self.range.0)
    }

    /// Map a column position back to a timestamp.
    pub fn invert(&self, px: f64) -> DateTime<Utc> {
        let width = (self.range.1 - self.range.0).abs().max(f64::EPSILON);
        let frac = (px - self.range.0) / width;
        self.domain.0 + Duration::milliseconds((frac * self.span_ms()).round() as i64)
    }
}

/// Uniform band scale over an ordered set of row labels.
#[derive(Debug, Clone)]
pub struct BandScale {
    labels: Vec<String>,
    range: (f64, f64),
}

impl BandScale {
    pub fn new(labels: Vec<String>, range: (f64, f64)) -> Self {
        Self { labels, range }
    }

    /// Equal height per row, independent of how many cells a row holds.
    pub fn bandwidth(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        (self.range.1 - self.range.0) / self.labels.len() as f64
    }

    /// Top edge of a row's band.
    pub fn position(&self, label: &str) -> Option<f64> {
        let idx = self.labels.iter().position(|l| l == label)?;
        Some(self.range.0 + idx as f64 * self.bandwidth())
    }

    /// Label whose band covers the given position.
    pub fn label_at(&self, y: f64) -> Option<&str> {
        let bw = self.bandwidth();
        if bw <= 0.0 || y < self.range.0 || y >= self.range.1 {
            return None;
        }
        let idx = ((y - self.range.0) / bw) as usize;
        self.labels.get(idx).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Pan/zoom transform over the x axis: `px' = px * k + x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTransform {
    pub k: f64,
    pub x: f64,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ZoomTransform {
    pub fn identity() -> Self {
        Self { k: 1.0, x: 0.0 }
    }

    pub fn is_identity(&self) -> bool {
        (self.k - 1.0).abs() < 1e-9 && self.x.abs() < 1e-9
    }

    /// Rescale a time scale through this transform, as a zoom gesture does:
    /// the new scale maps the same range onto the visible slice of the
    /// domain.
    pub fn rescale(&self, scale: &TimeScale) -> TimeScale {
        let d0 = scale.invert((scale.range.0 - self.x) / self.k);
        let d1 = scale.invert((scale.range.1 - self.x) / self.k);
        TimeScale::new((d0, d1), scale.range)
    }
}

/// Time domain over flattened cells: `[min, max + cell unit]`, unless a
/// caller-supplied override pins either end (override always wins — used
/// for fixed trailing windows independent of sparse data).
pub fn time_domain(
    cells: &[TimelineCell],
    unit: CellUnit,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if let (Some(s), Some(e)) = (start, end) {
        return Some((s, e));
    }

    let min = cells.iter().map(|c| c.timestamp).min()?;
    let max = cells.iter().map(|c| c.timestamp).max()?;
    Some((start.unwrap_or(min), end.unwrap_or(max + unit.duration())))
}

/// Width of a cell in fractional columns under the given (possibly
/// rescaled) x-scale. Never negative: anything at or below the gap floors
/// to the gap itself, so heavily zoomed-out or degenerate cells keep a
/// visible sliver.
pub fn cell_width(cell: &TimelineCell, scale: &TimeScale, unit: CellUnit) -> f64 {
    let right = match cell.end {
        Some(end) => scale.scale(end),
        None => scale.scale(cell.timestamp + unit.duration()),
    };
    let w = right - scale.scale(cell.timestamp);

    if w > CELL_PAD {
        w - CELL_PAD
    } else {
        CELL_PAD
    }
}

/// Value→color gradient over the failure spectrum, with stops at
/// `[min, 10, max]` of the observed values. The fixed knee separates "a
/// few" from "many" issues regardless of the true maximum.
#[derive(Debug, Clone)]
pub struct ColorScale {
    stops: [(f64, Rgb); 3],
}

const GRADIENT_KNEE: f64 = 10.0;

impl ColorScale {
    pub fn from_cells(cells: &[TimelineCell], palette: &Palette) -> Self {
        let values: Vec<f64> = cells.iter().filter_map(|c| c.value.as_ref()?.as_f64()).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (min, max) = if values.is_empty() { (0.0, GRADIENT_KNEE) } else { (min, max) };

        Self {
            stops: [
                (min, palette.spectrum[0]),
                (GRADIENT_KNEE, palette.spectrum[1]),
                (max, palette.spectrum[2]),
            ],
        }
    }

    /// Piecewise-linear interpolation across the three stops, clamped at
    /// the ends.
    pub fn color(&self, value: f64) -> Rgb {
        let [(v0, c0), (v1, c1), (v2, c2)] = self.stops;
        if value <= v0 {
            c0
        } else if value <= v1 {
            lerp(c0, c1, ratio(value, v0, v1))
        } else if value < v2 {
            lerp(c1, c2, ratio(value, v1, v2))
        } else {
            c2
        }
    }
}

fn ratio(v: f64, lo: f64, hi: f64) -> f64 {
    if hi - lo <= 0.0 {
        1.0
    } else {
        (v - lo) / (hi - lo)
    }
}

fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    Rgb(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Fill color for a cell: no value is neutral, positive warnings are
/// orange, zero passes, anything else falls into the gradient.
pub fn cell_color(cell: &TimelineCell, scale: &ColorScale, palette: &Palette) -> Rgb {
    use crate::data::record::Severity;

    let Some(value) = cell.value.as_ref() else {
        return palette.neutral;
    };
    let Some(n) = value.as_f64() else {
        return palette.neutral;
    };

    if n > 0.0 && cell.meta.severity == Some(Severity::Warning) {
        palette.warning
    } else if n == 0.0 {
        palette.pass
    } else {
        scale.color(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::{Meta, MetricValue, Severity};
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap()
    }

    fn cell(row: &str, t: DateTime<Utc>, value: Option<f64>) -> TimelineCell {
        TimelineCell {
            row: row.to_string(),
            timestamp: t,
            end: None,
            value: value.map(MetricValue::Number),
            meta: Meta::default(),
        }
    }

    #[test]
    fn test_time_domain_pads_by_cell_unit() {
        let cells = vec![cell("a", ts(3), Some(0.0)), cell("a", ts(1), Some(0.0))];
        let (start, end) = time_domain(&cells, CellUnit::Hour, None, None).unwrap();
        assert_eq!(start, ts(1));
        assert_eq!(end, ts(4));
    }

    #[test]
    fn test_time_domain_override_wins() {
        let cells = vec![cell("a", ts(3), Some(0.0))];
        let (start, end) = time_domain(&cells, CellUnit::Hour, Some(ts(0)), Some(ts(12))).unwrap();
        assert_eq!((start, end), (ts(0), ts(12)));

        // override also wins with no data at all
        let (start, end) = time_domain(&[], CellUnit::Hour, Some(ts(0)), Some(ts(12))).unwrap();
        assert_eq!((start, end), (ts(0), ts(12)));
        assert!(time_domain(&[], CellUnit::Hour, None, None).is_none());
    }

    #[test]
    fn test_time_scale_round_trip() {
        let scale = TimeScale::new((ts(0), ts(10)), (0.0, 100.0));
        assert_eq!(scale.scale(ts(0)), 0.0);
        assert_eq!(scale.scale(ts(10)), 100.0);
        assert_eq!(scale.scale(ts(5)), 50.0);
        assert_eq!(scale.invert(50.0), ts(5));
    }

    #[test]
    fn test_band_scale_uniform_bands() {
        let scale = BandScale::new(vec!["a".into(), "b".into(), "c".into()], (0.0, 9.0));
        assert_eq!(scale.bandwidth(), 3.0);
        assert_eq!(scale.position("a"), Some(0.0));
        assert_eq!(scale.position("c"), Some(6.0));
        assert_eq!(scale.label_at(4.5), Some("b"));
        assert_eq!(scale.label_at(9.0), None);
    }

    #[test]
    fn test_cell_width_never_negative() {
        let scale = TimeScale::new((ts(0), ts(10)), (0.0, 100.0));

        // normal cell: one hour is 10 columns wide, minus the gap
        let c = cell("a", ts(1), Some(0.0));
        assert_eq!(cell_width(&c, &scale, CellUnit::Hour), 10.0 - CELL_PAD);

        // degenerate end < timestamp floors to the gap
        let mut c = cell("a", ts(5), Some(0.0));
        c.end = Some(ts(2));
        assert_eq!(cell_width(&c, &scale, CellUnit::Hour), CELL_PAD);

        // zero-duration cell floors to the gap
        let mut c = cell("a", ts(5), Some(0.0));
        c.end = Some(ts(5));
        assert_eq!(cell_width(&c, &scale, CellUnit::Hour), CELL_PAD);
    }

    #[test]
    fn test_rescale_zoom_in_narrows_domain() {
        let scale = TimeScale::new((ts(0), ts(10)), (0.0, 100.0));
        let t = ZoomTransform { k: 2.0, x: 0.0 };
        let rescaled = t.rescale(&scale);
        assert_eq!(rescaled.domain.0, ts(0));
        assert_eq!(rescaled.domain.1, ts(5));

        // identity rescale is a no-op
        let same = ZoomTransform::identity().rescale(&scale);
        assert_eq!(same.domain, scale.domain);
    }

    #[test]
    fn test_color_rules() {
        let palette = Palette::default();
        let cells = vec![
            cell("a", ts(0), Some(1.0)),
            cell("a", ts(1), Some(25.0)),
            cell("a", ts(2), Some(0.0)),
        ];
        let scale = ColorScale::from_cells(&cells, &palette);

        // no value → neutral
        assert_eq!(cell_color(&cell("a", ts(0), None), &scale, &palette), palette.neutral);

        // zero → pass
        assert_eq!(cell_color(&cell("a", ts(0), Some(0.0)), &scale, &palette), palette.pass);

        // positive with warning severity → warning color
        let mut warn = cell("a", ts(0), Some(3.0));
        warn.meta.severity = Some(Severity::Warning);
        assert_eq!(cell_color(&warn, &scale, &palette), palette.warning);

        // observed max maps to the gradient's last stop
        assert_eq!(
            cell_color(&cell("a", ts(0), Some(25.0)), &scale, &palette),
            palette.spectrum[2]
        );

        // the observed minimum anchors the gradient's first stop
        assert_eq!(scale.color(0.0), palette.spectrum[0]);
    }

    #[test]
    fn test_rgb_hex_round_trip() {
        let c = Rgb::from_hex("#d49318").unwrap();
        assert_eq!(c, Rgb(0xd4, 0x93, 0x18));
        assert!(Rgb::from_hex("d49318").is_none());
        assert!(Rgb::from_hex("#xyz").is_none());

        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"#d49318\"");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}

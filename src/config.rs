//! Dashboard settings.
//!
//! Loaded from an optional TOML file layered with `FLEETWATCH_*`
//! environment overrides. Every field has a default mirroring the
//! production deployment, so running with no settings file works.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::timeline::{CellUnit, Palette, TooltipPos};

/// Elapsed-time thresholds for node reporting status, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// A host silent longer than this marks the whole node not reporting.
    pub fail_ms: i64,
    /// Elapsed times beyond this are flagged in the status table.
    pub warn_ms: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            fail_ms: 360_000,
            warn_ms: 180_000,
        }
    }
}

/// All tunables for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub thresholds: Thresholds,
    /// Host-name suffix → short alias, used when keying per-host maps.
    pub host_suffixes: BTreeMap<String, String>,
    pub cell_unit: CellUnit,
    /// `[min, max]` clamp for the timeline zoom factor.
    pub scale_extent: (f64, f64),
    /// Timeline rows drawn before the reveal affordance kicks in.
    pub row_limit: Option<usize>,
    pub tooltip_pos: TooltipPos,
    pub palette: Palette,
}

impl Default for Settings {
    fn default() -> Self {
        let mut host_suffixes = BTreeMap::new();
        host_suffixes.insert("ws-rpi".to_string(), "rpi".to_string());
        host_suffixes.insert("ws-nxcore".to_string(), "nx".to_string());
        host_suffixes.insert("ws-nxagent".to_string(), "nxagent".to_string());

        Self {
            thresholds: Thresholds::default(),
            host_suffixes,
            cell_unit: CellUnit::Hour,
            scale_extent: (0.2, 30.0),
            row_limit: None,
            tooltip_pos: TooltipPos::Bottom,
            palette: Palette::default(),
        }
    }
}

impl Settings {
    /// Load settings: optional TOML file, then `FLEETWATCH_*` environment
    /// variables on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix("FLEETWATCH"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_deployment() {
        let s = Settings::default();
        assert_eq!(s.thresholds.fail_ms, 360_000);
        assert_eq!(s.thresholds.warn_ms, 180_000);
        assert_eq!(s.host_suffixes["ws-nxcore"], "nx");
        assert_eq!(s.host_suffixes["ws-rpi"], "rpi");
        assert_eq!(s.scale_extent, (0.2, 30.0));
        assert_eq!(s.cell_unit, CellUnit::Hour);
        assert_eq!(s.tooltip_pos, TooltipPos::Bottom);
        assert!(s.row_limit.is_none());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let s = Settings::load(None).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
                cell_unit = "day"
                row_limit = 10

                [thresholds]
                fail_ms = 600000
            "#
        )
        .unwrap();

        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.cell_unit, CellUnit::Day);
        assert_eq!(s.row_limit, Some(10));
        assert_eq!(s.thresholds.fail_ms, 600_000);
        // unspecified fields keep their defaults
        assert_eq!(s.thresholds.warn_ms, 180_000);
        assert_eq!(s.host_suffixes["ws-rpi"], "rpi");
    }
}

//! Per-type rendering styles.
//!
//! Styles are read from a JSON object keyed by type id:
//!
//! ```json
//! {
//!   "0": { "marker": "o", "s": 4, "color": "C1" },
//!   "1": { "circle": [0.5, "red"], "omit": true }
//! }
//! ```
//!
//! Every entry is validated when the table is loaded. Types without an entry
//! are drawn with [`StyleEntry::default`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::core::loaders::TypeId;

/// Errors that can occur while loading a style table.
#[derive(Error, Debug)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid style JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("style key '{0}' is not an integer type id")]
    InvalidTypeId(String),

    #[error("unknown marker '{0}'")]
    UnknownMarker(String),

    #[error("unrecognised color '{0}'")]
    InvalidColor(String),
}

/// Result type for style operations.
pub type Result<T> = std::result::Result<T, StyleError>;

/// Matplotlib's default ten-color cycle (`C0`..`C9`).
pub const DEFAULT_CYCLE: [Rgb; 10] = [
    Rgb(31, 119, 180),  // blue
    Rgb(255, 127, 14),  // orange
    Rgb(44, 160, 44),   // green
    Rgb(214, 39, 40),   // red
    Rgb(148, 103, 189), // purple
    Rgb(140, 86, 75),   // brown
    Rgb(227, 119, 194), // pink
    Rgb(127, 127, 127), // gray
    Rgb(188, 189, 34),  // olive
    Rgb(23, 190, 207),  // cyan
];

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    fn from_hex(hex: &str) -> Option<Self> {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;

        match digits.as_slice() {
            [r, g, b] => Some(Rgb(r * 17, g * 17, b * 17)),
            [r1, r2, g1, g2, b1, b2] => Some(Rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
            _ => None,
        }
    }
}

impl FromStr for Rgb {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();

        if let Some(hex) = name.strip_prefix('#') {
            return Rgb::from_hex(hex).ok_or_else(|| StyleError::InvalidColor(s.to_string()));
        }

        if let Some(idx) = name.strip_prefix('c') {
            if let Ok(i) = idx.parse::<usize>() {
                return DEFAULT_CYCLE
                    .get(i)
                    .copied()
                    .ok_or_else(|| StyleError::InvalidColor(s.to_string()));
            }
        }

        let rgb = match name.as_str() {
            "r" | "red" => Rgb(255, 0, 0),
            "g" => Rgb(0, 128, 0),
            "green" => Rgb(0, 128, 0),
            "b" | "blue" => Rgb(0, 0, 255),
            "c" | "cyan" => Rgb(0, 191, 191),
            "m" | "magenta" => Rgb(191, 0, 191),
            "y" | "yellow" => Rgb(191, 191, 0),
            "k" | "black" => Rgb(0, 0, 0),
            "w" | "white" => Rgb(255, 255, 255),
            "orange" => Rgb(255, 165, 0),
            "purple" => Rgb(128, 0, 128),
            "brown" => Rgb(165, 42, 42),
            "pink" => Rgb(255, 192, 203),
            "gray" | "grey" => Rgb(128, 128, 128),
            "navy" => Rgb(0, 0, 128),
            "olive" => Rgb(128, 128, 0),
            "teal" => Rgb(0, 128, 128),
            _ => return Err(StyleError::InvalidColor(s.to_string())),
        };
        Ok(rgb)
    }
}

impl TryFrom<String> for Rgb {
    type Error = StyleError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Marker symbol used for scatter points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Marker {
    /// `+`
    #[default]
    Plus,
    /// `x`
    Cross,
    /// `.`
    Point,
    /// `o`
    Circle,
    /// `s`
    Square,
    /// `^`
    Triangle,
    /// `D`
    Diamond,
}

impl FromStr for Marker {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Marker::Plus),
            "x" => Ok(Marker::Cross),
            "." => Ok(Marker::Point),
            "o" => Ok(Marker::Circle),
            "s" => Ok(Marker::Square),
            "^" => Ok(Marker::Triangle),
            "D" | "d" => Ok(Marker::Diamond),
            other => Err(StyleError::UnknownMarker(other.to_string())),
        }
    }
}

impl TryFrom<String> for Marker {
    type Error = StyleError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Marker::Plus => "+",
            Marker::Cross => "x",
            Marker::Point => ".",
            Marker::Circle => "o",
            Marker::Square => "s",
            Marker::Triangle => "^",
            Marker::Diamond => "D",
        };
        f.write_str(symbol)
    }
}

/// Translucent circle drawn around every point of a type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "(f64, Rgb)")]
pub struct CircleOverlay {
    /// Radius in data units.
    pub radius: f64,
    pub color: Rgb,
}

impl From<(f64, Rgb)> for CircleOverlay {
    fn from((radius, color): (f64, Rgb)) -> Self {
        Self { radius, color }
    }
}

fn default_size() -> f64 {
    1.0
}

/// Rendering style for one point type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StyleEntry {
    #[serde(default)]
    pub marker: Marker,

    /// Marker area in square points.
    #[serde(rename = "s", alias = "size", default = "default_size")]
    pub size: f64,

    #[serde(alias = "c", default)]
    pub color: Option<Rgb>,

    #[serde(default)]
    pub circle: Option<CircleOverlay>,

    /// Skip the scatter markers for this type.
    #[serde(default)]
    pub omit: bool,

    /// Legend text.
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub alpha: Option<f64>,

    /// Scatter keys with no counterpart in this renderer.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for StyleEntry {
    fn default() -> Self {
        Self {
            marker: Marker::Plus,
            size: default_size(),
            color: None,
            circle: None,
            omit: false,
            label: None,
            alpha: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Effective style for one type in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    /// Scatter style, or `None` when markers are omitted.
    pub scatter: Option<StyleEntry>,
    pub circle: Option<CircleOverlay>,
}

/// Read-only table of per-type style overrides.
#[derive(Debug, Clone, Default)]
pub struct StyleTable {
    entries: HashMap<TypeId, StyleEntry>,
}

impl StyleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a style table from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, StyleEntry> = serde_json::from_str(json)?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (key, entry) in raw {
            let type_id: TypeId = key
                .trim()
                .parse()
                .map_err(|_| StyleError::InvalidTypeId(key.clone()))?;

            if !entry.extra.is_empty() {
                let keys: Vec<&str> = entry.extra.keys().map(String::as_str).collect();
                warn!("style for type {}: ignoring unsupported keys {:?}", type_id, keys);
            }
            entries.insert(type_id, entry);
        }

        Ok(Self { entries })
    }

    /// Load a style table from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn insert(&mut self, type_id: TypeId, entry: StyleEntry) {
        self.entries.insert(type_id, entry);
    }

    pub fn get(&self, type_id: TypeId) -> Option<&StyleEntry> {
        self.entries.get(&type_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the style for `type_id`.
    ///
    /// The table entry (or the default) is cloned, so nothing drawn in one
    /// frame can leak into the next. The circle overlay is split off from
    /// the scatter style.
    pub fn resolve(&self, type_id: TypeId) -> ResolvedStyle {
        let mut style = self.entries.get(&type_id).cloned().unwrap_or_default();
        let circle = style.circle.take();
        let scatter = if style.omit { None } else { Some(style) };
        ResolvedStyle { scatter, circle }
    }
}

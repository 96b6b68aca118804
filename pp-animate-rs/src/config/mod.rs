//! Configuration types for animation runs.
//!
//! Every field has a default, so a YAML file only needs to name the values
//! it changes. Command-line flags are applied on top of the loaded config.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Frame rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Resolution in dots per inch.
    #[serde(default = "default_dpi")]
    pub dpi: f64,

    /// Figure size in inches (width, height).
    #[serde(default = "default_size")]
    pub size: (f64, f64),

    /// Frame file extension (png, jpg, bmp or svg).
    #[serde(default = "default_filetype")]
    pub filetype: String,

    /// Draw a `time = ...` title above each frame.
    #[serde(default = "default_true")]
    pub title: bool,

    /// Draw axis tick labels.
    #[serde(default = "default_true")]
    pub axis_labels: bool,

    /// Draw a boxed `t=...` label inside the plot.
    #[serde(default)]
    pub embed_label: bool,

    /// Draw a legend in the lower-left corner.
    #[serde(default)]
    pub legend: bool,
}

fn default_dpi() -> f64 {
    100.0
}

fn default_size() -> (f64, f64) {
    (6.4, 4.8)
}

fn default_filetype() -> String {
    "png".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            size: default_size(),
            filetype: default_filetype(),
            title: true,
            axis_labels: true,
            embed_label: false,
            legend: false,
        }
    }
}

impl RenderConfig {
    /// Figure size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let (w, h) = self.size;
        (
            (w * self.dpi).round().max(1.0) as u32,
            (h * self.dpi).round().max(1.0) as u32,
        )
    }
}

/// Which records become frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Records to skip after each rendered frame.
    #[serde(default)]
    pub skip: usize,

    /// Records with an earlier time are dropped.
    #[serde(default)]
    pub min_time: f64,

    /// Records with a later time are dropped. Negative means no limit.
    #[serde(default = "default_max_time")]
    pub max_time: f64,
}

fn default_max_time() -> f64 {
    -1.0
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            skip: 0,
            min_time: 0.0,
            max_time: default_max_time(),
        }
    }
}

/// External animation encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Run the encoder after rendering.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Encoder executable.
    #[serde(default = "default_program")]
    pub program: String,

    /// Inter-frame delay, in the encoder's ticks.
    #[serde(default = "default_delay")]
    pub delay: f64,

    /// Loop count passed to the encoder (0 loops forever).
    #[serde(default)]
    pub loop_count: u32,

    /// Treat a non-zero encoder exit status as an error.
    #[serde(default)]
    pub check_status: bool,

    /// Keep the intermediate frame files.
    #[serde(default)]
    pub keep_frames: bool,
}

fn default_program() -> String {
    "convert".to_string()
}

fn default_delay() -> f64 {
    0.1
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_program(),
            delay: default_delay(),
            loop_count: 0,
            check_status: false,
            keep_frames: false,
        }
    }
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimateConfig {
    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl AnimateConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: AnimateConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

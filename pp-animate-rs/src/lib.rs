//! Point-process animation toolkit.
//!
//! This crate provides tools for:
//! - Reading point-process snapshot files (plain or gzip-compressed)
//! - Styling points per type from a JSON override table
//! - Rendering each snapshot as a frame and encoding the frames into an animation
//! - Generating parameter-sweep cases and joining per-run datasets
//!
//! # Example
//!
//! ```no_run
//! use pp_animate::{core::loaders::read_records, style::StyleTable};
//! use pp_animate::visualization::{frame_path, render_frame, FrameOptions};
//! use pp_animate::config::RenderConfig;
//! use std::path::Path;
//!
//! let styles = StyleTable::new();
//! let opts = FrameOptions::new(10.0, &RenderConfig::default()).unwrap();
//! for (i, record) in read_records("points.txt").unwrap().enumerate() {
//!     let path = frame_path(Path::new("frames"), i, "png");
//!     render_frame(&path, &record.unwrap(), &styles, &opts).unwrap();
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod style;
pub mod visualization;

pub use config::{AnimateConfig, EncoderConfig, RenderConfig, SelectionConfig};
pub use core::loaders::{TimeStepRecord, TypeId, TypePoints};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Frame rendering for point-process snapshots.
//!
//! Each frame is a square plot of the universe `[0, U] x [0, U]` with one
//! scatter series per point type, drawn with the plotters library. The image
//! is cropped to the plot and its decorations, with no outer padding.

use std::path::{Path, PathBuf};

use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::RenderConfig;
use crate::core::loaders::{LoaderError, TimeStepRecord, TypePoints};
use crate::style::{CircleOverlay, Marker, Rgb, StyleEntry, StyleTable, DEFAULT_CYCLE};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("unsupported frame file type '{0}'")]
    UnsupportedFileType(String),

    #[error("universe dimension must be positive, got {0}")]
    InvalidDimension(f64),

    #[error(transparent)]
    Record(#[from] LoaderError),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Opacity of circle overlays.
const CIRCLE_ALPHA: f64 = 0.1;

/// Opacity of the box behind the embedded time label.
const EMBED_LABEL_ALPHA: f64 = 0.75;

/// Opacity of the legend background.
const LEGEND_ALPHA: f64 = 0.95;

/// Data-space anchor of the embedded time label.
const EMBED_LABEL_POS: (f64, f64) = (1.5, 3.0);

/// Base font size in points.
const FONT_PT: f64 = 12.0;

/// Smallest plot side in pixels.
const MIN_SIDE: u32 = 16;

/// Output encoding of a frame file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Raster image; the encoding follows the file extension.
    Bitmap,
    Svg,
}

impl FrameFormat {
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "bmp" => Ok(FrameFormat::Bitmap),
            "svg" => Ok(FrameFormat::Svg),
            _ => Err(VisualizationError::UnsupportedFileType(ext.to_string())),
        }
    }
}

/// Per-run frame settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOptions {
    /// Side length of the universe; both axes span `[0, dimension]`.
    pub dimension: f64,
    pub width: u32,
    pub height: u32,
    pub dpi: f64,
    pub format: FrameFormat,
    pub title: bool,
    pub axis_labels: bool,
    pub embed_label: bool,
    pub legend: bool,
}

impl FrameOptions {
    pub fn new(dimension: f64, render: &RenderConfig) -> Result<Self> {
        if !(dimension.is_finite() && dimension > 0.0) {
            return Err(VisualizationError::InvalidDimension(dimension));
        }
        let (width, height) = render.pixel_size();
        Ok(Self {
            dimension,
            width,
            height,
            dpi: render.dpi,
            format: FrameFormat::from_extension(&render.filetype)?,
            title: render.title,
            axis_labels: render.axis_labels,
            embed_label: render.embed_label,
            legend: render.legend,
        })
    }

    fn font_px(&self) -> f64 {
        (FONT_PT * self.dpi / 72.0).max(6.0)
    }
}

/// Pixel layout of a frame: optional title band, tick-label areas and the
/// square plotting region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameLayout {
    canvas: (u32, u32),
    title_height: u32,
    x_label_area: u32,
    y_label_area: u32,
    /// Room for tick labels that overhang the plot's top and right edges.
    overhang: u32,
    side: u32,
}

impl FrameLayout {
    fn new(opts: &FrameOptions) -> Self {
        let font = opts.font_px().ceil() as u32;
        let title_height = if opts.title { font * 2 } else { 0 };
        let (x_label_area, y_label_area, overhang) = if opts.axis_labels {
            (font * 2, font * 3, font / 2 + 1)
        } else {
            (0, 0, 0)
        };

        let avail_w = opts.width.saturating_sub(y_label_area + overhang);
        let avail_h = opts
            .height
            .saturating_sub(x_label_area + title_height + overhang);
        let side = avail_w.min(avail_h).max(MIN_SIDE);

        Self {
            canvas: (
                y_label_area + side + overhang,
                title_height + overhang + side + x_label_area,
            ),
            title_height,
            x_label_area,
            y_label_area,
            overhang,
            side,
        }
    }
}

/// Path of the frame for the record at `index` in the input.
pub fn frame_path(dir: &Path, index: usize, filetype: &str) -> PathBuf {
    dir.join(format!("tmp-img{:09}.{}", index, filetype))
}

/// Half-width in pixels of a marker with area `size` (square points).
pub fn marker_half_width(size: f64, dpi: f64) -> i32 {
    ((size.max(0.0).sqrt() * dpi / 72.0) / 2.0).round().max(1.0) as i32
}

fn to_rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

type FrameChart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Points inside the universe. Plotters pins out-of-range coordinates to
/// the plot border, so they are dropped here instead.
fn visible(points: &TypePoints, dim: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
    points
        .iter()
        .filter(move |&(x, y)| (0.0..=dim).contains(&x) && (0.0..=dim).contains(&y))
}

fn draw_circles<DB: DrawingBackend>(
    chart: &mut FrameChart<'_, DB>,
    points: &TypePoints,
    circle: &CircleOverlay,
    dim: f64,
    px_per_unit: f64,
) -> Result<()> {
    let radius = (circle.radius * px_per_unit).round().max(1.0) as u32;
    let style = to_rgb(circle.color).mix(CIRCLE_ALPHA).filled();

    chart
        .draw_series(visible(points, dim).map(|p| Circle::new(p, radius, style)))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    Ok(())
}

/// Draw one glyph per point, composed from pixel-space parts around the
/// point, and register the same glyph as the legend entry.
macro_rules! draw_glyphs {
    ($chart:expr, $points:expr, $label:expr, $($part:expr),+) => {{
        let anno = $chart
            .draw_series($points.map(|p| EmptyElement::at(p) $(+ $part)+))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
        if let Some(label) = $label {
            anno.label(label)
                .legend(move |c| EmptyElement::at(c) $(+ $part)+);
        }
    }};
}

fn draw_markers<'a, DB: DrawingBackend + 'a>(
    chart: &mut FrameChart<'a, DB>,
    points: &TypePoints,
    scatter: &StyleEntry,
    color: Rgb,
    label: Option<String>,
    opts: &FrameOptions,
) -> Result<()> {
    let h = marker_half_width(scatter.size, opts.dpi);
    let style = to_rgb(color)
        .mix(scatter.alpha.unwrap_or(1.0).clamp(0.0, 1.0))
        .stroke_width(1);
    let fill = style.filled();
    let points = visible(points, opts.dimension);

    match scatter.marker {
        Marker::Plus => draw_glyphs!(
            chart,
            points,
            label,
            PathElement::new(vec![(-h, 0), (h, 0)], style),
            PathElement::new(vec![(0, -h), (0, h)], style)
        ),
        Marker::Cross => draw_glyphs!(
            chart,
            points,
            label,
            PathElement::new(vec![(-h, -h), (h, h)], style),
            PathElement::new(vec![(-h, h), (h, -h)], style)
        ),
        Marker::Point => draw_glyphs!(chart, points, label, Circle::new((0, 0), (h / 2).max(1), fill)),
        Marker::Circle => draw_glyphs!(chart, points, label, Circle::new((0, 0), h, fill)),
        Marker::Square => {
            draw_glyphs!(chart, points, label, Rectangle::new([(-h, -h), (h, h)], fill))
        }
        Marker::Triangle => draw_glyphs!(
            chart,
            points,
            label,
            Polygon::new(vec![(0, -h), (-h, h), (h, h)], fill)
        ),
        Marker::Diamond => draw_glyphs!(
            chart,
            points,
            label,
            Polygon::new(vec![(0, -h), (h, 0), (0, h), (-h, 0)], fill)
        ),
    }
    Ok(())
}

/// Draw `record` onto `root`, which must match `layout.canvas`.
fn draw_frame<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    layout: &FrameLayout,
    record: &TimeStepRecord,
    styles: &StyleTable,
    opts: &FrameOptions,
) -> Result<()> {
    let font_px = opts.font_px();
    let dim = opts.dimension;

    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let body = if opts.title {
        let (title_area, body) = root.split_vertically(layout.title_height);
        let style = TextStyle::from(("sans-serif", font_px).into_font())
            .pos(Pos::new(HPos::Center, VPos::Center));
        let (w, h) = title_area.dim_in_pixel();
        title_area
            .draw_text(
                &format!("time = {}", record.time),
                &style,
                ((w / 2) as i32, (h / 2) as i32),
            )
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
        body
    } else {
        root.clone()
    };
    let body = body.margin(layout.overhang, 0, 0, layout.overhang);

    let mut chart = ChartBuilder::on(&body)
        .x_label_area_size(layout.x_label_area)
        .y_label_area_size(layout.y_label_area)
        .build_cartesian_2d(0f64..dim, 0f64..dim)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    if opts.axis_labels {
        chart
            .configure_mesh()
            .disable_mesh()
            .label_style(("sans-serif", font_px * 0.8).into_font())
            .draw()
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    chart
        .plotting_area()
        .draw(&Rectangle::new([(0.0, 0.0), (dim, dim)], BLACK.stroke_width(1)))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let px_per_unit = layout.side as f64 / dim;
    let mut cycle = 0;

    for (&type_id, points) in &record.points {
        let resolved = styles.resolve(type_id);

        if let Some(circle) = &resolved.circle {
            draw_circles(&mut chart, points, circle, dim, px_per_unit)?;
        }

        if let Some(scatter) = &resolved.scatter {
            let color = scatter.color.unwrap_or_else(|| {
                let c = DEFAULT_CYCLE[cycle % DEFAULT_CYCLE.len()];
                cycle += 1;
                c
            });
            let label = opts.legend.then(|| {
                scatter
                    .label
                    .clone()
                    .unwrap_or_else(|| type_id.to_string())
            });
            draw_markers(&mut chart, points, scatter, color, label, opts)?;
        }
    }

    if opts.embed_label {
        let text = format!("t={:.1}", record.time_value()?);
        let style = ("sans-serif", font_px).into_font().color(&BLACK);
        let (w, h) = body
            .estimate_text_size(&text, &style)
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
        let (w, h) = (w as i32, h as i32);
        let pad = (font_px / 4.0).ceil() as i32;

        chart
            .draw_series(std::iter::once(
                EmptyElement::at(EMBED_LABEL_POS)
                    + Rectangle::new(
                        [(-pad, -h - pad), (w + pad, pad)],
                        WHITE.mix(EMBED_LABEL_ALPHA).filled(),
                    )
                    + Text::new(text, (0, -h), style),
            ))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    if opts.legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerLeft)
            .background_style(&WHITE.mix(LEGEND_ALPHA))
            .border_style(&BLACK)
            .label_font(("sans-serif", font_px * 0.8).into_font())
            .draw()
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
    }

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Render one record to `output_path`.
///
/// Points outside `[0, dimension]` are not drawn, circle overlays included. Types
/// are drawn in the record's order: circle overlays first, then markers.
pub fn render_frame(
    output_path: &Path,
    record: &TimeStepRecord,
    styles: &StyleTable,
    opts: &FrameOptions,
) -> Result<()> {
    let layout = FrameLayout::new(opts);

    match opts.format {
        FrameFormat::Bitmap => {
            let root = BitMapBackend::new(output_path, layout.canvas).into_drawing_area();
            draw_frame(root, &layout, record, styles, opts)
        }
        FrameFormat::Svg => {
            let root = SVGBackend::new(output_path, layout.canvas).into_drawing_area();
            draw_frame(root, &layout, record, styles, opts)
        }
    }
}

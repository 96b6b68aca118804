//! Frame sequence driver: filter records, render frames, encode the
//! animation and clean up.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use thiserror::Error;

use crate::config::{EncoderConfig, SelectionConfig};
use crate::core::clock::ElapsedLog;
use crate::core::loaders::{self, LoaderError, TimeStepRecord};
use crate::style::StyleTable;
use crate::visualization::{frame_path, render_frame, FrameOptions, VisualizationError};

/// Errors that can abort an animation run.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("failed to create frame directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("failed to render frame {index}: {source}")]
    Render {
        index: usize,
        #[source]
        source: VisualizationError,
    },

    #[error("encoder '{program}' failed: {reason}")]
    EncoderFailed { program: String, reason: String },
}

/// Result type for sequence operations.
pub type Result<T> = std::result::Result<T, SequenceError>;

/// Decides which records become frames.
///
/// After each admitted record the next `skip` records are dropped. Records
/// outside the time window are dropped without resetting the skip counter.
#[derive(Debug, Clone)]
pub struct FrameSelector {
    config: SelectionConfig,
    to_skip: usize,
}

impl FrameSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config, to_skip: 0 }
    }

    pub fn admit(&mut self, record: &TimeStepRecord) -> Result<bool> {
        if self.to_skip > 0 {
            self.to_skip -= 1;
            return Ok(false);
        }

        let time = record.time_value()?;
        if time < self.config.min_time {
            return Ok(false);
        }
        if self.config.max_time >= 0.0 && time > self.config.max_time {
            return Ok(false);
        }

        self.to_skip = self.config.skip;
        Ok(true)
    }
}

/// Stitches frame files into an animation.
pub trait AnimationEncoder {
    fn encode(&self, frames: &[PathBuf], output: &Path) -> Result<()>;
}

/// Runs ImageMagick-style `convert` on the frame sequence.
#[derive(Debug, Clone)]
pub struct ImageMagickEncoder {
    pub program: String,
    pub delay: f64,
    pub loop_count: u32,
    /// Fail on a non-zero exit status instead of logging it.
    pub check_status: bool,
}

impl ImageMagickEncoder {
    pub fn from_config(config: &EncoderConfig) -> Self {
        Self {
            program: config.program.clone(),
            delay: config.delay,
            loop_count: config.loop_count,
            check_status: config.check_status,
        }
    }

    /// `<program> +map -delay <delay> -loop <n> <frames...> <output>`
    pub fn command(&self, frames: &[PathBuf], output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("+map")
            .arg("-delay")
            .arg(self.delay.to_string())
            .arg("-loop")
            .arg(self.loop_count.to_string())
            .args(frames)
            .arg(output);
        cmd
    }

    fn failed(&self, reason: String) -> Result<()> {
        if self.check_status {
            return Err(SequenceError::EncoderFailed {
                program: self.program.clone(),
                reason,
            });
        }
        warn!("encoder '{}' failed ({}), continuing", self.program, reason);
        Ok(())
    }
}

impl AnimationEncoder for ImageMagickEncoder {
    fn encode(&self, frames: &[PathBuf], output: &Path) -> Result<()> {
        let mut cmd = self.command(frames, output);
        debug!("running {:?}", cmd);

        match cmd.status() {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => self.failed(format!("exit status {}", status)),
            Err(e) => self.failed(e.to_string()),
        }
    }
}

/// Everything needed for one animation run.
#[derive(Debug, Clone)]
pub struct AnimationJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub frame_dir: PathBuf,
    pub filetype: String,
    pub styles: StyleTable,
    pub frame: FrameOptions,
    pub selection: SelectionConfig,
    /// Run the encoder after rendering.
    pub animate: bool,
    pub keep_frames: bool,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationSummary {
    /// Records read from the input.
    pub records: usize,
    /// Frames rendered, in input order.
    pub frames: Vec<PathBuf>,
    pub encoded: bool,
    pub frames_removed: usize,
}

fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} plotted")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Delete frame files, logging failures. Returns the number removed.
pub fn remove_frames(frames: &[PathBuf]) -> usize {
    let mut removed = 0;
    for frame in frames {
        match fs::remove_file(frame) {
            Ok(()) => removed += 1,
            Err(e) => warn!("failed to remove {}: {}", frame.display(), e),
        }
    }
    removed
}

/// Render every selected record of `job.input`, encode the frames and
/// remove them.
///
/// Any read or render failure aborts the run and leaves already written
/// frames on disk.
pub fn run_animation(
    job: &AnimationJob,
    encoder: &dyn AnimationEncoder,
    clock: &ElapsedLog,
) -> Result<AnimationSummary> {
    fs::create_dir_all(&job.frame_dir).map_err(|e| SequenceError::CreateDirectory {
        path: job.frame_dir.clone(),
        source: e,
    })?;

    let total = loaders::count_records(&job.input)?;
    clock.log(format!("Plotting {} records from {}", total, job.input.display()));

    let pb = create_progress_bar(total);
    let mut selector = FrameSelector::new(job.selection.clone());
    let mut summary = AnimationSummary::default();

    for (index, record) in loaders::read_records(&job.input)?.enumerate() {
        let record = record?;
        summary.records += 1;

        if !selector.admit(&record)? {
            continue;
        }

        let path = frame_path(&job.frame_dir, index, &job.filetype);
        render_frame(&path, &record, &job.styles, &job.frame)
            .map_err(|e| SequenceError::Render { index, source: e })?;
        summary.frames.push(path);
        pb.set_position(index as u64);
    }
    pb.finish_and_clear();

    clock.log(format!(
        "Rendered {} of {} records",
        summary.frames.len(),
        summary.records
    ));

    if job.animate {
        if summary.frames.is_empty() {
            warn!("no frames selected, skipping animation");
        } else {
            clock.log(format!("Making animation {}", job.output.display()));
            encoder.encode(&summary.frames, &job.output)?;
            summary.encoded = true;
        }
    }

    if !job.keep_frames {
        summary.frames_removed = remove_frames(&summary.frames);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualization::FrameFormat;
    use std::cell::RefCell;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct RecordingEncoder {
        calls: RefCell<Vec<(Vec<PathBuf>, PathBuf)>>,
    }

    impl AnimationEncoder for RecordingEncoder {
        fn encode(&self, frames: &[PathBuf], output: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((frames.to_vec(), output.to_path_buf()));
            Ok(())
        }
    }

    fn selection(skip: usize, min_time: f64, max_time: f64) -> SelectionConfig {
        SelectionConfig {
            skip,
            min_time,
            max_time,
        }
    }

    fn records_at(times: &[f64]) -> Vec<TimeStepRecord> {
        times
            .iter()
            .map(|t| TimeStepRecord {
                time: t.to_string(),
                events: "0".to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn selected(config: SelectionConfig, records: &[TimeStepRecord]) -> Vec<usize> {
        let mut selector = FrameSelector::new(config);
        records
            .iter()
            .enumerate()
            .filter(|(_, r)| selector.admit(r).unwrap())
            .map(|(i, _)| i)
            .collect()
    }

    fn write_input(dir: &TempDir, lines: &[&str]) -> PathBuf {
        let path = dir.path().join("points.txt");
        let mut file = fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn job(dir: &TempDir, input: PathBuf, selection: SelectionConfig) -> AnimationJob {
        AnimationJob {
            input,
            output: dir.path().join("out.gif"),
            frame_dir: dir.path().join("frames"),
            filetype: "png".to_string(),
            styles: StyleTable::new(),
            frame: FrameOptions {
                dimension: 10.0,
                width: 64,
                height: 64,
                dpi: 72.0,
                format: FrameFormat::Bitmap,
                title: false,
                axis_labels: false,
                embed_label: false,
                legend: false,
            },
            selection,
            animate: true,
            keep_frames: true,
        }
    }

    const FOUR_RECORDS: [&str; 4] = [
        "0.0 0 0 1.0 1.0",
        "0.5 3 0 2.0 2.0 1 5.0 5.0",
        "1.0 6 0 3.0 3.0",
        "1.5 9 1 4.0 4.0",
    ];

    #[test]
    fn test_skip_one() {
        let records = records_at(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(selected(selection(1, 0.0, -1.0), &records), vec![0, 2]);
    }

    #[test]
    fn test_time_window() {
        let records = records_at(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(selected(selection(0, 1.0, 3.0), &records), vec![1, 2, 3]);
        assert_eq!(selected(selection(0, 2.5, -1.0), &records), vec![3, 4]);
        assert_eq!(selected(selection(0, 0.0, 0.0), &records), vec![0]);
    }

    #[test]
    fn test_filtered_records_do_not_reset_skip() {
        let records = records_at(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        // Skipping counts records, whether or not they pass the window.
        assert_eq!(selected(selection(2, 1.0, -1.0), &records), vec![1, 4]);
    }

    #[test]
    fn test_selected_indices_strictly_increase() {
        let records = records_at(&[0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0]);
        for skip in 0..4 {
            for min_time in [0.0, 0.7, 2.0] {
                for max_time in [-1.0, 1.0, 3.2] {
                    let indices = selected(selection(skip, min_time, max_time), &records);
                    assert!(indices.windows(2).all(|w| w[0] < w[1]));
                    for &i in &indices {
                        let t = records[i].time_value().unwrap();
                        assert!(t >= min_time);
                        assert!(max_time < 0.0 || t <= max_time);
                    }
                    for w in indices.windows(2) {
                        assert!(w[1] - w[0] > skip);
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_time_is_an_error() {
        let mut selector = FrameSelector::new(SelectionConfig::default());
        let record = TimeStepRecord {
            time: "soon".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            selector.admit(&record),
            Err(SequenceError::Loader(LoaderError::InvalidTime(_)))
        ));
    }

    #[test]
    fn test_run_with_skip_keeps_original_numbering() {
        let dir = tempdir().unwrap();
        let input = write_input(&dir, &FOUR_RECORDS);
        let job = job(&dir, input, selection(1, 0.0, -1.0));
        let encoder = RecordingEncoder::default();

        let summary = run_animation(&job, &encoder, &ElapsedLog::start()).unwrap();

        let names: Vec<String> = summary
            .frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["tmp-img000000000.png", "tmp-img000000002.png"]);
        assert_eq!(summary.records, 4);
        assert!(summary.encoded);
        assert!(summary.frames.iter().all(|p| p.exists()));

        let calls = encoder.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, summary.frames);
        assert_eq!(calls[0].1, dir.path().join("out.gif"));
    }

    #[test]
    fn test_run_removes_frames_and_skips_encoder() {
        let dir = tempdir().unwrap();
        let input = write_input(&dir, &FOUR_RECORDS);
        let mut job = job(&dir, input, selection(0, 0.4, 1.0));
        job.animate = false;
        job.keep_frames = false;
        let encoder = RecordingEncoder::default();

        let summary = run_animation(&job, &encoder, &ElapsedLog::start()).unwrap();

        assert_eq!(summary.frames.len(), 2);
        assert_eq!(summary.frames_removed, 2);
        assert!(!summary.encoded);
        assert!(summary.frames.iter().all(|p| !p.exists()));
        assert!(encoder.calls.borrow().is_empty());
        assert!(job.frame_dir.is_dir());
    }

    #[test]
    fn test_run_aborts_on_bad_record() {
        let dir = tempdir().unwrap();
        let input = write_input(&dir, &["0.0 0 0 1.0 1.0", "0.5 1 0 oops 1.0"]);
        let job = job(&dir, input, SelectionConfig::default());
        let encoder = RecordingEncoder::default();

        let err = run_animation(&job, &encoder, &ElapsedLog::start()).unwrap_err();

        assert!(matches!(
            err,
            SequenceError::Loader(LoaderError::InvalidCoordinate { line: 2, .. })
        ));
        // The frame written before the failure stays on disk.
        assert!(frame_path(&job.frame_dir, 0, "png").exists());
        assert!(encoder.calls.borrow().is_empty());
    }

    #[test]
    fn test_empty_input_renders_nothing() {
        let dir = tempdir().unwrap();
        let input = write_input(&dir, &[]);
        let job = job(&dir, input, SelectionConfig::default());
        let encoder = RecordingEncoder::default();

        let summary = run_animation(&job, &encoder, &ElapsedLog::start()).unwrap();
        assert_eq!(summary, AnimationSummary::default());
        assert!(encoder.calls.borrow().is_empty());
    }

    #[test]
    fn test_encoder_command_line() {
        let encoder = ImageMagickEncoder::from_config(&EncoderConfig::default());
        let frames = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let cmd = encoder.command(&frames, Path::new("out.gif"));

        assert_eq!(cmd.get_program(), "convert");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec!["+map", "-delay", "0.1", "-loop", "0", "a.png", "b.png", "out.gif"]
        );
    }

    #[test]
    fn test_encoder_failure_is_logged_by_default() {
        let mut encoder = ImageMagickEncoder::from_config(&EncoderConfig::default());
        encoder.program = "/nonexistent/convert".to_string();
        assert!(encoder.encode(&[], Path::new("out.gif")).is_ok());

        encoder.check_status = true;
        assert!(matches!(
            encoder.encode(&[], Path::new("out.gif")),
            Err(SequenceError::EncoderFailed { .. })
        ));
    }

    #[test]
    fn test_remove_frames_counts_missing_files() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("a.png");
        fs::write(&present, b"x").unwrap();
        let missing = dir.path().join("b.png");

        assert_eq!(remove_frames(&[present.clone(), missing]), 1);
        assert!(!present.exists());
    }
}

//! Command-line interface for pp-animate.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AnimateConfig;
use crate::core::clock::ElapsedLog;
use crate::core::loaders;
use crate::core::writers::{self, TypeCounts};
use crate::processors::combinations::{self, CaseSpecification};
use crate::processors::datasets;
use crate::processors::sequence::{self, AnimationJob, ImageMagickEncoder};
use crate::style::StyleTable;
use crate::visualization::FrameOptions;

#[derive(Parser)]
#[command(name = "pp-animate")]
#[command(about = "Point-process animation and experiment utilities", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a point file frame by frame and encode an animation
    Animate(AnimateArgs),

    /// Expand a case specification into parameter combinations (JSON lines)
    Combinations {
        /// Case specification JSON file
        spec: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Concatenate datasets with a leading dataset-index column
    Join {
        /// Input files, numbered from 1 in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Field delimiter
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },

    /// Write per-record point counts by type as CSV
    Density {
        /// Input point file
        #[arg(short, long)]
        input: PathBuf,
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AnimateArgs {
    /// Input point file
    #[arg(short, long)]
    input: PathBuf,
    /// Output animation file
    #[arg(short, long)]
    output: PathBuf,
    /// Side length of the square universe
    #[arg(short = 'U', long, value_parser = clap::value_parser!(u32).range(1..))]
    dimension: u32,
    /// Directory for intermediate frames
    #[arg(long)]
    tmpdir: PathBuf,
    /// Delay between frames
    #[arg(long)]
    delay: Option<f64>,
    /// Frame resolution
    #[arg(long)]
    dpi: Option<f64>,
    /// Figure size in inches
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    size: Option<Vec<f64>>,
    /// Records to skip after each frame
    #[arg(long)]
    skip: Option<usize>,
    /// Start animation from this time
    #[arg(long, allow_negative_numbers = true)]
    mint: Option<f64>,
    /// Stop animation by this time (negative for no limit)
    #[arg(long, allow_negative_numbers = true)]
    maxt: Option<f64>,
    /// Style JSON file
    #[arg(short, long)]
    style: Option<PathBuf>,
    /// Add a legend
    #[arg(short = 'l', long = "use_legend")]
    use_legend: bool,
    /// Keep intermediate frames
    #[arg(long)]
    donotremove: bool,
    /// Frame file type
    #[arg(long)]
    filetype: Option<String>,
    /// Render frames only
    #[arg(long)]
    noanimation: bool,
    /// Do not draw the time title
    #[arg(long)]
    nolabel: bool,
    /// Do not draw axis labels
    #[arg(long)]
    noaxis: bool,
    /// Draw the time label inside the plot
    #[arg(long)]
    embedlabel: bool,
}

impl AnimateArgs {
    /// Layer command-line values over the loaded config.
    fn apply(&self, config: &mut AnimateConfig) {
        if let Some(dpi) = self.dpi {
            config.render.dpi = dpi;
        }
        if let Some([w, h]) = self.size.as_deref().and_then(|s| <[f64; 2]>::try_from(s).ok()) {
            config.render.size = (w, h);
        }
        if let Some(filetype) = &self.filetype {
            config.render.filetype = filetype.clone();
        }
        if self.nolabel {
            config.render.title = false;
        }
        if self.noaxis {
            config.render.axis_labels = false;
        }
        if self.embedlabel {
            config.render.embed_label = true;
        }
        if self.use_legend {
            config.render.legend = true;
        }

        if let Some(skip) = self.skip {
            config.selection.skip = skip;
        }
        if let Some(mint) = self.mint {
            config.selection.min_time = mint;
        }
        if let Some(maxt) = self.maxt {
            config.selection.max_time = maxt;
        }

        if let Some(delay) = self.delay {
            config.encoder.delay = delay;
        }
        if self.noanimation {
            config.encoder.enabled = false;
        }
        if self.donotremove {
            config.encoder.keep_frames = true;
        }
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║ {:<62} ║", title);
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        eprintln!("║ {:<20}: {:<39} ║", key, display_value);
    }
    eprintln!("╚══════════════════════════════════════════════════════════════╝");
    eprintln!();
}

/// Open `path` for writing, or stdout when absent.
fn output_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(writers::create_buffered_writer(path)?)),
        None => Ok(Box::new(io::stdout().lock())),
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match AnimateConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                AnimateConfig::default()
            }
        },
        None => AnimateConfig::default(),
    };

    let result = match cli.command {
        Commands::Animate(args) => cmd_animate(&args, config),
        Commands::Combinations { spec, output } => cmd_combinations(&spec, output.as_deref()),
        Commands::Join { files, output, delimiter } => {
            cmd_join(&files, output.as_deref(), delimiter)
        }
        Commands::Density { input, output } => cmd_density(&input, &output),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn cmd_animate(args: &AnimateArgs, mut config: AnimateConfig) -> Result<()> {
    let start = Instant::now();
    let clock = ElapsedLog::start();
    args.apply(&mut config);

    let styles = match &args.style {
        Some(path) => StyleTable::from_json(path)
            .with_context(|| format!("failed to load style table {}", path.display()))?,
        None => StyleTable::new(),
    };
    let frame = FrameOptions::new(f64::from(args.dimension), &config.render)
        .context("invalid render settings")?;

    let job = AnimationJob {
        input: args.input.clone(),
        output: args.output.clone(),
        frame_dir: args.tmpdir.clone(),
        filetype: config.render.filetype.clone(),
        styles,
        frame,
        selection: config.selection.clone(),
        animate: config.encoder.enabled,
        keep_frames: config.encoder.keep_frames,
    };
    let encoder = ImageMagickEncoder::from_config(&config.encoder);

    let summary = sequence::run_animation(&job, &encoder, &clock)
        .with_context(|| format!("failed to animate {}", job.input.display()))?;

    print_summary(
        "Animation Complete",
        &[
            ("Input file", job.input.display().to_string()),
            ("Records", summary.records.to_string()),
            ("Frames rendered", summary.frames.len().to_string()),
            ("Encoded", summary.encoded.to_string()),
            ("Frames removed", summary.frames_removed.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    println!("{}", job.output.display());
    Ok(())
}

fn cmd_combinations(spec_path: &Path, output: Option<&Path>) -> Result<()> {
    let start = Instant::now();

    let spec = CaseSpecification::from_json(spec_path)
        .with_context(|| format!("failed to load case specification {}", spec_path.display()))?;
    let writer = output_writer(output)?;
    let count = combinations::write_cases(spec.cases(), writer)?;

    if let Some(output) = output {
        print_summary(
            "Combinations Complete",
            &[
                ("Specification", spec_path.display().to_string()),
                ("Output file", output.display().to_string()),
                ("Cases", count.to_string()),
                ("Duration", format!("{:.2?}", start.elapsed())),
            ],
        );
    }
    Ok(())
}

fn cmd_join(files: &[PathBuf], output: Option<&Path>, delimiter: char) -> Result<()> {
    let start = Instant::now();

    let delimiter = match u8::try_from(delimiter) {
        Ok(d) if d.is_ascii() => d,
        _ => bail!("delimiter must be a single ASCII character, got {:?}", delimiter),
    };

    let writer = output_writer(output)?;
    let rows = datasets::join_datasets(files, writer, delimiter)?;

    if let Some(output) = output {
        print_summary(
            "Join Complete",
            &[
                ("Datasets", files.len().to_string()),
                ("Output file", output.display().to_string()),
                ("Rows", rows.to_string()),
                ("Duration", format!("{:.2?}", start.elapsed())),
            ],
        );
    }
    Ok(())
}

fn cmd_density(input: &Path, output: &Path) -> Result<()> {
    let start = Instant::now();
    let spinner = create_spinner("Counting points by type...");

    let rows = loaders::read_records(input)
        .and_then(|records| {
            records
                .map(|record| record.map(|r| TypeCounts::from(&r)))
                .collect::<loaders::Result<Vec<_>>>()
        })
        .with_context(|| format!("failed to read {}", input.display()));
    spinner.finish_and_clear();
    let rows = rows?;

    writers::write_type_counts(output, &rows)?;

    print_summary(
        "Density Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Records", rows.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animate_args(extra: &[&str]) -> AnimateArgs {
        let mut argv = vec![
            "pp-animate", "animate", "-i", "in.txt", "-o", "out.gif", "-U", "10", "--tmpdir", "tmp",
        ];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Animate(args) => args,
            _ => panic!("expected animate"),
        }
    }

    #[test]
    fn test_defaults_leave_config_untouched() {
        let args = animate_args(&[]);
        let mut config = AnimateConfig::default();
        args.apply(&mut config);
        assert_eq!(config, AnimateConfig::default());
        assert_eq!(args.dimension, 10);
    }

    #[test]
    fn test_flags_override_config() {
        let args = animate_args(&[
            "--skip", "2", "--mint", "1.5", "--maxt", "-1", "--size", "4", "3", "--dpi", "50",
            "--filetype", "svg", "-l", "--nolabel", "--noaxis", "--embedlabel",
            "--noanimation", "--donotremove", "--delay", "20",
        ]);
        let mut config = AnimateConfig::default();
        config.selection.max_time = 9.0;
        args.apply(&mut config);

        assert_eq!(config.selection.skip, 2);
        assert_eq!(config.selection.min_time, 1.5);
        assert_eq!(config.selection.max_time, -1.0);
        assert_eq!(config.render.size, (4.0, 3.0));
        assert_eq!(config.render.pixel_size(), (200, 150));
        assert_eq!(config.render.filetype, "svg");
        assert!(config.render.legend);
        assert!(!config.render.title);
        assert!(!config.render.axis_labels);
        assert!(config.render.embed_label);
        assert!(!config.encoder.enabled);
        assert!(config.encoder.keep_frames);
        assert_eq!(config.encoder.delay, 20.0);
    }

    #[test]
    fn test_animate_requires_dimension() {
        let result = Cli::try_parse_from([
            "pp-animate", "animate", "-i", "in.txt", "-o", "out.gif", "--tmpdir", "tmp",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_animate_rejects_zero_dimension() {
        let result = Cli::try_parse_from([
            "pp-animate", "animate", "-i", "in.txt", "-o", "out.gif", "-U", "0", "--tmpdir", "tmp",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_min_time() {
        let args = animate_args(&["--mint", "-1.5"]);
        let mut config = AnimateConfig::default();
        args.apply(&mut config);
        assert_eq!(config.selection.min_time, -1.5);
    }

    #[test]
    fn test_join_requires_files() {
        assert!(Cli::try_parse_from(["pp-animate", "join"]).is_err());
    }

    #[test]
    fn test_join_rejects_non_ascii_delimiter() {
        assert!(cmd_join(&[], None, 'é').is_err());
    }
}

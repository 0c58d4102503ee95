//! pixchain: apply an ordered chain of pixel operations to a batch of
//! images.
//!
//! Every input image goes through the same operations, in the order
//! given, and is written as PNG into the output directory. An operation
//! that cannot be applied is skipped with a warning; the rest of the
//! chain still runs.
//!
//! # Usage
//!
//! ```text
//! pixchain [OPTIONS] [INPUTS]...
//!
//! pixchain photos/ --op scale=0.5x --op grayscale --op edge=sobel
//! pixchain --stage-into "Base Images" --op flip=horizontal --op invert
//! pixchain cat.jpg --recipe sketch.json --threshold 80 --json
//! ```
//!
//! A recipe is a JSON file holding settings and operations:
//!
//! ```json
//! {
//!   "settings": { "resample": "lanczos", "threshold": 60 },
//!   "operations": [
//!     { "kind": "scale", "mode": { "fit_within": { "width": 400, "height": 300 } } },
//!     "edge_detection=kovalevsky"
//!   ]
//! }
//! ```
//!
//! Recipe operations run before any `--op` flags. Settings flags given on
//! the command line override the recipe's settings.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use pixchain_io::{DirectorySink, DirectorySource, IoError};
use pixchain_pipeline::{
    Operation, OperationSpec, Pipeline, PipelineError, ResampleKernel, Settings,
};
use serde::Deserialize;

/// Apply an ordered chain of pixel operations to a batch of images.
#[derive(Parser)]
#[command(name = "pixchain", version)]
struct Cli {
    /// Image files or directories of images to process.
    #[arg(default_value = ".")]
    inputs: Vec<PathBuf>,

    /// Operation to apply, e.g. `flip=horizontal`, `scale=1.5x`,
    /// `scale=400px,300px`, `edge=canny`, `contrast=-20`. Repeatable;
    /// operations run in the order given.
    #[arg(long = "op", value_name = "NAME[=VALUES]")]
    operations: Vec<OperationSpec>,

    /// JSON recipe with settings and operations.
    #[arg(long)]
    recipe: Option<PathBuf>,

    /// Resample kernel for scale operations.
    #[arg(long, value_enum)]
    resample: Option<Kernel>,

    /// Windowed (kovalevsky) edge threshold (0-255).
    #[arg(long)]
    threshold: Option<u8>,

    /// Gaussian sigma applied before Canny edge detection.
    #[arg(long)]
    canny_sigma: Option<f32>,

    /// Canny low threshold.
    #[arg(long)]
    canny_low: Option<f32>,

    /// Canny high threshold.
    #[arg(long)]
    canny_high: Option<f32>,

    /// Border in pixels added around images before background removal.
    #[arg(long)]
    border: Option<u32>,

    /// Directory processed images are written to.
    #[arg(short, long, default_value = "Output")]
    output: PathBuf,

    /// Move the images of each input directory into this subdirectory
    /// before processing.
    #[arg(long, value_name = "SUBDIR")]
    stage_into: Option<String>,

    /// Log per-operation details.
    #[arg(short, long)]
    verbose: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

/// Resample kernel selection.
#[derive(Clone, Copy, ValueEnum)]
enum Kernel {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Bilinear,
    /// Bicubic Catmull-Rom.
    Bicubic,
    /// Lanczos with 3 lobes (sharpest).
    Lanczos,
}

impl From<Kernel> for ResampleKernel {
    fn from(kernel: Kernel) -> Self {
        match kernel {
            Kernel::Nearest => Self::Nearest,
            Kernel::Bilinear => Self::Bilinear,
            Kernel::Bicubic => Self::Bicubic,
            Kernel::Lanczos => Self::Lanczos,
        }
    }
}

/// Settings and operations loaded from a JSON file.
///
/// Operations are kept as raw JSON so that one bad entry is skipped
/// instead of rejecting the whole recipe. Each entry is either a tagged
/// operation object or a `name=values` string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Recipe {
    settings: Settings,
    operations: Vec<serde_json::Value>,
}

impl Recipe {
    fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading recipe {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing recipe {}: {e}", path.display()))
    }

    /// Append every recipe operation to `pipeline`, valid or not.
    fn extend(&self, pipeline: Pipeline) -> Pipeline {
        self.operations.iter().fold(pipeline, |pipeline, entry| {
            if let Some(text) = entry.as_str() {
                return match text.parse::<OperationSpec>() {
                    Ok(spec) => pipeline.with_spec(&spec),
                    Err(e) => pipeline.with_rejected(text, e),
                };
            }
            match serde_json::from_value::<Operation>(entry.clone()) {
                Ok(op) => pipeline.with_operation(op),
                Err(e) => {
                    pipeline.with_rejected(entry.to_string(), PipelineError::InvalidArgument(e.to_string()))
                }
            }
        })
    }
}

/// Recipe settings with command-line overrides applied.
fn settings_from_cli(cli: &Cli, base: Settings) -> Settings {
    Settings {
        resample: cli.resample.map_or(base.resample, ResampleKernel::from),
        threshold: cli.threshold.unwrap_or(base.threshold),
        canny_sigma: cli.canny_sigma.unwrap_or(base.canny_sigma),
        canny_low: cli.canny_low.unwrap_or(base.canny_low),
        canny_high: cli.canny_high.unwrap_or(base.canny_high),
        border: cli.border.unwrap_or(base.border),
    }
}

/// Collect every input into one source, staging directories first if
/// requested.
fn source_from_cli(cli: &Cli) -> Result<DirectorySource, IoError> {
    let mut source = DirectorySource::from_paths(Vec::new());
    for input in &cli.inputs {
        let next = if input.is_dir() {
            match cli.stage_into.as_deref() {
                Some(subdir) => DirectorySource::move_into(input, subdir)?,
                None => DirectorySource::discover(input)?,
            }
        } else {
            DirectorySource::from_paths(vec![input.clone()])
        };
        source.append(next);
    }
    Ok(source)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let recipe = match cli.recipe.as_deref().map(Recipe::load).transpose() {
        Ok(r) => r.unwrap_or_default(),
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let settings = settings_from_cli(&cli, recipe.settings);
    let pipeline = cli
        .operations
        .iter()
        .fold(recipe.extend(Pipeline::new(settings)), Pipeline::with_spec);

    log::debug!("Settings: {:?}", pipeline.settings());
    if pipeline.is_empty() {
        eprintln!("No operations given; use --op or --recipe.");
        return ExitCode::FAILURE;
    }
    if pipeline
        .operations()
        .any(|op| matches!(op, Operation::RemoveBackground))
    {
        log::warn!("No background removal adapter is available; remove_background will be skipped");
    }

    let mut source = match source_from_cli(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if source.remaining() == 0 {
        log::warn!("No images found");
    }

    let mut sink = match DirectorySink::new(&cli.output) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let report = pipeline.run(&mut source, &mut sink);
    log::info!(
        "Processed {} image(s) into {} ({} failed, {} operation(s) skipped)",
        report.processed,
        sink.dir().display(),
        report.failures.len(),
        report.skipped_operations,
    );

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if report.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

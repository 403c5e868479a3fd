//! File processing pipeline.
//!
//! [`process`] validates the paths, picks the output extension from the
//! configuration and either filters a LAS container or copies any other input
//! verbatim. [`run`] wraps it into the `(success, message)` pair collaborators
//! report to users.

use crate::codec::{self, CodecError};
use crate::config::{ExtentPolicy, OutputFormat, ProcessingConfig};
use crate::filter::{self, FilterError};
use crate::output::{self, OutputError};
use crate::types::PointCloud;
use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while processing a file.
///
/// Each variant names the stage that failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("input file does not exist: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("output folder does not exist: {}", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("failed to parse LAS container: {0}")]
    Format(String),

    #[error("filter failed: input contains no points")]
    EmptyInput,

    #[error("failed to write {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("processing error: {0}")]
    Unknown(String),
}

impl From<FilterError> for ProcessingError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::EmptyInput => Self::EmptyInput,
        }
    }
}

/// How an input file is handled, resolved once from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// LAS container: read, filter, write
    Container,
    /// Anything else: copied byte for byte
    PassThrough,
}

impl InputKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("las") => Self::Container,
            _ => Self::PassThrough,
        }
    }
}

/// What a successful call did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportKind {
    Filtered {
        points_read: usize,
        points_written: usize,
        threshold: f64,
    },
    Copied {
        bytes: u64,
    },
}

/// Result of a successful [`process`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Path actually written, with the extension rewritten
    pub output_path: PathBuf,
    pub kind: ReportKind,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ReportKind::Filtered { .. } => write!(
                f,
                "LAS processed successfully → {}",
                self.output_path.display()
            ),
            ReportKind::Copied { .. } => write!(
                f,
                "File copied successfully → {}",
                self.output_path.display()
            ),
        }
    }
}

/// Success flag and user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl From<Result<Report, ProcessingError>> for Outcome {
    fn from(result: Result<Report, ProcessingError>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                message: report.to_string(),
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
            },
        }
    }
}

impl From<Outcome> for (bool, String) {
    fn from(outcome: Outcome) -> Self {
        (outcome.success, outcome.message)
    }
}

/// Processes `input_path` into `output_path`.
///
/// The output extension is replaced by `config.output_format`. LAS inputs are
/// filtered; any other input is copied verbatim and `points_to_render` is
/// ignored. The core does not range check `points_to_render`.
pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    config: &ProcessingConfig,
) -> Result<Report, ProcessingError> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    if !input_path.exists() {
        return Err(ProcessingError::InputMissing(input_path.to_path_buf()));
    }

    let output_dir = output_dir(output_path);
    if !output_dir.is_dir() {
        return Err(ProcessingError::OutputDirMissing(output_dir));
    }

    let output_path = output_path.with_extension(config.output_format.extension());
    let kind = InputKind::from_path(input_path);
    info!(
        "processing {} -> {} ({:?}, points_to_render={})",
        input_path.display(),
        output_path.display(),
        kind,
        config.points_to_render
    );

    match kind {
        InputKind::Container => process_container(input_path, output_path, config),
        InputKind::PassThrough => copy_through(input_path, output_path),
    }
}

/// Directory an output path is written into.
///
/// A bare file name such as `out.las` resolves to the current directory.
fn output_dir(output_path: &Path) -> PathBuf {
    match output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Runs [`process`] and reports every outcome, including panics, as an
/// [`Outcome`].
pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    config: &ProcessingConfig,
) -> Outcome {
    let (input_path, output_path) = (input_path.as_ref(), output_path.as_ref());
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        process(input_path, output_path, config)
    }))
    .unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unexpected failure".to_string());
        Err(ProcessingError::Unknown(message))
    });

    if let Err(e) = &result {
        warn!("processing {} failed: {}", input_path.display(), e);
    }
    result.into()
}

fn process_container(
    input_path: &Path,
    output_path: PathBuf,
    config: &ProcessingConfig,
) -> Result<Report, ProcessingError> {
    let cloud = codec::read(input_path).map_err(|e| match e {
        CodecError::NotFound(path) => ProcessingError::InputMissing(path),
        CodecError::Io(e) => {
            ProcessingError::Unknown(format!("failed to read {}: {}", input_path.display(), e))
        }
        other => ProcessingError::Format(other.to_string()),
    })?;

    let threshold = filter::threshold(cloud.points(), config.points_to_render)?;
    let mut filtered = filter::select_cloud_above(&cloud, threshold);
    debug!(
        "threshold z >= {} keeps {} of {} points",
        threshold,
        filtered.len(),
        cloud.len()
    );

    if config.extents == ExtentPolicy::Recompute {
        if let Some(bounds) = filtered.compute_bounds() {
            filtered.set_bounds(bounds);
        }
    }

    write_output(&filtered, &output_path, config.output_format)?;
    info!(
        "wrote {} of {} points to {}",
        filtered.len(),
        cloud.len(),
        output_path.display()
    );

    Ok(Report {
        kind: ReportKind::Filtered {
            points_read: cloud.len(),
            points_written: filtered.len(),
            threshold,
        },
        output_path,
    })
}

fn write_output(
    cloud: &PointCloud,
    path: &Path,
    format: OutputFormat,
) -> Result<(), ProcessingError> {
    let io_error = |message: String| ProcessingError::Io {
        path: path.to_path_buf(),
        message,
    };
    match format {
        OutputFormat::Las => codec::write(cloud, path).map_err(|e| io_error(e.to_string())),
        OutputFormat::Csv => {
            output::write_csv(path, cloud).map_err(|e: OutputError| io_error(e.to_string()))
        }
        OutputFormat::Text => {
            output::write_text(path, cloud).map_err(|e: OutputError| io_error(e.to_string()))
        }
    }
}

fn copy_through(input_path: &Path, output_path: PathBuf) -> Result<Report, ProcessingError> {
    let io_error = |message: String| ProcessingError::Io {
        path: output_path.clone(),
        message,
    };

    if let (Ok(src), Ok(dst)) = (input_path.canonicalize(), output_path.canonicalize()) {
        if src == dst {
            return Err(io_error(
                "source and destination are the same file".to_string(),
            ));
        }
    }

    warn!(
        "{} is not a LAS container, copying it unchanged",
        input_path.display()
    );
    let bytes = fs::copy(input_path, &output_path).map_err(|e| io_error(e.to_string()))?;

    Ok(Report {
        output_path,
        kind: ReportKind::Copied { bytes },
    })
}

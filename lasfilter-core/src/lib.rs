//! Height threshold filtering for LAS point cloud files.
//!
//! This crate reads uncompressed LAS containers, keeps the points whose Z lies
//! at or above a percentage of the file's height range, and writes a new
//! container whose header matches the retained points. Files that are not LAS
//! are copied through unchanged.
//!
//! # Example
//!
//! ```no_run
//! use lasfilter_core::{process, OutputFormat, ProcessingConfig};
//!
//! let config = ProcessingConfig::new(OutputFormat::Las, 50.0);
//! let report = process("scan.las", "out/scan_filtered.las", &config).unwrap();
//!
//! println!("{}", report);
//! ```
//!
//! # Features
//!
//! - LAS 1.0 - 1.4, point formats 0-10, extra bytes per point
//! - Unfiltered attributes, VLRs and EVLRs written back byte for byte
//! - LAS, CSV and plain text output
//! - `(success, message)` reporting for collaborators through [`run`]

pub mod codec;
pub mod config;
pub mod filter;
pub mod output;
pub mod process;
pub mod relocate;
pub mod types;

// Re-export commonly used types
pub use codec::CodecError;
pub use config::{ConfigError, ExtentPolicy, OutputFormat, ProcessingConfig};
pub use filter::FilterError;
pub use output::OutputError;
pub use process::{process, run, InputKind, Outcome, ProcessingError, Report, ReportKind};
pub use relocate::{move_to_downloads, relocate, RelocateError};
pub use types::{Bounds, LayoutError, PointCloud, PointCloudHeader, PointFormat, PointRecord};

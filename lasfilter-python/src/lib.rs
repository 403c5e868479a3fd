//! Python bindings for the lasfilter processing pipeline.
//!
//! Desktop and web front ends call [`process_file`] with plain strings and
//! get the `(success, message)` pair back; failures never raise.

use lasfilter_core::{codec, filter, OutputFormat, PointCloudHeader, ProcessingConfig};
use numpy::{IntoPyArray, PyArray1};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::str::FromStr;

/// Header metadata of a LAS file.
#[pyclass]
pub struct Header {
    #[pyo3(get)]
    version: (u8, u8),
    #[pyo3(get)]
    point_format: u8,
    #[pyo3(get)]
    record_length: u16,
    #[pyo3(get)]
    point_count: u64,
    #[pyo3(get)]
    scale: (f64, f64, f64),
    #[pyo3(get)]
    offset: (f64, f64, f64),
    #[pyo3(get)]
    min: (f64, f64, f64),
    #[pyo3(get)]
    max: (f64, f64, f64),
}

#[pymethods]
impl Header {
    fn __repr__(&self) -> String {
        format!(
            "Header(version={}.{}, point_format={}, point_count={})",
            self.version.0, self.version.1, self.point_format, self.point_count
        )
    }
}

impl From<&PointCloudHeader> for Header {
    fn from(header: &PointCloudHeader) -> Self {
        let triple = |v: [f64; 3]| (v[0], v[1], v[2]);
        Self {
            version: header.version,
            point_format: header.point_format.id,
            record_length: header.point_format.record_length,
            point_count: header.point_count,
            scale: triple(header.scale),
            offset: triple(header.offset),
            min: triple(header.bounds.min),
            max: triple(header.bounds.max),
        }
    }
}

/// Processes a file and returns (success, message).
///
/// Args:
///     input_path: Path to the input file (.las is filtered, others copied)
///     output_path: Output path, its extension is replaced by output_format
///     output_format: ".las", ".txt" or ".csv"
///     points_to_render: Height percentile used as threshold (10-100)
///
/// Example:
///     >>> import lasfilter
///     >>> ok, msg = lasfilter.process_file("scan.las", "out/scan.las", ".las", 50.0)
#[pyfunction]
#[pyo3(signature = (input_path, output_path, output_format=".las", points_to_render=10.0))]
fn process_file(
    input_path: &str,
    output_path: &str,
    output_format: &str,
    points_to_render: f64,
) -> (bool, String) {
    let output_format = match OutputFormat::from_str(output_format) {
        Ok(format) => format,
        Err(e) => return (false, e.to_string()),
    };
    let config = ProcessingConfig::new(output_format, points_to_render);
    lasfilter_core::run(input_path, output_path, &config).into()
}

/// Reads the header of a LAS file.
#[pyfunction]
fn read_header(path: &str) -> PyResult<Header> {
    let cloud = codec::read(path)
        .map_err(|e| PyIOError::new_err(format!("Failed to read file: {}", e)))?;
    Ok(Header::from(cloud.header()))
}

/// Returns the Z values of the points a given percentile keeps, as a numpy array.
#[pyfunction]
fn filter_z<'py>(py: Python<'py>, path: &str, points_to_render: f64) -> PyResult<&'py PyArray1<f64>> {
    let cloud = codec::read(path)
        .map_err(|e| PyIOError::new_err(format!("Failed to read file: {}", e)))?;
    let kept = filter::select(cloud.points(), points_to_render)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let z: Vec<f64> = kept.iter().map(|p| p.z()).collect();
    Ok(z.into_pyarray(py))
}

/// Moves a file to ~/Downloads and returns (success, message).
#[pyfunction]
fn move_to_downloads(file_path: &str) -> (bool, String) {
    match lasfilter_core::move_to_downloads(file_path) {
        Ok(target) => (
            true,
            format!("File moved to Downloads → {}", target.display()),
        ),
        Err(e) => (false, e.to_string()),
    }
}

/// lasfilter module for Python.
#[pymodule]
fn _lasfilter(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(process_file, m)?)?;
    m.add_function(wrap_pyfunction!(read_header, m)?)?;
    m.add_function(wrap_pyfunction!(filter_z, m)?)?;
    m.add_function(wrap_pyfunction!(move_to_downloads, m)?)?;
    m.add_class::<Header>()?;
    Ok(())
}

//! Text output writers for processed point clouds.
//!
//! Both writers emit one line per point with the columns
//! `x, y, z, intensity, return_number, classification`. Coordinates are printed
//! with as many decimals as the axis scale resolves.

use crate::types::{PointCloud, PointCloudHeader, PointRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output writing.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Column names, in output order.
pub const COLUMNS: [&str; 6] = [
    "x",
    "y",
    "z",
    "intensity",
    "return_number",
    "classification",
];

/// Most decimals ever printed for a coordinate.
const MAX_DECIMALS: usize = 10;

/// Number of decimals needed to represent multiples of `scale`.
///
/// Counts the fractional digits of the shortest decimal form of `scale`, so
/// 0.25 needs two and 0.0025 needs four.
pub fn decimals_for_scale(scale: f64) -> usize {
    if !scale.is_finite() || scale <= 0.0 {
        return MAX_DECIMALS;
    }
    let text = scale.to_string();
    let digits = text.split_once('.').map_or(0, |(_, fraction)| fraction.len());
    digits.min(MAX_DECIMALS)
}

/// Column layout shared by the CSV and text writers.
#[derive(Debug, Clone, Copy)]
struct RowLayout {
    decimals: [usize; 3],
    delimiter: char,
}

impl RowLayout {
    fn new(header: &PointCloudHeader, delimiter: char) -> Self {
        Self {
            decimals: header.scale.map(decimals_for_scale),
            delimiter,
        }
    }

    #[inline]
    fn write_row<W: Write>(&self, writer: &mut W, point: &PointRecord) -> std::io::Result<()> {
        writeln!(
            writer,
            "{:.*}{d}{:.*}{d}{:.*}{d}{}{d}{}{d}{}",
            self.decimals[0],
            point.x(),
            self.decimals[1],
            point.y(),
            self.decimals[2],
            point.z(),
            point.intensity(),
            point.return_number(),
            point.classification(),
            d = self.delimiter,
        )
    }
}

/// CSV writer with a header line.
pub struct CsvWriter<W: Write> {
    writer: BufWriter<W>,
    layout: RowLayout,
}

impl<W: Write> CsvWriter<W> {
    /// Creates a CSV writer for points laid out as described by `header`.
    pub fn new(writer: W, header: &PointCloudHeader) -> Self {
        Self {
            writer: BufWriter::new(writer),
            layout: RowLayout::new(header, ','),
        }
    }

    /// Writes the column header line.
    pub fn write_header(&mut self) -> Result<(), OutputError> {
        writeln!(self.writer, "{}", COLUMNS.join(","))?;
        Ok(())
    }

    /// Writes a batch of points.
    pub fn write_points(&mut self, points: &[PointRecord]) -> Result<(), OutputError> {
        for point in points {
            self.layout.write_row(&mut self.writer, point)?;
        }
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Space separated text writer, no header line.
pub struct TextWriter<W: Write> {
    writer: BufWriter<W>,
    layout: RowLayout,
}

impl<W: Write> TextWriter<W> {
    pub fn new(writer: W, header: &PointCloudHeader) -> Self {
        Self {
            writer: BufWriter::new(writer),
            layout: RowLayout::new(header, ' '),
        }
    }

    pub fn write_points(&mut self, points: &[PointRecord]) -> Result<(), OutputError> {
        for point in points {
            self.layout.write_row(&mut self.writer, point)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes a point cloud to a CSV file.
pub fn write_csv<P: AsRef<Path>>(path: P, cloud: &PointCloud) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = CsvWriter::new(file, cloud.header());
    writer.write_header()?;
    writer.write_points(cloud.points())?;
    writer.flush()?;
    Ok(())
}

/// Writes a point cloud to a space separated text file.
pub fn write_text<P: AsRef<Path>>(path: P, cloud: &PointCloud) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = TextWriter::new(file, cloud.header());
    writer.write_points(cloud.points())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PointFormat;

    fn sample() -> (PointCloudHeader, Vec<PointRecord>) {
        let header = PointCloudHeader::new(
            PointFormat::new(1).unwrap(),
            [0.01, 0.01, 0.001],
            [0.0; 3],
        );
        let points = vec![
            PointRecord::from_coords(&header, [1.5, 2.25, 3.125])
                .unwrap()
                .with_intensity(300),
            PointRecord::from_coords(&header, [-4.0, 0.0, 10.0]).unwrap(),
        ];
        (header, points)
    }

    #[test]
    fn test_decimals_for_scale() {
        assert_eq!(decimals_for_scale(1.0), 0);
        assert_eq!(decimals_for_scale(0.1), 1);
        assert_eq!(decimals_for_scale(0.01), 2);
        assert_eq!(decimals_for_scale(0.001), 3);
        assert_eq!(decimals_for_scale(0.25), 2);
        assert_eq!(decimals_for_scale(0.0025), 4);
        assert_eq!(decimals_for_scale(2.5), 1);
        assert_eq!(decimals_for_scale(10.0), 0);
        assert_eq!(decimals_for_scale(0.0), MAX_DECIMALS);
        assert_eq!(decimals_for_scale(1e-15), MAX_DECIMALS);
    }

    #[test]
    fn test_csv_writer() {
        let (header, points) = sample();
        let mut output = Vec::new();
        {
            let mut writer = CsvWriter::new(&mut output, &header);
            writer.write_header().unwrap();
            writer.write_points(&points).unwrap();
            writer.flush().unwrap();
        }

        let output_str = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output_str.lines().collect();
        assert_eq!(
            lines,
            vec![
                "x,y,z,intensity,return_number,classification",
                "1.50,2.25,3.125,300,1,0",
                "-4.00,0.00,10.000,0,1,0",
            ]
        );
    }

    #[test]
    fn test_quarter_scale_keeps_coordinates() {
        let header = PointCloudHeader::new(PointFormat::new(0).unwrap(), [0.25; 3], [0.0; 3]);
        let point = PointRecord::from_coords(&header, [0.25, 0.75, 1.25]).unwrap();
        assert_eq!(point.xyz(), [0.25, 0.75, 1.25]);

        let mut output = Vec::new();
        {
            let mut writer = CsvWriter::new(&mut output, &header);
            writer.write_points(&[point]).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(String::from_utf8(output).unwrap(), "0.25,0.75,1.25,0,1,0\n");
    }

    #[test]
    fn test_text_writer() {
        let (header, points) = sample();
        let mut output = Vec::new();
        {
            let mut writer = TextWriter::new(&mut output, &header);
            writer.write_points(&points).unwrap();
            writer.flush().unwrap();
        }

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(output_str.lines().count(), 2);
        assert!(output_str.starts_with("1.50 2.25 3.125 300 1 0\n"));
    }
}

//! Core types for LAS point cloud data.
//!
//! A [`PointCloud`] is a [`PointCloudHeader`] plus the ordered list of
//! [`PointRecord`]s it declares. Records wrap the `las` crate's raw point so
//! attributes this crate does not interpret are written back exactly as they
//! were read.

use las::point::Format;
use las::raw::{self, point::Flags, Vlr};
use thiserror::Error;

/// Bits 7 and 6 of the format byte flag LAZ compressed point data.
pub(crate) const COMPRESSION_BITS: u8 = 0xC0;

/// Errors raised when records do not match the header's declared layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("unknown point format {0}")]
    UnknownFormat(u8),

    #[error("record {index} is laid out as {actual:?}, header declares {expected:?}")]
    FormatMismatch {
        index: usize,
        expected: PointFormat,
        actual: PointFormat,
    },

    #[error("point record does not decode as format {format}: {message}")]
    Decode { format: u8, message: String },
}

/// Point data record format.
///
/// `record_length` may exceed the format minimum when the file carries extra
/// bytes per point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointFormat {
    /// Format id (0-10)
    pub id: u8,
    /// Size of one point record in bytes
    pub record_length: u16,
}

impl PointFormat {
    /// Creates a format with the minimum record length for `id`.
    pub fn new(id: u8) -> Option<Self> {
        Self::with_extra_bytes(id, 0)
    }

    /// Creates a format with `extra` bytes appended to each record.
    pub fn with_extra_bytes(id: u8, extra: u16) -> Option<Self> {
        let min = Self::min_record_length(id)?;
        Some(Self {
            id,
            record_length: min.checked_add(extra)?,
        })
    }

    /// Returns the minimum record length for a format id, if it is known.
    pub fn min_record_length(id: u8) -> Option<u16> {
        if id & COMPRESSION_BITS != 0 {
            return None;
        }
        Format::new(id).ok().map(|format| format.len())
    }

    /// Formats 6-10 use the extended (LAS 1.4) record layout.
    #[inline]
    pub fn is_extended(&self) -> bool {
        self.id >= 6
    }

    /// Number of bytes beyond the format minimum.
    pub fn extra_bytes(&self) -> u16 {
        Self::min_record_length(self.id)
            .map(|min| self.record_length.saturating_sub(min))
            .unwrap_or(0)
    }

    /// The `las` point layout for this format, extra bytes included.
    pub fn layout(&self) -> Result<Format, LayoutError> {
        if self.id & COMPRESSION_BITS != 0 {
            return Err(LayoutError::UnknownFormat(self.id));
        }
        let mut format = Format::new(self.id).map_err(|_| LayoutError::UnknownFormat(self.id))?;
        format.extra_bytes = self.extra_bytes();
        Ok(format)
    }
}

/// Axis-aligned bounding extents in real-world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Bounds {
    /// Computes the extents of a set of points. Returns `None` when empty.
    pub fn from_points(points: &[PointRecord]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Bounds {
            min: first.xyz(),
            max: first.xyz(),
        };
        for point in &points[1..] {
            for (axis, value) in point.xyz().into_iter().enumerate() {
                bounds.min[axis] = bounds.min[axis].min(value);
                bounds.max[axis] = bounds.max[axis].max(value);
            }
        }
        Some(bounds)
    }
}

/// A single point.
///
/// Coordinates are decoded once (`stored * scale + offset`) and kept in step
/// with the header of the cloud holding the record.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    x: f64,
    y: f64,
    z: f64,
    format: PointFormat,
    point: raw::Point,
}

impl PointRecord {
    /// Decodes one record of `format` from `bytes`.
    pub(crate) fn decode(
        bytes: &[u8],
        format: PointFormat,
        layout: &Format,
        scale: &[f64; 3],
        offset: &[f64; 3],
    ) -> Result<Self, LayoutError> {
        let point = raw::Point::read_from(bytes, layout).map_err(|e| LayoutError::Decode {
            format: format.id,
            message: e.to_string(),
        })?;
        Ok(Self::wrap(point, format, scale, offset))
    }

    fn wrap(point: raw::Point, format: PointFormat, scale: &[f64; 3], offset: &[f64; 3]) -> Self {
        let mut record = Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            format,
            point,
        };
        record.rescale(scale, offset);
        record
    }

    /// Re-derives the real-world coordinates from the stored integers.
    pub(crate) fn rescale(&mut self, scale: &[f64; 3], offset: &[f64; 3]) {
        let [x, y, z] = self.stored_xyz();
        self.x = x as f64 * scale[0] + offset[0];
        self.y = y as f64 * scale[1] + offset[1];
        self.z = z as f64 * scale[2] + offset[2];
    }

    /// Builds a new record for `header`'s layout from real-world coordinates.
    ///
    /// All attributes other than position are zeroed, except the record is
    /// marked as return 1 of 1. Returns `None` if a coordinate does not fit the
    /// header's scale/offset in a 32-bit integer.
    pub fn from_coords(header: &PointCloudHeader, coords: [f64; 3]) -> Option<Self> {
        let format = header.point_format;
        let layout = format.layout().ok()?;

        let mut stored = [0i32; 3];
        for axis in 0..3 {
            let value = ((coords[axis] - header.offset[axis]) / header.scale[axis]).round();
            if !value.is_finite() || value < i32::MIN as f64 || value > i32::MAX as f64 {
                return None;
            }
            stored[axis] = value as i32;
        }

        let blank = vec![0u8; format.record_length as usize];
        let mut point = raw::Point::read_from(blank.as_slice(), &layout).ok()?;
        point.x = stored[0];
        point.y = stored[1];
        point.z = stored[2];
        // return number 1, number of returns 1
        point.flags = if layout.is_extended {
            Flags::ThreeByte(0x11, 0, 0)
        } else {
            Flags::TwoByte(0x09, 0)
        };

        Some(Self::wrap(point, format, &header.scale, &header.offset))
    }

    /// Returns a copy of this record with the intensity field set.
    pub fn with_intensity(mut self, intensity: u16) -> Self {
        self.point.intensity = intensity;
        self
    }

    /// Returns a copy of this record with its leading extra bytes overwritten.
    ///
    /// Bytes beyond the format's extra byte count are ignored.
    pub fn with_extra_bytes(mut self, bytes: &[u8]) -> Self {
        let n = self.point.extra_bytes.len().min(bytes.len());
        self.point.extra_bytes[..n].copy_from_slice(&bytes[..n]);
        self
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Real-world coordinates as an array.
    #[inline]
    pub fn xyz(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Stored integer coordinates.
    #[inline]
    pub fn stored_xyz(&self) -> [i32; 3] {
        [self.point.x, self.point.y, self.point.z]
    }

    /// Layout this record was decoded with.
    #[inline]
    pub fn format(&self) -> PointFormat {
        self.format
    }

    /// Pulse return magnitude.
    #[inline]
    pub fn intensity(&self) -> u16 {
        self.point.intensity
    }

    /// Return number (1-based, 0 if unset).
    pub fn return_number(&self) -> u8 {
        match self.point.flags {
            Flags::TwoByte(returns, _) => returns & 0x07,
            Flags::ThreeByte(returns, _, _) => returns & 0x0F,
        }
    }

    /// ASPRS classification code.
    pub fn classification(&self) -> u8 {
        match self.point.flags {
            Flags::TwoByte(_, class) => class & 0x1F,
            Flags::ThreeByte(_, _, class) => class,
        }
    }

    /// Bytes appended to the record beyond the format's fields.
    #[inline]
    pub fn extra_bytes(&self) -> &[u8] {
        &self.point.extra_bytes
    }

    #[inline]
    pub(crate) fn raw_point(&self) -> &raw::Point {
        &self.point
    }
}

/// File-level metadata of a LAS container.
///
/// Besides the interpreted fields, the header keeps the raw public header
/// block and the (extended) variable length records so they can be written
/// back unchanged.
#[derive(Debug)]
pub struct PointCloudHeader {
    /// (major, minor)
    pub version: (u8, u8),
    pub point_format: PointFormat,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
    pub point_count: u64,
    pub bounds: Bounds,
    pub(crate) raw: raw::Header,
    pub(crate) vlrs: Vec<Vlr>,
    /// Bytes between the last VLR and the point data
    pub(crate) vlr_padding: Vec<u8>,
    pub(crate) evlrs: Vec<Vlr>,
}

/// Field-by-field copy of a raw VLR; `las::raw::Vlr` does not implement `Clone`.
pub(crate) fn clone_vlr(vlr: &Vlr) -> Vlr {
    Vlr {
        reserved: vlr.reserved,
        user_id: vlr.user_id,
        record_id: vlr.record_id,
        record_length_after_header: vlr.record_length_after_header,
        description: vlr.description,
        data: vlr.data.clone(),
    }
}

impl Clone for PointCloudHeader {
    fn clone(&self) -> Self {
        PointCloudHeader {
            version: self.version,
            point_format: self.point_format.clone(),
            scale: self.scale,
            offset: self.offset,
            point_count: self.point_count,
            bounds: self.bounds.clone(),
            raw: self.raw.clone(),
            vlrs: self.vlrs.iter().map(clone_vlr).collect(),
            vlr_padding: self.vlr_padding.clone(),
            evlrs: self.evlrs.iter().map(clone_vlr).collect(),
        }
    }
}

impl PointCloudHeader {
    /// Creates a header for a new, empty container.
    ///
    /// Formats 0-5 produce a LAS 1.2 header, formats 6-10 a LAS 1.4 header.
    pub fn new(point_format: PointFormat, scale: [f64; 3], offset: [f64; 3]) -> Self {
        let version = if point_format.is_extended() {
            (1, 4)
        } else {
            (1, 2)
        };
        Self {
            version,
            point_format,
            scale,
            offset,
            point_count: 0,
            bounds: Bounds::default(),
            raw: crate::codec::blank_header(version),
            vlrs: Vec::new(),
            vlr_padding: Vec::new(),
            evlrs: Vec::new(),
        }
    }

    /// Size of the public header block in bytes.
    #[inline]
    pub fn header_size(&self) -> u16 {
        self.raw.header_size
    }

    /// Variable length records, in file order.
    #[inline]
    pub fn vlrs(&self) -> &[Vlr] {
        &self.vlrs
    }

    /// Extended variable length records (LAS 1.4), in file order.
    #[inline]
    pub fn evlrs(&self) -> &[Vlr] {
        &self.evlrs
    }
}

/// A header and the points it declares.
///
/// The point count in the header always equals the number of points, every
/// record uses the header's point format, and decoded coordinates follow the
/// header's scale and offset.
#[derive(Debug, Clone)]
pub struct PointCloud {
    header: PointCloudHeader,
    points: Vec<PointRecord>,
}

impl PointCloud {
    /// Creates a point cloud, setting the header's point count.
    ///
    /// Coordinates of records built against a different scale or offset are
    /// re-derived from their stored integers.
    pub fn new(
        mut header: PointCloudHeader,
        mut points: Vec<PointRecord>,
    ) -> Result<Self, LayoutError> {
        let expected = header.point_format;
        if let Some((index, point)) = points
            .iter()
            .enumerate()
            .find(|(_, p)| p.format != expected)
        {
            return Err(LayoutError::FormatMismatch {
                index,
                expected,
                actual: point.format,
            });
        }
        for point in &mut points {
            point.rescale(&header.scale, &header.offset);
        }
        header.point_count = points.len() as u64;
        Ok(Self { header, points })
    }

    /// Creates a cloud sharing this cloud's header metadata.
    ///
    /// Callers must only pass records taken from this cloud.
    pub(crate) fn derive(&self, points: Vec<PointRecord>) -> Self {
        let mut header = self.header.clone();
        header.point_count = points.len() as u64;
        Self { header, points }
    }

    #[inline]
    pub fn header(&self) -> &PointCloudHeader {
        &self.header
    }

    #[inline]
    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Overwrites the header's bounding extents.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.header.bounds = bounds;
    }

    /// Extents of the points actually present.
    pub fn compute_bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points)
    }

    pub fn into_parts(self) -> (PointCloudHeader, Vec<PointRecord>) {
        (self.header, self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(format: u8) -> PointCloudHeader {
        PointCloudHeader::new(
            PointFormat::new(format).unwrap(),
            [0.01, 0.01, 0.01],
            [100.0, 200.0, 0.0],
        )
    }

    fn decode(format: u8, bytes: &[u8]) -> PointRecord {
        let header = header(format);
        let layout = header.point_format.layout().unwrap();
        PointRecord::decode(bytes, header.point_format, &layout, &header.scale, &header.offset)
            .unwrap()
    }

    #[test]
    fn test_point_format_lengths() {
        assert_eq!(PointFormat::new(0).unwrap().record_length, 20);
        assert_eq!(PointFormat::new(3).unwrap().record_length, 34);
        assert_eq!(PointFormat::new(6).unwrap().record_length, 30);
        assert_eq!(PointFormat::new(10).unwrap().record_length, 67);
        assert!(PointFormat::new(11).is_none());
        assert!(PointFormat::new(0x81).is_none());

        let format = PointFormat::with_extra_bytes(1, 4).unwrap();
        assert_eq!(format.record_length, 32);
        assert_eq!(format.extra_bytes(), 4);
        assert_eq!(format.layout().unwrap().len(), 32);
    }

    #[test]
    fn test_from_coords_quantizes() {
        let header = header(0);
        let point = PointRecord::from_coords(&header, [101.234, 200.5, 7.891]).unwrap();
        assert_eq!(point.stored_xyz(), [123, 50, 789]);
        assert!((point.x() - 101.23).abs() < 1e-9);
        assert!((point.z() - 7.89).abs() < 1e-9);
        assert_eq!(point.format(), header.point_format);
        assert_eq!(point.return_number(), 1);
        assert!(point.extra_bytes().is_empty());
    }

    #[test]
    fn test_from_coords_out_of_range() {
        let header = header(0);
        assert!(PointRecord::from_coords(&header, [1e12, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_attributes_by_format() {
        let mut bytes = vec![0u8; 28];
        bytes[12] = 0x34;
        bytes[13] = 0x12;
        bytes[14] = 0b0001_0010;
        bytes[15] = 0b1000_0110;
        let point = decode(1, &bytes);
        assert_eq!(point.intensity(), 0x1234);
        assert_eq!(point.return_number(), 2);
        assert_eq!(point.classification(), 6);

        let mut bytes = vec![0u8; 30];
        bytes[14] = 0x3C;
        bytes[16] = 9;
        let point = decode(6, &bytes);
        assert_eq!(point.return_number(), 12);
        assert_eq!(point.classification(), 9);
    }

    #[test]
    fn test_extra_bytes_are_kept() {
        let format = PointFormat::with_extra_bytes(0, 3).unwrap();
        let header = PointCloudHeader::new(format, [1.0; 3], [0.0; 3]);
        let point = PointRecord::from_coords(&header, [1.0, 2.0, 3.0])
            .unwrap()
            .with_extra_bytes(&[7, 8, 9, 10]);
        assert_eq!(point.extra_bytes(), &[7, 8, 9]);
    }

    #[test]
    fn test_cloud_sets_point_count() {
        let header = header(0);
        let points = (0..3)
            .map(|i| PointRecord::from_coords(&header, [100.0, 200.0, i as f64]).unwrap())
            .collect();
        let cloud = PointCloud::new(header, points).unwrap();
        assert_eq!(cloud.header().point_count, 3);
        assert_eq!(cloud.len(), 3);
    }

    #[test]
    fn test_cloud_rejects_foreign_layout() {
        let header0 = header(0);
        let header1 = header(1);
        let point = PointRecord::from_coords(&header1, [100.0, 200.0, 0.0]).unwrap();
        let err = PointCloud::new(header0.clone(), vec![point]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::FormatMismatch {
                index: 0,
                expected: header0.point_format,
                actual: header1.point_format,
            }
        );
    }

    #[test]
    fn test_cloud_rescales_foreign_coordinates() {
        let coarse = header(0);
        let point = PointRecord::from_coords(&coarse, [101.0, 202.0, 3.0]).unwrap();
        assert_eq!(point.stored_xyz(), [100, 200, 300]);

        let fine = PointCloudHeader::new(coarse.point_format, [0.001; 3], [0.0; 3]);
        let cloud = PointCloud::new(fine, vec![point]).unwrap();
        let rescaled = &cloud.points()[0];
        assert_eq!(rescaled.stored_xyz(), [100, 200, 300]);
        assert!((rescaled.x() - 0.1).abs() < 1e-9);
        assert!((rescaled.y() - 0.2).abs() < 1e-9);
        assert!((rescaled.z() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_from_points() {
        let header = header(0);
        let points: Vec<_> = [[101.0, 202.0, 5.0], [100.5, 203.0, -1.0]]
            .into_iter()
            .map(|c| PointRecord::from_coords(&header, c).unwrap())
            .collect();
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds.min, [100.5, 202.0, -1.0]);
        assert_eq!(bounds.max, [101.0, 203.0, 5.0]);
        assert!(Bounds::from_points(&[]).is_none());
    }
}

//! LAS container reading and writing.
//!
//! Parsing goes through the `las` crate's raw layer so the public header
//! block, the VLRs, the EVLRs and every point record are written back as they
//! were read. Writing only updates the fields that depend on the point records
//! (counts, points by return, offsets) and the scale/offset/extents carried by
//! the [`PointCloudHeader`].

use crate::types::{
    Bounds, LayoutError, PointCloud, PointCloudHeader, PointFormat, PointRecord, COMPRESSION_BITS,
};
use las::raw::header::{Evlr, LargeFile};
use las::raw::{self, Vlr};
use las::Version;
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or writing a LAS container.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid LAS file: {0}")]
    Format(String),

    #[error("inconsistent point layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("LAS encoding error: {0}")]
    Las(#[from] las::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

const SIGNATURE: &[u8; 4] = b"LASF";
const GENERATING_SOFTWARE: &[u8] = b"lasfilter";

const HEADER_SIZE_1_0: u16 = 227;
const HEADER_SIZE_1_3: u16 = 235;
const HEADER_SIZE_1_4: u16 = 375;

/// Global encoding bit marking waveform packets stored inside the file.
const INTERNAL_WAVEFORM_BIT: u16 = 0x0002;

/// Reads a LAS file from disk.
pub fn read<P: AsRef<Path>>(path: P) -> Result<PointCloud, CodecError> {
    let path = path.as_ref();
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CodecError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    debug!("read {} bytes from {}", data.len(), path.display());
    read_from_bytes(&data)
}

fn malformed(what: &str, e: las::Error) -> CodecError {
    CodecError::Format(format!("{}: {}", what, e))
}

fn min_header_size(minor: u8) -> u16 {
    match minor {
        0..=2 => HEADER_SIZE_1_0,
        3 => HEADER_SIZE_1_3,
        _ => HEADER_SIZE_1_4,
    }
}

/// Parses a LAS container held in memory.
pub fn read_from_bytes(data: &[u8]) -> Result<PointCloud, CodecError> {
    if data.len() < SIGNATURE.len() || &data[..SIGNATURE.len()] != SIGNATURE {
        return Err(CodecError::Format("missing LASF signature".to_string()));
    }

    let mut cursor = Cursor::new(data);
    let raw = raw::Header::read_from(&mut cursor)
        .map_err(|e| malformed("unreadable public header block", e))?;

    let version = (raw.version.major, raw.version.minor);
    if version.0 != 1 {
        return Err(CodecError::Format(format!(
            "unsupported LAS version {}.{}",
            version.0, version.1
        )));
    }
    if version.1 > 4 {
        warn!(
            "LAS version 1.{} is newer than 1.4, reading with the 1.4 layout",
            version.1
        );
    }

    let header_size = raw.header_size;
    if header_size < min_header_size(version.1) || header_size as usize > data.len() {
        return Err(CodecError::Format(format!(
            "header size {} is invalid for LAS {}.{} ({} byte file)",
            header_size,
            version.0,
            version.1,
            data.len()
        )));
    }

    let format_id = raw.point_data_record_format;
    if format_id & COMPRESSION_BITS != 0 {
        return Err(CodecError::Format(
            "compressed (LAZ) point data is not supported".to_string(),
        ));
    }
    let record_length = raw.point_data_record_length;
    let min_record_length = PointFormat::min_record_length(format_id)
        .ok_or_else(|| CodecError::Format(format!("unknown point format {}", format_id)))?;
    if record_length < min_record_length {
        return Err(CodecError::Format(format!(
            "record length {} is shorter than the {} bytes point format {} requires",
            record_length, min_record_length, format_id
        )));
    }
    let point_format = PointFormat {
        id: format_id,
        record_length,
    };
    let layout = point_format.layout()?;

    let offset_to_points = raw.offset_to_point_data as usize;
    if offset_to_points < header_size as usize || offset_to_points > data.len() {
        return Err(CodecError::Format(format!(
            "offset to point data {} is outside the file",
            offset_to_points
        )));
    }

    cursor.set_position(u64::from(header_size));
    let mut vlrs = Vec::with_capacity(raw.number_of_variable_length_records as usize);
    for _ in 0..raw.number_of_variable_length_records {
        let vlr = Vlr::read_from(&mut cursor, false)
            .map_err(|e| malformed("unreadable variable length record", e))?;
        vlrs.push(vlr);
    }
    let vlr_end = cursor.position() as usize;
    if vlr_end > offset_to_points {
        return Err(CodecError::Format(format!(
            "{} VLRs run {} bytes into the point data",
            vlrs.len(),
            vlr_end - offset_to_points
        )));
    }
    let vlr_padding = data[vlr_end..offset_to_points].to_vec();

    let mut point_count = u64::from(raw.number_of_point_records);
    if let Some(large_file) = &raw.large_file {
        if large_file.number_of_point_records != 0 {
            point_count = large_file.number_of_point_records;
        }
    }

    let mut evlrs = Vec::new();
    let mut points_end = data.len();
    if let Some(evlr) = raw.evlr.as_ref().filter(|evlr| evlr.number_of_evlrs > 0) {
        let start = evlr.start_of_first_evlr;
        if start >= offset_to_points as u64 && start <= data.len() as u64 {
            cursor.set_position(start);
            for _ in 0..evlr.number_of_evlrs {
                let record = Vlr::read_from(&mut cursor, true)
                    .map_err(|e| malformed("unreadable extended variable length record", e))?;
                evlrs.push(record);
            }
            points_end = start as usize;
        } else {
            warn!(
                "dropping {} EVLRs with invalid start offset {}",
                evlr.number_of_evlrs, start
            );
        }
    }

    let available = ((points_end - offset_to_points) / record_length as usize) as u64;
    if point_count > available {
        return Err(CodecError::Format(format!(
            "header declares {} points but the point data holds only {}",
            point_count, available
        )));
    }

    let scale = [raw.x_scale_factor, raw.y_scale_factor, raw.z_scale_factor];
    let offset = [raw.x_offset, raw.y_offset, raw.z_offset];
    let bounds = Bounds {
        min: [raw.min_x, raw.min_y, raw.min_z],
        max: [raw.max_x, raw.max_y, raw.max_z],
    };

    let points_bytes = point_count as usize * record_length as usize;
    let points = data[offset_to_points..offset_to_points + points_bytes]
        .chunks_exact(record_length as usize)
        .map(|bytes| PointRecord::decode(bytes, point_format, &layout, &scale, &offset))
        .collect::<Result<Vec<_>, _>>()?;

    let header = PointCloudHeader {
        version,
        point_format,
        scale,
        offset,
        point_count,
        bounds,
        raw,
        vlrs,
        vlr_padding,
        evlrs,
    };

    debug!(
        "parsed LAS {}.{}, point format {}, {} points",
        version.0, version.1, point_format.id, point_count
    );

    Ok(PointCloud::new(header, points)?)
}

/// Writes a point cloud to a new LAS file at `path`, replacing any existing file.
pub fn write<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> Result<(), CodecError> {
    let file = File::create(path.as_ref())?;
    write_to(cloud, file)?;
    debug!(
        "wrote {} points to {}",
        cloud.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Serializes a point cloud as a LAS container.
///
/// The point count, points by return, offset to point data and EVLR start are
/// derived from `cloud`. Scale, offset and bounding extents are taken from the
/// header as they are; extents are not recomputed here.
pub fn write_to<W: Write>(cloud: &PointCloud, writer: W) -> Result<(), CodecError> {
    let header = cloud.header();
    let format = header.point_format;
    let layout = format.layout()?;
    let extended_header = header.version.1 >= 4 && header.header_size() >= HEADER_SIZE_1_4;
    let count = cloud.len() as u64;

    let mut vlr_block = Vec::new();
    for vlr in &header.vlrs {
        vlr.write_to(&mut vlr_block)?;
    }
    vlr_block.extend_from_slice(&header.vlr_padding);
    let mut evlr_block = Vec::new();
    for evlr in &header.evlrs {
        evlr.write_to(&mut evlr_block)?;
    }

    let offset_to_points = u32::try_from(header.header_size() as usize + vlr_block.len())
        .map_err(|_| CodecError::Format("header and VLRs exceed 4 GiB".to_string()))?;
    let number_of_vlrs = u32::try_from(header.vlrs.len())
        .map_err(|_| CodecError::Format("too many VLRs".to_string()))?;

    let mut by_return = [0u64; 15];
    for point in cloud.points() {
        let number = point.return_number() as usize;
        if (1..=15).contains(&number) {
            by_return[number - 1] += 1;
        }
    }

    let legacy_count = if extended_header {
        if format.is_extended() || count > u32::MAX as u64 {
            0
        } else {
            count as u32
        }
    } else {
        u32::try_from(count).map_err(|_| {
            CodecError::Format(format!(
                "{} points exceed the LAS {}.{} point count limit",
                count, header.version.0, header.version.1
            ))
        })?
    };

    let points_end = u64::from(offset_to_points) + count * u64::from(format.record_length);
    let evlr_start = if header.evlrs.is_empty() {
        None
    } else {
        Some(points_end)
    };

    let mut raw = header.raw.clone();
    raw.version = Version::new(header.version.0, header.version.1);
    raw.offset_to_point_data = offset_to_points;
    raw.number_of_variable_length_records = number_of_vlrs;
    raw.point_data_record_format = format.id;
    raw.point_data_record_length = format.record_length;
    raw.number_of_point_records = legacy_count;
    for (legacy, &n) in raw.number_of_points_by_return.iter_mut().zip(&by_return) {
        *legacy = if legacy_count == 0 { 0 } else { n as u32 };
    }
    raw.x_scale_factor = header.scale[0];
    raw.y_scale_factor = header.scale[1];
    raw.z_scale_factor = header.scale[2];
    raw.x_offset = header.offset[0];
    raw.y_offset = header.offset[1];
    raw.z_offset = header.offset[2];
    raw.min_x = header.bounds.min[0];
    raw.min_y = header.bounds.min[1];
    raw.min_z = header.bounds.min[2];
    raw.max_x = header.bounds.max[0];
    raw.max_y = header.bounds.max[1];
    raw.max_z = header.bounds.max[2];

    if let Some(start) = raw.start_of_waveform_data_packet_record {
        let old_evlr_start = header.raw.evlr.as_ref().map(|evlr| evlr.start_of_first_evlr);
        let relocated = match (old_evlr_start, evlr_start) {
            (Some(old), Some(new)) if old > 0 && start >= old => new + (start - old),
            _ => 0,
        };
        if start != 0 && relocated == 0 {
            warn!("waveform packets after the point data are not carried over");
            raw.global_encoding &= !INTERNAL_WAVEFORM_BIT;
        }
        raw.start_of_waveform_data_packet_record = Some(relocated);
    }

    if extended_header {
        raw.evlr = Some(Evlr {
            start_of_first_evlr: evlr_start.unwrap_or(0),
            number_of_evlrs: header.evlrs.len() as u32,
        });
        raw.large_file = Some(LargeFile {
            number_of_point_records: count,
            number_of_points_by_return: by_return,
        });
    }

    let mut writer = BufWriter::new(writer);
    raw.write_to(&mut writer)?;
    writer.write_all(&vlr_block)?;
    for point in cloud.points() {
        point.raw_point().write_to(&mut writer, &layout)?;
    }
    writer.write_all(&evlr_block)?;
    writer.flush()?;
    Ok(())
}

/// Builds the raw public header block of a new container.
pub(crate) fn blank_header(version: (u8, u8)) -> raw::Header {
    let mut generating_software = [0u8; 32];
    generating_software[..GENERATING_SOFTWARE.len()].copy_from_slice(GENERATING_SOFTWARE);

    let minor = version.1;
    raw::Header {
        file_signature: *SIGNATURE,
        version: Version::new(version.0, minor),
        generating_software,
        header_size: min_header_size(minor),
        start_of_waveform_data_packet_record: (minor >= 3).then_some(0),
        evlr: (minor >= 4).then_some(Evlr {
            start_of_first_evlr: 0,
            number_of_evlrs: 0,
        }),
        large_file: (minor >= 4).then_some(LargeFile {
            number_of_point_records: 0,
            number_of_points_by_return: [0; 15],
        }),
        padding: Vec::new(),
        ..Default::default()
    }
}

//! Height threshold filter.
//!
//! The threshold sits `percent` of the way between the lowest and highest Z of
//! the input. Points at or above it are kept in their original order. Bounds are
//! recomputed on every call, so filtering an already filtered set again at the
//! same percentage generally removes more points.

use crate::types::{PointCloud, PointRecord};
use thiserror::Error;

/// Errors that can occur while filtering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("point cloud is empty, Z range is undefined")]
    EmptyInput,
}

/// Returns the lowest and highest Z of `points`.
pub fn z_range(points: &[PointRecord]) -> Result<(f64, f64), FilterError> {
    let first = points.first().ok_or(FilterError::EmptyInput)?;
    Ok(points
        .iter()
        .fold((first.z(), first.z()), |(min, max), p| {
            (min.min(p.z()), max.max(p.z()))
        }))
}

/// Derives the Z threshold for `percent` (0-100) of the Z range.
pub fn threshold(points: &[PointRecord], percent: f64) -> Result<f64, FilterError> {
    let (min_z, max_z) = z_range(points)?;
    let threshold = min_z + (max_z - min_z) * (percent / 100.0);
    // Rounding must not lift the threshold above the highest point at 100%.
    if percent <= 100.0 {
        Ok(threshold.min(max_z))
    } else {
        Ok(threshold)
    }
}

/// Selects every point whose Z is at or above the threshold for `percent`.
pub fn select(points: &[PointRecord], percent: f64) -> Result<Vec<PointRecord>, FilterError> {
    let threshold = threshold(points, percent)?;
    Ok(select_above(points, threshold))
}

/// Selects every point whose Z is at or above `threshold`.
pub fn select_above(points: &[PointRecord], threshold: f64) -> Vec<PointRecord> {
    points.iter().filter(|p| p.z() >= threshold).cloned().collect()
}

/// Filters a point cloud into a new cloud with the same header metadata.
pub fn select_cloud(cloud: &PointCloud, percent: f64) -> Result<PointCloud, FilterError> {
    let threshold = threshold(cloud.points(), percent)?;
    Ok(select_cloud_above(cloud, threshold))
}

/// Keeps the points of `cloud` at or above an already derived `threshold`.
pub fn select_cloud_above(cloud: &PointCloud, threshold: f64) -> PointCloud {
    cloud.derive(select_above(cloud.points(), threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PointCloudHeader, PointFormat};
    use proptest::prelude::*;

    fn header() -> PointCloudHeader {
        PointCloudHeader::new(PointFormat::new(0).unwrap(), [0.01; 3], [0.0; 3])
    }

    fn points(zs: &[f64]) -> Vec<PointRecord> {
        let header = header();
        zs.iter()
            .enumerate()
            .map(|(i, &z)| PointRecord::from_coords(&header, [i as f64, 0.0, z]).unwrap())
            .collect()
    }

    fn zs(points: &[PointRecord]) -> Vec<f64> {
        points.iter().map(|p| p.z()).collect()
    }

    fn ten_levels() -> Vec<PointRecord> {
        points(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0])
    }

    #[test]
    fn test_half_threshold() {
        let input = ten_levels();
        assert!((threshold(&input, 50.0).unwrap() - 4.5).abs() < 1e-9);
        let kept = select(&input, 50.0).unwrap();
        assert_eq!(zs(&kept), vec![5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_ten_percent_threshold() {
        let input = ten_levels();
        assert!((threshold(&input, 10.0).unwrap() - 0.9).abs() < 1e-9);
        let kept = select(&input, 10.0).unwrap();
        assert_eq!(kept.len(), 9);
        assert_eq!(kept[0].z(), 1.0);
    }

    #[test]
    fn test_zero_percent_keeps_all() {
        let input = points(&[3.0, -2.0, 7.5]);
        assert_eq!(select(&input, 0.0).unwrap(), input);
    }

    #[test]
    fn test_hundred_percent_keeps_max_only() {
        let input = points(&[3.0, 9.0, -2.0, 9.0, 7.5]);
        let kept = select(&input, 100.0).unwrap();
        assert_eq!(zs(&kept), vec![9.0, 9.0]);
    }

    #[test]
    fn test_flat_cloud_keeps_all() {
        let input = points(&[4.0; 6]);
        for percent in [0.0, 10.0, 50.0, 100.0] {
            assert_eq!(select(&input, percent).unwrap().len(), 6);
        }
    }

    #[test]
    fn test_threshold_point_is_kept() {
        let input = points(&[0.0, 5.0, 10.0]);
        let kept = select(&input, 50.0).unwrap();
        assert_eq!(zs(&kept), vec![5.0, 10.0]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(select(&[], 50.0), Err(FilterError::EmptyInput));
        assert_eq!(z_range(&[]), Err(FilterError::EmptyInput));
    }

    #[test]
    fn test_refilter_shrinks() {
        let input = ten_levels();
        let once = select(&input, 50.0).unwrap();
        let twice = select(&once, 50.0).unwrap();
        assert_eq!(zs(&twice), vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_select_above_matches_percent_selection() {
        let input = ten_levels();
        let threshold = threshold(&input, 50.0).unwrap();
        assert_eq!(select_above(&input, threshold), select(&input, 50.0).unwrap());
        assert!(select_above(&input, 9.5).is_empty());
    }

    #[test]
    fn test_select_cloud_keeps_header_metadata() {
        let header = header();
        let cloud = PointCloud::new(header.clone(), ten_levels()).unwrap();
        let filtered = select_cloud(&cloud, 50.0).unwrap();
        assert_eq!(filtered.len(), 5);
        assert_eq!(filtered.header().point_count, 5);
        assert_eq!(filtered.header().scale, header.scale);
        assert_eq!(filtered.header().offset, header.offset);
        // the source cloud is untouched
        assert_eq!(cloud.len(), 10);
    }

    proptest! {
        #[test]
        fn prop_select_is_ordered_subsequence(
            raw_zs in prop::collection::vec(-10_000i32..10_000, 1..200),
            percent in 0.0f64..=100.0,
        ) {
            let input = points(&raw_zs.iter().map(|&z| z as f64 / 100.0).collect::<Vec<_>>());
            let kept = select(&input, percent).unwrap();
            prop_assert!(!kept.is_empty());

            let mut remaining = input.iter();
            for point in &kept {
                prop_assert!(remaining.any(|p| p == point));
            }
        }

        #[test]
        fn prop_zero_percent_keeps_everything(
            raw_zs in prop::collection::vec(-10_000i32..10_000, 1..200),
        ) {
            let input = points(&raw_zs.iter().map(|&z| z as f64 / 100.0).collect::<Vec<_>>());
            prop_assert_eq!(select(&input, 0.0).unwrap().len(), input.len());
        }

        #[test]
        fn prop_full_percent_keeps_only_max(
            raw_zs in prop::collection::vec(-10_000i32..10_000, 1..200),
        ) {
            let input = points(&raw_zs.iter().map(|&z| z as f64 / 100.0).collect::<Vec<_>>());
            let (_, max_z) = z_range(&input).unwrap();
            let kept = select(&input, 100.0).unwrap();
            prop_assert!(!kept.is_empty());
            prop_assert!(kept.iter().all(|p| p.z() == max_z));
        }

        #[test]
        fn prop_refilter_yields_subset(
            raw_zs in prop::collection::vec(-10_000i32..10_000, 1..200),
            percent in 0.0f64..=100.0,
        ) {
            let input = points(&raw_zs.iter().map(|&z| z as f64 / 100.0).collect::<Vec<_>>());
            let once = select(&input, percent).unwrap();
            let twice = select(&once, percent).unwrap();
            prop_assert!(twice.len() <= once.len());
            prop_assert!(twice.iter().all(|p| once.contains(p)));
        }
    }
}

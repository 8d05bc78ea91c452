// Region segmenter: threshold -> closing -> edges -> row x column grid

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Pdf2ImgError;
use crate::segment::morphology::binary_closing;
use crate::segment::profile::VarianceProfile;

/// Half-open rectangle `[row_start, row_end) x [col_start, col_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Region {
    pub fn height(&self) -> usize {
        self.row_end.saturating_sub(self.row_start)
    }

    pub fn width(&self) -> usize {
        self.col_end.saturating_sub(self.col_start)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows {}..{}, cols {}..{}",
            self.row_start, self.row_end, self.col_start, self.col_end
        )
    }
}

/// What to do when a closed activity mask has more rising than falling
/// edges (a run still active at the end of the sequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePairing {
    /// Pair edges in encounter order and drop the unmatched trailing run.
    #[default]
    Truncate,
    /// Fail with `MismatchedEdgeError`.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentParams {
    pub std_threshold: f64,
    pub row_kernel_width: usize,
    pub col_kernel_width: usize,
    pub edge_pairing: EdgePairing,
}

impl Default for SegmentParams {
    fn default() -> Self {
        SegmentParams {
            std_threshold: 5.0,
            row_kernel_width: 21,
            col_kernel_width: 11,
            edge_pairing: EdgePairing::Truncate,
        }
    }
}

/// Thresholded and closed activity masks.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityMask {
    pub rows_active: Vec<bool>,
    pub cols_active: Vec<bool>,
}

impl ActivityMask {
    pub fn from_profile(profile: &VarianceProfile, params: &SegmentParams) -> Self {
        let threshold = |values: &[f64]| -> Vec<bool> {
            values.iter().map(|&v| v > params.std_threshold).collect()
        };
        ActivityMask {
            rows_active: binary_closing(&threshold(&profile.row_activity), params.row_kernel_width),
            cols_active: binary_closing(&threshold(&profile.col_activity), params.col_kernel_width),
        }
    }
}

/// Rising and falling edge positions of a boolean sequence.
///
/// A start is the first active index of a run, a stop the first inactive
/// index after it. The sequence is treated as preceded by an inactive
/// position, so a run beginning at index 0 yields a start at 0. No stop is
/// emitted for a run that reaches the end.
pub fn find_edges(mask: &[bool]) -> (Vec<usize>, Vec<usize>) {
    let mut starts = Vec::new();
    let mut stops = Vec::new();
    let mut prev = false;
    for (i, &active) in mask.iter().enumerate() {
        match (prev, active) {
            (false, true) => starts.push(i),
            (true, false) => stops.push(i),
            _ => {}
        }
        prev = active;
    }
    (starts, stops)
}

/// Pair the i-th start with the i-th stop.
pub fn pair_edges(
    starts: &[usize],
    stops: &[usize],
    policy: EdgePairing,
    axis: &str,
) -> crate::error::Result<Vec<(usize, usize)>> {
    if policy == EdgePairing::Strict && starts.len() != stops.len() {
        return Err(Pdf2ImgError::mismatched_edge(format!(
            "{axis}: {} rising edge(s) but {} falling edge(s)",
            starts.len(),
            stops.len()
        )));
    }
    Ok(starts.iter().copied().zip(stops.iter().copied()).collect())
}

/// Derive the candidate sub-image grid from an activity profile.
///
/// Every row interval is combined with every column interval, rows-major, so
/// content that is not laid out as an axis-aligned grid produces one region
/// per row x column combination.
pub fn segment_regions(
    profile: &VarianceProfile,
    params: &SegmentParams,
) -> crate::error::Result<Vec<Region>> {
    let mask = ActivityMask::from_profile(profile, params);

    let (row_starts, row_stops) = find_edges(&mask.rows_active);
    let (col_starts, col_stops) = find_edges(&mask.cols_active);

    let row_intervals = pair_edges(&row_starts, &row_stops, params.edge_pairing, "rows")?;
    let col_intervals = pair_edges(&col_starts, &col_stops, params.edge_pairing, "columns")?;

    let mut regions = Vec::with_capacity(row_intervals.len() * col_intervals.len());
    for &(row_start, row_end) in &row_intervals {
        for &(col_start, col_end) in &col_intervals {
            regions.push(Region {
                row_start,
                row_end,
                col_start,
                col_end,
            });
        }
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_find_edges_interior_runs() {
        let (starts, stops) = find_edges(&mask("0011000111000"));
        assert_eq!(starts, vec![2, 7]);
        assert_eq!(stops, vec![4, 10]);
    }

    #[test]
    fn test_find_edges_leading_run_starts_at_zero() {
        let (starts, stops) = find_edges(&mask("1100"));
        assert_eq!(starts, vec![0]);
        assert_eq!(stops, vec![2]);
    }

    #[test]
    fn test_truncate_drops_trailing_run() {
        let (starts, stops) = find_edges(&mask("0110011"));
        assert_eq!(starts, vec![1, 5]);
        assert_eq!(stops, vec![3]);
        let pairs = pair_edges(&starts, &stops, EdgePairing::Truncate, "rows").unwrap();
        assert_eq!(pairs, vec![(1, 3)]);
    }

    #[test]
    fn test_strict_rejects_trailing_run() {
        let (starts, stops) = find_edges(&mask("0110011"));
        let err = pair_edges(&starts, &stops, EdgePairing::Strict, "rows").unwrap_err();
        assert!(matches!(err, Pdf2ImgError::MismatchedEdgeError(_)));
    }

    #[test]
    fn test_empty_profile_yields_no_regions() {
        let profile = VarianceProfile {
            row_activity: vec![],
            col_activity: vec![],
        };
        let regions = segment_regions(&profile, &SegmentParams::default()).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn test_regions_are_rows_major_cross_product() {
        let high = 50.0;
        let mut row_activity = vec![0.0; 20];
        let mut col_activity = vec![0.0; 20];
        for r in (2..5).chain(10..13) {
            row_activity[r] = high;
        }
        for c in (3..6).chain(12..15) {
            col_activity[c] = high;
        }
        let params = SegmentParams {
            std_threshold: 5.0,
            row_kernel_width: 3,
            col_kernel_width: 3,
            edge_pairing: EdgePairing::Strict,
        };
        let regions = segment_regions(
            &VarianceProfile {
                row_activity,
                col_activity,
            },
            &params,
        )
        .unwrap();

        let bounds: Vec<_> = regions
            .iter()
            .map(|r| (r.row_start, r.row_end, r.col_start, r.col_end))
            .collect();
        assert_eq!(
            bounds,
            vec![(2, 5, 3, 6), (2, 5, 12, 15), (10, 13, 3, 6), (10, 13, 12, 15)]
        );
    }

    #[test]
    fn test_threshold_is_strict_greater_than() {
        let profile = VarianceProfile {
            row_activity: vec![0.0, 5.0, 5.0, 0.0],
            col_activity: vec![0.0, 5.0, 5.0, 0.0],
        };
        let regions = segment_regions(&profile, &SegmentParams {
            row_kernel_width: 1,
            col_kernel_width: 1,
            ..SegmentParams::default()
        })
        .unwrap();
        assert!(regions.is_empty());
    }
}

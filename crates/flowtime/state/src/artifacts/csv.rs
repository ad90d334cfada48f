//! CSV time-series reading.
//!
//! Accepts `bin,value` rows or single-column files, each with an optional
//! header line. Bins the file does not cover are NaN.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::CsvSeriesReader;
use crate::error::{ArtifactError, ArtifactResult};

/// Reads series CSV files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCsvSeriesReader;

#[async_trait]
impl CsvSeriesReader for FsCsvSeriesReader {
    async fn read(&self, path: &Path, total_bins: usize) -> ArtifactResult<Vec<f64>> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ArtifactError::from_io(path, e))?;
        let values = parse_series(&contents, total_bins);
        debug!(path = %path.display(), bins = total_bins, "Read CSV series");
        Ok(values)
    }
}

/// Parse CSV text into exactly `total_bins` values.
pub fn parse_series(contents: &str, total_bins: usize) -> Vec<f64> {
    let mut values = vec![f64::NAN; total_bins];
    let mut next = 0usize;

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let Some(raw_value) = fields.last() else {
            continue;
        };
        let parsed = raw_value.parse::<f64>();
        if line_no == 0 && parsed.is_err() {
            // header
            continue;
        }

        let bin = if fields.len() >= 2 {
            fields[0].parse::<usize>().unwrap_or(next)
        } else {
            next
        };
        next = bin.saturating_add(1);

        if let Some(slot) = values.get_mut(bin) {
            *slot = parsed.unwrap_or(f64::NAN);
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header_and_bins() {
        let values = parse_series("t,value\n0,10\n1,12.5\n2,\n", 4);
        assert_eq!(values[0], 10.0);
        assert_eq!(values[1], 12.5);
        assert!(values[2].is_nan());
        assert!(values[3].is_nan());
    }

    #[test]
    fn test_parse_single_column() {
        let values = parse_series("5\n6\n7\n", 2);
        assert_eq!(values, vec![5.0, 6.0]);
    }

    #[test]
    fn test_parse_sparse_bins() {
        let values = parse_series("bin,value\n2,9\n", 3);
        assert!(values[0].is_nan());
        assert!(values[1].is_nan());
        assert_eq!(values[2], 9.0);
    }

    #[test]
    fn test_parse_bin_beyond_grid_is_ignored() {
        let values = parse_series("bin,value\n18446744073709551615,1\n4\n", 3);
        assert!(values.iter().all(|v| v.is_nan()));

        let values = parse_series("bin,value\n5,1\n0,2\n", 3);
        assert_eq!(values[0], 2.0);
        assert!(values[1].is_nan());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = FsCsvSeriesReader
            .read(Path::new("/nonexistent/series.csv"), 3)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

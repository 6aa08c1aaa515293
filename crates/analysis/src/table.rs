//! Cluster table loading.
//!
//! The station climatology table is a CSV file in a legacy Japanese
//! encoding. Cells are kept as text and parsed on demand, so a column that
//! is never read can hold anything.

use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;

use encoding_rs::Encoding;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};

/// Column names of the cluster table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub lon: String,
    pub lat: String,
    /// Externally supplied cluster id
    pub cluster: String,
    /// Binary flag used as the marker style
    pub flag: String,
    /// First feature column, inclusive
    pub first_feature: String,
    /// Last feature column, inclusive
    pub last_feature: String,
    /// Column that receives the computed labels
    pub computed_cluster: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            lon: "lon".to_string(),
            lat: "lat".to_string(),
            cluster: "cluster_NO".to_string(),
            flag: "frag".to_string(),
            first_feature: "1".to_string(),
            last_feature: "12".to_string(),
            computed_cluster: "cluster_py".to_string(),
        }
    }
}

/// One scatter point read from the table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterPoint {
    pub lon: f64,
    pub lat: f64,
    /// Colour category
    pub hue: i64,
    /// Marker category
    pub style: i64,
}

/// A CSV table with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ClusterTable {
    /// Read and decode a table from disk.
    pub fn load(path: impl AsRef<Path>, encoding: &str) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let table = Self::from_bytes(&bytes, encoding)?;
        debug!(
            path = %path.display(),
            rows = table.len(),
            columns = table.headers.len(),
            "Loaded cluster table"
        );
        Ok(table)
    }

    /// Decode `bytes` with a WHATWG encoding label and parse them as CSV.
    pub fn from_bytes(bytes: &[u8], encoding: &str) -> AnalysisResult<Self> {
        let text = decode(bytes, encoding)?;
        Self::from_csv(&text)
    }

    /// Parse UTF-8 CSV text. The first record supplies the headers.
    pub fn from_csv(text: &str) -> AnalysisResult<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> AnalysisResult<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
    }

    /// Raw cells of one column.
    pub fn column(&self, name: &str) -> AnalysisResult<Vec<&str>> {
        let index = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    pub fn numeric_column(&self, name: &str) -> AnalysisResult<Vec<f64>> {
        let index = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| parse_number(name, row, &cells[index]))
            .collect()
    }

    /// Integer categories of one column. Cells such as `3.0` are accepted.
    pub fn category_column(&self, name: &str) -> AnalysisResult<Vec<i64>> {
        let index = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| parse_category(name, row, &cells[index]))
            .collect()
    }

    /// Sorted distinct categories of one column.
    pub fn categories(&self, name: &str) -> AnalysisResult<Vec<i64>> {
        let mut values = self.category_column(name)?;
        values.sort_unstable();
        values.dedup();
        Ok(values)
    }

    /// Distinct values of a binary flag column, sorted. More than two is an
    /// error.
    pub fn flag_levels(&self, name: &str) -> AnalysisResult<Vec<i64>> {
        let levels = self.categories(name)?;
        if levels.len() > 2 {
            return Err(AnalysisError::InvalidValue {
                column: name.to_string(),
                row: 0,
                message: format!("expected at most 2 distinct values, found {:?}", levels),
            });
        }
        Ok(levels)
    }

    /// Positions of the contiguous column range `first..=last`.
    pub fn feature_range(&self, first: &str, last: &str) -> AnalysisResult<Range<usize>> {
        let start = self.column_index(first)?;
        let end = self.column_index(last)?;
        if end < start {
            return Err(AnalysisError::InvalidParameter(format!(
                "feature column '{}' comes before '{}'",
                last, first
            )));
        }
        Ok(start..end + 1)
    }

    /// Feature matrix with one row per table row and one column per
    /// position in `first..=last`.
    pub fn feature_matrix(&self, first: &str, last: &str) -> AnalysisResult<DMatrix<f64>> {
        let range = self.feature_range(first, last)?;
        let width = range.len();
        let mut data = Vec::with_capacity(self.rows.len() * width);
        for (row, cells) in self.rows.iter().enumerate() {
            for index in range.clone() {
                data.push(parse_number(&self.headers[index], row, &cells[index])?);
            }
        }
        Ok(DMatrix::from_row_slice(self.rows.len(), width, &data))
    }

    /// Scatter points coloured by `hue` and shaped by `style`.
    pub fn points(
        &self,
        columns: &ColumnNames,
        hue: &str,
        style: &str,
    ) -> AnalysisResult<Vec<ClusterPoint>> {
        let lons = self.numeric_column(&columns.lon)?;
        let lats = self.numeric_column(&columns.lat)?;
        let hues = self.category_column(hue)?;
        let styles = self.category_column(style)?;

        Ok(lons
            .into_iter()
            .zip(lats)
            .zip(hues.into_iter().zip(styles))
            .map(|((lon, lat), (hue, style))| ClusterPoint {
                lon,
                lat,
                hue,
                style,
            })
            .collect())
    }

    /// A copy of the table with `name` set to `values`. An existing column
    /// of that name is replaced; otherwise the column is appended.
    pub fn with_column<T: ToString>(&self, name: &str, values: &[T]) -> AnalysisResult<Self> {
        if values.len() != self.rows.len() {
            return Err(AnalysisError::InvalidParameter(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        let mut table = self.clone();
        match table.headers.iter().position(|h| h == name) {
            Some(index) => {
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row[index] = value.to_string();
                }
            }
            None => {
                table.headers.push(name.to_string());
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row.push(value.to_string());
                }
            }
        }
        Ok(table)
    }
}

fn decode<'a>(bytes: &'a [u8], label: &str) -> AnalysisResult<Cow<'a, str>> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| AnalysisError::UnknownEncoding(label.to_string()))?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or(AnalysisError::Encoding {
            encoding: encoding.name(),
        })
}

fn parse_number(column: &str, row: usize, cell: &str) -> AnalysisResult<f64> {
    cell.parse::<f64>().map_err(|_| AnalysisError::InvalidValue {
        column: column.to_string(),
        row: row + 1,
        message: format!("'{}' is not a number", cell),
    })
}

fn parse_category(column: &str, row: usize, cell: &str) -> AnalysisResult<i64> {
    if let Ok(value) = cell.parse::<i64>() {
        return Ok(value);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
        _ => Err(AnalysisError::InvalidValue {
            column: column.to_string(),
            row: row + 1,
            message: format!("'{}' is not an integer category", cell),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "name,lon,lat,cluster_NO,frag,1,2,3\n\
                         a,135.0,35.0,1,0,1.5,2.5,3.5\n\
                         b,140.0,40.0,2.0,1,4.0,5.0,6.0\n";

    #[test]
    fn test_from_csv_headers_and_rows() {
        let table = ClusterTable::from_csv(SMALL).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.headers()[0], "name");
        assert_eq!(table.column("name").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_column() {
        let table = ClusterTable::from_csv(SMALL).unwrap();
        assert!(matches!(
            table.numeric_column("elevation"),
            Err(AnalysisError::MissingColumn(name)) if name == "elevation"
        ));
    }

    #[test]
    fn test_invalid_number_reports_row() {
        let table = ClusterTable::from_csv("lon,lat\n135,35\nx,40\n").unwrap();
        match table.numeric_column("lon") {
            Err(AnalysisError::InvalidValue { column, row, .. }) => {
                assert_eq!(column, "lon");
                assert_eq!(row, 2);
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_categories_accept_integral_floats() {
        let table = ClusterTable::from_csv(SMALL).unwrap();
        assert_eq!(table.category_column("cluster_NO").unwrap(), vec![1, 2]);
        assert_eq!(table.categories("frag").unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_flag_with_three_values_is_rejected() {
        let table = ClusterTable::from_csv("frag\n0\n1\n2\n").unwrap();
        assert!(matches!(
            table.flag_levels("frag"),
            Err(AnalysisError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_feature_matrix_shape() {
        let table = ClusterTable::from_csv(SMALL).unwrap();
        let matrix = table.feature_matrix("1", "3").unwrap();
        assert_eq!(matrix.shape(), (2, 3));
        assert_eq!(matrix[(1, 2)], 6.0);
    }

    #[test]
    fn test_reversed_feature_range() {
        let table = ClusterTable::from_csv(SMALL).unwrap();
        assert!(matches!(
            table.feature_range("3", "1"),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_with_column_leaves_original() {
        let table = ClusterTable::from_csv(SMALL).unwrap();
        let labelled = table.with_column("cluster_py", &[4usize, 5]).unwrap();

        assert!(table.column_index("cluster_py").is_err());
        assert_eq!(labelled.category_column("cluster_py").unwrap(), vec![4, 5]);

        let replaced = labelled.with_column("cluster_py", &[0usize, 0]).unwrap();
        assert_eq!(replaced.headers().len(), labelled.headers().len());
        assert_eq!(replaced.category_column("cluster_py").unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_with_column_length_mismatch() {
        let table = ClusterTable::from_csv(SMALL).unwrap();
        assert!(table.with_column("cluster_py", &[1usize]).is_err());
    }

    #[test]
    fn test_unknown_encoding_label() {
        assert!(matches!(
            ClusterTable::from_bytes(b"a\n1\n", "no-such-encoding"),
            Err(AnalysisError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_invalid_bytes_for_encoding() {
        // Lone continuation byte
        assert!(matches!(
            ClusterTable::from_bytes(b"a\n\x80\n", "utf-8"),
            Err(AnalysisError::Encoding { .. })
        ));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let table = ClusterTable::from_csv("\u{feff}lon,lat\n1,2\n").unwrap();
        assert_eq!(table.numeric_column("lon").unwrap(), vec![1.0]);
    }
}

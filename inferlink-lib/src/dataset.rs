//! CSV-backed sample source.

use crate::error::Error;
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Row-oriented reader over a comma-delimited dataset with a header line.
///
/// Fields that do not parse as `f32` decode as `0.0`. Iteration ends at end
/// of file, at an empty row, or at a row whose field count does not match
/// the header.
pub struct CsvSource {
    records: csv::StringRecordsIntoIter<File>,
    columns: usize,
}

impl CsvSource {
    /// Open the dataset and read its header row. The header's field count
    /// fixes the width of every subsequent row.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_ref())?;
        let columns = reader.headers()?.len();
        if columns == 0 {
            return Err(Error::EmptyDataset);
        }
        info!(path = %path.as_ref().display(), columns, "dataset opened");
        Ok(Self {
            records: reader.into_records(),
            columns,
        })
    }

    /// Number of columns in the header row.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Next data row, or `None` once the stream is exhausted.
    pub fn next_row(&mut self) -> Result<Option<Vec<f32>>, Error> {
        let Some(record) = self.records.next() else {
            return Ok(None);
        };
        let record = record?;
        if record.iter().all(str::is_empty) {
            return Ok(None);
        }
        if record.len() != self.columns {
            warn!(
                expected = self.columns,
                got = record.len(),
                "row width does not match the header, stopping"
            );
            return Ok(None);
        }
        Ok(Some(record.iter().map(parse_field).collect()))
    }
}

fn parse_field(field: &str) -> f32 {
    field.trim().parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_dataset(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("inferlink-{}-{name}.csv", std::process::id()));
        let mut file = File::create(&path).expect("create dataset file");
        file.write_all(contents.as_bytes()).expect("write dataset");
        path
    }

    #[test]
    fn reads_header_then_rows() {
        let path = write_dataset("basic", "a,b\n1,2\n3,4\n");
        let mut source = CsvSource::open(&path).unwrap();
        assert_eq!(source.columns(), 2);
        assert_eq!(source.next_row().unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(source.next_row().unwrap(), Some(vec![3.0, 4.0]));
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn unparseable_fields_decode_as_zero() {
        let path = write_dataset("junk", "x,y,z\n1.5,abc,-2\n");
        let mut source = CsvSource::open(&path).unwrap();
        assert_eq!(source.next_row().unwrap(), Some(vec![1.5, 0.0, -2.0]));
    }

    #[test]
    fn row_width_mismatch_terminates_iteration() {
        let path = write_dataset("ragged", "a,b\n1,2\n1,2,3\n5,6\n");
        let mut source = CsvSource::open(&path).unwrap();
        assert_eq!(source.next_row().unwrap(), Some(vec![1.0, 2.0]));
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn header_only_file_yields_no_rows() {
        let path = write_dataset("empty", "a,b,c\n");
        let mut source = CsvSource::open(&path).unwrap();
        assert_eq!(source.columns(), 3);
        assert_eq!(source.next_row().unwrap(), None);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        assert!(CsvSource::open("/nonexistent/dataset.csv").is_err());
    }
}

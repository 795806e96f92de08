//! Flat acceptance store.
//!
//! The fetcher writes whatever fields the upstream returned; the estimator only needs a handful of
//! them. Keeping the table untyped means a write followed by a read returns exactly the same cells.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::prelude::*;

pub const BM_UNIT_ID: &str = "bmUnitId";
pub const TIME_FROM: &str = "timeFrom";
pub const TIME_TO: &str = "timeTo";
pub const LEVEL_FROM: &str = "levelFrom";
pub const LEVEL_TO: &str = "levelTo";

/// Columns every stored table leads with, in this order.
pub const LEADING_COLUMNS: [&str; 5] = [BM_UNIT_ID, TIME_FROM, TIME_TO, LEVEL_FROM, LEVEL_TO];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no acceptance data at `{}`", path.display())]
    NotFound { path: PathBuf },

    #[error("acceptance table is missing the `{column}` column")]
    MissingColumn { column: &'static str },

    #[error("failed to access `{}`", path.display())]
    Io {
        path: PathBuf,

        #[source]
        source: io::Error,
    },

    #[error("malformed acceptance table `{}`", path.display())]
    Csv {
        path: PathBuf,

        #[source]
        source: csv::Error,
    },
}

#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcceptanceTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl AcceptanceTable {
    pub const fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    /// Index of a column the estimator cannot do without.
    pub fn require_column(&self, name: &'static str) -> Result<usize, StoreError> {
        self.column(name).ok_or(StoreError::MissingColumn { column: name })
    }

    /// Overwrite the file at `path`, creating parent directories as needed.
    #[instrument(skip_all, fields(path = %path.display(), n_rows = self.len()))]
    pub fn write_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }
        let csv_error = |source| StoreError::Csv { path: path.to_path_buf(), source };
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer.write_record(&self.header).map_err(csv_error)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_error)?;
        }
        writer.flush().map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        info!("saved");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound { path: path.to_path_buf() }
            } else {
                StoreError::Io { path: path.to_path_buf(), source }
            }
        })?;
        let csv_error = |source| StoreError::Csv { path: path.to_path_buf(), source };
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let header = reader.headers().map_err(csv_error)?.iter().map(str::to_owned).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|record| record.iter().map(str::to_owned).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()
            .map_err(csv_error)?;
        let table = Self { header, rows };
        info!(n_rows = table.len(), "loaded");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AcceptanceTable {
        AcceptanceTable::new(
            ["bmUnitId", "timeFrom", "timeTo", "levelFrom", "levelTo", "soFlag"]
                .map(String::from)
                .to_vec(),
            vec![
                ["T_HOWAO-1", "2024-01-24T00:00:00Z", "2024-01-24T00:30:00Z", "-120", "-80", "true"]
                    .map(String::from)
                    .to_vec(),
                ["T_GYM-1", "2024-01-24T01:00:00Z", "2024-01-24T01:05:00Z", "0", "0", ""]
                    .map(String::from)
                    .to_vec(),
                ["E_MK, \"quoted\"", "2024-01-24T02:00:00Z", "2024-01-24T02:30:00Z", "1.5", "2", ""]
                    .map(String::from)
                    .to_vec(),
            ],
        )
    }

    #[test]
    fn test_round_trip() -> Result {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("raw").join("raw_acceptances.csv");
        let table = sample();
        table.write_to(&path)?;
        assert_eq!(AcceptanceTable::read_from(&path)?, table);
        Ok(())
    }

    #[test]
    fn test_write_overwrites() -> Result {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("raw_acceptances.csv");
        sample().write_to(&path)?;
        let smaller = AcceptanceTable::new(sample().header.clone(), sample().rows[..1].to_vec());
        smaller.write_to(&path)?;
        assert_eq!(AcceptanceTable::read_from(&path)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = AcceptanceTable::read_from(Path::new("/nonexistent/raw_acceptances.csv"));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_require_column() {
        let table = sample();
        assert_eq!(table.require_column(LEVEL_TO).ok(), Some(4));
        assert!(matches!(
            AcceptanceTable::default().require_column(TIME_FROM),
            Err(StoreError::MissingColumn { column: "timeFrom" })
        ));
    }
}

//! Static reference table: the BM unit fuel-type register.
//!
//! The register is published as a spreadsheet, but a CSV export works just as well.

use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use thiserror::Error;

use crate::prelude::*;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference table `{}` does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read the reference table `{}`: {cause}", path.display())]
    Unreadable { path: PathBuf, cause: String },

    #[error("unsupported reference table format `{}`", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("reference table has no `{column}` column (available: {available:?})")]
    MissingColumn { column: String, available: Vec<String> },
}

/// Reference table with trimmed headers and blank cells turned into [`None`].
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    header: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ReferenceTable {
    /// Build the table from raw cells, normalizing the header and the blanks.
    pub fn from_raw<H, R>(header: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        R: IntoIterator<Item = Vec<Option<String>>>,
    {
        Self {
            header: header.into_iter().map(|name| name.as_ref().trim().to_owned()).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|cell| cell.and_then(normalize_cell)).collect())
                .collect(),
        }
    }

    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Result<usize, ReferenceError> {
        self.header.iter().position(|column| column == name.trim()).ok_or_else(|| {
            ReferenceError::MissingColumn {
                column: name.to_owned(),
                available: self.header.clone(),
            }
        })
    }

    /// Cell values of the column, with [`None`] for blanks and short rows.
    pub fn cells(&self, index: usize) -> impl Iterator<Item = Option<&str>> {
        self.rows.iter().map(move |row| row.get(index).and_then(Option::as_deref))
    }

    /// Load from `.xlsx`/`.xls`/`.ods` via `calamine`, or from `.csv`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self, ReferenceError> {
        if !path.is_file() {
            return Err(ReferenceError::NotFound { path: path.to_path_buf() });
        }
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        let table = match extension.as_deref() {
            Some("csv") => Self::read_csv(path)?,
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => Self::read_workbook(path)?,
            _ => return Err(ReferenceError::UnsupportedFormat { path: path.to_path_buf() }),
        };
        info!(n_rows = table.len(), n_columns = table.header.len(), "loaded");
        Ok(table)
    }

    fn read_csv(path: &Path) -> Result<Self, ReferenceError> {
        let unreadable = |cause: csv::Error| ReferenceError::Unreadable {
            path: path.to_path_buf(),
            cause: cause.to_string(),
        };
        let mut reader =
            csv::ReaderBuilder::new().flexible(true).from_path(path).map_err(unreadable)?;
        let header = reader.headers().map_err(unreadable)?.clone();
        let rows = reader
            .records()
            .map(|record| {
                record.map(|record| record.iter().map(|cell| Some(cell.to_owned())).collect())
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(unreadable)?;
        Ok(Self::from_raw(&header, rows))
    }

    fn read_workbook(path: &Path) -> Result<Self, ReferenceError> {
        let unreadable =
            |cause: String| ReferenceError::Unreadable { path: path.to_path_buf(), cause };
        let mut workbook = open_workbook_auto(path).map_err(|error| unreadable(error.to_string()))?;
        let Some(sheet_name) = workbook.sheet_names().into_iter().next() else {
            return Err(unreadable("the workbook has no sheets".to_owned()));
        };
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|error| unreadable(error.to_string()))?;
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Err(unreadable(format!("sheet `{sheet_name}` is empty")));
        };
        let header: Vec<String> =
            header.iter().map(|cell| cell_to_string(cell).unwrap_or_default()).collect();
        let rows: Vec<Vec<Option<String>>> =
            rows.map(|row| row.iter().map(cell_to_string).collect()).collect();
        Ok(Self::from_raw(header, rows))
    }
}

/// Render a spreadsheet cell the way the identifier would be written in text.
fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(value) => Some(value.clone()),
        Data::Int(value) => Some(value.to_string()),
        #[expect(clippy::cast_possible_truncation)]
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            Some((*value as i64).to_string())
        }
        other => Some(other.to_string()),
    }
}

fn normalize_cell(cell: String) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == cell.len() {
        Some(cell)
    } else {
        Some(trimmed.to_owned())
    }
}

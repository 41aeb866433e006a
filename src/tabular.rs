use calamine::{open_workbook_auto, DataType, Reader};
use log::{debug, info, warn};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to obtain a table from a spreadsheet.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("file is locked by another process: {}", path.display())]
    Locked { path: PathBuf },
    #[error("could not read {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("workbook {} has no worksheet", path.display())]
    Empty { path: PathBuf },
}

impl SourceError {
    /// Operator-facing remediation for errors that have an obvious fix.
    pub fn hint(&self) -> Option<String> {
        match self {
            SourceError::NotFound { path } => Some(format!(
                "Make sure '{}' is in the working directory or point the configuration at it.",
                path.display()
            )),
            SourceError::Locked { .. } => {
                Some("The spreadsheet is probably open in Excel. Close it and run again.".to_string())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub number: Option<f64>, // Set when the spreadsheet stored a numeric value
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Cell { text: text.into(), number: None }
    }

    pub fn number(value: f64) -> Self {
        let text = if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            value.to_string()
        };
        Cell { text, number: Some(value) }
    }
}

/// Header row plus data rows; blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Option<Cell>>>,
}

/// Borrowed view of one data row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    cells: &'a [Option<Cell>],
}

impl<'a> Row<'a> {
    pub fn cell(&self, column: usize) -> Option<&'a Cell> {
        self.cells.get(column).and_then(|c| c.as_ref())
    }

    /// Trimmed text of a cell, `None` when missing or blank.
    pub fn text(&self, column: usize) -> Option<&'a str> {
        self.cell(column)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        (0..self.cells.len()).all(|column| self.text(column).is_none())
    }

    pub fn width(&self) -> usize {
        self.cells.len()
    }
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<Cell>>>) -> Self {
        Table { headers, rows }
    }

    /// Builds a text-only table; empty strings become blank cells.
    pub fn from_text_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        let headers = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|value| (!value.trim().is_empty()).then(|| Cell::text(*value)))
                    .collect()
            })
            .collect();
        Table { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { cells })
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Replaces the column named `header`, or appends it when absent.
    pub fn set_text_column(&mut self, header: &str, values: Vec<Option<String>>) {
        let column = match self.column_index(header) {
            Some(index) => index,
            None => {
                self.headers.push(header.to_string());
                self.headers.len() - 1
            }
        };

        let mut values = values.into_iter();
        for row in self.rows.iter_mut() {
            if row.len() <= column {
                row.resize(column + 1, None);
            }
            row[column] = values.next().flatten().map(Cell::text);
        }
    }
}

/// Anything that can produce a [`Table`].
pub trait TabularSource {
    fn describe(&self) -> String;
    fn read_table(&self) -> Result<Table, SourceError>;
}

impl TabularSource for Table {
    fn describe(&self) -> String {
        format!("in-memory table ({} rows)", self.rows.len())
    }

    fn read_table(&self) -> Result<Table, SourceError> {
        Ok(self.clone())
    }
}

/// First worksheet of an .xlsx/.xls/.ods workbook on disk.
#[derive(Debug, Clone)]
pub struct XlsxSource {
    path: PathBuf,
}

impl XlsxSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        XlsxSource { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_access(&self) -> Result<(), SourceError> {
        File::open(&self.path).map(drop).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::NotFound { path: self.path.clone() },
            ErrorKind::PermissionDenied => SourceError::Locked { path: self.path.clone() },
            _ => SourceError::Unreadable { path: self.path.clone(), reason: e.to_string() },
        })
    }

    fn unreadable(&self, reason: impl ToString) -> SourceError {
        SourceError::Unreadable { path: self.path.clone(), reason: reason.to_string() }
    }
}

impl TabularSource for XlsxSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_table(&self) -> Result<Table, SourceError> {
        self.check_access()?;
        info!("Reading spreadsheet {:?}", self.path);

        let mut workbook = open_workbook_auto(&self.path).map_err(|e| self.unreadable(e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SourceError::Empty { path: self.path.clone() })?
            .map_err(|e| self.unreadable(e))?;

        // The used range starts at the first filled cell; keep column A at index 0
        let Some((_, first_column)) = range.start() else {
            warn!("Worksheet in {:?} has no cells", self.path);
            return Ok(Table::default());
        };
        let leading = first_column as usize;

        let mut rows_iter = range.rows();
        let header_row = rows_iter
            .next()
            .ok_or_else(|| SourceError::Empty { path: self.path.clone() })?;
        let headers: Vec<String> = std::iter::repeat(String::new())
            .take(leading)
            .chain(header_row.iter().map(|cell| to_cell(cell).map(|c| c.text).unwrap_or_default()))
            .collect();

        let rows: Vec<Vec<Option<Cell>>> = rows_iter
            .map(|row| std::iter::repeat(None).take(leading).chain(row.iter().map(to_cell)).collect())
            .collect();

        debug!("Columns in {:?}: {:?}", self.path, headers);
        info!("Read {} rows from {:?}", rows.len(), self.path);
        Ok(Table::new(headers, rows))
    }
}

fn to_cell(cell: &DataType) -> Option<Cell> {
    let cell = match cell {
        DataType::Empty => return None,
        DataType::Float(value) => Cell::number(*value),
        DataType::Int(value) => Cell::number(*value as f64),
        DataType::String(text) => Cell::text(text.trim()),
        other => Cell::text(other.to_string().trim()),
    };
    if cell.text.is_empty() {
        None
    } else {
        Some(cell)
    }
}

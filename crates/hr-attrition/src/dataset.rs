use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::AttritionError;

// ---------------------------------------------------------------------------
// Cell: one parsed value of an employee record
// ---------------------------------------------------------------------------

const MISSING_MARKERS: [&str; 3] = ["na", "nan", "null"];

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Parses a raw CSV field. Blank fields and `NA`/`NaN`/`null` are missing.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || MISSING_MARKERS
                .iter()
                .any(|marker| trimmed.eq_ignore_ascii_case(marker))
        {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Number(value),
            Ok(_) => Self::Missing,
            Err(_) => Self::Text(trimmed.to_owned()),
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Number(n) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map_or(Self::Missing, Self::Number),
            Value::String(s) if s.trim().is_empty() => Self::Missing,
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Categorical view of the cell; numbers are rendered as text.
    pub fn category(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Number(v) => Some(v.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn numeric(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        let cells = values
            .into_iter()
            .map(|v| if v.is_finite() { Cell::Number(v) } else { Cell::Missing })
            .collect();
        Self::new(name, cells)
    }

    pub fn text<S: AsRef<str>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        let cells = values.into_iter().map(|v| Cell::parse(v.as_ref())).collect();
        Self::new(name, cells)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every present cell holds a number.
    pub fn is_numeric(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| matches!(cell, Cell::Missing | Cell::Number(_)))
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }
}

// ---------------------------------------------------------------------------
// EmployeeTable: named columns of equal length
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmployeeTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl EmployeeTable {
    pub fn new(columns: Vec<Column>) -> Result<Self, AttritionError> {
        let n_rows = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(AttritionError::MalformedDataset(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
            if column.len() != n_rows {
                return Err(AttritionError::MalformedDataset(format!(
                    "column '{}' has {} rows, expected {n_rows}",
                    column.name,
                    column.len()
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Loads a `.json` file as an array of records, anything else as CSV.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AttritionError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_path(path)
        } else {
            Self::from_csv_path(path)
        }
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, AttritionError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| AttritionError::io(path, source))?;
        let table = Self::from_csv_reader(file)?;
        tracing::debug!(
            path = %path.display(),
            rows = table.n_rows(),
            columns = table.n_columns(),
            "employee table loaded"
        );
        Ok(table)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, AttritionError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_owned).collect();
        let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
        for record in csv_reader.records() {
            let record = record?;
            for (column, field) in cells.iter_mut().zip(record.iter()) {
                column.push(Cell::parse(field));
            }
        }
        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, cells))
            .collect();
        Self::new(columns)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, AttritionError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| AttritionError::io(path, source))?;
        Self::from_json_str(&text)
    }

    /// Parses a JSON array of flat records. Columns are the union of keys in
    /// first-seen order; a record lacking a key contributes a missing cell.
    pub fn from_json_str(text: &str) -> Result<Self, AttritionError> {
        let records: Vec<Map<String, Value>> = serde_json::from_str(text)?;
        let mut names: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        let columns = names
            .into_iter()
            .map(|name| {
                let cells = records
                    .iter()
                    .map(|record| record.get(&name).map_or(Cell::Missing, Cell::from_json))
                    .collect();
                Column::new(name, cells)
            })
            .collect();
        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Names of numeric columns, in table order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        self.column(column).and_then(|c| c.cells.get(row))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

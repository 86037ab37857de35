//! In-memory tabular store for one uploaded dataset.
//!
//! The store keeps headers and positional rows exactly as parsed. Cells are
//! cast once at load time (see [`Value::from_cell`]); after that the store is
//! read-only and shared by the plan engine and the chart shaper.

use std::{collections::HashSet, io::Read, path::Path};

use anyhow::{Context, Result, bail};
use log::debug;

use crate::{
    data::{Record, Value},
    io_utils::{CsvSource, InputFormat},
};

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularStore {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularStore {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(headers.len());
        for header in &headers {
            if !seen.insert(header.as_str()) {
                bail!("Duplicate column '{header}' in headers");
            }
        }
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path, format: InputFormat) -> Result<Self> {
        let source = CsvSource::open(path, format)?;
        Self::load(source).with_context(|| format!("Loading {path:?}"))
    }

    pub fn from_reader<R: Read>(reader: R, format: InputFormat) -> Result<Self> {
        Self::load(CsvSource::new(reader, format))
    }

    fn load<R: Read>(mut source: CsvSource<R>) -> Result<Self> {
        let headers = source.headers()?;
        let mut rows = Vec::new();
        while let Some(cells) = source.next_row()? {
            if cells.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            let mut row = cells
                .iter()
                .take(headers.len())
                .map(|cell| Value::from_cell(cell))
                .collect::<Vec<_>>();
            row.resize(headers.len(), Value::Null);
            rows.push(row);
        }
        debug!(
            "Parsed {} row(s) across {} column(s)",
            rows.len(),
            headers.len()
        );
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Cell at `column` of `row`, null when the row is short.
    pub fn cell(row: &[Value], column: usize) -> &Value {
        row.get(column).unwrap_or(&NULL)
    }

    /// Keyed view of every row. Null cells are left out so that a missing
    /// value reads as absent.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row)
                    .filter(|(_, value)| !value.is_null())
                    .map(|(header, value)| (header.clone(), value.clone()))
                    .collect()
            })
            .collect()
    }
}

//! Column-major tables of loosely typed cells

use crate::error::{AdvisorError, AdvisorResult};
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

/// A single table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Interpret a raw CSV cell: blank is missing, numeric text is a number.
    pub fn parse_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_nan() => Value::Missing,
            Ok(number) => Value::Number(number),
            Err(_) => Value::Text(raw.to_string()),
        }
    }

    /// Numeric view of the cell, parsing text when possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(text) => text.trim().parse::<f64>().ok(),
            Value::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Text written to CSV output.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Missing => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(number) => write!(f, "{}", number),
            Value::Text(text) => write!(f, "{}", text),
            Value::Missing => write!(f, "NaN"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(number) => serializer.serialize_f64(*number),
            Value::Text(text) => serializer.serialize_str(text),
            Value::Missing => serializer.serialize_none(),
        }
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Number(number as f64)
    }
}

impl From<u32> for Value {
    fn from(number: u32) -> Self {
        Value::Number(number as f64)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

/// Column-major table.
///
/// The row count is stored explicitly so a frame with no columns can still
/// describe how many rows it represents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
    n_rows: usize,
}

impl Frame {
    /// Empty frame with `n_rows` rows and no columns.
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            data: Vec::new(),
            n_rows,
        }
    }

    /// Build a frame from named columns; all columns must have equal length.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> AdvisorResult<Self> {
        let n_rows = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        let mut frame = Self::with_rows(n_rows);
        for (name, values) in columns {
            frame.push_column(name, values)?;
        }
        Ok(frame)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.position(name).map(|idx| self.data[idx].as_slice())
    }

    /// Iterate `(name, values)` pairs in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.data.iter().map(Vec::as_slice))
    }

    /// Consume the frame into its `(name, values)` pairs.
    pub fn into_columns(self) -> Vec<(String, Vec<Value>)> {
        self.columns.into_iter().zip(self.data).collect()
    }

    /// Append a column, or replace the values of an existing column in place.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> AdvisorResult<()> {
        let name = name.into();
        if values.len() != self.n_rows {
            return Err(AdvisorError::Dataset(format!(
                "column '{}' has {} values, frame has {} rows",
                name,
                values.len(),
                self.n_rows
            )));
        }
        match self.position(&name) {
            Some(idx) => self.data[idx] = values,
            None => {
                self.columns.push(name);
                self.data.push(values);
            }
        }
        Ok(())
    }

    /// Replace the values of the column at `idx`.
    pub fn replace_at(&mut self, idx: usize, values: Vec<Value>) -> AdvisorResult<()> {
        if values.len() != self.n_rows {
            return Err(AdvisorError::Dataset(format!(
                "replacement for column {} has {} values, frame has {} rows",
                idx,
                values.len(),
                self.n_rows
            )));
        }
        self.data[idx] = values;
        Ok(())
    }

    /// Frame with exactly `names`, in order, filling absent columns via `fill`.
    pub fn reindex<F>(&self, names: &[String], mut fill: F) -> Frame
    where
        F: FnMut(&str) -> Value,
    {
        let mut out = Frame::with_rows(self.n_rows);
        for name in names {
            let values = match self.column(name) {
                Some(values) => values.to_vec(),
                None => vec![fill(name); self.n_rows],
            };
            out.columns.push(name.clone());
            out.data.push(values);
        }
        out
    }

    /// Frame with exactly `names`, which must all be present.
    pub fn select(&self, names: &[String]) -> AdvisorResult<Frame> {
        if let Some(missing) = names.iter().find(|name| !self.contains(name)) {
            return Err(AdvisorError::Dataset(format!("column '{}' not found", missing)));
        }
        Ok(self.reindex(names, |_| Value::Missing))
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Frame {
        let n_rows = n.min(self.n_rows);
        Frame {
            columns: self.columns.clone(),
            data: self.data.iter().map(|values| values[..n_rows].to_vec()).collect(),
            n_rows,
        }
    }

    /// Cells of row `idx`, in column order.
    pub fn row(&self, idx: usize) -> Vec<&Value> {
        self.data.iter().map(|values| &values[idx]).collect()
    }

    /// Row-major numeric matrix; every cell must be numeric or numeric text.
    pub fn to_matrix(&self) -> AdvisorResult<Vec<Vec<f64>>> {
        let mut rows = vec![Vec::with_capacity(self.n_cols()); self.n_rows];
        for (name, values) in self.iter_columns() {
            for (row_idx, value) in values.iter().enumerate() {
                let number = value.as_f64().ok_or_else(|| {
                    AdvisorError::PredictionFailed(format!(
                        "column '{}' row {}: cannot convert '{}' to a number",
                        name, row_idx, value
                    ))
                })?;
                rows[row_idx].push(number);
            }
        }
        Ok(rows)
    }

    /// Read a CSV table with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> AdvisorResult<Frame> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut data: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
        let mut n_rows = 0;

        for result in reader.records() {
            let record = result?;
            for (idx, values) in data.iter_mut().enumerate() {
                values.push(Value::parse_cell(record.get(idx).unwrap_or("")));
            }
            n_rows += 1;
        }

        Ok(Frame {
            columns: headers,
            data,
            n_rows,
        })
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> AdvisorResult<Frame> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }

    /// Write the frame as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> AdvisorResult<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.columns)?;
        for row_idx in 0..self.n_rows {
            writer.write_record(self.data.iter().map(|values| values[row_idx].to_cell()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> AdvisorResult<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| AdvisorError::Dataset(e.to_string()))
    }
}

//! Processed reference dataset

use crate::error::AdvisorResult;
use crate::types::frame::{Frame, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Read-only table used as a fallback schema source and for numeric defaults.
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    frame: Frame,
    numeric: Vec<bool>,
    medians: HashMap<String, f64>,
}

impl ReferenceDataset {
    /// Load the dataset from a CSV file.
    pub fn load<P: AsRef<Path>>(path: P) -> AdvisorResult<Self> {
        let path = path.as_ref();
        let frame = Frame::read_csv(path)?;
        let dataset = Self::from_frame(frame);

        info!(
            path = %path.display(),
            rows = dataset.n_rows(),
            columns = dataset.columns().len(),
            numeric_columns = dataset.numeric_columns().len(),
            "Reference dataset loaded"
        );

        Ok(dataset)
    }

    /// Wrap an in-memory frame, classifying columns and computing medians.
    pub fn from_frame(frame: Frame) -> Self {
        let mut numeric = Vec::with_capacity(frame.n_cols());
        let mut medians = HashMap::new();

        for (name, values) in frame.iter_columns() {
            // An all-missing column still counts as numeric.
            let is_numeric = values
                .iter()
                .all(|value| matches!(value, Value::Number(_) | Value::Missing));
            numeric.push(is_numeric);

            if is_numeric {
                if let Some(median) = median(values) {
                    medians.insert(name.to_string(), median);
                }
            }
        }

        Self {
            frame,
            numeric,
            medians,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn columns(&self) -> &[String] {
        self.frame.columns()
    }

    pub fn n_rows(&self) -> usize {
        self.frame.n_rows()
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.frame
            .position(column)
            .map(|idx| self.numeric[idx])
            .unwrap_or(false)
    }

    /// Names of numeric columns, in dataset order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns()
            .iter()
            .zip(&self.numeric)
            .filter(|(_, &numeric)| numeric)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Median of a numeric column; `None` for text columns or no numbers.
    pub fn median(&self, column: &str) -> Option<f64> {
        self.medians.get(column).copied()
    }

    /// First `n` rows, used as a sample batch.
    pub fn head(&self, n: usize) -> Frame {
        self.frame.head(n)
    }
}

fn median(values: &[Value]) -> Option<f64> {
    let mut numbers: Vec<f64> = values
        .iter()
        .filter_map(|value| match value {
            Value::Number(number) if !number.is_nan() => Some(*number),
            _ => None,
        })
        .collect();

    if numbers.is_empty() {
        return None;
    }

    numbers.sort_by(|a, b| a.total_cmp(b));
    let mid = numbers.len() / 2;
    if numbers.len() % 2 == 0 {
        Some((numbers[mid - 1] + numbers[mid]) / 2.0)
    } else {
        Some(numbers[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceDataset {
        let csv = "Size_in_SqFt,City,Parking_Space,Good_Investment\n\
                   100,Pune,,1\n\
                   300,Delhi,,0\n\
                   200,,,1\n";
        ReferenceDataset::from_frame(Frame::from_csv_reader(csv.as_bytes()).unwrap())
    }

    #[test]
    fn test_numeric_detection() {
        let dataset = reference();
        assert!(dataset.is_numeric("Size_in_SqFt"));
        assert!(!dataset.is_numeric("City"));
        assert!(dataset.is_numeric("Parking_Space"));
        assert!(!dataset.is_numeric("Unknown"));
        assert_eq!(
            dataset.numeric_columns(),
            vec!["Size_in_SqFt", "Parking_Space", "Good_Investment"]
        );
    }

    #[test]
    fn test_median() {
        let dataset = reference();
        assert_eq!(dataset.median("Size_in_SqFt"), Some(200.0));
        assert_eq!(dataset.median("Good_Investment"), Some(1.0));
        assert_eq!(dataset.median("Parking_Space"), None);
        assert_eq!(dataset.median("City"), None);
    }

    #[test]
    fn test_even_median() {
        assert_eq!(
            median(&[Value::Number(4.0), Value::Number(1.0), Value::Number(3.0), Value::Number(2.0)]),
            Some(2.5)
        );
    }
}

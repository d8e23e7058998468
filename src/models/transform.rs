//! Transform stages that run ahead of a pipeline's final estimator

use crate::error::{AdvisorError, AdvisorResult};
use crate::types::frame::{Frame, Value};
use serde::{Deserialize, Serialize};

/// A fitted preprocessing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Keep only the listed columns, in order
    Select(ColumnSelector),
    /// Replace missing or non-numeric cells with a constant
    Impute(Imputer),
    /// Center and scale numeric columns
    StandardScale(StandardScaler),
    /// Expand categorical columns into indicator columns
    OneHot(OneHotEncoder),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSelector {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRule {
    pub column: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    pub rules: Vec<FillRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub column: String,
    pub categories: Vec<String>,
}

/// Indicator columns are named `{column}_{category}` and placed after the
/// passthrough columns. Unknown categories encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub encodings: Vec<CategoryEncoding>,
}

impl Transform {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Transform::Select(_) => "select",
            Transform::Impute(_) => "impute",
            Transform::StandardScale(_) => "standard_scale",
            Transform::OneHot(_) => "one_hot",
        }
    }

    /// Apply the stage to a frame.
    pub fn apply(&self, x: &Frame) -> AdvisorResult<Frame> {
        match self {
            Transform::Select(selector) => x.select(&selector.columns).map_err(|e| {
                AdvisorError::prediction(format!("select stage: {}", e))
            }),
            Transform::Impute(imputer) => imputer.apply(x),
            Transform::StandardScale(scaler) => scaler.apply(x),
            Transform::OneHot(encoder) => encoder.apply(x),
        }
    }

    /// Output column names for the given input names.
    pub fn output_names(&self, input: &[String]) -> Vec<String> {
        match self {
            Transform::Select(selector) => selector.columns.clone(),
            Transform::Impute(_) | Transform::StandardScale(_) => input.to_vec(),
            Transform::OneHot(encoder) => encoder.output_names(input),
        }
    }
}

fn require_column<'a>(x: &'a Frame, stage: &str, column: &str) -> AdvisorResult<&'a [Value]> {
    x.column(column).ok_or_else(|| {
        AdvisorError::prediction(format!("{} stage: column '{}' not found", stage, column))
    })
}

impl Imputer {
    fn apply(&self, x: &Frame) -> AdvisorResult<Frame> {
        let mut out = x.clone();
        for rule in &self.rules {
            let filled: Vec<Value> = require_column(x, "impute", &rule.column)?
                .iter()
                .map(|value| Value::Number(value.as_f64().unwrap_or(rule.value)))
                .collect();
            out.push_column(rule.column.clone(), filled)?;
        }
        Ok(out)
    }
}

impl StandardScaler {
    fn apply(&self, x: &Frame) -> AdvisorResult<Frame> {
        if self.means.len() != self.columns.len() || self.scales.len() != self.columns.len() {
            return Err(AdvisorError::prediction(format!(
                "standard_scale stage: {} columns but {} means and {} scales",
                self.columns.len(),
                self.means.len(),
                self.scales.len()
            )));
        }

        let mut out = x.clone();
        for ((column, mean), scale) in self.columns.iter().zip(&self.means).zip(&self.scales) {
            let scale = if *scale == 0.0 { 1.0 } else { *scale };
            let scaled = require_column(x, "standard_scale", column)?
                .iter()
                .enumerate()
                .map(|(row, value)| {
                    value
                        .as_f64()
                        .map(|number| Value::Number((number - mean) / scale))
                        .ok_or_else(|| {
                            AdvisorError::prediction(format!(
                                "standard_scale stage: column '{}' row {}: '{}' is not numeric",
                                column, row, value
                            ))
                        })
                })
                .collect::<AdvisorResult<Vec<Value>>>()?;
            out.push_column(column.clone(), scaled)?;
        }
        Ok(out)
    }
}

impl OneHotEncoder {
    fn is_encoded(&self, column: &str) -> bool {
        self.encodings.iter().any(|encoding| encoding.column == column)
    }

    fn output_names(&self, input: &[String]) -> Vec<String> {
        let mut names: Vec<String> = input
            .iter()
            .filter(|name| !self.is_encoded(name))
            .cloned()
            .collect();
        for encoding in &self.encodings {
            for category in &encoding.categories {
                names.push(format!("{}_{}", encoding.column, category));
            }
        }
        names
    }

    fn apply(&self, x: &Frame) -> AdvisorResult<Frame> {
        let mut out = Frame::with_rows(x.n_rows());
        for (name, values) in x.iter_columns() {
            if !self.is_encoded(name) {
                out.push_column(name, values.to_vec())?;
            }
        }

        for encoding in &self.encodings {
            let source: Vec<String> = require_column(x, "one_hot", &encoding.column)?
                .iter()
                .map(Value::to_cell)
                .collect();
            for category in &encoding.categories {
                let indicator = source
                    .iter()
                    .map(|cell| Value::Number(if cell == category { 1.0 } else { 0.0 }))
                    .collect();
                out.push_column(format!("{}_{}", encoding.column, category), indicator)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_columns(vec![
            ("City", vec![Value::from("Pune"), Value::from("Goa"), Value::Missing]),
            ("BHK", vec![Value::Number(2.0), Value::Missing, Value::from("3")]),
        ])
        .unwrap()
    }

    fn one_hot() -> Transform {
        Transform::OneHot(OneHotEncoder {
            encodings: vec![CategoryEncoding {
                column: "City".into(),
                categories: vec!["Pune".into(), "Delhi".into()],
            }],
        })
    }

    #[test]
    fn test_one_hot_unknown_category_is_all_zero() {
        let out = one_hot().apply(&frame()).unwrap();
        assert_eq!(out.columns(), &["BHK", "City_Pune", "City_Delhi"]);
        assert_eq!(
            out.column("City_Pune").unwrap(),
            &[Value::Number(1.0), Value::Number(0.0), Value::Number(0.0)]
        );
        assert!(out.column("City_Delhi").unwrap().iter().all(|v| *v == Value::Number(0.0)));
    }

    #[test]
    fn test_output_names_match_apply() {
        let transform = one_hot();
        let input = frame().columns().to_vec();
        let applied = transform.apply(&frame()).unwrap();
        assert_eq!(transform.output_names(&input), applied.columns());
    }

    #[test]
    fn test_impute_then_scale() {
        let impute = Transform::Impute(Imputer {
            rules: vec![FillRule { column: "BHK".into(), value: 1.0 }],
        });
        let scale = Transform::StandardScale(StandardScaler {
            columns: vec!["BHK".into()],
            means: vec![2.0],
            scales: vec![0.5],
        });
        let out = scale.apply(&impute.apply(&frame()).unwrap()).unwrap();
        assert_eq!(
            out.column("BHK").unwrap(),
            &[Value::Number(0.0), Value::Number(-2.0), Value::Number(2.0)]
        );
    }

    #[test]
    fn test_scale_rejects_text() {
        let scale = Transform::StandardScale(StandardScaler {
            columns: vec!["City".into()],
            means: vec![0.0],
            scales: vec![1.0],
        });
        assert!(scale.apply(&frame()).is_err());
    }

    #[test]
    fn test_select_missing_column_fails() {
        let select = Transform::Select(ColumnSelector {
            columns: vec!["Floor_No".into()],
        });
        assert!(matches!(
            select.apply(&frame()),
            Err(AdvisorError::PredictionFailed(_))
        ));
    }
}

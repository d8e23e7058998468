//! Alignment of arbitrary input tables onto the feature schema.
//!
//! Four steps, always in this order:
//! 1. rename user-friendly column names through the synonym table
//! 2. choose fill values for schema columns the input lacks
//! 3. reorder to exactly the schema, dropping anything else
//! 4. coerce cell types using the reference dataset as the type oracle

use crate::dataset::ReferenceDataset;
use crate::error::{AdvisorError, AdvisorResult};
use crate::schema::FeatureSchema;
use crate::types::frame::{Frame, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// What to do when several input columns rename to the same name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenamePolicy {
    /// The later column's values replace the earlier column's, in place
    #[default]
    LastWriteWins,
    /// Fail with `AmbiguousRename`
    Reject,
}

/// Case-insensitive alias to canonical column name mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SynonymTable {
    entries: Vec<(String, String)>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl SynonymTable {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// The built-in aliases for listing columns.
    pub fn standard() -> Self {
        const STANDARD: &[(&str, &str)] = &[
            ("sqft", "Size_in_SqFt"),
            ("size", "Size_in_SqFt"),
            ("size_in_sqft", "Size_in_SqFt"),
            ("bhk", "BHK"),
            ("year", "Year_Built"),
            ("year_built", "Year_Built"),
            ("floor", "Floor_No"),
            ("floor_no", "Floor_No"),
            ("total_floors", "Total_Floors"),
            ("totalfloor", "Total_Floors"),
            ("age", "Age_of_Property"),
            ("age_of_property", "Age_of_Property"),
            ("id", "ID"),
        ];
        STANDARD
            .iter()
            .fold(Self::empty(), |table, (alias, canonical)| table.with_alias(*alias, *canonical))
    }

    /// Add or replace an alias.
    pub fn with_alias(mut self, alias: impl AsRef<str>, canonical: impl Into<String>) -> Self {
        let alias = normalize(alias.as_ref());
        let canonical = canonical.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == alias) {
            Some(entry) => entry.1 = canonical,
            None => self.entries.push((alias, canonical)),
        }
        self
    }

    /// Canonical name for `name`, if it is a known alias.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        let key = normalize(name);
        self.entries
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, canonical)| canonical.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Maps raw input onto the feature schema.
#[derive(Debug, Clone, Default)]
pub struct InputAligner {
    synonyms: SynonymTable,
    policy: RenamePolicy,
}

impl InputAligner {
    pub fn new(synonyms: SynonymTable, policy: RenamePolicy) -> Self {
        Self { synonyms, policy }
    }

    pub fn policy(&self) -> RenamePolicy {
        self.policy
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// Rename columns through the synonym table.
    ///
    /// Columns already named exactly like a schema feature keep their name.
    pub fn rename(&self, raw: &Frame, schema: &FeatureSchema) -> AdvisorResult<Frame> {
        let targets: Vec<String> = raw
            .columns()
            .iter()
            .map(|column| {
                if schema.contains(column) {
                    return column.clone();
                }
                self.synonyms
                    .canonical(column)
                    .map(str::to_string)
                    .unwrap_or_else(|| column.clone())
            })
            .collect();

        if self.policy == RenamePolicy::Reject {
            for target in &targets {
                let sources: Vec<String> = raw
                    .columns()
                    .iter()
                    .zip(&targets)
                    .filter(|(_, t)| *t == target)
                    .map(|(source, _)| source.clone())
                    .collect();
                if sources.len() > 1 {
                    return Err(AdvisorError::AmbiguousRename {
                        target: target.clone(),
                        sources,
                    });
                }
            }
        }

        let mut renamed = Frame::with_rows(raw.n_rows());
        for ((source, values), target) in raw.iter_columns().zip(&targets) {
            if renamed.contains(target) {
                warn!(
                    column = %source,
                    target = %target,
                    "Column renames onto an existing column; later values win"
                );
            } else if source != target {
                debug!(from = %source, to = %target, "Renamed input column");
            }
            renamed.push_column(target.clone(), values.to_vec())?;
        }
        Ok(renamed)
    }

    /// Fill value for a schema column absent from the input
    fn default_for(name: &str, reference: Option<&ReferenceDataset>) -> Value {
        match reference {
            Some(reference) if reference.is_numeric(name) => {
                Value::Number(reference.median(name).unwrap_or(0.0))
            }
            _ => Value::Text(String::new()),
        }
    }

    /// Produce a frame with exactly the schema's columns, in order, and the
    /// input's row count.
    pub fn align(
        &self,
        raw: &Frame,
        schema: &FeatureSchema,
        reference: Option<&ReferenceDataset>,
    ) -> AdvisorResult<Frame> {
        let renamed = self.rename(raw, schema)?;

        let fills: HashMap<String, Value> = schema
            .names()
            .iter()
            .filter(|name| !renamed.contains(name))
            .map(|name| (name.clone(), Self::default_for(name, reference)))
            .collect();

        let dropped = renamed
            .columns()
            .iter()
            .filter(|column| !schema.contains(column))
            .count();

        let mut aligned = renamed.reindex(schema.names(), |name| {
            fills.get(name).cloned().unwrap_or(Value::Missing)
        });

        for (idx, name) in schema.names().iter().enumerate() {
            let coerced = {
                let values = aligned.column(name).unwrap_or(&[]);
                if reference.map_or(false, |r| r.is_numeric(name)) {
                    let fill = fills.get(name).and_then(Value::as_f64).unwrap_or(0.0);
                    Some(coerce_numeric(values, fill))
                } else {
                    coerce_if_all_numeric(values)
                }
            };
            if let Some(values) = coerced {
                aligned.replace_at(idx, values)?;
            }
        }

        debug!(
            rows = aligned.n_rows(),
            features = aligned.n_cols(),
            filled = fills.len(),
            dropped = dropped,
            "Input aligned to feature schema"
        );
        Ok(aligned)
    }
}

/// Every cell numeric; anything unparsable becomes `fill`.
fn coerce_numeric(values: &[Value], fill: f64) -> Vec<Value> {
    values
        .iter()
        .map(|value| {
            Value::Number(value.as_f64().filter(|number| !number.is_nan()).unwrap_or(fill))
        })
        .collect()
}

/// Numeric conversion only when every present cell parses.
fn coerce_if_all_numeric(values: &[Value]) -> Option<Vec<Value>> {
    let has_text = values.iter().any(|value| matches!(value, Value::Text(_)));
    let all_parse = values
        .iter()
        .all(|value| value.is_missing() || value.as_f64().is_some());
    if !has_text || !all_parse {
        return None;
    }
    Some(
        values
            .iter()
            .map(|value| match value.as_f64() {
                Some(number) => Value::Number(number),
                None => Value::Missing,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaSource;
    use crate::types::record::InputRecord;

    fn schema(names: &[&str]) -> FeatureSchema {
        FeatureSchema::new(names.iter().copied(), SchemaSource::ReferenceDataset)
    }

    fn reference() -> ReferenceDataset {
        let frame = Frame::from_columns(vec![
            ("Size_in_SqFt", vec![100.0.into(), 200.0.into(), 300.0.into()]),
            ("BHK", vec![1.0.into(), 2.0.into(), 3.0.into()]),
            ("Year_Built", vec![2000.0.into(), 2010.0.into(), Value::Missing]),
            ("City", vec!["Pune".into(), "Goa".into(), "Delhi".into()]),
        ])
        .unwrap();
        ReferenceDataset::from_frame(frame)
    }

    fn full_schema() -> FeatureSchema {
        schema(&["Size_in_SqFt", "BHK", "Year_Built", "City"])
    }

    #[test]
    fn test_standard_synonyms() {
        let table = SynonymTable::standard();
        assert_eq!(table.canonical("  SQFT "), Some("Size_in_SqFt"));
        assert_eq!(table.canonical("TotalFloor"), Some("Total_Floors"));
        assert_eq!(table.canonical("Id"), Some("ID"));
        assert_eq!(table.canonical("City"), None);
    }

    #[test]
    fn test_extra_alias() {
        let aligner = InputAligner::new(
            SynonymTable::standard().with_alias("Area", "Size_in_SqFt"),
            RenamePolicy::LastWriteWins,
        );
        let raw = InputRecord::new().with("area", 640.0).to_frame();
        let out = aligner.align(&raw, &full_schema(), Some(&reference())).unwrap();
        assert_eq!(out.column("Size_in_SqFt").unwrap()[0], Value::Number(640.0));
    }

    #[test]
    fn test_sparse_record_end_to_end() {
        let raw = InputRecord::new().with("sqft", 900.0).with("bhk", 2.0).to_frame();
        let out = InputAligner::default()
            .align(&raw, &full_schema(), Some(&reference()))
            .unwrap();

        assert_eq!(out.columns(), full_schema().names());
        assert_eq!(out.n_rows(), 1);
        assert_eq!(out.column("Size_in_SqFt").unwrap()[0], Value::Number(900.0));
        assert_eq!(out.column("BHK").unwrap()[0], Value::Number(2.0));
        assert_eq!(out.column("Year_Built").unwrap()[0], Value::Number(2005.0));
        assert_eq!(out.column("City").unwrap()[0], Value::Text(String::new()));
    }

    #[test]
    fn test_missing_numeric_uses_median() {
        let raw = InputRecord::new().with("City", "Pune").to_frame();
        let out = InputAligner::default()
            .align(&raw, &full_schema(), Some(&reference()))
            .unwrap();
        assert_eq!(out.column("Size_in_SqFt").unwrap()[0], Value::Number(200.0));
    }

    #[test]
    fn test_without_reference_fills_empty_text() {
        let raw = InputRecord::new().with("bhk", 3.0).to_frame();
        let out = InputAligner::default().align(&raw, &full_schema(), None).unwrap();
        assert_eq!(out.column("Size_in_SqFt").unwrap()[0], Value::Text(String::new()));
        assert_eq!(out.column("BHK").unwrap()[0], Value::Number(3.0));
    }

    #[test]
    fn test_zero_overlap_keeps_shape() {
        let raw = Frame::from_columns(vec![
            ("colour", vec!["red".into(), "blue".into()]),
            ("mood", vec!["calm".into(), Value::Missing]),
        ])
        .unwrap();
        let out = InputAligner::default()
            .align(&raw, &full_schema(), Some(&reference()))
            .unwrap();
        assert_eq!(out.columns(), full_schema().names());
        assert_eq!(out.n_rows(), 2);
    }

    #[test]
    fn test_present_unparsable_numeric_becomes_zero() {
        let raw = InputRecord::new().with("sqft", "spacious").to_frame();
        let out = InputAligner::default()
            .align(&raw, &full_schema(), Some(&reference()))
            .unwrap();
        assert_eq!(out.column("Size_in_SqFt").unwrap()[0], Value::Number(0.0));
    }

    #[test]
    fn test_numeric_text_converted_without_reference() {
        let raw = InputRecord::new().with("City", "12").to_frame();
        let out = InputAligner::default().align(&raw, &schema(&["City"]), None).unwrap();
        assert_eq!(out.column("City").unwrap()[0], Value::Number(12.0));

        let raw = InputRecord::new().with("City", "Pune").to_frame();
        let out = InputAligner::default().align(&raw, &schema(&["City"]), None).unwrap();
        assert_eq!(out.column("City").unwrap()[0], Value::from("Pune"));
    }

    #[test]
    fn test_alignment_is_idempotent() {
        let raw = Frame::from_columns(vec![
            ("size", vec![Value::from("850"), Value::Missing]),
            ("City", vec!["Pune".into(), "Goa".into()]),
            ("extra", vec![1.0.into(), 2.0.into()]),
        ])
        .unwrap();
        let aligner = InputAligner::default();
        let once = aligner.align(&raw, &full_schema(), Some(&reference())).unwrap();
        let twice = aligner.align(&once, &full_schema(), Some(&reference())).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.column("Size_in_SqFt").unwrap()[1], Value::Number(0.0));
    }

    #[test]
    fn test_collision_last_write_wins() {
        let raw = InputRecord::new().with("sqft", 1.0).with("size", 2.0).to_frame();
        let renamed = InputAligner::default().rename(&raw, &full_schema()).unwrap();
        assert_eq!(renamed.columns(), &["Size_in_SqFt".to_string()]);
        assert_eq!(renamed.column("Size_in_SqFt").unwrap()[0], Value::Number(2.0));
    }

    #[test]
    fn test_collision_rejected() {
        let aligner = InputAligner::new(SynonymTable::standard(), RenamePolicy::Reject);
        let raw = InputRecord::new().with("sqft", 1.0).with("SIZE", 2.0).to_frame();
        match aligner.align(&raw, &full_schema(), None) {
            Err(AdvisorError::AmbiguousRename { target, sources }) => {
                assert_eq!(target, "Size_in_SqFt");
                assert_eq!(sources, vec!["sqft".to_string(), "SIZE".to_string()]);
            }
            other => panic!("expected AmbiguousRename, got {:?}", other),
        }
    }
}

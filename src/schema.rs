//! Feature schema resolution

use crate::dataset::ReferenceDataset;
use crate::models::handle::ModelHandle;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

/// Reference dataset columns that are prediction targets, not features
pub const DEFAULT_TARGET_COLUMNS: [&str; 2] = ["Good_Investment", "Future_Price_5Yrs"];

/// Where a schema's names came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaSource {
    /// Names declared by a loaded model
    ModelMetadata { model: String },
    /// Reference dataset columns minus the targets
    ReferenceDataset,
}

impl fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::ModelMetadata { model } => write!(f, "model metadata ({})", model),
            SchemaSource::ReferenceDataset => write!(f, "reference dataset"),
        }
    }
}

/// Ordered, duplicate-free feature names the models expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSchema {
    names: Vec<String>,
    source: SchemaSource,
}

impl FeatureSchema {
    /// Build a schema, dropping repeated names after their first occurrence.
    pub fn new<I, S>(names: I, source: SchemaSource) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| seen.insert(name.clone()))
            .collect();
        Self { names, source }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Picks the feature schema from model metadata or the reference dataset.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    target_columns: Vec<String>,
}

impl SchemaResolver {
    pub fn new(target_columns: Vec<String>) -> Self {
        Self { target_columns }
    }

    pub fn target_columns(&self) -> &[String] {
        &self.target_columns
    }

    /// First model (in the given order) declaring its inputs wins; otherwise
    /// the reference dataset columns minus the target columns.
    pub fn resolve(
        &self,
        models: &[&ModelHandle],
        reference: Option<&ReferenceDataset>,
    ) -> Option<FeatureSchema> {
        for model in models {
            if let Some(names) = model.declared_feature_names().filter(|names| !names.is_empty()) {
                let schema = FeatureSchema::new(
                    names.iter().cloned(),
                    SchemaSource::ModelMetadata {
                        model: model.label().to_string(),
                    },
                );
                info!(source = %schema.source(), features = schema.len(), "Feature schema resolved");
                return Some(schema);
            }
        }

        if let Some(reference) = reference {
            let names = reference
                .columns()
                .iter()
                .filter(|column| !self.target_columns.contains(column))
                .cloned();
            let schema = FeatureSchema::new(names, SchemaSource::ReferenceDataset);
            if !schema.is_empty() {
                info!(source = %schema.source(), features = schema.len(), "Feature schema resolved");
                return Some(schema);
            }
        }

        warn!("No model declares feature names and no usable reference dataset; feature schema unknown");
        None
    }
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_COLUMNS.iter().map(|c| c.to_string()).collect())
    }
}

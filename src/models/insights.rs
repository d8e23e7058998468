//! Feature importance extraction for display

use crate::dataset::ReferenceDataset;
use crate::models::handle::{ModelHandle, ModelKind};
use crate::schema::FeatureSchema;
use serde::Serialize;
use tracing::debug;

/// Numeric reference columns listed when importances cannot be named
pub const MISALIGNED_PREVIEW_COLUMNS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Outcome of an importance query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportanceReport {
    /// Top features, most important first
    Ranked { features: Vec<FeatureImportance> },
    /// Importances exist but do not line up with the known feature names
    Misaligned {
        expected: usize,
        found: usize,
        numeric_columns: Vec<String>,
    },
    Unavailable { reason: String },
}

impl ImportanceReport {
    fn unavailable(reason: impl Into<String>) -> Self {
        ImportanceReport::Unavailable {
            reason: reason.into(),
        }
    }
}

fn rank(names: &[String], importances: &[f64], top_n: usize) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances)
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(top_n);
    ranked
}

/// Rank the model's feature importances against the feature names it sees.
///
/// Pipelines name their importances through the first transform stage's
/// output names; bare estimators use the schema directly.
pub fn feature_importances(
    model: Option<&ModelHandle>,
    schema: Option<&FeatureSchema>,
    reference: Option<&ReferenceDataset>,
    top_n: usize,
) -> ImportanceReport {
    let Some(model) = model else {
        return ImportanceReport::unavailable("model is not loaded");
    };
    let schema_names: Vec<String> = schema.map(|s| s.names().to_vec()).unwrap_or_default();

    match model.kind() {
        ModelKind::Pipeline(pipeline) => {
            let Some(importances) = pipeline.estimator().feature_importances() else {
                return ImportanceReport::unavailable(format!(
                    "final stage '{}' ({}) exposes no feature importances",
                    pipeline.final_step.name,
                    pipeline.estimator().kind_name()
                ));
            };
            let names = match pipeline.steps.first() {
                Some(step) => step.transform.output_names(&schema_names),
                None => schema_names,
            };

            if names.len() == importances.len() {
                ImportanceReport::Ranked {
                    features: rank(&names, importances, top_n),
                }
            } else {
                debug!(
                    model = %model.label(),
                    names = names.len(),
                    importances = importances.len(),
                    "Importance length does not match feature names"
                );
                ImportanceReport::Misaligned {
                    expected: names.len(),
                    found: importances.len(),
                    numeric_columns: reference
                        .map(|r| {
                            r.numeric_columns()
                                .into_iter()
                                .take(MISALIGNED_PREVIEW_COLUMNS)
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            }
        }
        ModelKind::RawEstimator(estimator) => match estimator.feature_importances() {
            Some(importances) if importances.len() == schema_names.len() => ImportanceReport::Ranked {
                features: rank(&schema_names, importances, top_n),
            },
            Some(importances) => ImportanceReport::unavailable(format!(
                "{} importances for {} schema features",
                importances.len(),
                schema_names.len()
            )),
            None => ImportanceReport::unavailable(format!(
                "{} estimator exposes no feature importances",
                estimator.kind_name()
            )),
        },
        ModelKind::Ensemble(forest) => match forest.feature_importances.as_deref() {
            Some(importances) if importances.len() == schema_names.len() => ImportanceReport::Ranked {
                features: rank(&schema_names, importances, top_n),
            },
            Some(importances) => ImportanceReport::unavailable(format!(
                "{} importances for {} schema features",
                importances.len(),
                schema_names.len()
            )),
            None => ImportanceReport::unavailable("forest exposes no feature importances"),
        },
    }
}

//! Loaded model handles and the artifact format they are built from

use crate::error::AdvisorResult;
use crate::models::estimator::{Estimator, Forest, Task};
use crate::models::transform::Transform;
use crate::types::frame::Frame;
use serde::{Deserialize, Serialize};

/// Named transform stage of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStep {
    pub name: String,
    pub transform: Transform,
}

/// Named final stage of a pipeline
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalStep {
    pub name: String,
    pub estimator: Estimator,
}

/// Transform stages followed by a final estimator.
#[derive(Debug, Serialize, Deserialize)]
pub struct Pipeline {
    pub steps: Vec<TransformStep>,
    pub final_step: FinalStep,
    /// Columns the pipeline was fit on, when recorded
    pub feature_names_in: Option<Vec<String>>,
}

impl Pipeline {
    pub fn new(steps: Vec<TransformStep>, name: impl Into<String>, estimator: Estimator) -> Self {
        Self {
            steps,
            final_step: FinalStep {
                name: name.into(),
                estimator,
            },
            feature_names_in: None,
        }
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names_in = Some(names);
        self
    }

    /// Stage names in execution order, final estimator last.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|step| step.name.as_str())
            .chain(std::iter::once(self.final_step.name.as_str()))
            .collect()
    }

    pub fn estimator(&self) -> &Estimator {
        &self.final_step.estimator
    }

    /// Run every transform stage in order.
    pub fn transform(&self, x: &Frame) -> AdvisorResult<Frame> {
        let mut current = x.clone();
        for step in &self.steps {
            current = step.transform.apply(&current)?;
        }
        Ok(current)
    }

    /// Transform then predict with the final estimator.
    pub fn predict(&self, x: &Frame) -> AdvisorResult<Vec<f64>> {
        self.estimator().predict(&self.transform(x)?)
    }
}

/// On-disk artifact read by the JSON and bincode strategies.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelArtifact {
    Estimator(Estimator),
    Pipeline(Pipeline),
}

/// Structural variant of a loaded model, fixed at load time.
#[derive(Debug)]
pub enum ModelKind {
    /// Bare estimator; may declare its input columns
    RawEstimator(Estimator),
    /// Transform stages plus a final estimator
    Pipeline(Pipeline),
    /// Top-level forest whose member trees can be queried individually
    Ensemble(Forest),
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RawEstimator(_) => "raw_estimator",
            ModelKind::Pipeline(_) => "pipeline",
            ModelKind::Ensemble(_) => "ensemble",
        }
    }
}

/// Capabilities resolved once when the handle is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub predict_probability: bool,
    pub declared_feature_names: bool,
    pub per_estimator_predictors: bool,
    pub feature_importances: bool,
}

/// Immutable handle to a loaded model.
#[derive(Debug)]
pub struct ModelHandle {
    label: String,
    strategy: String,
    kind: ModelKind,
    capabilities: Capabilities,
}

impl ModelHandle {
    /// Classify an artifact into its handle variant and resolve capabilities.
    pub fn from_artifact(
        label: impl Into<String>,
        strategy: impl Into<String>,
        artifact: ModelArtifact,
    ) -> Self {
        let kind = match artifact {
            ModelArtifact::Pipeline(pipeline) => ModelKind::Pipeline(pipeline),
            ModelArtifact::Estimator(Estimator::Forest(forest)) => ModelKind::Ensemble(forest),
            ModelArtifact::Estimator(estimator) => ModelKind::RawEstimator(estimator),
        };
        Self::new(label, strategy, kind)
    }

    pub fn new(label: impl Into<String>, strategy: impl Into<String>, kind: ModelKind) -> Self {
        let capabilities = match &kind {
            ModelKind::RawEstimator(estimator) => Capabilities {
                predict_probability: estimator.supports_proba(),
                declared_feature_names: estimator.feature_names().is_some(),
                per_estimator_predictors: false,
                feature_importances: estimator.feature_importances().is_some(),
            },
            ModelKind::Pipeline(pipeline) => Capabilities {
                predict_probability: pipeline.estimator().supports_proba(),
                declared_feature_names: pipeline.feature_names_in.is_some(),
                per_estimator_predictors: pipeline.estimator().as_forest().is_some(),
                feature_importances: pipeline.estimator().feature_importances().is_some(),
            },
            ModelKind::Ensemble(forest) => Capabilities {
                predict_probability: forest.task == Task::Classification,
                declared_feature_names: forest.feature_names.is_some(),
                per_estimator_predictors: true,
                feature_importances: forest.feature_importances.is_some(),
            },
        };

        Self {
            label: label.into(),
            strategy: strategy.into(),
            kind,
            capabilities,
        }
    }

    /// Name the model was loaded under (file stem)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Load strategy that produced this handle
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Columns the model declares it was fit on.
    pub fn declared_feature_names(&self) -> Option<&[String]> {
        match &self.kind {
            ModelKind::RawEstimator(estimator) => estimator.feature_names(),
            ModelKind::Pipeline(pipeline) => pipeline.feature_names_in.as_deref(),
            ModelKind::Ensemble(forest) => forest.feature_names.as_deref(),
        }
    }

    /// Stage names when the model is a pipeline.
    pub fn step_names(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ModelKind::Pipeline(pipeline) => Some(pipeline.step_names()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::estimator::{DecisionTree, LinearModel, LogisticModel, TreeNode};
    use crate::models::transform::ColumnSelector;

    #[test]
    fn test_top_level_forest_is_ensemble() {
        let forest = Forest::new(
            Task::Regression,
            vec![DecisionTree::new(Task::Regression, TreeNode::value(1.0))],
        );
        let handle = ModelHandle::from_artifact(
            "regressor",
            "json",
            ModelArtifact::Estimator(Estimator::Forest(forest)),
        );
        assert_eq!(handle.kind().name(), "ensemble");
        assert!(handle.capabilities().per_estimator_predictors);
        assert!(!handle.capabilities().predict_probability);
    }

    #[test]
    fn test_raw_estimator_capabilities() {
        let model = LinearModel::new(vec![1.0], 0.0).with_feature_names(vec!["BHK".into()]);
        let handle = ModelHandle::from_artifact(
            "regressor",
            "json",
            ModelArtifact::Estimator(Estimator::Linear(model)),
        );
        assert_eq!(handle.kind().name(), "raw_estimator");
        assert!(handle.capabilities().declared_feature_names);
        assert_eq!(handle.declared_feature_names().unwrap(), &["BHK".to_string()]);
        assert!(handle.step_names().is_none());
    }

    #[test]
    fn test_pipeline_capabilities_follow_final_stage() {
        let pipeline = Pipeline::new(
            vec![TransformStep {
                name: "select".into(),
                transform: Transform::Select(ColumnSelector {
                    columns: vec!["BHK".into()],
                }),
            }],
            "classifier",
            Estimator::Logistic(LogisticModel::new(vec![1.0], 0.0)),
        );
        let handle = ModelHandle::from_artifact("clf", "bincode", ModelArtifact::Pipeline(pipeline));
        let caps = handle.capabilities();
        assert!(caps.predict_probability);
        assert!(!caps.declared_feature_names);
        assert!(!caps.per_estimator_predictors);
        assert_eq!(handle.step_names().unwrap(), vec!["select", "classifier"]);
        assert_eq!(handle.strategy(), "bincode");
    }
}

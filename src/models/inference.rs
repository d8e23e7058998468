//! Uniform prediction over the different model shapes
//!
//! `predict` is strict and returns errors. Probability and variance are
//! advisory: every failure is logged and collapses to `None`.

use crate::error::{AdvisorError, AdvisorResult};
use crate::models::estimator::Forest;
use crate::models::handle::{ModelHandle, ModelKind, Pipeline};
use crate::types::frame::{Frame, Value};
use std::borrow::Cow;
use tracing::debug;

/// How a pipeline's input is prepared for its final estimator when only
/// the final stage is queried (probability, per-tree variance).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformRoute {
    /// Every transform stage in order
    FullChain,
    /// Only the first transform stage
    FirstStageOnly,
    /// The input as given
    Untransformed,
}

impl TransformRoute {
    /// Routes in the order they are tried
    pub const ORDER: [TransformRoute; 3] = [
        TransformRoute::FullChain,
        TransformRoute::FirstStageOnly,
        TransformRoute::Untransformed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformRoute::FullChain => "full_chain",
            TransformRoute::FirstStageOnly => "first_stage_only",
            TransformRoute::Untransformed => "untransformed",
        }
    }

    fn prepare<'a>(&self, pipeline: &Pipeline, x: &'a Frame) -> AdvisorResult<Cow<'a, Frame>> {
        match self {
            TransformRoute::FullChain => pipeline.transform(x).map(Cow::Owned),
            TransformRoute::FirstStageOnly => match pipeline.steps.first() {
                Some(step) => step.transform.apply(x).map(Cow::Owned),
                None => Ok(Cow::Borrowed(x)),
            },
            TransformRoute::Untransformed => Ok(Cow::Borrowed(x)),
        }
    }
}

/// A route that did not produce a usable result
#[derive(Debug, Clone, PartialEq)]
struct RouteFailure {
    route: TransformRoute,
    reason: String,
}

/// `route: reason` for every failed route, in the order tried
fn describe_failures(failures: &[RouteFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.route.name(), failure.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Run `query` against the final estimator on the first route that works.
fn first_working_route<T, F>(
    pipeline: &Pipeline,
    x: &Frame,
    purpose: &str,
    query: F,
) -> Result<T, Vec<RouteFailure>>
where
    F: Fn(&Frame) -> AdvisorResult<T>,
{
    let mut failures = Vec::new();
    for route in TransformRoute::ORDER {
        match route.prepare(pipeline, x).and_then(|input| query(&*input)) {
            Ok(value) => {
                debug!(purpose = purpose, route = route.name(), "Pipeline route succeeded");
                return Ok(value);
            }
            Err(e) => {
                debug!(purpose = purpose, route = route.name(), error = %e, "Pipeline route failed");
                failures.push(RouteFailure {
                    route,
                    reason: e.to_string(),
                });
            }
        }
    }
    Err(failures)
}

/// Restrict `x` to the columns the model declares, zero-filling absent ones.
fn declared_input<'a>(model: &ModelHandle, x: &'a Frame) -> Cow<'a, Frame> {
    match model.declared_feature_names() {
        Some(names) => Cow::Owned(x.reindex(names, |_| Value::Number(0.0))),
        None => Cow::Borrowed(x),
    }
}

fn as_prediction_failure(e: AdvisorError) -> AdvisorError {
    match e {
        AdvisorError::PredictionFailed(_) => e,
        other => AdvisorError::prediction(other),
    }
}

/// Predicted labels (classifier) or values (regressor), one per row.
pub fn predict(model: Option<&ModelHandle>, x: &Frame) -> AdvisorResult<Vec<f64>> {
    let model = model.ok_or(AdvisorError::NullModel)?;
    let result = match model.kind() {
        ModelKind::Pipeline(pipeline) => pipeline.predict(x),
        ModelKind::RawEstimator(estimator) => estimator.predict(&declared_input(model, x)),
        ModelKind::Ensemble(forest) => declared_input(model, x)
            .to_matrix()
            .and_then(|rows| forest.predict(&rows)),
    };
    result.map_err(as_prediction_failure)
}

/// Probability of class 1 per row, when the model can estimate it.
///
/// Rows with fewer than two classes report `0.0`.
pub fn predict_probability(model: Option<&ModelHandle>, x: &Frame) -> Option<Vec<f64>> {
    let model = model?;
    if !model.capabilities().predict_probability {
        debug!(model = %model.label(), "Model has no probability output");
        return None;
    }

    let proba = match model.kind() {
        ModelKind::Pipeline(pipeline) => {
            first_working_route(pipeline, x, "probability", |input| {
                pipeline.estimator().predict_proba(input)
            })
            .map_err(|failures| {
                debug!(
                    model = %model.label(),
                    routes = failures.len(),
                    reasons = %describe_failures(&failures),
                    "No route produced probabilities"
                );
            })
            .ok()?
        }
        ModelKind::RawEstimator(estimator) => estimator
            .predict_proba(&declared_input(model, x))
            .map_err(|e| debug!(model = %model.label(), error = %e, "Probability unavailable"))
            .ok()?,
        ModelKind::Ensemble(forest) => declared_input(model, x)
            .to_matrix()
            .and_then(|rows| forest.predict_proba(&rows))
            .map_err(|e| debug!(model = %model.label(), error = %e, "Probability unavailable"))
            .ok()?,
    };

    Some(
        proba
            .iter()
            .map(|classes| if classes.len() >= 2 { classes[1] } else { 0.0 })
            .collect(),
    )
}

/// Spread of the member trees' predictions per row (population std).
pub fn predict_variance(model: Option<&ModelHandle>, x: &Frame) -> Option<Vec<f64>> {
    let model = model?;
    match model.kind() {
        ModelKind::Pipeline(pipeline) => {
            let forest = pipeline.estimator().as_forest()?;
            first_working_route(pipeline, x, "variance", |input| per_tree_spread(forest, input))
                .map_err(|failures| {
                    debug!(
                        model = %model.label(),
                        routes = failures.len(),
                        reasons = %describe_failures(&failures),
                        "No route produced a spread"
                    );
                })
                .ok()
        }
        ModelKind::Ensemble(forest) => per_tree_spread(forest, &declared_input(model, x))
            .map_err(|e| debug!(model = %model.label(), error = %e, "Spread unavailable"))
            .ok(),
        ModelKind::RawEstimator(_) => None,
    }
}

fn per_tree_spread(forest: &Forest, x: &Frame) -> AdvisorResult<Vec<f64>> {
    let rows = x.to_matrix()?;
    let per_tree = forest.per_estimator_predictions(&rows)?;
    Ok((0..rows.len())
        .map(|row| population_std(per_tree.iter().map(|preds| preds[row])))
        .collect())
}

fn population_std(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::estimator::{
        DecisionTree, Estimator, LinearModel, LogisticModel, Task, TreeNode,
    };
    use crate::models::handle::{ModelArtifact, TransformStep};
    use crate::models::transform::{ColumnSelector, StandardScaler, Transform};

    fn handle(artifact: ModelArtifact) -> ModelHandle {
        ModelHandle::from_artifact("test", "json", artifact)
    }

    fn frame(columns: Vec<(&str, Vec<Value>)>) -> Frame {
        Frame::from_columns(columns).unwrap()
    }

    fn select(columns: &[&str]) -> TransformStep {
        TransformStep {
            name: "select".into(),
            transform: Transform::Select(ColumnSelector {
                columns: columns.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }

    fn stump(threshold: f64, low: f64, high: f64) -> DecisionTree {
        DecisionTree::new(
            Task::Regression,
            TreeNode::split(0, threshold, TreeNode::value(low), TreeNode::value(high)),
        )
    }

    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    #[test]
    fn test_predict_without_model() {
        let x = frame(vec![("BHK", vec![2.0.into()])]);
        assert!(matches!(predict(None, &x), Err(AdvisorError::NullModel)));
        assert!(predict_probability(None, &x).is_none());
        assert!(predict_variance(None, &x).is_none());
    }

    #[test]
    fn test_raw_estimator_reindexes_to_declared_names() {
        let model = handle(ModelArtifact::Estimator(Estimator::Linear(
            LinearModel::new(vec![1.0, 10.0], 0.0)
                .with_feature_names(vec!["BHK".into(), "Floor_No".into()]),
        )));
        let x = frame(vec![
            ("City", vec!["Pune".into()]),
            ("BHK", vec![2.0.into()]),
        ]);
        assert_eq!(predict(Some(&model), &x).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_pipeline_failure_is_prediction_failed() {
        let pipeline = Pipeline::new(
            vec![select(&["City"])],
            "regressor",
            Estimator::Linear(LinearModel::new(vec![1.0], 0.0)),
        );
        let model = handle(ModelArtifact::Pipeline(pipeline));
        let x = frame(vec![("City", vec!["Pune".into()])]);
        assert!(matches!(
            predict(Some(&model), &x),
            Err(AdvisorError::PredictionFailed(_))
        ));
    }

    #[test]
    fn test_probability_requires_capability() {
        let model = handle(ModelArtifact::Estimator(Estimator::Linear(LinearModel::new(
            vec![1.0],
            0.0,
        ))));
        let x = frame(vec![("x", vec![1.0.into()])]);
        assert!(predict_probability(Some(&model), &x).is_none());
    }

    #[test]
    fn test_raw_probability_is_class_one() {
        let model = handle(ModelArtifact::Estimator(Estimator::Logistic(LogisticModel::new(
            vec![1.0],
            0.0,
        ))));
        let x = frame(vec![("x", vec![0.0.into(), 2.0.into()])]);
        let proba = predict_probability(Some(&model), &x).unwrap();
        assert!((proba[0] - 0.5).abs() < 1e-12);
        assert!((proba[1] - sigmoid(2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_probability_falls_back_to_first_stage() {
        let broken_scaler = TransformStep {
            name: "scale".into(),
            transform: Transform::StandardScale(StandardScaler {
                columns: vec!["Missing_Column".into()],
                means: vec![0.0],
                scales: vec![1.0],
            }),
        };
        let pipeline = Pipeline::new(
            vec![select(&["a"]), broken_scaler],
            "classifier",
            Estimator::Logistic(LogisticModel::new(vec![1.0], 0.0)),
        );
        let model = handle(ModelArtifact::Pipeline(pipeline));
        let x = frame(vec![("a", vec![1.0.into()]), ("b", vec![5.0.into()])]);

        assert!(predict(Some(&model), &x).is_err());
        let proba = predict_probability(Some(&model), &x).unwrap();
        assert!((proba[0] - sigmoid(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_probability_falls_back_to_untransformed() {
        let pipeline = Pipeline::new(
            vec![select(&["not_here"])],
            "classifier",
            Estimator::Logistic(LogisticModel::new(vec![1.0], 0.0)),
        );
        let model = handle(ModelArtifact::Pipeline(pipeline));
        let x = frame(vec![("a", vec![0.0.into()])]);
        assert_eq!(predict_probability(Some(&model), &x), Some(vec![0.5]));
    }

    #[test]
    fn test_probability_none_when_every_route_fails() {
        let pipeline = Pipeline::new(
            vec![select(&["not_here"])],
            "classifier",
            Estimator::Logistic(LogisticModel::new(vec![1.0, 1.0, 1.0], 0.0)),
        );
        let model = handle(ModelArtifact::Pipeline(pipeline));
        let x = frame(vec![("a", vec![0.0.into()])]);
        assert!(predict_probability(Some(&model), &x).is_none());
    }

    #[test]
    fn test_single_class_probability_is_zero() {
        let tree = DecisionTree::new(Task::Classification, TreeNode::classes(vec![4.0]));
        let model = handle(ModelArtifact::Estimator(Estimator::Tree(tree)));
        let x = frame(vec![("x", vec![1.0.into(), 2.0.into()])]);
        assert_eq!(predict_probability(Some(&model), &x), Some(vec![0.0, 0.0]));
    }

    #[test]
    fn test_ensemble_variance_is_population_std() {
        let forest = Forest::new(
            Task::Regression,
            vec![stump(500.0, 10.0, 20.0), stump(800.0, 12.0, 30.0)],
        );
        let model = handle(ModelArtifact::Estimator(Estimator::Forest(forest)));
        let x = frame(vec![("Size_in_SqFt", vec![600.0.into(), 900.0.into()])]);

        assert_eq!(predict(Some(&model), &x).unwrap(), vec![16.0, 25.0]);
        assert_eq!(predict_variance(Some(&model), &x), Some(vec![4.0, 5.0]));
    }

    #[test]
    fn test_pipeline_variance_uses_final_forest() {
        let forest = Forest::new(
            Task::Regression,
            vec![stump(500.0, 10.0, 20.0), stump(800.0, 12.0, 30.0)],
        );
        let pipeline = Pipeline::new(vec![select(&["Size_in_SqFt"])], "regressor", Estimator::Forest(forest));
        let model = handle(ModelArtifact::Pipeline(pipeline));
        let x = frame(vec![
            ("City", vec!["Pune".into()]),
            ("Size_in_SqFt", vec![600.0.into()]),
        ]);
        assert_eq!(predict_variance(Some(&model), &x), Some(vec![4.0]));
    }

    #[test]
    fn test_variance_none_without_forest() {
        let model = handle(ModelArtifact::Estimator(Estimator::Linear(LinearModel::new(
            vec![1.0],
            0.0,
        ))));
        let x = frame(vec![("x", vec![1.0.into()])]);
        assert!(predict_variance(Some(&model), &x).is_none());
    }

    #[test]
    fn test_route_failures_keep_every_reason() {
        let pipeline = Pipeline::new(
            vec![select(&["not_here"])],
            "classifier",
            Estimator::Logistic(LogisticModel::new(vec![1.0, 1.0, 1.0], 0.0)),
        );
        let x = frame(vec![("a", vec![0.0.into()])]);

        let failures = first_working_route(&pipeline, &x, "probability", |input| {
            pipeline.estimator().predict_proba(input)
        })
        .unwrap_err();
        let routes: Vec<TransformRoute> = failures.iter().map(|f| f.route).collect();
        assert_eq!(routes, TransformRoute::ORDER.to_vec());
        assert!(failures[0].reason.contains("not_here"));

        let described = describe_failures(&failures);
        assert!(described.starts_with("full_chain: "));
        assert!(described.contains("; first_stage_only: "));
        assert!(described.contains("; untransformed: "));
    }

    #[test]
    fn test_route_order() {
        let names: Vec<&str> = TransformRoute::ORDER.iter().map(TransformRoute::name).collect();
        assert_eq!(names, vec!["full_chain", "first_stage_only", "untransformed"]);
    }
}

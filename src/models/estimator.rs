//! Estimators: the final stage of every model artifact

use crate::error::{AdvisorError, AdvisorResult};
use crate::types::frame::Frame;
use serde::{Deserialize, Serialize};

#[cfg(feature = "onnx")]
use crate::models::onnx::OnnxEstimator;

/// What an estimator's predictions mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Regression,
    Classification,
}

/// Linear regression: `intercept + coefficients · x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub feature_names: Option<Vec<String>>,
}

/// Binary logistic regression over classes `0` and `1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub feature_names: Option<Vec<String>>,
}

/// Internal split: rows with `x[feature] <= threshold` go left
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
    pub left: Box<TreeNode>,
    pub right: Box<TreeNode>,
}

/// Terminal node.
///
/// Regression trees read `value`; classification trees read `distribution`
/// (class weights indexed by class label).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub value: f64,
    pub distribution: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Split(Split),
    Leaf(Leaf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub task: Task,
    pub root: TreeNode,
    pub feature_names: Option<Vec<String>>,
    pub feature_importances: Option<Vec<f64>>,
}

/// Bagged ensemble of decision trees.
///
/// Regression averages tree outputs; classification averages class
/// distributions and predicts the most probable class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    pub task: Task,
    pub trees: Vec<DecisionTree>,
    pub feature_names: Option<Vec<String>>,
    pub feature_importances: Option<Vec<f64>>,
}

/// Any estimator the advisor can run.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    Linear(LinearModel),
    Logistic(LogisticModel),
    Tree(DecisionTree),
    Forest(Forest),
    /// ONNX Runtime session; only produced by the ONNX load strategy
    #[cfg(feature = "onnx")]
    #[serde(skip)]
    Onnx(OnnxEstimator),
}

impl Estimator {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Estimator::Linear(_) => "linear",
            Estimator::Logistic(_) => "logistic",
            Estimator::Tree(_) => "tree",
            Estimator::Forest(_) => "forest",
            #[cfg(feature = "onnx")]
            Estimator::Onnx(_) => "onnx",
        }
    }

    pub fn predict(&self, x: &Frame) -> AdvisorResult<Vec<f64>> {
        match self {
            Estimator::Linear(model) => model.predict(&x.to_matrix()?),
            Estimator::Logistic(model) => model.predict(&x.to_matrix()?),
            Estimator::Tree(tree) => tree.predict(&x.to_matrix()?),
            Estimator::Forest(forest) => forest.predict(&x.to_matrix()?),
            #[cfg(feature = "onnx")]
            Estimator::Onnx(model) => model.predict(&x.to_matrix()?),
        }
    }

    /// Whether `predict_proba` is supported at all.
    pub fn supports_proba(&self) -> bool {
        match self {
            Estimator::Linear(_) => false,
            Estimator::Logistic(_) => true,
            Estimator::Tree(tree) => tree.task == Task::Classification,
            Estimator::Forest(forest) => forest.task == Task::Classification,
            #[cfg(feature = "onnx")]
            Estimator::Onnx(model) => model.has_probabilities(),
        }
    }

    /// Per-row class probabilities.
    pub fn predict_proba(&self, x: &Frame) -> AdvisorResult<Vec<Vec<f64>>> {
        match self {
            Estimator::Logistic(model) => model.predict_proba(&x.to_matrix()?),
            Estimator::Tree(tree) if tree.task == Task::Classification => {
                tree.predict_proba(&x.to_matrix()?)
            }
            Estimator::Forest(forest) if forest.task == Task::Classification => {
                forest.predict_proba(&x.to_matrix()?)
            }
            #[cfg(feature = "onnx")]
            Estimator::Onnx(model) if model.has_probabilities() => {
                model.predict_proba(&x.to_matrix()?)
            }
            _ => Err(AdvisorError::prediction(format!(
                "{} estimator has no class probabilities",
                self.kind_name()
            ))),
        }
    }

    /// Input columns the estimator was fit on, when recorded.
    pub fn feature_names(&self) -> Option<&[String]> {
        match self {
            Estimator::Linear(model) => model.feature_names.as_deref(),
            Estimator::Logistic(model) => model.feature_names.as_deref(),
            Estimator::Tree(tree) => tree.feature_names.as_deref(),
            Estimator::Forest(forest) => forest.feature_names.as_deref(),
            #[cfg(feature = "onnx")]
            Estimator::Onnx(model) => model.feature_names(),
        }
    }

    pub fn feature_importances(&self) -> Option<&[f64]> {
        match self {
            Estimator::Tree(tree) => tree.feature_importances.as_deref(),
            Estimator::Forest(forest) => forest.feature_importances.as_deref(),
            _ => None,
        }
    }

    pub fn as_forest(&self) -> Option<&Forest> {
        match self {
            Estimator::Forest(forest) => Some(forest),
            _ => None,
        }
    }
}

fn check_width(rows: &[Vec<f64>], expected: usize) -> AdvisorResult<()> {
    if let Some(row) = rows.iter().find(|row| row.len() != expected) {
        return Err(AdvisorError::prediction(format!(
            "expected {} features, got {}",
            expected,
            row.len()
        )));
    }
    Ok(())
}

fn dot(coefficients: &[f64], row: &[f64]) -> f64 {
    coefficients.iter().zip(row).map(|(c, x)| c * x).sum()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Index of the largest weight; ties resolve to the lowest index.
fn argmax(weights: &[f64]) -> usize {
    weights
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_idx, best), (idx, &w)| {
            if w > best {
                (idx, w)
            } else {
                (best_idx, best)
            }
        })
        .0
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
            feature_names: None,
        }
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<f64>> {
        check_width(rows, self.coefficients.len())?;
        Ok(rows
            .iter()
            .map(|row| self.intercept + dot(&self.coefficients, row))
            .collect())
    }
}

impl LogisticModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
            feature_names: None,
        }
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<Vec<f64>>> {
        check_width(rows, self.coefficients.len())?;
        Ok(rows
            .iter()
            .map(|row| {
                let p = sigmoid(self.intercept + dot(&self.coefficients, row));
                vec![1.0 - p, p]
            })
            .collect())
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<f64>> {
        Ok(self
            .predict_proba(rows)?
            .iter()
            .map(|proba| argmax(proba) as f64)
            .collect())
    }
}

impl TreeNode {
    /// Leaf holding a regression value.
    pub fn value(value: f64) -> Self {
        TreeNode::Leaf(Leaf {
            value,
            distribution: Vec::new(),
        })
    }

    /// Leaf holding class weights.
    pub fn classes(distribution: Vec<f64>) -> Self {
        TreeNode::Leaf(Leaf {
            value: argmax(&distribution) as f64,
            distribution,
        })
    }

    pub fn split(feature: usize, threshold: f64, left: TreeNode, right: TreeNode) -> Self {
        TreeNode::Split(Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn leaf_for(&self, row: &[f64]) -> AdvisorResult<&Leaf> {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf(leaf) => return Ok(leaf),
                TreeNode::Split(split) => {
                    let x = row.get(split.feature).ok_or_else(|| {
                        AdvisorError::prediction(format!(
                            "split on feature {} but row has {} features",
                            split.feature,
                            row.len()
                        ))
                    })?;
                    node = if *x <= split.threshold {
                        &split.left
                    } else {
                        &split.right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf(_) => 0,
            TreeNode::Split(split) => 1 + split.left.depth().max(split.right.depth()),
        }
    }
}

impl DecisionTree {
    pub fn new(task: Task, root: TreeNode) -> Self {
        Self {
            task,
            root,
            feature_names: None,
            feature_importances: None,
        }
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<f64>> {
        rows.iter()
            .map(|row| {
                let leaf = self.root.leaf_for(row)?;
                Ok(match self.task {
                    Task::Regression => leaf.value,
                    Task::Classification => argmax(&leaf.distribution) as f64,
                })
            })
            .collect()
    }

    /// Normalized class distribution per row.
    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                let leaf = self.root.leaf_for(row)?;
                let total: f64 = leaf.distribution.iter().sum();
                Ok(if total > 0.0 {
                    leaf.distribution.iter().map(|w| w / total).collect()
                } else {
                    leaf.distribution.clone()
                })
            })
            .collect()
    }
}

impl Forest {
    pub fn new(task: Task, trees: Vec<DecisionTree>) -> Self {
        Self {
            task,
            trees,
            feature_names: None,
            feature_importances: None,
        }
    }

    fn ensure_trees(&self) -> AdvisorResult<()> {
        if self.trees.is_empty() {
            return Err(AdvisorError::prediction("forest has no trees"));
        }
        Ok(())
    }

    /// Predictions of every member tree: `result[tree][row]`.
    pub fn per_estimator_predictions(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<Vec<f64>>> {
        self.ensure_trees()?;
        self.trees.iter().map(|tree| tree.predict(rows)).collect()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<f64>> {
        match self.task {
            Task::Regression => {
                let per_tree = self.per_estimator_predictions(rows)?;
                let n_trees = per_tree.len() as f64;
                Ok((0..rows.len())
                    .map(|row| per_tree.iter().map(|preds| preds[row]).sum::<f64>() / n_trees)
                    .collect())
            }
            Task::Classification => Ok(self
                .predict_proba(rows)?
                .iter()
                .map(|proba| argmax(proba) as f64)
                .collect()),
        }
    }

    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> AdvisorResult<Vec<Vec<f64>>> {
        self.ensure_trees()?;
        let n_trees = self.trees.len() as f64;
        let mut averaged: Vec<Vec<f64>> = vec![Vec::new(); rows.len()];

        for tree in &self.trees {
            for (acc, proba) in averaged.iter_mut().zip(tree.predict_proba(rows)?) {
                if acc.len() < proba.len() {
                    acc.resize(proba.len(), 0.0);
                }
                for (slot, p) in acc.iter_mut().zip(proba) {
                    *slot += p / n_trees;
                }
            }
        }
        Ok(averaged)
    }
}

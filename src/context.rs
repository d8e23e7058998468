//! Application context built once at startup

use crate::config::AppConfig;
use crate::dataset::ReferenceDataset;
use crate::error::{AdvisorError, AdvisorResult};
use crate::feature_aligner::InputAligner;
use crate::models::handle::{Capabilities, ModelHandle};
use crate::models::inference;
use crate::models::insights::{self, ImportanceReport};
use crate::models::loader::ModelLoader;
use crate::schema::{FeatureSchema, SchemaSource};
use crate::types::{
    Frame, InputRecord, InvestmentCall, ModelOutcome, PriceForecast, PropertyAssessment, Value,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Declared feature names shown in status output
const DECLARED_SAMPLE: usize = 10;

/// A configured model: either its handle or the reason it could not load.
#[derive(Debug)]
pub struct ModelSlot {
    path: PathBuf,
    handle: Option<ModelHandle>,
    error: Option<AdvisorError>,
}

impl ModelSlot {
    pub fn load(loader: &ModelLoader, path: &Path) -> Self {
        match loader.load(path) {
            Ok(handle) => Self::loaded(path, handle),
            Err(e) => {
                warn!(path = %path.display(), error = %e.summary(), "Model unavailable");
                Self {
                    path: path.to_path_buf(),
                    handle: None,
                    error: Some(e),
                }
            }
        }
    }

    pub fn loaded(path: impl Into<PathBuf>, handle: ModelHandle) -> Self {
        Self {
            path: path.into(),
            handle: Some(handle),
            error: None,
        }
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: None,
            error: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> Option<&ModelHandle> {
        self.handle.as_ref()
    }

    pub fn error(&self) -> Option<&AdvisorError> {
        self.error.as_ref()
    }

    /// Why no handle is available, for display.
    pub fn unavailable_reason(&self) -> String {
        match &self.error {
            Some(e) => e.summary(),
            None => format!("no model loaded from {}", self.path.display()),
        }
    }

    pub fn status(&self) -> ModelStatus {
        let metadata = std::fs::metadata(&self.path).ok();
        let handle = self.handle.as_ref();
        let declared = handle.and_then(ModelHandle::declared_feature_names);

        ModelStatus {
            path: self.path.display().to_string(),
            exists: metadata.is_some(),
            size_bytes: metadata.map(|m| m.len()),
            loaded: handle.is_some(),
            strategy: handle.map(|h| h.strategy().to_string()),
            kind: handle.map(|h| h.kind().name().to_string()),
            steps: handle
                .and_then(ModelHandle::step_names)
                .map(|names| names.into_iter().map(str::to_string).collect()),
            capabilities: handle.map(ModelHandle::capabilities),
            declared_features: declared.map(<[String]>::len),
            declared_sample: declared
                .map(|names| names.iter().take(DECLARED_SAMPLE).cloned().collect())
                .unwrap_or_default(),
            error: self.error.as_ref().map(AdvisorError::summary),
        }
    }
}

/// Load report for one model file
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub path: String,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub loaded: bool,
    pub strategy: Option<String>,
    pub kind: Option<String>,
    pub steps: Option<Vec<String>>,
    pub capabilities: Option<Capabilities>,
    pub declared_features: Option<usize>,
    pub declared_sample: Vec<String>,
    /// Last line of the load error
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatus {
    pub path: String,
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaStatus {
    pub features: usize,
    pub source: SchemaSource,
}

/// Everything `status` reports
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub classifier: ModelStatus,
    pub regressor: ModelStatus,
    pub dataset: DatasetStatus,
    pub schema: Option<SchemaStatus>,
}

/// Models, reference data, schema and aligner for the whole session.
pub struct AppContext {
    config: AppConfig,
    classifier: ModelSlot,
    regressor: ModelSlot,
    reference: Option<ReferenceDataset>,
    dataset_error: Option<String>,
    schema: Option<FeatureSchema>,
    aligner: InputAligner,
}

impl AppContext {
    /// Load both models and the reference dataset, then resolve the schema.
    ///
    /// Missing or unreadable artifacts leave the corresponding slot empty.
    pub fn initialize(config: AppConfig) -> Self {
        let loader = config.loader.build_loader();
        info!(strategies = ?loader.strategy_names(), "Loading models");

        let classifier = ModelSlot::load(&loader, &config.paths.classifier);
        let regressor = ModelSlot::load(&loader, &config.paths.regressor);

        let (reference, dataset_error) = match ReferenceDataset::load(&config.paths.reference_data) {
            Ok(dataset) => (Some(dataset), None),
            Err(e) => {
                warn!(
                    path = %config.paths.reference_data.display(),
                    error = %e,
                    "Reference dataset unavailable"
                );
                (None, Some(e.to_string()))
            }
        };

        Self::assemble(config, classifier, regressor, reference, dataset_error)
    }

    /// Build a context from already-loaded parts.
    pub fn from_parts(
        config: AppConfig,
        classifier: Option<ModelHandle>,
        regressor: Option<ModelHandle>,
        reference: Option<ReferenceDataset>,
    ) -> Self {
        let slot = |path: &Path, handle: Option<ModelHandle>| match handle {
            Some(handle) => ModelSlot::loaded(path, handle),
            None => ModelSlot::empty(path),
        };
        let classifier = slot(config.paths.classifier.as_path(), classifier);
        let regressor = slot(config.paths.regressor.as_path(), regressor);
        Self::assemble(config, classifier, regressor, reference, None)
    }

    fn assemble(
        config: AppConfig,
        classifier: ModelSlot,
        regressor: ModelSlot,
        reference: Option<ReferenceDataset>,
        dataset_error: Option<String>,
    ) -> Self {
        let models: Vec<&ModelHandle> = [regressor.handle(), classifier.handle()]
            .into_iter()
            .flatten()
            .collect();
        let schema = config.schema.resolver().resolve(&models, reference.as_ref());
        let aligner = config.alignment.aligner();

        Self {
            config,
            classifier,
            regressor,
            reference,
            dataset_error,
            schema,
            aligner,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn classifier(&self) -> &ModelSlot {
        &self.classifier
    }

    pub fn regressor(&self) -> &ModelSlot {
        &self.regressor
    }

    pub fn reference(&self) -> Option<&ReferenceDataset> {
        self.reference.as_ref()
    }

    pub fn schema(&self) -> Option<&FeatureSchema> {
        self.schema.as_ref()
    }

    pub fn aligner(&self) -> &InputAligner {
        &self.aligner
    }

    pub fn require_schema(&self) -> AdvisorResult<&FeatureSchema> {
        self.schema.as_ref().ok_or(AdvisorError::SchemaUnknown)
    }

    /// Align raw input onto the session schema.
    pub fn align(&self, raw: &Frame) -> AdvisorResult<Frame> {
        let schema = self.require_schema()?;
        self.aligner.align(raw, schema, self.reference.as_ref())
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            classifier: self.classifier.status(),
            regressor: self.regressor.status(),
            dataset: DatasetStatus {
                path: self.config.paths.reference_data.display().to_string(),
                rows: self.reference.as_ref().map(ReferenceDataset::n_rows),
                columns: self.reference.as_ref().map(|r| r.columns().len()),
                error: self.dataset_error.clone(),
            },
            schema: self.schema.as_ref().map(|schema| SchemaStatus {
                features: schema.len(),
                source: schema.source().clone(),
            }),
        }
    }

    /// Assess one property. Classifier and regressor run independently; a
    /// failure in one never hides the other's result.
    pub fn assess(&self, record: &InputRecord) -> AdvisorResult<PropertyAssessment> {
        let aligned = self.align(&record.to_frame())?;

        let investment = match self.classifier.handle() {
            None => ModelOutcome::Unavailable {
                reason: self.classifier.unavailable_reason(),
            },
            Some(model) => match first_prediction(model, &aligned) {
                Ok(label) => ModelOutcome::Completed(InvestmentCall {
                    good_investment: label == 1.0,
                    probability: inference::predict_probability(Some(model), &aligned)
                        .and_then(|p| p.first().copied()),
                }),
                Err(e) => {
                    warn!(model = %model.label(), error = %e, "Classification failed");
                    ModelOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };

        let price = match self.regressor.handle() {
            None => ModelOutcome::Unavailable {
                reason: self.regressor.unavailable_reason(),
            },
            Some(model) => match first_prediction(model, &aligned) {
                Ok(future_price) => ModelOutcome::Completed(PriceForecast {
                    future_price,
                    uncertainty: inference::predict_variance(Some(model), &aligned)
                        .and_then(|s| s.first().copied()),
                }),
                Err(e) => {
                    warn!(model = %model.label(), error = %e, "Regression failed");
                    ModelOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };

        let property_id = match record.get("ID") {
            None | Some(Value::Missing) => None,
            Some(Value::Number(n)) if *n == 0.0 => None,
            Some(value) => Some(value.to_string()),
        };

        let assessment = PropertyAssessment::new(investment, price).with_property_id(property_id);
        info!(
            assessment_id = %assessment.assessment_id,
            investment = assessment.investment.is_completed(),
            price = assessment.price.is_completed(),
            "Property assessed"
        );
        Ok(assessment)
    }

    /// Leading reference rows scored when no upload is given.
    pub fn sample_batch(&self) -> Option<Frame> {
        self.reference
            .as_ref()
            .map(|reference| reference.head(self.config.batch.sample_rows))
    }

    /// Ranked regressor feature importances.
    pub fn insights(&self, top_n: usize) -> ImportanceReport {
        insights::feature_importances(
            self.regressor.handle(),
            self.schema.as_ref(),
            self.reference.as_ref(),
            top_n,
        )
    }
}

fn first_prediction(model: &ModelHandle, aligned: &Frame) -> AdvisorResult<f64> {
    inference::predict(Some(model), aligned)?
        .first()
        .copied()
        .ok_or_else(|| AdvisorError::prediction("model returned no predictions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::estimator::{DecisionTree, Estimator, Forest, LinearModel, LogisticModel, Task, TreeNode};
    use crate::models::handle::ModelArtifact;

    fn reference() -> ReferenceDataset {
        ReferenceDataset::from_frame(
            Frame::from_columns(vec![
                ("Size_in_SqFt", vec![400.0.into(), 800.0.into(), 1200.0.into()]),
                ("City", vec!["Pune".into(), "Goa".into(), "Delhi".into()]),
                ("Good_Investment", vec![0.0.into(), 1.0.into(), 1.0.into()]),
                ("Future_Price_5Yrs", vec![50.0.into(), 90.0.into(), 150.0.into()]),
            ])
            .unwrap(),
        )
    }

    fn classifier() -> ModelHandle {
        let model = LogisticModel::new(vec![0.01], -5.0).with_feature_names(vec!["Size_in_SqFt".into()]);
        ModelHandle::from_artifact("classifier", "json", ModelArtifact::Estimator(Estimator::Logistic(model)))
    }

    fn regressor() -> ModelHandle {
        let stump = |threshold: f64, low: f64, high: f64| {
            DecisionTree::new(
                Task::Regression,
                TreeNode::split(0, threshold, TreeNode::value(low), TreeNode::value(high)),
            )
        };
        let mut forest = Forest::new(Task::Regression, vec![stump(500.0, 60.0, 100.0), stump(700.0, 70.0, 120.0)]);
        forest.feature_names = Some(vec!["Size_in_SqFt".into()]);
        ModelHandle::from_artifact("regressor", "json", ModelArtifact::Estimator(Estimator::Forest(forest)))
    }

    #[test]
    fn test_schema_prefers_regressor_metadata() {
        let ctx = AppContext::from_parts(AppConfig::default(), Some(classifier()), Some(regressor()), Some(reference()));
        let schema = ctx.schema().unwrap();
        assert_eq!(schema.names(), &["Size_in_SqFt".to_string()]);
        assert_eq!(
            schema.source(),
            &SchemaSource::ModelMetadata { model: "regressor".into() }
        );
    }

    #[test]
    fn test_assess_runs_both_models() {
        let ctx = AppContext::from_parts(AppConfig::default(), Some(classifier()), Some(regressor()), Some(reference()));
        let record = InputRecord::new().with("sqft", 900.0).with("ID", "P-17");
        let assessment = ctx.assess(&record).unwrap();

        let call = assessment.investment.completed().unwrap();
        assert!(call.good_investment);
        assert!(call.probability.unwrap() > 0.98);

        let forecast = assessment.price.completed().unwrap();
        assert_eq!(forecast.future_price, 110.0);
        assert_eq!(forecast.uncertainty, Some(10.0));
        assert_eq!(assessment.property_id.as_deref(), Some("P-17"));
    }

    #[test]
    fn test_assess_isolates_failures() {
        let broken = ModelHandle::from_artifact(
            "classifier",
            "json",
            ModelArtifact::Estimator(Estimator::Linear(LinearModel::new(vec![1.0, 2.0], 0.0))),
        );
        let ctx = AppContext::from_parts(AppConfig::default(), Some(broken), None, Some(reference()));
        let assessment = ctx.assess(&InputRecord::new().with("sqft", 900.0)).unwrap();

        assert!(matches!(assessment.investment, ModelOutcome::Failed { .. }));
        assert!(matches!(assessment.price, ModelOutcome::Unavailable { .. }));
        assert!(assessment.property_id.is_none());
    }

    #[test]
    fn test_assess_without_schema() {
        let ctx = AppContext::from_parts(AppConfig::default(), None, None, None);
        assert!(matches!(
            ctx.assess(&InputRecord::new().with("bhk", 2.0)),
            Err(AdvisorError::SchemaUnknown)
        ));
        assert!(ctx.sample_batch().is_none());
    }

    #[test]
    fn test_initialize_degrades_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.paths.classifier = dir.path().join("missing_classifier.json");
        config.paths.regressor = dir.path().join("missing_regressor.json");
        config.paths.reference_data = dir.path().join("missing.csv");

        let ctx = AppContext::initialize(config);
        let status = ctx.status();
        assert!(!status.classifier.exists);
        assert!(!status.classifier.loaded);
        assert!(status.classifier.error.unwrap().contains("not found"));
        assert!(status.dataset.error.is_some());
        assert!(status.schema.is_none());
    }

    #[test]
    fn test_sample_batch_respects_config() {
        let mut config = AppConfig::default();
        config.batch.sample_rows = 2;
        let ctx = AppContext::from_parts(config, None, None, Some(reference()));
        assert_eq!(ctx.sample_batch().unwrap().n_rows(), 2);
    }
}

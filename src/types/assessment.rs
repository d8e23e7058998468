//! Assessment results for a single property

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of running one model as part of an assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome<T> {
    /// Model produced a prediction
    Completed(T),
    /// Model is loaded but the prediction call failed
    Failed { error: String },
    /// Model was never loaded
    Unavailable { reason: String },
}

impl<T> ModelOutcome<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            ModelOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ModelOutcome::Completed(_))
    }
}

/// Classifier output for one property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentCall {
    pub good_investment: bool,
    /// Probability of the "good investment" class, when the model exposes one
    pub probability: Option<f64>,
}

/// Regressor output for one property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceForecast {
    /// Predicted price five years out, in training units
    pub future_price: f64,
    /// Standard deviation across ensemble members, when available
    pub uncertainty: Option<f64>,
}

/// Combined assessment of one property listing
#[derive(Debug, Clone, Serialize)]
pub struct PropertyAssessment {
    /// Unique assessment identifier
    pub assessment_id: String,

    /// Listing identifier taken from the input, if any
    pub property_id: Option<String>,

    pub investment: ModelOutcome<InvestmentCall>,

    pub price: ModelOutcome<PriceForecast>,

    /// Assessment timestamp
    pub timestamp: DateTime<Utc>,
}

impl PropertyAssessment {
    pub fn new(
        investment: ModelOutcome<InvestmentCall>,
        price: ModelOutcome<PriceForecast>,
    ) -> Self {
        Self {
            assessment_id: uuid::Uuid::new_v4().to_string(),
            property_id: None,
            investment,
            price,
            timestamp: Utc::now(),
        }
    }

    pub fn with_property_id(mut self, property_id: Option<String>) -> Self {
        self.property_id = property_id;
        self
    }
}

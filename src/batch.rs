//! Batch scoring of uploaded or sampled tables

use crate::context::AppContext;
use crate::error::AdvisorResult;
use crate::models::inference;
use crate::types::frame::{Frame, Value};
use std::path::Path;
use tracing::info;

/// Predicted "good investment" label
pub const GOOD_INVESTMENT_PRED: &str = "Good_Investment_Pred";
/// Probability of the "good investment" class
pub const GOOD_INVESTMENT_PROB: &str = "Good_Investment_Prob";
/// Predicted price five years out
pub const FUTURE_PRICE_PRED: &str = "Future_Price_5Yrs_Pred";

/// Scored table: the input's columns plus the appended predictions.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub frame: Frame,
    /// Names of the prediction columns that were added
    pub appended: Vec<String>,
}

impl BatchOutcome {
    pub fn n_rows(&self) -> usize {
        self.frame.n_rows()
    }

    /// Write the scored table as CSV.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> AdvisorResult<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.frame.write_csv(file)
    }
}

fn numbers(values: Vec<f64>) -> Vec<Value> {
    values.into_iter().map(Value::Number).collect()
}

/// Score every row with whichever models are loaded.
///
/// Any prediction failure aborts the whole batch.
pub fn predict_batch(ctx: &AppContext, upload: &Frame) -> AdvisorResult<BatchOutcome> {
    let aligned = ctx.align(upload)?;
    let mut out = upload.clone();
    let mut appended = Vec::new();

    if let Some(classifier) = ctx.classifier().handle() {
        let labels = inference::predict(Some(classifier), &aligned)?;
        out.push_column(GOOD_INVESTMENT_PRED, numbers(labels))?;
        appended.push(GOOD_INVESTMENT_PRED.to_string());

        if let Some(probabilities) = inference::predict_probability(Some(classifier), &aligned) {
            out.push_column(GOOD_INVESTMENT_PROB, numbers(probabilities))?;
            appended.push(GOOD_INVESTMENT_PROB.to_string());
        }
    }

    if let Some(regressor) = ctx.regressor().handle() {
        let prices = inference::predict(Some(regressor), &aligned)?;
        out.push_column(FUTURE_PRICE_PRED, numbers(prices))?;
        appended.push(FUTURE_PRICE_PRED.to_string());
    }

    info!(rows = out.n_rows(), appended = ?appended, "Batch scored");
    Ok(BatchOutcome {
        frame: out,
        appended,
    })
}

//! Type definitions shared across the advisor

pub mod assessment;
pub mod frame;
pub mod listing;
pub mod record;

pub use assessment::{InvestmentCall, ModelOutcome, PriceForecast, PropertyAssessment};
pub use frame::{Frame, Value};
pub use listing::PropertyListing;
pub use record::InputRecord;

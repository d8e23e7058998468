//! Real Estate Investment Advisor Library
//!
//! Loads a "good investment" classifier and a five-year price regressor,
//! aligns loosely named user input to the features those models were
//! trained on, and adapts prediction calls to whatever the loaded
//! artifacts support.

pub mod batch;
pub mod cli;
pub mod config;
pub mod context;
pub mod dataset;
pub mod error;
pub mod feature_aligner;
pub mod models;
pub mod schema;
pub mod types;

pub use batch::{predict_batch, BatchOutcome};
pub use config::AppConfig;
pub use context::{AppContext, StatusReport};
pub use dataset::ReferenceDataset;
pub use error::{AdvisorError, AdvisorResult};
pub use feature_aligner::{InputAligner, RenamePolicy, SynonymTable};
pub use models::{ModelHandle, ModelLoader};
pub use schema::{FeatureSchema, SchemaResolver};
pub use types::{Frame, InputRecord, PropertyAssessment, PropertyListing, Value};

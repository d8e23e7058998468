//! Model artifacts, loading and prediction

pub mod estimator;
pub mod handle;
pub mod inference;
pub mod insights;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod transform;

pub use estimator::{Estimator, Forest, Task};
pub use handle::{Capabilities, ModelArtifact, ModelHandle, ModelKind, Pipeline};
pub use insights::{FeatureImportance, ImportanceReport};
pub use loader::{LoadDiagnostic, LoadStrategy, ModelLoader, StrategyKind};
pub use transform::Transform;

//! Model artifact loader with ordered deserialization strategies

use crate::error::{AdvisorError, AdvisorResult};
use crate::models::handle::{ModelArtifact, ModelHandle};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Deserialization strategies the loader knows by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Json,
    Bincode,
    Onnx,
}

/// One way of turning a file into a [`ModelHandle`].
pub trait LoadStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, path: &Path) -> Result<ModelHandle>;
}

/// Why a single strategy rejected a file
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    pub strategy: String,
    pub reason: String,
}

/// Every strategy's failure, in the order they were tried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadDiagnostic {
    pub failures: Vec<StrategyFailure>,
}

impl fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, failure) in self.failures.iter().enumerate() {
            if idx > 0 {
                write!(f, "\n\n")?;
            }
            write!(f, "{} error:\n{}", failure.strategy, failure.reason)?;
        }
        Ok(())
    }
}

fn label_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}

/// `ModelArtifact` encoded as JSON
pub struct JsonStrategy;

impl LoadStrategy for JsonStrategy {
    fn name(&self) -> &str {
        "json"
    }

    fn load(&self, path: &Path) -> Result<ModelHandle> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).context("Failed to parse JSON model artifact")?;
        Ok(ModelHandle::from_artifact(label_for(path), self.name(), artifact))
    }
}

/// `ModelArtifact` encoded with bincode
pub struct BincodeStrategy;

impl LoadStrategy for BincodeStrategy {
    fn name(&self) -> &str {
        "bincode"
    }

    fn load(&self, path: &Path) -> Result<ModelHandle> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let artifact: ModelArtifact =
            bincode::deserialize(&bytes).context("Failed to decode bincode model artifact")?;
        Ok(ModelHandle::from_artifact(label_for(path), self.name(), artifact))
    }
}

/// ONNX graph run through ONNX Runtime
pub struct OnnxStrategy {
    threads: usize,
}

impl OnnxStrategy {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }
}

impl LoadStrategy for OnnxStrategy {
    fn name(&self) -> &str {
        "onnx"
    }

    #[cfg(feature = "onnx")]
    fn load(&self, path: &Path) -> Result<ModelHandle> {
        use crate::models::estimator::Estimator;
        use crate::models::handle::ModelKind;
        use crate::models::onnx::OnnxEstimator;

        let estimator = OnnxEstimator::load(path, self.threads)?;
        Ok(ModelHandle::new(
            label_for(path),
            self.name(),
            ModelKind::RawEstimator(Estimator::Onnx(estimator)),
        ))
    }

    #[cfg(not(feature = "onnx"))]
    fn load(&self, _path: &Path) -> Result<ModelHandle> {
        anyhow::bail!(
            "ONNX runtime support not compiled in (threads = {}); rebuild with the `onnx` feature",
            self.threads
        )
    }
}

/// Tries each strategy in priority order; the first success wins.
pub struct ModelLoader {
    strategies: Vec<Box<dyn LoadStrategy>>,
}

impl ModelLoader {
    /// Loader with the default order: JSON, bincode, ONNX (1 thread)
    pub fn new() -> Self {
        Self::from_kinds(&[StrategyKind::Json, StrategyKind::Bincode, StrategyKind::Onnx], 1)
    }

    /// Loader over an explicit strategy list
    pub fn with_strategies(strategies: Vec<Box<dyn LoadStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build strategies from their configured names
    pub fn from_kinds(kinds: &[StrategyKind], onnx_threads: usize) -> Self {
        let strategies = kinds
            .iter()
            .map(|kind| -> Box<dyn LoadStrategy> {
                match kind {
                    StrategyKind::Json => Box::new(JsonStrategy),
                    StrategyKind::Bincode => Box::new(BincodeStrategy),
                    StrategyKind::Onnx => Box::new(OnnxStrategy::new(onnx_threads)),
                }
            })
            .collect();
        Self::with_strategies(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Load a model artifact, trying each strategy once.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> AdvisorResult<ModelHandle> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Model file not found");
            return Err(AdvisorError::NotFound(path.to_path_buf()));
        }

        let mut diagnostic = LoadDiagnostic::default();
        for strategy in &self.strategies {
            debug!(path = %path.display(), strategy = strategy.name(), "Trying load strategy");
            match strategy.load(path) {
                Ok(handle) => {
                    info!(
                        model = %handle.label(),
                        path = %path.display(),
                        strategy = strategy.name(),
                        kind = handle.kind().name(),
                        "Model loaded successfully"
                    );
                    return Ok(handle);
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "Load strategy failed");
                    diagnostic.failures.push(StrategyFailure {
                        strategy: strategy.name().to_string(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        warn!(
            path = %path.display(),
            attempted = diagnostic.failures.len(),
            "All load strategies failed"
        );
        Err(AdvisorError::DeserializationFailed {
            path: path.to_path_buf(),
            diagnostic,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::estimator::{Estimator, LinearModel};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl LoadStrategy for Failing {
        fn name(&self) -> &str {
            self.name
        }

        fn load(&self, _path: &Path) -> Result<ModelHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("{} cannot read this", self.name)
        }
    }

    struct Succeeding {
        calls: Arc<AtomicUsize>,
    }

    impl LoadStrategy for Succeeding {
        fn name(&self) -> &str {
            "fake"
        }

        fn load(&self, path: &Path) -> Result<ModelHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let artifact = ModelArtifact::Estimator(Estimator::Linear(LinearModel::new(vec![1.0], 0.0)));
            Ok(ModelHandle::from_artifact(label_for(path), self.name(), artifact))
        }
    }

    fn temp_file(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn linear_artifact() -> ModelArtifact {
        ModelArtifact::Estimator(Estimator::Linear(
            LinearModel::new(vec![2.0], 1.0).with_feature_names(vec!["BHK".into()]),
        ))
    }

    #[test]
    fn test_missing_path_skips_strategies() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = ModelLoader::with_strategies(vec![Box::new(Failing {
            name: "first",
            calls: calls.clone(),
        })]);
        let err = loader.load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, AdvisorError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_success_wins() {
        let file = temp_file(".bin", b"anything");
        let failing_calls = Arc::new(AtomicUsize::new(0));
        let ok_calls = Arc::new(AtomicUsize::new(0));
        let late_calls = Arc::new(AtomicUsize::new(0));
        let loader = ModelLoader::with_strategies(vec![
            Box::new(Failing { name: "first", calls: failing_calls.clone() }),
            Box::new(Succeeding { calls: ok_calls.clone() }),
            Box::new(Failing { name: "last", calls: late_calls.clone() }),
        ]);

        let handle = loader.load(file.path()).unwrap();
        assert_eq!(handle.strategy(), "fake");
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_diagnostic_names_every_strategy() {
        let file = temp_file(".bin", b"\x00\x01garbage");
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = ModelLoader::with_strategies(vec![
            Box::new(Failing { name: "alpha", calls: calls.clone() }),
            Box::new(Failing { name: "beta", calls: calls.clone() }),
        ]);

        match loader.load(file.path()).unwrap_err() {
            AdvisorError::DeserializationFailed { diagnostic, .. } => {
                assert_eq!(diagnostic.failures.len(), 2);
                let text = diagnostic.to_string();
                assert!(text.starts_with("alpha error:\n"));
                assert!(text.contains("\n\nbeta error:\n"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_default_strategies_reject_garbage() {
        let file = temp_file(".model", b"not a model at all");
        let loader = ModelLoader::new();
        let err = loader.load(file.path()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("json error:"));
        assert!(text.contains("bincode error:"));
        assert!(text.contains("onnx error:"));
    }

    #[test]
    fn test_json_artifact_loads() {
        let json = serde_json::to_vec(&linear_artifact()).unwrap();
        let file = temp_file(".json", &json);
        let handle = ModelLoader::new().load(file.path()).unwrap();
        assert_eq!(handle.strategy(), "json");
        assert_eq!(handle.kind().name(), "raw_estimator");
        assert_eq!(handle.declared_feature_names().unwrap(), &["BHK".to_string()]);
    }

    #[test]
    fn test_bincode_artifact_loads() {
        let bytes = bincode::serialize(&linear_artifact()).unwrap();
        let file = temp_file(".bin", &bytes);
        let loader = ModelLoader::from_kinds(&[StrategyKind::Json, StrategyKind::Bincode], 1);
        let handle = loader.load(file.path()).unwrap();
        assert_eq!(handle.strategy(), "bincode");
    }

    #[test]
    fn test_label_is_file_stem() {
        assert_eq!(label_for(Path::new("models/regressor_pipeline.json")), "regressor_pipeline");
    }
}

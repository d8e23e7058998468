//! Configuration management for the advisor

use crate::feature_aligner::{InputAligner, RenamePolicy, SynonymTable};
use crate::models::loader::{ModelLoader, StrategyKind};
use crate::schema::{SchemaResolver, DEFAULT_TARGET_COLUMNS};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix for environment overrides, e.g. `ADVISOR__BATCH__SAMPLE_ROWS=50`
pub const ENV_PREFIX: &str = "ADVISOR";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub loader: LoaderConfig,
    pub schema: SchemaConfig,
    pub alignment: AlignmentConfig,
    pub batch: BatchConfig,
    pub insights: InsightsConfig,
    pub logging: LoggingConfig,
}

/// Artifact and dataset locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Serialized "good investment" classifier
    pub classifier: PathBuf,
    /// Serialized five-year price regressor
    pub regressor: PathBuf,
    /// Processed reference dataset (CSV)
    pub reference_data: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            classifier: PathBuf::from("models/classifier_pipeline.json"),
            regressor: PathBuf::from("models/regressor_pipeline.json"),
            reference_data: PathBuf::from("data/final_data.csv"),
        }
    }
}

/// Model loading configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Deserialization strategies in priority order
    pub strategies: Vec<StrategyKind>,
    /// Number of threads for ONNX inference per model (default: 1)
    pub onnx_threads: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strategies: vec![StrategyKind::Json, StrategyKind::Bincode, StrategyKind::Onnx],
            onnx_threads: 1,
        }
    }
}

impl LoaderConfig {
    pub fn build_loader(&self) -> ModelLoader {
        ModelLoader::from_kinds(&self.strategies, self.onnx_threads)
    }
}

/// Feature schema configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Reference dataset columns excluded from the fallback schema
    pub target_columns: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            target_columns: DEFAULT_TARGET_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl SchemaConfig {
    pub fn resolver(&self) -> SchemaResolver {
        SchemaResolver::new(self.target_columns.clone())
    }
}

/// Input alignment configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub rename_policy: RenamePolicy,
    /// Additional aliases: alias -> canonical column name
    pub extra_synonyms: HashMap<String, String>,
}

impl AlignmentConfig {
    pub fn aligner(&self) -> InputAligner {
        let mut extra: Vec<(&String, &String)> = self.extra_synonyms.iter().collect();
        extra.sort();
        let synonyms = extra
            .into_iter()
            .fold(SynonymTable::standard(), |table, (alias, canonical)| {
                table.with_alias(alias, canonical.clone())
            });
        InputAligner::new(synonyms, self.rename_policy)
    }
}

/// Batch scoring configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Reference rows scored when no upload is given
    pub sample_rows: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { sample_rows: 200 }
    }
}

/// Feature importance display configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub top_features: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self { top_features: 15 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file (if present) and environment
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        Self::build(File::from(path).required(false))
    }

    /// Load configuration from a specific path, which must exist
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::build(File::from(path).required(true))
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(
            config.paths.classifier,
            PathBuf::from("models/classifier_pipeline.json")
        );
        assert_eq!(config.batch.sample_rows, 200);
        assert_eq!(config.insights.top_features, 15);
        assert_eq!(config.alignment.rename_policy, RenamePolicy::LastWriteWins);
        assert_eq!(
            config.loader.strategies,
            vec![StrategyKind::Json, StrategyKind::Bincode, StrategyKind::Onnx]
        );
        assert_eq!(config.schema.target_columns.len(), 2);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[paths]
regressor = "artifacts/price.bin"

[loader]
strategies = ["bincode"]

[alignment]
rename_policy = "reject"

[alignment.extra_synonyms]
area = "Size_in_SqFt"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.paths.regressor, PathBuf::from("artifacts/price.bin"));
        assert_eq!(config.paths.reference_data, PathBuf::from("data/final_data.csv"));
        assert_eq!(config.loader.strategies, vec![StrategyKind::Bincode]);
        assert_eq!(config.loader.onnx_threads, 1);
        assert_eq!(config.alignment.rename_policy, RenamePolicy::Reject);

        let aligner = config.alignment.aligner();
        assert_eq!(aligner.synonyms().canonical("AREA"), Some("Size_in_SqFt"));
        assert_eq!(aligner.policy(), RenamePolicy::Reject);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(AppConfig::load_from_path("does/not/exist.toml").is_err());
    }
}

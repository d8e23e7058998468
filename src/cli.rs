//! Command-line front end

use crate::batch::{self, BatchOutcome};
use crate::config::AppConfig;
use crate::context::{AppContext, ModelStatus, StatusReport};
use crate::feature_aligner::SynonymTable;
use crate::models::insights::ImportanceReport;
use crate::types::record::split_assignment;
use crate::types::{
    Frame, InputRecord, ModelOutcome, PropertyAssessment, PropertyListing, Value,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "real-estate-advisor",
    about = "Investment classification and five-year price forecasts for property listings",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show model, dataset and schema load status
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assess a single property
    Predict {
        /// JSON listing file (form defaults are used otherwise)
        #[arg(short, long)]
        listing: Option<PathBuf>,

        /// Override a form field (aliases accepted) or add a column, e.g. --set sqft=900
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Print the assessment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score a CSV table (or a sample of the reference dataset)
    Batch {
        /// CSV file with raw property rows
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write the scored CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows shown in the preview
        #[arg(short, long, default_value_t = 5)]
        preview: usize,
    },

    /// Show the regressor's most important features
    Insights {
        /// Number of features to show (defaults to the configured value)
        #[arg(short, long)]
        top: Option<usize>,
    },
}

/// Execute a parsed command against a freshly initialized context.
pub fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let ctx = AppContext::initialize(config);

    match cli.command {
        Commands::Status { json } => {
            let report = ctx.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_status(&report));
            }
        }
        Commands::Predict { listing, set, json } => {
            let record = build_record(listing.as_ref(), &set, ctx.aligner().synonyms())?;
            let assessment = ctx.assess(&record)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&assessment)?);
            } else {
                print!("{}", render_assessment(&assessment));
            }
        }
        Commands::Batch {
            input,
            output,
            preview,
        } => {
            let upload = match &input {
                Some(path) => Frame::read_csv(path)
                    .with_context(|| format!("Failed to read uploaded CSV {}", path.display()))?,
                None => {
                    let sample = ctx.sample_batch().context(
                        "No input given and no reference dataset loaded; pass --input or generate the reference data",
                    )?;
                    info!(rows = sample.n_rows(), "No upload given; scoring reference sample");
                    sample
                }
            };

            let outcome = batch::predict_batch(&ctx, &upload).context("Batch prediction failed")?;
            print!("{}", render_batch(&outcome, preview)?);

            if let Some(path) = output {
                outcome
                    .write_csv(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Predictions written to {}", path.display());
            }
        }
        Commands::Insights { top } => {
            let top_n = top.unwrap_or(ctx.config().insights.top_features);
            print!("{}", render_importances(&ctx.insights(top_n)));
        }
    }

    Ok(())
}

/// Input record from an optional listing file plus `KEY=VALUE` overrides.
///
/// Override keys go through the synonym table first, so `sqft=900` replaces
/// the form's `Size_in_SqFt` rather than adding a second column. Form fields
/// are validated after every override is applied; keys that are not form
/// fields are added to the record as given.
pub fn build_record(
    listing: Option<&PathBuf>,
    overrides: &[String],
    synonyms: &SynonymTable,
) -> Result<InputRecord> {
    let mut listing = match listing {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read listing {}", path.display()))?;
            serde_json::from_str::<PropertyListing>(&raw)
                .with_context(|| format!("Failed to parse listing {}", path.display()))?
        }
        None => PropertyListing::default(),
    };

    let mut extra = Vec::new();
    for assignment in overrides {
        let (key, raw) = split_assignment(assignment)
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", assignment))?;
        let field = synonyms.canonical(key).unwrap_or(key);
        if !listing.apply_override(field, raw)? {
            extra.push((field.to_string(), Value::parse_cell(raw)));
        }
    }
    listing.validate()?;

    let mut record = listing.to_record();
    for (field, value) in extra {
        record.insert(field, value);
    }
    Ok(record)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn render_model_status(out: &mut String, title: &str, status: &ModelStatus) {
    let _ = writeln!(out, "{}: {}", title, status.path);
    let _ = writeln!(
        out,
        "  exists: {}{}",
        yes_no(status.exists),
        status
            .size_bytes
            .map(|size| format!(" ({} bytes)", size))
            .unwrap_or_default()
    );
    if !status.loaded {
        let _ = writeln!(out, "  loaded: no");
        if let Some(error) = &status.error {
            let _ = writeln!(out, "  error: {}", error);
        }
        return;
    }

    let _ = writeln!(
        out,
        "  loaded: yes via {} as {}",
        status.strategy.as_deref().unwrap_or("?"),
        status.kind.as_deref().unwrap_or("?")
    );
    if let Some(steps) = &status.steps {
        let _ = writeln!(out, "  steps: {}", steps.join(" -> "));
    }
    if let Some(caps) = &status.capabilities {
        let _ = writeln!(
            out,
            "  probability: {}, per-tree spread: {}, importances: {}",
            yes_no(caps.predict_probability),
            yes_no(caps.per_estimator_predictors),
            yes_no(caps.feature_importances)
        );
    }
    if let Some(count) = status.declared_features {
        let _ = writeln!(
            out,
            "  declared features: {} ({}{})",
            count,
            status.declared_sample.join(", "),
            if count > status.declared_sample.len() { ", ..." } else { "" }
        );
    }
}

pub fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();
    render_model_status(&mut out, "Classifier", &report.classifier);
    render_model_status(&mut out, "Regressor", &report.regressor);

    let _ = writeln!(out, "Reference dataset: {}", report.dataset.path);
    match (&report.dataset.rows, &report.dataset.error) {
        (Some(rows), _) => {
            let _ = writeln!(
                out,
                "  loaded: {} rows, {} columns",
                rows,
                report.dataset.columns.unwrap_or(0)
            );
        }
        (None, Some(error)) => {
            let _ = writeln!(out, "  loaded: no ({})", error);
        }
        (None, None) => {
            let _ = writeln!(out, "  loaded: no");
        }
    }

    match &report.schema {
        Some(schema) => {
            let _ = writeln!(out, "Feature schema: {} features from {}", schema.features, schema.source);
        }
        None => {
            let _ = writeln!(
                out,
                "Feature schema: unknown (predictions disabled; provide the reference dataset or models declaring feature names)"
            );
        }
    }
    out
}

pub fn render_assessment(assessment: &PropertyAssessment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Assessment {}", assessment.assessment_id);
    if let Some(id) = &assessment.property_id {
        let _ = writeln!(out, "Property: {}", id);
    }

    let _ = writeln!(out, "\nGood investment");
    match &assessment.investment {
        ModelOutcome::Completed(call) => {
            let verdict = if call.good_investment {
                "Good investment"
            } else {
                "Not a good investment"
            };
            let _ = writeln!(out, "  Prediction: {}", verdict);
            if let Some(p) = call.probability {
                let _ = writeln!(out, "  Confidence (probability of good investment): {:.2}", p);
            }
        }
        ModelOutcome::Failed { error } => {
            let _ = writeln!(out, "  Classification error: {}", error);
        }
        ModelOutcome::Unavailable { reason } => {
            let _ = writeln!(out, "  Classifier not available: {}", reason);
        }
    }

    let _ = writeln!(out, "\nEstimated price after 5 years");
    match &assessment.price {
        ModelOutcome::Completed(forecast) => {
            let _ = writeln!(out, "  Predicted future price: {:.2}", forecast.future_price);
            if let Some(spread) = forecast.uncertainty {
                let _ = writeln!(out, "  Model uncertainty (std across trees): ±{:.2}", spread);
            }
        }
        ModelOutcome::Failed { error } => {
            let _ = writeln!(out, "  Regression error: {}", error);
        }
        ModelOutcome::Unavailable { reason } => {
            let _ = writeln!(out, "  Regressor not available: {}", reason);
        }
    }
    out
}

pub fn render_batch(outcome: &BatchOutcome, preview: usize) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scored {} rows; appended: {}",
        outcome.n_rows(),
        if outcome.appended.is_empty() {
            "nothing (no models loaded)".to_string()
        } else {
            outcome.appended.join(", ")
        }
    );
    out.push_str(&outcome.frame.head(preview).to_csv_string()?);
    Ok(out)
}

pub fn render_importances(report: &ImportanceReport) -> String {
    let mut out = String::new();
    match report {
        ImportanceReport::Ranked { features } => {
            let _ = writeln!(out, "Top feature importances (regressor):");
            let width = features.iter().map(|f| f.feature.len()).max().unwrap_or(0);
            for feature in features {
                let _ = writeln!(
                    out,
                    "  {:<width$}  {:.4}",
                    feature.feature,
                    feature.importance,
                    width = width
                );
            }
        }
        ImportanceReport::Misaligned {
            expected,
            found,
            numeric_columns,
        } => {
            let _ = writeln!(
                out,
                "Feature importance length mismatch ({} names, {} importances); numeric columns from the reference data:",
                expected, found
            );
            for column in numeric_columns {
                let _ = writeln!(out, "  {}", column);
            }
        }
        ImportanceReport::Unavailable { reason } => {
            let _ = writeln!(out, "Feature importances unavailable: {}", reason);
        }
    }
    out
}

//! Demo Artifact Generator
//!
//! Writes a synthetic reference dataset plus a classifier and a regressor
//! pipeline fitted on it, so the advisor can be run end to end.

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use real_estate_advisor::models::estimator::{
    DecisionTree, Estimator, Forest, LogisticModel, Task, TreeNode,
};
use real_estate_advisor::models::handle::{ModelArtifact, Pipeline, TransformStep};
use real_estate_advisor::models::transform::{
    CategoryEncoding, ColumnSelector, OneHotEncoder, StandardScaler, Transform,
};
use real_estate_advisor::types::{Frame, Value};
use std::fs;
use std::path::Path;
use tracing::info;

const CITIES: &[(&str, &str, f64, f64)] = &[
    // city, state, price per sqft, yearly growth
    ("Mumbai", "Maharashtra", 14000.0, 0.060),
    ("Pune", "Maharashtra", 7500.0, 0.085),
    ("Bangalore", "Karnataka", 9000.0, 0.090),
    ("Chennai", "Tamil Nadu", 6500.0, 0.070),
    ("Hyderabad", "Telangana", 6000.0, 0.095),
    ("Jaipur", "Rajasthan", 4500.0, 0.055),
];
const LOCALITIES: &[&str] = &["Central", "North", "South", "East", "West"];
const PROPERTY_TYPES: &[&str] = &["Apartment", "Villa", "House", "Plot"];
const FURNISHED: &[&str] = &["Unfurnished", "Semi", "Fully"];
const TRANSPORT: &[&str] = &["Poor", "Average", "Good", "Excellent"];
const SECURITY: &[&str] = &["None", "Gated", "CCTV", "Guard"];
const AMENITIES: &[&str] = &["", "Gym", "Pool", "Gym,Pool", "Clubhouse", "Garden,Playground"];
const FACINGS: &[&str] = &["North", "South", "East", "West"];
const OWNERS: &[&str] = &["Individual", "Builder", "Agent"];
const AVAILABILITY: &[&str] = &["Available", "Under Construction"];

const CURRENT_YEAR: u32 = 2025;

const NUMERIC_FEATURES: &[&str] = &[
    "BHK",
    "Size_in_SqFt",
    "Price_in_Lakhs",
    "Year_Built",
    "Floor_No",
    "Total_Floors",
    "Age_of_Property",
    "Nearby_Schools",
    "Nearby_Hospitals",
    "Parking_Space",
];
const CATEGORICAL_FEATURES: &[&str] = &["City", "Property_Type", "Public_Transport_Accessibility"];

#[derive(Parser)]
#[command(
    name = "demo-artifacts",
    about = "Generate a synthetic reference dataset and demo model artifacts"
)]
struct Args {
    /// Rows in the generated dataset
    #[arg(short, long, default_value_t = 500)]
    rows: usize,

    /// RNG seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Output root; `data/` and `models/` are created below it
    #[arg(short, long, default_value = ".")]
    out: String,

    /// Trees in the regressor forest
    #[arg(long, default_value_t = 25)]
    trees: usize,
}

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

/// Synthetic listings with both target columns.
fn generate_dataset(rng: &mut StdRng, rows: usize) -> Result<Frame> {
    let mut columns: Vec<(&str, Vec<Value>)> = [
        "ID",
        "State",
        "City",
        "Locality",
        "Property_Type",
        "BHK",
        "Size_in_SqFt",
        "Price_in_Lakhs",
        "Year_Built",
        "Furnished_Status",
        "Floor_No",
        "Total_Floors",
        "Age_of_Property",
        "Nearby_Schools",
        "Nearby_Hospitals",
        "Public_Transport_Accessibility",
        "Parking_Space",
        "Security",
        "Amenities",
        "Facing",
        "Owner_Type",
        "Availability_Status",
        "Good_Investment",
        "Future_Price_5Yrs",
    ]
    .iter()
    .map(|name| (*name, Vec::with_capacity(rows)))
    .collect();

    for id in 1..=rows {
        let &(city, state, rate, growth) = CITIES
            .choose(rng)
            .context("city table is empty")?;
        let bhk: u32 = rng.gen_range(1..=5);
        let size = (bhk as f64 * rng.gen_range(350.0..650.0_f64)).round();
        let transport = pick(rng, TRANSPORT);
        let transport_boost = match transport {
            "Excellent" => 1.15,
            "Good" => 1.05,
            "Average" => 1.0,
            _ => 0.9,
        };
        let price = (size * rate * transport_boost * rng.gen_range(0.85..1.15) / 100_000.0 * 100.0)
            .round()
            / 100.0;
        let year_built: u32 = rng.gen_range(1985..=2024);
        let total_floors: u32 = rng.gen_range(1..=30);
        let floor_no: u32 = rng.gen_range(0..=total_floors);
        let schools: u32 = rng.gen_range(0..=10);
        let hospitals: u32 = rng.gen_range(0..=6);

        let effective_growth = growth + rng.gen_range(-0.02..0.02)
            - (CURRENT_YEAR - year_built) as f64 * 0.0005;
        let future_price = (price * (1.0 + effective_growth).powi(5) * 100.0).round() / 100.0;
        let good = effective_growth >= 0.075 && (schools + hospitals) >= 4;

        let values: Vec<Value> = vec![
            Value::from(id as i64),
            Value::from(state),
            Value::from(city),
            Value::from(pick(rng, LOCALITIES)),
            Value::from(pick(rng, PROPERTY_TYPES)),
            Value::from(bhk),
            Value::from(size),
            Value::from(price),
            Value::from(year_built),
            Value::from(pick(rng, FURNISHED)),
            Value::from(floor_no),
            Value::from(total_floors),
            Value::from(CURRENT_YEAR - year_built),
            Value::from(schools),
            Value::from(hospitals),
            Value::from(transport),
            Value::from(rng.gen_range(0..=2_u32)),
            Value::from(pick(rng, SECURITY)),
            Value::parse_cell(pick(rng, AMENITIES)),
            Value::from(pick(rng, FACINGS)),
            Value::from(pick(rng, OWNERS)),
            Value::from(pick(rng, AVAILABILITY)),
            Value::from(if good { 1.0 } else { 0.0 }),
            Value::from(future_price),
        ];
        for ((_, column), value) in columns.iter_mut().zip(values) {
            column.push(value);
        }
    }

    Ok(Frame::from_columns(columns)?)
}

fn numeric_column(frame: &Frame, name: &str) -> Result<Vec<f64>> {
    frame
        .column(name)
        .with_context(|| format!("column {} missing", name))?
        .iter()
        .map(|value| {
            value
                .as_f64()
                .with_context(|| format!("column {} has non-numeric cell {}", name, value))
        })
        .collect()
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len().max(1) as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn feature_columns(frame: &Frame) -> Vec<String> {
    frame
        .columns()
        .iter()
        .filter(|name| name.as_str() != "Good_Investment" && name.as_str() != "Future_Price_5Yrs")
        .cloned()
        .collect()
}

/// One-hot + scaler + logistic regression fitted by batch gradient descent.
fn build_classifier(frame: &Frame) -> Result<Pipeline> {
    let mut selected: Vec<String> = NUMERIC_FEATURES.iter().map(|c| c.to_string()).collect();
    selected.extend(CATEGORICAL_FEATURES.iter().map(|c| c.to_string()));

    let mut encodings = Vec::new();
    for column in CATEGORICAL_FEATURES {
        let mut categories: Vec<String> = frame
            .column(column)
            .with_context(|| format!("column {} missing", column))?
            .iter()
            .map(Value::to_cell)
            .collect();
        categories.sort();
        categories.dedup();
        encodings.push(CategoryEncoding {
            column: column.to_string(),
            categories,
        });
    }

    let mut means = Vec::new();
    let mut scales = Vec::new();
    for column in NUMERIC_FEATURES {
        let (mean, std) = mean_std(&numeric_column(frame, column)?);
        means.push(mean);
        scales.push(std);
    }

    let steps = vec![
        TransformStep {
            name: "select".to_string(),
            transform: Transform::Select(ColumnSelector { columns: selected }),
        },
        TransformStep {
            name: "encode".to_string(),
            transform: Transform::OneHot(OneHotEncoder { encodings }),
        },
        TransformStep {
            name: "scale".to_string(),
            transform: Transform::StandardScale(StandardScaler {
                columns: NUMERIC_FEATURES.iter().map(|c| c.to_string()).collect(),
                means,
                scales,
            }),
        },
    ];

    // Fit on the transformed training matrix
    let placeholder = Pipeline::new(
        steps.clone(),
        "classifier",
        Estimator::Logistic(LogisticModel::new(Vec::new(), 0.0)),
    );
    let x = placeholder.transform(frame)?.to_matrix()?;
    let y = numeric_column(frame, "Good_Investment")?;
    let (coefficients, intercept) = fit_logistic(&x, &y, 400, 0.5);

    info!(
        features = coefficients.len(),
        positives = y.iter().filter(|&&label| label == 1.0).count(),
        "Classifier fitted"
    );

    Ok(Pipeline::new(
        steps,
        "classifier",
        Estimator::Logistic(LogisticModel::new(coefficients, intercept)),
    )
    .with_feature_names(feature_columns(frame)))
}

fn fit_logistic(x: &[Vec<f64>], y: &[f64], epochs: usize, learning_rate: f64) -> (Vec<f64>, f64) {
    let n_features = x.first().map(Vec::len).unwrap_or(0);
    let n = x.len().max(1) as f64;
    let mut weights = vec![0.0; n_features];
    let mut bias = 0.0;

    for _ in 0..epochs {
        let mut grad_w = vec![0.0; n_features];
        let mut grad_b = 0.0;
        for (row, &label) in x.iter().zip(y) {
            let z = bias + row.iter().zip(&weights).map(|(a, w)| a * w).sum::<f64>();
            let error = 1.0 / (1.0 + (-z).exp()) - label;
            for (g, a) in grad_w.iter_mut().zip(row) {
                *g += error * a;
            }
            grad_b += error;
        }
        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= learning_rate * g / n;
        }
        bias -= learning_rate * grad_b / n;
    }
    (weights, bias)
}

struct Stump {
    feature: usize,
    threshold: f64,
    left: f64,
    right: f64,
    gain: f64,
}

/// Best single split on `rows` over the candidate features, by squared error.
fn fit_stump(x: &[Vec<f64>], y: &[f64], rows: &[usize], candidates: &[usize]) -> Option<Stump> {
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    let n = rows.len() as f64;
    let baseline: f64 = rows.iter().map(|&r| (y[r] - total / n).powi(2)).sum();
    let mut best: Option<Stump> = None;

    for &feature in candidates {
        let mut sorted: Vec<usize> = rows.to_vec();
        sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let total_sq: f64 = rows.iter().map(|&r| y[r] * y[r]).sum();
        for (i, pair) in sorted.windows(2).enumerate() {
            let (current, next) = (pair[0], pair[1]);
            left_sum += y[current];
            left_sq += y[current] * y[current];
            if x[current][feature] == x[next][feature] {
                continue;
            }
            let n_left = (i + 1) as f64;
            let n_right = n - n_left;
            let right_sum = total - left_sum;
            let sse = (left_sq - left_sum * left_sum / n_left)
                + (total_sq - left_sq - right_sum * right_sum / n_right);
            let gain = baseline - sse;
            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Stump {
                    feature,
                    threshold: (x[current][feature] + x[next][feature]) / 2.0,
                    left: left_sum / n_left,
                    right: right_sum / n_right,
                    gain,
                });
            }
        }
    }
    best
}

/// Column selection + bagged forest of depth-1 regression trees.
fn build_regressor(frame: &Frame, rng: &mut StdRng, n_trees: usize) -> Result<Pipeline> {
    let selected: Vec<String> = NUMERIC_FEATURES.iter().map(|c| c.to_string()).collect();
    let columns: Vec<Vec<f64>> = NUMERIC_FEATURES
        .iter()
        .map(|name| numeric_column(frame, name))
        .collect::<Result<_>>()?;
    let x: Vec<Vec<f64>> = (0..frame.n_rows())
        .map(|row| columns.iter().map(|column| column[row]).collect())
        .collect();
    let y = numeric_column(frame, "Future_Price_5Yrs")?;

    let features: Vec<usize> = (0..selected.len()).collect();
    let per_tree = ((selected.len() as f64).sqrt().ceil() as usize).max(1);
    let mut importances = vec![0.0; selected.len()];
    let mut trees = Vec::with_capacity(n_trees);

    for _ in 0..n_trees {
        let sample: Vec<usize> = (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect();
        let candidates: Vec<usize> = features
            .choose_multiple(rng, per_tree)
            .copied()
            .collect();
        let Some(stump) = fit_stump(&x, &y, &sample, &candidates) else {
            continue;
        };
        importances[stump.feature] += stump.gain.max(0.0);
        trees.push(DecisionTree::new(
            Task::Regression,
            TreeNode::split(
                stump.feature,
                stump.threshold,
                TreeNode::value(stump.left),
                TreeNode::value(stump.right),
            ),
        ));
    }

    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        importances.iter_mut().for_each(|imp| *imp /= total);
    }
    info!(trees = trees.len(), "Regressor fitted");

    let mut forest = Forest::new(Task::Regression, trees);
    forest.feature_importances = Some(importances);

    Ok(Pipeline::new(
        vec![TransformStep {
            name: "select".to_string(),
            transform: Transform::Select(ColumnSelector { columns: selected }),
        }],
        "regressor",
        Estimator::Forest(forest),
    )
    .with_feature_names(feature_columns(frame)))
}

fn write_artifact(path: &Path, pipeline: Pipeline) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &ModelArtifact::Pipeline(pipeline))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Artifact written");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("demo_artifacts=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!(rows = args.rows, seed = args.seed, out = %args.out, "Generating demo artifacts");

    let root = Path::new(&args.out);
    let data_dir = root.join("data");
    let models_dir = root.join("models");
    fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
    fs::create_dir_all(&models_dir).context("Failed to create models directory")?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let dataset = generate_dataset(&mut rng, args.rows.max(2))?;

    let data_path = data_dir.join("final_data.csv");
    let file = fs::File::create(&data_path)
        .with_context(|| format!("Failed to create {}", data_path.display()))?;
    dataset.write_csv(file)?;
    info!(path = %data_path.display(), rows = dataset.n_rows(), "Reference dataset written");

    write_artifact(
        &models_dir.join("classifier_pipeline.json"),
        build_classifier(&dataset)?,
    )?;
    write_artifact(
        &models_dir.join("regressor_pipeline.json"),
        build_regressor(&dataset, &mut rng, args.trees)?,
    )?;

    info!("Demo artifacts ready");
    Ok(())
}

//! Fitted linear pipeline loaded from a JSON artifact
//!
//! The artifact describes a column transformer (scaling, one-hot encoding,
//! passthrough) followed by a logistic regression, all already fitted. Columns
//! not named by any transformer are dropped, so a record carrying
//! `customerID` scores the same as one without it.

use crate::error::ChurnError;
use crate::model::ChurnClassifier;
use crate::schema::{CustomerRecord, FieldValue};
use log::{debug, info};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Artifact layout version this loader understands
pub const FORMAT_VERSION: u32 = 1;

const DEFAULT_THRESHOLD: f64 = 0.5;

/// What a one-hot encoder does with a category it was not fit on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    /// Encode as all zeros
    #[default]
    Ignore,
    /// Fail the inference call
    Error,
}

/// One fitted step of the column transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformer {
    StandardScaler {
        columns: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    OneHot {
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
        #[serde(default)]
        handle_unknown: HandleUnknown,
    },
    Passthrough {
        columns: Vec<String>,
    },
}

impl Transformer {
    pub fn columns(&self) -> &[String] {
        match self {
            Transformer::StandardScaler { columns, .. }
            | Transformer::OneHot { columns, .. }
            | Transformer::Passthrough { columns } => columns,
        }
    }

    /// Number of encoded features this step emits
    pub fn width(&self) -> usize {
        match self {
            Transformer::OneHot { categories, .. } => categories.iter().map(Vec::len).sum(),
            other => other.columns().len(),
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Transformer::StandardScaler {
                columns,
                mean,
                scale,
            } => {
                if mean.len() != columns.len() || scale.len() != columns.len() {
                    return Err(format!(
                        "standard_scaler has {} columns but {} means and {} scales",
                        columns.len(),
                        mean.len(),
                        scale.len()
                    ));
                }
                if let Some((column, s)) = columns
                    .iter()
                    .zip(scale)
                    .find(|(_, s)| !s.is_finite() || **s == 0.0)
                {
                    return Err(format!("scale for column '{}' is unusable ({})", column, s));
                }
                if mean.iter().any(|m| !m.is_finite()) {
                    return Err("standard_scaler mean must be finite".to_string());
                }
            }
            Transformer::OneHot {
                columns,
                categories,
                ..
            } => {
                if categories.len() != columns.len() {
                    return Err(format!(
                        "one_hot has {} columns but {} category lists",
                        columns.len(),
                        categories.len()
                    ));
                }
                if let Some(column) = columns
                    .iter()
                    .zip(categories)
                    .find(|(_, cats)| cats.is_empty())
                    .map(|(column, _)| column)
                {
                    return Err(format!("one_hot column '{}' has no categories", column));
                }
            }
            Transformer::Passthrough { .. } => {}
        }
        Ok(())
    }

    /// Append this step's encoding of `record` to `out`
    fn encode_into(&self, record: &CustomerRecord, out: &mut Vec<f64>) -> Result<(), ChurnError> {
        match self {
            Transformer::StandardScaler {
                columns,
                mean,
                scale,
            } => {
                for ((column, m), s) in columns.iter().zip(mean).zip(scale) {
                    out.push((numeric(record, column)? - m) / s);
                }
            }
            Transformer::OneHot {
                columns,
                categories,
                handle_unknown,
            } => {
                for (column, cats) in columns.iter().zip(categories) {
                    let value = category(record, column)?;
                    let hit = cats.iter().position(|c| *c == value);
                    if hit.is_none() && *handle_unknown == HandleUnknown::Error {
                        return Err(ChurnError::Inference(format!(
                            "unknown category {:?} in column '{}'",
                            value, column
                        )));
                    }
                    out.extend((0..cats.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
                }
            }
            Transformer::Passthrough { columns } => {
                for column in columns {
                    out.push(numeric(record, column)?);
                }
            }
        }
        Ok(())
    }
}

fn lookup<'a>(record: &'a CustomerRecord, column: &str) -> Result<&'a FieldValue, ChurnError> {
    record
        .get(column)
        .ok_or_else(|| ChurnError::Inference(format!("missing column '{}'", column)))
}

fn numeric(record: &CustomerRecord, column: &str) -> Result<f64, ChurnError> {
    let value = lookup(record, column)?;
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(ChurnError::Inference(format!(
            "column '{}' holds non-finite value {}",
            column, v
        ))),
        None => Err(ChurnError::Inference(format!(
            "column '{}' expects a number, got text {:?}",
            column,
            value.to_string()
        ))),
    }
}

fn category(record: &CustomerRecord, column: &str) -> Result<String, ChurnError> {
    match lookup(record, column)? {
        FieldValue::Text(s) => Ok(s.clone()),
        FieldValue::Int(v) => Ok(v.to_string()),
        FieldValue::Float(v) => Err(ChurnError::Inference(format!(
            "column '{}' expects a category, got float {}",
            column, v
        ))),
    }
}

/// Serialized form of the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    pub format_version: u32,
    pub transformers: Vec<Transformer>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub classes: Vec<i64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default = "default_probability_enabled")]
    pub probability_enabled: bool,
}

fn default_probability_enabled() -> bool {
    true
}

/// Fitted column transformer plus logistic regression
#[derive(Debug, Clone)]
pub struct LinearPipeline {
    name: String,
    transformers: Vec<Transformer>,
    coefficients: Array1<f64>,
    intercept: f64,
    classes: [i64; 2],
    threshold: f64,
    probability_enabled: bool,
}

impl LinearPipeline {
    /// Load and validate an artifact file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ChurnError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let raw = fs::read_to_string(path).map_err(|e| ChurnError::artifact(&display, e.to_string()))?;
        let spec: PipelineSpec = serde_json::from_str(&raw)
            .map_err(|e| ChurnError::artifact(&display, format!("invalid artifact JSON: {}", e)))?;
        let pipeline = Self::from_spec(spec).map_err(|reason| ChurnError::artifact(&display, reason))?;

        info!(
            "Loaded pipeline '{}' from {} ({} input columns, {} encoded features)",
            pipeline.name,
            display,
            pipeline.input_columns().len(),
            pipeline.n_features()
        );
        Ok(pipeline)
    }

    /// Validate an in-memory spec
    pub fn from_spec(spec: PipelineSpec) -> Result<Self, String> {
        if spec.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {})",
                spec.format_version, FORMAT_VERSION
            ));
        }

        let classes: [i64; 2] = match spec.classes.as_slice() {
            [a, b] if a != b => [*a, *b],
            other => return Err(format!("expected two distinct classes, got {:?}", other)),
        };

        if spec.transformers.is_empty() {
            return Err("pipeline has no transformers".to_string());
        }
        for transformer in &spec.transformers {
            transformer.check()?;
        }

        let mut seen = HashSet::new();
        for column in spec.transformers.iter().flat_map(Transformer::columns) {
            if !seen.insert(column.as_str()) {
                return Err(format!("column '{}' is consumed by more than one transformer", column));
            }
        }

        let width: usize = spec.transformers.iter().map(Transformer::width).sum();
        if spec.coefficients.len() != width {
            return Err(format!(
                "{} coefficients for {} encoded features",
                spec.coefficients.len(),
                width
            ));
        }
        if spec.coefficients.iter().any(|c| !c.is_finite()) || !spec.intercept.is_finite() {
            return Err("coefficients and intercept must be finite".to_string());
        }

        let threshold = spec.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(format!("threshold {} is outside (0, 1)", threshold));
        }

        Ok(Self {
            name: spec.name,
            transformers: spec.transformers,
            coefficients: Array1::from(spec.coefficients),
            intercept: spec.intercept,
            classes,
            threshold,
            probability_enabled: spec.probability_enabled,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Columns the pipeline reads, in transformer order
    pub fn input_columns(&self) -> Vec<&str> {
        self.transformers
            .iter()
            .flat_map(Transformer::columns)
            .map(String::as_str)
            .collect()
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Encode a batch into the (n_records, n_features) design matrix
    pub fn transform(&self, batch: &[CustomerRecord]) -> Result<Array2<f64>, ChurnError> {
        let width = self.n_features();
        let mut flat = Vec::with_capacity(batch.len() * width);
        for record in batch {
            for transformer in &self.transformers {
                transformer.encode_into(record, &mut flat)?;
            }
        }
        Array2::from_shape_vec((batch.len(), width), flat)
            .map_err(|e| ChurnError::Inference(format!("encoded shape mismatch: {}", e)))
    }

    /// Positive-class probability per record
    pub fn churn_probabilities(&self, batch: &[CustomerRecord]) -> Result<Array1<f64>, ChurnError> {
        let features = self.transform(batch)?;
        let logits = features.dot(&self.coefficients) + self.intercept;
        debug!("Pipeline '{}' logits: {:?}", self.name, logits.to_vec());
        Ok(logits.mapv(sigmoid))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ChurnClassifier for LinearPipeline {
    fn predict(&self, batch: &[CustomerRecord]) -> Result<Vec<i64>, ChurnError> {
        let probabilities = self.churn_probabilities(batch)?;
        Ok(probabilities
            .iter()
            .map(|&p| if p >= self.threshold { self.classes[1] } else { self.classes[0] })
            .collect())
    }

    fn predict_proba(&self, batch: &[CustomerRecord]) -> Result<Vec<Vec<f64>>, ChurnError> {
        if !self.probability_enabled {
            return Err(ChurnError::ProbabilityUnavailable(format!(
                "pipeline '{}' was exported without probability estimates",
                self.name
            )));
        }
        let probabilities = self.churn_probabilities(batch)?;
        Ok(probabilities.iter().map(|&p| vec![1.0 - p, p]).collect())
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// The logistic model scores `classes[1]`
    fn positive_class(&self) -> i64 {
        self.classes[1]
    }
}

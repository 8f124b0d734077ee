//! ChurnForge: A Rust CLI application for telco customer churn prediction
//!
//! This library maps captured customer attributes onto the exact schema a
//! pre-trained classification pipeline was fit on, runs the pipeline, and
//! renders the verdict as a timestamped report.

pub mod artifact;
pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod report;
pub mod schema;
pub mod viz;

// Re-export public items for easier access
pub use artifact::LinearPipeline;
pub use cli::Args;
pub use data::{load_customers, write_predictions};
pub use error::ChurnError;
pub use model::{ChurnClassifier, ChurnLabel, PredictionResult, Predictor};
pub use report::{render, ReportDocument, ReportFormat};
pub use schema::{build_record, CustomerFields, CustomerRecord, FieldValue};
pub use viz::{create_batch_chart, BatchSummary};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

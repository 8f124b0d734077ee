//! Predictor adapter around the trained churn classifier

use crate::artifact::LinearPipeline;
use crate::error::ChurnError;
use crate::schema::CustomerRecord;
use log::{debug, warn};
use serde::Serialize;
use std::path::Path;

/// Capability surface of a fitted classification pipeline
///
/// Only `predict` is required. Implementations that cannot estimate
/// probabilities keep the default `predict_proba`.
pub trait ChurnClassifier: Send + Sync {
    /// One class value per record
    fn predict(&self, batch: &[CustomerRecord]) -> Result<Vec<i64>, ChurnError>;

    /// One probability row per record, columns ordered as `classes()`
    fn predict_proba(&self, _batch: &[CustomerRecord]) -> Result<Vec<Vec<f64>>, ChurnError> {
        Err(ChurnError::ProbabilityUnavailable(
            "classifier does not estimate probabilities".to_string(),
        ))
    }

    /// Class values in probability-column order
    fn classes(&self) -> &[i64] {
        &[0, 1]
    }

    /// Class value meaning "churn"
    fn positive_class(&self) -> i64 {
        1
    }
}

/// Predicted outcome for one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnLabel {
    Churn,
    NoChurn,
}

impl ChurnLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ChurnLabel::Churn => "churn",
            ChurnLabel::NoChurn => "no_churn",
        }
    }

    /// Verdict shown to the user
    pub fn verdict(self) -> &'static str {
        match self {
            ChurnLabel::Churn => "LIKELY TO CHURN",
            ChurnLabel::NoChurn => "NOT LIKELY TO CHURN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: ChurnLabel,
    /// Probability of the churn class, when the classifier could provide one
    pub probability: Option<f64>,
}

impl PredictionResult {
    pub fn is_churn(&self) -> bool {
        self.label == ChurnLabel::Churn
    }

    /// Probability formatted as a percentage with two decimals
    pub fn probability_percent(&self) -> Option<String> {
        self.probability.map(|p| format!("{:.2}%", p * 100.0))
    }
}

/// Wraps a classifier and normalizes its output into a [`PredictionResult`]
///
/// Built once at startup and shared read-only by every request.
pub struct Predictor {
    classifier: Box<dyn ChurnClassifier>,
}

impl Predictor {
    pub fn new<C: ChurnClassifier + 'static>(classifier: C) -> Self {
        Self {
            classifier: Box::new(classifier),
        }
    }

    /// Load the bundled JSON pipeline format
    pub fn from_artifact<P: AsRef<Path>>(path: P) -> Result<Self, ChurnError> {
        LinearPipeline::load(path).map(Self::new)
    }

    /// Classify one record.
    ///
    /// Fails only when the classification call itself fails. A missing or
    /// failing probability estimate leaves `probability` empty.
    pub fn predict(&self, record: &CustomerRecord) -> Result<PredictionResult, ChurnError> {
        let batch = std::slice::from_ref(record);

        let raw = self
            .classifier
            .predict(batch)?
            .into_iter()
            .next()
            .ok_or_else(|| ChurnError::Inference("classifier returned no prediction".to_string()))?;

        let classes = self.classifier.classes();
        if !classes.contains(&raw) {
            return Err(ChurnError::Inference(format!(
                "classifier returned class {} outside {:?}",
                raw, classes
            )));
        }

        let label = if raw == self.classifier.positive_class() {
            ChurnLabel::Churn
        } else {
            ChurnLabel::NoChurn
        };

        let probability = match self.churn_probability(batch) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("{}; reporting label only for {}", e, record.describe());
                None
            }
        };

        debug!(
            "Prediction for {}: {} (probability {:?})",
            record.describe(),
            label.as_str(),
            probability
        );
        Ok(PredictionResult { label, probability })
    }

    fn churn_probability(&self, batch: &[CustomerRecord]) -> Result<f64, ChurnError> {
        let classes = self.classifier.classes();
        let positive = self.classifier.positive_class();
        let column = classes.iter().position(|&c| c == positive).ok_or_else(|| {
            ChurnError::ProbabilityUnavailable(format!(
                "positive class {} is not among classes {:?}",
                positive, classes
            ))
        })?;

        let rows = self.classifier.predict_proba(batch)?;
        let p = rows
            .first()
            .and_then(|row| row.get(column))
            .copied()
            .ok_or_else(|| {
                ChurnError::ProbabilityUnavailable(format!(
                    "probability output has no column {} for the churn class",
                    column
                ))
            })?;

        if !(0.0..=1.0).contains(&p) {
            return Err(ChurnError::ProbabilityUnavailable(format!(
                "churn probability {} is outside [0, 1]",
                p
            )));
        }
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{build_record, CustomerFields};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Classifier with scripted outputs
    struct Scripted {
        label: Result<Vec<i64>, String>,
        proba: Option<Result<Vec<Vec<f64>>, String>>,
        classes: Vec<i64>,
        positive: i64,
        predict_calls: Arc<AtomicUsize>,
        proba_calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn label(label: i64) -> Self {
            Self {
                label: Ok(vec![label]),
                proba: None,
                classes: vec![0, 1],
                positive: 1,
                predict_calls: Arc::new(AtomicUsize::new(0)),
                proba_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_proba(mut self, proba: Result<Vec<Vec<f64>>, String>) -> Self {
            self.proba = Some(proba);
            self
        }
    }

    impl ChurnClassifier for Scripted {
        fn predict(&self, batch: &[CustomerRecord]) -> Result<Vec<i64>, ChurnError> {
            assert_eq!(batch.len(), 1);
            self.predict_calls.fetch_add(1, Ordering::SeqCst);
            self.label.clone().map_err(ChurnError::Inference)
        }

        fn predict_proba(&self, batch: &[CustomerRecord]) -> Result<Vec<Vec<f64>>, ChurnError> {
            assert_eq!(batch.len(), 1);
            self.proba_calls.fetch_add(1, Ordering::SeqCst);
            match &self.proba {
                Some(proba) => proba.clone().map_err(ChurnError::Inference),
                None => Err(ChurnError::ProbabilityUnavailable("scripted".to_string())),
            }
        }

        fn classes(&self) -> &[i64] {
            &self.classes
        }

        fn positive_class(&self) -> i64 {
            self.positive
        }
    }

    /// Implements only the required method
    struct LabelOnly;

    impl ChurnClassifier for LabelOnly {
        fn predict(&self, batch: &[CustomerRecord]) -> Result<Vec<i64>, ChurnError> {
            Ok(vec![0; batch.len()])
        }
    }

    fn record() -> CustomerRecord {
        build_record(&CustomerFields::default())
    }

    #[test]
    fn test_churn_label_and_probability() {
        let predictor = Predictor::new(Scripted::label(1).with_proba(Ok(vec![vec![0.2, 0.8]])));
        let result = predictor.predict(&record()).unwrap();

        assert_eq!(result.label, ChurnLabel::Churn);
        assert_eq!(result.probability, Some(0.8));
        assert_eq!(result.probability_percent().as_deref(), Some("80.00%"));
        assert!(result.is_churn());
    }

    #[test]
    fn test_missing_probability_capability_is_not_fatal() {
        let predictor = Predictor::new(LabelOnly);
        let result = predictor.predict(&record()).unwrap();

        assert_eq!(result.label, ChurnLabel::NoChurn);
        assert_eq!(result.probability, None);
        assert_eq!(result.probability_percent(), None);
    }

    #[test]
    fn test_failing_probability_is_swallowed() {
        let predictor = Predictor::new(Scripted::label(1).with_proba(Err("boom".to_string())));
        let result = predictor.predict(&record()).unwrap();
        assert_eq!(result.label, ChurnLabel::Churn);
        assert_eq!(result.probability, None);

        // a malformed probability row degrades the same way
        let predictor = Predictor::new(Scripted::label(1).with_proba(Ok(vec![vec![0.9]])));
        assert_eq!(predictor.predict(&record()).unwrap().probability, None);

        let predictor = Predictor::new(Scripted::label(1).with_proba(Ok(vec![vec![-0.5, 1.5]])));
        assert_eq!(predictor.predict(&record()).unwrap().probability, None);
    }

    #[test]
    fn test_inference_failure_is_surfaced() {
        let mut scripted = Scripted::label(0);
        scripted.label = Err("missing column 'tenure'".to_string());
        let predictor = Predictor::new(scripted);

        let err = predictor.predict(&record()).unwrap_err();
        assert!(matches!(err, ChurnError::Inference(_)));

        let mut scripted = Scripted::label(0);
        scripted.label = Ok(vec![]);
        assert!(Predictor::new(scripted).predict(&record()).is_err());

        assert!(Predictor::new(Scripted::label(7)).predict(&record()).is_err());
    }

    #[test]
    fn test_positive_class_column_follows_class_order() {
        // classes stored as [1, 0]: the churn probability is column 0
        let mut scripted = Scripted::label(1).with_proba(Ok(vec![vec![0.7, 0.3]]));
        scripted.classes = vec![1, 0];
        let result = Predictor::new(scripted).predict(&record()).unwrap();

        assert_eq!(result.label, ChurnLabel::Churn);
        assert_eq!(result.probability, Some(0.7));
    }

    #[test]
    fn test_predict_is_deterministic() {
        let predictor = Predictor::new(Scripted::label(0).with_proba(Ok(vec![vec![0.9, 0.1]])));
        let record = record();

        let first = predictor.predict(&record).unwrap();
        let second = predictor.predict(&record).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.label, ChurnLabel::NoChurn);
    }

    #[test]
    fn test_single_call_per_capability_per_request() {
        let scripted = Scripted::label(1).with_proba(Err("flaky".to_string()));
        let predict_calls = Arc::clone(&scripted.predict_calls);
        let proba_calls = Arc::clone(&scripted.proba_calls);
        let predictor = Predictor::new(scripted);

        predictor.predict(&record()).unwrap();
        assert_eq!(predict_calls.load(Ordering::SeqCst), 1);
        assert_eq!(proba_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_label_serialization() {
        let result = PredictionResult {
            label: ChurnLabel::NoChurn,
            probability: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"label": "no_churn", "probability": null}));
        assert_eq!(ChurnLabel::Churn.verdict(), "LIKELY TO CHURN");
        assert_eq!(ChurnLabel::NoChurn.verdict(), "NOT LIKELY TO CHURN");
    }
}

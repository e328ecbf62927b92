use shared::Severity;

use crate::analysis::models::ImageResult;
use crate::config::SeverityThresholds;
use crate::inference::labels::is_healthy;

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub average_confidence: f64,
    pub average_severity: Severity,
}

/// Combines per-image outcomes into one analysis-level summary.
#[derive(Clone)]
pub struct AggregationEngine {
    thresholds: SeverityThresholds,
}

impl AggregationEngine {
    pub fn new(thresholds: SeverityThresholds) -> Self {
        Self { thresholds }
    }

    /// Per-image severity from the detected label and confidence. Healthy
    /// leaves are always Low; for anything else the configured thresholds
    /// apply.
    pub fn severity_for(&self, disease: &str, confidence: f64) -> Severity {
        if is_healthy(disease) {
            return Severity::Low;
        }
        if confidence >= self.thresholds.high_min {
            Severity::High
        } else if confidence >= self.thresholds.low_max {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Mean confidence over every image result, with error rows counting as
    /// zero. Severity is the maximum observed: one severely diseased leaf
    /// must not be diluted by healthy neighbors.
    pub fn aggregate(&self, results: &[ImageResult]) -> Aggregate {
        if results.is_empty() {
            return Aggregate {
                average_confidence: 0.0,
                average_severity: Severity::Low,
            };
        }

        let total: f64 = results.iter().map(|r| r.confidence).sum();
        let average_confidence = total / results.len() as f64;
        let average_severity = results
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or(Severity::Low);

        Aggregate {
            average_confidence,
            average_severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn engine() -> AggregationEngine {
        AggregationEngine::new(SeverityThresholds::default())
    }

    fn result(disease: &str, confidence: f64, severity: Severity) -> ImageResult {
        ImageResult::new(
            Uuid::new_v4(),
            "leaf.jpg".to_string(),
            "analyses/key".to_string(),
            disease.to_string(),
            confidence,
            severity,
        )
    }

    #[test]
    fn severity_thresholds_split_the_confidence_range() {
        let e = engine();
        assert_eq!(e.severity_for("Late Blight", 0.2), Severity::Low);
        assert_eq!(e.severity_for("Late Blight", 0.49), Severity::Low);
        assert_eq!(e.severity_for("Late Blight", 0.5), Severity::Medium);
        assert_eq!(e.severity_for("Late Blight", 0.84), Severity::Medium);
        assert_eq!(e.severity_for("Late Blight", 0.85), Severity::High);
        assert_eq!(e.severity_for("Late Blight", 0.99), Severity::High);
    }

    #[test]
    fn healthy_is_low_no_matter_the_confidence() {
        let e = engine();
        assert_eq!(e.severity_for("Healthy", 0.99), Severity::Low);
        assert_eq!(e.severity_for("healthy", 0.6), Severity::Low);
    }

    #[test]
    fn mean_confidence_includes_error_zeros() {
        let e = engine();
        let agg = e.aggregate(&[
            result("Late Blight", 0.9, Severity::High),
            result("error", 0.0, Severity::Low),
        ]);
        assert!((agg.average_confidence - 0.45).abs() < 1e-9);
    }

    #[test]
    fn maximum_harm_wins_across_the_batch() {
        let e = engine();
        let agg = e.aggregate(&[
            result("Healthy", 0.95, Severity::Low),
            result("Early Blight", 0.6, Severity::Medium),
            result("Healthy", 0.9, Severity::Low),
        ]);
        assert_eq!(agg.average_severity, Severity::Medium);
    }

    #[test]
    fn all_healthy_batch_aggregates_to_low() {
        let e = engine();
        let agg = e.aggregate(&[
            result("Healthy", 0.99, Severity::Low),
            result("Healthy", 0.97, Severity::Low),
        ]);
        assert_eq!(agg.average_severity, Severity::Low);
    }

    #[test]
    fn mixed_batch_matches_the_documented_scenario() {
        let e = engine();
        let agg = e.aggregate(&[
            result("Healthy", 0.95, Severity::Low),
            result("Healthy", 0.95, Severity::Low),
            result("Late Blight", 0.9, e.severity_for("Late Blight", 0.9)),
        ]);
        assert!((agg.average_confidence - 0.9333).abs() < 1e-3);
        assert_eq!(agg.average_severity, Severity::High);
    }

    #[test]
    fn empty_input_yields_the_neutral_aggregate() {
        let e = engine();
        let agg = e.aggregate(&[]);
        assert_eq!(agg.average_confidence, 0.0);
        assert_eq!(agg.average_severity, Severity::Low);
    }
}

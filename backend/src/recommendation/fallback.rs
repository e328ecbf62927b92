use shared::Severity;

use crate::inference::labels::is_healthy;
use crate::recommendation::generator::RecommendationContext;

/// Deterministic template used when the external generator fails or runs
/// past its timeout budget. Same context in, same text out.
pub fn fallback_content(ctx: &RecommendationContext) -> String {
    if is_healthy(&ctx.disease) {
        return format!(
            "Your {} appears healthy. Continue regular monitoring: inspect leaves \
             every few days for spots or discoloration, keep a consistent watering \
             schedule without waterlogging, and ensure adequate spacing for air \
             circulation. Apply well-aged compost to maintain soil health.",
            ctx.crop_type
        );
    }

    match ctx.severity {
        Severity::Low => format!(
            "{} detected in {} at low severity. Remove visibly affected leaves and \
             dispose of them away from the field. Improve air circulation around the \
             plants and avoid overhead watering. Monitor daily for the next week; if \
             symptoms spread, escalate to targeted treatment.",
            ctx.disease, ctx.crop_type
        ),
        Severity::Medium => format!(
            "{} detected in {} at medium severity. Isolate affected plants where \
             practical and prune out infected material. Apply a neem oil spray every \
             7-14 days in the early morning or evening, or a copper-based fungicide \
             per label directions with gloves and eye protection. Rotate crops next \
             season to break the disease cycle.",
            ctx.disease, ctx.crop_type
        ),
        Severity::High => format!(
            "{} detected in {} at high severity. Isolate or remove affected plants \
             immediately to protect the rest of the field, and destroy infected \
             debris rather than composting it. Begin treatment now: a copper-based \
             fungicide applied per label directions, repeated every 7-10 days. \
             Consult your local extension service for region-specific guidance \
             before the infection spreads further.",
            ctx.disease, ctx.crop_type
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(disease: &str, severity: Severity) -> RecommendationContext {
        RecommendationContext {
            crop_type: "Tomato".to_string(),
            disease: disease.to_string(),
            severity,
            confidence: 0.9,
        }
    }

    #[test]
    fn same_context_yields_the_same_text() {
        let a = fallback_content(&ctx("Late Blight", Severity::High));
        let b = fallback_content(&ctx("Late Blight", Severity::High));
        assert_eq!(a, b);
    }

    #[test]
    fn each_severity_gets_its_own_template() {
        let low = fallback_content(&ctx("Late Blight", Severity::Low));
        let medium = fallback_content(&ctx("Late Blight", Severity::Medium));
        let high = fallback_content(&ctx("Late Blight", Severity::High));
        assert_ne!(low, medium);
        assert_ne!(medium, high);
        assert!(high.contains("extension service"));
    }

    #[test]
    fn healthy_batches_get_monitoring_guidance() {
        let text = fallback_content(&ctx("Healthy", Severity::Low));
        assert!(text.contains("appears healthy"));
        assert!(text.contains("Tomato"));
    }
}

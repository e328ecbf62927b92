use serde_json::json;
use shared::Severity;

#[derive(Debug, Clone)]
pub struct RecommendationContext {
    pub crop_type: String,
    pub disease: String,
    pub severity: Severity,
    pub confidence: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator not configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected generator response: {0}")]
    Api(String),
}

/// Opaque external recommendation generator. Callers own the timeout budget
/// and the fallback path; implementations just produce text or fail.
pub trait RecommendationGenerator: Send + Sync {
    fn generate(
        &self,
        ctx: &RecommendationContext,
    ) -> impl std::future::Future<Output = Result<String, GeneratorError>> + Send;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        if api_key.is_empty() {
            log::warn!("Gemini API key not configured, recommendations will use the fallback template");
        }
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    fn build_prompt(ctx: &RecommendationContext) -> String {
        format!(
            "You are an expert agricultural advisor. Provide practical, actionable \
             treatment advice for a small to medium-scale farmer.\n\n\
             Crop Analysis:\n\
             - Crop Type: {}\n\
             - Disease Detected: {}\n\
             - Severity Level: {}\n\
             - Detection Confidence: {:.0}%\n\n\
             Reply with plain text only: a 2-3 sentence summary of the situation, \
             then numbered immediate actions, treatment options (organic and \
             chemical, with safety notes), and prevention measures. Keep it \
             practical and safe.",
            ctx.crop_type,
            ctx.disease,
            ctx.severity,
            ctx.confidence * 100.0
        )
    }
}

impl RecommendationGenerator for GeminiClient {
    async fn generate(&self, ctx: &RecommendationContext) -> Result<String, GeneratorError> {
        if self.api_key.is_empty() {
            return Err(GeneratorError::NotConfigured);
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": Self::build_prompt(ctx) }] }]
        });

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(GeneratorError::Api(format!(
                "generator returned {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        let text = payload
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.pointer("/content/parts/0/text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| GeneratorError::Api("no candidate text in response".to_string()))?;

        log::info!(
            "Generator produced a recommendation for {} - {}",
            ctx.crop_type,
            ctx.disease
        );
        Ok(strip_code_fences(text))
    }
}

/// Generators occasionally wrap replies in Markdown code fences even when
/// asked for plain text.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences_from_replies() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\nplain\n```"), "plain");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn prompt_carries_the_analysis_context() {
        let prompt = GeminiClient::build_prompt(&RecommendationContext {
            crop_type: "Tomato".to_string(),
            disease: "Late Blight".to_string(),
            severity: Severity::High,
            confidence: 0.93,
        });
        assert!(prompt.contains("Tomato"));
        assert!(prompt.contains("Late Blight"));
        assert!(prompt.contains("high"));
        assert!(prompt.contains("93%"));
    }

    #[actix_web::test]
    async fn unconfigured_client_fails_fast() {
        let client = GeminiClient::new(String::new(), "gemini-1.5-flash".to_string());
        let err = client
            .generate(&RecommendationContext {
                crop_type: "Potato".to_string(),
                disease: "Early Blight".to_string(),
                severity: Severity::Medium,
                confidence: 0.7,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::NotConfigured));
    }
}

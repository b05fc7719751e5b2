use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TaskError};
use crate::language::Language;
use crate::metrics::{PROVIDER_CALLS_TOTAL, PROVIDER_CALL_DURATION_SECONDS, PROVIDER_ERRORS_TOTAL};

/// Seam to the external machine-translation service.
///
/// The worker treats the provider as untrusted and possibly slow; any failure
/// (network, non-2xx, timeout, empty body) surfaces as a task failure with no
/// retry.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// The translate endpoint, e.g. http://localhost:5000/translate
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ask for alternatives and prefer one that differs from the input when
    /// the primary translation comes back identical. Quality heuristic only.
    #[serde(default = "default_prefer_alternatives")]
    pub prefer_alternatives: bool,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_prefer_alternatives() -> bool {
    true
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(TaskError::ConfigValidationError(
                "ProviderConfig: url cannot be empty".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(TaskError::ConfigValidationError(
                "ProviderConfig: timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

/// HTTP client for the translation endpoint.
pub struct HttpTranslationProvider {
    client: reqwest::Client,
    url: String,
    prefer_alternatives: bool,
}

impl HttpTranslationProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(HttpTranslationProvider {
            client,
            url: config.url.clone(),
            prefer_alternatives: config.prefer_alternatives,
        })
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        PROVIDER_CALLS_TOTAL.inc();
        let timer = PROVIDER_CALL_DURATION_SECONDS.start_timer();

        let request = TranslateRequest {
            q: text,
            source: source.code(),
            target: target.code(),
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                PROVIDER_ERRORS_TOTAL.inc();
                timer.observe_duration();
                return Err(e.into());
            }
        };

        let body: TranslateResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                PROVIDER_ERRORS_TOTAL.inc();
                timer.observe_duration();
                return Err(e.into());
            }
        };
        timer.observe_duration();

        if body.translated_text.is_empty() {
            PROVIDER_ERRORS_TOTAL.inc();
            return Err(TaskError::ProviderError(format!(
                "empty translation for '{}' ({} -> {})",
                text, source, target
            )));
        }

        // Short or ambiguous strings often come back unchanged; an
        // alternative that actually differs is preferred when available.
        if self.prefer_alternatives && body.translated_text == text {
            if let Some(alternative) = body
                .alternatives
                .iter()
                .find(|candidate| candidate.as_str() != text && !candidate.is_empty())
            {
                debug!(
                    original = %text,
                    alternative = %alternative,
                    "Primary translation identical to input, using alternative"
                );
                return Ok(alternative.clone());
            }
        }

        Ok(body.translated_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_apply() {
        let config: ProviderConfig =
            serde_yaml::from_str("url: http://localhost:5000/translate").unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert!(config.prefer_alternatives);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_url_fails_validation() {
        let config = ProviderConfig {
            url: String::new(),
            timeout_secs: 10,
            prefer_alternatives: true,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let config = ProviderConfig {
            url: "http://localhost:5000/translate".to_string(),
            timeout_secs: 0,
            prefer_alternatives: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn response_parses_with_and_without_alternatives() {
        let with: TranslateResponse =
            serde_json::from_str(r#"{"translatedText":"Hola","alternatives":["Buenas"]}"#).unwrap();
        assert_eq!(with.translated_text, "Hola");
        assert_eq!(with.alternatives, vec!["Buenas".to_string()]);

        let without: TranslateResponse =
            serde_json::from_str(r#"{"translatedText":"Hola"}"#).unwrap();
        assert!(without.alternatives.is_empty());
    }
}

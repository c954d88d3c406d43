//! Model registry for managing available LLM providers

use super::openai::{OpenAIModel, OpenAIService};
use super::{LlmService, LoggingService, RetryingService};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    /// Gateway base URL; when set the gateway handles authentication
    pub gateway: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
    /// Total attempts per request (1 = fail once, no retry)
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            gateway: None,
            default_model: None,
            max_attempts: 1,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
            default_model: std::env::var("DEFAULT_MODEL").ok(),
            max_attempts: std::env::var("MATHBUDDY_MODEL_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(1),
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model in OpenAIModel::ALL {
            if let Some(service) = Self::try_create_model(model, config) {
                services.insert(model.api_name().to_string(), service);
            }
        }

        let default_model = config
            .default_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            services,
            default_model,
        }
    }

    /// Try to create a model service, validating prerequisites
    fn try_create_model(model: OpenAIModel, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        // In gateway mode, use "implicit" as the API key
        let api_key = if config.gateway.is_some() {
            "implicit".to_string()
        } else {
            config.openai_api_key.clone()?
        };

        if config.gateway.is_none() && api_key.is_empty() {
            return None;
        }

        match OpenAIService::new(api_key, model, config.gateway.as_deref()) {
            Ok(service) => {
                let logged: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(service)));
                Some(Arc::new(RetryingService::new(logged, config.max_attempts)))
            }
            Err(e) => {
                tracing::warn!(model = model.api_name(), error = %e, "Failed to create model service");
                None
            }
        }
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_api_keys_no_models() {
        let registry = ModelRegistry::new(&LlmConfig::default());
        assert!(registry.available_models().is_empty());
        assert!(registry.default().is_none());
    }

    #[test]
    fn test_openai_key_enables_models() {
        let config = LlmConfig {
            openai_api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);
        assert_eq!(
            registry.available_models(),
            vec!["gpt-4.1", "gpt-4.1-mini", "gpt-4o", "gpt-4o-mini"]
        );
        assert_eq!(registry.default_model_id(), "gpt-4o");
        assert!(registry.default().is_some());
    }

    #[test]
    fn test_empty_key_is_ignored() {
        let config = LlmConfig {
            openai_api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(!ModelRegistry::new(&config).has_models());
    }

    #[test]
    fn test_gateway_enables_models_without_key() {
        let config = LlmConfig {
            gateway: Some("https://example.com".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);
        assert!(registry.get("gpt-4o-mini").is_some());
    }

    #[test]
    fn test_custom_default_model() {
        let config = LlmConfig {
            openai_api_key: Some("test-key".to_string()),
            default_model: Some("gpt-4.1".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);
        assert_eq!(registry.default_model_id(), "gpt-4.1");
        assert_eq!(registry.default().unwrap().model_id(), "gpt-4.1");
    }
}

//! Completion provider routing.
//!
//! Providers form an ordered strategy list (local model first, remote
//! fallbacks after, whatever the deployment wires up); the router resolves
//! to the first one that reports itself configured. The core never knows
//! which provider answered.

use std::sync::Arc;

use tracing::debug;

use engram_core::capability::Completion;
use engram_core::error::{EngramError, Result};

pub struct CompletionRouter {
    providers: Vec<Arc<dyn Completion>>,
}

impl CompletionRouter {
    pub fn new(providers: Vec<Arc<dyn Completion>>) -> Self {
        Self { providers }
    }

    /// First configured provider in list order, if any.
    pub fn resolve(&self) -> Option<Arc<dyn Completion>> {
        self.providers.iter().find(|p| p.is_configured()).cloned()
    }

    /// Complete through the first configured provider.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let Some(provider) = self.resolve() else {
            return Err(EngramError::internal(
                "no completion provider is configured",
            ));
        };
        debug!(provider = provider.name(), "routing completion");
        provider.complete(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeProvider {
        name: &'static str,
        configured: bool,
    }

    #[async_trait]
    impl Completion for FakeProvider {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(format!("answer from {}", self.name))
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn provider(name: &'static str, configured: bool) -> Arc<dyn Completion> {
        Arc::new(FakeProvider { name, configured })
    }

    #[tokio::test]
    async fn test_first_configured_wins() {
        let router = CompletionRouter::new(vec![
            provider("ollama", false),
            provider("openai", true),
            provider("openrouter", true),
        ]);
        assert_eq!(router.resolve().unwrap().name(), "openai");
        assert_eq!(router.complete("hi").await.unwrap(), "answer from openai");
    }

    #[tokio::test]
    async fn test_no_configured_provider_errors() {
        let router = CompletionRouter::new(vec![provider("ollama", false)]);
        assert!(router.resolve().is_none());
        assert!(router.complete("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_list_errors() {
        let router = CompletionRouter::new(vec![]);
        assert!(router.complete("hi").await.is_err());
    }
}

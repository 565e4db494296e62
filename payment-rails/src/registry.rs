//! Provider registry
//!
//! Built once at startup, then shared read-only behind an `Arc`.

use crate::{
    config::GatewayConfig,
    provider::PaymentProvider,
    providers::{self, AchProvider, InteracProvider, NibssProvider, SepaProvider},
    types::{BankCodeType, Market},
    Result,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Provider name serving an identifier scheme
pub fn provider_for_scheme(scheme: BankCodeType) -> &'static str {
    match scheme {
        BankCodeType::Nibss => providers::NIBSS,
        BankCodeType::Routing => providers::ACH,
        BankCodeType::Swift => providers::SWIFT,
        BankCodeType::Transit => providers::INTERAC,
        BankCodeType::SortCode => providers::FASTER_PAYMENTS,
    }
}

/// Registered providers in registration order
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and initialize the built-in rails from `config`
    pub async fn bootstrap(config: &GatewayConfig) -> Result<Self> {
        let mut registry = Self::new();

        let rails: [(&str, Arc<dyn PaymentProvider>); 4] = [
            (providers::NIBSS, Arc::new(NibssProvider::new())),
            (providers::ACH, Arc::new(AchProvider::new())),
            (providers::SEPA, Arc::new(SepaProvider::new())),
            (providers::INTERAC, Arc::new(InteracProvider::new())),
        ];

        for (name, provider) in rails {
            provider.initialize(config.provider(name)).await?;
            registry.register(provider);
        }

        info!("Provider registry ready with {} rails", registry.len());
        Ok(registry)
    }

    /// Register a provider. A provider with the same name is replaced in place.
    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        let existing = self
            .providers
            .iter()
            .position(|p| p.name().eq_ignore_ascii_case(provider.name()));

        match existing {
            Some(index) => {
                warn!("Replacing registered provider {}", provider.name());
                self.providers[index] = provider;
            }
            None => {
                info!(
                    "Registered provider {} for {}",
                    provider.name(),
                    provider.market()
                );
                self.providers.push(provider);
            }
        }
    }

    /// Lookup by name, case-insensitive
    pub fn get(&self, name: &str) -> Option<Arc<dyn PaymentProvider>> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    /// First provider serving `market`
    pub fn by_market(&self, market: Market) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.iter().find(|p| p.market() == market).cloned()
    }

    /// First provider, in registration order, supporting `currency`
    pub fn by_currency(&self, currency: &str) -> Option<Arc<dyn PaymentProvider>> {
        self.providers
            .iter()
            .find(|p| p.capabilities().supports_currency(currency.trim()))
            .cloned()
    }

    /// Provider for an identifier scheme (absent when that rail is not registered)
    pub fn by_scheme(&self, scheme: BankCodeType) -> Option<Arc<dyn PaymentProvider>> {
        self.get(provider_for_scheme(scheme))
    }

    /// All providers in registration order
    pub fn all(&self) -> &[Arc<dyn PaymentProvider>] {
        &self.providers
    }

    /// Registered names
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Number of providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(NibssProvider::new()));
        registry.register(Arc::new(AchProvider::new()));
        registry.register(Arc::new(SepaProvider::new()));
        registry.register(Arc::new(InteracProvider::new()));
        registry
    }

    #[test]
    fn test_lookup_by_name_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.get("nibss").unwrap().name(), "NIBSS");
        assert_eq!(registry.get("Interac").unwrap().name(), "Interac");
        assert!(registry.get("swift").is_none());
    }

    #[test]
    fn test_scheme_table() {
        let registry = registry();
        assert_eq!(registry.by_scheme(BankCodeType::Nibss).unwrap().name(), "NIBSS");
        assert_eq!(registry.by_scheme(BankCodeType::Routing).unwrap().name(), "ACH");
        assert_eq!(registry.by_scheme(BankCodeType::Transit).unwrap().name(), "Interac");
        // No built-in rail for these schemes
        assert!(registry.by_scheme(BankCodeType::Swift).is_none());
        assert!(registry.by_scheme(BankCodeType::SortCode).is_none());
        assert_eq!(provider_for_scheme(BankCodeType::SortCode), "faster-payments");
    }

    #[test]
    fn test_market_and_currency() {
        let registry = registry();
        assert_eq!(registry.by_market(Market::Europe).unwrap().name(), "SEPA");
        assert_eq!(registry.by_currency("cad").unwrap().name(), "Interac");
        assert!(registry.by_currency("JPY").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = registry();
        registry.register(Arc::new(AchProvider::new()));
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.names(), vec!["NIBSS", "ACH", "SEPA", "Interac"]);
    }

    #[tokio::test]
    async fn test_bootstrap_initializes_sandbox_rails() {
        let registry = ProviderRegistry::bootstrap(&GatewayConfig::default())
            .await
            .unwrap();
        assert_eq!(registry.len(), 4);
        assert!(registry.all().iter().all(|p| p.is_initialized()));
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_production_without_url() {
        let mut config = GatewayConfig::default();
        config.providers.insert(
            "ach".to_string(),
            crate::config::ProviderConfig::new().with(crate::config::ENVIRONMENT, "production"),
        );
        assert!(ProviderRegistry::bootstrap(&config).await.is_err());
    }
}

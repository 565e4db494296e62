//! Gateway orchestrator
//!
//! Resolves which rail serves a request and delegates to it. Selection runs the
//! following steps and the first one that yields a registered provider wins:
//!
//! 1. explicit provider name
//! 2. tenant configuration, which only fills a missing currency or region
//! 3. identifier scheme of the destination bank code
//! 4. currency
//! 5. region, through [`Region::market`]
//! 6. the configured default rail
//!
//! Provider results are returned verbatim.

use crate::{
    classifier::classify_bank_code,
    error::ErrorCode,
    metrics::{self, RAIL_SELECTION_MISSES},
    provider::PaymentProvider,
    providers,
    registry::ProviderRegistry,
    types::*,
    Error, Result,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tenant payment preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantPaymentConfig {
    /// Tenant id
    pub tenant_id: String,
    /// Display name
    pub tenant_name: String,
    /// Preferred currency
    pub currency: Option<String>,
    /// Preferred region
    pub region: Option<Region>,
}

/// Read-only tenant configuration lookup
#[async_trait]
pub trait TenantConfigStore: Send + Sync {
    /// Configuration for `tenant_id`, `None` when the tenant is unknown
    async fn tenant_config(&self, tenant_id: &str) -> Result<Option<TenantPaymentConfig>>;
}

/// Tenant store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tenants: HashMap<String, TenantPaymentConfig>,
}

impl InMemoryTenantStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tenant
    pub fn with_tenant(mut self, config: TenantPaymentConfig) -> Self {
        self.tenants.insert(config.tenant_id.clone(), config);
        self
    }
}

#[async_trait]
impl TenantConfigStore for InMemoryTenantStore {
    async fn tenant_config(&self, tenant_id: &str) -> Result<Option<TenantPaymentConfig>> {
        Ok(self.tenants.get(tenant_id).cloned())
    }
}

/// Routing hints for one request
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    /// Explicit provider name
    pub provider: Option<String>,
    /// Tenant whose configuration fills missing hints
    pub tenant_id: Option<String>,
    /// Identifier scheme
    pub scheme: Option<BankCodeType>,
    /// Currency
    pub currency: Option<String>,
    /// Region
    pub region: Option<Region>,
}

impl SelectionContext {
    /// Empty context (resolves to the default rail)
    pub fn new() -> Self {
        Self::default()
    }

    /// Name a provider explicitly
    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    /// Resolve tenant preferences
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Identifier scheme hint
    pub fn scheme(mut self, scheme: BankCodeType) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Currency hint
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Region hint
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

/// Gateway over the registered rails
pub struct PaymentGateway {
    registry: Arc<ProviderRegistry>,
    tenants: Arc<dyn TenantConfigStore>,
    default_provider: String,
}

impl PaymentGateway {
    /// Create gateway; the default rail is NIBSS until overridden
    pub fn new(registry: Arc<ProviderRegistry>, tenants: Arc<dyn TenantConfigStore>) -> Self {
        info!(
            "Payment gateway initialized with {} providers",
            registry.len()
        );
        Self {
            registry,
            tenants,
            default_provider: providers::NIBSS.to_string(),
        }
    }

    /// Override the rail used when nothing else matches
    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = name.into();
        self
    }

    /// Underlying registry
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    async fn tenant_config(&self, tenant_id: &str) -> Option<TenantPaymentConfig> {
        match self.tenants.tenant_config(tenant_id).await {
            Ok(config) => config,
            Err(e) => {
                warn!("Tenant config lookup for {} failed: {}", tenant_id, e);
                None
            }
        }
    }

    /// Pick the provider for `context`; `None` means no step matched
    pub async fn select_provider(
        &self,
        context: &SelectionContext,
    ) -> Option<Arc<dyn PaymentProvider>> {
        if let Some(name) = &context.provider {
            if let Some(provider) = self.registry.get(name) {
                return Some(provider);
            }
            debug!("Requested provider {} is not registered", name);
        }

        let mut currency = context.currency.clone();
        let mut region = context.region;

        if let Some(tenant_id) = &context.tenant_id {
            if let Some(config) = self.tenant_config(tenant_id).await {
                currency = currency.or(config.currency);
                region = region.or(config.region);
            }
        }

        if let Some(scheme) = context.scheme {
            if let Some(provider) = self.registry.by_scheme(scheme) {
                return Some(provider);
            }
        }

        if let Some(currency) = &currency {
            if let Some(provider) = self.registry.by_currency(currency) {
                return Some(provider);
            }
        }

        if let Some(region) = region {
            if let Some(provider) = self.registry.by_market(region.market()) {
                return Some(provider);
            }
        }

        self.registry.get(&self.default_provider)
    }

    async fn select_or_miss(
        &self,
        context: &SelectionContext,
        operation: &str,
    ) -> Option<Arc<dyn PaymentProvider>> {
        let selected = self.select_provider(context).await;
        match &selected {
            Some(provider) => debug!("{} routed to {}", operation, provider.name()),
            None => {
                warn!("No provider available for {}", operation);
                RAIL_SELECTION_MISSES.with_label_values(&[operation]).inc();
            }
        }
        selected
    }

    /// Validate an account on the selected rail
    pub async fn validate_account(
        &self,
        request: &AccountValidationRequest,
        tenant_id: Option<&str>,
    ) -> Result<AccountValidationResult> {
        let context = SelectionContext {
            provider: None,
            tenant_id: tenant_id.map(str::to_string),
            scheme: Some(request.bank_code_type),
            currency: request.currency.clone(),
            region: request.region,
        };

        let Some(provider) = self.select_or_miss(&context, "validate").await else {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::NoProviderAvailable,
                "No payment provider available for this request",
            ));
        };

        if !provider.is_supported(Operation::Validate) {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::UnsupportedOperation,
                format!("{} does not support {}", provider.name(), Operation::Validate),
            ));
        }

        let started = Instant::now();
        let result = provider.validate_account(request).await;
        observe(provider.name(), "validate", started, result.as_ref().map(|r| r.is_valid));
        result
    }

    /// Initiate a transfer on the rail serving the destination bank
    pub async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferResponse> {
        let context = SelectionContext {
            provider: None,
            tenant_id: request.tenant_id.clone(),
            scheme: classify_bank_code(&request.to_bank_code),
            currency: Some(request.currency.clone()),
            region: request.region,
        };

        let Some(provider) = self.select_or_miss(&context, "transfer").await else {
            return Ok(TransferResponse::failed(
                &request.reference,
                ErrorCode::NoProviderAvailable,
                "No payment provider available for this request",
            ));
        };

        info!(
            "Routing transfer {} ({} {}) to {}",
            request.reference,
            request.amount,
            request.currency,
            provider.name()
        );

        let started = Instant::now();
        let response = provider.initiate_transfer(request).await;
        observe(provider.name(), "transfer", started, response.as_ref().map(|r| r.success));
        response
    }

    /// Transfer status from the named rail, or from the default rail
    pub async fn get_transfer_status(
        &self,
        request: &TransferStatusRequest,
        provider_name: Option<&str>,
    ) -> Result<TransferStatusResponse> {
        let provider = match provider_name {
            Some(name) => self.registry.get(name),
            None => self.select_or_miss(&SelectionContext::new(), "status").await,
        };

        let Some(provider) = provider else {
            return Ok(TransferStatusResponse::failed(
                request,
                ErrorCode::NoProviderAvailable,
                "No payment provider available",
            ));
        };

        let started = Instant::now();
        let response = provider.get_transfer_status(request).await;
        observe(
            provider.name(),
            "status",
            started,
            response.as_ref().map(|r| r.error_code.is_none()),
        );
        response
    }

    /// Bank directory of the selected rail; empty when nothing matches
    pub async fn get_bank_list(
        &self,
        filter: &BankListFilter,
        tenant_id: Option<&str>,
    ) -> Result<Vec<BankInfo>> {
        let context = SelectionContext {
            tenant_id: tenant_id.map(str::to_string),
            currency: filter.currency.clone(),
            region: filter.region,
            ..Default::default()
        };

        match self.select_or_miss(&context, "banks").await {
            Some(provider) => provider.get_bank_list(Some(filter)).await,
            None => Ok(Vec::new()),
        }
    }

    /// Transfer limits of the rail serving `currency`
    pub async fn get_transfer_limits(
        &self,
        currency: &str,
        tenant_id: Option<&str>,
    ) -> Result<TransferLimits> {
        let context = SelectionContext {
            tenant_id: tenant_id.map(str::to_string),
            currency: Some(currency.to_string()),
            ..Default::default()
        };

        let provider = self
            .select_or_miss(&context, "limits")
            .await
            .ok_or(Error::NoProviderAvailable)?;
        provider.get_transfer_limits(currency).await
    }

    /// Fee charged by the rail serving `currency`
    pub async fn calculate_fee(
        &self,
        amount: Decimal,
        currency: &str,
        class: TransferClass,
        tenant_id: Option<&str>,
    ) -> Result<Decimal> {
        let context = SelectionContext {
            tenant_id: tenant_id.map(str::to_string),
            currency: Some(currency.to_string()),
            ..Default::default()
        };

        let provider = self
            .select_or_miss(&context, "fee")
            .await
            .ok_or(Error::NoProviderAvailable)?;
        provider.calculate_fee(amount, currency, class).await
    }

    /// Providers supporting the tenant's currency; empty for unknown tenants
    pub async fn available_providers(&self, tenant_id: &str) -> Vec<Arc<dyn PaymentProvider>> {
        let Some(currency) = self
            .tenant_config(tenant_id)
            .await
            .and_then(|config| config.currency)
        else {
            return Vec::new();
        };

        self.registry
            .all()
            .iter()
            .filter(|p| p.capabilities().supports_currency(&currency))
            .cloned()
            .collect()
    }

    /// Capabilities of a registered provider
    pub fn provider_capabilities(&self, name: &str) -> Option<ProviderCapabilities> {
        self.registry.get(name).map(|p| p.capabilities().clone())
    }
}

fn observe(
    provider: &str,
    operation: &str,
    started: Instant,
    result: std::result::Result<bool, &Error>,
) {
    let outcome = match result {
        Ok(success) => metrics::outcome(success),
        Err(_) => "error",
    };
    metrics::record_request(provider, operation, outcome, started.elapsed().as_secs_f64());
}

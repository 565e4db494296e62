//! Gateway integration tests
//!
//! Runs the four sandboxed rails behind the gateway:
//! - Selection precedence (name, tenant, scheme, currency, region, default)
//! - Domestic flow: validate → transfer → status
//! - Structured failures for unsupported and unroutable requests

use async_trait::async_trait;
use payment_rails::{
    providers::{AchProvider, InteracProvider, NibssProvider, SepaProvider},
    transport::SandboxTransport,
    classify_bank_code, AccountValidationRequest, BankCodeType, BankListFilter, ErrorCode, GatewayConfig,
    InMemoryTenantStore, Market, PaymentGateway, PaymentProvider, ProviderCapabilities,
    ProviderConfig, ProviderRegistry, Region, Result, SelectionContext, TenantPaymentConfig,
    TransferClass, TransferRequest, TransferStatus, TransferStatusRequest,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

struct TestEnvironment {
    gateway: PaymentGateway,
    nibss: Arc<SandboxTransport>,
    ach: Arc<SandboxTransport>,
}

impl TestEnvironment {
    async fn new() -> Self {
        Self::with_tenants(InMemoryTenantStore::new()).await
    }

    async fn with_tenants(tenants: InMemoryTenantStore) -> Self {
        let nibss = Arc::new(
            SandboxTransport::new("nibss").with_account_name("0123456789", "ADA OBI"),
        );
        let ach = Arc::new(SandboxTransport::new("ach"));

        let providers: Vec<Arc<dyn PaymentProvider>> = vec![
            Arc::new(NibssProvider::with_transport(nibss.clone())),
            Arc::new(AchProvider::with_transport(ach.clone())),
            Arc::new(SepaProvider::with_transport(Arc::new(SandboxTransport::new("sepa")))),
            Arc::new(InteracProvider::with_transport(Arc::new(SandboxTransport::new("interac")))),
        ];

        let mut registry = ProviderRegistry::new();
        for provider in providers {
            provider.initialize(ProviderConfig::new()).await.unwrap();
            registry.register(provider);
        }

        Self {
            gateway: PaymentGateway::new(Arc::new(registry), Arc::new(tenants)),
            nibss,
            ach,
        }
    }

    async fn selected(&self, context: SelectionContext) -> Option<String> {
        self.gateway
            .select_provider(&context)
            .await
            .map(|p| p.name().to_string())
    }
}

fn domestic_transfer() -> TransferRequest {
    TransferRequest {
        from_account_number: "1111111111".to_string(),
        from_account_name: "Tunde Bakare".to_string(),
        from_bank_code: Some("044".to_string()),
        to_account_number: "0123456789".to_string(),
        to_account_name: Some("ADA OBI".to_string()),
        to_bank_code: "058".to_string(),
        amount: dec!(5000),
        currency: "NGN".to_string(),
        narration: "School fees second term".to_string(),
        reference: "E2E-0001".to_string(),
        tenant_id: Some("tenant-ng".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_selection_precedence() {
    let env = TestEnvironment::new().await;

    // Scheme beats currency
    let context = SelectionContext::new()
        .scheme(BankCodeType::Routing)
        .currency("EUR");
    assert_eq!(env.selected(context).await.as_deref(), Some("ACH"));

    // Currency beats region
    let context = SelectionContext::new()
        .currency("CAD")
        .region(Region::EuropeWest);
    assert_eq!(env.selected(context).await.as_deref(), Some("Interac"));

    // Region maps through the market table
    let context = SelectionContext::new().region(Region::NorthAmericaCentral);
    assert_eq!(env.selected(context).await.as_deref(), Some("Interac"));
    let context = SelectionContext::new().region(Region::AfricaSouth);
    assert_eq!(env.selected(context).await.as_deref(), Some("NIBSS"));

    // BIC scheme has no built-in rail, so currency decides
    let context = SelectionContext::new()
        .scheme(BankCodeType::Swift)
        .currency("EUR");
    assert_eq!(env.selected(context).await.as_deref(), Some("SEPA"));

    // No hints at all: default rail
    assert_eq!(
        env.selected(SelectionContext::new()).await.as_deref(),
        Some("NIBSS")
    );
}

#[tokio::test]
async fn test_tenant_preferences_fill_missing_hints() {
    let tenants = InMemoryTenantStore::new()
        .with_tenant(TenantPaymentConfig {
            tenant_id: "tenant-eu".to_string(),
            tenant_name: "Euro Co-op".to_string(),
            currency: Some("EUR".to_string()),
            region: Some(Region::EuropeCentral),
        })
        .with_tenant(TenantPaymentConfig {
            tenant_id: "tenant-ca".to_string(),
            tenant_name: "Maple Credit Union".to_string(),
            currency: None,
            region: Some(Region::NorthAmericaCentral),
        });
    let env = TestEnvironment::with_tenants(tenants).await;

    let context = SelectionContext::new().tenant("tenant-eu");
    assert_eq!(env.selected(context).await.as_deref(), Some("SEPA"));

    // Request currency outranks the tenant's
    let context = SelectionContext::new().tenant("tenant-eu").currency("USD");
    assert_eq!(env.selected(context).await.as_deref(), Some("ACH"));

    let context = SelectionContext::new().tenant("tenant-ca");
    assert_eq!(env.selected(context).await.as_deref(), Some("Interac"));

    // Unknown tenant is not an error
    let context = SelectionContext::new().tenant("nobody");
    assert_eq!(env.selected(context).await.as_deref(), Some("NIBSS"));

    let available = env.gateway.available_providers("tenant-eu").await;
    let names: Vec<_> = available.iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["SEPA"]);
    assert!(env.gateway.available_providers("tenant-ca").await.is_empty());
}

#[tokio::test]
async fn test_domestic_flow_end_to_end() {
    let env = TestEnvironment::new().await;

    let validation = env
        .gateway
        .validate_account(
            &AccountValidationRequest::new("0123456789", "058", BankCodeType::Nibss),
            None,
        )
        .await
        .unwrap();
    assert!(validation.is_valid);
    assert_eq!(validation.account_name.as_deref(), Some("ADA OBI"));

    let fee = env
        .gateway
        .calculate_fee(dec!(5000), "NGN", TransferClass::External, None)
        .await
        .unwrap();
    assert_eq!(fee, dec!(10.75));

    let response = env.gateway.initiate_transfer(&domestic_transfer()).await.unwrap();
    assert!(response.success);
    assert_eq!(response.status, TransferStatus::Completed);
    assert_eq!(response.transaction_reference, "E2E-0001");
    assert_eq!(response.total_amount, Some(dec!(5010.75)));

    let status = env
        .gateway
        .get_transfer_status(
            &TransferStatusRequest {
                transaction_reference: "E2E-0001".to_string(),
                provider_reference: response.provider_reference.clone(),
            },
            Some("nibss"),
        )
        .await
        .unwrap();
    assert_eq!(status.status, TransferStatus::Completed);
    assert_eq!(status.amount, Some(dec!(5000)));

    // One enquiry, one submission, one status query, nothing on the other rails
    assert_eq!(env.nibss.calls(), 3);
    assert_eq!(env.ach.calls(), 0);
}

#[tokio::test]
async fn test_transfer_routes_by_destination_bank_code() {
    let env = TestEnvironment::new().await;

    let request = TransferRequest {
        from_account_number: "000123456789".to_string(),
        from_account_name: "Jane Doe".to_string(),
        to_account_number: "987654321".to_string(),
        to_bank_code: "121000248".to_string(),
        amount: dec!(75),
        currency: "USD".to_string(),
        narration: "Rent".to_string(),
        reference: "US-1".to_string(),
        ..Default::default()
    };

    let response = env.gateway.initiate_transfer(&request).await.unwrap();
    assert_eq!(response.status, TransferStatus::Processing);
    assert_eq!(env.ach.calls(), 1);
    assert_eq!(env.nibss.calls(), 0);
}

#[tokio::test]
async fn test_interac_directory_code_routes_to_interac() {
    let env = TestEnvironment::new().await;

    let interac = env.gateway.registry().get("interac").unwrap();
    let banks = interac.get_bank_list(None).await.unwrap();
    let rbc = banks.iter().find(|b| b.bank_name.contains("RBC")).unwrap();

    let request = TransferRequest {
        from_account_number: "004-12345-7654321".to_string(),
        from_account_name: "Sam Roy".to_string(),
        to_account_number: "003-00002-1234567".to_string(),
        to_account_name: Some("Jean Tremblay".to_string()),
        to_bank_code: rbc.bank_code.clone(),
        amount: dec!(80),
        currency: "CAD".to_string(),
        narration: "Groceries".to_string(),
        reference: "CA-DIR-1".to_string(),
        ..Default::default()
    };

    let response = env.gateway.initiate_transfer(&request).await.unwrap();
    assert!(response.success, "{:?}", response.message);
    assert!(response
        .provider_reference
        .unwrap()
        .starts_with("INTERAC-"));
    assert_eq!(env.nibss.calls(), 0);
}

#[tokio::test]
async fn test_directory_codes_classify_as_tagged() {
    let env = TestEnvironment::new().await;

    for provider in env.gateway.registry().all() {
        for bank in provider.get_bank_list(None).await.unwrap() {
            assert_eq!(
                classify_bank_code(&bank.bank_code),
                Some(bank.bank_code_type),
                "{} {}",
                provider.name(),
                bank.bank_code
            );

            let context = SelectionContext::new()
                .scheme(bank.bank_code_type)
                .currency(bank.currency.clone());
            assert_eq!(env.selected(context).await.as_deref(), Some(provider.name()));
        }
    }
}

#[tokio::test]
async fn test_us_validation_reaches_verification_service() {
    let env = TestEnvironment::new().await;

    let result = env
        .gateway
        .validate_account(
            &AccountValidationRequest::new("123456789", "021000021", BankCodeType::Routing),
            None,
        )
        .await
        .unwrap();
    assert!(result.is_valid);
    assert_eq!(
        result.account_name.as_deref(),
        Some(SandboxTransport::DEFAULT_ACCOUNT_NAME)
    );
    assert_eq!(env.ach.calls(), 1);
}

#[tokio::test]
async fn test_scheme_routing_wins_over_currency_mismatch() {
    let env = TestEnvironment::new().await;

    // NIBSS bank code with a USD amount goes to NIBSS, which rejects the currency
    let mut request = domestic_transfer();
    request.currency = "USD".to_string();
    request.tenant_id = None;

    let response = env.gateway.initiate_transfer(&request).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.error_code, Some(ErrorCode::InvalidCurrency));
    assert_eq!(env.nibss.calls(), 0);
}

struct StatusOnlyProvider {
    capabilities: ProviderCapabilities,
}

#[async_trait]
impl PaymentProvider for StatusOnlyProvider {
    fn name(&self) -> &str {
        "faster-payments"
    }

    fn market(&self) -> Market {
        Market::Europe
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn is_initialized(&self) -> bool {
        true
    }

    async fn initialize(&self, _config: ProviderConfig) -> Result<()> {
        Ok(())
    }

    async fn validate_account(
        &self,
        _request: &AccountValidationRequest,
    ) -> Result<payment_rails::AccountValidationResult> {
        unreachable!("validation is not offered")
    }

    async fn initiate_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<payment_rails::TransferResponse> {
        Ok(payment_rails::TransferResponse::failed(
            &request.reference,
            ErrorCode::RailRejected,
            "test rail",
        ))
    }

    async fn get_transfer_status(
        &self,
        request: &TransferStatusRequest,
    ) -> Result<payment_rails::TransferStatusResponse> {
        Ok(payment_rails::TransferStatusResponse::failed(
            request,
            ErrorCode::RailRejected,
            "test rail",
        ))
    }

    async fn get_bank_list(
        &self,
        _filter: Option<&BankListFilter>,
    ) -> Result<Vec<payment_rails::BankInfo>> {
        Ok(Vec::new())
    }

    async fn get_transfer_limits(&self, currency: &str) -> Result<payment_rails::TransferLimits> {
        self.ensure_currency(currency)?;
        Err(payment_rails::Error::UnsupportedOperation {
            provider: self.name().to_string(),
            operation: "limits".to_string(),
        })
    }

    async fn calculate_fee(
        &self,
        _amount: Decimal,
        _currency: &str,
        _class: TransferClass,
    ) -> Result<Decimal> {
        Ok(Decimal::ZERO)
    }
}

#[tokio::test]
async fn test_unsupported_validation_is_structured() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(StatusOnlyProvider {
        capabilities: ProviderCapabilities {
            supports_account_validation: false,
            supports_instant_transfer: true,
            supports_scheduled_transfer: false,
            supports_international_transfer: false,
            supported_currencies: vec!["GBP".to_string()],
            supported_countries: vec!["GB".to_string()],
            average_processing_time: "instant".to_string(),
        },
    }));
    let gateway = PaymentGateway::new(Arc::new(registry), Arc::new(InMemoryTenantStore::new()));

    let result = gateway
        .validate_account(
            &AccountValidationRequest::new("12345678", "200000", BankCodeType::SortCode),
            None,
        )
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.error_code, Some(ErrorCode::UnsupportedOperation));

    // Default rail is not registered and nothing else matches
    let result = gateway
        .validate_account(
            &AccountValidationRequest::new("0123456789", "058", BankCodeType::Nibss),
            None,
        )
        .await
        .unwrap();
    assert_eq!(result.error_code, Some(ErrorCode::NoProviderAvailable));

    let status = gateway
        .get_transfer_status(&TransferStatusRequest::default(), None)
        .await
        .unwrap();
    assert_eq!(status.error_code, Some(ErrorCode::NoProviderAvailable));
}

#[tokio::test]
async fn test_bank_list_and_limits_follow_currency() {
    let env = TestEnvironment::new().await;

    let filter = BankListFilter {
        currency: Some("EUR".to_string()),
        country: Some("DE".to_string()),
        region: None,
    };
    let banks = env.gateway.get_bank_list(&filter, None).await.unwrap();
    assert_eq!(banks.len(), 1);
    assert_eq!(banks[0].bank_code, "DEUTDEFF");

    let limits = env.gateway.get_transfer_limits("CAD", None).await.unwrap();
    assert_eq!(limits.daily_limit, dec!(10000));
    assert_eq!(limits.currency, "CAD");
}

#[tokio::test]
async fn test_bootstrapped_gateway_uses_sandbox_rails() {
    let registry = ProviderRegistry::bootstrap(&GatewayConfig::default())
        .await
        .unwrap();
    let gateway = PaymentGateway::new(Arc::new(registry), Arc::new(InMemoryTenantStore::new()));

    let response = gateway.initiate_transfer(&domestic_transfer()).await.unwrap();
    assert!(response.success);
    assert!(response
        .provider_reference
        .unwrap()
        .starts_with("NIBSS-"));
}

//! SEPA credit transfer provider (EUR)
//!
//! Accounts are IBANs checked locally (length, prefix, zone, mod-97) before the rail is
//! asked for the holder. Two settlement tiers share one rail:
//!
//! | Mode     | Trigger                   | Fee  | Status       | ETA                |
//! |----------|---------------------------|------|--------------|--------------------|
//! | standard | default                   | 0.20 | `Processing` | next business day  |
//! | instant  | `metadata.instant = true` | 1.50 | `Completed`  | +1 minute          |
//!
//! Same-institution transfers are free in both modes.

use super::{check_amount, filter_banks, network_failure, status_from_reply, strings,
    truncate_chars};
use crate::{
    config::{self, ProviderConfig},
    error::ErrorCode,
    guard::InitGuard,
    iban::{self, Iban},
    provider::PaymentProvider,
    transport::{self, AccountEnquiry, RailEndpoints, RailTransport, Settlement, StatusQuery,
        TransferSubmission, RESPONSE_OK},
    types::*,
    Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const NAME: &str = "SEPA";
const CURRENCY: &str = "EUR";
const NARRATION_LIMIT: usize = 140;
/// Metadata flag selecting SCT Inst
pub const INSTANT_FLAG: &str = "instant";

const ENDPOINTS: RailEndpoints = RailEndpoints {
    verify_account: "/sepa/v1/accounts/verify",
    submit_transfer: "/sepa/v1/credit-transfers",
    query_status: "/sepa/v1/credit-transfers/status",
};

const ZONE: &[&str] = &[
    "AT", "BE", "CY", "EE", "FI", "FR", "DE", "GR", "IE", "IT", "LV", "LT", "LU", "MT", "NL",
    "PT", "SK", "SI", "ES", "HR", "BG", "CZ", "DK", "HU", "PL", "RO", "SE", "IS", "LI", "NO",
    "CH", "GB", "MC", "SM", "VA",
];

// (BIC, name, country)
const BANKS: &[(&str, &str, &str)] = &[
    ("DEUTDEFF", "Deutsche Bank AG", "DE"),
    ("BNPAFRPP", "BNP Paribas", "FR"),
    ("BSCHESMM", "Banco Santander", "ES"),
    ("INGBNL2A", "ING Bank", "NL"),
    ("UBSWCHZH", "UBS Switzerland AG", "CH"),
    ("UNCRITMM", "UniCredit Bank", "IT"),
    ("BKAUATWW", "Bank Austria (UniCredit)", "AT"),
    ("GEBABEBB", "BNP Paribas Fortis", "BE"),
    ("AIBKIE2D", "Allied Irish Banks", "IE"),
    ("CGDIFRPP", "Caisse d'Epargne", "FR"),
];

/// Settlement tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SepaMode {
    /// SEPA Credit Transfer
    Standard,
    /// SEPA Instant Credit Transfer
    Instant,
}

impl SepaMode {
    /// Mode requested by a transfer
    pub fn of(request: &TransferRequest) -> Self {
        if request.flag(INSTANT_FLAG) {
            SepaMode::Instant
        } else {
            SepaMode::Standard
        }
    }

    fn service_level(&self) -> &'static str {
        match self {
            SepaMode::Standard => "SEPA",
            SepaMode::Instant => "INST",
        }
    }
}

/// First weekday strictly after `from`
pub fn next_business_day(from: DateTime<Utc>) -> DateTime<Utc> {
    let mut next = from + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}

struct SepaState {
    merchant_id: String,
    transport: Arc<dyn RailTransport>,
}

/// SEPA provider
pub struct SepaProvider {
    capabilities: ProviderCapabilities,
    transport_override: Option<Arc<dyn RailTransport>>,
    state: InitGuard<SepaState>,
}

impl SepaProvider {
    /// Create new provider
    pub fn new() -> Self {
        Self {
            capabilities: ProviderCapabilities {
                supports_account_validation: true,
                supports_instant_transfer: true,
                supports_scheduled_transfer: true,
                supports_international_transfer: false,
                supported_currencies: strings(&[CURRENCY]),
                supported_countries: strings(ZONE),
                average_processing_time: "1 business day".to_string(),
            },
            transport_override: None,
            state: InitGuard::new(NAME),
        }
    }

    /// Create provider bound to a specific transport
    pub fn with_transport(transport: Arc<dyn RailTransport>) -> Self {
        Self {
            transport_override: Some(transport),
            ..Self::new()
        }
    }

    /// Fee for a transfer class in a settlement mode
    pub fn fee_for(class: TransferClass, mode: SepaMode) -> Decimal {
        match (class, mode) {
            (TransferClass::Internal, _) => Decimal::ZERO,
            (_, SepaMode::Instant) => dec!(1.50),
            (_, SepaMode::Standard) => dec!(0.20),
        }
    }

    /// Fee lookup with an explicit mode; the trait method assumes standard settlement
    pub async fn calculate_fee_for_mode(
        &self,
        _amount: Decimal,
        currency: &str,
        class: TransferClass,
        mode: SepaMode,
    ) -> Result<Decimal> {
        self.state.get()?;
        self.ensure_currency(currency)?;
        Ok(Self::fee_for(class, mode))
    }

    fn limits() -> TransferLimits {
        TransferLimits {
            min_amount: dec!(0.01),
            max_amount: dec!(999_999),
            daily_limit: dec!(100_000),
            monthly_limit: dec!(1_000_000),
            currency: CURRENCY.to_string(),
        }
    }

    fn zone(&self) -> &[String] {
        &self.capabilities.supported_countries
    }

    fn bank_by_bic(bic: &str) -> Option<&'static str> {
        let bic = bic.trim().to_ascii_uppercase();
        // 11-character BICs share the 8-character institution prefix
        let institution = bic.get(..8).unwrap_or(&bic);
        BANKS
            .iter()
            .find(|(code, _, _)| *code == institution)
            .map(|(_, name, _)| *name)
    }

    fn bank_by_country(country: &str) -> &'static str {
        match country {
            "DE" => "Deutsche Bank",
            "FR" => "BNP Paribas",
            "ES" => "Banco Santander",
            "IT" => "UniCredit",
            "NL" => "ING Bank",
            "BE" => "BNP Paribas Fortis",
            "AT" => "Bank Austria",
            "IE" => "Allied Irish Banks",
            "PT" => "Banco BPI",
            "GR" => "National Bank of Greece",
            "CH" => "UBS",
            "LU" => "Banque et Caisse d'Epargne de l'Etat",
            _ => "European Bank",
        }
    }
}

impl Default for SepaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for SepaProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn market(&self) -> Market {
        Market::Europe
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    async fn initialize(&self, config: ProviderConfig) -> Result<()> {
        let merchant_id = config.get_or(config::MERCHANT_ID, "");
        let transport = match &self.transport_override {
            Some(transport) => transport.clone(),
            None => {
                let mut headers = vec![("X-Merchant-ID".to_string(), merchant_id.clone())];
                if let Some(api_key) = config.get(config::API_KEY) {
                    headers.push(("Authorization".to_string(), format!("Bearer {}", api_key)));
                }
                transport::connect(super::SEPA, &config, ENDPOINTS, headers)?
            }
        };

        self.state.init(SepaState {
            merchant_id,
            transport,
        })?;

        info!("{} provider initialized", NAME);
        Ok(())
    }

    async fn validate_account(
        &self,
        request: &AccountValidationRequest,
    ) -> Result<AccountValidationResult> {
        let state = self.state.get()?;

        if let Some(currency) = &request.currency {
            if self.ensure_currency(currency).is_err() {
                return Ok(AccountValidationResult::invalid(
                    ErrorCode::InvalidCurrency,
                    format!("{} only supports {} currency", NAME, CURRENCY),
                ));
            }
        }

        let iban = match Iban::parse(&request.account_number, self.zone()) {
            Ok(iban) => iban,
            Err(e) => return Ok(AccountValidationResult::invalid(e.code, e.message)),
        };

        let enquiry = AccountEnquiry {
            account_number: iban.as_str().to_string(),
            bank_code: request.bank_code.trim().to_ascii_uppercase(),
            payload: json!({
                "iban": iban.as_str(),
                "bic": request.bank_code.trim(),
            }),
            signature: None,
        };

        match state.transport.verify_account(&enquiry).await {
            Ok(reply) if reply.response_code == RESPONSE_OK => {
                let bank_name = reply
                    .bank_name
                    .or_else(|| Self::bank_by_bic(&request.bank_code).map(str::to_string))
                    .unwrap_or_else(|| Self::bank_by_country(iban.country()).to_string());

                Ok(AccountValidationResult {
                    is_valid: true,
                    account_name: reply.account_name,
                    account_number: Some(iban.formatted()),
                    bank_name: Some(bank_name),
                    error_code: None,
                    error_message: None,
                })
            }
            Ok(reply) => Ok(AccountValidationResult::invalid(
                ErrorCode::RailRejected,
                format!("IBAN verification failed (rail code {})", reply.response_code),
            )),
            Err(e) => {
                warn!("{} IBAN verification failed: {}", NAME, e);
                Ok(AccountValidationResult::invalid(
                    ErrorCode::ProviderNetworkError,
                    e.to_string(),
                ))
            }
        }
    }

    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferResponse> {
        let state = self.state.get()?;
        let reference = request.reference.as_str();

        if self.ensure_currency(&request.currency).is_err() {
            return Ok(TransferResponse::failed(
                reference,
                ErrorCode::InvalidCurrency,
                format!("{} only supports {} currency", NAME, CURRENCY),
            ));
        }

        if let Some(failed) = check_amount(reference, request.amount, &Self::limits()) {
            return Ok(failed);
        }

        let mode = SepaMode::of(request);
        let fee = Self::fee_for(request.transfer_class, mode);
        let now = Utc::now();

        let payload = json!({
            "merchantId": state.merchant_id,
            "debtorIban": iban::compact(&request.from_account_number),
            "debtorName": request.from_account_name,
            "debtorBic": request.from_bank_code,
            "creditorIban": iban::compact(&request.to_account_number),
            "creditorName": request.to_account_name,
            "creditorBic": request.to_bank_code,
            "amount": { "value": request.amount.round_dp(2).to_string(), "currency": CURRENCY },
            "remittanceInformation": truncate_chars(&request.narration, NARRATION_LIMIT),
            "endToEndId": reference,
            "instructionPriority": if mode == SepaMode::Instant { "HIGH" } else { "NORM" },
            "serviceLevel": mode.service_level(),
            "requestedExecutionDate": now.format("%Y-%m-%d").to_string(),
        });

        let submission = TransferSubmission {
            reference: reference.to_string(),
            amount: request.amount,
            currency: CURRENCY.to_string(),
            settlement: match mode {
                SepaMode::Instant => Settlement::Instant,
                SepaMode::Standard => Settlement::Deferred,
            },
            payload,
            signature: None,
        };

        info!(
            "{}: initiating {:?} transfer {} of {} {}",
            NAME, mode, reference, request.amount, CURRENCY
        );

        match state.transport.submit_transfer(&submission).await {
            Ok(reply) if reply.is_accepted() => {
                let (status, message, eta) = match mode {
                    SepaMode::Instant => (
                        TransferStatus::Completed,
                        "SEPA Instant transfer completed",
                        now + Duration::minutes(1),
                    ),
                    SepaMode::Standard => (
                        TransferStatus::Processing,
                        "SEPA transfer initiated. Processing time: 1 business day",
                        next_business_day(now),
                    ),
                };

                Ok(TransferResponse {
                    success: true,
                    transaction_reference: reference.to_string(),
                    provider_reference: reply.provider_reference,
                    status,
                    message: Some(message.to_string()),
                    error_code: None,
                    fee: Some(fee),
                    total_amount: Some(request.amount + fee),
                    estimated_completion_time: Some(eta),
                })
            }
            Ok(reply) => {
                warn!("{} transfer {} rejected with code {}", NAME, reference, reply.response_code);
                Ok(TransferResponse::failed(
                    reference,
                    ErrorCode::RailRejected,
                    reply
                        .description
                        .unwrap_or_else(|| format!("Transfer failed (rail code {})", reply.response_code)),
                ))
            }
            Err(e) => Ok(network_failure(NAME, reference, &e)),
        }
    }

    async fn get_transfer_status(
        &self,
        request: &TransferStatusRequest,
    ) -> Result<TransferStatusResponse> {
        let state = self.state.get()?;

        let query = StatusQuery {
            transaction_reference: request.transaction_reference.clone(),
            provider_reference: request.provider_reference.clone(),
        };

        match state.transport.query_status(&query).await {
            Ok(reply) => {
                let transfer_type = if reply.status == TransferStatus::Completed {
                    "SEPA Instant"
                } else {
                    "SEPA Credit Transfer"
                };
                let mut metadata = Metadata::new();
                metadata.insert("transferType".to_string(), json!(transfer_type));
                Ok(status_from_reply(request, reply, metadata))
            }
            Err(e) => Ok(TransferStatusResponse::failed(
                request,
                ErrorCode::ProviderNetworkError,
                e.to_string(),
            )),
        }
    }

    async fn get_bank_list(&self, filter: Option<&BankListFilter>) -> Result<Vec<BankInfo>> {
        self.state.get()?;
        if let Some(currency) = filter.and_then(|f| f.currency.as_deref()) {
            self.ensure_currency(currency)?;
        }

        let banks = BANKS
            .iter()
            .map(|(bic, name, country)| BankInfo {
                bank_code: bic.to_string(),
                bank_name: name.to_string(),
                bank_code_type: BankCodeType::Swift,
                country: country.to_string(),
                currency: CURRENCY.to_string(),
                swift_code: Some(bic.to_string()),
                active: true,
            })
            .collect();

        Ok(filter_banks(banks, filter))
    }

    async fn get_transfer_limits(&self, currency: &str) -> Result<TransferLimits> {
        self.state.get()?;
        self.ensure_currency(currency)?;
        Ok(Self::limits())
    }

    async fn calculate_fee(
        &self,
        amount: Decimal,
        currency: &str,
        class: TransferClass,
    ) -> Result<Decimal> {
        self.calculate_fee_for_mode(amount, currency, class, SepaMode::Standard)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SandboxTransport;
    use chrono::TimeZone;

    async fn provider() -> (SepaProvider, Arc<SandboxTransport>) {
        let sandbox = Arc::new(
            SandboxTransport::new("sepa").with_account_name("DE89370400440532013000", "Max Mustermann"),
        );
        let provider = SepaProvider::with_transport(sandbox.clone());
        provider.initialize(ProviderConfig::new()).await.unwrap();
        (provider, sandbox)
    }

    fn transfer(instant: bool) -> TransferRequest {
        let mut request = TransferRequest {
            from_account_number: "FR14 2004 1010 0505 0001 3M02 606".to_string(),
            from_account_name: "Marie Curie".to_string(),
            to_account_number: "DE89 3704 0044 0532 0130 00".to_string(),
            to_account_name: Some("Max Mustermann".to_string()),
            to_bank_code: "DEUTDEFF".to_string(),
            amount: dec!(120.00),
            currency: "EUR".to_string(),
            narration: "x".repeat(200),
            reference: "SEPA-REF-1".to_string(),
            ..Default::default()
        };
        if instant {
            request.metadata.insert(INSTANT_FLAG.to_string(), json!(true));
        }
        request
    }

    #[tokio::test]
    async fn test_validate_iban() {
        let (provider, _) = provider().await;

        let result = provider
            .validate_account(&AccountValidationRequest::new(
                "de89 3704 0044 0532 0130 00",
                "DEUTDEFF",
                BankCodeType::Swift,
            ))
            .await
            .unwrap();
        assert!(result.is_valid);
        assert_eq!(result.account_number.as_deref(), Some("DE89 3704 0044 0532 0130 00"));
        assert_eq!(result.account_name.as_deref(), Some("Max Mustermann"));
        assert_eq!(result.bank_name.as_deref(), Some("Deutsche Bank AG"));
    }

    #[tokio::test]
    async fn test_validate_iban_failures_skip_rail() {
        let (provider, sandbox) = provider().await;

        for (iban, code) in [
            ("DE8937040044", ErrorCode::InvalidIbanLength),
            ("US89370400440532013000", ErrorCode::UnsupportedCountry),
            ("DE88370400440532013000", ErrorCode::InvalidChecksum),
        ] {
            let result = provider
                .validate_account(&AccountValidationRequest::new(iban, "", BankCodeType::Swift))
                .await
                .unwrap();
            assert_eq!(result.error_code, Some(code), "{}", iban);
        }
        assert_eq!(sandbox.calls(), 0);
    }

    #[tokio::test]
    async fn test_bank_name_falls_back_to_country() {
        let (provider, _) = provider().await;
        let result = provider
            .validate_account(&AccountValidationRequest::new(
                "NL91ABNA0417164300",
                "ABNANL2A",
                BankCodeType::Swift,
            ))
            .await
            .unwrap();
        assert_eq!(result.bank_name.as_deref(), Some("ING Bank"));
    }

    #[tokio::test]
    async fn test_standard_transfer() {
        let (provider, _) = provider().await;
        let response = provider.initiate_transfer(&transfer(false)).await.unwrap();

        assert!(response.success);
        assert_eq!(response.status, TransferStatus::Processing);
        assert_eq!(response.fee, Some(dec!(0.20)));
        assert_eq!(response.total_amount, Some(dec!(120.20)));
    }

    #[tokio::test]
    async fn test_instant_transfer() {
        let (provider, _) = provider().await;
        let before = Utc::now();
        let response = provider.initiate_transfer(&transfer(true)).await.unwrap();

        assert_eq!(response.status, TransferStatus::Completed);
        assert_eq!(response.fee, Some(dec!(1.50)));
        let eta = response.estimated_completion_time.unwrap();
        assert!(eta <= Utc::now() + Duration::minutes(1));
        assert!(eta >= before + Duration::seconds(59));

        let status = provider
            .get_transfer_status(&TransferStatusRequest {
                transaction_reference: "SEPA-REF-1".to_string(),
                provider_reference: response.provider_reference,
            })
            .await
            .unwrap();
        assert_eq!(status.status, TransferStatus::Completed);
    }

    #[tokio::test]
    async fn test_fee_modes() {
        let (provider, _) = provider().await;
        assert_eq!(
            provider
                .calculate_fee(dec!(10), "EUR", TransferClass::External)
                .await
                .unwrap(),
            dec!(0.20)
        );
        assert_eq!(
            provider
                .calculate_fee_for_mode(dec!(10), "EUR", TransferClass::External, SepaMode::Instant)
                .await
                .unwrap(),
            dec!(1.50)
        );
        assert_eq!(
            provider
                .calculate_fee_for_mode(dec!(10), "EUR", TransferClass::Internal, SepaMode::Instant)
                .await
                .unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn test_bank_list_by_country() {
        let (provider, _) = provider().await;
        let filter = BankListFilter {
            country: Some("FR".to_string()),
            ..Default::default()
        };
        let banks = provider.get_bank_list(Some(&filter)).await.unwrap();
        let codes: Vec<_> = banks.iter().map(|b| b.bank_code.as_str()).collect();
        assert_eq!(codes, vec!["BNPAFRPP", "CGDIFRPP"]);

        assert_eq!(provider.get_bank_list(None).await.unwrap().len(), 10);

        let euro = BankListFilter {
            currency: Some("eur".to_string()),
            ..Default::default()
        };
        assert_eq!(provider.get_bank_list(Some(&euro)).await.unwrap().len(), 10);

        let sterling = BankListFilter {
            currency: Some("GBP".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            provider.get_bank_list(Some(&sterling)).await,
            Err(crate::Error::InvalidCurrency { .. })
        ));
    }

    #[test]
    fn test_next_business_day_skips_weekend() {
        // Friday
        let friday = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
        assert_eq!(next_business_day(friday).weekday(), Weekday::Mon);

        let tuesday = Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap();
        assert_eq!(next_business_day(tuesday).weekday(), Weekday::Wed);
    }
}

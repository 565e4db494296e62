//! US ACH provider
//!
//! Transfers are batched and settle in the next windows, so a successful submission is
//! always `Processing`. Account validation checks the format (9-digit ABA routing number,
//! 4 to 17 digit account) before asking the verification service for the holder name.

use super::{check_amount, filter_banks, is_digits, mask_account, network_failure,
    status_from_reply, strings, truncate_chars};
use crate::{
    config::{self, ProviderConfig},
    error::ErrorCode,
    guard::InitGuard,
    provider::PaymentProvider,
    transport::{self, AccountEnquiry, RailEndpoints, RailTransport, Settlement, StatusQuery,
        TransferSubmission, RESPONSE_OK},
    types::*,
    Result,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NAME: &str = "ACH";
const CURRENCY: &str = "USD";
const NARRATION_LIMIT: usize = 80;
const SETTLEMENT_DAYS: i64 = 3;
/// Prearranged payment and deposit
const ENTRY_CLASS: &str = "PPD";

const ENDPOINTS: RailEndpoints = RailEndpoints {
    verify_account: "/ach/accounts/verify",
    submit_transfer: "/ach/transfers",
    query_status: "/ach/transfers/status",
};

// (routing number, name, BIC)
const BANKS: &[(&str, &str, &str)] = &[
    ("021000021", "JPMorgan Chase", "CHASUS33"),
    ("026009593", "Bank of America", "BOFAUS3N"),
    ("121000248", "Wells Fargo", "WFBIUS6S"),
    ("021300077", "Citibank", "CITIUS33"),
    ("031201360", "TD Bank", "NRTHUS33"),
    ("063100277", "U.S. Bank", "USBKUS44"),
];

struct AchState {
    originator_id: String,
    transport: Arc<dyn RailTransport>,
}

/// ACH provider
pub struct AchProvider {
    capabilities: ProviderCapabilities,
    transport_override: Option<Arc<dyn RailTransport>>,
    state: InitGuard<AchState>,
}

impl AchProvider {
    /// Create new provider
    pub fn new() -> Self {
        Self {
            capabilities: ProviderCapabilities {
                supports_account_validation: true,
                supports_instant_transfer: false,
                supports_scheduled_transfer: true,
                supports_international_transfer: false,
                supported_currencies: strings(&[CURRENCY]),
                supported_countries: strings(&["US"]),
                average_processing_time: "1-3 business days".to_string(),
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

    /// Flat fee; same-institution transfers are free
    pub fn fee_for(class: TransferClass) -> Decimal {
        match class {
            TransferClass::Internal => Decimal::ZERO,
            TransferClass::External | TransferClass::International => dec!(0.75),
        }
    }

    fn limits() -> TransferLimits {
        TransferLimits {
            min_amount: dec!(1),
            max_amount: dec!(1_000_000),
            daily_limit: dec!(5_000_000),
            monthly_limit: dec!(20_000_000),
            currency: CURRENCY.to_string(),
        }
    }

    fn bank_name(routing_number: &str) -> Option<&'static str> {
        BANKS
            .iter()
            .find(|(code, _, _)| *code == routing_number)
            .map(|(_, name, _)| *name)
    }
}

impl Default for AchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for AchProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn market(&self) -> Market {
        Market::UnitedStates
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    async fn initialize(&self, config: ProviderConfig) -> Result<()> {
        let transport = match &self.transport_override {
            Some(transport) => transport.clone(),
            None => {
                let mut headers = Vec::new();
                if let Some(api_key) = config.get(config::API_KEY) {
                    headers.push(("Authorization".to_string(), format!("Bearer {}", api_key)));
                }
                transport::connect(super::ACH, &config, ENDPOINTS, headers)?
            }
        };

        self.state.init(AchState {
            originator_id: config.get_or(config::MERCHANT_ID, ""),
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

        let routing_number = request.bank_code.trim();
        if routing_number.len() != 9 || !is_digits(routing_number) {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::InvalidRoutingNumber,
                "Routing number must be 9 digits",
            ));
        }

        let account = request.account_number.trim();
        if !(4..=17).contains(&account.len()) || !is_digits(account) {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::InvalidAccountNumber,
                "Account number must be 4-17 digits",
            ));
        }

        debug!("{} verifying account {} at {}", NAME, mask_account(account), routing_number);

        let enquiry = AccountEnquiry {
            account_number: account.to_string(),
            bank_code: routing_number.to_string(),
            payload: json!({
                "originatorId": state.originator_id,
                "routingNumber": routing_number,
                "accountNumber": account,
            }),
            signature: None,
        };

        match state.transport.verify_account(&enquiry).await {
            Ok(reply) if reply.response_code == RESPONSE_OK => Ok(AccountValidationResult {
                is_valid: true,
                account_name: reply.account_name,
                account_number: Some(mask_account(account)),
                bank_name: Some(
                    reply
                        .bank_name
                        .or_else(|| Self::bank_name(routing_number).map(str::to_string))
                        .unwrap_or_else(|| "Unknown Bank".to_string()),
                ),
                error_code: None,
                error_message: None,
            }),
            Ok(reply) => Ok(AccountValidationResult::invalid(
                ErrorCode::RailRejected,
                format!("Account verification failed (rail code {})", reply.response_code),
            )),
            Err(e) => {
                warn!("{} account verification failed: {}", NAME, e);
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

        let fee = Self::fee_for(request.transfer_class);

        let payload = json!({
            "originatorId": state.originator_id,
            "secCode": ENTRY_CLASS,
            "sourceAccount": request.from_account_number,
            "sourceRouting": request.from_bank_code,
            "destinationAccount": request.to_account_number,
            "destinationRouting": request.to_bank_code,
            "receiverName": request.to_account_name,
            "amount": request.amount.to_string(),
            "currency": CURRENCY,
            "description": truncate_chars(&request.narration, NARRATION_LIMIT),
            "reference": reference,
        });

        let submission = TransferSubmission {
            reference: reference.to_string(),
            amount: request.amount,
            currency: CURRENCY.to_string(),
            settlement: Settlement::Deferred,
            payload,
            signature: None,
        };

        info!(
            "{}: queueing transfer {} of {} {} to {}",
            NAME, reference, request.amount, CURRENCY, request.to_bank_code
        );

        match state.transport.submit_transfer(&submission).await {
            Ok(reply) if reply.is_accepted() => Ok(TransferResponse {
                success: true,
                transaction_reference: reference.to_string(),
                provider_reference: reply.provider_reference,
                status: TransferStatus::Processing,
                message: Some("Transfer queued for the next ACH batch".to_string()),
                error_code: None,
                fee: Some(fee),
                total_amount: Some(request.amount + fee),
                estimated_completion_time: Some(Utc::now() + Duration::days(SETTLEMENT_DAYS)),
            }),
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
                let mut metadata = Metadata::new();
                metadata.insert("secCode".to_string(), json!(ENTRY_CLASS));
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
            .map(|(code, name, bic)| BankInfo {
                bank_code: code.to_string(),
                bank_name: name.to_string(),
                bank_code_type: BankCodeType::Routing,
                country: "US".to_string(),
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
        _amount: Decimal,
        currency: &str,
        class: TransferClass,
    ) -> Result<Decimal> {
        self.state.get()?;
        self.ensure_currency(currency)?;
        Ok(Self::fee_for(class))
    }
}

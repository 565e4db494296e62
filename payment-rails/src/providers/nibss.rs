//! Domestic instant-payment rail (NIBSS NIP)
//!
//! 3-digit institution codes, 10-digit account numbers, NGN only. Name enquiry is a
//! synchronous rail call and transfers settle inside the submit call, so there is no
//! pending state.

use super::{check_amount, filter_banks, is_digits, network_failure, status_from_reply, strings,
    truncate_chars};
use crate::{
    config::{self, ProviderConfig},
    error::ErrorCode,
    guard::InitGuard,
    provider::PaymentProvider,
    signing::{self, SignatureMethod},
    transport::{self, AccountEnquiry, RailEndpoints, RailTransport, Settlement, StatusQuery,
        TransferSubmission, RESPONSE_OK},
    types::*,
    Result,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const NAME: &str = "NIBSS";
const CURRENCY: &str = "NGN";
/// ISO 4217 numeric code the rail expects
const CURRENCY_NUMERIC: &str = "566";
const ACCOUNT_LENGTH: usize = 10;
const NARRATION_LIMIT: usize = 30;
const WEB_CHANNEL: &str = "6";

const ENDPOINTS: RailEndpoints = RailEndpoints {
    verify_account: "/nip/nameenquiry",
    submit_transfer: "/nip/fundsTransfer",
    query_status: "/nip/tsq",
};

// (code, name, BIC)
const BANKS: &[(&str, &str, &str)] = &[
    ("058", "Guaranty Trust Bank (GTBank)", "GTBINGLA"),
    ("033", "United Bank for Africa (UBA)", "UNAFNGLA"),
    ("011", "First Bank of Nigeria", "FBNINGLA"),
    ("044", "Access Bank", "ABNGNGLA"),
    ("057", "Zenith Bank", "ZEIBNGLA"),
    ("214", "First City Monument Bank (FCMB)", "FCMBNGLA"),
    ("035", "Wema Bank", "WEMANGLA"),
    ("232", "Sterling Bank", "NAMENGLA"),
];

struct NibssState {
    organization_code: String,
    secret_key: String,
    transport: Arc<dyn RailTransport>,
}

/// NIBSS Instant Payment provider
pub struct NibssProvider {
    capabilities: ProviderCapabilities,
    transport_override: Option<Arc<dyn RailTransport>>,
    state: InitGuard<NibssState>,
}

impl NibssProvider {
    /// Create new provider; the transport is chosen from config at `initialize`
    pub fn new() -> Self {
        Self {
            capabilities: ProviderCapabilities {
                supports_account_validation: true,
                supports_instant_transfer: true,
                supports_scheduled_transfer: false,
                supports_international_transfer: false,
                supported_currencies: strings(&[CURRENCY]),
                supported_countries: strings(&["NG"]),
                average_processing_time: "instant".to_string(),
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

    /// Fee band for `amount`: lower bound inclusive, each threshold exclusive above
    pub fn fee_for(amount: Decimal) -> Decimal {
        if amount <= dec!(5000) {
            dec!(10.75)
        } else if amount <= dec!(50000) {
            dec!(26.88)
        } else {
            dec!(53.75)
        }
    }

    fn limits() -> TransferLimits {
        TransferLimits {
            min_amount: dec!(100),
            max_amount: dec!(10_000_000),
            daily_limit: dec!(50_000_000),
            monthly_limit: dec!(200_000_000),
            currency: CURRENCY.to_string(),
        }
    }

    fn bank_name(code: &str) -> Option<&'static str> {
        BANKS
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, name, _)| *name)
    }
}

impl Default for NibssProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for NibssProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn market(&self) -> Market {
        Market::Nigeria
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    async fn initialize(&self, config: ProviderConfig) -> Result<()> {
        let organization_code = config.get_or(config::ORGANIZATION_CODE, "");
        let transport = match &self.transport_override {
            Some(transport) => transport.clone(),
            None => transport::connect(
                super::NIBSS,
                &config,
                ENDPOINTS,
                vec![("OrganizationCode".to_string(), organization_code.clone())],
            )?,
        };

        self.state.init(NibssState {
            organization_code,
            secret_key: config.get_or(config::SECRET_KEY, ""),
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

        let account = request.account_number.trim();
        if account.chars().count() != ACCOUNT_LENGTH {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::InvalidLength,
                "Nigerian account numbers must be 10 digits",
            ));
        }
        if !is_digits(account) {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::InvalidAccountFormat,
                "Nigerian account numbers must contain digits only",
            ));
        }

        let bank_code = request.bank_code.trim();
        if bank_code.len() != 3 || !is_digits(bank_code) {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::InvalidAccountFormat,
                "NIBSS institution codes must be 3 digits",
            ));
        }

        let payload = json!({
            "AccountNumber": account,
            "DestinationInstitutionCode": bank_code,
            "ChannelCode": WEB_CHANNEL,
        });
        let signature = signing::sign_json(SignatureMethod::HmacSha512, &state.secret_key, &payload)?;

        let enquiry = AccountEnquiry {
            account_number: account.to_string(),
            bank_code: bank_code.to_string(),
            payload,
            signature: Some(signature),
        };

        match state.transport.verify_account(&enquiry).await {
            Ok(reply) if reply.response_code == RESPONSE_OK => Ok(AccountValidationResult {
                is_valid: true,
                account_name: reply.account_name,
                account_number: Some(reply.account_number.unwrap_or_else(|| account.to_string())),
                bank_name: reply
                    .bank_name
                    .or_else(|| Self::bank_name(bank_code).map(str::to_string))
                    .or_else(|| Some("Unknown Bank".to_string())),
                error_code: None,
                error_message: None,
            }),
            Ok(reply) => {
                warn!("{} name enquiry rejected with code {}", NAME, reply.response_code);
                Ok(AccountValidationResult::invalid(
                    ErrorCode::RailRejected,
                    format!("Account validation failed (rail code {})", reply.response_code),
                ))
            }
            Err(e) => {
                warn!("{} name enquiry failed: {}", NAME, e);
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

        let fee = Self::fee_for(request.amount);
        let total_amount = request.amount + fee;

        let payload = json!({
            "FromAccount": request.from_account_number,
            "ToAccount": request.to_account_number,
            "Amount": request.amount.to_string(),
            "Currency": CURRENCY_NUMERIC,
            "DestinationInstitutionCode": request.to_bank_code,
            "OriginatorInstitutionCode": request
                .from_bank_code
                .clone()
                .unwrap_or_else(|| state.organization_code.clone()),
            "Narration": truncate_chars(&request.narration, NARRATION_LIMIT),
            "TransactionReference": reference,
            "BeneficiaryName": request.to_account_name,
            "OriginatorName": request.from_account_name,
            "ChannelCode": WEB_CHANNEL,
        });
        let signature = signing::sign_json(SignatureMethod::HmacSha512, &state.secret_key, &payload)?;

        let submission = TransferSubmission {
            reference: reference.to_string(),
            amount: request.amount,
            currency: CURRENCY.to_string(),
            settlement: Settlement::Instant,
            payload,
            signature: Some(signature),
        };

        info!(
            "{}: initiating transfer {} of {} {} to {}",
            NAME, reference, request.amount, CURRENCY, request.to_bank_code
        );

        match state.transport.submit_transfer(&submission).await {
            Ok(reply) if reply.is_accepted() => Ok(TransferResponse {
                success: true,
                transaction_reference: reference.to_string(),
                provider_reference: reply.provider_reference,
                status: TransferStatus::Completed,
                message: Some("Transfer successful".to_string()),
                error_code: None,
                fee: Some(fee),
                total_amount: Some(total_amount),
                estimated_completion_time: Some(Utc::now()),
            }),
            Ok(reply) => {
                warn!("{} transfer {} rejected with code {}", NAME, reference, reply.response_code);
                let mut failed = TransferResponse::failed(
                    reference,
                    ErrorCode::RailRejected,
                    reply
                        .description
                        .unwrap_or_else(|| format!("Transfer failed (rail code {})", reply.response_code)),
                );
                failed.provider_reference = reply.provider_reference;
                Ok(failed)
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
                metadata.insert(
                    "note".to_string(),
                    json!("NIBSS transfers are instant, status is final at submission"),
                );
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
                bank_code_type: BankCodeType::Nibss,
                country: "NG".to_string(),
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
        _class: TransferClass,
    ) -> Result<Decimal> {
        self.state.get()?;
        self.ensure_currency(currency)?;
        Ok(Self::fee_for(amount))
    }
}

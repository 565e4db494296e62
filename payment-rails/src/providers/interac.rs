//! Canadian Interac provider (CAD)

use super::{check_amount, filter_banks, mask_account, network_failure, status_from_reply,
    strings, truncate_chars};
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
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const NAME: &str = "Interac";
const CURRENCY: &str = "CAD";
const NARRATION_LIMIT: usize = 255;
const SETTLEMENT_SECONDS: i64 = 10;

const ENDPOINTS: RailEndpoints = RailEndpoints {
    verify_account: "/interac/v1/accounts/verify",
    submit_transfer: "/interac/v1/transfers",
    query_status: "/interac/v1/transfers/status",
};

// (institution number, main branch transit, name, short name, BIC)
const INSTITUTIONS: &[(&str, &str, &str, &str, &str)] = &[
    ("001", "00011", "Bank of Montreal (BMO)", "BMO", "BOFMCAM2"),
    ("002", "10000", "Bank of Nova Scotia (Scotiabank)", "Scotiabank", "NOSCCATT"),
    ("003", "00002", "Royal Bank of Canada (RBC)", "RBC", "ROYCCAT2"),
    ("004", "10202", "Toronto-Dominion Bank (TD)", "TD", "TDOMCATTTOR"),
    ("006", "00001", "National Bank of Canada", "National Bank", "BNDCCAMMINT"),
    ("010", "00002", "Canadian Imperial Bank of Commerce (CIBC)", "CIBC", "CIBCCATT"),
    ("016", "10001", "HSBC Bank Canada", "HSBC", "HKBCCATT"),
    ("039", "00011", "Laurentian Bank", "Laurentian Bank", "BLCMCAT1"),
    ("614", "00152", "Tangerine Bank", "Tangerine", "INSCCATTTOR"),
    ("623", "10001", "EQ Bank", "EQ Bank", "EQBKCATTTOR"),
];

/// Canadian account split into its three parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanadianAccount {
    /// 3-digit institution number
    pub institution: String,
    /// 5-digit branch transit number
    pub transit: String,
    /// 7 to 12 digit account number
    pub account: String,
}

impl CanadianAccount {
    /// Parse `003-12345-1234567`, `003 12345 1234567` or `003123451234567`.
    ///
    /// Returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let groups: Vec<&str> = raw
            .split(|c: char| c == '-' || c.is_whitespace())
            .filter(|g| !g.is_empty())
            .collect();

        let (institution, transit, account) = match groups.as_slice() {
            [institution, transit, account] => (*institution, *transit, *account),
            [concatenated] => {
                if !(15..=20).contains(&concatenated.len()) || !concatenated.is_ascii() {
                    return None;
                }
                (&concatenated[..3], &concatenated[3..8], &concatenated[8..])
            }
            _ => return None,
        };

        let all_digits = [institution, transit, account]
            .iter()
            .all(|part| part.bytes().all(|b| b.is_ascii_digit()));
        if !all_digits
            || institution.len() != 3
            || transit.len() != 5
            || !(7..=12).contains(&account.len())
        {
            return None;
        }

        Some(Self {
            institution: institution.to_string(),
            transit: transit.to_string(),
            account: account.to_string(),
        })
    }
}

impl fmt::Display for CanadianAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.institution, self.transit, self.account)
    }
}

struct InteracState {
    partner_id: String,
    secret_key: String,
    transport: Arc<dyn RailTransport>,
}

/// Interac e-Transfer provider
pub struct InteracProvider {
    capabilities: ProviderCapabilities,
    transport_override: Option<Arc<dyn RailTransport>>,
    state: InitGuard<InteracState>,
}

impl InteracProvider {
    /// Create new provider
    pub fn new() -> Self {
        Self {
            capabilities: ProviderCapabilities {
                supports_account_validation: true,
                supports_instant_transfer: true,
                supports_scheduled_transfer: false,
                supports_international_transfer: false,
                supported_currencies: strings(&[CURRENCY]),
                supported_countries: strings(&["CA"]),
                average_processing_time: "near-instant (under 30 seconds)".to_string(),
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
            _ => dec!(1.50),
        }
    }

    fn limits() -> TransferLimits {
        TransferLimits {
            min_amount: dec!(0.01),
            max_amount: dec!(25_000),
            daily_limit: dec!(10_000),
            monthly_limit: dec!(100_000),
            currency: CURRENCY.to_string(),
        }
    }

    fn institution_name(institution: &str) -> Option<&'static str> {
        INSTITUTIONS
            .iter()
            .find(|(number, _, _, _, _)| *number == institution)
            .map(|(_, _, _, short, _)| *short)
    }
}

impl Default for InteracProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for InteracProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn market(&self) -> Market {
        Market::Canada
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    async fn initialize(&self, config: ProviderConfig) -> Result<()> {
        let partner_id = config.get_or(config::PARTNER_ID, "");
        let transport = match &self.transport_override {
            Some(transport) => transport.clone(),
            None => {
                let mut headers = vec![("X-Partner-ID".to_string(), partner_id.clone())];
                if let Some(access_code) = config.get(config::API_KEY) {
                    headers.push(("X-Access-Code".to_string(), access_code.to_string()));
                }
                transport::connect(super::INTERAC, &config, ENDPOINTS, headers)?
            }
        };

        self.state.init(InteracState {
            partner_id,
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

        let Some(account) = CanadianAccount::parse(&request.account_number) else {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::InvalidFormat,
                "Invalid Canadian account format. Expected: Institution(3)-Transit(5)-Account(7-12)",
            ));
        };

        let Some(bank_name) = Self::institution_name(&account.institution) else {
            return Ok(AccountValidationResult::invalid(
                ErrorCode::UnknownInstitution,
                format!("Unsupported institution number {}", account.institution),
            ));
        };

        let enquiry = AccountEnquiry {
            account_number: account.account.clone(),
            bank_code: format!("{}{}", account.institution, account.transit),
            payload: json!({
                "partnerId": state.partner_id,
                "institutionNumber": account.institution,
                "transitNumber": account.transit,
                "accountNumber": account.account,
            }),
            signature: None,
        };

        match state.transport.verify_account(&enquiry).await {
            Ok(reply) if reply.response_code == RESPONSE_OK => Ok(AccountValidationResult {
                is_valid: true,
                account_name: reply.account_name,
                account_number: Some(mask_account(&account.account)),
                bank_name: Some(bank_name.to_string()),
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

        let limits = Self::limits();
        if let Some(failed) = check_amount(reference, request.amount, &limits) {
            return Ok(failed);
        }
        if request.amount > limits.daily_limit {
            return Ok(TransferResponse::failed(
                reference,
                ErrorCode::LimitExceeded,
                format!(
                    "Amount exceeds {} daily limit of {} {}",
                    NAME, limits.daily_limit, CURRENCY
                ),
            ));
        }

        let (Some(from), Some(to)) = (
            CanadianAccount::parse(&request.from_account_number),
            CanadianAccount::parse(&request.to_account_number),
        ) else {
            return Ok(TransferResponse::failed(
                reference,
                ErrorCode::InvalidAccountFormat,
                "Invalid Canadian account format",
            ));
        };

        let fee = Self::fee_for(request.transfer_class);

        let payload = json!({
            "sender": {
                "name": request.from_account_name,
                "institutionNumber": from.institution,
                "transitNumber": from.transit,
                "accountNumber": from.account,
            },
            "recipient": {
                "name": request.to_account_name,
                "email": request.metadata.get("email").and_then(|v| v.as_str()).unwrap_or_default(),
                "institutionNumber": to.institution,
                "transitNumber": to.transit,
                "accountNumber": to.account,
            },
            "amount": { "value": request.amount.round_dp(2).to_string(), "currency": CURRENCY },
            "message": truncate_chars(&request.narration, NARRATION_LIMIT),
            "referenceNumber": reference,
            "securityQuestion": request.metadata.get("securityQuestion"),
            "securityAnswer": request.metadata.get("securityAnswer"),
        });
        let signature = signing::sign_json(SignatureMethod::HmacSha256, &state.secret_key, &payload)?;

        let submission = TransferSubmission {
            reference: reference.to_string(),
            amount: request.amount,
            currency: CURRENCY.to_string(),
            // Completes once the recipient deposits; confirmed through status lookups
            settlement: Settlement::Deferred,
            payload,
            signature: Some(signature),
        };

        info!(
            "{}: initiating transfer {} of {} {} to institution {}",
            NAME, reference, request.amount, CURRENCY, to.institution
        );

        match state.transport.submit_transfer(&submission).await {
            Ok(reply) if reply.is_accepted() => Ok(TransferResponse {
                success: true,
                transaction_reference: reference.to_string(),
                provider_reference: reply.provider_reference,
                status: TransferStatus::Processing,
                message: Some("Interac e-Transfer initiated".to_string()),
                error_code: None,
                fee: Some(fee),
                total_amount: Some(request.amount + fee),
                estimated_completion_time: Some(Utc::now() + Duration::seconds(SETTLEMENT_SECONDS)),
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
                metadata.insert("transferType".to_string(), json!("Interac e-Transfer"));
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

        // Institution + transit, the 8-digit form the classifier reads as `Transit`
        let banks = INSTITUTIONS
            .iter()
            .map(|(number, transit, name, _, bic)| BankInfo {
                bank_code: format!("{}{}", number, transit),
                bank_name: name.to_string(),
                bank_code_type: BankCodeType::Transit,
                country: "CA".to_string(),
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

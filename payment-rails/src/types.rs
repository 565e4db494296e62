//! Shared types for payment rails

use crate::error::ErrorCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Free-form request/response metadata
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Bank identifier scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankCodeType {
    /// 3-digit domestic instant-payment code
    Nibss,
    /// 9-digit US routing number
    Routing,
    /// 8-digit Canadian institution + transit
    Transit,
    /// 8 or 11 character BIC
    Swift,
    /// 6-digit UK sort code
    SortCode,
}

impl BankCodeType {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            BankCodeType::Nibss => "NIBSS",
            BankCodeType::Routing => "ROUTING",
            BankCodeType::Transit => "TRANSIT",
            BankCodeType::Swift => "SWIFT",
            BankCodeType::SortCode => "SORT_CODE",
        }
    }
}

impl fmt::Display for BankCodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BankCodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NIBSS" => Ok(BankCodeType::Nibss),
            "ROUTING" => Ok(BankCodeType::Routing),
            "TRANSIT" => Ok(BankCodeType::Transit),
            "SWIFT" | "BIC" => Ok(BankCodeType::Swift),
            "SORT_CODE" => Ok(BankCodeType::SortCode),
            other => Err(format!("unknown bank code type: {}", other)),
        }
    }
}

/// Market served by a rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Market {
    /// Nigeria
    Nigeria,
    /// United States
    UnitedStates,
    /// SEPA zone
    Europe,
    /// Canada
    Canada,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Nigeria => write!(f, "Nigeria"),
            Market::UnitedStates => write!(f, "USA"),
            Market::Europe => write!(f, "Europe"),
            Market::Canada => write!(f, "Canada"),
        }
    }
}

/// Caller-facing region
///
/// Sub-regions come from tenant configuration; the market names are accepted too so a
/// caller can address a rail's home market directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    /// West Africa
    AfricaWest,
    /// East Africa
    AfricaEast,
    /// Southern Africa
    AfricaSouth,
    /// North America, east
    NorthAmericaEast,
    /// North America, west
    NorthAmericaWest,
    /// North America, central (Canada)
    NorthAmericaCentral,
    /// Western Europe
    EuropeWest,
    /// Central Europe
    EuropeCentral,
    /// Eastern Europe
    EuropeEast,
    /// Nigeria
    Nigeria,
    /// United States
    #[serde(alias = "usa")]
    UnitedStates,
    /// Europe
    Europe,
    /// Canada
    Canada,
}

impl Region {
    /// Fixed region → rail market table
    pub fn market(&self) -> Market {
        match self {
            Region::AfricaWest | Region::AfricaEast | Region::AfricaSouth | Region::Nigeria => {
                Market::Nigeria
            }
            Region::NorthAmericaEast | Region::NorthAmericaWest | Region::UnitedStates => {
                Market::UnitedStates
            }
            Region::NorthAmericaCentral | Region::Canada => Market::Canada,
            Region::EuropeWest | Region::EuropeCentral | Region::EuropeEast | Region::Europe => {
                Market::Europe
            }
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "africa-west" => Ok(Region::AfricaWest),
            "africa-east" => Ok(Region::AfricaEast),
            "africa-south" => Ok(Region::AfricaSouth),
            "north-america-east" => Ok(Region::NorthAmericaEast),
            "north-america-west" => Ok(Region::NorthAmericaWest),
            "north-america-central" => Ok(Region::NorthAmericaCentral),
            "europe-west" => Ok(Region::EuropeWest),
            "europe-central" => Ok(Region::EuropeCentral),
            "europe-east" => Ok(Region::EuropeEast),
            "nigeria" => Ok(Region::Nigeria),
            "usa" | "united-states" => Ok(Region::UnitedStates),
            "europe" => Ok(Region::Europe),
            "canada" => Ok(Region::Canada),
            other => Err(format!("unknown region: {}", other)),
        }
    }
}

/// Transfer class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferClass {
    /// Same institution
    Internal,
    /// Interbank, same rail
    #[default]
    External,
    /// Cross-border
    International,
}

/// Transfer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Accepted, not yet picked up
    Pending,
    /// In a settlement window
    Processing,
    /// Settled
    Completed,
    /// Failed
    Failed,
    /// Returned after settlement (status lookups only)
    Reversed,
}

/// Operations a provider may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Account validation / name enquiry
    Validate,
    /// Transfer initiation
    Transfer,
    /// Status lookup
    Status,
    /// Bank directory
    Banks,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Validate => write!(f, "account validation"),
            Operation::Transfer => write!(f, "transfer"),
            Operation::Status => write!(f, "status lookup"),
            Operation::Banks => write!(f, "bank list"),
        }
    }
}

/// Account validation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountValidationRequest {
    /// Account number (or IBAN / Canadian composite)
    pub account_number: String,
    /// Bank identifier
    pub bank_code: String,
    /// Identifier scheme of `bank_code`
    pub bank_code_type: BankCodeType,
    /// Currency hint
    pub currency: Option<String>,
    /// Region hint
    pub region: Option<Region>,
}

impl AccountValidationRequest {
    /// Create request
    pub fn new(
        account_number: impl Into<String>,
        bank_code: impl Into<String>,
        bank_code_type: BankCodeType,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            bank_code: bank_code.into(),
            bank_code_type,
            currency: None,
            region: None,
        }
    }

    /// Attach a currency hint
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Attach a region hint
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

/// Account validation result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountValidationResult {
    /// Valid flag
    pub is_valid: bool,
    /// Resolved account holder
    pub account_name: Option<String>,
    /// Normalised account number
    pub account_number: Option<String>,
    /// Resolved bank name
    pub bank_name: Option<String>,
    /// Error code
    pub error_code: Option<ErrorCode>,
    /// Human-readable message
    pub error_message: Option<String>,
}

impl AccountValidationResult {
    /// Failed validation
    pub fn invalid(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_code: Some(code),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Transfer request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Source account
    pub from_account_number: String,
    /// Source account holder
    pub from_account_name: String,
    /// Source bank identifier
    pub from_bank_code: Option<String>,
    /// Destination account
    pub to_account_number: String,
    /// Destination account holder
    pub to_account_name: Option<String>,
    /// Destination bank identifier
    pub to_bank_code: String,
    /// Destination bank name
    pub to_bank_name: Option<String>,
    /// Amount (positive)
    pub amount: Decimal,
    /// ISO 4217 currency
    pub currency: String,
    /// Narration, truncated per rail
    pub narration: String,
    /// Caller-supplied idempotent reference
    pub reference: String,
    /// Transfer class
    pub transfer_class: TransferClass,
    /// Region hint
    pub region: Option<Region>,
    /// User
    pub user_id: Option<String>,
    /// Tenant
    pub tenant_id: Option<String>,
    /// Provider-specific extras
    #[serde(default)]
    pub metadata: Metadata,
}

impl TransferRequest {
    /// Boolean metadata flag, false when absent
    pub fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Transfer response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    /// Success flag
    pub success: bool,
    /// Echoed caller reference
    pub transaction_reference: String,
    /// Rail-assigned reference
    pub provider_reference: Option<String>,
    /// Status
    pub status: TransferStatus,
    /// Human message
    pub message: Option<String>,
    /// Error code
    pub error_code: Option<ErrorCode>,
    /// Fee
    pub fee: Option<Decimal>,
    /// Amount + fee
    pub total_amount: Option<Decimal>,
    /// Estimated completion
    pub estimated_completion_time: Option<DateTime<Utc>>,
}

impl TransferResponse {
    /// Failed response
    pub fn failed(reference: &str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_reference: reference.to_string(),
            provider_reference: None,
            status: TransferStatus::Failed,
            message: Some(message.into()),
            error_code: Some(code),
            fee: None,
            total_amount: None,
            estimated_completion_time: None,
        }
    }
}

/// Transfer status request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatusRequest {
    /// Caller reference
    pub transaction_reference: String,
    /// Rail reference
    pub provider_reference: Option<String>,
}

/// Transfer status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatusResponse {
    /// Caller reference
    pub transaction_reference: String,
    /// Rail reference
    pub provider_reference: Option<String>,
    /// Status
    pub status: TransferStatus,
    /// Amount
    pub amount: Option<Decimal>,
    /// Currency
    pub currency: Option<String>,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason
    pub failure_reason: Option<String>,
    /// Error code when the lookup itself failed
    pub error_code: Option<ErrorCode>,
    /// Extras
    #[serde(default)]
    pub metadata: Metadata,
}

impl TransferStatusResponse {
    /// Failed lookup
    pub fn failed(request: &TransferStatusRequest, code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            transaction_reference: request.transaction_reference.clone(),
            provider_reference: request.provider_reference.clone(),
            status: TransferStatus::Failed,
            amount: None,
            currency: None,
            completed_at: None,
            failure_reason: Some(reason.into()),
            error_code: Some(code),
            metadata: Metadata::new(),
        }
    }
}

/// Bank list filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankListFilter {
    /// ISO country
    pub country: Option<String>,
    /// Currency
    pub currency: Option<String>,
    /// Region
    pub region: Option<Region>,
}

/// Bank directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankInfo {
    /// Identifier
    pub bank_code: String,
    /// Display name
    pub bank_name: String,
    /// Identifier scheme
    pub bank_code_type: BankCodeType,
    /// ISO country
    pub country: String,
    /// Currency
    pub currency: String,
    /// International routing code
    pub swift_code: Option<String>,
    /// Active flag
    pub active: bool,
}

/// Transfer limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLimits {
    /// Minimum per transaction
    pub min_amount: Decimal,
    /// Maximum per transaction
    pub max_amount: Decimal,
    /// Daily cap
    pub daily_limit: Decimal,
    /// Monthly cap
    pub monthly_limit: Decimal,
    /// Currency
    pub currency: String,
}

/// Static provider metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    /// Account validation offered
    pub supports_account_validation: bool,
    /// Instant settlement offered
    pub supports_instant_transfer: bool,
    /// Scheduled transfers offered
    pub supports_scheduled_transfer: bool,
    /// Cross-border transfers offered
    pub supports_international_transfer: bool,
    /// ISO currencies
    pub supported_currencies: Vec<String>,
    /// ISO countries
    pub supported_countries: Vec<String>,
    /// Human-readable settlement latency
    pub average_processing_time: String,
}

impl ProviderCapabilities {
    /// Currency membership
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.supported_currencies
            .iter()
            .any(|c| c.eq_ignore_ascii_case(currency))
    }

    /// Country membership
    pub fn supports_country(&self, country: &str) -> bool {
        self.supported_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_market_table() {
        assert_eq!(Region::AfricaEast.market(), Market::Nigeria);
        assert_eq!(Region::NorthAmericaWest.market(), Market::UnitedStates);
        assert_eq!(Region::NorthAmericaCentral.market(), Market::Canada);
        assert_eq!(Region::EuropeEast.market(), Market::Europe);
    }

    #[test]
    fn test_region_parse() {
        assert_eq!("africa-west".parse::<Region>().unwrap(), Region::AfricaWest);
        assert_eq!("USA".parse::<Region>().unwrap(), Region::UnitedStates);
        assert!("atlantis".parse::<Region>().is_err());

        let region: Region = serde_json::from_str("\"europe-central\"").unwrap();
        assert_eq!(region, Region::EuropeCentral);
    }

    #[test]
    fn test_bank_code_type_wire_tags() {
        assert_eq!(
            serde_json::to_string(&BankCodeType::SortCode).unwrap(),
            "\"SORT_CODE\""
        );
        assert_eq!("nibss".parse::<BankCodeType>().unwrap(), BankCodeType::Nibss);
    }

    #[test]
    fn test_transfer_request_flag() {
        let mut request = TransferRequest::default();
        assert!(!request.flag("instant"));

        request
            .metadata
            .insert("instant".to_string(), serde_json::Value::Bool(true));
        assert!(request.flag("instant"));
    }

    #[test]
    fn test_capabilities_currency_is_case_insensitive() {
        let caps = ProviderCapabilities {
            supports_account_validation: true,
            supports_instant_transfer: false,
            supports_scheduled_transfer: false,
            supports_international_transfer: false,
            supported_currencies: vec!["USD".to_string()],
            supported_countries: vec!["US".to_string()],
            average_processing_time: "1-3 business days".to_string(),
        };
        assert!(caps.supports_currency("usd"));
        assert!(!caps.supports_currency("EUR"));
    }
}

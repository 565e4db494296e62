//! Error types for payment rails
//!
//! Two layers live here. [`ErrorCode`] is the stable, machine-readable code carried on
//! every failed result record; business failures never leave a provider as an `Err`.
//! [`Error`] is reserved for conditions the caller has to fix in code or configuration
//! (calling a provider before `initialize`, bad config, no rail able to serve a lookup that
//! has no result envelope).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for rail operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error code returned on failed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Currency not in the provider's supported set
    InvalidCurrency,
    /// Account identifier has the wrong charset for the scheme
    InvalidAccountFormat,
    /// Domestic account number is not 10 digits
    InvalidLength,
    /// US routing number is not 9 digits
    InvalidRoutingNumber,
    /// Account number outside the scheme's length range
    InvalidAccountNumber,
    /// IBAN outside 15..=34 characters
    InvalidIbanLength,
    /// IBAN does not start with country code + check digits
    InvalidIbanFormat,
    /// Country not served by the rail
    UnsupportedCountry,
    /// IBAN mod-97 check failed
    InvalidChecksum,
    /// Canadian identifier layout could not be parsed
    InvalidFormat,
    /// Canadian institution number is well formed but unknown
    UnknownInstitution,
    /// Amount is zero, negative or below the rail minimum
    InvalidAmount,
    /// Amount above the rail's transaction or daily limit
    LimitExceeded,
    /// The rail answered with a non-success response code
    RailRejected,
    /// No registered provider matched the selection context
    NoProviderAvailable,
    /// The selected provider does not offer the operation
    UnsupportedOperation,
    /// Provider used before `initialize`
    NotInitialized,
    /// The outbound call failed or timed out
    ProviderNetworkError,
    /// Configuration rejected at startup
    InvalidConfiguration,
}

impl ErrorCode {
    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidCurrency => "INVALID_CURRENCY",
            ErrorCode::InvalidAccountFormat => "INVALID_ACCOUNT_FORMAT",
            ErrorCode::InvalidLength => "INVALID_LENGTH",
            ErrorCode::InvalidRoutingNumber => "INVALID_ROUTING_NUMBER",
            ErrorCode::InvalidAccountNumber => "INVALID_ACCOUNT_NUMBER",
            ErrorCode::InvalidIbanLength => "INVALID_IBAN_LENGTH",
            ErrorCode::InvalidIbanFormat => "INVALID_IBAN_FORMAT",
            ErrorCode::UnsupportedCountry => "UNSUPPORTED_COUNTRY",
            ErrorCode::InvalidChecksum => "INVALID_CHECKSUM",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::UnknownInstitution => "UNKNOWN_INSTITUTION",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
            ErrorCode::RailRejected => "RAIL_REJECTED",
            ErrorCode::NoProviderAvailable => "NO_PROVIDER_AVAILABLE",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::ProviderNetworkError => "PROVIDER_NETWORK_ERROR",
            ErrorCode::InvalidConfiguration => "INVALID_CONFIGURATION",
        }
    }

    /// True for the per-scheme account format family
    pub fn is_account_format(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidAccountFormat
                | ErrorCode::InvalidLength
                | ErrorCode::InvalidRoutingNumber
                | ErrorCode::InvalidAccountNumber
                | ErrorCode::InvalidIbanLength
                | ErrorCode::InvalidIbanFormat
                | ErrorCode::UnsupportedCountry
                | ErrorCode::InvalidFormat
                | ErrorCode::UnknownInstitution
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rail errors
#[derive(Error, Debug)]
pub enum Error {
    /// Operation called before `initialize`
    #[error("Payment provider {provider} not initialized")]
    NotInitialized {
        /// Provider name
        provider: String,
    },

    /// `initialize` called twice
    #[error("Payment provider {provider} already initialized")]
    AlreadyInitialized {
        /// Provider name
        provider: String,
    },

    /// Currency outside the provider's supported set
    #[error("{provider} does not support currency {currency}")]
    InvalidCurrency {
        /// Provider name
        provider: String,
        /// Requested currency
        currency: String,
    },

    /// No provider matched the selection context
    #[error("No payment provider available for this request")]
    NoProviderAvailable,

    /// Provider does not offer the operation
    #[error("{provider} does not support {operation}")]
    UnsupportedOperation {
        /// Provider name
        provider: String,
        /// Operation name
        operation: String,
    },

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout
    #[error("Timeout after {seconds}s: {operation}")]
    Timeout {
        /// Timeout duration
        seconds: u64,
        /// Operation
        operation: String,
    },

    /// Rail API error
    #[error("Rail API error {status_code}: {message}")]
    RailApi {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tenant configuration store failure
    #[error("Tenant store error: {0}")]
    TenantStore(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map onto the stable result code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotInitialized { .. } => ErrorCode::NotInitialized,
            Error::InvalidCurrency { .. } => ErrorCode::InvalidCurrency,
            Error::NoProviderAvailable => ErrorCode::NoProviderAvailable,
            Error::UnsupportedOperation { .. } => ErrorCode::UnsupportedOperation,
            Error::Connection(_)
            | Error::Timeout { .. }
            | Error::RailApi { .. }
            | Error::Http(_)
            | Error::Json(_) => ErrorCode::ProviderNetworkError,
            Error::AlreadyInitialized { .. }
            | Error::Config(_)
            | Error::TenantStore(_)
            | Error::Io(_) => ErrorCode::InvalidConfiguration,
        }
    }

    /// Transport-level failure (the outbound call itself)
    pub fn is_transport(&self) -> bool {
        self.code() == ErrorCode::ProviderNetworkError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_as_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::InvalidChecksum).unwrap();
        assert_eq!(json, "\"INVALID_CHECKSUM\"");
        assert_eq!(ErrorCode::NoProviderAvailable.to_string(), "NO_PROVIDER_AVAILABLE");
    }

    #[test]
    fn test_transport_errors_map_to_network_code() {
        let err = Error::Timeout {
            seconds: 30,
            operation: "submit_transfer".to_string(),
        };
        assert!(err.is_transport());
        assert_eq!(err.code(), ErrorCode::ProviderNetworkError);

        let err = Error::NotInitialized {
            provider: "ACH".to_string(),
        };
        assert!(!err.is_transport());
        assert_eq!(err.code(), ErrorCode::NotInitialized);
    }

    #[test]
    fn test_account_format_family() {
        assert!(ErrorCode::InvalidIbanLength.is_account_format());
        assert!(ErrorCode::UnknownInstitution.is_account_format());
        assert!(!ErrorCode::InvalidChecksum.is_account_format());
        assert!(!ErrorCode::InvalidCurrency.is_account_format());
    }
}

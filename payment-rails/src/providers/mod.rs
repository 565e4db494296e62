//! Regional rail implementations

pub mod ach;
pub mod interac;
pub mod nibss;
pub mod sepa;

pub use ach::AchProvider;
pub use interac::InteracProvider;
pub use nibss::NibssProvider;
pub use sepa::SepaProvider;

use crate::{
    error::ErrorCode,
    transport::StatusReply,
    types::{BankInfo, BankListFilter, Metadata, TransferLimits, TransferResponse,
        TransferStatusRequest, TransferStatusResponse},
    Error,
};
use rust_decimal::Decimal;
use tracing::error;

/// Domestic instant rail
pub const NIBSS: &str = "nibss";
/// US batch rail
pub const ACH: &str = "ach";
/// Euro-zone rail
pub const SEPA: &str = "sepa";
/// Canadian rail
pub const INTERAC: &str = "interac";
/// International wire (no built-in provider)
pub const SWIFT: &str = "swift";
/// UK faster payments (no built-in provider)
pub const FASTER_PAYMENTS: &str = "faster-payments";

/// Built-in providers, in registration order
pub const PROVIDER_NAMES: [&str; 4] = [NIBSS, ACH, SEPA, INTERAC];

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Truncate to at most `max` characters
pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Keep the last four characters
pub(crate) fn mask_account(account: &str) -> String {
    let count = account.chars().count();
    if count <= 4 {
        return account.to_string();
    }
    let last_four: String = account.chars().skip(count - 4).collect();
    format!("****{}", last_four)
}

pub(crate) fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Failure response when the amount is outside the per-transaction band
pub(crate) fn check_amount(
    reference: &str,
    amount: Decimal,
    limits: &TransferLimits,
) -> Option<TransferResponse> {
    if amount <= Decimal::ZERO {
        return Some(TransferResponse::failed(
            reference,
            ErrorCode::InvalidAmount,
            "Amount must be positive",
        ));
    }
    if amount < limits.min_amount {
        return Some(TransferResponse::failed(
            reference,
            ErrorCode::InvalidAmount,
            format!(
                "Amount below minimum of {} {}",
                limits.min_amount, limits.currency
            ),
        ));
    }
    if amount > limits.max_amount {
        return Some(TransferResponse::failed(
            reference,
            ErrorCode::LimitExceeded,
            format!(
                "Amount exceeds per-transaction limit of {} {}",
                limits.max_amount, limits.currency
            ),
        ));
    }
    None
}

/// Failure response for a transport error
pub(crate) fn network_failure(provider: &str, reference: &str, err: &Error) -> TransferResponse {
    error!("{} transfer {} failed: {}", provider, reference, err);
    TransferResponse::failed(reference, ErrorCode::ProviderNetworkError, err.to_string())
}

/// Status response from a transport reply
pub(crate) fn status_from_reply(
    request: &TransferStatusRequest,
    reply: StatusReply,
    metadata: Metadata,
) -> TransferStatusResponse {
    TransferStatusResponse {
        transaction_reference: request.transaction_reference.clone(),
        provider_reference: request.provider_reference.clone(),
        status: reply.status,
        amount: reply.amount,
        currency: reply.currency,
        completed_at: reply.completed_at,
        failure_reason: reply.failure_reason,
        error_code: None,
        metadata,
    }
}

/// Apply an optional directory filter
pub(crate) fn filter_banks(banks: Vec<BankInfo>, filter: Option<&BankListFilter>) -> Vec<BankInfo> {
    let Some(filter) = filter else {
        return banks;
    };

    banks
        .into_iter()
        .filter(|b| {
            filter
                .country
                .as_deref()
                .map_or(true, |c| b.country.eq_ignore_ascii_case(c))
        })
        .filter(|b| {
            filter
                .currency
                .as_deref()
                .map_or(true, |c| b.currency.eq_ignore_ascii_case(c))
        })
        .collect()
}

//! Payment provider interface

use crate::{config::ProviderConfig, types::*, Error, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Regional payment provider
///
/// Every operation fails with [`Error::NotInitialized`] until `initialize` has run.
/// Operations that return a result record report business failures (bad account,
/// unsupported currency, rail rejection, network failure) inside the record; fee and
/// limit lookups have no record and report an unsupported currency as
/// [`Error::InvalidCurrency`].
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provider name (registry key, case-insensitive)
    fn name(&self) -> &str;

    /// Market served
    fn market(&self) -> Market;

    /// Static capabilities
    fn capabilities(&self) -> &ProviderCapabilities;

    /// True once `initialize` succeeded
    fn is_initialized(&self) -> bool;

    /// Initialize with configuration. Called once at startup.
    async fn initialize(&self, config: ProviderConfig) -> Result<()>;

    /// Validate account number and resolve account details
    async fn validate_account(
        &self,
        request: &AccountValidationRequest,
    ) -> Result<AccountValidationResult>;

    /// Initiate a transfer
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferResponse>;

    /// Check the status of a transfer
    async fn get_transfer_status(
        &self,
        request: &TransferStatusRequest,
    ) -> Result<TransferStatusResponse>;

    /// Bank directory
    async fn get_bank_list(&self, filter: Option<&BankListFilter>) -> Result<Vec<BankInfo>>;

    /// Transfer limits for `currency`
    async fn get_transfer_limits(&self, currency: &str) -> Result<TransferLimits>;

    /// Transfer fee
    async fn calculate_fee(
        &self,
        amount: Decimal,
        currency: &str,
        class: TransferClass,
    ) -> Result<Decimal>;

    /// Whether the provider offers `operation`
    fn is_supported(&self, operation: Operation) -> bool {
        match operation {
            Operation::Validate => self.capabilities().supports_account_validation,
            Operation::Transfer | Operation::Status | Operation::Banks => true,
        }
    }

    /// `Err(InvalidCurrency)` unless `currency` is supported
    fn ensure_currency(&self, currency: &str) -> Result<()> {
        if self.capabilities().supports_currency(currency) {
            Ok(())
        } else {
            Err(Error::InvalidCurrency {
                provider: self.name().to_string(),
                currency: currency.to_string(),
            })
        }
    }
}

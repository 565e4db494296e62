//! Rail transport boundary
//!
//! Each provider talks to its rail through a [`RailTransport`]: one call to verify an
//! account, one to submit a transfer, one to query its status. [`HttpTransport`] posts JSON
//! to a configured endpoint; [`SandboxTransport`] answers in-process and deterministically.

use crate::{
    config::{Environment, ProviderConfig},
    signing::Signature,
    types::TransferStatus,
    Error, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Rail response code for success
pub const RESPONSE_OK: &str = "00";

/// Account verification call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEnquiry {
    /// Account number as sent to the rail
    pub account_number: String,
    /// Bank identifier
    pub bank_code: String,
    /// Rail-specific body
    pub payload: serde_json::Value,
    /// Optional payload signature
    pub signature: Option<Signature>,
}

/// Account verification reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryReply {
    /// Rail response code (`00` = found)
    pub response_code: String,
    /// Account holder
    pub account_name: Option<String>,
    /// Account number echoed by the rail
    pub account_number: Option<String>,
    /// Bank name
    pub bank_name: Option<String>,
}

/// How the rail settles a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Settlement {
    /// Settles within the submit call
    Instant,
    /// Settles later in a window
    Deferred,
}

/// Transfer submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSubmission {
    /// Caller reference (idempotency key for the rail)
    pub reference: String,
    /// Amount
    pub amount: Decimal,
    /// Currency
    pub currency: String,
    /// Settlement model
    pub settlement: Settlement,
    /// Rail-specific body
    pub payload: serde_json::Value,
    /// Optional payload signature
    pub signature: Option<Signature>,
}

/// Transfer submission reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReply {
    /// Rail response code (`00` = accepted)
    pub response_code: String,
    /// Rail-assigned reference
    pub provider_reference: Option<String>,
    /// Rail description
    pub description: Option<String>,
}

impl SubmissionReply {
    /// Accepted by the rail
    pub fn is_accepted(&self) -> bool {
        self.response_code == RESPONSE_OK
    }
}

/// Status query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    /// Caller reference
    pub transaction_reference: String,
    /// Rail reference
    pub provider_reference: Option<String>,
}

/// Status reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
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
}

/// Request paths on a rail
#[derive(Debug, Clone, Copy)]
pub struct RailEndpoints {
    /// Account verification
    pub verify_account: &'static str,
    /// Transfer submission
    pub submit_transfer: &'static str,
    /// Status query
    pub query_status: &'static str,
}

/// Rail transport trait
#[async_trait]
pub trait RailTransport: Send + Sync {
    /// Verify an account / name enquiry
    async fn verify_account(&self, enquiry: &AccountEnquiry) -> Result<EnquiryReply>;

    /// Submit a transfer
    async fn submit_transfer(&self, submission: &TransferSubmission) -> Result<SubmissionReply>;

    /// Query a transfer's status
    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReply>;

    /// Transport name (for logs)
    fn name(&self) -> &str;
}

/// Build the transport a provider should use for `config`.
///
/// An explicit `base_url` always wins. Without one, sandbox gets the in-process
/// transport and production is a configuration error.
pub fn connect(
    rail: &str,
    config: &ProviderConfig,
    endpoints: RailEndpoints,
    headers: Vec<(String, String)>,
) -> Result<Arc<dyn RailTransport>> {
    let environment = config.environment()?;
    let timeout = config.timeout()?;

    match (config.base_url(), environment) {
        (Some(base_url), _) => {
            info!("{} using HTTP transport at {}", rail, base_url);
            Ok(Arc::new(HttpTransport::new(
                rail, base_url, endpoints, timeout, headers,
            )?))
        }
        (None, Environment::Sandbox) => {
            info!("{} using sandbox transport", rail);
            Ok(Arc::new(SandboxTransport::new(rail)))
        }
        (None, Environment::Production) => Err(Error::Config(format!(
            "{} requires base_url in production",
            rail
        ))),
    }
}

/// HTTP transport
pub struct HttpTransport {
    rail: String,
    base_url: String,
    endpoints: RailEndpoints,
    timeout: Duration,
    headers: Vec<(String, String)>,
    client: Client,
}

impl HttpTransport {
    /// Create new HTTP transport
    pub fn new(
        rail: &str,
        base_url: &str,
        endpoints: RailEndpoints,
        timeout: Duration,
        headers: Vec<(String, String)>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(Self {
            rail: rail.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints,
            timeout,
            headers,
            client,
        })
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
        signature: Option<&Signature>,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} POST {}", self.rail, url);

        let mut request = self.client.post(&url).json(body);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(signature) = signature {
            request = request
                .header("Signature", signature.value.as_str())
                .header("SignatureMethod", signature.method.as_str());
        }

        let response = request.send().await.map_err(|e| self.map_error(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("{} {} returned {}", self.rail, operation, status);
            return Err(Error::RailApi {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| self.map_error(operation, e))
    }

    fn map_error(&self, operation: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                seconds: self.timeout.as_secs(),
                operation: operation.to_string(),
            }
        } else {
            Error::Http(e)
        }
    }
}

#[async_trait]
impl RailTransport for HttpTransport {
    async fn verify_account(&self, enquiry: &AccountEnquiry) -> Result<EnquiryReply> {
        self.post(
            "verify_account",
            self.endpoints.verify_account,
            &enquiry.payload,
            enquiry.signature.as_ref(),
        )
        .await
    }

    async fn submit_transfer(&self, submission: &TransferSubmission) -> Result<SubmissionReply> {
        self.post(
            "submit_transfer",
            self.endpoints.submit_transfer,
            &submission.payload,
            submission.signature.as_ref(),
        )
        .await
    }

    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReply> {
        self.post("query_status", self.endpoints.query_status, query, None)
            .await
    }

    fn name(&self) -> &str {
        &self.rail
    }
}

/// Transfers a sandbox remembers before evicting the oldest
pub const SANDBOX_TRANSFER_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct SandboxTransfer {
    reference: String,
    amount: Decimal,
    currency: String,
    status: TransferStatus,
    completed_at: Option<DateTime<Utc>>,
}

/// Accepted transfers keyed by provider reference, oldest evicted first
#[derive(Debug, Default)]
struct SandboxLedger {
    transfers: HashMap<String, SandboxTransfer>,
    order: VecDeque<String>,
}

impl SandboxLedger {
    fn insert(&mut self, provider_reference: String, transfer: SandboxTransfer, capacity: usize) {
        while self.order.len() >= capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.transfers.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(provider_reference.clone());
        self.transfers.insert(provider_reference, transfer);
    }
}

/// Deterministic in-process rail
///
/// Every enquiry and submission succeeds unless configured otherwise. Accepted transfers
/// are remembered so status lookups reflect the settlement model of the submission; only
/// the most recent [`SANDBOX_TRANSFER_CAPACITY`] are kept.
pub struct SandboxTransport {
    rail: String,
    account_names: HashMap<String, String>,
    enquiry_code: String,
    submit_code: String,
    failure: Option<String>,
    calls: AtomicUsize,
    capacity: usize,
    ledger: RwLock<SandboxLedger>,
}

impl SandboxTransport {
    /// Default account holder returned by enquiries
    pub const DEFAULT_ACCOUNT_NAME: &'static str = "SANDBOX ACCOUNT HOLDER";

    /// Create new sandbox for `rail`
    pub fn new(rail: &str) -> Self {
        Self {
            rail: rail.to_string(),
            account_names: HashMap::new(),
            enquiry_code: RESPONSE_OK.to_string(),
            submit_code: RESPONSE_OK.to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
            capacity: SANDBOX_TRANSFER_CAPACITY,
            ledger: RwLock::new(SandboxLedger::default()),
        }
    }

    /// Remember at most `capacity` transfers (minimum 1)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Resolve `account_number` to `name`
    pub fn with_account_name(mut self, account_number: &str, name: &str) -> Self {
        self.account_names
            .insert(account_number.to_string(), name.to_string());
        self
    }

    /// Answer enquiries with `code`
    pub fn with_enquiry_code(mut self, code: &str) -> Self {
        self.enquiry_code = code.to_string();
        self
    }

    /// Answer submissions with `code`
    pub fn with_submit_code(mut self, code: &str) -> Self {
        self.submit_code = code.to_string();
        self
    }

    /// Fail every call as if the network were down
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Number of calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self, operation: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(Error::Connection(format!(
                "{} {}: {}",
                self.rail, operation, message
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RailTransport for SandboxTransport {
    async fn verify_account(&self, enquiry: &AccountEnquiry) -> Result<EnquiryReply> {
        self.record_call("verify_account")?;

        if self.enquiry_code != RESPONSE_OK {
            return Ok(EnquiryReply {
                response_code: self.enquiry_code.clone(),
                ..Default::default()
            });
        }

        let account_name = self
            .account_names
            .get(&enquiry.account_number)
            .cloned()
            .unwrap_or_else(|| Self::DEFAULT_ACCOUNT_NAME.to_string());

        Ok(EnquiryReply {
            response_code: RESPONSE_OK.to_string(),
            account_name: Some(account_name),
            account_number: Some(enquiry.account_number.clone()),
            bank_name: None,
        })
    }

    async fn submit_transfer(&self, submission: &TransferSubmission) -> Result<SubmissionReply> {
        self.record_call("submit_transfer")?;

        if self.submit_code != RESPONSE_OK {
            warn!(
                "{} sandbox rejecting {} with code {}",
                self.rail, submission.reference, self.submit_code
            );
            return Ok(SubmissionReply {
                response_code: self.submit_code.clone(),
                provider_reference: None,
                description: Some("Rejected by sandbox rail".to_string()),
            });
        }

        let provider_reference = format!(
            "{}-{}",
            self.rail.to_ascii_uppercase(),
            Uuid::new_v4().simple()
        );
        let (status, completed_at) = match submission.settlement {
            Settlement::Instant => (TransferStatus::Completed, Some(Utc::now())),
            Settlement::Deferred => (TransferStatus::Processing, None),
        };

        self.ledger.write().await.insert(
            provider_reference.clone(),
            SandboxTransfer {
                reference: submission.reference.clone(),
                amount: submission.amount,
                currency: submission.currency.clone(),
                status,
                completed_at,
            },
            self.capacity,
        );

        Ok(SubmissionReply {
            response_code: RESPONSE_OK.to_string(),
            provider_reference: Some(provider_reference),
            description: Some("Accepted".to_string()),
        })
    }

    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReply> {
        self.record_call("query_status")?;

        let ledger = self.ledger.read().await;
        let found = match &query.provider_reference {
            Some(provider_reference) => ledger.transfers.get(provider_reference),
            None => ledger
                .transfers
                .values()
                .find(|t| t.reference == query.transaction_reference),
        };

        Ok(match found {
            Some(transfer) => StatusReply {
                status: transfer.status,
                amount: Some(transfer.amount),
                currency: Some(transfer.currency.clone()),
                completed_at: transfer.completed_at,
                failure_reason: None,
            },
            None => StatusReply {
                status: TransferStatus::Failed,
                amount: None,
                currency: None,
                completed_at: None,
                failure_reason: Some(format!(
                    "Transfer not found: {}",
                    query.transaction_reference
                )),
            },
        })
    }

    fn name(&self) -> &str {
        &self.rail
    }
}

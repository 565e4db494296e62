//! # Payment Rails
//!
//! Regional payment-rail abstraction and routing layer:
//! - Bank identifier classification (NIBSS, ABA routing, Canadian transit, BIC, sort code)
//! - One provider contract over four rails (NIBSS, ACH, SEPA, Interac)
//! - Per-rail account validation, fees and limits
//! - Provider selection from explicit name, tenant preferences, scheme, currency and region
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        Payment Gateway (selection + metrics)        │
//! └────────────┬───────────────────────┬────────────────┘
//!              │                       │
//!     ┌────────▼─────────┐    ┌────────▼─────────┐
//!     │ Provider Registry│    │ Tenant Config    │
//!     └────────┬─────────┘    │ Store (read-only)│
//!              │              └──────────────────┘
//!     ┌────────┼────────────────┬────────────┐
//!     │        │                │            │
//! ┌───▼────┐ ┌─▼──────┐ ┌───────▼─┐ ┌────────▼─────┐
//! │ NIBSS  │ │  ACH   │ │  SEPA   │ │   Interac    │
//! │Provider│ │Provider│ │Provider │ │   Provider   │
//! └───┬────┘ └─┬──────┘ └───────┬─┘ └────────┬─────┘
//!     │        │                │            │
//!     └────────┼────────────────┴────────────┘
//!              │
//! ┌────────────▼─────────────────────────────────────┐
//! │     Rail Transport (HTTP or in-process sandbox)  │
//! └──────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod iban;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod signing;
pub mod transport;
pub mod types;

pub use classifier::classify_bank_code;
pub use config::{GatewayConfig, ProviderConfig};
pub use error::{Error, ErrorCode, Result};
pub use gateway::{
    InMemoryTenantStore, PaymentGateway, SelectionContext, TenantConfigStore, TenantPaymentConfig,
};
pub use provider::PaymentProvider;
pub use registry::ProviderRegistry;
pub use types::*;

/// Default request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

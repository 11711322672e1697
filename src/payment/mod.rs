//! Payment capability used by the booking flow.
//!
//! Every processor implements [`PaymentProcessor`]; which ones exist at runtime
//! is decided by [`ProcessorConfig`] values. The bundled processors settle
//! in-process and never call a real gateway.

mod processors;
mod service;

pub use processors::{CryptoProcessor, PromptPayProcessor, StripeProcessor};
pub use service::{PaymentAnalytics, PaymentService, PaymentSuggestion};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

use crate::model::BookingId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    THB,
    USD,
    EUR,
    GBP,
    AUD,
    SGD,
    /// Tether stablecoin.
    USDT,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    BankTransfer,
    PromptPay,
    Cryptocurrency,
    Wise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Stripe,
    Omise,
    ScbEasy,
    Kasikorn,
    PromptPay,
    Wise,
    BinancePay,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Omise => "omise",
            PaymentProvider::ScbEasy => "scb_easy",
            PaymentProvider::Kasikorn => "kasikorn",
            PaymentProvider::PromptPay => "promptpay",
            PaymentProvider::Wise => "wise",
            PaymentProvider::BinancePay => "binance_pay",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

/// What the payer handed over. Card data is tokenised upstream; only the
/// display fields reach this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub amount: Decimal,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub provider: PaymentProvider,

    #[serde(default)]
    pub card_last4: Option<String>,
    #[serde(default)]
    pub card_brand: Option<String>,

    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,

    #[serde(default)]
    pub promptpay_phone: Option<String>,
    #[serde(default)]
    pub promptpay_id: Option<String>,

    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

impl PaymentDetails {
    pub fn new(amount: Decimal, currency: Currency, payment_method: PaymentMethod, provider: PaymentProvider) -> Self {
        Self {
            amount,
            currency,
            payment_method,
            provider,
            card_last4: None,
            card_brand: None,
            bank_name: None,
            account_number: None,
            promptpay_phone: None,
            promptpay_id: None,
            wallet_address: None,
            transaction_hash: None,
        }
    }
}

/// Who pays whom for which booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentParties {
    pub booking_id: BookingId,
    pub payer_id: String,
    /// Property owner.
    pub recipient_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_id: Ulid,
    pub booking_id: BookingId,
    pub payer_id: String,
    pub recipient_id: String,
    pub payment_details: PaymentDetails,
    pub status: TransactionStatus,

    pub gross_amount: Decimal,
    pub fee_amount: Decimal,
    pub net_amount: Decimal,
    /// Sum of refunds issued so far. Never exceeds `gross_amount`.
    #[serde(default)]
    pub refunded_amount: Decimal,

    pub provider_transaction_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundState {
    Pending,
    /// PromptPay has no refund API; finance pushes the money back by hand.
    ManualProcessRequired,
    BlockchainProcessing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub refund_id: Ulid,
    pub transaction_id: Ulid,
    /// Amount sent back. `None` means whatever was still refundable.
    pub amount: Option<Decimal>,
    pub state: RefundState,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("payment provider {0} not configured")]
    ProviderNotConfigured(PaymentProvider),
    #[error("payment amount must be positive")]
    InvalidAmount,
    #[error("{provider} does not accept {currency:?}")]
    UnsupportedCurrency { provider: PaymentProvider, currency: Currency },
    #[error("transaction not found: {0}")]
    TransactionNotFound(Ulid),
    #[error("refund of {requested} exceeds refundable amount {available}")]
    RefundExceedsAmount { requested: Decimal, available: Decimal },
    #[error("transaction already refunded: {0}")]
    AlreadyRefunded(Ulid),
    #[error("transaction {transaction_id} is {status:?} and cannot be refunded")]
    NotRefundable { transaction_id: Ulid, status: TransactionStatus },
}

/// One payment gateway.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn process(
        &self,
        details: PaymentDetails,
        parties: PaymentParties,
    ) -> Result<PaymentTransaction, PaymentError>;

    async fn refund(&self, transaction_id: Ulid, amount: Option<Decimal>) -> Result<RefundReceipt, PaymentError>;

    async fn status(&self, transaction_id: Ulid) -> Result<TransactionStatus, PaymentError>;
}

/// Credentials for one processor. Each variant builds exactly one processor.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProcessorConfig {
    Stripe { api_key: String },
    PromptPay { merchant_id: String },
    BinancePay { api_key: String },
}

// Keeps api keys out of logs.
impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorConfig::Stripe { .. } => f.write_str("Stripe { api_key: <redacted> }"),
            ProcessorConfig::PromptPay { merchant_id } => {
                write!(f, "PromptPay {{ merchant_id: {merchant_id:?} }}")
            }
            ProcessorConfig::BinancePay { .. } => f.write_str("BinancePay { api_key: <redacted> }"),
        }
    }
}

pub fn build_processor(config: &ProcessorConfig) -> Arc<dyn PaymentProcessor> {
    match config {
        ProcessorConfig::Stripe { api_key } => Arc::new(StripeProcessor::new(api_key.clone())),
        ProcessorConfig::PromptPay { merchant_id } => Arc::new(PromptPayProcessor::new(merchant_id.clone())),
        ProcessorConfig::BinancePay { api_key } => Arc::new(CryptoProcessor::new(api_key.clone())),
    }
}

/// Fee-split transaction shared by the in-process processors: settles at once.
pub(crate) fn settled_transaction(
    details: PaymentDetails,
    parties: PaymentParties,
    fee_rate: Decimal,
    now: DateTime<Utc>,
) -> Result<PaymentTransaction, PaymentError> {
    if details.amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount);
    }
    let gross_amount = details.amount;
    let fee_amount = (gross_amount * fee_rate).round_dp(2);
    let transaction_id = Ulid::new();
    Ok(PaymentTransaction {
        transaction_id,
        booking_id: parties.booking_id,
        payer_id: parties.payer_id,
        recipient_id: parties.recipient_id,
        payment_details: details,
        status: TransactionStatus::Completed,
        gross_amount,
        fee_amount,
        net_amount: gross_amount - fee_amount,
        refunded_amount: Decimal::ZERO,
        provider_transaction_id: Some(transaction_id.to_string()),
        created_at: now,
        processed_at: Some(now),
        completed_at: Some(now),
        error_code: None,
        error_message: None,
    })
}

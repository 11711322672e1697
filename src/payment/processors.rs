use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use ulid::Ulid;

use super::*;

/// International cards. 2.9% fee.
pub struct StripeProcessor {
    api_key: String,
}

impl StripeProcessor {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn livemode(&self) -> bool {
        self.api_key.starts_with("sk_live_")
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn process(
        &self,
        details: PaymentDetails,
        parties: PaymentParties,
    ) -> Result<PaymentTransaction, PaymentError> {
        info!(
            "processing Stripe payment: {} {:?} (livemode: {})",
            details.amount,
            details.currency,
            self.livemode()
        );
        let mut tx = settled_transaction(details, parties, Decimal::new(29, 3), Utc::now())?;
        tx.provider_transaction_id = Some(format!("pi_{}", tx.transaction_id));
        Ok(tx)
    }

    async fn refund(&self, transaction_id: Ulid, amount: Option<Decimal>) -> Result<RefundReceipt, PaymentError> {
        Ok(RefundReceipt {
            refund_id: Ulid::new(),
            transaction_id,
            amount,
            state: RefundState::Pending,
        })
    }

    async fn status(&self, _transaction_id: Ulid) -> Result<TransactionStatus, PaymentError> {
        Ok(TransactionStatus::Completed)
    }
}

/// Thai domestic QR payments. THB only, no fee.
pub struct PromptPayProcessor {
    merchant_id: String,
}

impl PromptPayProcessor {
    pub fn new(merchant_id: String) -> Self {
        Self { merchant_id }
    }
}

#[async_trait]
impl PaymentProcessor for PromptPayProcessor {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::PromptPay
    }

    async fn process(
        &self,
        details: PaymentDetails,
        parties: PaymentParties,
    ) -> Result<PaymentTransaction, PaymentError> {
        if details.currency != Currency::THB {
            return Err(PaymentError::UnsupportedCurrency {
                provider: PaymentProvider::PromptPay,
                currency: details.currency,
            });
        }
        info!("processing PromptPay payment: {} THB", details.amount);
        let mut tx = settled_transaction(details, parties, Decimal::ZERO, Utc::now())?;
        tx.provider_transaction_id = Some(format!("{}-{}", self.merchant_id, tx.transaction_id));
        Ok(tx)
    }

    async fn refund(&self, transaction_id: Ulid, amount: Option<Decimal>) -> Result<RefundReceipt, PaymentError> {
        Ok(RefundReceipt {
            refund_id: Ulid::new(),
            transaction_id,
            amount,
            state: RefundState::ManualProcessRequired,
        })
    }

    async fn status(&self, _transaction_id: Ulid) -> Result<TransactionStatus, PaymentError> {
        Ok(TransactionStatus::Completed)
    }
}

/// Crypto via Binance Pay. 1% fee.
pub struct CryptoProcessor {
    api_key: String,
}

impl CryptoProcessor {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl PaymentProcessor for CryptoProcessor {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::BinancePay
    }

    async fn process(
        &self,
        details: PaymentDetails,
        parties: PaymentParties,
    ) -> Result<PaymentTransaction, PaymentError> {
        info!(
            "processing crypto payment: {} {:?} (key configured: {})",
            details.amount,
            details.currency,
            !self.api_key.is_empty()
        );
        settled_transaction(details, parties, Decimal::new(1, 2), Utc::now())
    }

    async fn refund(&self, transaction_id: Ulid, amount: Option<Decimal>) -> Result<RefundReceipt, PaymentError> {
        Ok(RefundReceipt {
            refund_id: Ulid::new(),
            transaction_id,
            amount,
            state: RefundState::BlockchainProcessing,
        })
    }

    async fn status(&self, _transaction_id: Ulid) -> Result<TransactionStatus, PaymentError> {
        Ok(TransactionStatus::Completed)
    }
}

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use crate::observability::{PAYMENTS_PROCESSED_TOTAL, PAYMENT_REFUNDS_TOTAL};

use super::*;

/// Crypto is only offered above this amount.
const CRYPTO_MIN_AMOUNT: i64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSuggestion {
    pub method: PaymentMethod,
    pub provider: PaymentProvider,
    pub fee_percentage: Decimal,
    pub processing_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAnalytics {
    pub total_transactions: usize,
    pub completed_transactions: usize,
    pub success_rate: f64,
    pub total_volume: Decimal,
    pub total_fees_collected: Decimal,
    pub average_transaction_size: Decimal,
}

/// Routes payments to the registered processor for their provider and keeps
/// the transaction ledger.
#[derive(Default)]
pub struct PaymentService {
    processors: DashMap<PaymentProvider, Arc<dyn PaymentProcessor>>,
    transactions: DashMap<Ulid, PaymentTransaction>,
}

impl PaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// One processor per configured provider.
    pub fn from_configs(configs: &[ProcessorConfig]) -> Self {
        let service = Self::new();
        for config in configs {
            service.register_processor(build_processor(config));
        }
        service
    }

    /// Replaces any processor already registered for the same provider.
    pub fn register_processor(&self, processor: Arc<dyn PaymentProcessor>) {
        let provider = processor.provider();
        self.processors.insert(provider, processor);
        info!("registered payment processor: {provider}");
    }

    pub fn has_processor(&self, provider: PaymentProvider) -> bool {
        self.processors.contains_key(&provider)
    }

    fn processor(&self, provider: PaymentProvider) -> Result<Arc<dyn PaymentProcessor>, PaymentError> {
        self.processors
            .get(&provider)
            .map(|e| e.value().clone())
            .ok_or(PaymentError::ProviderNotConfigured(provider))
    }

    pub async fn process_booking_payment(
        &self,
        parties: PaymentParties,
        details: PaymentDetails,
    ) -> Result<PaymentTransaction, PaymentError> {
        if details.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        let provider = details.provider;
        let processor = self.processor(provider)?;
        let booking_id = parties.booking_id;

        let tx = processor.process(details, parties).await?;
        self.transactions.insert(tx.transaction_id, tx.clone());

        metrics::counter!(PAYMENTS_PROCESSED_TOTAL, "provider" => provider.as_str()).increment(1);
        info!("processed payment {} for booking {booking_id}", tx.transaction_id);
        Ok(tx)
    }

    /// Refund all that is left (`None`) or part of a transaction. Partial
    /// refunds accumulate; the transaction turns `Refunded` once the whole
    /// gross amount has gone back.
    pub async fn refund_transaction(
        &self,
        transaction_id: Ulid,
        amount: Option<Decimal>,
    ) -> Result<RefundReceipt, PaymentError> {
        if let Some(requested) = amount
            && requested <= Decimal::ZERO
        {
            return Err(PaymentError::InvalidAmount);
        }

        // Reserve on the ledger before calling the provider so concurrent
        // refunds cannot both pass the balance check.
        let (provider, refund) = {
            let mut tx = self
                .transactions
                .get_mut(&transaction_id)
                .ok_or(PaymentError::TransactionNotFound(transaction_id))?;
            match tx.status {
                TransactionStatus::Completed => {}
                TransactionStatus::Refunded => return Err(PaymentError::AlreadyRefunded(transaction_id)),
                status => return Err(PaymentError::NotRefundable { transaction_id, status }),
            }
            let available = tx.gross_amount - tx.refunded_amount;
            let refund = amount.unwrap_or(available);
            if refund > available {
                return Err(PaymentError::RefundExceedsAmount {
                    requested: refund,
                    available,
                });
            }
            tx.refunded_amount += refund;
            if tx.refunded_amount == tx.gross_amount {
                tx.status = TransactionStatus::Refunded;
            }
            (tx.payment_details.provider, refund)
        };

        let result = match self.processor(provider) {
            Ok(processor) => processor.refund(transaction_id, Some(refund)).await,
            Err(e) => Err(e),
        };
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Some(mut tx) = self.transactions.get_mut(&transaction_id) {
                    tx.refunded_amount -= refund;
                    tx.status = TransactionStatus::Completed;
                }
                return Err(e);
            }
        };

        metrics::counter!(PAYMENT_REFUNDS_TOTAL, "provider" => provider.as_str()).increment(1);
        info!("refund {} of {refund} issued for transaction {transaction_id}", receipt.refund_id);
        Ok(receipt)
    }

    pub fn get_transaction(&self, transaction_id: &Ulid) -> Option<PaymentTransaction> {
        self.transactions.get(transaction_id).map(|e| e.value().clone())
    }

    pub fn transactions_for_booking(&self, booking_id: &Ulid) -> Vec<PaymentTransaction> {
        let mut txs: Vec<PaymentTransaction> = self
            .transactions
            .iter()
            .filter(|e| e.value().booking_id == *booking_id)
            .map(|e| e.value().clone())
            .collect();
        txs.sort_by_key(|t| t.created_at);
        txs
    }

    /// Ledger status when known locally, otherwise ask the provider.
    pub async fn transaction_status(&self, transaction_id: Ulid) -> Result<TransactionStatus, PaymentError> {
        let tx = self
            .get_transaction(&transaction_id)
            .ok_or(PaymentError::TransactionNotFound(transaction_id))?;
        if tx.status == TransactionStatus::Refunded {
            return Ok(tx.status);
        }
        self.processor(tx.payment_details.provider)?
            .status(transaction_id)
            .await
    }

    /// Payment options for a payer: PromptPay for Thai payers in baht, then
    /// card, then crypto for larger amounts.
    pub fn suggest_payment_methods(
        &self,
        amount: Decimal,
        currency: Currency,
        payer_country: &str,
    ) -> Vec<PaymentSuggestion> {
        let mut suggestions = Vec::new();

        if payer_country.eq_ignore_ascii_case("TH") && currency == Currency::THB {
            suggestions.push(PaymentSuggestion {
                method: PaymentMethod::PromptPay,
                provider: PaymentProvider::PromptPay,
                fee_percentage: Decimal::ZERO,
                processing_time: "instant".into(),
            });
        }

        suggestions.push(PaymentSuggestion {
            method: PaymentMethod::CreditCard,
            provider: PaymentProvider::Stripe,
            fee_percentage: Decimal::new(29, 1),
            processing_time: "instant".into(),
        });

        if amount > Decimal::new(CRYPTO_MIN_AMOUNT, 0) {
            suggestions.push(PaymentSuggestion {
                method: PaymentMethod::Cryptocurrency,
                provider: PaymentProvider::BinancePay,
                fee_percentage: Decimal::new(10, 1),
                processing_time: "5-30 minutes".into(),
            });
        }

        suggestions
    }

    pub fn payment_analytics(&self) -> PaymentAnalytics {
        let total_transactions = self.transactions.len();
        let mut completed_transactions = 0usize;
        let mut total_volume = Decimal::ZERO;
        let mut total_fees_collected = Decimal::ZERO;

        for entry in self.transactions.iter() {
            let tx = entry.value();
            if tx.status == TransactionStatus::Completed {
                completed_transactions += 1;
                total_volume = total_volume.saturating_add(tx.gross_amount);
                total_fees_collected = total_fees_collected.saturating_add(tx.fee_amount);
            }
        }

        PaymentAnalytics {
            total_transactions,
            completed_transactions,
            success_rate: completed_transactions as f64 / total_transactions.max(1) as f64,
            total_volume,
            total_fees_collected,
            average_transaction_size: (total_volume / Decimal::from(completed_transactions.max(1) as u64))
                .round_dp(2),
        }
    }
}

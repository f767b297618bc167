pub mod receipt;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::types::{AssociationId, DueId, PaymentId, PaymentMethod, UserId};

pub use receipt::{association_prefix, format_receipt_number, ReceiptCounters};

/// recorded settlement of exactly one due
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub due_id: DueId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_on: NaiveDate,
    pub recorded_by: UserId,
    pub recorded_at: DateTime<Utc>,
    /// assigned once at recording, never regenerated
    pub receipt_number: String,
    pub receipt_generated: bool,
}

impl Payment {
    /// informational: the payment covers the due in full
    pub fn is_complete(&self, due_amount: Money) -> bool {
        self.amount >= due_amount
    }

    /// overpayment (positive) or shortfall (negative) against the due
    pub fn difference(&self, due_amount: Money) -> Money {
        self.amount - due_amount
    }
}

/// caller-supplied payment fields
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInput {
    pub due_id: DueId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_on: NaiveDate,
}

/// payment ledger: one payment per due, receipt numbering per association/year
#[derive(Debug, Default)]
pub struct PaymentLedger {
    payments: BTreeMap<PaymentId, Payment>,
    by_due: HashMap<DueId, PaymentId>,
    receipts: ReceiptCounters,
}

impl PaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(input: &PaymentInput, today: NaiveDate) -> Result<()> {
        if input.amount.is_zero() || input.amount.is_negative() {
            return Err(DuesError::InvalidAmount {
                amount: input.amount,
            });
        }
        if input.paid_on > today {
            return Err(DuesError::PaymentDateInFuture {
                date: input.paid_on,
            });
        }
        Ok(())
    }

    /// record a payment and assign its receipt number.
    ///
    /// The one-to-one relation with the due is the at-most-once guard: a
    /// second payment for the same due is an integrity error.
    pub fn record(
        &mut self,
        input: PaymentInput,
        association_id: AssociationId,
        association_name: &str,
        recorded_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<PaymentId> {
        Self::validate(&input, now.date_naive())?;

        if self.by_due.contains_key(&input.due_id) {
            return Err(DuesError::PaymentAlreadyRecorded {
                due_id: input.due_id,
            });
        }

        let year = now.year();
        let sequence = self.receipts.next(association_id, year);
        let receipt_number =
            format_receipt_number(&association_prefix(association_name), year, sequence);

        let id = Uuid::new_v4();
        self.by_due.insert(input.due_id, id);
        self.payments.insert(
            id,
            Payment {
                id,
                due_id: input.due_id,
                amount: input.amount,
                method: input.method,
                reference: input.reference,
                paid_on: input.paid_on,
                recorded_by,
                recorded_at: now,
                receipt_number,
                receipt_generated: false,
            },
        );
        Ok(id)
    }

    pub fn get(&self, id: PaymentId) -> Result<&Payment> {
        self.payments
            .get(&id)
            .ok_or(DuesError::PaymentNotFound { id })
    }

    pub fn for_due(&self, due_id: DueId) -> Option<&Payment> {
        self.by_due.get(&due_id).and_then(|id| self.payments.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    /// flip the receipt-generated flag; the number itself never changes
    pub fn mark_receipt_generated(&mut self, id: PaymentId) -> Result<&Payment> {
        let payment = self
            .payments
            .get_mut(&id)
            .ok_or(DuesError::PaymentNotFound { id })?;
        payment.receipt_generated = true;
        Ok(payment)
    }
}

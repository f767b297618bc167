/// serializable read models for the presentation layer
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::engine::DuesEngine;
use crate::errors::Result;
use crate::types::{AssociationId, DueId, DueStatus, PaymentId, PlanTier};

/// one due as the web and API layers list it
#[derive(Debug, Serialize, Deserialize)]
pub struct DueView {
    pub id: DueId,
    pub unit_number: String,
    pub resident_name: Option<String>,
    pub dues_type: String,
    pub period: String,
    pub amount: Money,
    pub status: DueStatus,
    pub due_date: NaiveDate,
}

impl DueView {
    pub fn from_engine(engine: &DuesEngine, due_id: DueId) -> Result<Self> {
        let due = engine.dues_store().get(due_id)?;
        let unit = engine.registry().unit(due.unit_id)?;
        let dues_type = engine.catalog().get(due.dues_type_id)?;
        let resident_name = match unit.resident {
            Some(user_id) => Some(engine.registry().user(user_id)?.full_name.clone()),
            None => None,
        };

        Ok(DueView {
            id: due.id,
            unit_number: unit.number.clone(),
            resident_name,
            dues_type: dues_type.name.clone(),
            period: due.period.label(),
            amount: due.amount,
            status: due.status,
            due_date: due.due_date,
        })
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// one payment with its settled due
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: PaymentId,
    pub amount: Money,
    pub method: String,
    pub paid_on: NaiveDate,
    pub reference: Option<String>,
    pub receipt_number: String,
    pub receipt_generated: bool,
    pub due: DueView,
}

impl PaymentView {
    pub fn from_engine(engine: &DuesEngine, payment_id: PaymentId) -> Result<Self> {
        let payment = engine.ledger().get(payment_id)?;
        let due = DueView::from_engine(engine, payment.due_id)?;

        Ok(PaymentView {
            id: payment.id,
            amount: payment.amount,
            method: payment.method.label().to_string(),
            paid_on: payment.paid_on,
            reference: payment.reference.clone(),
            receipt_number: payment.receipt_number.clone(),
            receipt_generated: payment.receipt_generated,
            due,
        })
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// dashboard snapshot of one association
#[derive(Debug, Serialize, Deserialize)]
pub struct AssociationView {
    pub id: AssociationId,
    pub name: String,
    pub address: String,
    pub plan: PlanTier,
    pub active: bool,
    pub unit_count: usize,
    pub dues: DuesSummaryView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DuesSummaryView {
    pub total: usize,
    pub open: usize,
    pub paid: usize,
    pub overdue: usize,
    pub cancelled: usize,
    pub total_billed: Money,
    pub total_collected: Money,
    pub collection_rate: Rate,
}

impl AssociationView {
    pub fn from_engine(engine: &DuesEngine, association_id: AssociationId) -> Result<Self> {
        let association = engine.registry().association(association_id)?;
        let units = engine.registry().units_of(association_id);

        let mut summary = DuesSummaryView {
            total: 0,
            open: 0,
            paid: 0,
            overdue: 0,
            cancelled: 0,
            total_billed: Money::ZERO,
            total_collected: Money::ZERO,
            collection_rate: Rate::ZERO,
        };

        for unit in &units {
            for due in engine.dues_store().for_unit(unit.id) {
                summary.total += 1;
                match due.status {
                    DueStatus::Due => summary.open += 1,
                    DueStatus::Paid => summary.paid += 1,
                    DueStatus::Overdue => summary.overdue += 1,
                    DueStatus::Cancelled => summary.cancelled += 1,
                }
                if due.status != DueStatus::Cancelled {
                    summary.total_billed += due.amount;
                }
                if let Some(payment) = engine.ledger().for_due(due.id) {
                    summary.total_collected += payment.amount;
                }
            }
        }
        summary.collection_rate =
            Rate::from_ratio(summary.total_collected, summary.total_billed);

        Ok(AssociationView {
            id: association.id,
            name: association.name.clone(),
            address: association.address.clone(),
            plan: association.plan,
            active: association.active,
            unit_count: units.len(),
            dues: summary,
        })
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

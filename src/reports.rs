use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::dues::Due;
use crate::errors::{DuesError, Result};
use crate::payments::PaymentLedger;
use crate::period::Period;
use crate::types::{
    AssociationId, DueStatus, PaymentMethod, ReportFormat, ReportId, ReportKind, ReportStatus,
    UserId,
};

/// aggregated dues and payment figures for one association and window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub association_id: AssociationId,
    pub period: Period,
    pub kind: ReportKind,
    pub months: u32,
    pub dues_count: u32,
    pub open_count: u32,
    pub paid_count: u32,
    pub overdue_count: u32,
    pub cancelled_count: u32,
    pub total_billed: Money,
    pub total_collected: Money,
    pub outstanding: Money,
    pub by_method: Vec<(PaymentMethod, Money)>,
    pub collection_rate: Rate,
}

/// aggregate the dues falling inside the report window.
///
/// Cancelled dues count but do not bill; collected sums the payments
/// attached to the window's dues, whatever their recording date.
pub fn aggregate(
    association_id: AssociationId,
    period: Period,
    kind: ReportKind,
    dues: &[&Due],
    ledger: &PaymentLedger,
) -> ReportData {
    let months = kind.months();
    let mut data = ReportData {
        association_id,
        period,
        kind,
        months,
        dues_count: 0,
        open_count: 0,
        paid_count: 0,
        overdue_count: 0,
        cancelled_count: 0,
        total_billed: Money::ZERO,
        total_collected: Money::ZERO,
        outstanding: Money::ZERO,
        by_method: Vec::new(),
        collection_rate: Rate::ZERO,
    };

    let mut methods: BTreeMap<PaymentMethod, Money> = BTreeMap::new();

    for due in dues {
        if !period.contains(due.period.start(), months) {
            continue;
        }
        data.dues_count += 1;
        match due.status {
            DueStatus::Due => data.open_count += 1,
            DueStatus::Paid => data.paid_count += 1,
            DueStatus::Overdue => data.overdue_count += 1,
            DueStatus::Cancelled => data.cancelled_count += 1,
        }
        if due.status != DueStatus::Cancelled {
            data.total_billed += due.amount;
        }
        if let Some(payment) = ledger.for_due(due.id) {
            data.total_collected += payment.amount;
            *methods.entry(payment.method).or_insert(Money::ZERO) += payment.amount;
        }
    }

    data.outstanding = (data.total_billed - data.total_collected).max(Money::ZERO);
    data.by_method = methods.into_iter().collect();
    data.collection_rate = Rate::from_ratio(data.total_collected, data.total_billed);
    data
}

/// rendering collaborator; the engine owns aggregation and storage only
pub trait ReportRenderer {
    fn format(&self) -> ReportFormat;
    fn render(&self, data: &ReportData) -> Result<Vec<u8>>;
}

/// built-in CSV renderer
#[derive(Debug, Default)]
pub struct CsvRenderer;

impl ReportRenderer for CsvRenderer {
    fn format(&self) -> ReportFormat {
        ReportFormat::Csv
    }

    fn render(&self, data: &ReportData) -> Result<Vec<u8>> {
        let mut out = String::new();
        out.push_str("metric,value\n");
        out.push_str(&format!("period,{}\n", data.period));
        out.push_str(&format!("months,{}\n", data.months));
        out.push_str(&format!("dues_count,{}\n", data.dues_count));
        out.push_str(&format!("open_count,{}\n", data.open_count));
        out.push_str(&format!("paid_count,{}\n", data.paid_count));
        out.push_str(&format!("overdue_count,{}\n", data.overdue_count));
        out.push_str(&format!("cancelled_count,{}\n", data.cancelled_count));
        out.push_str(&format!("total_billed,{}\n", data.total_billed));
        out.push_str(&format!("total_collected,{}\n", data.total_collected));
        out.push_str(&format!("outstanding,{}\n", data.outstanding));
        out.push_str(&format!(
            "collection_rate,{}\n",
            data.collection_rate.as_percentage()
        ));
        for (method, amount) in &data.by_method {
            out.push_str(&format!("method_{},{}\n", method.label(), amount));
        }
        Ok(out.into_bytes())
    }
}

/// stored report artifact with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: ReportId,
    pub association_id: AssociationId,
    pub period: Period,
    pub kind: ReportKind,
    pub format: ReportFormat,
    pub status: ReportStatus,
    pub data: ReportData,
    pub artifact: Vec<u8>,
    pub size_bytes: u64,
    pub generated_by: UserId,
    pub generated_at: DateTime<Utc>,
}

impl ReportRecord {
    /// file size in human-readable form
    pub fn human_size(&self) -> String {
        let size = self.size_bytes;
        if size < 1024 {
            format!("{size} bytes")
        } else if size < 1024 * 1024 {
            format!("{:.1} KB", size as f64 / 1024.0)
        } else {
            format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
        }
    }
}

/// report store with (association, period, kind) uniqueness
#[derive(Debug, Default)]
pub struct ReportStore {
    records: BTreeMap<ReportId, ReportRecord>,
    keys: HashMap<(AssociationId, Period, ReportKind), ReportId>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ReportRecord) -> Result<ReportId> {
        let key = (record.association_id, record.period, record.kind);
        if self.keys.contains_key(&key) {
            return Err(DuesError::DuplicateReport {
                association_id: record.association_id,
                period: record.period.start(),
            });
        }
        let id = record.id;
        self.keys.insert(key, id);
        self.records.insert(id, record);
        Ok(id)
    }

    pub fn get(&self, id: ReportId) -> Result<&ReportRecord> {
        self.records
            .get(&id)
            .ok_or(DuesError::ReportNotFound { id })
    }

    pub fn for_association(&self, association_id: AssociationId) -> Vec<&ReportRecord> {
        self.records
            .values()
            .filter(|r| r.association_id == association_id)
            .collect()
    }
}

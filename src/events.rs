use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{
    AssociationId, DueId, DueStatus, DuesTypeId, NotificationChannel, NotificationId,
    NotificationStatus, PaymentId, PaymentMethod, Periodicity, ReportFormat, ReportId, ReportKind,
    UnitId, UserId,
};

/// all events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // registry events
    AssociationRegistered {
        association_id: AssociationId,
        name: String,
    },
    UnitRegistered {
        association_id: AssociationId,
        unit_id: UnitId,
        number: String,
    },
    ResidentLinked {
        unit_id: UnitId,
        user_id: UserId,
    },

    // catalog events
    DuesTypeDefined {
        association_id: AssociationId,
        dues_type_id: DuesTypeId,
        name: String,
        amount: Money,
        periodicity: Periodicity,
    },

    // dues lifecycle events
    DueCreated {
        due_id: DueId,
        unit_id: UnitId,
        dues_type_id: DuesTypeId,
        period: NaiveDate,
        amount: Money,
        due_date: NaiveDate,
    },
    DuesGenerated {
        association_id: AssociationId,
        period: NaiveDate,
        created: u32,
        skipped: u32,
    },
    StatusChanged {
        due_id: DueId,
        old_status: DueStatus,
        new_status: DueStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    DueCancelled {
        due_id: DueId,
        timestamp: DateTime<Utc>,
    },
    DueRescheduled {
        due_id: DueId,
        old_due_date: NaiveDate,
        new_due_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        due_id: DueId,
        amount: Money,
        method: PaymentMethod,
        receipt_number: String,
        timestamp: DateTime<Utc>,
    },
    ReceiptIssued {
        payment_id: PaymentId,
        receipt_number: String,
        timestamp: DateTime<Utc>,
    },

    // notification events
    NotificationLogged {
        notification_id: NotificationId,
        channel: NotificationChannel,
        recipient: String,
        status: NotificationStatus,
        timestamp: DateTime<Utc>,
    },

    // report events
    ReportGenerated {
        report_id: ReportId,
        association_id: AssociationId,
        period: NaiveDate,
        kind: ReportKind,
        format: ReportFormat,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

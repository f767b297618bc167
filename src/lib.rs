pub mod config;
pub mod decimal;
pub mod dues;
pub mod engine;
pub mod errors;
pub mod events;
pub mod notifications;
pub mod payments;
pub mod period;
pub mod ratelimit;
pub mod registry;
pub mod reports;
pub mod types;
pub mod views;

// re-export key types
pub use config::{DueDatePolicy, EngineConfig, PenaltyPolicy, PlanCatalog, PlanSpec};
pub use decimal::{Money, Rate};
pub use engine::DuesEngine;
pub use errors::{DuesError, Result};
pub use events::{Event, EventStore};
pub use period::Period;
pub use dues::{
    Due, DuesCatalog, DuesStore, DuesType, GenerationOutcome, check_transition, evaluate_status,
};
pub use notifications::{
    DispatchError, LoggingSender, NotificationContext, NotificationLog, NotificationSender,
    NotificationTemplate, ReminderOutcome,
};
pub use payments::{Payment, PaymentInput, PaymentLedger};
pub use registry::{Association, Registry, Unit, User};
pub use reports::{CsvRenderer, ReportData, ReportRecord, ReportRenderer};
pub use types::{
    ActorScope, AssociationId, DueId, DueStatus, DuesTypeId, Feature, NotificationChannel,
    NotificationStatus, PaymentId, PaymentMethod, Periodicity, PlanTier, ReportFormat, ReportId,
    ReportKind, ReportStatus, Role, UnitId, UserId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DuesError, Result};

/// unique identifier for an association
pub type AssociationId = Uuid;
/// unique identifier for a unit (logement)
pub type UnitId = Uuid;
/// unique identifier for a dues type
pub type DuesTypeId = Uuid;
/// unique identifier for a due
pub type DueId = Uuid;
/// unique identifier for a payment
pub type PaymentId = Uuid;
/// unique identifier for a user
pub type UserId = Uuid;
/// unique identifier for a notification template
pub type TemplateId = Uuid;
/// unique identifier for a notification log entry
pub type NotificationId = Uuid;
/// unique identifier for a generated report
pub type ReportId = Uuid;

/// user roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// platform operator
    SuperAdmin,
    /// principal administrator of one association
    AssociationAdmin,
    /// occupant of a unit
    Resident,
}

/// billing periodicity of a dues type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Periodicity {
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl Periodicity {
    /// length of one billing interval in calendar months
    pub fn months(&self) -> u32 {
        match self {
            Periodicity::Monthly => 1,
            Periodicity::Quarterly => 3,
            Periodicity::Semiannual => 6,
            Periodicity::Annual => 12,
        }
    }
}

/// due status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DueStatus {
    /// created, awaiting payment
    Due,
    /// settled by a payment
    Paid,
    /// past its due date and still unpaid
    Overdue,
    /// voided by an admin, never payable again
    Cancelled,
}

impl DueStatus {
    /// terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, DueStatus::Paid | DueStatus::Cancelled)
    }

    /// display label used in notifications and exports
    pub fn label(&self) -> &'static str {
        match self {
            DueStatus::Due => "due",
            DueStatus::Paid => "paid",
            DueStatus::Overdue => "overdue",
            DueStatus::Cancelled => "cancelled",
        }
    }
}

/// payment methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Check,
    Card,
    Online,
    Adjustment,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Card => "card",
            PaymentMethod::Online => "online",
            PaymentMethod::Adjustment => "adjustment",
        }
    }
}

/// subscription plan tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlanTier {
    Basic,
    Silver,
    Gold,
}

/// features gated by the plan catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    Dues,
    ManualPayments,
    Email,
    SimpleReports,
    Expenses,
    MultiAdmins,
    Sms,
    ExcelExport,
    OnlinePayment,
    Surveys,
    AdvancedStats,
}

/// notification channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationChannel {
    Email,
    Sms,
}

/// outcome of a notification dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    Pending,
    Sent,
    Error,
    Cancelled,
}

/// report aggregation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    Monthly,
    Quarterly,
    Annual,
    Custom,
}

impl ReportKind {
    /// aggregation window in months; custom reports cover a single month
    pub fn months(&self) -> u32 {
        match self {
            ReportKind::Monthly | ReportKind::Custom => 1,
            ReportKind::Quarterly => 3,
            ReportKind::Annual => 12,
        }
    }
}

/// report artifact format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Pdf,
    Excel,
    Csv,
}

/// report generation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    InProgress,
    Generated,
    Error,
}

/// capability scope resolved once at the presentation boundary.
///
/// Engine operations take a scope instead of re-branching on role strings;
/// an association admin arrives here already narrowed to their association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorScope {
    /// platform super-admin, unrestricted
    Platform,
    /// admin of exactly one association
    Association(AssociationId),
    /// resident, read access to their own unit only
    Resident(UserId),
}

impl ActorScope {
    /// whether this scope may manage the given association's data
    pub fn can_manage(&self, association_id: AssociationId) -> bool {
        match self {
            ActorScope::Platform => true,
            ActorScope::Association(id) => *id == association_id,
            ActorScope::Resident(_) => false,
        }
    }

    /// reject scopes that cannot manage the given association
    pub fn authorize(&self, association_id: AssociationId) -> Result<()> {
        if self.can_manage(association_id) {
            Ok(())
        } else {
            Err(DuesError::AccessDenied)
        }
    }

    /// reject everything below platform scope
    pub fn authorize_platform(&self) -> Result<()> {
        match self {
            ActorScope::Platform => Ok(()),
            _ => Err(DuesError::AccessDenied),
        }
    }

    /// the resident user id, if this is a resident scope
    pub fn resident(&self) -> Option<UserId> {
        match self {
            ActorScope::Resident(id) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_capabilities() {
        let association_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(ActorScope::Platform.can_manage(association_id));
        assert!(ActorScope::Association(association_id).can_manage(association_id));
        assert!(!ActorScope::Association(other).can_manage(association_id));
        assert!(!ActorScope::Resident(Uuid::new_v4()).can_manage(association_id));

        assert!(ActorScope::Association(association_id).authorize_platform().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DueStatus::Paid.is_terminal());
        assert!(DueStatus::Cancelled.is_terminal());
        assert!(!DueStatus::Due.is_terminal());
        assert!(!DueStatus::Overdue.is_terminal());
    }
}

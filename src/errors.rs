use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{DueStatus, Feature, PlanTier, Role};

#[derive(Error, Debug)]
pub enum DuesError {
    #[error("association not found: {id}")]
    AssociationNotFound {
        id: Uuid,
    },

    #[error("association inactive: {id}")]
    AssociationInactive {
        id: Uuid,
    },

    #[error("unit not found: {id}")]
    UnitNotFound {
        id: Uuid,
    },

    #[error("user not found: {id}")]
    UserNotFound {
        id: Uuid,
    },

    #[error("dues type not found: {id}")]
    DuesTypeNotFound {
        id: Uuid,
    },

    #[error("dues type inactive: {id}")]
    DuesTypeInactive {
        id: Uuid,
    },

    #[error("due not found: {id}")]
    DueNotFound {
        id: Uuid,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: Uuid,
    },

    #[error("template not found: {id}")]
    TemplateNotFound {
        id: Uuid,
    },

    #[error("report not found: {id}")]
    ReportNotFound {
        id: Uuid,
    },

    #[error("duplicate username: {username}")]
    DuplicateUsername {
        username: String,
    },

    #[error("duplicate dues type name: {name}")]
    DuplicateDuesTypeName {
        name: String,
    },

    #[error("duplicate unit number: {number}")]
    DuplicateUnitNumber {
        number: String,
    },

    #[error("due already exists for unit {unit_id}, period {period}")]
    DuplicateDue {
        unit_id: Uuid,
        period: NaiveDate,
    },

    #[error("payment already recorded for due {due_id}")]
    PaymentAlreadyRecorded {
        due_id: Uuid,
    },

    #[error("resident already linked to a unit: {user_id}")]
    ResidentAlreadyLinked {
        user_id: Uuid,
    },

    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("payment date in the future: {date}")]
    PaymentDateInFuture {
        date: NaiveDate,
    },

    #[error("invalid period: {date} is not the first day of a month")]
    InvalidPeriod {
        date: NaiveDate,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("invalid phone number: {value}")]
    InvalidPhoneNumber {
        value: String,
    },

    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidStatusTransition {
        from: DueStatus,
        to: DueStatus,
    },

    #[error("dues type {id} still referenced by {count} dues")]
    DuesTypeInUse {
        id: Uuid,
        count: usize,
    },

    #[error("unit capacity reached: plan allows {limit} units")]
    UnitCapacityReached {
        limit: u32,
    },

    #[error("operation requires role {expected:?}, user has {actual:?}")]
    RoleMismatch {
        expected: Role,
        actual: Role,
    },

    #[error("access denied")]
    AccessDenied,

    #[error("feature {feature:?} not available on plan {plan:?}")]
    FeatureNotAvailable {
        feature: Feature,
        plan: PlanTier,
    },

    #[error("report already generated for association {association_id}, period {period}")]
    DuplicateReport {
        association_id: Uuid,
        period: NaiveDate,
    },

    #[error("invalid template: {message}")]
    InvalidTemplate {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, DuesError>;

pub mod catalog;
pub mod generation;
pub mod status;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::period::Period;
use crate::types::{DueId, DueStatus, DuesTypeId, UnitId};

pub use catalog::{DuesCatalog, DuesType};
pub use generation::GenerationOutcome;
pub use status::{check_transition, evaluate_status};

/// one instance of an obligation to pay: one unit, one dues type, one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Due {
    pub id: DueId,
    pub unit_id: UnitId,
    pub dues_type_id: DuesTypeId,
    pub period: Period,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: DueStatus,
    pub created_at: DateTime<Utc>,
}

impl Due {
    /// open dues are still payable
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// whole days past the due date, zero when not yet due
    pub fn days_overdue(&self, as_of: NaiveDate) -> u32 {
        if as_of > self.due_date {
            (as_of - self.due_date).num_days() as u32
        } else {
            0
        }
    }
}

/// due store enforcing the (unit, dues type, period) uniqueness at insert
#[derive(Debug, Default)]
pub struct DuesStore {
    dues: BTreeMap<DueId, Due>,
    keys: HashMap<(UnitId, DuesTypeId, Period), DueId>,
}

impl DuesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// insert a due; a second due for the same key is an integrity error
    pub fn insert(&mut self, due: Due) -> Result<DueId> {
        let key = (due.unit_id, due.dues_type_id, due.period);
        if self.keys.contains_key(&key) {
            return Err(DuesError::DuplicateDue {
                unit_id: due.unit_id,
                period: due.period.start(),
            });
        }
        let id = due.id;
        self.keys.insert(key, id);
        self.dues.insert(id, due);
        Ok(id)
    }

    pub fn contains(&self, unit_id: UnitId, dues_type_id: DuesTypeId, period: Period) -> bool {
        self.keys.contains_key(&(unit_id, dues_type_id, period))
    }

    pub fn get(&self, id: DueId) -> Result<&Due> {
        self.dues.get(&id).ok_or(DuesError::DueNotFound { id })
    }

    pub fn get_mut(&mut self, id: DueId) -> Result<&mut Due> {
        self.dues.get_mut(&id).ok_or(DuesError::DueNotFound { id })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Due> {
        self.dues.values()
    }

    pub fn ids(&self) -> Vec<DueId> {
        self.dues.keys().copied().collect()
    }

    pub fn for_unit(&self, unit_id: UnitId) -> Vec<&Due> {
        self.dues.values().filter(|d| d.unit_id == unit_id).collect()
    }

    /// number of dues referencing a dues type, for the referential guard
    pub fn count_for_type(&self, dues_type_id: DuesTypeId) -> usize {
        self.dues
            .values()
            .filter(|d| d.dues_type_id == dues_type_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.dues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dues.is_empty()
    }
}

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::types::{AssociationId, DuesTypeId, Periodicity};

/// recurring-charge template defined per association
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuesType {
    pub id: DuesTypeId,
    pub association_id: AssociationId,
    pub name: String,
    pub amount: Money,
    pub periodicity: Periodicity,
    pub active: bool,
}

/// dues-type catalog enforcing name uniqueness per association
#[derive(Debug, Default)]
pub struct DuesCatalog {
    types: BTreeMap<DuesTypeId, DuesType>,
    names: HashMap<(AssociationId, String), DuesTypeId>,
}

impl DuesCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        &mut self,
        association_id: AssociationId,
        name: String,
        amount: Money,
        periodicity: Periodicity,
    ) -> Result<DuesTypeId> {
        if amount.is_zero() || amount.is_negative() {
            return Err(DuesError::InvalidAmount { amount });
        }

        let name = name.trim().to_string();
        let key = (association_id, name.clone());
        if self.names.contains_key(&key) {
            return Err(DuesError::DuplicateDuesTypeName { name });
        }

        let id = Uuid::new_v4();
        self.names.insert(key, id);
        self.types.insert(
            id,
            DuesType {
                id,
                association_id,
                name,
                amount,
                periodicity,
                active: true,
            },
        );
        Ok(id)
    }

    pub fn get(&self, id: DuesTypeId) -> Result<&DuesType> {
        self.types.get(&id).ok_or(DuesError::DuesTypeNotFound { id })
    }

    pub fn set_active(&mut self, id: DuesTypeId, active: bool) -> Result<()> {
        let dues_type = self
            .types
            .get_mut(&id)
            .ok_or(DuesError::DuesTypeNotFound { id })?;
        dues_type.active = active;
        Ok(())
    }

    pub fn set_amount(&mut self, id: DuesTypeId, amount: Money) -> Result<()> {
        if amount.is_zero() || amount.is_negative() {
            return Err(DuesError::InvalidAmount { amount });
        }
        let dues_type = self
            .types
            .get_mut(&id)
            .ok_or(DuesError::DuesTypeNotFound { id })?;
        dues_type.amount = amount;
        Ok(())
    }

    /// active dues types of one association
    pub fn active_for(&self, association_id: AssociationId) -> Vec<&DuesType> {
        self.types
            .values()
            .filter(|t| t.association_id == association_id && t.active)
            .collect()
    }

    /// remove a dues type; `referenced` is the number of dues pointing at it
    pub fn remove(&mut self, id: DuesTypeId, referenced: usize) -> Result<()> {
        if referenced > 0 {
            return Err(DuesError::DuesTypeInUse {
                id,
                count: referenced,
            });
        }
        let dues_type = self
            .types
            .remove(&id)
            .ok_or(DuesError::DuesTypeNotFound { id })?;
        self.names
            .remove(&(dues_type.association_id, dues_type.name));
        Ok(())
    }
}

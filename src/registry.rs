use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::types::{AssociationId, PlanTier, Role, UnitId, UserId};

/// platform user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// residential association, the billing tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub id: AssociationId,
    pub name: String,
    pub address: String,
    pub plan: PlanTier,
    pub admin: UserId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// billable dwelling within an association
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub association_id: AssociationId,
    pub number: String,
    pub resident: Option<UserId>,
    pub surface: Option<Decimal>,
    /// overrides the dues type amount for this unit when set
    pub dues_override: Option<Money>,
}

/// validate a phone number: +213 or 0, then a 9-digit mobile starting 5/6/7
pub fn validate_phone(value: &str) -> Result<()> {
    let rest = value
        .strip_prefix("+213")
        .or_else(|| value.strip_prefix('0'))
        .ok_or_else(|| DuesError::InvalidPhoneNumber {
            value: value.to_string(),
        })?;

    let valid = rest.len() == 9
        && rest.chars().all(|c| c.is_ascii_digit())
        && matches!(rest.as_bytes()[0], b'5' | b'6' | b'7');

    if valid {
        Ok(())
    } else {
        Err(DuesError::InvalidPhoneNumber {
            value: value.to_string(),
        })
    }
}

/// identity store and association registry
#[derive(Debug, Default)]
pub struct Registry {
    users: BTreeMap<UserId, User>,
    associations: BTreeMap<AssociationId, Association>,
    units: BTreeMap<UnitId, Unit>,
    usernames: HashMap<String, UserId>,
    unit_numbers: HashMap<(AssociationId, String), UnitId>,
    resident_units: HashMap<UserId, UnitId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(
        &mut self,
        username: String,
        full_name: String,
        email: Option<String>,
        phone: Option<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<UserId> {
        if self.usernames.contains_key(&username) {
            return Err(DuesError::DuplicateUsername { username });
        }
        if let Some(phone) = phone.as_deref() {
            validate_phone(phone)?;
        }

        let id = Uuid::new_v4();
        self.usernames.insert(username.clone(), id);
        self.users.insert(
            id,
            User {
                id,
                username,
                full_name,
                email,
                phone,
                role,
                created_at: now,
            },
        );
        Ok(id)
    }

    pub fn user(&self, id: UserId) -> Result<&User> {
        self.users.get(&id).ok_or(DuesError::UserNotFound { id })
    }

    pub fn register_association(
        &mut self,
        name: String,
        address: String,
        plan: PlanTier,
        admin: UserId,
        now: DateTime<Utc>,
    ) -> Result<AssociationId> {
        let admin_user = self.user(admin)?;
        if admin_user.role != Role::AssociationAdmin {
            return Err(DuesError::RoleMismatch {
                expected: Role::AssociationAdmin,
                actual: admin_user.role,
            });
        }

        let id = Uuid::new_v4();
        self.associations.insert(
            id,
            Association {
                id,
                name,
                address,
                plan,
                admin,
                active: true,
                created_at: now,
            },
        );
        Ok(id)
    }

    pub fn association(&self, id: AssociationId) -> Result<&Association> {
        self.associations
            .get(&id)
            .ok_or(DuesError::AssociationNotFound { id })
    }

    /// like `association` but rejects inactive tenants
    pub fn active_association(&self, id: AssociationId) -> Result<&Association> {
        let association = self.association(id)?;
        if !association.active {
            return Err(DuesError::AssociationInactive { id });
        }
        Ok(association)
    }

    pub fn active_associations(&self) -> impl Iterator<Item = &Association> {
        self.associations.values().filter(|a| a.active)
    }

    pub fn set_association_active(&mut self, id: AssociationId, active: bool) -> Result<()> {
        let association = self
            .associations
            .get_mut(&id)
            .ok_or(DuesError::AssociationNotFound { id })?;
        association.active = active;
        Ok(())
    }

    pub fn add_unit(
        &mut self,
        association_id: AssociationId,
        number: String,
        surface: Option<Decimal>,
        dues_override: Option<Money>,
        max_units: u32,
    ) -> Result<UnitId> {
        self.association(association_id)?;

        let key = (association_id, number.clone());
        if self.unit_numbers.contains_key(&key) {
            return Err(DuesError::DuplicateUnitNumber { number });
        }
        if self.unit_count(association_id) as u32 >= max_units {
            return Err(DuesError::UnitCapacityReached { limit: max_units });
        }
        if let Some(amount) = dues_override {
            if !amount.is_positive() || amount.is_zero() {
                return Err(DuesError::InvalidAmount { amount });
            }
        }

        let id = Uuid::new_v4();
        self.unit_numbers.insert(key, id);
        self.units.insert(
            id,
            Unit {
                id,
                association_id,
                number,
                resident: None,
                surface,
                dues_override,
            },
        );
        Ok(id)
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit> {
        self.units.get(&id).ok_or(DuesError::UnitNotFound { id })
    }

    pub fn units_of(&self, association_id: AssociationId) -> Vec<&Unit> {
        self.units
            .values()
            .filter(|u| u.association_id == association_id)
            .collect()
    }

    pub fn unit_count(&self, association_id: AssociationId) -> usize {
        self.units
            .values()
            .filter(|u| u.association_id == association_id)
            .count()
    }

    /// link a resident to a unit; one unit per resident, one resident per unit
    pub fn link_resident(&mut self, unit_id: UnitId, user_id: UserId) -> Result<()> {
        let user = self.user(user_id)?;
        if user.role != Role::Resident {
            return Err(DuesError::RoleMismatch {
                expected: Role::Resident,
                actual: user.role,
            });
        }
        if self.resident_units.contains_key(&user_id) {
            return Err(DuesError::ResidentAlreadyLinked { user_id });
        }

        let unit = self
            .units
            .get_mut(&unit_id)
            .ok_or(DuesError::UnitNotFound { id: unit_id })?;
        if let Some(previous) = unit.resident.take() {
            self.resident_units.remove(&previous);
        }
        unit.resident = Some(user_id);
        self.resident_units.insert(user_id, unit_id);
        Ok(())
    }

    pub fn unlink_resident(&mut self, unit_id: UnitId) -> Result<()> {
        let unit = self
            .units
            .get_mut(&unit_id)
            .ok_or(DuesError::UnitNotFound { id: unit_id })?;
        if let Some(user_id) = unit.resident.take() {
            self.resident_units.remove(&user_id);
        }
        Ok(())
    }

    /// the unit a resident is linked to, if any
    pub fn resident_unit(&self, user_id: UserId) -> Option<UnitId> {
        self.resident_units.get(&user_id).copied()
    }
}

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dues::catalog::{DuesCatalog, DuesType};
use crate::dues::{Due, DuesStore};
use crate::errors::{DuesError, Result};
use crate::events::{Event, EventStore};
use crate::period::Period;
use crate::registry::Registry;
use crate::types::{AssociationId, DueStatus, DuesTypeId};

/// result of one generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationOutcome {
    pub created: u32,
    pub skipped: u32,
}

impl GenerationOutcome {
    pub fn merge(&mut self, other: GenerationOutcome) {
        self.created += other.created;
        self.skipped += other.skipped;
    }
}

/// ensure one due exists per (active unit x active dues type) for the period.
///
/// Each upsert is independent: an existing row is skipped, a fresh one is
/// created with the type's amount or the unit override. Re-running for an
/// already generated period creates nothing.
pub(crate) fn generate_for_association(
    registry: &Registry,
    catalog: &DuesCatalog,
    dues: &mut DuesStore,
    config: &EngineConfig,
    events: &mut EventStore,
    association_id: AssociationId,
    period: Period,
    only_type: Option<DuesTypeId>,
    now: DateTime<Utc>,
) -> Result<GenerationOutcome> {
    let scope: Vec<&DuesType> = match only_type {
        Some(id) => {
            let dues_type = catalog.get(id)?;
            if dues_type.association_id != association_id {
                return Err(DuesError::DuesTypeNotFound { id });
            }
            if !dues_type.active {
                return Err(DuesError::DuesTypeInactive { id });
            }
            vec![dues_type]
        }
        None => catalog.active_for(association_id),
    };

    let mut outcome = GenerationOutcome::default();

    for dues_type in scope {
        let due_date = period.due_date(dues_type.periodicity, config.due_date_policy);

        for unit in registry.units_of(association_id) {
            if dues.contains(unit.id, dues_type.id, period) {
                outcome.skipped += 1;
                continue;
            }

            let amount = unit.dues_override.unwrap_or(dues_type.amount);
            let due = Due {
                id: Uuid::new_v4(),
                unit_id: unit.id,
                dues_type_id: dues_type.id,
                period,
                amount,
                due_date,
                status: DueStatus::Due,
                created_at: now,
            };

            match dues.insert(due) {
                Ok(due_id) => {
                    outcome.created += 1;
                    events.emit(Event::DueCreated {
                        due_id,
                        unit_id: unit.id,
                        dues_type_id: dues_type.id,
                        period: period.start(),
                        amount,
                        due_date,
                    });
                }
                // concurrent generation for the same key: already done, skip
                Err(DuesError::DuplicateDue { .. }) => outcome.skipped += 1,
                Err(other) => return Err(other),
            }
        }
    }

    events.emit(Event::DuesGenerated {
        association_id,
        period: period.start(),
        created: outcome.created,
        skipped: outcome.skipped,
    });
    tracing::info!(
        %association_id,
        period = %period,
        created = outcome.created,
        skipped = outcome.skipped,
        "dues generation finished"
    );

    Ok(outcome)
}

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{Feature, PlanTier};

/// how a due date is derived from the billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DueDatePolicy {
    /// 10th of the month following the billing interval
    TenthOfFollowingPeriod,
    /// last day of the billing interval
    EndOfPeriod,
}

/// late-payment penalty policy, informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyPolicy {
    /// days past the due date before a penalty applies
    pub grace_days: u32,
    /// penalty as a fraction of the due amount
    pub rate: Rate,
}

impl PenaltyPolicy {
    pub fn new(grace_days: u32, rate: Rate) -> Self {
        Self { grace_days, rate }
    }
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            grace_days: 30,
            rate: Rate::from_percentage(5),
        }
    }
}

/// one plan tier's entitlements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSpec {
    pub name: String,
    pub features: BTreeSet<Feature>,
    pub max_units: u32,
    pub monthly_price: Money,
}

/// plan tier to entitlement mapping, injected at engine construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCatalog {
    specs: BTreeMap<PlanTier, PlanSpec>,
}

impl PlanCatalog {
    pub fn new(specs: BTreeMap<PlanTier, PlanSpec>) -> Self {
        Self { specs }
    }

    /// the standard three-tier catalog
    pub fn standard() -> Self {
        let basic_features: BTreeSet<Feature> = [
            Feature::Dues,
            Feature::ManualPayments,
            Feature::Email,
            Feature::SimpleReports,
        ]
        .into_iter()
        .collect();

        let mut silver_features = basic_features.clone();
        silver_features.extend([
            Feature::Expenses,
            Feature::MultiAdmins,
            Feature::Sms,
            Feature::ExcelExport,
        ]);

        let mut gold_features = silver_features.clone();
        gold_features.extend([
            Feature::OnlinePayment,
            Feature::Surveys,
            Feature::AdvancedStats,
        ]);

        let mut specs = BTreeMap::new();
        specs.insert(
            PlanTier::Basic,
            PlanSpec {
                name: "Basic".to_string(),
                features: basic_features,
                max_units: 50,
                monthly_price: Money::ZERO,
            },
        );
        specs.insert(
            PlanTier::Silver,
            PlanSpec {
                name: "Silver".to_string(),
                features: silver_features,
                max_units: 200,
                monthly_price: Money::from_major(2000),
            },
        );
        specs.insert(
            PlanTier::Gold,
            PlanSpec {
                name: "Gold".to_string(),
                features: gold_features,
                max_units: 1000,
                monthly_price: Money::from_major(5000),
            },
        );

        Self { specs }
    }

    pub fn spec(&self, tier: PlanTier) -> Option<&PlanSpec> {
        self.specs.get(&tier)
    }

    /// whether the tier includes the feature; unknown tiers allow nothing
    pub fn allows(&self, tier: PlanTier, feature: Feature) -> bool {
        self.specs
            .get(&tier)
            .map(|spec| spec.features.contains(&feature))
            .unwrap_or(false)
    }

    /// unit capacity for the tier; unknown tiers get zero
    pub fn max_units(&self, tier: PlanTier) -> u32 {
        self.specs.get(&tier).map(|spec| spec.max_units).unwrap_or(0)
    }
}

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub due_date_policy: DueDatePolicy,
    /// days past the due date before a reminder is sent
    pub reminder_grace_days: u32,
    /// dispatch attempts after which a failed notification stops being retried
    pub max_notification_attempts: u32,
    pub penalty: Option<PenaltyPolicy>,
    pub plans: PlanCatalog,
}

impl EngineConfig {
    /// standard configuration
    pub fn standard() -> Self {
        Self {
            due_date_policy: DueDatePolicy::TenthOfFollowingPeriod,
            reminder_grace_days: 7,
            max_notification_attempts: 3,
            penalty: Some(PenaltyPolicy::default()),
            plans: PlanCatalog::standard(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::standard()
    }
}

//! The quote record handed to the rendering layer.

use crate::{
    config::PricingOption,
    fields::FieldKey,
    frequency::{Frequency, FrequencyClass},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteResult {
    pub service_id:        String,
    pub config_version:    u32,
    pub frequency:         Frequency,
    pub frequency_class:   FrequencyClass,
    pub contract_months:   u32,
    pub rate_category:     String,
    pub commission_rate:   f64,
    pub selected_option:   Option<PricingOption>,
    pub volume_tier_active: bool,
    pub volume_tier_units: f64,

    // Money, rounded to cents.
    pub main_service_total:  f64,
    pub special_items_total: f64,
    pub per_visit:           f64,
    pub installation_total:  f64,
    pub one_time_addons_total: f64,
    pub first_visit:         f64,
    pub first_month:         f64,
    pub monthly_recurring:   f64,
    pub contract_total:      f64,
    /// Visit count used for visit-based contracts.
    pub total_visits:        Option<f64>,

    pub line_items: Vec<LineItem>,
    pub notes:      Vec<AppliedRule>,

    /// Value of every override-eligible field before any override on that
    /// field (upstream overrides already applied).
    pub computed:  BTreeMap<FieldKey, f64>,
    /// `override ?? computed` for every override-eligible field.
    pub effective: BTreeMap<FieldKey, f64>,
}

impl QuoteResult {
    pub fn has_rule(&self, code: RuleCode) -> bool {
        self.notes.iter().any(|n| n.code == code)
    }

    pub fn effective_value(&self, field: &FieldKey) -> Option<f64> {
        self.effective.get(field).copied()
    }

    pub fn computed_value(&self, field: &FieldKey) -> Option<f64> {
        self.computed.get(field).copied()
    }
}

/// One itemized per-visit or one-time line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub key:          String,
    pub display_name: String,
    pub quantity:     f64,
    pub rate:         f64,
    pub amount:       f64,
    pub one_time:     bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCode {
    VolumeTierApplied,
    VolumeTierForcedOff,
    VolumeTierUnavailable,
    AlternateOptionSelected,
    StandardOptionSelected,
    AlternateOptionUnavailable,
    AllInclusiveBundled,
    UnknownSpecialItem,
    UnknownAddon,
    RateCategoryFallback,
    MinimumChargeApplied,
    InstallationApplied,
    InstallationWaived,
    VolumeTierNoInstallation,
    ContractMonthsClamped,
    FrequencyFallback,
    OverrideApplied,
}

/// An explanatory note attached to a quote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedRule {
    pub code:    RuleCode,
    pub message: String,
}

impl AppliedRule {
    pub fn new(code: RuleCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for AppliedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

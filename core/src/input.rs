//! Operator-entered quote input.
//!
//! Deserialization is deliberately forgiving: the rendering layer posts form
//! values as they were typed. Numbers may arrive as strings, blanks or
//! garbage; all of those become 0 rather than an error. Unknown enum
//! selections become `None` and the calculator falls back to the configured
//! default.

use crate::{
    config::{FacilityCondition, PricingOption},
    frequency::Frequency,
    types::sanitize_quantity,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteInput {
    #[serde(deserialize_with = "lenient_f64")]
    pub unit_count: f64,
    /// Units flagged for volume-tier pricing. `None` means all units once the
    /// tier is active.
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub install_tier_units: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub area_sq_ft: f64,
    #[serde(deserialize_with = "lenient_counts")]
    pub special_items: BTreeMap<String, f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub plumbing_units: f64,
    pub all_inclusive: bool,
    pub needs_plumbing: bool,
    pub new_install: bool,
    #[serde(deserialize_with = "lenient_option")]
    pub forced_option: Option<PricingOption>,
    pub force_volume_tier: Option<bool>,
    #[serde(deserialize_with = "lenient_frequency")]
    pub frequency: Option<Frequency>,
    pub rate_category: Option<String>,
    /// Raw contract length; clamped against the config at calculation time.
    #[serde(deserialize_with = "lenient_f64")]
    pub contract_months: f64,
    #[serde(deserialize_with = "lenient_condition")]
    pub condition: FacilityCondition,
    pub one_time_addons: BTreeSet<String>,
}

impl Default for QuoteInput {
    fn default() -> Self {
        Self {
            unit_count:         0.0,
            install_tier_units: None,
            area_sq_ft:         0.0,
            special_items:      BTreeMap::new(),
            plumbing_units:     0.0,
            all_inclusive:      false,
            needs_plumbing:     false,
            new_install:        false,
            forced_option:      None,
            force_volume_tier:  None,
            frequency:          None,
            rate_category:      None,
            contract_months:    0.0,
            condition:          FacilityCondition::Normal,
            one_time_addons:    BTreeSet::new(),
        }
    }
}

impl QuoteInput {
    pub fn special_item_count(&self, key: &str) -> f64 {
        self.special_items
            .get(key)
            .copied()
            .map(sanitize_quantity)
            .unwrap_or(0.0)
    }

    /// Which base inputs differ between `self` and `next`. Quantities are
    /// compared after sanitizing, so NaN → 0 is not a change.
    pub fn changed_fields(&self, next: &QuoteInput) -> Vec<InputField> {
        let mut changed = Vec::new();
        let q = sanitize_quantity;

        if q(self.unit_count) != q(next.unit_count) {
            changed.push(InputField::UnitCount);
        }
        if self.install_tier_units.map(q) != next.install_tier_units.map(q) {
            changed.push(InputField::InstallTierUnits);
        }
        if q(self.area_sq_ft) != q(next.area_sq_ft) {
            changed.push(InputField::AreaSqFt);
        }
        let keys: BTreeSet<&String> = self
            .special_items
            .keys()
            .chain(next.special_items.keys())
            .collect();
        for key in keys {
            if self.special_item_count(key) != next.special_item_count(key) {
                changed.push(InputField::SpecialItemCount(key.clone()));
            }
        }
        if q(self.plumbing_units) != q(next.plumbing_units) {
            changed.push(InputField::PlumbingUnits);
        }
        if self.all_inclusive != next.all_inclusive {
            changed.push(InputField::AllInclusive);
        }
        if self.needs_plumbing != next.needs_plumbing {
            changed.push(InputField::NeedsPlumbing);
        }
        if self.new_install != next.new_install {
            changed.push(InputField::NewInstall);
        }
        if self.forced_option != next.forced_option {
            changed.push(InputField::ForcedOption);
        }
        if self.force_volume_tier != next.force_volume_tier {
            changed.push(InputField::ForceVolumeTier);
        }
        if self.frequency != next.frequency {
            changed.push(InputField::Frequency);
        }
        if self.rate_category != next.rate_category {
            changed.push(InputField::RateCategory);
        }
        if q(self.contract_months) != q(next.contract_months) {
            changed.push(InputField::ContractMonths);
        }
        if self.condition != next.condition {
            changed.push(InputField::Condition);
        }
        if self.one_time_addons != next.one_time_addons {
            changed.push(InputField::OneTimeAddons);
        }
        changed
    }
}

/// A base input an override may depend on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InputField {
    UnitCount,
    InstallTierUnits,
    AreaSqFt,
    SpecialItemCount(String),
    PlumbingUnits,
    AllInclusive,
    NeedsPlumbing,
    NewInstall,
    ForcedOption,
    ForceVolumeTier,
    Frequency,
    RateCategory,
    ContractMonths,
    Condition,
    OneTimeAddons,
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SpecialItemCount(key) => return write!(f, "special_item_count:{key}"),
            Self::UnitCount        => "unit_count",
            Self::InstallTierUnits => "install_tier_units",
            Self::AreaSqFt         => "area_sq_ft",
            Self::PlumbingUnits    => "plumbing_units",
            Self::AllInclusive     => "all_inclusive",
            Self::NeedsPlumbing    => "needs_plumbing",
            Self::NewInstall       => "new_install",
            Self::ForcedOption     => "forced_option",
            Self::ForceVolumeTier  => "force_volume_tier",
            Self::Frequency        => "frequency",
            Self::RateCategory     => "rate_category",
            Self::ContractMonths   => "contract_months",
            Self::Condition        => "condition",
            Self::OneTimeAddons    => "one_time_addons",
        };
        f.write_str(name)
    }
}

// ── Lenient deserializers ──────────────────────────────────────────

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value_to_f64(&value).map(sanitize_quantity).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Null => None,
        Value::String(ref s) if s.trim().is_empty() => None,
        other => Some(value_to_f64(&other).map(sanitize_quantity).unwrap_or(0.0)),
    })
}

fn lenient_counts<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, f64>, D::Error> {
    let value = Value::deserialize(d)?;
    let mut out = BTreeMap::new();
    if let Value::Object(map) = value {
        for (key, v) in map {
            out.insert(key, value_to_f64(&v).map(sanitize_quantity).unwrap_or(0.0));
        }
    }
    Ok(out)
}

fn lenient_option<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PricingOption>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_str().and_then(PricingOption::parse))
}

fn lenient_frequency<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Frequency>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_str().and_then(Frequency::parse))
}

fn lenient_condition<'de, D: Deserializer<'de>>(d: D) -> Result<FacilityCondition, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value
        .as_str()
        .and_then(FacilityCondition::parse)
        .unwrap_or_default())
}

//! Canonical pricing configuration.
//!
//! Calculation code only ever sees `PricingConfig`. Remote documents arrive in
//! several historical shapes; `config_shape` turns each of them into a
//! `PartialPricingConfig`, and `PartialPricingConfig::resolve` fills whatever
//! is still missing from the next source down (session cache, then the
//! compiled default).

use crate::frequency::{Frequency, FrequencyMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Canonical shape ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub service_id: String,
    pub version: u32,
    pub unit_pricing: UnitPricing,
    pub special_items: BTreeMap<String, SpecialItemRate>,
    pub plumbing_rate_per_unit: f64,
    pub installation: InstallationRates,
    pub one_time_addons: BTreeMap<String, f64>,
    pub rate_categories: BTreeMap<String, RateCategory>,
    pub default_rate_category: String,
    pub minimum_charge_per_visit: f64,
    pub contract: ContractBounds,
    pub default_frequency: Frequency,
    pub frequency_metadata: BTreeMap<Frequency, FrequencyMeta>,
}

/// Rates for the main countable (or area) driver of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPricing {
    /// Option A: flat rate per unit (or per sq ft) per visit.
    pub standard_rate: f64,
    /// Option B, when the service offers one.
    pub alternate: Option<AlternateRate>,
    pub volume_tier: Option<VolumeTier>,
}

/// Base charge plus a per-unit rate for every unit beyond `included_quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateRate {
    pub base_charge: f64,
    pub included_quantity: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeTier {
    /// Driver quantity at which the tier switches on (inclusive).
    pub threshold: f64,
    /// Per-unit per-visit rate for units serviced under the tier.
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialItemRate {
    pub display_name: String,
    pub rate_per_unit: f64,
    pub install_rate_per_unit: f64,
    pub bundled_when_all_inclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationRates {
    /// One-time charge per standard unit on a new install.
    pub rate_per_unit: f64,
    pub condition_multipliers: BTreeMap<FacilityCondition, f64>,
    /// Installation is waived entirely when the operator forces this option.
    pub waived_for_option: Option<PricingOption>,
}

impl InstallationRates {
    pub fn multiplier_for(&self, condition: FacilityCondition) -> f64 {
        self.condition_multipliers
            .get(&condition)
            .copied()
            .filter(|m| m.is_finite() && *m >= 0.0)
            .unwrap_or_else(|| condition.fallback_multiplier())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCategory {
    pub multiplier: f64,
    pub commission_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractBounds {
    pub min_months: u32,
    pub max_months: u32,
    pub default_months: u32,
    pub visit_rounding: VisitRounding,
}

impl ContractBounds {
    /// Clamp an operator-entered contract length. Non-finite input falls back
    /// to the default length before clamping.
    pub fn clamp(&self, raw_months: f64) -> u32 {
        let lo = self.min_months.min(self.max_months);
        let hi = self.max_months.max(self.min_months);
        let months = if raw_months.is_finite() && raw_months > 0.0 {
            raw_months.round()
        } else {
            self.default_months as f64
        };
        (months.max(lo as f64).min(hi as f64)) as u32
    }
}

/// Rounding applied to the visit count of visit-based contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitRounding {
    Exact,
    Floor,
    Ceil,
    Nearest,
}

impl VisitRounding {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "exact" | "none"           => Some(Self::Exact),
            "floor" | "down"           => Some(Self::Floor),
            "ceil" | "ceiling" | "up"  => Some(Self::Ceil),
            "nearest" | "round"        => Some(Self::Nearest),
            _ => None,
        }
    }

    pub fn apply(&self, visits: f64) -> f64 {
        match self {
            Self::Exact   => visits,
            Self::Floor   => visits.floor(),
            Self::Ceil    => visits.ceil(),
            Self::Nearest => visits.round(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityCondition {
    Normal,
    Moderate,
    Heavy,
}

impl FacilityCondition {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normal" | "clean" | "good"                  => Some(Self::Normal),
            "moderate" | "fair" | "medium"               => Some(Self::Moderate),
            "heavy" | "dirty" | "heavily_soiled" | "bad" => Some(Self::Heavy),
            _ => None,
        }
    }

    pub fn fallback_multiplier(&self) -> f64 {
        match self {
            Self::Normal   => 1.0,
            Self::Moderate => 1.5,
            Self::Heavy    => 3.0,
        }
    }
}

impl Default for FacilityCondition {
    fn default() -> Self {
        Self::Normal
    }
}

/// The two pricing shapes a service may offer for its main deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingOption {
    Standard,
    Alternate,
}

impl PricingOption {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" | "a" | "per_unit"           => Some(Self::Standard),
            "alternate" | "b" | "base_plus_unit"    => Some(Self::Alternate),
            _ => None,
        }
    }
}

// ── Partial shape (one source's view) ──────────────────────────────

/// One source's view of a config. Every field is optional so a document that
/// is missing (or mangles) a sub-field still contributes everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialPricingConfig {
    pub version: Option<u32>,
    pub standard_rate: Option<f64>,
    pub alternate_base_charge: Option<f64>,
    pub alternate_included_quantity: Option<f64>,
    pub alternate_rate: Option<f64>,
    pub volume_threshold: Option<f64>,
    pub volume_rate: Option<f64>,
    pub special_items: BTreeMap<String, PartialSpecialItem>,
    pub plumbing_rate_per_unit: Option<f64>,
    pub install_rate_per_unit: Option<f64>,
    pub condition_multipliers: BTreeMap<FacilityCondition, f64>,
    pub install_waived_for_option: Option<PricingOption>,
    pub one_time_addons: BTreeMap<String, f64>,
    pub rate_categories: BTreeMap<String, PartialRateCategory>,
    pub default_rate_category: Option<String>,
    pub minimum_charge_per_visit: Option<f64>,
    pub min_contract_months: Option<u32>,
    pub max_contract_months: Option<u32>,
    pub default_contract_months: Option<u32>,
    pub visit_rounding: Option<VisitRounding>,
    pub default_frequency: Option<Frequency>,
    pub frequency_metadata: BTreeMap<Frequency, PartialFrequencyMeta>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSpecialItem {
    pub display_name: Option<String>,
    pub rate_per_unit: Option<f64>,
    pub install_rate_per_unit: Option<f64>,
    pub bundled_when_all_inclusive: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRateCategory {
    pub multiplier: Option<f64>,
    pub commission_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialFrequencyMeta {
    pub monthly_multiplier: Option<f64>,
    pub annual_multiplier: Option<f64>,
    pub cycle_months: Option<f64>,
    pub visits_per_cycle: Option<f64>,
}

impl PartialPricingConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-by-field merge: values in `self` win, `lower` fills the gaps.
    pub fn layered_over(&self, lower: &PartialPricingConfig) -> PartialPricingConfig {
        let mut special_items = lower.special_items.clone();
        for (key, item) in &self.special_items {
            let merged = match lower.special_items.get(key) {
                Some(base) => PartialSpecialItem {
                    display_name: item.display_name.clone().or_else(|| base.display_name.clone()),
                    rate_per_unit: item.rate_per_unit.or(base.rate_per_unit),
                    install_rate_per_unit: item.install_rate_per_unit.or(base.install_rate_per_unit),
                    bundled_when_all_inclusive: item
                        .bundled_when_all_inclusive
                        .or(base.bundled_when_all_inclusive),
                },
                None => item.clone(),
            };
            special_items.insert(key.clone(), merged);
        }

        let mut rate_categories = lower.rate_categories.clone();
        for (key, cat) in &self.rate_categories {
            let merged = match lower.rate_categories.get(key) {
                Some(base) => PartialRateCategory {
                    multiplier: cat.multiplier.or(base.multiplier),
                    commission_rate: cat.commission_rate.or(base.commission_rate),
                },
                None => cat.clone(),
            };
            rate_categories.insert(key.clone(), merged);
        }

        let mut frequency_metadata = lower.frequency_metadata.clone();
        for (freq, meta) in &self.frequency_metadata {
            let merged = match lower.frequency_metadata.get(freq) {
                Some(base) => PartialFrequencyMeta {
                    monthly_multiplier: meta.monthly_multiplier.or(base.monthly_multiplier),
                    annual_multiplier: meta.annual_multiplier.or(base.annual_multiplier),
                    cycle_months: meta.cycle_months.or(base.cycle_months),
                    visits_per_cycle: meta.visits_per_cycle.or(base.visits_per_cycle),
                },
                None => meta.clone(),
            };
            frequency_metadata.insert(*freq, merged);
        }

        let mut condition_multipliers = lower.condition_multipliers.clone();
        condition_multipliers.extend(self.condition_multipliers.iter().map(|(k, v)| (*k, *v)));

        let mut one_time_addons = lower.one_time_addons.clone();
        one_time_addons.extend(self.one_time_addons.iter().map(|(k, v)| (k.clone(), *v)));

        PartialPricingConfig {
            version: self.version.or(lower.version),
            standard_rate: self.standard_rate.or(lower.standard_rate),
            alternate_base_charge: self.alternate_base_charge.or(lower.alternate_base_charge),
            alternate_included_quantity: self
                .alternate_included_quantity
                .or(lower.alternate_included_quantity),
            alternate_rate: self.alternate_rate.or(lower.alternate_rate),
            volume_threshold: self.volume_threshold.or(lower.volume_threshold),
            volume_rate: self.volume_rate.or(lower.volume_rate),
            special_items,
            plumbing_rate_per_unit: self.plumbing_rate_per_unit.or(lower.plumbing_rate_per_unit),
            install_rate_per_unit: self.install_rate_per_unit.or(lower.install_rate_per_unit),
            condition_multipliers,
            install_waived_for_option: self
                .install_waived_for_option
                .or(lower.install_waived_for_option),
            one_time_addons,
            rate_categories,
            default_rate_category: self
                .default_rate_category
                .clone()
                .or_else(|| lower.default_rate_category.clone()),
            minimum_charge_per_visit: self
                .minimum_charge_per_visit
                .or(lower.minimum_charge_per_visit),
            min_contract_months: self.min_contract_months.or(lower.min_contract_months),
            max_contract_months: self.max_contract_months.or(lower.max_contract_months),
            default_contract_months: self
                .default_contract_months
                .or(lower.default_contract_months),
            visit_rounding: self.visit_rounding.or(lower.visit_rounding),
            default_frequency: self.default_frequency.or(lower.default_frequency),
            frequency_metadata,
        }
    }

    /// Complete this partial view with the compiled default for the service.
    /// Sub-records that the partial view leaves half-filled take the missing
    /// halves from the default; items unknown to the default take zero rates.
    pub fn resolve(&self, defaults: &PricingConfig) -> PricingConfig {
        let d = defaults;

        let alternate = match (&d.unit_pricing.alternate, self.alternate_rate.is_some() || self.alternate_base_charge.is_some()) {
            (Some(base), _) => Some(AlternateRate {
                base_charge: self.alternate_base_charge.unwrap_or(base.base_charge),
                included_quantity: self
                    .alternate_included_quantity
                    .unwrap_or(base.included_quantity),
                rate: self.alternate_rate.unwrap_or(base.rate),
            }),
            (None, true) => Some(AlternateRate {
                base_charge: self.alternate_base_charge.unwrap_or(0.0),
                included_quantity: self.alternate_included_quantity.unwrap_or(0.0),
                rate: self.alternate_rate.unwrap_or(0.0),
            }),
            (None, false) => None,
        };

        let volume_tier = match (&d.unit_pricing.volume_tier, self.volume_threshold, self.volume_rate) {
            (Some(base), t, r) => Some(VolumeTier {
                threshold: t.unwrap_or(base.threshold),
                rate: r.unwrap_or(base.rate),
            }),
            (None, Some(threshold), Some(rate)) => Some(VolumeTier { threshold, rate }),
            (None, _, _) => None,
        };

        let mut special_items = d.special_items.clone();
        for (key, item) in &self.special_items {
            let base = d.special_items.get(key);
            special_items.insert(
                key.clone(),
                SpecialItemRate {
                    display_name: item
                        .display_name
                        .clone()
                        .or_else(|| base.map(|b| b.display_name.clone()))
                        .unwrap_or_else(|| humanize(key)),
                    rate_per_unit: item
                        .rate_per_unit
                        .or(base.map(|b| b.rate_per_unit))
                        .unwrap_or(0.0),
                    install_rate_per_unit: item
                        .install_rate_per_unit
                        .or(base.map(|b| b.install_rate_per_unit))
                        .unwrap_or(0.0),
                    bundled_when_all_inclusive: item
                        .bundled_when_all_inclusive
                        .or(base.map(|b| b.bundled_when_all_inclusive))
                        .unwrap_or(false),
                },
            );
        }

        let mut condition_multipliers = d.installation.condition_multipliers.clone();
        condition_multipliers.extend(self.condition_multipliers.iter().map(|(k, v)| (*k, *v)));

        let mut one_time_addons = d.one_time_addons.clone();
        one_time_addons.extend(self.one_time_addons.iter().map(|(k, v)| (k.clone(), *v)));

        let mut rate_categories = d.rate_categories.clone();
        for (key, cat) in &self.rate_categories {
            let base = d.rate_categories.get(key);
            rate_categories.insert(
                key.clone(),
                RateCategory {
                    multiplier: cat.multiplier.or(base.map(|b| b.multiplier)).unwrap_or(1.0),
                    commission_rate: cat
                        .commission_rate
                        .or(base.map(|b| b.commission_rate))
                        .unwrap_or(0.0),
                },
            );
        }

        let mut frequency_metadata = d.frequency_metadata.clone();
        for (freq, meta) in &self.frequency_metadata {
            let base = d
                .frequency_metadata
                .get(freq)
                .copied()
                .unwrap_or_else(|| freq.fallback_meta());
            frequency_metadata.insert(
                *freq,
                FrequencyMeta {
                    monthly_multiplier: meta.monthly_multiplier.unwrap_or(base.monthly_multiplier),
                    annual_multiplier: meta.annual_multiplier.unwrap_or(base.annual_multiplier),
                    cycle_months: meta.cycle_months.unwrap_or(base.cycle_months),
                    visits_per_cycle: meta.visits_per_cycle.unwrap_or(base.visits_per_cycle),
                },
            );
        }

        let default_rate_category = self
            .default_rate_category
            .clone()
            .filter(|k| rate_categories.contains_key(k))
            .unwrap_or_else(|| d.default_rate_category.clone());

        PricingConfig {
            service_id: d.service_id.clone(),
            version: self.version.unwrap_or(d.version),
            unit_pricing: UnitPricing {
                standard_rate: self.standard_rate.unwrap_or(d.unit_pricing.standard_rate),
                alternate,
                volume_tier,
            },
            special_items,
            plumbing_rate_per_unit: self
                .plumbing_rate_per_unit
                .unwrap_or(d.plumbing_rate_per_unit),
            installation: InstallationRates {
                rate_per_unit: self
                    .install_rate_per_unit
                    .unwrap_or(d.installation.rate_per_unit),
                condition_multipliers,
                waived_for_option: self
                    .install_waived_for_option
                    .or(d.installation.waived_for_option),
            },
            one_time_addons,
            rate_categories,
            default_rate_category,
            minimum_charge_per_visit: self
                .minimum_charge_per_visit
                .unwrap_or(d.minimum_charge_per_visit),
            contract: ContractBounds {
                min_months: self.min_contract_months.unwrap_or(d.contract.min_months),
                max_months: self.max_contract_months.unwrap_or(d.contract.max_months),
                default_months: self
                    .default_contract_months
                    .unwrap_or(d.contract.default_months),
                visit_rounding: self.visit_rounding.unwrap_or(d.contract.visit_rounding),
            },
            default_frequency: self.default_frequency.unwrap_or(d.default_frequency),
            frequency_metadata,
        }
    }
}

fn humanize(key: &str) -> String {
    key.split(|c| c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

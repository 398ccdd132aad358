//! Compiled static defaults, the last fallback layer of config resolution.
//!
//! Every known service has a descriptor and a complete `PricingConfig`.
//! Unknown service ids get the generic descriptor and an all-zero rate
//! schedule so a quote can still be produced (and shows $0).

use crate::{
    config::{
        AlternateRate, ContractBounds, FacilityCondition, InstallationRates, PricingConfig,
        PricingOption, RateCategory, SpecialItemRate, UnitPricing, VisitRounding, VolumeTier,
    },
    frequency::{Frequency, FrequencyMeta},
    strategy::{FirstVisitRule, PricingStrategy, ServiceDescriptor},
};
use std::collections::BTreeMap;

pub const KNOWN_SERVICES: [&str; 5] = [
    "drains",
    "restroom_hygiene",
    "janitorial",
    "window_washing",
    "floor_care",
];

pub fn is_known_service(service_id: &str) -> bool {
    KNOWN_SERVICES.contains(&service_id)
}

pub fn descriptor(service_id: &str) -> ServiceDescriptor {
    use FirstVisitRule::*;
    use PricingStrategy::*;
    match service_id {
        "drains" => ServiceDescriptor::new("drains", "Drain Line Service", "drain", PerUnit, InstallPlusService),
        "restroom_hygiene" => ServiceDescriptor::new(
            "restroom_hygiene", "Restroom Hygiene", "fixture", PerUnit, InstallCoversMainService,
        ),
        "janitorial" => ServiceDescriptor::new("janitorial", "Janitorial", "sq ft", PerArea, InstallCoversMainService),
        "window_washing" => ServiceDescriptor::new(
            "window_washing", "Window Washing", "window", PerUnit, InstallPlusService,
        ),
        "floor_care" => ServiceDescriptor::new("floor_care", "Floor Care", "sq ft", PerArea, InstallCoversMainService),
        other => ServiceDescriptor::new(other, "Custom Service", "unit", PerUnit, InstallPlusService),
    }
}

/// Complete default config for a service.
pub fn default_config(service_id: &str) -> PricingConfig {
    match service_id {
        "drains" => drains(),
        "restroom_hygiene" => restroom_hygiene(),
        "janitorial" => janitorial(),
        "window_washing" => window_washing(),
        "floor_care" => floor_care(),
        other => generic(other),
    }
}

// ── Shared tables ──────────────────────────────────────────────────

fn frequency_table() -> BTreeMap<Frequency, FrequencyMeta> {
    Frequency::ALL.iter().map(|f| (*f, f.fallback_meta())).collect()
}

fn condition_table(moderate: f64, heavy: f64) -> BTreeMap<FacilityCondition, f64> {
    [
        (FacilityCondition::Normal, 1.0),
        (FacilityCondition::Moderate, moderate),
        (FacilityCondition::Heavy, heavy),
    ]
    .into()
}

fn rate_categories() -> BTreeMap<String, RateCategory> {
    [
        ("standard".into(), RateCategory { multiplier: 1.0, commission_rate: 0.10 }),
        ("premium".into(), RateCategory { multiplier: 1.25, commission_rate: 0.15 }),
    ]
    .into()
}

fn contract() -> ContractBounds {
    ContractBounds {
        min_months: 2,
        max_months: 36,
        default_months: 12,
        visit_rounding: VisitRounding::Nearest,
    }
}

fn item(name: &str, rate: f64, install: f64, bundled: bool) -> SpecialItemRate {
    SpecialItemRate {
        display_name: name.into(),
        rate_per_unit: rate,
        install_rate_per_unit: install,
        bundled_when_all_inclusive: bundled,
    }
}

// ── Services ───────────────────────────────────────────────────────

fn drains() -> PricingConfig {
    PricingConfig {
        service_id: "drains".into(),
        version: 1,
        unit_pricing: UnitPricing {
            standard_rate: 10.0,
            alternate: Some(AlternateRate { base_charge: 20.0, included_quantity: 0.0, rate: 4.0 }),
            volume_tier: Some(VolumeTier { threshold: 10.0, rate: 20.0 }),
        },
        special_items: [
            ("grease_trap".into(), item("Grease Trap", 125.0, 300.0, false)),
            ("green_drain".into(), item("Green Drain", 5.0, 100.0, false)),
        ]
        .into(),
        plumbing_rate_per_unit: 10.0,
        installation: InstallationRates {
            rate_per_unit: 25.0,
            condition_multipliers: condition_table(1.5, 3.0),
            waived_for_option: None,
        },
        one_time_addons: [("camera_inspection".into(), 150.0)].into(),
        rate_categories: rate_categories(),
        default_rate_category: "standard".into(),
        minimum_charge_per_visit: 0.0,
        contract: contract(),
        default_frequency: Frequency::Weekly,
        frequency_metadata: frequency_table(),
    }
}

fn restroom_hygiene() -> PricingConfig {
    PricingConfig {
        service_id: "restroom_hygiene".into(),
        version: 1,
        unit_pricing: UnitPricing {
            standard_rate: 8.0,
            alternate: Some(AlternateRate { base_charge: 40.0, included_quantity: 0.0, rate: 3.0 }),
            volume_tier: Some(VolumeTier { threshold: 25.0, rate: 6.0 }),
        },
        special_items: [
            ("urinal_screen".into(), item("Urinal Screen", 4.0, 0.0, true)),
            ("air_freshener".into(), item("Air Freshener", 3.0, 0.0, true)),
            ("feminine_hygiene".into(), item("Feminine Hygiene Unit", 5.0, 15.0, false)),
        ]
        .into(),
        plumbing_rate_per_unit: 0.0,
        installation: InstallationRates {
            rate_per_unit: 10.0,
            condition_multipliers: condition_table(2.0, 3.0),
            waived_for_option: Some(PricingOption::Alternate),
        },
        one_time_addons: BTreeMap::new(),
        rate_categories: rate_categories(),
        default_rate_category: "standard".into(),
        minimum_charge_per_visit: 40.0,
        contract: contract(),
        default_frequency: Frequency::Weekly,
        frequency_metadata: frequency_table(),
    }
}

fn janitorial() -> PricingConfig {
    PricingConfig {
        service_id: "janitorial".into(),
        version: 1,
        unit_pricing: UnitPricing {
            standard_rate: 0.05,
            alternate: Some(AlternateRate { base_charge: 150.0, included_quantity: 2_500.0, rate: 0.04 }),
            volume_tier: Some(VolumeTier { threshold: 20_000.0, rate: 0.035 }),
        },
        special_items: [("trash_removal".into(), item("Trash Removal", 2.0, 0.0, true))].into(),
        plumbing_rate_per_unit: 0.0,
        installation: InstallationRates {
            rate_per_unit: 0.10,
            condition_multipliers: condition_table(1.5, 3.0),
            waived_for_option: None,
        },
        one_time_addons: [("supply_setup".into(), 75.0)].into(),
        rate_categories: rate_categories(),
        default_rate_category: "standard".into(),
        minimum_charge_per_visit: 50.0,
        contract: contract(),
        default_frequency: Frequency::Weekly,
        frequency_metadata: frequency_table(),
    }
}

fn window_washing() -> PricingConfig {
    PricingConfig {
        service_id: "window_washing".into(),
        version: 1,
        unit_pricing: UnitPricing {
            standard_rate: 6.0,
            alternate: None,
            volume_tier: Some(VolumeTier { threshold: 100.0, rate: 5.0 }),
        },
        special_items: [
            ("skylight".into(), item("Skylight", 15.0, 0.0, false)),
            ("high_access".into(), item("High Access Pane", 10.0, 0.0, false)),
        ]
        .into(),
        plumbing_rate_per_unit: 0.0,
        installation: InstallationRates {
            rate_per_unit: 3.0,
            condition_multipliers: condition_table(1.5, 3.0),
            waived_for_option: None,
        },
        one_time_addons: [("lift_rental".into(), 150.0)].into(),
        rate_categories: rate_categories(),
        default_rate_category: "standard".into(),
        minimum_charge_per_visit: 50.0,
        contract: contract(),
        default_frequency: Frequency::Monthly,
        frequency_metadata: frequency_table(),
    }
}

fn floor_care() -> PricingConfig {
    PricingConfig {
        service_id: "floor_care".into(),
        version: 1,
        unit_pricing: UnitPricing {
            standard_rate: 0.35,
            alternate: Some(AlternateRate { base_charge: 100.0, included_quantity: 500.0, rate: 0.30 }),
            volume_tier: Some(VolumeTier { threshold: 5_000.0, rate: 0.25 }),
        },
        special_items: [("stair_flight".into(), item("Stair Flight", 8.0, 20.0, false))].into(),
        plumbing_rate_per_unit: 0.0,
        installation: InstallationRates {
            rate_per_unit: 0.50,
            condition_multipliers: condition_table(1.5, 3.0),
            waived_for_option: None,
        },
        one_time_addons: BTreeMap::new(),
        rate_categories: rate_categories(),
        default_rate_category: "standard".into(),
        minimum_charge_per_visit: 75.0,
        contract: contract(),
        default_frequency: Frequency::Monthly,
        frequency_metadata: frequency_table(),
    }
}

fn generic(service_id: &str) -> PricingConfig {
    PricingConfig {
        service_id: service_id.into(),
        version: 0,
        unit_pricing: UnitPricing { standard_rate: 0.0, alternate: None, volume_tier: None },
        special_items: BTreeMap::new(),
        plumbing_rate_per_unit: 0.0,
        installation: InstallationRates {
            rate_per_unit: 0.0,
            condition_multipliers: condition_table(1.5, 3.0),
            waived_for_option: None,
        },
        one_time_addons: BTreeMap::new(),
        rate_categories: rate_categories(),
        default_rate_category: "standard".into(),
        minimum_charge_per_visit: 0.0,
        contract: contract(),
        default_frequency: Frequency::Weekly,
        frequency_metadata: frequency_table(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_service_has_a_consistent_default() {
        for id in KNOWN_SERVICES {
            let cfg = default_config(id);
            assert_eq!(cfg.service_id, id);
            assert!(cfg.rate_categories.contains_key(&cfg.default_rate_category));
            assert!(cfg.contract.min_months <= cfg.contract.max_months);
            assert_eq!(cfg.frequency_metadata.len(), Frequency::ALL.len());
            assert_eq!(descriptor(id).service_id, id);
        }
    }

    #[test]
    fn unknown_service_gets_zero_rates() {
        let cfg = default_config("pest_control");
        assert_eq!(cfg.unit_pricing.standard_rate, 0.0);
        assert!(!is_known_service("pest_control"));
    }
}

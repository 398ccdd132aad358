//! Normalization of raw config documents into `PartialPricingConfig`.
//!
//! Two document generations exist:
//!   - legacy flat: every rate is a top-level key (`standardRatePerUnit`,
//!     `greaseTrapRate`, `weeklyMultiplier`, ...);
//!   - nested: grouped sections (`unitPricing`, `specialItems`, `contract`, ...).
//!
//! Both are read leniently: a numeric field holding a numeric string is
//! accepted. Negative numbers and anything else are treated as absent for
//! that field only, so the cached or default value shows through.
//! Nothing outside this module branches on document shape.

use crate::{
    config::{
        FacilityCondition, PartialFrequencyMeta, PartialPricingConfig, PartialRateCategory,
        PartialSpecialItem, PricingOption, VisitRounding,
    },
    frequency::Frequency,
};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigShape {
    LegacyFlat,
    Nested,
}

const NESTED_MARKERS: [&str; 5] = [
    "unitPricing",
    "specialItems",
    "installation",
    "contract",
    "frequencyMetadata",
];

/// Unwrap the `{ "config": {...} }` envelope when present.
pub fn unwrap_envelope(doc: &Value) -> &Value {
    match doc.get("config") {
        Some(inner) if inner.is_object() => inner,
        _ => doc,
    }
}

pub fn detect_shape(doc: &Map<String, Value>) -> ConfigShape {
    let nested = NESTED_MARKERS
        .iter()
        .any(|k| doc.get(*k).map(Value::is_object).unwrap_or(false));
    if nested {
        ConfigShape::Nested
    } else {
        ConfigShape::LegacyFlat
    }
}

/// Normalize a raw document (envelope or bare). `known_items` lists the
/// special-item keys the service defines; legacy documents only name special
/// items through flat `<item>Rate` keys, so they can only be matched against
/// a known list.
pub fn normalize(raw: &Value, known_items: &[String]) -> Result<PartialPricingConfig, String> {
    let doc = unwrap_envelope(raw)
        .as_object()
        .ok_or_else(|| format!("config document is not an object: {}", type_name(raw)))?;

    let flat = read_flat(doc, known_items);
    let partial = match detect_shape(doc) {
        ConfigShape::LegacyFlat => flat,
        // Nested documents written during the migration still carry some
        // flat keys; nested values win where both exist.
        ConfigShape::Nested => read_nested(doc).layered_over(&flat),
    };
    Ok(partial)
}

// ── Legacy flat shape ──────────────────────────────────────────────

fn read_flat(doc: &Map<String, Value>, known_items: &[String]) -> PartialPricingConfig {
    let mut p = PartialPricingConfig {
        version: uint(doc, &["version", "configVersion"]),
        standard_rate: num(doc, &["standardRatePerUnit", "standardRate", "ratePerUnit", "ratePerSqFt"]),
        alternate_base_charge: num(doc, &["altBaseCharge", "alternateBaseCharge"]),
        alternate_included_quantity: num(doc, &["altIncludedUnits", "altIncludedSqFt", "alternateIncludedQuantity"]),
        alternate_rate: num(doc, &["altRatePerUnit", "alternateRatePerUnit", "altRatePerSqFt"]),
        volume_threshold: num(doc, &["volumeThreshold", "installTierThreshold"]),
        volume_rate: num(doc, &["installTierRate", "volumeRate", "volumeTierRate"]),
        plumbing_rate_per_unit: num(doc, &["plumbingRatePerUnit", "plumbingRate"]),
        install_rate_per_unit: num(doc, &["installRatePerUnit", "installationRate"]),
        install_waived_for_option: text(doc, &["installWaivedForOption"])
            .and_then(|s| PricingOption::parse(&s)),
        default_rate_category: text(doc, &["defaultRateCategory", "defaultRateTier"]),
        minimum_charge_per_visit: num(doc, &["minimumChargePerVisit", "minimumCharge", "minCharge"]),
        min_contract_months: uint(doc, &["minContractMonths"]),
        max_contract_months: uint(doc, &["maxContractMonths"]),
        default_contract_months: uint(doc, &["defaultContractMonths"]),
        visit_rounding: text(doc, &["visitRounding"]).and_then(|s| VisitRounding::parse(&s)),
        default_frequency: text(doc, &["defaultFrequency"]).and_then(|s| Frequency::parse(&s)),
        ..Default::default()
    };

    for (condition, key) in [
        (FacilityCondition::Normal, "normalConditionMultiplier"),
        (FacilityCondition::Moderate, "moderateConditionMultiplier"),
        (FacilityCondition::Heavy, "heavyConditionMultiplier"),
    ] {
        if let Some(m) = num(doc, &[key]) {
            p.condition_multipliers.insert(condition, m);
        }
    }

    for item in known_items {
        let camel = camel_case(item);
        let rate_key = format!("{camel}Rate");
        let rate_per_unit_key = format!("{camel}RatePerUnit");
        let install_key = format!("{camel}InstallRate");
        let entry = PartialSpecialItem {
            display_name: None,
            rate_per_unit: num(doc, &[rate_key.as_str(), rate_per_unit_key.as_str()]),
            install_rate_per_unit: num(doc, &[install_key.as_str()]),
            bundled_when_all_inclusive: None,
        };
        if entry != PartialSpecialItem::default() {
            p.special_items.insert(item.clone(), entry);
        }
    }

    // Legacy rate tiers are bare multipliers keyed by category name.
    if let Some(tiers) = doc.get("rateTiers").and_then(Value::as_object) {
        for (key, value) in tiers {
            if let Some(m) = as_num(value) {
                p.rate_categories.insert(
                    key.clone(),
                    PartialRateCategory { multiplier: Some(m), commission_rate: None },
                );
            }
        }
    }

    for freq in Frequency::ALL {
        let key = format!("{}Multiplier", freq.key());
        if let Some(m) = num(doc, &[key.as_str()]) {
            p.frequency_metadata.insert(
                freq,
                PartialFrequencyMeta { monthly_multiplier: Some(m), ..Default::default() },
            );
        }
    }

    if let Some(addons) = doc.get("oneTimeAddons").and_then(Value::as_object) {
        read_addons(addons, &mut p);
    }

    p
}

// ── Nested shape ───────────────────────────────────────────────────

fn read_nested(doc: &Map<String, Value>) -> PartialPricingConfig {
    let mut p = PartialPricingConfig {
        version: uint(doc, &["version", "configVersion"]),
        default_rate_category: text(doc, &["defaultRateCategory"]),
        minimum_charge_per_visit: num(doc, &["minimumChargePerVisit"]),
        default_frequency: text(doc, &["defaultFrequency"]).and_then(|s| Frequency::parse(&s)),
        ..Default::default()
    };

    if let Some(unit) = section(doc, "unitPricing") {
        p.standard_rate = num(unit, &["standardRate", "ratePerUnit"]);
        if let Some(alt) = section(unit, "alternate") {
            p.alternate_base_charge = num(alt, &["baseCharge"]);
            p.alternate_included_quantity = num(alt, &["includedQuantity", "includedUnits"]);
            p.alternate_rate = num(alt, &["rate", "ratePerUnit"]);
        }
        if let Some(tier) = section(unit, "volumeTier") {
            p.volume_threshold = num(tier, &["threshold"]);
            p.volume_rate = num(tier, &["rate", "ratePerUnit"]);
        }
    }

    if let Some(items) = section(doc, "specialItems") {
        for (key, value) in items {
            let Some(item) = value.as_object() else {
                log::debug!("config: special item '{key}' is not an object, skipped");
                continue;
            };
            p.special_items.insert(
                key.clone(),
                PartialSpecialItem {
                    display_name: text(item, &["displayName", "label"]),
                    rate_per_unit: num(item, &["rate", "ratePerUnit"]),
                    install_rate_per_unit: num(item, &["installRate", "installRatePerUnit"]),
                    bundled_when_all_inclusive: flag(item, &["bundledWhenAllInclusive"]),
                },
            );
        }
    }

    if let Some(plumbing) = section(doc, "plumbing") {
        p.plumbing_rate_per_unit = num(plumbing, &["ratePerUnit", "rate"]);
    }

    if let Some(install) = section(doc, "installation") {
        p.install_rate_per_unit = num(install, &["ratePerUnit", "rate"]);
        p.install_waived_for_option =
            text(install, &["waivedForOption"]).and_then(|s| PricingOption::parse(&s));
        if let Some(conditions) = section(install, "conditionMultipliers") {
            for (key, value) in conditions {
                if let (Some(cond), Some(m)) = (FacilityCondition::parse(key), as_num(value)) {
                    p.condition_multipliers.insert(cond, m);
                }
            }
        }
    }

    if let Some(addons) = section(doc, "oneTimeAddons") {
        read_addons(addons, &mut p);
    }

    if let Some(categories) = section(doc, "rateCategories") {
        for (key, value) in categories {
            let cat = match value {
                Value::Object(obj) => PartialRateCategory {
                    multiplier: num(obj, &["multiplier"]),
                    commission_rate: num(obj, &["commissionRate", "commission"]),
                },
                other => PartialRateCategory { multiplier: as_num(other), commission_rate: None },
            };
            p.rate_categories.insert(key.clone(), cat);
        }
    }

    if let Some(contract) = section(doc, "contract") {
        p.min_contract_months = uint(contract, &["minMonths"]);
        p.max_contract_months = uint(contract, &["maxMonths"]);
        p.default_contract_months = uint(contract, &["defaultMonths"]);
        p.visit_rounding = text(contract, &["visitRounding"]).and_then(|s| VisitRounding::parse(&s));
    }

    if let Some(meta) = section(doc, "frequencyMetadata") {
        for (key, value) in meta {
            let Some(freq) = Frequency::parse(key) else {
                log::debug!("config: unknown frequency key '{key}' in metadata, skipped");
                continue;
            };
            let entry = match value {
                Value::Object(obj) => PartialFrequencyMeta {
                    monthly_multiplier: num(obj, &["monthlyMultiplier", "monthlyRecurringMultiplier"]),
                    annual_multiplier: num(obj, &["annualMultiplier", "visitsPerYear"]),
                    cycle_months: num(obj, &["cycleMonths"]),
                    visits_per_cycle: num(obj, &["visitsPerCycle"]),
                },
                other => PartialFrequencyMeta {
                    monthly_multiplier: as_num(other),
                    ..Default::default()
                },
            };
            p.frequency_metadata.insert(freq, entry);
        }
    }

    p
}

fn read_addons(addons: &Map<String, Value>, p: &mut PartialPricingConfig) {
    for (key, value) in addons {
        if let Some(amount) = as_num(value) {
            p.one_time_addons.insert(key.clone(), amount);
        }
    }
}

// ── Lenient field readers ──────────────────────────────────────────

fn section<'a>(doc: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    doc.get(key).and_then(Value::as_object)
}

/// Every numeric config value is a rate, amount, multiplier or count, so
/// negatives are unusable and read as absent.
fn as_num(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if !n.is_finite() {
        return None;
    }
    if n < 0.0 {
        log::warn!("config: negative value {n} ignored");
        return None;
    }
    Some(n)
}

fn num(doc: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| doc.get(*k).and_then(as_num))
}

fn uint(doc: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    num(doc, keys)
        .filter(|n| *n <= u32::MAX as f64)
        .map(|n| n.round() as u32)
}

fn text(doc: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        doc.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn flag(doc: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| match doc.get(*k) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' || c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null      => "null",
        Value::Bool(_)   => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_)  => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_flat_keys_map_to_canonical_fields() {
        let doc = json!({
            "standardRatePerUnit": 10,
            "altBaseCharge": "20",
            "altRatePerUnit": 4,
            "greaseTrapRate": 125,
            "greaseTrapInstallRate": 300,
            "weeklyMultiplier": 4.33,
            "heavyConditionMultiplier": 3
        });
        let p = normalize(&doc, &["grease_trap".to_string()]).unwrap();
        assert_eq!(p.standard_rate, Some(10.0));
        assert_eq!(p.alternate_base_charge, Some(20.0));
        assert_eq!(p.special_items["grease_trap"].install_rate_per_unit, Some(300.0));
        assert_eq!(p.frequency_metadata[&Frequency::Weekly].monthly_multiplier, Some(4.33));
        assert_eq!(p.condition_multipliers[&FacilityCondition::Heavy], 3.0);
    }

    #[test]
    fn nested_shape_inside_envelope() {
        let doc = json!({ "config": {
            "unitPricing": { "standardRate": 12, "volumeTier": { "threshold": 10, "rate": 20 } },
            "contract": { "minMonths": 2, "maxMonths": 36 }
        }});
        let p = normalize(&doc, &[]).unwrap();
        assert_eq!(p.standard_rate, Some(12.0));
        assert_eq!(p.volume_threshold, Some(10.0));
        assert_eq!(p.max_contract_months, Some(36));
    }

    #[test]
    fn mangled_field_is_dropped_alone() {
        let doc = json!({
            "unitPricing": { "standardRate": "ten", "alternate": { "baseCharge": 20, "rate": 4 } }
        });
        let p = normalize(&doc, &[]).unwrap();
        assert_eq!(p.standard_rate, None);
        assert_eq!(p.alternate_rate, Some(4.0));
    }

    #[test]
    fn negative_numbers_read_as_absent() {
        let doc = json!({
            "unitPricing": { "standardRate": -10, "alternate": { "baseCharge": "-5", "rate": 4 } },
            "minimumChargePerVisit": -5,
            "oneTimeAddons": { "camera_inspection": -150, "jetting": 90 },
            "contract": { "maxMonths": -1 }
        });
        let p = normalize(&doc, &[]).unwrap();
        assert_eq!(p.standard_rate, None);
        assert_eq!(p.alternate_base_charge, None);
        assert_eq!(p.alternate_rate, Some(4.0));
        assert_eq!(p.minimum_charge_per_visit, None);
        assert!(!p.one_time_addons.contains_key("camera_inspection"));
        assert_eq!(p.one_time_addons["jetting"], 90.0);
        assert_eq!(p.max_contract_months, None);
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(normalize(&json!([1, 2, 3]), &[]).is_err());
    }
}

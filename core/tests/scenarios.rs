//! Reference quotes against the compiled default rate schedules.

use fieldquote_core::{
    calculator::QuoteCalculator,
    config::{FacilityCondition, PricingOption},
    defaults,
    fields::FieldKey,
    frequency::{Frequency, FrequencyClass},
    input::QuoteInput,
    overrides::OverrideSet,
    quote::{QuoteResult, RuleCode},
};
use std::collections::{BTreeMap, BTreeSet};

fn quote(service_id: &str, input: &QuoteInput) -> QuoteResult {
    quote_with(service_id, input, &OverrideSet::new())
}

fn quote_with(service_id: &str, input: &QuoteInput, overrides: &OverrideSet) -> QuoteResult {
    QuoteCalculator::calculate(
        input,
        &defaults::default_config(service_id),
        &defaults::descriptor(service_id),
        overrides,
    )
}

fn weekly(units: f64) -> QuoteInput {
    QuoteInput {
        unit_count: units,
        frequency: Some(Frequency::Weekly),
        contract_months: 12.0,
        ..Default::default()
    }
}

#[test]
fn five_drains_weekly_picks_the_cheaper_alternate_option() {
    let r = quote("drains", &weekly(5.0));

    // Standard 5 x $10 = $50; alternate $20 + 5 x $4 = $40.
    assert_eq!(r.selected_option, Some(PricingOption::Alternate));
    assert!(r.has_rule(RuleCode::AlternateOptionSelected));
    assert_eq!(r.per_visit, 40.0);
    assert_eq!(r.first_visit, 40.0);
    assert_eq!(r.frequency_class, FrequencyClass::MonthBased);
    assert_eq!(r.monthly_recurring, 173.2);
    assert_eq!(r.first_month, 173.2);
    assert_eq!(r.contract_total, 2078.4);
    assert_eq!(r.installation_total, 0.0);
}

#[test]
fn install_tier_covers_all_units_and_skips_installation() {
    let input = QuoteInput {
        install_tier_units: Some(12.0),
        new_install: true,
        ..weekly(12.0)
    };
    let r = quote("drains", &input);

    assert!(r.volume_tier_active);
    assert_eq!(r.volume_tier_units, 12.0);
    assert_eq!(r.per_visit, 240.0);
    assert_eq!(r.installation_total, 0.0);
    assert_eq!(r.first_visit, 240.0);
    assert!(r.has_rule(RuleCode::VolumeTierNoInstallation));
    assert!(!r.has_rule(RuleCode::InstallationApplied));
}

#[test]
fn restroom_flat_rate_beats_base_plus_unit() {
    let r = quote("restroom_hygiene", &weekly(5.0));

    // Option A 5 x $8 = $40; option B $40 + 5 x $3 = $55.
    assert_eq!(r.selected_option, Some(PricingOption::Standard));
    assert!(r.has_rule(RuleCode::StandardOptionSelected));
    assert_eq!(r.per_visit, 40.0);
    assert!(!r.has_rule(RuleCode::MinimumChargeApplied));
}

#[test]
fn weekly_window_visit_below_minimum_is_floored() {
    let r = quote("window_washing", &weekly(5.0));
    assert_eq!(r.main_service_total, 30.0);
    assert_eq!(r.per_visit, 50.0);
    assert!(r.has_rule(RuleCode::MinimumChargeApplied));

    let r = quote("window_washing", &weekly(0.0));
    assert_eq!(r.per_visit, 0.0);
    assert_eq!(r.monthly_recurring, 0.0);
    assert!(!r.has_rule(RuleCode::MinimumChargeApplied));
}

#[test]
fn minimum_charge_floors_positive_totals_only() {
    let five = QuoteInput { frequency: Some(Frequency::Monthly), ..weekly(5.0) };
    let r = quote("window_washing", &five);
    assert_eq!(r.main_service_total, 30.0);
    assert_eq!(r.per_visit, 50.0);
    assert!(r.has_rule(RuleCode::MinimumChargeApplied));

    let none = QuoteInput { unit_count: 0.0, ..five };
    let r = quote("window_washing", &none);
    assert_eq!(r.per_visit, 0.0);
    assert_eq!(r.contract_total, 0.0);
    assert!(!r.has_rule(RuleCode::MinimumChargeApplied));
}

#[test]
fn forced_option_wins_even_when_more_expensive() {
    let input = QuoteInput { forced_option: Some(PricingOption::Standard), ..weekly(5.0) };
    let r = quote("drains", &input);
    assert_eq!(r.selected_option, Some(PricingOption::Standard));
    assert_eq!(r.per_visit, 50.0);
}

#[test]
fn forcing_a_missing_alternate_falls_back_with_a_note() {
    let input = QuoteInput {
        forced_option: Some(PricingOption::Alternate),
        frequency: Some(Frequency::Monthly),
        ..weekly(20.0)
    };
    let r = quote("window_washing", &input);
    assert_eq!(r.selected_option, Some(PricingOption::Standard));
    assert!(r.has_rule(RuleCode::AlternateOptionUnavailable));
    assert_eq!(r.per_visit, 120.0);
}

#[test]
fn volume_tier_can_be_forced_off() {
    let input = QuoteInput { force_volume_tier: Some(false), ..weekly(12.0) };
    let r = quote("drains", &input);
    assert!(!r.volume_tier_active);
    assert!(r.has_rule(RuleCode::VolumeTierForcedOff));
    // Alternate: $20 + 12 x $4 = $68 beats 12 x $10.
    assert_eq!(r.per_visit, 68.0);
}

#[test]
fn volume_tier_can_be_forced_on_below_threshold() {
    let input = QuoteInput { force_volume_tier: Some(true), ..weekly(4.0) };
    let r = quote("drains", &input);
    assert!(r.volume_tier_active);
    assert_eq!(r.per_visit, 80.0);
}

#[test]
fn special_items_are_added_outside_the_tier() {
    let input = QuoteInput {
        install_tier_units: Some(12.0),
        special_items: BTreeMap::from([("grease_trap".to_string(), 2.0)]),
        ..weekly(12.0)
    };
    let r = quote("drains", &input);
    assert_eq!(r.main_service_total, 240.0);
    assert_eq!(r.special_items_total, 250.0);
    assert_eq!(r.per_visit, 490.0);
}

#[test]
fn plumbing_defaults_to_every_unit() {
    let input = QuoteInput { needs_plumbing: true, ..weekly(5.0) };
    let r = quote("drains", &input);
    assert_eq!(r.special_items_total, 50.0);
    assert_eq!(r.per_visit, 90.0);

    let explicit = QuoteInput { plumbing_units: 2.0, ..input };
    assert_eq!(quote("drains", &explicit).special_items_total, 20.0);
}

#[test]
fn all_inclusive_bundles_units_and_flagged_items() {
    let input = QuoteInput {
        all_inclusive: true,
        special_items: BTreeMap::from([
            ("urinal_screen".to_string(), 4.0),
            ("feminine_hygiene".to_string(), 2.0),
        ]),
        ..weekly(6.0)
    };
    let r = quote("restroom_hygiene", &input);

    // Only the non-bundled item is billed: 2 x $5 = $10, floored to $40.
    assert_eq!(r.main_service_total, 0.0);
    assert_eq!(r.special_items_total, 10.0);
    assert_eq!(r.per_visit, 40.0);
    assert!(r.has_rule(RuleCode::AllInclusiveBundled));
}

#[test]
fn heavy_condition_triples_installation() {
    let base = QuoteInput { new_install: true, ..weekly(4.0) };
    let normal = quote("drains", &base);
    let heavy = quote("drains", &QuoteInput { condition: FacilityCondition::Heavy, ..base });

    assert_eq!(normal.installation_total, 100.0);
    assert_eq!(heavy.installation_total, 300.0);
    // Drains bill installation on top of the first service.
    assert_eq!(heavy.first_visit, 300.0 + heavy.per_visit);
}

#[test]
fn installation_waived_under_forced_alternate() {
    let input = QuoteInput {
        new_install: true,
        forced_option: Some(PricingOption::Alternate),
        ..weekly(5.0)
    };
    let r = quote("restroom_hygiene", &input);
    assert_eq!(r.installation_total, 0.0);
    assert!(r.has_rule(RuleCode::InstallationWaived));
}

#[test]
fn installation_covers_first_service_where_configured() {
    let input = QuoteInput { new_install: true, ..weekly(5.0) };
    let r = quote("restroom_hygiene", &input);

    // Install 5 x $10 = $50; it replaces the $40 first service.
    assert_eq!(r.installation_total, 50.0);
    assert_eq!(r.first_visit, 50.0);
    // First month: $50 + (4.33 - 1) x $40.
    assert_eq!(r.first_month, 183.2);
}

#[test]
fn special_item_install_charges_stack() {
    let input = QuoteInput {
        new_install: true,
        special_items: BTreeMap::from([("grease_trap".to_string(), 1.0)]),
        ..weekly(2.0)
    };
    let r = quote("drains", &input);
    // 2 drains x $25 + 1 grease trap x $300.
    assert_eq!(r.installation_total, 350.0);
}

#[test]
fn one_time_addons_land_on_the_first_visit() {
    let input = QuoteInput {
        one_time_addons: BTreeSet::from(["camera_inspection".to_string(), "bogus".to_string()]),
        ..weekly(5.0)
    };
    let r = quote("drains", &input);
    assert_eq!(r.one_time_addons_total, 150.0);
    assert_eq!(r.first_visit, 190.0);
    assert!(r.has_rule(RuleCode::UnknownAddon));
    // First month: $190 + (4.33 - 1) x $40.
    assert_eq!(r.first_month, 323.2);
}

#[test]
fn premium_category_scales_the_visit() {
    let input = QuoteInput { rate_category: Some("premium".into()), ..weekly(5.0) };
    let r = quote("drains", &input);
    assert_eq!(r.per_visit, 50.0);
    assert_eq!(r.commission_rate, 0.15);
}

#[test]
fn unknown_rate_category_falls_back_to_default() {
    let input = QuoteInput { rate_category: Some("platinum".into()), ..weekly(5.0) };
    let r = quote("drains", &input);
    assert_eq!(r.rate_category, "standard");
    assert!(r.has_rule(RuleCode::RateCategoryFallback));
    assert_eq!(r.per_visit, 40.0);
}

#[test]
fn per_area_service_prices_square_footage() {
    let input = QuoteInput {
        area_sq_ft: 10_000.0,
        frequency: Some(Frequency::Weekly),
        contract_months: 12.0,
        ..Default::default()
    };
    let r = quote("janitorial", &input);
    // Standard 10,000 x 0.05 = $500; alternate $150 + 7,500 x 0.04 = $450.
    assert_eq!(r.selected_option, Some(PricingOption::Alternate));
    assert_eq!(r.per_visit, 450.0);
}

#[test]
fn garbage_quantities_quote_as_zero() {
    let input = QuoteInput {
        unit_count: f64::NAN,
        special_items: BTreeMap::from([("grease_trap".to_string(), -3.0)]),
        plumbing_units: f64::INFINITY,
        ..weekly(0.0)
    };
    let r = quote("drains", &input);
    assert_eq!(r.per_visit, 0.0);
    assert_eq!(r.contract_total, 0.0);
}

#[test]
fn unknown_service_quotes_zero_without_failing() {
    let r = quote("pest_control", &weekly(10.0));
    assert_eq!(r.service_id, "pest_control");
    assert_eq!(r.per_visit, 0.0);
}

#[test]
fn main_line_override_flows_downstream() {
    let overrides: OverrideSet = [(FieldKey::MainServiceTotal, 35.0)].into_iter().collect();
    let r = quote_with("drains", &weekly(5.0), &overrides);

    assert_eq!(r.computed_value(&FieldKey::MainServiceTotal), Some(40.0));
    assert_eq!(r.effective_value(&FieldKey::MainServiceTotal), Some(35.0));
    assert_eq!(r.per_visit, 35.0);
    assert_eq!(r.monthly_recurring, 151.55);
    assert!(r.has_rule(RuleCode::OverrideApplied));
}

#[test]
fn rate_override_reprices_the_option_comparison() {
    // Standard at $7 makes option A ($35) cheaper than B ($40).
    let overrides: OverrideSet = [(FieldKey::StandardRate, 7.0)].into_iter().collect();
    let r = quote_with("drains", &weekly(5.0), &overrides);
    assert_eq!(r.selected_option, Some(PricingOption::Standard));
    assert_eq!(r.per_visit, 35.0);
}

//! The quote calculator.
//!
//! `QuoteCalculator::calculate` is a pure function of
//! `(QuoteInput, PricingConfig, ServiceDescriptor, OverrideSet)`.
//!
//! STAGES (fixed order; each stage sees the effective output of the last):
//!   1. Normalize quantities.
//!   2. Volume tier selection (threshold, or forced on/off).
//!   3. Cheaper of the two pricing options for the remaining units.
//!   4. Special-item and plumbing add-ons (never tier-gated).
//!   5. Rate-category multiplier, then the minimum-charge floor.
//!   6. One-time installation.
//!   7. First visit.
//!   8. Contract accumulation.
//!
//! At every stage an override on that stage's figure replaces the computed
//! value before the next stage runs. There is no error path: anything
//! unusable falls back and leaves a note.

use crate::{
    accumulator::{ContractAccumulator, ContractInputs},
    config::{PricingConfig, PricingOption, RateCategory},
    fields::FieldKey,
    frequency::FrequencyConverter,
    input::QuoteInput,
    overrides::OverrideSet,
    quote::{AppliedRule, LineItem, QuoteResult, RuleCode},
    strategy::{FirstVisitRule, PricingStrategy, ServiceDescriptor},
    types::{round_money, sanitize_quantity},
};
use std::collections::BTreeMap;

pub struct QuoteCalculator;

/// Records computed and effective values as the stages run.
struct Ledger<'a> {
    overrides: &'a OverrideSet,
    computed:  BTreeMap<FieldKey, f64>,
    effective: BTreeMap<FieldKey, f64>,
    notes:     Vec<AppliedRule>,
}

impl<'a> Ledger<'a> {
    fn new(overrides: &'a OverrideSet) -> Self {
        Self {
            overrides,
            computed:  BTreeMap::new(),
            effective: BTreeMap::new(),
            notes:     Vec::new(),
        }
    }

    /// Record `computed` for `field` and return the effective value.
    fn resolve(&mut self, field: FieldKey, computed: f64) -> f64 {
        let effective = self.overrides.effective(&field, computed);
        self.computed.insert(field.clone(), computed);
        self.effective.insert(field, effective);
        effective
    }

    fn note(&mut self, code: RuleCode, message: impl Into<String>) {
        self.notes.push(AppliedRule::new(code, message));
    }
}

struct MainLine {
    tier_active:     bool,
    tier_units:      f64,
    standard_units:  f64,
    tier_amount:     f64,
    selected_option: Option<PricingOption>,
    total:           f64,
}

impl QuoteCalculator {
    pub fn calculate(
        input: &QuoteInput,
        config: &PricingConfig,
        descriptor: &ServiceDescriptor,
        overrides: &OverrideSet,
    ) -> QuoteResult {
        let mut ledger = Ledger::new(overrides);
        let mut line_items = Vec::new();

        // 1. Normalize
        let driver = match descriptor.strategy {
            PricingStrategy::PerUnit => sanitize_quantity(input.unit_count),
            PricingStrategy::PerArea => sanitize_quantity(input.area_sq_ft),
        };

        let frequency = match input.frequency {
            Some(f) => f,
            None => {
                ledger.note(
                    RuleCode::FrequencyFallback,
                    format!("Frequency not selected; using {}", config.default_frequency),
                );
                config.default_frequency
            }
        };
        let multipliers = FrequencyConverter::convert(frequency, &config.frequency_metadata);

        let (category_key, category) = select_rate_category(input, config, &mut ledger);

        // 2 + 3. Tier and option selection for the main line
        let main = main_line(input, config, descriptor, driver, &mut ledger, &mut line_items);
        let main_total = ledger.resolve(FieldKey::MainServiceTotal, main.total);

        // 4. Add-ons
        let add_ons = add_on_lines(input, config, driver, descriptor, &mut ledger, &mut line_items);
        let add_on_total = ledger.resolve(FieldKey::SpecialItemsTotal, add_ons);

        // 5. Category multiplier, then minimum floor
        let raw_per_visit = (main_total + add_on_total) * category.multiplier;
        let minimum = ledger.resolve(FieldKey::MinimumCharge, config.minimum_charge_per_visit);
        let floored = if raw_per_visit > 0.0 && raw_per_visit < minimum {
            ledger.note(
                RuleCode::MinimumChargeApplied,
                format!(
                    "Minimum charge applied: ${:.2} raised to ${:.2} per visit",
                    raw_per_visit, minimum
                ),
            );
            minimum
        } else {
            raw_per_visit
        };
        let per_visit = ledger.resolve(FieldKey::PerVisitTotal, floored);

        // 6. Installation
        let installation_computed =
            installation(input, config, &main, &mut ledger, &mut line_items);
        let installation_total = ledger.resolve(FieldKey::InstallationTotal, installation_computed);

        let one_time_addons = one_time_addons(input, config, &mut ledger, &mut line_items);

        // 7. First visit
        let covered = match descriptor.first_visit_rule {
            FirstVisitRule::InstallPlusService => 0.0,
            FirstVisitRule::InstallCoversMainService if installation_total > 0.0 => {
                let standard_share = (main_total - main.tier_amount).max(0.0) * category.multiplier;
                standard_share.min(per_visit)
            }
            FirstVisitRule::InstallCoversMainService => 0.0,
        };
        let first_visit = ledger.resolve(
            FieldKey::FirstVisitTotal,
            installation_total + (per_visit - covered) + one_time_addons,
        );

        // 8. Contract
        let months_raw = input.contract_months;
        let months = config.contract.clamp(months_raw);
        if months_raw.is_finite() && months_raw > 0.0 && months as f64 != months_raw.round() {
            ledger.note(
                RuleCode::ContractMonthsClamped,
                format!(
                    "Contract length {} months adjusted to {} (allowed {}-{})",
                    months_raw, months, config.contract.min_months, config.contract.max_months
                ),
            );
        }

        let has_one_time_charges = installation_total > 0.0
            || one_time_addons > 0.0
            || overrides.contains(&FieldKey::FirstVisitTotal);
        let figures = ContractAccumulator::accumulate(
            &ContractInputs {
                per_visit,
                first_visit,
                has_one_time_charges,
                months,
                multipliers,
                visit_rounding: config.contract.visit_rounding,
            },
            overrides,
        );
        ledger.resolve(FieldKey::MonthlyRecurring, figures.computed_monthly);
        ledger.resolve(FieldKey::FirstMonthTotal, figures.computed_first_month);
        ledger.resolve(FieldKey::ContractTotal, figures.computed_contract);

        let overridden: Vec<String> = overrides.keys().map(|k| k.to_string()).collect();
        if !overridden.is_empty() {
            ledger.note(
                RuleCode::OverrideApplied,
                format!("Manual overrides in effect: {}", overridden.join(", ")),
            );
        }

        let round_field = |key: &FieldKey, v: f64| if key.is_rate() { v } else { round_money(v) };
        let computed = ledger.computed.iter().map(|(k, v)| (k.clone(), round_field(k, *v))).collect();
        let effective = ledger.effective.iter().map(|(k, v)| (k.clone(), round_field(k, *v))).collect();

        QuoteResult {
            service_id:          config.service_id.clone(),
            config_version:      config.version,
            frequency,
            frequency_class:     multipliers.class,
            contract_months:     months,
            rate_category:       category_key,
            commission_rate:     category.commission_rate,
            selected_option:     main.selected_option,
            volume_tier_active:  main.tier_active,
            volume_tier_units:   main.tier_units,
            main_service_total:  round_money(main_total),
            special_items_total: round_money(add_on_total),
            per_visit:           round_money(per_visit),
            installation_total:  round_money(installation_total),
            one_time_addons_total: round_money(one_time_addons),
            first_visit:         round_money(first_visit),
            first_month:         round_money(figures.first_month),
            monthly_recurring:   round_money(figures.monthly_recurring),
            contract_total:      round_money(figures.contract_total),
            total_visits:        figures.total_visits,
            line_items,
            notes:               ledger.notes,
            computed,
            effective,
        }
    }
}

fn select_rate_category(
    input: &QuoteInput,
    config: &PricingConfig,
    ledger: &mut Ledger<'_>,
) -> (String, RateCategory) {
    if let Some(key) = &input.rate_category {
        if let Some(cat) = config.rate_categories.get(key) {
            return (key.clone(), sanitize_category(cat));
        }
        ledger.note(
            RuleCode::RateCategoryFallback,
            format!(
                "Rate category '{key}' not offered; using '{}'",
                config.default_rate_category
            ),
        );
    }
    match config.rate_categories.get(&config.default_rate_category) {
        Some(cat) => (config.default_rate_category.clone(), sanitize_category(cat)),
        None => {
            ledger.note(
                RuleCode::RateCategoryFallback,
                "No rate category configured; using list pricing",
            );
            (
                config.default_rate_category.clone(),
                RateCategory { multiplier: 1.0, commission_rate: 0.0 },
            )
        }
    }
}

fn sanitize_category(cat: &RateCategory) -> RateCategory {
    RateCategory {
        multiplier: if cat.multiplier.is_finite() && cat.multiplier > 0.0 { cat.multiplier } else { 1.0 },
        commission_rate: sanitize_quantity(cat.commission_rate),
    }
}

fn main_line(
    input: &QuoteInput,
    config: &PricingConfig,
    descriptor: &ServiceDescriptor,
    driver: f64,
    ledger: &mut Ledger<'_>,
    line_items: &mut Vec<LineItem>,
) -> MainLine {
    let pricing = &config.unit_pricing;
    let unit = &descriptor.unit_label;

    let standard_rate = ledger.resolve(FieldKey::StandardRate, pricing.standard_rate);
    let alternate = pricing.alternate.as_ref().map(|alt| {
        let base = ledger.resolve(FieldKey::AlternateBaseCharge, alt.base_charge);
        let rate = ledger.resolve(FieldKey::AlternateRate, alt.rate);
        (base, sanitize_quantity(alt.included_quantity), rate)
    });
    let tier = pricing.volume_tier.as_ref().map(|t| {
        let rate = ledger.resolve(FieldKey::VolumeTierRate, t.rate);
        (t.threshold, rate)
    });

    // Tier selection
    let threshold_met = tier.map(|(threshold, _)| threshold > 0.0 && driver >= threshold).unwrap_or(false);
    let tier_active = match (input.force_volume_tier, tier) {
        (Some(true), Some(_)) => true,
        (Some(true), None) => {
            ledger.note(RuleCode::VolumeTierUnavailable, "Volume tier requested but not offered for this service");
            false
        }
        (Some(false), _) => {
            if threshold_met {
                ledger.note(RuleCode::VolumeTierForcedOff, "Volume tier switched off by operator");
            }
            false
        }
        (None, _) => threshold_met,
    };

    let (tier_units, tier_amount) = match (tier_active, tier) {
        (true, Some((_, rate))) => {
            let flagged = input
                .install_tier_units
                .map(sanitize_quantity)
                .unwrap_or(driver)
                .min(driver);
            let amount = flagged * rate;
            ledger.note(
                RuleCode::VolumeTierApplied,
                format!("Volume tier: {flagged} {unit} at ${rate:.2}"),
            );
            line_items.push(LineItem {
                key:          "volume_tier".into(),
                display_name: format!("Volume tier ({unit})"),
                quantity:     flagged,
                rate,
                amount,
                one_time:     false,
            });
            (flagged, amount)
        }
        _ => (0.0, 0.0),
    };
    let standard_units = (driver - tier_units).max(0.0);

    if input.all_inclusive {
        if standard_units > 0.0 {
            ledger.note(
                RuleCode::AllInclusiveBundled,
                format!("All-inclusive: {standard_units} {unit} bundled at no charge"),
            );
        }
        return MainLine {
            tier_active,
            tier_units,
            standard_units,
            tier_amount,
            selected_option: None,
            total: tier_amount,
        };
    }

    // Cheaper of two options
    let option_a = standard_units * standard_rate;
    let option_b = alternate.map(|(base, included, rate)| {
        if standard_units > 0.0 {
            base + (standard_units - included).max(0.0) * rate
        } else {
            0.0
        }
    });

    let selected = match (input.forced_option, option_b) {
        (Some(PricingOption::Standard), _) => PricingOption::Standard,
        (Some(PricingOption::Alternate), Some(_)) => PricingOption::Alternate,
        (Some(PricingOption::Alternate), None) => {
            ledger.note(
                RuleCode::AlternateOptionUnavailable,
                "Alternate pricing requested but not offered; using standard rate",
            );
            PricingOption::Standard
        }
        (None, Some(b)) if b < option_a => PricingOption::Alternate,
        (None, _) => PricingOption::Standard,
    };

    let standard_amount = match (selected, option_b) {
        (PricingOption::Alternate, Some(b)) => b,
        _ => option_a,
    };

    if standard_units > 0.0 {
        match selected {
            PricingOption::Alternate => ledger.note(
                RuleCode::AlternateOptionSelected,
                format!(
                    "Alternate pricing ${standard_amount:.2} selected over standard ${option_a:.2}"
                ),
            ),
            PricingOption::Standard => {
                if let Some(b) = option_b {
                    ledger.note(
                        RuleCode::StandardOptionSelected,
                        format!("Standard pricing ${option_a:.2} selected over alternate ${b:.2}"),
                    );
                }
            }
        }
        line_items.push(LineItem {
            key:          "main".into(),
            display_name: descriptor.display_name.clone(),
            quantity:     standard_units,
            rate:         standard_amount / standard_units,
            amount:       standard_amount,
            one_time:     false,
        });
    }

    MainLine {
        tier_active,
        tier_units,
        standard_units,
        tier_amount,
        selected_option: (standard_units > 0.0).then_some(selected),
        total: tier_amount + standard_amount,
    }
}

fn add_on_lines(
    input: &QuoteInput,
    config: &PricingConfig,
    driver: f64,
    descriptor: &ServiceDescriptor,
    ledger: &mut Ledger<'_>,
    line_items: &mut Vec<LineItem>,
) -> f64 {
    let mut total = 0.0;

    for (key, item) in &config.special_items {
        let rate = ledger.resolve(FieldKey::SpecialItemRate(key.clone()), item.rate_per_unit);
        let count = input.special_item_count(key);
        if count <= 0.0 {
            continue;
        }
        let bundled = input.all_inclusive && item.bundled_when_all_inclusive;
        let amount = if bundled { 0.0 } else { count * rate };
        if bundled {
            ledger.note(
                RuleCode::AllInclusiveBundled,
                format!("All-inclusive: {} bundled at no charge", item.display_name),
            );
        }
        line_items.push(LineItem {
            key:          key.clone(),
            display_name: item.display_name.clone(),
            quantity:     count,
            rate,
            amount,
            one_time:     false,
        });
        total += amount;
    }

    for (key, count) in &input.special_items {
        if *count > 0.0 && !config.special_items.contains_key(key) {
            ledger.note(
                RuleCode::UnknownSpecialItem,
                format!("Special item '{key}' has no configured rate and was ignored"),
            );
        }
    }

    let plumbing_rate = ledger.resolve(FieldKey::PlumbingRate, config.plumbing_rate_per_unit);
    if input.needs_plumbing {
        // Without an explicit plumbing count every unit needs the work.
        let units = match sanitize_quantity(input.plumbing_units) {
            n if n > 0.0 => n,
            _ if descriptor.strategy == PricingStrategy::PerUnit => driver,
            _ => 0.0,
        };
        if input.all_inclusive {
            if units > 0.0 {
                ledger.note(RuleCode::AllInclusiveBundled, "All-inclusive: plumbing bundled at no charge");
            }
        } else if units > 0.0 {
            let amount = units * plumbing_rate;
            line_items.push(LineItem {
                key:          "plumbing".into(),
                display_name: "Plumbing".into(),
                quantity:     units,
                rate:         plumbing_rate,
                amount,
                one_time:     false,
            });
            total += amount;
        }
    }

    total
}

fn installation(
    input: &QuoteInput,
    config: &PricingConfig,
    main: &MainLine,
    ledger: &mut Ledger<'_>,
    line_items: &mut Vec<LineItem>,
) -> f64 {
    let install = &config.installation;
    let unit_rate = ledger.resolve(FieldKey::InstallRatePerUnit, install.rate_per_unit);
    let item_rates: Vec<(String, f64)> = config
        .special_items
        .iter()
        .map(|(key, item)| {
            let rate = ledger.resolve(
                FieldKey::SpecialItemInstallRate(key.clone()),
                item.install_rate_per_unit,
            );
            (key.clone(), rate)
        })
        .collect();

    if !input.new_install {
        return 0.0;
    }

    let waived = matches!(
        (install.waived_for_option, input.forced_option),
        (Some(w), Some(f)) if w == f
    );
    if waived {
        ledger.note(
            RuleCode::InstallationWaived,
            "Installation waived under the selected pricing option",
        );
        return 0.0;
    }

    if main.tier_units > 0.0 {
        ledger.note(
            RuleCode::VolumeTierNoInstallation,
            format!("{} units serviced under the volume tier carry no installation fee", main.tier_units),
        );
    }

    let condition_multiplier = install.multiplier_for(input.condition);
    let main_install = main.standard_units * unit_rate * condition_multiplier;
    let mut total = 0.0;
    if main_install > 0.0 {
        line_items.push(LineItem {
            key:          "installation".into(),
            display_name: "Installation".into(),
            quantity:     main.standard_units,
            rate:         unit_rate * condition_multiplier,
            amount:       main_install,
            one_time:     true,
        });
        total += main_install;
    }

    for (key, rate) in item_rates {
        let count = input.special_item_count(&key);
        let amount = count * rate;
        if amount > 0.0 {
            let name = config
                .special_items
                .get(&key)
                .map(|i| i.display_name.clone())
                .unwrap_or_else(|| key.clone());
            line_items.push(LineItem {
                key:          format!("{key}_install"),
                display_name: format!("{name} installation"),
                quantity:     count,
                rate,
                amount,
                one_time:     true,
            });
            total += amount;
        }
    }

    if total > 0.0 {
        ledger.note(
            RuleCode::InstallationApplied,
            format!(
                "Installation ${total:.2} ({:?} condition x{condition_multiplier})",
                input.condition
            ),
        );
    }
    total
}

fn one_time_addons(
    input: &QuoteInput,
    config: &PricingConfig,
    ledger: &mut Ledger<'_>,
    line_items: &mut Vec<LineItem>,
) -> f64 {
    let mut total = 0.0;
    for key in &input.one_time_addons {
        match config.one_time_addons.get(key) {
            Some(amount) => {
                let amount = sanitize_quantity(*amount);
                line_items.push(LineItem {
                    key:          key.clone(),
                    display_name: key.replace('_', " "),
                    quantity:     1.0,
                    rate:         amount,
                    amount,
                    one_time:     true,
                });
                total += amount;
            }
            None => ledger.note(
                RuleCode::UnknownAddon,
                format!("One-time add-on '{key}' is not offered and was ignored"),
            ),
        }
    }
    total
}

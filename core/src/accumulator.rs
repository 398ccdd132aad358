//! Contract accumulation: per-visit figures → first period and term totals.
//!
//! Branches on frequency class:
//!   - month-based: billed per calendar month;
//!   - visit-based: billed per visit over the term;
//!   - one-time: the first visit is the whole contract.
//!
//! Inputs are unrounded; rounding is the caller's job at the result boundary.

use crate::{
    config::VisitRounding,
    fields::FieldKey,
    frequency::{FrequencyClass, FrequencyMultipliers},
    overrides::OverrideSet,
};

#[derive(Debug, Clone, Copy)]
pub struct ContractInputs {
    pub per_visit:   f64,
    /// Includes installation and one-time add-ons.
    pub first_visit: f64,
    /// True when the first visit carries one-time charges on top of service.
    pub has_one_time_charges: bool,
    /// Already clamped.
    pub months: u32,
    pub multipliers: FrequencyMultipliers,
    pub visit_rounding: VisitRounding,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractFigures {
    pub monthly_recurring: f64,
    pub first_month:       f64,
    pub contract_total:    f64,
    pub total_visits:      Option<f64>,
    pub computed_monthly:  f64,
    pub computed_first_month: f64,
    pub computed_contract: f64,
}

pub struct ContractAccumulator;

impl ContractAccumulator {
    pub fn accumulate(inputs: &ContractInputs, overrides: &OverrideSet) -> ContractFigures {
        let m = &inputs.multipliers;
        let months = inputs.months as f64;

        let computed_monthly = match m.class {
            FrequencyClass::OneTime => 0.0,
            _ => inputs.per_visit * m.monthly_multiplier,
        };
        let monthly = overrides.effective(&FieldKey::MonthlyRecurring, computed_monthly);

        let (computed_first_month, total_visits) = match m.class {
            FrequencyClass::MonthBased => {
                let first = if inputs.has_one_time_charges {
                    inputs.first_visit + (m.monthly_multiplier - 1.0).max(0.0) * inputs.per_visit
                } else {
                    monthly
                };
                (first, None)
            }
            FrequencyClass::VisitBased => (inputs.first_visit, Some(visit_count(inputs))),
            FrequencyClass::OneTime => (inputs.first_visit, Some(1.0)),
        };
        let first_month = overrides.effective(&FieldKey::FirstMonthTotal, computed_first_month);

        let computed_contract = match m.class {
            FrequencyClass::MonthBased => first_month + (months - 1.0).max(0.0) * monthly,
            FrequencyClass::VisitBased => {
                let visits = total_visits.unwrap_or(1.0);
                if inputs.has_one_time_charges {
                    inputs.first_visit + (visits - 1.0).max(0.0) * inputs.per_visit
                } else {
                    visits * inputs.per_visit
                }
            }
            FrequencyClass::OneTime => inputs.first_visit,
        };
        let contract_total = overrides.effective(&FieldKey::ContractTotal, computed_contract);

        ContractFigures {
            monthly_recurring: monthly,
            first_month,
            contract_total,
            total_visits,
            computed_monthly,
            computed_first_month,
            computed_contract,
        }
    }
}

/// Visits over the term for visit-based frequencies: (months / cycle) ×
/// visits per cycle, rounded per config, never fewer than one.
fn visit_count(inputs: &ContractInputs) -> f64 {
    let m = &inputs.multipliers;
    let cycles = if m.cycle_months > 0.0 {
        inputs.months as f64 / m.cycle_months
    } else {
        0.0
    };
    inputs
        .visit_rounding
        .apply(cycles * m.visits_per_cycle)
        .max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::{Frequency, FrequencyConverter};
    use std::collections::BTreeMap;

    fn inputs(frequency: Frequency, per_visit: f64, first_visit: f64, months: u32) -> ContractInputs {
        ContractInputs {
            per_visit,
            first_visit,
            has_one_time_charges: first_visit != per_visit,
            months,
            multipliers: FrequencyConverter::convert(frequency, &BTreeMap::new()),
            visit_rounding: VisitRounding::Nearest,
        }
    }

    #[test]
    fn month_based_without_installation() {
        let f = ContractAccumulator::accumulate(&inputs(Frequency::Weekly, 40.0, 40.0, 12), &OverrideSet::new());
        assert!((f.monthly_recurring - 173.2).abs() < 1e-9);
        assert!((f.contract_total - 2078.4).abs() < 1e-9);
        assert_eq!(f.total_visits, None);
    }

    #[test]
    fn month_based_with_installation() {
        // first month = 140 + (4.33 - 1) * 40 = 273.2; total = 273.2 + 11 * 173.2
        let f = ContractAccumulator::accumulate(&inputs(Frequency::Weekly, 40.0, 140.0, 12), &OverrideSet::new());
        assert!((f.first_month - 273.2).abs() < 1e-9);
        assert!((f.contract_total - (273.2 + 11.0 * 173.2)).abs() < 1e-9);
    }

    #[test]
    fn visit_based_quarterly() {
        let f = ContractAccumulator::accumulate(&inputs(Frequency::Quarterly, 90.0, 90.0, 12), &OverrideSet::new());
        assert_eq!(f.total_visits, Some(4.0));
        assert!((f.contract_total - 360.0).abs() < 1e-9);
    }

    #[test]
    fn visit_based_with_installation_charges_first_visit_once() {
        let f = ContractAccumulator::accumulate(&inputs(Frequency::Bimonthly, 50.0, 150.0, 12), &OverrideSet::new());
        assert_eq!(f.total_visits, Some(6.0));
        assert!((f.contract_total - (150.0 + 5.0 * 50.0)).abs() < 1e-9);
    }

    #[test]
    fn one_time_is_the_first_visit() {
        let f = ContractAccumulator::accumulate(&inputs(Frequency::OneTime, 80.0, 230.0, 12), &OverrideSet::new());
        assert_eq!(f.monthly_recurring, 0.0);
        assert_eq!(f.contract_total, 230.0);
    }

    #[test]
    fn contract_override_replaces_computation() {
        let mut o = OverrideSet::new();
        o.set(FieldKey::ContractTotal, 1_999.0);
        let f = ContractAccumulator::accumulate(&inputs(Frequency::Weekly, 40.0, 40.0, 12), &o);
        assert_eq!(f.contract_total, 1_999.0);
        assert!((f.computed_contract - 2078.4).abs() < 1e-9);
    }
}

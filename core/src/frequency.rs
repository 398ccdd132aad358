//! Billing frequency conversion.
//!
//! Maps a frequency key to monthly/annual multipliers and classifies it as
//! month-based or visit-based. The classification selects the contract-math
//! branch in the accumulator.
//!
//! Multipliers come from `PricingConfig.frequency_metadata` when the resolved
//! config carries an entry for the key; otherwise the static table below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Frequency {
    OneTime,
    Weekly,
    Biweekly,
    TwicePerMonth,
    Monthly,
    Bimonthly,
    Quarterly,
    Biannual,
    Annual,
}

impl Frequency {
    pub const ALL: [Frequency; 9] = [
        Frequency::OneTime,
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::TwicePerMonth,
        Frequency::Monthly,
        Frequency::Bimonthly,
        Frequency::Quarterly,
        Frequency::Biannual,
        Frequency::Annual,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::OneTime       => "oneTime",
            Self::Weekly        => "weekly",
            Self::Biweekly      => "biweekly",
            Self::TwicePerMonth => "twicePerMonth",
            Self::Monthly       => "monthly",
            Self::Bimonthly     => "bimonthly",
            Self::Quarterly     => "quarterly",
            Self::Biannual      => "biannual",
            Self::Annual        => "annual",
        }
    }

    /// Parse a frequency key. Accepts the canonical camelCase keys plus the
    /// snake_case and hyphenated spellings found in older documents.
    pub fn parse(raw: &str) -> Option<Self> {
        let folded: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "onetime" | "once"                  => Some(Self::OneTime),
            "weekly"                            => Some(Self::Weekly),
            "biweekly" | "everyotherweek"       => Some(Self::Biweekly),
            "twicepermonth" | "semimonthly"     => Some(Self::TwicePerMonth),
            "monthly"                           => Some(Self::Monthly),
            "bimonthly" | "everyothermonth"     => Some(Self::Bimonthly),
            "quarterly"                         => Some(Self::Quarterly),
            "biannual" | "semiannual"           => Some(Self::Biannual),
            "annual" | "yearly"                 => Some(Self::Annual),
            _ => None,
        }
    }

    pub fn class(&self) -> FrequencyClass {
        match self {
            Self::OneTime => FrequencyClass::OneTime,
            Self::Weekly | Self::Biweekly | Self::TwicePerMonth | Self::Monthly => {
                FrequencyClass::MonthBased
            }
            Self::Bimonthly | Self::Quarterly | Self::Biannual | Self::Annual => {
                FrequencyClass::VisitBased
            }
        }
    }

    /// Static fallback when the config carries no metadata for this key.
    pub fn fallback_meta(&self) -> FrequencyMeta {
        let (monthly, annual, cycle) = match self {
            Self::OneTime       => (0.0,        1.0,  0.0),
            Self::Weekly        => (4.33,       52.0, 1.0),
            Self::Biweekly      => (2.165,      26.0, 1.0),
            Self::TwicePerMonth => (2.0,        24.0, 1.0),
            Self::Monthly       => (1.0,        12.0, 1.0),
            Self::Bimonthly     => (0.5,        6.0,  2.0),
            Self::Quarterly     => (1.0 / 3.0,  4.0,  3.0),
            Self::Biannual      => (1.0 / 6.0,  2.0,  6.0),
            Self::Annual        => (1.0 / 12.0, 1.0,  12.0),
        };
        FrequencyMeta {
            monthly_multiplier: monthly,
            annual_multiplier:  annual,
            cycle_months:       cycle,
            visits_per_cycle:   1.0,
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::Weekly
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which contract-math branch a frequency uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyClass {
    /// Billed per calendar month (weekly .. monthly).
    MonthBased,
    /// Billed per discrete visit across the contract term (bimonthly .. annual).
    VisitBased,
    /// No recurrence.
    OneTime,
}

/// Per-frequency metadata as carried in the pricing config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMeta {
    /// Visits per calendar month (weekly ≈ 4.33).
    pub monthly_multiplier: f64,
    /// Visits per year.
    pub annual_multiplier: f64,
    /// Months between visits for visit-based frequencies; 1 for month-based.
    pub cycle_months: f64,
    pub visits_per_cycle: f64,
}

/// Resolved multipliers for one frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyMultipliers {
    pub frequency:          Frequency,
    pub class:              FrequencyClass,
    pub monthly_multiplier: f64,
    pub annual_multiplier:  f64,
    pub cycle_months:       f64,
    pub visits_per_cycle:   f64,
    /// True when the static table supplied the figures.
    pub from_fallback:      bool,
}

pub struct FrequencyConverter;

impl FrequencyConverter {
    pub fn convert(
        frequency: Frequency,
        metadata: &BTreeMap<Frequency, FrequencyMeta>,
    ) -> FrequencyMultipliers {
        let fallback = frequency.fallback_meta();
        let (meta, from_fallback) = match metadata.get(&frequency) {
            Some(m) => (sanitize_meta(m, &fallback), false),
            None => (fallback, true),
        };
        FrequencyMultipliers {
            frequency,
            class: frequency.class(),
            monthly_multiplier: meta.monthly_multiplier,
            annual_multiplier:  meta.annual_multiplier,
            cycle_months:       meta.cycle_months,
            visits_per_cycle:   meta.visits_per_cycle,
            from_fallback,
        }
    }
}

// A metadata entry with a non-positive multiplier is treated as missing for
// that sub-field only.
fn sanitize_meta(meta: &FrequencyMeta, fallback: &FrequencyMeta) -> FrequencyMeta {
    let pick = |v: f64, f: f64| if v.is_finite() && v > 0.0 { v } else { f };
    FrequencyMeta {
        monthly_multiplier: pick(meta.monthly_multiplier, fallback.monthly_multiplier),
        annual_multiplier:  pick(meta.annual_multiplier, fallback.annual_multiplier),
        cycle_months:       pick(meta.cycle_months, fallback.cycle_months),
        visits_per_cycle:   pick(meta.visits_per_cycle, fallback.visits_per_cycle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_billing_semantics() {
        assert_eq!(Frequency::Weekly.class(), FrequencyClass::MonthBased);
        assert_eq!(Frequency::TwicePerMonth.class(), FrequencyClass::MonthBased);
        assert_eq!(Frequency::Bimonthly.class(), FrequencyClass::VisitBased);
        assert_eq!(Frequency::Annual.class(), FrequencyClass::VisitBased);
        assert_eq!(Frequency::OneTime.class(), FrequencyClass::OneTime);
    }

    #[test]
    fn parse_accepts_legacy_spellings() {
        assert_eq!(Frequency::parse("twice_per_month"), Some(Frequency::TwicePerMonth));
        assert_eq!(Frequency::parse("Bi-Weekly"), Some(Frequency::Biweekly));
        assert_eq!(Frequency::parse("oneTime"), Some(Frequency::OneTime));
        assert_eq!(Frequency::parse("fortnightly-ish"), None);
    }

    #[test]
    fn missing_metadata_uses_static_table() {
        let m = FrequencyConverter::convert(Frequency::Weekly, &BTreeMap::new());
        assert!(m.from_fallback);
        assert_eq!(m.monthly_multiplier, 4.33);
    }

    #[test]
    fn partial_metadata_keeps_valid_subfields() {
        let mut table = BTreeMap::new();
        table.insert(
            Frequency::Bimonthly,
            FrequencyMeta {
                monthly_multiplier: 0.5,
                annual_multiplier:  0.0,
                cycle_months:       2.0,
                visits_per_cycle:   1.0,
            },
        );
        let m = FrequencyConverter::convert(Frequency::Bimonthly, &table);
        assert!(!m.from_fallback);
        assert_eq!(m.annual_multiplier, 6.0);
        assert_eq!(m.cycle_months, 2.0);
    }
}

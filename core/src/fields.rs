//! Override-eligible fields and their dependency graph.
//!
//! Every figure the operator may override is a `FieldKey`. Each key declares
//! which base inputs it depends on and which other keys feed it directly.
//! Changing a declared input clears the override; clearing an override also
//! clears every override downstream of it.

use crate::{config::PricingConfig, input::InputField};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldKey {
    // ── Rate-level ─────────────────────────────────
    StandardRate,
    AlternateBaseCharge,
    AlternateRate,
    VolumeTierRate,
    PlumbingRate,
    SpecialItemRate(String),
    SpecialItemInstallRate(String),
    InstallRatePerUnit,
    MinimumCharge,

    // ── Line and total level ───────────────────────
    MainServiceTotal,
    SpecialItemsTotal,
    PerVisitTotal,
    InstallationTotal,
    FirstVisitTotal,
    MonthlyRecurring,
    FirstMonthTotal,
    ContractTotal,
}

impl FieldKey {
    /// Fields every service exposes, in calculation order.
    pub const COMMON: [FieldKey; 14] = [
        FieldKey::StandardRate,
        FieldKey::AlternateBaseCharge,
        FieldKey::AlternateRate,
        FieldKey::VolumeTierRate,
        FieldKey::PlumbingRate,
        FieldKey::InstallRatePerUnit,
        FieldKey::MinimumCharge,
        FieldKey::MainServiceTotal,
        FieldKey::SpecialItemsTotal,
        FieldKey::PerVisitTotal,
        FieldKey::InstallationTotal,
        FieldKey::FirstVisitTotal,
        FieldKey::MonthlyRecurring,
        FieldKey::FirstMonthTotal,
    ];

    /// Line and total fields; only these are ever fed by another field.
    pub const TOTALS: [FieldKey; 8] = [
        FieldKey::MainServiceTotal,
        FieldKey::SpecialItemsTotal,
        FieldKey::PerVisitTotal,
        FieldKey::InstallationTotal,
        FieldKey::FirstVisitTotal,
        FieldKey::MonthlyRecurring,
        FieldKey::FirstMonthTotal,
        FieldKey::ContractTotal,
    ];

    /// All fields eligible for override under `config`, including the
    /// per-item rates of every configured special item.
    pub fn all_for(config: &PricingConfig) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = Self::COMMON.to_vec();
        for item in config.special_items.keys() {
            keys.push(FieldKey::SpecialItemRate(item.clone()));
            keys.push(FieldKey::SpecialItemInstallRate(item.clone()));
        }
        keys.push(FieldKey::ContractTotal);
        keys
    }

    pub fn is_rate(&self) -> bool {
        matches!(
            self,
            Self::StandardRate
                | Self::AlternateBaseCharge
                | Self::AlternateRate
                | Self::VolumeTierRate
                | Self::PlumbingRate
                | Self::SpecialItemRate(_)
                | Self::SpecialItemInstallRate(_)
                | Self::InstallRatePerUnit
                | Self::MinimumCharge
        )
    }

    /// Audit category of the field.
    pub fn field_type(&self) -> &'static str {
        match self {
            Self::SpecialItemInstallRate(_) | Self::InstallRatePerUnit | Self::InstallationTotal => {
                "installation"
            }
            k if k.is_rate() => "rate",
            _ => "total",
        }
    }

    pub fn display_name(&self, config: &PricingConfig) -> String {
        let item_name = |key: &str| {
            config
                .special_items
                .get(key)
                .map(|i| i.display_name.clone())
                .unwrap_or_else(|| key.to_string())
        };
        match self {
            Self::StandardRate           => "Standard Rate".into(),
            Self::AlternateBaseCharge    => "Alternate Base Charge".into(),
            Self::AlternateRate          => "Alternate Rate".into(),
            Self::VolumeTierRate         => "Volume Tier Rate".into(),
            Self::PlumbingRate           => "Plumbing Rate".into(),
            Self::SpecialItemRate(k)     => format!("{} Rate", item_name(k)),
            Self::SpecialItemInstallRate(k) => format!("{} Install Rate", item_name(k)),
            Self::InstallRatePerUnit     => "Install Rate".into(),
            Self::MinimumCharge          => "Minimum Charge".into(),
            Self::MainServiceTotal       => "Main Service Total".into(),
            Self::SpecialItemsTotal      => "Add-on Total".into(),
            Self::PerVisitTotal          => "Per Visit Total".into(),
            Self::InstallationTotal      => "Installation Total".into(),
            Self::FirstVisitTotal        => "First Visit Total".into(),
            Self::MonthlyRecurring       => "Monthly Recurring".into(),
            Self::FirstMonthTotal        => "First Month Total".into(),
            Self::ContractTotal          => "Contract Total".into(),
        }
    }

    /// Does a change to `input` invalidate an override on this field?
    /// Totals inherit the inputs of every line feeding them.
    pub fn depends_on_input(&self, input: &InputField) -> bool {
        use InputField as I;
        let main = || {
            matches!(
                input,
                I::UnitCount
                    | I::AreaSqFt
                    | I::InstallTierUnits
                    | I::ForcedOption
                    | I::ForceVolumeTier
                    | I::AllInclusive
            )
        };
        let add_ons = || {
            matches!(
                input,
                I::SpecialItemCount(_) | I::PlumbingUnits | I::NeedsPlumbing | I::AllInclusive
            )
        };
        let per_visit = || main() || add_ons() || matches!(input, I::RateCategory);
        let install = || {
            matches!(
                input,
                I::UnitCount
                    | I::AreaSqFt
                    | I::InstallTierUnits
                    | I::NewInstall
                    | I::Condition
                    | I::ForcedOption
                    | I::ForceVolumeTier
                    | I::SpecialItemCount(_)
            )
        };
        let first_visit = || install() || per_visit() || matches!(input, I::OneTimeAddons);
        let monthly = || per_visit() || matches!(input, I::Frequency);

        match self {
            Self::StandardRate
            | Self::AlternateBaseCharge
            | Self::AlternateRate
            | Self::VolumeTierRate
            | Self::MinimumCharge => false,
            Self::PlumbingRate => matches!(input, I::NeedsPlumbing),
            Self::SpecialItemRate(key) | Self::SpecialItemInstallRate(key) => {
                matches!(input, I::SpecialItemCount(k) if k == key)
            }
            Self::InstallRatePerUnit => matches!(input, I::NewInstall),
            Self::MainServiceTotal   => main(),
            Self::SpecialItemsTotal  => add_ons(),
            Self::PerVisitTotal      => per_visit(),
            Self::InstallationTotal  => install(),
            Self::FirstVisitTotal    => first_visit(),
            Self::MonthlyRecurring   => monthly(),
            Self::FirstMonthTotal    => first_visit() || monthly(),
            Self::ContractTotal => {
                first_visit() || monthly() || matches!(input, I::ContractMonths)
            }
        }
    }

    /// Is `upstream` a direct input of this field's calculation?
    pub fn feeds_from(&self, upstream: &FieldKey) -> bool {
        use FieldKey as F;
        match self {
            F::MainServiceTotal => matches!(
                upstream,
                F::StandardRate | F::AlternateBaseCharge | F::AlternateRate | F::VolumeTierRate
            ),
            F::SpecialItemsTotal => matches!(upstream, F::SpecialItemRate(_) | F::PlumbingRate),
            F::PerVisitTotal => matches!(
                upstream,
                F::MainServiceTotal | F::SpecialItemsTotal | F::MinimumCharge
            ),
            F::InstallationTotal => {
                matches!(upstream, F::InstallRatePerUnit | F::SpecialItemInstallRate(_))
            }
            F::FirstVisitTotal => matches!(upstream, F::InstallationTotal | F::PerVisitTotal),
            F::MonthlyRecurring => matches!(upstream, F::PerVisitTotal),
            F::FirstMonthTotal => matches!(
                upstream,
                F::FirstVisitTotal | F::PerVisitTotal | F::MonthlyRecurring
            ),
            F::ContractTotal => matches!(
                upstream,
                F::FirstVisitTotal | F::PerVisitTotal | F::MonthlyRecurring | F::FirstMonthTotal
            ),
            _ => false,
        }
    }

    /// Every field reachable from this one along `feeds_from` edges,
    /// whether or not the fields in between carry an override.
    pub fn downstream(&self) -> Vec<FieldKey> {
        let mut reached: Vec<FieldKey> = Vec::new();
        let mut frontier = vec![self.clone()];
        while let Some(upstream) = frontier.pop() {
            for field in &Self::TOTALS {
                if field.feeds_from(&upstream) && !reached.contains(field) {
                    reached.push(field.clone());
                    frontier.push(field.clone());
                }
            }
        }
        reached
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SpecialItemRate(k)        => return write!(f, "special_item_rate:{k}"),
            Self::SpecialItemInstallRate(k) => return write!(f, "special_item_install_rate:{k}"),
            Self::StandardRate        => "standard_rate",
            Self::AlternateBaseCharge => "alternate_base_charge",
            Self::AlternateRate       => "alternate_rate",
            Self::VolumeTierRate      => "volume_tier_rate",
            Self::PlumbingRate        => "plumbing_rate",
            Self::InstallRatePerUnit  => "install_rate_per_unit",
            Self::MinimumCharge       => "minimum_charge",
            Self::MainServiceTotal    => "main_service_total",
            Self::SpecialItemsTotal   => "special_items_total",
            Self::PerVisitTotal       => "per_visit_total",
            Self::InstallationTotal   => "installation_total",
            Self::FirstVisitTotal     => "first_visit_total",
            Self::MonthlyRecurring    => "monthly_recurring",
            Self::FirstMonthTotal     => "first_month_total",
            Self::ContractTotal       => "contract_total",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown override field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for FieldKey {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(item) = s.strip_prefix("special_item_rate:") {
            return Ok(Self::SpecialItemRate(item.to_string()));
        }
        if let Some(item) = s.strip_prefix("special_item_install_rate:") {
            return Ok(Self::SpecialItemInstallRate(item.to_string()));
        }
        match s {
            "standard_rate"         => Ok(Self::StandardRate),
            "alternate_base_charge" => Ok(Self::AlternateBaseCharge),
            "alternate_rate"        => Ok(Self::AlternateRate),
            "volume_tier_rate"      => Ok(Self::VolumeTierRate),
            "plumbing_rate"         => Ok(Self::PlumbingRate),
            "install_rate_per_unit" => Ok(Self::InstallRatePerUnit),
            "minimum_charge"        => Ok(Self::MinimumCharge),
            "main_service_total"    => Ok(Self::MainServiceTotal),
            "special_items_total"   => Ok(Self::SpecialItemsTotal),
            "per_visit_total"       => Ok(Self::PerVisitTotal),
            "installation_total"    => Ok(Self::InstallationTotal),
            "first_visit_total"     => Ok(Self::FirstVisitTotal),
            "monthly_recurring"     => Ok(Self::MonthlyRecurring),
            "first_month_total"     => Ok(Self::FirstMonthTotal),
            "contract_total" | "custom_contract_total" => Ok(Self::ContractTotal),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

impl TryFrom<String> for FieldKey {
    type Error = UnknownField;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldKey> for String {
    fn from(value: FieldKey) -> Self {
        value.to_string()
    }
}

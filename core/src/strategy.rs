//! Per-service pricing strategy descriptors.
//!
//! One calculator serves every service; the descriptor tells it which input
//! drives the tiered main line and how the first visit relates to the
//! installation.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStrategy {
    /// Main line priced per countable unit (drains, fixtures, windows).
    PerUnit,
    /// Main line priced per square foot (janitorial, floor care).
    PerArea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstVisitRule {
    /// First visit = installation + the full per-visit service.
    InstallPlusService,
    /// The installation work replaces the first regular service of the
    /// installed units; only the rest of the per-visit service is added.
    InstallCoversMainService,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    pub service_id:       String,
    pub display_name:     String,
    pub unit_label:       String,
    pub strategy:         PricingStrategy,
    pub first_visit_rule: FirstVisitRule,
}

impl ServiceDescriptor {
    pub fn new(
        service_id: &str,
        display_name: &str,
        unit_label: &str,
        strategy: PricingStrategy,
        first_visit_rule: FirstVisitRule,
    ) -> Self {
        Self {
            service_id:   service_id.to_string(),
            display_name: display_name.to_string(),
            unit_label:   unit_label.to_string(),
            strategy,
            first_visit_rule,
        }
    }
}

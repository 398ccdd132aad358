//! One quote being edited for one service.
//!
//! The session owns the input, the resolved config and the override tracker,
//! and re-derives the `QuoteResult` after every mutation. Nothing else holds
//! quote state.

use crate::{
    calculator::QuoteCalculator,
    config::PricingConfig,
    defaults,
    error::EngineResult,
    fields::FieldKey,
    input::QuoteInput,
    overrides::OverrideSet,
    quote::QuoteResult,
    resolver::{ConfigResolver, ConfigSource},
    strategy::{PricingStrategy, ServiceDescriptor},
    tracker::{ChangeContext, ChangeSink, OverrideTracker},
    types::{sanitize_quantity, SessionId},
};
use log::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// New config, overrides and baselines survive.
    Keep,
    /// Explicit refresh command: overrides and baselines are discarded.
    Force,
}

pub struct QuoteSession<S: ChangeSink> {
    session_id: SessionId,
    descriptor: ServiceDescriptor,
    input:      QuoteInput,
    config:     PricingConfig,
    tracker:    OverrideTracker<S>,
    result:     QuoteResult,
    /// Set once the operator types this service's own contract length.
    contract_months_explicit: bool,
}

impl<S: ChangeSink> QuoteSession<S> {
    /// Open a session against an already-resolved config.
    pub fn open(config: PricingConfig, sink: S) -> Self {
        let descriptor = defaults::descriptor(&config.service_id);
        let input = QuoteInput {
            frequency: Some(config.default_frequency),
            contract_months: config.contract.default_months as f64,
            ..QuoteInput::default()
        };
        let overrides = OverrideSet::new();
        let result = QuoteCalculator::calculate(&input, &config, &descriptor, &overrides);

        let mut tracker = OverrideTracker::new(sink);
        tracker.record_baselines(&result);

        let session_id = Uuid::new_v4().to_string();
        info!("Opened quote session {session_id} for '{}'", config.service_id);
        Self {
            session_id,
            descriptor,
            input,
            config,
            tracker,
            result,
            contract_months_explicit: false,
        }
    }

    /// Resolve the config for `service_id` and open a session on it.
    pub fn resolve_and_open(
        resolver: &mut ConfigResolver,
        source: &dyn ConfigSource,
        service_id: &str,
        sink: S,
    ) -> Self {
        let config = resolver.get_active_config(source, service_id);
        Self::open(config, sink)
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn service_id(&self) -> &str {
        &self.descriptor.service_id
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn input(&self) -> &QuoteInput {
        &self.input
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn result(&self) -> &QuoteResult {
        &self.result
    }

    pub fn overrides(&self) -> &OverrideSet {
        self.tracker.overrides()
    }

    pub fn tracker(&self) -> &OverrideTracker<S> {
        &self.tracker
    }

    pub fn effective_value(&self, field: &FieldKey) -> Option<f64> {
        self.result.effective_value(field)
    }

    pub fn baseline(&self, field: &FieldKey) -> Option<f64> {
        self.tracker.baseline(field)
    }

    pub fn contract_months_explicit(&self) -> bool {
        self.contract_months_explicit
    }

    // ── Mutations ──────────────────────────────────────────────

    /// Replace the input. Overrides depending on changed inputs are cleared
    /// and returned. A blank contract length keeps the current one; only a
    /// different positive length counts as the operator setting it.
    pub fn update_input(&mut self, mut next: QuoteInput) -> Vec<FieldKey> {
        let months = sanitize_quantity(next.contract_months);
        if months == 0.0 {
            next.contract_months = self.input.contract_months;
        } else if months != sanitize_quantity(self.input.contract_months) {
            self.contract_months_explicit = true;
        }
        let cleared = self.tracker.apply_input_change(&self.input, &next);
        self.input = next;
        self.recompute();
        cleared
    }

    /// Adopt an agreement-wide contract length unless this service's own
    /// length was set by the operator. Returns whether it was adopted.
    pub fn adopt_contract_months(&mut self, months: u32) -> bool {
        if self.contract_months_explicit {
            return false;
        }
        let mut next = self.input.clone();
        next.contract_months = months as f64;
        self.tracker.apply_input_change(&self.input, &next);
        self.input = next;
        self.recompute();
        true
    }

    /// Set an override and queue its audit entry. A non-finite or negative
    /// value clears the field instead.
    pub fn set_override(&mut self, field: FieldKey, value: f64) -> Vec<FieldKey> {
        let cleared = self.tracker.set_override(field.clone(), value);
        if cleared.is_empty() && self.tracker.overrides().contains(&field) {
            let ctx = ChangeContext {
                product_key: &self.descriptor.service_id,
                config:      &self.config,
                quantity:    self.quantity_for(&field),
                frequency:   self.result.frequency,
            };
            self.tracker.log_change(&field, value, &ctx);
        }
        self.recompute();
        cleared
    }

    pub fn clear_override(&mut self, field: &FieldKey) -> Vec<FieldKey> {
        let cleared = self.tracker.clear_override(field);
        self.recompute();
        cleared
    }

    /// Install a newly resolved config.
    pub fn apply_config(&mut self, config: PricingConfig, mode: RefreshMode) {
        debug!(
            "Applying config version {} to session {} ({mode:?})",
            config.version, self.session_id
        );
        self.config = config;
        if mode == RefreshMode::Force {
            self.tracker.reset();
        }
        self.recompute();
        self.tracker.record_baselines(&self.result);
    }

    /// Refetch the config and apply it. A superseded fetch changes nothing
    /// and returns false.
    pub fn refresh_config(
        &mut self,
        resolver: &mut ConfigResolver,
        source: &dyn ConfigSource,
        mode: RefreshMode,
    ) -> bool {
        let ticket = resolver.begin_fetch(self.service_id());
        let outcome = source.fetch_active_config(self.service_id());
        match resolver.complete_fetch(ticket, outcome) {
            Some(config) => {
                self.apply_config(config, mode);
                true
            }
            None => false,
        }
    }

    /// Emit the audit trail and end the edit. Returns the quote as saved.
    /// When the sink fails nothing is discarded and the error is returned.
    pub fn save(&mut self) -> EngineResult<QuoteResult> {
        let emitted = self.tracker.flush()?;
        let saved = self.result.clone();
        info!(
            "Saved quote session {} for '{}' ({emitted} changes, contract ${:.2})",
            self.session_id,
            self.service_id(),
            saved.contract_total
        );
        self.start_new_edit();
        Ok(saved)
    }

    /// Abandon the edit: overrides, baselines and queued entries go.
    pub fn cancel(&mut self) {
        debug!("Cancelled quote session {}", self.session_id);
        self.start_new_edit();
    }

    fn start_new_edit(&mut self) {
        self.tracker.reset();
        self.recompute();
        self.tracker.record_baselines(&self.result);
    }

    fn recompute(&mut self) {
        self.result = QuoteCalculator::calculate(
            &self.input,
            &self.config,
            &self.descriptor,
            self.tracker.overrides(),
        );
    }

    fn quantity_for(&self, field: &FieldKey) -> f64 {
        match field {
            FieldKey::SpecialItemRate(key) | FieldKey::SpecialItemInstallRate(key) => {
                self.input.special_item_count(key)
            }
            FieldKey::PlumbingRate => sanitize_quantity(self.input.plumbing_units),
            _ => match self.descriptor.strategy {
                PricingStrategy::PerUnit => sanitize_quantity(self.input.unit_count),
                PricingStrategy::PerArea => sanitize_quantity(self.input.area_sq_ft),
            },
        }
    }
}

//! Manual overrides, baselines and the audit trail.
//!
//! STATE per field: Unset → Overridden → Unset. An override returns to Unset
//! when the operator clears it, when a declared input dependency changes,
//! when an upstream override it was built on is cleared, or on a forced
//! config refresh.
//!
//! Baselines are the effective values at the first resolution of each field
//! in a session. They exist only to compute audit deltas and never feed the
//! live quote.

use crate::{
    config::PricingConfig,
    error::EngineResult,
    fields::FieldKey,
    frequency::Frequency,
    input::{InputField, QuoteInput},
    overrides::OverrideSet,
    quote::QuoteResult,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One audited change, relative to the session baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub product_key:        String,
    pub field_type:         String,
    pub field_display_name: String,
    pub original_value:     f64,
    pub new_value:          f64,
    pub delta:              f64,
    pub quantity:           f64,
    pub frequency:          String,
}

/// Port for the audit trail. Injected into the tracker.
pub trait ChangeSink {
    fn emit(&mut self, records: &[ChangeRecord]) -> EngineResult<()>;
}

impl<S: ChangeSink + ?Sized> ChangeSink for Box<S> {
    fn emit(&mut self, records: &[ChangeRecord]) -> EngineResult<()> {
        (**self).emit(records)
    }
}

/// Collects emitted batches in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<ChangeRecord>>,
}

impl ChangeSink for MemorySink {
    fn emit(&mut self, records: &[ChangeRecord]) -> EngineResult<()> {
        self.batches.push(records.to_vec());
        Ok(())
    }
}

/// What the tracker needs to describe a change for the audit trail.
pub struct ChangeContext<'a> {
    pub product_key: &'a str,
    pub config:      &'a PricingConfig,
    pub quantity:    f64,
    pub frequency:   Frequency,
}

pub struct OverrideTracker<S: ChangeSink> {
    sink:      S,
    overrides: OverrideSet,
    baselines: BTreeMap<FieldKey, f64>,
    pending:   BTreeMap<FieldKey, ChangeRecord>,
}

impl<S: ChangeSink> OverrideTracker<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            overrides: OverrideSet::new(),
            baselines: BTreeMap::new(),
            pending:   BTreeMap::new(),
        }
    }

    pub fn overrides(&self) -> &OverrideSet {
        &self.overrides
    }

    pub fn baseline(&self, field: &FieldKey) -> Option<f64> {
        self.baselines.get(field).copied()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.pending.values()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Record baselines from a resolved quote. A field that already has a
    /// baseline keeps it; only fields seen for the first time are recorded.
    /// Returns the number of new baselines.
    pub fn record_baselines(&mut self, result: &QuoteResult) -> usize {
        let mut recorded = 0;
        for (field, value) in &result.effective {
            if !self.baselines.contains_key(field) {
                self.baselines.insert(field.clone(), *value);
                recorded += 1;
            }
        }
        recorded
    }

    /// Set an override. Non-finite or negative values clear the field.
    pub fn set_override(&mut self, field: FieldKey, value: f64) -> Vec<FieldKey> {
        if value.is_finite() && value >= 0.0 {
            self.overrides.set(field, value);
            Vec::new()
        } else {
            self.clear_override(&field)
        }
    }

    /// Clear an override and every override downstream of it.
    pub fn clear_override(&mut self, field: &FieldKey) -> Vec<FieldKey> {
        let mut cleared = Vec::new();
        if self.overrides.clear(field).is_some() {
            cleared.push(field.clone());
        }
        self.pending.remove(field);
        self.clear_downstream(&mut cleared);
        cleared
    }

    /// Diff two inputs and clear every override whose declared dependencies
    /// changed, plus everything downstream of those.
    pub fn apply_input_change(&mut self, prev: &QuoteInput, next: &QuoteInput) -> Vec<FieldKey> {
        let changed = prev.changed_fields(next);
        self.clear_for_inputs(&changed)
    }

    pub fn clear_for_inputs(&mut self, changed: &[InputField]) -> Vec<FieldKey> {
        if changed.is_empty() || self.overrides.is_empty() {
            return Vec::new();
        }
        let mut cleared: Vec<FieldKey> = self
            .overrides
            .keys()
            .filter(|field| changed.iter().any(|input| field.depends_on_input(input)))
            .cloned()
            .collect();
        for field in &cleared {
            self.overrides.clear(field);
            self.pending.remove(field);
        }
        self.clear_downstream(&mut cleared);

        if !cleared.is_empty() {
            let inputs: Vec<String> = changed.iter().map(|i| i.to_string()).collect();
            let fields: Vec<String> = cleared.iter().map(|f| f.to_string()).collect();
            debug!(
                "Input change [{}] cleared overrides [{}]",
                inputs.join(", "),
                fields.join(", ")
            );
        }
        cleared
    }

    /// Extend `cleared` with every override downstream of a field already
    /// in it. The walk follows the full field graph, so a gap of
    /// non-overridden fields in between does not stop it.
    fn clear_downstream(&mut self, cleared: &mut Vec<FieldKey>) {
        let roots = cleared.clone();
        for root in &roots {
            for field in root.downstream() {
                if self.overrides.clear(&field).is_some() {
                    self.pending.remove(&field);
                    cleared.push(field);
                }
            }
        }
    }

    /// Queue an audit entry for `field`. The delta is always against the
    /// baseline, and a later entry for the same field replaces an earlier
    /// one. An entry that nets out to the baseline is dropped.
    pub fn log_change(&mut self, field: &FieldKey, new_value: f64, ctx: &ChangeContext<'_>) {
        let original = match self.baselines.get(field) {
            Some(v) => *v,
            None => {
                debug!("No baseline for {field}; recording {new_value} as its baseline");
                self.baselines.insert(field.clone(), new_value);
                new_value
            }
        };

        if (new_value - original).abs() < 1e-9 {
            self.pending.remove(field);
            return;
        }

        self.pending.insert(
            field.clone(),
            ChangeRecord {
                product_key:        ctx.product_key.to_string(),
                field_type:         field.field_type().to_string(),
                field_display_name: field.display_name(ctx.config),
                original_value:     original,
                new_value,
                delta:              new_value - original,
                quantity:           ctx.quantity,
                frequency:          ctx.frequency.key().to_string(),
            },
        );
    }

    /// Emit pending entries to the sink. They are cleared only when the sink
    /// accepts them; on failure they stay queued for the next attempt.
    pub fn flush(&mut self) -> EngineResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let records: Vec<ChangeRecord> = self.pending.values().cloned().collect();
        match self.sink.emit(&records) {
            Ok(()) => {
                self.pending.clear();
                info!("Emitted {} change records", records.len());
                Ok(records.len())
            }
            Err(e) => {
                warn!("Audit sink rejected {} change records: {e}", records.len());
                Err(e)
            }
        }
    }

    /// Forced refresh, save or cancel: overrides, baselines and queued
    /// entries all go.
    pub fn reset(&mut self) {
        if !self.overrides.is_empty() || !self.pending.is_empty() {
            debug!(
                "Refresh discarded {} overrides and {} pending changes",
                self.overrides.len(),
                self.pending.len()
            );
        }
        self.overrides.clear_all();
        self.baselines.clear();
        self.pending.clear();
    }
}

use fieldquote_core::{
    defaults,
    error::{EngineError, EngineResult},
    fields::FieldKey,
    frequency::Frequency,
    input::QuoteInput,
    resolver::{ConfigResolver, ConfigSource, NoRemoteSource},
    session::{QuoteSession, RefreshMode},
    tracker::{ChangeRecord, ChangeSink, MemorySink},
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn drains_session() -> QuoteSession<MemorySink> {
    QuoteSession::open(defaults::default_config("drains"), MemorySink::default())
}

fn with_grease_traps(session: &QuoteSession<MemorySink>, count: f64) -> QuoteInput {
    QuoteInput {
        new_install: true,
        special_items: BTreeMap::from([("grease_trap".to_string(), count)]),
        ..session.input().clone()
    }
}

#[test]
fn item_install_override_clears_when_item_count_changes() {
    let mut s = drains_session();
    let field = FieldKey::SpecialItemInstallRate("grease_trap".into());

    s.update_input(with_grease_traps(&s, 2.0));
    s.set_override(field.clone(), 250.0);
    assert_eq!(s.effective_value(&field), Some(250.0));
    assert_eq!(s.result().installation_total, 500.0);

    let cleared = s.update_input(with_grease_traps(&s, 3.0));
    assert!(cleared.contains(&field));
    assert!(!s.overrides().contains(&field));
    assert_eq!(s.effective_value(&field), Some(300.0));
    assert_eq!(s.result().installation_total, 900.0);
}

#[test]
fn unrelated_input_change_keeps_override() {
    let mut s = drains_session();
    let field = FieldKey::SpecialItemInstallRate("grease_trap".into());
    s.update_input(with_grease_traps(&s, 2.0));
    s.set_override(field.clone(), 250.0);

    let next = QuoteInput { frequency: Some(Frequency::Biweekly), ..s.input().clone() };
    let cleared = s.update_input(next);
    assert!(!cleared.contains(&field));
    assert_eq!(s.overrides().get(&field), Some(250.0));
}

#[test]
fn clearing_upstream_override_clears_downstream_totals() {
    let mut s = drains_session();
    s.update_input(QuoteInput { unit_count: 5.0, ..s.input().clone() });
    s.set_override(FieldKey::PerVisitTotal, 45.0);
    s.set_override(FieldKey::MonthlyRecurring, 190.0);
    s.set_override(FieldKey::ContractTotal, 2_200.0);

    let cleared = s.clear_override(&FieldKey::PerVisitTotal);
    assert!(cleared.contains(&FieldKey::PerVisitTotal));
    assert!(cleared.contains(&FieldKey::MonthlyRecurring));
    assert!(cleared.contains(&FieldKey::ContractTotal));
    assert!(s.overrides().is_empty());
    assert_eq!(s.result().contract_total, 2078.4);
}

#[test]
fn clearing_a_rate_reaches_totals_past_non_overridden_lines() {
    let mut s = drains_session();
    s.update_input(QuoteInput { unit_count: 5.0, ..s.input().clone() });
    s.set_override(FieldKey::StandardRate, 7.0);
    s.set_override(FieldKey::MonthlyRecurring, 190.0);
    s.set_override(FieldKey::InstallationTotal, 100.0);

    let cleared = s.clear_override(&FieldKey::StandardRate);
    assert_eq!(cleared, vec![FieldKey::StandardRate, FieldKey::MonthlyRecurring]);
    assert_eq!(s.overrides().get(&FieldKey::MonthlyRecurring), None);
    assert_eq!(s.overrides().get(&FieldKey::InstallationTotal), Some(100.0));
    assert_eq!(s.result().monthly_recurring, 173.2);
}

#[test]
fn unit_count_change_clears_totals_but_not_rates() {
    let mut s = drains_session();
    s.update_input(QuoteInput { unit_count: 5.0, ..s.input().clone() });
    s.set_override(FieldKey::StandardRate, 9.0);
    s.set_override(FieldKey::MainServiceTotal, 30.0);
    s.set_override(FieldKey::ContractTotal, 1_500.0);

    let cleared = s.update_input(QuoteInput { unit_count: 6.0, ..s.input().clone() });
    assert!(cleared.contains(&FieldKey::MainServiceTotal));
    assert!(cleared.contains(&FieldKey::ContractTotal));
    assert_eq!(s.overrides().get(&FieldKey::StandardRate), Some(9.0));
}

#[test]
fn zero_override_is_not_a_cleared_field() {
    let mut s = drains_session();
    s.update_input(QuoteInput { unit_count: 5.0, ..s.input().clone() });
    s.set_override(FieldKey::PerVisitTotal, 0.0);
    assert_eq!(s.result().per_visit, 0.0);

    // An emptied form field posts NaN, which clears.
    s.set_override(FieldKey::PerVisitTotal, f64::NAN);
    assert!(!s.overrides().contains(&FieldKey::PerVisitTotal));
    assert_eq!(s.result().per_visit, 40.0);
}

#[test]
fn change_log_compares_against_baseline_and_coalesces() {
    let mut s = drains_session();
    // Baselines were recorded when the session opened.
    let baseline = s.baseline(&FieldKey::StandardRate);
    assert_eq!(baseline, Some(10.0));

    s.set_override(FieldKey::StandardRate, 11.0);
    s.set_override(FieldKey::StandardRate, 12.5);
    assert_eq!(s.tracker().pending_count(), 1);

    let record = s.tracker().pending().next().cloned();
    let record = record.expect("pending record");
    assert_eq!(record.original_value, 10.0);
    assert_eq!(record.new_value, 12.5);
    assert_eq!(record.delta, 2.5);
    assert_eq!(record.field_type, "rate");
    assert_eq!(record.field_display_name, "Standard Rate");
    assert_eq!(record.product_key, "drains");
}

#[test]
fn returning_to_baseline_drops_the_pending_entry() {
    let mut s = drains_session();
    s.set_override(FieldKey::StandardRate, 11.0);
    s.set_override(FieldKey::StandardRate, 10.0);
    assert_eq!(s.tracker().pending_count(), 0);
}

#[test]
fn baselines_survive_input_changes() {
    let mut s = drains_session();
    s.update_input(QuoteInput { unit_count: 5.0, ..s.input().clone() });
    // The baseline is the value at session open, not the current value.
    assert_eq!(s.baseline(&FieldKey::PerVisitTotal), Some(0.0));
    assert_eq!(s.effective_value(&FieldKey::PerVisitTotal), Some(40.0));
}

#[test]
fn save_emits_one_batch_and_ends_the_edit() {
    let mut s = drains_session();
    s.update_input(QuoteInput { unit_count: 5.0, ..s.input().clone() });
    s.set_override(FieldKey::PerVisitTotal, 45.0);
    s.set_override(FieldKey::StandardRate, 8.0);

    let saved = s.save().expect("save");
    assert_eq!(saved.per_visit, 45.0);

    let batches = &s.tracker().sink().batches;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    assert!(s.overrides().is_empty());
    assert_eq!(s.tracker().pending_count(), 0);

    // Nothing pending: a second save emits nothing.
    s.save().expect("second save");
    assert_eq!(s.tracker().sink().batches.len(), 1);
}

struct FailingSink;

impl ChangeSink for FailingSink {
    fn emit(&mut self, records: &[ChangeRecord]) -> EngineResult<()> {
        Err(EngineError::SinkRejected { count: records.len(), reason: "offline".into() })
    }
}

#[test]
fn failed_flush_keeps_pending_entries() {
    let mut s = QuoteSession::open(defaults::default_config("drains"), FailingSink);
    s.set_override(FieldKey::StandardRate, 12.0);

    assert!(s.save().is_err());
    assert_eq!(s.tracker().pending_count(), 1);
    assert_eq!(s.overrides().get(&FieldKey::StandardRate), Some(12.0));
}

#[test]
fn cancel_discards_everything() {
    let mut s = drains_session();
    s.set_override(FieldKey::StandardRate, 12.0);
    s.cancel();
    assert!(s.overrides().is_empty());
    assert_eq!(s.tracker().pending_count(), 0);
    assert!(s.tracker().sink().batches.is_empty());
}

#[test]
fn non_forced_config_update_keeps_overrides() {
    let mut s = drains_session();
    s.set_override(FieldKey::StandardRate, 12.0);

    let mut config = defaults::default_config("drains");
    config.version = 4;
    config.unit_pricing.standard_rate = 11.0;
    s.apply_config(config.clone(), RefreshMode::Keep);
    assert_eq!(s.overrides().get(&FieldKey::StandardRate), Some(12.0));
    assert_eq!(s.baseline(&FieldKey::StandardRate), Some(10.0));

    s.apply_config(config, RefreshMode::Force);
    assert!(s.overrides().is_empty());
    assert_eq!(s.baseline(&FieldKey::StandardRate), Some(11.0));
    assert_eq!(s.tracker().pending_count(), 0);
}

struct RepricedSource;

impl ConfigSource for RepricedSource {
    fn fetch_active_config(&self, _service_id: &str) -> EngineResult<Option<Value>> {
        Ok(Some(json!({ "version": 5, "standardRatePerUnit": 11 })))
    }
}

#[test]
fn forced_refresh_refetches_and_rebaselines() {
    let mut resolver = ConfigResolver::new();
    let mut s =
        QuoteSession::resolve_and_open(&mut resolver, &NoRemoteSource, "drains", MemorySink::default());
    s.set_override(FieldKey::StandardRate, 12.0);

    assert!(s.refresh_config(&mut resolver, &RepricedSource, RefreshMode::Keep));
    assert_eq!(s.config().version, 5);
    assert_eq!(s.overrides().get(&FieldKey::StandardRate), Some(12.0));

    assert!(s.refresh_config(&mut resolver, &RepricedSource, RefreshMode::Force));
    assert!(s.overrides().is_empty());
    assert_eq!(s.baseline(&FieldKey::StandardRate), Some(11.0));
    assert_eq!(s.effective_value(&FieldKey::StandardRate), Some(11.0));
}

use fieldquote_core::{
    agreement::Agreement,
    defaults,
    error::EngineError,
    input::QuoteInput,
    resolver::{ConfigResolver, NoRemoteSource},
    session::QuoteSession,
    tracker::MemorySink,
};

fn session(service_id: &str, units: f64) -> QuoteSession<MemorySink> {
    let mut s = QuoteSession::open(defaults::default_config(service_id), MemorySink::default());
    s.update_input(QuoteInput { unit_count: units, ..s.input().clone() });
    s
}

#[test]
fn activated_services_adopt_the_shared_length() {
    let mut agreement = Agreement::new(24);
    let s = agreement.activate(session("drains", 5.0));
    assert_eq!(s.result().contract_months, 24);
    assert!(!s.contract_months_explicit());
}

#[test]
fn explicit_service_length_is_kept() {
    let mut explicit = session("drains", 5.0);
    explicit.update_input(QuoteInput { contract_months: 6.0, ..explicit.input().clone() });

    let mut agreement = Agreement::new(24);
    agreement.activate(explicit);
    agreement.activate(session("restroom_hygiene", 5.0));

    let adopted = agreement.set_shared_contract_months(18);
    assert_eq!(adopted, vec!["restroom_hygiene".to_string()]);

    let drains = agreement.session("drains").expect("drains active");
    assert_eq!(drains.result().contract_months, 6);
    let restroom = agreement.session("restroom_hygiene").expect("restroom active");
    assert_eq!(restroom.result().contract_months, 18);
}

#[test]
fn input_without_a_contract_length_keeps_following_the_agreement() {
    let mut agreement = Agreement::new(24);
    let s = agreement.activate(session("drains", 5.0));
    s.update_input(QuoteInput { unit_count: 6.0, contract_months: 0.0, ..s.input().clone() });
    assert!(!s.contract_months_explicit());
    assert_eq!(s.result().contract_months, 24);

    assert_eq!(agreement.set_shared_contract_months(18), vec!["drains".to_string()]);
    let drains = agreement.session("drains").expect("drains active");
    assert_eq!(drains.result().contract_months, 18);
}

#[test]
fn totals_sum_active_services() {
    let mut agreement = Agreement::new(12);
    agreement.activate(session("drains", 5.0));
    agreement.activate(session("restroom_hygiene", 5.0));

    let totals = agreement.totals();
    assert_eq!(totals.services, 2);
    assert_eq!(totals.per_visit, 80.0);
    assert_eq!(totals.monthly_recurring, 346.4);
    assert_eq!(totals.contract_total, 4156.8);
}

#[test]
fn missing_session_is_an_error() {
    let mut agreement: Agreement<MemorySink> = Agreement::new(12);
    match agreement.session_mut("floor_care") {
        Err(EngineError::SessionNotFound { service_id }) => assert_eq!(service_id, "floor_care"),
        _ => panic!("expected SessionNotFound"),
    }
}

#[test]
fn save_all_flushes_every_session() {
    let mut agreement = Agreement::new(12);
    agreement.activate(session("drains", 5.0));
    agreement.activate(session("janitorial", 0.0));

    agreement
        .session_mut("drains")
        .unwrap()
        .set_override(fieldquote_core::fields::FieldKey::PerVisitTotal, 45.0);

    let saved = agreement.save_all().expect("save all");
    assert_eq!(saved.len(), 2);
    let drains = agreement.session("drains").unwrap();
    assert_eq!(drains.tracker().sink().batches.len(), 1);
    assert!(drains.overrides().is_empty());
}

#[test]
fn deactivated_service_leaves_the_totals() {
    let mut resolver = ConfigResolver::new();
    let mut agreement = Agreement::new(12);
    let mut s = QuoteSession::resolve_and_open(&mut resolver, &NoRemoteSource, "drains", MemorySink::default());
    s.update_input(QuoteInput { unit_count: 5.0, ..s.input().clone() });
    agreement.activate(s);

    assert!(agreement.deactivate("drains").is_some());
    assert_eq!(agreement.totals().contract_total, 0.0);
    assert_eq!(agreement.service_ids().count(), 0);
}

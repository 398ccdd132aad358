//! A multi-service agreement: active quote sessions sharing one contract
//! length.

use crate::{
    error::{EngineError, EngineResult},
    quote::QuoteResult,
    session::QuoteSession,
    tracker::ChangeSink,
    types::{round_money, ServiceId},
};
use log::{info, warn};
use serde::Serialize;
use std::collections::{btree_map::Entry, BTreeMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementTotals {
    pub services:          usize,
    pub per_visit:         f64,
    pub first_month:       f64,
    pub monthly_recurring: f64,
    pub contract_total:    f64,
}

pub struct Agreement<S: ChangeSink> {
    contract_months: u32,
    sessions:        BTreeMap<ServiceId, QuoteSession<S>>,
}

impl<S: ChangeSink> Agreement<S> {
    pub fn new(contract_months: u32) -> Self {
        Self { contract_months, sessions: BTreeMap::new() }
    }

    pub fn contract_months(&self) -> u32 {
        self.contract_months
    }

    /// Add a service. It adopts the shared contract length unless its own
    /// length was already set explicitly. Replaces any session already
    /// active for the same service.
    pub fn activate(&mut self, mut session: QuoteSession<S>) -> &mut QuoteSession<S> {
        session.adopt_contract_months(self.contract_months);
        let service_id = session.service_id().to_string();
        info!("Activated '{service_id}' on agreement ({} months)", self.contract_months);
        match self.sessions.entry(service_id) {
            Entry::Occupied(mut slot) => {
                slot.insert(session);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(session),
        }
    }

    pub fn deactivate(&mut self, service_id: &str) -> Option<QuoteSession<S>> {
        self.sessions.remove(service_id)
    }

    pub fn session(&self, service_id: &str) -> Option<&QuoteSession<S>> {
        self.sessions.get(service_id)
    }

    pub fn session_mut(&mut self, service_id: &str) -> EngineResult<&mut QuoteSession<S>> {
        self.sessions
            .get_mut(service_id)
            .ok_or_else(|| EngineError::SessionNotFound { service_id: service_id.to_string() })
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Change the shared length. Services with their own explicit length
    /// keep it. Returns the services that adopted the new value.
    pub fn set_shared_contract_months(&mut self, months: u32) -> Vec<ServiceId> {
        self.contract_months = months;
        self.sessions
            .iter_mut()
            .filter_map(|(id, s)| s.adopt_contract_months(months).then(|| id.clone()))
            .collect()
    }

    /// Save every session. All sessions are attempted; the first failure is
    /// returned after the rest have been tried.
    pub fn save_all(&mut self) -> EngineResult<Vec<QuoteResult>> {
        let mut saved = Vec::with_capacity(self.sessions.len());
        let mut first_error = None;
        for (id, session) in self.sessions.iter_mut() {
            match session.save() {
                Ok(result) => saved.push(result),
                Err(e) => {
                    warn!("Saving '{id}' failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }

    pub fn totals(&self) -> AgreementTotals {
        let mut totals = AgreementTotals {
            services:          self.sessions.len(),
            per_visit:         0.0,
            first_month:       0.0,
            monthly_recurring: 0.0,
            contract_total:    0.0,
        };
        for session in self.sessions.values() {
            let r = session.result();
            totals.per_visit += r.per_visit;
            totals.first_month += r.first_month;
            totals.monthly_recurring += r.monthly_recurring;
            totals.contract_total += r.contract_total;
        }
        totals.per_visit = round_money(totals.per_visit);
        totals.first_month = round_money(totals.first_month);
        totals.monthly_recurring = round_money(totals.monthly_recurring);
        totals.contract_total = round_money(totals.contract_total);
        totals
    }
}

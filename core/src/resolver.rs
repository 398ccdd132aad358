//! Config resolution: remote document → session cache → compiled default.
//!
//! Resolution is field by field. A remote document that lacks (or mangles) a
//! field leaves that field to the cache, and the cache leaves it to the
//! compiled default, so a partial document never blanks a whole config.
//!
//! Fetches are ticketed per service. Only the most recently started fetch may
//! complete; a slower fetch that finishes after a newer one has begun is
//! ignored.

use crate::{
    config::{PartialPricingConfig, PricingConfig},
    config_shape,
    defaults,
    error::EngineResult,
    types::ServiceId,
};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;

/// Port for the remote config source.
pub trait ConfigSource {
    /// `Ok(None)` means the source answered but holds no document.
    fn fetch_active_config(&self, service_id: &str) -> EngineResult<Option<Value>>;
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn fetch_active_config(&self, service_id: &str) -> EngineResult<Option<Value>> {
        (**self).fetch_active_config(service_id)
    }
}

/// A source that never has a document. Resolves straight to the defaults.
pub struct NoRemoteSource;

impl ConfigSource for NoRemoteSource {
    fn fetch_active_config(&self, _service_id: &str) -> EngineResult<Option<Value>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub service_id: ServiceId,
    generation:     u64,
}

#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Accumulated partial view per service: every field any successful
    /// fetch this session has supplied.
    cache:       HashMap<ServiceId, PartialPricingConfig>,
    generations: HashMap<ServiceId, u64>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective config for `service_id`. Fetches only when nothing is
    /// cached yet for this session.
    pub fn get_active_config(
        &mut self,
        source: &dyn ConfigSource,
        service_id: &str,
    ) -> PricingConfig {
        if self.cache.contains_key(service_id) {
            return self.compose(service_id, None);
        }
        self.fetch_now(source, service_id)
    }

    /// Refetch even when cached. The cache stays as the fallback layer if
    /// the source fails.
    pub fn refresh(&mut self, source: &dyn ConfigSource, service_id: &str) -> PricingConfig {
        info!("Refreshing pricing config for '{service_id}'");
        self.fetch_now(source, service_id)
    }

    fn fetch_now(&mut self, source: &dyn ConfigSource, service_id: &str) -> PricingConfig {
        let ticket = self.begin_fetch(service_id);
        let outcome = source.fetch_active_config(service_id);
        // The ticket was just issued, so it cannot be stale here.
        self.complete_fetch(ticket, outcome)
            .unwrap_or_else(|| self.compose(service_id, None))
    }

    /// Start a fetch. Any ticket issued earlier for the same service becomes
    /// stale.
    pub fn begin_fetch(&mut self, service_id: &str) -> FetchTicket {
        let generation = self.generations.entry(service_id.to_string()).or_insert(0);
        *generation += 1;
        FetchTicket {
            service_id: service_id.to_string(),
            generation: *generation,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.generations.get(&ticket.service_id) == Some(&ticket.generation)
    }

    /// Finish a fetch. Returns `None` when the ticket has been superseded;
    /// otherwise the resolved config, falling back through cache and
    /// defaults when the fetch failed or returned nothing usable.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        outcome: EngineResult<Option<Value>>,
    ) -> Option<PricingConfig> {
        let service_id = ticket.service_id.as_str();
        if !self.is_current(&ticket) {
            debug!(
                "Ignoring superseded config fetch for '{service_id}' (generation {})",
                ticket.generation
            );
            return None;
        }

        if !defaults::is_known_service(service_id) {
            warn!("Unknown service '{service_id}'; quoting against the generic schedule");
        }

        let remote = match outcome {
            Ok(Some(doc)) => match config_shape::normalize(&doc, &self.known_items(service_id)) {
                Ok(partial) if partial.is_empty() => {
                    warn!("Config document for '{service_id}' has no usable fields; using cache/defaults");
                    None
                }
                Ok(partial) => Some(partial),
                Err(reason) => {
                    warn!("Malformed config for '{service_id}': {reason}; using cache/defaults");
                    None
                }
            },
            Ok(None) => {
                warn!("No active config for '{service_id}'; using cache/defaults");
                None
            }
            Err(e) => {
                warn!("Config fetch for '{service_id}' failed: {e}; using cache/defaults");
                None
            }
        };

        let resolved = self.compose(service_id, remote.as_ref());

        match remote {
            Some(partial) => {
                let merged = match self.cache.get(service_id) {
                    Some(cached) => partial.layered_over(cached),
                    None => partial,
                };
                self.cache.insert(service_id.to_string(), merged);
                info!("Resolved pricing config for '{service_id}' (version {})", resolved.version);
            }
            // Mark the service as resolved for this session so the next
            // lookup does not refetch.
            None => {
                self.cache.entry(service_id.to_string()).or_default();
            }
        }
        Some(resolved)
    }

    pub fn cached(&self, service_id: &str) -> Option<&PartialPricingConfig> {
        self.cache.get(service_id)
    }

    /// Forget the cached view so the next lookup fetches again.
    pub fn invalidate(&mut self, service_id: &str) {
        self.cache.remove(service_id);
    }

    fn compose(&self, service_id: &str, remote: Option<&PartialPricingConfig>) -> PricingConfig {
        let default = defaults::default_config(service_id);
        let layered = match (remote, self.cache.get(service_id)) {
            (Some(r), Some(c)) => r.layered_over(c),
            (Some(r), None) => r.clone(),
            (None, Some(c)) => c.clone(),
            (None, None) => PartialPricingConfig::default(),
        };
        layered.resolve(&default)
    }

    fn known_items(&self, service_id: &str) -> Vec<String> {
        let mut items: Vec<String> = defaults::default_config(service_id)
            .special_items
            .into_keys()
            .collect();
        if let Some(cached) = self.cache.get(service_id) {
            items.extend(cached.special_items.keys().cloned());
        }
        items.sort();
        items.dedup();
        items
    }
}

//! fieldquote-core: config-driven, override-aware quoting for recurring
//! field-service contracts.
//!
//! Flow: `QuoteSession` owns input, config and overrides → `QuoteCalculator`
//! (pure) → `ContractAccumulator` → `QuoteResult`. Config arrives through
//! `ConfigResolver` from a `ConfigSource`; audit entries leave through a
//! `ChangeSink`.

pub mod accumulator;
pub mod agreement;
pub mod calculator;
pub mod config;
pub mod config_shape;
pub mod defaults;
pub mod error;
pub mod fields;
pub mod frequency;
pub mod input;
pub mod overrides;
pub mod quote;
pub mod resolver;
pub mod session;
pub mod store;
pub mod strategy;
pub mod tracker;
pub mod types;

//! Shared domain types for the riskwatch workspace.
//!
//! Rules, task records, evaluated alert items and rule change log entries
//! live here so that storage, the rule engine, notification channels and the
//! HTTP layer agree on one wire format.

pub mod id;
pub mod parse;
pub mod types;

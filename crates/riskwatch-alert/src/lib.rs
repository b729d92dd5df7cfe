//! Risk rule engine for synchronized task and milestone records.
//!
//! [`evaluator::evaluate`] is a pure function of (rules, records, context,
//! filters) producing ordered [`AlertItem`]s. [`store::RuleStore`] owns the
//! live rule configuration and writes one [`audit::RuleAuditLog`] entry per
//! changed field. [`dedup::NotificationDedupTracker`] remembers which
//! (record, rule) conditions have already been notified.
//!
//! [`AlertItem`]: riskwatch_common::types::AlertItem

pub mod audit;
pub mod dedup;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod rules;
pub mod severity;
pub mod store;

#[cfg(test)]
mod tests;

pub use audit::RuleAuditLog;
pub use dedup::NotificationDedupTracker;
pub use error::RuleError;
pub use evaluator::{evaluate, match_records, EvalContext};
pub use filter::AlertFilters;
pub use store::{RuleChange, RulePatch, RuleStore};

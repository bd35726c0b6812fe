pub mod billing;
pub mod cycle;
pub mod ledger;
pub mod rules;

pub use billing::BillingCycleService;
pub use ledger::SessionLedger;
pub use rules::BillingRuleEvaluator;

use rust_decimal::Decimal;
use tracing::debug;

use patient_cell::models::{BillingClassification, SessionAllowance};

use crate::models::LedgerOutcome;

/// Applies one completed session to a patient's allowance. Pure: callers
/// persist the returned snapshot and must invoke this at most once per
/// completion transition.
pub struct SessionLedger;

impl SessionLedger {
    pub fn new() -> Self {
        Self
    }

    /// Decides whether the session consumes a free slot or accrues a
    /// pending charge. Only DYES patients carry an allowance; for every
    /// other classification this is a no-op reported as a free session.
    pub fn apply(
        &self,
        allowance: Option<&SessionAllowance>,
        classification: BillingClassification,
        session_cost: Decimal,
    ) -> LedgerOutcome {
        let current = allowance.cloned().unwrap_or_default();

        if classification != BillingClassification::Dyes {
            debug!(
                "Session ledger is a no-op for {} patients",
                classification
            );
            let remaining = current.remaining_free();
            return LedgerOutcome {
                allowance: current,
                was_free: true,
                remaining_free_sessions: remaining,
            };
        }

        let mut updated = current;
        let was_free = updated.remaining_free() > 0;

        if was_free {
            updated.free_sessions_used += 1;
            debug!(
                "Consumed free session ({}/{} used)",
                updated.free_sessions_used, updated.free_sessions_total
            );
        } else {
            updated.pending_paid_sessions += 1;
            updated.pending_charge_amount += session_cost;
            debug!(
                "No free sessions left, pending balance now {} over {} sessions",
                updated.pending_charge_amount, updated.pending_paid_sessions
            );
        }

        let remaining = updated.remaining_free();
        LedgerOutcome {
            allowance: updated,
            was_free,
            remaining_free_sessions: remaining,
        }
    }
}

impl Default for SessionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn allowance(total: u32, used: u32) -> SessionAllowance {
        SessionAllowance {
            free_sessions_total: total,
            free_sessions_used: used,
            pending_paid_sessions: 0,
            pending_charge_amount: Decimal::ZERO,
        }
    }

    #[test]
    fn test_non_dyes_classification_is_a_no_op() {
        let ledger = SessionLedger::new();
        let before = allowance(4, 1);

        let outcome = ledger.apply(
            Some(&before),
            BillingClassification::Paid,
            dec!(1200.00),
        );

        assert!(outcome.was_free);
        assert_eq!(outcome.allowance, before);
        assert_eq!(outcome.remaining_free_sessions, 3);
    }

    #[test]
    fn test_free_session_is_consumed_first() {
        let ledger = SessionLedger::new();
        let before = allowance(4, 0);

        let outcome = ledger.apply(
            Some(&before),
            BillingClassification::Dyes,
            dec!(1200.00),
        );

        assert!(outcome.was_free);
        assert_eq!(outcome.allowance.free_sessions_used, 1);
        assert_eq!(outcome.remaining_free_sessions, 3);
        assert_eq!(outcome.allowance.pending_paid_sessions, 0);
        assert_eq!(outcome.allowance.pending_charge_amount, Decimal::ZERO);
    }

    #[test]
    fn test_exhausted_allowance_accrues_pending_charge() {
        let ledger = SessionLedger::new();
        let before = allowance(4, 4);

        let outcome = ledger.apply(
            Some(&before),
            BillingClassification::Dyes,
            dec!(1200.00),
        );

        assert!(!outcome.was_free);
        assert_eq!(outcome.allowance.free_sessions_used, 4);
        assert_eq!(outcome.allowance.pending_paid_sessions, 1);
        assert_eq!(outcome.allowance.pending_charge_amount, dec!(1200.00));
        assert_eq!(outcome.remaining_free_sessions, 0);
    }

    #[test]
    fn test_four_free_sessions_then_fifth_accrues() {
        let ledger = SessionLedger::new();
        let mut current = allowance(4, 0);

        for expected_used in 1..=4 {
            let outcome = ledger.apply(
                Some(&current),
                BillingClassification::Dyes,
                dec!(1200.00),
            );
            assert!(outcome.was_free);
            assert_eq!(outcome.allowance.free_sessions_used, expected_used);
            current = outcome.allowance;
        }

        let fifth = ledger.apply(
            Some(&current),
            BillingClassification::Dyes,
            dec!(1200.00),
        );
        assert!(!fifth.was_free);
        assert_eq!(fifth.allowance.pending_paid_sessions, 1);
        assert_eq!(fifth.allowance.pending_charge_amount, dec!(1200.00));
    }

    #[test]
    fn test_missing_allowance_starts_from_zero_grant() {
        let ledger = SessionLedger::new();

        let outcome = ledger.apply(None, BillingClassification::Dyes, dec!(950.50));

        // No grant means no free sessions, straight to pending balance.
        assert!(!outcome.was_free);
        assert_eq!(outcome.allowance.pending_paid_sessions, 1);
        assert_eq!(outcome.allowance.pending_charge_amount, dec!(950.50));
    }

    #[test]
    fn test_pending_charges_accumulate_per_session_costs() {
        let ledger = SessionLedger::new();
        let first = ledger.apply(None, BillingClassification::Dyes, dec!(1200.00));
        let second = ledger.apply(
            Some(&first.allowance),
            BillingClassification::Dyes,
            dec!(800.00),
        );

        assert_eq!(second.allowance.pending_paid_sessions, 2);
        assert_eq!(second.allowance.pending_charge_amount, dec!(2000.00));
    }
}

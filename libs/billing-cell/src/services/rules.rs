use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use patient_cell::models::{BillingClassification, PaymentTerms};

use crate::models::BillingDecision;

/// DYES patients are billed per visit only past this many prior billing
/// records; below it their sessions flow through the allowance ledger and
/// a separate settlement mechanism.
pub const DYES_BILLING_THRESHOLD: u32 = 500;

/// Discount applied to paid patients with concession terms.
pub const CONCESSION_MULTIPLIER: Decimal = dec!(0.80);

/// Decides whether a completed, not-yet-billed appointment gets a billing
/// record. Pure: the prior billed count is supplied by the caller, never
/// queried here.
pub struct BillingRuleEvaluator;

impl BillingRuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        classification: BillingClassification,
        payment_terms: PaymentTerms,
        prior_billed_count: u32,
        standard_rate: Decimal,
    ) -> BillingDecision {
        let decision = match classification {
            BillingClassification::Vip => bill(standard_rate),
            BillingClassification::Paid => match payment_terms {
                PaymentTerms::WithConcession => bill(standard_rate * CONCESSION_MULTIPLIER),
                PaymentTerms::WithoutConcession => bill(standard_rate),
            },
            // Treated the same as paid without concession.
            BillingClassification::Gethhma => bill(standard_rate),
            BillingClassification::Dyes => {
                if prior_billed_count >= DYES_BILLING_THRESHOLD {
                    bill(standard_rate)
                } else {
                    BillingDecision {
                        should_bill: false,
                        amount: Decimal::ZERO,
                    }
                }
            }
            BillingClassification::Unclassified => {
                // Fail open so an unmodeled patient type is never silently
                // given free sessions.
                warn!("Billing an unclassified patient at the standard rate");
                bill(standard_rate)
            }
        };

        debug!(
            "Billing decision for {} ({}, {} prior records): bill={} amount={}",
            classification, payment_terms, prior_billed_count, decision.should_bill,
            decision.amount
        );

        decision
    }
}

impl Default for BillingRuleEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn bill(amount: Decimal) -> BillingDecision {
    BillingDecision {
        should_bill: true,
        amount: amount.round_dp(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate(
        classification: BillingClassification,
        payment_terms: PaymentTerms,
        prior_billed_count: u32,
    ) -> BillingDecision {
        BillingRuleEvaluator::new().evaluate(
            classification,
            payment_terms,
            prior_billed_count,
            dec!(1200.00),
        )
    }

    #[test]
    fn test_vip_bills_at_standard_rate() {
        let decision = evaluate(BillingClassification::Vip, PaymentTerms::WithoutConcession, 0);
        assert!(decision.should_bill);
        assert_eq!(decision.amount, dec!(1200.00));
    }

    #[test]
    fn test_paid_with_concession_gets_twenty_percent_off() {
        let decision = evaluate(BillingClassification::Paid, PaymentTerms::WithConcession, 0);
        assert!(decision.should_bill);
        assert_eq!(decision.amount, dec!(960.00));
    }

    #[test]
    fn test_paid_without_concession_bills_full_rate() {
        let decision = evaluate(
            BillingClassification::Paid,
            PaymentTerms::WithoutConcession,
            0,
        );
        assert!(decision.should_bill);
        assert_eq!(decision.amount, dec!(1200.00));
    }

    #[test]
    fn test_gethhma_bills_like_paid_without_concession() {
        // Concession terms are ignored for this classification.
        let decision = evaluate(BillingClassification::Gethhma, PaymentTerms::WithConcession, 0);
        assert!(decision.should_bill);
        assert_eq!(decision.amount, dec!(1200.00));
    }

    #[test]
    fn test_dyes_below_threshold_is_not_billed() {
        let decision = evaluate(
            BillingClassification::Dyes,
            PaymentTerms::WithoutConcession,
            DYES_BILLING_THRESHOLD - 1,
        );
        assert!(!decision.should_bill);
        assert_eq!(decision.amount, Decimal::ZERO);
    }

    #[test]
    fn test_dyes_at_threshold_is_billed() {
        let decision = evaluate(
            BillingClassification::Dyes,
            PaymentTerms::WithoutConcession,
            DYES_BILLING_THRESHOLD,
        );
        assert!(decision.should_bill);
        assert_eq!(decision.amount, dec!(1200.00));
    }

    #[test]
    fn test_unclassified_fails_open_at_standard_rate() {
        let decision = evaluate(
            BillingClassification::Unclassified,
            PaymentTerms::WithConcession,
            0,
        );
        assert!(decision.should_bill);
        assert_eq!(decision.amount, dec!(1200.00));
    }

    #[test]
    fn test_amount_is_rounded_to_two_decimals() {
        let decision = BillingRuleEvaluator::new().evaluate(
            BillingClassification::Paid,
            PaymentTerms::WithConcession,
            0,
            dec!(1033.33),
        );
        assert_eq!(decision.amount, dec!(826.66));
    }
}

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::models::{
    BillingCycle, ClinicianCollection, CycleAppointment, CycleReset, CycleStatus, CycleSummary,
    CycleWindow,
};

/// The calendar-month window containing `today`.
pub fn current_window(today: NaiveDate) -> CycleWindow {
    month_window(today.year(), today.month())
}

/// The calendar-month window immediately after the one containing `today`.
pub fn next_window(today: NaiveDate) -> CycleWindow {
    let (year, month) = roll_month(today.year(), today.month());
    month_window(year, month)
}

fn roll_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn month_window(year: i32, month: u32) -> CycleWindow {
    // Month is always in 1..=12 here, so both constructions are valid.
    let start_date = NaiveDate::from_ymd_opt(year, month, 1).expect("valid cycle month");
    let (next_year, next_month) = roll_month(year, month);
    let end_date = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("valid cycle month")
        .pred_opt()
        .expect("month start has a predecessor");

    CycleWindow {
        year,
        month,
        start_date,
        end_date,
    }
}

/// Materializes a window as a cycle record.
pub fn cycle_from_window(window: CycleWindow, status: CycleStatus, now: DateTime<Utc>) -> BillingCycle {
    BillingCycle {
        id: window.id(),
        year: window.year,
        month: window.month,
        start_date: window.start_date,
        end_date: window.end_date,
        status,
        created_at: now,
        closed_at: None,
    }
}

/// Computes the month-end reset: close the active cycle and activate the
/// following month's cycle, creating it when no stored record exists yet.
/// Pure decision logic; the caller persists both sides.
pub fn reset_cycle(
    active: Option<BillingCycle>,
    next_existing: Option<BillingCycle>,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> CycleReset {
    let follow_on_window = match &active {
        Some(cycle) => {
            let (year, month) = roll_month(cycle.year, cycle.month);
            month_window(year, month)
        }
        None => next_window(today),
    };

    let closed = active.map(|mut cycle| {
        info!("Closing billing cycle {}", cycle.id);
        cycle.status = CycleStatus::Closed;
        cycle.closed_at = Some(now);
        cycle
    });

    let activated = match next_existing {
        Some(mut cycle) => {
            info!("Activating stored billing cycle {}", cycle.id);
            cycle.status = CycleStatus::Active;
            cycle
        }
        None => {
            info!("Creating billing cycle {}", follow_on_window.id());
            cycle_from_window(follow_on_window, CycleStatus::Active, now)
        }
    };

    CycleReset { closed, activated }
}

/// Aggregates pending and collected totals over the cycle window. Derives
/// entirely from the supplied rows and the window boundaries; cycle status
/// plays no part.
pub fn cycle_summary(cycle: &BillingCycle, appointments: &[CycleAppointment]) -> CycleSummary {
    let mut pending_count = 0;
    let mut completed_count = 0;
    let mut collected_amount = Decimal::ZERO;
    let mut per_clinician: BTreeMap<String, Decimal> = BTreeMap::new();

    for appointment in appointments {
        match &appointment.billing {
            Some(record) => {
                if cycle.contains(record.billing_date) {
                    completed_count += 1;
                    collected_amount += record.amount;
                    *per_clinician
                        .entry(appointment.staff_name.clone())
                        .or_insert(Decimal::ZERO) += record.amount;
                }
            }
            None => {
                if appointment.is_completed() && cycle.contains(appointment.visit_date) {
                    pending_count += 1;
                }
            }
        }
    }

    let by_clinician = per_clinician
        .into_iter()
        .map(|(doctor, amount)| ClinicianCollection { doctor, amount })
        .collect();

    debug!(
        "Cycle {} summary: {} pending, {} collected records totalling {}",
        cycle.id, pending_count, completed_count, collected_amount
    );

    CycleSummary {
        pending_count,
        completed_count,
        collected_amount: collected_amount.round_dp(2),
        by_clinician,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillingRecord;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn now() -> DateTime<Utc> {
        "2026-03-31T18:00:00Z".parse().unwrap()
    }

    fn unbilled(staff: &str, visit_date: &str, status: &str) -> CycleAppointment {
        CycleAppointment {
            staff_name: staff.to_string(),
            visit_date: date(visit_date),
            status: status.to_string(),
            billing: None,
        }
    }

    fn billed(staff: &str, visit_date: &str, billing_date: &str, amount: Decimal) -> CycleAppointment {
        CycleAppointment {
            staff_name: staff.to_string(),
            visit_date: date(visit_date),
            status: "completed".to_string(),
            billing: Some(BillingRecord {
                amount,
                billing_date: date(billing_date),
            }),
        }
    }

    #[test]
    fn test_current_window_spans_the_whole_month() {
        let window = current_window(date("2026-03-15"));
        assert_eq!(window.id(), "2026-03");
        assert_eq!(window.start_date, date("2026-03-01"));
        assert_eq!(window.end_date, date("2026-03-31"));
    }

    #[test]
    fn test_next_window_rolls_over_year_end() {
        let window = next_window(date("2026-12-20"));
        assert_eq!(window.id(), "2027-01");
        assert_eq!(window.start_date, date("2027-01-01"));
        assert_eq!(window.end_date, date("2027-01-31"));
    }

    #[test]
    fn test_february_end_date_honours_leap_years() {
        assert_eq!(current_window(date("2028-02-10")).end_date, date("2028-02-29"));
        assert_eq!(current_window(date("2026-02-10")).end_date, date("2026-02-28"));
    }

    #[test]
    fn test_reset_closes_march_and_activates_april() {
        let march = cycle_from_window(current_window(date("2026-03-15")), CycleStatus::Active, now());

        let reset = reset_cycle(Some(march.clone()), None, date("2026-03-31"), now());

        let closed = reset.closed.expect("march should close");
        assert_eq!(closed.id, "2026-03");
        assert_eq!(closed.status, CycleStatus::Closed);
        assert_eq!(closed.closed_at, Some(now()));

        assert_eq!(reset.activated.id, "2026-04");
        assert_eq!(reset.activated.status, CycleStatus::Active);
        assert_eq!(
            reset.activated.start_date,
            closed.end_date.succ_opt().unwrap()
        );
    }

    #[test]
    fn test_reset_follows_the_active_cycle_not_today() {
        // Operator runs the reset a few days into the next month.
        let march = cycle_from_window(current_window(date("2026-03-15")), CycleStatus::Active, now());

        let reset = reset_cycle(Some(march), None, date("2026-04-03"), now());

        assert_eq!(reset.activated.id, "2026-04");
    }

    #[test]
    fn test_reset_without_active_cycle_activates_month_after_today() {
        let reset = reset_cycle(None, None, date("2026-03-31"), now());

        assert!(reset.closed.is_none());
        assert_eq!(reset.activated.id, "2026-04");
    }

    #[test]
    fn test_reset_flips_a_stored_pending_cycle_to_active() {
        let march = cycle_from_window(current_window(date("2026-03-15")), CycleStatus::Active, now());
        let april = cycle_from_window(next_window(date("2026-03-15")), CycleStatus::Pending, now());

        let reset = reset_cycle(Some(march), Some(april.clone()), date("2026-03-31"), now());

        assert_eq!(reset.activated.id, april.id);
        assert_eq!(reset.activated.status, CycleStatus::Active);
        assert_eq!(reset.activated.created_at, april.created_at);
    }

    #[test]
    fn test_summary_counts_only_billing_dates_inside_the_window() {
        let march = cycle_from_window(current_window(date("2026-03-15")), CycleStatus::Closed, now());

        let appointments = vec![
            billed("Dr. Vance", "2026-03-01", "2026-03-01", dec!(1200.00)),
            billed("Dr. Vance", "2026-03-30", "2026-03-31", dec!(960.00)),
            // Visit in March, posted in April: belongs to April's collections.
            billed("Dr. Vance", "2026-03-31", "2026-04-01", dec!(1200.00)),
            billed("Dr. Osei", "2026-02-27", "2026-02-28", dec!(1200.00)),
        ];

        let summary = cycle_summary(&march, &appointments);

        assert_eq!(summary.completed_count, 2);
        assert_eq!(summary.collected_amount, dec!(2160.00));
    }

    #[test]
    fn test_summary_pending_counts_completed_unbilled_visits_in_window() {
        let march = cycle_from_window(current_window(date("2026-03-15")), CycleStatus::Active, now());

        let appointments = vec![
            unbilled("Dr. Vance", "2026-03-10", "completed"),
            unbilled("Dr. Vance", "2026-03-12", "pending"),
            unbilled("Dr. Vance", "2026-03-14", "cancelled"),
            unbilled("Dr. Osei", "2026-04-02", "completed"),
        ];

        let summary = cycle_summary(&march, &appointments);

        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.completed_count, 0);
        assert_eq!(summary.collected_amount, Decimal::ZERO);
    }

    #[test]
    fn test_summary_breaks_collections_down_by_clinician() {
        let march = cycle_from_window(current_window(date("2026-03-15")), CycleStatus::Active, now());

        let appointments = vec![
            billed("Dr. Vance", "2026-03-01", "2026-03-01", dec!(1200.00)),
            billed("Dr. Vance", "2026-03-08", "2026-03-08", dec!(960.00)),
            billed("Dr. Osei", "2026-03-09", "2026-03-09", dec!(1200.00)),
        ];

        let summary = cycle_summary(&march, &appointments);

        assert_eq!(summary.by_clinician.len(), 2);
        assert_eq!(summary.by_clinician[0].doctor, "Dr. Osei");
        assert_eq!(summary.by_clinician[0].amount, dec!(1200.00));
        assert_eq!(summary.by_clinician[1].doctor, "Dr. Vance");
        assert_eq!(summary.by_clinician[1].amount, dec!(2160.00));
    }
}

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, ConflictCheck};

/// Flags candidate bookings that land too close to an existing appointment
/// for the same staff member and date. Advisory only: the result carries
/// the conflicting appointments so the operator can decide to override.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    /// Two appointments exactly `tolerance_minutes` apart do not conflict;
    /// anything strictly closer does. Pure over the supplied snapshot.
    pub fn check(
        &self,
        appointments: &[Appointment],
        staff_name: &str,
        visit_date: NaiveDate,
        visit_time: &str,
        tolerance_minutes: i64,
    ) -> Result<ConflictCheck, AppointmentError> {
        if tolerance_minutes < 0 {
            return Err(AppointmentError::ValidationError(
                "Tolerance window must not be negative".to_string(),
            ));
        }

        let candidate = NaiveTime::parse_from_str(visit_time, "%H:%M").map_err(|_| {
            AppointmentError::ValidationError(format!("Invalid visit time '{}'", visit_time))
        })?;

        let mut conflicts = Vec::new();

        for appointment in appointments {
            if appointment.staff_name != staff_name
                || appointment.visit_date != visit_date
                || appointment.status == AppointmentStatus::Cancelled
            {
                continue;
            }

            let existing = match NaiveTime::parse_from_str(&appointment.visit_time, "%H:%M") {
                Ok(time) => time,
                Err(_) => {
                    warn!(
                        "Skipping appointment {} with malformed time '{}'",
                        appointment.id, appointment.visit_time
                    );
                    continue;
                }
            };

            let gap = (existing - candidate).num_minutes().abs();
            if gap < tolerance_minutes {
                conflicts.push(appointment.clone());
            }
        }

        debug!(
            "Conflict check for {} on {} at {}: {} conflict(s) within {} minutes",
            staff_name,
            visit_date,
            visit_time,
            conflicts.len(),
            tolerance_minutes
        );

        Ok(ConflictCheck {
            has_conflict: !conflicts.is_empty(),
            conflicts,
        })
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn appointment(staff: &str, visit_date: &str, visit_time: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            staff_name: staff.to_string(),
            visit_date: date(visit_date),
            visit_time: visit_time.to_string(),
            status,
            billing: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_appointment_exactly_tolerance_apart_does_not_conflict() {
        let detector = ConflictDetector::new();
        let existing = vec![appointment("Dr. Vance", "2026-09-07", "10:00", AppointmentStatus::Pending)];

        let check = detector
            .check(&existing, "Dr. Vance", date("2026-09-07"), "10:30", 30)
            .unwrap();

        assert!(!check.has_conflict);
        assert!(check.conflicts.is_empty());
    }

    #[test]
    fn test_one_minute_inside_tolerance_conflicts() {
        let detector = ConflictDetector::new();
        let existing = vec![appointment("Dr. Vance", "2026-09-07", "10:00", AppointmentStatus::Pending)];

        let check = detector
            .check(&existing, "Dr. Vance", date("2026-09-07"), "10:29", 30)
            .unwrap();

        assert!(check.has_conflict);
        assert_eq!(check.conflicts.len(), 1);
    }

    #[test]
    fn test_gap_is_symmetric_around_the_candidate() {
        let detector = ConflictDetector::new();
        let existing = vec![appointment("Dr. Vance", "2026-09-07", "10:29", AppointmentStatus::Pending)];

        let check = detector
            .check(&existing, "Dr. Vance", date("2026-09-07"), "10:00", 30)
            .unwrap();

        assert!(check.has_conflict);
    }

    #[test]
    fn test_cancelled_appointments_are_ignored() {
        let detector = ConflictDetector::new();
        let existing = vec![appointment("Dr. Vance", "2026-09-07", "10:00", AppointmentStatus::Cancelled)];

        let check = detector
            .check(&existing, "Dr. Vance", date("2026-09-07"), "10:00", 30)
            .unwrap();

        assert!(!check.has_conflict);
    }

    #[test]
    fn test_other_staff_and_dates_are_ignored() {
        let detector = ConflictDetector::new();
        let existing = vec![
            appointment("Dr. Osei", "2026-09-07", "10:00", AppointmentStatus::Pending),
            appointment("Dr. Vance", "2026-09-08", "10:00", AppointmentStatus::Pending),
        ];

        let check = detector
            .check(&existing, "Dr. Vance", date("2026-09-07"), "10:00", 30)
            .unwrap();

        assert!(!check.has_conflict);
    }

    #[test]
    fn test_all_conflicting_appointments_are_returned() {
        let detector = ConflictDetector::new();
        let existing = vec![
            appointment("Dr. Vance", "2026-09-07", "09:45", AppointmentStatus::Pending),
            appointment("Dr. Vance", "2026-09-07", "10:15", AppointmentStatus::Ongoing),
            appointment("Dr. Vance", "2026-09-07", "11:00", AppointmentStatus::Pending),
        ];

        let check = detector
            .check(&existing, "Dr. Vance", date("2026-09-07"), "10:00", 30)
            .unwrap();

        assert!(check.has_conflict);
        assert_eq!(check.conflicts.len(), 2);
    }

    #[test]
    fn test_negative_tolerance_is_a_contract_violation() {
        let detector = ConflictDetector::new();

        let result = detector.check(&[], "Dr. Vance", date("2026-09-07"), "10:00", -1);

        assert!(matches!(result, Err(AppointmentError::ValidationError(_))));
    }

    #[test]
    fn test_malformed_existing_time_is_skipped() {
        let detector = ConflictDetector::new();
        let existing = vec![
            appointment("Dr. Vance", "2026-09-07", "ten-ish", AppointmentStatus::Pending),
            appointment("Dr. Vance", "2026-09-07", "10:10", AppointmentStatus::Pending),
        ];

        let check = detector
            .check(&existing, "Dr. Vance", date("2026-09-07"), "10:00", 30)
            .unwrap();

        assert_eq!(check.conflicts.len(), 1);
        assert_eq!(check.conflicts[0].visit_time, "10:10");
    }
}

use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// The appointment status machine. Completion and cancellation are
/// terminal; re-completing a completed appointment is rejected here,
/// which is what keeps billing side effects from firing twice.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !self.valid_transitions(current).contains(&next) {
            warn!("Rejected status transition {} -> {}", current, next);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current,
                to: next,
            });
        }

        debug!("Status transition {} -> {} allowed", current, next);
        Ok(())
    }

    pub fn valid_transitions(&self, current: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Ongoing,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Ongoing => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.valid_transitions(status).is_empty()
    }
}

impl Default for AppointmentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_can_move_to_any_later_state() {
        let lifecycle = AppointmentLifecycle::new();

        for next in [
            AppointmentStatus::Ongoing,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ] {
            assert!(lifecycle
                .validate_status_transition(AppointmentStatus::Pending, next)
                .is_ok());
        }
    }

    #[test]
    fn test_ongoing_cannot_go_back_to_pending() {
        let lifecycle = AppointmentLifecycle::new();

        let result = lifecycle
            .validate_status_transition(AppointmentStatus::Ongoing, AppointmentStatus::Pending);

        assert!(matches!(
            result,
            Err(AppointmentError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_completed_is_terminal() {
        let lifecycle = AppointmentLifecycle::new();

        assert!(lifecycle.is_terminal(AppointmentStatus::Completed));
        // Re-completion is rejected, so billing cannot run twice.
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Completed, AppointmentStatus::Completed)
            .is_err());
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let lifecycle = AppointmentLifecycle::new();

        assert!(lifecycle.is_terminal(AppointmentStatus::Cancelled));
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Cancelled, AppointmentStatus::Pending)
            .is_err());
    }
}

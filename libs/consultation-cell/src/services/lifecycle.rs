use tracing::{debug, warn};

use shared_models::scheduling::ConsultationStatus;

use crate::models::ConsultationError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsultationLifecycleService;

impl ConsultationLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: ConsultationStatus,
        new_status: ConsultationStatus,
    ) -> Result<(), ConsultationError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status.is_terminal() {
            warn!("Consultation is already {}, rejecting move to {}", current_status, new_status);
            return Err(ConsultationError::InvalidStatusTransition(current_status));
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(ConsultationError::InvalidStatusTransition(current_status));
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status.
    /// SCHEDULED -> SCHEDULED is a reschedule.
    pub fn get_valid_transitions(&self, current_status: ConsultationStatus) -> Vec<ConsultationStatus> {
        match current_status {
            ConsultationStatus::Scheduled => vec![
                ConsultationStatus::Scheduled,
                ConsultationStatus::InProgress,
                ConsultationStatus::Completed,
                ConsultationStatus::Cancelled,
            ],
            ConsultationStatus::InProgress => vec![
                ConsultationStatus::Completed,
                ConsultationStatus::Cancelled,
            ],
            // Terminal states
            ConsultationStatus::Completed | ConsultationStatus::Cancelled => vec![],
        }
    }

    /// Doctor notes may be edited until the consultation is cancelled.
    pub fn can_edit_notes(&self, current_status: ConsultationStatus) -> bool {
        current_status != ConsultationStatus::Cancelled
    }
}

//! # Delivery Status Reconciliation
//!
//! Advances the delivery state of outbound messages from provider status
//! events. Events arrive at least once and out of order; only forward
//! transitions are applied and only those are announced to the notifier.

use crate::{
    metric,
    models::message::{MessageStatus, StatusTransition},
    repo, services, utils,
    webhook::whatsapp::schemas,
};

/// What happened to a single status event
#[derive(Debug, Clone, PartialEq)]
pub enum StatusOutcome {
    /// Stored and announced
    Applied(StatusTransition),
    /// Unknown message, or the message already reached that state or a later one
    AlreadyApplied,
    /// Status value outside sent/delivered/read/failed
    Unrecognized,
    InvalidTimestamp,
}

#[derive(Clone)]
pub struct StatusReconciler {
    pub repo: repo::ImplAppRepo,
    pub notifier: services::ImplNotificationService,
}

impl StatusReconciler {
    /// Applies one status event.
    ///
    /// Errors only when the database write fails. Notifier failures are logged.
    pub async fn reconcile(&self, status: &schemas::Status) -> anyhow::Result<StatusOutcome> {
        let Ok(new_status) = status.status.parse::<MessageStatus>() else {
            logfire::warn!(
                "skipping unknown status {state} for {wam_id}",
                state = status.status.clone(),
                wam_id = status.id.clone()
            );
            return Ok(StatusOutcome::Unrecognized);
        };

        let at = match utils::parse_unix_timestamp(&status.timestamp) {
            Ok(at) => at,
            Err(e) => {
                logfire::warn!(
                    "skipping status {state} for {wam_id}: {error}",
                    state = status.status.clone(),
                    wam_id = status.id.clone(),
                    error = e.to_string()
                );
                return Ok(StatusOutcome::InvalidTimestamp);
            }
        };

        let applied = self
            .repo
            .update_message_status(&status.id, new_status, at)
            .await?;

        if !applied {
            logfire::debug!(
                "status {state} for {wam_id} not applied",
                state = new_status.to_string(),
                wam_id = status.id.clone()
            );
            return Ok(StatusOutcome::AlreadyApplied);
        }

        metric::incr_message_status_statds(&new_status.to_string());

        let transition = StatusTransition {
            wam_id: status.id.clone(),
            status: new_status,
            at,
            recipient_id: status.recipient_id.clone(),
        };

        if let Err(e) = self.notifier.broadcast_status(&transition).await {
            logfire::error!(
                "broadcast status notification failed for {wam_id}: {error}",
                wam_id = transition.wam_id.clone(),
                error = e.to_string()
            );
        }

        Ok(StatusOutcome::Applied(transition))
    }
}

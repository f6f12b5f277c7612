//! Replays queued offline reviews once connectivity comes back.

use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::gateway::{Gateway, OfflineMode, SubmissionStatus};
use crate::queue::QueueError;
use crate::remote::RemoteService;

/// Reconciliation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
  Idle,
  Reconciling,
}

/// Summary of one reconciliation pass, sent to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
  /// Entries drained from the queue and resubmitted
  pub attempted: usize,
  /// Resubmissions the service accepted
  pub confirmed: usize,
  /// Resubmissions that failed and were discarded
  pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
  Completed(ReconcileReport),
  /// Another pass was already running; this signal was ignored
  AlreadyRunning,
}

/// Drives the idle → reconciling → idle cycle.
pub struct Reconciler<R> {
  gateway: Gateway<R>,
  state: Mutex<ReconcileState>,
  observers: broadcast::Sender<ReconcileReport>,
}

/// Puts the state back to idle when a pass ends, however it ends.
struct ReconcilingGuard<'a> {
  state: &'a Mutex<ReconcileState>,
}

impl Drop for ReconcilingGuard<'_> {
  fn drop(&mut self) {
    *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ReconcileState::Idle;
  }
}

impl<R: RemoteService> Reconciler<R> {
  pub fn new(gateway: Gateway<R>) -> Self {
    let (observers, _) = broadcast::channel(16);
    Self {
      gateway,
      state: Mutex::new(ReconcileState::Idle),
      observers,
    }
  }

  #[cfg(test)]
  pub fn state(&self) -> ReconcileState {
    *self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Receive a report after every completed pass.
  pub fn subscribe(&self) -> broadcast::Receiver<ReconcileReport> {
    self.observers.subscribe()
  }

  fn try_begin(&self) -> Option<ReconcilingGuard<'_>> {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    if *state == ReconcileState::Reconciling {
      return None;
    }
    *state = ReconcileState::Reconciling;
    Some(ReconcilingGuard { state: &self.state })
  }

  /// Handle a connectivity-restored signal.
  ///
  /// Drains the pending queue and resubmits every entry exactly once. Failed
  /// resubmissions are dropped, not re-queued. Observers are notified after
  /// every entry has been tried, whatever the individual outcomes.
  pub async fn on_connectivity_restored(&self) -> Result<ReconcileOutcome, QueueError> {
    let Some(_guard) = self.try_begin() else {
      info!("reconciliation already running, ignoring signal");
      return Ok(ReconcileOutcome::AlreadyRunning);
    };

    let pending = self.gateway.queue().drain()?;
    let mut report = ReconcileReport {
      attempted: pending.len(),
      ..Default::default()
    };

    for review in pending {
      match self.gateway.submit_review(review, OfflineMode::Drop).await {
        Ok(submission) if submission.status == SubmissionStatus::Confirmed => {
          report.confirmed += 1
        }
        Ok(_) => report.dropped += 1,
        Err(e) => {
          warn!(error = %e, "resubmission failed");
          report.dropped += 1;
        }
      }
    }

    if report.attempted > 0 {
      info!(
        attempted = report.attempted,
        confirmed = report.confirmed,
        dropped = report.dropped,
        "offline reviews reconciled"
      );
    }

    // No subscribers is fine
    let _ = self.observers.send(report.clone());

    Ok(ReconcileOutcome::Completed(report))
  }
}

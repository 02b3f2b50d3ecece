//! One cancelable deadline task per round.

use std::time::Duration;

use tokio::{sync::Mutex, task::AbortHandle};
use tracing::debug;

use crate::{services::game_service, state::SharedState};

/// Closes the round when its deadline passes unless cancelled first.
#[derive(Default)]
pub struct RoundTimer {
    task: Mutex<Option<(usize, AbortHandle)>>,
}

impl RoundTimer {
    /// Arm the timer for `round`, replacing any previous one.
    pub async fn schedule(&self, state: &SharedState, round: usize, deadline_ms: u64) {
        let delay = Duration::from_millis(deadline_ms.saturating_sub(state.clock().now_ms()));

        // Held across the spawn so the task cannot disarm before its handle is stored.
        let mut slot = self.task.lock().await;
        let task_state = state.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task_state.round_timer().disarm(round).await;
            game_service::close_round_on_timeout(&task_state, round).await;
        });

        if let Some((previous, stale)) = slot.replace((round, handle.abort_handle())) {
            debug!(round = previous, "replacing round timer");
            stale.abort();
        }
        debug!(round, delay_ms = delay.as_millis() as u64, "round timer armed");
    }

    /// Stop the pending deadline, if any.
    pub async fn cancel(&self) {
        if let Some((round, handle)) = self.task.lock().await.take() {
            debug!(round, "round timer cancelled");
            handle.abort();
        }
    }

    /// Forget the handle of a timer that has fired, without aborting it.
    async fn disarm(&self, round: usize) {
        let mut slot = self.task.lock().await;
        if slot.as_ref().is_some_and(|(armed, _)| *armed == round) {
            slot.take();
        }
    }

    /// Whether a deadline is pending.
    pub async fn is_armed(&self) -> bool {
        self.task.lock().await.is_some()
    }
}

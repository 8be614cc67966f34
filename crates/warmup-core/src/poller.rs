use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;

use crate::poll::{FailureCause, PollState, Transition};
use crate::probe::{ProbeFailure, ProbeOutcome, Prober};

// ─── Poller ───────────────────────────────────────────────────────────────

/// Dispatches probes and folds their outcomes into a [`PollState`].
///
/// Every probe gets a token (its dispatch index). Probes may overlap when
/// the probe timeout is longer than the dispatch interval, so completed
/// outcomes are parked in `pending` and applied strictly in token order.
/// In-flight probes live in a [`JoinSet`]; dropping the poller or calling
/// [`cancel_in_flight`](Self::cancel_in_flight) aborts them all.
pub struct Poller {
    prober: Arc<dyn Prober>,
    state: PollState,
    in_flight: JoinSet<(u64, ProbeOutcome)>,
    dispatched: u32,
    next_to_apply: u64,
    pending: BTreeMap<u64, ProbeOutcome>,
}

impl Poller {
    pub fn new(prober: Arc<dyn Prober>, max_attempts: u32) -> Self {
        Self {
            prober,
            state: PollState::new(max_attempts),
            in_flight: JoinSet::new(),
            dispatched: 0,
            next_to_apply: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// `true` while probing and the attempt budget has room for another probe.
    pub fn can_dispatch(&self) -> bool {
        !self.state.is_terminal() && self.dispatched < self.state.max_attempts
    }

    /// Spawn the next probe. Returns its token, or `None` when no more
    /// probes may be dispatched.
    pub fn dispatch(&mut self) -> Option<u64> {
        if !self.can_dispatch() {
            return None;
        }
        let token = u64::from(self.dispatched);
        self.dispatched += 1;

        let prober = Arc::clone(&self.prober);
        self.in_flight.spawn(async move {
            // `probe()` itself runs inside the unwind guard, so a prober that
            // panics before returning its future is still one failed attempt.
            let outcome = AssertUnwindSafe(async move { prober.probe().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    ProbeOutcome::Failure(ProbeFailure::Network("probe panicked".into()))
                });
            (token, outcome)
        });
        tracing::debug!(token, attempt = self.dispatched, "probe dispatched");
        Some(token)
    }

    /// Wait for the next in-flight probe to finish.
    ///
    /// Returns `None` when nothing is in flight. Aborted probes are skipped.
    pub async fn next_completed(&mut self) -> Option<(u64, ProbeOutcome)> {
        loop {
            match self.in_flight.join_next().await? {
                Ok(done) => return Some(done),
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    // Panics are caught inside the task, so this is unreachable
                    // in practice; keep the loop alive regardless.
                    tracing::warn!(error = %e, "probe task failed to join");
                    continue;
                }
            }
        }
    }

    /// Record a completed probe and apply every outcome that is now next in
    /// dispatch order. Returns one transition per applied outcome; an empty
    /// vec means the outcome was parked behind an earlier probe.
    pub fn resolve(&mut self, token: u64, outcome: ProbeOutcome) -> Vec<Transition> {
        if token < self.next_to_apply {
            return vec![Transition::Discarded];
        }
        self.pending.insert(token, outcome);

        let mut applied = Vec::new();
        while let Some(outcome) = self.pending.remove(&self.next_to_apply) {
            let token = self.next_to_apply;
            self.next_to_apply += 1;
            let transition = self.state.apply(&outcome);
            match (&outcome, transition) {
                (_, Transition::Discarded) => {
                    tracing::debug!(token, "discarding probe outcome after terminal state");
                }
                (ProbeOutcome::Success, _) => {
                    tracing::info!(token, attempt = self.state.attempt, "backend is ready");
                }
                (ProbeOutcome::Failure(reason), _) => {
                    tracing::debug!(
                        token,
                        attempt = self.state.attempt,
                        max_attempts = self.state.max_attempts,
                        ?reason,
                        "backend not ready yet, retrying"
                    );
                }
            }
            applied.push(transition);
        }
        applied
    }

    /// Fail the poll from outside (elapsed-time overrun).
    pub fn fail(&mut self, cause: FailureCause) -> Transition {
        self.state.fail(cause)
    }

    /// Abort every in-flight probe and drop parked outcomes.
    pub fn cancel_in_flight(&mut self) {
        if !self.in_flight.is_empty() {
            tracing::debug!(count = self.in_flight.len(), "cancelling in-flight probes");
        }
        self.in_flight.abort_all();
        self.in_flight.detach_all();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollStatus;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn failing() -> Arc<dyn Prober> {
        Arc::new(|| async { ProbeOutcome::Failure(ProbeFailure::Timeout) })
    }

    fn fail() -> ProbeOutcome {
        ProbeOutcome::Failure(ProbeFailure::Status(503))
    }

    #[tokio::test]
    async fn dispatch_is_capped_at_max_attempts() {
        let mut poller = Poller::new(failing(), 3);
        assert_eq!(poller.dispatch(), Some(0));
        assert_eq!(poller.dispatch(), Some(1));
        assert_eq!(poller.dispatch(), Some(2));
        assert_eq!(poller.dispatch(), None);
        assert_eq!(poller.dispatched(), 3);
    }

    #[tokio::test]
    async fn completed_probe_is_returned_with_token() {
        let mut poller = Poller::new(Arc::new(|| async { ProbeOutcome::Success }), 20);
        poller.dispatch();
        let (token, outcome) = poller.next_completed().await.unwrap();
        assert_eq!(token, 0);
        assert_eq!(outcome, ProbeOutcome::Success);
        assert!(poller.next_completed().await.is_none());
    }

    #[test]
    fn outcomes_apply_in_dispatch_order() {
        let mut poller = Poller::new(failing(), 20);
        // Probe 1 finishes before probe 0: it waits.
        assert!(poller.resolve(1, ProbeOutcome::Success).is_empty());
        assert_eq!(poller.state().attempt, 0);

        let applied = poller.resolve(0, fail());
        assert_eq!(applied, vec![Transition::Continue, Transition::Ready]);
        assert_eq!(poller.state().attempt, 2);
        assert_eq!(poller.state().status, PollStatus::Ready);
    }

    #[test]
    fn outcomes_after_ready_are_discarded() {
        let mut poller = Poller::new(failing(), 20);
        assert_eq!(poller.resolve(0, ProbeOutcome::Success), vec![Transition::Ready]);
        assert_eq!(
            poller.resolve(1, ProbeOutcome::Success),
            vec![Transition::Discarded]
        );
        assert_eq!(poller.state().attempt, 1);
    }

    #[test]
    fn stale_token_is_discarded() {
        let mut poller = Poller::new(failing(), 20);
        poller.resolve(0, fail());
        assert_eq!(poller.resolve(0, ProbeOutcome::Success), vec![Transition::Discarded]);
        assert_eq!(poller.state().status, PollStatus::Probing);
    }

    #[test]
    fn exhausting_budget_fails() {
        let mut poller = Poller::new(failing(), 2);
        poller.resolve(0, fail());
        assert_eq!(
            poller.resolve(1, fail()),
            vec![Transition::Failed(FailureCause::AttemptsExhausted)]
        );
        assert!(!poller.can_dispatch());
    }

    #[tokio::test]
    async fn panicking_probe_counts_as_failure() {
        let mut poller = Poller::new(
            Arc::new(|| async {
                if true {
                    panic!("boom");
                }
                ProbeOutcome::Success
            }),
            20,
        );
        poller.dispatch();
        let (_, outcome) = poller.next_completed().await.unwrap();
        assert!(matches!(
            outcome,
            ProbeOutcome::Failure(ProbeFailure::Network(_))
        ));
    }

    #[tokio::test]
    async fn prober_panicking_before_its_future_counts_as_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let prober = move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("no client");
            }
            async { ProbeOutcome::Success }
        };
        let mut poller = Poller::new(Arc::new(prober), 20);

        poller.dispatch();
        let (token, outcome) = poller.next_completed().await.unwrap();
        assert_eq!(token, 0);
        assert!(matches!(
            outcome,
            ProbeOutcome::Failure(ProbeFailure::Network(_))
        ));

        poller.dispatch();
        let (token, outcome) = poller.next_completed().await.unwrap();
        assert_eq!(token, 1);
        assert_eq!(outcome, ProbeOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_in_flight_aborts_probes() {
        let finished = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&finished);
        let prober = move || {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                ProbeOutcome::Success
            }
        };
        let mut poller = Poller::new(Arc::new(prober), 20);
        poller.dispatch();
        poller.dispatch();
        assert!(poller.has_in_flight());

        poller.cancel_in_flight();
        assert!(!poller.has_in_flight());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}

use serde::Serialize;

use crate::error::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    Manual,
    Auto,
}

impl SubmitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitMode::Manual => "manual",
            SubmitMode::Auto => "auto",
        }
    }
}

/// The settled result of the one terminal submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub mode: SubmitMode,
    /// Dirty answers could not be flushed before the submit call went out.
    pub unsaved_risk: bool,
    /// The server had already closed the attempt; no submit call of our own
    /// was issued.
    pub absorbed: bool,
}

/// Serializes manual and automatic submission requests into at most one
/// terminal call to the remote collaborator.
///
/// The latch is set synchronously on first entry, before any await point.
/// This is sound because the gate is only ever touched from the session's
/// single event loop; a port that shares it across threads must replace the
/// plain state with an atomic or mutex-guarded latch.
#[derive(Debug, Default)]
pub struct SubmissionGate {
    state: GateState,
}

#[derive(Debug, Default)]
enum GateState {
    #[default]
    Open,
    Latched(SubmitMode),
    Settled(Result<SubmitOutcome, SubmitError>),
}

/// What a `request` caller should do next.
#[derive(Debug)]
pub enum GateDecision {
    /// This caller won the latch and must drive the submission.
    Acquired(SubmitMode),
    /// A submission is already in flight; await its outcome.
    InFlight,
    /// The gate already settled; replay the stored outcome.
    Settled(Result<SubmitOutcome, SubmitError>),
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, mode: SubmitMode) -> GateDecision {
        match &self.state {
            GateState::Open => {
                self.state = GateState::Latched(mode);
                GateDecision::Acquired(mode)
            }
            GateState::Latched(_) => GateDecision::InFlight,
            GateState::Settled(outcome) => GateDecision::Settled(outcome.clone()),
        }
    }

    /// Records the terminal outcome. Later `request` calls replay it.
    pub fn settle(&mut self, outcome: Result<SubmitOutcome, SubmitError>) {
        self.state = GateState::Settled(outcome);
    }

    /// Reopens the gate after a failed manual submission so the learner can
    /// retry explicitly. Never called on the auto path, where automatic retries
    /// risk duplicate terminal effects server-side.
    pub fn release(&mut self) {
        self.state = GateState::Open;
    }

    /// Force-settles from reconciliation: the server reports the attempt
    /// closed, which overrides even a previously recorded failure.
    pub fn absorb(&mut self, outcome: SubmitOutcome) {
        self.state = GateState::Settled(Ok(outcome));
    }

    pub fn is_latched(&self) -> bool {
        matches!(self.state, GateState::Latched(_))
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, GateState::Settled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;

    fn outcome(mode: SubmitMode) -> SubmitOutcome {
        SubmitOutcome {
            mode,
            unsaved_risk: false,
            absorbed: false,
        }
    }

    #[test]
    fn first_request_acquires_all_later_requests_wait() {
        let mut gate = SubmissionGate::new();

        assert!(matches!(
            gate.request(SubmitMode::Auto),
            GateDecision::Acquired(SubmitMode::Auto)
        ));
        // The manual click racing the expiry callback observes the latch.
        assert!(matches!(
            gate.request(SubmitMode::Manual),
            GateDecision::InFlight
        ));
        assert!(matches!(
            gate.request(SubmitMode::Auto),
            GateDecision::InFlight
        ));
    }

    #[test]
    fn settled_outcome_is_replayed() {
        let mut gate = SubmissionGate::new();
        let _ = gate.request(SubmitMode::Manual);
        gate.settle(Ok(outcome(SubmitMode::Manual)));

        match gate.request(SubmitMode::Auto) {
            GateDecision::Settled(Ok(o)) => assert_eq!(o.mode, SubmitMode::Manual),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn release_reopens_for_manual_retry() {
        let mut gate = SubmissionGate::new();
        let _ = gate.request(SubmitMode::Manual);
        gate.release();

        assert!(matches!(
            gate.request(SubmitMode::Manual),
            GateDecision::Acquired(SubmitMode::Manual)
        ));
    }

    #[test]
    fn absorb_overrides_a_recorded_failure() {
        let mut gate = SubmissionGate::new();
        let _ = gate.request(SubmitMode::Auto);
        gate.settle(Err(SubmitError::Api(ApiError::Timeout)));

        gate.absorb(SubmitOutcome {
            mode: SubmitMode::Auto,
            unsaved_risk: true,
            absorbed: true,
        });

        match gate.request(SubmitMode::Manual) {
            GateDecision::Settled(Ok(o)) => assert!(o.absorbed),
            other => panic!("unexpected decision: {:?}", other),
        }
    }
}

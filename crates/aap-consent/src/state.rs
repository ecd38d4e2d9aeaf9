//! The per-challenge consent state machine.
//!
//! ```text
//! ChallengeReceived ─┬─> Resolved(Skip) ──────────> AutoAccepted ─┐
//!                    └─> Resolved(NeedsDecision) ─┬> UserAccepted ─┼─> Terminal
//!                                                 └> UserRejected ─┘
//! ```
//!
//! `Resolved(NeedsDecision)` is also where a flow parks when the owner has
//! not decided yet; reaching it is a valid end of a resolve call.

use std::fmt;

use tracing::debug;

use aap_contracts::error::{AapError, AapResult};

/// How a received challenge was resolved against the policy graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The authority asked to skip, or every requested pair is consented.
    Skip,
    /// The owner has to decide.
    NeedsDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    ChallengeReceived,
    Resolved(Resolution),
    AutoAccepted,
    UserAccepted,
    UserRejected,
    Terminal,
}

impl ConsentState {
    /// True if `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: ConsentState) -> bool {
        use ConsentState::*;
        matches!(
            (self, next),
            (ChallengeReceived, Resolved(_))
                | (Resolved(Resolution::Skip), AutoAccepted)
                | (Resolved(Resolution::NeedsDecision), UserAccepted)
                | (Resolved(Resolution::NeedsDecision), UserRejected)
                | (AutoAccepted, Terminal)
                | (UserAccepted, Terminal)
                | (UserRejected, Terminal)
        )
    }
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChallengeReceived => write!(f, "challenge_received"),
            Self::Resolved(Resolution::Skip) => write!(f, "resolved(skip)"),
            Self::Resolved(Resolution::NeedsDecision) => write!(f, "resolved(needs_decision)"),
            Self::AutoAccepted => write!(f, "auto_accepted"),
            Self::UserAccepted => write!(f, "user_accepted"),
            Self::UserRejected => write!(f, "user_rejected"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

/// Tracks one challenge through the state machine.
#[derive(Debug)]
pub struct ConsentFlow {
    challenge: String,
    state: ConsentState,
}

impl ConsentFlow {
    pub fn new(challenge: impl Into<String>) -> Self {
        Self {
            challenge: challenge.into(),
            state: ConsentState::ChallengeReceived,
        }
    }

    pub fn state(&self) -> ConsentState {
        self.state
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Move to `next`, or fail with `AapError::StateMachine` if the edge does
    /// not exist. A failed transition leaves the flow where it was.
    pub fn advance(&mut self, next: ConsentState) -> AapResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AapError::StateMachine {
                reason: format!(
                    "challenge '{}': illegal transition {} -> {}",
                    self.challenge, self.state, next
                ),
            });
        }
        debug!(challenge = %self.challenge, from = %self.state, to = %next, "consent state transition");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_path_reaches_terminal() {
        let mut flow = ConsentFlow::new("c1");
        flow.advance(ConsentState::Resolved(Resolution::Skip)).unwrap();
        flow.advance(ConsentState::AutoAccepted).unwrap();
        flow.advance(ConsentState::Terminal).unwrap();
        assert_eq!(flow.state(), ConsentState::Terminal);
    }

    #[test]
    fn test_decision_cannot_follow_skip() {
        let mut flow = ConsentFlow::new("c1");
        flow.advance(ConsentState::Resolved(Resolution::Skip)).unwrap();
        let err = flow.advance(ConsentState::UserAccepted).unwrap_err();
        assert!(matches!(err, AapError::StateMachine { .. }));
        assert_eq!(flow.state(), ConsentState::Resolved(Resolution::Skip));
    }

    #[test]
    fn test_auto_accept_requires_resolution() {
        let mut flow = ConsentFlow::new("c1");
        assert!(flow.advance(ConsentState::AutoAccepted).is_err());
        assert!(flow.advance(ConsentState::Terminal).is_err());
    }

    #[test]
    fn test_terminal_is_final() {
        assert!(!ConsentState::Terminal.can_transition_to(ConsentState::ChallengeReceived));
        assert!(!ConsentState::Terminal.can_transition_to(ConsentState::Terminal));
    }
}

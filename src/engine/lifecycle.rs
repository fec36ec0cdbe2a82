use serde::Serialize;
use statig::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Approve,
    Reject,
}

/// Where a document stands in its effective chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "position", rename_all = "snake_case")]
pub enum Phase {
    Pending(usize),
    Approved,
    Rejected,
}

/// Transition table for one document's review.
///
/// Seeded at the chain position the cursor currently points to. Approving a
/// non-final position moves to the next index; approving the last one
/// finalizes; rejecting from any position is terminal. Terminal states ignore
/// further events.
#[derive(Debug, Default)]
pub struct ApprovalLifecycle {
    position: usize,
    last: usize,
}

impl ApprovalLifecycle {
    pub fn at(position: usize, last: usize) -> Self {
        Self {
            position: position.min(last),
            last,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

#[state_machine(initial = "State::pending()")]
impl ApprovalLifecycle {
    #[state]
    fn pending(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Approve if self.position < self.last => {
                self.position += 1;
                tracing::trace!(position = self.position, "Lifecycle moved to next gate");
                Handled
            }
            LifecycleEvent::Approve => Transition(State::approved()),
            LifecycleEvent::Reject => Transition(State::rejected()),
        }
    }

    #[state]
    fn approved(event: &LifecycleEvent) -> Outcome<State> {
        tracing::trace!(?event, "Lifecycle already approved");
        Handled
    }

    #[state]
    fn rejected(event: &LifecycleEvent) -> Outcome<State> {
        tracing::trace!(?event, "Lifecycle already rejected");
        Handled
    }
}

/// Run one event through a lifecycle seeded at `position` and report the result
pub fn step(position: usize, last: usize, event: LifecycleEvent) -> Phase {
    let mut machine = ApprovalLifecycle::at(position, last).state_machine();
    machine.handle(&event);
    match machine.state() {
        State::Pending { .. } => Phase::Pending(machine.inner().position()),
        State::Approved { .. } => Phase::Approved,
        State::Rejected { .. } => Phase::Rejected,
    }
}

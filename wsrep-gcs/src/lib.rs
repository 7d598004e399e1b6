//! GCS: turns group-comm deliveries into a monotonic, globally ordered
//! stream of actions, queues them to the certifier over a bounded
//! FIFO, and tracks each node's own place in the
//! `Closed -> Open -> Connected -> Joiner -> Donor|Joined -> Synced ->
//! Donor|Synced` lifecycle. `wsrep-gcomm::VoteTracker` already covers
//! the bounded single-round quorum the `Vote` action kind needs, so
//! this crate re-exports it rather than inventing a second one.

pub mod action;
pub mod fifo;
pub mod flow_control;
pub mod node_state;

pub use action::{Action, ActionKind, Sequencer};
pub use fifo::{ActionFifo, Closed};
pub use flow_control::{FlowControl, FlowControlSignal};
pub use node_state::{IllegalTransition, NodeState};
pub use wsrep_gcomm::{VoteOutcome, VoteTracker};

use wsrep_gcomm::Up;

/// Drives `Sequencer`/`NodeState` from group-comm's delivery stream:
/// the one place that turns a `wsrep_gcomm::Up` event into an `Action`
/// ready for `ActionFifo::push`.
pub struct Gcs {
    sequencer: Sequencer,
    state: NodeState,
}

impl Gcs {
    pub fn new() -> Self {
        Gcs {
            sequencer: Sequencer::new(),
            state: NodeState::Closed,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn open(&mut self) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(NodeState::Open)?;
        Ok(())
    }

    /// Always succeeds: every state can close.
    pub fn close(&mut self) {
        self.state = self
            .state
            .transition(NodeState::Closed)
            .expect("every state can transition to Closed");
    }

    /// Explicit state-transfer transitions. These aren't driven by
    /// `on_delivery` because GCS itself has no notion of donors or
    /// snapshots — `wsrep-repl`'s join/donor choreography calls these
    /// directly as it drives the state-transfer protocol.
    pub fn begin_joining(&mut self) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(NodeState::Joiner)?;
        Ok(())
    }

    pub fn finish_joining(&mut self) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(NodeState::Joined)?;
        Ok(())
    }

    pub fn mark_synced(&mut self) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(NodeState::Synced)?;
        Ok(())
    }

    pub fn become_donor(&mut self) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(NodeState::Donor)?;
        Ok(())
    }

    pub fn finish_donating(&mut self) -> Result<(), IllegalTransition> {
        self.state = self.state.transition(NodeState::Synced)?;
        Ok(())
    }

    /// Turns one group-comm delivery into zero or one stamped actions:
    /// a view change becomes a `ConfChange` action, an application
    /// payload becomes a `Writeset` action. Both get the same global
    /// seqno on every member, since `up` already reflects totally
    /// ordered delivery.
    pub fn on_delivery(&mut self, up: Up) -> Option<Action> {
        match up {
            Up::Payload { source, payload } => {
                Some(self.sequencer.stamp(ActionKind::Writeset, source, payload))
            }
            Up::ViewChange(view) => {
                if self.state == NodeState::Closed {
                    return None;
                }
                let target = if view.is_primary() {
                    NodeState::Connected
                } else {
                    self.state
                };
                if let Ok(next) = self.state.transition(target) {
                    self.state = next;
                }
                let payload = view.view_id.seq.to_be_bytes().to_vec();
                Some(
                    self.sequencer
                        .stamp(ActionKind::ConfChange, wsrep_base::MemberId::nil(), payload),
                )
            }
        }
    }
}

impl Default for Gcs {
    fn default() -> Self {
        Self::new()
    }
}

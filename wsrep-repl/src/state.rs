// The replicator's externally-visible lifecycle is the same
// Closed -> Open -> Connected -> Joiner -> Donor|Joined -> Synced ->
// Donor|Synced machine `wsrep-gcs::NodeState` already enforces; no
// reason to duplicate the transition table at this layer. `Role`
// is new here: the wire protocol and PC layer already have to
// recognize an arbitrator (a voting, non-applying member), so the API
// layer names it explicitly instead of forcing such a peer through
// the member-shaped surface.

pub use wsrep_gcs::NodeState as ReplicatorState;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Applies write-sets, participates in certification and votes.
    Member,
    /// Participates in membership and `VOTE` actions only; never
    /// certifies or applies.
    Arbitrator,
}

impl Role {
    pub fn applies_writesets(self) -> bool {
        matches!(self, Role::Member)
    }
}

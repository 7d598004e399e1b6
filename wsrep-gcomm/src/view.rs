// Views are what group-comm hands up to GCS on every membership change;
// GCS turns them into CONF_CHANGE actions (see wsrep-gcs::action). A
// view is a value, not a handle: once built it never mutates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wsrep_base::MemberId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ViewId {
    pub uuid: Uuid,
    pub seq: u64,
}

impl ViewId {
    pub fn bootstrap(uuid: Uuid) -> Self {
        ViewId { uuid, seq: 0 }
    }

    pub fn next(&self, new_uuid: Uuid) -> Self {
        ViewId {
            uuid: new_uuid,
            seq: self.seq + 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ViewType {
    Primary,
    NonPrimary,
    Empty,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub view_id: ViewId,
    pub view_type: ViewType,
    pub members: Vec<MemberId>,
    pub my_index: usize,
    pub state_id: Uuid,
}

impl View {
    pub fn empty(view_id: ViewId) -> Self {
        View {
            view_id,
            view_type: ViewType::Empty,
            members: Vec::new(),
            my_index: 0,
            state_id: Uuid::nil(),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.view_type == ViewType::Primary
    }

    pub fn contains(&self, member: &MemberId) -> bool {
        self.members.iter().any(|m| m == member)
    }

    /// Count of `previous`'s members present in `self` — the input to
    /// the majority-of-previous-primary rule PC applies to decide
    /// primacy.
    pub fn overlap_with(&self, previous: &View) -> usize {
        previous.members.iter().filter(|m| self.contains(m)).count()
    }
}

//! Replicator: the public replication API the embedding database
//! drives, sitting on top of certification (`wsrep-cert`), the
//! write-set cache (`wsrep-gcache`), sequencing (`wsrep-gcs`), and
//! group communication (`wsrep-gcomm`). Owns the joiner/donor
//! choreography and the `connect`/`replicate`/`commit`/
//! `to_execute_start`/`to_execute_end`/`desync`/`resync`/`close` table.

mod api;
mod apply;
mod config;
mod join;
mod state;

pub use api::Replicator;
pub use apply::{may_commit_out_of_order, Apply, CommitTracker};
pub use config::{
    CertConfig, CommitOrder, Config, EvsConfig, GcacheConfig, GmCastConfig, PcConfig, ReplConfig, SocketConfig,
    DEFAULT_TRAILING_WINDOW,
};
pub use join::{Donor, JoinProgress, JoinRequest, Joiner};
pub use state::{ReplicatorState, Role};

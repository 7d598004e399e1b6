// What the application hands the replicator and what the certifier
// sees once it's delivered: the same record, just with a global seqno
// attached in the second case. A transaction's read/write key sets,
// narrowed to the write-only conflict model this engine actually needs.

use serde::{Deserialize, Serialize};

use wsrep_base::{bad_request, MemberId, Result, Seqno};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WriteSetFlags {
    pub commit: bool,
    pub rollback: bool,
    pub isolation: bool,
    pub pa_unsafe: bool,
    pub commutative: bool,
    pub native: bool,
}

impl WriteSetFlags {
    pub const NONE: WriteSetFlags = WriteSetFlags {
        commit: false,
        rollback: false,
        isolation: false,
        pa_unsafe: false,
        commutative: false,
        native: false,
    };
}

impl Default for WriteSetFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// A locally-prepared transaction before it has been assigned a global
/// seqno. `last_seen` is the snapshot horizon: the highest seqno this
/// member had applied when it built the write-set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriteSet {
    pub source: MemberId,
    pub trx_id: u64,
    pub last_seen: Seqno,
    pub keys: Vec<Vec<u8>>,
    pub data: Vec<u8>,
    pub flags: WriteSetFlags,
}

impl WriteSet {
    pub fn new(source: MemberId, trx_id: u64, last_seen: Seqno, keys: Vec<Vec<u8>>, data: Vec<u8>) -> Self {
        WriteSet {
            source,
            trx_id,
            last_seen,
            keys,
            data,
            flags: WriteSetFlags::NONE,
        }
    }

    pub fn fingerprints(&self) -> Vec<u64> {
        self.keys.iter().map(|k| rapidhash::rapidhash(k)).collect()
    }

    /// What goes in a GCS action's payload: the rmp-serde encoding of
    /// this struct, same wire idiom `wsrep-gcomm::wire` uses for `Msg`.
    pub fn encode(&self) -> Vec<u8> {
        rmp_serde::to_vec(self).expect("write-set encoding is infallible")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| bad_request(format!("malformed write-set: {e}")))
    }
}

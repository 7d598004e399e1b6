// Ubiquitous identifiers shared by every layer: the cluster-wide total
// order position (Seqno), the per-member local event counter
// (LocalSeqno), the stable member identity (MemberId), and a plain
// microsecond duration. None of these carry behavior beyond ordering
// and arithmetic; they exist so every layer agrees on representation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed 64-bit monotonic ordinal assigned by total order at the GCS
/// layer. `NONE` marks "not yet assigned" (a write-set that hasn't been
/// delivered); `MAX` is an open upper bound for range queries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Seqno(pub i64);

impl Seqno {
    pub const NONE: Seqno = Seqno(i64::MIN);
    pub const MAX: Seqno = Seqno(i64::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn next(self) -> Seqno {
        Seqno(self.0 + 1)
    }
}

impl std::fmt::Display for Seqno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Seqno::NONE {
            write!(f, "NONE")
        } else if *self == Seqno::MAX {
            write!(f, "MAX")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl std::ops::Sub for Seqno {
    type Output = i64;
    fn sub(self, rhs: Seqno) -> i64 {
        self.0 - rhs.0
    }
}

/// Per-member monotonic ordinal of all locally delivered actions
/// including non-replicated control actions, separate from [`Seqno`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LocalSeqno(pub u64);

impl LocalSeqno {
    pub fn next(self) -> LocalSeqno {
        LocalSeqno(self.0 + 1)
    }
}

/// 128-bit identifier, stable for a process lifetime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    pub fn new() -> Self {
        MemberId(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        MemberId(Uuid::nil())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::nil()
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A duration in signed 64-bit microseconds, relative to whatever clock
/// the caller is already using (no wall-clock assumption baked in).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Duration(pub i64);

impl Duration {
    pub fn from_millis(ms: i64) -> Self {
        Duration(ms * 1000)
    }

    pub fn as_millis(self) -> i64 {
        self.0 / 1000
    }

    pub fn as_std(self) -> std::time::Duration {
        std::time::Duration::from_micros(self.0.max(0) as u64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn seqno_sentinels() {
        assert!(Seqno::NONE.is_none());
        assert!(!Seqno(0).is_none());
        assert!(Seqno(5).next() == Seqno(6));
        assert_eq!(Seqno(10) - Seqno(4), 6);
    }

    #[test]
    fn member_id_stable() {
        let a = MemberId::new();
        let b = a;
        assert_eq!(a, b);
        assert_ne!(MemberId::new(), MemberId::new());
    }

    #[test]
    fn duration_roundtrip() {
        let d = Duration::from_millis(1500);
        assert_eq!(d.as_millis(), 1500);
        assert_eq!(d.as_std(), std::time::Duration::from_micros(1_500_000));
    }
}

// The shared seqno->handle index: one mutex-guarded `BTreeMap` that
// every store's `seqno_assign` inserts into. Mutated by the delivery
// thread, read briefly by appliers and state-transfer, then released
// before they touch the buffer itself (the mutex is held only across
// index updates, never across allocator calls), so it's an explicit
// object passed to every store rather than ambient global state.

use std::collections::BTreeMap;
use std::sync::Mutex;

use wsrep_base::Seqno;

use crate::buffer::BufHandle;

#[derive(Default)]
struct Inner {
    map: BTreeMap<i64, BufHandle>,
}

pub struct SeqnoIndex {
    inner: Mutex<Inner>,
}

impl SeqnoIndex {
    pub fn new() -> Self {
        SeqnoIndex {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn insert(&self, seqno: Seqno, handle: BufHandle) {
        self.inner.lock().unwrap().map.insert(seqno.0, handle);
    }

    pub fn remove(&self, seqno: Seqno) -> Option<BufHandle> {
        self.inner.lock().unwrap().map.remove(&seqno.0)
    }

    pub fn lookup(&self, seqno: Seqno) -> Option<BufHandle> {
        self.inner.lock().unwrap().map.get(&seqno.0).copied()
    }

    pub fn lowest(&self) -> Option<Seqno> {
        self.inner.lock().unwrap().map.keys().next().copied().map(Seqno)
    }

    pub fn highest(&self) -> Option<Seqno> {
        self.inner.lock().unwrap().map.keys().next_back().copied().map(Seqno)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Steady-state invariant: `[lower, highest()]` is gap-free. A gap
    /// may exist only transiently during recovery, so this is a
    /// diagnostic the owning replicator calls outside of recovery, not
    /// something enforced on every insert.
    pub fn is_contiguous_from(&self, lower: Seqno) -> bool {
        let guard = self.inner.lock().unwrap();
        let Some(&highest) = guard.map.keys().next_back() else {
            return true;
        };
        ((lower.0)..=highest).all(|s| guard.map.contains_key(&s))
    }
}

impl Default for SeqnoIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::StoreId;

    fn handle(slot: usize) -> BufHandle {
        BufHandle {
            store: StoreId::Mem,
            slot,
        }
    }

    #[test]
    fn tracks_lowest_and_highest() {
        let idx = SeqnoIndex::new();
        idx.insert(Seqno(3), handle(0));
        idx.insert(Seqno(5), handle(1));
        idx.insert(Seqno(4), handle(2));
        assert_eq!(idx.lowest(), Some(Seqno(3)));
        assert_eq!(idx.highest(), Some(Seqno(5)));
        assert!(idx.is_contiguous_from(Seqno(3)));
    }

    #[test]
    fn detects_a_gap() {
        let idx = SeqnoIndex::new();
        idx.insert(Seqno(1), handle(0));
        idx.insert(Seqno(3), handle(1));
        assert!(!idx.is_contiguous_from(Seqno(1)));
    }

    #[test]
    fn empty_index_is_vacuously_contiguous() {
        let idx = SeqnoIndex::new();
        assert!(idx.is_contiguous_from(Seqno(0)));
    }
}

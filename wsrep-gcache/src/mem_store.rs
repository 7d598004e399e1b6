// In-memory store: the first tier a write-set lands in. Bounded by
// `mem_max`; allocations are tracked in a hash set so `free`/`discard`
// can reject a handle that doesn't belong to this store without
// dereferencing anything. One store owns a bounded pool, hands back
// opaque handles, and tracks live allocations for safe reclaim, applied
// here to a seqno-indexed byte buffer instead of a columnar block.

use std::collections::{HashMap, HashSet};

use wsrep_base::{err, ErrorKind, Result, Seqno};

use crate::buffer::{BufHandle, BufferFlags, BufferHeader, StoreId};

struct Slot {
    header: BufferHeader,
    bytes: Vec<u8>,
}

pub struct MemStore {
    mem_max: usize,
    mem_size: usize,
    next_slot: usize,
    slots: HashMap<usize, Slot>,
    live: HashSet<usize>,
    seqno_locked: Seqno,
}

impl MemStore {
    pub fn new(mem_max: usize) -> Self {
        MemStore {
            mem_max,
            mem_size: 0,
            next_slot: 0,
            slots: HashMap::new(),
            live: HashSet::new(),
            seqno_locked: Seqno::NONE,
        }
    }

    pub fn mem_size(&self) -> usize {
        self.mem_size
    }

    pub fn mem_max(&self) -> usize {
        self.mem_max
    }

    /// Allocates `size` bytes. Fails once `mem_size + size` would
    /// exceed `mem_max` — the caller (the gcache's store-selection
    /// logic) is expected to fall back to `PageStore` on this error,
    /// not retry.
    pub fn malloc(&mut self, size: usize) -> Result<BufHandle> {
        if self.mem_size.saturating_add(size) > self.mem_max {
            return Err(err(
                ErrorKind::SizeExceeded,
                format!(
                    "mem store full: {} + {} > {}",
                    self.mem_size, size, self.mem_max
                ),
            ));
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(
            slot,
            Slot {
                header: BufferHeader::new(size, StoreId::Mem),
                bytes: vec![0u8; size],
            },
        );
        self.live.insert(slot);
        self.mem_size += size;
        Ok(BufHandle {
            store: StoreId::Mem,
            slot,
        })
    }

    /// Grows or shrinks an allocation in place. On failure (would
    /// exceed `mem_max`) the original handle is left byte-for-byte
    /// untouched and still tracked live — the caller may keep using it
    /// exactly as before; this resolves the back-pointer-on-failure
    /// open question by simply never mutating anything until success
    /// is certain.
    pub fn realloc(&mut self, handle: BufHandle, new_size: usize) -> Result<()> {
        let slot = self.checked_slot(handle)?;
        let old_size = self.slots[&slot].bytes.len();
        if new_size > old_size {
            let grow = new_size - old_size;
            if self.mem_size.saturating_add(grow) > self.mem_max {
                return Err(err(
                    ErrorKind::SizeExceeded,
                    "mem store realloc would exceed mem_max",
                ));
            }
            let entry = self.slots.get_mut(&slot).unwrap();
            entry.bytes.resize(new_size, 0u8);
            entry.header.size = new_size;
            self.mem_size += grow;
        } else if new_size < old_size {
            let shrink = old_size - new_size;
            let entry = self.slots.get_mut(&slot).unwrap();
            entry.bytes.truncate(new_size);
            entry.header.size = new_size;
            self.mem_size -= shrink;
        }
        Ok(())
    }

    pub fn bytes(&self, handle: BufHandle) -> Result<&[u8]> {
        let slot = self.checked_slot(handle)?;
        Ok(&self.slots[&slot].bytes)
    }

    pub fn bytes_mut(&mut self, handle: BufHandle) -> Result<&mut [u8]> {
        let slot = self.checked_slot(handle)?;
        Ok(&mut self.slots.get_mut(&slot).unwrap().bytes)
    }

    pub fn header(&self, handle: BufHandle) -> Result<&BufferHeader> {
        let slot = self.checked_slot(handle)?;
        Ok(&self.slots[&slot].header)
    }

    pub fn set_seqno(&mut self, handle: BufHandle, seqno: Seqno) -> Result<()> {
        let slot = self.checked_slot(handle)?;
        self.slots.get_mut(&slot).unwrap().header.seqno_g = seqno;
        Ok(())
    }

    /// Marks a handle released but keeps the payload addressable: the
    /// bytes stay put until `sweep_expired` (or an explicit `discard`)
    /// actually reclaims the space, so a slow reader racing a `free`
    /// still sees valid data, and a still-freed buffer can be brought
    /// back with [`MemStore::repossess`].
    pub fn free(&mut self, handle: BufHandle) -> Result<()> {
        let slot = self.checked_slot(handle)?;
        self.slots.get_mut(&slot).unwrap().header.flags.released = true;
        Ok(())
    }

    /// Re-claims an already-released buffer that hasn't been physically
    /// reclaimed yet: un-marks it released so it's live again. Contents
    /// are left bitwise untouched and the buffer stays at the same
    /// handle, still reachable through the shared seqno index.
    pub fn repossess(&mut self, handle: BufHandle) -> Result<()> {
        let slot = self.checked_slot(handle)?;
        let entry = self.slots.get_mut(&slot).unwrap();
        if !entry.header.flags.released {
            return Err(err(ErrorKind::BadRequest, "buffer is not released"));
        }
        entry.header.flags.released = false;
        Ok(())
    }

    /// Advances the low-water seqno below which buffers are eligible
    /// for reclaim. Buffers without an assigned seqno (still in
    /// flight) are never swept regardless of this value.
    pub fn set_seqno_locked(&mut self, seqno: Seqno) {
        self.seqno_locked = seqno;
    }

    /// Physically reclaims every freed, non-persistent buffer with
    /// `seqno_g <= seqno_locked`. Returns the reclaimed byte count.
    pub fn sweep_expired(&mut self) -> usize {
        let locked = self.seqno_locked;
        let mut reclaimed = 0usize;
        let dead: Vec<usize> = self
            .live
            .iter()
            .copied()
            .filter(|slot| {
                let s = &self.slots[slot];
                s.header.flags.released
                    && !s.header.flags.persistent
                    && !s.header.seqno_g.is_none()
                    && s.header.seqno_g <= locked
            })
            .collect();
        for slot in dead {
            if let Some(s) = self.slots.remove(&slot) {
                reclaimed += s.bytes.len();
                self.mem_size -= s.bytes.len();
            }
            self.live.remove(&slot);
        }
        reclaimed
    }

    /// Physically reclaims `handle` immediately, regardless of
    /// `seqno_locked`, and erases it from the live set.
    pub fn discard(&mut self, handle: BufHandle) -> Result<()> {
        let slot = self.checked_slot(handle)?;
        if let Some(s) = self.slots.remove(&slot) {
            self.mem_size -= s.bytes.len();
        }
        self.live.remove(&slot);
        Ok(())
    }

    pub fn flags(&self, handle: BufHandle) -> Result<BufferFlags> {
        Ok(self.header(handle)?.flags)
    }

    fn checked_slot(&self, handle: BufHandle) -> Result<usize> {
        if handle.store != StoreId::Mem || !self.live.contains(&handle.slot) {
            return Err(err(
                ErrorKind::BadRequest,
                "handle does not belong to this mem store",
            ));
        }
        Ok(handle.slot)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn malloc_and_discard_round_trip() {
        let mut store = MemStore::new(1024);
        let h = store.malloc(64).unwrap();
        assert_eq!(store.mem_size(), 64);
        store.discard(h).unwrap();
        assert_eq!(store.mem_size(), 0);
    }

    #[test]
    fn free_keeps_bytes_addressable_until_discarded() {
        let mut store = MemStore::new(1024);
        let h = store.malloc(64).unwrap();
        store.free(h).unwrap();
        assert_eq!(store.mem_size(), 64);
        assert!(store.header(h).unwrap().flags.released);
        assert_eq!(store.bytes(h).unwrap().len(), 64);
    }

    #[test]
    fn malloc_rejects_past_mem_max() {
        let mut store = MemStore::new(100);
        store.malloc(80).unwrap();
        assert!(store.malloc(30).is_err());
        assert_eq!(store.mem_size(), 80);
    }

    #[test]
    fn failed_realloc_leaves_original_untouched_and_tracked() {
        let mut store = MemStore::new(100);
        let h = store.malloc(80).unwrap();
        assert!(store.realloc(h, 500).is_err());
        assert_eq!(store.header(h).unwrap().size, 80);
        assert_eq!(store.bytes(h).unwrap().len(), 80);
        assert_eq!(store.mem_size(), 80);
    }

    #[test]
    fn sweep_expired_reclaims_only_freed_buffers_below_locked_seqno() {
        let mut store = MemStore::new(1024);
        let a = store.malloc(10).unwrap();
        let b = store.malloc(10).unwrap();
        store.set_seqno(a, Seqno(1)).unwrap();
        store.set_seqno(b, Seqno(5)).unwrap();
        store.free(a).unwrap();
        store.free(b).unwrap();
        store.set_seqno_locked(Seqno(2));
        let reclaimed = store.sweep_expired();
        assert_eq!(reclaimed, 10);
        assert!(store.header(a).is_err());
        assert!(store.header(b).is_ok());
    }

    #[test]
    fn unfreed_buffer_survives_sweep() {
        let mut store = MemStore::new(1024);
        let a = store.malloc(10).unwrap();
        store.set_seqno(a, Seqno(1)).unwrap();
        store.set_seqno_locked(Seqno(100));
        assert_eq!(store.sweep_expired(), 0);
        assert!(store.header(a).is_ok());
    }

    // Buffer containment: after free(b) then repossess(b), the contents
    // of b are bitwise unchanged and it's still discoverable by handle.
    #[test]
    fn repossess_restores_a_freed_buffer_byte_for_byte() {
        let mut store = MemStore::new(1024);
        let a = store.malloc(4).unwrap();
        store.bytes_mut(a).unwrap().copy_from_slice(b"abcd");
        store.set_seqno(a, Seqno(1)).unwrap();
        store.free(a).unwrap();
        assert!(store.header(a).unwrap().flags.released);

        store.repossess(a).unwrap();
        assert!(!store.header(a).unwrap().flags.released);
        assert_eq!(store.bytes(a).unwrap(), b"abcd");
        assert_eq!(store.header(a).unwrap().seqno_g, Seqno(1));
    }

    #[test]
    fn repossess_rejects_a_handle_that_was_never_freed() {
        let mut store = MemStore::new(1024);
        let a = store.malloc(4).unwrap();
        assert!(store.repossess(a).is_err());
    }
}

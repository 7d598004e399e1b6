//! Write-set cache: the seqno-indexed ring that backs donor state
//! transfer. Every certified write-set is appended here before it's
//! handed to the applier, first into `MemStore` (bounded by `mem_max`),
//! overflowing into `PageStore` once the mem budget is exhausted.
//! `Gcache` is the one place that picks a store per allocation and
//! keeps the shared seqno index consistent with both.

mod buffer;
mod index;
mod mem_store;
mod page_store;

pub use buffer::{BufHandle, BufferFlags, BufferHeader, StoreId};
pub use index::SeqnoIndex;
pub use mem_store::MemStore;
pub use page_store::PageStore;

use std::path::PathBuf;

use wsrep_base::{Result, Seqno};

#[derive(Clone)]
pub struct GcacheConfig {
    pub mem_max: usize,
    pub page_size: u64,
    pub page_dir: PathBuf,
}

impl Default for GcacheConfig {
    fn default() -> Self {
        GcacheConfig {
            mem_max: 16 * 1024 * 1024,
            page_size: 64 * 1024 * 1024,
            page_dir: std::env::temp_dir().join("wsrep-gcache"),
        }
    }
}

/// Ties `MemStore`/`PageStore` to the shared `SeqnoIndex`: the only
/// type outside this module that knows both stores exist.
pub struct Gcache {
    mem: MemStore,
    page: PageStore,
    index: SeqnoIndex,
}

impl Gcache {
    pub fn open(config: GcacheConfig) -> Result<Gcache> {
        Ok(Gcache {
            mem: MemStore::new(config.mem_max),
            page: PageStore::new(config.page_dir, config.page_size)?,
            index: SeqnoIndex::new(),
        })
    }

    /// Appends a write-set under its global seqno. Tries `MemStore`
    /// first; on `SizeExceeded` falls back to `PageStore`, which never
    /// refuses a buffer smaller than a page.
    pub fn append(&mut self, seqno: Seqno, bytes: &[u8]) -> Result<BufHandle> {
        let handle = match self.mem.malloc(bytes.len()) {
            Ok(handle) => {
                self.mem.bytes_mut(handle)?.copy_from_slice(bytes);
                self.mem.set_seqno(handle, seqno)?;
                handle
            }
            Err(_) => {
                let handle = self.page.malloc(bytes)?;
                self.page.set_seqno(handle, seqno)?;
                handle
            }
        };
        self.index.insert(seqno, handle);
        Ok(handle)
    }

    pub fn bytes(&mut self, seqno: Seqno) -> Result<Vec<u8>> {
        let handle = self.handle_for(seqno)?;
        match handle.store {
            StoreId::Mem => Ok(self.mem.bytes(handle)?.to_vec()),
            StoreId::Page(_) => self.page.bytes(handle),
        }
    }

    pub fn header(&self, seqno: Seqno) -> Result<BufferHeader> {
        let handle = self.handle_for(seqno)?;
        match handle.store {
            StoreId::Mem => self.mem.header(handle).map(|h| h.clone()),
            StoreId::Page(_) => self.page.header(handle),
        }
    }

    /// Marks a write-set as no longer needed locally (it has been
    /// applied and no lagging member could still request it as IST).
    /// The payload stays addressable until `repossess` actually sweeps
    /// it past `seqno_locked`, so a donor still reading it under a race
    /// sees valid bytes.
    pub fn discard(&mut self, seqno: Seqno) -> Result<()> {
        let handle = self.handle_for(seqno)?;
        match handle.store {
            StoreId::Mem => self.mem.free(handle),
            StoreId::Page(_) => self.page.discard(handle),
        }
    }

    /// Advances the low-water mark and sweeps both stores. Entries
    /// swept out of a store are also dropped from the shared index, so
    /// a lookup past this point cleanly reports "not available"
    /// instead of returning a stale handle.
    pub fn set_seqno_locked(&mut self, seqno: Seqno) {
        self.mem.set_seqno_locked(seqno);
        self.page.set_seqno_locked(seqno);
    }

    pub fn repossess(&mut self) {
        self.mem.sweep_expired();
        self.page.repossess();
        if let (Some(low), Some(high)) = (self.index.lowest(), self.index.highest()) {
            for s in low.0..=high.0 {
                let seqno = Seqno(s);
                if self.header(seqno).is_err() {
                    self.index.remove(seqno);
                }
            }
        }
    }

    pub fn lowest(&self) -> Option<Seqno> {
        self.index.lowest()
    }

    pub fn highest(&self) -> Option<Seqno> {
        self.index.highest()
    }

    pub fn contains(&self, seqno: Seqno) -> bool {
        self.index.lookup(seqno).is_some()
    }

    fn handle_for(&self, seqno: Seqno) -> Result<BufHandle> {
        self.index
            .lookup(seqno)
            .ok_or_else(|| wsrep_base::err(wsrep_base::ErrorKind::BadRequest, "seqno not in gcache"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(tag: &str) -> GcacheConfig {
        GcacheConfig {
            mem_max: 1024,
            page_size: 4096,
            page_dir: std::env::temp_dir().join(format!("wsrep-gcache-lib-test-{tag}-{}", std::process::id())),
        }
    }

    #[test]
    fn append_and_read_back_from_mem() {
        let cfg = config("mem");
        let mut g = Gcache::open(cfg.clone()).unwrap();
        g.append(Seqno(1), b"writeset-one").unwrap();
        assert_eq!(g.bytes(Seqno(1)).unwrap(), b"writeset-one");
        assert!(g.contains(Seqno(1)));
        let _ = std::fs::remove_dir_all(cfg.page_dir);
    }

    #[test]
    fn overflows_into_page_store_once_mem_is_full() {
        let cfg = config("overflow");
        let mut g = Gcache::open(cfg.clone()).unwrap();
        for i in 0..200i64 {
            g.append(Seqno(i), &[i as u8; 16]).unwrap();
        }
        assert_eq!(g.bytes(Seqno(199)).unwrap(), vec![199u8; 16]);
        let _ = std::fs::remove_dir_all(cfg.page_dir);
    }

    #[test]
    fn repossess_removes_discarded_entries_from_the_index() {
        let cfg = config("repossess");
        let mut g = Gcache::open(cfg.clone()).unwrap();
        g.append(Seqno(1), b"x").unwrap();
        g.discard(Seqno(1)).unwrap();
        g.set_seqno_locked(Seqno(10));
        g.repossess();
        assert!(!g.contains(Seqno(1)));
        let _ = std::fs::remove_dir_all(cfg.page_dir);
    }
}

// Overflow tier for write-sets too big, or too old, for the mem store:
// a ring of fixed-size files ("pages"), created lazily as the ring
// fills, swept whole once every buffer on a page is behind
// `seqno_locked`. Plain `std::fs::File` + `Read/Write/Seek` rather than
// reaching for a memory-map crate — nothing here needs mapped pages,
// only sequential append and the occasional seek-and-read-back for a
// donor request. Every record carries a small on-disk header ahead of
// its payload so a restarted process can reconstruct a page's record
// table by scanning the file instead of needing it handed back in.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use wsrep_base::{err, ErrorKind, Result, Seqno};

use crate::buffer::{BufHandle, BufferFlags, BufferHeader, StoreId};

/// `size:u32, seqno_g:i64, released/persistent/skipped:u8 each`, padded
/// to 16 bytes. Rewritten in place whenever a record's seqno or flags
/// change, so recovery only ever needs to read this plus the payload
/// length it names.
const HEADER_LEN: u64 = 16;

#[derive(Clone, Copy)]
struct OnDiskHeader {
    size: u32,
    seqno_g: i64,
    flags: BufferFlags,
}

impl OnDiskHeader {
    fn encode(&self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[0..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4..12].copy_from_slice(&self.seqno_g.to_le_bytes());
        buf[12] = self.flags.released as u8;
        buf[13] = self.flags.persistent as u8;
        buf[14] = self.flags.skipped as u8;
        buf
    }

    fn decode(buf: &[u8; HEADER_LEN as usize]) -> OnDiskHeader {
        OnDiskHeader {
            size: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            seqno_g: i64::from_le_bytes(buf[4..12].try_into().unwrap()),
            flags: BufferFlags {
                released: buf[12] != 0,
                persistent: buf[13] != 0,
                skipped: buf[14] != 0,
            },
        }
    }
}

struct Record {
    header_offset: u64,
    offset: u64,
    size: usize,
    seqno_g: Seqno,
    flags: BufferFlags,
}

struct Page {
    id: u32,
    file: File,
    tail: u64,
    records: HashMap<usize, Record>,
    next_slot: usize,
    live: usize,
}

impl Page {
    fn create(dir: &PathBuf, id: u32) -> Result<Page> {
        let path = dir.join(format!("gcache-{id:08}.page"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Page {
            id,
            file,
            tail: 0,
            records: HashMap::new(),
            next_slot: 0,
            live: 0,
        })
    }

    /// Reopens an existing page file and rebuilds its record table by
    /// scanning headers from the start; stops at the first header that
    /// doesn't fit (a torn write from an unclean shutdown), treating
    /// everything before it as the recovered tail.
    fn recover(dir: &PathBuf, id: u32) -> Result<Page> {
        let path = dir.join(format!("gcache-{id:08}.page"));
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();

        let mut records = HashMap::new();
        let mut offset = 0u64;
        let mut slot = 0usize;
        let mut live = 0usize;

        loop {
            if offset + HEADER_LEN > len {
                break;
            }
            file.seek(SeekFrom::Start(offset))?;
            let mut hdr_buf = [0u8; HEADER_LEN as usize];
            if file.read_exact(&mut hdr_buf).is_err() {
                break;
            }
            let header = OnDiskHeader::decode(&hdr_buf);
            let payload_offset = offset + HEADER_LEN;
            if payload_offset + header.size as u64 > len {
                break;
            }
            if !header.flags.released {
                live += 1;
            }
            records.insert(
                slot,
                Record {
                    header_offset: offset,
                    offset: payload_offset,
                    size: header.size as usize,
                    seqno_g: Seqno(header.seqno_g),
                    flags: header.flags,
                },
            );
            offset = payload_offset + header.size as u64;
            slot += 1;
        }

        Ok(Page {
            id,
            file,
            tail: offset,
            records,
            next_slot: slot,
            live,
        })
    }

    fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        let header_offset = self.tail;
        let header = OnDiskHeader {
            size: bytes.len() as u32,
            seqno_g: Seqno::NONE.0,
            flags: BufferFlags::NONE,
        };
        self.file.seek(SeekFrom::Start(header_offset))?;
        self.file.write_all(&header.encode())?;
        self.file.write_all(bytes)?;
        let slot = self.next_slot;
        self.next_slot += 1;
        let payload_offset = header_offset + HEADER_LEN;
        self.records.insert(
            slot,
            Record {
                header_offset,
                offset: payload_offset,
                size: bytes.len(),
                seqno_g: Seqno::NONE,
                flags: BufferFlags::NONE,
            },
        );
        self.tail = payload_offset + bytes.len() as u64;
        self.live += 1;
        Ok(slot)
    }

    fn read(&mut self, slot: usize) -> Result<Vec<u8>> {
        let rec = self
            .records
            .get(&slot)
            .ok_or_else(|| err(ErrorKind::BadRequest, "no such record on page"))?;
        let mut buf = vec![0u8; rec.size];
        self.file.seek(SeekFrom::Start(rec.offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Rewrites `slot`'s header in place to match its current in-memory
    /// `seqno_g`/`flags`, so a later recovery scan sees them too.
    fn persist_header(&mut self, slot: usize) -> Result<()> {
        let rec = self.records.get(&slot).expect("record exists");
        let header = OnDiskHeader {
            size: rec.size as u32,
            seqno_g: rec.seqno_g.0,
            flags: rec.flags,
        };
        let offset = rec.header_offset;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&header.encode())?;
        Ok(())
    }
}

fn parse_page_id(name: &OsStr) -> Option<u32> {
    let name = name.to_str()?;
    name.strip_prefix("gcache-")?.strip_suffix(".page")?.parse().ok()
}

/// A page is swept (truncated and reused) only once every record on it
/// is discarded and behind `seqno_locked` — a page is the unit of
/// reclaim, not an individual record, so one long-lived write-set can
/// pin an entire page's worth of already-discarded neighbors.
pub struct PageStore {
    dir: PathBuf,
    page_size: u64,
    pages: HashMap<u32, Page>,
    next_page_id: u32,
    current: u32,
    seqno_locked: Seqno,
}

impl PageStore {
    /// Opens `dir`, reopening and recovering any `gcache-*.page` files
    /// already there (from a prior run) by scanning their headers, and
    /// resuming appends on the highest-numbered page. An empty or
    /// freshly created `dir` starts a new ring at page 0.
    pub fn new(dir: impl Into<PathBuf>, page_size: u64) -> Result<PageStore> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut existing_ids: Vec<u32> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(id) = parse_page_id(&entry.file_name()) {
                existing_ids.push(id);
            }
        }
        existing_ids.sort_unstable();

        let mut store = PageStore {
            dir,
            page_size,
            pages: HashMap::new(),
            next_page_id: 0,
            current: 0,
            seqno_locked: Seqno::NONE,
        };

        for id in &existing_ids {
            let page = Page::recover(&store.dir, *id)?;
            store.pages.insert(*id, page);
        }

        match existing_ids.last() {
            Some(&max_id) => {
                store.next_page_id = max_id + 1;
                store.current = max_id;
            }
            None => {
                store.open_new_page()?;
            }
        }
        Ok(store)
    }

    fn open_new_page(&mut self) -> Result<u32> {
        let id = self.next_page_id;
        self.next_page_id += 1;
        let page = Page::create(&self.dir, id)?;
        self.pages.insert(id, page);
        self.current = id;
        Ok(id)
    }

    pub fn malloc(&mut self, bytes: &[u8]) -> Result<BufHandle> {
        if bytes.len() as u64 > self.page_size {
            return Err(err(
                ErrorKind::SizeExceeded,
                "buffer larger than a single page",
            ));
        }
        let current = self.pages.get(&self.current).expect("current page exists");
        if current.tail + bytes.len() as u64 > self.page_size {
            self.open_new_page()?;
        }
        let page = self.pages.get_mut(&self.current).unwrap();
        let slot = page.append(bytes)?;
        Ok(BufHandle {
            store: StoreId::Page(self.current),
            slot,
        })
    }

    pub fn bytes(&mut self, handle: BufHandle) -> Result<Vec<u8>> {
        let id = self.page_id(handle)?;
        self.pages.get_mut(&id).unwrap().read(handle.slot)
    }

    pub fn header(&self, handle: BufHandle) -> Result<BufferHeader> {
        let id = self.page_id(handle)?;
        let page = &self.pages[&id];
        let rec = page
            .records
            .get(&handle.slot)
            .ok_or_else(|| err(ErrorKind::BadRequest, "no such record on page"))?;
        Ok(BufferHeader {
            size: rec.size,
            seqno_g: rec.seqno_g,
            flags: rec.flags,
            store_id: StoreId::Page(id),
        })
    }

    pub fn set_seqno(&mut self, handle: BufHandle, seqno: Seqno) -> Result<()> {
        let id = self.page_id(handle)?;
        let page = self.pages.get_mut(&id).unwrap();
        {
            let rec = page
                .records
                .get_mut(&handle.slot)
                .ok_or_else(|| err(ErrorKind::BadRequest, "no such record on page"))?;
            rec.seqno_g = seqno;
        }
        page.persist_header(handle.slot)
    }

    pub fn discard(&mut self, handle: BufHandle) -> Result<()> {
        let id = self.page_id(handle)?;
        let page = self.pages.get_mut(&id).unwrap();
        {
            let rec = page
                .records
                .get_mut(&handle.slot)
                .ok_or_else(|| err(ErrorKind::BadRequest, "no such record on page"))?;
            rec.flags.released = true;
        }
        page.persist_header(handle.slot)
    }

    pub fn set_seqno_locked(&mut self, seqno: Seqno) {
        self.seqno_locked = seqno;
    }

    /// Drops whole pages once every record on them is released,
    /// non-persistent, and behind `seqno_locked`, and the page isn't
    /// the one currently being appended to. Returns the ids of pages
    /// removed.
    pub fn repossess(&mut self) -> Vec<u32> {
        let locked = self.seqno_locked;
        let current = self.current;
        let dead: Vec<u32> = self
            .pages
            .iter()
            .filter(|(&id, page)| {
                id != current
                    && page.live > 0
                    && page.records.values().all(|r| {
                        r.flags.released
                            && !r.flags.persistent
                            && !r.seqno_g.is_none()
                            && r.seqno_g <= locked
                    })
            })
            .map(|(&id, _)| id)
            .collect();
        for id in &dead {
            if let Some(page) = self.pages.remove(id) {
                let path = self.dir.join(format!("gcache-{id:08}.page"));
                drop(page);
                let _ = std::fs::remove_file(path);
            }
        }
        dead
    }

    fn page_id(&self, handle: BufHandle) -> Result<u32> {
        match handle.store {
            StoreId::Page(id) if self.pages.contains_key(&id) => Ok(id),
            _ => Err(err(ErrorKind::BadRequest, "handle does not belong to a live page")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tmp_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("wsrep-gcache-test-{name}-{}", std::process::id()));
        p
    }

    #[test]
    fn malloc_and_read_back_round_trips() {
        let dir = tmp_dir("roundtrip");
        let mut store = PageStore::new(&dir, 4096).unwrap();
        let h = store.malloc(b"hello write-set").unwrap();
        assert_eq!(store.bytes(h).unwrap(), b"hello write-set");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn overflow_rolls_to_a_new_page() {
        let dir = tmp_dir("rollover");
        let mut store = PageStore::new(&dir, 32).unwrap();
        let a = store.malloc(&[1u8; 20]).unwrap();
        let b = store.malloc(&[2u8; 20]).unwrap();
        assert_ne!(a.store, b.store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn repossess_drops_fully_discarded_non_current_pages() {
        let dir = tmp_dir("repossess");
        let mut store = PageStore::new(&dir, 16).unwrap();
        let a = store.malloc(&[1u8; 10]).unwrap();
        store.set_seqno(a, Seqno(1)).unwrap();
        store.discard(a).unwrap();
        // force rollover so page 0 is no longer current
        let _b = store.malloc(&[2u8; 10]).unwrap();
        store.set_seqno_locked(Seqno(10));
        let dropped = store.repossess();
        assert_eq!(dropped, vec![0]);
        assert!(store.header(a).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopening_the_same_dir_recovers_pages_and_their_headers() {
        let dir = tmp_dir("recover");
        let a;
        {
            let mut store = PageStore::new(&dir, 4096).unwrap();
            a = store.malloc(b"durable write-set").unwrap();
            store.set_seqno(a, Seqno(7)).unwrap();
        }
        // Page files are untouched across this "restart": nothing
        // removes them on an unclean shutdown.
        let mut reopened = PageStore::new(&dir, 4096).unwrap();
        assert_eq!(reopened.bytes(a).unwrap(), b"durable write-set");
        assert_eq!(reopened.header(a).unwrap().seqno_g, Seqno(7));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn recovery_continues_appending_on_the_highest_numbered_page() {
        let dir = tmp_dir("recover-append");
        {
            let mut store = PageStore::new(&dir, 24).unwrap();
            let _a = store.malloc(&[1u8; 16]).unwrap();
            let _b = store.malloc(&[2u8; 16]).unwrap(); // rolls to page 1
        }
        let mut reopened = PageStore::new(&dir, 24).unwrap();
        let c = reopened.malloc(&[3u8; 4]).unwrap();
        assert_eq!(c.store, StoreId::Page(1));
        let _ = std::fs::remove_dir_all(&dir);
    }
}

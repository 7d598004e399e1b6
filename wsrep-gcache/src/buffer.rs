// Every allocation, whichever store it comes from, returns a payload
// handle prefixed by this header. The back-pointer to the owning store
// is a tagged id plus slot index rather than a raw pointer — resolves
// the open question about realloc invalidating addresses: since the
// index only ever stores `BufHandle`s, not raw bytes, a buffer can
// move (mem → page, or within a page's ring) without stranding any
// outstanding reference.

use wsrep_base::Seqno;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BufferFlags {
    pub released: bool,
    pub skipped: bool,
    pub persistent: bool,
}

impl BufferFlags {
    pub const NONE: BufferFlags = BufferFlags {
        released: false,
        skipped: false,
        persistent: false,
    };
}

impl Default for BufferFlags {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StoreId {
    Mem,
    Page(u32),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BufHandle {
    pub store: StoreId,
    pub slot: usize,
}

#[derive(Clone, Debug)]
pub struct BufferHeader {
    pub size: usize,
    pub seqno_g: Seqno,
    pub flags: BufferFlags,
    pub store_id: StoreId,
}

impl BufferHeader {
    pub fn new(size: usize, store_id: StoreId) -> Self {
        BufferHeader {
            size,
            seqno_g: Seqno::NONE,
            flags: BufferFlags::NONE,
            store_id,
        }
    }
}

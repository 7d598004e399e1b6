//! Certification engine: decides, for each write-set delivered in
//! total order, whether it conflicts with a write-set certified more
//! recently than the one it was built against. One certifier, strict
//! seqno order, a rolling trailing-window index — the point in the
//! stack where total order actually pays for itself.

mod engine;
mod index;
mod writeset;

pub use engine::{CertDisposition, CertEngine, CertOutcome};
pub use index::CertIndex;
pub use writeset::{WriteSet, WriteSetFlags};

mod bitmap256;
mod error;
mod ids;

#[cfg(test)]
mod test;

pub use bitmap256::{Bitmap256, DoubleBitmap256};
pub use error::{bad_request, err, internal_fatal, Error, ErrorKind, Result};
pub use ids::{Duration, LocalSeqno, MemberId, Seqno};

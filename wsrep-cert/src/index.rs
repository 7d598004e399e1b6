// The certification index proper: key fingerprint -> most-recent
// certifying seqno, plus the in-flight `{seqno -> keyset}` map needed
// to purge both sides together once `last_committed` advances. A
// rolling window of fingerprint-keyed conflict bookkeeping, narrowed to
// a single window instead of a full transaction log.

use std::collections::BTreeMap;

use wsrep_base::Seqno;

#[derive(Default)]
pub struct CertIndex {
    fingerprints: std::collections::HashMap<u64, Seqno>,
    inflight: BTreeMap<i64, Vec<u64>>,
}

impl CertIndex {
    pub fn new() -> Self {
        CertIndex::default()
    }

    pub fn last_certifying(&self, fingerprint: u64) -> Option<Seqno> {
        self.fingerprints.get(&fingerprint).copied()
    }

    /// Records a successful certification: every fingerprint in the
    /// write-set now points at `seqno`, and the full fingerprint set is
    /// kept in the in-flight map so a later purge can remove both sides
    /// atomically.
    pub fn record(&mut self, seqno: Seqno, fingerprints: Vec<u64>) {
        for &fp in &fingerprints {
            self.fingerprints.insert(fp, seqno);
        }
        self.inflight.insert(seqno.0, fingerprints);
    }

    /// Drops in-flight entries with seqno `< last_committed`, and
    /// fingerprint entries with seqno `< last_committed - trailing`.
    /// The two bounds differ because a fingerprint only needs to
    /// survive long enough to reject a conflicting write-set built
    /// against an old snapshot; the in-flight map only needs to
    /// survive until the write-set is known committed everywhere.
    pub fn purge(&mut self, last_committed: Seqno, trailing: i64) {
        let inflight_bound = last_committed.0;
        let stale_inflight: Vec<i64> = self
            .inflight
            .range(..inflight_bound)
            .map(|(&s, _)| s)
            .collect();
        for s in stale_inflight {
            self.inflight.remove(&s);
        }

        let fingerprint_bound = last_committed.0.saturating_sub(trailing);
        self.fingerprints
            .retain(|_, &mut seqno| seqno.0 >= fingerprint_bound);
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    pub fn fingerprint_len(&self) -> usize {
        self.fingerprints.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn records_and_looks_up_fingerprints() {
        let mut idx = CertIndex::new();
        idx.record(Seqno(3), vec![42]);
        assert_eq!(idx.last_certifying(42), Some(Seqno(3)));
        assert_eq!(idx.last_certifying(99), None);
    }

    #[test]
    fn purge_drops_entries_outside_the_trailing_window() {
        let mut idx = CertIndex::new();
        idx.record(Seqno(1), vec![1]);
        idx.record(Seqno(10), vec![2]);
        idx.purge(Seqno(10), 3);
        assert_eq!(idx.last_certifying(1), None);
        assert_eq!(idx.last_certifying(2), Some(Seqno(10)));
        assert_eq!(idx.inflight_len(), 1);
    }
}

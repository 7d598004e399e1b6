// Steady timers. These don't register with mio at all (mio has no
// timer primitive of its own): a min-heap of deadlines tells the
// reactor how long its next `poll()` may block, and `expired()` is
// drained by the caller after each `run_one`.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration as StdDuration, Instant};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimerId(pub u64);

#[derive(Default)]
pub struct TimerQueue {
    next_id: u64,
    heap: BinaryHeap<Reverse<(Instant, TimerId)>>,
    periods: HashMap<TimerId, StdDuration>,
    cancelled: HashSet<TimerId>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// One-shot timer firing once after `d`.
    pub fn after(&mut self, d: StdDuration) -> TimerId {
        let id = self.alloc();
        self.heap.push(Reverse((Instant::now() + d, id)));
        id
    }

    /// Periodic timer, re-armed every time it fires. Used for the GCS
    /// flow-control heartbeat and the GMCast peer-liveness heartbeat.
    pub fn every(&mut self, d: StdDuration) -> TimerId {
        let id = self.alloc();
        self.periods.insert(id, d);
        self.heap.push(Reverse((Instant::now() + d, id)));
        id
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.cancelled.insert(id);
        self.periods.remove(&id);
    }

    /// How long `Reactor::run_one`'s underlying `poll()` should be
    /// allowed to block, given the next pending deadline.
    pub fn next_timeout(&self) -> Option<StdDuration> {
        self.heap
            .peek()
            .map(|Reverse((deadline, _))| deadline.saturating_duration_since(Instant::now()))
    }

    /// Pops and returns every timer id whose deadline has passed,
    /// re-arming periodic ones for their next cycle.
    pub fn expired(&mut self) -> Vec<TimerId> {
        let now = Instant::now();
        let mut fired = Vec::new();
        while let Some(&Reverse((deadline, id))) = self.heap.peek() {
            if deadline > now {
                break;
            }
            self.heap.pop();
            if self.cancelled.remove(&id) {
                continue;
            }
            fired.push(id);
            if let Some(period) = self.periods.get(&id).copied() {
                self.heap.push(Reverse((now + period, id)));
            }
        }
        fired
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fires_in_order() {
        let mut q = TimerQueue::new();
        let a = q.after(StdDuration::from_millis(1));
        let b = q.after(StdDuration::from_millis(50));
        std::thread::sleep(StdDuration::from_millis(5));
        let fired = q.expired();
        assert_eq!(fired, vec![a]);
        assert!(q.next_timeout().is_some());
        let _ = b;
    }

    #[test]
    fn cancel_suppresses_firing() {
        let mut q = TimerQueue::new();
        let a = q.after(StdDuration::from_millis(1));
        q.cancel(a);
        std::thread::sleep(StdDuration::from_millis(5));
        assert!(q.expired().is_empty());
    }

    #[test]
    fn periodic_rearms() {
        let mut q = TimerQueue::new();
        let a = q.every(StdDuration::from_millis(1));
        std::thread::sleep(StdDuration::from_millis(5));
        assert_eq!(q.expired(), vec![a]);
        std::thread::sleep(StdDuration::from_millis(5));
        assert_eq!(q.expired(), vec![a]);
    }
}

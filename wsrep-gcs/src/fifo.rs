// Bounded multi-producer/single-consumer queue between the delivery
// thread (group-comm → GCS) and the certifier thread. A plain
// `Mutex<VecDeque<_>>` plus two condvars, with a proper closed-state
// protocol: `close()` sets a flag and wakes every waiter rather than
// dropping the queue out from under a blocked thread.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::action::Action;

struct Inner {
    queue: VecDeque<Action>,
    closed: bool,
}

pub struct ActionFifo {
    capacity: usize,
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

#[derive(Debug, Eq, PartialEq)]
pub struct Closed;

impl ActionFifo {
    pub fn new(capacity: usize) -> Self {
        ActionFifo {
            capacity,
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Blocks while the queue is at capacity. Returns `Err(Closed)` if
    /// the queue is (or becomes) closed before there's room — the
    /// action is dropped, never silently queued past shutdown.
    pub fn push(&self, action: Action) -> Result<(), Closed> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if guard.closed {
                return Err(Closed);
            }
            if guard.queue.len() < self.capacity {
                guard.queue.push_back(action);
                self.not_empty.notify_one();
                return Ok(());
            }
            guard = self.not_full.wait(guard).unwrap();
        }
    }

    /// Blocks while the queue is empty and open. Returns `None` once
    /// closed and fully drained — the terminal state every consumer
    /// eventually reaches, as opposed to panicking on a dropped queue.
    pub fn pop(&self) -> Option<Action> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(action) = guard.queue.pop_front() {
                self.not_full.notify_one();
                return Some(action);
            }
            if guard.closed {
                return None;
            }
            guard = self.not_empty.wait(guard).unwrap();
        }
    }

    pub fn try_pop(&self) -> Option<Action> {
        let mut guard = self.inner.lock().unwrap();
        let action = guard.queue.pop_front();
        if action.is_some() {
            self.not_full.notify_one();
        }
        action
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wakes every blocked producer and consumer; subsequent `push`
    /// calls fail immediately, `pop` calls drain whatever remains then
    /// return `None`.
    pub fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.closed = true;
        drop(guard);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::action::ActionKind;
    use std::sync::Arc;
    use std::thread;
    use wsrep_base::MemberId;

    fn dummy_action() -> Action {
        Action {
            kind: ActionKind::Writeset,
            seqno: wsrep_base::Seqno(0),
            local_seqno: wsrep_base::LocalSeqno(0),
            source: MemberId::new(),
            payload: vec![],
        }
    }

    #[test]
    fn push_then_pop_round_trips() {
        let fifo = ActionFifo::new(4);
        fifo.push(dummy_action()).unwrap();
        assert_eq!(fifo.len(), 1);
        assert!(fifo.pop().is_some());
        assert!(fifo.is_empty());
    }

    #[test]
    fn closing_wakes_a_blocked_consumer() {
        let fifo = Arc::new(ActionFifo::new(1));
        let reader = {
            let fifo = fifo.clone();
            thread::spawn(move || fifo.pop())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        fifo.close();
        assert_eq!(reader.join().unwrap(), None);
    }

    #[test]
    fn push_after_close_is_rejected() {
        let fifo = ActionFifo::new(1);
        fifo.close();
        assert_eq!(fifo.push(dummy_action()), Err(Closed));
    }

    #[test]
    fn full_queue_blocks_producer_until_consumed() {
        let fifo = Arc::new(ActionFifo::new(1));
        fifo.push(dummy_action()).unwrap();
        let writer = {
            let fifo = fifo.clone();
            thread::spawn(move || fifo.push(dummy_action()))
        };
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(fifo.pop().is_some());
        assert_eq!(writer.join().unwrap(), Ok(()));
    }
}

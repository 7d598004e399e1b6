// Flow control never surfaces as an error: it's pure
// backpressure on the applier side, relayed to the rest of the cluster
// as a CAUSAL action over the same total-order channel so every member
// throttles its own multicast rate in step rather than one member's
// queue growing unbounded while the rest race ahead.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowControlSignal {
    Pause,
    Resume,
    Unchanged,
}

/// Hysteresis between `high` and `low` avoids flapping pause/resume on
/// every single action once the queue is hovering near one watermark.
pub struct FlowControl {
    high: usize,
    low: usize,
    paused: bool,
}

impl FlowControl {
    pub fn new(low: usize, high: usize) -> Self {
        assert!(low <= high, "low watermark must not exceed high watermark");
        FlowControl {
            high,
            low,
            paused: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Called whenever the certifier's inbound queue length changes;
    /// returns the transition, if any, to relay as a CAUSAL action.
    pub fn on_queue_len(&mut self, len: usize) -> FlowControlSignal {
        if !self.paused && len >= self.high {
            self.paused = true;
            FlowControlSignal::Pause
        } else if self.paused && len <= self.low {
            self.paused = false;
            FlowControlSignal::Resume
        } else {
            FlowControlSignal::Unchanged
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pauses_at_high_and_resumes_at_low() {
        let mut fc = FlowControl::new(2, 8);
        assert_eq!(fc.on_queue_len(5), FlowControlSignal::Unchanged);
        assert_eq!(fc.on_queue_len(8), FlowControlSignal::Pause);
        assert_eq!(fc.on_queue_len(3), FlowControlSignal::Unchanged);
        assert_eq!(fc.on_queue_len(2), FlowControlSignal::Resume);
    }

    #[test]
    #[should_panic]
    fn rejects_inverted_watermarks() {
        FlowControl::new(8, 2);
    }
}

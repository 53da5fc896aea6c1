use std::time::Duration;

use tokio::time::Instant;

/// Default gate cadence, roughly 60 Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Decides when frame tasks may run.
///
/// The gate is open once `interval` has passed since it was last closed.
/// `last_open` never moves backwards.
#[derive(Debug, Clone)]
pub struct PhaseGate {
    last_open: Instant,
    interval: Duration,
}

impl PhaseGate {
    pub fn new(interval: Duration) -> Self {
        Self::opened_at(Instant::now(), interval)
    }

    pub fn opened_at(last_open: Instant, interval: Duration) -> Self {
        Self {
            last_open,
            interval,
        }
    }

    pub fn last_open(&self) -> Instant {
        self.last_open
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_open(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_open) >= self.interval
    }

    /// Earliest instant at which the gate reports open.
    pub fn next_open(&self) -> Instant {
        self.last_open + self.interval
    }

    pub fn close(&mut self, now: Instant) {
        if now > self.last_open {
            self.last_open = now;
        }
    }
}

impl Default for PhaseGate {
    fn default() -> Self {
        Self::new(FRAME_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_gate_opens_after_interval() {
        let gate = PhaseGate::default();
        let start = gate.last_open();

        assert!(!gate.is_open(start));
        assert!(!gate.is_open(start + Duration::from_millis(15)));
        assert!(gate.is_open(start + Duration::from_millis(16)));
        assert_eq!(gate.next_open(), start + FRAME_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_rewound_is_open() {
        let now = Instant::now();
        let gate = PhaseGate::opened_at(now - Duration::from_millis(20), FRAME_INTERVAL);
        assert!(gate.is_open(now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_monotonic() {
        let now = Instant::now();
        let mut gate = PhaseGate::opened_at(now, FRAME_INTERVAL);

        gate.close(now - Duration::from_millis(5));
        assert_eq!(gate.last_open(), now);

        let later = now + Duration::from_millis(40);
        gate.close(later);
        assert_eq!(gate.last_open(), later);
        assert!(!gate.is_open(later));
    }
}

use std::time::Duration;

/// Doubling reconnect delay with an upper bound.
///
/// `next_delay` yields `min(current, cap)` and then doubles `current`
/// (also capped), so consecutive failures wait base, 2*base, 4*base, ...
/// until the cap. A successful open calls [`ReconnectBackoff::reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectBackoff {
    base: Duration,
    cap: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        let cap = cap.max(base);
        Self {
            base,
            cap,
            current: base,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.cap);
        self.current = self.current.saturating_mul(2).min(self.cap);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

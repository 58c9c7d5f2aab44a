use std::time::Duration;

/// Tunables of the resource report poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    max_concurrent_pulls: usize,
    poll_period: Duration,
    tick_period: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pulls: utils::MAX_CONCURRENT_RESOURCE_PULLS,
            poll_period: parse_default(utils::RESOURCE_REPORT_POLL_PERIOD),
            tick_period: parse_default(utils::RESOURCE_REPORT_TICK_PERIOD),
        }
    }
}

/// Parse one of the built-in duration defaults.
fn parse_default(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or(Duration::from_millis(100))
}

impl PollerConfig {
    /// Create a new `Self`.
    pub fn new(max_concurrent_pulls: usize, poll_period: Duration, tick_period: Duration) -> Self {
        Self::default()
            .with_max_concurrent_pulls(max_concurrent_pulls)
            .with_poll_period(poll_period)
            .with_tick_period(tick_period)
    }
    /// Specify the maximum number of pulls in flight.
    /// At least one pull is always allowed, otherwise no node would ever be polled.
    pub fn with_max_concurrent_pulls(self, max_concurrent_pulls: usize) -> Self {
        Self {
            max_concurrent_pulls: max_concurrent_pulls.max(1),
            ..self
        }
    }
    /// Specify the period between two pulls of the same node.
    pub fn with_poll_period(self, poll_period: Duration) -> Self {
        Self {
            poll_period,
            ..self
        }
    }
    /// Specify the period at which the poller looks for nodes which are due.
    pub fn with_tick_period(self, tick_period: Duration) -> Self {
        Self {
            tick_period: tick_period.max(Duration::from_millis(1)),
            ..self
        }
    }

    /// The maximum number of pulls in flight.
    pub fn max_concurrent_pulls(&self) -> usize {
        self.max_concurrent_pulls
    }
    /// The period between two pulls of the same node.
    pub fn poll_period(&self) -> Duration {
        self.poll_period
    }
    /// The period between two checks for due nodes.
    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }
    /// The poll period in milliseconds.
    pub(crate) fn poll_period_ms(&self) -> i64 {
        i64::try_from(self.poll_period.as_millis()).unwrap_or(i64::MAX)
    }
}

use crate::clock::Clock;
use crate::session::ElementSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

/// Default timeout if none is specified
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Blocking wait for elements that render with variable latency.
///
/// The remote surface has no completion events, so after submitting a
/// command the only option is to resolve the expected element repeatedly
/// until it shows up or the timeout runs out.
#[derive(Clone)]
pub struct ElementPoller {
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ElementPoller {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `path` resolves. Returns `false` once another pause would
    /// take the total wait past `timeout`.
    #[instrument(level = "debug", skip(self, source))]
    pub fn wait_for(&self, source: &dyn ElementSource, path: &str, timeout: Duration) -> bool {
        self.wait_until(timeout, || match source.resolve(path) {
            Ok(_) => true,
            Err(e) => {
                trace!("{path} not there yet: {e}");
                false
            }
        })
    }

    pub fn wait_for_default(&self, source: &dyn ElementSource, path: &str) -> bool {
        self.wait_for(source, path, DEFAULT_WAIT_TIMEOUT)
    }

    /// Poll `probe` every interval until it returns `true` or `timeout` is spent.
    pub fn wait_until<F>(&self, timeout: Duration, mut probe: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let start = self.clock.now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if probe() {
                debug!(attempts, "condition met");
                return true;
            }
            if self.clock.elapsed_since(start) + self.interval > timeout {
                warn!(attempts, ?timeout, "gave up waiting");
                return false;
            }
            self.clock.sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::platforms::memory::MemoryBackend;
    use crate::{GuiElement, ScriptingError};
    use std::cell::Cell;

    /// Resolves only after a fixed number of failed attempts.
    struct LateSource {
        backend: MemoryBackend,
        failures_left: Cell<usize>,
    }

    impl ElementSource for LateSource {
        fn resolve(&self, path: &str) -> Result<GuiElement, ScriptingError> {
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(ScriptingError::ElementNotFound(path.to_string()));
            }
            self.backend.find_by_id(path)
        }
    }

    fn late(pauses: usize) -> LateSource {
        LateSource {
            backend: MemoryBackend::new().with_element("wnd[0]/usr/txtDONE", "ok"),
            failures_left: Cell::new(pauses),
        }
    }

    #[test]
    fn succeeds_when_pauses_fit_in_timeout() {
        for (pauses, timeout) in [(0, 0), (1, 1), (3, 5), (60, 60)] {
            let clock = Arc::new(ManualClock::new());
            let poller = ElementPoller::new(clock.clone());
            let found = poller.wait_for(
                &late(pauses),
                "wnd[0]/usr/txtDONE",
                Duration::from_secs(timeout),
            );
            assert!(found, "{pauses} pauses within {timeout}s");
            assert_eq!(clock.elapsed(), Duration::from_secs(pauses as u64));
        }
    }

    #[test]
    fn fails_when_pauses_exceed_timeout() {
        for (pauses, timeout) in [(1, 0), (2, 1), (61, 60)] {
            let clock = Arc::new(ManualClock::new());
            let poller = ElementPoller::new(clock.clone());
            let found = poller.wait_for(
                &late(pauses),
                "wnd[0]/usr/txtDONE",
                Duration::from_secs(timeout),
            );
            assert!(!found, "{pauses} pauses within {timeout}s");
            assert!(clock.elapsed() <= Duration::from_secs(timeout));
        }
    }

    #[test]
    fn default_timeout_is_sixty_seconds() {
        let clock = Arc::new(ManualClock::new());
        let poller = ElementPoller::new(clock.clone());
        let source = late(usize::MAX);
        assert!(!poller.wait_for_default(&source, "wnd[0]/usr/txtDONE"));
        assert_eq!(clock.elapsed(), DEFAULT_WAIT_TIMEOUT);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let poller = ElementPoller::new(Arc::new(ManualClock::new())).with_interval(Duration::ZERO);
        assert_eq!(poller.interval(), MIN_POLL_INTERVAL);
    }
}

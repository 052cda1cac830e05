use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use super::clock::Clock;

struct WindowState {
    count: u32,
    window_start: Instant,
}

/// Fixed-window limiter shared by every outbound summarization call of a
/// process. Callers are served one at a time.
pub struct RateGovernor {
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<WindowState>,
}

impl RateGovernor {
    pub fn new(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let window_start = clock.now();
        Self {
            max_requests: max_requests.max(1),
            window,
            clock,
            state: Mutex::new(WindowState {
                count: 0,
                window_start,
            }),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits until one more request fits in the current window, then
    /// counts it.
    pub async fn acquire(&self) {
        // Held across the sleep so waiting callers queue behind this one.
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(state.window_start);

        if elapsed >= self.window {
            state.count = 0;
            state.window_start = now;
        } else if state.count >= self.max_requests {
            let wait = self.window - elapsed;
            debug!(
                "[RATE-GOVERNOR] window full ({} requests), waiting {:?}",
                state.count, wait
            );
            self.clock.sleep(wait).await;
            state.count = 0;
            state.window_start = self.clock.now();
        }

        state.count += 1;
    }
}

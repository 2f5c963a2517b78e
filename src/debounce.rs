//! Redirect debouncing for simultaneous auth failures

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_REDIRECT_COOLDOWN: Duration = Duration::from_millis(1000);

#[derive(Default)]
struct DebounceState {
    last_alert: Option<Instant>,
    shown: bool,
    redirecting: bool,
}

/// Lets one "no permission" alert through per cooldown window
///
/// Once an alert fires, both flags stay set until [`RedirectDebouncer::reset`]
/// (history navigation), so later failures are suppressed even after the
/// cooldown has elapsed.
pub struct RedirectDebouncer {
    cooldown: Duration,
    state: Mutex<DebounceState>,
}

impl RedirectDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            state: Mutex::new(DebounceState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True for the caller allowed to alert and redirect
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut state = self.lock();

        let cooled_down = state
            .last_alert
            .map_or(true, |last| now.duration_since(last) >= self.cooldown);
        if !cooled_down || state.shown || state.redirecting {
            return false;
        }

        state.last_alert = Some(now);
        state.shown = true;
        state.redirecting = true;
        true
    }

    /// Clear the flags after back/forward navigation
    pub fn reset(&self) {
        let mut state = self.lock();
        state.shown = false;
        state.redirecting = false;
    }
}

impl Default for RedirectDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_REDIRECT_COOLDOWN)
    }
}

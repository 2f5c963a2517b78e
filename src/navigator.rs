//! Login-boundary side effects: the blocking alert and the hard redirect

use crate::debounce::RedirectDebouncer;
use crate::error::PERMISSION_DENIED_MESSAGE;
use std::sync::Arc;
use tracing::{info, warn};

/// Host hooks for leaving the authenticated area
///
/// `redirect` is a full navigation, not a client-side route change, so the
/// host discards all in-memory state.
pub trait Navigator: Send + Sync + 'static {
    fn alert(&self, message: &str);

    fn redirect(&self, location: &str);
}

/// Navigator that only records the events in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn alert(&self, message: &str) {
        warn!(alert = message, "Session alert");
    }

    fn redirect(&self, location: &str) {
        info!(location, "Redirecting to login boundary");
    }
}

/// Debounced "no permission" alert plus login redirect
pub struct AuthFailureNotifier {
    navigator: Arc<dyn Navigator>,
    debouncer: RedirectDebouncer,
    login_path: String,
}

impl AuthFailureNotifier {
    pub fn new(
        navigator: Arc<dyn Navigator>,
        debouncer: RedirectDebouncer,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            navigator,
            debouncer,
            login_path: login_path.into(),
        }
    }

    /// Alert and redirect unless another failure already did within the window.
    /// Returns whether this call fired.
    pub fn notify(&self) -> bool {
        if !self.debouncer.try_acquire() {
            return false;
        }
        self.navigator.alert(PERMISSION_DENIED_MESSAGE);
        self.navigator.redirect(&self.login_path);
        true
    }

    /// Redirect unconditionally, for an explicit logout
    pub fn redirect_now(&self) {
        self.navigator.redirect(&self.login_path);
    }

    /// Back/forward navigation happened
    pub fn reset(&self) {
        self.debouncer.reset();
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}

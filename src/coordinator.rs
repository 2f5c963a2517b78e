//! Single-flight token refresh coordination
//!
//! A request that fails authentication calls [`RefreshCoordinator::begin`].
//! The first caller while idle becomes the [`RefreshLeader`] and performs the
//! refresh; every caller arriving while a refresh is outstanding receives a
//! [`PendingRequest`] queued in arrival order. When the leader completes, the
//! queue is drained front to back with the outcome and the coordinator is
//! idle again.
//!
//! The idle check and the transition to refreshing happen under one lock, so
//! no two callers can both observe idle.

use crate::error::{ClientError, Result};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

/// Outcome fanned out to queued requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshSignal {
    /// New access token, `Bearer` form
    Refreshed(String),
    Failed(String),
    /// The leader went away before finishing
    Abandoned,
}

#[derive(Default)]
struct State {
    refreshing: bool,
    queue: VecDeque<oneshot::Sender<RefreshSignal>>,
}

#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

/// Role handed to a request that needs a refresh
pub enum Ticket {
    Leader(RefreshLeader),
    Follower(PendingRequest),
}

impl RefreshCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Either start a refresh or join the one in flight
    pub fn begin(self: &Arc<Self>) -> Ticket {
        let mut state = self.lock();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(tx);
            debug!(pending = state.queue.len(), "Refresh in flight, request queued");
            Ticket::Follower(PendingRequest { rx })
        } else {
            state.refreshing = true;
            debug!("Starting token refresh");
            Ticket::Leader(RefreshLeader {
                coordinator: Arc::clone(self),
                settled: false,
            })
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Queued requests that have not been cancelled
    pub fn pending(&self) -> usize {
        self.lock().queue.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Back to idle, then deliver `signal` to every queued request in order.
    /// Returns how many requests were still waiting.
    fn settle(&self, signal: RefreshSignal) -> usize {
        let queue = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.queue)
        };

        queue
            .into_iter()
            .filter_map(|tx| tx.send(signal.clone()).ok())
            .count()
    }
}

/// Owner of the single outstanding refresh
///
/// Dropping it without calling [`RefreshLeader::complete`] releases the
/// queue with [`RefreshSignal::Abandoned`].
#[must_use = "queued requests wait until the leader completes"]
pub struct RefreshLeader {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl RefreshLeader {
    /// Finish the refresh, resolving (`Ok(token)`) or rejecting (`Err(reason)`)
    /// every queued request
    pub fn complete(mut self, result: std::result::Result<String, String>) -> usize {
        self.settled = true;
        let signal = match result {
            Ok(token) => RefreshSignal::Refreshed(token),
            Err(reason) => RefreshSignal::Failed(reason),
        };
        let delivered = self.coordinator.settle(signal);
        debug!(delivered, "Token refresh settled");
        delivered
    }
}

impl Drop for RefreshLeader {
    fn drop(&mut self) {
        if !self.settled {
            let delivered = self.coordinator.settle(RefreshSignal::Abandoned);
            debug!(delivered, "Token refresh abandoned");
        }
    }
}

/// A request parked until the in-flight refresh settles
///
/// Resolves to the new access token. Dropping it cancels the wait.
pub struct PendingRequest {
    rx: oneshot::Receiver<RefreshSignal>,
}

impl Future for PendingRequest {
    type Output = Result<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|signal| match signal {
            Ok(RefreshSignal::Refreshed(token)) => Ok(token),
            Ok(RefreshSignal::Failed(reason)) => Err(ClientError::RefreshFailed(reason)),
            Ok(RefreshSignal::Abandoned) | Err(_) => Err(ClientError::Cancelled),
        })
    }
}

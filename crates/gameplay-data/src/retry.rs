//! Retry engine: shared client state, drain passes and the background worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gamekit_types::ResultCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::queue::RetryQueue;
use crate::transport::{CallOptions, CallResponse, GameplayDataTransport, TransportError};
use crate::types::{ApiCall, CONNECTION_CLIENT, ClientSettings, GameplayDataEvent, RetryStrategy};

/// Longest wait, as a multiple of the retry interval.
const MAX_BACKOFF_MULTIPLIER_SHIFT: u32 = 6;

/// Wait before the next worker pass after `failures` consecutive failed passes.
pub fn retry_delay(settings: &ClientSettings, failures: u32) -> Duration {
    let interval = settings.retry_interval();
    match settings.retry_strategy {
        RetryStrategy::Constant => interval,
        RetryStrategy::Exponential => {
            let shift = failures
                .min(settings.max_exponential_retry_threshold)
                .min(MAX_BACKOFF_MULTIPLIER_SHIFT);
            interval.saturating_mul(1 << shift)
        }
    }
}

/// Result of one pass over the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    pub succeeded: usize,
    pub dropped: usize,
    pub remaining: usize,
    /// False if the pass stopped on a network failure.
    pub reached_backend: bool,
}

impl DrainOutcome {
    /// Everything that was queued has been dealt with.
    pub fn is_complete(&self) -> bool {
        self.reached_backend && self.remaining == 0
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the client and its retry worker.
pub(crate) struct RetryCore {
    transport: Arc<dyn GameplayDataTransport>,
    pub(crate) settings: Mutex<ClientSettings>,
    pub(crate) queue: Mutex<RetryQueue>,
    healthy: AtomicBool,
    events_tx: mpsc::Sender<GameplayDataEvent>,
    /// Serializes drain passes and live writes, so queued and live
    /// calls reach the backend in submission order.
    pub(crate) drain_lock: tokio::sync::Mutex<()>,
}

impl RetryCore {
    pub(crate) fn new(
        transport: Arc<dyn GameplayDataTransport>,
        settings: ClientSettings,
        events_tx: mpsc::Sender<GameplayDataEvent>,
    ) -> Self {
        let queue = RetryQueue::new(settings.max_retry_queue_size as usize);
        Self {
            transport,
            settings: Mutex::new(settings),
            queue: Mutex::new(queue),
            healthy: AtomicBool::new(true),
            events_tx,
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Records network health, emitting an event only on transitions.
    pub(crate) fn set_healthy(&self, healthy: bool) {
        let previous = self.healthy.swap(healthy, Ordering::SeqCst);
        if previous != healthy {
            info!(is_connection_ok = healthy, "network status changed");
            self.emit(GameplayDataEvent::NetworkStatusChanged {
                is_connection_ok: healthy,
                connection_client: CONNECTION_CLIENT.to_string(),
            });
        }
    }

    pub(crate) fn emit(&self, event: GameplayDataEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!("gameplay data event not delivered: {e}");
        }
    }

    pub(crate) fn report_dropped(&self, call: ApiCall) {
        warn!(
            call = %call.id,
            kind = ?call.kind,
            bundle = %call.bundle_name,
            attempts = call.attempts,
            "dropping queued call"
        );
        self.emit(GameplayDataEvent::CallDropped {
            call,
            result: ResultCode::UserGameplayDataApiCallDropped,
        });
    }

    /// Appends a call to the queue, reporting any eviction.
    pub(crate) fn enqueue(&self, call: ApiCall) {
        debug!(call = %call.id, kind = ?call.kind, "enqueueing call for retry");
        let evicted = lock(&self.queue).push(call);
        if let Some(old) = evicted {
            self.report_dropped(old);
        }
    }

    /// Runs one call against the transport with the configured timeout.
    pub(crate) async fn call(&self, call: &ApiCall) -> Result<CallResponse, TransportError> {
        let (timeout, options) = {
            let s = lock(&self.settings);
            (
                s.client_timeout(),
                CallOptions {
                    pagination_size: s.pagination_size,
                },
            )
        };
        match tokio::time::timeout(timeout, self.transport.execute(call, options)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    /// Replays queued calls oldest-first until the queue is empty or the
    /// network fails.
    ///
    /// Rejected calls and calls out of retries are dropped so they cannot
    /// block the calls behind them.
    pub(crate) async fn drain_pass(&self) -> DrainOutcome {
        let _guard = self.drain_lock.lock().await;
        let max_retries = lock(&self.settings).max_retries;
        let mut outcome = DrainOutcome {
            succeeded: 0,
            dropped: 0,
            remaining: 0,
            reached_backend: true,
        };

        loop {
            let Some(call) = lock(&self.queue).front().cloned() else {
                break;
            };

            match self.call(&call).await {
                Ok(_) => {
                    lock(&self.queue).remove(call.id);
                    outcome.succeeded += 1;
                    self.set_healthy(true);
                }
                Err(e) if e.is_network() => {
                    self.set_healthy(false);
                    outcome.reached_backend = false;
                    let exhausted = {
                        let mut queue = lock(&self.queue);
                        let attempts = queue.get_mut(call.id).map(|c| {
                            c.attempts += 1;
                            c.attempts
                        });
                        match attempts {
                            Some(n) if n >= max_retries => queue.remove(call.id),
                            _ => None,
                        }
                    };
                    if let Some(dropped) = exhausted {
                        self.report_dropped(dropped);
                        outcome.dropped += 1;
                    }
                    debug!(call = %call.id, error = %e, "retry failed, stopping pass");
                    break;
                }
                Err(e) => {
                    self.set_healthy(true);
                    warn!(call = %call.id, error = %e, "queued call rejected");
                    let removed = lock(&self.queue).remove(call.id);
                    if let Some(dropped) = removed {
                        self.report_dropped(dropped);
                        outcome.dropped += 1;
                    }
                }
            }
        }

        outcome.remaining = lock(&self.queue).len();
        outcome
    }
}

/// Background retry loop. Runs until `cancel` fires.
pub(crate) async fn run_worker(core: Arc<RetryCore>, cancel: CancellationToken) {
    info!("retry worker started");
    let mut failures: u32 = 0;
    loop {
        let delay = retry_delay(&lock(&core.settings), failures);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        if lock(&core.queue).is_empty() {
            failures = 0;
            continue;
        }

        let outcome = core.drain_pass().await;
        if outcome.reached_backend {
            failures = 0;
        } else {
            failures = failures.saturating_add(1);
            debug!(failures, remaining = outcome.remaining, "retry pass failed");
        }
    }
    info!("retry worker stopped");
}

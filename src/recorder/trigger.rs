//! Periodic tick trigger
//!
//! A timer task enqueues one request per period and a single worker drains
//! the queue in order, so a slow tick never delays the schedule and ticks
//! never overlap. Stopping cancels both tasks and joins them; a tick already
//! running is allowed to finish.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

/// Trigger-related errors
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Trigger period must be positive")]
    ZeroPeriod,
}

/// Read-only view of how many ticks are queued but not yet started
#[derive(Debug, Clone, Default)]
pub struct QueueDepth(Arc<AtomicUsize>);

impl QueueDepth {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fires a callback on a fixed cadence until stopped
pub struct PeriodicTrigger {
    period: Duration,
    token: CancellationToken,
    pending: QueueDepth,
    timer: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PeriodicTrigger {
    /// Start invoking `tick` every `period`, first invocation one period from now.
    ///
    /// Returning [`ControlFlow::Break`] from `tick` stops the trigger from the
    /// inside; queued ticks are discarded.
    pub fn start<F, Fut>(period: Duration, mut tick: F) -> Result<Self, TriggerError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if period.is_zero() {
            return Err(TriggerError::ZeroPeriod);
        }

        let token = CancellationToken::new();
        let pending = QueueDepth::default();
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let first = Instant::now() + period;
        let timer_token = token.clone();
        let timer_pending = pending.clone();
        let timer = tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            loop {
                tokio::select! {
                    _ = timer_token.cancelled() => break,
                    _ = ticker.tick() => {
                        timer_pending.0.fetch_add(1, Ordering::SeqCst);
                        if tx.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let worker_token = token.clone();
        let worker_pending = pending.clone();
        let worker = tokio::spawn(async move {
            loop {
                let request = tokio::select! {
                    biased;
                    _ = worker_token.cancelled() => None,
                    request = rx.recv() => request,
                };
                if request.is_none() {
                    break;
                }
                worker_pending.0.fetch_sub(1, Ordering::SeqCst);

                let backlog = worker_pending.get();
                if backlog > 0 {
                    tracing::debug!("Tick started with {} more queued", backlog);
                }

                if tick().await.is_break() {
                    worker_token.cancel();
                    break;
                }
            }
        });

        tracing::debug!("Periodic trigger started every {:?}", period);

        Ok(Self {
            period,
            token,
            pending,
            timer: Some(timer),
            worker: Some(worker),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn queue_depth(&self) -> QueueDepth {
        self.pending.clone()
    }

    /// Whether ticks may still be started
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.token.is_cancelled()
    }

    /// Stop the trigger and wait for an in-flight tick to finish.
    ///
    /// Once this returns no further tick will start. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.token.cancel();

        for handle in [self.timer.take(), self.worker.take()].into_iter().flatten() {
            if let Err(e) = handle.await {
                tracing::error!("Trigger task failed: {}", e);
            }
        }

        self.pending.0.store(0, Ordering::SeqCst);
    }
}

impl Drop for PeriodicTrigger {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

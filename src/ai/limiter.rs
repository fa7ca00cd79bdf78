//! Outbound Rate Limiter
//!
//! A single process-wide concurrency gate over the whole AI call surface.
//! At most N tasks run at once; the rest queue in arrival order and are
//! released as capacity frees. The limiter imposes no timeout of its own -
//! queued tasks wait for capacity, bounded in practice by the caller's
//! request-level deadline.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::error;

pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run `task` once a slot is free. Tokio's semaphore is FIFO-fair, so
    /// admission follows arrival order.
    pub async fn schedule<T>(&self, task: impl Future<Output = T>) -> T {
        // The semaphore is never closed; if acquisition fails anyway, run
        // ungated rather than wedging the request
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                error!(error = %e, "Rate limiter semaphore closed; running ungated");
                None
            }
        };
        task.await
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Slots currently free (diagnostics)
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_schedule_runs_task() {
        let limiter = RateLimiter::new(2);
        let result = limiter.schedule(async { 41 + 1 }).await;
        assert_eq!(result, 42);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_holds() {
        let limiter = Arc::new(RateLimiter::new(3));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..12 {
            let limiter = Arc::clone(&limiter);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_zero_capacity_clamped_to_one() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.max_concurrent(), 1);
        let result = limiter.schedule(async { "ran" }).await;
        assert_eq!(result, "ran");
    }
}

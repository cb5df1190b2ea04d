// Request pacing for remote judges with a hard QPS quota.
//
// Perspective's free tier allows one query per second. Each caller reserves the
// next free slot under a short lock, then sleeps outside it, so concurrent
// requests queue up one interval apart instead of contending for the lock.
// Dropping the returned future (request cancelled) gives up the wait but not
// the reserved slot.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Allow at most `requests_per_second` requests per second.
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / requests_per_second),
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait for this caller's slot. Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        let now = Instant::now();
        if slot > now {
            tokio::time::sleep_until(slot).await;
            slot - now
        } else {
            Duration::ZERO
        }
    }
}

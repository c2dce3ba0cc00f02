//! Countdown bound to one active attempt.
//!
//! A background task decrements the remaining seconds once per elapsed
//! second and publishes the value on a watch channel. The owner polls
//! [`Countdown::next_event`] to observe ticks and the single expiry.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// Something the countdown reports to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// One second elapsed; the value is the remaining time in seconds.
    Tick(u64),
    /// The countdown reached zero. Reported exactly once.
    Expired,
}

/// A ticking countdown. Dropping it disarms it.
pub struct Countdown {
    total_secs: u64,
    remaining: watch::Receiver<u64>,
    task: Option<JoinHandle<()>>,
    fired: bool,
}

impl Countdown {
    /// Start counting down from `total_secs`.
    pub fn start(total_secs: u64) -> Self {
        let (tx, rx) = watch::channel(total_secs);
        let task = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = interval_at(Instant::now() + period, period);
            let mut remaining = total_secs;
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                if tx.send(remaining).is_err() {
                    break;
                }
            }
        });

        tracing::debug!(total_secs, "countdown armed");
        Self {
            total_secs,
            remaining: rx,
            task: Some(task),
            fired: false,
        }
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    /// Seconds left. Never negative, never increases.
    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Whether the countdown can still produce events.
    pub fn is_armed(&self) -> bool {
        self.task.is_some() && !self.fired
    }

    /// Cancel the countdown. No events are produced afterwards.
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(remaining = self.remaining(), "countdown disarmed");
        }
    }

    /// Wait for the next tick or the expiry.
    ///
    /// Pending forever once the countdown is disarmed or has expired, so it
    /// can sit in a `select!` next to other branches. Cancel safe.
    pub async fn next_event(&mut self) -> CountdownEvent {
        if !self.is_armed() {
            return std::future::pending().await;
        }
        let current = *self.remaining.borrow();
        if current > 0 && self.remaining.changed().await.is_err() {
            return std::future::pending().await;
        }

        let now = *self.remaining.borrow_and_update();
        if now == 0 {
            self.fired = true;
            self.disarm();
            CountdownEvent::Expired
        } else {
            CountdownEvent::Tick(now)
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_strictly_decrease_then_expire_once() {
        let start = Instant::now();
        let mut countdown = Countdown::start(5);
        assert_eq!(countdown.remaining(), 5);

        let mut ticks = Vec::new();
        loop {
            match countdown.next_event().await {
                CountdownEvent::Tick(n) => ticks.push(n),
                CountdownEvent::Expired => break,
            }
        }

        assert_eq!(ticks, vec![4, 3, 2, 1]);
        assert_eq!(countdown.remaining(), 0);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(!countdown.is_armed());

        // Expiry is never reported twice.
        let again = tokio::time::timeout(Duration::from_secs(30), countdown.next_event()).await;
        assert!(again.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_stops_all_events() {
        let mut countdown = Countdown::start(10);
        assert_eq!(countdown.next_event().await, CountdownEvent::Tick(9));

        countdown.disarm();
        assert!(!countdown.is_armed());

        let next = tokio::time::timeout(Duration::from_secs(60), countdown.next_event()).await;
        assert!(next.is_err());
        assert_eq!(countdown.remaining(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_length_countdown_expires_immediately() {
        let mut countdown = Countdown::start(0);
        assert_eq!(countdown.next_event().await, CountdownEvent::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_tracks_elapsed_time_without_polling() {
        let countdown = Countdown::start(900);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(countdown.remaining(), 898);
    }
}

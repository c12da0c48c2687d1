//! Retransmission timer.
//!
//! Reliable delivery requires that unacknowledged segments are re-sent if no
//! acknowledgement arrives within a bounded time.  [`RetransmitTimer`] is a
//! single restartable deadline tied to the oldest unacknowledged segment of
//! one session.
//!
//! The timer never spins and owns no task.  It stores an optional deadline;
//! the event loop awaits [`RetransmitTimer::expired`] inside `tokio::select!`
//! next to the socket receive, so expiry and acknowledgements are handled by
//! the same flow of control.  A `stop()` issued before the loop polls
//! `expired()` again is therefore always authoritative.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// A one-shot countdown that can be armed, disarmed and re-armed.
#[derive(Debug)]
pub struct RetransmitTimer {
    duration: Duration,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    /// Create a disarmed timer that counts down `duration` once started.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            deadline: None,
        }
    }

    /// Arm a fresh countdown, replacing any pending one.
    pub fn start(&mut self) {
        self.deadline = Some(Instant::now() + self.duration);
    }

    /// Disarm without firing.  Stopping a stopped timer is a no-op.
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Equivalent to `stop()` followed by `start()`.
    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Resolves when the armed deadline passes.
    ///
    /// Pending forever while the timer is disarmed, which makes the branch
    /// inert inside `select!`.  Completing does not disarm the timer; the
    /// caller decides whether to restart or stop it.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_timer_is_disarmed() {
        let t = RetransmitTimer::new(Duration::from_secs(5));
        assert!(!t.is_armed());
        assert_eq!(t.duration(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn start_and_stop_toggle_armed() {
        let mut t = RetransmitTimer::new(Duration::from_secs(5));
        t.start();
        assert!(t.is_armed());
        t.stop();
        assert!(!t.is_armed());
        // Idempotent.
        t.stop();
        assert!(!t.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_duration() {
        let mut t = RetransmitTimer::new(Duration::from_secs(5));
        t.start();
        let before = Instant::now();
        t.expired().await;
        assert!(Instant::now() - before >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_fires() {
        let t = RetransmitTimer::new(Duration::from_millis(10));
        let fired = tokio::time::timeout(Duration::from_secs(60), t.expired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_pushes_deadline_back() {
        let mut t = RetransmitTimer::new(Duration::from_secs(5));
        t.start();
        tokio::time::advance(Duration::from_secs(4)).await;
        t.restart();

        let early = tokio::time::timeout(Duration::from_secs(3), t.expired()).await;
        assert!(early.is_err(), "restart should have moved the deadline");

        let late = tokio::time::timeout(Duration::from_secs(3), t.expired()).await;
        assert!(late.is_ok());
    }
}

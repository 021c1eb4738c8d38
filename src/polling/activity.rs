use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// A single sign of user presence (key press, pointer movement, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityPulse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    Active,
    Inactive,
}

/// Debounced edge detector over activity pulses.
///
/// The inactivity timer is armed on construction and restarted by every
/// pulse. When it elapses the monitor reports `Inactive` once; the next pulse
/// reports `Active`. Pulses in between are absorbed.
pub struct ActivityMonitor {
    timeout: Duration,
    timer: Pin<Box<Sleep>>,
    armed: bool,
    inactive: bool,
}

impl ActivityMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            timer: Box::pin(tokio::time::sleep(timeout)),
            armed: true,
            inactive: false,
        }
    }

    /// Records a pulse and restarts the inactivity timer.
    pub fn pulse(&mut self) -> Option<ActivityEvent> {
        self.timer.as_mut().reset(Instant::now() + self.timeout);
        self.armed = true;

        if self.inactive {
            self.inactive = false;
            tracing::debug!("User activity resumed");
            Some(ActivityEvent::Active)
        } else {
            None
        }
    }

    /// Restarts the timer and forgets an unreported expiry. Used when an
    /// `Inactive` arrived before there was anything to pause.
    pub fn rearm(&mut self) {
        self.timer.as_mut().reset(Instant::now() + self.timeout);
        self.armed = true;
        self.inactive = false;
    }

    /// Resolves with `Inactive` when the timer elapses. Pending forever while
    /// the timer is disarmed, so it can sit in a `select!` unconditionally.
    pub fn expired(&mut self) -> impl Future<Output = ActivityEvent> + '_ {
        async move {
            if !self.armed {
                std::future::pending::<()>().await;
            }
            self.timer.as_mut().await;
            self.armed = false;
            self.inactive = true;
            tracing::debug!(timeout_secs = self.timeout.as_secs(), "User inactive");
            ActivityEvent::Inactive
        }
    }
}

//! Pure transition function for the polling lifecycle.
//!
//! `PollingState::apply` maps `(state, event, now)` to the next state with no
//! timers or I/O involved; the controller feeds it events one at a time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PollingPhase {
    Idle,
    InitialFetch,
    Polling,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollingEvent {
    StartPolling { interval: Duration, max_polls: u32 },
    Poll,
    FetchSuccess,
    FetchError(String),
    StopPolling,
    ManualRefresh,
    UserInactive,
    UserActive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollingState {
    pub phase: PollingPhase,
    pub poll_count: u32,
    pub max_polls: u32,
    pub interval: Duration,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for PollingState {
    fn default() -> Self {
        Self {
            phase: PollingPhase::Idle,
            poll_count: 0,
            max_polls: 3,
            interval: Duration::from_secs(15 * 60),
            last_fetch_time: None,
            error: None,
        }
    }
}

impl PollingState {
    pub fn apply(&self, event: &PollingEvent, now: DateTime<Utc>) -> PollingState {
        use PollingEvent as E;
        use PollingPhase as P;

        let mut next = self.clone();
        match (self.phase, event) {
            (P::Idle, E::StartPolling { interval, max_polls }) => {
                next.phase = P::InitialFetch;
                next.interval = (*interval).max(Duration::from_millis(1));
                next.max_polls = (*max_polls).max(1);
                next.poll_count = 0;
                next.error = None;
            }

            (P::InitialFetch | P::Polling, E::FetchSuccess) => {
                next.phase = P::Polling;
                next.last_fetch_time = Some(now);
                next.error = None;
            }
            (P::InitialFetch | P::Polling | P::Paused, E::FetchError(error)) => {
                next.phase = P::Paused;
                next.error = Some(error.clone());
            }

            (P::Polling, E::Poll) if self.poll_count >= self.max_polls => {
                next.phase = P::Paused;
            }
            (P::Polling, E::Poll) => {
                next.poll_count += 1;
            }

            (P::Polling, E::UserInactive) => next.phase = P::Paused,
            (P::Paused, E::UserActive) => next.phase = P::Polling,

            (P::Paused, E::ManualRefresh) => {
                next.phase = P::Polling;
                next.poll_count = 0;
                next.error = None;
                next.last_fetch_time = Some(now);
            }

            (P::InitialFetch | P::Polling | P::Paused, E::StopPolling) => next.phase = P::Idle,

            _ => {}
        }
        next
    }

    /// Paused by the poll budget rather than by an error.
    pub fn is_budget_exhausted(&self) -> bool {
        self.phase == PollingPhase::Paused
            && self.error.is_none()
            && self.poll_count >= self.max_polls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(state: PollingState, events: &[PollingEvent]) -> PollingState {
        events
            .iter()
            .fold(state, |state, event| state.apply(event, Utc::now()))
    }

    fn start(max_polls: u32) -> PollingEvent {
        PollingEvent::StartPolling {
            interval: Duration::from_millis(900_000),
            max_polls,
        }
    }

    fn polling(max_polls: u32) -> PollingState {
        run(
            PollingState::default(),
            &[start(max_polls), PollingEvent::FetchSuccess],
        )
    }

    #[test]
    fn test_start_enters_initial_fetch() {
        let state = run(PollingState::default(), &[start(5)]);
        assert_eq!(state.phase, PollingPhase::InitialFetch);
        assert_eq!(state.max_polls, 5);
        assert_eq!(state.interval, Duration::from_millis(900_000));
        assert_eq!(state.poll_count, 0);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_start_clamps_parameters() {
        let state = PollingState::default().apply(
            &PollingEvent::StartPolling {
                interval: Duration::ZERO,
                max_polls: 0,
            },
            Utc::now(),
        );
        assert_eq!(state.max_polls, 1);
        assert!(state.interval > Duration::ZERO);
    }

    #[test]
    fn test_initial_fetch_outcomes() {
        let state = polling(3);
        assert_eq!(state.phase, PollingPhase::Polling);
        assert!(state.last_fetch_time.is_some());

        let state = run(
            PollingState::default(),
            &[start(3), PollingEvent::FetchError("boom".into())],
        );
        assert_eq!(state.phase, PollingPhase::Paused);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(state.last_fetch_time.is_none());
        assert!(!state.is_budget_exhausted());
    }

    #[test]
    fn test_budget_scenario() {
        let mut state = polling(3);
        assert_eq!(state.poll_count, 0);

        for expected in 1..=3 {
            state = state.apply(&PollingEvent::Poll, Utc::now());
            assert_eq!(state.phase, PollingPhase::Polling);
            assert_eq!(state.poll_count, expected);
        }

        state = state.apply(&PollingEvent::Poll, Utc::now());
        assert_eq!(state.phase, PollingPhase::Paused);
        assert_eq!(state.poll_count, 3);
        assert!(state.is_budget_exhausted());

        state = state.apply(&PollingEvent::Poll, Utc::now());
        assert_eq!(state.poll_count, 3);
        assert_eq!(state.phase, PollingPhase::Paused);

        state = state.apply(&PollingEvent::ManualRefresh, Utc::now());
        assert_eq!(state.phase, PollingPhase::Polling);
        assert_eq!(state.poll_count, 0);
    }

    #[test]
    fn test_inactivity_overrides_remaining_budget() {
        let state = run(polling(10), &[PollingEvent::Poll, PollingEvent::UserInactive]);
        assert_eq!(state.phase, PollingPhase::Paused);
        assert_eq!(state.poll_count, 1);
        assert!(!state.is_budget_exhausted());
    }

    #[test]
    fn test_manual_refresh_clears_error_and_budget() {
        let state = run(
            polling(2),
            &[
                PollingEvent::Poll,
                PollingEvent::Poll,
                PollingEvent::FetchError("502".into()),
            ],
        );
        assert_eq!(state.phase, PollingPhase::Paused);
        assert_eq!(state.poll_count, 2);

        let state = state.apply(&PollingEvent::ManualRefresh, Utc::now());
        assert_eq!(state.phase, PollingPhase::Polling);
        assert_eq!(state.poll_count, 0);
        assert!(state.error.is_none());
        assert!(state.last_fetch_time.is_some());
    }

    #[test]
    fn test_activity_resumes_without_touching_counters() {
        let paused = run(polling(5), &[PollingEvent::Poll, PollingEvent::UserInactive]);
        let resumed = paused.apply(&PollingEvent::UserActive, Utc::now());

        assert_eq!(resumed.phase, PollingPhase::Polling);
        assert_eq!(resumed.poll_count, paused.poll_count);
        assert_eq!(resumed.last_fetch_time, paused.last_fetch_time);
    }

    #[test]
    fn test_stop_from_every_active_phase() {
        for prefix in [
            vec![start(3)],
            vec![start(3), PollingEvent::FetchSuccess],
            vec![start(3), PollingEvent::FetchError("x".into())],
        ] {
            let state = run(PollingState::default(), &prefix);
            let stopped = state.apply(&PollingEvent::StopPolling, Utc::now());
            assert_eq!(stopped.phase, PollingPhase::Idle);
        }
    }

    #[test]
    fn test_idle_ignores_fetch_outcomes() {
        let idle = run(polling(3), &[PollingEvent::StopPolling]);
        let after = run(
            idle.clone(),
            &[
                PollingEvent::FetchSuccess,
                PollingEvent::FetchError("late".into()),
                PollingEvent::Poll,
                PollingEvent::UserActive,
            ],
        );
        assert_eq!(after, idle);
    }

    #[test]
    fn test_ignored_events_leave_state_unchanged() {
        let paused = run(polling(3), &[PollingEvent::UserInactive]);
        assert_eq!(paused.apply(&PollingEvent::FetchSuccess, Utc::now()), paused);
        assert_eq!(paused.apply(&PollingEvent::UserInactive, Utc::now()), paused);

        let active = polling(3);
        assert_eq!(active.apply(&PollingEvent::UserActive, Utc::now()), active);
        assert_eq!(active.apply(&PollingEvent::ManualRefresh, Utc::now()), active);
        assert_eq!(active.apply(&start(9), Utc::now()), active);
    }

    #[test]
    fn test_failed_refresh_while_paused_records_error() {
        let paused = run(polling(3), &[PollingEvent::UserInactive]);
        let state = paused.apply(&PollingEvent::FetchError("gateway".into()), Utc::now());
        assert_eq!(state.phase, PollingPhase::Paused);
        assert_eq!(state.error.as_deref(), Some("gateway"));
    }
}

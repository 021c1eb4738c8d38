use crate::core::models::PollingParams;
use crate::polling::activity::{ActivityEvent, ActivityMonitor, ActivityPulse};
use crate::polling::machine::{PollingEvent, PollingPhase, PollingState};
use crate::polling::target::{PollKind, PollTarget};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

enum Command {
    ManualRefresh(oneshot::Sender<PollingState>),
    Stop,
}

type FetchOutcome = (u64, PollKind, Result<(), String>);

/// Handle to a running polling loop.
///
/// The loop runs as one task that owns the [`PollingState`], the poll timer
/// and the inactivity timer, and handles one event at a time. [`stop`] returns
/// once both timers are gone; dropping the handle aborts the task.
///
/// Parameters are fixed for the lifetime of a controller. Config changes take
/// effect when the next controller is spawned.
///
/// [`stop`]: PollingController::stop
pub struct PollingController {
    params: PollingParams,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<PollingState>,
    task: JoinHandle<()>,
}

impl PollingController {
    pub fn spawn(
        target: Arc<dyn PollTarget>,
        params: PollingParams,
        pulses: mpsc::UnboundedReceiver<ActivityPulse>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(PollingState::default());

        let actor = PollingActor {
            target,
            params,
            state: PollingState::default(),
            status: status_tx,
            fetches: JoinSet::new(),
            next_fetch_id: 0,
            manual_replies: HashMap::new(),
        };
        let task = tokio::spawn(actor.run(command_rx, pulses));

        Self {
            params,
            commands,
            status,
            task,
        }
    }

    pub fn params(&self) -> PollingParams {
        self.params
    }

    pub fn status(&self) -> PollingState {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollingState> {
        self.status.clone()
    }

    /// Fetches now and resolves with the state after the outcome is applied.
    pub async fn manual_refresh(&self) -> PollingState {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::ManualRefresh(reply_tx)).is_err() {
            return self.status();
        }
        match reply_rx.await {
            Ok(state) => state,
            Err(_) => self.status(),
        }
    }

    pub async fn stop(mut self) -> PollingState {
        let _ = self.commands.send(Command::Stop);
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Polling task ended abnormally");
            }
        }
        self.status()
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct PollingActor {
    target: Arc<dyn PollTarget>,
    params: PollingParams,
    state: PollingState,
    status: watch::Sender<PollingState>,
    fetches: JoinSet<FetchOutcome>,
    next_fetch_id: u64,
    manual_replies: HashMap<u64, oneshot::Sender<PollingState>>,
}

impl PollingActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut pulses: mpsc::UnboundedReceiver<ActivityPulse>,
    ) {
        self.dispatch(PollingEvent::StartPolling {
            interval: self.params.interval,
            max_polls: self.params.max_polls,
        });
        tracing::info!(
            resource = %self.target.describe(),
            interval_secs = self.state.interval.as_secs(),
            max_polls = self.state.max_polls,
            inactivity_timeout_secs = self.params.inactivity_timeout.as_secs(),
            "Polling started"
        );
        self.issue_fetch(PollKind::Initial, None);

        let period = self.state.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut activity = ActivityMonitor::new(self.params.inactivity_timeout);
        let mut pulses_open = true;

        loop {
            let was_polling = self.state.phase == PollingPhase::Polling;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::ManualRefresh(reply)) => {
                        tracing::info!(
                            resource = %self.target.describe(),
                            "Manual refresh requested"
                        );
                        self.issue_fetch(PollKind::Manual, Some(reply));
                    }
                    Some(Command::Stop) | None => break,
                },
                _ = ticker.tick(), if self.state.phase == PollingPhase::Polling => {
                    self.dispatch(PollingEvent::Poll);
                    if self.state.phase == PollingPhase::Polling {
                        self.issue_fetch(PollKind::Scheduled, None);
                    } else {
                        tracing::info!(
                            resource = %self.target.describe(),
                            poll_count = self.state.poll_count,
                            "Poll budget exhausted, pausing"
                        );
                    }
                }
                pulse = pulses.recv(), if pulses_open => match pulse {
                    Some(ActivityPulse) => {
                        if let Some(ActivityEvent::Active) = activity.pulse() {
                            self.dispatch(PollingEvent::UserActive);
                        }
                    }
                    None => pulses_open = false,
                },
                _ = activity.expired() => {
                    if self.state.phase == PollingPhase::InitialFetch {
                        // Nothing to pause yet; keep watching once polling starts.
                        activity.rearm();
                    } else {
                        self.dispatch(PollingEvent::UserInactive);
                    }
                }
                Some(joined) = self.fetches.join_next() => {
                    self.complete_fetch(joined);
                }
            }

            if !was_polling && self.state.phase == PollingPhase::Polling {
                ticker.reset();
            }
        }

        // In-flight fetches may still land in the cache, but their outcome no
        // longer reaches this state machine.
        self.fetches.detach_all();
        self.dispatch(PollingEvent::StopPolling);
        for (_, reply) in self.manual_replies.drain() {
            let _ = reply.send(self.state.clone());
        }
        tracing::info!(resource = %self.target.describe(), "Polling stopped");
    }

    fn dispatch(&mut self, event: PollingEvent) {
        let next = self.state.apply(&event, Utc::now());
        if next != self.state {
            tracing::debug!(
                ?event,
                from = ?self.state.phase,
                to = ?next.phase,
                poll_count = next.poll_count,
                "Polling transition"
            );
        }
        self.state = next;
        self.status.send_replace(self.state.clone());
    }

    fn issue_fetch(&mut self, kind: PollKind, reply: Option<oneshot::Sender<PollingState>>) {
        self.next_fetch_id += 1;
        let id = self.next_fetch_id;
        if let Some(reply) = reply {
            self.manual_replies.insert(id, reply);
        }

        let target = Arc::clone(&self.target);
        self.fetches.spawn(async move {
            let outcome = target.poll(kind).await;
            (id, kind, outcome)
        });
    }

    fn complete_fetch(&mut self, joined: Result<FetchOutcome, JoinError>) {
        let (id, kind, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(error = %e, "Fetch task failed");
                self.dispatch(PollingEvent::FetchError(e.to_string()));
                // The task id is lost with the panic, so release every waiter.
                for (_, reply) in self.manual_replies.drain() {
                    let _ = reply.send(self.state.clone());
                }
                return;
            }
        };

        match outcome {
            Ok(()) => {
                self.dispatch(PollingEvent::FetchSuccess);
                if kind == PollKind::Manual {
                    self.dispatch(PollingEvent::ManualRefresh);
                }
            }
            Err(error) => {
                tracing::warn!(
                    resource = %self.target.describe(),
                    ?kind,
                    error = %error,
                    "Fetch failed, pausing"
                );
                self.dispatch(PollingEvent::FetchError(error));
            }
        }

        if let Some(reply) = self.manual_replies.remove(&id) {
            let _ = reply.send(self.state.clone());
        }
    }
}

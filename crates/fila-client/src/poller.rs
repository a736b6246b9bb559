use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fila_types::api::{QueueStatusResponse, TicketResponse};
use fila_types::models::CheckInStatus;

use crate::backend::{QueueBackend, with_timeout};
use crate::config::ClientConfig;
use crate::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    pub request_timeout: Duration,
    pub service_rate: f64,
}

impl From<&ClientConfig> for PollConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval,
            request_timeout: config.request_timeout,
            service_rate: config.service_rate,
        }
    }
}

/// Minutes until a ticket `position` places from the counter is called.
pub fn estimated_remaining_minutes(position: i64, estimated_wait_minutes: i64, service_rate: f64) -> f64 {
    if position <= 0 || service_rate <= 0.0 {
        return 0.0;
    }
    position as f64 * (estimated_wait_minutes as f64 / service_rate)
}

/// One successful status read for a held ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub queue_number: i64,
    pub current_number: i64,
    pub position: i64,
    pub estimated_wait_minutes: i64,
    pub estimated_remaining_minutes: f64,
    pub ticket_status: Option<CheckInStatus>,
    pub fetched_at: DateTime<Utc>,
}

impl QueueSnapshot {
    pub fn from_status(status: &QueueStatusResponse, service_rate: f64) -> Self {
        Self {
            queue_number: status.queue_number,
            current_number: status.current_number,
            position: status.position,
            estimated_wait_minutes: status.estimated_wait_minutes,
            estimated_remaining_minutes: estimated_remaining_minutes(
                status.position,
                status.estimated_wait_minutes,
                service_rate,
            ),
            ticket_status: status.ticket_status,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_next(&self) -> bool {
        self.position == 0 && self.ticket_status == Some(CheckInStatus::Waiting)
    }

    /// The ticket was served, cancelled or deleted; nothing left to watch.
    pub fn is_over(&self) -> bool {
        self.ticket_status.is_none_or(|s| s.is_final())
    }
}

/// What subscribers of a [`StatusPoller`] see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollState {
    /// Latest successful read. Kept across failed polls.
    pub snapshot: Option<QueueSnapshot>,
    /// Error from the most recent poll, cleared by the next success.
    pub last_error: Option<QueueError>,
    pub polls: u64,
    pub finished: bool,
}

/// Background task that re-reads a ticket's position on a fixed interval.
///
/// The first read happens immediately. [`refresh`](Self::refresh) forces an
/// extra read and restarts the interval. The task ends when stopped, when the
/// poller is dropped, or once the ticket is no longer waiting.
pub struct StatusPoller {
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    state: watch::Receiver<PollState>,
    handle: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn start<B: QueueBackend + 'static>(
        backend: Arc<B>,
        ticket: TicketResponse,
        config: PollConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let (tx, rx) = watch::channel(PollState::default());

        let handle = tokio::spawn(run(backend, ticket, config, cancel.clone(), refresh.clone(), tx));

        Self { cancel, refresh, state: rx, handle: Some(handle) }
    }

    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    pub fn latest(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    /// Cancels the task and waits for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Status poller task failed: {}", e);
            }
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<B: QueueBackend>(
    backend: Arc<B>,
    ticket: TicketResponse,
    config: PollConfig,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    tx: watch::Sender<PollState>,
) {
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = refresh.notified() => {
                debug!("Manual refresh for ticket {}", ticket.queue_number);
                interval.reset();
            }
            _ = interval.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = with_timeout(
                config.request_timeout,
                backend.queue_status(ticket.pharmacy_id, ticket.queue_number),
            ) => result,
        };

        let over = match result {
            Ok(status) => {
                let snapshot = QueueSnapshot::from_status(&status, config.service_rate);
                let over = snapshot.is_over();
                tx.send_modify(|state| {
                    state.snapshot = Some(snapshot);
                    state.last_error = None;
                    state.polls += 1;
                });
                over
            }
            Err(QueueError::NotFound(msg)) => {
                info!("Queue for ticket {} is gone: {}", ticket.queue_number, msg);
                tx.send_modify(|state| {
                    state.last_error = Some(QueueError::NotFound(msg));
                    state.polls += 1;
                });
                true
            }
            Err(e) => {
                warn!("Status poll for ticket {} failed: {}", ticket.queue_number, e);
                tx.send_modify(|state| {
                    state.last_error = Some(e);
                    state.polls += 1;
                });
                false
            }
        };

        if over {
            info!("Ticket {} is no longer waiting, polling stopped", ticket.queue_number);
            break;
        }
    }

    tx.send_modify(|state| state.finished = true);
}

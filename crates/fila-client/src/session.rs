use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use fila_types::api::{SignInRequest, SignInResponse, TicketResponse};
use fila_types::identity::{normalize_cpf, normalize_sus_card};

use crate::backend::{QueueBackend, with_timeout};
use crate::config::ClientConfig;
use crate::error::QueueError;
use crate::poller::{PollConfig, PollState, StatusPoller};
use crate::selection::MedicationSelection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Waiting(TicketResponse),
}

/// One patient's check-in workflow: at most one held ticket and one poller.
///
/// Every state change takes `&mut self`, so two joins (or a join and a
/// leave) cannot race inside one session.
pub struct QueueSession<B> {
    backend: Arc<B>,
    config: ClientConfig,
    ticket: Option<TicketResponse>,
    poller: Option<StatusPoller>,
}

impl<B: QueueBackend + 'static> QueueSession<B> {
    pub fn new(backend: Arc<B>, config: ClientConfig) -> Self {
        Self { backend, config, ticket: None, poller: None }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn ticket(&self) -> Option<TicketResponse> {
        self.ticket
    }

    pub fn state(&self) -> SessionState {
        match self.ticket {
            Some(ticket) => SessionState::Waiting(ticket),
            None => SessionState::Idle,
        }
    }

    /// Checks the credentials locally, then signs in or registers.
    pub async fn sign_in(
        &self,
        cpf: &str,
        sus_card: &str,
        full_name: Option<String>,
    ) -> Result<SignInResponse, QueueError> {
        let req = SignInRequest {
            cpf: normalize_cpf(cpf)?,
            sus_card: normalize_sus_card(sus_card)?,
            full_name: full_name.filter(|n| !n.trim().is_empty()),
        };
        let resp = with_timeout(self.config.request_timeout, self.backend.sign_in(&req)).await?;
        info!("Signed in as {}", resp.profile.id);
        Ok(resp)
    }

    /// Takes a ticket at `pharmacy_id` for the selected medications.
    ///
    /// Conflicts and transient failures are retried with linear backoff. The
    /// server answers a repeated join with the ticket already held, so a
    /// retry after a lost response never takes a second number.
    pub async fn join(
        &mut self,
        pharmacy_id: Uuid,
        selection: &MedicationSelection,
    ) -> Result<TicketResponse, QueueError> {
        self.release_finished_ticket().await;

        if let Some(held) = self.ticket {
            if held.pharmacy_id == pharmacy_id {
                return Ok(held);
            }
            return Err(QueueError::Validation(format!(
                "already holding ticket {} at another pharmacy",
                held.queue_number
            )));
        }

        let req = selection.to_request();
        req.validate()?;

        let pause = self.config.retry_backoff;
        let delays = (1..self.config.join_attempts.max(1)).map(move |n| pause * n);
        let timeout = self.config.request_timeout;
        let backend = &self.backend;
        let req = &req;

        let ticket = (move || with_timeout(timeout, backend.join_queue(pharmacy_id, req)))
            .retry(delays)
            .sleep(tokio::time::sleep)
            .when(|e| e.is_retryable())
            .notify(|e: &QueueError, dur: Duration| {
                warn!("Join failed: {}, retrying in {:?}", e, dur);
            })
            .await?;

        info!("Holding ticket {} at pharmacy {}", ticket.queue_number, ticket.pharmacy_id);
        self.ticket = Some(ticket);
        Ok(ticket)
    }

    /// Gives up the held ticket.
    ///
    /// On failure the ticket is still considered held, except when the
    /// server no longer knows it.
    pub async fn leave(&mut self) -> Result<(), QueueError> {
        let Some(ticket) = self.ticket else {
            return Err(QueueError::Validation("not in a queue".into()));
        };

        let result = with_timeout(
            self.config.request_timeout,
            self.backend.leave_queue(ticket.pharmacy_id, ticket.queue_number),
        )
        .await;

        match result {
            Ok(()) => {
                info!("Left queue at pharmacy {} (ticket {})", ticket.pharmacy_id, ticket.queue_number);
                self.clear().await;
                Ok(())
            }
            Err(QueueError::NotFound(msg)) => {
                warn!("Ticket {} was already gone: {}", ticket.queue_number, msg);
                self.clear().await;
                Err(QueueError::NotFound(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Starts watching the held ticket, or returns the running watcher.
    pub fn start_polling(&mut self) -> Result<watch::Receiver<PollState>, QueueError> {
        let Some(ticket) = self.ticket else {
            return Err(QueueError::Validation("not in a queue".into()));
        };

        if let Some(poller) = self.poller.as_ref().filter(|p| !p.is_finished()) {
            return Ok(poller.subscribe());
        }

        let poller = StatusPoller::start(self.backend.clone(), ticket, PollConfig::from(&self.config));
        let rx = poller.subscribe();
        self.poller = Some(poller);
        Ok(rx)
    }

    pub fn refresh(&self) {
        if let Some(poller) = &self.poller {
            poller.refresh();
        }
    }

    pub fn poll_state(&self) -> Option<PollState> {
        self.poller.as_ref().map(StatusPoller::latest)
    }

    pub async fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
    }

    async fn clear(&mut self) {
        self.stop_polling().await;
        self.ticket = None;
    }

    /// Drops a ticket the poller has seen served, cancelled or deleted.
    async fn release_finished_ticket(&mut self) {
        let over = self.poll_state().is_some_and(|state| {
            state.finished
                && (state.snapshot.as_ref().is_some_and(|s| s.is_over())
                    || matches!(state.last_error, Some(QueueError::NotFound(_))))
        });
        if over {
            self.clear().await;
        }
    }
}

//! In-memory [`QueueBackend`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use fila_types::api::{
    JoinQueueRequest, NearbyPharmacy, QueueInfo, QueueStatusResponse, SignInRequest, SignInResponse,
    TicketResponse,
};
use fila_types::models::{CheckInStatus, Medication, Pickup, Profile};

use crate::backend::QueueBackend;
use crate::error::QueueError;

struct FakeTicket {
    check_in_id: Uuid,
    queue_number: i64,
    user: Uuid,
}

struct FakeQueue {
    current_number: i64,
    estimated_wait_minutes: i64,
    waiting: Vec<FakeTicket>,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<Uuid, FakeQueue>,
    join_failures: VecDeque<QueueError>,
    status_failures: VecDeque<QueueError>,
    leave_failures: VecDeque<QueueError>,
    join_delay: Option<Duration>,
}

pub(crate) struct FakeBackend {
    user: Uuid,
    inner: Mutex<Inner>,
    join_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            user: Uuid::new_v4(),
            inner: Mutex::new(Inner::default()),
            join_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_pharmacy(&self, estimated_wait_minutes: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().queues.insert(
            id,
            FakeQueue { current_number: 0, estimated_wait_minutes, waiting: Vec::new() },
        );
        id
    }

    /// Issues a ticket to `user` directly, bypassing failure injection.
    pub fn issue(&self, pharmacy_id: Uuid, user: Uuid) -> TicketResponse {
        let mut inner = self.inner.lock().unwrap();
        let queue = inner.queues.get_mut(&pharmacy_id).unwrap();
        queue.current_number += 1;
        let ticket = FakeTicket { check_in_id: Uuid::new_v4(), queue_number: queue.current_number, user };
        let response = TicketResponse {
            check_in_id: ticket.check_in_id,
            pharmacy_id,
            queue_number: ticket.queue_number,
        };
        queue.waiting.push(ticket);
        response
    }

    pub fn remove(&self, pharmacy_id: Uuid, queue_number: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(queue) = inner.queues.get_mut(&pharmacy_id) {
            queue.waiting.retain(|t| t.queue_number != queue_number);
        }
    }

    pub fn is_waiting(&self, pharmacy_id: Uuid, queue_number: i64) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.queues[&pharmacy_id].waiting.iter().any(|t| t.queue_number == queue_number)
    }

    pub fn current_number(&self, pharmacy_id: Uuid) -> i64 {
        self.inner.lock().unwrap().queues[&pharmacy_id].current_number
    }

    pub fn fail_joins_with(&self, errors: impl IntoIterator<Item = QueueError>) {
        self.inner.lock().unwrap().join_failures.extend(errors);
    }

    pub fn fail_status_with(&self, error: QueueError) {
        self.inner.lock().unwrap().status_failures.push_back(error);
    }

    pub fn fail_leave_with(&self, error: QueueError) {
        self.inner.lock().unwrap().leave_failures.push_back(error);
    }

    pub fn delay_joins(&self, delay: Duration) {
        self.inner.lock().unwrap().join_delay = Some(delay);
    }

    pub fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

impl QueueBackend for FakeBackend {
    async fn sign_in(&self, req: &SignInRequest) -> Result<SignInResponse, QueueError> {
        Ok(SignInResponse {
            profile: Profile {
                id: self.user,
                full_name: req.full_name.clone().unwrap_or_else(|| "Usuário".into()),
                created_at: Utc::now(),
            },
            token: "fake-token".into(),
        })
    }

    async fn nearby_pharmacies(
        &self,
        _lat: f64,
        _lng: f64,
        _radius_km: Option<f64>,
    ) -> Result<Vec<NearbyPharmacy>, QueueError> {
        Ok(Vec::new())
    }

    async fn list_medications(
        &self,
        _pharmacy_id: Uuid,
        _search: Option<&str>,
    ) -> Result<Vec<Medication>, QueueError> {
        Ok(Vec::new())
    }

    async fn queue_info(&self, pharmacy_id: Uuid) -> Result<QueueInfo, QueueError> {
        let inner = self.inner.lock().unwrap();
        let queue = inner
            .queues
            .get(&pharmacy_id)
            .ok_or_else(|| QueueError::NotFound("pharmacy".into()))?;
        Ok(QueueInfo {
            pharmacy_id,
            current_number: queue.current_number,
            estimated_wait_minutes: queue.estimated_wait_minutes,
        })
    }

    async fn join_queue(
        &self,
        pharmacy_id: Uuid,
        _req: &JoinQueueRequest,
    ) -> Result<TicketResponse, QueueError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);

        let delay = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(err) = inner.join_failures.pop_front() {
                return Err(err);
            }
            inner.join_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let held = {
            let inner = self.inner.lock().unwrap();
            let queue = inner
                .queues
                .get(&pharmacy_id)
                .ok_or_else(|| QueueError::NotFound("pharmacy".into()))?;
            queue.waiting.iter().find(|t| t.user == self.user).map(|t| TicketResponse {
                check_in_id: t.check_in_id,
                pharmacy_id,
                queue_number: t.queue_number,
            })
        };
        match held {
            Some(ticket) => Ok(ticket),
            None => Ok(self.issue(pharmacy_id, self.user)),
        }
    }

    async fn leave_queue(&self, pharmacy_id: Uuid, queue_number: i64) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.leave_failures.pop_front() {
            return Err(err);
        }
        let queue = inner
            .queues
            .get_mut(&pharmacy_id)
            .ok_or_else(|| QueueError::NotFound("pharmacy".into()))?;
        let before = queue.waiting.len();
        queue.waiting.retain(|t| !(t.queue_number == queue_number && t.user == self.user));
        if queue.waiting.len() == before {
            return Err(QueueError::NotFound("no waiting ticket".into()));
        }
        Ok(())
    }

    async fn queue_status(
        &self,
        pharmacy_id: Uuid,
        queue_number: i64,
    ) -> Result<QueueStatusResponse, QueueError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.status_failures.pop_front() {
            return Err(err);
        }
        let queue = inner
            .queues
            .get(&pharmacy_id)
            .ok_or_else(|| QueueError::NotFound("queue".into()))?;
        let held = queue.waiting.iter().any(|t| t.queue_number == queue_number);
        Ok(QueueStatusResponse {
            pharmacy_id,
            queue_number,
            current_number: queue.current_number,
            estimated_wait_minutes: queue.estimated_wait_minutes,
            position: queue.waiting.iter().filter(|t| t.queue_number < queue_number).count() as i64,
            ticket_status: held.then_some(CheckInStatus::Waiting),
        })
    }

    async fn pickups(&self) -> Result<Vec<Pickup>, QueueError> {
        Ok(Vec::new())
    }
}

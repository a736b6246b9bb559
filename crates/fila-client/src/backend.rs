use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use fila_types::api::{
    JoinQueueRequest, NearbyPharmacy, QueueInfo, QueueStatusResponse, SignInRequest, SignInResponse,
    TicketResponse,
};
use fila_types::models::{Medication, Pickup};

use crate::error::QueueError;

/// The remote queue service as seen by the workflow and the poller.
///
/// Implementations hold whatever session credential `sign_in` returns and
/// attach it to later calls.
pub trait QueueBackend: Send + Sync {
    fn sign_in(
        &self,
        req: &SignInRequest,
    ) -> impl Future<Output = Result<SignInResponse, QueueError>> + Send;

    fn nearby_pharmacies(
        &self,
        lat: f64,
        lng: f64,
        radius_km: Option<f64>,
    ) -> impl Future<Output = Result<Vec<NearbyPharmacy>, QueueError>> + Send;

    fn list_medications(
        &self,
        pharmacy_id: Uuid,
        search: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Medication>, QueueError>> + Send;

    fn queue_info(&self, pharmacy_id: Uuid) -> impl Future<Output = Result<QueueInfo, QueueError>> + Send;

    fn join_queue(
        &self,
        pharmacy_id: Uuid,
        req: &JoinQueueRequest,
    ) -> impl Future<Output = Result<TicketResponse, QueueError>> + Send;

    fn leave_queue(
        &self,
        pharmacy_id: Uuid,
        queue_number: i64,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    fn queue_status(
        &self,
        pharmacy_id: Uuid,
        queue_number: i64,
    ) -> impl Future<Output = Result<QueueStatusResponse, QueueError>> + Send;

    fn pickups(&self) -> impl Future<Output = Result<Vec<Pickup>, QueueError>> + Send;
}

/// Bounds `fut` by `limit`; running out of time is a transient failure.
pub async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, QueueError>>,
) -> Result<T, QueueError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(QueueError::timed_out(limit)),
    }
}

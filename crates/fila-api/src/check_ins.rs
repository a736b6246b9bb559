use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};
use uuid::Uuid;

use fila_db::models::CheckInItemRow;
use fila_db::tickets::{JoinOutcome, NewCheckIn};
use fila_types::api::{Claims, JoinQueueRequest, QueueStatusQuery, QueueStatusResponse, TicketResponse};

use crate::auth::AppState;
use crate::catalog::pharmacy_not_found;
use crate::convert;
use crate::error::{ApiError, run_blocking};

/// Takes a ticket in a pharmacy's queue.
///
/// 201 with a new ticket, or 200 with the ticket the caller already holds
/// there, so a retried join never takes a second number.
pub async fn join_queue(
    State(state): State<AppState>,
    Path(pharmacy_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinQueueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let items: Vec<CheckInItemRow> = req
        .medications
        .iter()
        .map(|item| CheckInItemRow {
            medication_id: item.medication_id.to_string(),
            quantity: item.quantity,
        })
        .collect();
    let check_in_id = Uuid::new_v4().to_string();
    let queue_id = Uuid::new_v4().to_string();
    let user_id = claims.sub.to_string();
    let pid = pharmacy_id.to_string();
    let default_wait_minutes = state.default_wait_minutes;

    let outcome = run_blocking(&state, move |db| {
        db.join_queue(&NewCheckIn {
            check_in_id: &check_in_id,
            queue_id: &queue_id,
            user_id: &user_id,
            pharmacy_id: &pid,
            items: &items,
            default_wait_minutes,
        })
    })
    .await?;

    let (status, row) = match outcome {
        JoinOutcome::Issued(row) => {
            info!("User {} took ticket {} at pharmacy {}", claims.sub, row.queue_number, pharmacy_id);
            (StatusCode::CREATED, row)
        }
        JoinOutcome::AlreadyWaiting(row) => (StatusCode::OK, row),
        JoinOutcome::PharmacyNotFound => return Err(pharmacy_not_found(pharmacy_id)),
        JoinOutcome::ProfileNotFound => {
            warn!("Token for missing profile {} tried to join", claims.sub);
            return Err(ApiError::Unauthorized);
        }
        JoinOutcome::UnknownMedication(id) => {
            return Err(ApiError::Validation(format!(
                "medication {} is not available at this pharmacy",
                id
            )));
        }
    };

    let check_in = convert::check_in(row);
    Ok((
        status,
        Json(TicketResponse {
            check_in_id: check_in.id,
            pharmacy_id: check_in.pharmacy_id,
            queue_number: check_in.queue_number,
        }),
    ))
}

/// Gives up the caller's waiting ticket. Other tickets keep their numbers.
pub async fn leave_queue(
    State(state): State<AppState>,
    Path((pharmacy_id, queue_number)): Path<(Uuid, i64)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let pid = pharmacy_id.to_string();

    let removed = run_blocking(&state, move |db| db.leave_queue(&user_id, &pid, queue_number)).await?;
    if !removed {
        return Err(ApiError::NotFound(format!(
            "no waiting ticket {} at pharmacy {}",
            queue_number, pharmacy_id
        )));
    }

    info!("User {} left ticket {} at pharmacy {}", claims.sub, queue_number, pharmacy_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn queue_status(
    State(state): State<AppState>,
    Path(pharmacy_id): Path<Uuid>,
    Query(query): Query<QueueStatusQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if query.queue_number < 1 {
        return Err(ApiError::Validation("queue_number must be positive".into()));
    }

    let pid = pharmacy_id.to_string();
    let queue_number = query.queue_number;
    let row = run_blocking(&state, move |db| db.queue_status(&pid, queue_number))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("pharmacy {} has no queue", pharmacy_id)))?;

    Ok(Json(QueueStatusResponse {
        pharmacy_id,
        queue_number,
        current_number: row.current_number,
        estimated_wait_minutes: row.estimated_wait_minutes,
        position: row.position,
        ticket_status: row.ticket_status.as_deref().map(convert::status),
    }))
}

/// Staff endpoint: serves the lowest waiting ticket.
pub async fn serve_next(
    State(state): State<AppState>,
    Path(pharmacy_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let pid = pharmacy_id.to_string();

    let served = run_blocking(&state, move |db| {
        if db.get_pharmacy(&pid)?.is_none() {
            return Ok(None);
        }
        db.serve_next(&pid).map(Some)
    })
    .await?
    .ok_or_else(|| pharmacy_not_found(pharmacy_id))?;

    match served {
        Some(row) => {
            let check_in = convert::check_in(row);
            info!("Served ticket {} at pharmacy {}", check_in.queue_number, pharmacy_id);
            Ok(Json(check_in).into_response())
        }
        None => {
            warn!("Serve-next at pharmacy {} with nobody waiting", pharmacy_id);
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use fila_types::api::{NearbyPharmacy, QueueInfo};
use fila_types::geo::{BoundingBox, DEFAULT_RADIUS_KM, NEARBY_BOX_DEGREES, haversine_km};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, run_blocking};

/// Upper bound on rows pulled from the bounding box before distance filtering.
const NEARBY_LIMIT: u32 = 50;

/// The prefilter box reaches about 11 km in each direction at any latitude,
/// so larger radii would silently drop pharmacies.
const MAX_RADIUS_KM: f64 = 10.0;

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct MedicationQuery {
    pub search: Option<String>,
}

pub async fn list_pharmacies(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(&state, |db| db.list_pharmacies()).await?;
    Ok(Json(rows.into_iter().map(convert::pharmacy).collect::<Vec<_>>()))
}

/// Pharmacies within `radius_km` of a point, nearest first.
pub async fn nearby_pharmacies(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lng) {
        return Err(ApiError::Validation("coordinates out of range".into()));
    }
    let radius_km = query.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
    if !(radius_km > 0.0 && radius_km <= MAX_RADIUS_KM) {
        return Err(ApiError::Validation(format!(
            "radius_km must be greater than 0 and at most {}",
            MAX_RADIUS_KM
        )));
    }

    let bbox = BoundingBox::around(query.lat, query.lng, NEARBY_BOX_DEGREES);
    let rows = run_blocking(&state, move |db| {
        db.pharmacies_in_box(bbox.min_lat, bbox.max_lat, bbox.min_lng, bbox.max_lng, NEARBY_LIMIT)
    })
    .await?;

    let mut nearby: Vec<NearbyPharmacy> = rows
        .into_iter()
        .filter_map(|row| {
            let (lat, lng) = (row.latitude?, row.longitude?);
            let distance_km = haversine_km(query.lat, query.lng, lat, lng);
            (distance_km <= radius_km).then(|| NearbyPharmacy {
                pharmacy: convert::pharmacy(row),
                distance_km,
            })
        })
        .collect();
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    Ok(Json(nearby))
}

pub async fn get_pharmacy(
    State(state): State<AppState>,
    Path(pharmacy_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = pharmacy_id.to_string();
    let row = run_blocking(&state, move |db| db.get_pharmacy(&id))
        .await?
        .ok_or_else(|| pharmacy_not_found(pharmacy_id))?;
    Ok(Json(convert::pharmacy(row)))
}

pub async fn list_medications(
    State(state): State<AppState>,
    Path(pharmacy_id): Path<Uuid>,
    Query(query): Query<MedicationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = pharmacy_id.to_string();
    let search = query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let rows = run_blocking(&state, move |db| {
        if db.get_pharmacy(&id)?.is_none() {
            return Ok(None);
        }
        db.list_medications(&id, search.as_deref()).map(Some)
    })
    .await?
    .ok_or_else(|| pharmacy_not_found(pharmacy_id))?;

    Ok(Json(rows.into_iter().map(convert::medication).collect::<Vec<_>>()))
}

/// Queue counters for the pre-join estimate. A pharmacy nobody has joined
/// yet reports an empty queue with the default wait.
pub async fn queue_info(
    State(state): State<AppState>,
    Path(pharmacy_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = pharmacy_id.to_string();
    let default_wait_minutes = state.default_wait_minutes;

    let info = run_blocking(&state, move |db| {
        if db.get_pharmacy(&id)?.is_none() {
            return Ok(None);
        }
        let info = match db.get_queue(&id)? {
            Some(queue) => QueueInfo {
                pharmacy_id,
                current_number: queue.current_number,
                estimated_wait_minutes: queue.estimated_wait_minutes,
            },
            None => QueueInfo {
                pharmacy_id,
                current_number: 0,
                estimated_wait_minutes: default_wait_minutes,
            },
        };
        Ok(Some(info))
    })
    .await?
    .ok_or_else(|| pharmacy_not_found(pharmacy_id))?;

    Ok(Json(info))
}

pub(crate) fn pharmacy_not_found(pharmacy_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("pharmacy {} not found", pharmacy_id))
}

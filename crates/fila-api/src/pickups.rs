use axum::{Extension, Json, extract::State, response::IntoResponse};

use fila_types::api::Claims;

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, run_blocking};

/// The caller's pickup history, newest first.
pub async fn list_pickups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let rows = run_blocking(&state, move |db| db.list_pickups(&user_id)).await?;
    Ok(Json(rows.into_iter().map(convert::pickup).collect::<Vec<_>>()))
}

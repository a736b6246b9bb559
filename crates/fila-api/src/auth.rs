use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use fila_db::Database;
use fila_db::models::ProfileRow;
use fila_types::api::{Claims, SignInRequest, SignInResponse};
use fila_types::identity::{national_id_hash, normalize_cpf, normalize_sus_card};

use crate::convert;
use crate::error::{ApiError, run_blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Shared secret for pharmacy staff endpoints (`X-Staff-Key`).
    pub staff_key: String,
    /// Per-ticket wait estimate given to a queue created by its first join.
    pub default_wait_minutes: i64,
}

const DEFAULT_FULL_NAME: &str = "Usuário";
const FULL_NAME_MAX_CHARS: usize = 120;
const TOKEN_TTL_DAYS: i64 = 30;

enum SignIn {
    Existing(ProfileRow),
    Created(ProfileRow),
    Rejected,
}

/// Resolves a CPF + SUS card pair to a profile, creating it on first sight.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cpf = normalize_cpf(&req.cpf)?;
    let sus_card = normalize_sus_card(&req.sus_card)?;
    let full_name = req
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FULL_NAME)
        .chars()
        .take(FULL_NAME_MAX_CHARS)
        .collect::<String>();
    let lookup = national_id_hash(&cpf);

    // Argon2 runs on the blocking pool alongside the store calls.
    let outcome = run_blocking(&state, move |db| {
        if let Some(row) = db.get_profile_by_national_id(&lookup)? {
            let verified = {
                let parsed = PasswordHash::new(&row.sus_card_hash)
                    .map_err(|e| anyhow::anyhow!("Corrupt credential hash for profile {}: {}", row.id, e))?;
                Argon2::default().verify_password(sus_card.as_bytes(), &parsed).is_ok()
            };
            return Ok(if verified { SignIn::Existing(row) } else { SignIn::Rejected });
        }

        let sus_card_hash = hash_credential(&sus_card)?;

        let id = Uuid::new_v4().to_string();
        db.create_profile(&id, &lookup, &sus_card_hash, &full_name)?;
        let row = db
            .get_profile_by_id(&id)?
            .ok_or_else(|| anyhow::anyhow!("Profile {} missing right after insert", id))?;
        Ok(SignIn::Created(row))
    })
    .await?;

    let (status, row) = match outcome {
        SignIn::Existing(row) => (StatusCode::OK, row),
        SignIn::Created(row) => {
            info!("Created profile {}", row.id);
            (StatusCode::CREATED, row)
        }
        SignIn::Rejected => return Err(ApiError::Unauthorized),
    };

    let profile = convert::profile(&row);
    let token = create_token(&state.jwt_secret, profile.id).map_err(|e| {
        tracing::error!("Token encoding failed: {}", e);
        ApiError::Internal
    })?;

    Ok((status, Json(SignInResponse { profile, token })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let row = run_blocking(&state, move |db| db.get_profile_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("profile not found".into()))?;

    Ok(Json(convert::profile(&row)))
}

/// Argon2 PHC string for a credential, salted from the OS RNG.
fn hash_credential(secret: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash credential: {}", e))?;
    Ok(hash.to_string())
}

pub fn create_token(secret: &str, profile_id: Uuid) -> anyhow::Result<String> {
    let claims = Claims {
        sub: profile_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use livewall_db::Database;
use livewall_gateway::dispatcher::Dispatcher;
use livewall_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{ApiError, ApiResult};
use crate::media::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub storage: Storage,
    pub public_url: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Creation("username must be 3-32 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Creation(
            "password must be at least 8 characters".into(),
        ));
    }

    if state.db.get_host_by_username(&req.username)?.is_some() {
        return Err(ApiError::Creation("username is taken".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Database(anyhow::anyhow!("password hash failed: {}", e)))?
        .to_string();

    let host_id = Uuid::new_v4();
    state
        .db
        .create_host(&host_id.to_string(), &req.username, &password_hash)?;

    // Hosts get a profile row under the same id, so their notes resolve
    // through the participant -> profile chain like anyone else's.
    state.db.upsert_profile(&host_id.to_string(), &req.username)?;

    let token = create_token(&state.jwt_secret, host_id, &req.username)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { host_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let host = state
        .db
        .get_host_by_username(&req.username)?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&host.password)
        .map_err(|e| ApiError::Database(anyhow::anyhow!("stored hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let host_id: Uuid = host.id.parse().map_err(anyhow::Error::from)?;
    let token = create_token(&state.jwt_secret, host_id, &host.username)?;

    Ok(Json(LoginResponse {
        host_id,
        username: host.username,
        token,
    }))
}

fn create_token(secret: &str, host_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: host_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

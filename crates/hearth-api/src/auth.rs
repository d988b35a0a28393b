use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use hearth_db::Database;
use hearth_gateway::dispatcher::Dispatcher;
use hearth_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use hearth_types::models::Role;

use crate::error::{blocking, ApiError};
use crate::gateway_client::GatewayClient;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub payments: GatewayClient,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("invalid email address".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    if req.display_name.len() < 2 || req.display_name.len() > 64 {
        return Err(ApiError::BadRequest(
            "display name must be 2-64 characters".into(),
        ));
    }

    // Check if the email is taken
    let db = state.db.clone();
    let email = req.email.clone();
    if blocking(move || db.get_user_by_email(&email)).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();

    let db = state.db.clone();
    let req_clone = (
        user_id.to_string(),
        req.email.clone(),
        password_hash,
        req.display_name.clone(),
        req.role,
        req.phone.clone(),
    );
    blocking(move || {
        let (id, email, hash, name, role, phone) = req_clone;
        db.create_user(&id, &email, &hash, &name, role.as_str(), phone.as_deref())
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, &req.display_name, req.role)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let email = req.email.clone();
    let user = blocking(move || db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    if user.status == "dismissed" {
        return Err(ApiError::Forbidden("account has been deactivated".into()));
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {e}")))?;
    let role = Role::parse(&user.role)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("corrupt role '{}'", user.role)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.display_name, role)?;

    Ok(Json(LoginResponse {
        user_id,
        display_name: user.display_name,
        role,
        token,
    }))
}

fn create_token(secret: &str, user_id: Uuid, name: &str, role: Role) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encode: {e}")))?;

    Ok(token)
}

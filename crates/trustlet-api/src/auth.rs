use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use trustlet_types::api::{Claims, LoginRequest, LoginResponse, SignupRequest, SignupResponse};

use crate::error::AppError;
use crate::workflow::Workflow;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub workflow: Workflow,
    pub jwt_secret: String,
}

/// Session lifetime.
const TOKEN_TTL_DAYS: i64 = 30;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .workflow
        .signup(&req.name, &req.email, &req.password, req.inviter_email.as_deref())
        .await?;

    let message = if outcome.user.is_active {
        "Welcome to Trustlet! You can log in now.".to_string()
    } else {
        "Thanks for signing up! Your inviter has been asked to approve your membership.".to_string()
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: outcome.user.id,
            is_active: outcome.user.is_active,
            message,
            notification: outcome.notification,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.workflow.login(&req.email, &req.password).await?;

    let token = create_token(&state.jwt_secret, user.id, &user.email, &user.name)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        name: user.name,
        email: user.email,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        name: name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

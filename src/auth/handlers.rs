use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            ActivateQuery, ApiResponse, ChangePasswordRequest, EmailRequest, LoginRequest,
            PublicUser, RegisterRequest, ResetPasswordRequest, SessionGrant,
        },
        extractors::AuthUser,
        validation::{ensure_valid, normalize_email, Violation},
    },
    error::AuthError,
    state::AppState,
};

type Reply<T> = Result<Json<ApiResponse<T>>, AuthError>;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/activate", post(activate))
        .route("/resend-activation", post(resend_activation))
        .route("/login", post(login))
        .route("/change-password", patch(change_password))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), AuthError> {
    let payload = payload.normalized();
    ensure_valid(payload.violations())?;

    let user = state.activation.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_data("User created successfully", user)),
    ))
}

#[instrument(skip(state, query))]
pub async fn activate(
    State(state): State<AppState>,
    Query(query): Query<ActivateQuery>,
) -> Reply<SessionGrant> {
    let token = query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AuthError::Validation(vec![Violation {
                field: "token",
                message: "Activation token is required".into(),
            }])
        })?;

    let grant = state.activation.activate_by_token(token).await?;
    Ok(Json(ApiResponse::with_data(
        "Account activated successfully!",
        grant,
    )))
}

#[instrument(skip(state, payload))]
pub async fn resend_activation(
    State(state): State<AppState>,
    Json(mut payload): Json<EmailRequest>,
) -> Reply<()> {
    payload.email = normalize_email(&payload.email);
    ensure_valid(payload.violations())?;

    state.activation.resend_activation(&payload.email).await?;
    Ok(Json(ApiResponse::message(
        "Activation email resent successfully",
    )))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Reply<SessionGrant> {
    payload.email = normalize_email(&payload.email);
    ensure_valid(payload.violations())?;

    let grant = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(ApiResponse::with_data("Logged in successfully!", grant)))
}

#[instrument(skip_all, fields(user_id = ctx.user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Reply<()> {
    ensure_valid(payload.violations())?;

    state
        .sessions
        .change_password(ctx.user.id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(Json(ApiResponse::message("Password updated successfully")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<EmailRequest>,
) -> Reply<()> {
    payload.email = normalize_email(&payload.email);
    ensure_valid(payload.violations())?;

    state.sessions.forgot_password(&payload.email).await?;
    Ok(Json(ApiResponse::message(
        "If the email exists, reset instructions were sent",
    )))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Reply<()> {
    ensure_valid(payload.violations())?;

    state
        .sessions
        .reset_password(payload.token.trim(), &payload.password)
        .await?;
    Ok(Json(ApiResponse::message("Password reset successfully")))
}

pub async fn get_me(AuthUser(ctx): AuthUser) -> Reply<PublicUser> {
    info!(user_id = ctx.user.id, "get_me");
    Ok(Json(ApiResponse::with_data("Current user", ctx.user)))
}

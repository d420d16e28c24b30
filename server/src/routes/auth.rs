use axum::{Json, Router, extract::State, routing::post};
use entity::user;
use platform_api::{ApiError, ApiResult, FieldErrors};
use platform_authn::{TokenPair, TokenType};
use platform_db::mapping;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{extract::Body, http::AppState};

const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";
const INVALID_REFRESH: &str = "Token is invalid or expired";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/token", post(obtain))
        .route("/token/refresh", post(refresh))
}

#[derive(Deserialize)]
struct Credentials {
    username: Option<String>,
    password: Option<String>,
}

async fn obtain(
    State(state): State<AppState>,
    Body(body): Body<Credentials>,
) -> ApiResult<Json<TokenPair>> {
    let mut errors = FieldErrors::new();
    let username = errors.require("username", body.username);
    let password = errors.require("password", body.password);
    let (Some(username), Some(password)) = (username, password) else {
        return Err(errors.into());
    };

    let account = user::Entity::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .one(&state.db)
        .await?
        .filter(|u| u.is_active && platform_authn::verify_password(&password, &u.password_hash))
        .ok_or_else(|| ApiError::AuthenticationRequired(NO_ACTIVE_ACCOUNT.into()))?;

    let role = mapping::role(account.role);
    let pair = platform_authn::issue_pair(account.id, role.as_str(), state.auth())
        .map_err(|err| ApiError::internal(err.into()))?;
    info!(user = %account.id, %role, "token issued");
    Ok(Json(pair))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh: Option<String>,
}

#[derive(Serialize)]
struct AccessToken {
    access: String,
}

async fn refresh(
    State(state): State<AppState>,
    Body(body): Body<RefreshRequest>,
) -> ApiResult<Json<AccessToken>> {
    let mut errors = FieldErrors::new();
    let Some(token) = errors.require("refresh", body.refresh) else {
        return Err(errors.into());
    };

    let claims = platform_authn::decode(&token, TokenType::Refresh, state.auth())
        .map_err(|_| ApiError::AuthenticationRequired(INVALID_REFRESH.into()))?;
    // Role and activity come from the row, not the token.
    let account = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::AuthenticationRequired(NO_ACTIVE_ACCOUNT.into()))?;

    let access = platform_authn::issue_access(
        account.id,
        mapping::role(account.role).as_str(),
        state.auth(),
    )
    .map_err(|err| ApiError::internal(err.into()))?;
    Ok(Json(AccessToken { access }))
}

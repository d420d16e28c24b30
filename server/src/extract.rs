//! Request extractors: the calling principal and JSON bodies that fail
//! with the API error envelope.

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use entity::user;
use platform_api::{ApiError, ApiResult};
use platform_authn::TokenType;
use platform_authz::Principal;
use platform_db::mapping;
use sea_orm::EntityTrait;
use serde::de::DeserializeOwned;

use crate::http::AppState;

const INVALID_TOKEN: &str = "Given token not valid for any token type";

/// Who is making the request. Requests without a bearer token are
/// anonymous; the engine turns that into 401 wherever it matters.
#[derive(Clone, Debug)]
pub struct Caller {
    pub principal: Principal,
    pub user: Option<user::Model>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self {
            principal: Principal::anonymous(),
            user: None,
        }
    }

    pub fn user(&self) -> ApiResult<&user::Model> {
        self.user.as_ref().ok_or_else(ApiError::unauthenticated)
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(TypedHeader(Authorization(bearer))) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
        else {
            return Ok(Self::anonymous());
        };

        let claims = platform_authn::decode(bearer.token(), TokenType::Access, state.auth())
            .map_err(|_| ApiError::AuthenticationRequired(INVALID_TOKEN.into()))?;
        let user = user::Entity::find_by_id(claims.sub)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::AuthenticationRequired("User not found".into()))?;
        if !user.is_active {
            return Err(ApiError::AuthenticationRequired("User is inactive".into()));
        }

        Ok(Self {
            principal: Principal::authenticated(user.id, mapping::role(user.role)),
            user: Some(user),
        })
    }
}

/// `axum::Json` with rejections rendered as validation errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Body<T>(pub T);

/// Parses an optional JSON body; an empty body yields `T::default()`.
pub fn optional_json<T: DeserializeOwned + Default>(bytes: &Bytes) -> ApiResult<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|err| ApiError::non_field(err.to_string()))
}

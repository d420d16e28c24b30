use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use entity::user;
use platform_api::{ApiError, ApiResult, FieldErrors, Page, PageParams};
use platform_authz::{Operation, Resource, Role, UserFacts};
use platform_db::{facts, mapping};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    access::{check, find_scoped, icontains, list_scoped, paginate},
    extract::{Body, Caller},
    http::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/me", get(me))
        .route(
            "/{id}",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: String,
    pub role: user::Role,
    pub role_display: &'static str,
    pub is_active: bool,
    pub date_joined: DateTimeWithTimeZone,
}

impl From<user::Model> for UserView {
    fn from(model: user::Model) -> Self {
        Self {
            full_name: model.full_name(),
            role_display: mapping::role(model.role).display_name(),
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            role: model.role,
            is_active: model.is_active,
            date_joined: model.date_joined,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Filters {
    username: Option<String>,
    email: Option<String>,
    is_active: Option<bool>,
    role: Option<user::Role>,
    search: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(filters): Query<Filters>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<UserView>>> {
    let mut select = list_scoped::<user::Entity>(&state, &caller.principal)?;
    if let Some(username) = filters.username {
        select = select.filter(user::Column::Username.eq(username));
    }
    if let Some(email) = filters.email {
        select = select.filter(user::Column::Email.eq(email));
    }
    if let Some(is_active) = filters.is_active {
        select = select.filter(user::Column::IsActive.eq(is_active));
    }
    if let Some(role) = filters.role {
        select = select.filter(user::Column::Role.eq(role));
    }
    if let Some(term) = filters.search.filter(|s| !s.trim().is_empty()) {
        select = select.filter(
            Condition::any()
                .add(icontains(user::Column::Username, &term))
                .add(icontains(user::Column::Email, &term))
                .add(icontains(user::Column::FirstName, &term))
                .add(icontains(user::Column::LastName, &term))
                .add(icontains(user::Column::Phone, &term)),
        );
    }
    let select = select.order_by_desc(user::Column::DateJoined);
    Ok(Json(paginate(&state.db, select, page).await?.map(UserView::from)))
}

#[derive(Debug, Default, Deserialize)]
struct UserInput {
    username: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    role: Option<user::Role>,
    password: Option<String>,
    is_active: Option<bool>,
}

pub(crate) fn validate_password(errors: &mut FieldErrors, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!(
                "This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."
            ),
        );
    }
}

pub(crate) fn hash(password: &str) -> ApiResult<String> {
    platform_authn::hash_password(password).map_err(|err| ApiError::internal(err.into()))
}

async fn ensure_unique(
    state: &AppState,
    errors: &mut FieldErrors,
    input: &UserInput,
    except: Option<Uuid>,
) -> ApiResult<()> {
    let taken = |column: user::Column, value: &str| {
        let mut query = user::Entity::find().filter(column.eq(value));
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }
        query
    };
    if let Some(username) = input.username.as_deref() {
        if taken(user::Column::Username, username).count(&state.db).await? > 0 {
            errors.add("username", "A user with that username already exists.");
        }
    }
    if let Some(email) = input.email.as_deref() {
        if taken(user::Column::Email, email).count(&state.db).await? > 0 {
            errors.add("email", "user with this email already exists.");
        }
    }
    Ok(())
}

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(input): Body<UserInput>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let id = Uuid::new_v4();
    let role = input.role.unwrap_or(user::Role::CollectionOfficer);
    let requested = mapping::role(role);
    check(
        &state,
        &caller.principal,
        &Resource::User(UserFacts {
            id,
            role: requested,
            requested_role: Some(requested),
        }),
        Operation::CREATE,
    )?;

    let mut errors = FieldErrors::new();
    errors.require("username", input.username.as_ref());
    errors.require("email", input.email.as_ref());
    if let Some(password) = errors.require("password", input.password.as_deref()) {
        validate_password(&mut errors, password);
    }
    ensure_unique(&state, &mut errors, &input, None).await?;
    errors.into_result()?;

    let password_hash = hash(input.password.as_deref().unwrap_or_default())?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = user::ActiveModel {
        id: Set(id),
        username: Set(input.username.unwrap_or_default()),
        email: Set(input.email.unwrap_or_default()),
        first_name: Set(input.first_name.unwrap_or_default()),
        last_name: Set(input.last_name.unwrap_or_default()),
        phone: Set(input.phone.unwrap_or_default()),
        role: Set(role),
        password_hash: Set(password_hash),
        is_active: Set(input.is_active.unwrap_or(true)),
        date_joined: Set(now),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;
    info!(user = %created.id, role = %requested, by = %caller.principal.id, "user created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn me(caller: Caller) -> ApiResult<Json<UserView>> {
    Ok(Json(caller.user()?.clone().into()))
}

async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserView>> {
    let found = find_scoped::<user::Entity>(&state, &caller.principal, id).await?;
    Ok(Json(found.into()))
}

async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Body(input): Body<UserInput>,
) -> ApiResult<Json<UserView>> {
    let current = find_scoped::<user::Entity>(&state, &caller.principal, id).await?;
    let requested_role: Option<Role> = input.role.map(mapping::role);
    check(
        &state,
        &caller.principal,
        &facts::user(&current, requested_role),
        Operation::UPDATE,
    )?;

    let mut errors = FieldErrors::new();
    if let Some(password) = input.password.as_deref() {
        validate_password(&mut errors, password);
    }
    ensure_unique(&state, &mut errors, &input, Some(id)).await?;
    errors.into_result()?;

    let mut changes: user::ActiveModel = current.into();
    if let Some(username) = input.username {
        changes.username = Set(username);
    }
    if let Some(email) = input.email {
        changes.email = Set(email);
    }
    if let Some(first_name) = input.first_name {
        changes.first_name = Set(first_name);
    }
    if let Some(last_name) = input.last_name {
        changes.last_name = Set(last_name);
    }
    if let Some(phone) = input.phone {
        changes.phone = Set(phone);
    }
    if let Some(role) = input.role {
        changes.role = Set(role);
    }
    if let Some(is_active) = input.is_active {
        changes.is_active = Set(is_active);
    }
    if let Some(password) = input.password.as_deref() {
        changes.password_hash = Set(hash(password)?);
    }
    changes.updated_at = Set(Utc::now().into());
    let updated = changes.update(&state.db).await?;
    Ok(Json(updated.into()))
}

async fn destroy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let current = find_scoped::<user::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::user(&current, None),
        Operation::DELETE,
    )?;
    user::Entity::delete_by_id(current.id)
        .exec(&state.db)
        .await?;
    info!(user = %id, by = %caller.principal.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

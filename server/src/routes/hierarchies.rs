use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use entity::{hierarchy, user};
use platform_api::{ApiError, ApiResult, FieldErrors, Page, PageParams};
use platform_authz::Operation;
use platform_db::facts;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    access::{check, existing_user, find_scoped, list_scoped, paginate, user_names},
    extract::{Body, Caller},
    http::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list).post(create)).route(
        "/{id}",
        get(retrieve).put(update).patch(update).delete(destroy),
    )
}

#[derive(Debug, Serialize)]
struct HierarchyView {
    id: Uuid,
    manager: Uuid,
    manager_name: Option<String>,
    collection_officer: Uuid,
    collection_officer_name: Option<String>,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

async fn render(state: &AppState, rows: Vec<hierarchy::Model>) -> ApiResult<Vec<HierarchyView>> {
    let names = user_names(
        &state.db,
        rows.iter()
            .flat_map(|h| [h.manager_id, h.collection_officer_id]),
    )
    .await?;
    Ok(rows
        .into_iter()
        .map(|h| HierarchyView {
            id: h.id,
            manager: h.manager_id,
            manager_name: names.get(&h.manager_id).cloned(),
            collection_officer: h.collection_officer_id,
            collection_officer_name: names.get(&h.collection_officer_id).cloned(),
            created_at: h.created_at,
            updated_at: h.updated_at,
        })
        .collect())
}

async fn render_one(state: &AppState, row: hierarchy::Model) -> ApiResult<HierarchyView> {
    render(state, vec![row])
        .await?
        .pop()
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
struct Filters {
    manager: Option<Uuid>,
    collection_officer: Option<Uuid>,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(filters): Query<Filters>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<HierarchyView>>> {
    let mut select = list_scoped::<hierarchy::Entity>(&state, &caller.principal)?;
    if let Some(manager) = filters.manager {
        select = select.filter(hierarchy::Column::ManagerId.eq(manager));
    }
    if let Some(officer) = filters.collection_officer {
        select = select.filter(hierarchy::Column::CollectionOfficerId.eq(officer));
    }
    let select = select.order_by_asc(hierarchy::Column::CreatedAt);
    let (rows, page) = paginate(&state.db, select, page).await?.take_results();
    Ok(Json(page.with_results(render(&state, rows).await?)))
}

#[derive(Debug, Default, Deserialize)]
struct HierarchyInput {
    manager: Option<Uuid>,
    collection_officer: Option<Uuid>,
}

/// Role and pairing rules for a manager/officer link.
async fn validate(
    state: &AppState,
    manager_id: Uuid,
    officer_id: Uuid,
    except: Option<Uuid>,
) -> ApiResult<()> {
    let manager = existing_user(&state.db, "manager", manager_id).await?;
    let officer = existing_user(&state.db, "collection_officer", officer_id).await?;

    let mut errors = FieldErrors::new();
    if manager.id == officer.id {
        errors.non_field("A user cannot be their own manager.");
    }
    if !matches!(
        manager.role,
        user::Role::Manager | user::Role::SuperManager
    ) {
        errors.non_field("Manager must have Manager or Super Manager role.");
    }
    if officer.role != user::Role::CollectionOfficer {
        errors.non_field("Collection officer must have Collection Officer role.");
    }
    errors.into_result()?;

    let mut duplicate = hierarchy::Entity::find()
        .filter(hierarchy::Column::ManagerId.eq(manager_id))
        .filter(hierarchy::Column::CollectionOfficerId.eq(officer_id));
    if let Some(id) = except {
        duplicate = duplicate.filter(hierarchy::Column::Id.ne(id));
    }
    if duplicate.count(&state.db).await? > 0 {
        return Err(FieldErrors::single(
            platform_api::NON_FIELD_ERRORS,
            "The fields manager, collection_officer must make a unique set.",
        )
        .into());
    }
    Ok(())
}

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(input): Body<HierarchyInput>,
) -> ApiResult<(StatusCode, Json<HierarchyView>)> {
    let mut errors = FieldErrors::new();
    let manager = errors.require("manager", input.manager);
    let officer = errors.require("collection_officer", input.collection_officer);
    let (Some(manager), Some(officer)) = (manager, officer) else {
        // Anonymous callers hear about authentication before field errors.
        if !caller.principal.authenticated {
            return Err(ApiError::unauthenticated());
        }
        return Err(errors.into());
    };

    let now: DateTimeWithTimeZone = Utc::now().into();
    let pending = hierarchy::Model {
        id: Uuid::new_v4(),
        manager_id: manager,
        collection_officer_id: officer,
        created_at: now,
        updated_at: now,
    };
    check(
        &state,
        &caller.principal,
        &facts::hierarchy(&pending),
        Operation::CREATE,
    )?;
    validate(&state, manager, officer, None).await?;

    let created = hierarchy::ActiveModel {
        id: Set(pending.id),
        manager_id: Set(manager),
        collection_officer_id: Set(officer),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;
    info!(manager = %manager, officer = %officer, "hierarchy link created");
    Ok((StatusCode::CREATED, Json(render_one(&state, created).await?)))
}

async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HierarchyView>> {
    let found = find_scoped::<hierarchy::Entity>(&state, &caller.principal, id).await?;
    Ok(Json(render_one(&state, found).await?))
}

async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Body(input): Body<HierarchyInput>,
) -> ApiResult<Json<HierarchyView>> {
    let current = find_scoped::<hierarchy::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::hierarchy(&current),
        Operation::UPDATE,
    )?;

    let manager = input.manager.unwrap_or(current.manager_id);
    let officer = input
        .collection_officer
        .unwrap_or(current.collection_officer_id);
    // The patched pair must be one the caller could write as well.
    let merged = hierarchy::Model {
        manager_id: manager,
        collection_officer_id: officer,
        ..current.clone()
    };
    check(
        &state,
        &caller.principal,
        &facts::hierarchy(&merged),
        Operation::UPDATE,
    )?;
    validate(&state, manager, officer, Some(id)).await?;

    let mut changes: hierarchy::ActiveModel = current.into();
    changes.manager_id = Set(manager);
    changes.collection_officer_id = Set(officer);
    changes.updated_at = Set(Utc::now().into());
    let updated = changes.update(&state.db).await?;
    Ok(Json(render_one(&state, updated).await?))
}

async fn destroy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let current = find_scoped::<hierarchy::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::hierarchy(&current),
        Operation::DELETE,
    )?;
    hierarchy::Entity::delete_by_id(current.id)
        .exec(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{NaiveDate, NaiveTime, Utc};
use entity::{follow_up, interaction};
use platform_api::{ApiError, ApiResult, FieldErrors, Page, PageParams};
use platform_authz::{Operation, Principal, lifecycle};
use platform_db::{
    facts, mapping,
    transitions::{self, Reschedule},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
    prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::nullable;
use crate::{
    access::{
        check, customer_name_matches, customer_names, existing_user, find_scoped, icontains,
        invalid_pk, list_scoped, paginate, user_names,
    },
    extract::{Body, Caller, optional_json},
    http::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route(
            "/{id}",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
        .route("/{id}/complete", post(complete))
        .route("/{id}/reschedule", post(reschedule))
}

#[derive(Debug, Serialize)]
pub struct FollowUpView {
    id: Uuid,
    interaction: Uuid,
    customer: Uuid,
    customer_name: Option<String>,
    follow_up_type: follow_up::FollowUpType,
    follow_up_type_display: &'static str,
    scheduled_date: NaiveDate,
    scheduled_time: Option<NaiveTime>,
    assigned_to: Uuid,
    assigned_to_name: Option<String>,
    notes: String,
    priority: follow_up::Priority,
    priority_display: &'static str,
    status: follow_up::Status,
    status_display: &'static str,
    result: String,
    completed_at: Option<DateTimeWithTimeZone>,
    completed_by: Option<Uuid>,
    completed_by_name: Option<String>,
    created_by: Uuid,
    created_by_name: Option<String>,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

pub(crate) async fn render(
    state: &AppState,
    rows: Vec<follow_up::Model>,
) -> ApiResult<Vec<FollowUpView>> {
    let customers = customer_names(&state.db, rows.iter().map(|f| f.customer_id)).await?;
    let people = user_names(
        &state.db,
        rows.iter().flat_map(|f| {
            [Some(f.assigned_to_id), Some(f.created_by_id), f.completed_by_id]
                .into_iter()
                .flatten()
        }),
    )
    .await?;
    let name = |id: Uuid| people.get(&id).cloned();
    Ok(rows
        .into_iter()
        .map(|f| FollowUpView {
            customer_name: customers.get(&f.customer_id).cloned(),
            follow_up_type_display: f.follow_up_type.label(),
            assigned_to_name: name(f.assigned_to_id),
            priority_display: f.priority.label(),
            status_display: f.status.label(),
            completed_by_name: f.completed_by_id.and_then(name),
            created_by_name: name(f.created_by_id),
            id: f.id,
            interaction: f.interaction_id,
            customer: f.customer_id,
            follow_up_type: f.follow_up_type,
            scheduled_date: f.scheduled_date,
            scheduled_time: f.scheduled_time,
            assigned_to: f.assigned_to_id,
            notes: f.notes,
            priority: f.priority,
            status: f.status,
            result: f.result,
            completed_at: f.completed_at,
            completed_by: f.completed_by_id,
            created_by: f.created_by_id,
            created_at: f.created_at,
            updated_at: f.updated_at,
        })
        .collect())
}

pub(crate) async fn render_one(state: &AppState, row: follow_up::Model) -> ApiResult<FollowUpView> {
    render(state, vec![row])
        .await?
        .pop()
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
struct Filters {
    customer: Option<Uuid>,
    follow_up_type: Option<follow_up::FollowUpType>,
    status: Option<follow_up::Status>,
    priority: Option<follow_up::Priority>,
    assigned_to: Option<Uuid>,
    created_by: Option<Uuid>,
    search: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(filters): Query<Filters>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<FollowUpView>>> {
    let mut select = list_scoped::<follow_up::Entity>(&state, &caller.principal)?;
    if let Some(customer) = filters.customer {
        select = select.filter(follow_up::Column::CustomerId.eq(customer));
    }
    if let Some(kind) = filters.follow_up_type {
        select = select.filter(follow_up::Column::FollowUpType.eq(kind));
    }
    if let Some(status) = filters.status {
        select = select.filter(follow_up::Column::Status.eq(status));
    }
    if let Some(priority) = filters.priority {
        select = select.filter(follow_up::Column::Priority.eq(priority));
    }
    if let Some(assignee) = filters.assigned_to {
        select = select.filter(follow_up::Column::AssignedToId.eq(assignee));
    }
    if let Some(creator) = filters.created_by {
        select = select.filter(follow_up::Column::CreatedById.eq(creator));
    }
    if let Some(term) = filters.search.filter(|s| !s.trim().is_empty()) {
        select = select.filter(
            Condition::any()
                .add(icontains(follow_up::Column::Notes, &term))
                .add(icontains(follow_up::Column::Result, &term))
                .add(customer_name_matches(follow_up::Column::CustomerId, &term)),
        );
    }
    let select = select
        .order_by_asc(follow_up::Column::Status)
        .order_by_asc(follow_up::Column::ScheduledDate)
        .order_by_asc(follow_up::Column::ScheduledTime);
    let (rows, page) = paginate(&state.db, select, page).await?.take_results();
    Ok(Json(page.with_results(render(&state, rows).await?)))
}

/// A follow-up about to be scheduled against an interaction.
pub(crate) struct Draft {
    pub interaction: interaction::Model,
    pub follow_up_type: follow_up::FollowUpType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<NaiveTime>,
    pub assigned_to: Uuid,
    pub notes: String,
    pub priority: follow_up::Priority,
}

/// Authorizes and inserts a follow-up created by `principal`. The customer
/// always comes from the interaction.
pub(crate) async fn schedule(
    state: &AppState,
    principal: &Principal,
    draft: Draft,
) -> ApiResult<follow_up::Model> {
    let customer_id = draft.interaction.customer_id;
    check(
        state,
        principal,
        &facts::follow_up_on(&state.db, customer_id, principal.id, draft.assigned_to).await?,
        Operation::CREATE,
    )?;
    existing_user(&state.db, "assigned_to", draft.assigned_to).await?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = follow_up::ActiveModel {
        id: Set(Uuid::new_v4()),
        interaction_id: Set(draft.interaction.id),
        customer_id: Set(customer_id),
        follow_up_type: Set(draft.follow_up_type),
        scheduled_date: Set(draft.scheduled_date),
        scheduled_time: Set(draft.scheduled_time),
        assigned_to_id: Set(draft.assigned_to),
        notes: Set(draft.notes),
        priority: Set(draft.priority),
        status: Set(follow_up::Status::Pending),
        result: Set(String::new()),
        completed_at: Set(None),
        completed_by_id: Set(None),
        created_by_id: Set(principal.id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;
    info!(
        follow_up = %created.id,
        interaction = %created.interaction_id,
        assigned_to = %created.assigned_to_id,
        by = %principal.id,
        "follow-up scheduled"
    );
    Ok(created)
}

#[derive(Debug, Default, Deserialize)]
struct FollowUpInput {
    interaction: Option<Uuid>,
    follow_up_type: Option<follow_up::FollowUpType>,
    scheduled_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable")]
    scheduled_time: Option<Option<NaiveTime>>,
    assigned_to: Option<Uuid>,
    notes: Option<String>,
    priority: Option<follow_up::Priority>,
    status: Option<follow_up::Status>,
    result: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(input): Body<FollowUpInput>,
) -> ApiResult<(StatusCode, Json<FollowUpView>)> {
    let principal = caller.principal;
    let mut errors = FieldErrors::new();
    let interaction_id = errors.require("interaction", input.interaction);
    let follow_up_type = errors.require("follow_up_type", input.follow_up_type);
    let scheduled_date = errors.require("scheduled_date", input.scheduled_date);
    let assigned_to = errors.require("assigned_to", input.assigned_to);
    let (Some(interaction_id), Some(follow_up_type), Some(scheduled_date), Some(assigned_to)) =
        (interaction_id, follow_up_type, scheduled_date, assigned_to)
    else {
        if !principal.authenticated {
            return Err(ApiError::unauthenticated());
        }
        return Err(errors.into());
    };

    let source = interaction::Entity::find_by_id(interaction_id)
        .one(&state.db)
        .await?;
    let Some(source) = source else {
        if !principal.authenticated {
            return Err(ApiError::unauthenticated());
        }
        return Err(invalid_pk("interaction", interaction_id));
    };
    let created = schedule(
        &state,
        &principal,
        Draft {
            interaction: source,
            follow_up_type,
            scheduled_date,
            scheduled_time: input.scheduled_time.flatten(),
            assigned_to,
            notes: input.notes.unwrap_or_default(),
            priority: input.priority.unwrap_or(follow_up::Priority::Medium),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(render_one(&state, created).await?)))
}

async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FollowUpView>> {
    let found = find_scoped::<follow_up::Entity>(&state, &caller.principal, id).await?;
    Ok(Json(render_one(&state, found).await?))
}

async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Body(input): Body<FollowUpInput>,
) -> ApiResult<Json<FollowUpView>> {
    let principal = caller.principal;
    let current = find_scoped::<follow_up::Entity>(&state, &principal, id).await?;
    check(
        &state,
        &principal,
        &facts::follow_up(&state.db, &current).await?,
        Operation::UPDATE,
    )?;
    if let Some(assignee) = input.assigned_to {
        existing_user(&state.db, "assigned_to", assignee).await?;
    }
    let moved_to = match input.interaction {
        Some(interaction_id) if interaction_id != current.interaction_id => Some(
            interaction::Entity::find_by_id(interaction_id)
                .one(&state.db)
                .await?
                .ok_or_else(|| invalid_pk("interaction", interaction_id))?,
        ),
        _ => None,
    };

    let now: DateTimeWithTimeZone = Utc::now().into();
    let completing = input.status == Some(follow_up::Status::Completed)
        && current.status != follow_up::Status::Completed;
    let mut changes: follow_up::ActiveModel = current.into();
    if let Some(source) = moved_to {
        changes.interaction_id = Set(source.id);
        changes.customer_id = Set(source.customer_id);
    }
    if let Some(v) = input.follow_up_type {
        changes.follow_up_type = Set(v);
    }
    if let Some(v) = input.scheduled_date {
        changes.scheduled_date = Set(v);
    }
    if let Some(v) = input.scheduled_time {
        changes.scheduled_time = Set(v);
    }
    if let Some(v) = input.assigned_to {
        changes.assigned_to_id = Set(v);
    }
    if let Some(v) = input.notes {
        changes.notes = Set(v);
    }
    if let Some(v) = input.priority {
        changes.priority = Set(v);
    }
    if let Some(v) = input.status {
        changes.status = Set(v);
    }
    if let Some(v) = input.result {
        changes.result = Set(v);
    }
    if completing {
        changes.completed_at = Set(Some(now));
        changes.completed_by_id = Set(Some(principal.id));
    }
    changes.updated_at = Set(now);
    let updated = changes.update(&state.db).await?;
    Ok(Json(render_one(&state, updated).await?))
}

async fn destroy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let current = find_scoped::<follow_up::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::follow_up(&state.db, &current).await?,
        Operation::DELETE,
    )?;
    follow_up::Entity::delete_by_id(current.id)
        .exec(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

const CHANGED_UNDERNEATH: &str = "The follow-up changed while this action was in progress.";

#[derive(Debug, Default, Deserialize)]
struct CompleteInput {
    result: Option<String>,
}

async fn complete(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<FollowUpView>> {
    let principal = caller.principal;
    let current = find_scoped::<follow_up::Entity>(&state, &principal, id).await?;
    check(
        &state,
        &principal,
        &facts::follow_up(&state.db, &current).await?,
        Operation::UPDATE,
    )?;
    let step = lifecycle::complete(mapping::follow_up_status(current.status))?;
    let input: CompleteInput = optional_json(&body)?;

    let from: Vec<follow_up::Status> = lifecycle::completable()
        .into_iter()
        .map(mapping::stored_follow_up_status)
        .collect();
    let landed = transitions::complete_follow_up(
        &state.db,
        id,
        &from,
        principal.id,
        input.result.unwrap_or_default(),
    )
    .await?;
    let reloaded = follow_up::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !landed {
        lifecycle::complete(mapping::follow_up_status(reloaded.status))?;
        return Err(ApiError::InvalidStateTransition(CHANGED_UNDERNEATH.into()));
    }
    info!(follow_up = %id, from = ?step.from, by = %principal.id, "follow-up completed");
    Ok(Json(render_one(&state, reloaded).await?))
}

#[derive(Debug, Default, Deserialize)]
struct RescheduleInput {
    scheduled_date: Option<NaiveDate>,
    scheduled_time: Option<NaiveTime>,
    notes: Option<String>,
}

async fn reschedule(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<FollowUpView>> {
    let principal = caller.principal;
    let current = find_scoped::<follow_up::Entity>(&state, &principal, id).await?;
    check(
        &state,
        &principal,
        &facts::follow_up(&state.db, &current).await?,
        Operation::UPDATE,
    )?;
    let step = lifecycle::reschedule(mapping::follow_up_status(current.status))?;
    let input: RescheduleInput = optional_json(&body)?;
    let mut errors = FieldErrors::new();
    let Some(scheduled_date) = errors.require("scheduled_date", input.scheduled_date) else {
        return Err(errors.into());
    };

    let from: Vec<follow_up::Status> = lifecycle::reschedulable()
        .into_iter()
        .map(mapping::stored_follow_up_status)
        .collect();
    let landed = transitions::reschedule_follow_up(
        &state.db,
        id,
        &from,
        Reschedule {
            scheduled_date,
            scheduled_time: input.scheduled_time,
            notes: input.notes,
        },
    )
    .await?;
    let reloaded = follow_up::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !landed {
        lifecycle::reschedule(mapping::follow_up_status(reloaded.status))?;
        return Err(ApiError::InvalidStateTransition(CHANGED_UNDERNEATH.into()));
    }
    info!(
        follow_up = %id,
        from = ?step.from,
        scheduled_date = %scheduled_date,
        by = %principal.id,
        "follow-up rescheduled"
    );
    Ok(Json(render_one(&state, reloaded).await?))
}

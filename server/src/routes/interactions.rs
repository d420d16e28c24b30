use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{NaiveDate, NaiveTime, Utc};
use entity::{customer, follow_up, interaction, loan};
use platform_api::{ApiError, ApiResult, FieldErrors, Page, PageParams};
use platform_authz::Operation;
use platform_db::facts;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
    prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    follow_ups::{self, Draft, FollowUpView},
    nullable,
};
use crate::{
    access::{
        check, customer_name_matches, customer_names, find_scoped, icontains, invalid_pk,
        list_scoped, loans_by_id, paginate, user_names,
    },
    extract::{Body, Caller},
    http::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route(
            "/{id}",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
        .route("/{id}/create_follow_up", post(create_follow_up))
}

#[derive(Debug, Serialize)]
pub struct InteractionView {
    id: Uuid,
    customer: Uuid,
    customer_name: Option<String>,
    loan: Option<Uuid>,
    loan_reference: Option<String>,
    interaction_type: interaction::InteractionType,
    interaction_type_display: &'static str,
    initiated_by: Uuid,
    initiated_by_name: Option<String>,
    contact_number: String,
    contact_person: String,
    start_time: DateTimeWithTimeZone,
    end_time: Option<DateTimeWithTimeZone>,
    duration_seconds: Option<i32>,
    outcome: Option<interaction::Outcome>,
    outcome_display: Option<&'static str>,
    notes: String,
    payment_promise_amount_cents: Option<i64>,
    payment_promise_date: Option<NaiveDate>,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

pub(crate) async fn render(
    state: &AppState,
    rows: Vec<interaction::Model>,
) -> ApiResult<Vec<InteractionView>> {
    let customers = customer_names(&state.db, rows.iter().map(|i| i.customer_id)).await?;
    let loans = loans_by_id(&state.db, rows.iter().filter_map(|i| i.loan_id)).await?;
    let agents = user_names(&state.db, rows.iter().map(|i| i.initiated_by_id)).await?;
    Ok(rows
        .into_iter()
        .map(|i| InteractionView {
            customer_name: customers.get(&i.customer_id).cloned(),
            loan_reference: i
                .loan_id
                .and_then(|id| loans.get(&id))
                .map(|l| l.loan_reference.clone()),
            interaction_type_display: i.interaction_type.label(),
            initiated_by_name: agents.get(&i.initiated_by_id).cloned(),
            outcome_display: i.outcome.map(interaction::Outcome::label),
            id: i.id,
            customer: i.customer_id,
            loan: i.loan_id,
            interaction_type: i.interaction_type,
            initiated_by: i.initiated_by_id,
            contact_number: i.contact_number,
            contact_person: i.contact_person,
            start_time: i.start_time,
            end_time: i.end_time,
            duration_seconds: i.duration_seconds,
            outcome: i.outcome,
            notes: i.notes,
            payment_promise_amount_cents: i.payment_promise_amount_cents,
            payment_promise_date: i.payment_promise_date,
            created_at: i.created_at,
            updated_at: i.updated_at,
        })
        .collect())
}

async fn render_one(state: &AppState, row: interaction::Model) -> ApiResult<InteractionView> {
    render(state, vec![row])
        .await?
        .pop()
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
struct Filters {
    customer: Option<Uuid>,
    loan: Option<Uuid>,
    interaction_type: Option<interaction::InteractionType>,
    outcome: Option<interaction::Outcome>,
    initiated_by: Option<Uuid>,
    search: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(filters): Query<Filters>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<InteractionView>>> {
    let mut select = list_scoped::<interaction::Entity>(&state, &caller.principal)?;
    if let Some(customer) = filters.customer {
        select = select.filter(interaction::Column::CustomerId.eq(customer));
    }
    if let Some(loan) = filters.loan {
        select = select.filter(interaction::Column::LoanId.eq(loan));
    }
    if let Some(kind) = filters.interaction_type {
        select = select.filter(interaction::Column::InteractionType.eq(kind));
    }
    if let Some(outcome) = filters.outcome {
        select = select.filter(interaction::Column::Outcome.eq(outcome));
    }
    if let Some(agent) = filters.initiated_by {
        select = select.filter(interaction::Column::InitiatedById.eq(agent));
    }
    if let Some(term) = filters.search.filter(|s| !s.trim().is_empty()) {
        select = select.filter(
            Condition::any()
                .add(icontains(interaction::Column::Notes, &term))
                .add(icontains(interaction::Column::ContactPerson, &term))
                .add(customer_name_matches(interaction::Column::CustomerId, &term)),
        );
    }
    let select = select.order_by_desc(interaction::Column::StartTime);
    let (rows, page) = paginate(&state.db, select, page).await?.take_results();
    Ok(Json(page.with_results(render(&state, rows).await?)))
}

#[derive(Debug, Default, Deserialize)]
struct InteractionInput {
    customer: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable")]
    loan: Option<Option<Uuid>>,
    interaction_type: Option<interaction::InteractionType>,
    contact_number: Option<String>,
    contact_person: Option<String>,
    start_time: Option<DateTimeWithTimeZone>,
    #[serde(default, deserialize_with = "nullable")]
    end_time: Option<Option<DateTimeWithTimeZone>>,
    #[serde(default, deserialize_with = "nullable")]
    outcome: Option<Option<interaction::Outcome>>,
    notes: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    payment_promise_amount_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    payment_promise_date: Option<Option<NaiveDate>>,
}

/// Checks the customer exists and that the loan, if any, is one of theirs.
async fn validate_links(
    state: &AppState,
    customer_id: Uuid,
    loan_id: Option<Uuid>,
    start: &DateTimeWithTimeZone,
    end: Option<&DateTimeWithTimeZone>,
) -> ApiResult<()> {
    if customer::Entity::find_by_id(customer_id)
        .one(&state.db)
        .await?
        .is_none()
    {
        return Err(invalid_pk("customer", customer_id));
    }
    let mut errors = FieldErrors::new();
    if let Some(loan_id) = loan_id {
        match loan::Entity::find_by_id(loan_id).one(&state.db).await? {
            None => return Err(invalid_pk("loan", loan_id)),
            Some(found) if found.customer_id != customer_id => {
                errors.add("loan", "The selected loan does not belong to this customer.");
            }
            Some(_) => {}
        }
    }
    if end.is_some_and(|end| end < start) {
        errors.add("end_time", "End time cannot be before start time.");
    }
    Ok(errors.into_result()?)
}

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(input): Body<InteractionInput>,
) -> ApiResult<(StatusCode, Json<InteractionView>)> {
    let principal = caller.principal;
    let mut errors = FieldErrors::new();
    let customer_id = errors.require("customer", input.customer);
    let kind = errors.require("interaction_type", input.interaction_type);
    let start_time = errors.require("start_time", input.start_time);
    let notes = errors.require("notes", input.notes.filter(|n| !n.trim().is_empty()));
    let (Some(customer_id), Some(kind), Some(start_time), Some(notes)) =
        (customer_id, kind, start_time, notes)
    else {
        if !principal.authenticated {
            return Err(ApiError::unauthenticated());
        }
        return Err(errors.into());
    };

    check(
        &state,
        &principal,
        &facts::interaction_on(&state.db, customer_id, principal.id).await?,
        Operation::CREATE,
    )?;
    let loan_id = input.loan.flatten();
    let end_time = input.end_time.flatten();
    validate_links(&state, customer_id, loan_id, &start_time, end_time.as_ref()).await?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = interaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        loan_id: Set(loan_id),
        interaction_type: Set(kind),
        initiated_by_id: Set(principal.id),
        contact_number: Set(input.contact_number.unwrap_or_default()),
        contact_person: Set(input.contact_person.unwrap_or_default()),
        start_time: Set(start_time),
        duration_seconds: Set(interaction::duration_seconds(&start_time, end_time.as_ref())),
        end_time: Set(end_time),
        outcome: Set(input.outcome.flatten()),
        notes: Set(notes),
        payment_promise_amount_cents: Set(input.payment_promise_amount_cents.flatten()),
        payment_promise_date: Set(input.payment_promise_date.flatten()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;
    info!(
        interaction = %created.id,
        customer = %customer_id,
        by = %principal.id,
        "interaction logged"
    );
    Ok((StatusCode::CREATED, Json(render_one(&state, created).await?)))
}

async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InteractionView>> {
    let found = find_scoped::<interaction::Entity>(&state, &caller.principal, id).await?;
    Ok(Json(render_one(&state, found).await?))
}

async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Body(input): Body<InteractionInput>,
) -> ApiResult<Json<InteractionView>> {
    let current = find_scoped::<interaction::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::interaction(&state.db, &current).await?,
        Operation::UPDATE,
    )?;
    if input.notes.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::field("notes", "This field may not be blank."));
    }

    let customer_id = input.customer.unwrap_or(current.customer_id);
    let loan_id = input.loan.unwrap_or(current.loan_id);
    let start_time = input.start_time.unwrap_or(current.start_time);
    let end_time = input.end_time.unwrap_or(current.end_time);
    validate_links(&state, customer_id, loan_id, &start_time, end_time.as_ref()).await?;

    let mut changes: interaction::ActiveModel = current.into();
    changes.customer_id = Set(customer_id);
    changes.loan_id = Set(loan_id);
    changes.start_time = Set(start_time);
    changes.duration_seconds = Set(interaction::duration_seconds(&start_time, end_time.as_ref()));
    changes.end_time = Set(end_time);
    if let Some(v) = input.interaction_type {
        changes.interaction_type = Set(v);
    }
    if let Some(v) = input.contact_number {
        changes.contact_number = Set(v);
    }
    if let Some(v) = input.contact_person {
        changes.contact_person = Set(v);
    }
    if let Some(v) = input.outcome {
        changes.outcome = Set(v);
    }
    if let Some(v) = input.notes {
        changes.notes = Set(v);
    }
    if let Some(v) = input.payment_promise_amount_cents {
        changes.payment_promise_amount_cents = Set(v);
    }
    if let Some(v) = input.payment_promise_date {
        changes.payment_promise_date = Set(v);
    }
    changes.updated_at = Set(Utc::now().into());
    let updated = changes.update(&state.db).await?;
    Ok(Json(render_one(&state, updated).await?))
}

async fn destroy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let current = find_scoped::<interaction::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::interaction(&state.db, &current).await?,
        Operation::DELETE,
    )?;
    interaction::Entity::delete_by_id(current.id)
        .exec(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct FollowUpRequest {
    follow_up_type: Option<follow_up::FollowUpType>,
    scheduled_date: Option<NaiveDate>,
    scheduled_time: Option<NaiveTime>,
    assigned_to: Option<Uuid>,
    notes: Option<String>,
    priority: Option<follow_up::Priority>,
}

async fn create_follow_up(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Body(input): Body<FollowUpRequest>,
) -> ApiResult<(StatusCode, Json<FollowUpView>)> {
    let source = find_scoped::<interaction::Entity>(&state, &caller.principal, id).await?;

    let mut errors = FieldErrors::new();
    let follow_up_type = errors.require("follow_up_type", input.follow_up_type);
    let scheduled_date = errors.require("scheduled_date", input.scheduled_date);
    let assigned_to = errors.require("assigned_to", input.assigned_to);
    let (Some(follow_up_type), Some(scheduled_date), Some(assigned_to)) =
        (follow_up_type, scheduled_date, assigned_to)
    else {
        return Err(errors.into());
    };

    let created = follow_ups::schedule(
        &state,
        &caller.principal,
        Draft {
            interaction: source,
            follow_up_type,
            scheduled_date,
            scheduled_time: input.scheduled_time,
            assigned_to,
            notes: input.notes.unwrap_or_default(),
            priority: input.priority.unwrap_or(follow_up::Priority::Medium),
        },
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(follow_ups::render_one(&state, created).await?),
    ))
}

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use entity::{customer, loan, payment};
use platform_api::{ApiError, ApiResult, FieldErrors, Page, PageParams};
use platform_authz::{LifecycleError, LoanStatus, Operation, Principal, Role, Transition, lifecycle};
use platform_db::{facts, mapping, transitions};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{nullable, payments};
use crate::{
    access::{
        check, customer_names, existing_user, find_scoped, icontains, invalid_pk, list_scoped,
        paginate, user_names,
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
        .route("/{id}/payments", get(loan_payments))
        .route("/{id}/approve", post(approve))
        .route("/{id}/restructure", post(restructure))
        .route("/{id}/write_off", post(write_off))
}

#[derive(Debug, Serialize)]
pub struct LoanView {
    id: Uuid,
    customer: Uuid,
    customer_name: Option<String>,
    loan_reference: String,
    status: loan::Status,
    status_display: &'static str,
    principal_cents: i64,
    interest_rate_bps: i32,
    term_months: i32,
    payment_frequency: loan::PaymentFrequency,
    payment_frequency_display: &'static str,
    application_date: NaiveDate,
    approval_date: Option<NaiveDate>,
    disbursement_date: Option<NaiveDate>,
    first_payment_date: Option<NaiveDate>,
    maturity_date: Option<NaiveDate>,
    amount_paid_cents: i64,
    total_amount_due_cents: i64,
    remaining_balance_cents: i64,
    last_payment_date: Option<NaiveDate>,
    days_past_due: i32,
    payment_status: &'static str,
    assigned_officer: Option<Uuid>,
    assigned_officer_name: Option<String>,
    notes: String,
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

pub(crate) async fn render(state: &AppState, rows: Vec<loan::Model>) -> ApiResult<Vec<LoanView>> {
    let customers = customer_names(&state.db, rows.iter().map(|l| l.customer_id)).await?;
    let officers = user_names(&state.db, rows.iter().filter_map(|l| l.assigned_officer_id)).await?;
    Ok(rows
        .into_iter()
        .map(|l| LoanView {
            customer_name: customers.get(&l.customer_id).cloned(),
            status_display: l.status.label(),
            payment_frequency_display: l.payment_frequency.label(),
            total_amount_due_cents: l.total_amount_due_cents(),
            remaining_balance_cents: l.remaining_balance_cents(),
            payment_status: l.payment_status(),
            assigned_officer_name: l
                .assigned_officer_id
                .and_then(|id| officers.get(&id).cloned()),
            id: l.id,
            customer: l.customer_id,
            loan_reference: l.loan_reference,
            status: l.status,
            principal_cents: l.principal_cents,
            interest_rate_bps: l.interest_rate_bps,
            term_months: l.term_months,
            payment_frequency: l.payment_frequency,
            application_date: l.application_date,
            approval_date: l.approval_date,
            disbursement_date: l.disbursement_date,
            first_payment_date: l.first_payment_date,
            maturity_date: l.maturity_date,
            amount_paid_cents: l.amount_paid_cents,
            last_payment_date: l.last_payment_date,
            days_past_due: l.days_past_due,
            assigned_officer: l.assigned_officer_id,
            notes: l.notes,
            created_by: l.created_by_id,
            updated_by: l.updated_by_id,
            created_at: l.created_at,
            updated_at: l.updated_at,
        })
        .collect())
}

async fn render_one(state: &AppState, row: loan::Model) -> ApiResult<LoanView> {
    render(state, vec![row])
        .await?
        .pop()
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
struct Filters {
    customer: Option<Uuid>,
    status: Option<loan::Status>,
    assigned_officer: Option<Uuid>,
    search: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(filters): Query<Filters>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<LoanView>>> {
    let mut select = list_scoped::<loan::Entity>(&state, &caller.principal)?;
    if let Some(customer) = filters.customer {
        select = select.filter(loan::Column::CustomerId.eq(customer));
    }
    if let Some(status) = filters.status {
        select = select.filter(loan::Column::Status.eq(status));
    }
    if let Some(officer) = filters.assigned_officer {
        select = select.filter(loan::Column::AssignedOfficerId.eq(officer));
    }
    if let Some(term) = filters.search.filter(|s| !s.trim().is_empty()) {
        select = select.filter(icontains(loan::Column::LoanReference, &term));
    }
    let select = select.order_by_desc(loan::Column::ApplicationDate);
    let (rows, page) = paginate(&state.db, select, page).await?.take_results();
    Ok(Json(page.with_results(render(&state, rows).await?)))
}

#[derive(Debug, Default, Deserialize)]
struct LoanInput {
    customer: Option<Uuid>,
    status: Option<loan::Status>,
    principal_cents: Option<i64>,
    interest_rate_bps: Option<i32>,
    term_months: Option<i32>,
    payment_frequency: Option<loan::PaymentFrequency>,
    #[serde(default, deserialize_with = "nullable")]
    disbursement_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    first_payment_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    maturity_date: Option<Option<NaiveDate>>,
    days_past_due: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    assigned_officer: Option<Option<Uuid>>,
    notes: Option<String>,
}

/// Ten billion less one cent, the widest amount the ledger stores.
const MAX_PRINCIPAL_CENTS: i64 = 999_999_999_999;
/// 999.99 percent.
const MAX_INTEREST_RATE_BPS: i64 = 99_999;
const MAX_TERM_MONTHS: i64 = 600;

fn bounded(errors: &mut FieldErrors, field: &str, value: Option<i64>, min: i64, max: i64) {
    match value {
        Some(v) if v < min => {
            errors.add(field, format!("Ensure this value is greater than or equal to {min}."))
        }
        Some(v) if v > max => {
            errors.add(field, format!("Ensure this value is less than or equal to {max}."))
        }
        _ => {}
    }
}

impl LoanInput {
    async fn validate(&self, state: &AppState) -> ApiResult<Option<customer::Model>> {
        let mut errors = FieldErrors::new();
        bounded(&mut errors, "principal_cents", self.principal_cents, 1, MAX_PRINCIPAL_CENTS);
        bounded(
            &mut errors,
            "interest_rate_bps",
            self.interest_rate_bps.map(i64::from),
            0,
            MAX_INTEREST_RATE_BPS,
        );
        bounded(
            &mut errors,
            "term_months",
            self.term_months.map(i64::from),
            1,
            MAX_TERM_MONTHS,
        );
        if self.days_past_due.is_some_and(|v| v < 0) {
            errors.add(
                "days_past_due",
                "Ensure this value is greater than or equal to 0.",
            );
        }
        errors.into_result()?;

        if let Some(Some(officer)) = self.assigned_officer {
            existing_user(&state.db, "assigned_officer", officer).await?;
        }
        let Some(customer_id) = self.customer else {
            return Ok(None);
        };
        let owner = customer::Entity::find_by_id(customer_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| invalid_pk("customer", customer_id))?;
        Ok(Some(owner))
    }

    fn apply(self, target: &mut loan::ActiveModel) {
        if let Some(v) = self.customer {
            target.customer_id = Set(v);
        }
        if let Some(v) = self.status {
            target.status = Set(v);
        }
        if let Some(v) = self.principal_cents {
            target.principal_cents = Set(v);
        }
        if let Some(v) = self.interest_rate_bps {
            target.interest_rate_bps = Set(v);
        }
        if let Some(v) = self.term_months {
            target.term_months = Set(v);
        }
        if let Some(v) = self.payment_frequency {
            target.payment_frequency = Set(v);
        }
        if let Some(v) = self.disbursement_date {
            target.disbursement_date = Set(v);
        }
        if let Some(v) = self.first_payment_date {
            target.first_payment_date = Set(v);
        }
        if let Some(v) = self.maturity_date {
            target.maturity_date = Set(v);
        }
        if let Some(v) = self.days_past_due {
            target.days_past_due = Set(v);
        }
        if let Some(v) = self.assigned_officer {
            target.assigned_officer_id = Set(v);
        }
        if let Some(v) = self.notes {
            target.notes = Set(v);
        }
    }
}

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(mut input): Body<LoanInput>,
) -> ApiResult<(StatusCode, Json<LoanView>)> {
    let principal = caller.principal;
    if input.assigned_officer.is_none() && principal.role == Role::CollectionOfficer {
        input.assigned_officer = Some(Some(principal.id));
    }

    let mut errors = FieldErrors::new();
    errors.require("customer", input.customer);
    errors.require("principal_cents", input.principal_cents);
    errors.require("interest_rate_bps", input.interest_rate_bps);
    errors.require("term_months", input.term_months);
    if !errors.is_empty() {
        if !principal.authenticated {
            return Err(ApiError::unauthenticated());
        }
        return Err(errors.into());
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let pending = loan::Model {
        id: Uuid::new_v4(),
        customer_id: input.customer.unwrap_or_default(),
        loan_reference: entity::reference("LN"),
        status: input.status.unwrap_or(loan::Status::Pending),
        principal_cents: input.principal_cents.unwrap_or_default(),
        interest_rate_bps: input.interest_rate_bps.unwrap_or_default(),
        application_date: now.date_naive(),
        approval_date: None,
        disbursement_date: None,
        first_payment_date: None,
        maturity_date: None,
        term_months: input.term_months.unwrap_or_default(),
        payment_frequency: loan::PaymentFrequency::Monthly,
        amount_paid_cents: 0,
        last_payment_date: None,
        days_past_due: 0,
        assigned_officer_id: input.assigned_officer.flatten(),
        notes: String::new(),
        created_by_id: Some(principal.id),
        updated_by_id: None,
        created_at: now,
        updated_at: now,
    };
    let owner = input.validate(&state).await?;
    check(
        &state,
        &principal,
        &facts::loan_with(&pending, owner.and_then(|c| c.assigned_officer_id)),
        Operation::CREATE,
    )?;

    let mut fresh = loan::ActiveModel {
        id: Set(pending.id),
        customer_id: Set(pending.customer_id),
        loan_reference: Set(pending.loan_reference),
        status: Set(pending.status),
        principal_cents: Set(pending.principal_cents),
        interest_rate_bps: Set(pending.interest_rate_bps),
        application_date: Set(pending.application_date),
        approval_date: Set(None),
        disbursement_date: Set(None),
        first_payment_date: Set(None),
        maturity_date: Set(None),
        term_months: Set(pending.term_months),
        payment_frequency: Set(pending.payment_frequency),
        amount_paid_cents: Set(0),
        last_payment_date: Set(None),
        days_past_due: Set(0),
        assigned_officer_id: Set(pending.assigned_officer_id),
        notes: Set(String::new()),
        created_by_id: Set(Some(principal.id)),
        updated_by_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    input.apply(&mut fresh);
    let created = fresh.insert(&state.db).await?;
    info!(
        loan = %created.id,
        reference = %created.loan_reference,
        by = %principal.id,
        "loan created"
    );
    Ok((StatusCode::CREATED, Json(render_one(&state, created).await?)))
}

async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LoanView>> {
    let found = find_scoped::<loan::Entity>(&state, &caller.principal, id).await?;
    Ok(Json(render_one(&state, found).await?))
}

async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Body(input): Body<LoanInput>,
) -> ApiResult<Json<LoanView>> {
    let current = find_scoped::<loan::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::loan(&state.db, &current).await?,
        Operation::UPDATE,
    )?;
    input.validate(&state).await?;

    let mut changes: loan::ActiveModel = current.into();
    input.apply(&mut changes);
    changes.updated_by_id = Set(Some(caller.principal.id));
    changes.updated_at = Set(Utc::now().into());
    let updated = changes.update(&state.db).await?;
    Ok(Json(render_one(&state, updated).await?))
}

async fn destroy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let current = find_scoped::<loan::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::loan(&state.db, &current).await?,
        Operation::DELETE,
    )?;
    loan::Entity::delete_by_id(current.id)
        .exec(&state.db)
        .await?;
    info!(loan = %id, by = %caller.principal.id, "loan deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn loan_payments(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<payments::PaymentView>>> {
    let parent = find_scoped::<loan::Entity>(&state, &caller.principal, id).await?;
    let rows = list_scoped::<payment::Entity>(&state, &caller.principal)?
        .filter(payment::Column::LoanId.eq(parent.id))
        .order_by_desc(payment::Column::PaymentDate)
        .all(&state.db)
        .await?;
    Ok(Json(payments::render(&state, rows).await?))
}

#[derive(Clone, Copy, Debug)]
enum Action {
    Approve,
    Restructure,
    WriteOff,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Restructure => "restructure",
            Action::WriteOff => "write_off",
        }
    }

    fn step(
        self,
        status: LoanStatus,
        principal: &Principal,
    ) -> Result<Transition<LoanStatus>, LifecycleError> {
        match self {
            Action::Approve => lifecycle::approve(status, principal),
            Action::Restructure => lifecycle::restructure(status, principal),
            Action::WriteOff => lifecycle::write_off(status, principal),
        }
    }

    fn sources(self) -> Vec<loan::Status> {
        let statuses = match self {
            Action::Approve => vec![LoanStatus::Pending],
            Action::Restructure => lifecycle::RESTRUCTURABLE.to_vec(),
            Action::WriteOff => lifecycle::write_off_sources(),
        };
        statuses
            .into_iter()
            .map(mapping::stored_loan_status)
            .collect()
    }
}

/// Runs a lifecycle action: status precondition and role gate on a loan in
/// the caller's scope, then a guarded write that only lands if no one moved
/// the loan first. Ownership of the loan itself is not required.
async fn transition(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    action: Action,
) -> ApiResult<Json<LoanView>> {
    let principal = &caller.principal;
    let current = find_scoped::<loan::Entity>(state, principal, id).await?;
    let step = action.step(mapping::loan_status(current.status), principal)?;

    let approval_date = matches!(action, Action::Approve).then(|| Utc::now().date_naive());
    let landed = transitions::loan_status(
        &state.db,
        id,
        &action.sources(),
        mapping::stored_loan_status(step.to),
        principal.id,
        approval_date,
    )
    .await?;
    let reloaded = loan::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !landed {
        action.step(mapping::loan_status(reloaded.status), principal)?;
        return Err(ApiError::InvalidStateTransition(
            "The loan changed while this action was in progress.".into(),
        ));
    }

    info!(
        loan = %id,
        action = action.name(),
        from = step.from.as_str(),
        to = step.to.as_str(),
        by = %principal.id,
        "loan transitioned"
    );
    Ok(Json(render_one(state, reloaded).await?))
}

async fn approve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LoanView>> {
    transition(&state, &caller, id, Action::Approve).await
}

async fn restructure(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LoanView>> {
    transition(&state, &caller, id, Action::Restructure).await
}

async fn write_off(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LoanView>> {
    transition(&state, &caller, id, Action::WriteOff).await
}

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use entity::{loan, payment};
use platform_api::{ApiError, ApiResult, FieldErrors, Page, PageParams};
use platform_authz::Operation;
use platform_db::{
    facts,
    ledger::{self, LedgerError, NewPayment},
};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    access::{
        check, existing_user, find_scoped, icontains, invalid_pk, list_scoped, loans_by_id,
        paginate, user_names,
    },
    extract::{Body, Caller},
    http::AppState,
};

/// Payments are append-only: no update or delete routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(retrieve))
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    id: Uuid,
    loan: Uuid,
    loan_reference: Option<String>,
    payment_reference: String,
    amount_cents: i64,
    payment_date: NaiveDate,
    payment_method: payment::PaymentMethod,
    payment_method_display: &'static str,
    received_by: Option<Uuid>,
    received_by_name: Option<String>,
    notes: String,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

pub(crate) async fn render(
    state: &AppState,
    rows: Vec<payment::Model>,
) -> ApiResult<Vec<PaymentView>> {
    let loans = loans_by_id(&state.db, rows.iter().map(|p| p.loan_id)).await?;
    let receivers = user_names(&state.db, rows.iter().filter_map(|p| p.received_by_id)).await?;
    Ok(rows
        .into_iter()
        .map(|p| PaymentView {
            loan_reference: loans.get(&p.loan_id).map(|l| l.loan_reference.clone()),
            payment_method_display: p.payment_method.label(),
            received_by_name: p.received_by_id.and_then(|id| receivers.get(&id).cloned()),
            id: p.id,
            loan: p.loan_id,
            payment_reference: p.payment_reference,
            amount_cents: p.amount_cents,
            payment_date: p.payment_date,
            payment_method: p.payment_method,
            received_by: p.received_by_id,
            notes: p.notes,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
        .collect())
}

#[derive(Debug, Default, Deserialize)]
struct Filters {
    loan: Option<Uuid>,
    payment_method: Option<payment::PaymentMethod>,
    payment_date: Option<NaiveDate>,
    received_by: Option<Uuid>,
    search: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(filters): Query<Filters>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<PaymentView>>> {
    let mut select = list_scoped::<payment::Entity>(&state, &caller.principal)?;
    if let Some(loan) = filters.loan {
        select = select.filter(payment::Column::LoanId.eq(loan));
    }
    if let Some(method) = filters.payment_method {
        select = select.filter(payment::Column::PaymentMethod.eq(method));
    }
    if let Some(date) = filters.payment_date {
        select = select.filter(payment::Column::PaymentDate.eq(date));
    }
    if let Some(receiver) = filters.received_by {
        select = select.filter(payment::Column::ReceivedById.eq(receiver));
    }
    if let Some(term) = filters.search.filter(|s| !s.trim().is_empty()) {
        select = select.filter(
            Condition::any()
                .add(icontains(payment::Column::PaymentReference, &term))
                .add(icontains(payment::Column::Notes, &term)),
        );
    }
    let select = select
        .order_by_desc(payment::Column::PaymentDate)
        .order_by_desc(payment::Column::CreatedAt);
    let (rows, page) = paginate(&state.db, select, page).await?.take_results();
    Ok(Json(page.with_results(render(&state, rows).await?)))
}

#[derive(Debug, Default, Deserialize)]
struct PaymentInput {
    loan: Option<Uuid>,
    amount_cents: Option<i64>,
    payment_date: Option<NaiveDate>,
    payment_method: Option<payment::PaymentMethod>,
    received_by: Option<Uuid>,
    notes: Option<String>,
}

const MAX_AMOUNT_CENTS: i64 = 999_999_999_999;

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(input): Body<PaymentInput>,
) -> ApiResult<(StatusCode, Json<PaymentView>)> {
    let principal = caller.principal;
    let mut errors = FieldErrors::new();
    let loan_id = errors.require("loan", input.loan);
    let amount = errors.require("amount_cents", input.amount_cents);
    let payment_date = errors.require("payment_date", input.payment_date);
    if amount.is_some_and(|v| v < 1) {
        errors.add("amount_cents", "Ensure this value is greater than or equal to 1.");
    }
    if amount.is_some_and(|v| v > MAX_AMOUNT_CENTS) {
        errors.add(
            "amount_cents",
            format!("Ensure this value is less than or equal to {MAX_AMOUNT_CENTS}."),
        );
    }
    let (Some(loan_id), Some(amount), Some(payment_date), true) =
        (loan_id, amount, payment_date, errors.is_empty())
    else {
        if !principal.authenticated {
            return Err(ApiError::unauthenticated());
        }
        return Err(errors.into());
    };

    if loan::Entity::find_by_id(loan_id).one(&state.db).await?.is_none() {
        if !principal.authenticated {
            return Err(ApiError::unauthenticated());
        }
        return Err(invalid_pk("loan", loan_id));
    }
    let received_by = input.received_by.or(Some(principal.id));
    check(
        &state,
        &principal,
        &facts::payment_on(&state.db, loan_id, received_by).await?,
        Operation::CREATE,
    )?;
    if let Some(receiver) = input.received_by {
        existing_user(&state.db, "received_by", receiver).await?;
    }

    let posting = ledger::post_payment(
        &state.db,
        NewPayment {
            loan_id,
            amount_cents: amount,
            payment_date,
            payment_method: input.payment_method.unwrap_or(payment::PaymentMethod::Cash),
            received_by,
            notes: input.notes.unwrap_or_default(),
        },
    )
    .await
    .map_err(|err| match err {
        LedgerError::LoanNotFound(id) => invalid_pk("loan", id),
        LedgerError::Db(err) => err.into(),
    })?;

    let view = render(&state, vec![posting.payment])
        .await?
        .pop()
        .ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PaymentView>> {
    let found = find_scoped::<payment::Entity>(&state, &caller.principal, id).await?;
    let view = render(&state, vec![found])
        .await?
        .pop()
        .ok_or(ApiError::NotFound)?;
    Ok(Json(view))
}

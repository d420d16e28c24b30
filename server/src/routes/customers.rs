use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{NaiveDate, Utc};
use entity::{customer, interaction, loan};
use platform_api::{ApiError, ApiResult, FieldErrors, Page, PageParams};
use platform_authz::{CustomerFacts, Operation, Resource, Role};
use platform_db::facts;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{interactions, loans, nullable};
use crate::{
    access::{check, existing_user, find_scoped, icontains, list_scoped, paginate, user_names},
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
        .route("/{id}/loans", get(customer_loans))
        .route("/{id}/interactions", get(customer_interactions))
}

#[derive(Debug, Serialize)]
struct CustomerView {
    id: Uuid,
    first_name: String,
    last_name: String,
    full_name: String,
    gender: customer::Gender,
    gender_display: &'static str,
    date_of_birth: Option<NaiveDate>,
    national_id: Option<String>,
    primary_phone: String,
    secondary_phone: String,
    email: String,
    address: String,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    employer: String,
    job_title: String,
    monthly_income_cents: Option<i64>,
    assigned_officer: Option<Uuid>,
    assigned_officer_name: Option<String>,
    is_active: bool,
    notes: String,
    risk_score: Option<i32>,
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
    created_at: DateTimeWithTimeZone,
    updated_at: DateTimeWithTimeZone,
}

async fn render(state: &AppState, rows: Vec<customer::Model>) -> ApiResult<Vec<CustomerView>> {
    let names = user_names(&state.db, rows.iter().filter_map(|c| c.assigned_officer_id)).await?;
    Ok(rows
        .into_iter()
        .map(|c| CustomerView {
            full_name: c.full_name(),
            gender_display: c.gender.label(),
            assigned_officer_name: c
                .assigned_officer_id
                .and_then(|id| names.get(&id).cloned()),
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            gender: c.gender,
            date_of_birth: c.date_of_birth,
            national_id: c.national_id,
            primary_phone: c.primary_phone,
            secondary_phone: c.secondary_phone,
            email: c.email,
            address: c.address,
            city: c.city,
            state: c.state,
            postal_code: c.postal_code,
            country: c.country,
            employer: c.employer,
            job_title: c.job_title,
            monthly_income_cents: c.monthly_income_cents,
            assigned_officer: c.assigned_officer_id,
            is_active: c.is_active,
            notes: c.notes,
            risk_score: c.risk_score,
            created_by: c.created_by_id,
            updated_by: c.updated_by_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect())
}

async fn render_one(state: &AppState, row: customer::Model) -> ApiResult<CustomerView> {
    render(state, vec![row])
        .await?
        .pop()
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
struct Filters {
    gender: Option<customer::Gender>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    is_active: Option<bool>,
    assigned_officer: Option<Uuid>,
    search: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(filters): Query<Filters>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<CustomerView>>> {
    let mut select = list_scoped::<customer::Entity>(&state, &caller.principal)?;
    if let Some(gender) = filters.gender {
        select = select.filter(customer::Column::Gender.eq(gender));
    }
    if let Some(city) = filters.city {
        select = select.filter(customer::Column::City.eq(city));
    }
    if let Some(region) = filters.state {
        select = select.filter(customer::Column::State.eq(region));
    }
    if let Some(country) = filters.country {
        select = select.filter(customer::Column::Country.eq(country));
    }
    if let Some(is_active) = filters.is_active {
        select = select.filter(customer::Column::IsActive.eq(is_active));
    }
    if let Some(officer) = filters.assigned_officer {
        select = select.filter(customer::Column::AssignedOfficerId.eq(officer));
    }
    if let Some(term) = filters.search.filter(|s| !s.trim().is_empty()) {
        select = select.filter(
            Condition::any()
                .add(icontains(customer::Column::FirstName, &term))
                .add(icontains(customer::Column::LastName, &term))
                .add(icontains(customer::Column::PrimaryPhone, &term))
                .add(icontains(customer::Column::Email, &term))
                .add(icontains(customer::Column::NationalId, &term))
                .add(icontains(customer::Column::Address, &term)),
        );
    }
    let select = select
        .order_by_asc(customer::Column::LastName)
        .order_by_asc(customer::Column::FirstName);
    let (rows, page) = paginate(&state.db, select, page).await?.take_results();
    Ok(Json(page.with_results(render(&state, rows).await?)))
}

#[derive(Debug, Default, Deserialize)]
struct CustomerInput {
    first_name: Option<String>,
    last_name: Option<String>,
    gender: Option<customer::Gender>,
    #[serde(default, deserialize_with = "nullable")]
    date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    national_id: Option<Option<String>>,
    primary_phone: Option<String>,
    secondary_phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
    employer: Option<String>,
    job_title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    monthly_income_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    assigned_officer: Option<Option<Uuid>>,
    is_active: Option<bool>,
    notes: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    risk_score: Option<Option<i32>>,
}

impl CustomerInput {
    /// Field checks that need the database.
    async fn validate(&self, state: &AppState, except: Option<Uuid>) -> ApiResult<()> {
        let mut errors = FieldErrors::new();
        if let Some(Some(income)) = self.monthly_income_cents {
            if income < 0 {
                errors.add(
                    "monthly_income_cents",
                    "Ensure this value is greater than or equal to 0.",
                );
            }
        }
        if let Some(Some(national_id)) = self.national_id.as_ref() {
            let mut taken = customer::Entity::find()
                .filter(customer::Column::NationalId.eq(national_id.as_str()));
            if let Some(id) = except {
                taken = taken.filter(customer::Column::Id.ne(id));
            }
            if taken.count(&state.db).await? > 0 {
                errors.add("national_id", "customer with this national ID already exists.");
            }
        }
        errors.into_result()?;
        if let Some(Some(officer)) = self.assigned_officer {
            existing_user(&state.db, "assigned_officer", officer).await?;
        }
        Ok(())
    }

    /// Copies every provided field onto `target`.
    fn apply(self, target: &mut customer::ActiveModel) {
        if let Some(v) = self.first_name {
            target.first_name = Set(v);
        }
        if let Some(v) = self.last_name {
            target.last_name = Set(v);
        }
        if let Some(v) = self.gender {
            target.gender = Set(v);
        }
        if let Some(v) = self.date_of_birth {
            target.date_of_birth = Set(v);
        }
        if let Some(v) = self.national_id {
            target.national_id = Set(v.filter(|s| !s.trim().is_empty()));
        }
        if let Some(v) = self.primary_phone {
            target.primary_phone = Set(v);
        }
        if let Some(v) = self.secondary_phone {
            target.secondary_phone = Set(v);
        }
        if let Some(v) = self.email {
            target.email = Set(v);
        }
        if let Some(v) = self.address {
            target.address = Set(v);
        }
        if let Some(v) = self.city {
            target.city = Set(v);
        }
        if let Some(v) = self.state {
            target.state = Set(v);
        }
        if let Some(v) = self.postal_code {
            target.postal_code = Set(v);
        }
        if let Some(v) = self.country {
            target.country = Set(v);
        }
        if let Some(v) = self.employer {
            target.employer = Set(v);
        }
        if let Some(v) = self.job_title {
            target.job_title = Set(v);
        }
        if let Some(v) = self.monthly_income_cents {
            target.monthly_income_cents = Set(v);
        }
        if let Some(v) = self.assigned_officer {
            target.assigned_officer_id = Set(v);
        }
        if let Some(v) = self.is_active {
            target.is_active = Set(v);
        }
        if let Some(v) = self.notes {
            target.notes = Set(v);
        }
        if let Some(v) = self.risk_score {
            target.risk_score = Set(v);
        }
    }
}

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Body(mut input): Body<CustomerInput>,
) -> ApiResult<(StatusCode, Json<CustomerView>)> {
    let principal = caller.principal;
    // Officers create customers into their own book unless told otherwise.
    if input.assigned_officer.is_none() && principal.role == Role::CollectionOfficer {
        input.assigned_officer = Some(Some(principal.id));
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut fresh = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        gender: Set(customer::Gender::Male),
        date_of_birth: Set(None),
        national_id: Set(None),
        primary_phone: Set(String::new()),
        secondary_phone: Set(String::new()),
        email: Set(String::new()),
        address: Set(String::new()),
        city: Set(String::new()),
        state: Set(String::new()),
        postal_code: Set(String::new()),
        country: Set(String::new()),
        employer: Set(String::new()),
        job_title: Set(String::new()),
        monthly_income_cents: Set(None),
        assigned_officer_id: Set(None),
        is_active: Set(true),
        notes: Set(String::new()),
        risk_score: Set(None),
        created_by_id: Set(Some(principal.id)),
        updated_by_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    check(
        &state,
        &principal,
        &Resource::Customer(CustomerFacts {
            assigned_officer: input.assigned_officer.flatten(),
            is_active: input.is_active.unwrap_or(true),
        }),
        Operation::CREATE,
    )?;

    let mut errors = FieldErrors::new();
    errors.require("first_name", input.first_name.as_ref());
    errors.require("last_name", input.last_name.as_ref());
    errors.require("primary_phone", input.primary_phone.as_ref());
    errors.into_result()?;
    input.validate(&state, None).await?;

    input.apply(&mut fresh);
    let created = fresh.insert(&state.db).await?;
    info!(customer = %created.id, by = %principal.id, "customer created");
    Ok((StatusCode::CREATED, Json(render_one(&state, created).await?)))
}

async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CustomerView>> {
    let found = find_scoped::<customer::Entity>(&state, &caller.principal, id).await?;
    Ok(Json(render_one(&state, found).await?))
}

async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Body(input): Body<CustomerInput>,
) -> ApiResult<Json<CustomerView>> {
    let current = find_scoped::<customer::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::customer(&current),
        Operation::UPDATE,
    )?;
    input.validate(&state, Some(id)).await?;

    let mut changes: customer::ActiveModel = current.into();
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
    let current = find_scoped::<customer::Entity>(&state, &caller.principal, id).await?;
    check(
        &state,
        &caller.principal,
        &facts::customer(&current),
        Operation::DELETE,
    )?;
    customer::Entity::delete_by_id(current.id)
        .exec(&state.db)
        .await?;
    info!(customer = %id, by = %caller.principal.id, "customer deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Loans of a visible customer, narrowed to the loans the caller may read.
async fn customer_loans(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<loans::LoanView>>> {
    let owner = find_scoped::<customer::Entity>(&state, &caller.principal, id).await?;
    let rows = list_scoped::<loan::Entity>(&state, &caller.principal)?
        .filter(loan::Column::CustomerId.eq(owner.id))
        .order_by_desc(loan::Column::ApplicationDate)
        .all(&state.db)
        .await?;
    Ok(Json(loans::render(&state, rows).await?))
}

async fn customer_interactions(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<interactions::InteractionView>>> {
    let owner = find_scoped::<customer::Entity>(&state, &caller.principal, id).await?;
    let rows = list_scoped::<interaction::Entity>(&state, &caller.principal)?
        .filter(interaction::Column::CustomerId.eq(owner.id))
        .order_by_desc(interaction::Column::StartTime)
        .all(&state.db)
        .await?;
    Ok(Json(interactions::render(&state, rows).await?))
}

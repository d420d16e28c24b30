//! Shared handler plumbing: scoped loads, engine checks, pagination and the
//! name lookups the views render.

use std::collections::HashMap;

use entity::{customer, loan, user};
use platform_api::{ApiError, ApiResult, Page, PageParams};
use platform_authz::{Operation, Principal, Resource};
use platform_db::{DbPool, ScopedEntity, scope_condition};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, FromQueryResult,
    PaginatorTrait, PrimaryKeyTrait, QueryFilter, Select,
    sea_query::{Expr, Func, Query, SimpleExpr},
};
use uuid::Uuid;

use crate::http::AppState;

/// Loads `id` if the caller may read it. Rows outside the caller's scope
/// are indistinguishable from missing ones.
pub async fn find_scoped<E>(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
) -> ApiResult<E::Model>
where
    E: ScopedEntity,
    Uuid: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    let scope = state.engine.list_scope(principal, E::KIND)?;
    E::find_by_id(id)
        .filter(scope_condition::<E>(&scope))
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound)
}

/// `E::find()` narrowed to what the caller may read.
pub fn list_scoped<E: ScopedEntity>(
    state: &AppState,
    principal: &Principal,
) -> ApiResult<Select<E>> {
    let scope = state.engine.list_scope(principal, E::KIND)?;
    Ok(platform_db::scoped::<E>(&scope))
}

pub fn check(
    state: &AppState,
    principal: &Principal,
    resource: &Resource,
    op: Operation,
) -> ApiResult<()> {
    Ok(state.engine.check(principal, resource, op)?)
}

pub async fn paginate<E>(
    db: &DbPool,
    select: Select<E>,
    params: PageParams,
) -> ApiResult<Page<E::Model>>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync,
{
    let paginator = select.paginate(db, params.page_size());
    let count = paginator.num_items().await?;
    params.ensure_within(count)?;
    let results = paginator.fetch_page(params.index()).await?;
    Ok(Page::new(params, count, results))
}

/// Case-insensitive substring match.
pub fn icontains<C: ColumnTrait>(column: C, needle: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(format!("%{}%", needle.to_lowercase()))
}

/// `column` points at a customer whose first or last name contains `needle`.
pub fn customer_name_matches<C: ColumnTrait>(column: C, needle: &str) -> SimpleExpr {
    column.in_subquery(
        Query::select()
            .column(customer::Column::Id)
            .from(customer::Entity)
            .cond_where(
                Condition::any()
                    .add(icontains(customer::Column::FirstName, needle))
                    .add(icontains(customer::Column::LastName, needle)),
            )
            .to_owned(),
    )
}

pub async fn user_names<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, String>, DbErr> {
    let ids: Vec<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.full_name()))
        .collect())
}

pub async fn customer_names<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, String>, DbErr> {
    let ids: Vec<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(customer::Entity::find()
        .filter(customer::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.full_name()))
        .collect())
}

pub async fn loans_by_id<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, loan::Model>, DbErr> {
    let ids: Vec<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(loan::Entity::find()
        .filter(loan::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect())
}

/// The user behind a foreign key in a request body, or a field error.
pub async fn existing_user<C: ConnectionTrait>(
    db: &C,
    field: &str,
    id: Uuid,
) -> ApiResult<user::Model> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| invalid_pk(field, id))
}

pub fn invalid_pk(field: &str, id: Uuid) -> ApiError {
    ApiError::field(field, format!("Invalid pk \"{id}\" - object does not exist."))
}

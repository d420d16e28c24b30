//! Compare-and-set status updates. Each write only lands while the row is
//! still in one of the statuses the transition was checked against; the
//! returned flag says whether it did.

use chrono::{NaiveDate, NaiveTime, Utc};
use entity::{follow_up, loan};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use uuid::Uuid;

pub async fn loan_status<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    from: &[loan::Status],
    to: loan::Status,
    actor: Uuid,
    approval_date: Option<NaiveDate>,
) -> Result<bool, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut update = loan::Entity::update_many()
        .col_expr(loan::Column::Status, Expr::value(to))
        .col_expr(loan::Column::UpdatedById, Expr::value(Some(actor)))
        .col_expr(loan::Column::UpdatedAt, Expr::value(now));
    if let Some(date) = approval_date {
        update = update.col_expr(loan::Column::ApprovalDate, Expr::value(Some(date)));
    }
    let result = update
        .filter(loan::Column::Id.eq(id))
        .filter(loan::Column::Status.is_in(from.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

pub async fn complete_follow_up<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    from: &[follow_up::Status],
    actor: Uuid,
    result: String,
) -> Result<bool, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let outcome = follow_up::Entity::update_many()
        .col_expr(
            follow_up::Column::Status,
            Expr::value(follow_up::Status::Completed),
        )
        .col_expr(follow_up::Column::CompletedAt, Expr::value(Some(now)))
        .col_expr(follow_up::Column::CompletedById, Expr::value(Some(actor)))
        .col_expr(follow_up::Column::Result, Expr::value(result))
        .col_expr(follow_up::Column::UpdatedAt, Expr::value(now))
        .filter(follow_up::Column::Id.eq(id))
        .filter(follow_up::Column::Status.is_in(from.iter().copied()))
        .exec(db)
        .await?;
    Ok(outcome.rows_affected == 1)
}

#[derive(Clone, Debug)]
pub struct Reschedule {
    pub scheduled_date: NaiveDate,
    /// `None` keeps the stored time.
    pub scheduled_time: Option<NaiveTime>,
    /// `None` keeps the stored notes.
    pub notes: Option<String>,
}

pub async fn reschedule_follow_up<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    from: &[follow_up::Status],
    change: Reschedule,
) -> Result<bool, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut update = follow_up::Entity::update_many()
        .col_expr(
            follow_up::Column::Status,
            Expr::value(follow_up::Status::Rescheduled),
        )
        .col_expr(
            follow_up::Column::ScheduledDate,
            Expr::value(change.scheduled_date),
        )
        .col_expr(follow_up::Column::UpdatedAt, Expr::value(now));
    if let Some(time) = change.scheduled_time {
        update = update.col_expr(follow_up::Column::ScheduledTime, Expr::value(Some(time)));
    }
    if let Some(notes) = change.notes {
        update = update.col_expr(follow_up::Column::Notes, Expr::value(notes));
    }
    let outcome = update
        .filter(follow_up::Column::Id.eq(id))
        .filter(follow_up::Column::Status.is_in(from.iter().copied()))
        .exec(db)
        .await?;
    Ok(outcome.rows_affected == 1)
}

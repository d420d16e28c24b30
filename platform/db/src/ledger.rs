//! Payment posting.

use chrono::{NaiveDate, Utc};
use entity::{loan, payment};
use platform_authz::lifecycle;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::mapping;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("loan {0} not found")]
    LoanNotFound(Uuid),
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Clone, Debug)]
pub struct NewPayment {
    pub loan_id: Uuid,
    pub amount_cents: i64,
    pub payment_date: NaiveDate,
    pub payment_method: payment::PaymentMethod,
    pub received_by: Option<Uuid>,
    pub notes: String,
}

#[derive(Clone, Debug)]
pub struct Posting {
    pub payment: payment::Model,
    pub loan: loan::Model,
    /// The payment covered the remaining balance and moved the loan to Paid.
    pub settled: bool,
}

/// Inserts the payment and rolls it into the loan in one transaction.
///
/// The loan row is locked for the duration and `amount_paid_cents` is
/// incremented in SQL, so concurrent postings against the same loan add up.
/// `last_payment_date` only ever moves forward.
pub async fn post_payment(
    db: &DatabaseConnection,
    new: NewPayment,
) -> Result<Posting, LedgerError> {
    let txn = db.begin().await?;

    let locked = loan::Entity::find_by_id(new.loan_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(LedgerError::LoanNotFound(new.loan_id))?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let payment = payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        loan_id: Set(locked.id),
        payment_reference: Set(entity::reference("PMT")),
        amount_cents: Set(new.amount_cents),
        payment_date: Set(new.payment_date),
        payment_method: Set(new.payment_method),
        received_by_id: Set(new.received_by),
        notes: Set(new.notes),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    loan::Entity::update_many()
        .col_expr(
            loan::Column::AmountPaidCents,
            Expr::col(loan::Column::AmountPaidCents).add(new.amount_cents),
        )
        .col_expr(loan::Column::UpdatedAt, Expr::value(now))
        .filter(loan::Column::Id.eq(locked.id))
        .exec(&txn)
        .await?;

    let current = loan::Entity::find_by_id(locked.id)
        .one(&txn)
        .await?
        .ok_or(LedgerError::LoanNotFound(locked.id))?;

    let mut changes: loan::ActiveModel = current.clone().into();
    let mut dirty = false;
    if current
        .last_payment_date
        .is_none_or(|last| new.payment_date > last)
    {
        changes.last_payment_date = Set(Some(new.payment_date));
        dirty = true;
    }
    let mut settled = false;
    if current.amount_paid_cents >= current.total_amount_due_cents() {
        if let Some(step) = lifecycle::settle(mapping::loan_status(current.status)) {
            changes.status = Set(mapping::stored_loan_status(step.to));
            settled = true;
            dirty = true;
        }
    }
    let loan = if dirty {
        changes.update(&txn).await?
    } else {
        current
    };

    txn.commit().await?;

    info!(
        loan = %loan.id,
        payment = %payment.payment_reference,
        amount_cents = payment.amount_cents,
        settled,
        "payment posted"
    );
    Ok(Posting {
        payment,
        loan,
        settled,
    })
}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Money columns are integer cents; `interest_rate_bps` is the flat annual
/// rate in basis points.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub customer_id: Uuid,
    #[sea_orm(unique)]
    pub loan_reference: String,
    #[sea_orm(indexed)]
    pub status: Status,
    pub principal_cents: i64,
    pub interest_rate_bps: i32,
    pub application_date: Date,
    pub approval_date: Option<Date>,
    pub disbursement_date: Option<Date>,
    pub first_payment_date: Option<Date>,
    pub maturity_date: Option<Date>,
    pub term_months: i32,
    pub payment_frequency: PaymentFrequency,
    pub amount_paid_cents: i64,
    pub last_payment_date: Option<Date>,
    pub days_past_due: i32,
    #[sea_orm(indexed)]
    pub assigned_officer_id: Option<Uuid>,
    pub notes: String,
    pub created_by_id: Option<Uuid>,
    pub updated_by_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn total_amount_due_cents(&self) -> i64 {
        total_amount_due_cents(self.principal_cents, self.interest_rate_bps, self.term_months)
    }

    pub fn remaining_balance_cents(&self) -> i64 {
        self.total_amount_due_cents().saturating_sub(self.amount_paid_cents)
    }

    pub fn payment_status(&self) -> &'static str {
        if self.status == Status::Paid {
            return "Fully Paid";
        }
        match self.days_past_due {
            i32::MIN..=0 => "Current",
            1..=30 => "1-30 Days Late",
            31..=60 => "31-60 Days Late",
            61..=90 => "61-90 Days Late",
            _ => "90+ Days Late",
        }
    }
}

/// Flat interest: `principal * rate * term / 12`, rounded half up to the cent.
pub fn total_amount_due_cents(principal_cents: i64, rate_bps: i32, term_months: i32) -> i64 {
    let numerator = i128::from(principal_cents) * i128::from(rate_bps) * i128::from(term_months);
    let interest = i64::try_from((numerator + 60_000) / 120_000).unwrap_or(i64::MAX);
    principal_cents.saturating_add(interest)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedOfficerId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    AssignedOfficer,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payment,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

#[derive(
    Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "DEFAULTED")]
    Defaulted,
    #[sea_orm(string_value = "RESTRUCTURED")]
    Restructured,
    #[sea_orm(string_value = "WRITTEN_OFF")]
    WrittenOff,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::Active => "Active",
            Status::Paid => "Paid",
            Status::Defaulted => "Defaulted",
            Status::Restructured => "Restructured",
            Status::WrittenOff => "Written Off",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentFrequency {
    #[sea_orm(string_value = "DAILY")]
    Daily,
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
    #[sea_orm(string_value = "BIWEEKLY")]
    Biweekly,
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
    #[sea_orm(string_value = "QUARTERLY")]
    Quarterly,
}

impl PaymentFrequency {
    pub fn label(self) -> &'static str {
        match self {
            PaymentFrequency::Daily => "Daily",
            PaymentFrequency::Weekly => "Weekly",
            PaymentFrequency::Biweekly => "Bi-weekly",
            PaymentFrequency::Monthly => "Monthly",
            PaymentFrequency::Quarterly => "Quarterly",
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_interest_over_the_term() {
        // 10_000.00 at 12% for 12 months
        assert_eq!(total_amount_due_cents(1_000_000, 1_200, 12), 1_120_000);
        // 5_000.00 at 10% for 6 months
        assert_eq!(total_amount_due_cents(500_000, 1_000, 6), 525_000);
        assert_eq!(total_amount_due_cents(100, 0, 12), 100);
    }

    #[test]
    fn half_cents_round_up() {
        // 0.01 * 50% * 1/12 = 0.0004166 -> 0
        assert_eq!(total_amount_due_cents(1, 5_000, 1), 1);
        // 1.00 * 6% * 1/12 = 0.005 -> 0.01
        assert_eq!(total_amount_due_cents(100, 600, 1), 101);
    }

    #[test]
    fn oversized_terms_saturate_instead_of_overflowing() {
        assert_eq!(total_amount_due_cents(9_000_000_000_000_000_000, 10_000, 12), i64::MAX);
        assert_eq!(total_amount_due_cents(i64::MAX, i32::MAX, i32::MAX), i64::MAX);
    }
}

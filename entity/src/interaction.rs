use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "interactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub customer_id: Uuid,
    #[sea_orm(indexed)]
    pub loan_id: Option<Uuid>,
    pub interaction_type: InteractionType,
    #[sea_orm(indexed)]
    pub initiated_by_id: Uuid,
    pub contact_number: String,
    pub contact_person: String,
    #[sea_orm(indexed)]
    pub start_time: DateTimeWithTimeZone,
    pub end_time: Option<DateTimeWithTimeZone>,
    pub duration_seconds: Option<i32>,
    pub outcome: Option<Outcome>,
    pub notes: String,
    pub payment_promise_amount_cents: Option<i64>,
    pub payment_promise_date: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

/// Whole seconds between start and end, when both are known.
pub fn duration_seconds(
    start: &DateTimeWithTimeZone,
    end: Option<&DateTimeWithTimeZone>,
) -> Option<i32> {
    let end = end?;
    i32::try_from((*end - *start).num_seconds()).ok()
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
        belongs_to = "super::loan::Entity",
        from = "Column::LoanId",
        to = "super::loan::Column::Id",
        on_delete = "Cascade"
    )]
    Loan,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::InitiatedById",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    InitiatedBy,
    #[sea_orm(has_many = "super::follow_up::Entity")]
    FollowUp,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::follow_up::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FollowUp.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    #[sea_orm(string_value = "CALL")]
    Call,
    #[sea_orm(string_value = "MEETING")]
    Meeting,
    #[sea_orm(string_value = "EMAIL")]
    Email,
    #[sea_orm(string_value = "SMS")]
    Sms,
    #[sea_orm(string_value = "VISIT")]
    Visit,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

impl InteractionType {
    pub fn label(self) -> &'static str {
        match self {
            InteractionType::Call => "Phone Call",
            InteractionType::Meeting => "In-Person Meeting",
            InteractionType::Email => "Email",
            InteractionType::Sms => "SMS",
            InteractionType::Visit => "Field Visit",
            InteractionType::Other => "Other",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(30))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    #[sea_orm(string_value = "PAYMENT_PROMISED")]
    PaymentPromised,
    #[sea_orm(string_value = "PAYMENT_MADE")]
    PaymentMade,
    #[sea_orm(string_value = "NO_ANSWER")]
    NoAnswer,
    #[sea_orm(string_value = "WRONG_NUMBER")]
    WrongNumber,
    #[sea_orm(string_value = "NUMBER_DISCONNECTED")]
    NumberDisconnected,
    #[sea_orm(string_value = "CUSTOMER_UNAVAILABLE")]
    CustomerUnavailable,
    #[sea_orm(string_value = "DISPUTED")]
    Disputed,
    #[sea_orm(string_value = "REFUSED_TO_PAY")]
    RefusedToPay,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::PaymentPromised => "Payment Promised",
            Outcome::PaymentMade => "Payment Made",
            Outcome::NoAnswer => "No Answer",
            Outcome::WrongNumber => "Wrong Number",
            Outcome::NumberDisconnected => "Number Disconnected",
            Outcome::CustomerUnavailable => "Customer Unavailable",
            Outcome::Disputed => "Disputed",
            Outcome::RefusedToPay => "Refused to Pay",
            Outcome::Other => "Other",
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Demo fixtures and the superuser bootstrap behind the CLI.

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use entity::{customer, follow_up, hierarchy, interaction, loan, user};
use platform_api::FieldErrors;
use platform_db::{
    DbPool,
    ledger::{self, NewPayment},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    prelude::DateTimeWithTimeZone,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::routes::users;

const DEMO_PASSWORD: &str = "collections-demo";

#[derive(Debug, Default)]
pub struct SeedReport {
    pub users: usize,
    pub customers: usize,
    pub loans: usize,
}

struct Staff {
    username: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    role: user::Role,
}

const STAFF: [Staff; 4] = [
    Staff {
        username: "super.manager",
        first_name: "Sara",
        last_name: "Mensah",
        role: user::Role::SuperManager,
    },
    Staff {
        username: "manager",
        first_name: "Kofi",
        last_name: "Owusu",
        role: user::Role::Manager,
    },
    Staff {
        username: "officer",
        first_name: "Ama",
        last_name: "Boateng",
        role: user::Role::CollectionOfficer,
    },
    Staff {
        username: "agent",
        first_name: "Yaw",
        last_name: "Asante",
        role: user::Role::CallingAgent,
    },
];

/// Loads a small portfolio: one user per role, a manager/officer link, two
/// customers with loans, a posted payment and an open follow-up. Does
/// nothing when the demo staff already exist.
pub async fn run(db: &DbPool) -> Result<SeedReport> {
    let already = user::Entity::find()
        .filter(user::Column::Username.eq(STAFF[0].username))
        .count(db)
        .await?;
    if already > 0 {
        info!("demo data already present; skipping seed");
        return Ok(SeedReport::default());
    }
    warn!(password = DEMO_PASSWORD, "seeding demo staff with a shared password");

    let password_hash = platform_authn::hash_password(DEMO_PASSWORD)?;
    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut ids = Vec::with_capacity(STAFF.len());
    for staff in &STAFF {
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(staff.username.into()),
            email: Set(format!("{}@collections.local", staff.username)),
            first_name: Set(staff.first_name.into()),
            last_name: Set(staff.last_name.into()),
            phone: Set(String::new()),
            role: Set(staff.role),
            password_hash: Set(password_hash.clone()),
            is_active: Set(true),
            date_joined: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .with_context(|| format!("inserting {}", staff.username))?;
        ids.push(created.id);
    }
    let (manager, officer, agent) = (ids[1], ids[2], ids[3]);

    hierarchy::ActiveModel {
        id: Set(Uuid::new_v4()),
        manager_id: Set(manager),
        collection_officer_id: Set(officer),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    let today = now.date_naive();
    let akosua =
        insert_customer(db, "Akosua", "Darko", "+233200000001", Some(officer), now).await?;
    let kwame = insert_customer(db, "Kwame", "Addo", "+233200000002", None, now).await?;

    let active = insert_loan(
        db,
        akosua,
        (500_000, 1_200),
        loan::Status::Active,
        Some(officer),
        now,
    )
    .await?;
    insert_loan(
        db,
        akosua,
        (100_000, 1_000),
        loan::Status::Pending,
        Some(officer),
        now,
    )
    .await?;
    let defaulted = insert_loan(
        db,
        kwame,
        (250_000, 1_500),
        loan::Status::Defaulted,
        None,
        now,
    )
    .await?;

    ledger::post_payment(
        db,
        NewPayment {
            loan_id: active,
            amount_cents: 50_000,
            payment_date: today,
            payment_method: entity::payment::PaymentMethod::MobileMoney,
            received_by: Some(officer),
            notes: "First instalment".into(),
        },
    )
    .await?;

    let call = interaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(kwame),
        loan_id: Set(Some(defaulted)),
        interaction_type: Set(interaction::InteractionType::Call),
        initiated_by_id: Set(agent),
        contact_number: Set("+233200000002".into()),
        contact_person: Set("Kwame Addo".into()),
        start_time: Set(now - Duration::minutes(10)),
        end_time: Set(Some(now - Duration::minutes(6))),
        duration_seconds: Set(Some(240)),
        outcome: Set(Some(interaction::Outcome::PaymentPromised)),
        notes: Set("Promised to pay part of the arrears next week.".into()),
        payment_promise_amount_cents: Set(Some(25_000)),
        payment_promise_date: Set(Some(today + Duration::days(7))),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    follow_up::ActiveModel {
        id: Set(Uuid::new_v4()),
        interaction_id: Set(call.id),
        customer_id: Set(kwame),
        follow_up_type: Set(follow_up::FollowUpType::Call),
        scheduled_date: Set(today + Duration::days(7)),
        scheduled_time: Set(None),
        assigned_to_id: Set(agent),
        notes: Set("Confirm the promised payment.".into()),
        priority: Set(follow_up::Priority::High),
        status: Set(follow_up::Status::Pending),
        result: Set(String::new()),
        completed_at: Set(None),
        completed_by_id: Set(None),
        created_by_id: Set(agent),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    let report = SeedReport {
        users: STAFF.len(),
        customers: 2,
        loans: 3,
    };
    info!(?report, "demo data seeded");
    Ok(report)
}

async fn insert_customer(
    db: &DbPool,
    first_name: &str,
    last_name: &str,
    phone: &str,
    officer: Option<Uuid>,
    now: DateTimeWithTimeZone,
) -> Result<Uuid> {
    let created = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set(first_name.into()),
        last_name: Set(last_name.into()),
        gender: Set(customer::Gender::Other),
        date_of_birth: Set(None),
        national_id: Set(None),
        primary_phone: Set(phone.into()),
        secondary_phone: Set(String::new()),
        email: Set(String::new()),
        address: Set(String::new()),
        city: Set("Accra".into()),
        state: Set("Greater Accra".into()),
        postal_code: Set(String::new()),
        country: Set("Ghana".into()),
        employer: Set(String::new()),
        job_title: Set(String::new()),
        monthly_income_cents: Set(None),
        assigned_officer_id: Set(officer),
        is_active: Set(true),
        notes: Set(String::new()),
        risk_score: Set(None),
        created_by_id: Set(None),
        updated_by_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(created.id)
}

/// Twelve-month loan at the given principal and rate.
async fn insert_loan(
    db: &DbPool,
    customer_id: Uuid,
    (principal_cents, interest_rate_bps): (i64, i32),
    status: loan::Status,
    officer: Option<Uuid>,
    now: DateTimeWithTimeZone,
) -> Result<Uuid> {
    let today = now.date_naive();
    let approved = status != loan::Status::Pending;
    let created = loan::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        loan_reference: Set(entity::reference("LN")),
        status: Set(status),
        principal_cents: Set(principal_cents),
        interest_rate_bps: Set(interest_rate_bps),
        application_date: Set(today),
        approval_date: Set(approved.then_some(today)),
        disbursement_date: Set(approved.then_some(today)),
        first_payment_date: Set(None),
        maturity_date: Set(None),
        term_months: Set(12),
        payment_frequency: Set(loan::PaymentFrequency::Monthly),
        amount_paid_cents: Set(0),
        last_payment_date: Set(None),
        days_past_due: Set(if status == loan::Status::Defaulted { 45 } else { 0 }),
        assigned_officer_id: Set(officer),
        notes: Set(String::new()),
        created_by_id: Set(None),
        updated_by_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(created.id)
}

/// Creates an active super manager after the same checks the user API
/// applies.
pub async fn create_superuser(
    db: &DbPool,
    username: &str,
    email: &str,
    password: &str,
) -> Result<user::Model> {
    let mut errors = FieldErrors::new();
    users::validate_password(&mut errors, password);
    if let Some(messages) = errors.get("password") {
        bail!("{}", messages.join(" "));
    }
    let taken = user::Entity::find()
        .filter(
            user::Column::Username
                .eq(username)
                .or(user::Column::Email.eq(email)),
        )
        .count(db)
        .await?;
    if taken > 0 {
        bail!("a user with username {username:?} or email {email:?} already exists");
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.into()),
        email: Set(email.into()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        phone: Set(String::new()),
        role: Set(user::Role::SuperManager),
        password_hash: Set(users::hash(password)?),
        is_active: Set(true),
        date_joined: Set(now),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    info!(user = %created.id, username, "superuser created");
    Ok(created)
}

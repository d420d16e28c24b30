#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use collections_server::{
    config::AppConfig,
    http::{AppState, build_router},
};
use entity::{customer, follow_up, hierarchy, interaction, loan, user};
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use platform_db::mapping;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Set,
    Statement, prelude::DateTimeWithTimeZone,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    password_hash: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        bootstrap_sqlite(&db).await;
        let state = AppState::new(db, AppConfig::with_secret("integration-test-secret-0123456789"));
        Self {
            router: build_router(state.clone()),
            state,
            password_hash: platform_authn::hash_password(PASSWORD).unwrap(),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub async fn user(&self, username: &str, role: user::Role) -> user::Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.into()),
            email: Set(format!("{username}@example.test")),
            first_name: Set(username.into()),
            last_name: Set("Tester".into()),
            phone: Set(String::new()),
            role: Set(role),
            password_hash: Set(self.password_hash.clone()),
            is_active: Set(true),
            date_joined: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .unwrap()
    }

    pub fn token(&self, who: &user::Model) -> String {
        platform_authn::issue_access(who.id, mapping::role(who.role).as_str(), self.state.auth())
            .unwrap()
    }

    pub async fn hierarchy(&self, manager: Uuid, officer: Uuid) -> hierarchy::Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        hierarchy::ActiveModel {
            id: Set(Uuid::new_v4()),
            manager_id: Set(manager),
            collection_officer_id: Set(officer),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .unwrap()
    }

    pub async fn customer(&self, first_name: &str, officer: Option<Uuid>) -> customer::Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(first_name.into()),
            last_name: Set("Customer".into()),
            gender: Set(customer::Gender::Female),
            date_of_birth: Set(None),
            national_id: Set(None),
            primary_phone: Set("+10000000000".into()),
            secondary_phone: Set(String::new()),
            email: Set(String::new()),
            address: Set(String::new()),
            city: Set("Accra".into()),
            state: Set(String::new()),
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
        .insert(self.db())
        .await
        .unwrap()
    }

    /// 1_000.00 at 12% over 12 months: 1_120.00 due.
    pub async fn loan(
        &self,
        customer_id: Uuid,
        officer: Option<Uuid>,
        status: loan::Status,
    ) -> loan::Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        loan::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            loan_reference: Set(entity::reference("LN")),
            status: Set(status),
            principal_cents: Set(100_000),
            interest_rate_bps: Set(1_200),
            application_date: Set(now.date_naive()),
            approval_date: Set(None),
            disbursement_date: Set(None),
            first_payment_date: Set(None),
            maturity_date: Set(None),
            term_months: Set(12),
            payment_frequency: Set(loan::PaymentFrequency::Monthly),
            amount_paid_cents: Set(0),
            last_payment_date: Set(None),
            days_past_due: Set(0),
            assigned_officer_id: Set(officer),
            notes: Set(String::new()),
            created_by_id: Set(None),
            updated_by_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .unwrap()
    }

    pub async fn interaction(&self, customer_id: Uuid, initiated_by: Uuid) -> interaction::Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        interaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            loan_id: Set(None),
            interaction_type: Set(interaction::InteractionType::Call),
            initiated_by_id: Set(initiated_by),
            contact_number: Set(String::new()),
            contact_person: Set(String::new()),
            start_time: Set(now),
            end_time: Set(None),
            duration_seconds: Set(None),
            outcome: Set(None),
            notes: Set("Called about arrears.".into()),
            payment_promise_amount_cents: Set(None),
            payment_promise_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .unwrap()
    }

    pub async fn follow_up(
        &self,
        source: &interaction::Model,
        created_by: Uuid,
        assigned_to: Uuid,
        status: follow_up::Status,
    ) -> follow_up::Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        follow_up::ActiveModel {
            id: Set(Uuid::new_v4()),
            interaction_id: Set(source.id),
            customer_id: Set(source.customer_id),
            follow_up_type: Set(follow_up::FollowUpType::Call),
            scheduled_date: Set(now.date_naive()),
            scheduled_time: Set(None),
            assigned_to_id: Set(assigned_to),
            notes: Set("Original notes".into()),
            priority: Set(follow_up::Priority::Medium),
            status: Set(status),
            result: Set(String::new()),
            completed_at: Set(None),
            completed_by_id: Set(None),
            created_by_id: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}

/// Ids of a paginated listing, in order.
pub fn ids(page: &Value) -> Vec<String> {
    page["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap().to_string())
        .collect()
}

async fn bootstrap_sqlite(db: &DatabaseConnection) {
    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        "PRAGMA foreign_keys = ON;",
    ))
    .await
    .unwrap();
    Migrator::up(db, None).await.unwrap();
}

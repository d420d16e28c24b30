mod common;

use axum::http::StatusCode;
use common::{TestApp, ids};
use entity::{loan, user};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;

#[tokio::test]
async fn officers_create_into_their_own_book() {
    let app = TestApp::new().await;
    let officer = app.user("officer", user::Role::CollectionOfficer).await;
    let token = app.token(&officer);

    let (status, body) = app
        .post(
            "/api/customers",
            &token,
            json!({
                "first_name": "Efua",
                "last_name": "Sarpong",
                "gender": "FEMALE",
                "primary_phone": "+233240000000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["assigned_officer"], json!(officer.id.to_string()));
    assert_eq!(body["assigned_officer_name"], json!("officer Tester"));
    assert_eq!(body["created_by"], json!(officer.id.to_string()));
    assert_eq!(body["full_name"], json!("Efua Sarpong"));
    assert_eq!(body["gender_display"], json!("Female"));

    // Assigning the new customer elsewhere is a write outside the officer's book.
    let other = app.user("other", user::Role::CollectionOfficer).await;
    let (status, _) = app
        .post(
            "/api/customers",
            &token,
            json!({
                "first_name": "Kofi",
                "last_name": "Mensah",
                "gender": "MALE",
                "primary_phone": "+233240000001",
                "assigned_officer": other.id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_fields_use_the_validation_envelope() {
    let app = TestApp::new().await;
    let manager = app.user("manager", user::Role::Manager).await;

    let (status, body) = app
        .post("/api/customers", &app.token(&manager), json!({ "gender": "OTHER" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(
        body["message"],
        json!("An error occurred while processing your request.")
    );
    for field in ["first_name", "last_name", "primary_phone"] {
        assert_eq!(body["error"][field], json!(["This field is required."]));
    }
    assert_eq!(body["data"], serde_json::Value::Null);
}

#[tokio::test]
async fn officers_only_see_assigned_customers() {
    let app = TestApp::new().await;
    let officer = app.user("officer", user::Role::CollectionOfficer).await;
    let other = app.user("other", user::Role::CollectionOfficer).await;
    let mine = app.customer("Mine", Some(officer.id)).await;
    let theirs = app.customer("Theirs", Some(other.id)).await;
    let token = app.token(&officer);

    let (status, body) = app.get("/api/customers", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![mine.id.to_string()]);

    let (status, _) = app.get(&format!("/api/customers/{}", theirs.id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .patch(
            &format!("/api/customers/{}", theirs.id),
            &token,
            json!({ "notes": "mine now" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn calling_agents_read_active_customers_only() {
    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let active = app.customer("Active", None).await;
    let dormant = app.customer("Dormant", None).await;
    let mut change: entity::customer::ActiveModel = dormant.clone().into();
    change.is_active = Set(false);
    change.update(app.db()).await.unwrap();
    let token = app.token(&agent);

    let (_, body) = app.get("/api/customers", &token).await;
    assert_eq!(ids(&body), vec![active.id.to_string()]);
    let (status, _) = app.get(&format!("/api/customers/{}", dormant.id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .patch(
            &format!("/api/customers/{}", active.id),
            &token,
            json!({ "notes": "called" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listings_filter_search_and_paginate() {
    let app = TestApp::new().await;
    let manager = app.user("manager", user::Role::Manager).await;
    for name in ["Akua", "Akosua", "Baaba", "Comfort", "Dede"] {
        app.customer(name, None).await;
    }
    let token = app.token(&manager);

    let (status, body) = app.get("/api/customers?search=aKo", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["results"][0]["first_name"], json!("Akosua"));

    let (_, body) = app.get("/api/customers?page=2&page_size=2", &token).await;
    assert_eq!(body["count"], json!(5));
    assert_eq!(body["page"], json!(2));
    assert_eq!(body["page_size"], json!(2));
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    let (status, _) = app.get("/api/customers?page=4&page_size=2", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/customers?city=Kumasi", &token).await;
    assert_eq!(body["count"], json!(0));
}

#[tokio::test]
async fn customer_loans_are_narrowed_to_the_callers_loan_scope() {
    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let customer = app.customer("Naana", None).await;
    app.loan(customer.id, None, loan::Status::Pending).await;
    let visible = app.loan(customer.id, None, loan::Status::Defaulted).await;

    let (status, body) = app
        .get(
            &format!("/api/customers/{}/loans", customer.id),
            &app.token(&agent),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(visible.id.to_string()));
}

#[tokio::test]
async fn deleting_is_reserved_to_assigned_officers_and_management() {
    let app = TestApp::new().await;
    let officer = app.user("officer", user::Role::CollectionOfficer).await;
    let boss = app.user("boss", user::Role::SuperManager).await;
    let customer = app.customer("Gone", Some(officer.id)).await;

    let (status, _) = app
        .delete(&format!("/api/customers/{}", customer.id), &app.token(&officer))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .get(&format!("/api/customers/{}", customer.id), &app.token(&boss))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, ids};
use entity::{follow_up, loan, user};
use serde_json::json;

#[tokio::test]
async fn agents_log_calls_as_themselves_and_see_only_their_own() {
    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let other = app.user("other", user::Role::CallingAgent).await;
    let customer = app.customer("Adjoa", None).await;

    let (status, body) = app
        .post(
            "/api/interactions",
            &app.token(&agent),
            json!({
                "customer": customer.id,
                "interaction_type": "CALL",
                "start_time": "2025-03-01T10:00:00Z",
                "end_time": "2025-03-01T10:04:30Z",
                "outcome": "NO_ANSWER",
                "notes": "Rang twice.",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["initiated_by"], json!(agent.id.to_string()));
    assert_eq!(body["duration_seconds"], json!(270));
    assert_eq!(body["customer_name"], json!("Adjoa Customer"));
    assert_eq!(body["interaction_type_display"], json!("Phone Call"));
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .get(&format!("/api/interactions/{id}"), &app.token(&other))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listing) = app.get("/api/interactions", &app.token(&other)).await;
    assert!(ids(&listing).is_empty());
    let (_, listing) = app.get("/api/interactions", &app.token(&agent)).await;
    assert_eq!(ids(&listing), vec![id]);
}

#[tokio::test]
async fn interaction_links_and_notes_are_validated() {
    let app = TestApp::new().await;
    let manager = app.user("manager", user::Role::Manager).await;
    let customer = app.customer("Abena", None).await;
    let stranger = app.customer("Esi", None).await;
    let foreign = app.loan(stranger.id, None, loan::Status::Active).await;
    let token = app.token(&manager);

    let (status, body) = app
        .post(
            "/api/interactions",
            &token,
            json!({
                "customer": customer.id,
                "loan": foreign.id,
                "interaction_type": "VISIT",
                "start_time": "2025-03-01T10:00:00Z",
                "end_time": "2025-03-01T09:00:00Z",
                "notes": "Visited the shop.",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["loan"],
        json!(["The selected loan does not belong to this customer."])
    );
    assert_eq!(
        body["error"]["end_time"],
        json!(["End time cannot be before start time."])
    );

    let (status, body) = app
        .post(
            "/api/interactions",
            &token,
            json!({
                "customer": customer.id,
                "interaction_type": "CALL",
                "start_time": "2025-03-01T10:00:00Z",
                "notes": "   ",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["notes"], json!(["This field is required."]));

    let logged = app.interaction(customer.id, manager.id).await;
    let (status, body) = app
        .patch(
            &format!("/api/interactions/{}", logged.id),
            &token,
            json!({ "notes": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["notes"], json!(["This field may not be blank."]));
}

#[tokio::test]
async fn follow_ups_are_scheduled_from_an_interaction() {
    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let customer = app.customer("Yaa", None).await;
    let call = app.interaction(customer.id, agent.id).await;
    let token = app.token(&agent);
    let uri = format!("/api/interactions/{}/create_follow_up", call.id);

    let (status, body) = app.post(&uri, &token, json!({ "notes": "soon" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["follow_up_type", "scheduled_date", "assigned_to"] {
        assert_eq!(body["error"][field], json!(["This field is required."]));
    }

    let (status, body) = app
        .post(
            &uri,
            &token,
            json!({
                "follow_up_type": "CALL",
                "scheduled_date": "2025-03-08",
                "assigned_to": agent.id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], json!("PENDING"));
    assert_eq!(body["priority"], json!("MEDIUM"));
    assert_eq!(body["customer"], json!(customer.id.to_string()));
    assert_eq!(body["interaction"], json!(call.id.to_string()));
    assert_eq!(body["created_by"], json!(agent.id.to_string()));
}

#[tokio::test]
async fn completing_stamps_the_caller_once() {
    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let customer = app.customer("Ekua", None).await;
    let call = app.interaction(customer.id, agent.id).await;
    let task = app
        .follow_up(&call, agent.id, agent.id, follow_up::Status::Pending)
        .await;
    let token = app.token(&agent);
    let uri = format!("/api/follow-ups/{}/complete", task.id);

    let (status, body) = app
        .post(&uri, &token, json!({ "result": "Customer paid in full." }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("COMPLETED"));
    assert_eq!(body["result"], json!("Customer paid in full."));
    assert_eq!(body["completed_by"], json!(agent.id.to_string()));
    assert!(body["completed_at"].is_string());

    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("This follow-up is already completed."));
}

#[tokio::test]
async fn completion_accepts_an_empty_body() {
    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let customer = app.customer("Kukua", None).await;
    let call = app.interaction(customer.id, agent.id).await;
    let task = app
        .follow_up(&call, agent.id, agent.id, follow_up::Status::Rescheduled)
        .await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/follow-ups/{}/complete", task.id),
            Some(&app.token(&agent)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("COMPLETED"));
    assert_eq!(body["result"], json!(""));
}

#[tokio::test]
async fn rescheduling_needs_a_date_and_an_open_follow_up() {
    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let customer = app.customer("Afua", None).await;
    let call = app.interaction(customer.id, agent.id).await;
    let open = app
        .follow_up(&call, agent.id, agent.id, follow_up::Status::Pending)
        .await;
    let canceled = app
        .follow_up(&call, agent.id, agent.id, follow_up::Status::Canceled)
        .await;
    let token = app.token(&agent);
    let uri = format!("/api/follow-ups/{}/reschedule", open.id);

    let (status, body) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["scheduled_date"],
        json!(["This field is required."])
    );

    let (status, body) = app
        .post(
            &uri,
            &token,
            json!({ "scheduled_date": "2025-04-02", "scheduled_time": "14:30:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("RESCHEDULED"));
    assert_eq!(body["scheduled_date"], json!("2025-04-02"));
    assert_eq!(body["scheduled_time"], json!("14:30:00"));
    assert_eq!(body["notes"], json!("Original notes"));

    let (status, body) = app
        .post(
            &format!("/api/follow-ups/{}/reschedule", canceled.id),
            &token,
            json!({ "scheduled_date": "2025-04-02" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("This follow-up cannot be rescheduled."));
}

#[tokio::test]
async fn agents_only_act_on_follow_ups_they_created() {
    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let manager = app.user("manager", user::Role::Manager).await;
    let customer = app.customer("Akos", None).await;
    let call = app.interaction(customer.id, manager.id).await;
    let handed_over = app
        .follow_up(&call, manager.id, agent.id, follow_up::Status::Pending)
        .await;
    let token = app.token(&agent);

    // Assigned rows are visible but not writable.
    let (status, _) = app
        .get(&format!("/api/follow-ups/{}", handed_over.id), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(
            &format!("/api/follow-ups/{}/complete", handed_over.id),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, listing) = app.get("/api/follow-ups?status=PENDING", &token).await;
    assert_eq!(ids(&listing), vec![handed_over.id.to_string()]);
}

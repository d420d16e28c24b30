mod common;

use axum::http::{Method, StatusCode};
use common::{PASSWORD, TestApp, ids};
use entity::user;
use serde_json::json;

#[tokio::test]
async fn tokens_are_issued_for_valid_credentials_and_refreshed() {
    let app = TestApp::new().await;
    let officer = app.user("officer", user::Role::CollectionOfficer).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/token",
            None,
            Some(json!({ "username": "officer", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        json!("No active account found with the given credentials")
    );

    let (status, pair) = app
        .request(
            Method::POST,
            "/api/token",
            None,
            Some(json!({ "username": "officer", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = pair["access"].as_str().unwrap().to_string();
    let refresh = pair["refresh"].as_str().unwrap().to_string();

    let (status, me) = app.get("/api/users/me", &access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], json!(officer.id.to_string()));
    assert_eq!(me["role"], json!("COLLECTION_OFFICER"));
    assert_eq!(me["role_display"], json!("Collection Officer"));

    // A refresh token is not an access token.
    let (status, _) = app.get("/api/users/me", &refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, renewed) = app
        .request(
            Method::POST,
            "/api/token/refresh",
            None,
            Some(json!({ "refresh": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .get("/api/users/me", renewed["access"].as_str().unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/token/refresh",
            None,
            Some(json!({ "refresh": access })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Token is invalid or expired"));
}

#[tokio::test]
async fn token_requests_report_missing_credentials() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::POST, "/api/token", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["username"], json!(["This field is required."]));
    assert_eq!(body["error"]["password"], json!(["This field is required."]));
}

#[tokio::test]
async fn deactivated_accounts_cannot_log_in() {
    use sea_orm::{ActiveModelTrait, Set};

    let app = TestApp::new().await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let mut change: user::ActiveModel = agent.into();
    change.is_active = Set(false);
    change.update(app.db()).await.unwrap();

    let (status, _) = app
        .request(
            Method::POST,
            "/api/token",
            None,
            Some(json!({ "username": "agent", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn managers_cannot_promote_or_see_super_managers() {
    let app = TestApp::new().await;
    let manager = app.user("manager", user::Role::Manager).await;
    let boss = app.user("boss", user::Role::SuperManager).await;
    let officer = app.user("officer", user::Role::CollectionOfficer).await;
    let token = app.token(&manager);

    let (status, body) = app
        .patch(
            &format!("/api/users/{}", officer.id),
            &token,
            json!({ "role": "SUPER_MANAGER" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        json!("You don't have permission to update this user.")
    );

    let (status, _) = app
        .patch(
            &format!("/api/users/{}", boss.id),
            &token,
            json!({ "first_name": "Renamed" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .patch(
            &format!("/api/users/{}", officer.id),
            &token,
            json!({ "role": "CALLING_AGENT", "phone": "+233555000111" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], json!("CALLING_AGENT"));
    assert_eq!(body["phone"], json!("+233555000111"));

    let (_, listing) = app.get("/api/users", &token).await;
    assert!(!ids(&listing).contains(&boss.id.to_string()));
}

#[tokio::test]
async fn nobody_changes_their_own_role() {
    let app = TestApp::new().await;
    let boss = app.user("boss", user::Role::SuperManager).await;
    let token = app.token(&boss);

    let (status, body) = app
        .patch(
            &format!("/api/users/{}", boss.id),
            &token,
            json!({ "role": "MANAGER" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], json!("You cannot change your own role."));

    // Restating the current role is not a change.
    let (status, _) = app
        .patch(
            &format!("/api/users/{}", boss.id),
            &token,
            json!({ "role": "SUPER_MANAGER", "first_name": "Still" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn only_super_managers_create_users() {
    let app = TestApp::new().await;
    let manager = app.user("manager", user::Role::Manager).await;
    let boss = app.user("boss", user::Role::SuperManager).await;
    let fresh = json!({
        "username": "newbie",
        "email": "newbie@example.test",
        "password": "long-enough-secret",
    });

    let (status, _) = app
        .post("/api/users", &app.token(&manager), fresh.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = app.token(&boss);
    let (status, body) = app.post("/api/users", &token, fresh.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], json!("COLLECTION_OFFICER"));
    assert!(body.get("password_hash").is_none());

    let (status, body) = app.post("/api/users", &token, fresh).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["username"],
        json!(["A user with that username already exists."])
    );

    let (status, body) = app
        .post(
            "/api/users",
            &token,
            json!({ "username": "shorty", "email": "shorty@example.test", "password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["password"],
        json!(["This password is too short. It must contain at least 8 characters."])
    );
}

#[tokio::test]
async fn hierarchy_links_pair_managers_with_officers() {
    let app = TestApp::new().await;
    let boss = app.user("boss", user::Role::SuperManager).await;
    let manager = app.user("manager", user::Role::Manager).await;
    let peer = app.user("peer", user::Role::Manager).await;
    let officer = app.user("officer", user::Role::CollectionOfficer).await;
    let agent = app.user("agent", user::Role::CallingAgent).await;
    let token = app.token(&boss);

    let (status, body) = app
        .post(
            "/api/hierarchies",
            &token,
            json!({ "manager": agent.id, "collection_officer": manager.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["non_field_errors"],
        json!([
            "Manager must have Manager or Super Manager role.",
            "Collection officer must have Collection Officer role."
        ])
    );

    let (status, body) = app
        .post(
            "/api/hierarchies",
            &token,
            json!({ "manager": manager.id, "collection_officer": officer.id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["manager_name"], json!("manager Tester"));

    let (status, body) = app
        .post(
            "/api/hierarchies",
            &token,
            json!({ "manager": manager.id, "collection_officer": officer.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["non_field_errors"],
        json!(["The fields manager, collection_officer must make a unique set."])
    );

    app.hierarchy(peer.id, officer.id).await;
    let (_, mine) = app.get("/api/hierarchies", &app.token(&manager)).await;
    assert_eq!(mine["count"], json!(1));
    assert_eq!(mine["results"][0]["manager"], json!(manager.id.to_string()));

    // Managers only link officers to themselves.
    let (status, _) = app
        .post(
            "/api/hierarchies",
            &app.token(&peer),
            json!({ "manager": manager.id, "collection_officer": officer.id }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/hierarchies", &app.token(&officer)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn managers_cannot_hand_their_links_to_another_manager() {
    let app = TestApp::new().await;
    let manager = app.user("manager", user::Role::Manager).await;
    let peer = app.user("peer", user::Role::Manager).await;
    let officer = app.user("officer", user::Role::CollectionOfficer).await;
    let token = app.token(&manager);

    let (status, body) = app
        .post(
            "/api/hierarchies",
            &token,
            json!({ "manager": manager.id, "collection_officer": officer.id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/hierarchies/{}", body["id"].as_str().unwrap());

    let (status, _) = app.patch(&uri, &token, json!({ "manager": peer.id })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["manager"], json!(manager.id.to_string()));
}

#[tokio::test]
async fn health_reports_database_reachability() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["db_ok"], json!(true));
    assert_eq!(body["authz_enforced"], json!(true));

    let (status, body) = app.request(Method::GET, "/api/ledgers", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["detail"], json!("Not found."));
}

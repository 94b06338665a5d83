//! HTTP tests for listing repositories the caller installed the app on.

mod test_utils;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use test_utils::{INSTALLATION_ID, OWNER_ID, TestApp, read_json};
use tower::ServiceExt;

fn list_request(authorization: &str) -> Request<Body> {
    Request::builder()
        .uri("/authorized_repos")
        .header("authorization", authorization)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn union_of_installations_without_duplicates() {
    let app = TestApp::new().await.unwrap();
    app.seed_installation(
        INSTALLATION_ID,
        OWNER_ID,
        &[(1, "Codertocat/Hello-World"), (2, "Codertocat/Docs")],
    )
    .await
    .unwrap();
    app.seed_installation(
        INSTALLATION_ID + 1,
        OWNER_ID,
        &[(2, "Codertocat/Docs"), (3, "Codertocat/Spoon-Knife")],
    )
    .await
    .unwrap();
    app.seed_installation(INSTALLATION_ID + 2, 99, &[(4, "someone/else")])
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(list_request(&OWNER_ID.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!([
            { "id": 1, "full_name": "Codertocat/Hello-World" },
            { "id": 2, "full_name": "Codertocat/Docs" },
            { "id": 3, "full_name": "Codertocat/Spoon-Knife" }
        ])
    );
}

#[tokio::test]
async fn caller_without_installations_gets_empty_list() {
    let app = TestApp::new().await.unwrap();

    let response = app.router().oneshot(list_request("12345")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!([]));
}

#[tokio::test]
async fn non_numeric_authorization_is_rejected() {
    let app = TestApp::new().await.unwrap();

    let response = app.router().oneshot(list_request("octocat")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

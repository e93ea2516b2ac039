use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use people_registry::{
    AppConfig, AppState, create_router, models::Person, repository::InMemoryPersonStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

// Demo accounts from `AppConfig::default()`: password equals the username.
fn app_state() -> AppState {
    AppState::from_config(Arc::new(InMemoryPersonStore::new()), AppConfig::default())
}

async fn spawn_app() -> TestApp {
    let router = create_router(app_state());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_person_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({"firstName": "Alex", "lastName": "Bell"});

    // Create
    let response = client
        .post(format!("{}/person", app.address))
        .basic_auth("john", Some("john"))
        .json(&body)
        .send()
        .await
        .expect("post fail");
    assert_eq!(response.status(), 201);
    let created: Person = response.json().await.unwrap();
    assert_eq!(created.id, Some(1));

    // Same name pair again
    let response = client
        .post(format!("{}/person", app.address))
        .basic_auth("john", Some("john"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Read back as a viewer
    let response = client
        .get(format!("{}/person/1", app.address))
        .basic_auth("sam", Some("sam"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let fetched: Person = response.json().await.unwrap();
    assert_eq!(fetched, created);

    // Delete twice, both succeed
    for _ in 0..2 {
        let response = client
            .delete(format!("{}/person/1", app.address))
            .basic_auth("carlos", Some("carlos"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204);
    }

    let response = client
        .get(format!("{}/person/1", app.address))
        .basic_auth("sam", Some("sam"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_unauthenticated_request_gets_basic_challenge() {
    let app = create_router(app_state());

    let response = app
        .oneshot(Request::get("/person").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers().get(header::WWW_AUTHENTICATE).unwrap();
    assert!(challenge.to_str().unwrap().starts_with("Basic"));
}

#[tokio::test]
async fn test_viewer_post_is_forbidden() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/person", app.address))
        .basic_auth("sam", Some("sam"))
        .json(&serde_json::json!({"firstName": "Alex", "lastName": "Bell"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Nothing was written.
    let list: Vec<Person> = client
        .get(format!("{}/person", app.address))
        .basic_auth("sam", Some("sam"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_listing_is_ordered_by_last_name() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for (first, last) in [("Zed", "Young"), ("Alex", "Bell")] {
        let response = client
            .post(format!("{}/person", app.address))
            .basic_auth("john", Some("john"))
            .json(&serde_json::json!({"firstName": first, "lastName": last}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    let list: Vec<Person> = client
        .get(format!("{}/person", app.address))
        .basic_auth("sam", Some("sam"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let last_names: Vec<&str> = list.iter().map(|p| p.last_name.as_str()).collect();
    assert_eq!(last_names, vec!["Bell", "Young"]);
}

#[tokio::test]
async fn test_missing_fields_report_per_field_messages() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/person", app.address))
        .basic_auth("john", Some("john"))
        .json(&serde_json::json!({"firstName": "Alex"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let errors: serde_json::Value = response.json().await.unwrap();
    assert_eq!(errors, serde_json::json!({"lastName": "must not be blank"}));
}

#[tokio::test]
async fn test_update_flow() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for (first, last) in [("Alex", "Bell"), ("Zed", "Young")] {
        client
            .post(format!("{}/person", app.address))
            .basic_auth("john", Some("john"))
            .json(&serde_json::json!({"firstName": first, "lastName": last}))
            .send()
            .await
            .unwrap();
    }

    // Unchanged name on its own record is accepted.
    let response = client
        .put(format!("{}/person/1", app.address))
        .basic_auth("john", Some("john"))
        .json(&serde_json::json!({"firstName": "Alex", "lastName": "Bell"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Taking another record's name is a conflict.
    let response = client
        .put(format!("{}/person/2", app.address))
        .basic_auth("john", Some("john"))
        .json(&serde_json::json!({"firstName": "Alex", "lastName": "Bell"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Unknown id inserts under a generated id.
    let response = client
        .put(format!("{}/person/99", app.address))
        .basic_auth("john", Some("john"))
        .json(&serde_json::json!({"firstName": "New", "lastName": "Name"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Person = response.json().await.unwrap();
    assert_eq!(created.id, Some(3));

    let response = client
        .get(format!("{}/person/3", app.address))
        .basic_auth("sam", Some("sam"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .get(format!("{}/person/99", app.address))
        .basic_auth("sam", Some("sam"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

fn basic(user: &str) -> String {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    format!("Basic {}", STANDARD.encode(format!("{user}:{user}")))
}

fn json_request(method: &str, uri: &str, user: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic(user))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_viewer_with_malformed_body_is_forbidden() {
    let app = create_router(app_state());

    for method in ["POST", "PUT"] {
        let uri = if method == "POST" { "/person" } else { "/person/1" };
        let response = app
            .clone()
            .oneshot(json_request(method, uri, "sam", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method}");
    }
}

#[tokio::test]
async fn test_editor_with_mistyped_body_gets_json_error() {
    let app = create_router(app_state());

    let response = app
        .oneshot(json_request(
            "POST",
            "/person",
            "john",
            r#"{"firstName": 5, "lastName": "Bell"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["error"].is_string());
}

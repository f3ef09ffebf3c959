use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use http_body_util::BodyExt;
use nautilus_backend::{
    IdentityProvider, ProfileDirectory, ProviderError, RateLimitConfig, ResolvedIdentity,
    Timeouts, create_app,
};
use nautilus_db::{Database, PlayerId, PlayerName, ProfileSnapshot};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
// for `oneshot` method
use uuid::Uuid;

const HOST_TOKEN: &str = "test-host-token";

/// Identity provider answering from a fixed table of current name owners
#[derive(Default)]
struct StaticProvider {
    owners: HashMap<String, PlayerId>,
}

impl StaticProvider {
    fn owning(name: &str, id: PlayerId) -> Self {
        Self {
            owners: HashMap::from([(name.to_ascii_lowercase(), id)]),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn resolve_name(&self, name: &str) -> Result<Option<PlayerId>, ProviderError> {
        Ok(self.owners.get(&name.to_ascii_lowercase()).copied())
    }

    async fn fetch_profile(
        &self,
        _id: PlayerId,
    ) -> Result<Option<ResolvedIdentity>, ProviderError> {
        Ok(None)
    }
}

/// Helper to create test database with in-memory SQLite
async fn setup_test_db() -> Database {
    Database::open_in_memory()
        .await
        .expect("Failed to create in-memory database")
}

/// Helper to create app with default test configuration
fn create_test_app(db: Database) -> axum::Router {
    create_test_app_with(db, StaticProvider::default())
}

fn create_test_app_with(db: Database, provider: StaticProvider) -> axum::Router {
    let config = nautilus_backend::config::Config::default();
    let directory = ProfileDirectory::new(Arc::new(db), Arc::new(provider), Timeouts::default());
    create_app(
        Arc::new(directory),
        HOST_TOKEN.to_string(),
        config.request_body_limit,
        config.request_timeout,
        RateLimitConfig::default(),
    )
}

/// Helper to send a request and get response
async fn send_request(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    // The rate limiter keys on the client address
    let mut request_builder = Request::builder()
        .uri(uri)
        .method(method)
        .header("X-Forwarded-For", "203.0.113.7");

    // Add Authorization header if provided
    if let Some(token) = auth_token {
        request_builder = request_builder.header("Authorization", format!("Bearer {}", token));
    }

    // Build request with body
    let request = if let Some(json_body) = body {
        request_builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&json_body).unwrap()))
            .unwrap()
    } else {
        request_builder.body(Body::empty()).unwrap()
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    // Try to parse as JSON, or return empty object
    let json = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, json)
}

async fn post(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_request(app.clone(), "POST", uri, Some(body), Some(HOST_TOKEN)).await
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send_request(app.clone(), "GET", uri, None, Some(HOST_TOKEN)).await
}

fn skin_value() -> String {
    STANDARD.encode(
        r#"{"profileName":"Steve","textures":{"SKIN":{"url":"http://textures.minecraft.net/texture/steve"}}}"#,
    )
}

// =============================================================================
// HEALTH & AUTH TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    // GIVEN: A running application
    let app = create_test_app(setup_test_db().await);

    // WHEN: Making a GET request to /health without credentials
    let (status, _body) = send_request(app, "GET", "/health", None, None).await;

    // THEN: Should return 200 OK
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_event_without_authorization() {
    // GIVEN: A running application
    let app = create_test_app(setup_test_db().await);

    // WHEN: Sending an event without Authorization header
    let (status, _body) = send_request(
        app,
        "POST",
        "/events/pre-connect",
        Some(json!({ "id": Uuid::new_v4().to_string(), "name": "Steve" })),
        None,
    )
    .await;

    // THEN: Should be rejected as a client error
    assert!(status.is_client_error(), "Expected client error, got {}", status);
}

#[tokio::test]
async fn test_event_with_wrong_token() {
    // GIVEN: A running application
    let app = create_test_app(setup_test_db().await);

    // WHEN: Sending an event with the wrong host token
    let (status, body) = send_request(
        app,
        "POST",
        "/events/pre-connect",
        Some(json!({ "id": Uuid::new_v4().to_string(), "name": "Steve" })),
        Some("not-the-token"),
    )
    .await;

    // THEN: Should return 401 with a JSON error
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid host token");
}

// =============================================================================
// LIFECYCLE TESTS
// =============================================================================

#[tokio::test]
async fn test_pre_connect_creates_and_caches_profile() {
    // GIVEN: An empty directory
    let app = create_test_app(setup_test_db().await);
    let id = Uuid::new_v4();

    // WHEN: The host reports a pre-connect
    let (status, body) = post(
        &app,
        "/events/pre-connect",
        json!({ "id": id.to_string(), "name": "Steve" }),
    )
    .await;

    // THEN: A bare profile is created and the player is connected
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["connected"], true);
    assert!(body["name"].is_null());

    let (status, body) = get(&app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "connected": 1, "stored": 1 }));
}

#[tokio::test]
async fn test_full_connection_lifecycle() {
    // GIVEN: A player that passed pre-connect
    let db = setup_test_db().await;
    let app = create_test_app(db.clone());
    let id = Uuid::new_v4();
    post(
        &app,
        "/events/pre-connect",
        json!({ "id": id.to_string(), "name": "Steve" }),
    )
    .await;

    // WHEN: The connection finalizes with a skin
    let (status, body) = post(
        &app,
        "/events/connect",
        json!({
            "id": id.to_string(),
            "name": "Steve",
            "skin": { "value": skin_value(), "signature": "c2ln" }
        }),
    )
    .await;

    // THEN: Name, skin and decoded textures are reported
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Steve");
    assert_eq!(body["skin"]["signature"], "c2ln");
    assert_eq!(
        body["textures"]["skin_url"],
        "http://textures.minecraft.net/texture/steve"
    );
    assert!(body["textures"]["cape_url"].is_null());
    assert_eq!(body["textures"]["slim"], false);
    assert!(body["last_online"].is_i64());

    // WHEN: The player leaves
    let (status, body) = post(&app, "/events/disconnect", json!({ "id": id.to_string() })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Steve");

    let (status, _body) = post(
        &app,
        "/events/quit",
        json!({ "id": id.to_string(), "name": "Steve" }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // THEN: The profile is no longer connected but still stored
    let (status, body) = get(&app, &format!("/profiles/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], false);
    assert_eq!(body["name"], "Steve");

    let stored = db.find_profile(id).await.unwrap().unwrap();
    assert_eq!(stored.last_known_name.as_deref(), Some("Steve"));
    assert!(stored.last_known_skin.is_some());
}

#[tokio::test]
async fn test_connect_without_pre_connect() {
    // GIVEN: A player the directory never admitted
    let app = create_test_app(setup_test_db().await);

    // WHEN: The host reports connect-finalized
    let (status, body) = post(
        &app,
        "/events/connect",
        json!({ "id": Uuid::new_v4().to_string(), "name": "Steve" }),
    )
    .await;

    // THEN: Should return 409 Conflict
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Player is not connected");
    assert!(body.get("details").is_some());
}

#[tokio::test]
async fn test_quit_for_unknown_player_is_harmless() {
    // GIVEN: An empty directory
    let app = create_test_app(setup_test_db().await);

    // WHEN: A quit arrives for a player that never connected
    let (status, _body) = post(
        &app,
        "/events/quit",
        json!({ "id": Uuid::new_v4().to_string(), "name": "Steve" }),
    )
    .await;

    // THEN: Nothing to do, still succeeds
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_event_with_invalid_id() {
    // GIVEN: A running application
    let app = create_test_app(setup_test_db().await);

    // WHEN: Sending a malformed player id
    let (status, body) = post(
        &app,
        "/events/pre-connect",
        json!({ "id": "not-a-uuid", "name": "Steve" }),
    )
    .await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("id"));
}

#[tokio::test]
async fn test_event_with_invalid_name() {
    // GIVEN: A running application
    let app = create_test_app(setup_test_db().await);

    // WHEN: Sending a name with illegal characters
    let (status, _body) = post(
        &app,
        "/events/pre-connect",
        json!({ "id": Uuid::new_v4().to_string(), "name": "Steve Jobs!" }),
    )
    .await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// PROFILE QUERY TESTS
// =============================================================================

#[tokio::test]
async fn test_profile_not_found() {
    // GIVEN: An empty directory
    let app = create_test_app(setup_test_db().await);

    // WHEN: Looking up an unknown id
    let (status, body) = get(&app, &format!("/profiles/{}", Uuid::new_v4())).await;

    // THEN: Should return 404 with a JSON error
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Profile not found");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_profile_by_name_uses_connection_name() {
    // GIVEN: A connected player whose stored profile has no name yet
    let app = create_test_app(setup_test_db().await);
    let id = Uuid::new_v4();
    post(
        &app,
        "/events/pre-connect",
        json!({ "id": id.to_string(), "name": "Steve" }),
    )
    .await;

    // WHEN: Looking the player up by name in another case
    let (status, body) = get(&app, "/profiles/by-name/STEVE").await;

    // THEN: The cached profile is found
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["connected"], true);
}

#[tokio::test]
async fn test_profile_by_name_from_store() {
    // GIVEN: One stored profile named alice
    let db = setup_test_db().await;
    let id = Uuid::new_v4();
    db.insert_profile(ProfileSnapshot::new(id).with_name(PlayerName::from("alice").unwrap()))
        .await
        .unwrap();
    let app = create_test_app(db);

    // WHEN: Looking up "Alice"
    let (status, body) = get(&app, "/profiles/by-name/Alice").await;

    // THEN: The stored profile is returned
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["connected"], false);
}

#[tokio::test]
async fn test_profile_by_name_disambiguated_by_provider() {
    // GIVEN: Two stored profiles named Alice, the provider says the second owns it
    let db = setup_test_db().await;
    let former = Uuid::new_v4();
    let current = Uuid::new_v4();
    for id in [former, current] {
        db.insert_profile(ProfileSnapshot::new(id).with_name(PlayerName::from("Alice").unwrap()))
            .await
            .unwrap();
    }
    let app = create_test_app_with(db, StaticProvider::owning("Alice", current));

    // WHEN: Looking up "Alice"
    let (status, body) = get(&app, "/profiles/by-name/Alice").await;

    // THEN: The current owner is returned
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], current.to_string());
}

#[tokio::test]
async fn test_profile_by_name_ambiguous() {
    // GIVEN: Two stored profiles named Alice and no current owner
    let db = setup_test_db().await;
    for _ in 0..2 {
        db.insert_profile(
            ProfileSnapshot::new(Uuid::new_v4()).with_name(PlayerName::from("Alice").unwrap()),
        )
        .await
        .unwrap();
    }
    let app = create_test_app(db);

    // WHEN: Looking up "Alice"
    let (status, body) = get(&app, "/profiles/by-name/Alice").await;

    // THEN: Should return 409 Conflict
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Player name is ambiguous");
}

#[tokio::test]
async fn test_profile_by_name_rejects_invalid_name() {
    // GIVEN: A running application
    let app = create_test_app(setup_test_db().await);

    // WHEN: Looking up a name that is too long
    let (status, _body) = get(&app, "/profiles/by-name/ThisNameIsWayTooLong").await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// SYNC & STATUS TESTS
// =============================================================================

#[tokio::test]
async fn test_sync_evicts_players_no_longer_online() {
    // GIVEN: Two joined players and one still logging in
    let app = create_test_app(setup_test_db().await);
    let steve = Uuid::new_v4();
    let alex = Uuid::new_v4();
    let notch = Uuid::new_v4();
    for (id, name) in [(steve, "Steve"), (alex, "Alex"), (notch, "Notch")] {
        post(
            &app,
            "/events/pre-connect",
            json!({ "id": id.to_string(), "name": name }),
        )
        .await;
    }
    for (id, name) in [(steve, "Steve"), (alex, "Alex")] {
        post(
            &app,
            "/events/connect",
            json!({ "id": id.to_string(), "name": name }),
        )
        .await;
    }

    // WHEN: The host reports only Alex as online
    let (status, body) = post(&app, "/sync", json!({ "players": [alex.to_string()] })).await;

    // THEN: Steve is evicted, Notch is left to finish joining
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "evicted": 1 }));

    let (_status, body) = get(&app, "/status").await;
    assert_eq!(body, json!({ "connected": 2, "stored": 3 }));

    let (status, body) = post(
        &app,
        "/events/connect",
        json!({ "id": notch.to_string(), "name": "Notch" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Notch");
}

#[tokio::test]
async fn test_sync_rejects_oversized_list() {
    // GIVEN: A running application
    let app = create_test_app(setup_test_db().await);
    let players: Vec<String> = (0..1001).map(|_| Uuid::new_v4().to_string()).collect();

    // WHEN: Syncing more players than allowed
    let (status, _body) = post(&app, "/sync", json!({ "players": players })).await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_without_authorization() {
    // GIVEN: A running application
    let app = create_test_app(setup_test_db().await);

    // WHEN: Requesting /status without Authorization header
    let (status, _body) = send_request(app, "GET", "/status", None, None).await;

    // THEN: Should be rejected
    assert!(status.is_client_error(), "Expected client error, got {}", status);
}

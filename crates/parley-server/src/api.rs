use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_store::{GroupAction, Message, Role, Store, StoreError};

use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/createUser", post(create_user))
        .route("/createAdmin", post(create_admin))
        .route("/sendPM", post(send_pm))
        .route("/inbox/:username", get(inbox))
        .route("/deleteMsg", post(delete_msg))
        .route("/createGroup", post(create_group))
        .route("/groupAction", post(group_action))
        .route("/groupMessages/:group_name/:username", get(group_messages))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// Body of both `/createUser` and `/createAdmin`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountRequest {
    current_user: String,
    username: String,
    password: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct SendPmRequest {
    from: String,
    to: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct DeleteMsgRequest {
    username: String,
    index: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupRequest {
    current_user: String,
    name: String,
    #[serde(default)]
    privacy: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupActionRequest {
    action: String,
    actor: String,
    group_name: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

impl OkResponse {
    fn json() -> Json<Self> {
        Json(Self { ok: true })
    }
}

#[derive(Serialize)]
struct LoginResponse {
    ok: bool,
    role: Role,
}

#[derive(Serialize)]
struct MessagesResponse {
    ok: bool,
    messages: Vec<Message>,
}

impl MessagesResponse {
    fn json(messages: Vec<Message>) -> Json<Self> {
        Json(Self { ok: true, messages })
    }
}

// ─── Helpers ───

/// Unwrap a JSON body, reporting malformed input in the usual error envelope.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

/// Run a store operation on the blocking pool. Store calls hash passwords
/// and rewrite the data file.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ServerError>
where
    F: FnOnce(&Store) -> parley_store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ServerError::Internal(format!("Store task failed: {e}")))?
        .map_err(ServerError::from)
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ServerError> {
    let req = body(payload)?;
    let role = with_store(&state, move |store| {
        store.authenticate(&req.username, &req.password)
    })
    .await?;
    Ok(Json(LoginResponse { ok: true, role }))
}

async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ServerError> {
    let req = body(payload)?;
    with_store(&state, move |store| {
        store.create_user(&req.current_user, &req.username, &req.password, &req.email)
    })
    .await?;
    Ok(OkResponse::json())
}

async fn create_admin(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ServerError> {
    let req = body(payload)?;
    let username = req.username.clone();
    with_store(&state, move |store| {
        store.create_admin(&req.current_user, &req.username, &req.password, &req.email)
    })
    .await?;

    info!(username = %username, "Admin account created via API");
    Ok(OkResponse::json())
}

async fn send_pm(
    State(state): State<AppState>,
    payload: Result<Json<SendPmRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ServerError> {
    let req = body(payload)?;
    with_store(&state, move |store| {
        store.send_direct_message(&req.from, &req.to, &req.text)
    })
    .await?;
    Ok(OkResponse::json())
}

async fn inbox(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<MessagesResponse>, ServerError> {
    let messages = with_store(&state, move |store| store.inbox(&username)).await?;
    Ok(MessagesResponse::json(messages))
}

async fn delete_msg(
    State(state): State<AppState>,
    payload: Result<Json<DeleteMsgRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ServerError> {
    let req = body(payload)?;
    let index = usize::try_from(req.index).map_err(|_| StoreError::InvalidIndex(req.index))?;
    with_store(&state, move |store| store.delete_message(&req.username, index)).await?;
    Ok(OkResponse::json())
}

async fn create_group(
    State(state): State<AppState>,
    payload: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ServerError> {
    let req = body(payload)?;
    with_store(&state, move |store| {
        store.create_group(&req.current_user, &req.name, &req.privacy)
    })
    .await?;
    Ok(OkResponse::json())
}

async fn group_action(
    State(state): State<AppState>,
    payload: Result<Json<GroupActionRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ServerError> {
    let req = body(payload)?;
    let action = GroupAction::parse(&req.action, &req.target, &req.text);
    with_store(&state, move |store| {
        store.group_action(&req.actor, &req.group_name, &action)
    })
    .await?;
    Ok(OkResponse::json())
}

async fn group_messages(
    State(state): State<AppState>,
    Path((group_name, username)): Path<(String, String)>,
) -> Result<Json<MessagesResponse>, ServerError> {
    let messages = with_store(&state, move |store| {
        store.group_messages(&group_name, &username)
    })
    .await?;
    Ok(MessagesResponse::json(messages))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use parley_store::Bootstrap;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOOT_PW: &str = "Sunny2024";

    fn test_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let bootstrap = Bootstrap {
            password: BOOT_PW.to_string(),
            email: "admin@example.com".to_string(),
        };
        let (store, _) = Store::open(dir.path().join("data.json"), &bootstrap).unwrap();
        let app = build_router(AppState {
            store: Arc::new(store),
        });
        (app, dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(app, request).await
    }

    async fn act(app: &Router, action: &str, target: &str) -> (StatusCode, Value) {
        post_json(
            app,
            "/groupAction",
            json!({ "action": action, "actor": "alice", "groupName": "G", "target": target }),
        )
        .await
    }

    /// mainadmin creates alice (admin), alice creates bob and group G.
    async fn provision(app: &Router) {
        let (status, _) = post_json(
            app,
            "/createAdmin",
            json!({ "currentUser": "mainadmin", "username": "alice", "password": "pw", "email": "a@x.com" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post_json(
            app,
            "/createUser",
            json!({ "currentUser": "alice", "username": "bob", "password": "pw2", "email": "b@x.com" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post_json(
            app,
            "/createGroup",
            json!({ "currentUser": "alice", "name": "G", "privacy": "public" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_app();
        let (status, body) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_login() {
        let (app, _dir) = test_app();

        let (status, body) = post_json(
            &app,
            "/login",
            json!({ "username": "mainadmin", "password": BOOT_PW }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "role": "admin" }));

        let (status, body) = post_json(
            &app,
            "/login",
            json!({ "username": "mainadmin", "password": "nope" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);
        assert_eq!(body["msg"], "Wrong password");

        let (status, _) = post_json(&app, "/login", json!({ "username": "ghost", "password": "x" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_against_sha256_data_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let doc = json!({
            "users": {
                "mainadmin": {
                    // sha256("Sunny2024")
                    "password": "7e83fcd0384e24f5f0727a5004633e299bba2884dca6fec45b54878fea4c2c03",
                    "email": "admin@example.com",
                    "role": "admin",
                    "messages": []
                }
            },
            "groups": {}
        });
        std::fs::write(&path, doc.to_string()).unwrap();
        let bootstrap = Bootstrap {
            password: "unused".to_string(),
            email: "admin@example.com".to_string(),
        };
        let (store, _) = Store::open(&path, &bootstrap).unwrap();
        let app = build_router(AppState {
            store: Arc::new(store),
        });

        let (status, body) = post_json(
            &app,
            "/login",
            json!({ "username": "mainadmin", "password": "nope" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "Wrong password");

        let (status, body) = post_json(
            &app,
            "/login",
            json!({ "username": "mainadmin", "password": BOOT_PW }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "admin");
    }

    #[tokio::test]
    async fn test_create_user_conflict_and_forbidden() {
        let (app, _dir) = test_app();
        provision(&app).await;

        let (status, body) = post_json(
            &app,
            "/createUser",
            json!({ "currentUser": "alice", "username": "bob", "password": "x", "email": "" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["ok"], false);

        let (status, body) = post_json(
            &app,
            "/createAdmin",
            json!({ "currentUser": "alice", "username": "eve", "password": "x", "email": "" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Only mainadmin can create admins");
    }

    #[tokio::test]
    async fn test_direct_messages() {
        let (app, _dir) = test_app();
        provision(&app).await;

        for text in ["first", "second", "third"] {
            let (status, _) = post_json(
                &app,
                "/sendPM",
                json!({ "from": "ghost", "to": "bob", "text": text }),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, _) = post_json(&app, "/deleteMsg", json!({ "username": "bob", "index": 1 })).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_json(&app, "/inbox/bob").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["messages"],
            json!([
                { "from": "ghost", "text": "first" },
                { "from": "ghost", "text": "third" },
            ])
        );

        let (status, _) = post_json(&app, "/deleteMsg", json!({ "username": "bob", "index": -1 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = post_json(&app, "/deleteMsg", json!({ "username": "bob", "index": 2 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(
            &app,
            "/sendPM",
            json!({ "from": "bob", "to": "nobody", "text": "hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "Recipient not found");

        let (status, _) = get_json(&app, "/inbox/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_group_flow() {
        let (app, _dir) = test_app();
        provision(&app).await;

        assert_eq!(act(&app, "invite", "bob").await.0, StatusCode::OK);
        assert_eq!(act(&app, "promote", "bob").await.0, StatusCode::OK);

        let (status, body) = act(&app, "kick", "bob").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Cannot kick admin");

        assert_eq!(act(&app, "demote", "bob").await.0, StatusCode::OK);
        assert_eq!(act(&app, "kick", "bob").await.0, StatusCode::OK);

        let (status, body) = act(&app, "ban", "bob").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_unknown_action_reports_group_checks_first() {
        let (app, _dir) = test_app();
        provision(&app).await;

        let (status, body) = post_json(
            &app,
            "/groupAction",
            json!({ "action": "ban", "actor": "ghost", "groupName": "nope" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "ok": false, "msg": "Group not found" }));

        let (status, body) = post_json(
            &app,
            "/groupAction",
            json!({ "action": "ban", "actor": "bob", "groupName": "G", "target": "alice" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["msg"], "Not a member");

        let (status, body) = act(&app, "ban", "bob").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "Unknown action");
    }

    #[tokio::test]
    async fn test_group_messages() {
        let (app, _dir) = test_app();
        provision(&app).await;

        let (status, _) = post_json(
            &app,
            "/groupAction",
            json!({ "action": "send", "actor": "alice", "groupName": "G", "text": "hi all" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_json(&app, "/groupMessages/G/alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"], json!([{ "from": "alice", "text": "hi all" }]));

        let (status, _) = get_json(&app, "/groupMessages/G/bob").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = get_json(&app, "/groupMessages/H/alice").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (app, _dir) = test_app();
        let (status, body) = post_json(&app, "/login", json!({ "username": "mainadmin" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }
}

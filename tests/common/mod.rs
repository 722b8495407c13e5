#![allow(dead_code)]

use axum::{Router, extract::ConnectInfo};
use axum_test::TestServer;
use serde_json::{Value, json};
use sqlx::PgPool;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tower::Layer;
use uuid::Uuid;

use linkgate::config::{AppEnv, Config, StorageBackend};
use linkgate::domain::click_event::ClickEvent;
use linkgate::routes::build_router;
use linkgate::state::{AppState, Repositories};

pub const TEST_PASSWORD: &str = "password123";

/// Inserts `ConnectInfo` the way `into_make_service_with_connect_info` would.
#[derive(Clone)]
pub struct MockConnectInfoLayer(pub SocketAddr);

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService {
            inner,
            addr: self.0,
        }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
    addr: SocketAddr,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        req.extensions_mut().insert(ConnectInfo(self.addr));
        self.inner.call(req)
    }
}

pub fn test_config() -> Config {
    Config {
        app_env: AppEnv::Test,
        listen_addr: "127.0.0.1:0".to_string(),
        base_url: "http://sho.rt".to_string(),
        storage_backend: StorageBackend::Memory,
        database_url: None,
        log_level: "info".to_string(),
        log_format: "text".to_string(),
        click_queue_capacity: 100,
        behind_proxy: false,
        jwt_secret: "integration-test-signing-secret-0123456789".to_string(),
        token_hash_secret: "integration-test-hash-secret".to_string(),
        access_ttl_seconds: 900,
        refresh_ttl_seconds: 604_800,
        refresh_token_rotation: false,
        rate_limit_auth: 100,
        rate_limit_redirect: 100,
        rate_limit_window_seconds: 60,
        rate_limit_sweep_seconds: 60,
        session_sweep_seconds: 86_400,
        db_max_connections: 5,
        db_connect_timeout: 5,
        db_idle_timeout: 60,
        db_max_lifetime: 600,
    }
}

/// State over fresh in-memory repositories. The receiver stands in for the
/// click worker.
pub fn create_test_state(config: &Config) -> (AppState, mpsc::Receiver<ClickEvent>) {
    let (tx, rx) = mpsc::channel(config.click_queue_capacity);
    let state = AppState::new(&Repositories::memory(), config, tx);
    (state, rx)
}

pub fn create_pg_state(pool: PgPool, config: &Config) -> (AppState, mpsc::Receiver<ClickEvent>) {
    let (tx, rx) = mpsc::channel(config.click_queue_capacity);
    let state = AppState::new(&Repositories::postgres(std::sync::Arc::new(pool)), config, tx);
    (state, rx)
}

pub fn server_for(state: AppState) -> TestServer {
    server_from(state, "127.0.0.1:12345".parse().unwrap())
}

pub fn server_from(state: AppState, peer: SocketAddr) -> TestServer {
    let app: Router = build_router(state).layer(MockConnectInfoLayer(peer));
    TestServer::new(app).unwrap()
}

/// Full stack over memory storage with the default test configuration.
pub fn test_server() -> (TestServer, mpsc::Receiver<ClickEvent>) {
    let (state, rx) = create_test_state(&test_config());
    (server_for(state), rx)
}

pub fn unique_email() -> String {
    format!("user-{}@example.com", Uuid::new_v4().simple())
}

pub async fn register(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()
}

pub async fn login(server: &TestServer, email: &str) -> Value {
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

/// Registers a fresh user and returns its access token.
pub async fn access_token(server: &TestServer) -> String {
    let email = unique_email();
    register(server, &email).await;
    login(server, &email).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Inserts a user row directly and returns its id.
pub async fn create_test_user(pool: &PgPool, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(email)
        .bind("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA")
        .execute(pool)
        .await
        .unwrap();
    id
}

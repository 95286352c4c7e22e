#![allow(dead_code)]

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::Response;
use serde_json::{json, Value};
use vidtube::configuration::{ApplicationSettings, JwtSettings, StorageBackend};
use vidtube::startup::{run, AppState};
use vidtube::store::InMemoryStore;
use vidtube::telemetry::init_test_telemetry;

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub client: reqwest::Client,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "integration-access-secret-at-least-32-chars".to_string(),
        refresh_secret: "integration-refresh-secret-at-least-32-chars".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 864_000,
        issuer: "vidtube-test".to_string(),
    }
}

pub async fn spawn_app() -> TestApp {
    init_test_telemetry();

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let application = ApplicationSettings {
        host: "127.0.0.1".to_string(),
        port,
        secure_cookies: false,
        storage: StorageBackend::Memory,
        bcrypt_cost: 4,
    };
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::in_memory(&application, &jwt_settings(), store.clone());

    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

/// name -> full `Set-Cookie` header value
pub fn set_cookies(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|header| {
            let name = header.split('=').next()?.trim().to_string();
            Some((name, header.to_string()))
        })
        .collect()
}

/// Value part of a `Set-Cookie` header
pub fn cookie_value(header: &str) -> String {
    header
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Response {
        self.client
            .post(self.url("/users/register"))
            .json(&json!({
                "username": username,
                "email": email,
                "fullName": "Test User",
                "password": password,
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/users/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Register + login, returning (access token, refresh token)
    pub async fn signed_in(&self, username: &str) -> (String, String) {
        let email = format!("{}@x.io", username);
        assert_eq!(201, self.register(username, &email, "p1").await.status().as_u16());

        let body: Value = self.login(username, "p1").await.json().await.unwrap();
        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    pub async fn refresh_with_cookie(&self, refresh_token: &str) -> Response {
        self.client
            .post(self.url("/users/refresh-token"))
            .header(COOKIE, format!("refreshToken={}", refresh_token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_authorized(&self, path: &str, access_token: &str) -> Response {
        self.client
            .get(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_authorized(&self, path: &str, access_token: &str) -> Response {
        self.client
            .post(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

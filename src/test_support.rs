//! Shared fixtures for the HTTP tests: an in-memory app with rate limiting off.

use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    App,
    body::BoxBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
};
use serde_json::{Value, json};

use crate::{config::Config, db::MemoryRepository, routes, routes::AppState};

pub const PASSWORD: &str = "correct horse battery staple";
pub const ADMIN_KEY: &str = "admin-key";

pub fn test_config() -> Config {
    test_config_with(&[])
}

/// Test config with some variables replaced.
pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    Config::from_lookup(|key| {
        if let Some((_, value)) = overrides.iter().find(|(k, _)| *k == key) {
            return Some(value.to_string());
        }
        let value = match key {
            "SERVER_ADDR" => "127.0.0.1:0",
            "DATABASE_URL" => "memory://",
            "JWT_SECRET" => "test-secret",
            "RATE_LIMIT_ENABLED" => "false",
            "ADMIN_SIGNUP_KEY" => ADMIN_KEY,
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test config")
}

pub fn test_state() -> AppState {
    AppState::new(test_config(), Arc::new(MemoryRepository::new())).expect("app state")
}

pub async fn test_app(
    state: &AppState,
) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error> {
    let state = state.clone();
    test::init_service(App::new().configure(move |cfg| routes::configure(cfg, &state))).await
}

pub fn signup_body(user_name: &str, phone_number: u64) -> Value {
    json!({
        "name": format!("{} Tester", user_name),
        "userName": user_name,
        "email": format!("{}@company.com", user_name),
        "phoneNumber": phone_number,
        "password": PASSWORD,
    })
}

pub async fn read_json(resp: ServiceResponse<BoxBody>) -> Value {
    test::read_body_json(resp).await
}

/// Signs up and logs in; returns the new user's id and access token.
pub async fn register<S>(app: &S, user_name: &str, phone_number: u64, admin: bool) -> (u64, String)
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let mut body = signup_body(user_name, phone_number);
    if admin {
        body["role"] = json!("admin");
        body["adminKey"] = json!(ADMIN_KEY);
    }

    let req = test::TestRequest::post()
        .uri("/user/signup")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED, "signup {user_name}");
    let user_id = read_json(resp).await["user"]["id"]
        .as_u64()
        .expect("user id");

    let req = test::TestRequest::post()
        .uri("/user/login")
        .set_json(json!({ "userName": user_name, "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::OK, "login {user_name}");
    let token = read_json(resp).await["authToken"]
        .as_str()
        .expect("auth token")
        .to_string();

    (user_id, token)
}

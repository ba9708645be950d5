use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use estate_api::config::AuthConfig;
use estate_api::models::users::Role;
use estate_api::routes::configure_routes;
use estate_api::services::auth_service::AuthService;
use estate_api::services::memory_store::{MemoryNotificationStore, MemoryUserStore};
use estate_api::services::notifier::LogNotifier;
use estate_api::services::user_service::UserService;
use estate_api::services::user_store::UserStore;
use estate_api::utils::cookies::{ACCESS_COOKIE, REFRESH_COOKIE};

struct Harness {
    auth: web::Data<AuthService>,
    users: web::Data<UserService>,
    store: Arc<MemoryUserStore>,
}

fn harness() -> Harness {
    let mut config = AuthConfig::new(
        "integration-access-secret-0123456789abcdef",
        "integration-refresh-secret-0123456789abcdef",
    );
    config.hash_iterations = 1000;

    let store = Arc::new(MemoryUserStore::new());
    let auth = web::Data::new(AuthService::new(config, store.clone(), Arc::new(LogNotifier)));
    let users = web::Data::new(UserService::new(store.clone(), Arc::new(MemoryNotificationStore::new())));
    Harness { auth, users, store }
}

fn cookie_value(resp: &ServiceResponse, name: &str) -> Option<String> {
    resp.response()
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

fn register_request(username: &str, email: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "username": username, "email": email, "password": "P@ssw0rd1" }))
}

/// Access cookie and body of a successful registration.
async fn registered(resp: ServiceResponse) -> (String, Value) {
    assert_eq!(resp.status(), StatusCode::CREATED);
    let token = cookie_value(&resp, ACCESS_COOKIE).unwrap();
    let body: Value = test::read_body_json(resp).await;
    (token, body)
}

#[actix_web::test]
async fn test_register_login_and_role_gate() {
    let h = harness();
    let app = test::init_service(
        App::new()
            .app_data(h.auth.clone())
            .app_data(h.users.clone())
            .configure(configure_routes),
    )
    .await;

    // register
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "username": "alice", "email": "a@x.com", "password": "P@ssw0rd1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(cookie_value(&resp, ACCESS_COOKIE).is_some());
    assert!(cookie_value(&resp, REFRESH_COOKIE).is_some());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["role"], "USER");
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("password").is_none());

    // wrong password and unknown user look the same
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": "alice", "password": "wrong" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let wrong: Value = test::read_body_json(resp).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": "nobody", "password": "wrong" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let unknown: Value = test::read_body_json(resp).await;
    assert_eq!(wrong, unknown);

    // correct login via email
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": "a@x.com", "password": "P@ssw0rd1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let access = cookie_value(&resp, ACCESS_COOKIE).unwrap();
    let refresh = cookie_value(&resp, REFRESH_COOKIE).unwrap();
    assert_ne!(access, refresh);

    // USER on an admin endpoint
    let req = test::TestRequest::get()
        .uri("/api/users")
        .cookie(Cookie::new(ACCESS_COOKIE, access.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // same token as a bearer header reaches the profile
    let req = test::TestRequest::get()
        .uri("/api/users/profile")
        .insert_header(("Authorization", format!("Bearer {access}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["email"], "a@x.com");

    // no token at all
    let req = test::TestRequest::get().uri("/api/users/profile").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_duplicate_registration_conflicts() {
    let h = harness();
    let app = test::init_service(
        App::new()
            .app_data(h.auth.clone())
            .app_data(h.users.clone())
            .configure(configure_routes),
    )
    .await;

    registered(test::call_service(&app, register_request("alice", "a@x.com").to_request()).await).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "username": "alice2", "email": "a@x.com", "password": "P@ssw0rd1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Email already registered");
}

#[actix_web::test]
async fn test_admin_actions_notify_and_revoke_access() {
    let h = harness();
    let app = test::init_service(
        App::new()
            .app_data(h.auth.clone())
            .app_data(h.users.clone())
            .configure(configure_routes),
    )
    .await;

    let (admin_token, admin) = registered(test::call_service(&app, register_request("root", "root@x.com").to_request()).await).await;
    let admin_id: uuid::Uuid = admin["data"]["id"].as_str().unwrap().parse().unwrap();
    h.store.set_role(admin_id, Role::Admin).await.unwrap();

    let (bob_token, bob) = registered(test::call_service(&app, register_request("bob", "bob@x.com").to_request()).await).await;
    let bob_id = bob["data"]["id"].as_str().unwrap().to_string();

    // listing works for the admin
    let req = test::TestRequest::get()
        .uri("/api/users?page=1&limit=10&search=BO")
        .cookie(Cookie::new(ACCESS_COOKIE, admin_token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["pagination"]["totalItems"], 1);
    assert_eq!(body["data"]["users"][0]["username"], "bob");

    // promote, then deactivate
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{bob_id}/role"))
        .cookie(Cookie::new(ACCESS_COOKIE, admin_token.clone()))
        .set_json(json!({ "role": "AGENT" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // bob sees the role change in his notifications and marks it read
    let req = test::TestRequest::get()
        .uri("/api/users/notifications?unreadOnly=true")
        .cookie(Cookie::new(ACCESS_COOKIE, bob_token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["pagination"]["totalItems"], 1);
    let notice_id = body["data"]["notifications"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["notifications"][0]["isRead"], false);

    // not the admin's notice to mark
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/notifications/{notice_id}/read"))
        .cookie(Cookie::new(ACCESS_COOKIE, admin_token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/notifications/{notice_id}/read"))
        .cookie(Cookie::new(ACCESS_COOKIE, bob_token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/users/notifications?unreadOnly=true")
        .cookie(Cookie::new(ACCESS_COOKIE, bob_token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["pagination"]["totalItems"], 0);

    // an unreachable page is a validation error, not a crash
    let req = test::TestRequest::get()
        .uri("/api/users?page=18446744073709551615&limit=100")
        .cookie(Cookie::new(ACCESS_COOKIE, admin_token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{admin_id}/deactivate"))
        .cookie(Cookie::new(ACCESS_COOKIE, admin_token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{bob_id}/deactivate"))
        .cookie(Cookie::new(ACCESS_COOKIE, admin_token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // bob's still-unexpired token no longer authenticates
    let req = test::TestRequest::get()
        .uri("/api/users/profile")
        .cookie(Cookie::new(ACCESS_COOKIE, bob_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // and bob cannot log back in
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": "bob", "password": "P@ssw0rd1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Account is deactivated");
}

#[actix_web::test]
async fn test_deleted_account_token_rejected() {
    let h = harness();
    let app = test::init_service(
        App::new()
            .app_data(h.auth.clone())
            .app_data(h.users.clone())
            .configure(configure_routes),
    )
    .await;

    let (token, _) = registered(test::call_service(&app, register_request("carol", "c@x.com").to_request()).await).await;

    let req = test::TestRequest::delete()
        .uri("/api/users/account")
        .cookie(Cookie::new(ACCESS_COOKIE, token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/users/profile")
        .cookie(Cookie::new(ACCESS_COOKIE, token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_health() {
    let h = harness();
    let app = test::init_service(
        App::new()
            .app_data(h.auth.clone())
            .app_data(h.users.clone())
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

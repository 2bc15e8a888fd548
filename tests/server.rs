mod support;

use axum::{
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::post,
    Extension, Router,
};
use oxide_auth_axum_server::{
    middleware::token, BearerToken, OAuthServer, ServerOptions,
};
use tower::ServiceExt;

use support::defaults::*;
use support::*;

#[test]
fn building_without_model_fails() {
    let failure = OAuthServer::<Model>::builder()
        .continue_middleware(true)
        .build()
        .err()
        .expect("Expected a missing model to fail");

    assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failure.name(), "invalid_argument");
    assert_eq!(failure.description(), "Missing parameter: `model`");
}

#[test]
fn builder_collects_options() {
    let server = OAuthServer::builder()
        .model(model())
        .use_error_handler(true)
        .continue_middleware(true)
        .allow_credentials_in_body(true)
        .body_limit(1024)
        .build()
        .unwrap();

    assert_eq!(
        server.options(),
        &ServerOptions {
            use_error_handler: true,
            continue_middleware: true,
            body_limit: 1024,
            allow_credentials_in_body: true,
        }
    );
    assert!(!server.call_options().skips_response());
}

#[tokio::test]
async fn error_handler_receives_failures() {
    let server = OAuthServer::builder()
        .model(model())
        .use_error_handler(true)
        .error_handler(|failure| {
            (StatusCode::IM_A_TEAPOT, failure.description()).into_response()
        })
        .build()
        .unwrap();
    let app: Router = server.router("/oauth");

    let response = app.oneshot(form("/oauth/token", "code=abc")).await.unwrap();
    let (status, _, body) = read(response).await;

    assert_eq!(status, StatusCode::IM_A_TEAPOT);
    assert_eq!(body, b"Missing parameter: `grant_type`");
}

#[tokio::test]
async fn default_error_handler_sends_bare_status() {
    let server = OAuthServer::with_config(
        model(),
        ServerOptions {
            use_error_handler: true,
            ..ServerOptions::default()
        },
    );
    let app: Router = server.router("/oauth");

    let response = app.oneshot(form("/oauth/token", "code=abc")).await.unwrap();
    let (status, _, body) = read(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_empty());
}

#[tokio::test]
async fn router_prefix_ignores_trailing_slash() {
    let app: Router = OAuthServer::new(model()).router("/api/oauth/");

    let uri = format!("/api/oauth/authorize?{}", authorization_query(EXAMPLE_CLIENT_ID));
    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let response = app.oneshot(get("/api/oauth/token")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn token_middleware_continues_with_token() {
    let (model, refresh_token) = model_with_refresh();
    let server = OAuthServer::builder()
        .model(model)
        .continue_middleware(true)
        .build()
        .unwrap();

    let app = Router::new()
        .route(
            "/token",
            post(|Extension(token): Extension<BearerToken>| async move {
                token.token_type
            }),
        )
        .layer(from_fn_with_state(server, token::<Model>));

    let body = encode(&[
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token.as_str()),
    ]);
    let response = app.oneshot(form("/token", &body)).await.unwrap();
    let (status, _, body) = read(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"bearer");
}

#[tokio::test]
async fn token_middleware_renders_without_continuation() {
    let (model, refresh_token) = model_with_refresh();
    let server = OAuthServer::new(model);

    let app = Router::new()
        .route("/token", post(|| async { "not reached" }))
        .layer(from_fn_with_state(server, token::<Model>));

    let body = encode(&[
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token.as_str()),
    ]);
    let response = app.oneshot(form("/token", &body)).await.unwrap();
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
}

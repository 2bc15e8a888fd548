#![allow(dead_code)]
use std::collections::HashMap;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::Response,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use oxide_auth::endpoint::{Issuer, OwnerConsent, Solicitation};
use oxide_auth::frontends::dev::Url;
use oxide_auth::frontends::simple::endpoint::{FnSolicitor, Generic, Vacant};
use oxide_auth::primitives::{
    authorizer::AuthMap,
    generator::RandomGenerator,
    grant::{Extensions, Grant},
    issuer::TokenMap,
    prelude::{Client, ClientMap},
    scope::Scope,
};
use oxide_auth_axum_server::{OAuthRequest, OAuthResponse};

use self::defaults::*;

pub mod defaults {
    pub const EXAMPLE_CLIENT_ID: &str = "ClientId";
    pub const EXAMPLE_PRIVATE_CLIENT_ID: &str = "PrivateClientId";
    pub const EXAMPLE_OWNER_ID: &str = "Owner";
    pub const EXAMPLE_PASSPHRASE: &str = "VGhpcyBpcyBhIHZlcnkgc2VjdXJlIHBhc3NwaHJhc2UK";
    pub const EXAMPLE_REDIRECT_URI: &str = "https://client.example/endpoint";
    pub const EXAMPLE_SCOPE: &str = "example default";
    pub const EXAMPLE_RESOURCE_SCOPE: &str = "default";
    pub const EXAMPLE_STATE: &str = "foobiz";
}

pub type Consent = fn(&mut OAuthRequest, Solicitation) -> OwnerConsent<OAuthResponse>;

/// Model backed by the in-memory primitives of the engine.
pub type Model = Generic<
    ClientMap,
    AuthMap<RandomGenerator>,
    TokenMap<RandomGenerator>,
    FnSolicitor<Consent>,
    Vec<Scope>,
>;

/// Model that can only register clients.
pub type RegistrarOnly = Generic<ClientMap, Vacant, Vacant, FnSolicitor<Consent>, Vec<Scope>>;

pub fn approve(_: &mut OAuthRequest, _: Solicitation) -> OwnerConsent<OAuthResponse> {
    OwnerConsent::Authorized(EXAMPLE_OWNER_ID.to_owned())
}

pub fn deny(_: &mut OAuthRequest, _: Solicitation) -> OwnerConsent<OAuthResponse> {
    OwnerConsent::Denied
}

pub fn url(url: &str) -> Url {
    url.parse().unwrap()
}

pub fn scope(scope: &str) -> Scope {
    scope.parse().unwrap()
}

pub fn registrar() -> ClientMap {
    let mut registrar = ClientMap::new();
    registrar.register_client(Client::public(
        EXAMPLE_CLIENT_ID,
        url(EXAMPLE_REDIRECT_URI).into(),
        scope(EXAMPLE_SCOPE),
    ));
    registrar.register_client(Client::confidential(
        EXAMPLE_PRIVATE_CLIENT_ID,
        url(EXAMPLE_REDIRECT_URI).into(),
        scope(EXAMPLE_SCOPE),
        EXAMPLE_PASSPHRASE.as_bytes(),
    ));
    registrar
}

pub fn model() -> Model {
    model_with(approve)
}

pub fn model_with(consent: Consent) -> Model {
    Generic {
        registrar: registrar(),
        authorizer: AuthMap::new(RandomGenerator::new(16)),
        issuer: TokenMap::new(RandomGenerator::new(16)),
        solicitor: FnSolicitor(consent),
        scopes: vec![scope(EXAMPLE_RESOURCE_SCOPE)],
        response: Vacant,
    }
}

/// A model whose issuer already handed out an access token valid until `until`.
pub fn model_with_token(until: DateTime<Utc>) -> (Model, String) {
    let mut model = model();
    let issued = model.issuer.issue(grant(until)).unwrap();
    (model, issued.token)
}

/// A model whose issuer already handed out a refreshable token, returning the refresh token.
pub fn model_with_refresh() -> (Model, String) {
    let mut model = model();
    let issued = model
        .issuer
        .issue(grant(Utc::now() + chrono::Duration::hours(1)))
        .unwrap();
    (model, issued.refresh.unwrap())
}

pub fn registrar_only() -> RegistrarOnly {
    Generic {
        registrar: registrar(),
        authorizer: Vacant,
        issuer: Vacant,
        solicitor: FnSolicitor(approve as Consent),
        scopes: vec![scope(EXAMPLE_RESOURCE_SCOPE)],
        response: Vacant,
    }
}

pub fn grant(until: DateTime<Utc>) -> Grant {
    Grant {
        owner_id: EXAMPLE_OWNER_ID.to_owned(),
        client_id: EXAMPLE_CLIENT_ID.to_owned(),
        scope: scope(EXAMPLE_SCOPE),
        redirect_uri: url(EXAMPLE_REDIRECT_URI),
        until,
        extensions: Extensions::new(),
    }
}

pub fn basic_authorization(client_id: &str, passphrase: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", client_id, passphrase));
    format!("Basic {}", encoded)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

pub fn json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Status, headers and raw body of a response.
pub async fn read(response: Response) -> (StatusCode, HeaderMap, Vec<u8>) {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

pub async fn read_json(response: Response) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = read(response).await;
    let value = serde_json::from_slice(&body).expect("Expected a json body");
    (status, value)
}

/// Query parameters of the `Location` a response redirects to.
pub fn redirect_query(headers: &HeaderMap) -> HashMap<String, String> {
    let location = headers
        .get(header::LOCATION)
        .expect("Expected a location header")
        .to_str()
        .unwrap();
    url(location).query_pairs().into_owned().collect()
}

pub fn encode(pairs: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(pairs).unwrap()
}

/// Form body of an authorization code exchange by the public client.
pub fn code_exchange(code: &str) -> String {
    encode(&[
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", EXAMPLE_REDIRECT_URI),
        ("client_id", EXAMPLE_CLIENT_ID),
    ])
}

/// The query of an authorization request by `client_id`.
pub fn authorization_query(client_id: &str) -> String {
    encode(&[
        ("response_type", "code"),
        ("client_id", client_id),
        ("state", EXAMPLE_STATE),
    ])
}

//! An authorization server with an in-memory model.
//!
//! Run with `RUST_LOG=debug cargo run --example axum-server`, then visit
//! `http://localhost:8020/oauth/authorize?response_type=code&client_id=LocalClient` to grant a
//! code. Exchange it at `/oauth/token` and use the access token on `/`.
use axum::{
    middleware::from_fn_with_state, response::Html, routing::get, Extension, Router,
};
use oxide_auth::endpoint::{OwnerConsent, QueryParameter, Solicitation, WebResponse};
use oxide_auth::frontends::simple::endpoint::{FnSolicitor, Generic, Vacant};
use oxide_auth::primitives::{
    authorizer::AuthMap, generator::RandomGenerator, grant::Grant, issuer::TokenMap,
    prelude::{Client, ClientMap},
    scope::Scope,
};
use oxide_auth_axum_server::{
    middleware::authenticate, OAuthRequest, OAuthResponse, OAuthServer, ServerOptions,
};
use tracing_subscriber::EnvFilter;

type Consent = fn(&mut OAuthRequest, Solicitation) -> OwnerConsent<OAuthResponse>;

type Model = Generic<
    ClientMap,
    AuthMap<RandomGenerator>,
    TokenMap<RandomGenerator>,
    FnSolicitor<Consent>,
    Vec<Scope>,
>;

const CLIENT_ID: &str = "LocalClient";
const CLIENT_SECRET: &str = "SecretSecret";
const CLIENT_REDIRECT: &str = "http://localhost:8021/endpoint";

fn preconfigured() -> Model {
    let client = Client::confidential(
        CLIENT_ID,
        CLIENT_REDIRECT.parse::<oxide_auth::frontends::dev::Url>().unwrap().into(),
        "default-scope".parse().unwrap(),
        CLIENT_SECRET.as_bytes(),
    );

    Generic {
        registrar: vec![client].into_iter().collect(),
        authorizer: AuthMap::new(RandomGenerator::new(16)),
        issuer: TokenMap::new(RandomGenerator::new(16)),
        solicitor: FnSolicitor(consent as Consent),
        scopes: vec!["default-scope".parse().unwrap()],
        response: Vacant,
    }
}

/// Shows a consent page, or takes the decision posted from it.
fn consent(request: &mut OAuthRequest, solicitation: Solicitation) -> OwnerConsent<OAuthResponse> {
    let query = request.query();
    if query.and_then(|q| q.unique_value("allow")).is_some() {
        return OwnerConsent::Authorized("dummy user".into());
    }
    if query.and_then(|q| q.unique_value("deny")).is_some() {
        return OwnerConsent::Denied;
    }

    let pre_grant = solicitation.pre_grant();
    let page = format!(
        "<html>'{}' (at {}) is requesting permission for '{}'\
         <form method=\"post\">\
         <input type=\"hidden\" name=\"response_type\" value=\"code\">\
         <input type=\"hidden\" name=\"client_id\" value=\"{}\">\
         <button name=\"allow\" value=\"1\">Accept</button>\
         <button name=\"deny\" value=\"1\">Deny</button>\
         </form></html>",
        pre_grant.client_id, pre_grant.redirect_uri, pre_grant.scope, pre_grant.client_id,
    );

    let mut response = OAuthResponse::default();
    if let Err(err) = response.ok() {
        return OwnerConsent::Error(err);
    }
    match response.content_type("text/html") {
        Ok(response) => OwnerConsent::InProgress(response.body(&page)),
        Err(err) => OwnerConsent::Error(err),
    }
}

async fn index(Extension(grant): Extension<Grant>) -> Html<String> {
    Html(format!(
        "<html>Hello {}, your client {} has access to '{}'.</html>",
        grant.owner_id, grant.client_id, grant.scope
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = ServerOptions::from_env()?;
    let server = OAuthServer::with_config(preconfigured(), options);

    let app = Router::new()
        .route("/", get(index))
        .layer(from_fn_with_state(server.clone(), authenticate::<Model>))
        .merge(server.router("/oauth"));

    let listener = tokio::net::TcpListener::bind("localhost:8020").await?;
    tracing::info!(address = %listener.local_addr()?, "authorization server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

//! Middleware, routes and the extractor driving an [`OAuthServer`].
//!
//! The middleware functions are meant for [`axum::middleware::from_fn_with_state`] with the
//! server as state:
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/protected", get(protected))
//!     .layer(middleware::from_fn_with_state(server.clone(), authenticate));
//! ```
//!
//! A successful `authenticate` inserts the [`Grant`] into the request extensions and runs the
//! next handler. `authorize` and `token` render the engine response unless `continue_middleware`
//! is set, in which case their result is inserted instead and the next handler runs. With
//! `skip_response` in the call options every result, failures included, is inserted as an
//! [`Outcome`] and the next handler answers the request.
use axum::{
    async_trait,
    body::Body,
    extract::{FromRef, FromRequest, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use oxide_auth::endpoint::Endpoint;
use oxide_auth::primitives::grant::Grant;

use crate::outcome::Exchange;
use crate::{
    Authorization, BearerToken, OAuthFailure, OAuthRequest, OAuthResource, OAuthServer, Outcome,
};

/// Guard the following handlers with an access token check.
pub async fn authenticate<E>(
    State(server): State<OAuthServer<E>>, mut req: Request, next: Next,
) -> Response
where
    E: Endpoint<OAuthRequest> + Send + 'static,
    OAuthFailure: From<E::Error>,
{
    let result = match OAuthResource::from_head(req.headers(), req.uri()) {
        Ok(resource) => server.authenticate(resource).await,
        Err(err) => Err(err.into()),
    };

    if server.call_options().skips_response() {
        req.extensions_mut().insert(Outcome(result));
        return next.run(req).await;
    }

    match result {
        Ok(grant) => {
            tracing::debug!(owner = %grant.owner_id, client = %grant.client_id, "request authenticated");
            req.extensions_mut().insert(grant);
            next.run(req).await
        }
        Err(failure) => server.fail(failure),
    }
}

/// Handle an authorization request.
pub async fn authorize<E>(State(server): State<OAuthServer<E>>, req: Request, next: Next) -> Response
where
    E: Endpoint<OAuthRequest> + Send + 'static,
    OAuthFailure: From<E::Error>,
{
    let (req, extracted) = buffer(req, server.options().body_limit).await;
    let result = match extracted {
        Ok(request) => server.authorize_exchange(request).await,
        Err(failure) => Err(failure),
    };

    conclude(&server, result, req, next).await
}

/// Handle a token request.
pub async fn token<E>(State(server): State<OAuthServer<E>>, req: Request, next: Next) -> Response
where
    E: Endpoint<OAuthRequest> + Send + 'static,
    OAuthFailure: From<E::Error>,
{
    let (req, extracted) = buffer(req, server.options().body_limit).await;
    let result = match extracted {
        Ok(request) => server.token_exchange(request).await,
        Err(failure) => Err(failure),
    };

    conclude(&server, result, req, next).await
}

impl<E> OAuthServer<E>
where
    E: Endpoint<OAuthRequest> + Send + 'static,
    OAuthFailure: From<E::Error>,
{
    /// Routes answering `<prefix>/authorize` and `<prefix>/token` with this server.
    ///
    /// `/authorize` accepts `GET` as well as `POST`, so that solicitors can show a consent page
    /// and receive the decision on the same path.
    pub fn router<S>(&self, prefix: &str) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let prefix = prefix.trim_end_matches('/');

        Router::new()
            .route(
                &format!("{}/authorize", prefix),
                get(authorize_route::<E>).post(authorize_route::<E>),
            )
            .route(&format!("{}/token", prefix), post(token_route::<E>))
            .with_state(self.clone())
    }
}

async fn authorize_route<E>(State(server): State<OAuthServer<E>>, req: Request) -> Response
where
    E: Endpoint<OAuthRequest> + Send + 'static,
    OAuthFailure: From<E::Error>,
{
    let (_, extracted) = buffer(req, server.options().body_limit).await;
    let result = match extracted {
        Ok(request) => server.authorize_exchange(request).await,
        Err(failure) => Err(failure),
    };

    match result {
        Ok(exchange) => exchange.response.into_response(),
        Err(failure) => server.fail(failure),
    }
}

async fn token_route<E>(State(server): State<OAuthServer<E>>, req: Request) -> Response
where
    E: Endpoint<OAuthRequest> + Send + 'static,
    OAuthFailure: From<E::Error>,
{
    let (_, extracted) = buffer(req, server.options().body_limit).await;
    let result = match extracted {
        Ok(request) => server.token_exchange(request).await,
        Err(failure) => Err(failure),
    };

    match result {
        Ok(exchange) => exchange.response.into_response(),
        Err(failure) => server.fail(failure),
    }
}

/// Extract the request for the engine, keeping the original one for the next handler.
async fn buffer(req: Request, limit: usize) -> (Request, Result<OAuthRequest, OAuthFailure>) {
    let (parts, body) = req.into_parts();

    match OAuthRequest::extract(&parts, body, limit).await {
        Ok((request, bytes)) => (Request::from_parts(parts, Body::from(bytes)), Ok(request)),
        Err(err) => (Request::from_parts(parts, Body::empty()), Err(err.into())),
    }
}

async fn conclude<E, T>(
    server: &OAuthServer<E>, result: Result<Exchange<T>, OAuthFailure>, mut req: Request,
    next: Next,
) -> Response
where
    T: Clone + Send + Sync + 'static,
{
    if server.call_options().skips_response() {
        req.extensions_mut()
            .insert(Outcome(result.map(|exchange| exchange.value)));
        return next.run(req).await;
    }

    match result {
        Ok(exchange) if server.options().continue_middleware => {
            req.extensions_mut().insert(exchange.value);
            next.run(req).await
        }
        Ok(exchange) => exchange.response.into_response(),
        Err(failure) => server.fail(failure),
    }
}

/// Extractor pairing the server from the router state with the request.
///
/// Handlers decide themselves how to answer:
///
/// ```rust,ignore
/// async fn token(oauth: OAuth<Model>) -> Result<Json<BearerToken>, OAuthFailure> {
///     oauth.token().await.map(Json)
/// }
/// ```
pub struct OAuth<E> {
    server: OAuthServer<E>,
    request: OAuthRequest,
}

impl<E> OAuth<E> {
    /// The server taken from the state.
    pub fn server(&self) -> &OAuthServer<E> {
        &self.server
    }

    /// The extracted request.
    pub fn request(&self) -> &OAuthRequest {
        &self.request
    }
}

impl<E> OAuth<E>
where
    E: Endpoint<OAuthRequest> + Send + 'static,
    OAuthFailure: From<E::Error>,
{
    /// See [`OAuthServer::authenticate`].
    pub async fn authenticate(self) -> Result<Grant, OAuthFailure> {
        self.server.authenticate(self.request).await
    }

    /// See [`OAuthServer::authorize`].
    pub async fn authorize(self) -> Result<Authorization, OAuthFailure> {
        self.server.authorize(self.request).await
    }

    /// See [`OAuthServer::token`].
    pub async fn token(self) -> Result<BearerToken, OAuthFailure> {
        self.server.token(self.request).await
    }
}

#[async_trait]
impl<S, E> FromRequest<S> for OAuth<E>
where
    OAuthServer<E>: FromRef<S>,
    S: Send + Sync,
    E: Send + 'static,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let server = OAuthServer::<E>::from_ref(state);
        let limit = server.options().body_limit;

        match OAuthRequest::from_http(req, limit).await {
            Ok((request, _)) => Ok(OAuth { server, request }),
            Err(err) => Err(server.fail(err.into())),
        }
    }
}

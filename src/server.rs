use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use oxide_auth::endpoint::{
    AccessTokenFlow, AuthorizationFlow, ClientCredentialsFlow, Endpoint, QueryParameter,
    RefreshFlow, ResourceFlow,
};
use oxide_auth::frontends::simple::endpoint::{resource_flow, Error};
use oxide_auth::primitives::grant::Grant;

use crate::outcome::{self, Exchange};
use crate::{Authorization, BearerToken, OAuthFailure, OAuthRequest, Options, ServerOptions};

/// Renders failures when `use_error_handler` is set.
pub type ErrorHandler = Arc<dyn Fn(OAuthFailure) -> Response + Send + Sync>;

/// Drives a model through the `authenticate`, `authorize` and `token` operations.
///
/// The model is any `Endpoint` of the engine. It is created once and shared by every clone of
/// the server, cloning is cheap. Each operation locks the model on a blocking thread for as long
/// as the engine needs it. A panic inside the model fails only the call that panicked, later
/// calls keep using the model.
pub struct OAuthServer<E> {
    inner: Arc<Inner<E>>,
    options: Options,
}

struct Inner<E> {
    endpoint: Mutex<E>,
    options: ServerOptions,
    error_handler: Option<ErrorHandler>,
}

/// Configures an [`OAuthServer`].
pub struct OAuthServerBuilder<E> {
    model: Option<E>,
    options: ServerOptions,
    error_handler: Option<ErrorHandler>,
}

impl<E> Clone for OAuthServer<E> {
    fn clone(&self) -> Self {
        OAuthServer {
            inner: Arc::clone(&self.inner),
            options: self.options.clone(),
        }
    }
}

impl<E> Default for OAuthServerBuilder<E> {
    fn default() -> Self {
        OAuthServerBuilder {
            model: None,
            options: ServerOptions::default(),
            error_handler: None,
        }
    }
}

impl<E> OAuthServerBuilder<E> {
    /// The model the engine operates on. Required.
    pub fn model(mut self, model: E) -> Self {
        self.model = Some(model);
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    /// See [`ServerOptions::use_error_handler`].
    pub fn use_error_handler(mut self, enable: bool) -> Self {
        self.options.use_error_handler = enable;
        self
    }

    /// See [`ServerOptions::continue_middleware`].
    pub fn continue_middleware(mut self, enable: bool) -> Self {
        self.options.continue_middleware = enable;
        self
    }

    /// See [`ServerOptions::body_limit`].
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.options.body_limit = limit;
        self
    }

    /// See [`ServerOptions::allow_credentials_in_body`].
    pub fn allow_credentials_in_body(mut self, allow: bool) -> Self {
        self.options.allow_credentials_in_body = allow;
        self
    }

    /// Register the handler failures are forwarded to when `use_error_handler` is set.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(OAuthFailure) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Create the server, failing if no model was given.
    pub fn build(self) -> Result<OAuthServer<E>, OAuthFailure> {
        let model = self
            .model
            .ok_or_else(|| OAuthFailure::InvalidArgument("Missing parameter: `model`".to_owned()))?;

        Ok(OAuthServer {
            inner: Arc::new(Inner {
                endpoint: Mutex::new(model),
                options: self.options,
                error_handler: self.error_handler,
            }),
            options: Options::default(),
        })
    }
}

impl<E> OAuthServer<E> {
    /// Start configuring a server.
    pub fn builder() -> OAuthServerBuilder<E> {
        OAuthServerBuilder::default()
    }

    /// A server with default options.
    pub fn new(model: E) -> Self {
        Self::with_config(model, ServerOptions::default())
    }

    /// A server with the given options.
    pub fn with_config(model: E, options: ServerOptions) -> Self {
        OAuthServer {
            inner: Arc::new(Inner {
                endpoint: Mutex::new(model),
                options,
                error_handler: None,
            }),
            options: Options::default(),
        }
    }

    /// A clone sharing the model, whose operations use the given call options.
    pub fn with_options(&self, options: Options) -> Self {
        OAuthServer {
            inner: Arc::clone(&self.inner),
            options,
        }
    }

    /// The options the server was built with.
    pub fn options(&self) -> &ServerOptions {
        &self.inner.options
    }

    /// The options of single calls.
    pub fn call_options(&self) -> &Options {
        &self.options
    }

    /// Answer a failed operation.
    ///
    /// Renders the failure, or hands it to the error handler when `use_error_handler` is set.
    /// Without a registered handler only the status is sent.
    pub fn fail(&self, failure: OAuthFailure) -> Response {
        if failure.status().is_server_error() {
            tracing::error!(error = failure.name(), description = %failure, "oauth operation failed");
        } else {
            tracing::warn!(status = %failure.status(), error = failure.name(), "oauth request rejected");
        }

        if !self.inner.options.use_error_handler {
            return failure.into_response();
        }

        match &self.inner.error_handler {
            Some(handler) => handler(failure),
            None => failure.status().into_response(),
        }
    }
}

impl<E> OAuthServer<E>
where
    E: Endpoint<OAuthRequest> + Send + 'static,
    OAuthFailure: From<E::Error>,
{
    /// Check the access token of a request, resolving to the grant it stands for.
    ///
    /// Only the authorization header and the query are consulted. The scopes required are the
    /// ones of the call options, or the ones of the model.
    pub async fn authenticate(&self, request: impl Into<OAuthRequest>) -> Result<Grant, OAuthFailure> {
        let request = request.into();
        let scope = self.options.scope.clone();

        self.run("authenticate", move |endpoint| {
            require(endpoint.issuer_mut().is_some(), "issuer")?;

            let denied = match scope {
                Some(scope) => {
                    let issuer = endpoint
                        .issuer_mut()
                        .ok_or_else(|| OAuthFailure::missing_capability("issuer"))?;
                    match resource_flow(issuer, &scope).execute(request) {
                        Ok(grant) => return Ok(grant),
                        Err(denied) => {
                            denied.map_err(<OAuthFailure as From<Error<OAuthRequest>>>::from)
                        }
                    }
                }
                None => {
                    require(endpoint.scopes().is_some(), "scopes")?;
                    match ResourceFlow::<_, OAuthRequest>::prepare(endpoint)?.execute(request) {
                        Ok(grant) => return Ok(grant),
                        Err(denied) => denied.map_err(OAuthFailure::from),
                    }
                }
            };

            Err(match denied {
                Ok(response) => OAuthFailure::from_response(response),
                Err(failure) => failure,
            })
        })
        .await
    }

    /// Ask the owner to authorize a client, resolving to an authorization code once they did.
    ///
    /// Parameters of the body are read as if they were part of the query, replacing query
    /// parameters of the same name.
    pub async fn authorize(&self, request: OAuthRequest) -> Result<Authorization, OAuthFailure> {
        self.authorize_exchange(request)
            .await
            .map(|exchange| exchange.value)
    }

    /// Issue a token for the grant named by `grant_type`.
    ///
    /// Supports `authorization_code`, `refresh_token` and `client_credentials`.
    pub async fn token(&self, request: OAuthRequest) -> Result<BearerToken, OAuthFailure> {
        self.token_exchange(request).await.map(|exchange| exchange.value)
    }

    pub(crate) async fn authorize_exchange(
        &self, request: OAuthRequest,
    ) -> Result<Exchange<Authorization>, OAuthFailure> {
        let request = request.body_into_query();

        let response = self
            .run("authorize", move |endpoint| {
                require(endpoint.registrar().is_some(), "registrar")?;
                require(endpoint.authorizer_mut().is_some(), "authorizer")?;
                require(endpoint.owner_solicitor().is_some(), "owner_solicitor")?;

                Ok(AuthorizationFlow::<_, OAuthRequest>::prepare(endpoint)?.execute(request)?)
            })
            .await?;

        outcome::authorization(response)
    }

    pub(crate) async fn token_exchange(
        &self, request: OAuthRequest,
    ) -> Result<Exchange<BearerToken>, OAuthFailure> {
        let credentials_in_body = self.inner.options.allow_credentials_in_body;

        let response = self
            .run("token", move |endpoint| {
                require(endpoint.registrar().is_some(), "registrar")?;
                require(endpoint.issuer_mut().is_some(), "issuer")?;

                let grant_type = request
                    .body()
                    .and_then(|body| body.unique_value("grant_type"))
                    .map(Cow::into_owned);

                match grant_type.as_deref() {
                    None => Err(OAuthFailure::invalid_request("Missing parameter: `grant_type`")),
                    Some("authorization_code") => {
                        require(endpoint.authorizer_mut().is_some(), "authorizer")?;
                        let mut flow = AccessTokenFlow::<_, OAuthRequest>::prepare(endpoint)?;
                        flow.allow_credentials_in_body(credentials_in_body);
                        Ok(flow.execute(request)?)
                    }
                    Some("refresh_token") => {
                        Ok(RefreshFlow::<_, OAuthRequest>::prepare(endpoint)?.execute(request)?)
                    }
                    Some("client_credentials") => {
                        require(endpoint.owner_solicitor().is_some(), "owner_solicitor")?;
                        let mut flow = ClientCredentialsFlow::<_, OAuthRequest>::prepare(endpoint)?;
                        flow.allow_credentials_in_body(credentials_in_body);
                        Ok(flow.execute(request)?)
                    }
                    Some(other) => {
                        tracing::debug!(grant_type = other, "unsupported grant type");
                        Err(OAuthFailure::protocol(
                            StatusCode::BAD_REQUEST,
                            "unsupported_grant_type",
                            "Unsupported grant type: `grant_type` is invalid",
                        ))
                    }
                }
            })
            .await?;

        outcome::bearer_token(response)
    }

    /// Run `f` with exclusive access to the model on a blocking thread.
    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, OAuthFailure>
    where
        F: FnOnce(&mut E) -> Result<T, OAuthFailure> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let span = tracing::debug_span!("oauth", operation);

        let joined = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            tracing::debug!("invoking engine");

            // A panic of an earlier call does not fail later ones.
            let mut endpoint = inner.endpoint.lock().unwrap_or_else(|poisoned| {
                tracing::warn!("model lock was poisoned by a panicking call, recovering");
                poisoned.into_inner()
            });
            f(&mut *endpoint)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(operation, error = %err, "engine task failed");
                Err(OAuthFailure::Server(format!("{} did not complete", operation)))
            }
        }
    }
}

fn require(present: bool, capability: &str) -> Result<(), OAuthFailure> {
    if present {
        Ok(())
    } else {
        Err(OAuthFailure::missing_capability(capability))
    }
}

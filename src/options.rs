//! Configuration of the server and of single operations.
use oxide_auth::primitives::scope::Scope;
use serde::{Deserialize, Serialize};

use crate::body::DEFAULT_BODY_LIMIT;

/// Settings that stay fixed for the lifetime of an [`OAuthServer`](crate::OAuthServer).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Forward failures to the registered error handler instead of rendering them.
    pub use_error_handler: bool,

    /// Run the next handler after a successful `authorize` or `token`.
    ///
    /// The result is available to it from the request extensions. `authenticate` always runs
    /// the next handler on success.
    pub continue_middleware: bool,

    /// Maximum number of body bytes buffered for the engine.
    pub body_limit: usize,

    /// Accept `client_id` and `client_secret` in the request body of token requests.
    ///
    /// Only enable this when clients can not use HTTP Basic authentication.
    pub allow_credentials_in_body: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            use_error_handler: false,
            continue_middleware: false,
            body_limit: DEFAULT_BODY_LIMIT,
            allow_credentials_in_body: false,
        }
    }
}

impl ServerOptions {
    /// Load options from `OAUTH_SERVER_*` environment variables.
    ///
    /// For example `OAUTH_SERVER_BODY_LIMIT=1024`. Variables that are not set keep their default.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_env_prefixed("OAUTH_SERVER")
    }

    /// Load options from environment variables starting with `<prefix>_`.
    pub fn from_env_prefixed(prefix: &str) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix).try_parsing(true))
            .build()?;

        config.try_deserialize()
    }
}

/// Settings of a single call of an operation.
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub(crate) skip_response: bool,
    pub(crate) scope: Option<Vec<Scope>>,
}

impl Options {
    /// Options with every setting off.
    pub fn new() -> Self {
        Options::default()
    }

    /// Hand the result to the next handler as an [`Outcome`](crate::Outcome), whether it
    /// succeeded or not, instead of rendering it.
    pub fn skip_response(mut self, skip: bool) -> Self {
        self.skip_response = skip;
        self
    }

    /// Scopes required by `authenticate`, in place of the ones of the model.
    pub fn scope(mut self, scope: impl IntoIterator<Item = Scope>) -> Self {
        self.scope = Some(scope.into_iter().collect());
        self
    }

    /// Whether results are handed on instead of rendered.
    pub fn skips_response(&self) -> bool {
        self.skip_response
    }
}

//! Drives an `oxide-auth` endpoint from axum.
//!
//! An [`OAuthServer`] owns the model, the `Endpoint` holding registrar, authorizer, issuer,
//! solicitor and scopes. It exposes the `authenticate`, `authorize` and `token` operations in
//! three shapes:
//!
//! * as middleware for [`axum::middleware::from_fn_with_state`], see [`middleware`];
//! * as ready routes through [`OAuthServer::router`];
//! * as the [`OAuth`] extractor for handlers that answer themselves.
//!
//! Request bodies are buffered up to a limit and decoded as json or form before the engine sees
//! them. Engine responses and failures are rendered as the usual OAuth answers, see
//! [`OAuthFailure`].
#![warn(missing_docs)]

mod body;
pub use body::{Parameters, ParsedBody, DEFAULT_BODY_LIMIT};

mod error;
pub use error::{OAuthFailure, WebError};

pub mod middleware;
pub use middleware::OAuth;

mod options;
pub use options::{Options, ServerOptions};

mod outcome;
pub use outcome::{Authorization, AuthorizationCode, BearerToken, Outcome};

mod request;
pub use request::{OAuthResource, OAuthRequest};

mod response;
pub use response::OAuthResponse;

mod server;
pub use server::{ErrorHandler, OAuthServer, OAuthServerBuilder};

use axum::{
    http::{
        header::{self, HeaderMap},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use oxide_auth::frontends::{dev::OAuthError, simple::endpoint::Error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::OAuthRequest;

#[derive(Clone, Debug, Error)]
/// Errors of the request and response plumbing around the engine.
pub enum WebError {
    /// A header of the response could not be set
    #[error("Couldn't set header, {0}")]
    Header(String),

    /// Request body could not be parsed as a form
    #[error("Request body is not a valid form")]
    Form,

    /// Request body was declared as json but could not be parsed as a flat json object
    #[error("Request body is not a valid json object")]
    Json,

    /// Request query was absent or could not be parsed
    #[error("No query present")]
    Query,

    /// Request body was absent
    #[error("No body present")]
    Body,

    /// Request body could not be read from the connection
    #[error("Request body could not be read")]
    Read,

    /// Request body exceeded the configured limit
    #[error("Request body exceeds the limit of {0} bytes")]
    BodyTooLarge(usize),

    /// The Authorization header was invalid
    #[error("Request has invalid Authorization headers")]
    Authorization,
}

/// A failure of one of the `authenticate`, `authorize` or `token` operations.
///
/// Every failure carries the http status it is rendered with, an OAuth `error` code (see
/// [`OAuthFailure::name`]) and a human readable description. Rendering follows the usual
/// OAuth error body, `{"error": .., "error_description": ..}`, except for unauthorized
/// requests which are answered with an empty body.
#[derive(Clone, Debug, Error)]
pub enum OAuthFailure {
    /// The adapter or its model was configured incorrectly.
    #[error("{0}")]
    InvalidArgument(String),

    /// The request carried no valid authentication.
    #[error("Unauthorized request: no authentication given")]
    Unauthorized {
        /// Status reported by the engine, usually `401`.
        status: StatusCode,
        /// Headers of the engine response, in particular `WWW-Authenticate`.
        headers: HeaderMap,
    },

    /// An error reported by the engine in the terms of the protocol.
    #[error("{description}")]
    Protocol {
        /// Status reported by the engine.
        status: StatusCode,
        /// The OAuth error code, for example `invalid_grant`.
        error: String,
        /// Explanation of the error.
        description: String,
        /// Headers of the engine response.
        headers: HeaderMap,
    },

    /// The http request could not be translated for the engine.
    #[error("Invalid request: {0}")]
    Request(#[from] WebError),

    /// The engine or one of its primitives failed.
    #[error("Server error: {0}")]
    Server(String),
}

/// The json body of a rendered failure, also the shape of engine error bodies.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl WebError {
    /// The status this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Header(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl OAuthFailure {
    pub(crate) fn missing_capability(capability: &str) -> Self {
        OAuthFailure::InvalidArgument(format!(
            "Invalid argument: model does not implement `{}`",
            capability
        ))
    }

    pub(crate) fn invalid_request(description: impl Into<String>) -> Self {
        OAuthFailure::protocol(StatusCode::BAD_REQUEST, "invalid_request", description)
    }

    pub(crate) fn protocol(
        status: StatusCode, error: impl Into<String>, description: impl Into<String>,
    ) -> Self {
        OAuthFailure::Protocol {
            status,
            error: error.into(),
            description: description.into(),
            headers: HeaderMap::new(),
        }
    }

    /// The http status of this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            OAuthFailure::InvalidArgument(_) | OAuthFailure::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            OAuthFailure::Unauthorized { status, .. } | OAuthFailure::Protocol { status, .. } => {
                *status
            }
            OAuthFailure::Request(e) => e.status(),
        }
    }

    /// The OAuth `error` code of this failure.
    pub fn name(&self) -> &str {
        match self {
            OAuthFailure::InvalidArgument(_) => "invalid_argument",
            OAuthFailure::Unauthorized { .. } => "unauthorized_request",
            OAuthFailure::Protocol { error, .. } => error,
            OAuthFailure::Request(e) if e.status().is_server_error() => "server_error",
            OAuthFailure::Request(_) => "invalid_request",
            OAuthFailure::Server(_) => "server_error",
        }
    }

    /// The `error_description` of this failure.
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Headers taken over from the engine response, if any.
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            OAuthFailure::Unauthorized { headers, .. } | OAuthFailure::Protocol { headers, .. } => {
                Some(headers)
            }
            _ => None,
        }
    }

    /// Whether this is an unauthorized request, rendered without body.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, OAuthFailure::Unauthorized { .. })
    }
}

/// Standard explanation for an OAuth error code the engine reported without description.
pub(crate) fn describe(error: &str) -> String {
    match error {
        "invalid_request" => "Invalid request: request is malformed",
        "invalid_client" => "Invalid client: client is invalid",
        "invalid_grant" => "Invalid grant: grant is invalid",
        "invalid_scope" => "Invalid scope: requested scope is invalid",
        "invalid_token" => "Invalid token: access token is invalid",
        "insufficient_scope" => "Insufficient scope: authorized scope is insufficient",
        "unauthorized_client" => "Unauthorized client: client is not allowed to use this grant",
        "unsupported_grant_type" => "Unsupported grant type: `grant_type` is invalid",
        "unsupported_response_type" => {
            "Unsupported response type: `response_type` is not supported"
        }
        "access_denied" => "Access denied: user denied access to application",
        "server_error" => "Server error: the server encountered an unexpected condition",
        "temporarily_unavailable" => "Temporarily unavailable: try again later",
        other => return format!("The request failed with `{}`", other),
    }
    .to_owned()
}

impl IntoResponse for OAuthFailure {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut headers = self.headers().cloned().unwrap_or_default();
        headers.remove(header::CONTENT_TYPE);

        if self.is_unauthorized() {
            return (status, headers).into_response();
        }

        let body = ErrorBody {
            error: self.name().to_owned(),
            error_description: Some(self.description()),
        };

        (status, headers, Json(body)).into_response()
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        OAuthFailure::from(self).into_response()
    }
}

impl From<Error<OAuthRequest>> for OAuthFailure {
    fn from(e: Error<OAuthRequest>) -> Self {
        match e {
            Error::Web(e) => e.into(),
            Error::OAuth(e) => e.into(),
        }
    }
}

impl From<OAuthError> for OAuthFailure {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::DenySilently => {
                OAuthFailure::invalid_request("Invalid request: client or redirect_uri is invalid")
            }
            OAuthError::BadRequest => OAuthFailure::invalid_request("Invalid request: bad request"),
            OAuthError::PrimitiveError => OAuthFailure::Server("server component failed".to_owned()),
        }
    }
}

impl From<axum::http::header::InvalidHeaderValue> for WebError {
    fn from(e: axum::http::header::InvalidHeaderValue) -> Self {
        WebError::Header(e.to_string())
    }
}

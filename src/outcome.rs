//! Results of the operations and their interpretation from engine responses.
use std::collections::HashMap;

use axum::http::{header, StatusCode};
use oxide_auth::frontends::dev::Url;
use serde::{Deserialize, Serialize};

use crate::error::{describe, ErrorBody};
use crate::{OAuthFailure, OAuthResponse};

/// Result of `authorize`.
#[derive(Clone, Debug)]
pub enum Authorization {
    /// The owner consented, the client is redirected with an authorization code.
    Granted(AuthorizationCode),

    /// The owner has not decided yet, for example a consent page is shown.
    Pending(OAuthResponse),
}

/// An authorization code issued to a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationCode {
    /// The code to exchange at the token endpoint.
    pub code: String,

    /// The `state` of the authorization request, echoed back.
    pub state: Option<String>,

    /// Where the client is redirected to, including code and state.
    pub location: Url,
}

/// Result of `token`, the body of a successful token response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BearerToken {
    /// The issued access token.
    pub access_token: String,

    /// A token for refreshing the access token, only if the model issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Type of the token, `bearer`.
    pub token_type: String,

    /// Seconds until the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// Scope the token is valid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// The result of an operation handed to the next handler instead of being rendered.
///
/// Inserted into the request extensions when [`Options::skip_response`] is set. The next handler
/// always runs and is responsible for answering, failures included.
///
/// [`Options::skip_response`]: crate::Options::skip_response
#[derive(Clone, Debug)]
pub struct Outcome<T>(pub Result<T, OAuthFailure>);

impl<T> Outcome<T> {
    /// The failure, if the operation did not succeed.
    pub fn error(&self) -> Option<&OAuthFailure> {
        self.0.as_ref().err()
    }

    /// The result, if the operation succeeded.
    pub fn result(&self) -> Option<&T> {
        self.0.as_ref().ok()
    }

    /// Unwrap into the inner result.
    pub fn into_inner(self) -> Result<T, OAuthFailure> {
        self.0
    }
}

/// A result together with the engine response it was read from.
#[derive(Debug)]
pub(crate) struct Exchange<T> {
    pub value: T,
    pub response: OAuthResponse,
}

impl OAuthFailure {
    /// Translate a response in which the engine denied the request.
    pub(crate) fn from_response(response: OAuthResponse) -> Self {
        let status = response.status();
        let mut headers = response.headers().clone();
        headers.remove(header::CONTENT_TYPE);

        let body = response
            .body_str()
            .filter(|body| !body.trim().is_empty())
            .and_then(|body| serde_json::from_str::<ErrorBody>(body).ok());

        match body {
            None if status == StatusCode::UNAUTHORIZED => {
                OAuthFailure::Unauthorized { status, headers }
            }
            Some(ErrorBody {
                error,
                error_description,
            }) => OAuthFailure::Protocol {
                status,
                description: error_description.unwrap_or_else(|| describe(&error)),
                error,
                headers,
            },
            None => {
                let error = if status.is_server_error() {
                    "server_error"
                } else {
                    "invalid_request"
                };
                OAuthFailure::Protocol {
                    status,
                    error: error.to_owned(),
                    description: describe(error),
                    headers,
                }
            }
        }
    }
}

/// Interpret the response of an authorization request.
pub(crate) fn authorization(response: OAuthResponse) -> Result<Exchange<Authorization>, OAuthFailure> {
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        return Err(OAuthFailure::from_response(response));
    }

    if status != StatusCode::FOUND {
        return Ok(Exchange {
            value: Authorization::Pending(response.clone()),
            response,
        });
    }

    let location = response
        .location()
        .ok_or_else(|| OAuthFailure::Server("redirect without valid location".to_owned()))?;
    let mut pairs: HashMap<String, String> = location.query_pairs().into_owned().collect();

    if let Some(code) = pairs.remove("code") {
        let value = Authorization::Granted(AuthorizationCode {
            code,
            state: pairs.remove("state"),
            location,
        });
        return Ok(Exchange { value, response });
    }

    match pairs.remove("error") {
        Some(error) => Err(OAuthFailure::Protocol {
            status,
            description: pairs
                .remove("error_description")
                .unwrap_or_else(|| describe(&error)),
            error,
            headers: response.headers().clone(),
        }),
        None => Ok(Exchange {
            value: Authorization::Pending(response.clone()),
            response,
        }),
    }
}

/// Interpret the response of a token request.
pub(crate) fn bearer_token(response: OAuthResponse) -> Result<Exchange<BearerToken>, OAuthFailure> {
    if !response.status().is_success() {
        return Err(OAuthFailure::from_response(response));
    }

    let value = response
        .body_str()
        .and_then(|body| serde_json::from_str::<BearerToken>(body).ok())
        .ok_or_else(|| OAuthFailure::Server("token response is not a bearer token".to_owned()))?;

    Ok(Exchange { value, response })
}

use axum::{
    http::{
        header::{self, HeaderMap, HeaderValue},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use oxide_auth::frontends::dev::{Url, WebResponse};

use crate::WebError;

#[derive(Default, Clone, Debug)]
/// Type implementing `WebResponse` and `IntoResponse` for use in route handlers
pub struct OAuthResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<String>,
}

impl OAuthResponse {
    /// Set the `ContentType` header on a response
    pub fn content_type(mut self, content_type: &str) -> Result<Self, WebError> {
        self.headers
            .insert(header::CONTENT_TYPE, content_type.try_into()?);
        Ok(self)
    }

    /// Set the body for the response
    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_owned());
        self
    }

    /// The status the engine chose.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// All headers the engine set.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body, if the engine wrote one.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// The redirect target of a `302` response.
    pub fn location(&self) -> Option<Url> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    }
}

impl WebResponse for OAuthResponse {
    type Error = WebError;

    fn ok(&mut self) -> Result<(), Self::Error> {
        self.status = StatusCode::OK;
        Ok(())
    }

    fn redirect(&mut self, url: Url) -> Result<(), Self::Error> {
        self.status = StatusCode::FOUND;
        self.headers.insert(header::LOCATION, url.as_ref().try_into()?);
        Ok(())
    }

    fn client_error(&mut self) -> Result<(), Self::Error> {
        self.status = StatusCode::BAD_REQUEST;
        Ok(())
    }

    fn unauthorized(&mut self, kind: &str) -> Result<(), Self::Error> {
        self.status = StatusCode::UNAUTHORIZED;
        self.headers.insert(header::WWW_AUTHENTICATE, kind.try_into()?);
        Ok(())
    }

    fn body_text(&mut self, text: &str) -> Result<(), Self::Error> {
        self.body = Some(text.to_owned());
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Ok(())
    }

    fn body_json(&mut self, json: &str) -> Result<(), Self::Error> {
        self.body = Some(json.to_owned());
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(())
    }
}

impl IntoResponse for OAuthResponse {
    fn into_response(self) -> Response {
        let OAuthResponse {
            status,
            mut headers,
            body,
        } = self;

        // Redirects carry no body, the location is written last.
        if status == StatusCode::FOUND {
            let location = headers.remove(header::LOCATION);
            headers.remove(header::CONTENT_TYPE);
            let mut response = (status, headers).into_response();
            if let Some(location) = location {
                response.headers_mut().insert(header::LOCATION, location);
            }
            return response;
        }

        match body {
            Some(body) => {
                headers
                    .entry(header::CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
                (status, headers, body).into_response()
            }
            None => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                (status, headers, "{}").into_response()
            }
        }
    }
}

use std::borrow::Cow;

use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, Uri},
};
use oxide_auth::frontends::dev::{QueryParameter, WebRequest};

use crate::body::{self, Parameters, ParsedBody, DEFAULT_BODY_LIMIT};
use crate::{OAuthResponse, WebError};

#[derive(Clone, Debug, Default)]
/// Type implementing `WebRequest` as well as `FromRequest` for use in route handlers
///
/// This type consumes the body of the Request upon extraction, so be careful not to use it in
/// places you also expect an application payload. The middleware of this crate puts the
/// buffered body back for the handlers running after it.
pub struct OAuthRequest {
    auth: Option<String>,
    query: Option<Parameters>,
    body: Option<Parameters>,
}

/// Type implementing `FromRequestParts` for use in guarding resources
///
/// This is useful over [OAuthRequest] since [OAuthResource] doesn't consume the body of the
/// request upon extraction
#[derive(Clone, Debug, Default)]
pub struct OAuthResource {
    auth: Option<String>,
    query: Option<Parameters>,
}

impl OAuthRequest {
    /// Fetch the authorization header from the request
    pub fn authorization_header(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    /// Fetch the query for this request
    pub fn query(&self) -> Option<&Parameters> {
        self.query.as_ref()
    }

    /// Fetch the query mutably
    pub fn query_mut(&mut self) -> Option<&mut Parameters> {
        self.query.as_mut()
    }

    /// Fetch the body of the request
    pub fn body(&self) -> Option<&Parameters> {
        self.body.as_ref()
    }

    /// Set the value of the `Authorization` header.
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.auth = Some(value.into());
        self
    }

    /// Add query parameters.
    pub fn with_query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        extend(self.query.get_or_insert_with(Parameters::new), pairs);
        self
    }

    /// Add body parameters.
    pub fn with_body<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        extend(self.body.get_or_insert_with(Parameters::new), pairs);
        self
    }

    /// Extract the request, buffering at most `limit` bytes of body.
    ///
    /// Returns the extracted request together with the original one, whose body has been
    /// replaced by the buffered bytes so that it can be handed on.
    pub async fn from_http(req: Request, limit: usize) -> Result<(Self, Request), WebError> {
        let (parts, body) = req.into_parts();
        let (request, bytes) = OAuthRequest::extract(&parts, body, limit).await?;
        Ok((request, Request::from_parts(parts, Body::from(bytes))))
    }

    /// Extract from the head and body of a request, also returning the buffered body.
    pub(crate) async fn extract(
        parts: &Parts, body: Body, limit: usize,
    ) -> Result<(Self, Bytes), WebError> {
        let auth = authorization(&parts.headers)?;
        let query = query(&parts.uri)?;

        let bytes = body::buffer(body, limit).await?;
        let decoded = body::decode(&parts.headers, &bytes)?;
        let merged = body::merge(decoded, parts.extensions.get::<ParsedBody>());

        let request = OAuthRequest {
            auth,
            query: Some(query),
            body: Some(merged),
        };

        Ok((request, bytes))
    }

    /// Move all body parameters into the query, replacing query parameters of the same name.
    ///
    /// Authorization requests are read from the query by the engine, this allows them to be
    /// sent as a body instead.
    pub(crate) fn body_into_query(mut self) -> Self {
        if let Some(body) = self.body.take() {
            let query = self.query.get_or_insert_with(Parameters::new);
            for (key, values) in body {
                query.insert(key, values);
            }
        }

        self
    }
}

impl OAuthResource {
    /// Fetch the authorization header from the request
    pub fn authorization_header(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    /// Fetch the query for this request
    pub fn query(&self) -> Option<&Parameters> {
        self.query.as_ref()
    }

    /// Extract the header and query of a request.
    pub fn from_parts(parts: &Parts) -> Result<Self, WebError> {
        OAuthResource::from_head(&parts.headers, &parts.uri)
    }

    pub(crate) fn from_head(headers: &HeaderMap, uri: &Uri) -> Result<Self, WebError> {
        Ok(OAuthResource {
            auth: authorization(headers)?,
            query: Some(query(uri)?),
        })
    }
}

impl From<OAuthResource> for OAuthRequest {
    fn from(r: OAuthResource) -> OAuthRequest {
        OAuthRequest {
            auth: r.auth,
            query: r.query,
            ..Default::default()
        }
    }
}

impl WebRequest for OAuthRequest {
    type Error = WebError;
    type Response = OAuthResponse;

    fn query(&mut self) -> Result<Cow<dyn QueryParameter + 'static>, Self::Error> {
        self.query
            .as_ref()
            .map(|q| Cow::Borrowed(q as &dyn QueryParameter))
            .ok_or(WebError::Query)
    }

    fn urlbody(&mut self) -> Result<Cow<dyn QueryParameter + 'static>, Self::Error> {
        self.body
            .as_ref()
            .map(|b| Cow::Borrowed(b as &dyn QueryParameter))
            .ok_or(WebError::Body)
    }

    fn authheader(&mut self) -> Result<Option<Cow<str>>, Self::Error> {
        Ok(self.auth.as_deref().map(Cow::Borrowed))
    }
}

#[async_trait]
impl<S> FromRequest<S> for OAuthRequest
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (request, _) = OAuthRequest::from_http(req, DEFAULT_BODY_LIMIT).await?;
        Ok(request)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OAuthResource
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        OAuthResource::from_parts(parts)
    }
}

fn authorization(headers: &HeaderMap) -> Result<Option<String>, WebError> {
    let mut all_auth = headers.get_all(header::AUTHORIZATION).iter();
    let optional = all_auth.next();

    if all_auth.next().is_some() {
        return Err(WebError::Authorization);
    }

    optional
        .map(|hv| hv.to_str().map(str::to_owned).map_err(|_| WebError::Authorization))
        .transpose()
}

fn query(uri: &Uri) -> Result<Parameters, WebError> {
    match uri.query() {
        Some(query) => body::decode_form(query.as_bytes()).map_err(|_| WebError::Query),
        None => Ok(Parameters::new()),
    }
}

fn extend<K, V>(target: &mut Parameters, pairs: impl IntoIterator<Item = (K, V)>)
where
    K: Into<String>,
    V: Into<String>,
{
    for (key, value) in pairs {
        target.entry(key.into()).or_default().push(value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn unique<'a>(parameters: Option<&'a Parameters>, key: &str) -> Option<Cow<'a, str>> {
        parameters.and_then(|p| p.unique_value(key))
    }

    #[tokio::test]
    async fn extracts_query_body_and_header() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/authorize?state=foobiz")
            .header(header::AUTHORIZATION, "Bearer foobar")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"client_id": 12345, "response_type": "code"}"#))
            .unwrap();

        let (request, rest) = OAuthRequest::from_http(req, DEFAULT_BODY_LIMIT).await.unwrap();

        assert_eq!(request.authorization_header(), Some("Bearer foobar"));
        assert_eq!(unique(request.query(), "state").as_deref(), Some("foobiz"));
        assert_eq!(unique(request.body(), "client_id").as_deref(), Some("12345"));

        let replayed = body::buffer(rest.into_body(), DEFAULT_BODY_LIMIT).await.unwrap();
        assert_eq!(&replayed[..], br#"{"client_id": 12345, "response_type": "code"}"#);
    }

    #[tokio::test]
    async fn parsed_body_takes_precedence() {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("grant_type=password&username=qux"))
            .unwrap();
        req.extensions_mut().insert(ParsedBody(
            vec![("grant_type".to_owned(), "refresh_token".to_owned())]
                .into_iter()
                .collect(),
        ));

        let (request, _) = OAuthRequest::from_http(req, DEFAULT_BODY_LIMIT).await.unwrap();

        assert_eq!(unique(request.body(), "grant_type").as_deref(), Some("refresh_token"));
        assert_eq!(unique(request.body(), "username").as_deref(), Some("qux"));
    }

    #[tokio::test]
    async fn duplicate_authorization_is_rejected() {
        let req = Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, "Bearer a")
            .header(header::AUTHORIZATION, "Bearer b")
            .body(Body::empty())
            .unwrap();

        let result = OAuthRequest::from_http(req, DEFAULT_BODY_LIMIT).await;
        assert!(matches!(result, Err(WebError::Authorization)));
    }

    #[test]
    fn body_moves_into_query() {
        let request = OAuthRequest::default()
            .with_query([("state", "foobiz"), ("client_id", "query")])
            .with_body([("client_id", "body"), ("response_type", "code")])
            .body_into_query();

        assert!(request.body().is_none());
        assert_eq!(unique(request.query(), "client_id").as_deref(), Some("body"));
        assert_eq!(unique(request.query(), "state").as_deref(), Some("foobiz"));
        assert_eq!(unique(request.query(), "response_type").as_deref(), Some("code"));
    }

    #[test]
    fn resource_keeps_no_body() {
        let (parts, _) = Request::builder()
            .uri("/resource?x=1")
            .body(())
            .unwrap()
            .into_parts();

        let request: OAuthRequest = OAuthResource::from_parts(&parts).unwrap().into();
        assert!(request.body().is_none());
        assert_eq!(unique(request.query(), "x").as_deref(), Some("1"));
    }
}

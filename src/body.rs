//! Buffering and decoding of request bodies.
//!
//! The engine expects a fully materialized set of body parameters, so the body stream is read
//! to its end first. Decoding is chosen by the declared content type. Requests without a
//! recognized content type are tried as json first and as a form second.
use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};

use crate::WebError;

/// Decoded key-value parameters of a query or body.
///
/// A key maps to all of its values. The engine only accepts keys with exactly one value, any
/// repeated key is treated as if it was absent.
pub type Parameters = HashMap<String, Vec<String>>;

/// Body fields that an earlier layer already decoded.
///
/// Insert this into the request extensions before the adapter runs. Its fields take precedence
/// over the ones the adapter decodes from the raw body, they are never overwritten.
#[derive(Clone, Debug, Default)]
pub struct ParsedBody(pub HashMap<String, String>);

/// The limit used when a request is extracted without a configured server.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

enum Encoding {
    Json,
    Form,
    Unknown,
}

/// Read the complete body, failing if it is longer than `limit` bytes.
pub(crate) async fn buffer(body: Body, limit: usize) -> Result<Bytes, WebError> {
    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            let inner = err.into_inner();
            if inner.is::<LengthLimitError>() {
                tracing::warn!(limit, "request body exceeds limit");
                Err(WebError::BodyTooLarge(limit))
            } else {
                tracing::warn!(error = %inner, "failed to buffer request body");
                Err(WebError::Read)
            }
        }
    }
}

/// Decode a buffered body according to the `Content-Type` of the request.
pub(crate) fn decode(headers: &HeaderMap, bytes: &[u8]) -> Result<Parameters, WebError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Parameters::new());
    }

    match encoding(headers) {
        Encoding::Json => decode_json(bytes),
        Encoding::Form => decode_form(bytes),
        Encoding::Unknown => decode_json(bytes).or_else(|_| decode_form(bytes)),
    }
}

/// Merge fields decoded by the host framework over the ones decoded here.
pub(crate) fn merge(mut decoded: Parameters, parsed: Option<&ParsedBody>) -> Parameters {
    if let Some(ParsedBody(fields)) = parsed {
        for (key, value) in fields {
            decoded.insert(key.clone(), vec![value.clone()]);
        }
    }

    decoded
}

/// Decode a url query or form encoded string.
pub(crate) fn decode_form(bytes: &[u8]) -> Result<Parameters, WebError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(bytes).map_err(|_| WebError::Form)?;

    let mut parameters = Parameters::new();
    for (key, value) in pairs {
        parameters.entry(key).or_default().push(value);
    }

    Ok(parameters)
}

fn decode_json(bytes: &[u8]) -> Result<Parameters, WebError> {
    let object: Map<String, Value> = serde_json::from_slice(bytes).map_err(|_| WebError::Json)?;

    let mut parameters = Parameters::new();
    for (key, value) in object {
        let values = match value {
            Value::Null => continue,
            Value::Array(items) => items
                .into_iter()
                .map(scalar)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect(),
            other => scalar(other)?.into_iter().collect(),
        };
        parameters.insert(key, values);
    }

    Ok(parameters)
}

fn scalar(value: Value) -> Result<Option<String>, WebError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Array(_) | Value::Object(_) => Err(WebError::Json),
    }
}

fn encoding(headers: &HeaderMap) -> Encoding {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok());

    let mime = match mime {
        Some(mime) => mime,
        None => return Encoding::Unknown,
    };

    if mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED {
        Encoding::Form
    } else if mime.type_() == mime::APPLICATION
        && (mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON))
    {
        Encoding::Json
    } else {
        Encoding::Unknown
    }
}

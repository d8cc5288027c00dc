use std::io;

use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::multipart::{MultipartError, MultipartForm};

pub use futures_core::future::BoxFuture;

/// The narrow HTTP surface the runtime consumes.
///
/// Implemented by transport adapters (and by
/// [`TestContext`](crate::testing::TestContext) for in-process tests).
/// Request accessors return `None` for absent values; an empty string is
/// treated like an absent value when defaults are applied.
///
/// A single `Context` serves one request on one logical task — the runtime
/// never shares it across threads concurrently, so implementations only
/// need `Send`.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an HTTP context",
    label = "this type cannot carry a request through the runtime",
    note = "implement `Context` in your transport adapter, or use `TestContext` in tests"
)]
pub trait Context: Send {
    /// The HTTP request method, uppercase (`"GET"`, `"POST"`, ...).
    fn method(&self) -> &str;

    /// The raw request path (not the route template).
    fn path(&self) -> &str;

    /// A path parameter extracted by the adapter's router.
    fn param(&self, name: &str) -> Option<&str>;

    /// A query-string parameter.
    fn query(&self, name: &str) -> Option<&str>;

    /// A request header value.
    fn header(&self, name: &str) -> Option<&str>;

    /// A request cookie value.
    fn cookie(&self, name: &str) -> Option<&str>;

    /// The cancellation token tripped by the transport when the client
    /// goes away. Providers and handlers receive a clone of this token.
    fn cancellation(&self) -> CancellationToken;

    /// Read the full request body.
    ///
    /// Adapters must make this restartable once: a second call after a
    /// completed read returns the same bytes (or an empty buffer when the
    /// request carried no body).
    fn read_body(&mut self) -> BoxFuture<'_, io::Result<Bytes>>;

    /// Parse the request body as a `multipart/form-data` form.
    fn multipart_form(&mut self) -> BoxFuture<'_, Result<MultipartForm, MultipartError>>;

    /// The response status, `0` while not yet set.
    fn status(&self) -> u16;

    /// Set the response status.
    fn set_status(&mut self, status: u16);

    /// Set a response header, replacing any previous value.
    fn set_header(&mut self, name: &str, value: &str);

    /// Append a response header value.
    fn append_header(&mut self, name: &str, value: &str);

    /// Write a chunk of the response body.
    fn write_body(&mut self, chunk: Bytes) -> BoxFuture<'_, io::Result<()>>;
}

/// Content-negotiation and codec hooks supplied by the host API.
///
/// All payloads pass through a [`serde_json::Value`] pivot so the trait
/// stays object-safe; typed decode/encode happens in the input parser and
/// response writer around these hooks.
pub trait Codec: Send + Sync {
    /// Choose a response content type for an `Accept` header value.
    fn negotiate(&self, accept: &str) -> Result<String, CodecError>;

    /// Hook applied to every negotiated response body before marshalling.
    ///
    /// The default is the identity transform.
    fn transform(&self, _status: u16, body: Value) -> Result<Value, CodecError> {
        Ok(body)
    }

    /// Serialize a value for the given content type.
    fn marshal(&self, content_type: &str, value: &Value) -> Result<Bytes, CodecError>;

    /// Deserialize body bytes for the given content type.
    fn unmarshal(&self, content_type: &str, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Errors surfaced by [`Codec`] implementations.
#[derive(Debug)]
pub enum CodecError {
    /// The `Accept` header admits none of the codec's content types.
    NotAcceptable { accept: String },
    /// The request content type is not supported for decoding.
    UnsupportedMediaType { content_type: String },
    /// Serialization failed.
    Marshal(String),
    /// Deserialization failed.
    Unmarshal(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::NotAcceptable { accept } => {
                write!(f, "no acceptable content type for '{accept}'")
            }
            CodecError::UnsupportedMediaType { content_type } => {
                write!(f, "unsupported media type '{content_type}'")
            }
            CodecError::Marshal(msg) => write!(f, "marshal error: {msg}"),
            CodecError::Unmarshal(msg) => write!(f, "unmarshal error: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Strip parameters (`; charset=utf-8`) from a content-type value.
pub fn media_type_essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

/// The default codec: JSON in, JSON out.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    fn is_json(media_type: &str) -> bool {
        media_type == "application/json" || media_type.ends_with("+json")
    }
}

impl Codec for JsonCodec {
    fn negotiate(&self, accept: &str) -> Result<String, CodecError> {
        if accept.trim().is_empty() {
            return Ok("application/json".to_string());
        }
        for entry in accept.split(',') {
            let media_type = media_type_essence(entry);
            if media_type == "*/*"
                || media_type == "application/*"
                || Self::is_json(media_type)
            {
                return Ok("application/json".to_string());
            }
        }
        Err(CodecError::NotAcceptable {
            accept: accept.to_string(),
        })
    }

    fn marshal(&self, content_type: &str, value: &Value) -> Result<Bytes, CodecError> {
        if !Self::is_json(media_type_essence(content_type)) {
            return Err(CodecError::UnsupportedMediaType {
                content_type: content_type.to_string(),
            });
        }
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| CodecError::Marshal(e.to_string()))
    }

    fn unmarshal(&self, content_type: &str, bytes: &[u8]) -> Result<Value, CodecError> {
        let media_type = media_type_essence(content_type);
        if !Self::is_json(media_type) {
            return Err(CodecError::UnsupportedMediaType {
                content_type: content_type.to_string(),
            });
        }
        serde_json::from_slice(bytes).map_err(|e| CodecError::Unmarshal(e.to_string()))
    }
}

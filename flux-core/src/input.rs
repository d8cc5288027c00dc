use std::future::Future;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::Api;
use crate::context::{BoxFuture, CodecError, Context};
use crate::error::{ErrorDetail, ErrorModel};
use crate::multipart::MultipartForm;

// ── Binding tables ───────────────────────────────────────────────────────────

/// Where a request parameter is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Path,
    Query,
    Header,
    Cookie,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Path => "path",
            Location::Query => "query",
            Location::Header => "header",
            Location::Cookie => "cookie",
        }
    }
}

/// One entry of the compile-time binding table generated by
/// `#[derive(Input)]`.
///
/// The parse loop and the OpenAPI parameter synthesis both walk this
/// table instead of reflecting over the struct at request time.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    /// Wire name (`"page"`, `"X-Tenant"`, ...).
    pub name: &'static str,
    pub location: Location,
    /// `true` when the field is non-optional and carries no default.
    /// `path` bindings are always required.
    pub required: bool,
    /// Default literal applied when the raw value is empty or absent.
    pub default: Option<&'static str>,
    /// OpenAPI type of the parameter
    /// (`"string" | "integer" | "number" | "boolean" | "array"`).
    pub type_hint: &'static str,
    /// Element type for `"array"` parameters.
    pub item_hint: Option<&'static str>,
}

/// How an input struct consumes the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Decoded through the codec into a typed value.
    Typed,
    /// Raw bytes or a multipart form, untouched by the codec.
    Raw,
}

/// Body description generated by `#[derive(Input)]`, consumed by the
/// schema processor.
#[derive(Clone, Copy)]
pub struct BodySpec {
    pub kind: BodyKind,
    /// Explicit `content_type = "..."` attribute, or the raw body's
    /// intrinsic content type.
    pub content_type: Option<&'static str>,
    pub required: bool,
    /// Short type name used as the component schema key.
    pub type_name: &'static str,
    /// Thunk producing the schemars root schema for typed bodies.
    pub schema: Option<fn() -> serde_json::Value>,
}

impl std::fmt::Debug for BodySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySpec")
            .field("kind", &self.kind)
            .field("content_type", &self.content_type)
            .field("required", &self.required)
            .field("type_name", &self.type_name)
            .finish()
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// A request that could not be bound to its input struct. Always an
/// HTTP 400.
#[derive(Debug)]
pub enum InputError {
    /// A required parameter was absent (or empty, with no default).
    Missing {
        field: &'static str,
        location: Location,
    },
    /// A parameter failed type conversion.
    Invalid {
        field: &'static str,
        location: Location,
        message: String,
    },
    /// The body was absent but the input requires one.
    MissingBody,
    /// The body could not be decoded.
    Body { message: String },
    /// The request content type has no decoder.
    UnsupportedMediaType { content_type: String },
    /// The multipart form was malformed.
    Multipart { message: String },
}

impl InputError {
    /// The wire payload for this error (status 400).
    pub fn into_model(self) -> ErrorModel {
        let (message, location) = match self {
            InputError::Missing { field, location } => (
                format!("missing required {} parameter '{}'", location.as_str(), field),
                Some(format!("{}.{}", location.as_str(), field)),
            ),
            InputError::Invalid {
                field,
                location,
                message,
            } => (
                format!("invalid {} parameter '{}': {}", location.as_str(), field, message),
                Some(format!("{}.{}", location.as_str(), field)),
            ),
            InputError::MissingBody => ("request body is required".to_string(), Some("body".to_string())),
            InputError::Body { message } => {
                (format!("invalid request body: {message}"), Some("body".to_string()))
            }
            InputError::UnsupportedMediaType { content_type } => (
                format!("unsupported content type '{content_type}'"),
                Some("body".to_string()),
            ),
            InputError::Multipart { message } => {
                (format!("invalid multipart form: {message}"), Some("body".to_string()))
            }
        };
        ErrorModel {
            status: 400,
            message: "request validation failed".to_string(),
            errors: vec![ErrorDetail {
                message,
                location,
            }],
        }
    }
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::Missing { field, location } => {
                write!(f, "missing required {} parameter '{}'", location.as_str(), field)
            }
            InputError::Invalid {
                field,
                location,
                message,
            } => write!(f, "invalid {} parameter '{}': {}", location.as_str(), field, message),
            InputError::MissingBody => write!(f, "request body is required"),
            InputError::Body { message } => write!(f, "invalid request body: {message}"),
            InputError::UnsupportedMediaType { content_type } => {
                write!(f, "unsupported content type '{content_type}'")
            }
            InputError::Multipart { message } => write!(f, "invalid multipart form: {message}"),
        }
    }
}

impl std::error::Error for InputError {}

// ── Scalar conversion ────────────────────────────────────────────────────────

/// Conversion from a single raw parameter string to a typed value.
///
/// Sequence parameters are comma-separated with each element trimmed:
/// `"1, 2,3"` binds to `vec![1, 2, 3]`.
pub trait FromParam: Sized {
    const TYPE_HINT: &'static str;

    fn from_param(raw: &str) -> Result<Self, String>;
}

macro_rules! from_param_via_from_str {
    ($hint:literal => $($ty:ty),+ $(,)?) => {
        $(
            impl FromParam for $ty {
                const TYPE_HINT: &'static str = $hint;

                fn from_param(raw: &str) -> Result<Self, String> {
                    raw.parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )+
    };
}

from_param_via_from_str!("integer" => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
from_param_via_from_str!("number" => f32, f64);
from_param_via_from_str!("boolean" => bool);

impl FromParam for String {
    const TYPE_HINT: &'static str = "string";

    fn from_param(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl<T: FromParam> FromParam for Vec<T> {
    const TYPE_HINT: &'static str = "array";

    fn from_param(raw: &str) -> Result<Self, String> {
        raw.split(',')
            .map(|element| T::from_param(element.trim()))
            .collect()
    }
}

/// Bind a required parameter: raw value, else default, else
/// [`InputError::Missing`].
pub fn require<T: FromParam>(
    raw: Option<&str>,
    default: Option<&'static str>,
    field: &'static str,
    location: Location,
) -> Result<T, InputError> {
    let effective = raw.filter(|value| !value.is_empty()).or(default);
    match effective {
        Some(value) => T::from_param(value).map_err(|message| InputError::Invalid {
            field,
            location,
            message,
        }),
        None => Err(InputError::Missing { field, location }),
    }
}

/// Bind an optional parameter: raw value, else default, else `None`.
pub fn optional<T: FromParam>(
    raw: Option<&str>,
    default: Option<&'static str>,
    field: &'static str,
    location: Location,
) -> Result<Option<T>, InputError> {
    let effective = raw.filter(|value| !value.is_empty()).or(default);
    match effective {
        Some(value) => T::from_param(value)
            .map(Some)
            .map_err(|message| InputError::Invalid {
                field,
                location,
                message,
            }),
        None => Ok(None),
    }
}

// ── Body decoding ────────────────────────────────────────────────────────────

/// Read the full request body, mapping transport errors to 400.
pub async fn read_body_bytes(ctx: &mut dyn Context) -> Result<Bytes, InputError> {
    ctx.read_body()
        .await
        .map_err(|e| InputError::Body { message: e.to_string() })
}

fn body_media_type(content_type: &str) -> &str {
    let essence = crate::context::media_type_essence(content_type);
    if essence.is_empty() {
        "application/json"
    } else {
        essence
    }
}

fn decode_value<B: DeserializeOwned>(
    api: &Api,
    content_type: &str,
    bytes: &Bytes,
) -> Result<B, InputError> {
    let value = api
        .codec()
        .unmarshal(body_media_type(content_type), bytes)
        .map_err(|e| match e {
            CodecError::UnsupportedMediaType { content_type } => {
                InputError::UnsupportedMediaType { content_type }
            }
            other => InputError::Body {
                message: other.to_string(),
            },
        })?;
    serde_json::from_value(value).map_err(|e| InputError::Body {
        message: e.to_string(),
    })
}

/// Decode a required typed body. An empty body is
/// [`InputError::MissingBody`].
pub fn decode_body<B: DeserializeOwned>(
    api: &Api,
    content_type: &str,
    bytes: Bytes,
) -> Result<B, InputError> {
    if bytes.is_empty() {
        return Err(InputError::MissingBody);
    }
    decode_value(api, content_type, &bytes)
}

/// Decode an optional typed body. An empty body is `None`.
pub fn decode_body_opt<B: DeserializeOwned>(
    api: &Api,
    content_type: &str,
    bytes: Bytes,
) -> Result<Option<B>, InputError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    decode_value(api, content_type, &bytes).map(Some)
}

// ── Raw bodies ───────────────────────────────────────────────────────────────

/// Types usable as an `#[input(raw_body)]` field.
///
/// The static type decides how the body is read: `Bytes` stores the raw
/// request bytes, [`MultipartForm`] parses the body as a multipart form.
pub trait RawBody: Sized + Send {
    /// The request content type this raw body documents.
    fn content_type() -> &'static str;

    fn from_context(ctx: &mut dyn Context) -> BoxFuture<'_, Result<Self, InputError>>;
}

impl RawBody for Bytes {
    fn content_type() -> &'static str {
        "application/octet-stream"
    }

    fn from_context(ctx: &mut dyn Context) -> BoxFuture<'_, Result<Self, InputError>> {
        Box::pin(read_body_bytes(ctx))
    }
}

impl RawBody for MultipartForm {
    fn content_type() -> &'static str {
        "multipart/form-data"
    }

    fn from_context(ctx: &mut dyn Context) -> BoxFuture<'_, Result<Self, InputError>> {
        Box::pin(async move {
            ctx.multipart_form()
                .await
                .map_err(|e| InputError::Multipart {
                    message: e.to_string(),
                })
        })
    }
}

// ── The Input trait ──────────────────────────────────────────────────────────

/// A typed view of the request, populated from the binding table.
///
/// Use `#[derive(Input)]`; the derive generates the binding table, the
/// body spec, and the `from_request` reader. Dependency sub-inputs use
/// the same trait.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an operation input",
    label = "this type cannot be parsed from a request",
    note = "add `#[derive(Input)]` to your input struct"
)]
pub trait Input: Sized + Send + 'static {
    /// The parameter binding table (empty by default).
    fn bindings() -> &'static [Binding] {
        &[]
    }

    /// The body description, when the input consumes the body.
    fn body() -> Option<BodySpec> {
        None
    }

    /// Populate the input from the request.
    fn from_request(
        api: &Api,
        ctx: &mut dyn Context,
    ) -> impl Future<Output = Result<Self, InputError>> + Send;
}

/// Operations with no input.
impl Input for () {
    async fn from_request(_api: &Api, _ctx: &mut dyn Context) -> Result<(), InputError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_binds_in_order() {
        let values: Vec<i64> = require(Some("1,2,3"), None, "ids", Location::Query).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn sequence_elements_are_trimmed() {
        let values: Vec<u32> = Vec::from_param(" 4, 5 ,6 ").unwrap();
        assert_eq!(values, vec![4, 5, 6]);
    }

    #[test]
    fn default_applies_only_when_empty() {
        let value: u32 = require(Some(""), Some("7"), "page", Location::Query).unwrap();
        assert_eq!(value, 7);
        let value: u32 = require(None, Some("7"), "page", Location::Query).unwrap();
        assert_eq!(value, 7);
        let value: u32 = require(Some("3"), Some("7"), "page", Location::Query).unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn missing_required_names_field_and_location() {
        let err = require::<u32>(None, None, "page", Location::Query).unwrap_err();
        match err {
            InputError::Missing { field, location } => {
                assert_eq!(field, "page");
                assert_eq!(location, Location::Query);
            }
            other => panic!("expected Missing, got {other}"),
        }
    }

    #[test]
    fn invalid_conversion_is_reported() {
        let err = require::<u32>(Some("abc"), None, "page", Location::Query).unwrap_err();
        let model = err.into_model();
        assert_eq!(model.status, 400);
        assert_eq!(model.errors[0].location.as_deref(), Some("query.page"));
    }

    #[test]
    fn optional_absent_is_none() {
        let value: Option<bool> = optional(None, None, "flag", Location::Query).unwrap();
        assert_eq!(value, None);
        let value: Option<bool> = optional(Some("true"), None, "flag", Location::Query).unwrap();
        assert_eq!(value, Some(true));
    }

    #[test]
    fn type_hints() {
        assert_eq!(u64::TYPE_HINT, "integer");
        assert_eq!(f64::TYPE_HINT, "number");
        assert_eq!(bool::TYPE_HINT, "boolean");
        assert_eq!(String::TYPE_HINT, "string");
        assert_eq!(<Vec<u8>>::TYPE_HINT, "array");
    }
}

use std::future::Future;
use std::io;

use bytes::Bytes;
use serde::Serialize;

use crate::api::Api;
use crate::context::{CodecError, Context};

// ── Response metadata ────────────────────────────────────────────────────────

/// A response header declared by an output struct field.
#[derive(Debug, Clone, Copy)]
pub struct HeaderSpec {
    /// Header name on the wire.
    pub name: &'static str,
    /// OpenAPI type of the header value.
    pub type_hint: &'static str,
}

/// Body description generated by `#[derive(Output)]`.
#[derive(Clone, Copy)]
pub struct BodySchema {
    /// Short type name used as the component schema key.
    pub type_name: &'static str,
    /// `true` for raw byte bodies, which bypass the codec entirely.
    pub raw: bool,
    /// Fixed content type, when the output declares one.
    pub content_type: Option<&'static str>,
    /// Thunk producing the schemars root schema for serialized bodies.
    pub schema: Option<fn() -> serde_json::Value>,
}

impl std::fmt::Debug for BodySchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySchema")
            .field("type_name", &self.type_name)
            .field("raw", &self.raw)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Compile-time description of an output struct, consumed by the schema
/// processor.
#[derive(Debug, Clone, Copy)]
pub struct OutputMeta {
    /// Whether the struct carries a `#[output(status)]` field.
    pub has_status: bool,
    pub headers: &'static [HeaderSpec],
    pub body: Option<BodySchema>,
}

impl OutputMeta {
    pub const EMPTY: OutputMeta = OutputMeta {
        has_status: false,
        headers: &[],
        body: None,
    };
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// A failure while writing the response.
#[derive(Debug)]
pub enum WriteError {
    Codec(CodecError),
    Io(io::Error),
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Codec(e) => write!(f, "{e}"),
            WriteError::Io(e) => write!(f, "response write failed: {e}"),
        }
    }
}

impl std::error::Error for WriteError {}

impl From<CodecError> for WriteError {
    fn from(err: CodecError) -> Self {
        WriteError::Codec(err)
    }
}

// ── The Output trait ─────────────────────────────────────────────────────────

/// A typed response, written field by field.
///
/// Use `#[derive(Output)]`; the derive generates the metadata and the
/// writer following the response rules: status field first, header
/// fields next, body last, with 204/304 never carrying a body.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an operation output",
    label = "this type cannot be written as a response",
    note = "add `#[derive(Output)]` to your output struct"
)]
pub trait Output: Send + 'static {
    /// Compile-time response description.
    fn metadata() -> OutputMeta {
        OutputMeta::EMPTY
    }

    /// Write this value to the response.
    fn write(
        self,
        api: &Api,
        ctx: &mut dyn Context,
        default_status: u16,
    ) -> impl Future<Output = Result<(), WriteError>> + Send;
}

/// Status-only responses.
impl Output for () {
    async fn write(
        self,
        _api: &Api,
        ctx: &mut dyn Context,
        default_status: u16,
    ) -> Result<(), WriteError> {
        write_empty(ctx, default_status);
        Ok(())
    }
}

// ── Writer helpers (used by generated code) ──────────────────────────────────

/// Resolve the effective status: explicit field value, else operation
/// default, else 200.
pub fn resolve_status(field: u16, default_status: u16) -> u16 {
    if field != 0 {
        field
    } else if default_status != 0 {
        default_status
    } else {
        200
    }
}

fn body_suppressed(status: u16) -> bool {
    status == 204 || status == 304
}

/// Set the status with no body.
pub fn write_empty(ctx: &mut dyn Context, status: u16) {
    if ctx.status() != 0 {
        return;
    }
    ctx.set_status(resolve_status(0, status));
}

/// Write a raw byte body verbatim: no negotiation, no transform.
pub async fn write_raw(
    ctx: &mut dyn Context,
    status: u16,
    body: Bytes,
) -> Result<(), WriteError> {
    ctx.set_status(status);
    if body_suppressed(status) {
        return Ok(());
    }
    ctx.write_body(body).await.map_err(WriteError::Io)
}

/// Negotiate, transform, marshal, and write a serializable body.
///
/// `content_type` short-circuits negotiation when the output fixed one
/// (a `content_type` attribute or a `Content-Type` header field).
pub async fn write_serialized(
    api: &Api,
    ctx: &mut dyn Context,
    status: u16,
    content_type: Option<String>,
    body: &impl Serialize,
) -> Result<(), WriteError> {
    if body_suppressed(status) {
        ctx.set_status(status);
        return Ok(());
    }
    let content_type = match content_type {
        Some(ct) => ct,
        None => {
            let accept = ctx.header("Accept").unwrap_or("").to_string();
            api.codec().negotiate(&accept)?
        }
    };
    let value = serde_json::to_value(body)
        .map_err(|e| WriteError::Codec(CodecError::Marshal(e.to_string())))?;
    let value = api.codec().transform(status, value)?;
    let bytes = api.codec().marshal(&content_type, &value)?;
    ctx.set_header("Content-Type", &content_type);
    ctx.set_status(status);
    ctx.write_body(bytes).await.map_err(WriteError::Io)
}

// ── Header values ────────────────────────────────────────────────────────────

/// Conversion from an output struct field to a response header value.
///
/// `Option` fields yield no header when `None`.
pub trait IntoHeaderValue {
    fn into_header_value(self) -> Option<String>;
}

macro_rules! into_header_value_via_to_string {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoHeaderValue for $ty {
                fn into_header_value(self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )+
    };
}

into_header_value_via_to_string!(
    String, &'static str, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64,
);

impl<T: IntoHeaderValue> IntoHeaderValue for Option<T> {
    fn into_header_value(self) -> Option<String> {
        self.and_then(IntoHeaderValue::into_header_value)
    }
}

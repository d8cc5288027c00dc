extern crate proc_macro;
use proc_macro::TokenStream;

pub(crate) mod crate_path;
pub(crate) mod input_derive;
pub(crate) mod output_derive;
pub(crate) mod types;

/// Derive macro for operation input structs.
///
/// Generates the compile-time binding table, the body description, and
/// the `from_request` reader that populates the struct from the HTTP
/// context.
///
/// # Field attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[input(path)]` / `#[input(path = "name")]` | Bind a path parameter. Always required in the OpenAPI document. |
/// | `#[input(query)]` / `#[input(query = "name")]` | Bind a query parameter. |
/// | `#[input(header = "X-Name")]` | Bind a request header. |
/// | `#[input(cookie = "name")]` | Bind a request cookie. |
/// | `#[input(..., default = "7")]` | Default literal, applied only when the raw value is empty or absent. |
/// | `#[input(body)]` | Decode the request body through the codec. `Option<T>` makes the body optional. |
/// | `#[input(body, content_type = "...")]` | Fix the request content type instead of inferring it. |
/// | `#[input(raw_body)]` | Bind the body untouched: `Bytes` for raw bytes, `MultipartForm` for an upload form. |
///
/// Fields named `body` or `raw_body` may omit the attribute. Scalar
/// fields support integers, floats, `bool`, `String`, `Vec<T>` of those
/// (comma-separated), and `Option<T>` of any of them.
///
/// # Example
///
/// ```ignore
/// use flux::prelude::*;
///
/// #[derive(Input)]
/// pub struct ListItems {
///     #[input(query, default = "1")]
///     pub page: u32,
///     #[input(query = "page_size", default = "20")]
///     pub page_size: u32,
///     #[input(header = "X-Tenant")]
///     pub tenant: Option<String>,
/// }
/// ```
#[proc_macro_derive(Input, attributes(input))]
pub fn derive_input(input: TokenStream) -> TokenStream {
    input_derive::expand(input)
}

/// Derive macro for operation output structs.
///
/// Generates the response metadata and the writer: status field first,
/// header fields next, body last. Statuses 204 and 304 never carry a
/// body.
///
/// # Field attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[output(status)]` | A `u16` status override; `0` falls back to the operation default. |
/// | `#[output(header = "X-Name")]` | Emit the field as a response header. `Option` fields are skipped when `None`. |
/// | `#[output(body)]` | Serialize the field through content negotiation, `transform`, and `marshal`. |
/// | `#[output(body, content_type = "...")]` | Fix the response content type instead of negotiating. |
/// | `#[output(raw_body)]` | Write a `Bytes` field verbatim — no transform, no negotiation. |
///
/// Un-attributed fields follow their names: `status`, `body`, and
/// `raw_body` mean what they say; anything else becomes a header named
/// by Train-Casing the field (`cache_control` → `Cache-Control`). A
/// `Content-Type` header field overrides negotiation.
///
/// # Example
///
/// ```ignore
/// use flux::prelude::*;
///
/// #[derive(Output)]
/// pub struct GetUserOutput {
///     pub status: u16,
///     pub etag: Option<String>,
///     pub body: User,
/// }
/// ```
#[proc_macro_derive(Output, attributes(output))]
pub fn derive_output(input: TokenStream) -> TokenStream {
    output_derive::expand(input)
}

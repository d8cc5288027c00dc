pub mod api;
pub mod context;
pub mod dependency;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod middleware;
pub mod multipart;
pub mod operation;
pub mod output;
pub mod prelude;
pub mod procedure;
pub mod respond;
pub mod schema;
pub mod testing;

pub use api::{Api, Document};
pub use context::{media_type_essence, BoxFuture, Codec, CodecError, Context, JsonCodec};
pub use dependency::{
    Dependency, DependencyFailure, DependencyKey, DependencyRegistry, ErasedDependency,
    ProvideError, ValidationResult,
};
pub use dispatch::Handler;
pub use error::{ApiError, ErrorDetail, ErrorModel};
pub use input::{Binding, BodyKind, BodySpec, FromParam, Input, InputError, Location, RawBody};
pub use middleware::{Exchange, Middleware, Next};
pub use multipart::{MultipartError, MultipartForm, UploadedFile};
pub use operation::{
    generate_operation_id, sanitize_operation_id, Operation, Parameter, RequestBody, ResponseSpec,
    SecurityRequirement,
};
pub use output::{HeaderSpec, IntoHeaderValue, Output, OutputMeta, WriteError};
pub use procedure::Procedure;
pub use schema::{is_multipart_body, multipart_schema, parse_form_schema, Upload};

// Derive macros share the trait names, as serde does.
pub use flux_macros::{Input, Output};

pub use tokio_util::sync::CancellationToken;

pub use schemars;
pub use serde_json;

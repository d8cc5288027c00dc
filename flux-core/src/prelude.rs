//! One-stop import for applications: `use flux_core::prelude::*;`

pub use crate::api::{Api, Document};
pub use crate::context::{Codec, CodecError, Context, JsonCodec};
pub use crate::dependency::{Dependency, ProvideError};
pub use crate::error::{ApiError, ErrorDetail, ErrorModel};
pub use crate::input::Input;
pub use crate::middleware::{Exchange, Middleware, Next};
pub use crate::multipart::{MultipartForm, UploadedFile};
pub use crate::operation::{Operation, SecurityRequirement};
pub use crate::output::Output;
pub use crate::procedure::Procedure;
pub use crate::respond;
pub use crate::schema::Upload;
pub use crate::CancellationToken;

pub use flux_macros::{Input, Output};

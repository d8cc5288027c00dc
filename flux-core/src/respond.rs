//! Convenience response surface for handlers and middleware.
//!
//! Success helpers negotiate and marshal through the codec; error
//! helpers emit the uniform `{status, message, errors?}` payload with a
//! JSON fallback when negotiation fails. Error writers never touch a
//! response that has already started.

use serde::Serialize;

use crate::api::Api;
use crate::context::Context;
use crate::error::{ErrorDetail, ErrorModel};
use crate::output::{write_serialized, WriteError};

/// Write a 2xx/3xx response: status, negotiated content type, transform,
/// marshal.
pub async fn write_status(
    api: &Api,
    ctx: &mut dyn Context,
    status: u16,
    body: &impl Serialize,
) -> Result<(), WriteError> {
    write_serialized(api, ctx, status, None, body).await
}

/// Write an [`ErrorModel`] payload at its carried status.
///
/// A no-op when the response has already started; marshal failures are
/// logged and swallowed (there is nothing sensible left to write).
pub async fn write_error_model(api: &Api, ctx: &mut dyn Context, model: &ErrorModel) {
    if ctx.status() != 0 {
        return;
    }
    let accept = ctx.header("Accept").unwrap_or("").to_string();
    let content_type = api
        .codec()
        .negotiate(&accept)
        .unwrap_or_else(|_| "application/json".to_string());
    let value = match serde_json::to_value(model) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!("failed to serialize error payload: {err}");
            return;
        }
    };
    let bytes = match api.codec().marshal(&content_type, &value) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!("failed to marshal error payload: {err}");
            return;
        }
    };
    ctx.set_header("Content-Type", &content_type);
    ctx.set_status(model.status);
    if let Err(err) = ctx.write_body(bytes).await {
        tracing::error!("failed to write error payload: {err}");
    }
}

/// Write a `{status, message, errors?}` error response.
pub async fn error(
    api: &Api,
    ctx: &mut dyn Context,
    status: u16,
    message: &str,
    errors: Vec<ErrorDetail>,
) {
    write_error_model(
        api,
        ctx,
        &ErrorModel {
            status,
            message: message.to_string(),
            errors,
        },
    )
    .await;
}

macro_rules! error_helpers {
    ($(($fn_name:ident, $status:literal)),+ $(,)?) => {
        $(
            #[doc = concat!("Write a ", stringify!($status), " error with the given message.")]
            pub async fn $fn_name(api: &Api, ctx: &mut dyn Context, message: &str) {
                error(api, ctx, $status, message, Vec::new()).await;
            }
        )+
    };
}

error_helpers!(
    (bad_request, 400),
    (unauthorized, 401),
    (forbidden, 403),
    (not_found, 404),
    (unprocessable, 422),
    (internal, 500),
);

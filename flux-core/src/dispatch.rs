use std::any::{type_name, Any, TypeId};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::context::BoxFuture;
use crate::dependency::{DependencyFailure, DependencyKey, ErasedDependency};
use crate::error::{ApiError, ErrorDetail};
use crate::input::Input;
use crate::middleware::{Endpoint, Exchange};
use crate::output::Output;
use crate::respond;

// ── The handler contract ─────────────────────────────────────────────────────

/// An operation handler: an async function taking the cancellation
/// token, the typed input, and zero or more dependency values, returning
/// `Result<Output, ApiError>`.
///
/// Implemented for plain `async fn`s of 0–8 dependency parameters; the
/// marker parameter `D` is the tuple of dependency types, which lets the
/// registry resolve them before the first request. Signature mistakes
/// are compile errors rather than registration faults.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid operation handler",
    label = "invalid handler signature",
    note = "handlers look like `async fn(CancellationToken, MyInput, deps...) -> Result<MyOutput, ApiError>` with up to 8 dependency parameters"
)]
pub trait Handler<I, O, D>: Send + Sync + 'static {
    /// The `TypeId`s and names of the dependency parameters, in order.
    fn dependency_types() -> Vec<DependencyKey>;

    /// Call the handler with pre-resolved dependency values.
    fn invoke(
        &self,
        cancel: CancellationToken,
        input: I,
        deps: Vec<Box<dyn Any + Send>>,
    ) -> BoxFuture<'static, Result<O, ApiError>>;
}

macro_rules! impl_handler {
    ($(($ty:ident, $var:ident)),*) => {
        impl<Func, Fut, I, O $(, $ty)*> Handler<I, O, ($($ty,)*)> for Func
        where
            Func: Fn(CancellationToken, I $(, $ty)*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<O, ApiError>> + Send + 'static,
            I: Send + 'static,
            O: Send + 'static,
            $($ty: Send + 'static,)*
        {
            fn dependency_types() -> Vec<DependencyKey> {
                vec![$(DependencyKey {
                    type_id: TypeId::of::<$ty>(),
                    type_name: type_name::<$ty>(),
                }),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn invoke(
                &self,
                cancel: CancellationToken,
                input: I,
                deps: Vec<Box<dyn Any + Send>>,
            ) -> BoxFuture<'static, Result<O, ApiError>> {
                let mut deps = deps.into_iter();
                $(
                    let $var = *deps
                        .next()
                        .expect("dependency slot count mismatch")
                        .downcast::<$ty>()
                        .expect("dependency value type mismatch");
                )*
                Box::pin(self(cancel, input $(, $var)*))
            }
        }
    };
}

impl_handler!();
impl_handler!((D1, d1));
impl_handler!((D1, d1), (D2, d2));
impl_handler!((D1, d1), (D2, d2), (D3, d3));
impl_handler!((D1, d1), (D2, d2), (D3, d3), (D4, d4));
impl_handler!((D1, d1), (D2, d2), (D3, d3), (D4, d4), (D5, d5));
impl_handler!((D1, d1), (D2, d2), (D3, d3), (D4, d4), (D5, d5), (D6, d6));
impl_handler!((D1, d1), (D2, d2), (D3, d3), (D4, d4), (D5, d5), (D6, d6), (D7, d7));
impl_handler!((D1, d1), (D2, d2), (D3, d3), (D4, d4), (D5, d5), (D6, d6), (D7, d7), (D8, d8));

// ── The compiled dispatcher ──────────────────────────────────────────────────

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic")
}

/// Compile the per-operation endpoint closure.
///
/// The closure owns the handler and the resolved dependency slice; the
/// middleware chain terminates in it.
pub(crate) fn compile_endpoint<I, O, D, H>(
    handler: H,
    deps: Vec<Arc<dyn ErasedDependency>>,
    default_status: u16,
) -> Arc<Endpoint>
where
    I: Input,
    O: Output,
    D: 'static,
    H: Handler<I, O, D>,
{
    let handler = Arc::new(handler);
    let deps: Arc<[Arc<dyn ErasedDependency>]> = deps.into();
    Arc::new(move |mut ex: Exchange| {
        let handler = handler.clone();
        let deps = deps.clone();
        let fut: BoxFuture<'static, Exchange> = Box::pin(async move {
            let outcome = AssertUnwindSafe(run_operation::<I, O, D, H>(
                &mut ex,
                &handler,
                &deps,
                default_status,
            ))
            .catch_unwind()
            .await;
            if let Err(payload) = outcome {
                let operation = ex.operation();
                tracing::error!(
                    "panic while serving {} {}: {}",
                    operation.method,
                    operation.path,
                    panic_message(payload.as_ref()),
                );
                let api = ex.api().clone();
                if ex.ctx.status() == 0 {
                    respond::internal(&api, ex.ctx.as_mut(), "internal server error").await;
                }
            }
            ex
        });
        fut
    })
}

/// One request through the operation: parse input, load dependencies,
/// call the handler, write the output.
async fn run_operation<I, O, D, H>(
    ex: &mut Exchange,
    handler: &H,
    deps: &[Arc<dyn ErasedDependency>],
    default_status: u16,
) where
    I: Input,
    O: Output,
    D: 'static,
    H: Handler<I, O, D>,
{
    let api = ex.api().clone();
    let cancel = ex.ctx.cancellation();

    let input = match I::from_request(&api, ex.ctx.as_mut()).await {
        Ok(input) => input,
        Err(err) => {
            respond::write_error_model(&api, ex.ctx.as_mut(), &err.into_model()).await;
            return;
        }
    };

    // Providers run in parameter order and must not depend on each other.
    let mut values: Vec<Box<dyn Any + Send>> = Vec::with_capacity(deps.len());
    for dep in deps {
        match dep.provide(&api, ex.ctx.as_mut(), cancel.clone()).await {
            Ok(value) => values.push(value),
            Err(DependencyFailure::Input(err)) => {
                respond::write_error_model(&api, ex.ctx.as_mut(), &err.into_model()).await;
                return;
            }
            Err(DependencyFailure::Provider(err)) => {
                respond::error(
                    &api,
                    ex.ctx.as_mut(),
                    500,
                    &format!("failed to load dependency `{}`", dep.name()),
                    vec![ErrorDetail::new(err.message)],
                )
                .await;
                return;
            }
        }
    }

    match handler.invoke(cancel, input, values).await {
        Ok(output) => {
            if let Err(err) = output.write(&api, ex.ctx.as_mut(), default_status).await {
                tracing::error!("failed to write response: {err}");
                if ex.ctx.status() == 0 {
                    respond::error(
                        &api,
                        ex.ctx.as_mut(),
                        500,
                        "failed to write response",
                        vec![ErrorDetail::new(err.to_string())],
                    )
                    .await;
                }
            }
        }
        Err(api_err) => {
            respond::write_error_model(&api, ex.ctx.as_mut(), &api_err.into_model()).await;
        }
    }
}

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::Api;
use crate::context::{BoxFuture, Context};
use crate::input::{Binding, Input, InputError};
use crate::middleware::Middleware;

// ── Errors ───────────────────────────────────────────────────────────────────

/// A provider that could not produce its value. Surfaced as HTTP 500
/// with the provider message as the first error cause.
#[derive(Debug, Clone)]
pub struct ProvideError {
    pub message: String,
}

impl ProvideError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProvideError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProvideError {}

impl From<String> for ProvideError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ProvideError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Why a dependency slot could not be filled at request time.
#[derive(Debug)]
pub enum DependencyFailure {
    /// The dependency's sub-input failed to parse (HTTP 400).
    Input(InputError),
    /// The provider returned an error (HTTP 500).
    Provider(ProvideError),
}

// ── Dependency descriptors ───────────────────────────────────────────────────

/// Internal provider abstraction: parses the sub-input (when present)
/// and produces the value.
trait Provider<T>: Send + Sync {
    fn call<'a>(
        &'a self,
        api: &'a Api,
        ctx: &'a mut dyn Context,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<T, DependencyFailure>>;
}

struct PlainProvider<F>(F);

impl<T, F, Fut> Provider<T> for PlainProvider<F>
where
    T: Send + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ProvideError>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        _api: &'a Api,
        _ctx: &'a mut dyn Context,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<T, DependencyFailure>> {
        let fut = (self.0)(cancel);
        Box::pin(async move { fut.await.map_err(DependencyFailure::Provider) })
    }
}

struct SubInputProvider<S, F> {
    func: F,
    _marker: std::marker::PhantomData<fn() -> S>,
}

impl<T, S, F, Fut> Provider<T> for SubInputProvider<S, F>
where
    T: Send + 'static,
    S: Input,
    F: Fn(CancellationToken, S) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ProvideError>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        api: &'a Api,
        ctx: &'a mut dyn Context,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<T, DependencyFailure>> {
        Box::pin(async move {
            let sub = S::from_request(api, ctx)
                .await
                .map_err(DependencyFailure::Input)?;
            (self.func)(cancel, sub)
                .await
                .map_err(DependencyFailure::Provider)
        })
    }
}

/// A typed dependency: a named provider invoked per request, optionally
/// parsing its own sub-input and requiring middleware on every
/// operation it is injected into.
///
/// # Example
///
/// ```ignore
/// let db = Dependency::new("db", |_cancel| async move { Ok(Db::connect().await?) });
///
/// let pager = Dependency::with_sub_input("pager", |_cancel, page: PageInput| async move {
///     Ok(Pager { page: page.page, page_size: page.page_size })
/// });
/// ```
pub struct Dependency<T: Send + 'static> {
    name: String,
    middleware: Vec<Middleware>,
    sub_bindings: &'static [Binding],
    provider: Arc<dyn Provider<T>>,
}

impl<T: Send + 'static> Dependency<T> {
    /// A dependency whose provider only needs the cancellation token.
    pub fn new<F, Fut>(name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ProvideError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            middleware: Vec::new(),
            sub_bindings: &[],
            provider: Arc::new(PlainProvider(provider)),
        }
    }

    /// A dependency that parses a sub-input from the request before each
    /// provider call. The sub-input's parameters are added to every
    /// operation the dependency is injected into.
    pub fn with_sub_input<S, F, Fut>(name: impl Into<String>, provider: F) -> Self
    where
        S: Input,
        F: Fn(CancellationToken, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ProvideError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            middleware: Vec::new(),
            sub_bindings: S::bindings(),
            provider: Arc::new(SubInputProvider {
                func: provider,
                _marker: std::marker::PhantomData,
            }),
        }
    }

    /// Declare middleware that must run on every operation this
    /// dependency is injected into.
    pub fn requires_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }
}

/// Type-erased view of a [`Dependency`], stored in the registry and in
/// compiled dispatchers.
pub trait ErasedDependency: Send + Sync {
    /// Diagnostic name given at construction.
    fn name(&self) -> &str;

    /// Human-readable name of the provided type.
    fn type_name(&self) -> &'static str;

    /// Registry key: the `TypeId` of the provided type.
    fn type_id(&self) -> TypeId;

    /// Middleware declared via `requires_middleware`.
    fn required_middleware(&self) -> &[Middleware];

    /// The sub-input's binding table (empty without a sub-input).
    fn sub_bindings(&self) -> &'static [Binding];

    /// Parse the sub-input (if any) and invoke the provider.
    fn provide<'a>(
        &'a self,
        api: &'a Api,
        ctx: &'a mut dyn Context,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<Box<dyn Any + Send>, DependencyFailure>>;
}

impl<T: Send + 'static> ErasedDependency for Dependency<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn required_middleware(&self) -> &[Middleware] {
        &self.middleware
    }

    fn sub_bindings(&self) -> &'static [Binding] {
        self.sub_bindings
    }

    fn provide<'a>(
        &'a self,
        api: &'a Api,
        ctx: &'a mut dyn Context,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<Box<dyn Any + Send>, DependencyFailure>> {
        let fut = self.provider.call(api, ctx, cancel);
        Box::pin(async move { Ok(Box::new(fut.await?) as Box<dyn Any + Send>) })
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Handler dependency slot: the `TypeId` and name of one dependency
/// parameter, produced by the `Handler` arity impls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyKey {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

/// Result of checking a handler's dependency parameters against a
/// registry.
pub struct ValidationResult {
    /// Dependency parameters with no registered provider. Fatal.
    pub missing: Vec<DependencyKey>,
    /// Registered dependencies in handler parameter order.
    pub resolved: Vec<Arc<dyn ErasedDependency>>,
    /// Registered dependencies the handler never asks for.
    pub unused: Vec<Arc<dyn ErasedDependency>>,
}

/// Dependencies keyed by provided type.
///
/// Built through [`Procedure::inject`](crate::Procedure::inject);
/// read-only once an operation is registered, so compiled dispatchers
/// share it without locking.
#[derive(Clone, Default)]
pub struct DependencyRegistry {
    entries: HashMap<TypeId, Arc<dyn ErasedDependency>>,
    /// Insertion order, for stable diagnostics.
    order: Vec<TypeId>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dependency keyed by its provided type.
    ///
    /// A duplicate provided type keeps the first entry and logs a
    /// warning — it never aborts registration.
    pub fn add(&mut self, dependency: Arc<dyn ErasedDependency>) {
        let type_id = ErasedDependency::type_id(dependency.as_ref());
        if let Some(existing) = self.entries.get(&type_id) {
            tracing::warn!(
                "dependency `{}` for type {} ignored: `{}` already provides it",
                dependency.name(),
                dependency.type_name(),
                existing.name(),
            );
            return;
        }
        self.entries.insert(type_id, dependency);
        self.order.push(type_id);
    }

    /// Look up the dependency providing a type.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<dyn ErasedDependency>> {
        self.entries.get(&type_id).cloned()
    }

    /// All registered dependencies in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ErasedDependency>> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a handler's dependency parameters, recording missing
    /// types and registered-but-unused dependencies.
    pub fn validate(&self, wanted: &[DependencyKey]) -> ValidationResult {
        let mut missing = Vec::new();
        let mut resolved = Vec::new();
        for key in wanted {
            match self.get(key.type_id) {
                Some(dep) => resolved.push(dep),
                None => missing.push(*key),
            }
        }
        let unused = self
            .iter()
            .filter(|dep| !wanted.iter().any(|key| key.type_id == ErasedDependency::type_id(dep.as_ref())))
            .cloned()
            .collect();
        ValidationResult {
            missing,
            resolved,
            unused,
        }
    }
}

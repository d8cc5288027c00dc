use std::any::type_name;
use std::panic::Location;
use std::sync::Arc;

use crate::api::Api;
use crate::dependency::{
    Dependency, DependencyKey, DependencyRegistry, ErasedDependency, ValidationResult,
};
use crate::dispatch::{compile_endpoint, Handler};
use crate::input::Input;
use crate::middleware::{self, Middleware};
use crate::operation::{generate_operation_id, Operation, SecurityRequirement};
use crate::output::Output;
use crate::schema;

/// An immutable bundle of dependencies, middleware, and security used
/// to register one or more operations.
///
/// Every chaining call consumes the procedure and returns a new one;
/// snapshots already handed out never change, so a base procedure can be
/// specialized freely:
///
/// ```ignore
/// let base = Procedure::new().inject(db).with_middleware(request_id);
/// let authed = base.clone()
///     .with_middleware(auth)
///     .with_security(SecurityRequirement::new("bearer", &[]));
///
/// base.get(&api, "/health", health);
/// authed.get(&api, "/users/{id}", get_user);
/// ```
#[derive(Clone, Default)]
pub struct Procedure {
    registry: DependencyRegistry,
    middleware: Vec<Middleware>,
    security: Vec<SecurityRequirement>,
}

impl Procedure {
    /// An empty procedure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency, along with any middleware it requires.
    ///
    /// The middleware list is deduplicated by identity, preserving the
    /// earliest position. Injecting a second dependency for the same
    /// provided type warns and keeps the first.
    pub fn inject<T: Send + Sync + 'static>(mut self, dependency: Dependency<T>) -> Self {
        self.middleware
            .extend(dependency.required_middleware().iter().cloned());
        middleware::dedup(&mut self.middleware);
        self.registry.add(Arc::new(dependency));
        self
    }

    /// Append middleware, deduplicated by identity.
    pub fn with_middleware(mut self, mw: Middleware) -> Self {
        self.middleware.push(mw);
        middleware::dedup(&mut self.middleware);
        self
    }

    /// Append a security requirement applied to every operation
    /// registered through this procedure.
    pub fn with_security(mut self, requirement: SecurityRequirement) -> Self {
        self.security.push(requirement);
        self
    }

    /// The dependency registry snapshot (read-only).
    pub fn registry(&self) -> &DependencyRegistry {
        &self.registry
    }

    /// The middleware chain, in execution order.
    pub fn middleware(&self) -> &[Middleware] {
        &self.middleware
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Register `handler` for `operation` on `api`.
    ///
    /// Validates the handler's dependency parameters, applies the
    /// procedure's middleware and security, synthesizes the OpenAPI
    /// artifacts, compiles the dispatcher, and installs it at the
    /// operation's `(method, path)`. Hidden operations are dispatchable
    /// but undocumented.
    ///
    /// # Panics
    ///
    /// Panics when a dependency parameter has no registered provider;
    /// the message lists every available dependency and the caller's
    /// source location. The OpenAPI document is left untouched.
    #[track_caller]
    pub fn register<I, O, D, H>(&self, api: &Api, operation: Operation, handler: H)
    where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        let caller = Location::caller();
        let mut operation = operation;

        let validation = self.registry.validate(&H::dependency_types());
        if !validation.missing.is_empty() {
            panic!("{}", self.format_missing(&operation, &validation, caller));
        }
        for dep in &validation.unused {
            tracing::warn!(
                "dependency `{}` ({}) injected but unused by {} {} (registered at {})",
                dep.name(),
                dep.type_name(),
                operation.method,
                operation.path,
                caller,
            );
        }

        // Middleware and security travel from the procedure onto the
        // operation; operation-level security is kept after the
        // procedure's.
        operation.middleware = self.middleware.clone();
        let mut security = self.security.clone();
        security.append(&mut operation.security);
        operation.security = security;

        if operation.operation_id.is_empty() {
            operation.operation_id =
                generate_operation_id(&operation.method, &operation.path, type_name::<O>());
            operation.auto_operation_id = true;
        }

        let components = schema::apply::<I, O>(&mut operation, &validation.resolved);

        let endpoint =
            compile_endpoint::<I, O, D, H>(handler, validation.resolved, operation.default_status);
        let chain: Arc<[Middleware]> = operation.middleware.clone().into();
        let operation = Arc::new(operation);
        api.install_route(operation.clone(), chain, endpoint);

        if !operation.hidden {
            api.add_operation(operation, components);
        }
    }

    fn format_missing(
        &self,
        operation: &Operation,
        validation: &ValidationResult,
        caller: &Location<'_>,
    ) -> String {
        let missing = validation
            .missing
            .iter()
            .map(|key: &DependencyKey| key.type_name)
            .collect::<Vec<_>>()
            .join(", ");
        let available = if self.registry.is_empty() {
            "none".to_string()
        } else {
            self.registry
                .iter()
                .map(|dep| format!("{} (`{}`)", dep.type_name(), dep.name()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "cannot register {} {} (at {caller}): no dependency registered for: {missing}; \
             available dependencies: {available}. Add them with Procedure::inject(...)",
            operation.method, operation.path,
        )
    }

    // ── Verb helpers ────────────────────────────────────────────────────

    /// Register a `GET` operation.
    #[track_caller]
    pub fn get<I, O, D, H>(&self, api: &Api, path: &str, handler: H)
    where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, Operation::new("GET", path), handler);
    }

    /// Register a `GET` operation with an operation customizer.
    #[track_caller]
    pub fn get_with<I, O, D, H>(
        &self,
        api: &Api,
        path: &str,
        handler: H,
        customize: impl FnOnce(Operation) -> Operation,
    ) where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, customize(Operation::new("GET", path)), handler);
    }

    /// Register a `POST` operation.
    #[track_caller]
    pub fn post<I, O, D, H>(&self, api: &Api, path: &str, handler: H)
    where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, Operation::new("POST", path), handler);
    }

    /// Register a `POST` operation with an operation customizer.
    #[track_caller]
    pub fn post_with<I, O, D, H>(
        &self,
        api: &Api,
        path: &str,
        handler: H,
        customize: impl FnOnce(Operation) -> Operation,
    ) where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, customize(Operation::new("POST", path)), handler);
    }

    /// Register a `PUT` operation.
    #[track_caller]
    pub fn put<I, O, D, H>(&self, api: &Api, path: &str, handler: H)
    where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, Operation::new("PUT", path), handler);
    }

    /// Register a `PATCH` operation.
    #[track_caller]
    pub fn patch<I, O, D, H>(&self, api: &Api, path: &str, handler: H)
    where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, Operation::new("PATCH", path), handler);
    }

    /// Register a `DELETE` operation.
    #[track_caller]
    pub fn delete<I, O, D, H>(&self, api: &Api, path: &str, handler: H)
    where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, Operation::new("DELETE", path), handler);
    }

    /// Register a `HEAD` operation.
    #[track_caller]
    pub fn head<I, O, D, H>(&self, api: &Api, path: &str, handler: H)
    where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, Operation::new("HEAD", path), handler);
    }

    /// Register an `OPTIONS` operation.
    #[track_caller]
    pub fn options<I, O, D, H>(&self, api: &Api, path: &str, handler: H)
    where
        I: Input,
        O: Output,
        D: 'static,
        H: Handler<I, O, D>,
    {
        self.register(api, Operation::new("OPTIONS", path), handler);
    }
}

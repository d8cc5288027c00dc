use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use crate::context::{Codec, Context, JsonCodec};
use crate::middleware::{Endpoint, Exchange, Middleware, Next};
use crate::operation::Operation;
use crate::respond;

/// The OpenAPI document accumulated at registration time: operations,
/// the component-schema registry, and declared security schemes.
///
/// Rendering to a spec JSON lives in `flux-openapi`; the core only
/// collects.
#[derive(Clone, Default)]
pub struct Document {
    /// Registered, non-hidden operations in registration order.
    pub operations: Vec<Arc<Operation>>,
    /// `components/schemas`, keyed by schema name.
    pub schemas: Map<String, Value>,
    /// `components/securitySchemes`, keyed by scheme name.
    pub security_schemes: Map<String, Value>,
}

impl Document {
    /// Look up a documented operation by method and path template.
    pub fn operation(&self, method: &str, path: &str) -> Option<&Arc<Operation>> {
        let method = method.to_uppercase();
        self.operations
            .iter()
            .find(|op| op.method == method && op.path == path)
    }

    /// Merge component schemas, keeping existing entries.
    fn merge_schemas(&mut self, components: Vec<(String, Value)>) {
        for (name, schema) in components {
            self.schemas.entry(name).or_insert(schema);
        }
    }

    /// Append an operation, replacing any previous entry at the same
    /// `(method, path)`.
    fn push_operation(&mut self, operation: Arc<Operation>) {
        self.operations
            .retain(|op| !(op.method == operation.method && op.path == operation.path));
        self.operations.push(operation);
    }
}

#[derive(Clone)]
struct RouteEntry {
    operation: Arc<Operation>,
    middleware: Arc<[Middleware]>,
    endpoint: Arc<Endpoint>,
}

#[derive(Default)]
struct ApiState {
    document: Document,
    routes: HashMap<(String, String), RouteEntry>,
}

struct ApiInner {
    codec: Box<dyn Codec>,
    state: RwLock<ApiState>,
}

/// The host API: the codec hooks, the routing table of compiled
/// dispatchers, and the OpenAPI document under construction.
///
/// Cheap to clone; all clones share one underlying API. Registration
/// happens before the transport starts serving, so request-time reads
/// take the lock only to clone a route entry out.
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

impl Api {
    /// An API using the default JSON codec.
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }

    /// An API using a custom codec.
    pub fn with_codec(codec: impl Codec + 'static) -> Self {
        Self {
            inner: Arc::new(ApiInner {
                codec: Box::new(codec),
                state: RwLock::new(ApiState::default()),
            }),
        }
    }

    /// The codec hooks.
    pub fn codec(&self) -> &dyn Codec {
        &*self.inner.codec
    }

    /// A snapshot of the OpenAPI document.
    pub fn document(&self) -> Document {
        self.read_state(|state| state.document.clone())
    }

    /// Declare a security scheme under `components/securitySchemes`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// api.register_security_scheme("bearer", serde_json::json!({
    ///     "type": "http", "scheme": "bearer", "bearerFormat": "JWT"
    /// }));
    /// ```
    pub fn register_security_scheme(&self, name: &str, scheme: Value) {
        self.write_state(|state| {
            state
                .document
                .security_schemes
                .insert(name.to_string(), scheme);
        });
    }

    /// Whether a dispatcher is installed at `(method, path)`.
    pub fn has_route(&self, method: &str, path: &str) -> bool {
        let key = route_key(method, path);
        self.read_state(|state| state.routes.contains_key(&key))
    }

    /// Serve one request through the dispatcher installed at
    /// `(method, path)`.
    ///
    /// Path routing (matching the raw path against templates and
    /// extracting `ctx.param` values) is the transport adapter's job;
    /// the core is addressed by template. An unknown route writes the
    /// uniform 404 payload.
    pub async fn dispatch(
        &self,
        method: &str,
        path: &str,
        ctx: Box<dyn Context>,
    ) -> Box<dyn Context> {
        let key = route_key(method, path);
        let entry = self.read_state(|state| state.routes.get(&key).cloned());
        match entry {
            Some(entry) => {
                let exchange = Exchange::new(ctx, self.clone(), entry.operation.clone());
                let next = Next::new(entry.middleware.clone(), entry.endpoint.clone());
                next.run(exchange).await.into_context()
            }
            None => {
                let mut ctx = ctx;
                respond::not_found(
                    self,
                    ctx.as_mut(),
                    &format!("no operation registered at {} {}", method.to_uppercase(), path),
                )
                .await;
                ctx
            }
        }
    }

    /// Install a compiled dispatcher, replacing (with a warning) any
    /// previous entry at the same key.
    pub(crate) fn install_route(
        &self,
        operation: Arc<Operation>,
        middleware: Arc<[Middleware]>,
        endpoint: Arc<Endpoint>,
    ) {
        let key = route_key(&operation.method, &operation.path);
        self.write_state(|state| {
            if state.routes.contains_key(&key) {
                tracing::warn!(
                    "operation {} {} registered twice; replacing the previous dispatcher",
                    operation.method,
                    operation.path,
                );
            }
            state.routes.insert(
                key,
                RouteEntry {
                    operation,
                    middleware,
                    endpoint,
                },
            );
        });
    }

    /// Record a registered operation and its component schemas in the
    /// document.
    pub(crate) fn add_operation(
        &self,
        operation: Arc<Operation>,
        components: Vec<(String, Value)>,
    ) {
        self.write_state(|state| {
            state.document.merge_schemas(components);
            state.document.push_operation(operation);
        });
    }

    fn read_state<R>(&self, f: impl FnOnce(&ApiState) -> R) -> R {
        let state = self.inner.state.read().expect("api state lock poisoned");
        f(&state)
    }

    fn write_state<R>(&self, f: impl FnOnce(&mut ApiState) -> R) -> R {
        let mut state = self.inner.state.write().expect("api state lock poisoned");
        f(&mut state)
    }
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}

fn route_key(method: &str, path: &str) -> (String, String) {
    (method.to_uppercase(), path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    #[test]
    fn security_schemes_are_recorded() {
        let api = Api::new();
        api.register_security_scheme("bearer", serde_json::json!({"type": "http"}));
        let doc = api.document();
        assert_eq!(doc.security_schemes["bearer"]["type"], "http");
    }

    #[tokio::test]
    async fn unknown_route_writes_404() {
        let api = Api::new();
        let ctx = TestContext::get("/nowhere");
        let response = ctx.response_handle();
        api.dispatch("GET", "/nowhere", Box::new(ctx)).await;
        assert_eq!(response.status(), 404);
        assert_eq!(response.json()["status"], 404);
    }

    #[test]
    fn has_route_is_false_before_registration() {
        let api = Api::new();
        assert!(!api.has_route("GET", "/items"));
    }
}

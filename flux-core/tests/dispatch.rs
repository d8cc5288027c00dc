//! Dispatcher behavior driven through `TestContext`, with hand-written
//! `Input`/`Output` implementations.

use std::sync::{Arc, Mutex};

use flux_core::input::{self, Binding, Location};
use flux_core::output::{self, OutputMeta, WriteError};
use flux_core::testing::TestContext;
use flux_core::{
    Api, ApiError, CancellationToken, Context, Dependency, Input, InputError, Middleware, Output,
    Procedure, ProvideError,
};

// ── Hand-written input/output types ──────────────────────────────────────────

struct PageQuery {
    page: u32,
}

impl Input for PageQuery {
    fn bindings() -> &'static [Binding] {
        const BINDINGS: &[Binding] = &[Binding {
            name: "page",
            location: Location::Query,
            required: false,
            default: Some("1"),
            type_hint: "integer",
            item_hint: None,
        }];
        BINDINGS
    }

    async fn from_request(_api: &Api, ctx: &mut dyn Context) -> Result<Self, InputError> {
        Ok(Self {
            page: input::require(ctx.query("page"), Some("1"), "page", Location::Query)?,
        })
    }
}

struct JsonOut {
    status: u16,
    body: serde_json::Value,
}

impl JsonOut {
    fn ok(body: serde_json::Value) -> Self {
        Self { status: 0, body }
    }
}

impl Output for JsonOut {
    fn metadata() -> OutputMeta {
        OutputMeta::EMPTY
    }

    async fn write(
        self,
        api: &Api,
        ctx: &mut dyn Context,
        default_status: u16,
    ) -> Result<(), WriteError> {
        if ctx.status() != 0 {
            return Ok(());
        }
        let status = output::resolve_status(self.status, default_status);
        output::write_serialized(api, ctx, status, None, &self.body).await
    }
}

// ── Dependencies ─────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Db {
    healthy: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct Pager {
    page: u32,
    page_size: u32,
}

struct PagingInput {
    page: u32,
    page_size: u32,
}

impl Input for PagingInput {
    fn bindings() -> &'static [Binding] {
        const BINDINGS: &[Binding] = &[
            Binding {
                name: "page",
                location: Location::Query,
                required: false,
                default: Some("1"),
                type_hint: "integer",
                item_hint: None,
            },
            Binding {
                name: "page_size",
                location: Location::Query,
                required: false,
                default: Some("20"),
                type_hint: "integer",
                item_hint: None,
            },
        ];
        BINDINGS
    }

    async fn from_request(_api: &Api, ctx: &mut dyn Context) -> Result<Self, InputError> {
        Ok(Self {
            page: input::require(ctx.query("page"), Some("1"), "page", Location::Query)?,
            page_size: input::require(
                ctx.query("page_size"),
                Some("20"),
                "page_size",
                Location::Query,
            )?,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_path_serializes_the_body() {
    async fn list(
        _cancel: CancellationToken,
        input: PageQuery,
    ) -> Result<JsonOut, ApiError> {
        Ok(JsonOut::ok(serde_json::json!({ "page": input.page })))
    }

    let api = Api::new();
    Procedure::new().get(&api, "/items", list);

    let ctx = TestContext::get("/items").with_query("page", "3");
    let response = ctx.response_handle();
    api.dispatch("GET", "/items", Box::new(ctx)).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("Content-Type").as_deref(), Some("application/json"));
    assert_eq!(response.json()["page"], 3);
}

#[tokio::test]
async fn parse_failure_is_a_400_with_field_hint() {
    async fn list(
        _cancel: CancellationToken,
        input: PageQuery,
    ) -> Result<JsonOut, ApiError> {
        Ok(JsonOut::ok(serde_json::json!({ "page": input.page })))
    }

    let api = Api::new();
    Procedure::new().get(&api, "/items", list);

    let ctx = TestContext::get("/items").with_query("page", "not-a-number");
    let response = ctx.response_handle();
    api.dispatch("GET", "/items", Box::new(ctx)).await;

    assert_eq!(response.status(), 400);
    let body = response.json();
    assert_eq!(body["status"], 400);
    assert_eq!(body["errors"][0]["location"], "query.page");
}

#[tokio::test]
async fn provider_error_is_a_500_with_cause() {
    async fn check(
        _cancel: CancellationToken,
        _input: (),
        _db: Db,
    ) -> Result<JsonOut, ApiError> {
        Ok(JsonOut::ok(serde_json::json!({ "ok": true })))
    }

    let api = Api::new();
    Procedure::new()
        .inject(Dependency::<Db>::new("db", |_cancel| async {
            Err(ProvideError::new("connection refused"))
        }))
        .get(&api, "/check", check);

    let ctx = TestContext::get("/check");
    let response = ctx.response_handle();
    api.dispatch("GET", "/check", Box::new(ctx)).await;

    assert_eq!(response.status(), 500);
    let body = response.json();
    assert_eq!(body["errors"][0]["message"], "connection refused");
}

#[tokio::test]
async fn provider_value_reaches_the_handler() {
    async fn check(_cancel: CancellationToken, _input: (), db: Db) -> Result<JsonOut, ApiError> {
        Ok(JsonOut::ok(serde_json::json!({ "healthy": db.healthy })))
    }

    let api = Api::new();
    Procedure::new()
        .inject(Dependency::new("db", |_cancel| async {
            Ok(Db { healthy: true })
        }))
        .get(&api, "/check", check);

    let ctx = TestContext::get("/check");
    let response = ctx.response_handle();
    api.dispatch("GET", "/check", Box::new(ctx)).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.json()["healthy"], true);
}

#[tokio::test]
async fn sub_input_feeds_the_provider() {
    async fn list(
        _cancel: CancellationToken,
        _input: (),
        pager: Pager,
    ) -> Result<JsonOut, ApiError> {
        Ok(JsonOut::ok(serde_json::json!({
            "page": pager.page,
            "page_size": pager.page_size,
        })))
    }

    let api = Api::new();
    Procedure::new()
        .inject(Dependency::with_sub_input(
            "pager",
            |_cancel, paging: PagingInput| async move {
                Ok(Pager {
                    page: paging.page,
                    page_size: paging.page_size,
                })
            },
        ))
        .get(&api, "/items", list);

    let ctx = TestContext::get("/items").with_query_string("page=2&page_size=10");
    let response = ctx.response_handle();
    api.dispatch("GET", "/items", Box::new(ctx)).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.json()["page"], 2);
    assert_eq!(response.json()["page_size"], 10);

    // The dependency's sub-input parameters surface on the operation.
    let document = api.document();
    let op = document.operation("GET", "/items").unwrap();
    let names: Vec<_> = op.parameters.iter().map(|p| p.name.as_str()).collect();
    assert!(names.contains(&"page"));
    assert!(names.contains(&"page_size"));
}

#[tokio::test]
async fn sub_input_parse_failure_is_a_400() {
    async fn list(
        _cancel: CancellationToken,
        _input: (),
        _pager: Pager,
    ) -> Result<JsonOut, ApiError> {
        Ok(JsonOut::ok(serde_json::json!({})))
    }

    let api = Api::new();
    Procedure::new()
        .inject(Dependency::with_sub_input(
            "pager",
            |_cancel, paging: PagingInput| async move {
                Ok(Pager {
                    page: paging.page,
                    page_size: paging.page_size,
                })
            },
        ))
        .get(&api, "/items", list);

    let ctx = TestContext::get("/items").with_query("page", "x");
    let response = ctx.response_handle();
    api.dispatch("GET", "/items", Box::new(ctx)).await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn handler_error_status_is_written() {
    async fn find(_cancel: CancellationToken, _input: ()) -> Result<JsonOut, ApiError> {
        Err(ApiError::NotFound("user 7".into()))
    }

    let api = Api::new();
    Procedure::new().get(&api, "/users/{id}", find);

    let ctx = TestContext::get("/users/7").with_param("id", "7");
    let response = ctx.response_handle();
    api.dispatch("GET", "/users/{id}", Box::new(ctx)).await;

    assert_eq!(response.status(), 404);
    assert_eq!(response.json()["message"], "user 7");
}

#[tokio::test]
async fn handler_panic_becomes_a_500() {
    async fn boom(_cancel: CancellationToken, _input: ()) -> Result<JsonOut, ApiError> {
        panic!("handler exploded");
    }

    let api = Api::new();
    Procedure::new().get(&api, "/boom", boom);

    let ctx = TestContext::get("/boom");
    let response = ctx.response_handle();
    api.dispatch("GET", "/boom", Box::new(ctx)).await;

    assert_eq!(response.status(), 500);
    assert_eq!(response.json()["status"], 500);
}

#[tokio::test]
async fn middleware_runs_in_order_around_the_dispatcher() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let outer_log = log.clone();
    let outer = Middleware::new("outer", move |ex, next| {
        let log = outer_log.clone();
        async move {
            log.lock().unwrap().push("outer-in");
            let ex = next.run(ex).await;
            log.lock().unwrap().push("outer-out");
            ex
        }
    });

    let inner_log = log.clone();
    let inner = Middleware::new("inner", move |ex, next| {
        let log = inner_log.clone();
        async move {
            log.lock().unwrap().push("inner-in");
            let ex = next.run(ex).await;
            log.lock().unwrap().push("inner-out");
            ex
        }
    });

    let handler_log = log.clone();
    let handler = move |_cancel: CancellationToken, _input: ()| {
        let log = handler_log.clone();
        async move {
            log.lock().unwrap().push("handler");
            Ok::<JsonOut, ApiError>(JsonOut::ok(serde_json::json!({})))
        }
    };

    let api = Api::new();
    Procedure::new()
        .with_middleware(outer)
        .with_middleware(inner)
        .get(&api, "/traced", handler);

    let ctx = TestContext::get("/traced");
    api.dispatch("GET", "/traced", Box::new(ctx)).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec!["outer-in", "inner-in", "handler", "inner-out", "outer-out"]
    );
}

#[tokio::test]
async fn middleware_short_circuits_by_not_calling_next() {
    let gate = Middleware::new("gate", |mut ex: flux_core::Exchange, _next| async move {
        let api = ex.api().clone();
        flux_core::respond::forbidden(&api, ex.ctx.as_mut(), "no entry").await;
        ex
    });

    async fn unreachable_handler(
        _cancel: CancellationToken,
        _input: (),
    ) -> Result<JsonOut, ApiError> {
        panic!("the handler must not run");
    }

    let api = Api::new();
    Procedure::new()
        .with_middleware(gate)
        .get(&api, "/closed", unreachable_handler);

    let ctx = TestContext::get("/closed");
    let response = ctx.response_handle();
    api.dispatch("GET", "/closed", Box::new(ctx)).await;

    assert_eq!(response.status(), 403);
    assert_eq!(response.json()["message"], "no entry");
}

#[tokio::test]
async fn default_applies_only_when_the_value_is_empty() {
    async fn list(
        _cancel: CancellationToken,
        input: PageQuery,
    ) -> Result<JsonOut, ApiError> {
        Ok(JsonOut::ok(serde_json::json!({ "page": input.page })))
    }

    let api = Api::new();
    Procedure::new().get(&api, "/items", list);

    let ctx = TestContext::get("/items");
    let response = ctx.response_handle();
    api.dispatch("GET", "/items", Box::new(ctx)).await;
    assert_eq!(response.json()["page"], 1);

    let ctx = TestContext::get("/items").with_query("page", "5");
    let response = ctx.response_handle();
    api.dispatch("GET", "/items", Box::new(ctx)).await;
    assert_eq!(response.json()["page"], 5);
}

#[tokio::test]
async fn status_field_zero_falls_back_to_operation_default() {
    async fn create(_cancel: CancellationToken, _input: ()) -> Result<JsonOut, ApiError> {
        Ok(JsonOut::ok(serde_json::json!({ "created": true })))
    }

    let api = Api::new();
    Procedure::new().post_with(&api, "/items", create, |op| op.default_status(201));

    let ctx = TestContext::post("/items");
    let response = ctx.response_handle();
    api.dispatch("POST", "/items", Box::new(ctx)).await;

    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn explicit_status_field_wins_over_default() {
    async fn find(_cancel: CancellationToken, _input: ()) -> Result<JsonOut, ApiError> {
        Ok(JsonOut {
            status: 404,
            body: serde_json::json!({ "msg": "missing" }),
        })
    }

    let api = Api::new();
    Procedure::new().get(&api, "/maybe", find);

    let ctx = TestContext::get("/maybe");
    let response = ctx.response_handle();
    api.dispatch("GET", "/maybe", Box::new(ctx)).await;

    assert_eq!(response.status(), 404);
    assert_eq!(response.json()["msg"], "missing");
}

//! Input-parsing and response-writing boundary behavior through the
//! derive macros.

use bytes::Bytes;
use flux::prelude::*;
use flux_test::TestContext;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, JsonSchema)]
struct Note {
    text: String,
}

#[derive(Output)]
struct NoteOut {
    body: Note,
}

// ── Body presence ────────────────────────────────────────────────────────────

#[derive(Input)]
struct NoteInput {
    body: Note,
}

async fn echo_note(_cancel: CancellationToken, input: NoteInput) -> Result<NoteOut, ApiError> {
    Ok(NoteOut { body: input.body })
}

#[tokio::test]
async fn empty_body_with_required_body_is_400() {
    let api = Api::new();
    Procedure::new().post(&api, "/notes", echo_note);

    let ctx = TestContext::post("/notes");
    let response = ctx.response_handle();
    api.dispatch("POST", "/notes", Box::new(ctx)).await;

    assert_eq!(response.status(), 400);
    assert_eq!(response.json()["errors"][0]["location"], "body");
}

#[tokio::test]
async fn unknown_content_type_is_400() {
    let api = Api::new();
    Procedure::new().post(&api, "/notes", echo_note);

    let ctx = TestContext::post("/notes")
        .with_header("Content-Type", "text/csv")
        .with_body("text,else");
    let response = ctx.response_handle();
    api.dispatch("POST", "/notes", Box::new(ctx)).await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn malformed_json_body_is_400() {
    let api = Api::new();
    Procedure::new().post(&api, "/notes", echo_note);

    let ctx = TestContext::post("/notes")
        .with_header("Content-Type", "application/json")
        .with_body("{not json");
    let response = ctx.response_handle();
    api.dispatch("POST", "/notes", Box::new(ctx)).await;

    assert_eq!(response.status(), 400);
}

// ── Scalar and sequence binding ──────────────────────────────────────────────

#[derive(Input)]
struct FilterInput {
    #[input(query)]
    ids: Vec<i64>,
    #[input(query, default = "7")]
    limit: u32,
    #[input(header = "X-Tenant")]
    tenant: Option<String>,
    #[input(cookie = "session")]
    session: Option<String>,
}

#[derive(Serialize, JsonSchema)]
struct FilterEcho {
    ids: Vec<i64>,
    limit: u32,
    tenant: Option<String>,
    session: Option<String>,
}

#[derive(Output)]
struct FilterOut {
    body: FilterEcho,
}

async fn filter(_cancel: CancellationToken, input: FilterInput) -> Result<FilterOut, ApiError> {
    Ok(FilterOut {
        body: FilterEcho {
            ids: input.ids,
            limit: input.limit,
            tenant: input.tenant,
            session: input.session,
        },
    })
}

#[tokio::test]
async fn comma_separated_query_binds_to_a_sequence() {
    let api = Api::new();
    Procedure::new().get(&api, "/filter", filter);

    let ctx = TestContext::get("/filter").with_query("ids", "1,2,3");
    let response = ctx.response_handle();
    api.dispatch("GET", "/filter", Box::new(ctx)).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.json()["ids"], serde_json::json!([1, 2, 3]));
    // The default fires for the absent limit.
    assert_eq!(response.json()["limit"], 7);
}

#[tokio::test]
async fn default_applies_only_when_the_raw_value_is_empty() {
    let api = Api::new();
    Procedure::new().get(&api, "/filter", filter);

    let ctx = TestContext::get("/filter")
        .with_query("ids", "4")
        .with_query("limit", "");
    let response = ctx.response_handle();
    api.dispatch("GET", "/filter", Box::new(ctx)).await;
    assert_eq!(response.json()["limit"], 7);

    let ctx = TestContext::get("/filter")
        .with_query("ids", "4")
        .with_query("limit", "3");
    let response = ctx.response_handle();
    api.dispatch("GET", "/filter", Box::new(ctx)).await;
    assert_eq!(response.json()["limit"], 3);
}

#[tokio::test]
async fn header_and_cookie_fields_bind() {
    let api = Api::new();
    Procedure::new().get(&api, "/filter", filter);

    let ctx = TestContext::get("/filter")
        .with_query("ids", "1")
        .with_header("X-Tenant", "acme")
        .with_cookie("session", "s-123");
    let response = ctx.response_handle();
    api.dispatch("GET", "/filter", Box::new(ctx)).await;

    assert_eq!(response.json()["tenant"], "acme");
    assert_eq!(response.json()["session"], "s-123");
}

#[tokio::test]
async fn missing_required_sequence_is_400() {
    let api = Api::new();
    Procedure::new().get(&api, "/filter", filter);

    let ctx = TestContext::get("/filter");
    let response = ctx.response_handle();
    api.dispatch("GET", "/filter", Box::new(ctx)).await;

    assert_eq!(response.status(), 400);
    assert_eq!(response.json()["errors"][0]["location"], "query.ids");
}

// ── Raw bodies ───────────────────────────────────────────────────────────────

#[derive(Input)]
struct BlobInput {
    raw_body: Bytes,
}

#[derive(Output)]
struct BlobOut {
    raw_body: Bytes,
}

async fn echo_blob(_cancel: CancellationToken, input: BlobInput) -> Result<BlobOut, ApiError> {
    Ok(BlobOut {
        raw_body: input.raw_body,
    })
}

#[tokio::test]
async fn raw_body_round_trips_byte_identical() {
    let api = Api::new();
    Procedure::new().post(&api, "/blob", echo_blob);

    let payload = Bytes::from_static(b"\x00\x01\xFFnot json");
    let ctx = TestContext::post("/blob").with_body(payload.clone());
    let response = ctx.response_handle();
    api.dispatch("POST", "/blob", Box::new(ctx)).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.body_bytes(), payload);
}

#[derive(Input)]
struct FormInput {
    raw_body: MultipartForm,
}

async fn read_form(_cancel: CancellationToken, mut input: FormInput) -> Result<NoteOut, ApiError> {
    let text = input
        .raw_body
        .take_text("text")
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(NoteOut {
        body: Note { text },
    })
}

#[tokio::test]
async fn multipart_holder_binds_the_parsed_form() {
    let api = Api::new();
    Procedure::new().post(&api, "/form", read_form);

    let form = MultipartForm::new().with_text("text", "hello");
    let ctx = TestContext::post("/form").with_multipart(form);
    let response = ctx.response_handle();
    api.dispatch("POST", "/form", Box::new(ctx)).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.json()["text"], "hello");
}

#[tokio::test]
async fn missing_multipart_body_is_400() {
    let api = Api::new();
    Procedure::new().post(&api, "/form", read_form);

    let ctx = TestContext::post("/form");
    let response = ctx.response_handle();
    api.dispatch("POST", "/form", Box::new(ctx)).await;

    assert_eq!(response.status(), 400);
}

// ── Response headers and status ──────────────────────────────────────────────

#[derive(Output)]
struct HeaderOut {
    status: u16,
    cache_control: Option<String>,
    x_total: u64,
    body: Note,
}

async fn with_headers(_cancel: CancellationToken, _input: ()) -> Result<HeaderOut, ApiError> {
    Ok(HeaderOut {
        status: 0,
        cache_control: Some("no-store".to_string()),
        x_total: 12,
        body: Note {
            text: "ok".to_string(),
        },
    })
}

#[tokio::test]
async fn output_fields_become_train_case_headers() {
    let api = Api::new();
    Procedure::new().get(&api, "/headers", with_headers);

    let ctx = TestContext::get("/headers");
    let response = ctx.response_handle();
    api.dispatch("GET", "/headers", Box::new(ctx)).await;

    assert_eq!(response.header("Cache-Control").as_deref(), Some("no-store"));
    assert_eq!(response.header("X-Total").as_deref(), Some("12"));
}

#[tokio::test]
async fn none_headers_are_omitted() {
    async fn no_cache_header(
        _cancel: CancellationToken,
        _input: (),
    ) -> Result<HeaderOut, ApiError> {
        Ok(HeaderOut {
            status: 0,
            cache_control: None,
            x_total: 0,
            body: Note {
                text: "ok".to_string(),
            },
        })
    }

    let api = Api::new();
    Procedure::new().get(&api, "/headers", no_cache_header);

    let ctx = TestContext::get("/headers");
    let response = ctx.response_handle();
    api.dispatch("GET", "/headers", Box::new(ctx)).await;

    assert_eq!(response.header("Cache-Control"), None);
}

#[derive(Output)]
struct DeletedOut {
    status: u16,
    body: Note,
}

async fn delete_it(_cancel: CancellationToken, _input: ()) -> Result<DeletedOut, ApiError> {
    Ok(DeletedOut {
        status: 204,
        body: Note {
            text: "never sent".to_string(),
        },
    })
}

#[tokio::test]
async fn status_204_suppresses_the_body() {
    let api = Api::new();
    Procedure::new().delete(&api, "/items/{id}", delete_it);

    let ctx = TestContext::delete("/items/9").with_param("id", "9");
    let response = ctx.response_handle();
    api.dispatch("DELETE", "/items/{id}", Box::new(ctx)).await;

    assert_eq!(response.status(), 204);
    assert!(response.body_bytes().is_empty());
}

// ── Explicit content type beats multipart detection ──────────────────────────

#[derive(Serialize, Deserialize, JsonSchema)]
struct FileRef {
    file: String,
}

#[derive(Input)]
struct FileRefInput {
    #[input(body, content_type = "application/json")]
    body: FileRef,
}

async fn file_ref(_cancel: CancellationToken, input: FileRefInput) -> Result<(), ApiError> {
    let _ = input.body.file;
    Ok(())
}

#[tokio::test]
async fn explicit_json_content_type_suppresses_multipart_detection() {
    let api = Api::new();
    Procedure::new().post(&api, "/file-refs", file_ref);

    let document = api.document();
    let op = document.operation("POST", "/file-refs").unwrap();
    let body = op.request_body.as_ref().unwrap();
    assert_eq!(body.content_type, "application/json");
}

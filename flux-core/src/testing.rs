//! In-process test harness: a [`Context`] implementation backed by plain
//! collections, driven without a transport.
//!
//! ```ignore
//! let ctx = TestContext::get("/items").with_query_string("page=2&page_size=10");
//! let response = ctx.response_handle();
//! api.dispatch("GET", "/items", Box::new(ctx)).await;
//! assert_eq!(response.status(), 200);
//! ```

use std::io;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context::{BoxFuture, Context};
use crate::multipart::{MultipartError, MultipartForm};

#[derive(Default)]
struct ResponseRecord {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

/// Shared view of the response a [`TestContext`] accumulates.
///
/// Clone it before handing the context to `Api::dispatch` (which takes
/// the context by value), then assert on status, headers, and body.
#[derive(Clone, Default)]
pub struct ResponseHandle(Arc<Mutex<ResponseRecord>>);

impl ResponseHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, ResponseRecord> {
        self.0.lock().expect("test response lock poisoned")
    }

    /// The response status, `0` while unset.
    pub fn status(&self) -> u16 {
        self.lock().status
    }

    /// The first value of a response header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<String> {
        self.lock()
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    /// All values of a response header (case-insensitive).
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.lock()
            .headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// The response body bytes.
    pub fn body_bytes(&self) -> Bytes {
        Bytes::from(self.lock().body.clone())
    }

    /// The response body as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.lock().body).into_owned()
    }

    /// The response body parsed as JSON.
    ///
    /// # Panics
    ///
    /// Panics when the body is not valid JSON — test helper.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.lock().body).expect("response body is not valid JSON")
    }
}

/// An in-memory [`Context`] for driving dispatchers in tests.
///
/// Request state is set builder-style; the response side is observed
/// through a [`ResponseHandle`].
pub struct TestContext {
    method: String,
    path: String,
    params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    body: Bytes,
    multipart: Option<MultipartForm>,
    cancel: CancellationToken,
    response: ResponseHandle,
}

impl TestContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
            params: Vec::new(),
            query: Vec::new(),
            headers: Vec::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
            multipart: None,
            cancel: CancellationToken::new(),
            response: ResponseHandle::default(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: &str) -> Self {
        Self::new("POST", path)
    }

    pub fn put(path: &str) -> Self {
        Self::new("PUT", path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new("DELETE", path)
    }

    /// Set a path parameter, as the adapter's router would.
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    /// Set a single query parameter.
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Parse a raw query string (`"page=2&q=a%20b"`).
    pub fn with_query_string(mut self, raw: &str) -> Self {
        self.query.extend(
            form_urlencoded::parse(raw.as_bytes())
                .map(|(key, value)| (key.into_owned(), value.into_owned())),
        );
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the raw request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON request body (and the `Content-Type` header).
    pub fn with_json(self, body: &impl Serialize) -> Self {
        let bytes = serde_json::to_vec(body).expect("test body serialization failed");
        self.with_header("Content-Type", "application/json")
            .with_body(bytes)
    }

    /// Attach a multipart form (and the `Content-Type` header).
    pub fn with_multipart(mut self, form: MultipartForm) -> Self {
        self.multipart = Some(form);
        self.with_header("Content-Type", "multipart/form-data; boundary=test")
    }

    /// Use a caller-controlled cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The handle for asserting on the response after dispatch.
    pub fn response_handle(&self) -> ResponseHandle {
        self.response.clone()
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

impl Context for TestContext {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }

    fn query(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        lookup(&self.cookies, name)
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn read_body(&mut self) -> BoxFuture<'_, io::Result<Bytes>> {
        let body = self.body.clone();
        Box::pin(async move { Ok(body) })
    }

    fn multipart_form(&mut self) -> BoxFuture<'_, Result<MultipartForm, MultipartError>> {
        let form = self.multipart.clone();
        Box::pin(async move {
            form.ok_or_else(|| {
                MultipartError::Malformed("request body is not multipart/form-data".to_string())
            })
        })
    }

    fn status(&self) -> u16 {
        self.response.status()
    }

    fn set_status(&mut self, status: u16) {
        self.response.lock().status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        let mut record = self.response.lock();
        record.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        record.headers.push((name.to_string(), value.to_string()));
    }

    fn append_header(&mut self, name: &str, value: &str) {
        self.response
            .lock()
            .headers
            .push((name.to_string(), value.to_string()));
    }

    fn write_body(&mut self, chunk: Bytes) -> BoxFuture<'_, io::Result<()>> {
        self.response.lock().body.extend_from_slice(&chunk);
        Box::pin(async { Ok(()) })
    }
}

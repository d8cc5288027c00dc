//! Test harness for Flux applications.
//!
//! Re-exports the in-memory request driver so test suites pull a single
//! dependency:
//!
//! ```ignore
//! use flux_test::{ResponseHandle, TestContext};
//!
//! #[tokio::test]
//! async fn lists_items() {
//!     let api = build_api();
//!     let ctx = TestContext::get("/items").with_query("page", "2");
//!     let response = ctx.response_handle();
//!     api.dispatch("GET", "/items", Box::new(ctx)).await;
//!     assert_eq!(response.status(), 200);
//! }
//! ```

pub use flux::testing::{ResponseHandle, TestContext};

//! OpenAPI 3.1.0 spec assembly for Flux.
//!
//! Registration (`Procedure::register` and friends) collects operations
//! and component schemas into the [`Document`](flux_core::Document)
//! carried by the [`Api`](flux_core::Api); this crate renders that
//! document into a spec JSON value.
//!
//! # Dependencies
//!
//! Add both `flux-openapi` (or `flux` with `features = ["openapi"]`)
//! **and** `schemars` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! flux = { version = "0.1", features = ["openapi"] }
//! schemars = "1"
//! ```
//!
//! `schemars` must be a **direct dependency** because
//! `#[derive(JsonSchema)]` generates code that references the
//! `schemars` crate by name. This is the same pattern as `serde` and
//! other derive-macro crates.
//!
//! # Usage
//!
//! ```ignore
//! use flux_openapi::{build_spec, OpenApiConfig};
//!
//! let spec = build_spec(
//!     &OpenApiConfig::new("My API", "1.0.0"),
//!     &api.document(),
//! );
//! ```

mod builder;

pub use builder::{build_spec, OpenApiConfig};
pub use schemars;

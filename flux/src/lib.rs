//! Flux — a dependency-injection and typed request/response runtime
//! behind an abstract HTTP context, with mechanical OpenAPI synthesis.
//!
//! This facade crate re-exports the Flux sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use flux::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature   | Default | Crate          |
//! |-----------|---------|----------------|
//! | `openapi` | no      | `flux-openapi` |
//! | `full`    | no      | All of the above |

// Re-export sub-crates as public modules so they're accessible as
// `flux::flux_core`, `flux::flux_openapi`, etc.
//
// The proc macros use `proc-macro-crate` to detect whether the user
// depends on `flux` (facade) or individual crates, and generate the
// correct paths.
pub extern crate flux_core;
pub extern crate flux_macros;

// Re-export everything from flux-core at the top level for convenience.
pub use flux_core::*;

#[cfg(feature = "openapi")]
pub use flux_openapi;

/// Unified prelude — import everything with `use flux::prelude::*`.
pub mod prelude {
    pub use flux_core::prelude::*;

    #[cfg(feature = "openapi")]
    pub use flux_openapi::{build_spec, OpenApiConfig};
}

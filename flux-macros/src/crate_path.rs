//! Crate path resolution for generated code.
//!
//! Detects whether the user depends on `flux` (facade) or `flux-core`
//! directly, and returns the appropriate path prefix for generated code.

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;

/// Returns the token stream for accessing `flux_core` types.
///
/// If the user depends on `flux`, returns `::flux`.
/// Otherwise returns `::flux_core`.
pub fn flux_core_path() -> TokenStream {
    // First check if the facade crate is available
    if let Ok(found) = crate_name("flux") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else if let Ok(found) = crate_name("flux-core") {
        match found {
            FoundCrate::Itself => quote!(crate),
            FoundCrate::Name(name) => {
                let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
                quote!(::#ident)
            }
        }
    } else {
        // Fallback - assume flux_core is available (for error messages)
        quote!(::flux_core)
    }
}

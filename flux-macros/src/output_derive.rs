use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type};

use crate::crate_path::flux_core_path;
use crate::types::{last_path_segment, rust_type_to_openapi, unwrap_option_type};

struct HeaderField {
    ident: Ident,
    ty: Type,
    name: String,
}

struct BodyField {
    ident: Ident,
    ty: Type,
    content_type: Option<String>,
}

struct OutputStruct {
    status: Option<Ident>,
    headers: Vec<HeaderField>,
    body: Option<BodyField>,
    raw_body: Option<Ident>,
    raw_body_ty: Option<Type>,
}

/// Parsed `#[output(...)]` attribute content for one field.
#[derive(Default)]
struct FieldAttr {
    status: bool,
    header: Option<Option<String>>,
    body: bool,
    raw_body: bool,
    content_type: Option<String>,
}

fn parse_field_attr(attr: &syn::Attribute) -> syn::Result<FieldAttr> {
    let mut parsed = FieldAttr::default();
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("status") {
            parsed.status = true;
        } else if meta.path.is_ident("header") {
            if meta.input.peek(syn::Token![=]) {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                parsed.header = Some(Some(lit.value()));
            } else {
                parsed.header = Some(None);
            }
        } else if meta.path.is_ident("body") {
            parsed.body = true;
        } else if meta.path.is_ident("raw_body") {
            parsed.raw_body = true;
        } else if meta.path.is_ident("content_type") {
            let value = meta.value()?;
            let lit: LitStr = value.parse()?;
            parsed.content_type = Some(lit.value());
        } else {
            return Err(meta.error(
                "expected `status`, `header`, `body`, `raw_body`, or `content_type`",
            ));
        }
        Ok(())
    })?;
    Ok(parsed)
}

/// Turn a snake_case field name into a Train-Case header name
/// (`cache_control` -> `Cache-Control`).
fn train_case(ident: &str) -> String {
    ident
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

pub fn expand(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand_inner(input) {
        Ok(ts) => ts.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn parse_struct(input: &DeriveInput) -> syn::Result<OutputStruct> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(f) => Some(&f.named),
            Fields::Unit => None,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Output can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Output can only be derived for structs",
            ))
        }
    };

    let mut out = OutputStruct {
        status: None,
        headers: Vec::new(),
        body: None,
        raw_body: None,
        raw_body_ty: None,
    };

    let Some(fields) = fields else {
        return Ok(out);
    };

    for field in fields {
        let ident = field.ident.clone().unwrap();
        let ty = field.ty.clone();

        let mut attr_data = FieldAttr::default();
        let mut has_attr = false;
        for attr in &field.attrs {
            if attr.path().is_ident("output") {
                has_attr = true;
                attr_data = parse_field_attr(attr)?;
            }
        }

        // Un-attributed fields follow their names: `status`, `body`, and
        // `raw_body` mean what they say, everything else is a header.
        if !has_attr {
            if ident == "status" {
                attr_data.status = true;
            } else if ident == "body" {
                attr_data.body = true;
            } else if ident == "raw_body" {
                attr_data.raw_body = true;
            } else {
                attr_data.header = Some(None);
            }
        }

        if attr_data.status {
            if out.status.is_some() {
                return Err(syn::Error::new_spanned(&ident, "duplicate `status` field"));
            }
            out.status = Some(ident);
        } else if attr_data.body {
            if out.body.is_some() || out.raw_body.is_some() {
                return Err(syn::Error::new_spanned(&ident, "duplicate body field"));
            }
            out.body = Some(BodyField {
                ident,
                ty,
                content_type: attr_data.content_type,
            });
        } else if attr_data.raw_body {
            if out.body.is_some() || out.raw_body.is_some() {
                return Err(syn::Error::new_spanned(&ident, "duplicate body field"));
            }
            out.raw_body = Some(ident);
            out.raw_body_ty = Some(ty);
        } else if let Some(custom_name) = attr_data.header {
            let name = custom_name.unwrap_or_else(|| train_case(&ident.to_string()));
            out.headers.push(HeaderField { ident, ty, name });
        }
    }

    Ok(out)
}

fn expand_inner(input: DeriveInput) -> syn::Result<TokenStream> {
    let krate = flux_core_path();
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let parsed = parse_struct(&input)?;

    // ── metadata() ──────────────────────────────────────────────────────

    let has_status = parsed.status.is_some();
    let header_specs: Vec<TokenStream> = parsed
        .headers
        .iter()
        .map(|h| {
            let header_name = &h.name;
            let hint = rust_type_to_openapi(&h.ty);
            quote! {
                #krate::output::HeaderSpec { name: #header_name, type_hint: #hint }
            }
        })
        .collect();

    let body_meta = if let Some(body) = &parsed.body {
        let schema_ty = unwrap_option_type(&body.ty).unwrap_or(&body.ty);
        let type_name = last_path_segment(schema_ty)
            .ok_or_else(|| syn::Error::new_spanned(schema_ty, "unsupported body type"))?;
        let content_type = match &body.content_type {
            Some(ct) => quote! { ::core::option::Option::Some(#ct) },
            None => quote! { ::core::option::Option::None },
        };
        quote! {
            ::core::option::Option::Some(#krate::output::BodySchema {
                type_name: #type_name,
                raw: false,
                content_type: #content_type,
                schema: ::core::option::Option::Some(|| {
                    let __schema = #krate::schemars::schema_for!(#schema_ty);
                    #krate::serde_json::to_value(__schema)
                        .unwrap_or_else(|_| #krate::serde_json::json!({ "type": "object" }))
                }),
            })
        }
    } else if parsed.raw_body.is_some() {
        let type_name = parsed
            .raw_body_ty
            .as_ref()
            .and_then(last_path_segment)
            .unwrap_or_else(|| "Bytes".to_string());
        quote! {
            ::core::option::Option::Some(#krate::output::BodySchema {
                type_name: #type_name,
                raw: true,
                content_type: ::core::option::Option::None,
                schema: ::core::option::Option::None,
            })
        }
    } else {
        quote! { ::core::option::Option::None }
    };

    // ── write() ─────────────────────────────────────────────────────────

    let status_expr = match &parsed.status {
        Some(ident) => quote! { self.#ident as u16 },
        None => quote! { 0u16 },
    };

    let header_stmts: Vec<TokenStream> = parsed
        .headers
        .iter()
        .map(|h| {
            let ident = &h.ident;
            let header_name = &h.name;
            if h.name.eq_ignore_ascii_case("content-type") {
                // A Content-Type field overrides negotiation; the body
                // writer emits the header itself.
                quote! {
                    if let ::core::option::Option::Some(__value) =
                        self.#ident.into_header_value()
                    {
                        __content_type = ::core::option::Option::Some(__value);
                    }
                }
            } else {
                quote! {
                    if let ::core::option::Option::Some(__value) =
                        self.#ident.into_header_value()
                    {
                        _ctx.set_header(#header_name, &__value);
                    }
                }
            }
        })
        .collect();

    let initial_content_type = match parsed.body.as_ref().and_then(|b| b.content_type.as_ref()) {
        Some(ct) => quote! { ::core::option::Option::Some(::std::string::String::from(#ct)) },
        None => quote! { ::core::option::Option::None },
    };

    let body_stmt = if let Some(body) = &parsed.body {
        let ident = &body.ident;
        quote! {
            #krate::output::write_serialized(_api, _ctx, __status, __content_type, &self.#ident).await
        }
    } else if let Some(ident) = &parsed.raw_body {
        quote! {
            if let ::core::option::Option::Some(__ct) = __content_type {
                _ctx.set_header("Content-Type", &__ct);
            }
            #krate::output::write_raw(_ctx, __status, self.#ident).await
        }
    } else {
        quote! {
            let _ = __content_type;
            _ctx.set_status(__status);
            ::core::result::Result::Ok(())
        }
    };

    Ok(quote! {
        const _: () = {
            impl #impl_generics #krate::output::Output for #name #ty_generics #where_clause {
                fn metadata() -> #krate::output::OutputMeta {
                    const HEADERS: &[#krate::output::HeaderSpec] = &[#(#header_specs),*];
                    #krate::output::OutputMeta {
                        has_status: #has_status,
                        headers: HEADERS,
                        body: #body_meta,
                    }
                }

                #[allow(unused_mut, unused_variables)]
                async fn write(
                    self,
                    _api: &#krate::Api,
                    _ctx: &mut dyn #krate::Context,
                    default_status: u16,
                ) -> ::core::result::Result<(), #krate::output::WriteError> {
                    use #krate::output::IntoHeaderValue as _;
                    if _ctx.status() != 0 {
                        return ::core::result::Result::Ok(());
                    }
                    let __status = #krate::output::resolve_status(#status_expr, default_status);
                    let mut __content_type: ::core::option::Option<::std::string::String> =
                        #initial_content_type;
                    #(#header_stmts)*
                    #body_stmt
                }
            }
        };
    })
}

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type};

use crate::crate_path::flux_core_path;
use crate::types::{last_path_segment, rust_type_to_openapi, unwrap_option_type, unwrap_vec_type};

enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    fn tokens(&self, krate: &TokenStream) -> TokenStream {
        match self {
            ParamLocation::Path => quote! { #krate::input::Location::Path },
            ParamLocation::Query => quote! { #krate::input::Location::Query },
            ParamLocation::Header => quote! { #krate::input::Location::Header },
            ParamLocation::Cookie => quote! { #krate::input::Location::Cookie },
        }
    }
}

struct ParamField {
    ident: Ident,
    ty: Type,
    name: String,
    location: ParamLocation,
    default: Option<String>,
}

struct BodyField {
    ident: Ident,
    ty: Type,
    content_type: Option<String>,
}

struct RawBodyField {
    ident: Ident,
    ty: Type,
}

enum ParsedField {
    Param(ParamField),
    Body(BodyField),
    RawBody(RawBodyField),
}

impl ParsedField {
    fn ident(&self) -> &Ident {
        match self {
            ParsedField::Param(f) => &f.ident,
            ParsedField::Body(f) => &f.ident,
            ParsedField::RawBody(f) => &f.ident,
        }
    }
}

pub fn expand(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand_inner(input) {
        Ok(ts) => ts.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parsed `#[input(...)]` attribute content for one field.
#[derive(Default)]
struct FieldAttr {
    location: Option<(ParamLocation, Option<String>)>,
    default: Option<String>,
    body: bool,
    raw_body: bool,
    content_type: Option<String>,
}

fn parse_field_attr(attr: &syn::Attribute) -> syn::Result<FieldAttr> {
    let mut parsed = FieldAttr::default();

    attr.parse_nested_meta(|meta| {
        let name_value = |meta: &syn::meta::ParseNestedMeta| -> syn::Result<Option<String>> {
            if meta.input.peek(syn::Token![=]) {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                Ok(Some(lit.value()))
            } else {
                Ok(None)
            }
        };

        if meta.path.is_ident("path") {
            parsed.location = Some((ParamLocation::Path, name_value(&meta)?));
        } else if meta.path.is_ident("query") {
            parsed.location = Some((ParamLocation::Query, name_value(&meta)?));
        } else if meta.path.is_ident("header") {
            parsed.location = Some((ParamLocation::Header, name_value(&meta)?));
        } else if meta.path.is_ident("cookie") {
            parsed.location = Some((ParamLocation::Cookie, name_value(&meta)?));
        } else if meta.path.is_ident("default") {
            let value = meta.value()?;
            let lit: LitStr = value.parse()?;
            parsed.default = Some(lit.value());
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
                "expected `path`, `query`, `header`, `cookie`, `default`, \
                 `body`, `raw_body`, or `content_type`",
            ));
        }
        Ok(())
    })?;

    Ok(parsed)
}

fn classify_field(field: &syn::Field) -> syn::Result<ParsedField> {
    let ident = field.ident.clone().unwrap();
    let ty = field.ty.clone();

    let mut attr_data = FieldAttr::default();
    let mut has_attr = false;
    for attr in &field.attrs {
        if attr.path().is_ident("input") {
            has_attr = true;
            attr_data = parse_field_attr(attr)?;
        }
    }

    // Un-attributed fields named `body`/`raw_body` keep their obvious
    // meaning; anything else must say where it comes from.
    if !has_attr {
        if ident == "body" {
            attr_data.body = true;
        } else if ident == "raw_body" {
            attr_data.raw_body = true;
        } else {
            return Err(syn::Error::new_spanned(
                &ident,
                "field needs an #[input(...)] attribute \
                 (path, query, header, cookie, body, or raw_body)",
            ));
        }
    }

    if attr_data.body && attr_data.raw_body {
        return Err(syn::Error::new_spanned(
            &ident,
            "a field cannot be both `body` and `raw_body`",
        ));
    }

    if attr_data.body {
        return Ok(ParsedField::Body(BodyField {
            ident,
            ty,
            content_type: attr_data.content_type,
        }));
    }
    if attr_data.raw_body {
        return Ok(ParsedField::RawBody(RawBodyField { ident, ty }));
    }

    match attr_data.location {
        Some((location, custom_name)) => Ok(ParsedField::Param(ParamField {
            name: custom_name.unwrap_or_else(|| ident.to_string()),
            ident,
            ty,
            location,
            default: attr_data.default,
        })),
        None => Err(syn::Error::new_spanned(
            &ident,
            "field needs a location: #[input(path | query | header | cookie)]",
        )),
    }
}

fn expand_inner(input: DeriveInput) -> syn::Result<TokenStream> {
    let krate = flux_core_path();
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(f) => &f.named,
            Fields::Unit => {
                return expand_unit(&krate, &input);
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Input can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Input can only be derived for structs",
            ))
        }
    };

    let mut parsed_fields = Vec::new();
    for field in fields {
        parsed_fields.push(classify_field(field)?);
    }

    let body_count = parsed_fields
        .iter()
        .filter(|f| matches!(f, ParsedField::Body(_) | ParsedField::RawBody(_)))
        .count();
    if body_count > 1 {
        return Err(syn::Error::new_spanned(
            name,
            "an input struct can have at most one `body` or `raw_body` field",
        ));
    }

    let param_fields: Vec<&ParamField> = parsed_fields
        .iter()
        .filter_map(|f| match f {
            ParsedField::Param(p) => Some(p),
            _ => None,
        })
        .collect();

    let binding_items: Vec<TokenStream> = param_fields
        .iter()
        .map(|f| generate_binding(f, &krate))
        .collect();

    let body_fn = generate_body_fn(&parsed_fields, &krate)?;

    let field_constructions: Vec<TokenStream> = parsed_fields
        .iter()
        .map(|f| generate_field_construction(f, &krate))
        .collect::<syn::Result<_>>()?;

    let all_idents: Vec<&Ident> = parsed_fields.iter().map(ParsedField::ident).collect();

    Ok(quote! {
        const _: () = {
            impl #impl_generics #krate::input::Input for #name #ty_generics #where_clause {
                fn bindings() -> &'static [#krate::input::Binding] {
                    const BINDINGS: &[#krate::input::Binding] = &[#(#binding_items),*];
                    BINDINGS
                }

                #body_fn

                async fn from_request(
                    _api: &#krate::Api,
                    _ctx: &mut dyn #krate::Context,
                ) -> ::core::result::Result<Self, #krate::input::InputError> {
                    #(#field_constructions)*
                    ::core::result::Result::Ok(Self {
                        #(#all_idents,)*
                    })
                }
            }
        };
    })
}

/// Unit structs are inputs with no parameters and no body.
fn expand_unit(krate: &TokenStream, input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    Ok(quote! {
        const _: () = {
            impl #krate::input::Input for #name {
                async fn from_request(
                    _api: &#krate::Api,
                    _ctx: &mut dyn #krate::Context,
                ) -> ::core::result::Result<Self, #krate::input::InputError> {
                    ::core::result::Result::Ok(Self)
                }
            }
        };
    })
}

fn generate_binding(field: &ParamField, krate: &TokenStream) -> TokenStream {
    let name = &field.name;
    let location = field.location.tokens(krate);
    let is_optional = unwrap_option_type(&field.ty).is_some();
    let required = !is_optional && field.default.is_none();
    let default = match &field.default {
        Some(value) => quote! { ::core::option::Option::Some(#value) },
        None => quote! { ::core::option::Option::None },
    };
    let inner = unwrap_option_type(&field.ty).unwrap_or(&field.ty);
    let (type_hint, item_hint) = match unwrap_vec_type(inner) {
        Some(item) => {
            let item_str = rust_type_to_openapi(item);
            ("array", quote! { ::core::option::Option::Some(#item_str) })
        }
        None => (rust_type_to_openapi(inner), quote! { ::core::option::Option::None }),
    };

    quote! {
        #krate::input::Binding {
            name: #name,
            location: #location,
            required: #required,
            default: #default,
            type_hint: #type_hint,
            item_hint: #item_hint,
        }
    }
}

fn generate_body_fn(fields: &[ParsedField], krate: &TokenStream) -> syn::Result<TokenStream> {
    for field in fields {
        match field {
            ParsedField::Body(body) => {
                let is_optional = unwrap_option_type(&body.ty).is_some();
                let required = !is_optional;
                let schema_ty = unwrap_option_type(&body.ty).unwrap_or(&body.ty);
                let type_name = last_path_segment(schema_ty).ok_or_else(|| {
                    syn::Error::new_spanned(schema_ty, "unsupported body type")
                })?;
                let content_type = match &body.content_type {
                    Some(ct) => quote! { ::core::option::Option::Some(#ct) },
                    None => quote! { ::core::option::Option::None },
                };
                return Ok(quote! {
                    fn body() -> ::core::option::Option<#krate::input::BodySpec> {
                        ::core::option::Option::Some(#krate::input::BodySpec {
                            kind: #krate::input::BodyKind::Typed,
                            content_type: #content_type,
                            required: #required,
                            type_name: #type_name,
                            schema: ::core::option::Option::Some(|| {
                                let __schema = #krate::schemars::schema_for!(#schema_ty);
                                #krate::serde_json::to_value(__schema)
                                    .unwrap_or_else(|_| #krate::serde_json::json!({ "type": "object" }))
                            }),
                        })
                    }
                });
            }
            ParsedField::RawBody(raw) => {
                let ty = &raw.ty;
                let type_name = last_path_segment(ty).unwrap_or_else(|| "RawBody".to_string());
                return Ok(quote! {
                    fn body() -> ::core::option::Option<#krate::input::BodySpec> {
                        ::core::option::Option::Some(#krate::input::BodySpec {
                            kind: #krate::input::BodyKind::Raw,
                            content_type: ::core::option::Option::Some(
                                <#ty as #krate::input::RawBody>::content_type(),
                            ),
                            required: true,
                            type_name: #type_name,
                            schema: ::core::option::Option::None,
                        })
                    }
                });
            }
            ParsedField::Param(_) => {}
        }
    }
    Ok(TokenStream::new())
}

fn generate_field_construction(
    field: &ParsedField,
    krate: &TokenStream,
) -> syn::Result<TokenStream> {
    match field {
        ParsedField::Param(param) => {
            let ident = &param.ident;
            let name = &param.name;
            let location = param.location.tokens(krate);
            let accessor = match param.location {
                ParamLocation::Path => quote! { param },
                ParamLocation::Query => quote! { query },
                ParamLocation::Header => quote! { header },
                ParamLocation::Cookie => quote! { cookie },
            };
            let default = match &param.default {
                Some(value) => quote! { ::core::option::Option::Some(#value) },
                None => quote! { ::core::option::Option::None },
            };
            match unwrap_option_type(&param.ty) {
                Some(inner) => Ok(quote! {
                    let #ident: ::core::option::Option<#inner> = #krate::input::optional::<#inner>(
                        _ctx.#accessor(#name),
                        #default,
                        #name,
                        #location,
                    )?;
                }),
                None => {
                    let ty = &param.ty;
                    Ok(quote! {
                        let #ident: #ty = #krate::input::require::<#ty>(
                            _ctx.#accessor(#name),
                            #default,
                            #name,
                            #location,
                        )?;
                    })
                }
            }
        }
        ParsedField::Body(body) => {
            let ident = &body.ident;
            let decode = match unwrap_option_type(&body.ty) {
                Some(inner) => quote! {
                    #krate::input::decode_body_opt::<#inner>(_api, &__content_type, __bytes)?
                },
                None => {
                    let ty = &body.ty;
                    quote! { #krate::input::decode_body::<#ty>(_api, &__content_type, __bytes)? }
                }
            };
            Ok(quote! {
                let #ident = {
                    let __content_type = _ctx
                        .header("Content-Type")
                        .map(::std::string::ToString::to_string)
                        .unwrap_or_default();
                    let __bytes = #krate::input::read_body_bytes(_ctx).await?;
                    #decode
                };
            })
        }
        ParsedField::RawBody(raw) => {
            let ident = &raw.ident;
            let ty = &raw.ty;
            Ok(quote! {
                let #ident = <#ty as #krate::input::RawBody>::from_context(_ctx).await?;
            })
        }
    }
}

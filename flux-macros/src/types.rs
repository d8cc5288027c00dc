//! Shared type-inspection helpers for the derives.

use syn::{PathSegment, Type};

/// Extract the last segment name from a type path (e.g. `Option` from
/// `std::option::Option<T>`).
pub fn last_path_segment(ty: &Type) -> Option<String> {
    if let Type::Path(type_path) = ty {
        type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string())
    } else {
        None
    }
}

/// Extract the first generic argument from a type (e.g. `T` from
/// `Option<T>` or `Vec<T>`).
fn first_generic_arg(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        let seg: &PathSegment = type_path.path.segments.last()?;
        if let syn::PathArguments::AngleBracketed(args) = &seg.arguments {
            if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                return Some(inner);
            }
        }
    }
    None
}

/// `Some(T)` for `Option<T>`.
pub fn unwrap_option_type(ty: &Type) -> Option<&Type> {
    if last_path_segment(ty).as_deref() == Some("Option") {
        first_generic_arg(ty)
    } else {
        None
    }
}

/// `Some(T)` for `Vec<T>`.
pub fn unwrap_vec_type(ty: &Type) -> Option<&Type> {
    if last_path_segment(ty).as_deref() == Some("Vec") {
        first_generic_arg(ty)
    } else {
        None
    }
}

/// Map a Rust type to an OpenAPI type string.
pub fn rust_type_to_openapi(ty: &Type) -> &'static str {
    let inner = unwrap_option_type(ty).unwrap_or(ty);
    if last_path_segment(inner).as_deref() == Some("Vec") {
        return "array";
    }
    if let Some(segment) = last_path_segment(inner) {
        return match segment.as_str() {
            "String" | "str" => "string",
            "u8" | "u16" | "u32" | "u64" | "usize" | "i8" | "i16" | "i32" | "i64" | "isize" => {
                "integer"
            }
            "f32" | "f64" => "number",
            "bool" => "boolean",
            _ => "string",
        };
    }
    "string"
}

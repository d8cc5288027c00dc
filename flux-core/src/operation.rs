use std::collections::BTreeMap;

use serde_json::Value;

use crate::input::Location;
use crate::middleware::Middleware;
use crate::schema;

/// A security requirement: scheme name to required scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityRequirement(pub BTreeMap<String, Vec<String>>);

impl SecurityRequirement {
    /// A single-scheme requirement, e.g. `SecurityRequirement::new("bearer", &[])`.
    pub fn new(scheme: &str, scopes: &[&str]) -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            scheme.to_string(),
            scopes.iter().map(|s| s.to_string()).collect(),
        );
        Self(map)
    }
}

/// One OpenAPI parameter synthesized from a binding table.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: Location,
    pub required: bool,
    pub schema: Value,
}

/// The request body of an operation.
#[derive(Debug, Clone)]
pub struct RequestBody {
    pub content_type: String,
    pub required: bool,
    pub schema: Value,
}

/// One response of an operation.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub description: String,
    /// `None` for bodyless responses (204, 304).
    pub content_type: Option<String>,
    pub schema: Option<Value>,
    /// Declared response headers, name to schema.
    pub headers: BTreeMap<String, Value>,
}

impl ResponseSpec {
    /// A description-only response.
    pub fn empty(description: &str) -> Self {
        Self {
            description: description.to_string(),
            content_type: None,
            schema: None,
            headers: BTreeMap::new(),
        }
    }
}

/// The description of a single `(method, path)` endpoint: identity,
/// documentation, synthesized schema artifacts, middleware, and
/// security.
///
/// Built by the user (method, path, documentation, overrides), completed
/// by the registration pipeline (parameters, request body, responses,
/// middleware chain).
#[derive(Debug, Clone)]
pub struct Operation {
    pub method: String,
    pub path: String,
    /// Empty until registration; auto-generated unless set explicitly.
    pub operation_id: String,
    /// Whether `operation_id` was auto-generated (so later customization
    /// may override it).
    pub auto_operation_id: bool,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Success status; `0` means "use 200".
    pub default_status: u16,
    /// Hidden operations are dispatchable but never documented.
    pub hidden: bool,
    /// When `false`, the standard 400/422/500 (+401/403) responses are
    /// replaced by a single generic `default` error response.
    pub standard_errors: bool,
    pub security: Vec<SecurityRequirement>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status string (`"200"`, `"404"`, `"default"`).
    pub responses: BTreeMap<String, ResponseSpec>,
    pub(crate) middleware: Vec<Middleware>,
}

impl Operation {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
            operation_id: String::new(),
            auto_operation_id: false,
            summary: None,
            description: None,
            tags: Vec::new(),
            default_status: 0,
            hidden: false,
            standard_errors: true,
            security: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
            responses: BTreeMap::new(),
            middleware: Vec::new(),
        }
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Override the auto-generated operation id.
    pub fn operation_id(mut self, id: &str) -> Self {
        self.operation_id = id.to_string();
        self.auto_operation_id = false;
        self
    }

    /// Set the success status (e.g. 201 for creations, 204 for deletes).
    pub fn default_status(mut self, status: u16) -> Self {
        self.default_status = status;
        self
    }

    /// Dispatchable but absent from the OpenAPI document.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Replace the standard error responses with a single generic
    /// `default` error response.
    pub fn without_standard_errors(mut self) -> Self {
        self.standard_errors = false;
        self
    }

    /// Attach an operation-level security requirement.
    pub fn security(mut self, requirement: SecurityRequirement) -> Self {
        self.security.push(requirement);
        self
    }

    /// Declare a `multipart/form-data` request body from the shorthand
    /// grammar `"field:type:modifier,..."` (types `string | binary |
    /// integer | boolean | array`; modifiers `required`, `enum:a|b|c`).
    ///
    /// # Panics
    ///
    /// Panics at registration time on an invalid shorthand string.
    pub fn form_body(mut self, shorthand: &str) -> Self {
        let schema = schema::parse_form_schema(shorthand)
            .unwrap_or_else(|e| panic!("invalid form schema for {} {}: {e}", self.method, self.path));
        self.request_body = Some(RequestBody {
            content_type: "multipart/form-data".to_string(),
            required: true,
            schema,
        });
        self
    }
}

// ── Operation ids ────────────────────────────────────────────────────────────

/// Uppercase the first letter of a word, leaving the rest as-is.
fn pascal_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// PascalCase an identifier-ish string: split on `-`, `_`, `.`, and
/// space, PascalCase each word, concatenate.
pub fn pascal_words(raw: &str) -> String {
    raw.split(['-', '_', '.', ' '])
        .filter(|word| !word.is_empty())
        .map(pascal_word)
        .collect()
}

/// Sanitize an operation id for TypeScript type generation: split on
/// `- _ .` and space, PascalCase each word, concatenate.
pub fn sanitize_operation_id(id: &str) -> String {
    pascal_words(id)
}

/// The short name of a Rust type: the last path segment, generics
/// stripped.
pub fn short_type_name(full: &str) -> &str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}

/// Deterministic operation id from `(method, path, output type)`.
///
/// `POST /users/{id}/items` returning `Item` becomes
/// `createUsersByIdItemsItem`. Invariant across runs: the inputs are
/// the only source of entropy.
pub fn generate_operation_id(method: &str, path: &str, output_type: &str) -> String {
    let verb = match method.to_uppercase().as_str() {
        "GET" => "get",
        "POST" => "create",
        "PUT" => "update",
        "PATCH" => "patch",
        "DELETE" => "delete",
        "HEAD" => "head",
        "OPTIONS" => "options",
        other => return format!("{}{}", other.to_lowercase(), path_words(path, output_type)),
    };
    format!("{verb}{}", path_words(path, output_type))
}

fn path_words(path: &str, output_type: &str) -> String {
    let mut out = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(param) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            out.push_str("By");
            out.push_str(&pascal_words(param));
        } else {
            out.push_str(&pascal_words(segment));
        }
    }
    let short = short_type_name(output_type);
    if short != "()" {
        out.push_str(&pascal_words(short));
    }
    out
}

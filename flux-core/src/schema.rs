use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::dependency::ErasedDependency;
use crate::error::ErrorModel;
use crate::input::{Binding, BodyKind, Input, Location};
use crate::operation::{short_type_name, Operation, Parameter, RequestBody, ResponseSpec};
use crate::output::Output;

// ── Schemars post-processing ─────────────────────────────────────────────────

/// Recursively rewrite `$ref` paths from schemars format to OpenAPI
/// components format.
///
/// schemars 1.x generates JSON Schema Draft 2020-12 using `$defs` and
/// `$ref: "#/$defs/X"`. OpenAPI 3.1.0 expects schemas under
/// `#/components/schemas/X`.
pub fn sanitize_schema(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(ref_str)) = obj.get_mut("$ref") {
                if ref_str.starts_with("#/$defs/") {
                    *ref_str = ref_str.replace("#/$defs/", "#/components/schemas/");
                }
            }
            for (_, v) in obj.iter_mut() {
                sanitize_schema(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                sanitize_schema(v);
            }
        }
        _ => {}
    }
}

/// Split a schemars root schema into the sanitized root plus its
/// promoted `$defs`, ready for `components/schemas`.
fn split_root_schema(mut root: Value) -> (Value, Vec<(String, Value)>) {
    let mut definitions = Vec::new();
    if let Some(obj) = root.as_object_mut() {
        obj.remove("$schema");
        if let Some(Value::Object(defs)) = obj.remove("$defs") {
            for (name, mut schema) in defs {
                sanitize_schema(&mut schema);
                definitions.push((name, schema));
            }
        }
    }
    sanitize_schema(&mut root);
    (root, definitions)
}

// ── Multipart detection ──────────────────────────────────────────────────────

/// Marker type for a binary upload field inside a typed body struct.
///
/// Its schema is `{type: string, format: binary}`, which switches the
/// request body to `multipart/form-data` whatever the field is called.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Upload(pub String);

impl schemars::JsonSchema for Upload {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "Upload".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({ "type": "string", "format": "binary" })
    }
}

/// Field names that, combined with a string type, mark a body as an
/// upload. Byte-buffer fields are binary regardless of name.
const UPLOAD_FIELD_NAMES: &[&str] = &[
    "file", "upload", "attachment", "image", "avatar", "logo", "document", "photo", "video",
    "audio", "media", "csv", "pdf", "zip", "archive", "backup",
];

/// Resolve a property schema through a local `#/$defs/` reference.
fn resolve<'a>(root: &'a Value, prop: &'a Value) -> &'a Value {
    if let Some(Value::String(reference)) = prop.get("$ref") {
        if let Some(name) = reference.strip_prefix("#/$defs/") {
            if let Some(resolved) = root.get("$defs").and_then(|defs| defs.get(name)) {
                return resolved;
            }
        }
    }
    prop
}

fn is_byte_array(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("array")
        && schema
            .get("items")
            .and_then(|items| items.get("type"))
            .and_then(Value::as_str)
            == Some("integer")
}

/// Whether a single property denotes binary content.
fn is_binary_property(root: &Value, name: &str, prop: &Value) -> bool {
    let prop = resolve(root, prop);

    if prop.get("format").and_then(Value::as_str) == Some("binary") {
        return true;
    }

    if let Some(media_type) = prop.get("contentMediaType").and_then(Value::as_str) {
        let is_textual = media_type.starts_with("text/")
            || media_type == "application/json"
            || media_type.ends_with("+json")
            || media_type == "application/xml"
            || media_type.ends_with("+xml");
        if !is_textual {
            return true;
        }
    }

    // Byte buffers are binary whatever the field is called.
    if is_byte_array(prop) {
        return true;
    }

    if UPLOAD_FIELD_NAMES.contains(&name.to_lowercase().as_str())
        && prop.get("type").and_then(Value::as_str) == Some("string")
    {
        return true;
    }

    false
}

/// Whether a body schema indicates a `multipart/form-data` upload.
///
/// Fires when any property denotes binary content. Never consulted when
/// the body carries an explicit content type.
pub fn is_multipart_body(schema: &Value) -> bool {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return false;
    };
    properties
        .iter()
        .any(|(name, prop)| is_binary_property(schema, name, prop))
}

/// Flatten a body schema into the multipart form grammar: every
/// property becomes `{type, format?, description?}`, `required` follows
/// the schema's required list.
pub fn multipart_schema(schema: &Value) -> Value {
    let mut properties = Map::new();
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (name, prop) in props {
            let resolved = resolve(schema, prop);
            let mut field = Map::new();
            if is_binary_property(schema, name, prop) {
                field.insert("type".into(), json!("string"));
                field.insert("format".into(), json!("binary"));
            } else {
                let type_str = resolved
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("string");
                field.insert("type".into(), json!(type_str));
                if let Some(format) = resolved.get("format").and_then(Value::as_str) {
                    field.insert("format".into(), json!(format));
                }
            }
            if let Some(description) = resolved.get("description").and_then(Value::as_str) {
                field.insert("description".into(), json!(description));
            }
            properties.insert(name.clone(), Value::Object(field));
        }
    }

    let mut out = Map::new();
    out.insert("type".into(), json!("object"));
    out.insert("properties".into(), Value::Object(properties));
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        if !required.is_empty() {
            out.insert("required".into(), Value::Array(required.clone()));
        }
    }
    Value::Object(out)
}

// ── Shorthand form grammar ───────────────────────────────────────────────────

/// An invalid shorthand form-schema string.
#[derive(Debug)]
pub struct FormSchemaError(String);

impl std::fmt::Display for FormSchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FormSchemaError {}

const FORM_FIELD_TYPES: &[&str] = &["string", "binary", "integer", "boolean", "array"];

/// Parse the shorthand multipart schema grammar
/// `"field:type:modifier,..."` into a form schema.
///
/// Types: `string | binary | integer | boolean | array`.
/// Modifiers: `required`, `enum:v1|v2|v3`.
pub fn parse_form_schema(shorthand: &str) -> Result<Value, FormSchemaError> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for entry in shorthand.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut tokens = entry.split(':');
        let name = tokens
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FormSchemaError(format!("empty field name in '{entry}'")))?;
        let field_type = tokens.next().unwrap_or("string");
        if !FORM_FIELD_TYPES.contains(&field_type) {
            return Err(FormSchemaError(format!(
                "unknown field type '{field_type}' for '{name}' (expected one of {})",
                FORM_FIELD_TYPES.join(", ")
            )));
        }

        let mut field = match field_type {
            "binary" => json!({"type": "string", "format": "binary"}),
            "array" => json!({"type": "array", "items": {"type": "string"}}),
            other => json!({"type": other}),
        };

        while let Some(modifier) = tokens.next() {
            match modifier {
                "required" => required.push(json!(name)),
                "enum" => {
                    let values = tokens.next().ok_or_else(|| {
                        FormSchemaError(format!("enum modifier for '{name}' is missing values"))
                    })?;
                    let variants: Vec<Value> =
                        values.split('|').map(|v| json!(v)).collect();
                    field["enum"] = Value::Array(variants);
                }
                other => {
                    return Err(FormSchemaError(format!(
                        "unknown modifier '{other}' for '{name}'"
                    )))
                }
            }
        }

        properties.insert(name.to_string(), field);
    }

    let mut out = Map::new();
    out.insert("type".into(), json!("object"));
    out.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        out.insert("required".into(), Value::Array(required));
    }
    Ok(Value::Object(out))
}

// ── Per-operation synthesis ──────────────────────────────────────────────────

fn parameter_schema(binding: &Binding) -> Value {
    if binding.type_hint == "array" {
        json!({
            "type": "array",
            "items": { "type": binding.item_hint.unwrap_or("string") }
        })
    } else {
        json!({ "type": binding.type_hint })
    }
}

fn push_parameters(op: &mut Operation, bindings: &[Binding]) {
    for binding in bindings {
        let exists = op
            .parameters
            .iter()
            .any(|p| p.name == binding.name && p.location == binding.location);
        if exists {
            continue;
        }
        op.parameters.push(Parameter {
            name: binding.name.to_string(),
            location: binding.location,
            required: binding.required || binding.location == Location::Path,
            schema: parameter_schema(binding),
        });
    }
}

fn success_description(status: u16) -> &'static str {
    match status {
        201 => "Created",
        204 => "No content",
        _ => "Successful response",
    }
}

fn component_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn error_model_components(components: &mut Vec<(String, Value)>) {
    let root = serde_json::to_value(schemars::schema_for!(ErrorModel))
        .unwrap_or_else(|_| json!({ "type": "object" }));
    let (schema, defs) = split_root_schema(root);
    components.push(("ErrorModel".to_string(), schema));
    components.extend(defs);
}

/// Synthesize parameters, request body, and responses for an operation,
/// returning the component schemas it references.
///
/// Runs once per registration; purely CPU-bound.
pub(crate) fn apply<I: Input, O: Output>(
    op: &mut Operation,
    deps: &[Arc<dyn ErasedDependency>],
) -> Vec<(String, Value)> {
    let mut components = Vec::new();

    // Parameters: the input's bindings, then every dependency sub-input.
    push_parameters(op, I::bindings());
    for dep in deps {
        push_parameters(op, dep.sub_bindings());
    }

    // Request body, unless a customizer already installed one.
    if op.request_body.is_none() {
        if let Some(spec) = I::body() {
            op.request_body = Some(match spec.kind {
                BodyKind::Raw => {
                    let content_type = spec.content_type.unwrap_or("application/octet-stream");
                    let schema = if content_type == "multipart/form-data" {
                        json!({ "type": "object" })
                    } else {
                        json!({ "type": "string", "format": "binary" })
                    };
                    RequestBody {
                        content_type: content_type.to_string(),
                        required: spec.required,
                        schema,
                    }
                }
                BodyKind::Typed => {
                    let root = spec
                        .schema
                        .map(|thunk| thunk())
                        .unwrap_or_else(|| json!({ "type": "object" }));
                    match spec.content_type {
                        Some(explicit) => {
                            let schema = if explicit == "multipart/form-data" {
                                multipart_schema(&root)
                            } else {
                                let (schema, defs) = split_root_schema(root);
                                components.push((spec.type_name.to_string(), schema));
                                components.extend(defs);
                                component_ref(spec.type_name)
                            };
                            RequestBody {
                                content_type: explicit.to_string(),
                                required: spec.required,
                                schema,
                            }
                        }
                        None if is_multipart_body(&root) => RequestBody {
                            content_type: "multipart/form-data".to_string(),
                            required: spec.required,
                            schema: multipart_schema(&root),
                        },
                        None => {
                            let (schema, defs) = split_root_schema(root);
                            components.push((spec.type_name.to_string(), schema));
                            components.extend(defs);
                            RequestBody {
                                content_type: "application/json".to_string(),
                                required: spec.required,
                                schema: component_ref(spec.type_name),
                            }
                        }
                    }
                }
            });
        }
    }

    // Success response at the operation's default status.
    let status = if op.default_status == 0 { 200 } else { op.default_status };
    let status_key = status.to_string();
    if !op.responses.contains_key(&status_key) {
        let meta = O::metadata();
        let mut response = ResponseSpec::empty(success_description(status));
        for header in meta.headers {
            response
                .headers
                .insert(header.name.to_string(), json!({ "type": header.type_hint }));
        }
        if status != 204 && status != 304 {
            if let Some(body) = meta.body {
                if body.raw {
                    response.content_type =
                        Some(body.content_type.unwrap_or("application/octet-stream").to_string());
                    response.schema = Some(json!({ "type": "string", "format": "binary" }));
                } else {
                    let name = short_type_name(body.type_name).to_string();
                    let root = body
                        .schema
                        .map(|thunk| thunk())
                        .unwrap_or_else(|| json!({ "type": "object" }));
                    let (schema, defs) = split_root_schema(root);
                    components.push((name.clone(), schema));
                    components.extend(defs);
                    response.content_type =
                        Some(body.content_type.unwrap_or("application/json").to_string());
                    response.schema = Some(component_ref(&name));
                }
            }
        }
        op.responses.insert(status_key, response);
    }

    // Standard error responses: always 400/422/500, plus 401/403 when
    // the operation declares security.
    error_model_components(&mut components);
    if op.standard_errors {
        let mut statuses = vec![(400u16, "Bad Request"), (422, "Unprocessable Entity"), (500, "Internal Server Error")];
        if !op.security.is_empty() {
            statuses.push((401, "Unauthorized"));
            statuses.push((403, "Forbidden"));
        }
        for (status, description) in statuses {
            op.responses.entry(status.to_string()).or_insert_with(|| ResponseSpec {
                description: description.to_string(),
                content_type: Some("application/json".to_string()),
                schema: Some(component_ref("ErrorModel")),
                headers: Default::default(),
            });
        }
    } else {
        op.responses.entry("default".to_string()).or_insert_with(|| ResponseSpec {
            description: "Error".to_string(),
            content_type: Some("application/json".to_string()),
            schema: Some(component_ref("ErrorModel")),
            headers: Default::default(),
        });
    }

    components
}

use flux_core::{Document, Operation};
use serde_json::{json, Map, Value};

/// Configuration for the generated OpenAPI specification.
pub struct OpenApiConfig {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

impl OpenApiConfig {
    pub fn new(title: &str, version: &str) -> Self {
        Self {
            title: title.to_string(),
            version: version.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }
}

fn operation_object(op: &Operation) -> Value {
    let mut operation: Map<String, Value> = Map::new();
    operation.insert("operationId".into(), json!(op.operation_id));

    if !op.tags.is_empty() {
        operation.insert("tags".into(), json!(op.tags));
    }
    if let Some(ref summary) = op.summary {
        operation.insert("summary".into(), json!(summary));
    }
    if let Some(ref description) = op.description {
        operation.insert("description".into(), json!(description));
    }

    // Parameters
    let params: Vec<Value> = op
        .parameters
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "in": p.location.as_str(),
                "required": p.required,
                "schema": p.schema,
            })
        })
        .collect();
    if !params.is_empty() {
        operation.insert("parameters".into(), json!(params));
    }

    // Request body
    if let Some(ref body) = op.request_body {
        let mut content: Map<String, Value> = Map::new();
        content.insert(body.content_type.clone(), json!({ "schema": body.schema }));
        operation.insert(
            "requestBody".into(),
            json!({
                "required": body.required,
                "content": content,
            }),
        );
    }

    // Responses
    let mut responses: Map<String, Value> = Map::new();
    for (status, spec) in &op.responses {
        let mut response: Map<String, Value> = Map::new();
        response.insert("description".into(), json!(spec.description));
        if let (Some(content_type), Some(schema)) = (&spec.content_type, &spec.schema) {
            let mut content: Map<String, Value> = Map::new();
            content.insert(content_type.clone(), json!({ "schema": schema }));
            response.insert("content".into(), Value::Object(content));
        }
        if !spec.headers.is_empty() {
            let headers: Map<String, Value> = spec
                .headers
                .iter()
                .map(|(name, schema)| (name.clone(), json!({ "schema": schema })))
                .collect();
            response.insert("headers".into(), Value::Object(headers));
        }
        responses.insert(status.clone(), Value::Object(response));
    }
    operation.insert("responses".into(), Value::Object(responses));

    // Security
    if !op.security.is_empty() {
        let security: Vec<Value> = op
            .security
            .iter()
            .map(|req| {
                let obj: Map<String, Value> = req
                    .0
                    .iter()
                    .map(|(scheme, scopes)| (scheme.clone(), json!(scopes)))
                    .collect();
                Value::Object(obj)
            })
            .collect();
        operation.insert("security".into(), json!(security));
    }

    Value::Object(operation)
}

/// Build an OpenAPI 3.1.0 JSON spec from config and the document
/// collected at registration time.
pub fn build_spec(config: &OpenApiConfig, document: &Document) -> Value {
    let mut paths: Map<String, Value> = Map::new();

    for op in &document.operations {
        let method_lower = op.method.to_lowercase();
        let path_entry = paths.entry(op.path.clone()).or_insert_with(|| json!({}));
        if let Some(obj) = path_entry.as_object_mut() {
            obj.insert(method_lower, operation_object(op));
        }
    }

    let mut info: Map<String, Value> = Map::new();
    info.insert("title".into(), json!(config.title));
    info.insert("version".into(), json!(config.version));
    if let Some(ref desc) = config.description {
        info.insert("description".into(), json!(desc));
    }

    let mut components: Map<String, Value> = Map::new();
    if !document.security_schemes.is_empty() {
        components.insert(
            "securitySchemes".into(),
            Value::Object(document.security_schemes.clone()),
        );
    }
    if !document.schemas.is_empty() {
        components.insert("schemas".into(), Value::Object(document.schemas.clone()));
    }

    json!({
        "openapi": "3.1.0",
        "info": info,
        "paths": paths,
        "components": components
    })
}

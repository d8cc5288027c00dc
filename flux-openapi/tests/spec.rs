//! Spec assembly: registered operations rendered into OpenAPI 3.1.0
//! JSON.

use flux_core::input::{self, Binding, Location};
use flux_core::{
    Api, ApiError, CancellationToken, Context, Input, InputError, Procedure, SecurityRequirement,
};
use flux_openapi::{build_spec, OpenApiConfig};

async fn noop(_cancel: CancellationToken, _input: ()) -> Result<(), ApiError> {
    Ok(())
}

struct ByIdInput {
    #[allow(dead_code)]
    id: u64,
}

impl Input for ByIdInput {
    fn bindings() -> &'static [Binding] {
        const BINDINGS: &[Binding] = &[Binding {
            name: "id",
            location: Location::Path,
            required: true,
            default: None,
            type_hint: "integer",
            item_hint: None,
        }];
        BINDINGS
    }

    async fn from_request(_api: &Api, ctx: &mut dyn Context) -> Result<Self, InputError> {
        Ok(Self {
            id: input::require(ctx.param("id"), None, "id", Location::Path)?,
        })
    }
}

async fn by_id(_cancel: CancellationToken, _input: ByIdInput) -> Result<(), ApiError> {
    Ok(())
}

fn sample_api() -> Api {
    let api = Api::new();
    api.register_security_scheme(
        "bearer",
        serde_json::json!({ "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }),
    );

    let procedure = Procedure::new();
    procedure.get_with(&api, "/health", noop, |op| op.summary("Liveness check").tag("ops"));
    procedure.get(&api, "/users/{id}", by_id);
    procedure
        .clone()
        .with_security(SecurityRequirement::new("bearer", &[]))
        .get(&api, "/protected", noop);
    api
}

#[test]
fn spec_skeleton() {
    let spec = build_spec(&OpenApiConfig::new("Test API", "1.2.3"), &sample_api().document());

    assert_eq!(spec["openapi"], "3.1.0");
    assert_eq!(spec["info"]["title"], "Test API");
    assert_eq!(spec["info"]["version"], "1.2.3");
    assert!(spec["paths"]["/health"]["get"].is_object());
    assert!(spec["paths"]["/users/{id}"]["get"].is_object());
    assert!(spec["paths"]["/protected"]["get"].is_object());
}

#[test]
fn operation_rendering() {
    let spec = build_spec(&OpenApiConfig::new("Test API", "1.2.3"), &sample_api().document());

    let health = &spec["paths"]["/health"]["get"];
    assert_eq!(health["summary"], "Liveness check");
    assert_eq!(health["tags"], serde_json::json!(["ops"]));
    assert!(health["operationId"].as_str().is_some_and(|id| !id.is_empty()));
}

#[test]
fn path_parameters_are_required() {
    let spec = build_spec(&OpenApiConfig::new("Test API", "1.2.3"), &sample_api().document());

    let params = spec["paths"]["/users/{id}"]["get"]["parameters"]
        .as_array()
        .expect("parameters should render");
    let id = params.iter().find(|p| p["name"] == "id").unwrap();
    assert_eq!(id["in"], "path");
    assert_eq!(id["required"], true);
    assert_eq!(id["schema"]["type"], "integer");
}

#[test]
fn error_responses_reference_the_error_model() {
    let spec = build_spec(&OpenApiConfig::new("Test API", "1.2.3"), &sample_api().document());

    let responses = &spec["paths"]["/health"]["get"]["responses"];
    for status in ["400", "422", "500"] {
        assert_eq!(
            responses[status]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/ErrorModel",
            "response {status} should reference ErrorModel",
        );
    }
    assert!(spec["components"]["schemas"]["ErrorModel"].is_object());
}

#[test]
fn auth_responses_render_only_with_security() {
    let spec = build_spec(&OpenApiConfig::new("Test API", "1.2.3"), &sample_api().document());

    let open = &spec["paths"]["/health"]["get"]["responses"];
    assert!(open.get("401").is_none());

    let protected = &spec["paths"]["/protected"]["get"];
    assert!(protected["responses"]["401"].is_object());
    assert!(protected["responses"]["403"].is_object());
    assert_eq!(protected["security"], serde_json::json!([{ "bearer": [] }]));
}

#[test]
fn security_schemes_render_in_components() {
    let spec = build_spec(&OpenApiConfig::new("Test API", "1.2.3"), &sample_api().document());

    assert_eq!(
        spec["components"]["securitySchemes"]["bearer"]["scheme"],
        "bearer"
    );
}

#[test]
fn description_is_optional() {
    let config = OpenApiConfig::new("Test API", "0.1.0").with_description("All the things");
    let spec = build_spec(&config, &sample_api().document());
    assert_eq!(spec["info"]["description"], "All the things");

    let spec = build_spec(&OpenApiConfig::new("Test API", "0.1.0"), &sample_api().document());
    assert!(spec["info"].get("description").is_none());
}

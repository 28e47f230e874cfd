//! Document assembler.
//!
//! Consumes scope blocks in order and merges their directives into a draft
//! [`Document`]. Type tokens are not interpreted here; every schema-valued
//! token is stored as a pending schema for the resolver.

use crate::associator::{Anchor, LocatedAnnotation, ScopeBlock, ScopeRole};
use crate::compiler::CompileOptions;
use crate::diagnostics::{Diagnostic, SourceLocation};
use crate::document::{
    Contact, Document, ExternalDocs, HttpMethod, Info, License, Link, MediaType, OAuthFlow,
    OAuthFlows, Operation, Parameter, ParameterLocation, RequestBody, Response, Schema,
    SchemaType, SecurityScheme, SecuritySchemeType, Server, Tag,
};
use crate::lexer::{Annotation, DirectiveKind};
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::path::PathBuf;

const JSON: &str = "application/json";
const SUCCESS_DESCRIPTION: &str = "Successful response";
const ERROR_DESCRIPTION: &str = "Error response";
/// Schema token meaning "no content"
const NO_CONTENT: &str = "-";

/// A `!scope` directive, applied by the resolver once all schemes are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDeclaration {
    pub scheme: String,
    pub name: String,
    pub description: String,
    pub location: SourceLocation,
}

/// Output of the assembly pass.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    /// Draft document; schemas may still hold pending type tokens
    pub document: Document,
    pub scopes: Vec<ScopeDeclaration>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Assembles scope blocks into a draft document.
pub fn assemble(blocks: &[ScopeBlock], options: &CompileOptions) -> AssembledDocument {
    let mut assembler = DocumentAssembler::new(options.clone());
    for block in blocks {
        assembler.add_block(block);
    }
    assembler.build()
}

/// The model whose `!field` directives are currently being collected
#[derive(Debug)]
struct ActiveModel {
    file: PathBuf,
    owner: String,
    /// False when the model was a duplicate; its fields are dropped
    accepted: bool,
}

/// Incremental document builder
pub struct DocumentAssembler {
    options: CompileOptions,
    document: Document,
    scopes: Vec<ScopeDeclaration>,
    diagnostics: Vec<Diagnostic>,
    /// operationId → where it was first declared
    operation_ids: IndexMap<String, SourceLocation>,
    /// model name → where it was first declared
    models: IndexMap<String, SourceLocation>,
    active_model: Option<ActiveModel>,
    /// Operation tags in first-use order
    used_tags: Vec<String>,
}

impl DocumentAssembler {
    pub fn new(options: CompileOptions) -> Self {
        debug!("Initializing DocumentAssembler");
        Self {
            options,
            document: Document::new(String::new(), Info::default()),
            scopes: Vec::new(),
            diagnostics: Vec::new(),
            operation_ids: IndexMap::new(),
            models: IndexMap::new(),
            active_model: None,
            used_tags: Vec::new(),
        }
    }

    /// Merges one block into the draft.
    pub fn add_block(&mut self, block: &ScopeBlock) {
        // Fields only attach to the type declared right before them
        if matches!(block.anchor, Anchor::Type { .. }) {
            self.active_model = None;
        }

        if let Some(first) = block.stray.first() {
            let kinds: Vec<String> = block
                .stray
                .iter()
                .map(|a| a.annotation.kind.to_string())
                .collect();
            self.error(
                format!(
                    "{} mixes {} directives with {}; {} directive(s) ignored",
                    block.anchor,
                    block.role.as_str(),
                    kinds.join(", "),
                    block.stray.len()
                ),
                &first.location,
            );
        }

        match block.role {
            ScopeRole::Document => self.add_document_block(block),
            ScopeRole::Operation => self.add_operation_block(block),
            ScopeRole::Schema => self.add_schema_block(block),
            ScopeRole::Unscoped => {}
        }
    }

    /// Finishes the draft: header defaults, default responses and implicit tags.
    pub fn build(mut self) -> AssembledDocument {
        debug!("Building draft document");

        if self.document.openapi.is_empty() {
            self.document.openapi = self.options.openapi_version.clone();
        }
        if self.document.info.title.is_empty() {
            self.document.info.title = self.options.title.clone();
        }
        if self.document.info.version.is_empty() {
            self.document.info.version = self.options.version.clone();
        }

        for operation in self.document.operations_mut() {
            if operation.responses.is_empty() {
                operation
                    .responses
                    .insert("200".to_string(), response(SUCCESS_DESCRIPTION, None));
            }
        }

        for name in self.used_tags {
            if !self.document.tags.iter().any(|t| t.name == name) {
                self.document.tags.push(Tag {
                    name,
                    description: None,
                });
            }
        }

        AssembledDocument {
            document: self.document,
            scopes: self.scopes,
            diagnostics: self.diagnostics,
        }
    }

    fn add_document_block(&mut self, block: &ScopeBlock) {
        // Webhook currently receiving body/response directives, scoped to this block
        let mut webhook: Option<(String, HttpMethod)> = None;

        for LocatedAnnotation {
            annotation: a,
            location,
        } in &block.annotations
        {
            match a.kind {
                DirectiveKind::Api => self.document.openapi = a.attr("version").to_string(),
                DirectiveKind::Info => {
                    let info = &mut self.document.info;
                    info.title = a.attr("title").to_string();
                    info.version = a.attr("version").to_string();
                    info.description = owned(a.non_empty("description"));
                }
                DirectiveKind::Contact => {
                    self.document.info.contact = Some(Contact {
                        name: owned(a.non_empty("name")),
                        url: owned(a.non_empty("url")),
                        email: owned(a.non_empty("email")),
                    });
                }
                DirectiveKind::License => {
                    self.document.info.license = Some(License {
                        name: a.attr("name").to_string(),
                        url: owned(a.non_empty("url")),
                    });
                }
                DirectiveKind::Tos => self.document.info.terms_of_service = Some(a.attr("url").to_string()),
                DirectiveKind::Server => self.document.servers.push(Server {
                    url: a.attr("url").to_string(),
                    description: owned(a.non_empty("description")),
                }),
                DirectiveKind::Tag => self.declare_tag(a),
                DirectiveKind::Security => self.declare_security(a),
                DirectiveKind::Scope => self.scopes.push(ScopeDeclaration {
                    scheme: a.attr("security").to_string(),
                    name: a.attr("name").to_string(),
                    description: a.attr("description").to_string(),
                    location: location.clone(),
                }),
                DirectiveKind::ExternalDocs => {
                    self.document.external_docs = Some(ExternalDocs {
                        url: a.attr("url").to_string(),
                        description: owned(a.non_empty("description")),
                    });
                }
                DirectiveKind::Link => self.document.links.push(Link {
                    label: a.attr("label").to_string(),
                    url: a.attr("url").to_string(),
                }),
                DirectiveKind::Webhook => webhook = self.declare_webhook(a, location),
                DirectiveKind::WebhookBody | DirectiveKind::WebhookResponse => {
                    let Some(operation) = webhook.as_ref().and_then(|(name, method)| {
                        self.document.webhooks.get_mut(name)?.slot_mut(*method).as_mut()
                    }) else {
                        self.warning(
                            format!("{} without a preceding !webhook; ignored", a.kind),
                            location,
                        );
                        continue;
                    };
                    if a.kind == DirectiveKind::WebhookBody {
                        operation.request_body = Some(request_body(a, location));
                    } else {
                        let response = response_for(a, location, SUCCESS_DESCRIPTION);
                        operation.responses.insert(a.attr("status").to_string(), response);
                    }
                }
                _ => {}
            }
        }
    }

    fn declare_tag(&mut self, a: &Annotation) {
        let name = a.attr("name");
        let description = owned(a.non_empty("description"));
        match self.document.tags.iter_mut().find(|t| t.name == name) {
            Some(tag) => {
                if description.is_some() {
                    tag.description = description;
                }
            }
            None => self.document.tags.push(Tag {
                name: name.to_string(),
                description,
            }),
        }
    }

    fn declare_security(&mut self, a: &Annotation) {
        let Some(scheme_type) = SecuritySchemeType::parse(a.attr("type")) else {
            return;
        };
        let name = a.attr("name");
        let location = a.non_empty("location");
        let url = owned(a.non_empty("url"));

        let mut scheme = SecurityScheme {
            scheme_type,
            description: owned(a.non_empty("description")),
            name: None,
            location: None,
            scheme: None,
            flows: None,
            open_id_connect_url: None,
        };

        match scheme_type {
            SecuritySchemeType::ApiKey => {
                scheme.name = Some(name.to_string());
                scheme.location = Some(location.unwrap_or("header").to_string());
            }
            SecuritySchemeType::Http => {
                scheme.scheme = Some(location.unwrap_or("bearer").to_string());
            }
            SecuritySchemeType::OAuth2 => {
                let mut flows = OAuthFlows::default();
                match location.unwrap_or("implicit") {
                    "password" => flows.password = Some(token_flow(url)),
                    "clientCredentials" => flows.client_credentials = Some(token_flow(url)),
                    "authorizationCode" => {
                        flows.authorization_code = Some(OAuthFlow {
                            authorization_url: url,
                            ..OAuthFlow::default()
                        })
                    }
                    _ => {
                        flows.implicit = Some(OAuthFlow {
                            authorization_url: url,
                            ..OAuthFlow::default()
                        })
                    }
                }
                scheme.flows = Some(flows);
            }
            SecuritySchemeType::OpenIdConnect => scheme.open_id_connect_url = url,
        }

        debug!("Declaring security scheme {}", name);
        self.document
            .components
            .security_schemes
            .insert(name.to_string(), scheme);
    }

    fn declare_webhook(
        &mut self,
        a: &Annotation,
        location: &SourceLocation,
    ) -> Option<(String, HttpMethod)> {
        let name = a.attr("name").to_string();
        let method = HttpMethod::parse(a.attr("method"))?;

        if let Some(existing) = self.document.webhooks.get(&name).and_then(|item| item.get(method)) {
            let first = describe(existing.origin.as_ref());
            self.error(
                format!(
                    "duplicate webhook {} {}: declared at {} and {}; keeping the first",
                    name, method, first, location
                ),
                location,
            );
            return None;
        }

        let mut operation = Operation::new(None);
        operation.summary = owned(a.non_empty("description"));
        operation.origin = Some(location.clone());
        *self
            .document
            .webhooks
            .entry(name.clone())
            .or_default()
            .slot_mut(method) = Some(operation);
        Some((name, method))
    }

    fn add_operation_block(&mut self, block: &ScopeBlock) {
        let mut routes = block
            .annotations
            .iter()
            .filter(|a| a.annotation.kind == DirectiveKind::Route);

        let Some(route) = routes.next() else {
            let location = block
                .annotations
                .first()
                .map_or(&block.location, |a| &a.location);
            self.warning(
                format!("operation directives on {} have no route; ignored", block.anchor),
                location,
            );
            return;
        };

        for extra in routes {
            self.error(
                format!(
                    "{} declares a second route `{}`; ignored",
                    block.anchor, extra.annotation.raw
                ),
                &extra.location,
            );
        }

        let a = &route.annotation;
        let Some(method) = HttpMethod::parse(a.attr("method")) else {
            return;
        };
        let path = convert_path_format(a.attr("path"));
        let operation_id = a.attr("operationId").to_string();
        let location = &route.location;

        if let Some(existing) = self.document.operation(&path, method) {
            let first = describe(existing.origin.as_ref());
            self.error(
                format!(
                    "duplicate operation {} {}: declared at {} and {}; keeping the first",
                    method, path, first, location
                ),
                location,
            );
            return;
        }
        if let Some(first) = self.operation_ids.get(&operation_id) {
            let message = format!(
                "duplicate operationId `{}`: declared at {} and {}; keeping the first",
                operation_id, first, location
            );
            self.error(message, location);
            return;
        }

        debug!("Adding operation: {} {} ({})", method, path, operation_id);

        let mut operation = Operation::new(Some(operation_id.clone()));
        operation.summary = owned(a.non_empty("summary"));
        operation.origin = Some(location.clone());
        for tag in &route.annotation.tags {
            if !operation.tags.contains(tag) {
                operation.tags.push(tag.clone());
            }
            if !self.used_tags.contains(tag) {
                self.used_tags.push(tag.clone());
            }
        }

        for LocatedAnnotation {
            annotation: a,
            location,
        } in &block.annotations
        {
            match a.kind {
                kind if kind.is_parameter() => operation.parameters.push(parameter(a, location)),
                DirectiveKind::Body => operation.request_body = Some(request_body(a, location)),
                DirectiveKind::Ok => {
                    let response = response_for(a, location, SUCCESS_DESCRIPTION);
                    operation.responses.insert(a.attr("status").to_string(), response);
                }
                DirectiveKind::Error => {
                    let response = response_for(a, location, ERROR_DESCRIPTION);
                    operation.responses.insert(a.attr("status").to_string(), response);
                }
                DirectiveKind::Secure => {
                    for name in &a.tags {
                        operation
                            .security
                            .push(IndexMap::from([(name.clone(), Vec::new())]));
                    }
                }
                _ => {}
            }
        }

        for name in path_parameters(&path) {
            let declared = operation
                .parameters
                .iter()
                .any(|p| p.location == ParameterLocation::Path && p.name == name);
            if !declared {
                operation.parameters.push(Parameter {
                    name,
                    location: ParameterLocation::Path,
                    description: None,
                    required: true,
                    schema: Schema::primitive("string"),
                });
            }
        }

        self.operation_ids.insert(operation_id, location.clone());
        *self
            .document
            .paths
            .entry(path)
            .or_default()
            .slot_mut(method) = Some(operation);
    }

    fn add_schema_block(&mut self, block: &ScopeBlock) {
        for LocatedAnnotation {
            annotation: a,
            location,
        } in &block.annotations
        {
            match (a.kind, &block.anchor) {
                (DirectiveKind::Model, Anchor::Type { name }) => self.start_model(name, a, location),
                (DirectiveKind::Model, anchor) => self.warning(
                    format!("!model on {} is not a type declaration; ignored", anchor),
                    location,
                ),
                (DirectiveKind::Field, anchor) => self.add_field(anchor, a, location),
                _ => {}
            }
        }
    }

    fn start_model(&mut self, name: &str, a: &Annotation, location: &SourceLocation) {
        let accepted = match self.models.get(name) {
            Some(first) => {
                let message = format!(
                    "duplicate model `{}`: declared at {} and {}; keeping the first",
                    name, first, location
                );
                self.error(message, location);
                false
            }
            None => true,
        };

        self.active_model = Some(ActiveModel {
            file: location.file.clone(),
            owner: name.to_string(),
            accepted,
        });
        if !accepted {
            return;
        }

        debug!("Adding model: {}", name);
        let origin = Some(location.clone());
        let mut schema = Schema {
            schema_type: Some(SchemaType::Single("object".to_string())),
            description: owned(a.non_empty("description")),
            example: a.non_empty("example").map(raw_value),
            ..Schema::default()
        };
        schema.all_of = pending_list(a.non_empty("allOf"), &origin);
        schema.one_of = pending_list(a.non_empty("oneOf"), &origin);
        schema.any_of = pending_list(a.non_empty("anyOf"), &origin);

        self.models.insert(name.to_string(), location.clone());
        self.document
            .components
            .schemas
            .insert(name.to_string(), schema);
    }

    fn add_field(&mut self, anchor: &Anchor, a: &Annotation, location: &SourceLocation) {
        let field = a.attr("name");
        let owner = anchor.schema_owner();

        let accepted = match (&self.active_model, owner) {
            (Some(model), Some(owner)) if model.owner == owner && model.file == location.file => {
                model.accepted
            }
            _ => {
                self.warning(
                    format!("!field `{}` on {} has no active !model; ignored", field, anchor),
                    location,
                );
                return;
            }
        };
        let (true, Some(owner)) = (accepted, owner) else {
            return;
        };
        let Some(schema) = self.document.components.schemas.get_mut(owner) else {
            return;
        };

        let mut property = value_schema(a, location);
        property.description = owned(a.non_empty("description"));
        schema.properties.insert(field.to_string(), property);
        if a.flag("required") && !schema.required.iter().any(|r| r == field) {
            schema.required.push(field.to_string());
        }
    }

    fn error(&mut self, message: String, location: &SourceLocation) {
        self.diagnostics
            .push(Diagnostic::error(message).at(Some(location.clone())));
    }

    fn warning(&mut self, message: String, location: &SourceLocation) {
        self.diagnostics
            .push(Diagnostic::warning(message).at(Some(location.clone())));
    }
}

/// Convert path format from `:param` to OpenAPI `{param}` format
fn convert_path_format(path: &str) -> String {
    path.split('/')
        .map(|part| match part.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Names of the `{param}` segments of a path, in order.
fn path_parameters(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|part| part.strip_prefix('{')?.strip_suffix('}'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn describe(location: Option<&SourceLocation>) -> String {
    location.map_or_else(|| "<unknown>".to_string(), ToString::to_string)
}

/// A raw directive value; the resolver coerces it once the type is known.
fn raw_value(value: &str) -> Value {
    Value::String(value.to_string())
}

fn pending_list(tokens: Option<&str>, origin: &Option<SourceLocation>) -> Vec<Schema> {
    tokens
        .map(|tokens| {
            tokens
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| Schema::pending(t, origin.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Pending schema for a typed directive, carrying its value keywords.
fn value_schema(a: &Annotation, location: &SourceLocation) -> Schema {
    let mut schema = Schema::pending(a.attr("type"), Some(location.clone()));
    schema.nullable = a.flag("nullable");
    schema.format = owned(a.non_empty("format"));
    schema.pattern = owned(a.non_empty("pattern"));
    schema.default = a.non_empty("default").map(raw_value);
    schema.example = a.non_empty("example").map(raw_value);
    schema.minimum = a.non_empty("minimum").and_then(|v| v.parse().ok());
    schema.maximum = a.non_empty("maximum").and_then(|v| v.parse().ok());
    schema.min_length = a.non_empty("minLength").and_then(|v| v.parse().ok());
    schema.max_length = a.non_empty("maxLength").and_then(|v| v.parse().ok());
    if let Some(values) = a.non_empty("enum") {
        schema.enum_values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(raw_value)
            .collect();
    }
    schema
}

fn parameter(a: &Annotation, location: &SourceLocation) -> Parameter {
    let parameter_location = match a.kind {
        DirectiveKind::Path => ParameterLocation::Path,
        DirectiveKind::Header => ParameterLocation::Header,
        DirectiveKind::Cookie => ParameterLocation::Cookie,
        _ => ParameterLocation::Query,
    };
    Parameter {
        name: a.attr("name").to_string(),
        location: parameter_location,
        description: owned(a.non_empty("description")),
        required: a.flag("required"),
        schema: value_schema(a, location),
    }
}

fn request_body(a: &Annotation, location: &SourceLocation) -> RequestBody {
    let mime = a.non_empty("mime").unwrap_or(JSON);
    let schema = Schema::pending(a.attr("schema"), Some(location.clone()));
    RequestBody {
        description: owned(a.non_empty("description")),
        content: IndexMap::from([(mime.to_string(), MediaType { schema })]),
        required: a.flag("required"),
    }
}

fn response_for(a: &Annotation, location: &SourceLocation, fallback: &str) -> Response {
    let description = a.non_empty("description").unwrap_or(fallback);
    let schema = Some(a.attr("schema"))
        .filter(|token| *token != NO_CONTENT)
        .map(|token| Schema::pending(token, Some(location.clone())));
    response(description, schema)
}

fn response(description: &str, schema: Option<Schema>) -> Response {
    Response {
        description: description.to_string(),
        content: schema
            .map(|schema| IndexMap::from([(JSON.to_string(), MediaType { schema })]))
            .unwrap_or_default(),
    }
}

fn token_flow(url: Option<String>) -> OAuthFlow {
    OAuthFlow {
        token_url: url,
        ..OAuthFlow::default()
    }
}

//! Reference resolver.
//!
//! Turns the pending type tokens of a draft document into concrete schemas and
//! wires security requirements to the declared schemes. Unknown names never
//! fail the run; they produce warnings and the output still references them.

use crate::assembler::{AssembledDocument, ScopeDeclaration};
use crate::compiler::Compilation;
use crate::diagnostics::{Diagnostic, SourceLocation};
use crate::document::{Operation, Schema, SchemaType, SecurityScheme};
use indexmap::IndexMap;
use log::debug;
use serde_json::{Number, Value};
use std::collections::HashSet;

/// The primitive type names a token may use directly.
const PRIMITIVES: &[&str] = &["string", "integer", "number", "boolean", "object", "null"];

/// Maps a primitive or format alias to its OpenAPI type and format.
///
/// Rust scalar names are accepted as aliases too, so `!field id:u64` reads the
/// same as `!field id:int64`.
fn primitive(token: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match token {
        "string" | "String" | "str" | "char" => ("string", None),
        "integer" => ("integer", None),
        "number" => ("number", None),
        "boolean" | "bool" => ("boolean", None),
        "object" => ("object", None),
        "null" => ("null", None),
        "int32" | "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => ("integer", Some("int32")),
        "int64" | "i64" | "i128" | "u64" | "u128" | "isize" | "usize" => ("integer", Some("int64")),
        "float" | "f32" => ("number", Some("float")),
        "double" | "f64" => ("number", Some("double")),
        "date" => ("string", Some("date")),
        "date-time" => ("string", Some("date-time")),
        "uuid" => ("string", Some("uuid")),
        "email" => ("string", Some("email")),
        "uri" => ("string", Some("uri")),
        "binary" => ("string", Some("binary")),
        "byte" => ("string", Some("byte")),
        "password" => ("string", Some("password")),
        _ => return None,
    };
    Some(mapped)
}

/// Resolves a draft document into the finished compilation.
pub fn resolve(assembled: AssembledDocument) -> Compilation {
    let AssembledDocument {
        mut document,
        scopes,
        mut diagnostics,
    } = assembled;

    let mut resolver = ReferenceResolver::new(document.components.schemas.keys().cloned());

    let declared_scopes =
        resolver.apply_scopes(&mut document.components.security_schemes, &scopes);

    let operations = document
        .paths
        .values_mut()
        .chain(document.webhooks.values_mut())
        .flat_map(|item| item.operations_mut());
    for operation in operations {
        resolver.resolve_operation(operation);
        resolver.resolve_security(
            operation,
            &document.components.security_schemes,
            &declared_scopes,
        );
    }

    for schema in document.components.schemas.values_mut() {
        resolver.resolve_schema(schema);
    }

    debug!(
        "Resolved {} schemas, {} dangling references",
        document.components.schemas.len(),
        resolver.dangling.len()
    );

    diagnostics.extend(resolver.diagnostics);
    Compilation {
        document,
        diagnostics,
    }
}

struct ReferenceResolver {
    /// Names of the component schemas
    known: HashSet<String>,
    /// Unknown names already reported
    dangling: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl ReferenceResolver {
    fn new(known: impl IntoIterator<Item = String>) -> Self {
        Self {
            known: known.into_iter().collect(),
            dangling: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Adds `!scope` declarations to their schemes' flows and returns the scope
    /// names declared per scheme, in declaration order.
    fn apply_scopes(
        &mut self,
        schemes: &mut IndexMap<String, SecurityScheme>,
        scopes: &[ScopeDeclaration],
    ) -> IndexMap<String, Vec<String>> {
        let mut declared: IndexMap<String, Vec<String>> = IndexMap::new();

        for scope in scopes {
            let Some(scheme) = schemes.get_mut(&scope.scheme) else {
                self.warning(
                    format!(
                        "!scope `{}` names undeclared security scheme `{}`",
                        scope.name, scope.scheme
                    ),
                    Some(&scope.location),
                );
                continue;
            };

            if let Some(flows) = &mut scheme.flows {
                for flow in flows.flows_mut() {
                    flow.scopes
                        .insert(scope.name.clone(), scope.description.clone());
                }
            }

            let names = declared.entry(scope.scheme.clone()).or_default();
            if !names.contains(&scope.name) {
                names.push(scope.name.clone());
            }
        }

        declared
    }

    fn resolve_operation(&mut self, operation: &mut Operation) {
        for parameter in &mut operation.parameters {
            self.resolve_schema(&mut parameter.schema);
        }
        if let Some(body) = &mut operation.request_body {
            for media in body.content.values_mut() {
                self.resolve_schema(&mut media.schema);
            }
        }
        for response in operation.responses.values_mut() {
            for media in response.content.values_mut() {
                self.resolve_schema(&mut media.schema);
            }
        }
    }

    fn resolve_security(
        &mut self,
        operation: &mut Operation,
        schemes: &IndexMap<String, SecurityScheme>,
        declared_scopes: &IndexMap<String, Vec<String>>,
    ) {
        for requirement in &mut operation.security {
            for (name, scopes) in requirement.iter_mut() {
                match schemes.get(name) {
                    Some(scheme) if scheme.scheme_type.uses_scopes() => {
                        *scopes = declared_scopes.get(name).cloned().unwrap_or_default();
                    }
                    Some(_) => {}
                    None => {
                        let message = match &operation.operation_id {
                            Some(id) => format!(
                                "operation `{}` requires undeclared security scheme `{}`",
                                id, name
                            ),
                            None => format!("webhook requires undeclared security scheme `{}`", name),
                        };
                        self.diagnostics
                            .push(Diagnostic::warning(message).at(operation.origin.clone()));
                    }
                }
            }
        }
    }

    /// Resolves a schema's pending token, then its nested schemas.
    fn resolve_schema(&mut self, schema: &mut Schema) {
        if let Some(pending) = schema.pending.take() {
            let resolved = self.resolve_token(&pending.token, pending.origin.as_ref());
            merge(schema, resolved);
        }

        for property in schema.properties.values_mut() {
            self.resolve_schema(property);
        }
        if let Some(items) = &mut schema.items {
            self.resolve_schema(items);
        }
        for nested in schema
            .all_of
            .iter_mut()
            .chain(schema.one_of.iter_mut())
            .chain(schema.any_of.iter_mut())
        {
            self.resolve_schema(nested);
        }

        let target = value_type(schema).map(str::to_string);
        for value in schema
            .default
            .iter_mut()
            .chain(schema.example.iter_mut())
            .chain(schema.enum_values.iter_mut())
        {
            coerce(value, target.as_deref());
        }
    }

    fn resolve_token(&mut self, token: &str, origin: Option<&SourceLocation>) -> Schema {
        let token = token.trim();

        if token.contains('|') {
            let parts: Vec<&str> = token
                .split('|')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if parts.iter().all(|p| PRIMITIVES.contains(p)) {
                return Schema {
                    schema_type: Some(SchemaType::Multiple(
                        parts.iter().map(|p| p.to_string()).collect(),
                    )),
                    ..Schema::default()
                };
            }
            return Schema {
                one_of: parts
                    .into_iter()
                    .map(|p| self.resolve_token(p, origin))
                    .collect(),
                ..Schema::default()
            };
        }

        if let Some(inner) = token.strip_suffix("[]") {
            return Schema::array(self.resolve_token(inner, origin));
        }

        if let Some((schema_type, format)) = primitive(token) {
            let mut schema = Schema::primitive(schema_type);
            schema.format = format.map(str::to_string);
            return schema;
        }

        if !self.known.contains(token) && self.dangling.insert(token.to_string()) {
            self.warning(
                format!(
                    "schema `{}` is referenced but never declared with !model",
                    token
                ),
                origin,
            );
        }
        Schema::reference(token)
    }

    fn warning(&mut self, message: String, location: Option<&SourceLocation>) {
        self.diagnostics
            .push(Diagnostic::warning(message).at(location.cloned()));
    }
}

/// Folds a resolved type into a schema that already carries keywords.
fn merge(schema: &mut Schema, resolved: Schema) {
    if resolved.reference.is_some() {
        // Siblings of `$ref` are ignored by OpenAPI 3.0 tooling
        if schema.has_annotations() {
            schema.all_of.insert(0, resolved);
        } else {
            schema.reference = resolved.reference;
        }
        return;
    }

    schema.schema_type = resolved.schema_type;
    if schema.format.is_none() {
        schema.format = resolved.format;
    }
    schema.items = resolved.items;
    if !resolved.one_of.is_empty() {
        schema.one_of = resolved.one_of;
    }
}

/// The type that default/example/enum values are coerced to.
fn value_type(schema: &Schema) -> Option<&str> {
    match &schema.schema_type {
        Some(SchemaType::Single(t)) if t == "array" => schema.items.as_deref().and_then(value_type),
        Some(SchemaType::Single(t)) => Some(t.as_str()),
        _ => None,
    }
}

/// Converts a raw directive value to the JSON type implied by `value_type`.
fn coerce(value: &mut Value, value_type: Option<&str>) {
    let Value::String(raw) = value else {
        return;
    };
    let coerced = match value_type {
        Some("string") => None,
        Some("integer") => raw.parse::<i64>().ok().map(Value::from),
        Some("number") => raw.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
        Some("boolean") => raw.parse::<bool>().ok().map(Value::Bool),
        _ => Some(infer(raw)),
    };
    if let Some(coerced) = coerced {
        *value = coerced;
    }
}

/// Integer, then float, then boolean, then the string itself.
fn infer(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    Value::String(raw.to_string())
}

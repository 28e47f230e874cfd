//! Directive lexer.
//!
//! Turns the text of one comment block into an ordered list of [`Annotation`]s.
//! A directive is a line starting with `!` followed by a keyword:
//!
//! ```text
//! !api 3.0.3
//! !info "Petstore" v1.0.0 "A sample API"
//! !GET /pets/{id} -> getPet "Find a pet" #pets
//! !path id:int64 "Pet identifier" required
//! !ok Pet "The pet"
//! !error 404 ApiError "Not found"
//! ```
//!
//! Lines that are not directives are prose and are skipped. A directive whose
//! keyword is unknown, or whose body does not fit the keyword's grammar, is
//! skipped as well; the lexer never fails.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::LazyLock;

/// Attribute value used for boolean flags such as `required`.
pub const TRUE: &str = "true";
const FALSE: &str = "false";

/// Type token: `name`, `name[]`, `a|b`, with an optional trailing `?`.
const TYPE_TOKEN: &str = r"((?:[\w.-]+(?:\[\])*)(?:\|[\w.-]+(?:\[\])*)*)(\?)?";
/// Schema token of bodies and responses; `-` (no content) also matches.
const SCHEMA_TOKEN: &str = r"((?:[\w.-]+(?:\[\])*)(?:\|[\w.-]+(?:\[\])*)*)";

macro_rules! grammar {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(&$pattern).expect("directive grammar must compile"));
    };
}

grammar!(API, r"^!api\s+v?(\d+(?:\.\d+)*)");
grammar!(INFO, r#"^!info\s+"([^"]+)"\s+v?(\d[\w.+-]*)(?:\s+"([^"]*)")?"#);
grammar!(CONTACT, r#"^!contact\s+"([^"]*)"(?:\s+<([^>]+)>)?(?:\s+\(([^)]+)\))?"#);
grammar!(LICENSE, r"^!license\s+(\S+)(?:\s+(\S+))?");
grammar!(SERVER, r#"^!server\s+(\S+)(?:\s+"([^"]*)")?"#);
grammar!(TAG, r#"^!tag\s+([^\s"]+)(?:\s+"([^"]*)")?"#);
grammar!(TOS, r"^!tos\s+(\S+)");
grammar!(
    SECURITY,
    r#"^!security\s+(\w+):(apiKey|oauth2|http|openIdConnect)(?::(\w*))?(?:\s+"([^"]*)")?(?:\s+(\S+))?"#
);
grammar!(SCOPE, r#"^!scope\s+(\w+)\s+([\w:./-]+)(?:\s+"([^"]*)")?"#);
grammar!(EXTERNAL_DOCS, r#"^!externalDocs\s+(\S+)(?:\s+"([^"]*)")?"#);
grammar!(LINK, r#"^!link\s+"([^"]+)"\s+(\S+)"#);
grammar!(WEBHOOK, r#"^!webhook\s+(\w+):(get|post|put|delete|patch)(?:\s+"([^"]*)")?"#);
grammar!(WEBHOOK_BODY, format!(r#"^!webhook-body\s+{SCHEMA_TOKEN}(?:\s+"([^"]*)")?"#));
grammar!(
    WEBHOOK_RESPONSE,
    format!(r#"^!webhook-response\s+(\d{{3}}|default)\s+{SCHEMA_TOKEN}(?:\s+"([^"]*)")?"#)
);
grammar!(
    ROUTE,
    r##"^!(GET|POST|PUT|DELETE|PATCH|OPTIONS|HEAD|TRACE)\s+(\S+)\s+->\s+([^\s"#]+)(?:\s+"([^"]*)")?"##
);
grammar!(
    PARAM,
    format!(r#"^!(query|path|header|cookie)\s+([\w.-]+):{TYPE_TOKEN}(?:\s+"([^"]*)")?"#)
);
grammar!(BODY, format!(r#"^!body\s+{SCHEMA_TOKEN}(?:\s+"([^"]*)")?"#));
grammar!(
    RESPONSE,
    format!(r#"^!(?:ok|error)(?:\s+(\d{{3}}|default))?\s+{SCHEMA_TOKEN}(?:\s+"([^"]*)")?"#)
);
grammar!(SECURE, r"^!secure\s+(.+)");
grammar!(MODEL, r#"^!model(?:\s+"([^"]*)")?"#);
grammar!(FIELD, format!(r#"^!field\s+([\w.-]+):{TYPE_TOKEN}(?:\s+"([^"]*)")?"#));

grammar!(KEY_VALUE, r#"(?:^|\s)(\w+)=("[^"]*"|'[^']*'|\S+)"#);
grammar!(HASH_TAG, r"(?:^|\s)#([\w-]+)");

/// The closed set of directive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Api,
    Info,
    Contact,
    License,
    Server,
    Tag,
    Tos,
    Security,
    Scope,
    ExternalDocs,
    Link,
    Webhook,
    WebhookBody,
    WebhookResponse,
    Route,
    Query,
    Path,
    Header,
    Cookie,
    Body,
    Ok,
    Error,
    Secure,
    Model,
    Field,
}

impl DirectiveKind {
    /// The keyword written after `!` (routes use the HTTP method instead).
    pub fn keyword(&self) -> &'static str {
        match self {
            DirectiveKind::Api => "api",
            DirectiveKind::Info => "info",
            DirectiveKind::Contact => "contact",
            DirectiveKind::License => "license",
            DirectiveKind::Server => "server",
            DirectiveKind::Tag => "tag",
            DirectiveKind::Tos => "tos",
            DirectiveKind::Security => "security",
            DirectiveKind::Scope => "scope",
            DirectiveKind::ExternalDocs => "externalDocs",
            DirectiveKind::Link => "link",
            DirectiveKind::Webhook => "webhook",
            DirectiveKind::WebhookBody => "webhook-body",
            DirectiveKind::WebhookResponse => "webhook-response",
            DirectiveKind::Route => "route",
            DirectiveKind::Query => "query",
            DirectiveKind::Path => "path",
            DirectiveKind::Header => "header",
            DirectiveKind::Cookie => "cookie",
            DirectiveKind::Body => "body",
            DirectiveKind::Ok => "ok",
            DirectiveKind::Error => "error",
            DirectiveKind::Secure => "secure",
            DirectiveKind::Model => "model",
            DirectiveKind::Field => "field",
        }
    }

    /// Whether this kind declares an operation parameter.
    pub fn is_parameter(&self) -> bool {
        matches!(
            self,
            DirectiveKind::Query | DirectiveKind::Path | DirectiveKind::Header | DirectiveKind::Cookie
        )
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{}", self.keyword())
    }
}

/// One recognized directive.
///
/// Every key of the kind's grammar is present in `attributes`, possibly with an
/// empty value. Trailing `key=value` pairs are added after the grammar keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub kind: DirectiveKind,
    /// The trimmed source line
    pub raw: String,
    pub attributes: IndexMap<String, String>,
    /// `#tag` tokens of a route, or scheme names of `!secure`
    pub tags: Vec<String>,
    /// Zero-based line index inside the comment text
    pub line: usize,
}

impl Annotation {
    /// Attribute value, or `""` when absent.
    pub fn attr(&self, key: &str) -> &str {
        self.attributes.get(key).map(String::as_str).unwrap_or("")
    }

    /// Attribute value, or `None` when absent or empty.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        Some(self.attr(key)).filter(|v| !v.is_empty())
    }

    /// Whether a boolean attribute is set.
    pub fn flag(&self, key: &str) -> bool {
        self.attr(key) == TRUE
    }
}

/// Extracts all directives from a comment block, in line order.
pub fn extract(text: &str) -> Vec<Annotation> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| lex_line(line, index))
        .collect()
}

/// Lexes a single line. Returns `None` for prose and for malformed directives.
pub fn lex_line(line: &str, index: usize) -> Option<Annotation> {
    let line = normalize(line);
    let keyword = line.strip_prefix('!')?.split_whitespace().next()?;

    let grammar = match keyword {
        "api" => Grammar::new(DirectiveKind::Api, &API, &["version"]),
        "info" => Grammar::new(DirectiveKind::Info, &INFO, &["title", "version", "description"]),
        "contact" => Grammar::new(DirectiveKind::Contact, &CONTACT, &["name", "email", "url"]),
        "license" => Grammar::new(DirectiveKind::License, &LICENSE, &["name", "url"]),
        "server" => Grammar::new(DirectiveKind::Server, &SERVER, &["url", "description"]),
        "tag" => Grammar::new(DirectiveKind::Tag, &TAG, &["name", "description"]),
        "tos" => Grammar::new(DirectiveKind::Tos, &TOS, &["url"]),
        "security" => Grammar::new(
            DirectiveKind::Security,
            &SECURITY,
            &["name", "type", "location", "description", "url"],
        ),
        "scope" => Grammar::new(DirectiveKind::Scope, &SCOPE, &["security", "name", "description"]),
        "externalDocs" => {
            Grammar::new(DirectiveKind::ExternalDocs, &EXTERNAL_DOCS, &["url", "description"])
        }
        "link" => Grammar::new(DirectiveKind::Link, &LINK, &["label", "url"]),
        "webhook" => Grammar::new(DirectiveKind::Webhook, &WEBHOOK, &["name", "method", "description"]),
        "webhook-body" => {
            Grammar::new(DirectiveKind::WebhookBody, &WEBHOOK_BODY, &["schema", "description"])
        }
        "webhook-response" => Grammar::new(
            DirectiveKind::WebhookResponse,
            &WEBHOOK_RESPONSE,
            &["status", "schema", "description"],
        ),
        "GET" | "POST" | "PUT" | "DELETE" | "PATCH" | "OPTIONS" | "HEAD" | "TRACE" => Grammar::new(
            DirectiveKind::Route,
            &ROUTE,
            &["method", "path", "operationId", "summary"],
        ),
        "query" | "path" | "header" | "cookie" => Grammar::new(
            parameter_kind(keyword)?,
            &PARAM,
            &["in", "name", "type", "nullable", "description"],
        ),
        "body" => Grammar::new(DirectiveKind::Body, &BODY, &["schema", "description"]),
        "ok" => Grammar::new(DirectiveKind::Ok, &RESPONSE, &["status", "schema", "description"]),
        "error" => Grammar::new(DirectiveKind::Error, &RESPONSE, &["status", "schema", "description"]),
        "secure" => Grammar::new(DirectiveKind::Secure, &SECURE, &["names"]),
        "model" => Grammar::new(DirectiveKind::Model, &MODEL, &["description"]),
        "field" => Grammar::new(
            DirectiveKind::Field,
            &FIELD,
            &["name", "type", "nullable", "description"],
        ),
        _ => return None,
    };
    let kind = grammar.kind;

    let captures = grammar.pattern.captures(line)?;
    let prefix_end = captures.get(0).map_or(0, |m| m.end());
    let rest = &line[prefix_end..];

    let mut attributes = collect(&captures, grammar.keys);
    let mut tags = Vec::new();

    match kind {
        DirectiveKind::Route => tags = hash_tags(rest),
        DirectiveKind::Secure => {
            tags = attributes["names"].split_whitespace().map(str::to_string).collect();
            attributes.insert("names".to_string(), tags.join(","));
        }
        DirectiveKind::Ok | DirectiveKind::Error if attributes["status"].is_empty() => {
            let status = if kind == DirectiveKind::Ok { "200" } else { "500" };
            attributes.insert("status".to_string(), status.to_string());
        }
        _ => {}
    }

    if kind.is_parameter() || kind == DirectiveKind::Field {
        let nullable = if attributes["nullable"] == "?" { TRUE } else { FALSE };
        attributes.insert("nullable".to_string(), nullable.to_string());
    }

    if kind.is_parameter()
        || matches!(kind, DirectiveKind::Body | DirectiveKind::WebhookBody | DirectiveKind::Field)
    {
        let required = if rest.contains(" required") { TRUE } else { FALSE };
        attributes.insert("required".to_string(), required.to_string());
    }

    if kind.is_parameter()
        || matches!(
            kind,
            DirectiveKind::Body | DirectiveKind::WebhookBody | DirectiveKind::Field | DirectiveKind::Model
        )
    {
        for (key, value) in key_values(rest) {
            attributes.entry(key).or_insert(value);
        }
    }

    Some(Annotation {
        kind,
        raw: line.to_string(),
        attributes,
        tags,
        line: index,
    })
}

/// One entry of the grammar table: the kind a keyword produces, its pattern,
/// and the attribute keys bound to the pattern's capture groups in order.
struct Grammar {
    kind: DirectiveKind,
    pattern: &'static LazyLock<Regex>,
    keys: &'static [&'static str],
}

impl Grammar {
    fn new(
        kind: DirectiveKind,
        pattern: &'static LazyLock<Regex>,
        keys: &'static [&'static str],
    ) -> Self {
        Self { kind, pattern, keys }
    }
}

fn normalize(line: &str) -> &str {
    let trimmed = line.trim();
    match trimmed.strip_prefix('*') {
        Some(rest) if !rest.starts_with('/') => rest.trim_start(),
        _ => trimmed,
    }
}

fn parameter_kind(keyword: &str) -> Option<DirectiveKind> {
    match keyword {
        "query" => Some(DirectiveKind::Query),
        "path" => Some(DirectiveKind::Path),
        "header" => Some(DirectiveKind::Header),
        "cookie" => Some(DirectiveKind::Cookie),
        _ => None,
    }
}

fn collect(captures: &Captures<'_>, keys: &[&str]) -> IndexMap<String, String> {
    keys.iter()
        .enumerate()
        .map(|(i, key)| {
            let value = captures.get(i + 1).map_or("", |m| m.as_str());
            (key.to_string(), value.to_string())
        })
        .collect()
}

fn hash_tags(rest: &str) -> Vec<String> {
    HASH_TAG
        .captures_iter(rest)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Finds `key=value` pairs, stripping surrounding quotes from the value.
fn key_values(rest: &str) -> Vec<(String, String)> {
    KEY_VALUE
        .captures_iter(rest)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .map(|(key, value)| (key.to_string(), strip_quotes(value).to_string()))
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single(line: &str) -> Annotation {
        let mut annotations = extract(line);
        assert_eq!(annotations.len(), 1, "expected one annotation for {line:?}");
        annotations.remove(0)
    }

    #[test]
    fn test_api_with_and_without_v_prefix() {
        assert_eq!(single("!api 3.0.3").attr("version"), "3.0.3");
        assert_eq!(single("!api v3.1.0").attr("version"), "3.1.0");
    }

    #[test]
    fn test_info_description_is_optional() {
        let info = single(r#"!info "My API" v1.0.0 "A sample API""#);
        assert_eq!(info.kind, DirectiveKind::Info);
        assert_eq!(info.attr("title"), "My API");
        assert_eq!(info.attr("version"), "1.0.0");
        assert_eq!(info.attr("description"), "A sample API");

        let bare = single(r#"!info "My API" 1.0.0"#);
        assert_eq!(bare.attributes.get("description"), Some(&String::new()));
    }

    #[test]
    fn test_contact_groups() {
        let contact = single(r#"!contact "API Support" <support@example.com> (https://example.com)"#);
        assert_eq!(contact.attr("name"), "API Support");
        assert_eq!(contact.attr("email"), "support@example.com");
        assert_eq!(contact.attr("url"), "https://example.com");

        let no_url = single(r#"!contact "" <support@example.com>"#);
        assert_eq!(no_url.attr("name"), "");
        assert_eq!(no_url.attr("url"), "");
    }

    #[test]
    fn test_route_with_summary_and_tags() {
        let route = single(r#"!GET /users -> getUsers "Retrieve users" #users #admin #users"#);
        assert_eq!(route.kind, DirectiveKind::Route);
        assert_eq!(route.attr("method"), "GET");
        assert_eq!(route.attr("path"), "/users");
        assert_eq!(route.attr("operationId"), "getUsers");
        assert_eq!(route.attr("summary"), "Retrieve users");
        assert_eq!(route.tags, vec!["users", "admin", "users"]);
    }

    #[test]
    fn test_route_without_summary() {
        let route = single("!DELETE /users/{id} -> deleteUser #users");
        assert_eq!(route.attr("summary"), "");
        assert_eq!(route.tags, vec!["users"]);
    }

    #[test]
    fn test_lowercase_method_is_not_a_route() {
        assert!(extract("!get /users -> getUsers").is_empty());
    }

    #[test]
    fn test_query_parameter_with_default_and_required() {
        let query = single(r#"!query limit:integer "The number of results" default=10 required"#);
        assert_eq!(query.kind, DirectiveKind::Query);
        assert_eq!(query.attr("in"), "query");
        assert_eq!(query.attr("name"), "limit");
        assert_eq!(query.attr("type"), "integer");
        assert_eq!(query.attr("description"), "The number of results");
        assert!(query.flag("required"));
        assert_eq!(query.attr("default"), "10");
    }

    #[test]
    fn test_default_quotes_are_stripped() {
        assert_eq!(single(r#"!query status:string default="available""#).attr("default"), "available");
        assert_eq!(single("!query status:string default=available").attr("default"), "available");
        assert_eq!(single("!query status:string default='sold'").attr("default"), "sold");
    }

    #[test]
    fn test_required_only_after_prefix() {
        let not_required = single(r#"!header X-Token:string "Token is required""#);
        assert!(!not_required.flag("required"));
        assert_eq!(not_required.attr("required"), "false");

        let required = single("!path id:integer required");
        assert!(required.flag("required"));
    }

    #[test]
    fn test_parameter_nullable_marker_and_array_type() {
        let tags = single(r#"!query tags:string[]? "Tags to filter by""#);
        assert_eq!(tags.attr("type"), "string[]");
        assert!(tags.flag("nullable"));

        let cookie = single("!cookie session:string");
        assert_eq!(cookie.kind, DirectiveKind::Cookie);
        assert!(!cookie.flag("nullable"));
    }

    #[test]
    fn test_responses_default_status() {
        let ok = single(r#"!ok User "Successful response""#);
        assert_eq!(ok.attr("status"), "200");
        assert_eq!(ok.attr("schema"), "User");

        let created = single(r#"!ok 201 User "Created""#);
        assert_eq!(created.attr("status"), "201");

        let error = single(r#"!error ErrorResponse "Server error""#);
        assert_eq!(error.kind, DirectiveKind::Error);
        assert_eq!(error.attr("status"), "500");

        let not_found = single(r#"!error 404 ErrorResponse "Not found""#);
        assert_eq!(not_found.attr("status"), "404");
    }

    #[test]
    fn test_body_and_response_need_a_type_token() {
        assert!(extract("!body []").is_empty());
        assert!(extract("!ok 200 []").is_empty());
        assert!(extract("!webhook-body [] \"Payload\"").is_empty());

        assert_eq!(single("!body Pet[]|null").attr("schema"), "Pet[]|null");
        let no_content = single(r#"!ok 204 - "Deleted""#);
        assert_eq!(no_content.attr("schema"), "-");
        assert_eq!(no_content.attr("description"), "Deleted");
    }

    #[test]
    fn test_security_groups_by_type() {
        let api_key = single(r#"!security api_key:apiKey:header "API Key authentication""#);
        assert_eq!(api_key.attr("name"), "api_key");
        assert_eq!(api_key.attr("type"), "apiKey");
        assert_eq!(api_key.attr("location"), "header");
        assert_eq!(api_key.attr("url"), "");

        let oauth = single(
            r#"!security petstore_auth:oauth2 "OAuth2" https://petstore.example.com/oauth/authorize"#,
        );
        assert_eq!(oauth.attr("type"), "oauth2");
        assert_eq!(oauth.attr("location"), "");
        assert_eq!(oauth.attr("url"), "https://petstore.example.com/oauth/authorize");
    }

    #[test]
    fn test_scope_and_secure() {
        let scope = single(r#"!scope petstore_auth write:pets "modify pets""#);
        assert_eq!(scope.attr("security"), "petstore_auth");
        assert_eq!(scope.attr("name"), "write:pets");

        let secure = single("!secure petstore_auth   api_key");
        assert_eq!(secure.tags, vec!["petstore_auth", "api_key"]);
        assert_eq!(secure.attr("names"), "petstore_auth,api_key");
    }

    #[test]
    fn test_model_and_field() {
        let model = single(r#"!model "A user entity" allOf=Base"#);
        assert_eq!(model.attr("description"), "A user entity");
        assert_eq!(model.attr("allOf"), "Base");
        assert_eq!(single("!model").attr("description"), "");
        assert!(extract("!modeling things").is_empty());

        let field = single(r#"!field name:string "User name" required example="John Doe""#);
        assert_eq!(field.kind, DirectiveKind::Field);
        assert_eq!(field.attr("name"), "name");
        assert!(field.flag("required"));
        assert_eq!(field.attr("example"), "John Doe");
    }

    #[test]
    fn test_webhooks() {
        let hook = single(r#"!webhook newPet:post "A pet was added""#);
        assert_eq!(hook.attr("name"), "newPet");
        assert_eq!(hook.attr("method"), "post");

        let body = single(r#"!webhook-body Pet "The new pet" required"#);
        assert_eq!(body.kind, DirectiveKind::WebhookBody);
        assert!(body.flag("required"));

        let response = single(r#"!webhook-response 200 Ack "Received""#);
        assert_eq!(response.attr("status"), "200");
    }

    #[test]
    fn test_prose_and_unknown_directives_are_skipped() {
        let text = "Lists the users.\n!unknown thing\n!info missing-quotes\n!api 3.0.3\nMore prose!";
        let annotations = extract(text);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].kind, DirectiveKind::Api);
        assert_eq!(annotations[0].line, 3);
    }

    #[test]
    fn test_block_comment_stars_are_ignored() {
        let annotations = extract("\n * !GET /x -> getX\n * !ok string\n");
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].raw, "!GET /x -> getX");
    }

    #[test]
    fn test_multiple_annotations_keep_order() {
        let text = "!GET /users -> getUsers \"Get users\" #users\n!query limit:integer \"Limit results\"\n!ok User[] \"Success\"";
        let kinds: Vec<_> = extract(text).into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![DirectiveKind::Route, DirectiveKind::Query, DirectiveKind::Ok]);
    }
}

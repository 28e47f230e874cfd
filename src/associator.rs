//! Entity associator.
//!
//! Pairs every declaration of a parsed file with the doc-comment block that
//! immediately precedes it and lexes that block into annotations. The result is
//! one [`ScopeBlock`] per declaration, in source order.

use crate::diagnostics::SourceLocation;
use crate::lexer::{self, Annotation, DirectiveKind};
use crate::parser::ParsedFile;
use log::debug;
use std::fmt;
use std::path::Path;
use syn::spanned::Spanned;
use syn::visit::Visit;
use syn::{AttrStyle, Attribute, Expr, Fields, Lit, Meta};

/// What a block of directives describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeRole {
    /// API-wide metadata: info, servers, tags, security schemes, webhooks
    Document,
    /// A single HTTP operation
    Operation,
    /// A component schema or one of its properties
    Schema,
    /// No directives
    Unscoped,
}

impl ScopeRole {
    /// The role a directive kind belongs to.
    pub fn of(kind: DirectiveKind) -> Self {
        match kind {
            DirectiveKind::Api
            | DirectiveKind::Info
            | DirectiveKind::Contact
            | DirectiveKind::License
            | DirectiveKind::Server
            | DirectiveKind::Tag
            | DirectiveKind::Tos
            | DirectiveKind::Security
            | DirectiveKind::Scope
            | DirectiveKind::ExternalDocs
            | DirectiveKind::Link
            | DirectiveKind::Webhook
            | DirectiveKind::WebhookBody
            | DirectiveKind::WebhookResponse => ScopeRole::Document,
            DirectiveKind::Route
            | DirectiveKind::Query
            | DirectiveKind::Path
            | DirectiveKind::Header
            | DirectiveKind::Cookie
            | DirectiveKind::Body
            | DirectiveKind::Ok
            | DirectiveKind::Error
            | DirectiveKind::Secure => ScopeRole::Operation,
            DirectiveKind::Model | DirectiveKind::Field => ScopeRole::Schema,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeRole::Document => "document",
            ScopeRole::Operation => "operation",
            ScopeRole::Schema => "schema",
            ScopeRole::Unscoped => "unscoped",
        }
    }
}

/// The declaration a block is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Inner docs of a file (`//!`)
    Package,
    Module { name: String },
    /// Free function or method
    Function { name: String },
    /// Struct, enum, union or type alias
    Type { name: String },
    /// Named field of a struct or union
    Field { owner: String, name: String },
}

impl Anchor {
    /// The type a schema block belongs to: the type itself, or a field's owner.
    pub fn schema_owner(&self) -> Option<&str> {
        match self {
            Anchor::Type { name } => Some(name),
            Anchor::Field { owner, .. } => Some(owner),
            _ => None,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Package => f.write_str("file"),
            Anchor::Module { name } => write!(f, "module `{}`", name),
            Anchor::Function { name } => write!(f, "function `{}`", name),
            Anchor::Type { name } => write!(f, "type `{}`", name),
            Anchor::Field { owner, name } => write!(f, "field `{}::{}`", owner, name),
        }
    }
}

/// An annotation together with the source line it was written on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedAnnotation {
    pub annotation: Annotation,
    pub location: SourceLocation,
}

/// The directives attached to one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeBlock {
    pub role: ScopeRole,
    pub anchor: Anchor,
    /// Location of the declaration
    pub location: SourceLocation,
    /// Annotations matching `role`, in line order
    pub annotations: Vec<LocatedAnnotation>,
    /// Annotations of a different role than the first one in the block
    pub stray: Vec<LocatedAnnotation>,
}

impl ScopeBlock {
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.stray.is_empty()
    }
}

/// Walks a parsed file and returns its scope blocks in declaration order.
pub fn associate(file: &ParsedFile) -> Vec<ScopeBlock> {
    let mut collector = BlockCollector::new(&file.path);
    collector.visit_file(&file.syntax_tree);

    debug!(
        "{}: {} declarations, {} with directives",
        file.path.display(),
        collector.blocks.len(),
        collector.blocks.iter().filter(|b| !b.is_empty()).count()
    );

    collector.blocks
}

/// Visitor collecting one block per declaration
struct BlockCollector<'a> {
    path: &'a Path,
    blocks: Vec<ScopeBlock>,
}

impl<'a> BlockCollector<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            blocks: Vec::new(),
        }
    }

    fn push(&mut self, anchor: Anchor, attrs: &[Attribute], inner: bool, line: usize) {
        // Inner docs belong to the enclosing file whatever their spacing
        let docs = if inner {
            doc_attributes(attrs, inner)
        } else {
            last_contiguous_run(doc_attributes(attrs, inner))
        };
        let (text, line_map) = join_docs(&docs);

        let mut annotations = Vec::new();
        let mut stray = Vec::new();
        let mut role = ScopeRole::Unscoped;

        for annotation in lexer::extract(&text) {
            let location = SourceLocation::new(
                self.path,
                line_map.get(annotation.line).copied().unwrap_or(line),
            );
            let kind_role = ScopeRole::of(annotation.kind);
            if role == ScopeRole::Unscoped {
                role = kind_role;
            }

            let located = LocatedAnnotation {
                annotation,
                location,
            };
            if kind_role == role {
                annotations.push(located);
            } else {
                stray.push(located);
            }
        }

        if role != ScopeRole::Unscoped {
            debug!("{} {} block with {} directives", anchor, role.as_str(), annotations.len());
        }

        self.blocks.push(ScopeBlock {
            role,
            anchor,
            location: SourceLocation::new(self.path, line),
            annotations,
            stray,
        });
    }

    fn push_fields(&mut self, owner: &str, fields: &syn::FieldsNamed) {
        for field in &fields.named {
            if let Some(ident) = &field.ident {
                let anchor = Anchor::Field {
                    owner: owner.to_string(),
                    name: ident.to_string(),
                };
                self.push(anchor, &field.attrs, false, line_of(ident));
            }
        }
    }
}

impl<'ast> Visit<'ast> for BlockCollector<'_> {
    fn visit_file(&mut self, node: &'ast syn::File) {
        self.push(Anchor::Package, &node.attrs, true, 1);
        for item in &node.items {
            self.visit_item(item);
        }
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let name = node.sig.ident.to_string();
        self.push(Anchor::Function { name }, &node.attrs, false, line_of(&node.sig.ident));
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let name = node.sig.ident.to_string();
        self.push(Anchor::Function { name }, &node.attrs, false, line_of(&node.sig.ident));
    }

    fn visit_trait_item_fn(&mut self, node: &'ast syn::TraitItemFn) {
        let name = node.sig.ident.to_string();
        self.push(Anchor::Function { name }, &node.attrs, false, line_of(&node.sig.ident));
    }

    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        let name = node.ident.to_string();
        self.push(Anchor::Type { name: name.clone() }, &node.attrs, false, line_of(&node.ident));
        if let Fields::Named(fields) = &node.fields {
            self.push_fields(&name, fields);
        }
    }

    fn visit_item_union(&mut self, node: &'ast syn::ItemUnion) {
        let name = node.ident.to_string();
        self.push(Anchor::Type { name: name.clone() }, &node.attrs, false, line_of(&node.ident));
        self.push_fields(&name, &node.fields);
    }

    fn visit_item_enum(&mut self, node: &'ast syn::ItemEnum) {
        let name = node.ident.to_string();
        self.push(Anchor::Type { name }, &node.attrs, false, line_of(&node.ident));
    }

    fn visit_item_type(&mut self, node: &'ast syn::ItemType) {
        let name = node.ident.to_string();
        self.push(Anchor::Type { name }, &node.attrs, false, line_of(&node.ident));
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        let name = node.ident.to_string();
        self.push(Anchor::Module { name }, &node.attrs, false, line_of(&node.ident));

        // Inline module bodies are walked like the file itself
        if let Some((_, items)) = &node.content {
            for item in items {
                self.visit_item(item);
            }
        }
    }
}

/// One `#[doc]` attribute with the source lines it spans.
#[derive(Debug)]
struct DocAttribute {
    start: usize,
    end: usize,
    text: String,
}

fn line_of<T: Spanned>(node: &T) -> usize {
    node.span().start().line
}

fn doc_attributes(attrs: &[Attribute], inner: bool) -> Vec<DocAttribute> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter(|attr| matches!(attr.style, AttrStyle::Inner(_)) == inner)
        .filter_map(|attr| {
            let Meta::NameValue(meta) = &attr.meta else {
                return None;
            };
            let Expr::Lit(expr) = &meta.value else {
                return None;
            };
            let Lit::Str(text) = &expr.lit else {
                return None;
            };
            let span = attr.span();
            Some(DocAttribute {
                start: span.start().line,
                end: span.end().line,
                text: text.value(),
            })
        })
        .collect()
}

/// Keeps the last run of doc attributes on consecutive lines.
///
/// Line 0 means the span carries no position; such attributes are treated as
/// contiguous with their neighbours.
fn last_contiguous_run(docs: Vec<DocAttribute>) -> Vec<DocAttribute> {
    let mut run: Vec<DocAttribute> = Vec::new();
    for doc in docs {
        let contiguous = match run.last() {
            Some(prev) => prev.end == 0 || doc.start == 0 || doc.start <= prev.end + 1,
            None => true,
        };
        if !contiguous {
            run.clear();
        }
        run.push(doc);
    }
    run
}

/// Joins doc attributes into one text and maps each text line to its source line.
fn join_docs(docs: &[DocAttribute]) -> (String, Vec<usize>) {
    let mut text = String::new();
    let mut lines = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.push_str(&doc.text);
        let count = doc.text.split('\n').count();
        lines.extend((0..count).map(|offset| doc.start + offset));
    }
    (text, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn parse_code(code: &str) -> ParsedFile {
        let syntax_tree = syn::parse_file(code).expect("Failed to parse test code");
        ParsedFile {
            path: PathBuf::from("api.rs"),
            syntax_tree,
        }
    }

    fn kinds(block: &ScopeBlock) -> Vec<DirectiveKind> {
        block.annotations.iter().map(|a| a.annotation.kind).collect()
    }

    #[test]
    fn test_package_docs_form_document_block() {
        let code = "//! !api 3.0.3\n//! !info \"Pets\" v1.0.0\n\nfn main() {}\n";
        let blocks = associate(&parse_code(code));

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].anchor, Anchor::Package);
        assert_eq!(blocks[0].role, ScopeRole::Document);
        assert_eq!(kinds(&blocks[0]), vec![DirectiveKind::Api, DirectiveKind::Info]);
        assert_eq!(blocks[1].role, ScopeRole::Unscoped);
        assert!(blocks[1].is_empty());
    }

    #[test]
    fn test_package_docs_keep_every_paragraph() {
        let code = "//! !api 3.1.0\n//! !info \"T\" v2.0.0\n\n//! !server https://x\n\nfn main() {}\n";
        let blocks = associate(&parse_code(code));

        assert_eq!(
            kinds(&blocks[0]),
            vec![DirectiveKind::Api, DirectiveKind::Info, DirectiveKind::Server]
        );
        let lines: Vec<_> = blocks[0].annotations.iter().map(|a| a.location.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn test_function_block_carries_line_numbers() {
        let code = r#"
/// Lists users.
/// !GET /users -> listUsers "List users" #users
/// !ok User[] "Users"
pub async fn list_users() {}
"#;
        let blocks = associate(&parse_code(code));

        assert_eq!(blocks.len(), 2);
        let block = &blocks[1];
        assert_eq!(block.anchor, Anchor::Function { name: "list_users".to_string() });
        assert_eq!(block.role, ScopeRole::Operation);
        assert_eq!(block.annotations[0].location, SourceLocation::new("api.rs", 3));
        assert_eq!(block.annotations[1].location.line, 4);
        assert_eq!(block.location.line, 5);
    }

    #[test]
    fn test_only_last_contiguous_run_is_used() {
        let code = r#"
/// !GET /old -> oldOp

/// !GET /new -> newOp
fn handler() {}
"#;
        let blocks = associate(&parse_code(code));
        let block = &blocks[1];

        assert_eq!(block.annotations.len(), 1);
        assert_eq!(block.annotations[0].annotation.attr("path"), "/new");
    }

    #[test]
    fn test_struct_fields_get_their_own_blocks() {
        let code = r#"
/// !model "A user"
#[derive(Debug)]
pub struct User {
    /// !field id:int64 "Identifier" required
    pub id: i64,
    pub name: String,
}
"#;
        let blocks = associate(&parse_code(code));

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[1].anchor, Anchor::Type { name: "User".to_string() });
        assert_eq!(kinds(&blocks[1]), vec![DirectiveKind::Model]);
        assert_eq!(
            blocks[2].anchor,
            Anchor::Field {
                owner: "User".to_string(),
                name: "id".to_string()
            }
        );
        assert_eq!(blocks[2].role, ScopeRole::Schema);
        assert_eq!(blocks[3].role, ScopeRole::Unscoped);
    }

    #[test]
    fn test_mixed_roles_move_to_stray() {
        let code = r#"
/// !GET /users -> listUsers
/// !model
/// !ok string
fn list_users() {}
"#;
        let blocks = associate(&parse_code(code));
        let block = &blocks[1];

        assert_eq!(block.role, ScopeRole::Operation);
        assert_eq!(kinds(block), vec![DirectiveKind::Route, DirectiveKind::Ok]);
        assert_eq!(block.stray.len(), 1);
        assert_eq!(block.stray[0].annotation.kind, DirectiveKind::Model);
    }

    #[test]
    fn test_block_doc_comment_lines() {
        let code = "/**\n * !POST /pets -> addPet\n * !body Pet required\n */\nfn add_pet() {}\n";
        let blocks = associate(&parse_code(code));
        let block = &blocks[1];

        assert_eq!(kinds(block), vec![DirectiveKind::Route, DirectiveKind::Body]);
        assert_eq!(block.annotations[0].location.line, 2);
        assert_eq!(block.annotations[1].location.line, 3);
    }

    #[test]
    fn test_methods_enums_and_inline_modules() {
        let code = r#"
/// !tag pets "Pet operations"
mod pets {
    /// !model
    pub enum Status { Available, Sold }

    pub struct Api;

    impl Api {
        /// !DELETE /pets/{id} -> deletePet
        pub fn delete(&self) {}
    }
}
"#;
        let blocks = associate(&parse_code(code));
        let anchors: Vec<_> = blocks.iter().map(|b| b.anchor.to_string()).collect();

        assert_eq!(
            anchors,
            vec!["file", "module `pets`", "type `Status`", "type `Api`", "function `delete`"]
        );
        assert_eq!(blocks[1].role, ScopeRole::Document);
        assert_eq!(blocks[2].role, ScopeRole::Schema);
        assert_eq!(blocks[4].role, ScopeRole::Operation);
    }

    #[test]
    fn test_trait_methods_are_visited() {
        let code = r#"
pub trait PetApi {
    /// !GET /pets -> listPets
    fn list(&self);

    /// !DELETE /pets/{id} -> deletePet
    fn delete(&self) {}
}
"#;
        let blocks = associate(&parse_code(code));
        let anchors: Vec<_> = blocks.iter().map(|b| b.anchor.to_string()).collect();

        assert_eq!(anchors, vec!["file", "function `list`", "function `delete`"]);
        assert_eq!(kinds(&blocks[1]), vec![DirectiveKind::Route]);
        assert_eq!(kinds(&blocks[2]), vec![DirectiveKind::Route]);
    }

    #[test]
    fn test_explicit_doc_attribute_is_read() {
        let code = "#[doc = \"!GET /health -> health\"]\nfn health() {}\n";
        let blocks = associate(&parse_code(code));
        assert_eq!(kinds(&blocks[1]), vec![DirectiveKind::Route]);
    }

    #[test]
    fn test_nested_function_items_are_not_visited() {
        let code = r#"
fn outer() {
    /// !GET /inner -> inner
    fn inner() {}
}
"#;
        let blocks = associate(&parse_code(code));
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].is_empty());
    }
}

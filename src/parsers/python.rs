/// Python structure extraction. Decorated definitions unwrap to their inner
/// def/class; docstrings come from the first statement of a body, falling
/// back to `#` comments above the definition.
use tree_sitter::Node;

use super::walker::{clean_signature, field_text, node_name, Ctx};
use crate::structure::{CodeElement, ElementKind, FileStructure};

pub(crate) fn collect(ctx: &Ctx, root: Node, out: &mut FileStructure) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        collect_top(ctx, child, out, &[]);
    }
}

fn collect_top(ctx: &Ctx, node: Node, out: &mut FileStructure, decorators: &[String]) {
    match node.kind() {
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            let text = clean_signature(ctx.text(node));
            let name = text
                .trim_start_matches("from ")
                .trim_start_matches("import ")
                .split_whitespace()
                .next()
                .unwrap_or(&text)
                .to_string();
            let mut el = element(ctx, node, ElementKind::Import, name);
            el.signature = Some(text);
            out.imports.push(el);
        }
        "decorated_definition" => {
            let decs: Vec<String> = {
                let mut cursor = node.walk();
                node.named_children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .map(|c| ctx.text(c).trim().to_string())
                    .collect()
            };
            if let Some(def) = node.child_by_field_name("definition") {
                collect_top(ctx, def, out, &decs);
            }
        }
        "function_definition" => {
            let mut el = function_element(ctx, node, ElementKind::Function);
            el.decorators = decorators.to_vec();
            out.functions.push(el);
        }
        "class_definition" => {
            let mut el = element(
                ctx,
                node,
                ElementKind::Class,
                node_name(ctx, node).unwrap_or_default(),
            );
            el.signature = Some(ctx.head(node));
            el.documentation = docstring(ctx, node).or_else(|| ctx.doc_before(node));
            el.decorators = decorators.to_vec();
            if let Some(superclasses) = node.child_by_field_name("superclasses") {
                el.extends = ctx
                    .text(superclasses)
                    .trim_matches(['(', ')'])
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            if let Some(body) = node.child_by_field_name("body") {
                class_members(ctx, body, &mut el);
            }
            out.classes.push(el);
        }
        "expression_statement" => {
            // Module-level `NAME = value` assignments.
            let Some(assign) = node.named_child(0).filter(|c| c.kind() == "assignment") else {
                return;
            };
            let Some(left) = assign.child_by_field_name("left") else { return };
            if left.kind() != "identifier" {
                return;
            }
            let mut el = element(ctx, node, ElementKind::Variable, ctx.text(left).to_string());
            let text = ctx.text(node);
            el.signature = Some(clean_signature(text.lines().next().unwrap_or(text)));
            out.variables.push(el);
        }
        _ => {}
    }
}

fn function_element(ctx: &Ctx, node: Node, kind: ElementKind) -> CodeElement {
    let mut el = element(ctx, node, kind, node_name(ctx, node).unwrap_or_default());
    let sig = ctx.head(node);
    el.is_async = sig.starts_with("async ");
    el.signature = Some(sig);
    el.documentation = docstring(ctx, node).or_else(|| ctx.doc_before(node));
    el.return_type = field_text(ctx, node, "return_type");
    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        el.parameters = params
            .named_children(&mut cursor)
            .filter(|p| p.kind() != "comment")
            .map(|p| clean_signature(ctx.text(p)))
            .collect();
    }
    el
}

fn class_members(ctx: &Ctx, body: Node, class_el: &mut CodeElement) {
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        let (def, decorators) = if member.kind() == "decorated_definition" {
            let decs: Vec<String> = {
                let mut inner = member.walk();
                member
                    .named_children(&mut inner)
                    .filter(|c| c.kind() == "decorator")
                    .map(|c| ctx.text(c).trim().to_string())
                    .collect()
            };
            match member.child_by_field_name("definition") {
                Some(d) => (d, decs),
                None => continue,
            }
        } else {
            (member, Vec::new())
        };
        if def.kind() != "function_definition" {
            continue;
        }
        let name = node_name(ctx, def).unwrap_or_default();
        let kind = match name.as_str() {
            "__init__" => ElementKind::Constructor,
            _ if decorators.iter().any(|d| d == "@property") => ElementKind::Getter,
            _ if decorators.iter().any(|d| d.ends_with(".setter")) => ElementKind::Setter,
            _ => ElementKind::Method,
        };
        let mut el = function_element(ctx, def, kind);
        el.is_static = decorators.iter().any(|d| d == "@staticmethod");
        el.decorators = decorators;
        if el.name.starts_with('_') && !el.name.starts_with("__") {
            el.visibility = Some(crate::structure::Visibility::Private);
        }
        class_el.children.push(el);
    }
}

/// First statement of the body when it is a bare string literal.
fn docstring(ctx: &Ctx, def: Node) -> Option<String> {
    let body = def.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let raw = ctx.text(expr);
    let trimmed = raw
        .trim_start_matches(['r', 'b', 'u', 'f'])
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn element(ctx: &Ctx, node: Node, kind: ElementKind, name: String) -> CodeElement {
    CodeElement::new(kind, name, ctx.start_line(node), ctx.end_line(node))
}

#[cfg(test)]
mod tests {
    use crate::parsers::{parse, Language};
    use crate::structure::ElementKind;

    #[test]
    fn test_functions_and_docstrings() {
        let src = r#"import os
from typing import List

async def fetch(url: str) -> bytes:
    """Fetch a URL."""
    return b""

def plain(a, b=2):
    return a + b

LIMIT = 100
"#;
        let fs = parse(src, Language::Python);
        assert_eq!(fs.imports.len(), 2);
        assert_eq!(fs.functions.len(), 2);
        let fetch = &fs.functions[0];
        assert!(fetch.is_async);
        assert_eq!(fetch.documentation.as_deref(), Some("Fetch a URL."));
        assert_eq!(fetch.return_type.as_deref(), Some("bytes"));
        assert_eq!(fs.variables.len(), 1);
        assert_eq!(fs.variables[0].name, "LIMIT");
    }

    #[test]
    fn test_class_with_members() {
        let src = r#"class Store(Base, Mixin):
    """A store."""

    def __init__(self, db):
        self.db = db

    @property
    def size(self):
        return len(self.db)

    @staticmethod
    def make():
        return Store(None)

    def _internal(self):
        pass
"#;
        let fs = parse(src, Language::Python);
        assert_eq!(fs.classes.len(), 1);
        let c = &fs.classes[0];
        assert_eq!(c.extends, vec!["Base", "Mixin"]);
        assert_eq!(c.documentation.as_deref(), Some("A store."));
        let by_name = |n: &str| c.children.iter().find(|m| m.name == n).unwrap();
        assert_eq!(by_name("__init__").kind, ElementKind::Constructor);
        assert_eq!(by_name("size").kind, ElementKind::Getter);
        assert!(by_name("make").is_static);
        assert!(by_name("_internal").visibility.is_some());
    }

    #[test]
    fn test_decorated_function_unwraps() {
        let src = "@app.route('/x')\ndef handler():\n    pass\n";
        let fs = parse(src, Language::Python);
        assert_eq!(fs.functions.len(), 1);
        assert_eq!(fs.functions[0].decorators, vec!["@app.route('/x')"]);
    }

    #[test]
    fn test_unterminated_source_still_bounded() {
        let src = "def broken(:\n    if\nclass Also(\n";
        let fs = parse(src, Language::Python);
        assert_eq!(fs.total_lines, 3);
        for el in fs.all_elements() {
            assert!(el.end_line <= fs.total_lines);
        }
    }
}

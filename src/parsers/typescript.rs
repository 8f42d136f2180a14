/// TypeScript / TSX / JavaScript structure extraction. The three grammars
/// share node kinds, so one collector serves all of them; `typed` gates the
/// TS-only shapes (interfaces, type aliases, enums, ambient blocks).
use tree_sitter::Node;

use super::walker::{clean_signature, field_text, node_name, Ctx};
use crate::structure::{CodeElement, ElementKind, FileStructure, Visibility};

pub(crate) fn collect(ctx: &Ctx, root: Node, out: &mut FileStructure, typed: bool) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        collect_top(ctx, child, out, typed, false, child.start_byte());
    }
}

fn collect_top(
    ctx: &Ctx,
    node: Node,
    out: &mut FileStructure,
    typed: bool,
    exported: bool,
    sig_start: usize,
) {
    match node.kind() {
        "import_statement" => {
            let mut el = element(ctx, node, ElementKind::Import, import_name(ctx, node), sig_start);
            el.signature = Some(clean_signature(ctx.text(node)));
            out.imports.push(el);
        }
        "export_statement" => {
            if let Some(decl) = node.child_by_field_name("declaration") {
                collect_top(ctx, decl, out, typed, true, node.start_byte());
            } else {
                // Re-export form: `export { a, b }` / `export * from './x'`.
                let name = ctx
                    .text(node)
                    .trim_start_matches("export")
                    .trim()
                    .trim_end_matches(';')
                    .to_string();
                let mut el = element(ctx, node, ElementKind::Export, name, sig_start);
                el.is_exported = true;
                el.signature = Some(clean_signature(ctx.text(node)));
                out.exports.push(el);
            }
        }
        "ambient_declaration" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_top(ctx, child, out, typed, exported, child.start_byte());
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            let mut el = function_element(ctx, node, exported, sig_start);
            el.kind = ElementKind::Function;
            out.functions.push(el);
        }
        "class_declaration" | "abstract_class_declaration" => {
            let mut el = element(
                ctx,
                node,
                ElementKind::Class,
                node_name(ctx, node).unwrap_or_default(),
                sig_start,
            );
            el.is_exported = exported;
            el.is_abstract = node.kind() == "abstract_class_declaration";
            el.signature = Some(ctx.head_from(sig_start, node));
            el.documentation = doc_for(ctx, node, exported);
            el.generics = field_text(ctx, node, "type_parameters");
            heritage(ctx, node, &mut el);
            decorators(ctx, node, &mut el);
            if let Some(body) = node.child_by_field_name("body") {
                class_members(ctx, body, &mut el);
            }
            out.classes.push(el);
        }
        "interface_declaration" if typed => {
            let mut el = element(
                ctx,
                node,
                ElementKind::Interface,
                node_name(ctx, node).unwrap_or_default(),
                sig_start,
            );
            el.is_exported = exported;
            el.signature = Some(ctx.head_from(sig_start, node));
            el.documentation = doc_for(ctx, node, exported);
            el.generics = field_text(ctx, node, "type_parameters");
            if let Some(sig) = &el.signature {
                el.extends = heritage_names(sig, "extends");
            }
            out.interfaces.push(el);
        }
        "type_alias_declaration" if typed => {
            let mut el = element(
                ctx,
                node,
                ElementKind::Type,
                node_name(ctx, node).unwrap_or_default(),
                sig_start,
            );
            el.is_exported = exported;
            el.signature = Some(clean_signature(
                &ctx.src[sig_start..node.end_byte().min(ctx.src.len())],
            ));
            el.documentation = doc_for(ctx, node, exported);
            out.types.push(el);
        }
        "enum_declaration" if typed => {
            let mut el = element(
                ctx,
                node,
                ElementKind::Enum,
                node_name(ctx, node).unwrap_or_default(),
                sig_start,
            );
            el.is_exported = exported;
            el.signature = Some(ctx.head_from(sig_start, node));
            el.documentation = doc_for(ctx, node, exported);
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for member in body.named_children(&mut cursor) {
                    let name = match member.kind() {
                        "enum_assignment" => node_name(ctx, member),
                        "property_identifier" | "identifier" | "string" => {
                            Some(ctx.text(member).to_string())
                        }
                        _ => None,
                    };
                    if let Some(name) = name {
                        el.children.push(element_at(ctx, member, ElementKind::EnumMember, name));
                    }
                }
            }
            out.enums.push(el);
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name) = node_name(ctx, declarator) else { continue };
                let value = declarator.child_by_field_name("value");
                let is_fn = value.is_some_and(|v| {
                    matches!(
                        v.kind(),
                        "arrow_function" | "function_expression" | "generator_function" | "function"
                    )
                });
                let kind = if is_fn { ElementKind::Function } else { ElementKind::Variable };
                let mut el = element(ctx, node, kind, name, sig_start);
                el.is_exported = exported;
                el.documentation = doc_for(ctx, node, exported);
                el.signature = Some(declarator_head(ctx, node, value, sig_start));
                el.is_async = el.signature.as_deref().is_some_and(|s| s.contains("async"));
                if is_fn {
                    out.functions.push(el);
                } else {
                    out.variables.push(el);
                }
            }
        }
        _ => {}
    }
}

fn function_element(ctx: &Ctx, node: Node, exported: bool, sig_start: usize) -> CodeElement {
    let mut el = element(
        ctx,
        node,
        ElementKind::Function,
        node_name(ctx, node).unwrap_or_default(),
        sig_start,
    );
    el.is_exported = exported;
    let sig = ctx.head_from(sig_start, node);
    el.is_async = sig.contains("async ");
    el.signature = Some(sig);
    el.documentation = doc_for(ctx, node, exported);
    el.generics = field_text(ctx, node, "type_parameters");
    el.parameters = parameter_list(ctx, node);
    el.return_type = field_text(ctx, node, "return_type")
        .map(|t| t.trim_start_matches(':').trim().to_string());
    el
}

fn class_members(ctx: &Ctx, body: Node, class_el: &mut CodeElement) {
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_definition" | "abstract_method_signature" | "method_signature" => {
                let Some(name) = node_name(ctx, member) else { continue };
                let head = ctx.head(member);
                let kind = if name == "constructor" {
                    ElementKind::Constructor
                } else if has_keyword_child(ctx, member, "get") {
                    ElementKind::Getter
                } else if has_keyword_child(ctx, member, "set") {
                    ElementKind::Setter
                } else {
                    ElementKind::Method
                };
                let mut el = element_at(ctx, member, kind, name);
                el.is_async = head.contains("async ");
                el.is_static = head.starts_with("static ") || head.contains(" static ");
                el.is_abstract = head.contains("abstract ");
                el.visibility = visibility_of(&head);
                el.signature = Some(head);
                el.documentation = ctx.doc_before(member);
                el.parameters = parameter_list(ctx, member);
                class_el.children.push(el);
            }
            "public_field_definition" | "property_signature" => {
                let Some(name) = node_name(ctx, member) else { continue };
                let head = clean_signature(ctx.text(member));
                let mut el = element_at(ctx, member, ElementKind::Property, name);
                el.is_static = head.starts_with("static ");
                el.is_readonly = head.contains("readonly ");
                el.visibility = visibility_of(&head);
                el.signature = Some(head);
                class_el.children.push(el);
            }
            _ => {}
        }
    }
}

// ── Small helpers ─────────────────────────────────────────────────────────────

fn element(ctx: &Ctx, node: Node, kind: ElementKind, name: String, sig_start: usize) -> CodeElement {
    let start_line = ctx.src[..sig_start.min(ctx.src.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count()
        + 1;
    CodeElement::new(kind, name, start_line, ctx.end_line(node))
}

fn element_at(ctx: &Ctx, node: Node, kind: ElementKind, name: String) -> CodeElement {
    CodeElement::new(kind, name, ctx.start_line(node), ctx.end_line(node))
}

fn import_name(ctx: &Ctx, node: Node) -> String {
    field_text(ctx, node, "source")
        .map(|s| s.trim_matches(['"', '\''].as_ref()).to_string())
        .unwrap_or_else(|| clean_signature(ctx.text(node)))
}

fn doc_for(ctx: &Ctx, node: Node, exported: bool) -> Option<String> {
    if exported {
        // Docs sit above the wrapping export statement.
        node.parent().and_then(|p| ctx.doc_before(p))
    } else {
        ctx.doc_before(node)
    }
}

fn parameter_list(ctx: &Ctx, node: Node) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter(|p| p.kind() != "comment")
        .map(|p| clean_signature(ctx.text(p)))
        .collect()
}

fn heritage(ctx: &Ctx, node: Node, el: &mut CodeElement) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "class_heritage" {
            let text = ctx.text(child);
            el.extends = heritage_names(text, "extends");
            el.implements = heritage_names(text, "implements");
        }
    }
}

/// Pull comma-separated names following a heritage keyword out of a
/// signature-ish string.
fn heritage_names(text: &str, keyword: &str) -> Vec<String> {
    let Some(idx) = text.find(keyword) else {
        return Vec::new();
    };
    let rest = &text[idx + keyword.len()..];
    let rest = match keyword {
        "extends" => rest.split("implements").next().unwrap_or(rest),
        _ => rest,
    };
    rest.trim_end_matches('{')
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_'))
        .collect()
}

fn decorators(ctx: &Ctx, node: Node, el: &mut CodeElement) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "decorator" {
            el.decorators.push(ctx.text(child).trim().to_string());
        }
    }
}

fn has_keyword_child(ctx: &Ctx, node: Node, keyword: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .take(4)
        .any(|c| !c.is_named() && ctx.text(c) == keyword)
}

fn visibility_of(head: &str) -> Option<Visibility> {
    if head.starts_with("private") || head.contains(" private ") {
        Some(Visibility::Private)
    } else if head.starts_with("protected") || head.contains(" protected ") {
        Some(Visibility::Protected)
    } else if head.starts_with("public") || head.contains(" public ") {
        Some(Visibility::Public)
    } else {
        None
    }
}

fn declarator_head(ctx: &Ctx, stmt: Node, value: Option<Node>, sig_start: usize) -> String {
    // Cut at the function body when the value is a function, otherwise take
    // the statement's first line.
    if let Some(body) = value.and_then(|v| v.child_by_field_name("body")) {
        return clean_signature(&ctx.src[sig_start..body.start_byte().min(ctx.src.len())]);
    }
    let text = &ctx.src[sig_start..stmt.end_byte().min(ctx.src.len())];
    clean_signature(text.lines().next().unwrap_or(text))
}

#[cfg(test)]
mod tests {
    use crate::parsers::{parse, Language};
    use crate::structure::ElementKind;

    #[test]
    fn test_exported_function_flags() {
        let src = "export async function load(url: string): Promise<void> {}\n";
        let fs = parse(src, Language::TypeScript);
        assert_eq!(fs.functions.len(), 1);
        let f = &fs.functions[0];
        assert_eq!(f.name, "load");
        assert!(f.is_exported);
        assert!(f.is_async);
        assert_eq!(f.return_type.as_deref(), Some("Promise<void>"));
    }

    #[test]
    fn test_class_members_and_heritage() {
        let src = r#"
export class UserStore extends Base implements Store, Disposable {
    private cache: Map<string, User> = new Map();
    static instance: UserStore;

    constructor(db: Db) {
        super();
    }

    async fetch(id: string): Promise<User> {
        return this.cache.get(id);
    }

    get size(): number { return this.cache.size; }
}
"#;
        let fs = parse(src, Language::TypeScript);
        assert_eq!(fs.classes.len(), 1);
        let c = &fs.classes[0];
        assert!(c.is_exported);
        assert_eq!(c.extends, vec!["Base"]);
        assert_eq!(c.implements, vec!["Store", "Disposable"]);
        let kinds: Vec<ElementKind> = c.children.iter().map(|m| m.kind).collect();
        assert!(kinds.contains(&ElementKind::Constructor));
        assert!(kinds.contains(&ElementKind::Method));
        assert!(kinds.contains(&ElementKind::Getter));
        assert!(kinds.contains(&ElementKind::Property));
        let fetch = c.children.iter().find(|m| m.name == "fetch").unwrap();
        assert!(fetch.is_async);
        for m in &c.children {
            assert!(c.start_line <= m.start_line && m.end_line <= c.end_line);
        }
    }

    #[test]
    fn test_arrow_const_is_function_once() {
        let src = "export const handler = async (req: Request) => {\n    return respond(req);\n};\n";
        let fs = parse(src, Language::TypeScript);
        assert_eq!(fs.functions.len(), 1);
        assert!(fs.variables.is_empty());
        let f = &fs.functions[0];
        assert_eq!(f.name, "handler");
        assert!(f.is_exported);
        assert!(f.is_async);
    }

    #[test]
    fn test_interface_enum_type() {
        let src = r#"
interface Shape { area(): number; }
type Alias = Shape | null;
enum Color { Red, Green = 3 }
"#;
        let fs = parse(src, Language::TypeScript);
        assert_eq!(fs.interfaces.len(), 1);
        assert_eq!(fs.types.len(), 1);
        assert_eq!(fs.enums.len(), 1);
        let members: Vec<&str> = fs.enums[0].children.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(members, vec!["Red", "Green"]);
    }

    #[test]
    fn test_imports_and_reexports() {
        let src = "import { a } from './a';\nimport * as b from 'b';\nexport { c } from './c';\n";
        let fs = parse(src, Language::TypeScript);
        assert_eq!(fs.imports.len(), 2);
        assert_eq!(fs.imports[0].name, "./a");
        assert_eq!(fs.exports.len(), 1);
    }

    #[test]
    fn test_plain_js_has_no_interfaces() {
        let src = "function go() {}\nconst n = 1;\n";
        let fs = parse(src, Language::JavaScript);
        assert_eq!(fs.functions.len(), 1);
        assert_eq!(fs.variables.len(), 1);
        assert!(fs.interfaces.is_empty());
    }
}

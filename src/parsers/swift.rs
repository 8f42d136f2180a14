/// Swift structure extraction. The grammar folds class, struct, actor,
/// extension and enum into one declaration kind; the emitted bucket follows
/// the introducer keyword in the signature head.
use tree_sitter::Node;

use super::walker::{clean_signature, node_name, Ctx};
use crate::structure::{CodeElement, ElementKind, FileStructure};

pub(crate) fn collect(ctx: &Ctx, root: Node, out: &mut FileStructure) {
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "import_declaration" => {
                let text = clean_signature(ctx.text(node));
                let name = text.trim_start_matches("import ").to_string();
                let mut el = element(ctx, node, ElementKind::Import, name);
                el.signature = Some(text);
                out.imports.push(el);
            }
            "function_declaration" => {
                out.functions.push(callable(ctx, node, ElementKind::Function));
            }
            "class_declaration" => {
                let head = ctx.head(node);
                let mut el = element(
                    ctx,
                    node,
                    container_kind(&head),
                    node_name(ctx, node).unwrap_or_default(),
                );
                el.documentation = ctx.doc_before(node);
                el.extends = inheritance(&head);
                el.signature = Some(head);
                if let Some(body) = node.child_by_field_name("body") {
                    members(ctx, body, &mut el);
                }
                match el.kind {
                    ElementKind::Enum => out.enums.push(el),
                    _ => out.classes.push(el),
                }
            }
            "protocol_declaration" => {
                let mut el = element(
                    ctx,
                    node,
                    ElementKind::Interface,
                    node_name(ctx, node).unwrap_or_default(),
                );
                el.signature = Some(ctx.head(node));
                el.documentation = ctx.doc_before(node);
                out.interfaces.push(el);
            }
            "typealias_declaration" => {
                let mut el = element(
                    ctx,
                    node,
                    ElementKind::Type,
                    node_name(ctx, node).unwrap_or_default(),
                );
                el.signature = Some(clean_signature(ctx.text(node)));
                out.types.push(el);
            }
            "property_declaration" => {
                let Some(name) = node_name(ctx, node) else { continue };
                let mut el = element(ctx, node, ElementKind::Variable, name);
                let text = ctx.text(node);
                el.signature = Some(clean_signature(text.lines().next().unwrap_or(text)));
                out.variables.push(el);
            }
            _ => {}
        }
    }
}

fn members(ctx: &Ctx, body: Node, container: &mut CodeElement) {
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "function_declaration" => {
                let mut el = callable(ctx, member, ElementKind::Method);
                if el.name == "init" {
                    el.kind = ElementKind::Constructor;
                }
                el.is_static = el
                    .signature
                    .as_deref()
                    .is_some_and(|s| s.contains("static ") || s.contains("class func"));
                container.children.push(el);
            }
            "init_declaration" => {
                let mut el = callable(ctx, member, ElementKind::Constructor);
                el.name = "init".to_string();
                container.children.push(el);
            }
            "property_declaration" => {
                let Some(name) = node_name(ctx, member) else { continue };
                let mut el = element(ctx, member, ElementKind::Property, name);
                let text = ctx.text(member);
                el.signature = Some(clean_signature(text.lines().next().unwrap_or(text)));
                container.children.push(el);
            }
            "enum_entry" => {
                let Some(name) = node_name(ctx, member) else { continue };
                let mut el = element(ctx, member, ElementKind::EnumMember, name);
                el.signature = Some(clean_signature(ctx.text(member)));
                container.children.push(el);
            }
            _ => {}
        }
    }
}

fn callable(ctx: &Ctx, node: Node, kind: ElementKind) -> CodeElement {
    let mut el = element(ctx, node, kind, node_name(ctx, node).unwrap_or_default());
    let head = ctx.head(node);
    el.is_async = head.contains(" async") || head.contains("async ");
    el.signature = Some(head);
    el.documentation = ctx.doc_before(node);
    el
}

fn element(ctx: &Ctx, node: Node, kind: ElementKind, name: impl Into<String>) -> CodeElement {
    CodeElement::new(kind, name, ctx.start_line(node), ctx.end_line(node))
}

fn container_kind(head: &str) -> ElementKind {
    for tok in head.split_whitespace() {
        match tok {
            "enum" => return ElementKind::Enum,
            "class" | "struct" | "actor" | "extension" => return ElementKind::Class,
            _ => continue,
        }
    }
    ElementKind::Class
}

/// Names after the `:` in a declaration head.
fn inheritance(head: &str) -> Vec<String> {
    let Some(idx) = head.find(':') else {
        return Vec::new();
    };
    head[idx + 1..]
        .split(',')
        .map(|s| s.trim().trim_end_matches('{').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::parsers::{parse, Language};
    use crate::structure::ElementKind;

    #[test]
    fn test_struct_and_functions() {
        let src = r#"import Foundation

struct Point: Codable {
    var x: Double
    var y: Double

    func norm() -> Double {
        return (x * x + y * y).squareRoot()
    }
}

func distance(_ a: Point, _ b: Point) -> Double {
    return 0
}
"#;
        let fs = parse(src, Language::Swift);
        assert_eq!(fs.imports.len(), 1);
        assert_eq!(fs.imports[0].name, "Foundation");
        assert_eq!(fs.classes.len(), 1);
        let p = &fs.classes[0];
        assert_eq!(p.name, "Point");
        assert_eq!(p.extends, vec!["Codable"]);
        assert!(p.children.iter().any(|m| m.kind == ElementKind::Method));
        assert!(p.children.iter().any(|m| m.kind == ElementKind::Property));
        assert_eq!(fs.functions.len(), 1);
        assert_eq!(fs.functions[0].name, "distance");
    }

    #[test]
    fn test_enum_bucket() {
        let src = "enum Direction {\n    case north\n    case south\n}\n";
        let fs = parse(src, Language::Swift);
        assert_eq!(fs.enums.len(), 1);
        assert_eq!(fs.enums[0].children.len(), 2);
    }

    #[test]
    fn test_protocol_is_interface() {
        let src = "protocol Drawable {\n    func draw()\n}\n";
        let fs = parse(src, Language::Swift);
        assert_eq!(fs.interfaces.len(), 1);
        assert_eq!(fs.interfaces[0].name, "Drawable");
    }
}

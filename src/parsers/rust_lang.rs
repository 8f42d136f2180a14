/// Rust structure extraction. Structs map to the class bucket, traits to
/// interfaces; inherent and trait impl blocks contribute method children to
/// the matching struct when one exists in the same file.
use tree_sitter::Node;

use super::walker::{clean_signature, field_text, node_name, Ctx};
use crate::structure::{CodeElement, ElementKind, FileStructure, Visibility};

pub(crate) fn collect(ctx: &Ctx, root: Node, out: &mut FileStructure) {
    let mut impl_methods: Vec<(String, CodeElement)> = Vec::new();

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "use_declaration" => {
                let text = clean_signature(ctx.text(node));
                let name = text.trim_start_matches("pub ").trim_start_matches("use ").to_string();
                let mut el = element(ctx, node, ElementKind::Import, name);
                el.signature = Some(text);
                out.imports.push(el);
            }
            "function_item" => {
                let mut el = callable(ctx, node, ElementKind::Function);
                el.parameters = parameter_list(ctx, node);
                el.return_type = field_text(ctx, node, "return_type");
                el.generics = field_text(ctx, node, "type_parameters");
                out.functions.push(el);
            }
            "struct_item" => {
                let mut el = named(ctx, node, ElementKind::Class);
                if let Some(body) = node.child_by_field_name("body") {
                    struct_fields(ctx, body, &mut el);
                }
                out.classes.push(el);
            }
            "enum_item" => {
                let mut el = named(ctx, node, ElementKind::Enum);
                if let Some(body) = node.child_by_field_name("body") {
                    let mut inner = body.walk();
                    for variant in body.named_children(&mut inner) {
                        if variant.kind() != "enum_variant" {
                            continue;
                        }
                        if let Some(name) = node_name(ctx, variant) {
                            let mut v = element(ctx, variant, ElementKind::EnumMember, name);
                            v.signature = Some(clean_signature(ctx.text(variant)));
                            el.children.push(v);
                        }
                    }
                }
                out.enums.push(el);
            }
            "trait_item" => out.interfaces.push(named(ctx, node, ElementKind::Interface)),
            "type_item" => out.types.push(named(ctx, node, ElementKind::Type)),
            "const_item" | "static_item" => {
                let mut el = named(ctx, node, ElementKind::Variable);
                el.signature = Some(clean_signature(ctx.text(node)));
                out.variables.push(el);
            }
            "impl_item" => {
                let target = impl_target(ctx, node);
                if let Some(body) = node.child_by_field_name("body") {
                    let mut inner = body.walk();
                    for item in body.named_children(&mut inner) {
                        if item.kind() != "function_item" {
                            continue;
                        }
                        let mut m = callable(ctx, item, ElementKind::Method);
                        m.parameters = parameter_list(ctx, item);
                        m.return_type = field_text(ctx, item, "return_type");
                        impl_methods.push((target.clone(), m));
                    }
                }
            }
            _ => {}
        }
    }

    // Attach methods to their struct when it lives in this file; orphaned
    // impl targets keep their methods visible in the functions bucket.
    for (target, method) in impl_methods {
        if let Some(class) = out.classes.iter_mut().find(|c| c.name == target) {
            class.start_line = class.start_line.min(method.start_line);
            class.end_line = class.end_line.max(method.end_line);
            class.children.push(method);
        } else {
            out.functions.push(method);
        }
    }
}

fn named(ctx: &Ctx, node: Node, kind: ElementKind) -> CodeElement {
    let mut el = element(ctx, node, kind, node_name(ctx, node).unwrap_or_default());
    el.is_exported = is_pub(ctx, node);
    el.signature = Some(ctx.head(node));
    el.documentation = ctx.doc_before(node);
    el.generics = field_text(ctx, node, "type_parameters");
    el.decorators = attributes(ctx, node);
    el
}

fn callable(ctx: &Ctx, node: Node, kind: ElementKind) -> CodeElement {
    let mut el = named(ctx, node, kind);
    el.is_async = el
        .signature
        .as_deref()
        .is_some_and(|s| s.contains("async fn"));
    if el.is_exported {
        el.visibility = Some(Visibility::Public);
    }
    el
}

fn element(ctx: &Ctx, node: Node, kind: ElementKind, name: String) -> CodeElement {
    CodeElement::new(kind, name, ctx.start_line(node), ctx.end_line(node))
}

fn is_pub(ctx: &Ctx, node: Node) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|c| c.kind() == "visibility_modifier" && ctx.text(c).starts_with("pub"))
}

fn attributes(ctx: &Ctx, node: Node) -> Vec<String> {
    let mut attrs = Vec::new();
    let mut cursor = node;
    while let Some(prev) = cursor.prev_sibling() {
        if prev.kind() != "attribute_item" {
            break;
        }
        attrs.push(ctx.text(prev).trim().to_string());
        cursor = prev;
    }
    attrs.reverse();
    attrs
}

fn parameter_list(ctx: &Ctx, node: Node) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter(|p| !p.kind().contains("comment"))
        .map(|p| clean_signature(ctx.text(p)))
        .collect()
}

fn struct_fields(ctx: &Ctx, body: Node, el: &mut CodeElement) {
    let mut cursor = body.walk();
    for field in body.named_children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let Some(name) = node_name(ctx, field) else { continue };
        let mut f = element(ctx, field, ElementKind::Property, name);
        f.is_exported = is_pub(ctx, field);
        f.signature = Some(clean_signature(ctx.text(field)));
        f.documentation = ctx.doc_before(field);
        el.children.push(f);
    }
}

/// The `Type` in `impl Type` / `impl Trait for Type`, generics stripped.
fn impl_target(ctx: &Ctx, node: Node) -> String {
    let text = field_text(ctx, node, "type").unwrap_or_default();
    text.split('<').next().unwrap_or(&text).trim().to_string()
}

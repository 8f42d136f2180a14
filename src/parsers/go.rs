/// Go structure extraction. Exported-ness follows the capitalization rule;
/// methods keep their receiver in the signature and land in `functions` with
/// the method kind.
use tree_sitter::Node;

use super::walker::{clean_signature, field_text, node_name, Ctx};
use crate::structure::{CodeElement, ElementKind, FileStructure};

pub(crate) fn collect(ctx: &Ctx, root: Node, out: &mut FileStructure) {
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "import_declaration" => imports(ctx, node, out),
            "function_declaration" => {
                let mut el = callable(ctx, node, ElementKind::Function);
                el.parameters = parameter_list(ctx, node);
                el.return_type = field_text(ctx, node, "result");
                out.functions.push(el);
            }
            "method_declaration" => {
                let mut el = callable(ctx, node, ElementKind::Method);
                el.parameters = parameter_list(ctx, node);
                el.return_type = field_text(ctx, node, "result");
                out.functions.push(el);
            }
            "type_declaration" => {
                let mut inner = node.walk();
                for spec in node.named_children(&mut inner) {
                    if !matches!(spec.kind(), "type_spec" | "type_alias") {
                        continue;
                    }
                    let Some(name) = node_name(ctx, spec) else { continue };
                    let underlying = spec.child_by_field_name("type");
                    let kind = match underlying.map(|t| t.kind()) {
                        Some("struct_type") => ElementKind::Class,
                        Some("interface_type") => ElementKind::Interface,
                        _ => ElementKind::Type,
                    };
                    let mut el =
                        CodeElement::new(kind, &name, ctx.start_line(node), ctx.end_line(node));
                    el.is_exported = is_exported(&el.name);
                    el.documentation = ctx.doc_before(node);
                    el.signature = Some(head_of_spec(ctx, spec, underlying));
                    if kind == ElementKind::Class {
                        if let Some(body) = underlying {
                            struct_fields(ctx, body, &mut el);
                        }
                    }
                    match kind {
                        ElementKind::Class => out.classes.push(el),
                        ElementKind::Interface => out.interfaces.push(el),
                        _ => out.types.push(el),
                    }
                }
            }
            "const_declaration" | "var_declaration" => {
                let mut inner = node.walk();
                for spec in node.named_children(&mut inner) {
                    if !matches!(spec.kind(), "const_spec" | "var_spec") {
                        continue;
                    }
                    let Some(name) = node_name(ctx, spec) else { continue };
                    let mut el = CodeElement::new(
                        ElementKind::Variable,
                        &name,
                        ctx.start_line(spec),
                        ctx.end_line(spec),
                    );
                    el.is_exported = is_exported(&el.name);
                    el.signature = Some(clean_signature(ctx.text(spec)));
                    out.variables.push(el);
                }
            }
            _ => {}
        }
    }
}

fn imports(ctx: &Ctx, node: Node, out: &mut FileStructure) {
    let mut found = false;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let specs: Vec<Node> = if child.kind() == "import_spec_list" {
            let mut inner = child.walk();
            child.named_children(&mut inner).collect()
        } else if child.kind() == "import_spec" {
            vec![child]
        } else {
            continue;
        };
        for spec in specs {
            if spec.kind() != "import_spec" {
                continue;
            }
            found = true;
            let path = field_text(ctx, spec, "path")
                .unwrap_or_else(|| ctx.text(spec).to_string());
            let mut el = CodeElement::new(
                ElementKind::Import,
                path.trim_matches('"'),
                ctx.start_line(spec),
                ctx.end_line(spec),
            );
            el.signature = Some(format!("import {}", clean_signature(ctx.text(spec))));
            out.imports.push(el);
        }
    }
    if !found {
        let mut el = CodeElement::new(
            ElementKind::Import,
            clean_signature(ctx.text(node)),
            ctx.start_line(node),
            ctx.end_line(node),
        );
        el.signature = Some(clean_signature(ctx.text(node)));
        out.imports.push(el);
    }
}

fn callable(ctx: &Ctx, node: Node, kind: ElementKind) -> CodeElement {
    let name = node_name(ctx, node).unwrap_or_default();
    let mut el = CodeElement::new(kind, &name, ctx.start_line(node), ctx.end_line(node));
    el.is_exported = is_exported(&el.name);
    el.signature = Some(ctx.head(node));
    el.documentation = ctx.doc_before(node);
    el
}

fn parameter_list(ctx: &Ctx, node: Node) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter(|p| p.kind() == "parameter_declaration" || p.kind() == "variadic_parameter_declaration")
        .map(|p| clean_signature(ctx.text(p)))
        .collect()
}

fn struct_fields(ctx: &Ctx, struct_type: Node, el: &mut CodeElement) {
    let mut cursor = struct_type.walk();
    for child in struct_type.named_children(&mut cursor) {
        if child.kind() != "field_declaration_list" {
            continue;
        }
        let mut inner = child.walk();
        for field in child.named_children(&mut inner) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let Some(name) = node_name(ctx, field) else { continue };
            let mut f = CodeElement::new(
                ElementKind::Property,
                &name,
                ctx.start_line(field),
                ctx.end_line(field),
            );
            f.is_exported = is_exported(&f.name);
            f.signature = Some(clean_signature(ctx.text(field)));
            el.children.push(f);
        }
    }
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

fn head_of_spec(ctx: &Ctx, spec: Node, underlying: Option<Node>) -> String {
    // For struct/interface types, cut before the member block.
    if let Some(t) = underlying {
        if matches!(t.kind(), "struct_type" | "interface_type") {
            let cut = ctx
                .text(t)
                .find('{')
                .map(|i| t.start_byte() + i)
                .unwrap_or(t.end_byte());
            return format!(
                "type {}",
                clean_signature(&ctx.src[spec.start_byte()..cut.min(ctx.src.len())])
            );
        }
    }
    format!("type {}", clean_signature(ctx.text(spec)))
}

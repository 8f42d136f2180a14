/// PHP structure extraction. Works with or without the `<?php` tag (the
/// grammar is chosen in `Language::grammar`); traits count as classes.
use tree_sitter::Node;

use super::walker::{clean_signature, field_text, node_name, Ctx};
use crate::structure::{CodeElement, ElementKind, FileStructure, Visibility};

pub(crate) fn collect(ctx: &Ctx, root: Node, out: &mut FileStructure) {
    walk_program(ctx, root, out);
}

fn walk_program(ctx: &Ctx, node: Node, out: &mut FileStructure) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            // Statements can sit inside the top-level `text_interpolation`/
            // `php_tag` wrappers; recurse one level where needed.
            "program" | "text_interpolation" => walk_program(ctx, child, out),
            "namespace_use_declaration" => {
                let text = clean_signature(ctx.text(child));
                let name = text.trim_start_matches("use ").to_string();
                let mut el = element(ctx, child, ElementKind::Import, name);
                el.signature = Some(text);
                out.imports.push(el);
            }
            "function_definition" => {
                let mut el = callable(ctx, child, ElementKind::Function);
                el.parameters = parameter_list(ctx, child);
                el.return_type = field_text(ctx, child, "return_type")
                    .map(|t| t.trim_start_matches(':').trim().to_string());
                out.functions.push(el);
            }
            "class_declaration" | "trait_declaration" => {
                let mut el = element(
                    ctx,
                    child,
                    ElementKind::Class,
                    node_name(ctx, child).unwrap_or_default(),
                );
                el.signature = Some(ctx.head(child));
                el.documentation = ctx.doc_before(child);
                el.is_abstract = el
                    .signature
                    .as_deref()
                    .is_some_and(|s| s.starts_with("abstract "));
                if let Some(base) = child.child_by_field_name("base_clause") {
                    el.extends = name_list(ctx.text(base).trim_start_matches("extends"));
                }
                let mut inner = child.walk();
                for part in child.named_children(&mut inner) {
                    if part.kind() == "class_interface_clause" {
                        el.implements = name_list(ctx.text(part).trim_start_matches("implements"));
                    }
                }
                if let Some(body) = child.child_by_field_name("body") {
                    class_members(ctx, body, &mut el);
                }
                out.classes.push(el);
            }
            "interface_declaration" => {
                let mut el = element(
                    ctx,
                    child,
                    ElementKind::Interface,
                    node_name(ctx, child).unwrap_or_default(),
                );
                el.signature = Some(ctx.head(child));
                el.documentation = ctx.doc_before(child);
                out.interfaces.push(el);
            }
            "enum_declaration" => {
                let mut el = element(
                    ctx,
                    child,
                    ElementKind::Enum,
                    node_name(ctx, child).unwrap_or_default(),
                );
                el.signature = Some(ctx.head(child));
                if let Some(body) = child.child_by_field_name("body") {
                    let mut inner = body.walk();
                    for case in body.named_children(&mut inner) {
                        if case.kind() != "enum_case" {
                            continue;
                        }
                        if let Some(name) = node_name(ctx, case) {
                            el.children.push(element(ctx, case, ElementKind::EnumMember, name));
                        }
                    }
                }
                out.enums.push(el);
            }
            "const_declaration" => {
                let text = clean_signature(ctx.text(child));
                let name = text
                    .trim_start_matches("const ")
                    .split(['=', ' '])
                    .next()
                    .unwrap_or("")
                    .to_string();
                let mut el = element(ctx, child, ElementKind::Variable, name);
                el.signature = Some(text);
                out.variables.push(el);
            }
            _ => {}
        }
    }
}

fn class_members(ctx: &Ctx, body: Node, class_el: &mut CodeElement) {
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_declaration" => {
                let Some(name) = node_name(ctx, member) else { continue };
                let kind = if name == "__construct" {
                    ElementKind::Constructor
                } else {
                    ElementKind::Method
                };
                let mut el = callable(ctx, member, kind);
                el.parameters = parameter_list(ctx, member);
                el.visibility = visibility_of(el.signature.as_deref().unwrap_or(""));
                el.is_static = el
                    .signature
                    .as_deref()
                    .is_some_and(|s| s.contains("static "));
                class_el.children.push(el);
            }
            "property_declaration" => {
                let text = clean_signature(ctx.text(member));
                let name = text
                    .split('$')
                    .nth(1)
                    .and_then(|s| s.split([' ', '=', ';']).next())
                    .unwrap_or("")
                    .to_string();
                if name.is_empty() {
                    continue;
                }
                let mut el = element(ctx, member, ElementKind::Property, name);
                el.visibility = visibility_of(&text);
                el.is_static = text.contains("static ");
                el.signature = Some(text);
                class_el.children.push(el);
            }
            _ => {}
        }
    }
}

fn callable(ctx: &Ctx, node: Node, kind: ElementKind) -> CodeElement {
    let mut el = element(ctx, node, kind, node_name(ctx, node).unwrap_or_default());
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
        .filter(|p| p.kind().ends_with("parameter"))
        .map(|p| clean_signature(ctx.text(p)))
        .collect()
}

fn element(ctx: &Ctx, node: Node, kind: ElementKind, name: impl Into<String>) -> CodeElement {
    CodeElement::new(kind, name, ctx.start_line(node), ctx.end_line(node))
}

fn name_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn visibility_of(head: &str) -> Option<Visibility> {
    if head.contains("private") {
        Some(Visibility::Private)
    } else if head.contains("protected") {
        Some(Visibility::Protected)
    } else if head.contains("public") {
        Some(Visibility::Public)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::parsers::{parse, Language};
    use crate::structure::ElementKind;

    #[test]
    fn test_class_with_members() {
        let src = r#"<?php

use App\Models\User;

class UserRepository extends Repository implements Contract
{
    private array $cache = [];

    public function __construct(private Db $db)
    {
    }

    public static function make(): self
    {
        return new self(Db::connect());
    }

    protected function find(int $id): ?User
    {
        return $this->cache[$id] ?? null;
    }
}
"#;
        let fs = parse(src, Language::Php);
        assert_eq!(fs.imports.len(), 1);
        assert_eq!(fs.classes.len(), 1);
        let c = &fs.classes[0];
        assert_eq!(c.name, "UserRepository");
        assert_eq!(c.extends, vec!["Repository"]);
        assert_eq!(c.implements, vec!["Contract"]);
        let ctor = c.children.iter().find(|m| m.kind == ElementKind::Constructor);
        assert!(ctor.is_some());
        let make = c.children.iter().find(|m| m.name == "make").unwrap();
        assert!(make.is_static);
        let cache = c.children.iter().find(|m| m.name == "cache").unwrap();
        assert_eq!(cache.kind, ElementKind::Property);
    }

    #[test]
    fn test_tagless_source_parses() {
        let src = "function greet(string $name): string\n{\n    return \"hi $name\";\n}\n";
        let fs = parse(src, Language::Php);
        assert_eq!(fs.functions.len(), 1);
        assert_eq!(fs.functions[0].name, "greet");
    }

    #[test]
    fn test_enum_cases() {
        let src = "<?php\nenum Status {\n    case Active;\n    case Archived;\n}\n";
        let fs = parse(src, Language::Php);
        assert_eq!(fs.enums.len(), 1);
        assert_eq!(fs.enums[0].children.len(), 2);
    }
}

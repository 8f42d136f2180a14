/// AST parsing — uniform `FileStructure` extraction across seven languages.
///
/// Every language goes through one tree-sitter pass plus one walk, so work is
/// bounded by O(|source|) even for unterminated constructs (tree-sitter error
/// recovery produces a tree either way). Language modules translate grammar
/// node kinds into `CodeElement`s; the shared walker owns line math,
/// signature heads and doc-comment capture.
///
/// Public contract per language: `parse`, `extract`, `search`, `skeleton`.
/// Unknown languages never error — they produce an empty structure with
/// `total_lines` still set.
mod go;
mod php;
mod python;
mod rust_lang;
mod swift;
mod typescript;
mod walker;

use serde::{Deserialize, Serialize};

use crate::structure::{CodeElement, ElementKind, ExtractedContent, FileStructure};

pub(crate) use walker::Ctx;

// ── Language tag ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Go,
    Rust,
    Php,
    Swift,
}

impl Language {
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit('.').next()?;
        match ext {
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "py" | "pyi" => Some(Self::Python),
            "go" => Some(Self::Go),
            "rs" => Some(Self::Rust),
            "php" => Some(Self::Php),
            "swift" => Some(Self::Swift),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "javascript" | "js" | "jsx" => Some(Self::JavaScript),
            "python" | "py" => Some(Self::Python),
            "go" | "golang" => Some(Self::Go),
            "rust" | "rs" => Some(Self::Rust),
            "php" => Some(Self::Php),
            "swift" => Some(Self::Swift),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Php => "php",
            Self::Swift => "swift",
        }
    }

    fn grammar(&self, source: &str) -> tree_sitter::Language {
        match self {
            Self::TypeScript => tree_sitter::Language::new(tree_sitter_typescript::LANGUAGE_TYPESCRIPT),
            Self::Tsx => tree_sitter::Language::new(tree_sitter_typescript::LANGUAGE_TSX),
            Self::JavaScript => tree_sitter::Language::new(tree_sitter_javascript::LANGUAGE),
            Self::Python => tree_sitter::Language::new(tree_sitter_python::LANGUAGE),
            Self::Go => tree_sitter::Language::new(tree_sitter_go::LANGUAGE),
            // Sources without a <?php tag parse under the tag-free grammar.
            Self::Php => {
                if source.contains("<?php") {
                    tree_sitter::Language::new(tree_sitter_php::LANGUAGE_PHP)
                } else {
                    tree_sitter::Language::new(tree_sitter_php::LANGUAGE_PHP_ONLY)
                }
            }
            Self::Rust => tree_sitter::Language::new(tree_sitter_rust::LANGUAGE),
            Self::Swift => tree_sitter::Language::new(tree_sitter_swift::LANGUAGE),
        }
    }
}

// ── Parse ─────────────────────────────────────────────────────────────────────

/// Parse a whole file into its structure. Parser construction or grammar
/// failures degrade to an empty structure — callers always get totals.
pub fn parse(content: &str, language: Language) -> FileStructure {
    let total_lines = content.lines().count();
    let mut out = FileStructure::empty(language.as_str(), total_lines);

    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&language.grammar(content)).is_err() {
        return out;
    }
    let Some(tree) = parser.parse(content, None) else {
        return out;
    };

    let ctx = Ctx::new(content);
    let root = tree.root_node();
    match language {
        Language::TypeScript | Language::Tsx => typescript::collect(&ctx, root, &mut out, true),
        Language::JavaScript => typescript::collect(&ctx, root, &mut out, false),
        Language::Python => python::collect(&ctx, root, &mut out),
        Language::Go => go::collect(&ctx, root, &mut out),
        Language::Rust => rust_lang::collect(&ctx, root, &mut out),
        Language::Php => php::collect(&ctx, root, &mut out),
        Language::Swift => swift::collect(&ctx, root, &mut out),
    }
    clamp_ranges(&mut out, total_lines);
    out
}

/// Parse with a caller-supplied language name; unknown names yield an empty
/// structure tagged with the name as given.
pub fn parse_named(content: &str, language: &str) -> FileStructure {
    match Language::from_name(language) {
        Some(lang) => parse(content, lang),
        None => FileStructure::empty(language, content.lines().count()),
    }
}

/// Keep every emitted range inside `[1, total_lines]`.
fn clamp_ranges(out: &mut FileStructure, total_lines: usize) {
    let total = total_lines.max(1);
    let clamp = |els: &mut Vec<CodeElement>| {
        for el in els.iter_mut() {
            el.start_line = el.start_line.clamp(1, total);
            el.end_line = el.end_line.clamp(el.start_line, total);
            for child in el.children.iter_mut() {
                child.start_line = child.start_line.clamp(el.start_line, el.end_line);
                child.end_line = child.end_line.clamp(child.start_line, el.end_line);
            }
        }
    };
    clamp(&mut out.imports);
    clamp(&mut out.exports);
    clamp(&mut out.functions);
    clamp(&mut out.classes);
    clamp(&mut out.interfaces);
    clamp(&mut out.types);
    clamp(&mut out.variables);
    clamp(&mut out.enums);
}

// ── Extract ───────────────────────────────────────────────────────────────────

/// Return the source slice for one named element, or None when absent.
/// `kind` narrows the match; `include_imports` prepends the file's import
/// lines so the slice stays self-describing.
pub fn extract(
    content: &str,
    language: Language,
    kind: Option<ElementKind>,
    name: &str,
    include_imports: bool,
) -> Option<ExtractedContent> {
    let structure = parse(content, language);
    let element = find_element(&structure, kind, name)?.clone();

    let lines: Vec<&str> = content.lines().collect();
    let start = element.start_line.saturating_sub(1).min(lines.len());
    let end = element.end_line.min(lines.len());
    let slice = lines[start..end].join("\n");

    let imports = if include_imports && !structure.imports.is_empty() {
        let mut block = String::new();
        for imp in &structure.imports {
            let s = imp.start_line.saturating_sub(1).min(lines.len());
            let e = imp.end_line.min(lines.len());
            if s < e {
                if !block.is_empty() {
                    block.push('\n');
                }
                block.push_str(&lines[s..e].join("\n"));
            }
        }
        (!block.is_empty()).then_some(block)
    } else {
        None
    };

    Some(ExtractedContent {
        element,
        content: slice,
        imports,
    })
}

fn find_element<'a>(
    structure: &'a FileStructure,
    kind: Option<ElementKind>,
    name: &str,
) -> Option<&'a CodeElement> {
    let matches = |el: &CodeElement| el.name == name && kind.is_none_or(|k| el.kind == k);
    for el in structure.all_elements() {
        if matches(el) {
            return Some(el);
        }
        if let Some(child) = el.children.iter().find(|c| matches(c)) {
            return Some(child);
        }
    }
    None
}

// ── Search ────────────────────────────────────────────────────────────────────

/// Case-insensitive substring match over element names, children included.
pub fn search(content: &str, language: Language, query: &str) -> Vec<CodeElement> {
    let needle = query.to_lowercase();
    let structure = parse(content, language);
    let mut hits = Vec::new();
    for el in structure.all_elements() {
        if el.name.to_lowercase().contains(&needle) {
            hits.push(el.clone());
        }
        for child in &el.children {
            if child.name.to_lowercase().contains(&needle) {
                hits.push(child.clone());
            }
        }
    }
    hits
}

// ── Skeleton ──────────────────────────────────────────────────────────────────

const MAX_SKELETON_IMPORTS: usize = 5;

/// Signature outline: up to five import lines, then every class, interface,
/// type, enum and function head in source order, blank-line separated. No
/// bodies, no documentation.
pub fn skeleton(content: &str, language: Language) -> String {
    let structure = parse(content, language);
    let mut sections: Vec<String> = Vec::new();

    for imp in structure.imports.iter().take(MAX_SKELETON_IMPORTS) {
        if let Some(sig) = &imp.signature {
            sections.push(sig.clone());
        }
    }

    let mut heads: Vec<&CodeElement> = structure
        .classes
        .iter()
        .chain(&structure.interfaces)
        .chain(&structure.types)
        .chain(&structure.enums)
        .chain(&structure.functions)
        .collect();
    heads.sort_by_key(|el| el.start_line);

    for el in heads {
        if let Some(sig) = &el.signature {
            sections.push(sig.clone());
        } else {
            sections.push(el.name.clone());
        }
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path("src/app.tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_path("main.go"), Some(Language::Go));
        assert_eq!(Language::from_path("x.rb"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn test_unknown_language_keeps_totals() {
        let fs = parse_named("a\nb\nc", "ruby");
        assert_eq!(fs.total_lines, 3);
        assert_eq!(fs.element_count(), 0);
        assert_eq!(fs.language, "ruby");
    }

    #[test]
    fn test_ts_skeleton_exact_signature() {
        let src = "export async function foo<T extends string>(x: T, y?: number): Promise<T> { return x; }";
        let out = skeleton(src, Language::TypeScript);
        assert_eq!(
            out,
            "export async function foo<T extends string>(x: T, y?: number): Promise<T>"
        );
        assert!(!out.contains('{'));
    }

    #[test]
    fn test_duplicate_names_both_appear() {
        let src = "function f() {}\nfunction f() {}\n";
        let fs = parse(src, Language::JavaScript);
        assert_eq!(fs.functions.len(), 2);
        assert!(fs.functions[0].start_line < fs.functions[1].start_line);
    }

    #[test]
    fn test_extract_by_name() {
        let src = "import os\n\ndef first():\n    pass\n\ndef second():\n    return 1\n";
        let got = extract(src, Language::Python, None, "second", true).unwrap();
        assert!(got.content.contains("def second"));
        assert!(!got.content.contains("def first"));
        assert_eq!(got.imports.as_deref(), Some("import os"));
    }

    #[test]
    fn test_extract_missing_is_none() {
        assert!(extract("def a():\n    pass\n", Language::Python, None, "zzz", false).is_none());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let src = "def FetchUser():\n    pass\n\ndef store():\n    pass\n";
        let hits = search(src, Language::Python, "fetch");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "FetchUser");
    }

    #[test]
    fn test_ranges_within_file() {
        let src = "fn a() {}\n\nstruct B {\n    x: u32,\n}\n";
        let fs = parse(src, Language::Rust);
        for el in fs.all_elements() {
            assert!(el.start_line >= 1 && el.end_line <= fs.total_lines);
            assert!(el.start_line <= el.end_line);
        }
    }

    #[test]
    fn test_mixed_line_endings() {
        let src = "fn a() {}\r\nfn b() {}\n";
        let fs = parse(src, Language::Rust);
        assert_eq!(fs.functions.len(), 2);
        assert_eq!(fs.functions[1].start_line, 2);
    }
}

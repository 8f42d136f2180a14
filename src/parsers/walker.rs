/// Shared walking machinery for the language modules: line math, signature
/// heads, doc-comment capture. Keeps every module down to a node-kind match.
use tree_sitter::Node;

/// Longest signature we will emit before truncating with `...`.
const MAX_SIGNATURE_CHARS: usize = 200;

pub(crate) struct Ctx<'a> {
    pub src: &'a str,
}

impl<'a> Ctx<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn text(&self, node: Node) -> &'a str {
        &self.src[node.start_byte()..node.end_byte().min(self.src.len())]
    }

    /// 1-indexed first line of a node.
    pub fn start_line(&self, node: Node) -> usize {
        node.start_position().row + 1
    }

    /// 1-indexed inclusive last line. A node ending exactly at a line break
    /// reports the break's row; pull that back onto the last content line.
    pub fn end_line(&self, node: Node) -> usize {
        let pos = node.end_position();
        if pos.column == 0 && pos.row > node.start_position().row {
            pos.row
        } else {
            pos.row + 1
        }
    }

    /// Signature head: source text from `start` up to the node's body (or
    /// the full first line when there is no body), whitespace-normalized.
    pub fn head_from(&self, start_byte: usize, node: Node) -> String {
        let end = node
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or_else(|| node.end_byte());
        let raw = &self.src[start_byte.min(end)..end.min(self.src.len())];
        clean_signature(raw)
    }

    pub fn head(&self, node: Node) -> String {
        self.head_from(node.start_byte(), node)
    }

    /// Contiguous comment block immediately above `node`, if any.
    pub fn doc_before(&self, node: Node) -> Option<String> {
        let mut lines: Vec<String> = Vec::new();
        let mut cursor = node;
        let mut expected = node.start_position().row;
        while let Some(prev) = cursor.prev_sibling() {
            if !prev.kind().contains("comment") {
                break;
            }
            let gap = expected.saturating_sub(prev.end_position().row);
            if gap > 1 {
                break;
            }
            lines.push(self.text(prev).trim().to_string());
            expected = prev.start_position().row;
            cursor = prev;
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }
}

/// Normalize a raw signature slice: single-space internal whitespace runs
/// that span newlines, strip a trailing opening brace, cap the length.
pub(crate) fn clean_signature(raw: &str) -> String {
    let mut s = String::with_capacity(raw.len().min(MAX_SIGNATURE_CHARS + 3));
    let mut in_ws = false;
    for ch in raw.chars() {
        if ch == '\n' || ch == '\r' || ch == '\t' || ch == ' ' {
            if !in_ws && !s.is_empty() {
                s.push(' ');
            }
            in_ws = true;
        } else {
            in_ws = false;
            s.push(ch);
        }
    }
    let mut s = s.trim().trim_end_matches('{').trim_end().to_string();
    if s.ends_with(';') || s.ends_with(':') {
        s.pop();
        s = s.trim_end().to_string();
    }
    if s.chars().count() > MAX_SIGNATURE_CHARS {
        s = s.chars().take(MAX_SIGNATURE_CHARS).collect();
        s.push_str("...");
    }
    s
}

/// Name via the grammar's `name` field, with a fallback to the first
/// identifier-looking named child.
pub(crate) fn node_name(ctx: &Ctx, node: Node) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(ctx.text(name).to_string());
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind().contains("identifier") {
            return Some(ctx.text(child).to_string());
        }
    }
    None
}

/// Field text helper.
pub(crate) fn field_text(ctx: &Ctx, node: Node, field: &str) -> Option<String> {
    node.child_by_field_name(field).map(|n| ctx.text(n).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_signature_strips_brace_and_collapses() {
        assert_eq!(
            clean_signature("fn foo(\n    a: u32,\n) -> u32 {"),
            "fn foo( a: u32, ) -> u32"
        );
        assert_eq!(clean_signature("def f():"), "def f()");
        assert_eq!(clean_signature("type A = B;"), "type A = B");
    }

    #[test]
    fn test_clean_signature_truncates_long_types() {
        let long = format!("type T = {}", "A | ".repeat(100));
        let out = clean_signature(&long);
        assert!(out.ends_with("..."));
        assert!(out.chars().count() <= 203);
    }
}

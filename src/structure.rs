/// Parsed-code data model — named elements extracted from source files.
///
/// A `FileStructure` owns every `CodeElement` produced by one parse; elements
/// are plain values, ordered by source position. Line ranges are 1-indexed
/// and inclusive, and always lie within `[1, total_lines]`.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Function,
    Class,
    Interface,
    Type,
    Variable,
    Import,
    Export,
    Method,
    Enum,
    EnumMember,
    Property,
    Getter,
    Setter,
    Constructor,
}

impl ElementKind {
    /// Parse the wire form ("function", "enum_member", ...).
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "type" => Some(Self::Type),
            "variable" => Some(Self::Variable),
            "import" => Some(Self::Import),
            "export" => Some(Self::Export),
            "method" => Some(Self::Method),
            "enum" => Some(Self::Enum),
            "enum_member" => Some(Self::EnumMember),
            "property" => Some(Self::Property),
            "getter" => Some(Self::Getter),
            "setter" => Some(Self::Setter),
            "constructor" => Some(Self::Constructor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

/// One named region of a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeElement {
    pub kind: ElementKind,
    pub name: String,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_exported: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generics: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CodeElement>,
}

impl CodeElement {
    pub fn new(kind: ElementKind, name: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            kind,
            name: name.into(),
            start_line,
            end_line: end_line.max(start_line),
            signature: None,
            documentation: None,
            is_exported: false,
            is_async: false,
            is_static: false,
            is_abstract: false,
            is_readonly: false,
            visibility: None,
            decorators: Vec::new(),
            generics: None,
            parameters: Vec::new(),
            return_type: None,
            extends: Vec::new(),
            implements: Vec::new(),
            children: Vec::new(),
        }
    }

    /// True when `other`'s line range lies within this element's range.
    pub fn contains(&self, other: &CodeElement) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }
}

/// Result of parsing one source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStructure {
    pub language: String,
    pub total_lines: usize,
    pub imports: Vec<CodeElement>,
    pub exports: Vec<CodeElement>,
    pub functions: Vec<CodeElement>,
    pub classes: Vec<CodeElement>,
    pub interfaces: Vec<CodeElement>,
    pub types: Vec<CodeElement>,
    pub variables: Vec<CodeElement>,
    pub enums: Vec<CodeElement>,
}

impl FileStructure {
    pub fn empty(language: &str, total_lines: usize) -> Self {
        Self {
            language: language.to_string(),
            total_lines,
            ..Default::default()
        }
    }

    /// All top-level elements in one pass, in category order.
    pub fn all_elements(&self) -> impl Iterator<Item = &CodeElement> {
        self.imports
            .iter()
            .chain(&self.exports)
            .chain(&self.functions)
            .chain(&self.classes)
            .chain(&self.interfaces)
            .chain(&self.types)
            .chain(&self.variables)
            .chain(&self.enums)
    }

    pub fn element_count(&self) -> usize {
        self.all_elements().count()
    }
}

/// One extracted element plus its source slice.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedContent {
    pub element: CodeElement,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imports: Option<String>,
}

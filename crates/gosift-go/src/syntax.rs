//! Go parsing layer over tree-sitter.
//!
//! Wraps parser construction and the handful of node-walking helpers the
//! rest of the crate shares. Everything here is purely syntactic; semantic
//! interpretation lives in `package` and `resolve`.

use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Tree};

// ============================================================================
// Errors
// ============================================================================

/// Errors from the parsing layer.
#[derive(Debug, Error)]
pub enum SyntaxError {
    /// The parser itself could not run (grammar mismatch, cancelled parse).
    #[error("go parser failed: {0}")]
    Parser(String),

    /// The source parsed but contains syntax errors. Callers treat this as a
    /// degrading condition: the file is presumably mid-edit and is skipped.
    #[error("syntax errors in {file}")]
    Invalid { file: String },
}

// ============================================================================
// Parsing
// ============================================================================

/// The tree-sitter Go grammar.
pub fn go_language() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

/// Parse Go source, accepting trees that contain error nodes.
pub fn parse(source: &str) -> Result<Tree, SyntaxError> {
    let mut parser = Parser::new();
    parser
        .set_language(&go_language())
        .map_err(|e| SyntaxError::Parser(e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| SyntaxError::Parser("no tree produced".to_string()))
}

/// Parse Go source, rejecting trees with syntax errors.
pub fn parse_valid(source: &str, file: &str) -> Result<Tree, SyntaxError> {
    let tree = parse(source)?;
    if tree.root_node().has_error() {
        return Err(SyntaxError::Invalid {
            file: file.to_string(),
        });
    }
    Ok(tree)
}

// ============================================================================
// Node Helpers
// ============================================================================

/// Source text of a node.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-indexed line of a node's start.
pub fn node_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// Named children of a node, in order.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .collect()
}

/// Children of a node under a grammar field, in order.
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// All descendants of a node in pre-order, the node itself excluded.
pub fn descendants<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut stack: Vec<Node<'t>> = Vec::new();
    for i in (0..node.child_count()).rev() {
        if let Some(child) = node.child(i) {
            stack.push(child);
        }
    }
    while let Some(current) = stack.pop() {
        out.push(current);
        for i in (0..current.child_count()).rev() {
            if let Some(child) = current.child(i) {
                stack.push(child);
            }
        }
    }
    out
}

// ============================================================================
// Go-Specific Readers
// ============================================================================

/// Name from the file's `package` clause.
pub fn package_name(root: Node<'_>, source: &str) -> Option<String> {
    named_children(root)
        .into_iter()
        .find(|n| n.kind() == "package_clause")
        .and_then(|clause| clause.named_child(0))
        .map(|ident| node_text(ident, source).to_string())
}

/// One import of a file, with its resolved-at-parse-time shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoImport {
    /// Explicit alias (`import s "proj/shop"`), if any.
    pub alias: Option<String>,
    /// Import path with the quotes stripped.
    pub path: String,
    /// Dot import (`import . "proj/shop"`).
    pub dot: bool,
}

impl GoImport {
    /// Last path segment, the default reference name for unaliased imports.
    pub fn base(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// All imports declared by a file. Blank imports are omitted.
pub fn imports_of(root: Node<'_>, source: &str) -> Vec<GoImport> {
    let mut imports = Vec::new();
    for decl in named_children(root) {
        if decl.kind() != "import_declaration" {
            continue;
        }
        let mut specs: Vec<Node<'_>> = Vec::new();
        for child in named_children(decl) {
            match child.kind() {
                "import_spec" => specs.push(child),
                "import_spec_list" => {
                    specs.extend(named_children(child).into_iter().filter(|n| n.kind() == "import_spec"))
                }
                _ => {}
            }
        }
        for spec in specs {
            let Some(path_node) = spec.child_by_field_name("path") else {
                continue;
            };
            let path = node_text(path_node, source)
                .trim_matches(|c| c == '"' || c == '`')
                .to_string();
            let mut alias = None;
            let mut dot = false;
            if let Some(name) = spec.child_by_field_name("name") {
                match name.kind() {
                    "dot" => dot = true,
                    "blank_identifier" => continue,
                    _ => alias = Some(node_text(name, source).to_string()),
                }
            }
            imports.push(GoImport { alias, path, dot });
        }
    }
    imports
}

/// Stringify a method receiver from its `parameter_list` node.
///
/// A plain name yields the name, a pointer receiver a `*`-prefixed name, and
/// a generic receiver its base name with type parameters dropped. Falls back
/// to the raw type text for shapes outside those three.
pub fn receiver_type_string(receiver: Node<'_>, source: &str) -> Option<String> {
    let decl = named_children(receiver)
        .into_iter()
        .find(|n| n.kind() == "parameter_declaration")?;
    let ty = decl.child_by_field_name("type")?;
    Some(match ty.kind() {
        "type_identifier" => node_text(ty, source).to_string(),
        "pointer_type" => match ty.named_child(0) {
            Some(inner) if inner.kind() == "generic_type" => {
                format!("*{}", generic_base(inner, source))
            }
            Some(inner) => format!("*{}", node_text(inner, source)),
            None => node_text(ty, source).to_string(),
        },
        "generic_type" => generic_base(ty, source),
        _ => node_text(ty, source).to_string(),
    })
}

/// Base type name of a receiver string (pointer marker stripped).
pub fn receiver_base(receiver: &str) -> &str {
    receiver.strip_prefix('*').unwrap_or(receiver)
}

fn generic_base(generic: Node<'_>, source: &str) -> String {
    generic
        .child_by_field_name("type")
        .map(|t| node_text(t, source).to_string())
        .unwrap_or_else(|| node_text(generic, source).to_string())
}

/// First declared result type of a function, if any.
///
/// Go allows both a bare type (`func f() *Cart`) and a parenthesized result
/// list (`func f() (*Cart, error)`); either way the first type is returned.
pub fn first_result_type(func: Node<'_>) -> Option<Node<'_>> {
    let result = func.child_by_field_name("result")?;
    if result.kind() == "parameter_list" {
        named_children(result)
            .into_iter()
            .find(|n| n.kind() == "parameter_declaration")
            .and_then(|decl| decl.child_by_field_name("type"))
    } else {
        Some(result)
    }
}

/// Whether a function declaration has at least one formal parameter.
pub fn has_parameters(func: Node<'_>) -> bool {
    func.child_by_field_name("parameters")
        .map(|params| params.named_child_count() > 0)
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_valid_go() {
        let tree = parse_valid("package shop\n\nfunc Add(a, b int) int { return a + b }\n", "shop.go");
        assert!(tree.is_ok());
    }

    #[test]
    fn parse_valid_rejects_syntax_errors() {
        let err = parse_valid("package shop\n\nfunc Add(a, b int int { return }\n", "shop.go");
        assert!(matches!(err, Err(SyntaxError::Invalid { file }) if file == "shop.go"));
    }

    #[test]
    fn package_name_reads_the_clause() {
        let src = "package shop\n";
        let tree = parse(src).unwrap();
        assert_eq!(package_name(tree.root_node(), src), Some("shop".to_string()));
    }

    mod import_tests {
        use super::*;

        #[test]
        fn reads_plain_aliased_dot_and_blank_imports() {
            let src = r#"package calc

import (
    "proj/internal/shop"
    s "proj/internal/store"
    . "proj/internal/util"
    _ "proj/internal/sideeffect"
)
"#;
            let tree = parse(src).unwrap();
            let imports = imports_of(tree.root_node(), src);

            assert_eq!(imports.len(), 3);
            assert_eq!(imports[0].path, "proj/internal/shop");
            assert_eq!(imports[0].alias, None);
            assert_eq!(imports[0].base(), "shop");
            assert_eq!(imports[1].alias, Some("s".to_string()));
            assert!(imports[2].dot);
        }

        #[test]
        fn reads_single_spec_form() {
            let src = "package calc\n\nimport \"fmt\"\n";
            let tree = parse(src).unwrap();
            let imports = imports_of(tree.root_node(), src);
            assert_eq!(imports.len(), 1);
            assert_eq!(imports[0].path, "fmt");
        }
    }

    mod receiver_tests {
        use super::*;

        fn receiver_of(src: &str) -> Option<String> {
            let tree = parse(src).unwrap();
            let method = named_children(tree.root_node())
                .into_iter()
                .find(|n| n.kind() == "method_declaration")?;
            receiver_type_string(method.child_by_field_name("receiver")?, src)
        }

        #[test]
        fn value_receiver() {
            let src = "package shop\n\nfunc (c Cart) Total() int { return 0 }\n";
            assert_eq!(receiver_of(src), Some("Cart".to_string()));
        }

        #[test]
        fn pointer_receiver() {
            let src = "package shop\n\nfunc (c *Cart) AddItem(p Product) {}\n";
            assert_eq!(receiver_of(src), Some("*Cart".to_string()));
        }

        #[test]
        fn generic_receiver_drops_type_parameters() {
            let src = "package shop\n\nfunc (s Stack[T]) Push(v T) {}\n";
            assert_eq!(receiver_of(src), Some("Stack".to_string()));
        }

        #[test]
        fn pointer_generic_receiver() {
            let src = "package shop\n\nfunc (s *Stack[T]) Pop() T { var z T; return z }\n";
            assert_eq!(receiver_of(src), Some("*Stack".to_string()));
        }

        #[test]
        fn base_strips_pointer_marker() {
            assert_eq!(receiver_base("*Cart"), "Cart");
            assert_eq!(receiver_base("Cart"), "Cart");
        }
    }

    mod result_tests {
        use super::*;

        fn first_result_kind(src: &str) -> Option<String> {
            let tree = parse(src).unwrap();
            let func = named_children(tree.root_node())
                .into_iter()
                .find(|n| n.kind() == "function_declaration")?;
            first_result_type(func).map(|n| n.kind().to_string())
        }

        #[test]
        fn bare_result_type() {
            let src = "package shop\n\nfunc NewCart() *Cart { return &Cart{} }\n";
            assert_eq!(first_result_kind(src), Some("pointer_type".to_string()));
        }

        #[test]
        fn parenthesized_result_list() {
            let src = "package shop\n\nfunc Load() (Cart, error) { return Cart{}, nil }\n";
            assert_eq!(first_result_kind(src), Some("type_identifier".to_string()));
        }

        #[test]
        fn no_result() {
            let src = "package shop\n\nfunc Reset() {}\n";
            assert_eq!(first_result_kind(src), None);
        }
    }
}

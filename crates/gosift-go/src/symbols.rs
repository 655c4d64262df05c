//! Top-level symbol extraction from changed files (stage L2).
//!
//! Each changed file is parsed on its own; a file that fails to parse is
//! dropped silently (it is presumably mid-edit), so the extracted set is
//! always a subset of reality, never spurious. Only top-level definitions
//! count: free functions, methods with their receiver, and named types.
//! Constants, variables, and nested declarations are not symbols here.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use gosift_core::adapter::BuildOracle;
use gosift_core::types::{Origin, Symbol, SymbolKind};

use crate::syntax::{
    self, named_children, node_line, node_text, receiver_type_string,
};

/// Extract symbols from a list of workspace-relative file paths.
///
/// Duplicate `(package, name, kind)` records collapse to the first
/// occurrence, so a file appearing twice upstream (or a definition repeated
/// across build-tag variants) contributes one symbol.
pub fn extract_from_files(
    files: &[String],
    workspace: &Path,
    oracle: &dyn BuildOracle,
) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    let mut seen: HashSet<(String, String, SymbolKind)> = HashSet::new();

    for file in files {
        let Some(extracted) = extract_from_file(file, workspace, oracle) else {
            continue;
        };
        for symbol in extracted {
            let key = (
                symbol.package.as_str().to_string(),
                symbol.name.clone(),
                symbol.kind,
            );
            if seen.insert(key) {
                symbols.push(symbol);
            }
        }
    }
    symbols
}

/// Extract the symbols of one file; `None` (with a debug log) when the file
/// cannot be read or parsed.
fn extract_from_file(file: &str, workspace: &Path, oracle: &dyn BuildOracle) -> Option<Vec<Symbol>> {
    let full_path = workspace.join(file);
    let text = match std::fs::read_to_string(&full_path) {
        Ok(text) => text,
        Err(err) => {
            debug!(file, error = %err, "failed to read changed file, skipping");
            return None;
        }
    };
    let base = Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    let tree = match syntax::parse_valid(&text, &base) {
        Ok(tree) => tree,
        Err(err) => {
            debug!(file, error = %err, "failed to parse changed file, skipping");
            return None;
        }
    };

    let package = package_for(file, workspace, oracle);
    let mut symbols = Vec::new();

    for node in named_children(tree.root_node()) {
        match node.kind() {
            "function_declaration" => {
                let Some(name_node) = node.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, &text).to_string();
                symbols.push(Symbol {
                    package: package.clone().into(),
                    exported: is_exported(&name),
                    name,
                    kind: SymbolKind::Func,
                    receiver: None,
                    origin: Origin::new(base.clone(), node_line(node)),
                });
            }
            "method_declaration" => {
                let Some(name_node) = node.child_by_field_name("name") else {
                    continue;
                };
                let Some(receiver) = node
                    .child_by_field_name("receiver")
                    .and_then(|r| receiver_type_string(r, &text))
                else {
                    continue;
                };
                let name = node_text(name_node, &text).to_string();
                symbols.push(Symbol {
                    package: package.clone().into(),
                    exported: is_exported(&name),
                    name,
                    kind: SymbolKind::Method,
                    receiver: Some(receiver),
                    origin: Origin::new(base.clone(), node_line(node)),
                });
            }
            "type_declaration" => {
                for spec in named_children(node) {
                    if spec.kind() != "type_spec" && spec.kind() != "type_alias" {
                        continue;
                    }
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let name = node_text(name_node, &text).to_string();
                    symbols.push(Symbol {
                        package: package.clone().into(),
                        exported: is_exported(&name),
                        name,
                        kind: SymbolKind::Type,
                        receiver: None,
                        origin: Origin::new(base.clone(), node_line(spec)),
                    });
                }
            }
            _ => {}
        }
    }

    Some(symbols)
}

/// Import path of the file's package, falling back to the directory's base
/// name when the oracle cannot answer. Fallback symbols still display but
/// will not match semantically downstream.
fn package_for(file: &str, workspace: &Path, oracle: &dyn BuildOracle) -> String {
    let dir = Path::new(file).parent().unwrap_or_else(|| Path::new(""));
    let absolute = workspace.join(dir);
    if let Some(path) = oracle.import_path(&absolute) {
        return path;
    }
    debug!(file, "import path unresolved, falling back to directory name");
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

/// Go visibility convention: exported iff the name starts uppercase.
fn is_exported(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gosift_core::adapter::StaticOracle;
    use std::fs;
    use tempfile::TempDir;

    const CART: &str = r#"package shop

type Cart struct {
    Items []Product
}

type Product struct {
    Name string
}

func NewCart() *Cart {
    return &Cart{}
}

func (c *Cart) AddItem(p Product) {}

func (c Cart) total() int { return 0 }

func (s Stack[T]) Push(v T) {}

const answer = 42

var global = "not a symbol"
"#;

    fn workspace_with_cart() -> (TempDir, StaticOracle) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("shop");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("cart.go"), CART).unwrap();
        let mut oracle = StaticOracle::new();
        oracle.insert("proj/shop", &dir);
        (tmp, oracle)
    }

    fn extract(tmp: &TempDir, oracle: &StaticOracle) -> Vec<Symbol> {
        extract_from_files(&["shop/cart.go".to_string()], tmp.path(), oracle)
    }

    #[test]
    fn extracts_funcs_methods_and_types_only() {
        let (tmp, oracle) = workspace_with_cart();
        let symbols = extract(&tmp, &oracle);

        let names: Vec<(&str, SymbolKind)> = symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind))
            .collect();
        assert!(names.contains(&("Cart", SymbolKind::Type)));
        assert!(names.contains(&("Product", SymbolKind::Type)));
        assert!(names.contains(&("NewCart", SymbolKind::Func)));
        assert!(names.contains(&("AddItem", SymbolKind::Method)));
        assert!(names.contains(&("total", SymbolKind::Method)));
        assert!(!names.iter().any(|(n, _)| *n == "answer" || *n == "global"));
    }

    #[test]
    fn receivers_carry_pointer_markers_and_drop_type_parameters() {
        let (tmp, oracle) = workspace_with_cart();
        let symbols = extract(&tmp, &oracle);

        let add_item = symbols.iter().find(|s| s.name == "AddItem").unwrap();
        assert_eq!(add_item.receiver.as_deref(), Some("*Cart"));
        let total = symbols.iter().find(|s| s.name == "total").unwrap();
        assert_eq!(total.receiver.as_deref(), Some("Cart"));
        let push = symbols.iter().find(|s| s.name == "Push").unwrap();
        assert_eq!(push.receiver.as_deref(), Some("Stack"));
    }

    #[test]
    fn exported_follows_case_convention() {
        let (tmp, oracle) = workspace_with_cart();
        let symbols = extract(&tmp, &oracle);

        assert!(symbols.iter().find(|s| s.name == "NewCart").unwrap().exported);
        assert!(!symbols.iter().find(|s| s.name == "total").unwrap().exported);
    }

    #[test]
    fn package_comes_from_the_oracle() {
        let (tmp, oracle) = workspace_with_cart();
        let symbols = extract(&tmp, &oracle);
        assert!(symbols.iter().all(|s| s.package.as_str() == "proj/shop"));
    }

    #[test]
    fn oracle_miss_falls_back_to_directory_name() {
        let (tmp, _) = workspace_with_cart();
        let empty_oracle = StaticOracle::new();
        let symbols = extract_from_files(
            &["shop/cart.go".to_string()],
            tmp.path(),
            &empty_oracle,
        );
        assert!(symbols.iter().all(|s| s.package.as_str() == "shop"));
    }

    #[test]
    fn unparseable_file_is_silently_skipped() {
        let (tmp, mut oracle) = workspace_with_cart();
        let dir = tmp.path().join("broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("bad.go"), "package broken\n\nfunc Oops( {").unwrap();
        oracle.insert("proj/broken", &dir);

        let symbols = extract_from_files(
            &["broken/bad.go".to_string(), "shop/cart.go".to_string()],
            tmp.path(),
            &oracle,
        );
        assert!(!symbols.is_empty());
        assert!(symbols.iter().all(|s| s.package.as_str() == "proj/shop"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let (tmp, oracle) = workspace_with_cart();
        let first = extract(&tmp, &oracle);
        let second = extract(&tmp, &oracle);
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_file_entries_yield_symbols_once() {
        let (tmp, oracle) = workspace_with_cart();
        let once = extract(&tmp, &oracle);
        let twice = extract_from_files(
            &["shop/cart.go".to_string(), "shop/cart.go".to_string()],
            tmp.path(),
            &oracle,
        );
        assert_eq!(once, twice);
    }
}

//! Reference resolution over a test function body.
//!
//! Walks every identifier, type identifier, selector expression, and
//! qualified type in the body and resolves each to the definition object it
//! binds to, if any. Locals shadow package scope: any name bound by a
//! parameter, `:=`, `var`, `const`, or `range` clause anywhere in the body
//! suppresses package-scope resolution of that name. That over-approximates
//! Go's block scoping, in the safe direction: a shadowed reference is
//! dropped, never misattributed.

use std::collections::HashSet;

use tree_sitter::Node;

use gosift_core::types::SymbolKind;

use crate::package::{
    dot_imported_models, imported_model, DefId, DefObject, ExternalModels, PackageModel,
    SourceFile,
};
use crate::syntax::{descendants, field_children, named_children, node_text};
use crate::typetrack::TypeTracker;

// ============================================================================
// Resolved References
// ============================================================================

/// A reference resolved to a definition object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefRef {
    pub id: DefId,
    pub package: String,
    pub name: String,
    pub kind: SymbolKind,
}

impl From<&DefObject> for DefRef {
    fn from(object: &DefObject) -> Self {
        DefRef {
            id: object.id,
            package: object.package_path.clone(),
            name: object.name.clone(),
            kind: object.kind,
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve every definition-object reference in the named test's body.
///
/// Returns an empty list when the function is not declared in `file`.
/// Duplicate references are returned as-is; de-duplication is the usage
/// detector's concern.
pub fn references_in_test(
    model: &PackageModel,
    file: &SourceFile,
    test_name: &str,
    external: &ExternalModels,
) -> Vec<DefRef> {
    let source = &file.text;
    let Some(func) = find_function(file, test_name) else {
        return Vec::new();
    };
    let Some(body) = func.child_by_field_name("body") else {
        return Vec::new();
    };

    let locals = collect_locals(func, source);
    let tracker = TypeTracker::for_function(func, model, file, external);
    let mut refs = Vec::new();

    for node in descendants(body) {
        match node.kind() {
            "identifier" => {
                if is_keyed_element_key(node) {
                    continue;
                }
                let name = node_text(node, source);
                if locals.contains(name) {
                    continue;
                }
                if let Some(object) = lookup_unqualified(model, file, name, external) {
                    refs.push(object);
                }
            }
            "type_identifier" => {
                // Qualified type names resolve through their own arm.
                if node
                    .parent()
                    .is_some_and(|p| p.kind() == "qualified_type")
                {
                    continue;
                }
                let name = node_text(node, source);
                if let Some(object) = lookup_unqualified(model, file, name, external) {
                    refs.push(object);
                }
            }
            "selector_expression" => {
                if let Some(object) =
                    resolve_selector(node, source, model, file, external, &tracker)
                {
                    refs.push(object);
                }
            }
            "qualified_type" => {
                if let Some(object) = resolve_qualified(node, source, file, external) {
                    refs.push(object);
                }
            }
            _ => {}
        }
    }

    refs
}

/// Find a top-level function declaration by name.
pub fn find_function<'f>(file: &'f SourceFile, name: &str) -> Option<Node<'f>> {
    named_children(file.root()).into_iter().find(|n| {
        n.kind() == "function_declaration"
            && n.child_by_field_name("name")
                .map(|id| node_text(id, &file.text) == name)
                .unwrap_or(false)
    })
}

/// Resolve an unqualified name: package scope first, then dot imports.
fn lookup_unqualified(
    model: &PackageModel,
    file: &SourceFile,
    name: &str,
    external: &ExternalModels,
) -> Option<DefRef> {
    if let Some(object) = model.lookup(name) {
        return Some(object.into());
    }
    for dotted in dot_imported_models(file, external) {
        if let Some(object) = dotted.lookup(name) {
            return Some(object.into());
        }
    }
    None
}

/// Resolve `x.Y`: a package-qualified reference when `x` names an import,
/// otherwise a method selection on `x`'s tracked type.
fn resolve_selector(
    node: Node<'_>,
    source: &str,
    model: &PackageModel,
    file: &SourceFile,
    external: &ExternalModels,
    tracker: &TypeTracker,
) -> Option<DefRef> {
    let operand = node.child_by_field_name("operand")?;
    let member = node_text(node.child_by_field_name("field")?, source);

    if operand.kind() == "identifier" {
        let qualifier = node_text(operand, source);
        if let Some(target) = imported_model(file, qualifier, external) {
            return target.lookup(member).map(DefRef::from);
        }
    }

    // Method selection: resolve the receiver's type, then its method set.
    let receiver = tracker.infer(operand, model, file, external)?;
    let owner: &PackageModel = if receiver.package == model.import_path {
        model
    } else {
        external.get(&receiver.package).map(|m| m.as_ref())?
    };
    owner
        .method(&receiver.name, member)
        .map(DefRef::from)
        .or_else(|| {
            // An in-package test variant sees the production methods in its
            // own model; the black-box sibling does not, so fall through to
            // the externally loaded production model.
            if receiver.package == model.import_path {
                external
                    .get(&receiver.package)
                    .and_then(|m| m.method(&receiver.name, member))
                    .map(DefRef::from)
            } else {
                None
            }
        })
}

/// Resolve `pkg.T` in a type position.
fn resolve_qualified(
    node: Node<'_>,
    source: &str,
    file: &SourceFile,
    external: &ExternalModels,
) -> Option<DefRef> {
    let qualifier = node_text(node.child_by_field_name("package")?, source);
    let name = node_text(node.child_by_field_name("name")?, source);
    imported_model(file, qualifier, external)?
        .lookup(name)
        .map(DefRef::from)
}

/// True for the key identifier of a keyed composite-literal element
/// (`Product{Name: …}`), which names a field, not a package-level symbol.
fn is_keyed_element_key(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    let parent = if parent.kind() == "literal_element" {
        match parent.parent() {
            Some(p) => p,
            None => return false,
        }
    } else {
        parent
    };
    parent.kind() == "keyed_element"
        && parent
            .child_by_field_name("key")
            .map(|key| {
                key.id() == node.id()
                    || key
                        .named_child(0)
                        .map(|inner| inner.id() == node.id())
                        .unwrap_or(false)
            })
            .unwrap_or(false)
}

/// Every name bound locally anywhere in the function.
fn collect_locals(func: Node<'_>, source: &str) -> HashSet<String> {
    let mut locals = HashSet::new();

    let bind_names = |decl: Node<'_>, locals: &mut HashSet<String>| {
        for name in field_children(decl, "name") {
            locals.insert(node_text(name, source).to_string());
        }
    };

    if let Some(params) = func.child_by_field_name("parameters") {
        for decl in named_children(params) {
            bind_names(decl, &mut locals);
        }
    }

    let Some(body) = func.child_by_field_name("body") else {
        return locals;
    };
    for node in descendants(body) {
        match node.kind() {
            "short_var_declaration" => {
                if let Some(left) = node.child_by_field_name("left") {
                    for target in named_children(left) {
                        if target.kind() == "identifier" {
                            locals.insert(node_text(target, source).to_string());
                        }
                    }
                }
            }
            "var_spec" | "const_spec" => bind_names(node, &mut locals),
            "parameter_declaration" | "variadic_parameter_declaration" => {
                // Function-literal parameters nested in the body.
                bind_names(node, &mut locals);
            }
            "range_clause" => {
                if let Some(left) = node.child_by_field_name("left") {
                    for target in named_children(left) {
                        if target.kind() == "identifier" {
                            locals.insert(node_text(target, source).to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    locals
}

// ============================================================================
// Tests
// ============================================================================

//! Local type tracking inside a function body.
//!
//! Method calls resolve through the receiver's type, so the resolver needs
//! to know what type a local variable holds. This tracker covers the shapes
//! test bodies actually use:
//!
//! - declared parameter types: `func TestX(t *testing.T)`
//! - `var` declarations with a type: `var c shop.Cart`
//! - composite literals: `c := Cart{}`, `c := shop.Cart{}`
//! - address-of composite literals: `c := &Cart{}`
//! - calls to known functions: `c := NewCart()`, `c := shop.NewCart()`
//! - variable copies: `d := c`
//!
//! Copies are resolved by propagation until a fixed point, so chains like
//! `a := NewCart(); b := a; c := b` all land on the same type. Pointer
//! markers are dropped: Go method sets auto-address, and the method lookup
//! downstream keys on the base type name.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::package::{
    imported_model, type_ref_from_node, ExternalModels, PackageModel, SourceFile, TypeRef,
};
use crate::syntax::{descendants, field_children, named_children, node_text};

// Propagation is monotone; the cap only guards degenerate inputs.
const MAX_PROPAGATION_PASSES: u32 = 100;

// ============================================================================
// Type Tracker
// ============================================================================

/// Types of the local variables of one function body.
pub struct TypeTracker {
    types: HashMap<String, TypeRef>,
}

impl TypeTracker {
    /// Build the tracker for a function declaration node.
    pub fn for_function(
        func: Node<'_>,
        model: &PackageModel,
        file: &SourceFile,
        external: &ExternalModels,
    ) -> Self {
        let source = &file.text;
        let mut types: HashMap<String, TypeRef> = HashMap::new();
        let mut copies: Vec<(String, String)> = Vec::new();

        // Parameter declarations carry explicit types.
        if let Some(params) = func.child_by_field_name("parameters") {
            for decl in named_children(params) {
                if decl.kind() != "parameter_declaration"
                    && decl.kind() != "variadic_parameter_declaration"
                {
                    continue;
                }
                let Some(ty) = decl.child_by_field_name("type") else {
                    continue;
                };
                let Some(type_ref) =
                    type_ref_from_node(ty, source, &file.imports, &model.import_path)
                else {
                    continue;
                };
                for name in field_children(decl, "name") {
                    types.insert(node_text(name, source).to_string(), type_ref.clone());
                }
            }
        }

        let Some(body) = func.child_by_field_name("body") else {
            return TypeTracker { types };
        };

        for node in descendants(body) {
            match node.kind() {
                "short_var_declaration" | "assignment_statement" => {
                    let Some((target, value)) = single_assignment(node, source) else {
                        continue;
                    };
                    if let Some(type_ref) = infer_value(value, source, model, file, external) {
                        types.entry(target).or_insert(type_ref);
                    } else if value.kind() == "identifier" {
                        copies.push((target, node_text(value, source).to_string()));
                    }
                }
                "var_spec" => {
                    let names: Vec<String> = field_children(node, "name")
                        .into_iter()
                        .map(|n| node_text(n, source).to_string())
                        .collect();
                    if let Some(ty) = node.child_by_field_name("type") {
                        if let Some(type_ref) =
                            type_ref_from_node(ty, source, &file.imports, &model.import_path)
                        {
                            for name in names {
                                types.entry(name).or_insert(type_ref.clone());
                            }
                        }
                        continue;
                    }
                    // `var x = expr` with a single target.
                    if names.len() == 1 {
                        if let Some(value) = node
                            .child_by_field_name("value")
                            .and_then(|list| single_child(list))
                        {
                            if let Some(type_ref) =
                                infer_value(value, source, model, file, external)
                            {
                                types.entry(names.into_iter().next().unwrap_or_default())
                                    .or_insert(type_ref);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        // Propagate variable copies until stable.
        let mut passes = 0;
        let mut changed = true;
        while changed && passes < MAX_PROPAGATION_PASSES {
            changed = false;
            passes += 1;
            for (target, rhs) in &copies {
                if types.contains_key(target) {
                    continue;
                }
                if let Some(type_ref) = types.get(rhs).cloned() {
                    types.insert(target.clone(), type_ref);
                    changed = true;
                }
            }
        }

        TypeTracker { types }
    }

    /// Type of a local variable, if tracked.
    pub fn type_of(&self, name: &str) -> Option<&TypeRef> {
        self.types.get(name)
    }

    /// Infer the type of an expression node.
    ///
    /// Identifiers resolve through the tracked locals; everything else goes
    /// through the same literal/call inference used while building.
    pub fn infer(
        &self,
        node: Node<'_>,
        model: &PackageModel,
        file: &SourceFile,
        external: &ExternalModels,
    ) -> Option<TypeRef> {
        if node.kind() == "identifier" {
            return self.type_of(node_text(node, &file.text)).cloned();
        }
        infer_value(node, &file.text, model, file, external)
    }
}

// ============================================================================
// Inference
// ============================================================================

/// Infer a type from a value expression without consulting locals.
fn infer_value(
    node: Node<'_>,
    source: &str,
    model: &PackageModel,
    file: &SourceFile,
    external: &ExternalModels,
) -> Option<TypeRef> {
    match node.kind() {
        "composite_literal" => {
            let ty = node.child_by_field_name("type")?;
            type_ref_from_node(ty, source, &file.imports, &model.import_path)
        }
        "unary_expression" => {
            let operator = node.child_by_field_name("operator")?;
            if node_text(operator, source) != "&" {
                return None;
            }
            infer_value(node.child_by_field_name("operand")?, source, model, file, external)
        }
        "parenthesized_expression" => {
            infer_value(node.named_child(0)?, source, model, file, external)
        }
        "call_expression" => {
            let function = node.child_by_field_name("function")?;
            match function.kind() {
                "identifier" => {
                    let name = node_text(function, source);
                    model.func_returns.get(name).cloned()
                }
                "selector_expression" => {
                    let operand = function.child_by_field_name("operand")?;
                    if operand.kind() != "identifier" {
                        return None;
                    }
                    let qualifier = node_text(operand, source);
                    let target = imported_model(file, qualifier, external)?;
                    let callee = node_text(function.child_by_field_name("field")?, source);
                    target.func_returns.get(callee).cloned()
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// A one-target, one-value assignment; multi-assignment is not tracked.
fn single_assignment<'t>(node: Node<'t>, source: &str) -> Option<(String, Node<'t>)> {
    let left = single_child(node.child_by_field_name("left")?)?;
    let right = single_child(node.child_by_field_name("right")?)?;
    if left.kind() != "identifier" {
        return None;
    }
    Some((node_text(left, source).to_string(), right))
}

fn single_child(list: Node<'_>) -> Option<Node<'_>> {
    if list.named_child_count() == 1 {
        list.named_child(0)
    } else {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

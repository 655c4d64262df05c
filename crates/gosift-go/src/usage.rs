//! Usage detection (stage L4): which tests reference which changed symbols.
//!
//! Matching is semantic. Changed symbols are first resolved to definition
//! objects by loading their packages; each test package is then loaded with
//! its test files included and every reference in each test body is resolved
//! to a definition object and checked against the changed set.
//!
//! The check runs in two tiers. Object identity ([`DefId`]) is tried first:
//! it holds for cross-package references because imported models are
//! memoized against the loads that produced the symbol objects. It fails for
//! intra-package references, where the tests-included reload of the package
//! mints fresh objects for the same definitions; those fall through to the
//! keyed tier, `(package path, name, kind)`. Dropping either tier
//! under-matches, which is why both exist.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use gosift_core::adapter::BuildOracle;
use gosift_core::types::{PackageId, Symbol, SymbolKind, Test, Usage};

use crate::package::{DefId, ExternalModels, PackageLoader};
use crate::resolve::references_in_test;

type SymbolKey = (String, String, SymbolKind);

/// Detect usages of the changed symbols inside the discovered tests.
///
/// Packages that fail to load are skipped with a debug log; their tests
/// contribute no edges and the strategy layer's fallback covers them.
pub fn detect_usages(tests: &[Test], symbols: &[Symbol], oracle: &dyn BuildOracle) -> Vec<Usage> {
    let mut loader = PackageLoader::new(oracle);

    let (by_id, by_key, external) = resolve_symbol_objects(symbols, &mut loader);

    // Group tests by package so each package loads once.
    let mut tests_by_package: BTreeMap<&PackageId, Vec<&Test>> = BTreeMap::new();
    for test in tests {
        tests_by_package.entry(&test.package).or_default().push(test);
    }

    let mut usages: Vec<Usage> = Vec::new();
    let mut seen: HashSet<SymbolKey> = HashSet::new();

    for (package, package_tests) in tests_by_package {
        let variants = match loader.load(package, true) {
            Ok(variants) => variants,
            Err(err) => {
                debug!(package = %package, error = %err, "package failed to load, skipping its tests");
                continue;
            }
        };
        for test in package_tests {
            // Prefer the variant that owns the test's file: in-package tests
            // live in the production variant, black-box tests in the sibling.
            let Some(model) = variants.iter().find(|m| m.file(&test.file).is_some()) else {
                debug!(test = %test.name, file = %test.file, "test file not in any loaded variant");
                continue;
            };
            let file = match model.file(&test.file) {
                Some(file) => file,
                None => continue,
            };

            for reference in references_in_test(model, file, &test.name, &external) {
                let symbol = by_id.get(&reference.id).or_else(|| {
                    by_key.get(&(
                        reference.package.clone(),
                        reference.name.clone(),
                        reference.kind,
                    ))
                });
                let Some(symbol) = symbol else {
                    continue;
                };
                let key = (
                    test.name.clone(),
                    symbol.name.clone(),
                    symbol.kind,
                );
                if seen.insert(key) {
                    usages.push(Usage {
                        test_name: test.name.clone(),
                        test_origin: test.origin.clone(),
                        symbol_name: symbol.name.clone(),
                        symbol_kind: symbol.kind,
                    });
                }
            }
        }
    }

    usages
}

/// Resolve changed symbols to definition objects.
///
/// Loads each changed package without its test files and matches the
/// package's definitions against the symbol list by name and kind. Returns
/// the identity index, the keyed index, and the loaded models (which double
/// as the import-resolution registry for test-body resolution). The keyed
/// index is built from the symbol list itself, so symbols whose definition
/// object is missing from this load (a definition in a `_test.go` file, a
/// package that failed to load) still match through the keyed tier.
fn resolve_symbol_objects(
    symbols: &[Symbol],
    loader: &mut PackageLoader<'_>,
) -> (HashMap<DefId, Symbol>, HashMap<SymbolKey, Symbol>, ExternalModels) {
    let mut by_package: BTreeMap<&PackageId, Vec<&Symbol>> = BTreeMap::new();
    for symbol in symbols {
        by_package.entry(&symbol.package).or_default().push(symbol);
    }

    let mut by_id: HashMap<DefId, Symbol> = HashMap::new();
    let mut by_key: HashMap<SymbolKey, Symbol> = HashMap::new();
    let mut external = ExternalModels::new();

    for (package, package_symbols) in by_package {
        for symbol in &package_symbols {
            by_key
                .entry((
                    symbol.package.as_str().to_string(),
                    symbol.name.clone(),
                    symbol.kind,
                ))
                .or_insert_with(|| (*symbol).clone());
        }

        let variants = match loader.load(package, false) {
            Ok(variants) => variants,
            Err(err) => {
                debug!(package = %package, error = %err, "changed package failed to load");
                continue;
            }
        };
        let Some(model) = variants.iter().find(|m| !m.is_test_variant()) else {
            continue;
        };
        external.insert(package.as_str().to_string(), model.clone());

        for symbol in package_symbols {
            let object = model
                .objects()
                .find(|o| o.name == symbol.name && o.kind == symbol.kind);
            if let Some(object) = object {
                by_id.insert(object.id, symbol.clone());
            }
        }
    }

    (by_id, by_key, external)
}

// ============================================================================
// Tests
// ============================================================================

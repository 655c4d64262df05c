//! Selection strategies (the precision/recall dial).
//!
//! Every strategy consumes the same triple (changed symbols, discovered
//! tests, usage edges) and produces a de-duplicated job list:
//!
//! - `symbol-only`: exactly the tests that source a usage edge. Minimal;
//!   misses tests when usage detection failed for a package.
//! - `package-fallback` (default): the symbol-only set, widened per changed
//!   package to all of that package's tests when none of them contributed an
//!   edge. The check is per package, never global: a single downstream edge
//!   must not suppress the fallback for an unrelated upstream package.
//! - `conservative`: every test of every changed package, ignoring the usage
//!   graph. The escape hatch when the semantic pipeline is distrusted.

use std::collections::{HashMap, HashSet};

use crate::error::{SiftError, SiftResult};
use crate::types::{PackageId, Symbol, Test, TestJob, Usage};

// ============================================================================
// Strategy Trait
// ============================================================================

/// A point on the precision/recall trade-off.
pub trait Strategy: std::fmt::Debug {
    /// Strategy name as accepted by `--strategy`.
    fn name(&self) -> &'static str;

    /// Map the impact graph to a de-duplicated job list.
    fn select(&self, symbols: &[Symbol], tests: &[Test], usages: &[Usage]) -> Vec<TestJob>;
}

/// Resolve a strategy by CLI name.
///
/// The set is closed on purpose; an unknown name is a surfaced error that
/// identifies the rejected value.
pub fn strategy_by_name(name: &str) -> SiftResult<Box<dyn Strategy>> {
    match name {
        "symbol-only" => Ok(Box::new(SymbolOnly)),
        "package-fallback" => Ok(Box::new(PackageFallback)),
        "conservative" => Ok(Box::new(Conservative)),
        _ => Err(SiftError::UnknownStrategy {
            name: name.to_string(),
        }),
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Jobs for every test that sources at least one usage edge.
///
/// Usage edges carry the test name only; the package comes from the
/// discovered-test list. An edge whose test is not in the list is dropped.
fn jobs_from_usages(tests: &[Test], usages: &[Usage]) -> Vec<TestJob> {
    let by_name: HashMap<&str, &Test> = tests.iter().map(|t| (t.name.as_str(), t)).collect();

    let mut selected = Vec::new();
    for usage in usages {
        if let Some(test) = by_name.get(usage.test_name.as_str()) {
            selected.push(TestJob {
                package: test.package.clone(),
                test_name: test.name.clone(),
            });
        }
    }
    dedup_jobs(selected)
}

/// Packages that contain at least one changed symbol.
fn changed_packages(symbols: &[Symbol]) -> HashSet<&PackageId> {
    symbols.iter().map(|s| &s.package).collect()
}

/// Collapse duplicates, first occurrence wins.
fn dedup_jobs(jobs: Vec<TestJob>) -> Vec<TestJob> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| seen.insert((job.package.clone(), job.test_name.clone())))
        .collect()
}

// ============================================================================
// symbol-only
// ============================================================================

/// Runs only the tests with a detected reference to a changed symbol.
#[derive(Debug)]
pub struct SymbolOnly;

impl Strategy for SymbolOnly {
    fn name(&self) -> &'static str {
        "symbol-only"
    }

    fn select(&self, _symbols: &[Symbol], tests: &[Test], usages: &[Usage]) -> Vec<TestJob> {
        jobs_from_usages(tests, usages)
    }
}

// ============================================================================
// package-fallback
// ============================================================================

/// Symbol-only, widened to whole packages where detection came back empty.
#[derive(Debug)]
pub struct PackageFallback;

impl Strategy for PackageFallback {
    fn name(&self) -> &'static str {
        "package-fallback"
    }

    fn select(&self, symbols: &[Symbol], tests: &[Test], usages: &[Usage]) -> Vec<TestJob> {
        let mut selected = jobs_from_usages(tests, usages);

        // Packages whose own tests contributed at least one edge.
        let covered: HashSet<&PackageId> = selected.iter().map(|job| &job.package).collect();
        let covered: HashSet<PackageId> = covered.into_iter().cloned().collect();

        for package in changed_packages(symbols) {
            if covered.contains(package) {
                continue;
            }
            // Detection yielded nothing for this changed package: assume it
            // failed and run the package's full test set.
            for test in tests.iter().filter(|t| &t.package == package) {
                selected.push(TestJob {
                    package: test.package.clone(),
                    test_name: test.name.clone(),
                });
            }
        }

        dedup_jobs(selected)
    }
}

// ============================================================================
// conservative
// ============================================================================

/// Every test of every changed package; the usage graph is ignored.
#[derive(Debug)]
pub struct Conservative;

impl Strategy for Conservative {
    fn name(&self) -> &'static str {
        "conservative"
    }

    fn select(&self, symbols: &[Symbol], tests: &[Test], _usages: &[Usage]) -> Vec<TestJob> {
        let changed = changed_packages(symbols);
        let selected = tests
            .iter()
            .filter(|t| changed.contains(&t.package))
            .map(|t| TestJob {
                package: t.package.clone(),
                test_name: t.name.clone(),
            })
            .collect();
        dedup_jobs(selected)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Origin, SymbolKind};

    fn symbol(package: &str, name: &str, kind: SymbolKind) -> Symbol {
        Symbol {
            package: package.into(),
            name: name.to_string(),
            kind,
            receiver: None,
            exported: true,
            origin: Origin::new("lib.go", 1),
        }
    }

    fn test_fn(package: &str, name: &str) -> Test {
        Test {
            package: package.into(),
            name: name.to_string(),
            file: "lib_test.go".to_string(),
            origin: Origin::new("lib_test.go", 1),
        }
    }

    fn usage(test: &str, symbol: &str, kind: SymbolKind) -> Usage {
        Usage {
            test_name: test.to_string(),
            test_origin: Origin::new("lib_test.go", 1),
            symbol_name: symbol.to_string(),
            symbol_kind: kind,
        }
    }

    fn job_set(jobs: &[TestJob]) -> HashSet<(String, String)> {
        jobs.iter()
            .map(|j| (j.package.as_str().to_string(), j.test_name.clone()))
            .collect()
    }

    mod lookup {
        use super::*;

        #[test]
        fn resolves_all_three_names() {
            for name in ["symbol-only", "package-fallback", "conservative"] {
                let strategy = strategy_by_name(name).unwrap();
                assert_eq!(strategy.name(), name);
            }
        }

        #[test]
        fn unknown_name_is_an_error_naming_the_value() {
            let err = strategy_by_name("everything").unwrap_err();
            assert!(matches!(
                err,
                SiftError::UnknownStrategy { ref name } if name == "everything"
            ));
        }
    }

    mod symbol_only {
        use super::*;

        #[test]
        fn direct_hit_selects_only_the_using_test() {
            // Package P defines Add and Sub; only Add was edited and only
            // TestAdd references it.
            let symbols = vec![symbol("proj/p", "Add", SymbolKind::Func)];
            let tests = vec![test_fn("proj/p", "TestAdd"), test_fn("proj/p", "TestSub")];
            let usages = vec![usage("TestAdd", "Add", SymbolKind::Func)];

            let jobs = SymbolOnly.select(&symbols, &tests, &usages);
            assert_eq!(
                job_set(&jobs),
                HashSet::from([("proj/p".to_string(), "TestAdd".to_string())])
            );
        }

        #[test]
        fn every_job_traces_back_to_an_edge() {
            let symbols = vec![symbol("proj/p", "Add", SymbolKind::Func)];
            let tests = vec![test_fn("proj/p", "TestAdd"), test_fn("proj/p", "TestSub")];
            let usages = vec![usage("TestAdd", "Add", SymbolKind::Func)];

            let jobs = SymbolOnly.select(&symbols, &tests, &usages);
            for job in &jobs {
                assert!(usages.iter().any(|u| u.test_name == job.test_name));
            }
        }

        #[test]
        fn no_edges_selects_nothing() {
            let symbols = vec![symbol("proj/a", "Add", SymbolKind::Func)];
            let tests = vec![test_fn("proj/b", "TestAdd")];
            let jobs = SymbolOnly.select(&symbols, &tests, &[]);
            assert!(jobs.is_empty());
        }

        #[test]
        fn duplicate_edges_collapse_to_one_job() {
            let tests = vec![test_fn("proj/p", "TestAdd")];
            let usages = vec![
                usage("TestAdd", "Add", SymbolKind::Func),
                usage("TestAdd", "Sub", SymbolKind::Func),
            ];
            let jobs = SymbolOnly.select(&[], &tests, &usages);
            assert_eq!(jobs.len(), 1);
        }

        #[test]
        fn edge_for_undiscovered_test_is_dropped() {
            let usages = vec![usage("TestGhost", "Add", SymbolKind::Func)];
            let jobs = SymbolOnly.select(&[], &[], &usages);
            assert!(jobs.is_empty());
        }
    }

    mod package_fallback {
        use super::*;

        #[test]
        fn intra_package_edges_suppress_the_fallback() {
            let symbols = vec![symbol("proj/p", "Add", SymbolKind::Func)];
            let tests = vec![test_fn("proj/p", "TestAdd"), test_fn("proj/p", "TestSub")];
            let usages = vec![usage("TestAdd", "Add", SymbolKind::Func)];

            let jobs = PackageFallback.select(&symbols, &tests, &usages);
            assert_eq!(
                job_set(&jobs),
                HashSet::from([("proj/p".to_string(), "TestAdd".to_string())])
            );
        }

        #[test]
        fn downstream_edge_does_not_suppress_upstream_fallback() {
            // Shop's Product changed; the only edge comes from Calc's test.
            // Shop's own tests must all run, Calc stays narrowly selected.
            let symbols = vec![symbol("proj/shop", "Product", SymbolKind::Type)];
            let tests = vec![
                test_fn("proj/shop", "TestCart"),
                test_fn("proj/shop", "TestProducts"),
                test_fn("proj/calc", "TestAddPriceProduct"),
                test_fn("proj/calc", "TestUnrelated"),
            ];
            let usages = vec![usage("TestAddPriceProduct", "Product", SymbolKind::Type)];

            let jobs = PackageFallback.select(&symbols, &tests, &usages);
            assert_eq!(
                job_set(&jobs),
                HashSet::from([
                    ("proj/calc".to_string(), "TestAddPriceProduct".to_string()),
                    ("proj/shop".to_string(), "TestCart".to_string()),
                    ("proj/shop".to_string(), "TestProducts".to_string()),
                ])
            );
        }

        #[test]
        fn changed_package_without_tests_adds_nothing() {
            let symbols = vec![symbol("proj/a", "Add", SymbolKind::Func)];
            let jobs = PackageFallback.select(&symbols, &[], &[]);
            assert!(jobs.is_empty());
        }

        #[test]
        fn sandwiched_between_symbol_only_and_conservative() {
            let symbols = vec![
                symbol("proj/shop", "Product", SymbolKind::Type),
                symbol("proj/calc", "AddPrice", SymbolKind::Func),
            ];
            let tests = vec![
                test_fn("proj/shop", "TestCart"),
                test_fn("proj/calc", "TestAddPrice"),
                test_fn("proj/calc", "TestOther"),
            ];
            let usages = vec![usage("TestAddPrice", "AddPrice", SymbolKind::Func)];

            let narrow = job_set(&SymbolOnly.select(&symbols, &tests, &usages));
            let middle = job_set(&PackageFallback.select(&symbols, &tests, &usages));
            let wide = job_set(&Conservative.select(&symbols, &tests, &usages));

            assert!(narrow.is_subset(&middle));
            assert!(middle.is_subset(&wide));
        }
    }

    mod conservative {
        use super::*;

        #[test]
        fn selects_the_union_over_changed_packages() {
            let symbols = vec![symbol("proj/p", "Add", SymbolKind::Func)];
            let tests = vec![
                test_fn("proj/p", "TestAdd"),
                test_fn("proj/p", "TestSub"),
                test_fn("proj/q", "TestOther"),
            ];
            let usages = vec![usage("TestAdd", "Add", SymbolKind::Func)];

            let jobs = Conservative.select(&symbols, &tests, &usages);
            assert_eq!(
                job_set(&jobs),
                HashSet::from([
                    ("proj/p".to_string(), "TestAdd".to_string()),
                    ("proj/p".to_string(), "TestSub".to_string()),
                ])
            );
        }

        #[test]
        fn downstream_package_is_not_selected() {
            // Conservative follows changed packages, not the usage graph: the
            // downstream Calc test disappears even though it has an edge.
            let symbols = vec![symbol("proj/shop", "Product", SymbolKind::Type)];
            let tests = vec![
                test_fn("proj/shop", "TestCart"),
                test_fn("proj/calc", "TestAddPriceProduct"),
            ];
            let usages = vec![usage("TestAddPriceProduct", "Product", SymbolKind::Type)];

            let jobs = Conservative.select(&symbols, &tests, &usages);
            assert_eq!(
                job_set(&jobs),
                HashSet::from([("proj/shop".to_string(), "TestCart".to_string())])
            );
        }
    }

    mod invariants {
        use super::*;

        #[test]
        fn outputs_never_contain_duplicates() {
            let symbols = vec![symbol("proj/p", "Add", SymbolKind::Func)];
            let tests = vec![test_fn("proj/p", "TestAdd")];
            let usages = vec![
                usage("TestAdd", "Add", SymbolKind::Func),
                usage("TestAdd", "Add", SymbolKind::Type),
            ];

            for name in ["symbol-only", "package-fallback", "conservative"] {
                let jobs = strategy_by_name(name)
                    .unwrap()
                    .select(&symbols, &tests, &usages);
                let set = job_set(&jobs);
                assert_eq!(set.len(), jobs.len(), "{name} emitted duplicates");
            }
        }

        #[test]
        fn every_job_package_belongs_to_a_discovered_test() {
            let symbols = vec![
                symbol("proj/p", "Add", SymbolKind::Func),
                symbol("proj/untested", "Orphan", SymbolKind::Func),
            ];
            let tests = vec![test_fn("proj/p", "TestAdd")];
            let usages = vec![usage("TestAdd", "Add", SymbolKind::Func)];

            for name in ["symbol-only", "package-fallback", "conservative"] {
                let jobs = strategy_by_name(name)
                    .unwrap()
                    .select(&symbols, &tests, &usages);
                for job in &jobs {
                    assert!(
                        tests.iter().any(|t| t.package == job.package),
                        "{name} emitted a job for a package without tests"
                    );
                }
            }
        }
    }
}

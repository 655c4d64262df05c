//! Package loading and the semantic model.
//!
//! A loaded package is one or two [`PackageModel`]s: the production variant
//! and, when `_test.go` files declare a `pkg_test` sibling, the black-box
//! test variant. Each model carries the package's top-level scope, its
//! method sets, and the function return types the type tracker feeds on.
//!
//! Every top-level definition gets a [`DefId`] from a loader-wide counter.
//! The `DefId` is the definition-object identity the usage detector matches
//! on. Loads are memoized per `(import path, tests included)`: a package
//! reached twice through imports resolves to object-identical definitions,
//! while the production load and the tests-included reload of the same
//! package mint distinct ids. The detector's keyed fallback exists for the
//! second case.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;
use tree_sitter::{Node, Tree};

use gosift_core::adapter::BuildOracle;
use gosift_core::types::{Origin, PackageId, SymbolKind};

use crate::syntax::{
    self, first_result_type, imports_of, named_children, node_line, node_text, package_name,
    receiver_base, receiver_type_string, GoImport,
};

// ============================================================================
// Errors
// ============================================================================

/// Errors from package loading. All of these degrade at the call sites in
/// `usage`: the package's contribution is dropped and the run continues.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The build oracle could not place the package on disk.
    #[error("no directory resolved for package {package}")]
    UnresolvedDir { package: String },

    /// The package directory could not be listed.
    #[error("failed to read {}: {source}", dir.display())]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Nothing in the directory parsed as Go source.
    #[error("no parseable Go sources in {}", dir.display())]
    NoSources { dir: PathBuf },
}

// ============================================================================
// Definition Objects
// ============================================================================

/// Identity of one top-level definition within a loader's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(pub u32);

/// A resolved top-level definition.
#[derive(Debug, Clone)]
pub struct DefObject {
    pub id: DefId,
    /// Canonical import path of the owning package. Test-sibling variants
    /// carry the production path so keyed matching lines up with symbols
    /// attributed by the build oracle.
    pub package_path: String,
    pub name: String,
    pub kind: SymbolKind,
    /// Receiver display string, `Some` iff `kind == Method`.
    pub receiver: Option<String>,
    pub origin: Origin,
}

/// A named type anchored to its owning package's import path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub package: String,
    pub name: String,
}

// ============================================================================
// Source Files and Models
// ============================================================================

/// One parsed file of a package variant.
#[derive(Debug)]
pub struct SourceFile {
    /// Base file name.
    pub name: String,
    pub text: String,
    pub tree: Tree,
    pub imports: Vec<GoImport>,
}

impl SourceFile {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// The semantic view of one package variant.
#[derive(Debug)]
pub struct PackageModel {
    /// Canonical import path (production path for both variants).
    pub import_path: String,
    /// Package clause name (`shop` or `shop_test`).
    pub name: String,
    pub files: Vec<SourceFile>,
    /// Top-level scope: functions and types by name.
    scope: HashMap<String, DefId>,
    /// Methods by receiver base type name, then method name.
    methods: HashMap<String, HashMap<String, DefId>>,
    /// First declared result type per function, for the type tracker.
    pub func_returns: HashMap<String, TypeRef>,
    objects: HashMap<DefId, DefObject>,
}

impl PackageModel {
    /// Look up a top-level function or type by name.
    pub fn lookup(&self, name: &str) -> Option<&DefObject> {
        self.scope.get(name).and_then(|id| self.objects.get(id))
    }

    /// Look up a method on a receiver base type.
    pub fn method(&self, type_name: &str, method_name: &str) -> Option<&DefObject> {
        self.methods
            .get(type_name)
            .and_then(|set| set.get(method_name))
            .and_then(|id| self.objects.get(id))
    }

    /// The file with the given base name, if this variant owns it.
    pub fn file(&self, name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// All definition objects of this variant, methods included.
    pub fn objects(&self) -> impl Iterator<Item = &DefObject> {
        self.objects.values()
    }

    /// Whether this is a `_test` sibling variant.
    pub fn is_test_variant(&self) -> bool {
        self.name.ends_with("_test")
    }
}

/// Registry of externally loaded package models, keyed by import path.
pub type ExternalModels = HashMap<String, Rc<PackageModel>>;

/// Resolve an identifier to the imported package model it names in `file`.
///
/// Matches an explicit alias first, then the path's base segment, then the
/// loaded package's declared name (which may differ from the base segment).
/// Dot imports never match here; they have no qualifying identifier.
pub fn imported_model<'a>(
    file: &SourceFile,
    name: &str,
    external: &'a ExternalModels,
) -> Option<&'a Rc<PackageModel>> {
    for import in &file.imports {
        if import.dot {
            continue;
        }
        let hit = match &import.alias {
            Some(alias) => alias == name,
            None => {
                import.base() == name
                    || external.get(&import.path).is_some_and(|m| m.name == name)
            }
        };
        if hit {
            return external.get(&import.path);
        }
    }
    None
}

/// Models dot-imported by `file`, in declaration order.
pub fn dot_imported_models<'a>(
    file: &SourceFile,
    external: &'a ExternalModels,
) -> Vec<&'a Rc<PackageModel>> {
    file.imports
        .iter()
        .filter(|i| i.dot)
        .filter_map(|i| external.get(&i.path))
        .collect()
}

/// Resolve a type expression node to a [`TypeRef`] in the context of `file`.
///
/// Handles plain names, pointer types, generic instantiations, and
/// package-qualified names; anything else (maps, slices, funcs, anonymous
/// structs) yields `None` since methods on such types are not tracked.
pub fn type_ref_from_node(
    ty: Node<'_>,
    source: &str,
    imports: &[GoImport],
    self_path: &str,
) -> Option<TypeRef> {
    match ty.kind() {
        "type_identifier" => Some(TypeRef {
            package: self_path.to_string(),
            name: node_text(ty, source).to_string(),
        }),
        "pointer_type" => ty
            .named_child(0)
            .and_then(|inner| type_ref_from_node(inner, source, imports, self_path)),
        "generic_type" => ty
            .child_by_field_name("type")
            .and_then(|inner| type_ref_from_node(inner, source, imports, self_path)),
        "qualified_type" => {
            let qualifier = node_text(ty.child_by_field_name("package")?, source);
            let name = node_text(ty.child_by_field_name("name")?, source);
            let package = imports
                .iter()
                .filter(|i| !i.dot)
                .find(|i| match &i.alias {
                    Some(alias) => alias == qualifier,
                    None => i.base() == qualifier,
                })
                .map(|i| i.path.clone())
                .unwrap_or_else(|| qualifier.to_string());
            Some(TypeRef {
                package,
                name: name.to_string(),
            })
        }
        _ => None,
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Memoizing package loader.
pub struct PackageLoader<'o> {
    oracle: &'o dyn BuildOracle,
    cache: HashMap<(String, bool), Vec<Rc<PackageModel>>>,
    next_def: u32,
}

impl<'o> PackageLoader<'o> {
    pub fn new(oracle: &'o dyn BuildOracle) -> Self {
        PackageLoader {
            oracle,
            cache: HashMap::new(),
            next_def: 0,
        }
    }

    /// Load a package's variants, memoized per `(path, include_tests)`.
    ///
    /// Files that fail to read or parse are skipped; the variants reflect
    /// whatever remained parseable.
    pub fn load(
        &mut self,
        package: &PackageId,
        include_tests: bool,
    ) -> Result<Vec<Rc<PackageModel>>, LoadError> {
        let key = (package.as_str().to_string(), include_tests);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let dir = self
            .oracle
            .package_dir(package)
            .ok_or_else(|| LoadError::UnresolvedDir {
                package: package.as_str().to_string(),
            })?;

        let files = go_files_in(&dir, include_tests)?;
        let mut parsed: Vec<(String, SourceFile)> = Vec::new();
        for path in files {
            let Some(file) = parse_file(&path) else {
                continue;
            };
            let Some(clause) = package_name(file.root(), &file.text) else {
                debug!(file = %file.name, "file has no package clause, skipping");
                continue;
            };
            parsed.push((clause, file));
        }
        if parsed.is_empty() {
            return Err(LoadError::NoSources { dir });
        }

        // Group files into variants by package clause, production first.
        let mut groups: Vec<(String, Vec<SourceFile>)> = Vec::new();
        for (clause, file) in parsed {
            match groups.iter_mut().find(|(name, _)| *name == clause) {
                Some((_, group)) => group.push(file),
                None => groups.push((clause, vec![file])),
            }
        }
        groups.sort_by_key(|(name, _)| name.ends_with("_test"));

        let variants: Vec<Rc<PackageModel>> = groups
            .into_iter()
            .map(|(name, files)| Rc::new(self.build_model(package.as_str(), name, files)))
            .collect();

        self.cache.insert(key, variants.clone());
        Ok(variants)
    }

    fn alloc(&mut self) -> DefId {
        let id = DefId(self.next_def);
        self.next_def += 1;
        id
    }

    fn build_model(
        &mut self,
        import_path: &str,
        name: String,
        files: Vec<SourceFile>,
    ) -> PackageModel {
        let mut scope: HashMap<String, DefId> = HashMap::new();
        let mut methods: HashMap<String, HashMap<String, DefId>> = HashMap::new();
        let mut func_returns: HashMap<String, TypeRef> = HashMap::new();
        let mut objects: HashMap<DefId, DefObject> = HashMap::new();

        for file in &files {
            let source = &file.text;
            for node in named_children(file.root()) {
                match node.kind() {
                    "function_declaration" => {
                        let Some(name_node) = node.child_by_field_name("name") else {
                            continue;
                        };
                        let fn_name = node_text(name_node, source).to_string();
                        let id = self.alloc();
                        objects.insert(
                            id,
                            DefObject {
                                id,
                                package_path: import_path.to_string(),
                                name: fn_name.clone(),
                                kind: SymbolKind::Func,
                                receiver: None,
                                origin: Origin::new(file.name.clone(), node_line(node)),
                            },
                        );
                        scope.entry(fn_name.clone()).or_insert(id);
                        if let Some(result) = first_result_type(node) {
                            if let Some(type_ref) =
                                type_ref_from_node(result, source, &file.imports, import_path)
                            {
                                func_returns.entry(fn_name).or_insert(type_ref);
                            }
                        }
                    }
                    "method_declaration" => {
                        let Some(name_node) = node.child_by_field_name("name") else {
                            continue;
                        };
                        let Some(recv_node) = node.child_by_field_name("receiver") else {
                            continue;
                        };
                        let Some(receiver) = receiver_type_string(recv_node, source) else {
                            continue;
                        };
                        let method_name = node_text(name_node, source).to_string();
                        let id = self.alloc();
                        objects.insert(
                            id,
                            DefObject {
                                id,
                                package_path: import_path.to_string(),
                                name: method_name.clone(),
                                kind: SymbolKind::Method,
                                receiver: Some(receiver.clone()),
                                origin: Origin::new(file.name.clone(), node_line(node)),
                            },
                        );
                        methods
                            .entry(receiver_base(&receiver).to_string())
                            .or_default()
                            .entry(method_name)
                            .or_insert(id);
                    }
                    "type_declaration" => {
                        for spec in named_children(node) {
                            if spec.kind() != "type_spec" && spec.kind() != "type_alias" {
                                continue;
                            }
                            let Some(name_node) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let type_name = node_text(name_node, source).to_string();
                            let id = self.alloc();
                            objects.insert(
                                id,
                                DefObject {
                                    id,
                                    package_path: import_path.to_string(),
                                    name: type_name.clone(),
                                    kind: SymbolKind::Type,
                                    receiver: None,
                                    origin: Origin::new(file.name.clone(), node_line(spec)),
                                },
                            );
                            scope.entry(type_name).or_insert(id);
                        }
                    }
                    _ => {}
                }
            }
        }

        PackageModel {
            import_path: import_path.to_string(),
            name,
            files,
            scope,
            methods,
            func_returns,
            objects,
        }
    }
}

/// Parse one file from disk; `None` (with a debug log) on read or syntax
/// failure.
fn parse_file(path: &Path) -> Option<SourceFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            debug!(file = %name, error = %err, "failed to read file, skipping");
            return None;
        }
    };
    let tree = match syntax::parse_valid(&text, &name) {
        Ok(tree) => tree,
        Err(err) => {
            debug!(file = %name, error = %err, "failed to parse file, skipping");
            return None;
        }
    };
    let imports = imports_of(tree.root_node(), &text);
    Some(SourceFile {
        name,
        text,
        tree,
        imports,
    })
}

/// Sorted `.go` files of a directory, optionally including `_test.go` files.
fn go_files_in(dir: &Path, include_tests: bool) -> Result<Vec<PathBuf>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::ReadDir {
        dir: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.ends_with(".go") && (include_tests || !name.ends_with("_test.go"))
        })
        .collect();
    files.sort();
    Ok(files)
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

    fn write_shop(dir: &Path) {
        fs::write(
            dir.join("cart.go"),
            r#"package shop

type Cart struct {
    Items []Product
}

func NewCart() *Cart {
    return &Cart{}
}

func (c *Cart) AddItem(p Product) {
    c.Items = append(c.Items, p)
}

func (c Cart) Total() int {
    total := 0
    for _, p := range c.Items {
        total += p.Price
    }
    return total
}
"#,
        )
        .unwrap();
        fs::write(
            dir.join("products.go"),
            r#"package shop

type Product struct {
    Name  string
    Price int
}
"#,
        )
        .unwrap();
        fs::write(
            dir.join("cart_test.go"),
            r#"package shop

import "testing"

func TestAddItem(t *testing.T) {
    c := NewCart()
    c.AddItem(Product{Name: "a", Price: 1})
    if c.Total() != 1 {
        t.Fatal("wrong total")
    }
}
"#,
        )
        .unwrap();
        fs::write(
            dir.join("export_test.go"),
            r#"package shop_test

import (
    "testing"

    "proj/shop"
)

func TestExported(t *testing.T) {
    c := shop.NewCart()
    _ = c
}
"#,
        )
        .unwrap();
    }

    fn shop_loader(dir: &Path) -> StaticOracle {
        let mut oracle = StaticOracle::new();
        oracle.insert("proj/shop", dir);
        oracle
    }

    #[test]
    fn production_load_excludes_test_files() {
        let tmp = TempDir::new().unwrap();
        write_shop(tmp.path());
        let oracle = shop_loader(tmp.path());
        let mut loader = PackageLoader::new(&oracle);

        let variants = loader.load(&PackageId::new("proj/shop"), false).unwrap();
        assert_eq!(variants.len(), 1);
        let model = &variants[0];
        assert_eq!(model.name, "shop");
        assert!(model.file("cart_test.go").is_none());
        assert!(model.lookup("NewCart").is_some());
        assert!(model.lookup("Product").is_some());
        assert!(model.method("Cart", "AddItem").is_some());
        assert!(model.method("Cart", "Total").is_some());
    }

    #[test]
    fn tests_load_splits_black_box_variant() {
        let tmp = TempDir::new().unwrap();
        write_shop(tmp.path());
        let oracle = shop_loader(tmp.path());
        let mut loader = PackageLoader::new(&oracle);

        let variants = loader.load(&PackageId::new("proj/shop"), true).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].name, "shop");
        assert!(variants[0].file("cart_test.go").is_some());
        assert_eq!(variants[1].name, "shop_test");
        assert!(variants[1].is_test_variant());
        assert!(variants[1].file("export_test.go").is_some());
        // The sibling carries the production import path for keyed matching.
        assert_eq!(variants[1].import_path, "proj/shop");
    }

    #[test]
    fn loads_are_memoized_but_variants_are_distinct_objects() {
        let tmp = TempDir::new().unwrap();
        write_shop(tmp.path());
        let oracle = shop_loader(tmp.path());
        let mut loader = PackageLoader::new(&oracle);
        let package = PackageId::new("proj/shop");

        let first = loader.load(&package, false).unwrap();
        let again = loader.load(&package, false).unwrap();
        let with_tests = loader.load(&package, true).unwrap();

        // Memoized load: identical definition objects.
        assert_eq!(
            first[0].lookup("NewCart").unwrap().id,
            again[0].lookup("NewCart").unwrap().id
        );
        // Reload with tests: same name, fresh identity.
        assert_ne!(
            first[0].lookup("NewCart").unwrap().id,
            with_tests[0].lookup("NewCart").unwrap().id
        );
    }

    #[test]
    fn func_returns_strip_pointers_and_resolve_self_types() {
        let tmp = TempDir::new().unwrap();
        write_shop(tmp.path());
        let oracle = shop_loader(tmp.path());
        let mut loader = PackageLoader::new(&oracle);

        let variants = loader.load(&PackageId::new("proj/shop"), false).unwrap();
        let returns = variants[0].func_returns.get("NewCart").unwrap();
        assert_eq!(returns.package, "proj/shop");
        assert_eq!(returns.name, "Cart");
    }

    #[test]
    fn unparseable_file_is_dropped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        write_shop(tmp.path());
        fs::write(tmp.path().join("broken.go"), "package shop\n\nfunc Broken( {").unwrap();
        let oracle = shop_loader(tmp.path());
        let mut loader = PackageLoader::new(&oracle);

        let variants = loader.load(&PackageId::new("proj/shop"), false).unwrap();
        assert!(variants[0].lookup("Broken").is_none());
        assert!(variants[0].lookup("NewCart").is_some());
    }

    #[test]
    fn unresolved_package_is_a_load_error() {
        let oracle = StaticOracle::new();
        let mut loader = PackageLoader::new(&oracle);
        let err = loader.load(&PackageId::new("proj/missing"), false).unwrap_err();
        assert!(matches!(err, LoadError::UnresolvedDir { .. }));
    }

    mod import_resolution {
        use super::*;

        fn calc_file(tmp: &TempDir) -> (StaticOracle, PathBuf) {
            let shop_dir = tmp.path().join("shop");
            let calc_dir = tmp.path().join("calc");
            fs::create_dir_all(&shop_dir).unwrap();
            fs::create_dir_all(&calc_dir).unwrap();
            write_shop(&shop_dir);
            fs::write(
                calc_dir.join("calc.go"),
                r#"package calc

import (
    sh "proj/shop"
)

func PriceOf(p sh.Product) int {
    return p.Price
}
"#,
            )
            .unwrap();
            let mut oracle = StaticOracle::new();
            oracle.insert("proj/shop", &shop_dir);
            oracle.insert("proj/calc", &calc_dir);
            (oracle, calc_dir)
        }

        #[test]
        fn aliased_import_resolves_to_the_loaded_model() {
            let tmp = TempDir::new().unwrap();
            let (oracle, _calc_dir) = calc_file(&tmp);
            let mut loader = PackageLoader::new(&oracle);

            let shop = loader.load(&PackageId::new("proj/shop"), false).unwrap();
            let calc = loader.load(&PackageId::new("proj/calc"), false).unwrap();

            let mut external = ExternalModels::new();
            external.insert("proj/shop".to_string(), shop[0].clone());

            let file = calc[0].file("calc.go").unwrap();
            let resolved = imported_model(file, "sh", &external).unwrap();
            assert_eq!(resolved.import_path, "proj/shop");
            // The alias shadows the base segment.
            assert!(imported_model(file, "shop", &external).is_none());
        }
    }
}


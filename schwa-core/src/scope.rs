//! Lexical scopes and symbol records.
//!
//! Scopes form a tree mirroring block structure, stored in a flat
//! arena with parent links as indices. Every scope owns three
//! independent namespaces (variables, functions, structs) plus its
//! child scopes; all four maps preserve insertion order so diagnostics
//! and generated output stay deterministic.
//!
//! Lookup is delegating: a miss in the local namespace recurses to the
//! parent, and a miss at the root is the only negative result. Whether
//! "not found" is an error is the caller's policy.
//!
//! The tree is built by the analyzer in a single pass and is
//! structurally immutable afterwards; the formatter and generator are
//! read-only consumers.

use indexmap::IndexMap;

use crate::ast::NodeId;

/// Index of a scope inside a [`SymbolTable`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A variable declaration owned by one scope.
///
/// `offset` and `size` describe the byte layout in linear memory and
/// are only meaningful when `mapped` is set (struct fields and
/// struct-typed globals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub node: NodeId,
    pub scope: ScopeId,
    pub ident: String,
    pub data_type: String,
    pub global: bool,
    pub constant: bool,
    pub exported: bool,
    pub imported: bool,
    pub mapped: bool,
    pub offset: u32,
    pub size: u32,
}

/// A function declaration owned by one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub node: NodeId,
    pub scope: ScopeId,
    pub ident: String,
    pub return_type: String,
    pub param_types: Vec<String>,
    pub imported: bool,
    pub exported: bool,
}

/// One field of a struct: identifier, type and byte layout inside the
/// struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub ident: String,
    pub data_type: String,
    pub offset: u32,
    pub size: u32,
}

/// A struct declaration owned by one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub node: NodeId,
    pub scope: ScopeId,
    pub ident: String,
    pub fields: Vec<FieldInfo>,
    pub size: u32,
    pub imported: bool,
    pub exported: bool,
}

/// A single lexical scope.
///
/// Anonymous block scopes have no identifier and never contribute to
/// dotted paths; named scopes (functions, structs) do.
#[derive(Debug)]
pub struct Scope {
    ident: Option<String>,
    node: Option<NodeId>,
    parent: Option<ScopeId>,
    children: IndexMap<String, ScopeId>,
    variables: IndexMap<String, Variable>,
    functions: IndexMap<String, Function>,
    structs: IndexMap<String, StructDef>,
}

impl Scope {
    fn new(ident: Option<String>, node: Option<NodeId>, parent: Option<ScopeId>) -> Scope {
        Scope {
            ident,
            node,
            parent,
            children: IndexMap::new(),
            variables: IndexMap::new(),
            functions: IndexMap::new(),
            structs: IndexMap::new(),
        }
    }

    pub fn ident(&self) -> Option<&str> {
        self.ident.as_deref()
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Variable in this scope only, without delegation.
    pub fn local_variable(&self, ident: &str) -> Option<&Variable> {
        self.variables.get(ident)
    }

    pub fn local_function(&self, ident: &str) -> Option<&Function> {
        self.functions.get(ident)
    }

    pub fn local_struct(&self, ident: &str) -> Option<&StructDef> {
        self.structs.get(ident)
    }

    /// Variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructDef> {
        self.structs.values()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, ScopeId)> {
        self.children.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

/// Arena holding the whole scope tree. The root scope is created with
/// the table and is unnamed.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn new() -> SymbolTable {
        SymbolTable {
            scopes: vec![Scope::new(None, None, None)],
        }
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Creates a child scope under `parent`.
    ///
    /// Named scopes are keyed by their identifier; anonymous scopes get
    /// a synthetic key so that every child stays addressable.
    pub fn add_scope(
        &mut self,
        parent: ScopeId,
        ident: Option<String>,
        node: Option<NodeId>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let key = match &ident {
            Some(name) => name.clone(),
            None => format!("${}", id.0),
        };
        self.scopes.push(Scope::new(ident, node, Some(parent)));
        self.scopes[parent.index()].children.insert(key, id);
        id
    }

    // -----------------------------------------------------------------
    // Declarations: pure inserts into the local namespace. A duplicate
    // key displaces the previous record and hands it back to the
    // caller; conflict policy lives with the analyzer, not here.
    // -----------------------------------------------------------------

    pub fn declare_variable(&mut self, scope: ScopeId, variable: Variable) -> Option<Variable> {
        self.scopes[scope.index()]
            .variables
            .insert(variable.ident.clone(), variable)
    }

    pub fn declare_function(&mut self, scope: ScopeId, function: Function) -> Option<Function> {
        self.scopes[scope.index()]
            .functions
            .insert(function.ident.clone(), function)
    }

    pub fn declare_struct(&mut self, scope: ScopeId, strukt: StructDef) -> Option<StructDef> {
        self.scopes[scope.index()]
            .structs
            .insert(strukt.ident.clone(), strukt)
    }

    // -----------------------------------------------------------------
    // Lookups: local namespace first, then the parent chain. The root's
    // miss is the only "not found".
    // -----------------------------------------------------------------

    pub fn lookup_variable(&self, scope: ScopeId, ident: &str) -> Option<&Variable> {
        self.resolve(scope, |s| s.variables.get(ident))
    }

    pub fn lookup_function(&self, scope: ScopeId, ident: &str) -> Option<&Function> {
        self.resolve(scope, |s| s.functions.get(ident))
    }

    pub fn lookup_struct(&self, scope: ScopeId, ident: &str) -> Option<&StructDef> {
        self.resolve(scope, |s| s.structs.get(ident))
    }

    /// Child scope by identifier, delegating to the parent on a local
    /// miss. This resolves qualified paths through nested named scopes
    /// (a struct's field-owner chain, for instance) from anywhere
    /// inside the tree.
    pub fn child_scope(&self, scope: ScopeId, ident: &str) -> Option<ScopeId> {
        self.resolve(scope, |s| s.children.get(ident)).copied()
    }

    /// Resolves in `scope` or the nearest ancestor; the single helper
    /// that terminates the delegation chain at the root.
    fn resolve<'a, T: ?Sized>(
        &'a self,
        scope: ScopeId,
        mut pick: impl FnMut(&'a Scope) -> Option<&'a T>,
    ) -> Option<&'a T> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.index()];
            if let Some(found) = pick(s) {
                return Some(found);
            }
            current = s.parent;
        }
        None
    }

    /// Fully qualified dotted name for `ident` as seen from `scope`.
    ///
    /// Walks rootward, prepending each enclosing named scope. With
    /// `stop_at_node` the walk breaks upon reaching a node-owning scope
    /// before prefixing it, which turns a fully-global path into the
    /// local path inside the nearest function or struct body.
    pub fn path(&self, scope: ScopeId, ident: &str, stop_at_node: bool) -> String {
        let mut path = String::from(ident);
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.index()];
            if stop_at_node && s.node.is_some() {
                break;
            }
            if let Some(name) = &s.ident {
                path = format!("{name}.{path}");
            }
            current = s.parent;
        }
        path
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ast, NodeCategory};
    use crate::token::{Token, TokenCategory};

    fn variable(node: NodeId, scope: ScopeId, ident: &str, ty: &str) -> Variable {
        Variable {
            node,
            scope,
            ident: ident.to_string(),
            data_type: ty.to_string(),
            global: false,
            constant: false,
            exported: false,
            imported: false,
            mapped: false,
            offset: 0,
            size: 0,
        }
    }

    fn leaf(ast: &mut Ast, text: &str) -> NodeId {
        ast.add(
            NodeCategory::Ident,
            Token::new(TokenCategory::Ident, text, 1, 1),
            vec![],
        )
    }

    #[test]
    fn inner_declaration_shadows_outer() {
        let mut ast = Ast::new();
        let mut table = SymbolTable::new();
        let outer = table.add_scope(SymbolTable::ROOT, Some("a".into()), None);
        let inner = table.add_scope(outer, Some("b".into()), None);

        let outer_node = leaf(&mut ast, "x");
        let inner_node = leaf(&mut ast, "x");
        table.declare_variable(outer, variable(outer_node, outer, "x", "i32"));
        table.declare_variable(inner, variable(inner_node, inner, "x", "i64"));

        assert_eq!(table.lookup_variable(inner, "x").unwrap().node, inner_node);
        assert_eq!(table.lookup_variable(outer, "x").unwrap().node, outer_node);
        assert!(table.lookup_variable(SymbolTable::ROOT, "x").is_none());
    }

    #[test]
    fn namespaces_are_independent() {
        let mut ast = Ast::new();
        let mut table = SymbolTable::new();
        let node = leaf(&mut ast, "item");

        table.declare_variable(
            SymbolTable::ROOT,
            variable(node, SymbolTable::ROOT, "item", "i32"),
        );
        table.declare_function(
            SymbolTable::ROOT,
            Function {
                node,
                scope: SymbolTable::ROOT,
                ident: "item".into(),
                return_type: "void".into(),
                param_types: vec![],
                imported: false,
                exported: false,
            },
        );

        assert!(table.lookup_variable(SymbolTable::ROOT, "item").is_some());
        assert!(table.lookup_function(SymbolTable::ROOT, "item").is_some());
        assert!(table.lookup_struct(SymbolTable::ROOT, "item").is_none());
    }

    #[test]
    fn duplicate_insert_returns_displaced_record() {
        let mut ast = Ast::new();
        let mut table = SymbolTable::new();
        let first = leaf(&mut ast, "x");
        let second = leaf(&mut ast, "x");

        let displaced = table.declare_variable(
            SymbolTable::ROOT,
            variable(first, SymbolTable::ROOT, "x", "i32"),
        );
        assert!(displaced.is_none());

        let displaced = table.declare_variable(
            SymbolTable::ROOT,
            variable(second, SymbolTable::ROOT, "x", "i64"),
        );
        assert_eq!(displaced.unwrap().node, first);
        // Last declaration wins in the namespace itself.
        assert_eq!(table.lookup_variable(SymbolTable::ROOT, "x").unwrap().node, second);
    }

    #[test]
    fn child_scope_delegates_to_ancestors() {
        let mut table = SymbolTable::new();
        let point = table.add_scope(SymbolTable::ROOT, Some("Point".into()), None);
        let main = table.add_scope(SymbolTable::ROOT, Some("main".into()), None);
        let block = table.add_scope(main, None, None);

        // From deep inside `main`, the struct scope is still reachable.
        assert_eq!(table.child_scope(block, "Point"), Some(point));
        assert_eq!(table.child_scope(main, "Point"), Some(point));
        assert!(table.child_scope(block, "Vector").is_none());
    }

    #[test]
    fn path_prefixes_every_named_scope() {
        let mut ast = Ast::new();
        let mut table = SymbolTable::new();
        let bar = table.add_scope(SymbolTable::ROOT, Some("bar".into()), None);
        let foo_node = leaf(&mut ast, "foo");
        let foo = table.add_scope(bar, Some("foo".into()), Some(foo_node));

        assert_eq!(table.path(foo, "y", false), "bar.foo.y");
    }

    #[test]
    fn path_stops_before_prefixing_a_node_owning_scope() {
        let mut ast = Ast::new();
        let mut table = SymbolTable::new();
        let bar = table.add_scope(SymbolTable::ROOT, Some("bar".into()), None);
        let foo_node = leaf(&mut ast, "foo");
        let foo = table.add_scope(bar, Some("foo".into()), Some(foo_node));
        // Named, node-less scope nested inside the function body.
        let inner = table.add_scope(foo, Some("inner".into()), None);

        // A local declared directly in the node-owning scope keeps only
        // its own identifier.
        assert_eq!(table.path(foo, "y", true), "y");
        // Scopes below the node-owning one are still prefixed.
        assert_eq!(table.path(inner, "y", true), "inner.y");
        assert_eq!(table.path(inner, "y", false), "bar.foo.inner.y");
    }

    #[test]
    fn math_pi_scenario() {
        let mut ast = Ast::new();
        let mut table = SymbolTable::new();
        let math_node = leaf(&mut ast, "Math");
        let math = table.add_scope(SymbolTable::ROOT, Some("Math".into()), Some(math_node));

        let pi_node = leaf(&mut ast, "pi");
        table.declare_variable(math, {
            let mut v = variable(pi_node, math, "pi", "f64");
            v.constant = true;
            v
        });

        let pi = table.lookup_variable(math, "pi").unwrap();
        assert_eq!(pi.data_type, "f64");
        assert_eq!(table.path(math, "pi", false), "Math.pi");
        assert_eq!(table.path(math, "pi", true), "pi");
    }

    #[test]
    fn anonymous_scopes_do_not_contribute_to_paths() {
        let mut table = SymbolTable::new();
        let outer = table.add_scope(SymbolTable::ROOT, Some("outer".into()), None);
        let block = table.add_scope(outer, None, None);

        assert_eq!(table.path(block, "x", false), "outer.x");
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut ast = Ast::new();
        let mut table = SymbolTable::new();
        for name in ["delta", "alpha", "charlie"] {
            let node = leaf(&mut ast, name);
            table.declare_variable(
                SymbolTable::ROOT,
                variable(node, SymbolTable::ROOT, name, "i32"),
            );
        }
        let names: Vec<_> = table
            .scope(SymbolTable::ROOT)
            .variables()
            .map(|v| v.ident.as_str())
            .collect();
        assert_eq!(names, vec!["delta", "alpha", "charlie"]);
    }
}

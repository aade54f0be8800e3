//! Arena-backed abstract syntax tree.
//!
//! Nodes live in a flat vector; children and the parent back-reference
//! are stored as indices, so the ownership of the tree stays strictly
//! tree-shaped while parents remain reachable from any node. The
//! structural shape is fixed once the parser finishes; later stages
//! only fill in the per-node annotation slots, each exactly once.

use std::fmt;

use crate::scope::ScopeId;
use crate::token::Token;

/// Index of a node inside an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Category of an AST node.
///
/// Covers literals, operators, declarations, control flow and the
/// structural groupings the parser emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Program,
    Import,
    Function,
    Parameters,
    Parameter,
    Struct,
    Field,
    Variable,
    Modifier,
    TypeName,
    Block,
    Return,
    Assign,
    If,
    While,
    ExprStmt,
    Binary,
    Unary,
    Call,
    Member,
    Ident,
    Int,
    Float,
    Hex,
    Bool,
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NodeCategory::Program => "program",
            NodeCategory::Import => "import",
            NodeCategory::Function => "function",
            NodeCategory::Parameters => "parameters",
            NodeCategory::Parameter => "parameter",
            NodeCategory::Struct => "struct",
            NodeCategory::Field => "field",
            NodeCategory::Variable => "variable",
            NodeCategory::Modifier => "modifier",
            NodeCategory::TypeName => "type-name",
            NodeCategory::Block => "block",
            NodeCategory::Return => "return",
            NodeCategory::Assign => "assign",
            NodeCategory::If => "if",
            NodeCategory::While => "while",
            NodeCategory::ExprStmt => "expr-stmt",
            NodeCategory::Binary => "binary",
            NodeCategory::Unary => "unary",
            NodeCategory::Call => "call",
            NodeCategory::Member => "member",
            NodeCategory::Ident => "identifier",
            NodeCategory::Int => "int",
            NodeCategory::Float => "float",
            NodeCategory::Hex => "hex",
            NodeCategory::Bool => "bool",
        };
        f.write_str(text)
    }
}

/// A single node: category, triggering token, tree links and the
/// annotation slots later stages fill in.
#[derive(Debug)]
pub struct AstNode {
    pub category: NodeCategory,
    pub token: Token,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    valid: Option<bool>,
    scope: Option<ScopeId>,
    data_type: Option<String>,
    generated: Option<u32>,
}

/// The tree arena. The root is set once by the parser.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Ast {
        Ast::default()
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds a node and attaches every supplied child to it.
    ///
    /// Children are owned exclusively: attaching a node that already
    /// has a parent is a construction bug, not a recoverable state.
    pub fn add(&mut self, category: NodeCategory, token: Token, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for &child in &children {
            let child_node = &mut self.nodes[child.index()];
            debug_assert!(
                child_node.parent.is_none(),
                "node {:?} is already owned by {:?}",
                child,
                child_node.parent
            );
            child_node.parent = Some(id);
        }
        self.nodes.push(AstNode {
            category,
            token,
            children,
            parent: None,
            valid: None,
            scope: None,
            data_type: None,
            generated: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn set_root(&mut self, id: NodeId) {
        debug_assert!(self.root.is_none(), "root set twice");
        self.root = Some(id);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// First child of `id` with the given category, if any.
    pub fn child_of(&self, id: NodeId, category: NodeCategory) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.node(c).category == category)
    }

    // -----------------------------------------------------------------
    // Annotation slots. Each is written exactly once by its owning
    // stage; a second write signals a pipeline-ordering bug and trips
    // the debug assertion.
    // -----------------------------------------------------------------

    pub fn set_valid(&mut self, id: NodeId, valid: bool) {
        let node = &mut self.nodes[id.index()];
        debug_assert!(node.valid.is_none(), "validity of {id:?} annotated twice");
        node.valid = Some(valid);
    }

    pub fn valid(&self, id: NodeId) -> Option<bool> {
        self.nodes[id.index()].valid
    }

    pub fn set_scope(&mut self, id: NodeId, scope: ScopeId) {
        let node = &mut self.nodes[id.index()];
        debug_assert!(node.scope.is_none(), "scope of {id:?} annotated twice");
        node.scope = Some(scope);
    }

    pub fn scope(&self, id: NodeId) -> Option<ScopeId> {
        self.nodes[id.index()].scope
    }

    pub fn set_data_type(&mut self, id: NodeId, data_type: impl Into<String>) {
        let node = &mut self.nodes[id.index()];
        debug_assert!(node.data_type.is_none(), "type of {id:?} annotated twice");
        node.data_type = Some(data_type.into());
    }

    pub fn data_type(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].data_type.as_deref()
    }

    pub fn set_generated(&mut self, id: NodeId, payload: u32) {
        let node = &mut self.nodes[id.index()];
        debug_assert!(
            node.generated.is_none(),
            "generator payload of {id:?} annotated twice"
        );
        node.generated = Some(payload);
    }

    pub fn generated(&self, id: NodeId) -> Option<u32> {
        self.nodes[id.index()].generated
    }

    /// Indented multi-line diagnostic dump of the subtree at `id`.
    ///
    /// Shows the category, the token when its lexeme differs from the
    /// category rendering, and the resolved type when present. Purely
    /// diagnostic and read-only.
    pub fn render(&self, id: NodeId, depth: usize) -> String {
        let mut out = String::new();
        self.render_into(id, depth, &mut out);
        out
    }

    fn render_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.node(id);
        for _ in 0..depth {
            out.push_str("  ");
        }
        let category = node.category.to_string();
        out.push_str(&category);
        if !node.token.text.is_empty() && node.token.text != category {
            out.push_str(&format!(
                " ({} {:?})",
                node.token.category, node.token.text
            ));
        }
        if let Some(data_type) = &node.data_type {
            out.push_str(": ");
            out.push_str(data_type);
        }
        out.push('\n');
        for &child in &node.children {
            self.render_into(child, depth + 1, out);
        }
    }
}

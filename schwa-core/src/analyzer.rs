//! Semantic analysis: scope construction, symbol declaration and type
//! checking.
//!
//! The analyzer is the sole writer of the scope tree. It runs two
//! passes over the program: a declaration pass that records every
//! top-level symbol (so functions can call forward), then a check pass
//! that walks each function body, declares params and locals, resolves
//! every name and annotates expression types onto the AST.
//!
//! 型の既定値: 整数リテラルは `i32`、小数リテラルは `f64`。
//! 期待型が数値なら、リテラルはその型として採用される。

use crate::ast::{Ast, NodeCategory, NodeId};
use crate::diagnostic::{Diagnostic, DiagnosticLog};
use crate::scope::{FieldInfo, Function, ScopeId, StructDef, SymbolTable, Variable};
use crate::token::{Pos, TokenCategory};

/// Builds and returns the scope tree, annotating the AST as it goes.
pub fn analyze(ast: &mut Ast, log: &mut DiagnosticLog) -> SymbolTable {
    let mut analyzer = Analyzer {
        ast,
        table: SymbolTable::new(),
        log,
        data_offset: 0,
        return_type: String::from("void"),
        function_scopes: Vec::new(),
    };
    analyzer.run();
    analyzer.table
}

/// Built-in value types.
fn is_primitive(name: &str) -> bool {
    matches!(name, "i32" | "i64" | "f32" | "f64" | "bool")
}

fn is_numeric(name: &str) -> bool {
    matches!(name, "i32" | "i64" | "f32" | "f64")
}

fn is_integer(name: &str) -> bool {
    matches!(name, "i32" | "i64")
}

fn primitive_size(name: &str) -> u32 {
    match name {
        "i64" | "f64" => 8,
        _ => 4,
    }
}

struct Analyzer<'a, 'log> {
    ast: &'a mut Ast,
    table: SymbolTable,
    log: &'log mut DiagnosticLog,
    /// Next free byte in linear memory for mapped globals.
    data_offset: u32,
    /// Return type of the function currently being checked.
    return_type: String,
    function_scopes: Vec<(NodeId, ScopeId)>,
}

impl Analyzer<'_, '_> {
    fn run(&mut self) {
        let Some(root) = self.ast.root() else {
            return;
        };

        let declarations: Vec<NodeId> = self.ast.children(root).to_vec();
        for &node in &declarations {
            match self.ast.node(node).category {
                NodeCategory::Import => self.declare_import(node),
                NodeCategory::Struct => self.declare_struct(node),
                NodeCategory::Function => self.declare_function(node),
                NodeCategory::Variable => self.declare_global(node),
                _ => {}
            }
        }

        let functions = std::mem::take(&mut self.function_scopes);
        for (node, scope) in functions {
            self.check_function(node, scope);
        }
    }

    // -----------------------------------------------------------------
    // Declaration pass
    // -----------------------------------------------------------------

    fn declare_import(&mut self, node: NodeId) {
        let ident = self.ast.node(node).token.text.clone();
        let pos = self.ast.node(node).token.pos();

        let mut param_types = Vec::new();
        if let Some(parameters) = self.ast.child_of(node, NodeCategory::Parameters) {
            let ty_nodes: Vec<NodeId> = self.ast.children(parameters).to_vec();
            for ty_node in ty_nodes {
                let ty = self.ast.node(ty_node).token.text.clone();
                if !is_primitive(&ty) {
                    self.error(
                        format!("unknown parameter type `{ty}` for imported function `{ident}`"),
                        "E0305",
                        self.ast.node(ty_node).token.pos(),
                    );
                }
                param_types.push(ty);
            }
        }
        let return_type = self.return_type_of(node);

        let displaced = self.table.declare_function(
            SymbolTable::ROOT,
            Function {
                node,
                scope: SymbolTable::ROOT,
                ident: ident.clone(),
                return_type,
                param_types,
                imported: true,
                exported: false,
            },
        );
        if displaced.is_some() {
            self.error(format!("redefinition of function `{ident}`"), "E0304", pos);
        }
        self.ast.set_scope(node, SymbolTable::ROOT);
    }

    fn declare_struct(&mut self, node: NodeId) {
        let ident = self.ast.node(node).token.text.clone();
        let pos = self.ast.node(node).token.pos();
        let struct_scope = self.table.add_scope(SymbolTable::ROOT, Some(ident.clone()), Some(node));

        let mut fields = Vec::new();
        let mut offset = 0u32;
        let field_nodes: Vec<NodeId> = self.ast.children(node).to_vec();
        for field in field_nodes {
            let field_ident = self.ast.node(field).token.text.clone();
            let ty = self
                .ast
                .child_of(field, NodeCategory::TypeName)
                .map(|t| self.ast.node(t).token.text.clone())
                .unwrap_or_default();
            let size = match self.size_of(&ty) {
                Some(size) => size,
                None => {
                    self.error(
                        format!("unknown type `{ty}` for field `{field_ident}`"),
                        "E0305",
                        self.ast.node(field).token.pos(),
                    );
                    0
                }
            };
            fields.push(FieldInfo {
                ident: field_ident.clone(),
                data_type: ty.clone(),
                offset,
                size,
            });
            self.table.declare_variable(
                struct_scope,
                Variable {
                    node: field,
                    scope: struct_scope,
                    ident: field_ident,
                    data_type: ty.clone(),
                    global: false,
                    constant: false,
                    exported: false,
                    imported: false,
                    mapped: true,
                    offset,
                    size,
                },
            );
            self.ast.set_scope(field, struct_scope);
            self.ast.set_data_type(field, ty);
            offset += size;
        }

        let displaced = self.table.declare_struct(
            SymbolTable::ROOT,
            StructDef {
                node,
                scope: SymbolTable::ROOT,
                ident: ident.clone(),
                fields,
                size: offset,
                imported: false,
                exported: false,
            },
        );
        if displaced.is_some() {
            self.error(format!("redefinition of struct `{ident}`"), "E0304", pos);
        }
        self.ast.set_scope(node, SymbolTable::ROOT);
    }

    fn declare_function(&mut self, node: NodeId) {
        let ident = self.ast.node(node).token.text.clone();
        let pos = self.ast.node(node).token.pos();
        let exported = self.has_modifier(node, TokenCategory::Export);

        let mut param_types = Vec::new();
        if let Some(parameters) = self.ast.child_of(node, NodeCategory::Parameters) {
            let params: Vec<NodeId> = self.ast.children(parameters).to_vec();
            for param in params {
                let ty = self
                    .ast
                    .child_of(param, NodeCategory::TypeName)
                    .map(|t| self.ast.node(t).token.text.clone())
                    .unwrap_or_default();
                if !is_primitive(&ty) {
                    self.error(
                        format!("unknown parameter type `{ty}`"),
                        "E0305",
                        self.ast.node(param).token.pos(),
                    );
                }
                param_types.push(ty);
            }
        }
        let return_type = self.return_type_of(node);

        let function_scope = self.table.add_scope(SymbolTable::ROOT, Some(ident.clone()), Some(node));
        self.function_scopes.push((node, function_scope));

        let displaced = self.table.declare_function(
            SymbolTable::ROOT,
            Function {
                node,
                scope: SymbolTable::ROOT,
                ident: ident.clone(),
                return_type,
                param_types,
                imported: false,
                exported,
            },
        );
        if displaced.is_some() {
            self.error(format!("redefinition of function `{ident}`"), "E0304", pos);
        }
        self.ast.set_scope(node, SymbolTable::ROOT);
    }

    fn declare_global(&mut self, node: NodeId) {
        let ident = self.ast.node(node).token.text.clone();
        let pos = self.ast.node(node).token.pos();
        let constant = self.has_modifier(node, TokenCategory::Const);
        let exported = self.has_modifier(node, TokenCategory::Export);
        let ty = self
            .ast
            .child_of(node, NodeCategory::TypeName)
            .map(|t| self.ast.node(t).token.text.clone())
            .unwrap_or_default();
        let init = self.initializer_of(node);

        let mut mapped = false;
        let mut offset = 0u32;
        let mut size = 0u32;

        if is_primitive(&ty) {
            match init {
                Some(init) => {
                    if self.is_constant_literal(init) {
                        self.check_expr(init, Some(&ty));
                    } else {
                        self.error(
                            format!("initializer of global `{ident}` must be a literal"),
                            "E0307",
                            pos,
                        );
                    }
                }
                None => {
                    self.error(format!("global `{ident}` needs an initializer"), "E0307", pos);
                }
            }
            size = primitive_size(&ty);
        } else if self.table.lookup_struct(SymbolTable::ROOT, &ty).is_some() {
            if init.is_some() {
                self.error(
                    format!("global `{ident}` of struct type takes no initializer"),
                    "E0307",
                    pos,
                );
            }
            mapped = true;
            size = self.size_of(&ty).unwrap_or(0);
            offset = self.data_offset;
            self.data_offset += size;
        } else {
            self.error(format!("unknown type `{ty}`"), "E0305", pos);
        }

        let displaced = self.table.declare_variable(
            SymbolTable::ROOT,
            Variable {
                node,
                scope: SymbolTable::ROOT,
                ident: ident.clone(),
                data_type: ty.clone(),
                global: true,
                constant,
                exported,
                imported: false,
                mapped,
                offset,
                size,
            },
        );
        if displaced.is_some() {
            self.error(format!("redefinition of `{ident}`"), "E0304", pos);
        }
        self.ast.set_scope(node, SymbolTable::ROOT);
        self.ast.set_data_type(node, ty);
    }

    // -----------------------------------------------------------------
    // Check pass
    // -----------------------------------------------------------------

    fn check_function(&mut self, node: NodeId, scope: ScopeId) {
        self.return_type = self.return_type_of(node);

        if let Some(parameters) = self.ast.child_of(node, NodeCategory::Parameters) {
            let params: Vec<NodeId> = self.ast.children(parameters).to_vec();
            for param in params {
                let ident = self.ast.node(param).token.text.clone();
                let ty = self
                    .ast
                    .child_of(param, NodeCategory::TypeName)
                    .map(|t| self.ast.node(t).token.text.clone())
                    .unwrap_or_default();
                self.table.declare_variable(
                    scope,
                    Variable {
                        node: param,
                        scope,
                        ident,
                        data_type: ty.clone(),
                        global: false,
                        constant: false,
                        exported: false,
                        imported: false,
                        mapped: false,
                        offset: 0,
                        size: 0,
                    },
                );
                self.ast.set_scope(param, scope);
                self.ast.set_data_type(param, ty);
            }
        }

        if let Some(block) = self.ast.child_of(node, NodeCategory::Block) {
            self.check_block(block, scope);
        }
    }

    fn check_block(&mut self, block: NodeId, scope: ScopeId) {
        self.ast.set_scope(block, scope);
        let statements: Vec<NodeId> = self.ast.children(block).to_vec();
        for statement in statements {
            self.check_statement(statement, scope);
        }
    }

    fn check_statement(&mut self, node: NodeId, scope: ScopeId) {
        match self.ast.node(node).category {
            NodeCategory::Variable => self.check_local(node, scope),
            NodeCategory::Assign => self.check_assign(node, scope),
            NodeCategory::Return => self.check_return(node, scope),
            NodeCategory::If => self.check_if(node, scope),
            NodeCategory::While => {
                let children: Vec<NodeId> = self.ast.children(node).to_vec();
                self.check_condition(children[0], scope);
                self.enter_block(children[1], scope);
            }
            NodeCategory::ExprStmt => {
                let expr = self.ast.children(node)[0];
                self.check_expr(expr, None);
            }
            _ => {}
        }
    }

    fn check_local(&mut self, node: NodeId, scope: ScopeId) {
        let ident = self.ast.node(node).token.text.clone();
        let pos = self.ast.node(node).token.pos();
        let constant = self.has_modifier(node, TokenCategory::Const);
        let ty = self
            .ast
            .child_of(node, NodeCategory::TypeName)
            .map(|t| self.ast.node(t).token.text.clone())
            .unwrap_or_default();

        if !is_primitive(&ty) {
            if self.table.lookup_struct(scope, &ty).is_some() {
                self.error(
                    "variables of struct type must be declared at the top level",
                    "E0306",
                    pos,
                );
            } else {
                self.error(format!("unknown type `{ty}`"), "E0305", pos);
            }
        }

        if let Some(init) = self.initializer_of(node) {
            self.check_expr(init, Some(&ty));
        }

        let displaced = self.table.declare_variable(
            scope,
            Variable {
                node,
                scope,
                ident: ident.clone(),
                data_type: ty.clone(),
                global: false,
                constant,
                exported: false,
                imported: false,
                mapped: false,
                offset: 0,
                size: 0,
            },
        );
        if displaced.is_some() {
            self.error(format!("redefinition of `{ident}`"), "E0304", pos);
        }
        self.ast.set_scope(node, scope);
        self.ast.set_data_type(node, ty);
    }

    fn check_assign(&mut self, node: NodeId, scope: ScopeId) {
        let children: Vec<NodeId> = self.ast.children(node).to_vec();
        let (target, value) = (children[0], children[1]);
        let pos = self.ast.node(node).token.pos();

        let target_ty = self.check_expr(target, None);

        if self.ast.node(target).category == NodeCategory::Ident {
            let ident = self.ast.node(target).token.text.clone();
            if let Some(variable) = self.table.lookup_variable(scope, &ident) {
                if variable.constant {
                    let message = format!("cannot assign to constant `{ident}`");
                    self.error(message, "E0309", pos);
                }
            }
        }
        if !target_ty.is_empty() && !is_primitive(&target_ty) {
            self.error(
                format!("cannot assign a whole `{target_ty}` value"),
                "E0306",
                pos,
            );
        }

        if target_ty.is_empty() || !is_primitive(&target_ty) {
            self.check_expr(value, None);
        } else {
            self.check_expr(value, Some(&target_ty));
        }
    }

    fn check_return(&mut self, node: NodeId, _scope: ScopeId) {
        let pos = self.ast.node(node).token.pos();
        let expected = self.return_type.clone();
        let value = self.ast.children(node).first().copied();
        match (value, expected.as_str()) {
            (None, "void") => {}
            (None, ty) => {
                self.error(format!("return needs a value of type `{ty}`"), "E0303", pos);
            }
            (Some(value), "void") => {
                self.error(
                    "return value in a function without a return type",
                    "E0303",
                    pos,
                );
                self.check_expr(value, None);
            }
            (Some(value), _) => {
                self.check_expr(value, Some(&expected));
            }
        }
    }

    fn check_if(&mut self, node: NodeId, scope: ScopeId) {
        let children: Vec<NodeId> = self.ast.children(node).to_vec();
        self.check_condition(children[0], scope);
        self.enter_block(children[1], scope);
        if let Some(&tail) = children.get(2) {
            match self.ast.node(tail).category {
                NodeCategory::If => self.check_if(tail, scope),
                _ => self.enter_block(tail, scope),
            }
        }
    }

    fn check_condition(&mut self, condition: NodeId, _scope: ScopeId) {
        self.check_expr(condition, Some("bool"));
    }

    /// New anonymous scope for a nested block body.
    fn enter_block(&mut self, block: NodeId, parent: ScopeId) {
        let scope = self.table.add_scope(parent, None, Some(block));
        self.check_block(block, scope);
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    /// Type-checks `node`, annotates its resolved type and returns it.
    ///
    /// The empty string marks a subtree that already failed to
    /// resolve; no further mismatch is reported against it.
    fn check_expr(&mut self, node: NodeId, expected: Option<&str>) -> String {
        let current_scope = self.current_scope(node);
        let category = self.ast.node(node).category;
        let pos = self.ast.node(node).token.pos();

        let raw = match category {
            NodeCategory::Int => self.check_int_literal(node, expected),
            NodeCategory::Hex => self.check_hex_literal(node, expected),
            NodeCategory::Float => match expected {
                Some("f32") => String::from("f32"),
                _ => String::from("f64"),
            },
            NodeCategory::Bool => String::from("bool"),
            NodeCategory::Ident => {
                let ident = self.ast.node(node).token.text.clone();
                match self.table.lookup_variable(current_scope, &ident) {
                    Some(variable) => {
                        let ty = variable.data_type.clone();
                        self.ast.set_scope(node, current_scope);
                        ty
                    }
                    None => {
                        self.error(format!("undeclared variable `{ident}`"), "E0301", pos);
                        String::new()
                    }
                }
            }
            NodeCategory::Member => self.check_member(node, current_scope),
            NodeCategory::Unary => self.check_unary(node, expected),
            NodeCategory::Binary => self.check_binary(node, expected),
            NodeCategory::Call => self.check_call(node, current_scope),
            _ => String::new(),
        };

        if let Some(expected) = expected {
            if !raw.is_empty() && raw != expected {
                self.error(
                    format!("type mismatch: expected `{expected}`, found `{raw}`"),
                    "E0303",
                    pos,
                );
            }
        }
        self.ast.set_data_type(node, raw.clone());
        raw
    }

    fn check_int_literal(&mut self, node: NodeId, expected: Option<&str>) -> String {
        let ty = match expected {
            Some("i64") => "i64",
            _ => "i32",
        };
        let text = self.ast.node(node).token.text.clone();
        let value = text.parse::<i64>().unwrap_or(0);
        if ty == "i32" && i32::try_from(value).is_err() {
            let pos = self.ast.node(node).token.pos();
            self.error(
                format!("integer literal `{text}` is out of range for i32"),
                "E0303",
                pos,
            );
        }
        String::from(ty)
    }

    fn check_hex_literal(&mut self, node: NodeId, expected: Option<&str>) -> String {
        let ty = match expected {
            Some("i64") => "i64",
            _ => "i32",
        };
        let text = self.ast.node(node).token.text.clone();
        let digits = text.get(2..).unwrap_or("");
        let value = u64::from_str_radix(digits, 16).unwrap_or(0);
        if ty == "i32" && u32::try_from(value).is_err() {
            let pos = self.ast.node(node).token.pos();
            self.error(
                format!("hex literal `{text}` is out of range for i32"),
                "E0303",
                pos,
            );
        }
        String::from(ty)
    }

    fn check_member(&mut self, node: NodeId, scope: ScopeId) -> String {
        let field = self.ast.node(node).token.text.clone();
        let pos = self.ast.node(node).token.pos();
        let base = self.ast.children(node)[0];
        let base_ty = self.check_expr(base, None);

        if base_ty.is_empty() {
            return base_ty;
        }
        if is_primitive(&base_ty) || base_ty == "void" {
            self.error(format!("type `{base_ty}` has no fields"), "E0308", pos);
            return String::new();
        }

        // Struct scopes hang off the root, so the chain is reachable
        // from any scope through child-scope delegation.
        let Some(struct_scope) = self.table.child_scope(scope, &base_ty) else {
            self.error(format!("unknown struct `{base_ty}`"), "E0308", pos);
            return String::new();
        };
        match self.table.scope(struct_scope).local_variable(&field) {
            Some(variable) => {
                let ty = variable.data_type.clone();
                self.ast.set_scope(node, scope);
                ty
            }
            None => {
                self.error(
                    format!("struct `{base_ty}` has no field `{field}`"),
                    "E0308",
                    pos,
                );
                String::new()
            }
        }
    }

    fn check_unary(&mut self, node: NodeId, expected: Option<&str>) -> String {
        let operand = self.ast.children(node)[0];
        let op = self.ast.node(node).token.category;
        let pos = self.ast.node(node).token.pos();
        match op {
            TokenCategory::Bang => {
                self.check_expr(operand, Some("bool"));
                String::from("bool")
            }
            _ => {
                let pass_down = expected.filter(|e| is_numeric(e));
                let ty = self.check_expr(operand, pass_down);
                if ty.is_empty() {
                    return ty;
                }
                if !is_numeric(&ty) {
                    self.error(
                        format!("operator `-` needs a numeric operand, found `{ty}`"),
                        "E0306",
                        pos,
                    );
                    return String::new();
                }
                ty
            }
        }
    }

    fn check_binary(&mut self, node: NodeId, expected: Option<&str>) -> String {
        let children: Vec<NodeId> = self.ast.children(node).to_vec();
        let (lhs, rhs) = (children[0], children[1]);
        let op = self.ast.node(node).token.category;
        let op_text = self.ast.node(node).token.text.clone();
        let pos = self.ast.node(node).token.pos();

        let comparison = matches!(
            op,
            TokenCategory::EqEq
                | TokenCategory::BangEq
                | TokenCategory::Lt
                | TokenCategory::Gt
                | TokenCategory::Le
                | TokenCategory::Ge
        );

        let pass_down = if comparison {
            None
        } else {
            expected.filter(|e| is_numeric(e))
        };
        let left = self.check_expr(lhs, pass_down);
        let right = if left.is_empty() {
            self.check_expr(rhs, None)
        } else {
            self.check_expr(rhs, Some(&left))
        };
        if left.is_empty() || right.is_empty() {
            return String::new();
        }

        if comparison {
            let ordering = !matches!(op, TokenCategory::EqEq | TokenCategory::BangEq);
            let comparable = if ordering {
                is_numeric(&left)
            } else {
                is_numeric(&left) || left == "bool"
            };
            if !comparable {
                self.error(
                    format!("operator `{op_text}` cannot compare `{left}` values"),
                    "E0306",
                    pos,
                );
                return String::new();
            }
            return String::from("bool");
        }

        if op == TokenCategory::Percent && !is_integer(&left) {
            self.error(
                format!("operator `%` needs integer operands, found `{left}`"),
                "E0306",
                pos,
            );
            return String::new();
        }
        if !is_numeric(&left) {
            self.error(
                format!("operator `{op_text}` needs numeric operands, found `{left}`"),
                "E0306",
                pos,
            );
            return String::new();
        }
        left
    }

    fn check_call(&mut self, node: NodeId, scope: ScopeId) -> String {
        let ident = self.ast.node(node).token.text.clone();
        let pos = self.ast.node(node).token.pos();
        let arguments: Vec<NodeId> = self.ast.children(node).to_vec();

        let Some(function) = self.table.lookup_function(scope, &ident) else {
            self.error(format!("undeclared function `{ident}`"), "E0302", pos);
            for argument in arguments {
                self.check_expr(argument, None);
            }
            return String::new();
        };
        let param_types = function.param_types.clone();
        let return_type = function.return_type.clone();

        if arguments.len() != param_types.len() {
            self.error(
                format!(
                    "function `{ident}` expects {} argument(s) but got {}",
                    param_types.len(),
                    arguments.len()
                ),
                "E0310",
                pos,
            );
        }
        for (index, argument) in arguments.iter().enumerate() {
            match param_types.get(index) {
                Some(param_type) => {
                    let expected = param_type.clone();
                    self.check_expr(*argument, Some(&expected));
                }
                None => {
                    self.check_expr(*argument, None);
                }
            }
        }

        self.ast.set_scope(node, scope);
        return_type
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    /// Scope in which `node` occurs: the scope annotated on the nearest
    /// annotated ancestor (blocks are always annotated before their
    /// statements are checked).
    fn current_scope(&self, node: NodeId) -> ScopeId {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(scope) = self.ast.scope(id) {
                return scope;
            }
            current = self.ast.parent(id);
        }
        SymbolTable::ROOT
    }

    fn return_type_of(&self, node: NodeId) -> String {
        self.ast
            .child_of(node, NodeCategory::TypeName)
            .map(|t| self.ast.node(t).token.text.clone())
            .unwrap_or_else(|| String::from("void"))
    }

    fn has_modifier(&self, node: NodeId, category: TokenCategory) -> bool {
        self.ast.children(node).iter().any(|&child| {
            self.ast.node(child).category == NodeCategory::Modifier
                && self.ast.node(child).token.category == category
        })
    }

    /// Last child when it is an initializer expression rather than a
    /// modifier or type name.
    fn initializer_of(&self, node: NodeId) -> Option<NodeId> {
        let last = self.ast.children(node).last().copied()?;
        match self.ast.node(last).category {
            NodeCategory::Modifier | NodeCategory::TypeName => None,
            _ => Some(last),
        }
    }

    fn is_constant_literal(&self, node: NodeId) -> bool {
        match self.ast.node(node).category {
            NodeCategory::Int | NodeCategory::Float | NodeCategory::Hex | NodeCategory::Bool => {
                true
            }
            NodeCategory::Unary => {
                self.ast.node(node).token.category == TokenCategory::Minus
                    && self
                        .ast
                        .children(node)
                        .first()
                        .is_some_and(|&operand| self.is_constant_literal(operand))
            }
            _ => false,
        }
    }

    fn size_of(&self, ty: &str) -> Option<u32> {
        if is_primitive(ty) {
            return Some(primitive_size(ty));
        }
        self.table
            .lookup_struct(SymbolTable::ROOT, ty)
            .map(|s| s.size)
    }

    fn error(&mut self, message: impl Into<String>, code: &'static str, pos: Pos) {
        self.log
            .push(Diagnostic::error(message, pos).with_code(code));
    }
}

//! Code generation: analyzed AST to module bytes.
//!
//! Drives the builders in [`crate::wasm`]. The function index space is
//! imports first, then local functions, in declaration order; every
//! declaration node receives its assigned index (or memory offset)
//! through the AST's generator annotation slot. Instruction selection
//! reads the types the analyzer resolved onto expression nodes.

use crate::ast::{Ast, NodeCategory, NodeId};
use crate::diagnostic::{Diagnostic, DiagnosticLog};
use crate::scope::{SymbolTable, Variable};
use crate::token::TokenCategory;
use crate::wasm::{
    BlockType, CodeSection, ExportKind, ExportSection, Function, FunctionSection, GlobalSection,
    ImportSection, Instruction, MemorySection, Module, TypeSection, ValType,
};

/// Logical module every import is resolved against.
const IMPORT_MODULE: &str = "env";

/// Number of 64 KiB pages backing mapped globals.
const MEMORY_PAGES: u64 = 1;

pub fn generate(ast: &mut Ast, table: &SymbolTable, log: &mut DiagnosticLog) -> Vec<u8> {
    let mut generator = Generator { ast, table, log };
    generator.run()
}

struct Generator<'a, 'log> {
    ast: &'a mut Ast,
    table: &'a SymbolTable,
    log: &'log mut DiagnosticLog,
}

impl Generator<'_, '_> {
    fn run(&mut self) -> Vec<u8> {
        let Some(root) = self.ast.root() else {
            return Vec::new();
        };

        let mut imports = Vec::new();
        let mut functions = Vec::new();
        let mut globals = Vec::new();
        for &node in self.ast.children(root) {
            match self.ast.node(node).category {
                NodeCategory::Import => imports.push(node),
                NodeCategory::Function => functions.push(node),
                NodeCategory::Variable => globals.push(node),
                _ => {}
            }
        }

        // Index assignment first, so bodies can call in any order.
        for (index, &node) in imports.iter().enumerate() {
            self.ast.set_generated(node, index as u32);
        }
        for (index, &node) in functions.iter().enumerate() {
            self.ast.set_generated(node, (imports.len() + index) as u32);
        }
        let mut scalar_globals = Vec::new();
        let mut has_mapped = false;
        for &node in &globals {
            let Some(variable) = self.global_symbol(node) else {
                continue;
            };
            if variable.mapped {
                has_mapped = true;
                let offset = variable.offset;
                self.ast.set_generated(node, offset);
            } else {
                self.ast.set_generated(node, scalar_globals.len() as u32);
                scalar_globals.push(node);
            }
        }

        let mut types = TypeSection::new();
        let mut import_section = ImportSection::new();
        for &node in &imports {
            let ident = self.ast.node(node).token.text.clone();
            let Some(function) = self.table.lookup_function(SymbolTable::ROOT, &ident) else {
                self.internal_error(node, "import lost its symbol");
                continue;
            };
            let type_index = types.len();
            types.function(
                function.param_types.iter().map(|t| val_type(t)),
                result_types(&function.return_type),
            );
            import_section.function(IMPORT_MODULE, &ident, type_index);
        }

        let mut function_section = FunctionSection::new();
        for &node in &functions {
            let ident = self.ast.node(node).token.text.clone();
            let Some(function) = self.table.lookup_function(SymbolTable::ROOT, &ident) else {
                self.internal_error(node, "function lost its symbol");
                continue;
            };
            let type_index = types.len();
            types.function(
                function.param_types.iter().map(|t| val_type(t)),
                result_types(&function.return_type),
            );
            function_section.function(type_index);
        }

        let mut global_section = GlobalSection::new();
        for &node in &scalar_globals {
            let Some(variable) = self.global_symbol(node) else {
                continue;
            };
            let ty = variable.data_type.clone();
            let mutable = !variable.constant;
            let init = self
                .initializer_of(node)
                .map(|init| self.const_instruction(init, &ty))
                .unwrap_or(Instruction::I32Const(0));
            global_section.global(val_type(&ty), mutable, &init);
        }

        let mut exports = ExportSection::new();
        for &node in &functions {
            let ident = self.ast.node(node).token.text.clone();
            if let Some(function) = self.table.lookup_function(SymbolTable::ROOT, &ident) {
                if function.exported {
                    let index = self.ast.generated(node).unwrap_or(0);
                    exports.export(&ident, ExportKind::Func, index);
                }
            }
        }
        for &node in &scalar_globals {
            let Some(variable) = self.global_symbol(node) else {
                continue;
            };
            if variable.exported {
                let index = self.ast.generated(node).unwrap_or(0);
                let ident = variable.ident.clone();
                exports.export(&ident, ExportKind::Global, index);
            }
        }
        if has_mapped {
            exports.export("memory", ExportKind::Memory, 0);
        }

        let mut code = CodeSection::new();
        for &node in &functions {
            let function = self.emit_function(node);
            code.function(&function);
        }

        let mut module = Module::new();
        module.section(&types);
        if !import_section.is_empty() {
            module.section(&import_section);
        }
        if !function_section.is_empty() {
            module.section(&function_section);
        }
        if has_mapped {
            let mut memory = MemorySection::new();
            memory.memory(MEMORY_PAGES);
            module.section(&memory);
        }
        if !global_section.is_empty() {
            module.section(&global_section);
        }
        if !exports.is_empty() {
            module.section(&exports);
        }
        if !code.is_empty() {
            module.section(&code);
        }
        module.finish()
    }

    // -----------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------

    fn emit_function(&mut self, node: NodeId) -> Function {
        let mut param_count = 0u32;
        if let Some(parameters) = self.ast.child_of(node, NodeCategory::Parameters) {
            let params: Vec<NodeId> = self.ast.children(parameters).to_vec();
            for param in params {
                self.ast.set_generated(param, param_count);
                param_count += 1;
            }
        }

        let mut locals = Vec::new();
        if let Some(block) = self.ast.child_of(node, NodeCategory::Block) {
            let mut declarations = Vec::new();
            self.collect_locals(block, &mut declarations);
            for (index, declaration) in declarations.iter().enumerate() {
                self.ast
                    .set_generated(*declaration, param_count + index as u32);
                let ty = self.ast.data_type(*declaration).unwrap_or("i32");
                locals.push(val_type(ty));
            }
        }

        let mut function = Function::new(locals);
        if let Some(block) = self.ast.child_of(node, NodeCategory::Block) {
            self.emit_block(&mut function, block);

            // A value-returning body may end in an if/else whose arms
            // all return; the fall-through path is dead but still has
            // to satisfy the result type.
            let returns_value = self.ast.child_of(node, NodeCategory::TypeName).is_some();
            let last_is_return = self
                .ast
                .children(block)
                .last()
                .is_some_and(|&last| self.ast.node(last).category == NodeCategory::Return);
            if returns_value && !last_is_return {
                function.instruction(&Instruction::Unreachable);
            }
        }
        function.instruction(&Instruction::End);
        function
    }

    /// Local declarations in source order, including nested blocks.
    fn collect_locals(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.ast.children(node) {
            match self.ast.node(child).category {
                NodeCategory::Variable => out.push(child),
                NodeCategory::Block | NodeCategory::If | NodeCategory::While => {
                    self.collect_locals(child, out)
                }
                _ => {}
            }
        }
    }

    fn emit_block(&mut self, function: &mut Function, block: NodeId) {
        let statements: Vec<NodeId> = self.ast.children(block).to_vec();
        for statement in statements {
            self.emit_statement(function, statement);
        }
    }

    fn emit_statement(&mut self, function: &mut Function, node: NodeId) {
        match self.ast.node(node).category {
            NodeCategory::Variable => {
                if let Some(init) = self.initializer_of(node) {
                    self.emit_expr(function, init);
                    let index = self.ast.generated(node).unwrap_or(0);
                    function.instruction(&Instruction::LocalSet(index));
                }
            }
            NodeCategory::Assign => {
                let children: Vec<NodeId> = self.ast.children(node).to_vec();
                self.emit_assignment(function, children[0], children[1]);
            }
            NodeCategory::Return => {
                if let Some(&value) = self.ast.children(node).first() {
                    self.emit_expr(function, value);
                }
                function.instruction(&Instruction::Return);
            }
            NodeCategory::If => self.emit_if(function, node),
            NodeCategory::While => {
                let children: Vec<NodeId> = self.ast.children(node).to_vec();
                function.instruction(&Instruction::Block(BlockType::Empty));
                function.instruction(&Instruction::Loop(BlockType::Empty));
                self.emit_expr(function, children[0]);
                function.instruction(&Instruction::I32Eqz);
                function.instruction(&Instruction::BrIf(1));
                self.emit_block(function, children[1]);
                function.instruction(&Instruction::Br(0));
                function.instruction(&Instruction::End);
                function.instruction(&Instruction::End);
            }
            NodeCategory::ExprStmt => {
                let expr = self.ast.children(node)[0];
                self.emit_expr(function, expr);
                if self.ast.data_type(expr).is_some_and(|t| t != "void") {
                    function.instruction(&Instruction::Drop);
                }
            }
            _ => {}
        }
    }

    fn emit_if(&mut self, function: &mut Function, node: NodeId) {
        let children: Vec<NodeId> = self.ast.children(node).to_vec();
        self.emit_expr(function, children[0]);
        function.instruction(&Instruction::If(BlockType::Empty));
        self.emit_block(function, children[1]);
        if let Some(&tail) = children.get(2) {
            function.instruction(&Instruction::Else);
            match self.ast.node(tail).category {
                NodeCategory::If => self.emit_if(function, tail),
                _ => self.emit_block(function, tail),
            }
        }
        function.instruction(&Instruction::End);
    }

    fn emit_assignment(&mut self, function: &mut Function, target: NodeId, value: NodeId) {
        match self.ast.node(target).category {
            NodeCategory::Ident => {
                let Some(variable) = self.variable_for(target) else {
                    self.internal_error(target, "assignment target did not resolve");
                    return;
                };
                let index = self.ast.generated(variable.node).unwrap_or(0);
                let global = variable.global;
                self.emit_expr(function, value);
                if global {
                    function.instruction(&Instruction::GlobalSet(index));
                } else {
                    function.instruction(&Instruction::LocalSet(index));
                }
            }
            NodeCategory::Member => {
                let Some((offset, ty)) = self.member_location(target) else {
                    self.internal_error(target, "field target did not resolve");
                    return;
                };
                function.instruction(&Instruction::I32Const(0));
                self.emit_expr(function, value);
                function.instruction(&store_instruction(&ty, offset));
            }
            _ => self.internal_error(target, "unsupported assignment target"),
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn emit_expr(&mut self, function: &mut Function, node: NodeId) {
        match self.ast.node(node).category {
            NodeCategory::Int | NodeCategory::Hex => {
                let ty = self.ast.data_type(node).unwrap_or("i32").to_string();
                let value = self.integer_value(node);
                if ty == "i64" {
                    function.instruction(&Instruction::I64Const(value));
                } else {
                    function.instruction(&Instruction::I32Const(value as i32));
                }
            }
            NodeCategory::Float => {
                let ty = self.ast.data_type(node).unwrap_or("f64").to_string();
                let text = self.ast.node(node).token.text.clone();
                if ty == "f32" {
                    function.instruction(&Instruction::F32Const(text.parse().unwrap_or(0.0)));
                } else {
                    function.instruction(&Instruction::F64Const(text.parse().unwrap_or(0.0)));
                }
            }
            NodeCategory::Bool => {
                let truthy = self.ast.node(node).token.category == TokenCategory::True;
                function.instruction(&Instruction::I32Const(i32::from(truthy)));
            }
            NodeCategory::Ident => {
                let Some(variable) = self.variable_for(node) else {
                    self.internal_error(node, "identifier did not resolve");
                    return;
                };
                let index = self.ast.generated(variable.node).unwrap_or(0);
                if variable.global {
                    function.instruction(&Instruction::GlobalGet(index));
                } else {
                    function.instruction(&Instruction::LocalGet(index));
                }
            }
            NodeCategory::Member => {
                let Some((offset, ty)) = self.member_location(node) else {
                    self.internal_error(node, "field access did not resolve");
                    return;
                };
                function.instruction(&Instruction::I32Const(0));
                function.instruction(&load_instruction(&ty, offset));
            }
            NodeCategory::Unary => self.emit_unary(function, node),
            NodeCategory::Binary => self.emit_binary(function, node),
            NodeCategory::Call => self.emit_call(function, node),
            _ => self.internal_error(node, "unsupported expression"),
        }
    }

    fn emit_unary(&mut self, function: &mut Function, node: NodeId) {
        let operand = self.ast.children(node)[0];
        let op = self.ast.node(node).token.category;
        if op == TokenCategory::Bang {
            self.emit_expr(function, operand);
            function.instruction(&Instruction::I32Eqz);
            return;
        }
        let ty = self.ast.data_type(node).unwrap_or("i32").to_string();
        match ty.as_str() {
            "i64" => {
                function.instruction(&Instruction::I64Const(0));
                self.emit_expr(function, operand);
                function.instruction(&Instruction::I64Sub);
            }
            "f32" => {
                self.emit_expr(function, operand);
                function.instruction(&Instruction::F32Neg);
            }
            "f64" => {
                self.emit_expr(function, operand);
                function.instruction(&Instruction::F64Neg);
            }
            _ => {
                function.instruction(&Instruction::I32Const(0));
                self.emit_expr(function, operand);
                function.instruction(&Instruction::I32Sub);
            }
        }
    }

    fn emit_binary(&mut self, function: &mut Function, node: NodeId) {
        let children: Vec<NodeId> = self.ast.children(node).to_vec();
        let operand_type = self.ast.data_type(children[0]).unwrap_or("i32").to_string();
        let op = self.ast.node(node).token.category;
        self.emit_expr(function, children[0]);
        self.emit_expr(function, children[1]);
        match binary_instruction(op, &operand_type) {
            Some(instruction) => {
                function.instruction(&instruction);
            }
            None => self.internal_error(node, "no instruction for operator"),
        }
    }

    fn emit_call(&mut self, function: &mut Function, node: NodeId) {
        let arguments: Vec<NodeId> = self.ast.children(node).to_vec();
        for argument in arguments {
            self.emit_expr(function, argument);
        }
        let ident = self.ast.node(node).token.text.clone();
        let scope = self.ast.scope(node).unwrap_or(SymbolTable::ROOT);
        let Some(callee) = self.table.lookup_function(scope, &ident) else {
            self.internal_error(node, "call did not resolve");
            return;
        };
        let index = self.ast.generated(callee.node).unwrap_or(0);
        function.instruction(&Instruction::Call(index));
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn variable_for(&self, node: NodeId) -> Option<&Variable> {
        let scope = self.ast.scope(node)?;
        let ident = &self.ast.node(node).token.text;
        self.table.lookup_variable(scope, ident)
    }

    /// Absolute linear-memory offset and value type of a field chain.
    fn member_location(&self, node: NodeId) -> Option<(u32, String)> {
        let field = &self.ast.node(node).token.text;
        let base = self.ast.children(node).first().copied()?;
        let (base_offset, base_type) = match self.ast.node(base).category {
            NodeCategory::Ident => {
                let variable = self.variable_for(base)?;
                if !variable.mapped {
                    return None;
                }
                (variable.offset, variable.data_type.clone())
            }
            NodeCategory::Member => self.member_location(base)?,
            _ => return None,
        };
        let strukt = self.table.lookup_struct(SymbolTable::ROOT, &base_type)?;
        let info = strukt.fields.iter().find(|f| &f.ident == field)?;
        Some((base_offset + info.offset, info.data_type.clone()))
    }

    fn global_symbol(&self, node: NodeId) -> Option<Variable> {
        let ident = &self.ast.node(node).token.text;
        self.table
            .lookup_variable(SymbolTable::ROOT, ident)
            .cloned()
    }

    fn initializer_of(&self, node: NodeId) -> Option<NodeId> {
        let last = self.ast.children(node).last().copied()?;
        match self.ast.node(last).category {
            NodeCategory::Modifier | NodeCategory::TypeName => None,
            _ => Some(last),
        }
    }

    /// Signed value of an integer or hex literal, honoring a leading
    /// unary minus.
    fn integer_value(&self, node: NodeId) -> i64 {
        match self.ast.node(node).category {
            NodeCategory::Hex => {
                let text = &self.ast.node(node).token.text;
                let digits = text.get(2..).unwrap_or("");
                i64::from_str_radix(digits, 16).unwrap_or(0)
            }
            NodeCategory::Unary => {
                let operand = self.ast.children(node)[0];
                -self.integer_value(operand)
            }
            _ => self.ast.node(node).token.text.parse().unwrap_or(0),
        }
    }

    fn float_value(&self, node: NodeId) -> f64 {
        match self.ast.node(node).category {
            NodeCategory::Unary => {
                let operand = self.ast.children(node)[0];
                -self.float_value(operand)
            }
            _ => self.ast.node(node).token.text.parse().unwrap_or(0.0),
        }
    }

    /// Constant initializer for the global section.
    fn const_instruction(&self, node: NodeId, ty: &str) -> Instruction {
        match ty {
            "i64" => Instruction::I64Const(self.integer_value(node)),
            "f32" => Instruction::F32Const(self.float_value(node) as f32),
            "f64" => Instruction::F64Const(self.float_value(node)),
            "bool" => Instruction::I32Const(i32::from(
                self.ast.node(node).token.category == TokenCategory::True,
            )),
            _ => Instruction::I32Const(self.integer_value(node) as i32),
        }
    }

    fn internal_error(&mut self, node: NodeId, message: &str) {
        let pos = self.ast.node(node).token.pos();
        self.log.push(
            Diagnostic::error(format!("code generation failed: {message}"), pos)
                .with_code("E0401"),
        );
    }
}

fn val_type(name: &str) -> ValType {
    match name {
        "i64" => ValType::I64,
        "f32" => ValType::F32,
        "f64" => ValType::F64,
        _ => ValType::I32,
    }
}

fn result_types(name: &str) -> Vec<ValType> {
    if name == "void" {
        Vec::new()
    } else {
        vec![val_type(name)]
    }
}

fn load_instruction(ty: &str, offset: u32) -> Instruction {
    match ty {
        "i64" => Instruction::I64Load { offset },
        "f32" => Instruction::F32Load { offset },
        "f64" => Instruction::F64Load { offset },
        _ => Instruction::I32Load { offset },
    }
}

fn store_instruction(ty: &str, offset: u32) -> Instruction {
    match ty {
        "i64" => Instruction::I64Store { offset },
        "f32" => Instruction::F32Store { offset },
        "f64" => Instruction::F64Store { offset },
        _ => Instruction::I32Store { offset },
    }
}

fn binary_instruction(op: TokenCategory, operand_type: &str) -> Option<Instruction> {
    use Instruction::*;
    use TokenCategory::*;
    let instruction = match operand_type {
        "i64" => match op {
            Plus => I64Add,
            Minus => I64Sub,
            Star => I64Mul,
            Slash => I64DivS,
            Percent => I64RemS,
            EqEq => I64Eq,
            BangEq => I64Ne,
            Lt => I64LtS,
            Gt => I64GtS,
            Le => I64LeS,
            Ge => I64GeS,
            _ => return None,
        },
        "f32" => match op {
            Plus => F32Add,
            Minus => F32Sub,
            Star => F32Mul,
            Slash => F32Div,
            EqEq => F32Eq,
            BangEq => F32Ne,
            Lt => F32Lt,
            Gt => F32Gt,
            Le => F32Le,
            Ge => F32Ge,
            _ => return None,
        },
        "f64" => match op {
            Plus => F64Add,
            Minus => F64Sub,
            Star => F64Mul,
            Slash => F64Div,
            EqEq => F64Eq,
            BangEq => F64Ne,
            Lt => F64Lt,
            Gt => F64Gt,
            Le => F64Le,
            Ge => F64Ge,
            _ => return None,
        },
        // i32 and bool share the integer instruction family.
        _ => match op {
            Plus => I32Add,
            Minus => I32Sub,
            Star => I32Mul,
            Slash => I32DivS,
            Percent => I32RemS,
            EqEq => I32Eq,
            BangEq => I32Ne,
            Lt => I32LtS,
            Gt => I32GtS,
            Le => I32LeS,
            Ge => I32GeS,
            _ => return None,
        },
    };
    Some(instruction)
}

//! Recursive-descent parser for schwa.
//!
//! Consumes the token slice with a position cursor and builds the
//! arena AST. On a syntax error the parser reports a diagnostic and
//! synchronizes to the next line so one pass can surface several
//! problems; the orchestrator never lets a partial tree reach later
//! stages.

use crate::ast::{Ast, NodeCategory, NodeId};
use crate::diagnostic::{Diagnostic, DiagnosticLog};
use crate::token::{Token, TokenCategory};

/// Parse tokens into an AST rooted at a `Program` node.
pub fn parse(tokens: &[Token], log: &mut DiagnosticLog) -> Ast {
    let mut parser = Parser {
        tokens,
        pos: 0,
        ast: Ast::new(),
        log,
    };
    parser.run();
    parser.ast
}

struct Parser<'t, 'log> {
    tokens: &'t [Token],
    pos: usize,
    ast: Ast,
    log: &'log mut DiagnosticLog,
}

impl Parser<'_, '_> {
    fn run(&mut self) {
        let bof = match self.tokens.first() {
            Some(token) if token.category == TokenCategory::Bof => {
                self.pos = 1;
                token.clone()
            }
            _ => Token::marker(TokenCategory::Bof, 1, 1),
        };

        let mut declarations = Vec::new();
        while !self.at(TokenCategory::Eof) && self.pos < self.tokens.len() {
            // Stray structure markers left behind by error recovery are
            // meaningless between declarations.
            if self.at(TokenCategory::Newline)
                || self.at(TokenCategory::Indent)
                || self.at(TokenCategory::Dedent)
            {
                self.bump();
                continue;
            }
            match self.parse_declaration() {
                Some(node) => declarations.push(node),
                None => self.synchronize(),
            }
        }

        let root = self.ast.add(NodeCategory::Program, bof, declarations);
        self.ast.set_root(root);
    }

    // -----------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------

    fn parse_declaration(&mut self) -> Option<NodeId> {
        match self.peek().category {
            TokenCategory::Import => self.parse_import(),
            TokenCategory::Struct => self.parse_struct(),
            TokenCategory::Export => {
                let export = self.bump();
                match self.peek().category {
                    TokenCategory::Fn => self.parse_function(Some(export)),
                    TokenCategory::Let | TokenCategory::Const => {
                        self.parse_variable(Some(export))
                    }
                    _ => {
                        self.unexpected("`fn`, `let` or `const` after `export`");
                        None
                    }
                }
            }
            TokenCategory::Fn => self.parse_function(None),
            TokenCategory::Let | TokenCategory::Const => self.parse_variable(None),
            _ => {
                self.unexpected("a declaration");
                None
            }
        }
    }

    /// `import fn name(type, ...) [type]`
    fn parse_import(&mut self) -> Option<NodeId> {
        self.bump();
        self.expect(TokenCategory::Fn, "`fn`")?;
        let name = self.expect(TokenCategory::Ident, "an imported function name")?;

        let lparen = self.expect(TokenCategory::LParen, "`(`")?;
        let mut types = Vec::new();
        while !self.at(TokenCategory::RParen) {
            let ty = self.parse_type_name()?;
            types.push(ty);
            if !self.at(TokenCategory::RParen) {
                self.expect(TokenCategory::Comma, "`,`")?;
            }
        }
        self.bump();
        let parameters = self.ast.add(NodeCategory::Parameters, lparen, types);

        let mut children = vec![parameters];
        if self.at(TokenCategory::Ident) {
            children.push(self.parse_type_name()?);
        }
        self.expect_newline();
        Some(self.ast.add(NodeCategory::Import, name, children))
    }

    /// `[export] fn name(param, ...) [type]` followed by a block.
    fn parse_function(&mut self, export: Option<Token>) -> Option<NodeId> {
        self.bump();
        let name = self.expect(TokenCategory::Ident, "a function name")?;

        let lparen = self.expect(TokenCategory::LParen, "`(`")?;
        let mut parameters = Vec::new();
        while !self.at(TokenCategory::RParen) {
            let param_name = self.expect(TokenCategory::Ident, "a parameter name")?;
            let ty = self.parse_type_name()?;
            parameters.push(self.ast.add(NodeCategory::Parameter, param_name, vec![ty]));
            if !self.at(TokenCategory::RParen) {
                self.expect(TokenCategory::Comma, "`,`")?;
            }
        }
        self.bump();
        let parameters = self.ast.add(NodeCategory::Parameters, lparen, parameters);

        let mut children = Vec::new();
        if let Some(export) = export {
            children.push(self.ast.add(NodeCategory::Modifier, export, vec![]));
        }
        children.push(parameters);
        if self.at(TokenCategory::Ident) {
            children.push(self.parse_type_name()?);
        }
        children.push(self.parse_block()?);
        Some(self.ast.add(NodeCategory::Function, name, children))
    }

    /// `struct Name` followed by an indented field list.
    fn parse_struct(&mut self) -> Option<NodeId> {
        self.bump();
        let name = self.expect(TokenCategory::Ident, "a struct name")?;
        self.expect(TokenCategory::Newline, "a newline")?;
        self.expect(TokenCategory::Indent, "an indented field list")?;

        let mut fields = Vec::new();
        while !self.at(TokenCategory::Dedent) && !self.at(TokenCategory::Eof) {
            if self.at(TokenCategory::Newline) {
                self.bump();
                continue;
            }
            let field_name = self.expect(TokenCategory::Ident, "a field name")?;
            let ty = self.parse_type_name()?;
            self.expect_newline();
            fields.push(self.ast.add(NodeCategory::Field, field_name, vec![ty]));
        }
        if self.at(TokenCategory::Dedent) {
            self.bump();
        }
        Some(self.ast.add(NodeCategory::Struct, name, fields))
    }

    /// `[export] (let|const) name type [= expr]`
    fn parse_variable(&mut self, export: Option<Token>) -> Option<NodeId> {
        let keyword = self.bump();
        let name = self.expect(TokenCategory::Ident, "a variable name")?;
        let ty = self.parse_type_name()?;

        let mut children = vec![self.ast.add(NodeCategory::Modifier, keyword, vec![])];
        if let Some(export) = export {
            children.push(self.ast.add(NodeCategory::Modifier, export, vec![]));
        }
        children.push(ty);
        if self.at(TokenCategory::Eq) {
            self.bump();
            children.push(self.parse_expr()?);
        }
        self.expect_newline();
        Some(self.ast.add(NodeCategory::Variable, name, children))
    }

    fn parse_type_name(&mut self) -> Option<NodeId> {
        let token = self.expect(TokenCategory::Ident, "a type name")?;
        Some(self.ast.add(NodeCategory::TypeName, token, vec![]))
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    /// Newline, Indent, statements, Dedent.
    fn parse_block(&mut self) -> Option<NodeId> {
        self.expect(TokenCategory::Newline, "a newline")?;
        let indent = self.expect(TokenCategory::Indent, "an indented block")?;

        let mut statements = Vec::new();
        while !self.at(TokenCategory::Dedent) && !self.at(TokenCategory::Eof) {
            if self.at(TokenCategory::Newline) {
                self.bump();
                continue;
            }
            match self.parse_statement() {
                Some(node) => statements.push(node),
                None => self.synchronize(),
            }
        }
        if self.at(TokenCategory::Dedent) {
            self.bump();
        }
        Some(self.ast.add(NodeCategory::Block, indent, statements))
    }

    fn parse_statement(&mut self) -> Option<NodeId> {
        match self.peek().category {
            TokenCategory::Let | TokenCategory::Const => self.parse_variable(None),
            TokenCategory::Return => {
                let keyword = self.bump();
                let mut children = Vec::new();
                if !self.at(TokenCategory::Newline) {
                    children.push(self.parse_expr()?);
                }
                self.expect_newline();
                Some(self.ast.add(NodeCategory::Return, keyword, children))
            }
            TokenCategory::If => self.parse_if(),
            TokenCategory::While => {
                let keyword = self.bump();
                let condition = self.parse_expr()?;
                let body = self.parse_block()?;
                Some(self.ast.add(NodeCategory::While, keyword, vec![condition, body]))
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.at(TokenCategory::Eq) {
                    let eq = self.bump();
                    let value = self.parse_expr()?;
                    self.expect_newline();
                    return Some(self.ast.add(NodeCategory::Assign, eq, vec![expr, value]));
                }
                let token = self.ast.node(expr).token.clone();
                self.expect_newline();
                Some(self.ast.add(NodeCategory::ExprStmt, token, vec![expr]))
            }
        }
    }

    /// `if` with an optional `else` that may chain into another `if`.
    fn parse_if(&mut self) -> Option<NodeId> {
        let keyword = self.bump();
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;

        let mut children = vec![condition, body];
        if self.at(TokenCategory::Else) {
            self.bump();
            if self.at(TokenCategory::If) {
                children.push(self.parse_if()?);
            } else {
                children.push(self.parse_block()?);
            }
        }
        Some(self.ast.add(NodeCategory::If, keyword, children))
    }

    // -----------------------------------------------------------------
    // Expressions, precedence-climbing
    // -----------------------------------------------------------------

    fn parse_expr(&mut self) -> Option<NodeId> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Option<NodeId> {
        let mut lhs = self.parse_unary()?;
        while let Some(precedence) = binary_precedence(self.peek().category) {
            if precedence < min_precedence {
                break;
            }
            let op = self.bump();
            let rhs = self.parse_binary(precedence + 1)?;
            lhs = self.ast.add(NodeCategory::Binary, op, vec![lhs, rhs]);
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<NodeId> {
        if self.at(TokenCategory::Minus) || self.at(TokenCategory::Bang) {
            let op = self.bump();
            let operand = self.parse_unary()?;
            return Some(self.ast.add(NodeCategory::Unary, op, vec![operand]));
        }
        self.parse_postfix()
    }

    /// Primary expression followed by any number of `.field` accesses.
    fn parse_postfix(&mut self) -> Option<NodeId> {
        let mut expr = self.parse_primary()?;
        while self.at(TokenCategory::Dot) {
            self.bump();
            let field = self.expect(TokenCategory::Ident, "a field name")?;
            expr = self.ast.add(NodeCategory::Member, field, vec![expr]);
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<NodeId> {
        match self.peek().category {
            TokenCategory::Int => {
                let token = self.bump();
                Some(self.ast.add(NodeCategory::Int, token, vec![]))
            }
            TokenCategory::Float => {
                let token = self.bump();
                Some(self.ast.add(NodeCategory::Float, token, vec![]))
            }
            TokenCategory::Hex => {
                let token = self.bump();
                Some(self.ast.add(NodeCategory::Hex, token, vec![]))
            }
            TokenCategory::True | TokenCategory::False => {
                let token = self.bump();
                Some(self.ast.add(NodeCategory::Bool, token, vec![]))
            }
            TokenCategory::Ident => {
                let token = self.bump();
                if self.at(TokenCategory::LParen) {
                    self.bump();
                    let mut arguments = Vec::new();
                    while !self.at(TokenCategory::RParen) {
                        arguments.push(self.parse_expr()?);
                        if !self.at(TokenCategory::RParen) {
                            self.expect(TokenCategory::Comma, "`,`")?;
                        }
                    }
                    self.bump();
                    return Some(self.ast.add(NodeCategory::Call, token, arguments));
                }
                Some(self.ast.add(NodeCategory::Ident, token, vec![]))
            }
            TokenCategory::LParen => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect(TokenCategory::RParen, "`)`")?;
                Some(expr)
            }
            _ => {
                self.unexpected("an expression");
                None
            }
        }
    }

    // -----------------------------------------------------------------
    // Cursor helpers
    // -----------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream never empty"))
    }

    fn at(&self, category: TokenCategory) -> bool {
        self.peek().category == category
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, category: TokenCategory, what: &str) -> Option<Token> {
        if self.at(category) {
            return Some(self.bump());
        }
        self.unexpected(what);
        None
    }

    /// Like `expect(Newline)` but tolerates end-of-file, where the
    /// lexer already synthesized the final line ending.
    fn expect_newline(&mut self) {
        if self.at(TokenCategory::Newline) {
            self.bump();
        } else if !self.at(TokenCategory::Eof) {
            self.unexpected("a line ending");
        }
    }

    fn unexpected(&mut self, what: &str) {
        let token = self.peek().clone();
        self.log.push(
            Diagnostic::error(format!("expected {what}, found {token}"), token.pos())
                .with_code("E0101"),
        );
    }

    /// Skip to the start of the next line after an error.
    fn synchronize(&mut self) {
        while !self.at(TokenCategory::Eof) {
            if self.at(TokenCategory::Newline) {
                self.bump();
                return;
            }
            if self.at(TokenCategory::Dedent) {
                return;
            }
            self.bump();
        }
    }
}

fn binary_precedence(category: TokenCategory) -> Option<u8> {
    use TokenCategory::*;
    match category {
        EqEq | BangEq | Lt | Gt | Le | Ge => Some(1),
        Plus | Minus => Some(2),
        Star | Slash | Percent => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_source(source: &str) -> (Ast, DiagnosticLog) {
        let mut log = DiagnosticLog::new();
        let tokens = lexer::scan(source, &mut log);
        let ast = parse(&tokens, &mut log);
        (ast, log)
    }

    fn ok(source: &str) -> Ast {
        let (ast, log) = parse_source(source);
        assert!(!log.has_errors(), "unexpected diagnostics: {:?}", log.entries());
        ast
    }

    #[test]
    fn parses_a_function_into_a_program() {
        let ast = ok("fn main() i32\n    return 42\n");
        let root = ast.root().unwrap();
        assert_eq!(ast.node(root).category, NodeCategory::Program);

        let function = ast.children(root)[0];
        assert_eq!(ast.node(function).category, NodeCategory::Function);
        assert_eq!(ast.node(function).token.text, "main");

        let block = ast.child_of(function, NodeCategory::Block).unwrap();
        let ret = ast.children(block)[0];
        assert_eq!(ast.node(ret).category, NodeCategory::Return);
    }

    #[test]
    fn every_child_knows_its_parent() {
        let ast = ok("fn main() i32\n    let x i32 = 1 + 2 * 3\n    return x\n");
        let root = ast.root().unwrap();
        // Every node except the root has exactly one parent and appears
        // in that parent's child list.
        fn walk(ast: &Ast, id: NodeId) {
            for &child in ast.children(id) {
                assert_eq!(ast.parent(child), Some(id));
                walk(ast, child);
            }
        }
        walk(&ast, root);
        assert_eq!(ast.parent(root), None);
    }

    #[test]
    fn binary_operators_nest_by_precedence() {
        let ast = ok("fn main() i32\n    return 1 + 2 * 3\n");
        let root = ast.root().unwrap();
        let function = ast.children(root)[0];
        let block = ast.child_of(function, NodeCategory::Block).unwrap();
        let ret = ast.children(block)[0];
        let plus = ast.children(ret)[0];
        assert_eq!(ast.node(plus).token.text, "+");
        let times = ast.children(plus)[1];
        assert_eq!(ast.node(times).token.text, "*");
    }

    #[test]
    fn parentheses_override_precedence() {
        let ast = ok("fn main() i32\n    return (1 + 2) * 3\n");
        let root = ast.root().unwrap();
        let function = ast.children(root)[0];
        let block = ast.child_of(function, NodeCategory::Block).unwrap();
        let ret = ast.children(block)[0];
        let times = ast.children(ret)[0];
        assert_eq!(ast.node(times).token.text, "*");
        let plus = ast.children(times)[0];
        assert_eq!(ast.node(plus).token.text, "+");
    }

    #[test]
    fn parses_struct_declarations() {
        let ast = ok("struct Point\n    x i32\n    y i32\n");
        let root = ast.root().unwrap();
        let strukt = ast.children(root)[0];
        assert_eq!(ast.node(strukt).category, NodeCategory::Struct);
        assert_eq!(ast.children(strukt).len(), 2);
        let first = ast.children(strukt)[0];
        assert_eq!(ast.node(first).category, NodeCategory::Field);
        assert_eq!(ast.node(first).token.text, "x");
    }

    #[test]
    fn parses_imports_and_modifiers() {
        let ast = ok("import fn print(i32)\nexport fn main() i32\n    return 0\n");
        let root = ast.root().unwrap();
        let import = ast.children(root)[0];
        assert_eq!(ast.node(import).category, NodeCategory::Import);
        assert_eq!(ast.node(import).token.text, "print");

        let function = ast.children(root)[1];
        let modifier = ast.child_of(function, NodeCategory::Modifier).unwrap();
        assert_eq!(ast.node(modifier).token.category, TokenCategory::Export);
    }

    #[test]
    fn parses_member_chains_and_assignment() {
        let ast = ok("fn main()\n    origin.x = 6\n");
        let root = ast.root().unwrap();
        let function = ast.children(root)[0];
        let block = ast.child_of(function, NodeCategory::Block).unwrap();
        let assign = ast.children(block)[0];
        assert_eq!(ast.node(assign).category, NodeCategory::Assign);
        let member = ast.children(assign)[0];
        assert_eq!(ast.node(member).category, NodeCategory::Member);
        assert_eq!(ast.node(member).token.text, "x");
        let base = ast.children(member)[0];
        assert_eq!(ast.node(base).category, NodeCategory::Ident);
        assert_eq!(ast.node(base).token.text, "origin");
    }

    #[test]
    fn parses_if_else_chains() {
        let ast = ok(
            "fn main() i32\n    if x > 1\n        return 1\n    else if x > 0\n        return 2\n    else\n        return 3\n",
        );
        let root = ast.root().unwrap();
        let function = ast.children(root)[0];
        let block = ast.child_of(function, NodeCategory::Block).unwrap();
        let first = ast.children(block)[0];
        assert_eq!(ast.node(first).category, NodeCategory::If);
        assert_eq!(ast.children(first).len(), 3);
        let chained = ast.children(first)[2];
        assert_eq!(ast.node(chained).category, NodeCategory::If);
        assert_eq!(ast.children(chained).len(), 3);
    }

    #[test]
    fn reports_missing_parenthesis() {
        let (_, log) = parse_source("fn main( i32\n    return 0\n");
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0101"));
    }

    #[test]
    fn recovers_and_reports_multiple_errors() {
        let (_, log) = parse_source("fn main() i32\n    let = 1\n    return ,\n");
        assert!(log.error_count() >= 2);
    }
}

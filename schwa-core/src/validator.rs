//! Structural validation of the parsed tree.
//!
//! Runs before analysis and checks everything that can be judged from
//! shape alone; name and type questions belong to the analyzer. Every
//! node's `valid` flag is set exactly once here.

use crate::ast::{Ast, NodeCategory, NodeId};
use crate::diagnostic::{Diagnostic, DiagnosticLog};

pub fn validate(ast: &mut Ast, log: &mut DiagnosticLog) {
    let Some(root) = ast.root() else {
        return;
    };
    let mut validator = Validator { log };
    validator.check(ast, root);
}

struct Validator<'log> {
    log: &'log mut DiagnosticLog,
}

impl Validator<'_> {
    fn check(&mut self, ast: &mut Ast, id: NodeId) {
        let ok = match ast.node(id).category {
            NodeCategory::Parameters => self.check_unique_names(ast, id, "parameter"),
            NodeCategory::Struct => self.check_struct(ast, id),
            NodeCategory::Function => self.check_function(ast, id),
            NodeCategory::Variable => self.check_variable(ast, id),
            NodeCategory::Int => self.check_int(ast, id),
            NodeCategory::Hex => self.check_hex(ast, id),
            NodeCategory::Float => self.check_float(ast, id),
            _ => true,
        };
        ast.set_valid(id, ok);
        let children: Vec<NodeId> = ast.children(id).to_vec();
        for child in children {
            self.check(ast, child);
        }
    }

    fn check_unique_names(&mut self, ast: &Ast, id: NodeId, what: &str) -> bool {
        let mut ok = true;
        let children = ast.children(id);
        for (index, &child) in children.iter().enumerate() {
            let name = &ast.node(child).token.text;
            let duplicated = children[..index]
                .iter()
                .any(|&other| &ast.node(other).token.text == name);
            if duplicated {
                let token = &ast.node(child).token;
                self.log.push(
                    Diagnostic::error(format!("duplicate {what} `{name}`"), token.pos())
                        .with_code("E0201"),
                );
                ok = false;
            }
        }
        ok
    }

    fn check_struct(&mut self, ast: &Ast, id: NodeId) -> bool {
        if ast.children(id).is_empty() {
            let token = &ast.node(id).token;
            self.log.push(
                Diagnostic::error(
                    format!("struct `{}` has no fields", token.text),
                    token.pos(),
                )
                .with_code("E0202"),
            );
            return false;
        }
        self.check_unique_names(ast, id, "field")
    }

    /// A function with a declared return type must end in a `return`,
    /// either directly or through an `if`/`else` whose every arm does;
    /// the generator relies on it.
    fn check_function(&mut self, ast: &Ast, id: NodeId) -> bool {
        let returns_value = ast.child_of(id, NodeCategory::TypeName).is_some();
        if !returns_value {
            return true;
        }
        let Some(block) = ast.child_of(id, NodeCategory::Block) else {
            return true;
        };
        if !block_returns(ast, block) {
            let token = &ast.node(id).token;
            self.log.push(
                Diagnostic::error(
                    format!("function `{}` must end with a return statement", token.text),
                    token.pos(),
                )
                .with_code("E0203"),
            );
            return false;
        }
        true
    }

    /// Local declarations always need an initializer; whether a
    /// top-level one may omit it depends on its type and is settled by
    /// the analyzer.
    fn check_variable(&mut self, ast: &Ast, id: NodeId) -> bool {
        let is_local = ast
            .parent(id)
            .is_some_and(|p| ast.node(p).category != NodeCategory::Program);
        let has_init = ast
            .children(id)
            .last()
            .is_some_and(|&last| {
                !matches!(
                    ast.node(last).category,
                    NodeCategory::Modifier | NodeCategory::TypeName
                )
            });
        if is_local && !has_init {
            let token = &ast.node(id).token;
            self.log.push(
                Diagnostic::error(
                    format!("variable `{}` needs an initializer", token.text),
                    token.pos(),
                )
                .with_code("E0204"),
            );
            return false;
        }
        true
    }

    fn check_int(&mut self, ast: &Ast, id: NodeId) -> bool {
        let token = &ast.node(id).token;
        if token.text.parse::<i64>().is_err() {
            self.log.push(
                Diagnostic::error(
                    format!("integer literal `{}` is too large", token.text),
                    token.pos(),
                )
                .with_code("E0205"),
            );
            return false;
        }
        true
    }

    fn check_hex(&mut self, ast: &Ast, id: NodeId) -> bool {
        let token = &ast.node(id).token;
        let digits = token.text.get(2..).unwrap_or("");
        if digits.is_empty() || u64::from_str_radix(digits, 16).is_err() {
            self.log.push(
                Diagnostic::error(
                    format!("hex literal `{}` is out of range", token.text),
                    token.pos(),
                )
                .with_code("E0205"),
            );
            return false;
        }
        true
    }

    fn check_float(&mut self, ast: &Ast, id: NodeId) -> bool {
        let token = &ast.node(id).token;
        if token.text.parse::<f64>().is_err() {
            self.log.push(
                Diagnostic::error(
                    format!("float literal `{}` is malformed", token.text),
                    token.pos(),
                )
                .with_code("E0205"),
            );
            return false;
        }
        true
    }
}

fn block_returns(ast: &Ast, block: NodeId) -> bool {
    ast.children(block)
        .last()
        .is_some_and(|&last| statement_returns(ast, last))
}

fn statement_returns(ast: &Ast, statement: NodeId) -> bool {
    match ast.node(statement).category {
        NodeCategory::Return => true,
        // An `if` only guarantees a return when it has an `else` and
        // every arm returns.
        NodeCategory::If => {
            let children = ast.children(statement);
            let Some(&tail) = children.get(2) else {
                return false;
            };
            let then_returns = block_returns(ast, children[1]);
            let tail_returns = match ast.node(tail).category {
                NodeCategory::If => statement_returns(ast, tail),
                _ => block_returns(ast, tail),
            };
            then_returns && tail_returns
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn validated(source: &str) -> (Ast, DiagnosticLog) {
        let mut log = DiagnosticLog::new();
        let tokens = lexer::scan(source, &mut log);
        let mut ast = parser::parse(&tokens, &mut log);
        assert!(!log.has_errors(), "source must parse: {:?}", log.entries());
        validate(&mut ast, &mut log);
        (ast, log)
    }

    #[test]
    fn marks_every_node() {
        let (ast, log) = validated("fn main() i32\n    return 1 + 2\n");
        assert!(!log.has_errors());
        let root = ast.root().unwrap();
        fn walk(ast: &Ast, id: crate::ast::NodeId) {
            assert_eq!(ast.valid(id), Some(true));
            for &child in ast.children(id) {
                walk(ast, child);
            }
        }
        walk(&ast, root);
    }

    #[test]
    fn rejects_duplicate_parameters() {
        let (ast, log) = validated("fn add(a i32, a i32) i32\n    return 0\n");
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0201"));
        let root = ast.root().unwrap();
        let function = ast.children(root)[0];
        let parameters = ast.child_of(function, NodeCategory::Parameters).unwrap();
        assert_eq!(ast.valid(parameters), Some(false));
    }

    #[test]
    fn rejects_duplicate_fields() {
        let (_, log) = validated("struct Point\n    x i32\n    x f64\n");
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0201"));
    }

    #[test]
    fn rejects_empty_structs() {
        use crate::token::{Token, TokenCategory};
        // The grammar cannot produce a fieldless struct, so build one
        // directly against the validator's contract.
        let mut ast = Ast::new();
        let strukt = ast.add(
            NodeCategory::Struct,
            Token::new(TokenCategory::Ident, "Empty", 1, 8),
            vec![],
        );
        let root = ast.add(
            NodeCategory::Program,
            Token::marker(TokenCategory::Bof, 1, 1),
            vec![strukt],
        );
        ast.set_root(root);

        let mut log = DiagnosticLog::new();
        validate(&mut ast, &mut log);
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0202"));
        assert_eq!(ast.valid(strukt), Some(false));
    }

    #[test]
    fn requires_final_return_for_typed_functions() {
        let (_, log) = validated("fn main() i32\n    let x i32 = 1\n");
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0203"));
    }

    #[test]
    fn exhaustive_if_else_counts_as_a_return() {
        let (_, log) = validated(
            "fn main() i32\n    if 1 < 2\n        return 1\n    else\n        return 2\n",
        );
        assert!(!log.has_errors());

        // Without an `else` the fall-through path returns nothing.
        let (_, log) = validated("fn main() i32\n    if 1 < 2\n        return 1\n");
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0203"));
    }

    #[test]
    fn void_functions_need_no_return() {
        let (_, log) = validated("fn step()\n    let x i32 = 1\n");
        assert!(!log.has_errors());
    }

    #[test]
    fn locals_need_initializers() {
        let (_, log) = validated("fn main()\n    let x i32\n");
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0204"));
    }

    #[test]
    fn top_level_variables_may_omit_the_initializer() {
        let (_, log) = validated("let origin Point\n");
        assert!(!log.has_errors());
    }

    #[test]
    fn rejects_oversized_integer_literals() {
        let (_, log) = validated("fn main() i32\n    return 99999999999999999999\n");
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0205"));
    }
}

//! Canonical source re-rendering.
//!
//! Produces the formatted text carried alongside the binary in the
//! compilation artifact. The output round-trips through the parser to
//! the same tree; parentheses are re-inserted only where precedence
//! demands them.

use crate::ast::{Ast, NodeCategory, NodeId};
use crate::token::TokenCategory;

const INDENT: &str = "    ";

/// Renders the whole program as canonical schwa source.
pub fn format(ast: &Ast) -> String {
    let Some(root) = ast.root() else {
        return String::new();
    };
    let mut out = String::new();
    let declarations = ast.children(root);
    for (index, &declaration) in declarations.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        format_declaration(ast, declaration, &mut out);
    }
    out
}

fn format_declaration(ast: &Ast, node: NodeId, out: &mut String) {
    match ast.node(node).category {
        NodeCategory::Import => {
            out.push_str("import fn ");
            out.push_str(&ast.node(node).token.text);
            out.push('(');
            if let Some(parameters) = ast.child_of(node, NodeCategory::Parameters) {
                for (index, &ty) in ast.children(parameters).iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&ast.node(ty).token.text);
                }
            }
            out.push(')');
            if let Some(ty) = ast.child_of(node, NodeCategory::TypeName) {
                out.push(' ');
                out.push_str(&ast.node(ty).token.text);
            }
            out.push('\n');
        }
        NodeCategory::Struct => {
            out.push_str("struct ");
            out.push_str(&ast.node(node).token.text);
            out.push('\n');
            for &field in ast.children(node) {
                out.push_str(INDENT);
                out.push_str(&ast.node(field).token.text);
                if let Some(ty) = ast.child_of(field, NodeCategory::TypeName) {
                    out.push(' ');
                    out.push_str(&ast.node(ty).token.text);
                }
                out.push('\n');
            }
        }
        NodeCategory::Function => {
            if has_modifier(ast, node, TokenCategory::Export) {
                out.push_str("export ");
            }
            out.push_str("fn ");
            out.push_str(&ast.node(node).token.text);
            out.push('(');
            if let Some(parameters) = ast.child_of(node, NodeCategory::Parameters) {
                for (index, &param) in ast.children(parameters).iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&ast.node(param).token.text);
                    if let Some(ty) = ast.child_of(param, NodeCategory::TypeName) {
                        out.push(' ');
                        out.push_str(&ast.node(ty).token.text);
                    }
                }
            }
            out.push(')');
            if let Some(ty) = ast.child_of(node, NodeCategory::TypeName) {
                out.push(' ');
                out.push_str(&ast.node(ty).token.text);
            }
            out.push('\n');
            if let Some(block) = ast.child_of(node, NodeCategory::Block) {
                format_block(ast, block, 1, out);
            }
        }
        NodeCategory::Variable => {
            format_variable(ast, node, 0, out);
        }
        _ => {}
    }
}

fn format_block(ast: &Ast, block: NodeId, depth: usize, out: &mut String) {
    for &statement in ast.children(block) {
        format_statement(ast, statement, depth, out);
    }
}

fn format_statement(ast: &Ast, node: NodeId, depth: usize, out: &mut String) {
    if ast.node(node).category == NodeCategory::Variable {
        format_variable(ast, node, depth, out);
        return;
    }
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    match ast.node(node).category {
        NodeCategory::Assign => {
            let children = ast.children(node);
            format_expr(ast, children[0], 0, out);
            out.push_str(" = ");
            format_expr(ast, children[1], 0, out);
            out.push('\n');
        }
        NodeCategory::Return => {
            out.push_str("return");
            if let Some(&value) = ast.children(node).first() {
                out.push(' ');
                format_expr(ast, value, 0, out);
            }
            out.push('\n');
        }
        NodeCategory::If => {
            format_if(ast, node, depth, out, "if ");
        }
        NodeCategory::While => {
            let children = ast.children(node);
            out.push_str("while ");
            format_expr(ast, children[0], 0, out);
            out.push('\n');
            format_block(ast, children[1], depth + 1, out);
        }
        NodeCategory::ExprStmt => {
            format_expr(ast, ast.children(node)[0], 0, out);
            out.push('\n');
        }
        _ => {}
    }
}

fn format_if(ast: &Ast, node: NodeId, depth: usize, out: &mut String, keyword: &str) {
    let children = ast.children(node);
    out.push_str(keyword);
    format_expr(ast, children[0], 0, out);
    out.push('\n');
    format_block(ast, children[1], depth + 1, out);
    if let Some(&tail) = children.get(2) {
        for _ in 0..depth {
            out.push_str(INDENT);
        }
        if ast.node(tail).category == NodeCategory::If {
            format_if(ast, tail, depth, out, "else if ");
        } else {
            out.push_str("else\n");
            format_block(ast, tail, depth + 1, out);
        }
    }
}

fn format_variable(ast: &Ast, node: NodeId, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    for &child in ast.children(node) {
        if ast.node(child).category == NodeCategory::Modifier
            && ast.node(child).token.category == TokenCategory::Export
        {
            out.push_str("export ");
        }
    }
    let keyword = ast
        .children(node)
        .iter()
        .find(|&&child| {
            ast.node(child).category == NodeCategory::Modifier
                && ast.node(child).token.category != TokenCategory::Export
        })
        .map(|&child| ast.node(child).token.text.clone())
        .unwrap_or_else(|| String::from("let"));
    out.push_str(&keyword);
    out.push(' ');
    out.push_str(&ast.node(node).token.text);
    if let Some(ty) = ast.child_of(node, NodeCategory::TypeName) {
        out.push(' ');
        out.push_str(&ast.node(ty).token.text);
    }
    if let Some(&last) = ast.children(node).last() {
        if !matches!(
            ast.node(last).category,
            NodeCategory::Modifier | NodeCategory::TypeName
        ) {
            out.push_str(" = ");
            format_expr(ast, last, 0, out);
        }
    }
    out.push('\n');
}

/// Renders an expression, parenthesizing children whose precedence is
/// lower than the surrounding operator's.
fn format_expr(ast: &Ast, node: NodeId, parent_precedence: u8, out: &mut String) {
    match ast.node(node).category {
        NodeCategory::Binary => {
            let precedence = precedence_of(ast.node(node).token.category);
            let needs_parens = precedence < parent_precedence;
            if needs_parens {
                out.push('(');
            }
            let children = ast.children(node);
            format_expr(ast, children[0], precedence, out);
            out.push(' ');
            out.push_str(&ast.node(node).token.text);
            out.push(' ');
            format_expr(ast, children[1], precedence + 1, out);
            if needs_parens {
                out.push(')');
            }
        }
        NodeCategory::Unary => {
            out.push_str(&ast.node(node).token.text);
            format_expr(ast, ast.children(node)[0], u8::MAX, out);
        }
        NodeCategory::Call => {
            out.push_str(&ast.node(node).token.text);
            out.push('(');
            for (index, &argument) in ast.children(node).iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                format_expr(ast, argument, 0, out);
            }
            out.push(')');
        }
        NodeCategory::Member => {
            format_expr(ast, ast.children(node)[0], u8::MAX, out);
            out.push('.');
            out.push_str(&ast.node(node).token.text);
        }
        _ => {
            out.push_str(&ast.node(node).token.text);
        }
    }
}

fn precedence_of(category: TokenCategory) -> u8 {
    use TokenCategory::*;
    match category {
        EqEq | BangEq | Lt | Gt | Le | Ge => 1,
        Plus | Minus => 2,
        Star | Slash | Percent => 3,
        _ => u8::MAX,
    }
}

fn has_modifier(ast: &Ast, node: NodeId, category: TokenCategory) -> bool {
    ast.children(node).iter().any(|&child| {
        ast.node(child).category == NodeCategory::Modifier
            && ast.node(child).token.category == category
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticLog;
    use crate::lexer;
    use crate::parser;

    fn formatted(source: &str) -> String {
        let mut log = DiagnosticLog::new();
        let tokens = lexer::scan(source, &mut log);
        let ast = parser::parse(&tokens, &mut log);
        assert!(!log.has_errors(), "source must parse: {:?}", log.entries());
        format(&ast)
    }

    #[test]
    fn renders_canonical_layout() {
        let source = "export   fn main(  ) i32\n    let x i32=6\n    return x*7\n";
        assert_eq!(
            formatted(source),
            "export fn main() i32\n    let x i32 = 6\n    return x * 7\n"
        );
    }

    #[test]
    fn separates_declarations_with_blank_lines() {
        let source = "let a i32 = 1\nfn main() i32\n    return a\n";
        assert_eq!(
            formatted(source),
            "let a i32 = 1\n\nfn main() i32\n    return a\n"
        );
    }

    #[test]
    fn preserves_necessary_parentheses_only() {
        let source = "fn main() i32\n    return ((1 + 2)) * (3)\n";
        assert_eq!(
            formatted(source),
            "fn main() i32\n    return (1 + 2) * 3\n"
        );
    }

    #[test]
    fn renders_control_flow_with_indentation() {
        let source = "fn main() i32\n    if 1 < 2\n        return 1\n    else\n        return 2\n";
        assert_eq!(
            formatted(source),
            "fn main() i32\n    if 1 < 2\n        return 1\n    else\n        return 2\n"
        );
    }

    #[test]
    fn renders_structs_imports_and_members() {
        let source =
            "import fn print(i32)\nstruct Point\n    x i32\n    y i32\nlet origin Point\nfn main()\n    origin.x = 1\n    print(origin.x)\n";
        assert_eq!(
            formatted(source),
            "import fn print(i32)\n\nstruct Point\n    x i32\n    y i32\n\nlet origin Point\n\nfn main()\n    origin.x = 1\n    print(origin.x)\n"
        );
    }

    #[test]
    fn formatting_is_stable() {
        let source = "fn main() i32\n    let x i32 = (1 + 2) * 3\n    return x\n";
        let once = formatted(source);
        let twice = formatted(&once);
        assert_eq!(once, twice);
    }
}

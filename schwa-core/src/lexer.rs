//! Lexer for schwa source.
//!
//! Produces the flat token sequence the parser consumes. Block
//! structure is significant: leading spaces are folded into `Indent` /
//! `Dedent` markers against an indentation stack, every non-blank line
//! ends in a `Newline` marker, and the whole stream is bracketed by
//! `Bof` and `Eof`. `#` starts a comment running to the end of the
//! line.

use crate::diagnostic::{Diagnostic, DiagnosticLog};
use crate::token::{Pos, Token, TokenCategory};

/// Lex a source string into tokens.
///
/// Problems are reported to `log`; the scanner recovers and keeps
/// going so a single pass can report more than one error.
pub fn scan(source: &str, log: &mut DiagnosticLog) -> Vec<Token> {
    let mut lexer = Lexer {
        bytes: source.as_bytes(),
        index: 0,
        row: 1,
        line_start: 0,
        indents: Vec::new(),
        tokens: Vec::new(),
        log,
    };
    lexer.run();
    lexer.tokens
}

struct Lexer<'src, 'log> {
    bytes: &'src [u8],
    index: usize,
    row: u32,
    line_start: usize,
    indents: Vec<usize>,
    tokens: Vec<Token>,
    log: &'log mut DiagnosticLog,
}

impl Lexer<'_, '_> {
    fn run(&mut self) {
        self.tokens.push(Token::marker(TokenCategory::Bof, 1, 1));

        while self.index < self.bytes.len() {
            self.scan_line();
        }

        // Close any open blocks and mark the end of the stream.
        for _ in 0..self.indents.len() {
            self.tokens.push(Token::marker(TokenCategory::Dedent, self.row, 1));
        }
        self.indents.clear();
        self.tokens.push(Token::marker(TokenCategory::Eof, self.row, 1));
    }

    fn scan_line(&mut self) {
        let mut width = 0usize;
        while let Some(ch) = self.peek() {
            match ch {
                b' ' => {
                    width += 1;
                    self.advance();
                }
                b'\t' => {
                    self.error("tab characters are not allowed in indentation", "E0002");
                    self.advance();
                }
                _ => break,
            }
        }

        // Blank and comment-only lines contribute no tokens at all.
        if matches!(self.peek(), None | Some(b'\n') | Some(b'\r') | Some(b'#')) {
            self.finish_line(false);
            return;
        }

        self.adjust_indentation(width);

        while let Some(ch) = self.peek() {
            if ch == b'\n' || ch == b'\r' || ch == b'#' {
                break;
            }
            if ch == b' ' {
                self.advance();
                continue;
            }
            self.scan_token();
        }
        self.finish_line(true);
    }

    /// Emits `Indent`/`Dedent` markers for a change in leading width.
    fn adjust_indentation(&mut self, width: usize) {
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.tokens.push(Token::marker(TokenCategory::Indent, self.row, 1));
            return;
        }
        while width < self.indents.last().copied().unwrap_or(0) {
            self.indents.pop();
            self.tokens.push(Token::marker(TokenCategory::Dedent, self.row, 1));
        }
        if width != self.indents.last().copied().unwrap_or(0) {
            self.error("indentation does not match any enclosing block", "E0002");
            self.indents.push(width);
        }
    }

    /// Consumes a trailing comment and the line terminator, emitting
    /// `Newline` when the line carried tokens.
    fn finish_line(&mut self, had_tokens: bool) {
        while let Some(ch) = self.peek() {
            if ch == b'\n' || ch == b'\r' {
                break;
            }
            self.advance();
        }
        if had_tokens {
            let column = self.column();
            self.tokens.push(Token::marker(TokenCategory::Newline, self.row, column));
        }
        if self.peek() == Some(b'\r') {
            self.advance();
        }
        if self.peek() == Some(b'\n') {
            self.advance();
        }
        self.row += 1;
        self.line_start = self.index;
    }

    fn scan_token(&mut self) {
        let start = self.index;
        let ch = self.bytes[start];
        match ch {
            b'(' => self.single(TokenCategory::LParen),
            b')' => self.single(TokenCategory::RParen),
            b',' => self.single(TokenCategory::Comma),
            b'.' => self.single(TokenCategory::Dot),
            b'+' => self.single(TokenCategory::Plus),
            b'-' => self.single(TokenCategory::Minus),
            b'*' => self.single(TokenCategory::Star),
            b'/' => self.single(TokenCategory::Slash),
            b'%' => self.single(TokenCategory::Percent),
            b'=' => self.one_or_two(TokenCategory::Eq, b'=', TokenCategory::EqEq),
            b'!' => self.one_or_two(TokenCategory::Bang, b'=', TokenCategory::BangEq),
            b'<' => self.one_or_two(TokenCategory::Lt, b'=', TokenCategory::Le),
            b'>' => self.one_or_two(TokenCategory::Gt, b'=', TokenCategory::Ge),
            b'0'..=b'9' => self.scan_number(),
            _ if is_ident_start(ch) => self.scan_ident_or_keyword(),
            _ => {
                self.advance();
                self.error_at(
                    format!("unexpected character {:?}", ch as char),
                    "E0001",
                    start,
                );
            }
        }
    }

    fn single(&mut self, category: TokenCategory) {
        let start = self.index;
        self.advance();
        self.emit(category, start);
    }

    fn one_or_two(&mut self, single: TokenCategory, next: u8, double: TokenCategory) {
        let start = self.index;
        self.advance();
        if self.peek() == Some(next) {
            self.advance();
            self.emit(double, start);
        } else {
            self.emit(single, start);
        }
    }

    fn scan_number(&mut self) {
        let start = self.index;

        // 0x prefix switches to a hex literal.
        if self.bytes[start] == b'0' && matches!(self.peek_next(), Some(b'x') | Some(b'X')) {
            self.advance();
            self.advance();
            let digits_start = self.index;
            while let Some(ch) = self.peek() {
                if ch.is_ascii_hexdigit() {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.index == digits_start {
                self.error_at("hex literal is missing digits", "E0003", start);
            }
            self.emit(TokenCategory::Hex, start);
            return;
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        // A '.' followed by a digit extends this into a float.
        let mut is_float = false;
        if self.peek() == Some(b'.') {
            if let Some(next) = self.peek_next() {
                if next.is_ascii_digit() {
                    is_float = true;
                    self.advance();
                    while let Some(ch) = self.peek() {
                        if ch.is_ascii_digit() {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        let category = if is_float {
            TokenCategory::Float
        } else {
            TokenCategory::Int
        };
        self.emit(category, start);
    }

    fn scan_ident_or_keyword(&mut self) {
        let start = self.index;
        while let Some(ch) = self.peek() {
            if is_ident_continue(ch) {
                self.advance();
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.index]).unwrap_or("");
        let category = TokenCategory::keyword(text).unwrap_or(TokenCategory::Ident);
        self.emit(category, start);
    }

    fn emit(&mut self, category: TokenCategory, start: usize) {
        let text = std::str::from_utf8(&self.bytes[start..self.index])
            .unwrap_or("")
            .to_string();
        let column = (start - self.line_start + 1) as u32;
        self.tokens.push(Token::new(category, text, self.row, column));
    }

    fn error(&mut self, message: &str, code: &'static str) {
        let pos = Pos {
            row: self.row,
            column: self.column(),
        };
        self.log.push(Diagnostic::error(message, pos).with_code(code));
    }

    fn error_at(&mut self, message: impl Into<String>, code: &'static str, start: usize) {
        let pos = Pos {
            row: self.row,
            column: (start - self.line_start + 1) as u32,
        };
        self.log.push(Diagnostic::error(message, pos).with_code(code));
    }

    fn column(&self) -> u32 {
        (self.index - self.line_start + 1) as u32
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn advance(&mut self) {
        if self.index < self.bytes.len() {
            self.index += 1;
        }
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(source: &str) -> Vec<TokenCategory> {
        let mut log = DiagnosticLog::new();
        let tokens = scan(source, &mut log);
        assert!(!log.has_errors(), "unexpected diagnostics: {:?}", log.entries());
        tokens.iter().map(|t| t.category).collect()
    }

    #[test]
    fn brackets_stream_with_bof_and_eof() {
        use TokenCategory::*;
        assert_eq!(categories(""), vec![Bof, Eof]);
    }

    #[test]
    fn scans_a_function_with_indentation() {
        use TokenCategory::*;
        let source = "fn main() i32\n    return 42\n";
        assert_eq!(
            categories(source),
            vec![
                Bof, Fn, Ident, LParen, RParen, Ident, Newline, Indent, Return, Int, Newline,
                Dedent, Eof
            ]
        );
    }

    #[test]
    fn nested_blocks_close_in_order() {
        use TokenCategory::*;
        let source = "while x\n    if y\n        x = 1\n";
        assert_eq!(
            categories(source),
            vec![
                Bof, While, Ident, Newline, Indent, If, Ident, Newline, Indent, Ident, Eq, Int,
                Newline, Dedent, Dedent, Eof
            ]
        );
    }

    #[test]
    fn dedents_to_intermediate_levels() {
        use TokenCategory::*;
        let source = "if a\n    if b\n        x = 1\n    y = 2\n";
        assert_eq!(
            categories(source),
            vec![
                Bof, If, Ident, Newline, Indent, If, Ident, Newline, Indent, Ident, Eq, Int,
                Newline, Dedent, Ident, Eq, Int, Newline, Dedent, Eof
            ]
        );
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        use TokenCategory::*;
        let source = "# leading comment\n\nlet x i32 = 1  # trailing\n";
        assert_eq!(
            categories(source),
            vec![Bof, Let, Ident, Ident, Eq, Int, Newline, Eof]
        );
    }

    #[test]
    fn tracks_rows_and_columns() {
        let mut log = DiagnosticLog::new();
        let tokens = scan("let x i32 = 6\nlet y i32 = 7\n", &mut log);
        let y = tokens
            .iter()
            .find(|t| t.category == TokenCategory::Ident && t.text == "y")
            .unwrap();
        assert_eq!((y.row, y.column), (2, 5));
        let seven = tokens
            .iter()
            .find(|t| t.category == TokenCategory::Int && t.text == "7")
            .unwrap();
        assert_eq!((seven.row, seven.column), (2, 13));
    }

    #[test]
    fn scans_numeric_literal_kinds() {
        use TokenCategory::*;
        let source = "x = 12 + 3.5 + 0x1f\n";
        let mut log = DiagnosticLog::new();
        let tokens = scan(source, &mut log);
        let literals: Vec<_> = tokens
            .iter()
            .filter(|t| matches!(t.category, Int | Float | Hex))
            .map(|t| (t.category, t.text.as_str()))
            .collect();
        assert_eq!(
            literals,
            vec![(Int, "12"), (Float, "3.5"), (Hex, "0x1f")]
        );
    }

    #[test]
    fn final_line_without_terminator_still_ends_the_stream() {
        use TokenCategory::*;
        assert_eq!(
            categories("return 1"),
            vec![Bof, Return, Int, Newline, Eof]
        );
    }

    #[test]
    fn comparison_operators_take_two_characters() {
        use TokenCategory::*;
        let source = "a <= b != c == d\n";
        assert_eq!(
            categories(source),
            vec![Bof, Ident, Le, Ident, BangEq, Ident, EqEq, Ident, Newline, Eof]
        );
    }

    #[test]
    fn reports_unexpected_characters() {
        let mut log = DiagnosticLog::new();
        scan("let x i32 = @\n", &mut log);
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0001"));
    }

    #[test]
    fn reports_inconsistent_indentation() {
        let mut log = DiagnosticLog::new();
        scan("if a\n        x = 1\n    y = 2\n", &mut log);
        assert!(log.has_errors());
        assert_eq!(log.entries()[0].code, Some("E0002"));
    }
}

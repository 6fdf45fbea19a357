//! Lexer and parser for the Silver-like input language.

pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod span;

use crate::diagnostic::Diagnostic;
use crate::ir::Program;

/// Parse a program from source text.
pub fn parse(source: &str) -> Result<Program, Vec<Diagnostic>> {
    let (tokens, lex_errors) = lexer::Lexer::new(source).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    parser::Parser::new(tokens).parse_program()
}

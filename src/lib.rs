// Private
mod builtins;
mod interpreter;

// Public
pub mod ast;
pub mod callable;
pub mod environment;
pub mod evaluator;
pub mod host;
pub mod modules;
pub mod parser;
pub mod scanner;
pub mod token;
pub mod value;

pub use interpreter::{
    create_default_environment, run, RunError, RunFileError, Wisp, WispError, WispErrorKind,
};

use ast::Program;
use parser::{ParseError, Parser};
use scanner::{LexError, Scanner};
use token::Token;

/// Lexes `source` into an `Eof`-terminated token stream.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Scanner::scan_tokens(source)
}

/// Parses a token stream into a program AST.
pub fn parse_program(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

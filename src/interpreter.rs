use std::fs;
use std::path::{Path, PathBuf};

use crate::builtins;
use crate::environment::Environment;
use crate::evaluator::{Evaluator, RuntimeError};
use crate::parser::{ParseError, Parser};
use crate::scanner::{LexError, Scanner};
use crate::value::Value;

/// An environment pre-populated with the default host bindings: `math`,
/// `time`, `json`, `print`, `log`, and the `tasks` capability.
pub fn create_default_environment() -> Environment {
    let environment = Environment::default();
    builtins::install(&environment);
    environment
}

/// Lexes, parses, and evaluates `source`, creating a default environment
/// when none is supplied. The first error aborts the run; side effects
/// performed through builtins up to that point stay performed.
pub fn run(source: &str, environment: Option<Environment>) -> Result<Value, RunError> {
    let environment = environment.unwrap_or_else(create_default_environment);

    let tokens = Scanner::scan_tokens(source)?;
    tracing::trace!(tokens = tokens.len(), "lexed");
    let program = Parser::new(tokens).parse_program()?;
    tracing::trace!(statements = program.body.len(), "parsed");
    let value = Evaluator::evaluate(&program, &environment)?;
    tracing::debug!(%value, "evaluated");
    Ok(value)
}

/// The command-line runner.
pub struct Wisp {}

impl Wisp {
    pub fn execute(&self, args: &[String]) -> Result<Value, WispError> {
        match args.len() {
            2 => self
                .run_file(&args[1])
                .map_err(|e| WispErrorKind::RunFile(e).into_error(args)),
            _ => Err(WispErrorKind::InvalidArguments.into_error(args)),
        }
    }

    fn run_file(&self, path: impl AsRef<Path>) -> Result<Value, RunFileError> {
        let source = fs::read_to_string(&path)
            .map_err(|e| RunFileErrorKind::ReadFile(e).into_error(path.as_ref()))?;
        run(&source, None).map_err(|e| RunFileErrorKind::Run(e).into_error(path.as_ref()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to execute command: \"{}\"", args.join(" "))]
#[non_exhaustive]
pub struct WispError {
    pub args: Vec<String>,
    pub source: WispErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum WispErrorKind {
    #[error(transparent)]
    RunFile(#[from] RunFileError),
    #[error("invalid command line arguments")]
    InvalidArguments,
}

impl WispErrorKind {
    pub fn into_error(self, args: &[String]) -> WispError {
        WispError {
            args: args.to_owned(),
            source: self,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("error executing file: {}", path.display())]
pub struct RunFileError {
    path: PathBuf,
    source: RunFileErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum RunFileErrorKind {
    #[error("failed to read file")]
    ReadFile(#[source] std::io::Error),
    #[error(transparent)]
    Run(#[from] RunError),
}

impl RunFileErrorKind {
    pub fn into_error(self, path: &Path) -> RunFileError {
        RunFileError {
            path: path.to_path_buf(),
            source: self,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
